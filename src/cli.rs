//! Command-line interface for both binaries.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

/// `relay-server` arguments.
#[derive(Debug, Clone, Default)]
pub struct ServerArgs {
    /// Verbose diagnostics on stderr.
    pub debug: bool,
    /// Address to bind to.
    pub bind: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Interpreter for command lines.
    pub shell: Option<PathBuf>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// `relay-client` arguments.
#[derive(Debug, Clone, Default)]
pub struct ClientArgs {
    /// Verbose diagnostics on stderr.
    pub debug: bool,
    /// Server host name or address (the single positional argument).
    pub host: Option<String>,
    /// Server port.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse `relay-server` arguments from the process environment.
pub fn parse_server_args() -> Result<ServerArgs, ArgsError> {
    parse_server_args_from(std::env::args_os())
}

/// Parse `relay-server` arguments from an iterator (for testing).
pub fn parse_server_args_from<I>(args: I) -> Result<ServerArgs, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = ServerArgs::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => result.help = true,
            Short('V') | Long("version") => result.version = true,
            Long("debug") => result.debug = true,
            Short('b') | Long("bind") => {
                let value: String = parser.value()?.parse()?;
                result.bind = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("bind", value))?,
                );
            }
            Short('p') | Long("port") => result.port = Some(parse_port(&mut parser)?),
            Short('s') | Long("shell") => result.shell = Some(parser.value()?.parse()?),
            Short('c') | Long("config") => result.config = Some(parser.value()?.parse()?),
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Parse `relay-client` arguments from the process environment.
pub fn parse_client_args() -> Result<ClientArgs, ArgsError> {
    parse_client_args_from(std::env::args_os())
}

/// Parse `relay-client` arguments from an iterator (for testing).
///
/// Exactly one positional host is required unless help or version was
/// requested.
pub fn parse_client_args_from<I>(args: I) -> Result<ClientArgs, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = ClientArgs::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => result.help = true,
            Short('V') | Long("version") => result.version = true,
            Long("debug") => result.debug = true,
            Short('p') | Long("port") => result.port = Some(parse_port(&mut parser)?),
            Short('c') | Long("config") => result.config = Some(parser.value()?.parse()?),
            Value(val) => {
                if result.host.is_some() {
                    return Err(ArgsError::TooManyHosts);
                }
                result.host = Some(val.string()?);
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if result.host.is_none() && !result.help && !result.version {
        return Err(ArgsError::MissingHost);
    }

    Ok(result)
}

fn parse_port(parser: &mut lexopt::Parser) -> Result<u16, ArgsError> {
    use lexopt::prelude::*;

    let value: String = parser.value()?.parse()?;
    value
        .parse()
        .map_err(|_| ArgsError::InvalidValue("port", value))
}

/// Print server help message.
pub fn print_server_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"relay-server {version}
Runs each received line as a shell command and streams back its output

USAGE:
    relay-server [OPTIONS]

OPTIONS:
        --debug             Print diagnostic messages to stderr
    -b, --bind <ADDR>       Address to bind [default: 0.0.0.0]
    -p, --port <PORT>       Port to listen on [default: 8080]
    -s, --shell <PATH>      Shell used to run commands [default: /bin/sh]
    -c, --config <FILE>     Path to configuration file (JSON)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SHELL_RELAY_BIND        Bind address (overrides config)
    SHELL_RELAY_PORT        Port number (overrides config)
    SHELL_RELAY_SHELL       Shell path (overrides config)
    SHELL_RELAY_LOG_LEVEL   Log level (overrides config)
    RUST_LOG                Alternative log level setting
"#
    );
}

/// Print client help message.
pub fn print_client_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"relay-client {version}
Interactive prompt that sends commands to a relay-server

USAGE:
    relay-client [OPTIONS] <HOST>

ARGS:
    <HOST>                  Server host name or address

OPTIONS:
        --debug             Print diagnostic messages to stderr
    -p, --port <PORT>       Server port [default: 8080]
    -c, --config <FILE>     Path to configuration file (JSON)
    -h, --help              Print help
    -V, --version           Print version

Type 'quit' or press Ctrl-D to exit.
"#
    );
}

/// Print version.
pub fn print_version(binary: &str) {
    println!("{} {}", binary, env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
    /// The client got no host.
    MissingHost,
    /// The client got more than one host.
    TooManyHosts,
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
            Self::MissingHost => write!(f, "no hostname provided"),
            Self::TooManyHosts => write!(f, "only one hostname is expected"),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
