//! relay-server binary entry point.

use std::process::ExitCode;

use shell_relay::cli;
use shell_relay::config::Config;
use shell_relay::{interrupt, logging, server, InterruptFlag, ServerConfig};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_server_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run 'relay-server --help' for usage.");
            return ExitCode::FAILURE;
        }
    };

    if args.help {
        cli::print_server_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version("relay-server");
        return ExitCode::SUCCESS;
    }

    let config = match Config::load_for_server(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(args.debug, Some(config.log_filter()));
    debug!("Server starting");

    let server_config = match config.to_server_config() {
        Ok(server_config) => server_config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&server_config).await {
        Ok(()) => {
            info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &ServerConfig) -> shell_relay::Result<()> {
    let interrupt = InterruptFlag::new();
    interrupt::install_sigint_handler(interrupt.clone())?;
    debug!("Signal handler set up");

    server::serve(config, interrupt).await
}
