//! relay-client binary entry point.

use std::process::ExitCode;

use shell_relay::cli;
use shell_relay::config::Config;
use shell_relay::{
    interrupt, logging, resolver, Client, ClientConfig, ClientExit, EditorInput, InputReader,
    InterruptFlag, TerminalGuard,
};
use tracing::{debug, error};

#[tokio::main]
async fn main() -> ExitCode {
    println!("Network Layer Started");

    let args = match cli::parse_client_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Usage: relay-client [--debug] <HOST>");
            return ExitCode::FAILURE;
        }
    };

    if args.help {
        cli::print_client_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version("relay-client");
        return ExitCode::SUCCESS;
    }

    let config = match Config::load_for_client(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(args.debug, Some(config.log_filter()));
    debug!("Argument parsing complete");

    // The parser guarantees a host once help and version are handled.
    let Some(host) = args.host.as_deref() else {
        eprintln!("Error: no hostname provided");
        return ExitCode::FAILURE;
    };

    match run(config.to_client_config(host)).await {
        Ok(exit) => {
            debug!("Client finished: {:?}", exit);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ClientConfig) -> shell_relay::Result<ClientExit> {
    let addr = resolver::resolve(&config.host, config.port).await?;

    let mut client = Client::connect(addr, std::io::stdout())
        .await?
        .with_prompt(config.prompt);
    println!("Connected to {}!", addr);
    println!("Enter 'quit' to exit.");

    let interrupt = InterruptFlag::new();
    interrupt::install_sigint_handler(interrupt.clone())?;
    debug!("Signal handler set up");

    let history_file = config.history_file;
    let terminal = TerminalGuard::capture();
    let mut input = InputReader::spawn(move || EditorInput::new(history_file)).await?;

    let result = client.run(&mut input, &interrupt).await;
    input.close().await;
    terminal.restore();
    result
}
