use mxd_kernel::config::load_config;
use mxd_kernel::registration::{generate_registration, load_registration};
use mxd_logger::Logger;
use mxd_server::cli::{Cli, Command, Invocation};
use mxd_server::{
    BridgeContext, DiscordComponents, Orchestrator, fallback_logger, shutdown_signal,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

const NAME: &str = env!("CARGO_PKG_NAME");

#[mxd_runtime::main(service)]
async fn main() -> anyhow::Result<ExitCode> {
    let command = match Cli::invocation(std::env::args_os()) {
        Invocation::Run(command) => command,
        Invocation::Exit => return Ok(ExitCode::SUCCESS),
    };

    Ok(match command {
        Command::GenerateRegistration { url, file } => generate(&url, &file),
        Command::Serve { config, port, registration } => serve(&config, port, &registration).await,
    })
}

fn generate(url: &str, file: &Path) -> ExitCode {
    let _log = fallback_logger(NAME);

    match generate_registration(url, file) {
        Ok(registration) => {
            info!(
                path = %file.display(),
                sender = %registration.sender_localpart,
                "Registration generated; add it to the homeserver's app service config files"
            );
            ExitCode::SUCCESS
        },
        Err(e) => {
            error!("Failed to generate registration: {e}");
            ExitCode::FAILURE
        },
    }
}

async fn serve(config_path: &Path, port: Option<u16>, registration_path: &Path) -> ExitCode {
    let config = match load_config(config_path, port) {
        Ok(config) => config,
        Err(e) => {
            let _log = fallback_logger(NAME);
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _log = match Logger::from_config(NAME, &config.config.logging) {
        Ok(log) => log,
        Err(e) => {
            let _log = fallback_logger(NAME);
            error!("Invalid logging configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let registration = match load_registration(registration_path) {
        Ok(registration) => registration,
        Err(e) => {
            error!("Failed to load registration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let orchestrator = Orchestrator::new(DiscordComponents, Arc::new(BridgeContext::new()));
    let running = match orchestrator.run(config, registration).await {
        Ok(running) => running,
        Err(e) => return ExitCode::from(e.exit_code()),
    };

    if let Err(e) = shutdown_signal().await {
        error!("Error while waiting for shutdown signal: {e}");
    }
    info!("Shutdown signal received, stopping bridge...");
    running.shutdown();
    ExitCode::SUCCESS
}
