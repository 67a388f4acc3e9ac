//! secretary entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use secretary_core::{TracingConfig, init_tracing};
use secretary_protocol::ProtocolError;
use secretary_server::cli::{Cli, Command};
use secretary_server::{ServerConfig, ServerResult, app, stdio};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing = if cli.debug {
        TracingConfig::debug()
    } else {
        TracingConfig::server()
    };
    if let Err(e) = init_tracing(tracing.with_format(cli.log_format.into())) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "secretary failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ServerResult<()> {
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = ServerConfig::load(cli.config.as_deref())?;
            let providers = app::providers(&config)?;
            let handler = app::handler(&config, providers, &cli.tools)?;
            stdio::serve_stdio(&handler).await
        }
        Command::Tools => {
            let catalogue = app::catalogue(&cli.tools);
            let json =
                serde_json::to_string_pretty(&catalogue).map_err(ProtocolError::from)?;
            println!("{json}");
            Ok(())
        }
        Command::CheckConfig { offline } => {
            let config = ServerConfig::load(cli.config.as_deref())?;
            println!("calendar_url: {}", config.calendar_url);
            println!("calendar_username: {}", config.calendar_username);
            println!("display_name: {}", config.display_name);
            println!("timezone: {}", config.timezone);
            if offline {
                return Ok(());
            }
            let names = app::check_connection(&config).await?;
            println!("calendars ({}):", names.len());
            for name in names {
                println!("  {name}");
            }
            Ok(())
        }
    }
}
