//! Dialer binary: an operator console for placing and narrating calls.
//!
//! Reads commands from stdin, prints call notifications and state changes,
//! and tears the session down on `quit`, end of input, SIGINT, or SIGTERM.

use dialer_cli::config::{self, LoggingConfig, DEFAULT_CONFIG_PATH};
use dialer_cli::console::{self, ConsoleCommand};
use dialer_cli::{build_collaborators, CliError};
use dialer_session::{Coordinator, SessionHandle};
use std::process::ExitCode;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("DIALER_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so they do not interleave with console output.
    if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path
        .as_deref()
        .unwrap_or(DEFAULT_CONFIG_PATH);

    let config = match config::load_config(Some(selected_config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.logging);

    tracing::info!(
        source = config_source,
        path = selected_config_path,
        "resolved startup configuration path"
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "dialer stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: config::DialerConfig) -> Result<(), CliError> {
    let collaborators = build_collaborators(&config)?;
    let (coordinator, handle) = Coordinator::new(collaborators);
    let printer = tokio::spawn(print_updates(handle.clone()));
    let session = coordinator.spawn();

    tracing::info!(api = %config.api.base_url, "dialer started");
    println!("{}", console::HELP);

    let result = tokio::select! {
        result = read_commands(&handle) => result,
        () = shutdown_signal() => Ok(()),
    };

    // Teardown resets the state; the operator has no use for that line.
    printer.abort();
    handle.teardown().await?;
    if let Err(e) = session.await {
        tracing::warn!(error = %e, "coordinator task ended abnormally");
    }
    tracing::info!("dialer shut down");
    result
}

/// Feeds stdin lines to the session until `quit` or end of input.
async fn read_commands(handle: &SessionHandle) -> Result<(), CliError> {
    let mut lines = console::spawn_line_reader(std::io::BufReader::new(std::io::stdin()))?;
    while let Some(line) = lines.recv().await {
        let line = line?;
        let command = match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}\n{}", console::HELP);
                continue;
            }
        };
        if command == ConsoleCommand::Quit {
            break;
        }
        if let Some(output) = console::execute(handle, command).await {
            println!("{output}");
        }
    }
    Ok(())
}

/// Prints notifications and state changes as they happen.
async fn print_updates(handle: SessionHandle) {
    let mut notifications = handle.subscribe();
    let mut state = handle.watch_state();
    loop {
        tokio::select! {
            received = notifications.recv() => match received {
                Ok(notification) => println!("{}", console::describe(&notification)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "console fell behind on notifications");
                }
                Err(RecvError::Closed) => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                println!("{}", console::status_line(current));
            }
        }
    }
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, tearing down"); }
        () = terminate => { tracing::info!("received SIGTERM, tearing down"); }
    }
}
