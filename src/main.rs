//! sync-tray Agent
//!
//! Mirrors the run state of a remote sync job and relays its notifications.
//! Talks to the job over a request/reply control socket and a pub/sub
//! notification socket.

mod config;
mod data;
mod logging;
mod session;
mod transport;
mod ui;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use config::Config;
use data::{ControlCommand, RunState};
use session::{
    create_session_channels, ControlClient, NotificationListener, SessionCommand,
    SessionController,
};
use transport::{ControlTransport, ZmqTransport};
use ui::{LogSurface, TrayShell};

/// Main entry point, runs the tray shell on the main thread
fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // Initialize logging (guard flushes the file writer on exit)
    let _log_guard = logging::init_logging()?;

    info!("sync-tray Agent starting...");

    // Load configuration
    let mut config = match config_arg(&args)? {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };
    info!("Configuration loaded from {:?}", config.config_path()?);
    config.resolve_endpoints();

    // Create tokio runtime for async operations
    let runtime = Arc::new(tokio::runtime::Runtime::new()?);
    let transport = Arc::new(ZmqTransport::new());

    if args.iter().any(|a| a == "--status") {
        let state = runtime.block_on(query_state(&config, transport))?;
        println!("{}", state);
        return Ok(());
    }

    if args.iter().any(|a| a == "--toggle") {
        let state = runtime.block_on(toggle_once(&config, transport))?;
        println!("{}", state);
        return Ok(());
    }

    // Create session channels
    let (cmd_tx, cmd_rx, status_tx, status_rx) = create_session_channels();

    // Subscribe to notifications (the transport keeps retrying if nobody publishes yet)
    let listener = match runtime.block_on(NotificationListener::start(
        transport.as_ref(),
        &config.endpoints.notifications,
        &config.endpoints.topic,
    )) {
        Ok(listener) => Some(listener),
        Err(e) => {
            warn!("Notifications disabled: {}", e);
            None
        }
    };

    // Create session controller (issues the initial status query)
    let surface = LogSurface::new();
    let controller = {
        let _guard = runtime.enter();
        SessionController::new(
            &config,
            transport.clone(),
            Box::new(surface.clone()),
            status_tx,
        )
    };

    // Run the controller on its own thread
    let session_runtime = runtime.clone();
    let session_handle = std::thread::spawn(move || {
        session_runtime.block_on(controller.run(cmd_rx, listener));
    });

    // Set up Ctrl+C handler that sends shutdown command
    let ctrl_c_tx = cmd_tx.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        if let Err(e) = ctrl_c_tx.try_send(SessionCommand::Shutdown) {
            error!("Failed to send shutdown command: {}", e);
        }
    })?;

    // Run tray shell on main thread until the controller stops
    info!("Starting tray shell on main thread");
    let tray = TrayShell::new(cmd_tx.clone(), status_rx, surface);
    if let Err(e) = runtime.block_on(tray.run()) {
        error!("Tray error: {}", e);
        // Stop the controller too, or the join below never returns
        let _ = cmd_tx.try_send(SessionCommand::Shutdown);
    }

    // Wait for controller thread to finish
    if session_handle.join().is_err() {
        error!("Session controller thread panicked");
    }

    info!("Shutdown complete");
    Ok(())
}

/// `-c <path>` / `--config <path>`
fn config_arg(args: &[String]) -> Result<Option<PathBuf>> {
    let Some(index) = args.iter().position(|a| a == "--config" || a == "-c") else {
        return Ok(None);
    };

    match args.get(index + 1) {
        Some(path) if !path.starts_with('-') => Ok(Some(PathBuf::from(path))),
        _ => bail!("{} requires a path", args[index]),
    }
}

fn control_client(config: &Config, transport: Arc<dyn ControlTransport>) -> ControlClient {
    ControlClient::new(
        transport,
        config.endpoints.control.clone(),
        config.control.request_timeout(),
    )
}

/// One-shot STATUS query
async fn query_state(config: &Config, transport: Arc<dyn ControlTransport>) -> Result<RunState> {
    let reply = control_client(config, transport)
        .send(ControlCommand::Status)
        .await
        .with_context(|| format!("Status query to {} failed", config.endpoints.control))?;
    Ok(reply.run_state())
}

/// One-shot toggle: query the state, then send the command that flips it
async fn toggle_once(config: &Config, transport: Arc<dyn ControlTransport>) -> Result<RunState> {
    let state = query_state(config, transport.clone()).await?;
    let command = RunState::toggle_command(Some(state));
    info!("Remote job is {}, sending {}", state, command);

    let reply = control_client(config, transport)
        .send(command)
        .await
        .with_context(|| format!("{} request to {} failed", command, config.endpoints.control))?;
    Ok(reply.run_state())
}

fn print_help() {
    println!("sync-tray Agent - run/pause control and notifications for a sync job");
    println!();
    println!("USAGE:");
    println!("    sync-tray-agent [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help            Print this help message");
    println!("    -c, --config <PATH>   Use this config file instead of the default");
    println!("        --status          Print the job state and exit");
    println!("        --toggle          Start or pause the job, print the new state and exit");
    println!();
    println!("SIGNALS (unix):");
    println!("    SIGUSR1               Toggle the job");
    println!("    SIGUSR2               Refresh the job state");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG              Set log level (e.g., debug, info, warn)");
    println!("    SYNC_TRAY_LOG_PATH    Override the log directory");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::ScriptedControl;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_config_arg() {
        assert_eq!(config_arg(&args(&["agent"])).unwrap(), None);
        assert_eq!(
            config_arg(&args(&["agent", "-c", "/tmp/x.toml"])).unwrap(),
            Some(PathBuf::from("/tmp/x.toml"))
        );
        assert!(config_arg(&args(&["agent", "--config"])).is_err());
        assert!(config_arg(&args(&["agent", "--config", "--status"])).is_err());
    }

    #[tokio::test]
    async fn test_toggle_once_flips_confirmed_state() {
        let transport = ScriptedControl::new(|token| {
            let frame = if token == "STATUS" { "running" } else { "paused" };
            Some(Ok(vec![frame.as_bytes().to_vec()]))
        });

        let state = toggle_once(&Config::default(), Arc::new(transport.clone()))
            .await
            .unwrap();

        assert_eq!(state, RunState::Paused);
        assert_eq!(transport.sent_tokens(), vec!["STATUS", "PAUSE"]);
    }
}
