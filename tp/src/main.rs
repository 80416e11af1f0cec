//! Tripdaemon - CLI entry point
//!
//! Dispatches CLI subcommands: `serve` runs the daemon in the
//! foreground; the rest talk to a running daemon over IPC.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tripdaemon::cli::{Cli, Command, OutputFormat};
use tripdaemon::config::Config;
use tripdaemon::domain::{SessionStatus, SessionView};
use tripdaemon::ipc::{self, PlannerClient};
use tripdaemon::normalizer::RawTripRequest;
use tripdaemon::orchestrator::PlanManager;
use tripdaemon::service::PlannerService;
use tripdaemon::stages::ProviderSet;
use tripdaemon::state::SessionStore;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            other => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    Ok(())
}

fn socket_path(config: &Config) -> PathBuf {
    config
        .ipc
        .socket_path
        .clone()
        .unwrap_or_else(ipc::default_socket_path)
}

fn client(config: &Config) -> PlannerClient {
    PlannerClient::with_socket_path(socket_path(config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref())
        .context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Serve => cmd_serve(&config).await,
        Command::Submit { file, wait } => cmd_submit(&config, &file, wait).await,
        Command::Status { session_id, format } => cmd_status(&config, session_id, format).await,
        Command::Metrics { format } => cmd_metrics(&config, format).await,
        Command::Ping => cmd_ping(&config).await,
        Command::Stop => cmd_stop(&config).await,
    }
}

/// Run the daemon in the foreground
async fn cmd_serve(config: &Config) -> Result<()> {
    info!("tripdaemon starting");

    let store = SessionStore::new();
    let providers = ProviderSet::from_config(&config.providers)
        .map_err(|e| eyre::eyre!("Failed to build stage providers: {e}"))?;

    let (manager, orchestrator) =
        PlanManager::new(config.orchestrator.clone(), store.clone(), providers);
    let service = PlannerService::new(store, orchestrator);

    let path = socket_path(config);
    let (listener, path) = ipc::create_listener_at(&path)?;
    info!(socket = %path.display(), "IPC socket listening");
    println!("tripdaemon listening on {}", path.display());

    let (manager_shutdown_tx, manager_shutdown_rx) = mpsc::channel::<()>(1);
    let (serve_shutdown_tx, serve_shutdown_rx) = mpsc::channel::<()>(1);

    let manager_handle = tokio::spawn(manager.run(manager_shutdown_rx));
    let mut serve_handle = tokio::spawn(ipc::serve(listener, service, serve_shutdown_rx));

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("SIGINT received");
                let _ = serve_shutdown_tx.send(()).await;
            }
            _ = sigterm.recv() => {
                warn!("SIGTERM received");
                let _ = serve_shutdown_tx.send(()).await;
            }
            _ = &mut serve_handle => {
                debug!("cmd_serve: IPC serve loop ended");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                let _ = serve_shutdown_tx.send(()).await;
            }
            _ = &mut serve_handle => {}
        }
    }

    if !serve_handle.is_finished() {
        let _ = serve_handle.await;
    }

    info!("tripdaemon shutting down");
    let _ = manager_shutdown_tx.send(()).await;
    let _ = manager_handle.await;

    ipc::cleanup_socket(&path);
    info!("tripdaemon stopped");
    Ok(())
}

/// Submit a trip request, optionally polling it to a terminal state
async fn cmd_submit(config: &Config, file: &Path, wait: bool) -> Result<()> {
    let content = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .context(format!("Failed to read request file {}", file.display()))?
    };

    let request: RawTripRequest =
        serde_json::from_str(&content).context("Request file is not valid JSON")?;

    let client = client(config);
    let receipt = client.submit(&request).await?;
    println!("{} session {}", "accepted".green(), receipt.session_id);

    if !wait {
        return Ok(());
    }

    let mut last_stage = None;
    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let view = client.status(receipt.session_id).await?;

        if view.current_stage != last_stage
            && let Some(stage) = view.current_stage
        {
            println!("  running: {stage}");
            last_stage = view.current_stage;
        }

        match view.status {
            SessionStatus::Completed => {
                let Some(plan) = view.trip_plan else {
                    return Err(eyre::eyre!("Completed session carried no plan"));
                };
                println!(
                    "{}: {} days in {}, total cost ${:.2}, ${:.2} remaining",
                    "completed".green(),
                    plan.duration,
                    plan.spec.destination,
                    plan.total_cost,
                    plan.budget_remaining,
                );
                return Ok(());
            }
            SessionStatus::Failed => {
                if let Some(error) = view.error {
                    eprintln!("{}: {} ({})", "failed".red(), error.message, error.kind);
                } else {
                    eprintln!("{}", "failed".red());
                }
                std::process::exit(1);
            }
            SessionStatus::Queued | SessionStatus::Running => {}
        }
    }
}

fn print_view_text(view: &SessionView) {
    let status = match view.status {
        SessionStatus::Queued => "queued".yellow(),
        SessionStatus::Running => "running".cyan(),
        SessionStatus::Completed => "completed".green(),
        SessionStatus::Failed => "failed".red(),
    };
    println!("Session {}", view.session_id);
    println!("Status:  {status}");

    if let Some(stage) = view.current_stage {
        println!("Stage:   {stage}");
    }
    if let Some(results) = &view.stage_results {
        let stages: Vec<&str> = results.iter().map(|r| r.stage.as_str()).collect();
        println!("Done:    {}", stages.join(", "));
    }
    if let Some(plan) = &view.trip_plan {
        println!(
            "Plan:    {} days in {}, total cost ${:.2}, ${:.2} remaining",
            plan.duration, plan.spec.destination, plan.total_cost, plan.budget_remaining
        );
    }
    if let Some(error) = &view.error {
        println!("Error:   {} ({})", error.message, error.kind);
    }
}

/// Show a session's status
async fn cmd_status(config: &Config, session_id: Uuid, format: OutputFormat) -> Result<()> {
    let view = client(config).status(session_id).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Text => print_view_text(&view),
    }
    Ok(())
}

/// Show daemon metrics
async fn cmd_metrics(config: &Config, format: OutputFormat) -> Result<()> {
    let metrics = client(config).metrics().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&metrics)?),
        OutputFormat::Text => {
            println!("Tripdaemon Metrics");
            println!("------------------");
            println!("Total sessions: {}", metrics.total_sessions);
            println!("  Queued:    {}", metrics.queued);
            println!("  Running:   {}", metrics.running);
            println!("  Completed: {}", metrics.completed);
            println!("  Failed:    {}", metrics.failed);
        }
    }
    Ok(())
}

/// Ping a running daemon
async fn cmd_ping(config: &Config) -> Result<()> {
    let client = client(config);
    if !client.socket_exists() {
        println!("tripdaemon is not running (no socket)");
        return Ok(());
    }

    match client.ping().await {
        Ok(version) => {
            println!("Daemon is alive and responsive");
            println!("Version: {version}");
        }
        Err(e) => {
            println!("Daemon socket exists but is not responding");
            println!("Error: {e}");
        }
    }
    Ok(())
}

/// Stop a running daemon
async fn cmd_stop(config: &Config) -> Result<()> {
    let client = client(config);
    if !client.socket_exists() {
        println!("tripdaemon is not running (no socket)");
        return Ok(());
    }

    client.shutdown().await?;
    println!("tripdaemon stopped");
    Ok(())
}
