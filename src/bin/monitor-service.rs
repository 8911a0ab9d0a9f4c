use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use vigil::runtime::{ConfigSource, build_ports, config_source, env_flag, init_tracing, redacted};
use vigil_application::{Scheduler, SchedulerHandle, TickReport};
use vigil_domain::VigilConfig;

#[derive(Parser)]
#[command(
    name = "monitor-service",
    version,
    about = "Watches a served model and retrains it on drift or degradation"
)]
struct Cli {
    /// Configuration file; defaults to VIGIL_CONFIG_PATH, ~/.vigil/config.yaml, ./vigil.yaml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitoring loop until SIGTERM/SIGINT.
    Run {
        /// Stop after this many ticks.
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Run a single tick and print its report.
    Once,
    /// Validate and print the effective configuration.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(env_flag(env::var("VIGIL_LOG_JSON").ok()))?;

    let source = match cli.config {
        Some(path) => ConfigSource::explicit(path),
        None => config_source(|key| env::var(key).ok()),
    };
    let config = VigilConfig::load(&source.path, source.required)
        .with_context(|| format!("invalid configuration ({})", source.path.display()))?;
    for warning in config.warnings() {
        warn!("{warning}");
    }

    match cli.command.unwrap_or(Command::Run { cycles: None }) {
        Command::CheckConfig => {
            print!("{}", serde_yaml::to_string(&redacted(&config))?);
            info!(path = %source.path.display(), "Configuration is valid");
        }
        Command::Once => {
            let (mut scheduler, _handle) = Scheduler::from_config(&config, build_ports(&config)?);
            print_report(&scheduler.tick().await);
        }
        Command::Run { cycles } => {
            let (scheduler, handle) = Scheduler::from_config(&config, build_ports(&config)?);
            let signals = tokio::spawn(forward_signals(handle.clone()));
            let ticks = scheduler.with_max_ticks(cycles).run().await;
            signals.abort();
            drop(handle);
            info!(ticks, "Monitor service exited");
        }
    }
    Ok(())
}

/// SIGTERM/SIGINT stop the loop after the current tick; SIGUSR1 requests a
/// manual retrain.
async fn forward_signals(handle: SchedulerHandle) {
    if let Err(err) = listen(&handle).await {
        error!(error = %err, "Signal handling failed, shutting down");
        handle.shutdown();
    }
}

#[cfg(unix)]
async fn listen(handle: &SchedulerHandle) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).context("register SIGTERM")?;
    let mut interrupt = signal(SignalKind::interrupt()).context("register SIGINT")?;
    let mut user1 = signal(SignalKind::user_defined1()).context("register SIGUSR1")?;
    loop {
        tokio::select! {
            _ = terminate.recv() => break,
            _ = interrupt.recv() => break,
            _ = user1.recv() => {
                info!("SIGUSR1 received, requesting manual retrain");
                handle.request_retrain();
            }
        }
    }
    info!("Shutdown requested, finishing current tick");
    handle.shutdown();
    Ok(())
}

#[cfg(not(unix))]
async fn listen(handle: &SchedulerHandle) -> Result<()> {
    tokio::signal::ctrl_c().await.context("listen for ctrl-c")?;
    info!("Shutdown requested, finishing current tick");
    handle.shutdown();
    Ok(())
}

fn print_report(report: &TickReport) {
    let signal = &report.signal;
    println!("tick:             {}", report.tick);
    println!("verdict:          {}", report.verdict);
    println!("api_healthy:      {}", signal.api_healthy);
    println!("rolling_accuracy: {:.4}", signal.rolling_accuracy);
    println!("drift_score:      {:.4}", signal.drift_score);
    println!("sample_count:     {}", signal.sample_count);
    match &report.record {
        Some(record) => println!(
            "retrain:          {} ({}) run {}",
            record.outcome.as_str(),
            record.trigger_reason,
            record.run_id
        ),
        None => println!("retrain:          none"),
    }
    for (alert, outcome) in &report.alerts {
        println!(
            "alert:            [{}/{}] {} -> {outcome:?}",
            alert.category, alert.severity, alert.title
        );
    }
}
