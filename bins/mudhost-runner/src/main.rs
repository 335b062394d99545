use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use mudhost_runfiles::{FileIntentStore, PidRegistry, RunPaths};
use mudhost_supervisor::{
    build_launch_plan, OutputTarget, RunnerConfig, SkipReason, StartOptions, Supervisor,
};

/// Mudhost runner - supervises the game Server and Portal processes.
///
/// Normally invoked by the mudhost launcher rather than directly. It
/// starts both processes and relaunches the Server whenever it stops
/// cleanly with its restart flag set, which is how live reload works.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Launch and supervise the Server and Portal processes
    Start(StartArgs),
}

#[derive(Args, Debug)]
struct StartArgs {
    /// Do not start the Server process
    #[arg(long)]
    noserver: bool,

    /// Do not start the Portal process
    #[arg(long)]
    noportal: bool,

    /// Output Server log to the terminal instead of its log file
    #[arg(long)]
    iserver: bool,

    /// Output Portal log to the terminal; does not make the Portal a
    /// daemon
    #[arg(long)]
    iportal: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(cli.debug)?;

    let config = match &cli.config {
        Some(path) => RunnerConfig::load_from_file(path)?,
        None => RunnerConfig::default(),
    };

    match cli.command {
        Command::Start(args) => {
            let options = StartOptions {
                noserver: args.noserver,
                noportal: args.noportal,
                iserver: args.iserver,
                iportal: args.iportal,
            };
            run_start(config, options).await
        }
    }
}

async fn run_start(config: RunnerConfig, options: StartOptions) -> Result<()> {
    let paths = RunPaths::new(&config.run_directory);
    let registry = PidRegistry::new(paths.clone());
    let intent_store = Arc::new(FileIntentStore::new(paths));

    let plan = build_launch_plan(&config, options, &registry).await;
    for (name, reason) in &plan.skipped {
        if *reason == SkipReason::Disabled {
            info!("{} disabled; not started.", name.display_name());
        }
        // Already-running skips were reported during planning.
    }

    let mut supervisor = Supervisor::new(intent_store, registry);

    for spec in plan.detached {
        info!(
            "Starting {} in daemon mode (output to {}).",
            spec.name.display_name(),
            spec.log_file.display()
        );
        if let Err(e) = supervisor.start_detached(spec).await {
            error!("{}", e);
        }
    }

    for spec in plan.monitored {
        match spec.output {
            OutputTarget::Terminal => info!(
                "Starting {} (output to the terminal).",
                spec.name.display_name()
            ),
            OutputTarget::LogFile => info!(
                "Starting {} (output to {}).",
                spec.name.display_name(),
                spec.log_file.display()
            ),
        }
        supervisor.start_monitored(spec).await;
    }

    // A shutdown signal kills the monitored processes, which drains the
    // loop through the ordinary completion path.
    let cancel = supervisor.cancel_handle();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Shutdown signal received; stopping monitored processes");
        cancel.cancel();
    });

    let report = supervisor.run().await;
    for outcome in &report.outcomes {
        info!(
            "{} finished with exit code {} after {} relaunch(es)",
            outcome.name.display_name(),
            outcome.exit_code,
            outcome.relaunch_count
        );
    }

    Ok(())
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();

    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Could not install SIGTERM handler: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Could not wait for Ctrl+C: {}", e);
                }
                info!("Received interrupt signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C signal");
    }
}
