use clap::{Parser, Subcommand, ValueEnum};
use gwinit::backup::ConfigBackup;
use gwinit::config::Config;
use gwinit::health::HealthMonitor;
use gwinit::orchestrator::{
    self, GatewayProcess, LinkedDataVolume, Orchestrator, READY_STREAK, TaskOutcome,
};
use gwinit::status_cache::StatusCache;
use gwinit::{GwInitError, db};
use mimalloc::MiMalloc;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser)]
#[command(name = "gwinit", version, about = "Gateway provisioning and commissioning")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Launch the gateway and commission / provision it (default).
    Run,
    /// Dump configuration tables to SQL scripts.
    Backup {
        #[arg(value_enum)]
        target: ConfigSet,
    },
    /// Replay previously dumped configuration tables.
    Restore {
        #[arg(value_enum)]
        target: ConfigSet,
    },
    /// Print the cached provisioning status and one gateway status probe.
    Status,
    /// Block until the gateway is provisioned and steadily running.
    Wait {
        /// Give up after this many seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConfigSet {
    Devices,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("gwinit: {e}");
            return ExitCode::FAILURE;
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let version = cfg.gateway.read_version();
    info!(
        install_location = %cfg.gateway.install_location.display(),
        version = %version.as_deref().unwrap_or("<unknown>"),
        port = cfg.gateway.port,
        deployment = ?cfg.provisioning.deployment,
        loglevel = %cfg.basic.loglevel
    );

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&cfg).await,
        Command::Backup {
            target: ConfigSet::Devices,
        } => backup_devices(&cfg).await,
        Command::Restore {
            target: ConfigSet::Devices,
        } => restore_devices(&cfg).await,
        Command::Status => print_status(&cfg).await,
        Command::Wait { timeout_secs } => wait(&cfg, timeout_secs).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(kind = ?e.kind(), error = %e, "gwinit failed");
            ExitCode::FAILURE
        }
    }
}

fn http_client(cfg: &Config) -> Result<reqwest::Client, GwInitError> {
    Ok(reqwest::Client::builder()
        .timeout(cfg.gateway.request_timeout())
        .build()?)
}

fn health_monitor(cfg: &Config) -> Result<HealthMonitor, GwInitError> {
    HealthMonitor::new(
        http_client(cfg)?,
        &cfg.gateway.base_url()?,
        cfg.gateway.poll_interval(),
    )
}

async fn run(cfg: &Config) -> Result<ExitCode, GwInitError> {
    let db = db::spawn(&cfg.gateway.database_path()).await?;
    let orchestrator = Orchestrator::new(
        cfg,
        http_client(cfg)?,
        db.clone(),
        Arc::new(GatewayProcess::new(&cfg.gateway)),
        Arc::new(LinkedDataVolume::new(&cfg.gateway)),
    )?;

    let code = tokio::select! {
        report = orchestrator.run() => {
            let report = report?;
            match (&report.commissioning, &report.provisioning) {
                (TaskOutcome::Failed(_), _) | (_, TaskOutcome::Failed(_)) => ExitCode::FAILURE,
                _ => ExitCode::SUCCESS,
            }
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received, stopping gateway");
            ExitCode::SUCCESS
        }
    };
    db.stop();
    Ok(code)
}

async fn backup_devices(cfg: &Config) -> Result<ExitCode, GwInitError> {
    let db = db::spawn(&cfg.gateway.database_path()).await?;
    let dir = cfg.provisioning.device_backup_dir();
    info!(dir = %dir.display(), "Start backup device configuration");
    let result = ConfigBackup::new(db.clone()).backup_device_configs(&dir).await;
    db.stop();
    result.map(|_| ExitCode::SUCCESS)
}

async fn restore_devices(cfg: &Config) -> Result<ExitCode, GwInitError> {
    let db = db::spawn(&cfg.gateway.database_path()).await?;
    let dir = cfg.provisioning.device_backup_dir();
    info!(dir = %dir.display(), "Start restore device configuration");
    let result = ConfigBackup::new(db.clone()).restore_dir(&dir).await;
    db.stop();
    result.map(|_| ExitCode::SUCCESS)
}

async fn print_status(cfg: &Config) -> Result<ExitCode, GwInitError> {
    let health = health_monitor(cfg)?;
    let cache = StatusCache::new(cfg.gateway.cache_path());
    let status = orchestrator::status(&health, &cache).await;

    println!("Provisioning status: {}", status.provisioning.status);
    match status.gateway {
        Some(state) => println!("     Gateway status: {state}"),
        None => println!("     Gateway status: None (details:None)"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn wait(cfg: &Config, timeout_secs: Option<u64>) -> Result<ExitCode, GwInitError> {
    let health = health_monitor(cfg)?;
    let cache = StatusCache::new(cfg.gateway.cache_path());
    let ready = orchestrator::wait_until_ready(
        &health,
        &cache,
        cfg.gateway.poll_interval(),
        READY_STREAK,
    );

    match timeout_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), ready).await {
            Ok(()) => Ok(ExitCode::SUCCESS),
            Err(_) => {
                warn!(timeout_secs = secs, "gateway not ready before timeout");
                Ok(ExitCode::FAILURE)
            }
        },
        None => {
            ready.await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
