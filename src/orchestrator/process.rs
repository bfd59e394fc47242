//! The managed gateway process.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::error::GwInitError;

/// Lifecycle of the supervised gateway: launch once, wait for exit, request restarts.
#[async_trait]
pub trait ManagedProcess: Send + Sync {
    async fn start(&self) -> Result<(), GwInitError>;

    /// Resolves when the process exits, with its exit code if it had one.
    async fn wait(&self) -> Result<Option<i32>, GwInitError>;

    async fn restart(&self) -> Result<(), GwInitError>;
}

const GATEWAY_BINARY: &str = "ignition-gateway";

const GATEWAY_ARGS: &[&str] = &[
    "data/ignition.conf",
    "wrapper.syslog.ident=Ignition-Gateway",
    "wrapper.pidfile=./Ignition-Gateway.pid",
    "wrapper.name=Ignition-Gateway",
    "wrapper.displayname=Ignition-Gateway",
    "wrapper.statusfile=./Ignition-Gateway.status",
    "wrapper.java.statusfile=./Ignition-Gateway.java.status",
    "wrapper.console.loglevel=NONE",
    "wrapper.logfile.format=PTM",
    "wrapper.logfile.rollmode=NONE",
];

/// The gateway service wrapper, run in the foreground from the install directory.
pub struct GatewayProcess {
    install_dir: PathBuf,
    control_script: PathBuf,
    child: Mutex<Option<Child>>,
}

impl GatewayProcess {
    pub fn new(cfg: &GatewayConfig) -> Self {
        Self {
            install_dir: cfg.install_dir().to_path_buf(),
            control_script: cfg.control_script(),
            child: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ManagedProcess for GatewayProcess {
    async fn start(&self) -> Result<(), GwInitError> {
        let mut guard = self.child.lock().await;
        if guard.is_some() {
            return Err(GwInitError::Process("gateway already started".to_string()));
        }
        let child = Command::new(self.install_dir.join(GATEWAY_BINARY))
            .args(GATEWAY_ARGS)
            .current_dir(&self.install_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        info!(pid = ?child.id(), dir = %self.install_dir.display(), "gateway started");
        *guard = Some(child);
        Ok(())
    }

    async fn wait(&self) -> Result<Option<i32>, GwInitError> {
        let mut child = self
            .child
            .lock()
            .await
            .take()
            .ok_or_else(|| GwInitError::Process("gateway not started".to_string()))?;
        let status = child.wait().await?;
        warn!(%status, "gateway exited");
        Ok(status.code())
    }

    async fn restart(&self) -> Result<(), GwInitError> {
        info!(script = %self.control_script.display(), "restarting gateway");
        let status = Command::new(&self.control_script)
            .arg("-r")
            .current_dir(&self.install_dir)
            .stdin(Stdio::null())
            .status()
            .await?;
        if !status.success() {
            return Err(GwInitError::Process(format!(
                "{} -r exited with {status}",
                self.control_script.display()
            )));
        }
        Ok(())
    }
}
