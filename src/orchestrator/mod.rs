//! Top-level control loop.
//!
//! Three concurrent tasks share the managed gateway: a supervisor waiting for it to exit, a
//! commissioning task gated on the wizard state and a provisioning task gated on the running
//! state. The cached provisioning record is read once, before anything is launched.

mod process;
mod provisioner;
mod readiness;
mod volume;

pub use process::{GatewayProcess, ManagedProcess};
pub use provisioner::{ProvisionOutcome, Provisioner};
pub use readiness::{GatewayStatus, READY_STREAK, status, wait_until_ready};
pub use volume::{DataVolume, LinkedDataVolume};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::commissioning::CommissioningDriver;
use crate::config::Config;
use crate::db::ConfigDbHandle;
use crate::error::{ErrorKind, GwInitError};
use crate::health::{GatewayState, HealthMonitor, HealthOutcome};
use crate::provision::{Registrar, RegistrarSettings};
use crate::status_cache::StatusCache;

/// How a gated task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// The give-up state was seen before the target.
    GaveUp,
    TimedOut,
    Failed(ErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub exit_code: Option<i32>,
    pub commissioning: TaskOutcome,
    pub provisioning: TaskOutcome,
    pub provision_outcome: Option<ProvisionOutcome>,
}

pub struct Orchestrator {
    process: Arc<dyn ManagedProcess>,
    volume: Arc<dyn DataVolume>,
    health: HealthMonitor,
    commissioning: Arc<CommissioningDriver>,
    provisioner: Provisioner,
    commissioning_timeout: Duration,
    provisioning_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        cfg: &Config,
        client: reqwest::Client,
        db: ConfigDbHandle,
        process: Arc<dyn ManagedProcess>,
        volume: Arc<dyn DataVolume>,
    ) -> Result<Self, GwInitError> {
        let base_url = cfg.gateway.base_url()?;
        let health = HealthMonitor::new(client.clone(), &base_url, cfg.gateway.poll_interval())?;
        let commissioning =
            CommissioningDriver::new(client, &base_url, cfg.commissioning.clone())?;
        let registrar = Registrar::new(db, RegistrarSettings::from(cfg));
        let provisioner = Provisioner::new(
            registrar,
            StatusCache::new(cfg.gateway.cache_path()),
            cfg.provisioning.deployment,
        );

        Ok(Self {
            process,
            volume,
            health,
            commissioning: Arc::new(commissioning),
            provisioner,
            commissioning_timeout: cfg.gateway.commissioning_timeout(),
            provisioning_timeout: cfg.gateway.provisioning_timeout(),
        })
    }

    /// Runs until the managed process exits and both gated tasks have finished.
    ///
    /// Only volume preparation and launch failures are returned as errors; task failures are
    /// logged and reported in the [`RunReport`].
    pub async fn run(self) -> Result<RunReport, GwInitError> {
        let record = self.provisioner.cache().read_or_unknown().await;
        info!(
            deployment = ?record.deployment,
            status = ?record.status,
            "provisioning status"
        );

        self.volume.prepare().await?;
        self.process.start().await?;

        let supervisor: JoinHandle<Result<Option<i32>, GwInitError>> = {
            let process = self.process.clone();
            tokio::spawn(async move { process.wait().await })
        };

        let commissioning = {
            let health = self.health.clone();
            let driver = self.commissioning.clone();
            let timeout = self.commissioning_timeout;
            tokio::spawn(async move {
                let outcome = health
                    .await_state(
                        "commissioning",
                        &GatewayState::commissioning(),
                        Some(&GatewayState::running()),
                        timeout,
                    )
                    .await;
                match outcome {
                    HealthOutcome::Reached => match driver.commission().await {
                        Ok(()) => {
                            info!("Commissioning completed");
                            TaskOutcome::Completed
                        }
                        Err(e) => {
                            error!(error = %e, "Commissioning failed");
                            TaskOutcome::Failed(e.kind())
                        }
                    },
                    HealthOutcome::GaveUp => TaskOutcome::GaveUp,
                    HealthOutcome::TimedOut => TaskOutcome::TimedOut,
                }
            })
        };

        let provisioning = {
            let health = self.health.clone();
            let provisioner = self.provisioner.clone();
            let process = self.process.clone();
            let timeout = self.provisioning_timeout;
            tokio::spawn(async move {
                let outcome = health
                    .await_state("provisioning", &GatewayState::running(), None, timeout)
                    .await;
                match outcome {
                    HealthOutcome::Reached => {
                        match provisioner.provision(&record, process.as_ref()).await {
                            Ok(done) => (TaskOutcome::Completed, Some(done)),
                            Err(e) => {
                                error!(error = %e, "Provisioning failed");
                                (TaskOutcome::Failed(e.kind()), None)
                            }
                        }
                    }
                    HealthOutcome::GaveUp => (TaskOutcome::GaveUp, None),
                    HealthOutcome::TimedOut => (TaskOutcome::TimedOut, None),
                }
            })
        };

        let (exit, commissioning, provisioning) =
            tokio::join!(supervisor, commissioning, provisioning);

        let exit_code = match exit {
            Ok(Ok(code)) => code,
            Ok(Err(e)) => {
                error!(error = %e, "gateway supervision failed");
                None
            }
            Err(e) => {
                error!(error = %e, "gateway supervisor task panicked");
                None
            }
        };
        let commissioning = commissioning.unwrap_or_else(|e| {
            error!(error = %e, "commissioning task panicked");
            TaskOutcome::Failed(ErrorKind::Io)
        });
        let (provisioning, provision_outcome) = provisioning.unwrap_or_else(|e| {
            error!(error = %e, "provisioning task panicked");
            (TaskOutcome::Failed(ErrorKind::Io), None)
        });

        info!(
            exit_code = ?exit_code,
            commissioning = ?commissioning,
            provisioning = ?provisioning,
            "end of program"
        );
        Ok(RunReport {
            exit_code,
            commissioning,
            provisioning,
            provision_outcome,
        })
    }
}
