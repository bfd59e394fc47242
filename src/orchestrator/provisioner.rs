use tracing::{error, info};

use super::process::ManagedProcess;
use crate::error::GwInitError;
use crate::provision::Registrar;
use crate::status_cache::{DeploymentType, ProvisionRecord, StatusCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// First boot: everything registered, cache advanced, restart requested.
    Provisioned,
    /// Already provisioned: only module packages were re-applied.
    ModulesRefreshed,
}

/// One provisioning pass, gated on the cached status.
#[derive(Clone)]
pub struct Provisioner {
    registrar: Registrar,
    cache: StatusCache,
    deployment: DeploymentType,
}

impl Provisioner {
    pub fn new(registrar: Registrar, cache: StatusCache, deployment: DeploymentType) -> Self {
        Self {
            registrar,
            cache,
            deployment,
        }
    }

    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    /// Modules are always re-applied so new packages dropped in after first boot get
    /// installed. Devices, tag providers, the cache write and the restart happen only while
    /// `record` is not yet PROVISIONED. Any failure leaves the cache untouched.
    pub async fn provision(
        &self,
        record: &ProvisionRecord,
        process: &dyn ManagedProcess,
    ) -> Result<ProvisionOutcome, GwInitError> {
        self.registrar.register_modules().await?;
        if record.is_provisioned() {
            info!(deployment = ?record.deployment, "already provisioned, modules refreshed");
            return Ok(ProvisionOutcome::ModulesRefreshed);
        }

        self.registrar.register_devices().await?;
        self.registrar.register_tag_providers().await?;

        self.cache.mark_provisioned(self.deployment).await?;
        info!(deployment = ?self.deployment, "Provisioning completed");

        if let Err(e) = process.restart().await {
            error!(error = %e, "gateway restart failed");
            return Err(e);
        }
        Ok(ProvisionOutcome::Provisioned)
    }
}
