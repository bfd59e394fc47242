use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::status_cache::DeploymentType;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvisioningConfig {
    /// Recorded in the provisioning cache. Default: `DEV`.
    #[serde(default)]
    pub deployment: DeploymentType,

    /// Drop directory scanned for `*.modl` packages. Default: `/modules`.
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,

    /// Root of the backed-up configuration; device tables live under `db/devices`.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Tag providers that must exist after provisioning.
    #[serde(default = "default_tag_providers")]
    pub tag_providers: Vec<String>,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            deployment: DeploymentType::default(),
            modules_dir: default_modules_dir(),
            config_dir: default_config_dir(),
            tag_providers: default_tag_providers(),
        }
    }
}

impl ProvisioningConfig {
    pub fn device_backup_dir(&self) -> PathBuf {
        self.config_dir.join("db").join("devices")
    }
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("/modules")
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("/config")
}

fn default_tag_providers() -> Vec<String> {
    vec!["Public".to_string(), "Simulator".to_string()]
}
