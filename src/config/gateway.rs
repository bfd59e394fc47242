use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::GwInitError;

/// Where the managed gateway lives and how to reach it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Gateway installation directory (required).
    /// Env: `IGNITION_INSTALL_LOCATION` or `GWINIT_GATEWAY__INSTALL_LOCATION`.
    #[serde(default)]
    pub install_location: PathBuf,

    /// Host the gateway HTTP surface is reached on. Default: `localhost`.
    #[serde(default = "default_host")]
    pub host: String,

    /// Gateway HTTP port. Default: `8088`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Service account that owns installed module files. Unset skips the chown.
    #[serde(default = "default_service_id")]
    pub service_uid: Option<u32>,

    #[serde(default = "default_service_id")]
    pub service_gid: Option<u32>,

    /// Persistent data volume the gateway `data/` directory is linked to.
    #[serde(default = "default_data_volume")]
    pub data_volume: PathBuf,

    /// Packaged install's var directory whose `data` entry is also linked to the volume.
    #[serde(default = "default_var_dir")]
    pub var_dir: PathBuf,

    /// Provisioning cache file, relative to the install location.
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,

    /// Embedded configuration database, relative to the install location.
    #[serde(default = "default_database_file")]
    pub database_file: PathBuf,

    /// Delay between two status probes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request timeout for calls to the gateway.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long to wait for the commissioning state.
    #[serde(default = "default_state_timeout_secs")]
    pub commissioning_timeout_secs: u64,

    /// How long to wait for the running state before provisioning.
    #[serde(default = "default_state_timeout_secs")]
    pub provisioning_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            install_location: PathBuf::new(),
            host: default_host(),
            port: default_port(),
            service_uid: default_service_id(),
            service_gid: default_service_id(),
            data_volume: default_data_volume(),
            var_dir: default_var_dir(),
            cache_file: default_cache_file(),
            database_file: default_database_file(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            commissioning_timeout_secs: default_state_timeout_secs(),
            provisioning_timeout_secs: default_state_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    pub fn install_dir(&self) -> &Path {
        self.install_location.as_path()
    }

    pub fn database_path(&self) -> PathBuf {
        self.install_location.join(&self.database_file)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.install_location.join(&self.cache_file)
    }

    pub fn module_install_dir(&self) -> PathBuf {
        self.install_location.join("user-lib").join("modules")
    }

    pub fn control_script(&self) -> PathBuf {
        self.install_location.join("gwcmd.sh")
    }

    pub fn base_url(&self) -> Result<Url, GwInitError> {
        Ok(Url::parse(&format!("http://{}:{}/", self.host, self.port))?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn commissioning_timeout(&self) -> Duration {
        Duration::from_secs(self.commissioning_timeout_secs)
    }

    pub fn provisioning_timeout(&self) -> Duration {
        Duration::from_secs(self.provisioning_timeout_secs)
    }

    /// Reads `gateway.version` from `lib/install-info.txt`, if present.
    pub fn read_version(&self) -> Option<String> {
        let info = std::fs::read_to_string(self.install_location.join("lib/install-info.txt"))
            .ok()?;
        parse_gateway_version(&info)
    }
}

fn parse_gateway_version(info: &str) -> Option<String> {
    info.lines()
        .filter(|line| line.contains("gateway.version"))
        .find_map(|line| line.split('=').nth(1))
        .map(|v| v.trim().to_string())
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8088
}

fn default_service_id() -> Option<u32> {
    Some(999)
}

fn default_data_volume() -> PathBuf {
    PathBuf::from("/data")
}

fn default_var_dir() -> PathBuf {
    PathBuf::from("/var/lib/ignition")
}

fn default_cache_file() -> PathBuf {
    PathBuf::from("data/bowery_provisioning.cache")
}

fn default_database_file() -> PathBuf {
    PathBuf::from("data/db/config.idb")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_state_timeout_secs() -> u64 {
    180
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_read_from_install_info() {
        let info = "build.date=20240101\ngateway.version=8.1.33\nedition=standard\n";
        assert_eq!(parse_gateway_version(info).as_deref(), Some("8.1.33"));
        assert_eq!(parse_gateway_version("edition=standard"), None);
    }

    #[test]
    fn base_url_uses_host_and_port() {
        let cfg = GatewayConfig {
            port: 9000,
            ..Default::default()
        };
        assert_eq!(cfg.base_url().unwrap().as_str(), "http://localhost:9000/");
    }
}
