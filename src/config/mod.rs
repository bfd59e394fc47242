mod basic;
mod commissioning;
mod gateway;
mod provisioning;

pub use basic::BasicConfig;
pub use commissioning::CommissioningConfig;
pub use gateway::GatewayConfig;
pub use provisioning::ProvisioningConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::GwInitError;

/// Application configuration managed by Figment.
///
/// Built once in `main` and handed to every component; nothing reads it from a global.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Process-level settings (see `basic` table in gwinit.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Managed gateway installation and its HTTP surface.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Inputs for the first-run commissioning wizard.
    #[serde(default)]
    pub commissioning: CommissioningConfig,

    /// Module / device / tag provider registration.
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
}

const DEFAULT_CONFIG_FILE: &str = "gwinit.toml";
const CONFIG_FILE_ENV: &str = "GWINIT_CONFIG";
const INSTALL_LOCATION_ENV: &str = "IGNITION_INSTALL_LOCATION";

impl Config {
    /// Merges defaults, the optional TOML file, `GWINIT_*` variables (`__` nests tables) and
    /// the install location variable set by the gateway image.
    pub fn figment() -> Figment {
        let config_file = std::env::var_os(CONFIG_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if config_file.is_file() {
            figment = figment.merge(Toml::file(config_file));
        }
        figment
            .merge(Env::prefixed("GWINIT_").split("__"))
            .merge(
                Env::raw()
                    .only(&[INSTALL_LOCATION_ENV])
                    .map(|_| "gateway.install_location".into()),
            )
    }

    /// Loads and validates configuration. Any error here is fatal for the binary.
    pub fn load() -> Result<Self, GwInitError> {
        let cfg: Self = Self::figment()
            .extract()
            .map_err(|e| GwInitError::Config(format!("failed to extract configuration: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), GwInitError> {
        if self.gateway.install_location.as_os_str().is_empty() {
            return Err(GwInitError::Config(format!(
                "undefined env: {INSTALL_LOCATION_ENV}"
            )));
        }
        if self.gateway.poll_interval_ms == 0 {
            return Err(GwInitError::Config(
                "gateway.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status_cache::DeploymentType;

    #[test]
    fn defaults_match_stock_gateway_layout() {
        let cfg = Config::default();
        assert_eq!(cfg.gateway.port, 8088);
        assert_eq!(cfg.gateway.poll_interval_ms, 1000);
        assert_eq!(cfg.commissioning.http_port, 8088);
        assert_eq!(cfg.commissioning.https_port, 8043);
        assert_eq!(cfg.commissioning.gan_port, 8060);
        assert!(!cfg.commissioning.use_ssl);
        assert_eq!(cfg.provisioning.deployment, DeploymentType::Dev);
        assert_eq!(cfg.provisioning.tag_providers, vec!["Public", "Simulator"]);
    }

    #[test]
    fn missing_install_location_is_rejected() {
        let err = Config::default().validate().expect_err("must fail");
        assert!(err.to_string().contains("IGNITION_INSTALL_LOCATION"));
    }

    #[test]
    fn toml_overrides_nested_tables() {
        let cfg: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(
                r#"
                [gateway]
                install_location = "/usr/local/bin/ignition"
                port = 9088

                [provisioning]
                deployment = "STAGING"
                tag_providers = ["Public"]
                "#,
            ))
            .extract()
            .expect("extract");
        cfg.validate().expect("valid");
        assert_eq!(cfg.gateway.port, 9088);
        assert_eq!(cfg.provisioning.deployment, DeploymentType::Staging);
        assert_eq!(cfg.provisioning.tag_providers, vec!["Public"]);
        assert_eq!(
            cfg.gateway.database_path(),
            PathBuf::from("/usr/local/bin/ignition/data/db/config.idb")
        );
    }
}
