use serde::{Deserialize, Serialize};

/// Values posted to the commissioning wizard.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommissioningConfig {
    /// Admin account created by the `authSetup` step. Default: `admin`.
    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    /// Plain admin password; only its salted hash is sent.
    #[serde(default = "default_admin_password")]
    pub admin_password: String,

    /// Both are required if the gateway advertises the `activated` step.
    #[serde(default)]
    pub license_key: Option<String>,

    #[serde(default)]
    pub activation_token: Option<String>,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_https_port")]
    pub https_port: u16,

    /// Gateway area network port.
    #[serde(default = "default_gan_port")]
    pub gan_port: u16,

    #[serde(default)]
    pub use_ssl: bool,
}

impl Default for CommissioningConfig {
    fn default() -> Self {
        Self {
            admin_username: default_admin_username(),
            admin_password: default_admin_password(),
            license_key: None,
            activation_token: None,
            http_port: default_http_port(),
            https_port: default_https_port(),
            gan_port: default_gan_port(),
            use_ssl: false,
        }
    }
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "password".to_string()
}

fn default_http_port() -> u16 {
    8088
}

fn default_https_port() -> u16 {
    8043
}

fn default_gan_port() -> u16 {
    8060
}
