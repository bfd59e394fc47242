use serde::{Deserialize, Serialize};

/// Body of `POST /post-step`.
///
/// Activation and finalize payloads carry no `step` key on the wire.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PostStep<T> {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EditionData {
    /// Empty string selects the full edition.
    pub edition: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EulaData {
    pub accept: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivationData {
    pub license_key: String,
    pub activation_token: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthSetupData {
    pub username: String,
    /// `[<salt>]<sha256 hex of password+salt>`
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ConnectionsData {
    pub http: u16,
    pub https: u16,
    pub gan: u16,
    #[serde(rename = "useSSL")]
    pub use_ssl: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinishData {
    pub start_gateway: bool,
}

impl PostStep<EditionData> {
    pub fn edition(edition: impl Into<String>) -> Self {
        Self {
            id: "edition".to_string(),
            step: Some("edition".to_string()),
            data: EditionData {
                edition: edition.into(),
            },
        }
    }
}

impl PostStep<EulaData> {
    pub fn eula_accept() -> Self {
        Self {
            id: "license".to_string(),
            step: Some("eula".to_string()),
            data: EulaData { accept: true },
        }
    }
}

impl PostStep<ActivationData> {
    pub fn activation(license_key: impl Into<String>, activation_token: impl Into<String>) -> Self {
        Self {
            id: "activation".to_string(),
            step: None,
            data: ActivationData {
                license_key: license_key.into(),
                activation_token: activation_token.into(),
            },
        }
    }
}

impl PostStep<AuthSetupData> {
    pub fn auth_setup(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: "authentication".to_string(),
            step: Some("authSetup".to_string()),
            data: AuthSetupData {
                username: username.into(),
                password: password.into(),
            },
        }
    }
}

impl PostStep<ConnectionsData> {
    pub fn connections(data: ConnectionsData) -> Self {
        Self {
            id: "connections".to_string(),
            step: Some("connections".to_string()),
            data,
        }
    }
}

impl PostStep<FinishData> {
    pub fn finish() -> Self {
        Self {
            id: "finished".to_string(),
            step: None,
            data: FinishData {
                start_gateway: true,
            },
        }
    }
}
