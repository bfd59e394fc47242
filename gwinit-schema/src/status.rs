use serde::{Deserialize, Serialize};

/// Body of `GET /StatusPing`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StatusPing {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
