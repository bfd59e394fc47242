use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Edition value reported by `/bootstrap` before an edition has been chosen.
pub const EDITION_NOT_SET: &str = "NOT_SET";

/// Body of `GET /bootstrap`.
///
/// `steps` is advertised by the gateway: only the keys matter, the values are opaque.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BootstrapResponse {
    pub edition: String,
    #[serde(default)]
    pub steps: Map<String, Value>,
}

impl BootstrapResponse {
    pub fn edition_unset(&self) -> bool {
        self.edition == EDITION_NOT_SET
    }

    pub fn has_step(&self, step: WizardStep) -> bool {
        self.steps.contains_key(step.key())
    }

    /// Optional wizard steps advertised by the gateway, in execution order.
    pub fn pending_steps(&self) -> Vec<WizardStep> {
        WizardStep::ORDERED
            .into_iter()
            .filter(|step| self.has_step(*step))
            .collect()
    }
}

/// Optional commissioning steps, in the order they must be posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardStep {
    Eula,
    Activated,
    AuthSetup,
    Connections,
}

impl WizardStep {
    pub const ORDERED: [WizardStep; 4] = [
        WizardStep::Eula,
        WizardStep::Activated,
        WizardStep::AuthSetup,
        WizardStep::Connections,
    ];

    /// Key under which the gateway advertises this step in `steps`.
    pub fn key(self) -> &'static str {
        match self {
            WizardStep::Eula => "eula",
            WizardStep::Activated => "activated",
            WizardStep::AuthSetup => "authSetup",
            WizardStep::Connections => "connections",
        }
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_steps_follow_wizard_order() {
        let raw = serde_json::json!({
            "edition": "NOT_SET",
            "steps": { "connections": {}, "eula": {}, "authSetup": {} }
        });
        let resp: BootstrapResponse = serde_json::from_value(raw).unwrap();
        assert!(resp.edition_unset());
        assert_eq!(
            resp.pending_steps(),
            vec![
                WizardStep::Eula,
                WizardStep::AuthSetup,
                WizardStep::Connections
            ]
        );
    }

    #[test]
    fn missing_steps_means_nothing_pending() {
        let resp: BootstrapResponse =
            serde_json::from_str(r#"{"edition":"standard"}"#).unwrap();
        assert!(!resp.edition_unset());
        assert!(resp.pending_steps().is_empty());
    }
}
