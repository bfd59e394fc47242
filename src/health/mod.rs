//! Gateway liveness polling against `GET /StatusPing`.

use gwinit_schema::StatusPing;
use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::GwInitError;

pub const PHASE_RUNNING: &str = "RUNNING";
pub const DETAILS_COMMISSIONING: &str = "COMMISSIONING";

/// Snapshot reported by the status endpoint, compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GatewayState {
    pub phase: String,
    pub details: Option<String>,
}

impl GatewayState {
    pub fn new(phase: impl Into<String>, details: Option<&str>) -> Self {
        Self {
            phase: phase.into(),
            details: details.map(str::to_string),
        }
    }

    /// `(RUNNING, None)`: commissioned and serving.
    pub fn running() -> Self {
        Self::new(PHASE_RUNNING, None)
    }

    /// `(RUNNING, COMMISSIONING)`: waiting for the first-run wizard.
    pub fn commissioning() -> Self {
        Self::new(PHASE_RUNNING, Some(DETAILS_COMMISSIONING))
    }
}

impl From<StatusPing> for GatewayState {
    fn from(ping: StatusPing) -> Self {
        Self {
            phase: ping.state,
            details: ping.details,
        }
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (details:{})",
            self.phase,
            self.details.as_deref().unwrap_or("None")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    Reached,
    GaveUp,
    TimedOut,
}

impl HealthOutcome {
    pub fn is_reached(self) -> bool {
        self == HealthOutcome::Reached
    }
}

/// Polls the status endpoint until a target state, a give-up state, or a deadline.
///
/// The loop is the only retry mechanism: transport errors and non-success responses are
/// treated as "no state yet".
#[derive(Clone, Debug)]
pub struct HealthMonitor {
    client: reqwest::Client,
    status_url: Url,
    poll_interval: Duration,
}

impl HealthMonitor {
    pub fn new(
        client: reqwest::Client,
        base_url: &Url,
        poll_interval: Duration,
    ) -> Result<Self, GwInitError> {
        Ok(Self {
            client,
            status_url: base_url.join("StatusPing")?,
            poll_interval,
        })
    }

    pub fn status_url(&self) -> &Url {
        &self.status_url
    }

    /// Single probe. `None` when the gateway did not produce a usable answer.
    pub async fn ping(&self) -> Option<GatewayState> {
        let resp = match self.client.get(self.status_url.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(url = %self.status_url, error = %e, "status ping failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            debug!(url = %self.status_url, status = %resp.status(), "status ping not ready");
            return None;
        }
        match resp.json::<StatusPing>().await {
            Ok(ping) => Some(ping.into()),
            Err(e) => {
                debug!(url = %self.status_url, error = %e, "status ping body unreadable");
                None
            }
        }
    }

    /// Waits for `target`. The target is checked before `give_up`, so a state equal to
    /// both counts as reached.
    pub async fn await_state(
        &self,
        desc: &str,
        target: &GatewayState,
        give_up: Option<&GatewayState>,
        timeout: Duration,
    ) -> HealthOutcome {
        let deadline = Instant::now() + timeout;
        let mut last: Option<GatewayState> = None;

        while Instant::now() < deadline {
            if let Some(state) = self.ping().await {
                if &state == target {
                    info!(desc, state = %state, "health check reached target");
                    return HealthOutcome::Reached;
                }
                if give_up.is_some_and(|g| g == &state) {
                    info!(desc, state = %state, "health check gave up");
                    return HealthOutcome::GaveUp;
                }
                last = Some(state);
            }

            sleep(self.poll_interval).await;
            match &last {
                Some(state) => warn!(desc, state = %state, "health check.. retrying.."),
                None => warn!(desc, "health check.. retrying.. state:None (details:None)"),
            }
        }

        error!(desc, "health check failed: Timeout");
        HealthOutcome::TimedOut
    }
}
