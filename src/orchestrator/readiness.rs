//! Operator-facing status probe and readiness wait.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::health::{GatewayState, HealthMonitor};
use crate::status_cache::{ProvisionRecord, StatusCache};

/// Consecutive `(RUNNING, None)` probes required before the gateway counts as ready.
pub const READY_STREAK: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayStatus {
    pub provisioning: ProvisionRecord,
    pub gateway: Option<GatewayState>,
}

/// One status probe plus the cached provisioning record.
pub async fn status(health: &HealthMonitor, cache: &StatusCache) -> GatewayStatus {
    GatewayStatus {
        provisioning: cache.read_or_unknown().await,
        gateway: health.ping().await,
    }
}

/// Blocks until the cache says PROVISIONED and then until `streak` consecutive probes see
/// the gateway running with no details. Any other answer resets the streak.
pub async fn wait_until_ready(
    health: &HealthMonitor,
    cache: &StatusCache,
    poll_interval: Duration,
    streak: u32,
) {
    info!("Waiting for gateway provisioning");
    while !cache.read_or_unknown().await.is_provisioned() {
        sleep(poll_interval).await;
    }
    info!("Gateway is provisioned");

    let running = GatewayState::running();
    let mut seen = 0;
    while seen < streak {
        match health.ping().await {
            Some(state) if state == running => seen += 1,
            other => {
                debug!(state = ?other, "readiness streak reset");
                seen = 0;
            }
        }
        if seen < streak {
            sleep(poll_interval).await;
        }
    }
    info!("Gateway is ready");
}
