//! Durable provisioning marker.
//!
//! A small JSON file under the gateway data directory. It is the only state that tells a
//! restart apart from a first boot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::GwInitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeploymentType {
    #[default]
    Dev,
    Staging,
    Prod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProvisionStatus {
    #[default]
    Unknown,
    Provisioned,
}

impl fmt::Display for ProvisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProvisionStatus::Unknown => "UNKNOWN",
            ProvisionStatus::Provisioned => "PROVISIONED",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct ProvisionRecord {
    #[serde(default, deserialize_with = "lenient_deployment")]
    pub deployment: DeploymentType,
    #[serde(default)]
    pub status: ProvisionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_at: Option<DateTime<Utc>>,
}

// A deployment name this build does not know reads as the default, never as a corrupt file.
fn lenient_deployment<'de, D: Deserializer<'de>>(de: D) -> Result<DeploymentType, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl ProvisionRecord {
    pub fn provisioned(deployment: DeploymentType) -> Self {
        Self {
            deployment,
            status: ProvisionStatus::Provisioned,
            provisioned_at: Some(Utc::now()),
        }
    }

    pub fn is_provisioned(&self) -> bool {
        self.status == ProvisionStatus::Provisioned
    }
}

#[derive(Debug, Clone)]
pub struct StatusCache {
    path: PathBuf,
}

impl StatusCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as an unprovisioned record.
    pub async fn read(&self) -> Result<ProvisionRecord, GwInitError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "provisioning cache not found");
                Ok(ProvisionRecord::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`StatusCache::read`], but an unreadable or corrupt file is logged and reads as
    /// UNKNOWN so the next pass re-provisions.
    pub async fn read_or_unknown(&self) -> ProvisionRecord {
        match self.read().await {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "provisioning cache unreadable, treating as UNKNOWN"
                );
                ProvisionRecord::default()
            }
        }
    }

    /// Replaces the cache file atomically: write a sibling temp file, then rename over.
    pub async fn store(&self, record: &ProvisionRecord) -> Result<(), GwInitError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        let body = serde_json::to_vec(record)?;

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// UNKNOWN -> PROVISIONED. There is no way back through this type.
    pub async fn mark_provisioned(
        &self,
        deployment: DeploymentType,
    ) -> Result<ProvisionRecord, GwInitError> {
        let record = ProvisionRecord::provisioned(deployment);
        self.store(&record).await?;
        Ok(record)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "provisioning.cache".to_string());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", std::process::id()))
    }
}
