//! Persistent data volume wiring for the gateway install.

use async_trait::async_trait;
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::GatewayConfig;
use crate::error::GwInitError;

#[async_trait]
pub trait DataVolume: Send + Sync {
    /// Makes the gateway's data directory live on persistent storage. Runs before launch.
    async fn prepare(&self) -> Result<(), GwInitError>;
}

const SEED_MARKER: &str = "db/config.idb";
const KEYSTORE: &str = "webserver/metro-keystore";

/// Seeds the volume from the install's stock `data/` on first use, then replaces the install
/// and var `data` directories (and the web keystore) with symlinks into the volume.
#[derive(Debug, Clone)]
pub struct LinkedDataVolume {
    install_dir: PathBuf,
    volume: PathBuf,
    var_dir: PathBuf,
}

impl LinkedDataVolume {
    pub fn new(cfg: &GatewayConfig) -> Self {
        Self {
            install_dir: cfg.install_dir().to_path_buf(),
            volume: cfg.data_volume.clone(),
            var_dir: cfg.var_dir.clone(),
        }
    }

    fn prepare_blocking(&self) -> io::Result<()> {
        let install_data = self.install_dir.join("data");
        if !self.volume.join(SEED_MARKER).exists() {
            info!(
                from = %install_data.display(),
                to = %self.volume.display(),
                "seeding data volume"
            );
            copy_tree(&install_data, &self.volume)?;
        }

        replace_with_link(&install_data, &self.volume)?;
        replace_with_link(
            &self.install_dir.join(KEYSTORE),
            &self.volume.join("metro-keystore"),
        )?;
        replace_with_link(&self.var_dir.join("data"), &self.volume)?;
        Ok(())
    }
}

#[async_trait]
impl DataVolume for LinkedDataVolume {
    async fn prepare(&self) -> Result<(), GwInitError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.prepare_blocking())
            .await
            .map_err(|e| GwInitError::Process(format!("data volume task failed: {e}")))??;
        Ok(())
    }
}

fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn replace_with_link(path: &Path, target: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        Err(e) => return Err(e),
    }
    symlink(target, path)
}
