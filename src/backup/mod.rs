//! Table backup and restore as replayable SQL scripts.
//!
//! One `<TABLE>.sql` file per table. Device backups cover `DEVICESETTINGS` plus the settings
//! table of every driver in use.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReadDirStream;
use tracing::{error, info, warn};

use crate::db::ConfigDbHandle;
use crate::db::schema::{DEVICESETTINGS, driver_settings_table};
use crate::error::GwInitError;

const SCRIPT_EXTENSION: &str = "sql";

#[derive(Clone)]
pub struct ConfigBackup {
    db: ConfigDbHandle,
}

impl ConfigBackup {
    pub fn new(db: ConfigDbHandle) -> Self {
        Self { db }
    }

    /// Writes `<dir>/<table>.sql` and returns its path.
    pub async fn backup_table(&self, table: &str, dir: &Path) -> Result<PathBuf, GwInitError> {
        let script = self.db.dump_table(table).await?;
        fs::create_dir_all(dir).await?;
        let path = script_path(dir, table);
        fs::write(&path, script).await?;
        info!(table, path = %path.display(), "Backed up table");
        Ok(path)
    }

    /// Tables a device backup covers, resolved from the drivers currently configured.
    pub async fn device_tables(&self) -> Result<Vec<String>, GwInitError> {
        let mut tables = BTreeSet::new();
        for driver in self.db.list_driver_types().await? {
            let Some(table) = driver_settings_table(&driver) else {
                error!(driver = %driver, "Unknown driver");
                return Err(GwInitError::UnknownDriver(driver));
            };
            tables.insert(table.to_string());
        }

        let mut out = vec![DEVICESETTINGS.to_string()];
        out.extend(tables);
        Ok(out)
    }

    /// Backs up every device table into `dir`.
    ///
    /// Scripts are written to a sibling staging directory first; `dir` is replaced only once
    /// all of them succeeded, so a failure leaves the previous backup untouched.
    pub async fn backup_device_configs(&self, dir: &Path) -> Result<Vec<PathBuf>, GwInitError> {
        let tables = self.device_tables().await?;
        let staging = sibling_path(dir, "staging");
        if fs::try_exists(&staging).await? {
            fs::remove_dir_all(&staging).await?;
        }

        let mut written = Vec::with_capacity(tables.len());
        for table in &tables {
            match self.backup_table(table, &staging).await {
                Ok(path) => written.push(path),
                Err(e) => {
                    let _ = fs::remove_dir_all(&staging).await;
                    return Err(e);
                }
            }
        }

        swap_into_place(&staging, dir).await?;
        let paths = written
            .iter()
            .filter_map(|p| p.file_name())
            .map(|name| dir.join(name))
            .collect();
        info!(dir = %dir.display(), tables = tables.len(), "Device configuration backed up");
        Ok(paths)
    }

    /// Replaces `table` with the contents of `<dir>/<table>.sql`.
    pub async fn restore_table(&self, table: &str, dir: &Path) -> Result<(), GwInitError> {
        let script = fs::read_to_string(script_path(dir, table)).await?;
        self.db.restore_table(table, script).await
    }

    /// Restores every `*.sql` script found directly in `dir`; the file stem names the table.
    pub async fn restore_dir(&self, dir: &Path) -> Result<Vec<String>, GwInitError> {
        if !fs::try_exists(dir).await? {
            error!(dir = %dir.display(), "Database configuration path not found");
            return Err(GwInitError::MissingBackupDir(dir.to_path_buf()));
        }

        let mut entries = ReadDirStream::new(fs::read_dir(dir).await?);
        let mut scripts = Vec::new();
        while let Some(entry) = entries.next().await {
            let path = entry?.path();
            let is_script = path
                .extension()
                .is_some_and(|ext| ext == SCRIPT_EXTENSION);
            if !is_script || !fs::metadata(&path).await?.is_file() {
                continue;
            }
            if let Some(table) = path.file_stem().and_then(|s| s.to_str()) {
                scripts.push((table.to_string(), path.clone()));
            }
        }
        scripts.sort();

        let mut restored = Vec::with_capacity(scripts.len());
        for (table, path) in scripts {
            let script = fs::read_to_string(&path).await?;
            info!(table = %table, path = %path.display(), "Restoring table");
            self.db.restore_table(&table, script).await?;
            restored.push(table);
        }
        Ok(restored)
    }
}

fn script_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{table}.{SCRIPT_EXTENSION}"))
}

fn sibling_path(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "backup".to_string());
    dir.with_file_name(format!(".{name}.{suffix}"))
}

async fn swap_into_place(staging: &Path, dir: &Path) -> Result<(), GwInitError> {
    if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent).await?;
    }
    let previous = sibling_path(dir, "previous");
    if fs::try_exists(&previous).await? {
        fs::remove_dir_all(&previous).await?;
    }
    let had_previous = fs::try_exists(dir).await?;
    if had_previous {
        fs::rename(dir, &previous).await?;
    }
    if let Err(e) = fs::rename(staging, dir).await {
        if had_previous {
            let _ = fs::rename(&previous, dir).await;
        }
        return Err(e.into());
    }
    if had_previous {
        if let Err(e) = fs::remove_dir_all(&previous).await {
            warn!(path = %previous.display(), error = %e, "failed to remove previous backup");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_dir_sits_next_to_target() {
        assert_eq!(
            sibling_path(Path::new("/config/db/devices"), "staging"),
            PathBuf::from("/config/db/.devices.staging")
        );
        assert_eq!(
            script_path(Path::new("/config/db/devices"), "DEVICESETTINGS"),
            PathBuf::from("/config/db/devices/DEVICESETTINGS.sql")
        );
    }
}
