use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReadDirStream;
use tracing::{error, info};

use super::module_package::read_module_record;
use crate::backup::ConfigBackup;
use crate::config::Config;
use crate::db::{ConfigDbHandle, ModuleRecord, TagProvider};
use crate::error::GwInitError;

const MODULE_EXTENSION: &str = "modl";

/// Filesystem inputs of a registration pass.
#[derive(Debug, Clone)]
pub struct RegistrarSettings {
    pub modules_dir: PathBuf,
    pub module_install_dir: PathBuf,
    pub service_uid: Option<u32>,
    pub service_gid: Option<u32>,
    pub device_backup_dir: PathBuf,
    pub tag_providers: Vec<String>,
}

impl From<&Config> for RegistrarSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            modules_dir: cfg.provisioning.modules_dir.clone(),
            module_install_dir: cfg.gateway.module_install_dir(),
            service_uid: cfg.gateway.service_uid,
            service_gid: cfg.gateway.service_gid,
            device_backup_dir: cfg.provisioning.device_backup_dir(),
            tag_providers: cfg.provisioning.tag_providers.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Registrar {
    db: ConfigDbHandle,
    backup: ConfigBackup,
    settings: RegistrarSettings,
}

impl Registrar {
    pub fn new(db: ConfigDbHandle, settings: RegistrarSettings) -> Self {
        Self {
            backup: ConfigBackup::new(db.clone()),
            db,
            settings,
        }
    }

    /// Installs every `*.modl` package from the drop directory and records its certificate
    /// and license acceptance. An absent drop directory means there is nothing to install.
    pub async fn register_modules(&self) -> Result<Vec<ModuleRecord>, GwInitError> {
        let packages = match self.module_packages().await {
            Ok(packages) => packages,
            Err(e) => {
                error!(dir = %self.settings.modules_dir.display(), error = %e, "Failed to install modules");
                return Err(e);
            }
        };

        let mut records = Vec::with_capacity(packages.len());
        for package in packages {
            match self.register_module(&package).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!(path = %package.display(), error = %e, "Failed to install module");
                    return Err(e);
                }
            }
        }
        Ok(records)
    }

    async fn register_module(&self, package: &Path) -> Result<ModuleRecord, GwInitError> {
        let file_name = package.file_name().ok_or_else(|| GwInitError::ModulePackage {
            path: package.to_path_buf(),
            reason: "no file name".to_string(),
        })?;
        fs::create_dir_all(&self.settings.module_install_dir).await?;
        let installed = self.settings.module_install_dir.join(file_name);
        fs::copy(package, &installed).await?;
        if let Some(uid) = self.settings.service_uid {
            chown(installed, uid, self.settings.service_gid).await?;
        }
        info!(path = %package.display(), "Installing module");

        let record = read_module_record(package.to_path_buf()).await?;
        info!(
            module_id = %record.module_id,
            thumbprint = %record.thumbprint,
            subject_name = %record.subject_name,
            license_crc = record.license_crc,
            "Module"
        );

        self.db.register_module(record.clone()).await?;
        Ok(record)
    }

    async fn module_packages(&self) -> Result<Vec<PathBuf>, GwInitError> {
        let dir = &self.settings.modules_dir;
        if !fs::try_exists(dir).await? {
            info!(dir = %dir.display(), "no module drop directory");
            return Ok(Vec::new());
        }

        let mut entries = ReadDirStream::new(fs::read_dir(dir).await?);
        let mut packages = Vec::new();
        while let Some(entry) = entries.next().await {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == MODULE_EXTENSION)
                && fs::metadata(&path).await?.is_file()
            {
                packages.push(path);
            }
        }
        packages.sort();
        Ok(packages)
    }

    /// Restores the backed-up device tables. A missing backup is a failure.
    pub async fn register_devices(&self) -> Result<Vec<String>, GwInitError> {
        self.backup
            .restore_dir(&self.settings.device_backup_dir)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to install devices"))
    }

    /// Makes sure every configured tag provider exists. Returns the names that were inserted.
    pub async fn register_tag_providers(&self) -> Result<Vec<String>, GwInitError> {
        let mut inserted = Vec::new();
        for name in &self.settings.tag_providers {
            match self.db.register_tag_provider(TagProvider::standard(name)).await {
                Ok(Some(_)) => inserted.push(name.clone()),
                Ok(None) => {}
                Err(e) => {
                    error!(name = %name, error = %e, "Failed to install tag provider");
                    return Err(e);
                }
            }
        }
        Ok(inserted)
    }
}

async fn chown(path: PathBuf, uid: u32, gid: Option<u32>) -> Result<(), GwInitError> {
    tokio::task::spawn_blocking(move || std::os::unix::fs::chown(&path, Some(uid), gid))
        .await
        .map_err(|e| GwInitError::Process(format!("chown task failed: {e}")))??;
    Ok(())
}
