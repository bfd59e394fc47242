//! Reading identity out of a `*.modl` module package (a zip archive).

use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;
use zip::result::ZipError;

use super::certificate::signer_certificate;
use crate::db::ModuleRecord;
use crate::error::GwInitError;

const MODULE_XML: &str = "module.xml";
const LICENSE_HTML: &str = "license.html";
const CERTIFICATES_P7B: &str = "certificates.p7b";

#[derive(Debug, Deserialize)]
struct ModulesXml {
    module: ModuleXml,
}

#[derive(Debug, Deserialize)]
struct ModuleXml {
    id: String,
}

/// Reads module id, license CRC32 and signer certificate from the package at `path`.
///
/// Blocking; callers on the runtime go through [`read_module_record`].
pub fn read_module_record_blocking(path: &Path) -> Result<ModuleRecord, GwInitError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;

    let module_xml = read_entry(&mut archive, path, MODULE_XML)?;
    let module_xml = String::from_utf8(module_xml).map_err(|e| GwInitError::ModulePackage {
        path: path.to_path_buf(),
        reason: format!("{MODULE_XML} is not UTF-8: {e}"),
    })?;
    let modules: ModulesXml = quick_xml::de::from_str(&module_xml)?;

    let license = read_entry(&mut archive, path, LICENSE_HTML)?;
    let p7b = read_entry(&mut archive, path, CERTIFICATES_P7B)?;
    let signer = signer_certificate(&p7b)?;

    Ok(ModuleRecord {
        module_id: modules.module.id.trim().to_string(),
        thumbprint: signer.thumbprint,
        subject_name: signer.subject_name,
        license_crc: crc32fast::hash(&license),
    })
}

pub async fn read_module_record(path: PathBuf) -> Result<ModuleRecord, GwInitError> {
    tokio::task::spawn_blocking(move || read_module_record_blocking(&path))
        .await
        .map_err(|e| GwInitError::Process(format!("module reader task failed: {e}")))?
}

fn read_entry(
    archive: &mut ZipArchive<File>,
    path: &Path,
    name: &str,
) -> Result<Vec<u8>, GwInitError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(GwInitError::ModulePackage {
                path: path.to_path_buf(),
                reason: format!("missing {name}"),
            });
        }
        Err(e) => return Err(e.into()),
    };
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_id_is_read_from_nested_module_element() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <modules>
              <module>
                <id>com.bowery.simulator</id>
                <name>Simulator</name>
                <version>1.2.0</version>
              </module>
            </modules>"#;
        let parsed: ModulesXml = quick_xml::de::from_str(xml).unwrap();
        assert_eq!(parsed.module.id, "com.bowery.simulator");
    }

    #[test]
    fn license_crc_matches_reference_value() {
        // zlib/gzip CRC-32 of "123456789".
        assert_eq!(crc32fast::hash(b"123456789"), 0xCBF4_3926);
    }
}
