use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Certificate and license identity of one module package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub module_id: String,
    /// SHA-1 of the signer certificate, 40 lower-case hex digits.
    pub thumbprint: String,
    /// Common name of the signer certificate subject.
    pub subject_name: String,
    /// CRC32 of the license document.
    pub license_crc: u32,
}

/// Ids allocated by one module registration; `None` means the row already existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleRegistration {
    pub certificate_id: Option<i64>,
    pub eula_id: Option<i64>,
}

/// A tag provider to make sure exists. The id is allocated on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagProvider {
    pub name: String,
    pub external_uuid: String,
    pub description: String,
    pub enabled: bool,
    pub type_id: String,
    pub allow_backfill: bool,
}

impl TagProvider {
    /// Enabled standard (internal) provider with a fresh external UUID.
    pub fn standard(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            external_uuid: uuid::Uuid::new_v4().to_string(),
            description: String::new(),
            enabled: true,
            type_id: "STANDARD".to_string(),
            allow_backfill: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DbTagProvider {
    #[sqlx(rename = "TAGPROVIDERSETTINGS_ID")]
    pub id: i64,
    #[sqlx(rename = "NAME")]
    pub name: String,
    #[sqlx(rename = "PROVIDERID")]
    pub external_uuid: Option<String>,
    #[sqlx(rename = "DESCRIPTION")]
    pub description: Option<String>,
    #[sqlx(rename = "ENABLED")]
    pub enabled: bool,
    #[sqlx(rename = "TYPEID")]
    pub type_id: Option<String>,
    #[sqlx(rename = "ALLOWBACKFILL")]
    pub allow_backfill: bool,
}
