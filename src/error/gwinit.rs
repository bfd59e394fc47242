use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error as ThisError;

use super::ErrorKind;

#[derive(Debug, ThisError)]
pub enum GwInitError {
    #[error("Unexpected status {status} from {step}")]
    UnexpectedStatus { step: String, status: StatusCode },

    #[error("Activation step advertised but license key or activation token is missing")]
    MissingActivationCredentials,

    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    #[error("Database configuration path not found: {}", .0.display())]
    MissingBackupDir(PathBuf),

    #[error("Table not found in configuration database: {0}")]
    MissingTable(String),

    #[error("Invalid module package {}: {reason}", .path.display())]
    ModulePackage { path: PathBuf, reason: String },

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Managed process error: {0}")]
    Process(String),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("DER decode error: {0}")]
    DerError(#[from] der::Error),

    #[error("module.xml error: {0}")]
    XmlError(#[from] quick_xml::DeError),

    #[error("Ractor error: {0}")]
    RactorError(String),
}

impl GwInitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GwInitError::ReqwestError(_) => ErrorKind::Transport,
            GwInitError::UnexpectedStatus { .. }
            | GwInitError::MissingActivationCredentials
            | GwInitError::JsonError(_) => ErrorKind::Protocol,
            GwInitError::UnknownDriver(_)
            | GwInitError::MissingBackupDir(_)
            | GwInitError::MissingTable(_)
            | GwInitError::ModulePackage { .. }
            | GwInitError::Certificate(_)
            | GwInitError::ZipError(_)
            | GwInitError::DerError(_)
            | GwInitError::XmlError(_) => ErrorKind::Data,
            GwInitError::DatabaseError(_) | GwInitError::RactorError(_) => ErrorKind::Database,
            GwInitError::Config(_) | GwInitError::UrlError(_) => ErrorKind::Config,
            GwInitError::IoError(_) | GwInitError::Process(_) => ErrorKind::Io,
        }
    }
}
