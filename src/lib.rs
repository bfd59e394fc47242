pub mod backup;
pub mod commissioning;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod provision;
pub mod status_cache;

mod utils;

pub use error::{ErrorKind, GwInitError};
