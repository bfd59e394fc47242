//! Gateway configuration database access.
//!
//! Layout:
//! - `actor.rs`: single-writer actor owning every connection to the live file
//! - `dump.rs`: table dump and replay
//! - `models.rs`: rows written and read by provisioning
//! - `schema.rs`: table names and the driver settings mapping

pub mod actor;
pub(crate) mod dump;
pub mod models;
pub mod schema;

pub use actor::{ConfigDbHandle, spawn};
pub use models::{DbTagProvider, ModuleRecord, ModuleRegistration, TagProvider};
pub use schema::driver_settings_table;
