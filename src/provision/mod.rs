//! Idempotent registration of modules, devices and tag providers in the configuration
//! database.

mod certificate;
mod module_package;
mod registrar;

pub use certificate::{SignerCertificate, signer_certificate};
pub use module_package::{read_module_record, read_module_record_blocking};
pub use registrar::{Registrar, RegistrarSettings};
