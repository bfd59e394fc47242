pub mod commissioning;
pub mod status;

pub use commissioning::{
    ActivationData, AuthSetupData, BootstrapResponse, ConnectionsData, EDITION_NOT_SET,
    EditionData, EulaData, FinishData, PostStep, WizardStep,
};
pub use status::StatusPing;
