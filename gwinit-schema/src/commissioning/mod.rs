mod bootstrap;
mod post_step;

pub use bootstrap::{BootstrapResponse, EDITION_NOT_SET, WizardStep};
pub use post_step::{
    ActivationData, AuthSetupData, ConnectionsData, EditionData, EulaData, FinishData, PostStep,
};
