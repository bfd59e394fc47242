//! First-run wizard driver.
//!
//! The gateway advertises which optional steps still need an answer; a step missing from
//! the bootstrap response is already satisfied.

mod credentials;

pub use credentials::SaltedPassword;

use gwinit_schema::{ActivationData, BootstrapResponse, ConnectionsData, PostStep, WizardStep};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{error, info};
use url::Url;

use crate::config::CommissioningConfig;
use crate::error::GwInitError;
use crate::utils::logging::debug_json;

pub struct CommissioningDriver {
    client: reqwest::Client,
    bootstrap_url: Url,
    post_url: Url,
    settings: CommissioningConfig,
}

impl CommissioningDriver {
    pub fn new(
        client: reqwest::Client,
        base_url: &Url,
        settings: CommissioningConfig,
    ) -> Result<Self, GwInitError> {
        Ok(Self {
            client,
            bootstrap_url: base_url.join("bootstrap")?,
            post_url: base_url.join("post-step")?,
            settings,
        })
    }

    /// Runs one full commissioning pass. The first unexpected status aborts the pass.
    pub async fn commission(&self) -> Result<(), GwInitError> {
        let bootstrap = self.fetch_bootstrap().await?;

        if bootstrap.edition_unset() {
            info!("perform commissioning.. edition selection");
            self.post_step("edition selection", &PostStep::edition(""), StatusCode::CREATED)
                .await?;
        }

        for step in bootstrap.pending_steps() {
            match step {
                WizardStep::Eula => {
                    info!("perform commissioning.. license acceptance");
                    self.post_step(
                        "license acceptance",
                        &PostStep::eula_accept(),
                        StatusCode::CREATED,
                    )
                    .await?;
                }
                WizardStep::Activated => {
                    info!("perform commissioning.. license activation");
                    let payload = self.activation_payload()?;
                    self.post_step("license activation", &payload, StatusCode::CREATED)
                        .await?;
                }
                WizardStep::AuthSetup => {
                    info!("perform commissioning.. authentication setup");
                    let password = SaltedPassword::generate(&self.settings.admin_password);
                    let payload = PostStep::auth_setup(
                        self.settings.admin_username.as_str(),
                        password.encoded(),
                    );
                    self.post_step("authentication", &payload, StatusCode::CREATED)
                        .await?;
                }
                WizardStep::Connections => {
                    info!("perform commissioning.. connection setup");
                    let payload = PostStep::connections(ConnectionsData {
                        http: self.settings.http_port,
                        https: self.settings.https_port,
                        gan: self.settings.gan_port,
                        use_ssl: self.settings.use_ssl,
                    });
                    self.post_step("connections", &payload, StatusCode::CREATED)
                        .await?;
                }
            }
        }

        info!("perform commissioning.. finalizing");
        self.post_step("finalize", &PostStep::finish(), StatusCode::OK)
            .await
    }

    async fn fetch_bootstrap(&self) -> Result<BootstrapResponse, GwInitError> {
        let resp = self.client.get(self.bootstrap_url.clone()).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            error!(%status, "commissioning failed: unexpected status from bootstrap");
            return Err(GwInitError::UnexpectedStatus {
                step: "bootstrap".to_string(),
                status,
            });
        }
        let bootstrap: BootstrapResponse = resp.json().await?;
        info!(
            edition = %bootstrap.edition,
            steps = ?bootstrap.steps.keys().collect::<Vec<_>>(),
            "bootstrap"
        );
        Ok(bootstrap)
    }

    fn activation_payload(&self) -> Result<PostStep<ActivationData>, GwInitError> {
        match (
            self.settings.license_key.as_deref(),
            self.settings.activation_token.as_deref(),
        ) {
            (Some(key), Some(token)) => Ok(PostStep::activation(key, token)),
            _ => {
                error!("commissioning failed: activation requested without credentials");
                Err(GwInitError::MissingActivationCredentials)
            }
        }
    }

    async fn post_step<T: Serialize>(
        &self,
        label: &str,
        payload: &PostStep<T>,
        expected: StatusCode,
    ) -> Result<(), GwInitError> {
        debug_json(label, payload);
        let resp = self
            .client
            .post(self.post_url.clone())
            .json(payload)
            .send()
            .await?;
        let status = resp.status();
        if status != expected {
            error!(%status, step = label, "commissioning failed: unexpected status");
            return Err(GwInitError::UnexpectedStatus {
                step: label.to_string(),
                status,
            });
        }
        Ok(())
    }
}
