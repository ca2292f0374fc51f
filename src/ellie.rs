//! Client for the Ellie model API.

use reqwest::Client;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::types::ModelDocument;

/// Connection settings for Ellie.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EllieSettings {
    /// Organization slug, e.g. `company` in `https://company.ellie.ai`.
    pub organization: String,
    /// API token from the Ellie API settings panel.
    pub token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Overrides `https://<organization>.ellie.ai`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_api_version() -> String {
    "v1".into()
}

impl EllieSettings {
    pub fn new(organization: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            token: token.into(),
            api_version: default_api_version(),
            base_url: None,
        }
    }
}

pub struct EllieClient {
    http: Client,
    settings: EllieSettings,
}

impl EllieClient {
    pub fn new(settings: EllieSettings) -> Self {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(http: Client, settings: EllieSettings) -> Self {
        Self { http, settings }
    }

    pub fn models_url(&self) -> String {
        let base = match &self.settings.base_url {
            Some(url) => url.trim_end_matches('/').to_owned(),
            None => format!("https://{}.ellie.ai", self.settings.organization),
        };
        format!("{}/api/{}/models", base, self.settings.api_version)
    }

    pub fn model_url(&self, model_id: u64) -> String {
        format!("{}/{}", self.models_url(), model_id)
    }

    /// Create a new model named `name` from an exported document. Returns the
    /// response body as sent by the service.
    pub async fn import_model(
        &self,
        name: &str,
        document: ModelDocument,
    ) -> Result<String, TransportError> {
        let document = document.with_name(name);
        info!(
            model = name,
            entities = document.model.entities.len(),
            "importing model"
        );

        let response = self
            .http
            .post(self.models_url())
            .query(&[("token", &self.settings.token)])
            .json(&document)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(%status, "model imported");
        Ok(body)
    }

    /// Fetch a stored model document.
    pub async fn export_model(&self, model_id: u64) -> Result<Value, TransportError> {
        info!(model_id, "exporting model");

        let response = self
            .http
            .get(self.model_url(model_id))
            .query(&[("token", &self.settings.token)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}
