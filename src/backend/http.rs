//! HTTP backend for the registration REST API.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::config::WizardConfig;
use crate::error::{BackendError, ConfigError};
use crate::wizard::{RegistrationId, Step, StepDraft};

use super::traits::{DuplicateQuery, DuplicateReport, RegistrationBackend, SubmitAck};

/// Registration API client.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<SecretString>,
}

impl HttpBackend {
    /// Build a client from configuration.
    pub fn new(config: &WizardConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn step_url(&self, step: Step) -> String {
        format!("{}/registration/{}", self.base_url, step.resource())
    }

    fn duplicates_url(&self) -> String {
        format!("{}/registration/check-duplicates", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

/// Turn a non-success response into `BackendError::Status`, keeping the body.
async fn ensure_success(resp: Response) -> Result<Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RegistrationBackend for HttpBackend {
    async fn fetch_step(
        &self,
        step: Step,
        id: &RegistrationId,
    ) -> Result<Option<StepDraft>, BackendError> {
        let resp = self
            .authorized(self.client.get(self.step_url(step)))
            .query(&[("userId", id.as_str())])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(step = %step, registration_id = %id, "No saved record for step");
            return Ok(None);
        }
        let body = ensure_success(resp).await?.text().await?;
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(None);
        }
        StepDraft::from_json_str(trimmed)
            .map(Some)
            .ok_or_else(|| BackendError::InvalidResponse(format!("{step} record is not a JSON object")))
    }

    async fn submit_step(
        &self,
        step: Step,
        id: Option<&RegistrationId>,
        draft: &StepDraft,
    ) -> Result<SubmitAck, BackendError> {
        let mut request = self.authorized(self.client.post(self.step_url(step))).json(draft);
        if let Some(id) = id {
            request = request.query(&[("userId", id.as_str())]);
        }
        let resp = ensure_success(request.send().await?).await?;
        let body = resp.text().await?;
        info!(step = %step, "Step saved");
        SubmitAck::from_body(step, body)
    }

    async fn check_duplicates(
        &self,
        query: &DuplicateQuery,
    ) -> Result<DuplicateReport, BackendError> {
        let resp = self
            .authorized(self.client.post(self.duplicates_url()))
            .json(query)
            .send()
            .await?;
        let report = ensure_success(resp).await?.json::<DuplicateReport>().await?;
        Ok(report)
    }
}
