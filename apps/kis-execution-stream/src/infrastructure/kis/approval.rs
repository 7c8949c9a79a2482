//! Approval Key Issuance
//!
//! `POST {base}/oauth2/Approval` with the application identity; the JSON
//! response carries the new key in `approval_key`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::ports::{ApprovalKeyIssuer, CredentialIssuanceError};
use crate::domain::credential::ApprovalKey;
use crate::infrastructure::config::AppCredentials;

const APPROVAL_PATH: &str = "/oauth2/Approval";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct ApprovalRequest<'a> {
    grant_type: &'static str,
    appkey: &'a str,
    secretkey: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApprovalResponse {
    #[serde(default)]
    approval_key: Option<String>,
}

/// Issues approval keys over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApprovalKeyIssuer {
    client: Client,
    url: String,
    credentials: AppCredentials,
}

impl HttpApprovalKeyIssuer {
    /// Create an issuer for the REST base URL.
    ///
    /// # Errors
    ///
    /// Returns `CredentialIssuanceError::Http` if the HTTP client cannot be
    /// built.
    pub fn new(base_url: &str, credentials: AppCredentials) -> Result<Self, CredentialIssuanceError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CredentialIssuanceError::Http(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}{APPROVAL_PATH}", base_url.trim_end_matches('/')),
            credentials,
        })
    }
}

#[async_trait]
impl ApprovalKeyIssuer for HttpApprovalKeyIssuer {
    async fn issue(&self) -> Result<ApprovalKey, CredentialIssuanceError> {
        let body = ApprovalRequest {
            grant_type: "client_credentials",
            appkey: self.credentials.app_key(),
            secretkey: self.credentials.app_secret(),
        };

        tracing::debug!(url = %self.url, "Requesting approval key");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CredentialIssuanceError::Http(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CredentialIssuanceError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(CredentialIssuanceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ApprovalResponse = serde_json::from_str(&text)
            .map_err(|e| CredentialIssuanceError::Decode(e.to_string()))?;

        parsed
            .approval_key
            .as_deref()
            .and_then(ApprovalKey::parse)
            .ok_or(CredentialIssuanceError::MissingField)
    }
}
