//! Transactional email client for FridgeFriend
//!
//! Sends a stored template with named parameters through the EmailJS REST
//! API (`POST {base}/api/v1.0/email/send`).

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.emailjs.com";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Email rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, EmailError>;

/// Service account identifiers for the email provider
#[derive(Debug, Clone)]
pub struct EmailCredentials {
    pub service_id: String,
    pub template_id: String,
    /// Public key, sent as `user_id`
    pub user_id: String,
    /// Private key, only needed when the account enforces it
    pub access_token: Option<String>,
}

#[derive(Serialize)]
struct SendRequest<'a, P: Serialize> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: &'a P,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
}

/// Outcome reported by the provider for an accepted send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailResponse {
    pub status: u16,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct EmailClient {
    base_url: String,
    credentials: EmailCredentials,
    http_client: Client,
}

impl EmailClient {
    pub fn new(base_url: &str, credentials: EmailCredentials, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            http_client,
        }
    }

    pub fn credentials(&self) -> &EmailCredentials {
        &self.credentials
    }

    /// Sends the default template
    pub async fn send<P: Serialize>(&self, template_params: &P) -> Result<EmailResponse> {
        self.send_template(&self.credentials.template_id, template_params)
            .await
    }

    /// Sends `template_id` with the given named parameters
    pub async fn send_template<P: Serialize>(
        &self,
        template_id: &str,
        template_params: &P,
    ) -> Result<EmailResponse> {
        let url = Url::parse(&format!("{}/api/v1.0/email/send", self.base_url))?;

        let body = SendRequest {
            service_id: &self.credentials.service_id,
            template_id,
            user_id: &self.credentials.user_id,
            template_params,
            access_token: self.credentials.access_token.as_deref(),
        };

        let response = self.http_client.post(url).json(&body).send().await?;

        let status = response.status().as_u16();
        let text = response.text().await?;

        if !(200..300).contains(&status) {
            log::error!("email send failed: {} {}", status, text);
            return Err(EmailError::Rejected {
                status,
                message: text,
            });
        }

        log::debug!("email sent with template {}: {} {}", template_id, status, text);
        Ok(EmailResponse { status, text })
    }
}
