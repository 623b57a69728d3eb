//! Transactional email client (Resend-compatible REST API).
//!
//! One call: send a plain-text message. Order confirmation and operator
//! alerts go through here; delivery failures are the caller's problem to
//! log, never to surface to the buyer.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use colibri_core::Email;

use crate::checkout::Notifier;
use crate::config::EmailConfig;

/// Errors from the email API.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("email API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Client construction failed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Email API client.
#[derive(Clone)]
pub struct EmailClient {
    inner: Arc<EmailClientInner>,
}

struct EmailClientInner {
    client: reqwest::Client,
    api_base: String,
    from: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl EmailClient {
    /// Create a new email API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build or the API key is
    /// not a valid header value.
    pub fn new(config: &EmailConfig) -> Result<Self, NotificationError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        let mut auth_header = HeaderValue::from_str(&auth_value)
            .map_err(|e| NotificationError::Config(format!("invalid API key format: {e}")))?;
        auth_header.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_header);

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            inner: Arc::new(EmailClientInner {
                client,
                api_base: config.api_base.trim_end_matches('/').to_owned(),
                from: config.from.clone(),
            }),
        })
    }

    /// Send a plain-text email.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    pub async fn send(
        &self,
        to: &Email,
        subject: &str,
        text: &str,
    ) -> Result<(), NotificationError> {
        let url = format!("{}/emails", self.inner.api_base);
        let response = self
            .inner
            .client
            .post(&url)
            .json(&SendRequest {
                from: &self.inner.from,
                to: [to.as_str()],
                subject,
                text,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response
            .json::<ApiErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| "unknown error".to_owned());
        Err(NotificationError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl Notifier for EmailClient {
    async fn notify(
        &self,
        recipient: &Email,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        self.send(recipient, subject, body).await
    }
}
