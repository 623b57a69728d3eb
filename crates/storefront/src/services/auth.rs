//! Identity token verification.
//!
//! The browser authenticates against the hosted identity provider and sends
//! us the resulting ID token; we verify it server-side with the provider's
//! `accounts:lookup` endpoint and extract the stable subject and email. No
//! password or credential material ever reaches this service.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use colibri_core::{Email, EmailError, UserId};

use crate::config::AuthConfig;

/// Errors from token verification.
#[derive(Debug, Error)]
pub enum AuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("identity API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The token did not resolve to an account.
    #[error("invalid or expired ID token")]
    InvalidToken,

    /// The account has no usable email address.
    #[error("account has no email address")]
    MissingEmail,

    /// The account's email address failed validation.
    #[error("account email rejected: {0}")]
    Email(#[from] EmailError),
}

/// The identity a verified token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Stable provider subject, used as the user's primary key.
    pub subject: UserId,
    pub email: Email,
    pub email_verified: bool,
}

/// Identity provider client.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<AuthClientInner>,
}

struct AuthClientInner {
    client: reqwest::Client,
    api_base: String,
    api_key: SecretString,
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    #[serde(rename = "idToken")]
    id_token: &'a str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
struct LookupUser {
    #[serde(rename = "localId")]
    local_id: String,
    email: Option<String>,
    #[serde(rename = "emailVerified", default)]
    email_verified: bool,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

impl AuthClient {
    /// Create a new identity provider client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            inner: Arc::new(AuthClientInner {
                client,
                api_base: config.api_base.trim_end_matches('/').to_owned(),
                api_key: config.api_key.clone(),
            }),
        })
    }

    /// Verify an ID token and resolve the identity behind it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` when the provider rejects the token
    /// or resolves it to no account.
    pub async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedIdentity, AuthError> {
        let url = format!(
            "{}/v1/accounts:lookup?key={}",
            self.inner.api_base,
            self.inner.api_key.expose_secret()
        );
        let response = self
            .inner
            .client
            .post(&url)
            .json(&LookupRequest { id_token })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorEnvelope>()
                .await
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| "unknown error".to_owned());
            // The provider reports bad tokens as client errors.
            if status.as_u16() == 400 {
                return Err(AuthError::InvalidToken);
            }
            return Err(AuthError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let lookup: LookupResponse = response.json().await?;
        let user = lookup.users.into_iter().next().ok_or(AuthError::InvalidToken)?;
        let email = user.email.ok_or(AuthError::MissingEmail)?;

        Ok(VerifiedIdentity {
            subject: UserId::new(user.local_id),
            email: Email::parse(&email)?,
            email_verified: user.email_verified,
        })
    }
}
