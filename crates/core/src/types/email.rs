//! Validated email address type.
//!
//! Validation is deliberately shallow (shape, not deliverability): the
//! identity provider and the email provider both re-validate on their side.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors validating an email address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("email address is empty")]
    Empty,
    #[error("email address is missing '@': {0}")]
    MissingAt(String),
    #[error("email address has an empty local part or domain: {0}")]
    MissingPart(String),
}

/// A syntactically valid email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Parse and validate an email address.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` if the address is empty, has no `@`, or has an
    /// empty local part or domain.
    pub fn parse(raw: &str) -> Result<Self, EmailError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(EmailError::MissingAt(trimmed.to_owned()));
        };
        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(EmailError::MissingPart(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Get the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        let email = Email::parse("shopper@example.com").expect("valid");
        assert_eq!(email.as_str(), "shopper@example.com");
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let email = Email::parse("  shopper@example.com  ").expect("valid");
        assert_eq!(email.as_str(), "shopper@example.com");
    }

    #[test]
    fn test_invalid_emails() {
        assert_eq!(Email::parse(""), Err(EmailError::Empty));
        assert!(matches!(
            Email::parse("no-at-sign"),
            Err(EmailError::MissingAt(_))
        ));
        assert!(matches!(
            Email::parse("@example.com"),
            Err(EmailError::MissingPart(_))
        ));
        assert!(matches!(
            Email::parse("shopper@"),
            Err(EmailError::MissingPart(_))
        ));
    }
}
