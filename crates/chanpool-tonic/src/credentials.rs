use crate::error::{Error, Result};
use core::fmt;

/// Supplies the endpoint to connect to and the token to authenticate with.
///
/// Token issuance and refresh are outside this crate: a provider only hands
/// out what it already holds.
pub trait CredentialProvider: Send + Sync {
    /// The endpoint URI, e.g. `https://cache.example.com:443`.
    fn endpoint(&self) -> &str;

    /// The value sent in the `authorization` metadata of every request.
    fn auth_token(&self) -> &str;

    /// Whether the endpoint requires TLS.
    fn is_secure(&self) -> bool {
        self.endpoint().starts_with("https://")
    }
}

/// Credentials held as plain values.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentialProvider {
    endpoint: String,
    auth_token: String,
}

impl StaticCredentialProvider {
    pub fn new(endpoint: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_token: auth_token.into(),
        }
    }

    /// Reads the auth token from the environment variable `var`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if the variable is unset, not valid
    /// unicode, or empty.
    pub fn from_env(endpoint: impl Into<String>, var: &str) -> Result<Self> {
        let auth_token = std::env::var(var).map_err(|e| Error::Credentials {
            reason: format!("`{var}`: {e}"),
        })?;
        if auth_token.trim().is_empty() {
            return Err(Error::Credentials {
                reason: format!("`{var}` is empty"),
            });
        }
        Ok(Self::new(endpoint, auth_token))
    }

    #[must_use]
    pub fn with_endpoint(&self, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_token: self.auth_token.clone(),
        }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn auth_token(&self) -> &str {
        &self.auth_token
    }
}

// Keeps the token out of logs.
impl fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentialProvider")
            .field("endpoint", &self.endpoint)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}
