use std::sync::Mutex;

use keyring::Entry;
use thiserror::Error;

/// Keychain service name for the stored token
const SERVICE_NAME: &str = "stockroom";

/// Keychain account under which the bearer token is stored
const TOKEN_ACCOUNT: &str = "bearer-token";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not a well-formed three-part token")]
    Malformed,

    #[error("token has expired or carries no expiry")]
    Expired,

    #[error("token storage failed: {0}")]
    Storage(String),
}

/// Client-side storage for the single bearer token.
///
/// The token is the only state that survives between sessions.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, TokenError>;

    fn store(&self, token: &str) -> Result<(), TokenError>;

    fn clear(&self) -> Result<(), TokenError>;
}

/// Token storage in the OS keychain.
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a different keychain service, e.g. one per API environment.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry, TokenError> {
        Entry::new(&self.service, TOKEN_ACCOUNT)
            .map_err(|e| TokenError::Storage(format!("Failed to create keyring entry: {}", e)))
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<String>, TokenError> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(TokenError::Storage(format!(
                "Failed to retrieve token from keychain: {}",
                e
            ))),
        }
    }

    fn store(&self, token: &str) -> Result<(), TokenError> {
        self.entry()?
            .set_password(token)
            .map_err(|e| TokenError::Storage(format!("Failed to store token in keychain: {}", e)))
    }

    fn clear(&self) -> Result<(), TokenError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(TokenError::Storage(format!(
                "Failed to delete token from keychain: {}",
                e
            ))),
        }
    }
}

/// Token storage that lives only as long as the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, TokenError> {
        Ok(self.slot().clone())
    }

    fn store(&self, token: &str) -> Result<(), TokenError> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenError> {
        *self.slot() = None;
        Ok(())
    }
}
