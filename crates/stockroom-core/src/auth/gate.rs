use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::store::{TokenError, TokenStore};

/// Role claim name used by WS-Federation style issuers.
const WS_ROLE_CLAIM: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

/// Facts read from a token payload. Nothing here has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: Option<String>,
    pub role: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl TokenClaims {
    /// A token without an expiry is treated as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry < now,
            None => true,
        }
    }
}

/// Decode the payload segment of a three-part token.
///
/// Returns `None` for anything that is not three dot-separated segments with
/// a base64url JSON object in the middle.
pub fn decode(token: &str) -> Option<TokenClaims> {
    let mut parts = token.trim().split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    if !claims.is_object() {
        return None;
    }

    Some(TokenClaims {
        subject: string_claim(&claims, "sub"),
        role: role_claim(&claims),
        expiry: expiry_claim(&claims),
    })
}

/// True only for a decodable token whose expiry is present and not in the past.
pub fn is_authenticated(token: &str, now: DateTime<Utc>) -> bool {
    decode(token).is_some_and(|claims| !claims.is_expired(now))
}

pub fn role(token: &str) -> Option<String> {
    decode(token).and_then(|claims| claims.role)
}

fn string_claim(claims: &Value, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(|value| value.as_str())
        .map(|value| value.to_string())
}

fn role_claim(claims: &Value) -> Option<String> {
    string_claim(claims, "role")
        .or_else(|| string_claim(claims, WS_ROLE_CLAIM))
        .or_else(|| {
            // Multi-role tokens: the first role drives the UI.
            ["role", "roles", WS_ROLE_CLAIM].iter().find_map(|name| {
                claims
                    .get(*name)
                    .and_then(|value| value.as_array())
                    .and_then(|roles| roles.iter().find_map(|r| r.as_str()))
                    .map(|r| r.to_string())
            })
        })
}

fn expiry_claim(claims: &Value) -> Option<DateTime<Utc>> {
    let exp = claims.get("exp")?;
    let seconds = exp
        .as_i64()
        .or_else(|| exp.as_f64().map(|f| f.floor() as i64))?;
    DateTime::from_timestamp(seconds, 0)
}

/// Result of checking the stored token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    SignedOut,
    SignedIn(TokenClaims),
}

impl AuthStatus {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, AuthStatus::SignedIn(_))
    }
}

/// Advisory gate over the stored bearer token.
///
/// Decides which controls to show and which token to attach to requests.
/// Any stored token that fails to decode or has expired is discarded when
/// it is checked.
#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn TokenStore>,
    write_roles: Vec<String>,
}

impl AuthGate {
    pub fn new(store: Arc<dyn TokenStore>, write_roles: Vec<String>) -> Self {
        Self { store, write_roles }
    }

    /// Check the stored token, discarding it if it is no longer usable.
    pub fn status(&self, now: DateTime<Utc>) -> AuthStatus {
        match self.checked(now) {
            Some((_, claims)) => AuthStatus::SignedIn(claims),
            None => AuthStatus::SignedOut,
        }
    }

    /// The token to send as `Authorization: Bearer`, if one is still usable.
    pub fn bearer(&self, now: DateTime<Utc>) -> Option<String> {
        self.checked(now).map(|(token, _)| token)
    }

    /// Load the stored token once and return it with its claims if usable.
    fn checked(&self, now: DateTime<Utc>) -> Option<(String, TokenClaims)> {
        let token = match self.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                return None;
            }
        };

        match decode(&token) {
            Some(claims) if !claims.is_expired(now) => Some((token, claims)),
            Some(_) => {
                info!("Stored token expired, discarding");
                self.discard();
                None
            }
            None => {
                warn!("Stored token could not be decoded, discarding");
                self.discard();
                None
            }
        }
    }

    /// Whether a token is stored at all, without validating it.
    pub fn has_token(&self) -> bool {
        matches!(self.store.load(), Ok(Some(_)))
    }

    /// Whether write-capable controls should be shown.
    pub fn can_write(&self, now: DateTime<Utc>) -> bool {
        match self.status(now) {
            AuthStatus::SignedIn(claims) => claims.role.as_deref().is_some_and(|role| {
                self.write_roles
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(role))
            }),
            AuthStatus::SignedOut => false,
        }
    }

    /// Store a token handed out by the sign-in flow.
    ///
    /// Tokens that are malformed or already expired are refused rather than
    /// stored only to be discarded on the next check.
    pub fn sign_in(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let token = token.trim();
        let claims = decode(token).ok_or(TokenError::Malformed)?;
        if claims.is_expired(now) {
            return Err(TokenError::Expired);
        }
        self.store.store(token)?;
        debug!(subject = ?claims.subject, role = ?claims.role, "Token stored");
        Ok(claims)
    }

    pub fn sign_out(&self) -> Result<(), TokenError> {
        self.store.clear()
    }

    fn discard(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to discard stored token");
        }
    }
}
