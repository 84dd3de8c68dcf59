use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use http::{HeaderMap, header};

/// Verified caller identity attached to a request after key lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Opaque user identifier recorded against usage.
    pub user_id: String,
    pub key_id: i64,
}

/// Why a key was rejected. Every variant collapses to the same
/// caller-visible unauthenticated kind; the distinction exists for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingKey,
    UnknownKey,
    KeyDisabled,
}

impl AuthRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthRejection::MissingKey => "missing api key",
            AuthRejection::UnknownKey => "unknown api key",
            AuthRejection::KeyDisabled => "api key disabled",
        }
    }
}

pub trait AuthProvider: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthRejection>;
}

#[derive(Debug, Clone)]
pub struct AuthKeyEntry {
    pub key_id: i64,
    pub user_id: i64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AuthSnapshot {
    pub keys_by_value: HashMap<String, AuthKeyEntry>,
}

/// In-memory key lookup over a hot-swappable snapshot loaded from storage.
#[derive(Debug)]
pub struct MemoryAuth {
    snapshot: ArcSwap<AuthSnapshot>,
}

impl MemoryAuth {
    pub fn new(snapshot: AuthSnapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(snapshot),
        }
    }

    pub fn replace_snapshot(&self, snapshot: AuthSnapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }
}

impl AuthProvider for MemoryAuth {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthRejection> {
        let api_key = extract_api_key(headers).ok_or(AuthRejection::MissingKey)?;

        let snapshot = self.snapshot.load();
        let entry = snapshot
            .keys_by_value
            .get(api_key.as_str())
            .ok_or(AuthRejection::UnknownKey)?;

        if !entry.enabled {
            return Err(AuthRejection::KeyDisabled);
        }

        Ok(Principal {
            user_id: entry.user_id.to_string(),
            key_id: entry.key_id,
        })
    }
}

fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    // 1) Authorization: Bearer <token>
    if let Some(value) = headers.get(header::AUTHORIZATION)
        && let Ok(s) = value.to_str()
    {
        let s = s.trim();
        let prefix = "Bearer ";
        if s.len() > prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
            let token = s[prefix.len()..].trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    // 2) x-api-key
    if let Some(value) = headers.get("x-api-key")
        && let Ok(s) = value.to_str()
    {
        let s = s.trim();
        if !s.is_empty() {
            return Some(s.to_string());
        }
    }

    None
}
