//! Credential storage

use super::types::CredentialRecord;
use std::sync::{PoisonError, RwLock};

/// Storage for the session credentials.
///
/// Implementations must be cheap to call and must not block on I/O; the
/// dispatcher reads the store before every attempt.
pub trait CredentialStore: Send + Sync {
    /// Snapshot of the current record
    fn load(&self) -> CredentialRecord;

    /// Replace the whole record (login)
    fn replace(&self, record: CredentialRecord);

    /// Store a renewed access token, and the rotated refresh token if any
    fn update_tokens(&self, access_token: String, refresh_token: Option<String>);

    /// Store a rotated CSRF token
    fn set_csrf_token(&self, csrf_token: String);

    /// Drop every credential (logout, unrecoverable auth failure)
    fn clear(&self);

    fn access_token(&self) -> Option<String> {
        self.load().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.load().refresh_token
    }

    fn csrf_token(&self) -> Option<String> {
        self.load().csrf_token
    }
}

/// In-process credential store.
///
/// Tokens live only in this process' memory and vanish with it.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: RwLock<CredentialRecord>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given credentials
    pub fn with_record(record: CredentialRecord) -> Self {
        Self {
            record: RwLock::new(record),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> CredentialRecord {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, record: CredentialRecord) {
        *self.record.write().unwrap_or_else(PoisonError::into_inner) = record;
    }

    fn update_tokens(&self, access_token: String, refresh_token: Option<String>) {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        record.access_token = Some(access_token);
        if let Some(refresh_token) = refresh_token {
            record.refresh_token = Some(refresh_token);
        }
    }

    fn set_csrf_token(&self, csrf_token: String) {
        self.record
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .csrf_token = Some(csrf_token);
    }

    fn clear(&self) {
        *self.record.write().unwrap_or_else(PoisonError::into_inner) = CredentialRecord::default();
    }

    fn access_token(&self) -> Option<String> {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh_token
            .clone()
    }

    fn csrf_token(&self) -> Option<String> {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .csrf_token
            .clone()
    }
}
