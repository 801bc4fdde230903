//! Delegated credentials scoped to one invocation.

use std::fmt;

use chrono::{DateTime, Utc};

/// Short-lived credentials returned by role assumption.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key identifier.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token bound to the assumed role.
    pub session_token: String,
    /// Expiry reported by the identity service.
    pub expiration: Option<DateTime<Utc>>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Credentials plus the region every client built from them should use.
///
/// Built once per invocation and shared read-only by every record pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedSession {
    credentials: Credentials,
    region: String,
}

impl ScopedSession {
    /// Bind credentials to a region.
    #[must_use]
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
        }
    }

    /// Credentials of the assumed role.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Region for clients built from the session.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }
}
