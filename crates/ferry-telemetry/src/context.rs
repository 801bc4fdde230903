//! Span helpers that carry invocation and record identifiers.
//!
//! # Design
//! - One process-level span tags every log line with the service name and build.
//! - Each invocation gets its own span with a correlation id; record spans nest inside it.

use tracing::{Span, span::Entered};
use uuid::Uuid;

use crate::init::build_sha;

/// Guard that keeps the process-level span entered for the lifetime of the process.
pub struct ProcessContextGuard {
    _guard: Entered<'static>,
}

impl ProcessContextGuard {
    /// Enter the process-level tracing span for the lifetime of the guard.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        let service = service.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("ferry", service = %service, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Span covering one handler invocation.
#[must_use]
pub fn invocation_span(invocation_id: Uuid) -> Span {
    tracing::info_span!(
        "invocation",
        invocation_id = %invocation_id,
        records = tracing::field::Empty
    )
}

/// Span covering one record pipeline.
#[must_use]
pub fn record_span(bucket: &str, key: &str, destination: &str) -> Span {
    tracing::info_span!("record", bucket = %bucket, key = %key, destination = %destination)
}
