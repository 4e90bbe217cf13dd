// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley messaging core.

use thiserror::Error;

/// Which webhook authentication step rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// The token embedded in the webhook path did not match.
    Token,
    /// The configured auth header was missing or did not match.
    Header,
}

/// The primary error type used across all Parley components.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Malformed input from the caller (bad address, missing field). Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// No active provider configuration exists for the tenant.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The addressed conversation or session does not exist for the tenant.
    #[error("not found: {0}")]
    NotFound(String),

    /// The stored provider name matches no registered provider client.
    #[error("unknown provider: {name}")]
    UnknownProvider { name: String },

    /// Webhook authentication failed.
    #[error("webhook authentication failed: {0:?} mismatch")]
    Auth(AuthFailure),

    /// The destination address is on the tenant's blacklist.
    #[error("address {address} is blacklisted")]
    Blacklisted { address: String },

    /// The tenant exhausted its outbound send window. Callers must back off.
    #[error("rate limit exceeded for tenant {tenant_id}: {max_messages} messages per {window_minutes} min")]
    RateLimited {
        tenant_id: i64,
        window_minutes: u64,
        max_messages: u32,
    },

    /// Third-party provider failure (rejected request, transport error, bad payload).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A bounded provider call did not complete in time.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Durable store failure (connection, query, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Shorthand for a provider error without an underlying cause.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true for failures caused by the caller's input or policy, as
    /// opposed to infrastructure failures.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound(_)
                | Self::Blacklisted { .. }
                | Self::RateLimited { .. }
                | Self::Auth(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_message_names_window() {
        let err = ParleyError::RateLimited {
            tenant_id: 42,
            window_minutes: 1,
            max_messages: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("tenant 42"));
        assert!(msg.contains("5 messages per 1 min"));
    }

    #[test]
    fn caller_errors_are_classified() {
        assert!(ParleyError::Validation("bad".into()).is_caller_error());
        assert!(ParleyError::Auth(AuthFailure::Token).is_caller_error());
        assert!(!ParleyError::provider("down").is_caller_error());
        assert!(
            !ParleyError::Timeout {
                duration: std::time::Duration::from_secs(5)
            }
            .is_caller_error()
        );
    }
}
