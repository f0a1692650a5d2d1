// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::imap::error::ImapError;
use crate::smtp::SendError;

/// Errors returned to the caller of the connection manager.
///
/// Everything else (watch-loop drops, body parse failures, teardown errors)
/// degrades to a default value and is only logged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManagerError {
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Authentication or transport failure while connecting.
    #[error("{0}")]
    ConnectionFailure(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Sending is not configured for this account")]
    SendNotConfigured,

    #[error("Send failed: {0}")]
    SendFailed(String),
}

impl ManagerError {
    /// Stable identifier the UI can branch on.
    pub fn code(&self) -> &'static str {
        match self {
            ManagerError::CapabilityUnavailable(_) => "capability-unavailable",
            ManagerError::ConnectionFailure(_) => "connection-failure",
            ManagerError::NotConnected => "not-connected",
            ManagerError::SendNotConfigured => "send-not-configured",
            ManagerError::SendFailed(_) => "send-failed",
        }
    }
}

impl From<ImapError> for ManagerError {
    fn from(err: ImapError) -> Self {
        ManagerError::ConnectionFailure(err.to_string())
    }
}

impl From<SendError> for ManagerError {
    fn from(err: SendError) -> Self {
        ManagerError::SendFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            ManagerError::CapabilityUnavailable("x".into()).code(),
            ManagerError::ConnectionFailure("x".into()).code(),
            ManagerError::NotConnected.code(),
            ManagerError::SendNotConfigured.code(),
            ManagerError::SendFailed("x".into()).code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in codes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_connection_failure_keeps_underlying_message() {
        let err: ManagerError = ImapError::Auth("invalid credentials".to_string()).into();
        assert_eq!(err.code(), "connection-failure");
        assert!(err.to_string().contains("invalid credentials"));
    }
}
