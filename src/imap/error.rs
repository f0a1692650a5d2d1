// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImapError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Mailbox error: {0}")]
    Mailbox(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Connection is closed")]
    Disconnected,

    #[error("Other error: {0}")]
    Other(String),
}

impl ImapError {
    /// True when the underlying connection can no longer be used.
    ///
    /// Command-level rejections (NO/BAD, unknown mailbox) leave the
    /// connection usable and return false.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            ImapError::Connection(_) | ImapError::Tls(_) | ImapError::Timeout(_) | ImapError::Disconnected
        )
    }
}

#[cfg(feature = "imap")]
impl From<async_imap::error::Error> for ImapError {
    fn from(err: async_imap::error::Error) -> Self {
        match err {
            async_imap::error::Error::Parse(e) => ImapError::Parse(e.to_string()),
            async_imap::error::Error::No(msg) => ImapError::Mailbox(msg),
            async_imap::error::Error::Bad(msg) => ImapError::Mailbox(msg),
            async_imap::error::Error::Io(e) => ImapError::Connection(e.to_string()),
            async_imap::error::Error::ConnectionLost => ImapError::Disconnected,
            async_imap::error::Error::Validate(e) => ImapError::Other(e.to_string()),
            other => ImapError::Other(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ImapError {
    fn from(err: std::io::Error) -> Self {
        ImapError::Connection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_loss_classification() {
        assert!(ImapError::Disconnected.is_connection_loss());
        assert!(ImapError::Connection("reset".into()).is_connection_loss());
        assert!(ImapError::Timeout("idle".into()).is_connection_loss());
        assert!(!ImapError::Mailbox("no such folder".into()).is_connection_loss());
        assert!(!ImapError::Auth("bad password".into()).is_connection_loss());
    }

    #[test]
    fn test_io_error_maps_to_connection() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset");
        let err = ImapError::from(io);
        assert!(matches!(err, ImapError::Connection(ref msg) if msg.contains("peer reset")));
    }
}
