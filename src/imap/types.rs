// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subject shown for messages that have none.
pub const NO_SUBJECT: &str = "(no subject)";

/// One row of a header listing. Read-only projection of server state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub uid: u32,
    pub subject: String,
    pub from: String,
    pub date: DateTime<Utc>,
    pub unread: bool,
    /// Sequence number at fetch time; only meaningful within one listing.
    #[serde(skip)]
    pub seq: u32,
}

/// Mailbox state returned when a folder is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxSnapshot {
    pub exists: u32,
    pub uid_validity: Option<u32>,
}

/// Inclusive range of sequence numbers covering the newest messages of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceWindow {
    pub start: u32,
    pub end: u32,
}

impl SequenceWindow {
    /// Window over the most recent `limit` of `exists` messages.
    ///
    /// Returns `None` when there is nothing to fetch. The lower bound never
    /// drops below 1.
    pub fn newest(exists: u32, limit: u32) -> Option<Self> {
        if exists == 0 || limit == 0 {
            return None;
        }
        let start = exists.saturating_sub(limit).saturating_add(1).max(1);
        Some(Self { start, end: exists })
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, seq: u32) -> bool {
        (self.start..=self.end).contains(&seq)
    }
}

impl fmt::Display for SequenceWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Outcome of one bounded wait for server push data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    /// The server reported a change to the watched folder.
    Changed,
    /// The server sent something that does not affect the folder (keepalive, status).
    Unrelated,
    /// The bounded wait elapsed without data; the watch must be re-armed.
    Timeout,
    /// Someone else asked for the connection.
    Interrupted,
}

#[cfg(feature = "imap")]
pub(crate) mod convert {
    use std::borrow::Cow;

    use async_imap::types::{Fetch, Flag};
    use chrono::Utc;

    use super::{MessageHeader, NO_SUBJECT};
    use crate::utils::mime_decoder::decode_header_bytes;

    fn text(bytes: &Option<Cow<'_, [u8]>>) -> Option<String> {
        bytes
            .as_ref()
            .map(|b| decode_header_bytes(b))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub(crate) fn header_from_fetch(fetch: &Fetch) -> MessageHeader {
        let envelope = fetch.envelope();

        let subject = envelope
            .and_then(|env| text(&env.subject))
            .unwrap_or_else(|| NO_SUBJECT.to_string());

        let from = envelope
            .and_then(|env| env.from.as_ref())
            .and_then(|addrs| addrs.first())
            .and_then(|addr| {
                text(&addr.name).or_else(|| {
                    let mailbox = text(&addr.mailbox)?;
                    Some(match text(&addr.host) {
                        Some(host) => format!("{}@{}", mailbox, host),
                        None => mailbox,
                    })
                })
            })
            .unwrap_or_default();

        let date = fetch
            .internal_date()
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let unread = !fetch.flags().any(|flag| matches!(flag, Flag::Seen));

        MessageHeader {
            uid: fetch.uid.unwrap_or(0),
            subject,
            from,
            date,
            unread,
            seq: fetch.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_covers_newest_messages() {
        let window = SequenceWindow::newest(10, 3).unwrap();
        assert_eq!(window, SequenceWindow { start: 8, end: 10 });
        assert_eq!(window.to_string(), "8:10");
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_window_clamps_to_one() {
        let window = SequenceWindow::newest(5, 30).unwrap();
        assert_eq!(window.start, 1);
        assert_eq!(window.end, 5);
        assert!(window.contains(1) && window.contains(5) && !window.contains(6));
    }

    #[test]
    fn test_window_empty_cases() {
        assert_eq!(SequenceWindow::newest(0, 30), None);
        assert_eq!(SequenceWindow::newest(12, 0), None);
    }

    #[test]
    fn test_header_serializes_without_sequence() {
        let header = MessageHeader {
            uid: 42,
            subject: "Hi".to_string(),
            from: "Bob".to_string(),
            date: DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap().with_timezone(&Utc),
            unread: true,
            seq: 7,
        };
        let json = serde_json::to_value(&header).unwrap();
        assert_eq!(json["uid"], 42);
        assert_eq!(json["unread"], true);
        assert!(json.get("seq").is_none());
    }
}
