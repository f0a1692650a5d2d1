// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Human-readable body extraction for a raw RFC 5322 message.
//!
//! Extraction never fails: every failure path yields one of the sentinel
//! strings below so the UI always has something to display.

use log::{debug, warn};
use mail_parser::Message;

pub const DISCONNECTED: &str = "(disconnected)";
pub const NO_CONTENT: &str = "(no content)";
pub const PARSE_FAILED: &str = "(failed to parse message)";
pub const MESSAGE_NOT_FOUND: &str = "(message not found)";
pub const FETCH_FAILED: &str = "(failed to fetch message)";

/// Plain text if the message has it, HTML otherwise, `NO_CONTENT` if neither.
pub fn extract_text(raw: &[u8]) -> String {
    if raw.iter().all(|b| b.is_ascii_whitespace()) {
        warn!("Message source is empty; nothing to parse");
        return PARSE_FAILED.to_string();
    }

    let Some(message) = Message::parse(raw) else {
        warn!("Failed to parse message of {} bytes", raw.len());
        return PARSE_FAILED.to_string();
    };

    if let Some(text) = message.body_text(0).filter(|t| !t.trim().is_empty()) {
        return text.into_owned();
    }

    if let Some(html) = message.body_html(0).filter(|h| !h.trim().is_empty()) {
        debug!("No text/plain part, falling back to HTML body");
        return html.into_owned();
    }

    NO_CONTENT.to_string()
}
