// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Library core for mailwatch.
//!
//! Owns one persistent IMAP session (plus an optional SMTP sender) per
//! configured account, keeps the unread count current through an IDLE watch
//! and serves header/body/send requests against that session.

// --- Modules ---
pub mod account;
pub mod body;
pub mod capability;
pub mod config;
pub mod error;
pub mod handlers;
pub mod imap;
pub mod notify;
pub mod registry;
pub mod session;
pub mod smtp;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;
pub mod utils;
mod watch;

pub mod prelude {
    // Config
    pub use crate::config::{Settings, WatchConfig};

    // Accounts and sessions
    pub use crate::account::{AccountCredentials, RelaySettings, ServerEndpoint};
    pub use crate::capability::Capability;
    pub use crate::error::ManagerError;
    pub use crate::handlers::{
        ComposeRequest, ComposeResult, ConnectResult, DisconnectResult, FetchResult, MailManager,
    };
    pub use crate::registry::SessionRegistry;
    pub use crate::session::Session;

    // Protocol seams
    pub use crate::imap::error::ImapError;
    pub use crate::imap::types::{MailboxSnapshot, MessageHeader, SequenceWindow, WatchEvent};
    pub use crate::notify::{NotificationSink, UnreadEvent, UnreadEventBus};
    pub use crate::smtp::{MailSender, OutgoingMessage, SendError};
    pub use crate::transport::{MailConnector, MailboxConnection, NetworkConnector};

    // Common Libs
    pub use log::{debug, error, info, trace, warn};
    pub use std::sync::Arc;
}
