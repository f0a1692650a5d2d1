// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::account::AccountCredentials;
use crate::capability::Capability;
use crate::config::WatchConfig;
use crate::imap::error::ImapError;
use crate::imap::types::{MailboxSnapshot, MessageHeader, SequenceWindow, WatchEvent};
use crate::smtp::{MailSender, SendError};

/// One live, authenticated inbound connection.
///
/// Implementations take `&mut self`: a session keeps its connection behind a
/// mutex and hands it to one caller at a time.
#[async_trait]
pub trait MailboxConnection: Send {
    /// Select `folder` and keep it selected until `release_folder`.
    async fn hold_folder(&mut self, folder: &str) -> Result<MailboxSnapshot, ImapError>;

    /// Give up the folder selected by `hold_folder`.
    async fn release_folder(&mut self) -> Result<(), ImapError>;

    /// Current size of `folder`, keeping the hold.
    async fn refresh(&mut self, folder: &str) -> Result<MailboxSnapshot, ImapError>;

    /// Server-reported count of unseen messages in `folder`.
    async fn unseen(&mut self, folder: &str) -> Result<u32, ImapError>;

    /// Envelope, flags, UID and internal date for every message in `window`.
    async fn fetch_headers(&mut self, window: SequenceWindow) -> Result<Vec<MessageHeader>, ImapError>;

    /// Full RFC 5322 source of the message with `uid`, without marking it seen.
    async fn fetch_source(&mut self, uid: u32) -> Result<Option<Vec<u8>>, ImapError>;

    /// Block until the server pushes data, `timeout` elapses, or `interrupt` fires.
    ///
    /// A folder change the server reported during an earlier command is
    /// returned as `Changed` without waiting.
    async fn wait_for_change(
        &mut self,
        timeout: Duration,
        interrupt: &Notify,
    ) -> Result<WatchEvent, ImapError>;

    async fn logout(&mut self) -> Result<(), ImapError>;

    fn is_connected(&self) -> bool;
}

/// Opens connections for the registry.
#[async_trait]
pub trait MailConnector: Send + Sync {
    /// Which protocols this connector can serve.
    fn capability(&self) -> Capability;

    /// Connect and authenticate against the account's inbound server.
    async fn open(
        &self,
        credentials: &AccountCredentials,
        config: &WatchConfig,
    ) -> Result<Box<dyn MailboxConnection>, ImapError>;

    /// Outbound sender for the account, or `None` without relay settings.
    fn sender(&self, credentials: &AccountCredentials) -> Result<Option<Arc<dyn MailSender>>, SendError>;
}

/// Connector that talks to real servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkConnector;

impl NetworkConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailConnector for NetworkConnector {
    fn capability(&self) -> Capability {
        Capability::detect()
    }

    #[cfg(feature = "imap")]
    async fn open(
        &self,
        credentials: &AccountCredentials,
        config: &WatchConfig,
    ) -> Result<Box<dyn MailboxConnection>, ImapError> {
        let connection = crate::imap::client::connect(&credentials.imap, config.connect_timeout).await?;
        Ok(Box::new(connection))
    }

    #[cfg(not(feature = "imap"))]
    async fn open(
        &self,
        _credentials: &AccountCredentials,
        _config: &WatchConfig,
    ) -> Result<Box<dyn MailboxConnection>, ImapError> {
        Err(ImapError::Other(Capability::Unavailable.unavailable_reason().to_string()))
    }

    #[cfg(feature = "smtp")]
    fn sender(&self, credentials: &AccountCredentials) -> Result<Option<Arc<dyn MailSender>>, SendError> {
        let sender = crate::smtp::SmtpSender::from_credentials(credentials)?;
        Ok(sender.map(|s| Arc::new(s) as Arc<dyn MailSender>))
    }

    #[cfg(not(feature = "smtp"))]
    fn sender(&self, _credentials: &AccountCredentials) -> Result<Option<Arc<dyn MailSender>>, SendError> {
        Ok(None)
    }
}
