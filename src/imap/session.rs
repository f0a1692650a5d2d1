// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::time::Duration;

use async_imap::extensions::idle::IdleResponse;
use async_imap::imap_proto::{MailboxDatum, Response};
use async_imap::types::UnsolicitedResponse;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::debug;
use tokio::sync::Notify;

use crate::imap::client::UnderlyingImapSession;
use crate::imap::error::ImapError;
use crate::imap::types::{convert::header_from_fetch, MailboxSnapshot, MessageHeader, SequenceWindow, WatchEvent};
use crate::transport::MailboxConnection;

const HEADER_QUERY: &str = "(UID FLAGS ENVELOPE INTERNALDATE)";
const SOURCE_QUERY: &str = "(UID BODY.PEEK[])";

/// True for push data that changes the watched folder.
fn affects_folder(response: &Response<'_>) -> bool {
    matches!(
        response,
        Response::Expunge(_)
            | Response::Fetch(..)
            | Response::MailboxData(MailboxDatum::Exists(_))
            | Response::MailboxData(MailboxDatum::Recent(_))
    )
}

/// Same test for a response queued while a command ran.
fn unsolicited_affects_folder(response: &UnsolicitedResponse) -> bool {
    match response {
        UnsolicitedResponse::Exists(_) | UnsolicitedResponse::Expunge(_) | UnsolicitedResponse::Recent(_) => true,
        UnsolicitedResponse::Other(data) => affects_folder(data.parsed()),
        _ => false,
    }
}

/// `MailboxConnection` over a live async-imap session.
///
/// The session is `None` while IDLE owns it and after it has been lost.
/// `pending_change` records folder changes the server reported alongside
/// other commands; the next wait reports them instead of entering IDLE.
pub struct AsyncImapConnection {
    session: Option<UnderlyingImapSession>,
    selected: Option<String>,
    exists: u32,
    pending_change: bool,
}

impl AsyncImapConnection {
    pub(crate) fn new(session: UnderlyingImapSession) -> Self {
        Self {
            session: Some(session),
            selected: None,
            exists: 0,
            pending_change: false,
        }
    }

    fn session(&mut self) -> Result<&mut UnderlyingImapSession, ImapError> {
        self.session.as_mut().ok_or(ImapError::Disconnected)
    }

    /// Run a command result through loss detection; a lost connection drops the session.
    fn check<T>(&mut self, result: Result<T, async_imap::error::Error>) -> Result<T, ImapError> {
        result.map_err(|e| {
            let err = ImapError::from(e);
            if err.is_connection_loss() {
                self.session = None;
            }
            err
        })
    }

    /// Consume unsolicited responses queued while a command ran, keeping
    /// the message count current and remembering folder changes.
    fn drain_unsolicited(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        while let Ok(response) = session.unsolicited_responses.try_recv() {
            match &response {
                UnsolicitedResponse::Exists(n) => self.exists = *n,
                UnsolicitedResponse::Expunge(_) => self.exists = self.exists.saturating_sub(1),
                _ => {}
            }
            if unsolicited_affects_folder(&response) {
                debug!("Folder change reported outside IDLE: {:?}", response);
                self.pending_change = true;
            }
        }
    }

    async fn select(&mut self, folder: &str) -> Result<MailboxSnapshot, ImapError> {
        let result = self.session()?.select(folder).await;
        let mailbox = self.check(result)?;
        self.exists = mailbox.exists;
        self.drain_unsolicited();
        Ok(MailboxSnapshot {
            exists: self.exists,
            uid_validity: mailbox.uid_validity,
        })
    }

    fn holds(&self, folder: &str) -> bool {
        self.selected.as_deref() == Some(folder)
    }
}

#[async_trait]
impl MailboxConnection for AsyncImapConnection {
    async fn hold_folder(&mut self, folder: &str) -> Result<MailboxSnapshot, ImapError> {
        let snapshot = self.select(folder).await?;
        self.selected = Some(folder.to_string());
        Ok(snapshot)
    }

    async fn release_folder(&mut self) -> Result<(), ImapError> {
        if self.selected.take().is_none() {
            return Ok(());
        }
        let result = self.session()?.close().await;
        self.check(result)
    }

    /// NOOP on the held folder; the size comes from the EXISTS/EXPUNGE
    /// responses it flushes. Any other folder is selected instead.
    async fn refresh(&mut self, folder: &str) -> Result<MailboxSnapshot, ImapError> {
        if !self.holds(folder) {
            return self.select(folder).await;
        }
        let result = self.session()?.noop().await;
        self.check(result)?;
        self.drain_unsolicited();
        Ok(MailboxSnapshot {
            exists: self.exists,
            uid_validity: None,
        })
    }

    /// SEARCH UNSEEN on the held folder (STATUS must not target the
    /// selected mailbox); STATUS for any other folder.
    async fn unseen(&mut self, folder: &str) -> Result<u32, ImapError> {
        self.pending_change = false;
        if self.holds(folder) {
            let result = self.session()?.search("UNSEEN").await;
            let matches = self.check(result)?;
            self.drain_unsolicited();
            return Ok(matches.len() as u32);
        }
        let result = self.session()?.status(folder, "(UNSEEN)").await;
        let mailbox = self.check(result)?;
        self.drain_unsolicited();
        Ok(mailbox.unseen.unwrap_or(0))
    }

    async fn fetch_headers(&mut self, window: SequenceWindow) -> Result<Vec<MessageHeader>, ImapError> {
        let sequence = window.to_string();
        let session = self.session()?;
        let result = match session.fetch(&sequence, HEADER_QUERY).await {
            Ok(stream) => stream.try_collect::<Vec<_>>().await,
            Err(e) => Err(e),
        };
        let fetches = self.check(result)?;
        self.drain_unsolicited();

        Ok(fetches
            .iter()
            .filter(|fetch| window.contains(fetch.message))
            .map(header_from_fetch)
            .collect())
    }

    async fn fetch_source(&mut self, uid: u32) -> Result<Option<Vec<u8>>, ImapError> {
        let session = self.session()?;
        let result = match session.uid_fetch(uid.to_string(), SOURCE_QUERY).await {
            Ok(stream) => stream.try_collect::<Vec<_>>().await,
            Err(e) => Err(e),
        };
        let fetches = self.check(result)?;
        self.drain_unsolicited();

        Ok(fetches
            .into_iter()
            .find(|fetch| fetch.uid == Some(uid))
            .and_then(|fetch| fetch.body().map(|b| b.to_vec())))
    }

    async fn wait_for_change(&mut self, idle_timeout: Duration, interrupt: &Notify) -> Result<WatchEvent, ImapError> {
        if self.pending_change {
            return Ok(WatchEvent::Changed);
        }
        let session = self.session.take().ok_or(ImapError::Disconnected)?;
        let mut handle = session.idle();

        // The session is gone if IDLE cannot start or stop cleanly.
        handle
            .init()
            .await
            .map_err(|e| ImapError::Connection(format!("IDLE start failed: {}", e)))?;

        let outcome = {
            let (idle_wait, stop) = handle.wait_with_timeout(idle_timeout);
            tokio::pin!(idle_wait);
            tokio::select! {
                response = &mut idle_wait => response,
                _ = interrupt.notified() => {
                    drop(stop);
                    idle_wait.await
                }
            }
        };

        let session = handle
            .done()
            .await
            .map_err(|e| ImapError::Connection(format!("IDLE DONE failed: {}", e)))?;
        self.session = Some(session);

        let event = match outcome.map_err(ImapError::from)? {
            IdleResponse::NewData(data) if affects_folder(data.parsed()) => WatchEvent::Changed,
            IdleResponse::NewData(_) => WatchEvent::Unrelated,
            IdleResponse::Timeout => WatchEvent::Timeout,
            IdleResponse::ManualInterrupt => WatchEvent::Interrupted,
        };
        self.drain_unsolicited();
        Ok(event)
    }

    async fn logout(&mut self) -> Result<(), ImapError> {
        self.selected = None;
        self.pending_change = false;
        match self.session.take() {
            Some(mut session) => session.logout().await.map_err(ImapError::from),
            None => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_changes_are_recognised() {
        assert!(affects_folder(&Response::Expunge(3)));
        assert!(affects_folder(&Response::MailboxData(MailboxDatum::Exists(11))));
        assert!(affects_folder(&Response::MailboxData(MailboxDatum::Recent(1))));
    }

    #[test]
    fn test_queued_size_changes_are_recognised() {
        assert!(unsolicited_affects_folder(&UnsolicitedResponse::Exists(12)));
        assert!(unsolicited_affects_folder(&UnsolicitedResponse::Expunge(4)));
        assert!(unsolicited_affects_folder(&UnsolicitedResponse::Recent(1)));
    }

    #[test]
    fn test_queued_status_is_unrelated() {
        assert!(!unsolicited_affects_folder(&UnsolicitedResponse::Status {
            mailbox: "Archive".to_string(),
            attributes: Vec::new(),
        }));
    }

    #[test]
    fn test_flag_listing_is_unrelated() {
        assert!(!affects_folder(&Response::MailboxData(MailboxDatum::Flags(Vec::new()))));
    }
}
