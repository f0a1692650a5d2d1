// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::ManagerError;
use crate::imap::error::ImapError;
use crate::imap::types::{MessageHeader, SequenceWindow};
use crate::notify::NotificationSink;
use crate::smtp::{MailSender, OutgoingMessage};
use crate::transport::MailboxConnection;

/// How long disconnect waits for the watch loop to leave IDLE.
const WATCH_JOIN_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound on each CLOSE / LOGOUT during teardown.
const TEARDOWN_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// One live account: the inbound connection, its held folder, the optional
/// sender and the last unread count reported to the sink.
///
/// The watch loop and request handlers share the single connection. Handlers
/// go through [`Session::acquire`], which interrupts a running IDLE before
/// queueing on the (FIFO) connection mutex.
pub struct Session {
    account_id: String,
    folder: String,
    from_address: String,
    connection: Mutex<Box<dyn MailboxConnection>>,
    interrupt: Notify,
    unread: Mutex<u32>,
    sender: Option<Arc<dyn MailSender>>,
    sink: Arc<dyn NotificationSink>,
    connected: AtomicBool,
    torn_down: AtomicBool,
    cancel: CancellationToken,
    watch: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub(crate) fn new(
        account_id: String,
        folder: String,
        from_address: String,
        connection: Box<dyn MailboxConnection>,
        sender: Option<Arc<dyn MailSender>>,
        sink: Arc<dyn NotificationSink>,
        unread: u32,
    ) -> Self {
        Self {
            account_id,
            folder,
            from_address,
            connection: Mutex::new(connection),
            interrupt: Notify::new(),
            unread: Mutex::new(unread),
            sender,
            sink,
            connected: AtomicBool::new(true),
            torn_down: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            watch: Mutex::new(None),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    pub fn can_send(&self) -> bool {
        self.sender.is_some()
    }

    /// False once the connection was lost or the session was torn down.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    pub async fn unread_count(&self) -> u32 {
        *self.unread.lock().await
    }

    /// Newest `limit` headers of the held folder, newest first.
    pub async fn list_headers(&self, limit: u32) -> Result<Vec<MessageHeader>, ImapError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut connection = self.acquire().await;
        let snapshot = self.observe(connection.refresh(&self.folder).await)?;
        let Some(window) = SequenceWindow::newest(snapshot.exists, limit) else {
            debug!("Folder {} of {} is empty", self.folder, self.account_id);
            return Ok(Vec::new());
        };

        debug!("Fetching headers {} of {} for {}", window, self.folder, self.account_id);
        let mut headers = self.observe(connection.fetch_headers(window).await)?;
        drop(connection);

        headers.sort_by(|a, b| b.seq.cmp(&a.seq));
        Ok(headers)
    }

    /// Raw source of the message with `uid`, `None` if the server has no such message.
    pub async fn fetch_source(&self, uid: u32) -> Result<Option<Vec<u8>>, ImapError> {
        let mut connection = self.acquire().await;
        self.observe(connection.fetch_source(uid).await)
    }

    /// Send a plain-text message from this account's address.
    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), ManagerError> {
        let sender = self.sender.as_ref().ok_or(ManagerError::SendNotConfigured)?;
        sender
            .send(OutgoingMessage {
                from: self.from_address.clone(),
                to: to.to_string(),
                subject: subject.to_string(),
                text: text.to_string(),
            })
            .await?;
        Ok(())
    }

    /// Interrupt IDLE and wait for the connection.
    pub(crate) async fn acquire(&self) -> MutexGuard<'_, Box<dyn MailboxConnection>> {
        self.interrupt.notify_one();
        self.connection.lock().await
    }

    pub(crate) fn connection(&self) -> &Mutex<Box<dyn MailboxConnection>> {
        &self.connection
    }

    pub(crate) fn interrupt(&self) -> &Notify {
        &self.interrupt
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Pass a connection result through, marking the session dead on connection loss.
    pub(crate) fn observe<T>(&self, result: Result<T, ImapError>) -> Result<T, ImapError> {
        if let Err(err) = &result {
            if err.is_connection_loss() {
                self.mark_disconnected();
            }
        }
        result
    }

    pub(crate) fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            warn!("Session for {} lost its connection", self.account_id);
        }
    }

    /// Report the current count unconditionally (first report after connect).
    pub(crate) async fn announce_unread(&self) {
        let unread = self.unread.lock().await;
        self.sink.unread_changed(&self.account_id, *unread).await;
    }

    /// Store a freshly queried count; notify only when it differs.
    ///
    /// The lock is held across the notification so reports reach the sink
    /// in query order.
    pub(crate) async fn record_unread(&self, count: u32) -> bool {
        let mut unread = self.unread.lock().await;
        if *unread == count {
            return false;
        }
        *unread = count;
        debug!("Unread count for {} is now {}", self.account_id, count);
        self.sink.unread_changed(&self.account_id, count).await;
        true
    }

    pub(crate) async fn start_watch(self: &Arc<Self>, idle_timeout: Duration) {
        let handle = crate::watch::spawn(self, idle_timeout);
        *self.watch.lock().await = Some(handle);
    }

    /// Stop the watch loop, release the folder and log out.
    ///
    /// Idempotent. Never fails: every step logs its error and moves on.
    pub(crate) async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Tearing down session for {}", self.account_id);
        self.connected.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        self.interrupt.notify_one();

        if let Some(mut handle) = self.watch.lock().await.take() {
            if timeout(WATCH_JOIN_TIMEOUT, &mut handle).await.is_err() {
                warn!("Watch loop for {} did not stop in time; aborting", self.account_id);
                handle.abort();
            }
        }

        let mut connection = self.connection.lock().await;
        match timeout(TEARDOWN_STEP_TIMEOUT, connection.release_folder()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Releasing {} for {} failed: {}", self.folder, self.account_id, e),
            Err(_) => debug!("Releasing {} for {} timed out", self.folder, self.account_id),
        }
        match timeout(TEARDOWN_STEP_TIMEOUT, connection.logout()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Logout for {} failed: {}", self.account_id, e),
            Err(_) => debug!("Logout for {} timed out", self.account_id),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("account_id", &self.account_id)
            .field("folder", &self.folder)
            .field("connected", &self.is_connected())
            .field("can_send", &self.can_send())
            .finish()
    }
}
