// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-memory doubles for the transport seam.
//!
//! `MockConnector` hands out `MockConnection`s that share one scripted
//! server state: a message list, a queue of unseen counts, a push-event
//! channel and failure switches. Every call is counted.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{mpsc, Mutex as TokioMutex, Notify};
use tokio::time::{sleep, Instant};

use crate::account::{AccountCredentials, RelaySettings, ServerEndpoint};
use crate::capability::Capability;
use crate::config::WatchConfig;
use crate::imap::error::ImapError;
use crate::imap::types::{MailboxSnapshot, MessageHeader, SequenceWindow, WatchEvent};
use crate::notify::NotificationSink;
use crate::smtp::{MailSender, OutgoingMessage, SendError};
use crate::transport::{MailConnector, MailboxConnection};

/// Inbound-only credentials for `user@example.com`.
pub fn credentials(user: &str) -> AccountCredentials {
    AccountCredentials {
        imap: ServerEndpoint {
            host: "imap.example.com".to_string(),
            port: 993,
            secure: true,
            user: format!("{}@example.com", user),
            pass: "secret".to_string(),
        },
        smtp: None,
        folder: None,
    }
}

/// Credentials with an SMTP relay.
pub fn credentials_with_relay(user: &str) -> AccountCredentials {
    let mut creds = credentials(user);
    creds.smtp = Some(RelaySettings {
        host: "smtp.example.com".to_string(),
        port: 465,
        secure: true,
        user: None,
        pass: None,
        from: None,
    });
    creds
}

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub uid: u32,
    pub subject: String,
    pub from: String,
    pub unread: bool,
    pub source: Vec<u8>,
}

impl MockMessage {
    pub fn new(uid: u32, subject: &str, source: &[u8]) -> Self {
        Self {
            uid,
            subject: subject.to_string(),
            from: "Sender".to_string(),
            unread: true,
            source: source.to_vec(),
        }
    }
}

/// Server state shared by every connection the connector opens.
pub struct MockServer {
    open_count: TokioMutex<u32>,
    hold_count: TokioMutex<u32>,
    release_count: TokioMutex<u32>,
    logout_count: TokioMutex<u32>,
    unseen_count: TokioMutex<u32>,
    fetch_headers_count: TokioMutex<u32>,
    fetch_source_count: TokioMutex<u32>,
    open_delay: TokioMutex<Duration>,
    open_failure: TokioMutex<Option<ImapError>>,
    hold_failure: TokioMutex<Option<ImapError>>,
    command_failure: TokioMutex<Option<ImapError>>,
    change_during_command: TokioMutex<bool>,
    messages: TokioMutex<Vec<MockMessage>>,
    unseen_script: TokioMutex<VecDeque<u32>>,
    last_unseen: TokioMutex<u32>,
    events_tx: mpsc::UnboundedSender<Result<WatchEvent, ImapError>>,
    events_rx: TokioMutex<mpsc::UnboundedReceiver<Result<WatchEvent, ImapError>>>,
}

impl MockServer {
    fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            open_count: TokioMutex::new(0),
            hold_count: TokioMutex::new(0),
            release_count: TokioMutex::new(0),
            logout_count: TokioMutex::new(0),
            unseen_count: TokioMutex::new(0),
            fetch_headers_count: TokioMutex::new(0),
            fetch_source_count: TokioMutex::new(0),
            open_delay: TokioMutex::new(Duration::ZERO),
            open_failure: TokioMutex::new(None),
            hold_failure: TokioMutex::new(None),
            command_failure: TokioMutex::new(None),
            change_during_command: TokioMutex::new(false),
            messages: TokioMutex::new(Vec::new()),
            unseen_script: TokioMutex::new(VecDeque::new()),
            last_unseen: TokioMutex::new(0),
            events_tx,
            events_rx: TokioMutex::new(events_rx),
        }
    }

    async fn bump(counter: &TokioMutex<u32>) {
        *counter.lock().await += 1;
    }

    async fn command_result(&self) -> Result<(), ImapError> {
        match self.command_failure.lock().await.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// True once after `report_change_during_next_command`.
    async fn take_change(&self) -> bool {
        std::mem::take(&mut *self.change_during_command.lock().await)
    }

    async fn next_unseen(&self) -> u32 {
        let mut last = self.last_unseen.lock().await;
        if let Some(next) = self.unseen_script.lock().await.pop_front() {
            *last = next;
        }
        *last
    }
}

/// Connector over a [`MockServer`].
pub struct MockConnector {
    server: Arc<MockServer>,
    capability: Capability,
    sender: Option<Arc<MockSender>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// Inbound and outbound available, with a recording sender.
    pub fn new() -> Self {
        Self {
            server: Arc::new(MockServer::new()),
            capability: Capability::WithSend,
            sender: Some(Arc::new(MockSender::new())),
        }
    }

    pub fn with_capability(capability: Capability) -> Self {
        Self {
            capability,
            ..Self::new()
        }
    }

    pub fn mock_sender(&self) -> Option<Arc<MockSender>> {
        self.sender.clone()
    }

    // --- Script ---

    pub async fn set_messages(&self, messages: Vec<MockMessage>) {
        *self.server.messages.lock().await = messages;
    }

    /// Mailbox of `count` messages with uids `1000 + seq`.
    pub async fn fill_mailbox(&self, count: u32) {
        let messages = (1..=count)
            .map(|seq| MockMessage::new(1000 + seq, &format!("Message {}", seq), b"Subject: x\r\n\r\nbody\r\n"))
            .collect();
        self.set_messages(messages).await;
    }

    /// Values returned by successive unseen queries; the last one repeats.
    pub async fn script_unseen(&self, counts: &[u32]) {
        self.server.unseen_script.lock().await.extend(counts.iter().copied());
    }

    /// Deliver a push event to whichever connection is idling.
    pub fn push(&self, event: WatchEvent) {
        let _ = self.server.events_tx.send(Ok(event));
    }

    /// Make the idling connection fail.
    pub fn push_error(&self, error: ImapError) {
        let _ = self.server.events_tx.send(Err(error));
    }

    /// The next listing or fetch command sees new mail arrive (an EXISTS
    /// alongside its own responses) instead of during IDLE.
    pub async fn report_change_during_next_command(&self) {
        *self.server.change_during_command.lock().await = true;
    }

    pub async fn set_open_delay(&self, delay: Duration) {
        *self.server.open_delay.lock().await = delay;
    }

    pub async fn fail_open(&self, error: Option<ImapError>) {
        *self.server.open_failure.lock().await = error;
    }

    pub async fn fail_hold(&self, error: Option<ImapError>) {
        *self.server.hold_failure.lock().await = error;
    }

    /// Fail listing and fetching commands.
    pub async fn fail_commands(&self, error: Option<ImapError>) {
        *self.server.command_failure.lock().await = error;
    }

    // --- Counters ---

    pub async fn open_count(&self) -> u32 {
        *self.server.open_count.lock().await
    }

    pub async fn hold_count(&self) -> u32 {
        *self.server.hold_count.lock().await
    }

    pub async fn release_count(&self) -> u32 {
        *self.server.release_count.lock().await
    }

    pub async fn logout_count(&self) -> u32 {
        *self.server.logout_count.lock().await
    }

    pub async fn unseen_count(&self) -> u32 {
        *self.server.unseen_count.lock().await
    }

    pub async fn fetch_headers_count(&self) -> u32 {
        *self.server.fetch_headers_count.lock().await
    }

    pub async fn fetch_source_count(&self) -> u32 {
        *self.server.fetch_source_count.lock().await
    }
}

#[async_trait]
impl MailConnector for MockConnector {
    fn capability(&self) -> Capability {
        self.capability
    }

    async fn open(
        &self,
        _credentials: &AccountCredentials,
        _config: &WatchConfig,
    ) -> Result<Box<dyn MailboxConnection>, ImapError> {
        MockServer::bump(&self.server.open_count).await;

        let delay = *self.server.open_delay.lock().await;
        if !delay.is_zero() {
            sleep(delay).await;
        }

        if let Some(err) = self.server.open_failure.lock().await.clone() {
            return Err(err);
        }

        Ok(Box::new(MockConnection {
            server: Arc::clone(&self.server),
            connected: true,
            holding: false,
            pending_change: false,
        }))
    }

    fn sender(&self, credentials: &AccountCredentials) -> Result<Option<Arc<dyn MailSender>>, SendError> {
        if !credentials.has_relay() {
            return Ok(None);
        }
        Ok(self.sender.clone().map(|s| s as Arc<dyn MailSender>))
    }
}

pub struct MockConnection {
    server: Arc<MockServer>,
    connected: bool,
    holding: bool,
    pending_change: bool,
}

impl MockConnection {
    fn ensure_connected(&self) -> Result<(), ImapError> {
        if self.connected {
            Ok(())
        } else {
            Err(ImapError::Disconnected)
        }
    }

    fn note(&mut self, err: ImapError) -> ImapError {
        if err.is_connection_loss() {
            self.connected = false;
        }
        err
    }

    /// Commands that complete may carry a scripted folder change.
    async fn observe_command(&mut self) {
        if self.server.take_change().await {
            self.pending_change = true;
        }
    }

    fn sample_date(seq: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + i64::from(seq) * 60, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[async_trait]
impl MailboxConnection for MockConnection {
    async fn hold_folder(&mut self, folder: &str) -> Result<MailboxSnapshot, ImapError> {
        self.ensure_connected()?;
        MockServer::bump(&self.server.hold_count).await;
        let failure = self.server.hold_failure.lock().await.clone();
        if let Some(err) = failure {
            return Err(err);
        }
        self.holding = true;
        self.refresh(folder).await
    }

    async fn release_folder(&mut self) -> Result<(), ImapError> {
        self.ensure_connected()?;
        if self.holding {
            self.holding = false;
            MockServer::bump(&self.server.release_count).await;
        }
        Ok(())
    }

    async fn refresh(&mut self, _folder: &str) -> Result<MailboxSnapshot, ImapError> {
        self.ensure_connected()?;
        let allowed = self.server.command_result().await;
        if let Err(err) = allowed {
            return Err(self.note(err));
        }
        self.observe_command().await;
        let exists = self.server.messages.lock().await.len() as u32;
        Ok(MailboxSnapshot {
            exists,
            uid_validity: Some(1),
        })
    }

    async fn unseen(&mut self, _folder: &str) -> Result<u32, ImapError> {
        self.ensure_connected()?;
        MockServer::bump(&self.server.unseen_count).await;
        self.pending_change = false;
        Ok(self.server.next_unseen().await)
    }

    async fn fetch_headers(&mut self, window: SequenceWindow) -> Result<Vec<MessageHeader>, ImapError> {
        self.ensure_connected()?;
        MockServer::bump(&self.server.fetch_headers_count).await;
        let allowed = self.server.command_result().await;
        if let Err(err) = allowed {
            return Err(self.note(err));
        }
        self.observe_command().await;

        let messages = self.server.messages.lock().await;
        Ok(messages
            .iter()
            .enumerate()
            .map(|(idx, msg)| (idx as u32 + 1, msg))
            .filter(|(seq, _)| window.contains(*seq))
            .map(|(seq, msg)| MessageHeader {
                uid: msg.uid,
                subject: msg.subject.clone(),
                from: msg.from.clone(),
                date: Self::sample_date(seq),
                unread: msg.unread,
                seq,
            })
            .collect())
    }

    async fn fetch_source(&mut self, uid: u32) -> Result<Option<Vec<u8>>, ImapError> {
        self.ensure_connected()?;
        MockServer::bump(&self.server.fetch_source_count).await;
        let allowed = self.server.command_result().await;
        if let Err(err) = allowed {
            return Err(self.note(err));
        }
        self.observe_command().await;

        let messages = self.server.messages.lock().await;
        Ok(messages.iter().find(|m| m.uid == uid).map(|m| m.source.clone()))
    }

    async fn wait_for_change(&mut self, timeout: Duration, interrupt: &Notify) -> Result<WatchEvent, ImapError> {
        self.ensure_connected()?;
        if self.pending_change {
            return Ok(WatchEvent::Changed);
        }
        let server = Arc::clone(&self.server);
        let mut events = server.events_rx.lock().await;
        let outcome = tokio::select! {
            event = events.recv() => event,
            _ = interrupt.notified() => Some(Ok(WatchEvent::Interrupted)),
            _ = sleep(timeout) => Some(Ok(WatchEvent::Timeout)),
        };
        drop(events);

        match outcome {
            Some(Ok(event)) => Ok(event),
            Some(Err(err)) => Err(self.note(err)),
            None => Ok(WatchEvent::Timeout),
        }
    }

    async fn logout(&mut self) -> Result<(), ImapError> {
        MockServer::bump(&self.server.logout_count).await;
        self.connected = false;
        self.pending_change = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Sender that records messages instead of relaying them.
#[derive(Default)]
pub struct MockSender {
    sent: TokioMutex<Vec<OutgoingMessage>>,
    failure: TokioMutex<Option<SendError>>,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn fail_with(&self, error: Option<SendError>) {
        *self.failure.lock().await = error;
    }
}

#[async_trait]
impl MailSender for MockSender {
    async fn send(&self, message: OutgoingMessage) -> Result<(), SendError> {
        if let Some(err) = self.failure.lock().await.clone() {
            return Err(err);
        }
        self.sent.lock().await.push(message);
        Ok(())
    }
}

/// Sink that remembers every notification in order.
#[derive(Default)]
pub struct RecordingSink {
    events: TokioMutex<Vec<(String, u32)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<(String, u32)> {
        self.events.lock().await.clone()
    }

    pub async fn counts_for(&self, account_id: &str) -> Vec<u32> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|(id, _)| id == account_id)
            .map(|(_, count)| *count)
            .collect()
    }

    /// Wait until at least `n` notifications arrived. False on timeout.
    pub async fn wait_for(&self, n: usize, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        loop {
            if self.events.lock().await.len() >= n {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn unread_changed(&self, account_id: &str, count: u32) {
        self.events.lock().await.push((account_id.to_string(), count));
    }
}
