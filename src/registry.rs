// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::account::AccountCredentials;
use crate::capability::Capability;
use crate::config::WatchConfig;
use crate::error::ManagerError;
use crate::imap::error::ImapError;
use crate::notify::NotificationSink;
use crate::session::Session;
use crate::smtp::MailSender;
use crate::transport::{MailConnector, MailboxConnection};

/// Per-account slot. Connects for one account serialize on its mutex; slots
/// for different accounts never contend.
type Slot = Arc<Mutex<Option<Arc<Session>>>>;

/// Owns at most one live [`Session`] per account id.
pub struct SessionRegistry {
    slots: DashMap<String, Slot>,
    connector: Arc<dyn MailConnector>,
    sink: Arc<dyn NotificationSink>,
    config: WatchConfig,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn MailConnector>, sink: Arc<dyn NotificationSink>, config: WatchConfig) -> Self {
        Self {
            slots: DashMap::new(),
            connector,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    fn slot(&self, account_id: &str) -> Slot {
        self.slots.entry(account_id.to_string()).or_default().value().clone()
    }

    fn existing_slot(&self, account_id: &str) -> Option<Slot> {
        self.slots.get(account_id).map(|entry| entry.value().clone())
    }

    /// Return the live session for `account_id`, building one if needed.
    ///
    /// A session that lost its connection is torn down (best effort) and
    /// replaced. If building fails the slot keeps whatever it held before.
    pub async fn connect(&self, account_id: &str, credentials: &AccountCredentials) -> Result<Arc<Session>, ManagerError> {
        let slot = self.slot(account_id);
        let mut current = slot.lock().await;

        if let Some(existing) = current.as_ref() {
            if existing.is_connected() {
                debug!("Reusing live session for {}", account_id);
                return Ok(Arc::clone(existing));
            }
            info!("Session for {} is no longer connected; rebuilding", account_id);
            existing.teardown().await;
        }

        let session = Arc::new(self.build(account_id, credentials).await?);
        *current = Some(Arc::clone(&session));

        // The initial count goes out before the watch can report a change.
        session.announce_unread().await;
        session.start_watch(self.config.idle_timeout).await;
        info!(
            "Connected {} to {} (send {})",
            account_id,
            session.folder(),
            if session.can_send() { "enabled" } else { "disabled" }
        );
        Ok(session)
    }

    /// Current session for `account_id`, connected or not.
    pub async fn get(&self, account_id: &str) -> Option<Arc<Session>> {
        let slot = self.existing_slot(account_id)?;
        let current = slot.lock().await;
        current.clone()
    }

    /// Tear down and forget the session for `account_id`. Always succeeds.
    pub async fn disconnect(&self, account_id: &str) {
        let Some(slot) = self.existing_slot(account_id) else {
            debug!("Disconnect for unknown account {}", account_id);
            return;
        };
        let mut current = slot.lock().await;
        if let Some(session) = current.take() {
            session.teardown().await;
            info!("Disconnected {}", account_id);
        }
    }

    /// Disconnect every account.
    pub async fn shutdown(&self) {
        let account_ids: Vec<String> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        join_all(account_ids.iter().map(|id| self.disconnect(id))).await;
    }

    /// Ids with a session that is still connected.
    pub async fn connected_accounts(&self) -> Vec<String> {
        let slots: Vec<(String, Slot)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut ids = Vec::new();
        for (id, slot) in slots {
            if slot.lock().await.as_ref().is_some_and(|s| s.is_connected()) {
                ids.push(id);
            }
        }
        ids.sort();
        ids
    }

    async fn build(&self, account_id: &str, credentials: &AccountCredentials) -> Result<Session, ManagerError> {
        let capability = self.connector.capability();
        if !capability.has_inbound() {
            return Err(ManagerError::CapabilityUnavailable(
                capability.unavailable_reason().to_string(),
            ));
        }

        let folder = credentials.folder_or(&self.config.default_folder).to_string();
        let mut connection = self.connector.open(credentials, &self.config).await.map_err(|e| {
            warn!("Connect for {} failed: {}", account_id, e);
            ManagerError::from(e)
        })?;

        let unread = match prepare(connection.as_mut(), &folder).await {
            Ok(unread) => unread,
            Err(e) => {
                warn!("Opening {} for {} failed: {}", folder, account_id, e);
                if let Err(logout_err) = connection.logout().await {
                    debug!("Logout after failed connect for {} failed: {}", account_id, logout_err);
                }
                return Err(e.into());
            }
        };

        let sender = self.build_sender(account_id, credentials, capability);

        Ok(Session::new(
            account_id.to_string(),
            folder,
            credentials.from_address(),
            connection,
            sender,
            Arc::clone(&self.sink),
            unread,
        ))
    }

    fn build_sender(
        &self,
        account_id: &str,
        credentials: &AccountCredentials,
        capability: Capability,
    ) -> Option<Arc<dyn MailSender>> {
        if !credentials.has_relay() {
            return None;
        }
        if !capability.can_send() {
            warn!("Relay configured for {} but {}", account_id, capability.unavailable_reason());
            return None;
        }
        match self.connector.sender(credentials) {
            Ok(sender) => sender,
            Err(e) => {
                warn!("Outbound sender for {} unavailable: {}", account_id, e);
                None
            }
        }
    }
}

/// Hold the folder and read its unseen count.
async fn prepare(connection: &mut dyn MailboxConnection, folder: &str) -> Result<u32, ImapError> {
    let snapshot = connection.hold_folder(folder).await?;
    debug!(
        "Holding {} ({} messages, uidvalidity {:?})",
        folder, snapshot.exists, snapshot.uid_validity
    );
    connection.unseen(folder).await
}
