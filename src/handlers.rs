// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Request/response surface for the UI layer.
//!
//! Every operation returns a serialisable value. Only connect and compose
//! report errors; the other operations degrade to empty lists or sentinel
//! strings.

use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::account::AccountCredentials;
use crate::body::{self, extract_text};
use crate::config::WatchConfig;
use crate::error::ManagerError;
use crate::imap::types::MessageHeader;
use crate::notify::NotificationSink;
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::transport::MailConnector;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectResult {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeRequest {
    pub to: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// `error` is a stable code (`not-connected`, `send-not-configured`,
/// `send-failed`); `detail` carries the relay's message for `send-failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub struct MailManager {
    registry: SessionRegistry,
}

impl MailManager {
    pub fn new(connector: Arc<dyn MailConnector>, sink: Arc<dyn NotificationSink>, config: WatchConfig) -> Self {
        Self {
            registry: SessionRegistry::new(connector, sink, config),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub async fn connect(&self, account_id: &str, credentials: &AccountCredentials) -> ConnectResult {
        match self.registry.connect(account_id, credentials).await {
            Ok(session) => ConnectResult {
                ok: true,
                unread_count: Some(session.unread_count().await),
                error: None,
            },
            Err(e) => ConnectResult {
                ok: false,
                unread_count: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub async fn disconnect(&self, account_id: &str) -> DisconnectResult {
        self.registry.disconnect(account_id).await;
        DisconnectResult { ok: true }
    }

    /// Newest headers first; empty when the account is not connected.
    pub async fn list_headers(&self, account_id: &str, limit: Option<u32>) -> Vec<MessageHeader> {
        let Some(session) = self.live_session(account_id).await else {
            debug!("List for {} without a live session", account_id);
            return Vec::new();
        };
        let limit = limit.unwrap_or(self.registry.config().list_limit);

        match session.list_headers(limit).await {
            Ok(headers) => headers,
            Err(e) => {
                warn!("Listing headers for {} failed: {}", account_id, e);
                Vec::new()
            }
        }
    }

    pub async fn fetch_body(&self, account_id: &str, uid: u32) -> FetchResult {
        let text = match self.live_session(account_id).await {
            None => body::DISCONNECTED.to_string(),
            Some(session) => match session.fetch_source(uid).await {
                Ok(Some(raw)) => extract_text(&raw),
                Ok(None) => body::MESSAGE_NOT_FOUND.to_string(),
                Err(e) => {
                    warn!("Fetching message {} for {} failed: {}", uid, account_id, e);
                    body::FETCH_FAILED.to_string()
                }
            },
        };
        FetchResult { text }
    }

    pub async fn compose(&self, account_id: &str, request: ComposeRequest) -> ComposeResult {
        let result = match self.live_session(account_id).await {
            None => Err(ManagerError::NotConnected),
            Some(session) => {
                session
                    .send(
                        &request.to,
                        request.subject.as_deref().unwrap_or_default(),
                        request.text.as_deref().unwrap_or_default(),
                    )
                    .await
            }
        };

        match result {
            Ok(()) => ComposeResult {
                ok: true,
                error: None,
                detail: None,
            },
            Err(e) => {
                warn!("Compose for {} failed: {}", account_id, e);
                let detail = match &e {
                    ManagerError::SendFailed(message) => Some(message.clone()),
                    _ => None,
                };
                ComposeResult {
                    ok: false,
                    error: Some(e.code().to_string()),
                    detail,
                }
            }
        }
    }

    /// Disconnect every account.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }

    async fn live_session(&self, account_id: &str) -> Option<Arc<Session>> {
        self.registry.get(account_id).await.filter(|session| session.is_connected())
    }
}
