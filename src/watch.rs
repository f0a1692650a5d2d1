// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-session background task that keeps the unread count current.
//!
//! Each iteration takes the connection, IDLEs for at most `idle_timeout`,
//! and on a folder change re-queries the server count. Any error ends the
//! loop and marks the session disconnected; reconnecting is left to the
//! next `connect` call.

use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::imap::error::ImapError;
use crate::imap::types::WatchEvent;
use crate::session::Session;

enum Step {
    Continue,
    Stop,
}

pub(crate) fn spawn(session: &Arc<Session>, idle_timeout: Duration) -> JoinHandle<()> {
    let weak = Arc::downgrade(session);
    let cancel = session.cancel_token();
    let account_id = session.account_id().to_string();
    tokio::spawn(async move {
        info!("Watch loop started for {}", account_id);
        run(weak, cancel, idle_timeout).await;
        info!("Watch loop stopped for {}", account_id);
    })
}

async fn run(weak: Weak<Session>, cancel: CancellationToken, idle_timeout: Duration) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let Some(session) = weak.upgrade() else {
            break;
        };

        match step(&session, &cancel, idle_timeout).await {
            Ok(Step::Continue) => {}
            Ok(Step::Stop) => break,
            Err(e) => {
                if !cancel.is_cancelled() {
                    warn!("Watch loop for {} ended: {}", session.account_id(), e);
                    session.mark_disconnected();
                }
                break;
            }
        }
    }
}

async fn step(session: &Session, cancel: &CancellationToken, idle_timeout: Duration) -> Result<Step, ImapError> {
    let mut connection = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(Step::Stop),
        guard = session.connection().lock() => guard,
    };
    if cancel.is_cancelled() {
        return Ok(Step::Stop);
    }

    match connection.wait_for_change(idle_timeout, session.interrupt()).await? {
        WatchEvent::Changed => {
            let count = connection.unseen(session.folder()).await?;
            drop(connection);
            session.record_unread(count).await;
        }
        WatchEvent::Interrupted => {
            drop(connection);
            // Let the interrupting handler take the connection first.
            tokio::task::yield_now().await;
        }
        WatchEvent::Timeout => debug!("IDLE re-armed for {}", session.account_id()),
        WatchEvent::Unrelated => {}
    }
    Ok(Step::Continue)
}
