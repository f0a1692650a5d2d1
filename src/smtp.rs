// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("SMTP configuration error: {0}")]
    Config(String),

    #[error("Invalid address {0}")]
    Address(String),

    #[error("Email building error: {0}")]
    Build(String),

    #[error("Email sending error: {0}")]
    Transport(String),
}

/// A plain-text message ready for the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Outbound half of a session.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> Result<(), SendError>;
}

#[cfg(feature = "smtp")]
pub use relay::SmtpSender;

#[cfg(feature = "smtp")]
mod relay {
    use async_trait::async_trait;
    use lettre::{
        message::{header::ContentType, Mailbox},
        transport::smtp::authentication::Credentials,
        AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    };
    use log::{debug, info};

    use super::{MailSender, OutgoingMessage, SendError};
    use crate::account::AccountCredentials;

    /// SMTP relay sender built once per session from the account's relay settings.
    pub struct SmtpSender {
        mailer: AsyncSmtpTransport<Tokio1Executor>,
        relay_host: String,
    }

    impl SmtpSender {
        /// Build the transport. Returns `Ok(None)` when the account has no relay.
        ///
        /// No network traffic happens here; lettre connects lazily on send.
        pub fn from_credentials(credentials: &AccountCredentials) -> Result<Option<Self>, SendError> {
            let Some(relay) = credentials.smtp.as_ref().filter(|_| credentials.has_relay()) else {
                return Ok(None);
            };

            // Implicit TLS when `secure`, STARTTLS upgrade otherwise.
            let builder = if relay.secure {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&relay.host)
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&relay.host)
            }
            .map_err(|e| SendError::Config(format!("SMTP relay error: {}", e)))?
            .port(relay.port);

            let builder = match credentials.relay_login() {
                Some((user, pass)) => builder.credentials(Credentials::new(user, pass)),
                None => builder,
            };

            debug!("Built SMTP transport for {}:{}", relay.host, relay.port);
            Ok(Some(Self {
                mailer: builder.build(),
                relay_host: relay.host.clone(),
            }))
        }
    }

    #[async_trait]
    impl MailSender for SmtpSender {
        async fn send(&self, message: OutgoingMessage) -> Result<(), SendError> {
            let from: Mailbox = message
                .from
                .parse()
                .map_err(|e| SendError::Address(format!("{}: {}", message.from, e)))?;
            let to: Mailbox = message
                .to
                .parse()
                .map_err(|e| SendError::Address(format!("{}: {}", message.to, e)))?;

            let email = Message::builder()
                .from(from)
                .to(to)
                .subject(message.subject)
                .header(ContentType::TEXT_PLAIN)
                .body(message.text)
                .map_err(|e| SendError::Build(e.to_string()))?;

            self.mailer
                .send(email)
                .await
                .map_err(|e| SendError::Transport(e.to_string()))?;

            info!("Message to {} handed to relay {}", message.to, self.relay_host);
            Ok(())
        }
    }

}
