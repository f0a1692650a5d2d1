// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_imap::{Client as AsyncImapClient, Session as AsyncImapSession};
use log::{debug, info, warn};
use rustls_pki_types::ServerName as PkiServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream as TokioTcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_util::compat::TokioAsyncReadCompatExt;

use crate::account::ServerEndpoint;
use crate::imap::error::ImapError;
use crate::imap::session::AsyncImapConnection;

/// Byte stream async-imap runs over: TLS or plain TCP behind the same type.
pub trait ImapIo: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + Debug {}

impl<T> ImapIo for T where T: futures::io::AsyncRead + futures::io::AsyncWrite + Unpin + Send + Debug {}

type ImapStream = Box<dyn ImapIo>;
pub(crate) type UnderlyingImapSession = AsyncImapSession<ImapStream>;

fn tls_connector() -> Result<TlsConnector, ImapError> {
    let mut root_cert_store = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs()?;
    let (added, ignored) = root_cert_store.add_parsable_certificates(certs);
    debug!("Loaded {} native certs, ignored {}.", added, ignored);
    if root_cert_store.is_empty() {
        warn!("Root certificate store is empty after loading native certs.");
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

async fn open_stream(endpoint: &ServerEndpoint) -> Result<ImapStream, ImapError> {
    debug!("Attempting TCP connection to {}:{}...", endpoint.host, endpoint.port);
    let tcp_stream = TokioTcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;

    if !endpoint.secure {
        debug!("TCP connected; plaintext session requested for {}", endpoint.host);
        return Ok(Box::new(tcp_stream.compat()));
    }

    let server_name: PkiServerName<'static> = PkiServerName::try_from(endpoint.host.clone())
        .map_err(|_| ImapError::Tls(format!("Invalid server name format: {}", endpoint.host)))?;

    debug!("TCP connected. Performing TLS handshake...");
    let tls_stream = tls_connector()?
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| ImapError::Tls(e.to_string()))?;
    debug!("TLS handshake successful.");
    Ok(Box::new(tls_stream.compat()))
}

async fn login(stream: ImapStream, endpoint: &ServerEndpoint) -> Result<UnderlyingImapSession, ImapError> {
    let client = AsyncImapClient::new(stream);
    debug!("Attempting login for user '{}'...", endpoint.user);
    match client.login(&endpoint.user, &endpoint.pass).await {
        Ok(session) => Ok(session),
        Err((e, _client)) => match e {
            async_imap::error::Error::No(msg) | async_imap::error::Error::Bad(msg) => Err(ImapError::Auth(msg)),
            other => Err(ImapError::from(other)),
        },
    }
}

/// Connect, optionally wrap in TLS, and log in, all within `connect_timeout`.
pub async fn connect(endpoint: &ServerEndpoint, connect_timeout: Duration) -> Result<AsyncImapConnection, ImapError> {
    info!("Connecting to {}:{} as '{}'", endpoint.host, endpoint.port, endpoint.user);

    let attempt = async {
        let stream = open_stream(endpoint).await?;
        login(stream, endpoint).await
    };

    match timeout(connect_timeout, attempt).await {
        Ok(Ok(session)) => {
            info!("IMAP login successful for user: {}", endpoint.user);
            Ok(AsyncImapConnection::new(session))
        }
        Ok(Err(e)) => {
            warn!("IMAP connect failed for user {}: {}", endpoint.user, e);
            Err(e)
        }
        Err(_) => {
            warn!("IMAP connect for user {} timed out after {:?}", endpoint.user, connect_timeout);
            Err(ImapError::Timeout(format!("connect to {} timed out", endpoint.host)))
        }
    }
}
