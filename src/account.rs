// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Folder watched when the credentials do not name one.
pub const DEFAULT_FOLDER: &str = "INBOX";

/// Connection details for one mail account, as handed to a connect request.
///
/// The shape mirrors what the UI stores per mailbox: an inbound server, an
/// optional outbound relay and an optional folder override.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountCredentials {
    pub imap: ServerEndpoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<RelaySettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

/// Inbound (IMAP) server and login.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
    /// Implicit TLS when true, plaintext TCP otherwise.
    #[serde(default = "default_secure")]
    pub secure: bool,
    #[serde(alias = "username")]
    pub user: String,
    #[serde(alias = "password")]
    pub pass: String,
}

/// Outbound relay. Credentials are optional and fall back to the inbound login.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelaySettings {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, alias = "username", skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, alias = "password", skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,
    /// Explicit "from" address; the inbound username is used otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

fn default_secure() -> bool {
    true
}

impl AccountCredentials {
    /// Folder to select, falling back to `default`.
    pub fn folder_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.folder.as_deref() {
            Some(folder) if !folder.trim().is_empty() => folder,
            _ => default,
        }
    }

    pub fn has_relay(&self) -> bool {
        self.smtp
            .as_ref()
            .map(|relay| !relay.host.is_empty() && relay.port != 0)
            .unwrap_or(false)
    }

    /// Login for the relay, or `None` when the relay should be used unauthenticated.
    ///
    /// Authentication is only attempted when the relay names a user or a
    /// password; each missing half is taken from the inbound login.
    pub fn relay_login(&self) -> Option<(String, String)> {
        let relay = self.smtp.as_ref()?;
        if relay.user.is_none() && relay.pass.is_none() {
            return None;
        }
        let user = relay.user.clone().unwrap_or_else(|| self.imap.user.clone());
        let pass = relay.pass.clone().unwrap_or_else(|| self.imap.pass.clone());
        Some((user, pass))
    }

    /// Address used as "from" for outgoing mail.
    pub fn from_address(&self) -> String {
        if let Some(from) = self.smtp.as_ref().and_then(|relay| relay.from.as_ref()) {
            if !from.trim().is_empty() {
                return from.clone();
            }
        }
        if self.imap.user.trim().is_empty() {
            "me".to_string()
        } else {
            self.imap.user.clone()
        }
    }
}

// Passwords never reach the logs.
impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("imap", &self.imap)
            .field("smtp", &self.smtp)
            .field("folder", &self.folder)
            .finish()
    }
}

impl fmt::Debug for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for RelaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelaySettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("pass", &self.pass.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(relay: Option<RelaySettings>) -> AccountCredentials {
        AccountCredentials {
            imap: ServerEndpoint {
                host: "imap.example.com".to_string(),
                port: 993,
                secure: true,
                user: "alice@example.com".to_string(),
                pass: "hunter2".to_string(),
            },
            smtp: relay,
            folder: None,
        }
    }

    fn relay() -> RelaySettings {
        RelaySettings {
            host: "smtp.example.com".to_string(),
            port: 465,
            secure: true,
            user: None,
            pass: None,
            from: None,
        }
    }

    #[test]
    fn test_folder_defaults_to_inbox() {
        let mut creds = credentials(None);
        assert_eq!(creds.folder_or(DEFAULT_FOLDER), "INBOX");
        creds.folder = Some("  ".to_string());
        assert_eq!(creds.folder_or(DEFAULT_FOLDER), "INBOX");
        creds.folder = Some("Archive".to_string());
        assert_eq!(creds.folder_or(DEFAULT_FOLDER), "Archive");
    }

    #[test]
    fn test_relay_login_only_when_relay_names_credentials() {
        assert_eq!(credentials(Some(relay())).relay_login(), None);

        let mut with_user = relay();
        with_user.user = Some("relay-user".to_string());
        assert_eq!(
            credentials(Some(with_user)).relay_login(),
            Some(("relay-user".to_string(), "hunter2".to_string()))
        );

        let mut with_pass = relay();
        with_pass.pass = Some("relay-pass".to_string());
        assert_eq!(
            credentials(Some(with_pass)).relay_login(),
            Some(("alice@example.com".to_string(), "relay-pass".to_string()))
        );
    }

    #[test]
    fn test_from_address_fallbacks() {
        assert_eq!(credentials(None).from_address(), "alice@example.com");

        let mut explicit = relay();
        explicit.from = Some("Alice <alice@example.org>".to_string());
        assert_eq!(credentials(Some(explicit)).from_address(), "Alice <alice@example.org>");

        let mut anonymous = credentials(None);
        anonymous.imap.user = String::new();
        assert_eq!(anonymous.from_address(), "me");
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let mut relay = relay();
        relay.pass = Some("relay-secret".to_string());
        let rendered = format!("{:?}", credentials(Some(relay)));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("relay-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_deserializes_ui_shape() {
        let json = r#"{
            "imap": {"host": "imap.example.com", "port": 993, "secure": true, "user": "bob", "pass": "pw"},
            "smtp": {"host": "smtp.example.com", "port": 587, "secure": false},
            "folder": "INBOX"
        }"#;
        let creds: AccountCredentials = serde_json::from_str(json).unwrap();
        assert!(creds.has_relay());
        assert_eq!(creds.imap.user, "bob");
        assert_eq!(creds.smtp.unwrap().port, 587);
    }
}
