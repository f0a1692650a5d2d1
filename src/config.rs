// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::time::Duration;

use config::{Environment, File};
use serde::{Deserialize, Serialize};

use crate::account::{AccountCredentials, DEFAULT_FOLDER};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

/// Tunables for sessions and their watch loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSettings {
    /// Upper bound of one IDLE wait before it is re-armed.
    pub idle_timeout_secs: u64,
    /// Upper bound for TCP connect, TLS handshake and login.
    pub connect_timeout_secs: u64,
    /// Headers returned by a listing when the caller gives no limit.
    pub list_limit: u32,
    pub default_folder: String,
}

/// An account the command line front-end connects on start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    pub id: String,
    pub credentials: AccountCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub log: LogConfig,
    pub watch: WatchSettings,
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
}

impl Settings {
    /// Defaults, then the optional TOML file, then `MAILWATCH_*` variables
    /// (`MAILWATCH_WATCH__IDLE_TIMEOUT_SECS=30` overrides `watch.idle_timeout_secs`).
    pub fn new(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut config_builder = config::Config::builder()
            .set_default("log.level", "info")?
            .set_default("watch.idle_timeout_secs", 60)?
            .set_default("watch.connect_timeout_secs", 30)?
            .set_default("watch.list_limit", 30)?
            .set_default("watch.default_folder", DEFAULT_FOLDER)?;

        if let Some(path) = config_path {
            config_builder = config_builder.add_source(File::with_name(path));
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("MAILWATCH")
                .prefix_separator("_")
                .separator("__")
                .ignore_empty(true),
        );

        config_builder.build()?.try_deserialize()
    }

    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig::from(&self.watch)
    }

    pub fn account(&self, id: &str) -> Option<&AccountEntry> {
        self.accounts.iter().find(|entry| entry.id == id)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig { level: "info".to_string() }
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 60,
            connect_timeout_secs: 30,
            list_limit: 30,
            default_folder: DEFAULT_FOLDER.to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            watch: WatchSettings::default(),
            accounts: Vec::new(),
        }
    }
}

/// Runtime form of [`WatchSettings`] handed to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    pub list_limit: u32,
    pub default_folder: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig::from(&WatchSettings::default())
    }
}

impl From<&WatchSettings> for WatchConfig {
    fn from(settings: &WatchSettings) -> Self {
        Self {
            idle_timeout: Duration::from_secs(settings.idle_timeout_secs.max(1)),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs.max(1)),
            list_limit: settings.list_limit,
            default_folder: if settings.default_folder.trim().is_empty() {
                DEFAULT_FOLDER.to_string()
            } else {
                settings.default_folder.clone()
            },
        }
    }
}
