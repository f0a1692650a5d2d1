// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command line front-end for the mail connection manager.
//!
//! Usage:
//!   mailwatch watch                                  # Follow unread counts of every account
//!   mailwatch list <account> [--limit N]             # Newest headers as JSON
//!   mailwatch fetch <account> <uid>                  # Body text of one message
//!   mailwatch send <account> --to ADDR [--subject S] [--text T]
//!
//! Exit codes:
//!   0 - Success
//!   1 - Configuration or connection failure

use std::process::exit;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde::Serialize;

use mailwatch::config::{AccountEntry, Settings};
use mailwatch::handlers::{ComposeRequest, MailManager};
use mailwatch::notify::{NotificationSink, UnreadEventBus};
use mailwatch::transport::NetworkConnector;

#[derive(Parser)]
#[command(name = "mailwatch", about = "Watch IMAP accounts and send mail", version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "MAILWATCH_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect every configured account and print unread changes until Ctrl-C
    Watch,
    /// List the newest message headers of an account
    List {
        account: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Print the body of one message
    Fetch { account: String, uid: u32 },
    /// Send a plain-text message
    Send {
        account: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        text: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialise output: {}", e),
    }
}

fn find_account<'a>(settings: &'a Settings, id: &str) -> &'a AccountEntry {
    settings.account(id).unwrap_or_else(|| {
        eprintln!("Unknown account '{}'", id);
        exit(1);
    })
}

async fn connect_or_exit(manager: &MailManager, entry: &AccountEntry) {
    let result = manager.connect(&entry.id, &entry.credentials).await;
    if !result.ok {
        eprintln!(
            "Failed to connect {}: {}",
            entry.id,
            result.error.unwrap_or_default()
        );
        exit(1);
    }
}

async fn watch(manager: &MailManager, bus: &UnreadEventBus, settings: &Settings) {
    if settings.accounts.is_empty() {
        eprintln!("No accounts configured");
        exit(1);
    }

    let mut subscription = bus.subscribe().await;

    for entry in &settings.accounts {
        let result = manager.connect(&entry.id, &entry.credentials).await;
        if !result.ok {
            warn!("Skipping {}: {}", entry.id, result.error.unwrap_or_default());
        }
    }
    if manager.registry().connected_accounts().await.is_empty() {
        eprintln!("No account could be connected");
        exit(1);
    }

    loop {
        tokio::select! {
            event = subscription.recv() => match event {
                Some(event) => print_json(&event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; disconnecting");
                break;
            }
        }
    }
    bus.unsubscribe(subscription.id()).await;
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::new(cli.config.as_deref()).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {}", err);
        exit(1);
    });

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(settings.log.level.as_str())).init();

    let bus = UnreadEventBus::new();
    let sink: Arc<dyn NotificationSink> = Arc::new(bus.clone());
    let manager = MailManager::new(Arc::new(NetworkConnector::new()), sink, settings.watch_config());

    match cli.command {
        Command::Watch => watch(&manager, &bus, &settings).await,
        Command::List { account, limit } => {
            let entry = find_account(&settings, &account);
            connect_or_exit(&manager, entry).await;
            print_json(&manager.list_headers(&entry.id, limit).await);
        }
        Command::Fetch { account, uid } => {
            let entry = find_account(&settings, &account);
            connect_or_exit(&manager, entry).await;
            println!("{}", manager.fetch_body(&entry.id, uid).await.text);
        }
        Command::Send {
            account,
            to,
            subject,
            text,
        } => {
            let entry = find_account(&settings, &account);
            connect_or_exit(&manager, entry).await;
            let result = manager.compose(&entry.id, ComposeRequest { to, subject, text }).await;
            print_json(&result);
            if !result.ok {
                manager.shutdown().await;
                exit(1);
            }
        }
    }

    manager.shutdown().await;
}
