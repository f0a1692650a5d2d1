// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(feature = "imap")]
pub mod client;
pub mod error;
#[cfg(feature = "imap")]
pub mod session;
pub mod types;

#[cfg(feature = "imap")]
pub use client::connect;
#[cfg(feature = "imap")]
pub use session::AsyncImapConnection;
