// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::Serialize;

/// Which optional mail protocols a connector can actually drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// No inbound support; nothing can connect.
    Unavailable,
    /// IMAP only; sessions never get an outbound sender.
    InboundOnly,
    /// IMAP and SMTP.
    WithSend,
}

impl Capability {
    /// Capability of this build, derived from the `imap` and `smtp` features.
    pub const fn detect() -> Self {
        if !cfg!(feature = "imap") {
            Capability::Unavailable
        } else if cfg!(feature = "smtp") {
            Capability::WithSend
        } else {
            Capability::InboundOnly
        }
    }

    pub const fn has_inbound(self) -> bool {
        !matches!(self, Capability::Unavailable)
    }

    pub const fn can_send(self) -> bool {
        matches!(self, Capability::WithSend)
    }

    /// Message shown to the user when a connect is refused for lack of support.
    pub fn unavailable_reason(self) -> &'static str {
        match self {
            Capability::Unavailable => {
                "inbound mail support is not built in; rebuild with the `imap` feature"
            }
            Capability::InboundOnly => {
                "outbound mail support is not built in; rebuild with the `smtp` feature"
            }
            Capability::WithSend => "all mail capabilities are available",
        }
    }
}
