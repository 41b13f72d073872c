// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Content bundles exchanged over the satellite link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::types::Imsi;
use crate::user_id::UserId;

/// Bytes of the header digest kept in a message id.
const MESSAGE_ID_BYTES: usize = 8;

/// Globally unique id of one chat message, derived from its bundle header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Routing header attached to every bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleHeader {
    /// Subscriber that originated the bundle.
    pub sender: Imsi,
    /// Per-connection sequence number, monotonic for the sender.
    pub sequence: u32,
    pub created_at: DateTime<Utc>,
}

impl BundleHeader {
    /// Derive the message id for this header.
    ///
    /// The same header always yields the same id; distinct sequence numbers
    /// from one sender yield distinct ids.
    pub fn generate_message_id(&self) -> MessageId {
        let mut hasher = Sha256::new();
        hasher.update(self.sender.0.as_bytes());
        hasher.update(b":");
        hasher.update(self.sequence.to_be_bytes());
        hasher.update(b":");
        hasher.update(self.created_at.timestamp_millis().to_be_bytes());
        let digest = hasher.finalize();
        MessageId(hex::encode(&digest[..MESSAGE_ID_BYTES]))
    }
}

/// Payload of a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BundleContent {
    Text { partner_id: UserId, text: String },
    Location { partner_id: UserId, latitude: f64, longitude: f64 },
}

impl BundleContent {
    pub fn text(partner_id: UserId, text: impl Into<String>) -> Self {
        Self::Text {
            partner_id,
            text: text.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Location { .. } => "location",
        }
    }

    pub fn partner_id(&self) -> &UserId {
        match self {
            Self::Text { partner_id, .. } | Self::Location { partner_id, .. } => partner_id,
        }
    }
}

/// One unit handed to, or received from, the satellite link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBundle {
    pub header: BundleHeader,
    pub content: BundleContent,
}

impl ContentBundle {
    pub fn message_id(&self) -> MessageId {
        self.header.generate_message_id()
    }
}
