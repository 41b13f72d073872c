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

//! Chat history storage using SQLite.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::transport::MessageId;
use crate::user_id::UserId;

/// Delivery state of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Sending,
    Sent,
    Received,
    /// Only recorded when failed sends are configured to be marked.
    Failed,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Sending => "sending",
            DeliveryState::Sent => "sent",
            DeliveryState::Received => "received",
            DeliveryState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sending" => Some(DeliveryState::Sending),
            "sent" => Some(DeliveryState::Sent),
            "received" => Some(DeliveryState::Received),
            "failed" => Some(DeliveryState::Failed),
            _ => None,
        }
    }
}

/// One chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_id: MessageId,
    pub partner: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Outgoing direction. Stays set after the message is sent.
    pub is_sending: bool,
    pub state: DeliveryState,
}

impl Message {
    /// An outgoing message, recorded before the transport has it.
    pub fn outgoing(message_id: MessageId, partner: UserId, content: impl Into<String>) -> Self {
        Self {
            message_id,
            partner,
            content: content.into(),
            timestamp: Utc::now(),
            is_sending: true,
            state: DeliveryState::Sending,
        }
    }

    /// A message that arrived from `partner`.
    pub fn incoming(message_id: MessageId, partner: UserId, content: impl Into<String>) -> Self {
        Self {
            message_id,
            partner,
            content: content.into(),
            timestamp: Utc::now(),
            is_sending: false,
            state: DeliveryState::Received,
        }
    }
}

/// Chat history database.
#[derive(Clone)]
pub struct MessageStore {
    conn: Arc<Mutex<Connection>>,
}

impl MessageStore {
    /// Create or open the message database under `data_dir`.
    pub fn new(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("messages.db");
        info!("Opening message database: {:?}", db_path);

        Self::with_connection(Connection::open(&db_path)?)
    }

    /// Open a throwaway in-memory database.
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id TEXT NOT NULL UNIQUE,
                partner TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                is_sending INTEGER NOT NULL,
                sending_state TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_partner_timestamp ON messages(partner, timestamp)",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert a message. Returns `false` if one with the same id exists.
    pub fn insert(&self, message: &Message) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO messages
                (message_id, partner, content, timestamp, is_sending, sending_state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.message_id.as_str(),
                message.partner.as_str(),
                message.content,
                message.timestamp.timestamp_millis(),
                message.is_sending,
                message.state.as_str(),
            ],
        )?;

        if inserted == 0 {
            debug!(message_id = %message.message_id, "Message already stored");
        }
        Ok(inserted > 0)
    }

    /// Move a message out of `sending`.
    ///
    /// Returns `false` when no message with this id is still sending.
    pub fn mark_state(&self, message_id: &MessageId, state: DeliveryState) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE messages SET sending_state = ?1
             WHERE message_id = ?2 AND sending_state = ?3",
            params![
                state.as_str(),
                message_id.as_str(),
                DeliveryState::Sending.as_str()
            ],
        )?;
        Ok(updated > 0)
    }

    /// Conversation with `partner`, oldest first.
    pub fn messages_for(&self, partner: &UserId) -> StoreResult<Vec<Message>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT message_id, partner, content, timestamp, is_sending, sending_state
             FROM messages
             WHERE partner = ?1
             ORDER BY timestamp ASC, id ASC",
        )?;

        let messages = stmt
            .query_map([partner.as_str()], row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(messages)
    }

    pub fn get(&self, message_id: &MessageId) -> StoreResult<Option<Message>> {
        let conn = self.conn.lock();
        let message = conn
            .query_row(
                "SELECT message_id, partner, content, timestamp, is_sending, sending_state
                 FROM messages WHERE message_id = ?1",
                [message_id.as_str()],
                row_to_message,
            )
            .optional()?;
        Ok(message)
    }

    /// Get total message count.
    pub fn count(&self) -> StoreResult<u32> {
        let conn = self.conn.lock();
        let count: u32 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn corrupt(idx: usize, what: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(StoreError::Corrupt(what)))
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let message_id: String = row.get(0)?;
    let partner: String = row.get(1)?;
    let millis: i64 = row.get(3)?;
    let state: String = row.get(5)?;

    let partner = UserId::parse(&partner).map_err(|e| corrupt(1, e.to_string()))?;
    let timestamp = Utc
        .timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| corrupt(3, format!("timestamp {}", millis)))?;
    let state = DeliveryState::parse(&state).ok_or_else(|| corrupt(5, state))?;

    Ok(Message {
        message_id: MessageId(message_id),
        partner,
        content: row.get(2)?,
        timestamp,
        is_sending: row.get(4)?,
        state,
    })
}
