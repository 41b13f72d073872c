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

//! Error types shared by the link manager and the sessions.

use thiserror::Error;

/// A user-supplied value was rejected before reaching the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("user id is empty")]
    EmptyUserId,

    #[error("invalid user id: {0:?}")]
    InvalidUserId(String),
}

/// Failure reported by the satellite transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("operation timed out")]
    Timeout,

    #[error("request rejected by device: {0}")]
    Rejected(String),

    #[error("no device is linked")]
    NotLinked,

    #[error("device disconnected")]
    Disconnected,

    #[error("bluetooth error: {0}")]
    Bluetooth(String),
}

/// Local message store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Why a pairing attempt ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    #[error(transparent)]
    InvalidUserId(#[from] ValidationError),

    #[error("pairing failed: {0}")]
    Transport(#[from] TransportError),

    #[error("a pairing attempt is already in progress")]
    Busy,

    #[error("pairing cancelled")]
    Cancelled,
}

/// Why a send did not reach `Acknowledged`.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("send failed: {0}")]
    Transport(#[from] TransportError),

    #[error("could not record outgoing message: {0}")]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type TransportResult<T> = std::result::Result<T, TransportError>;
