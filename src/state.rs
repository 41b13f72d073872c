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

//! Link state shared between the link manager and its readers.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::transport::{Connection, ConnectionStatus, LinkState};

/// Consistent view of the link at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkSnapshot {
    pub connection: Option<Connection>,
    pub status: Option<ConnectionStatus>,
}

impl LinkSnapshot {
    pub fn is_linked(&self) -> bool {
        self.connection.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.bluetooth == LinkState::Connected)
    }

    /// Bluetooth link state, `Disconnected` when nothing is reported.
    pub fn link_state(&self) -> LinkState {
        self.status
            .as_ref()
            .map(|s| s.bluetooth)
            .unwrap_or(LinkState::Disconnected)
    }
}

/// Link state published by the link manager.
///
/// Only the link manager task writes; connection and status live behind
/// one lock so a reader never pairs a status with the wrong connection.
#[derive(Debug, Default)]
pub struct SharedLinkState {
    snapshot: RwLock<LinkSnapshot>,
    unlinks: AtomicU64,
}

impl SharedLinkState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        self.snapshot.read().clone()
    }

    pub fn connection(&self) -> Option<Connection> {
        self.snapshot.read().connection.clone()
    }

    pub fn is_linked(&self) -> bool {
        self.snapshot.read().is_linked()
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot.read().is_connected()
    }

    /// Adopt `connection`. The status is kept only if it belongs to the same
    /// device.
    pub(crate) fn set_connection(&self, connection: Connection) -> LinkSnapshot {
        let mut snapshot = self.snapshot.write();
        let same_device = snapshot
            .connection
            .as_ref()
            .is_some_and(|c| c.device.id == connection.device.id);
        if !same_device {
            snapshot.status = None;
        }
        snapshot.connection = Some(connection);
        snapshot.clone()
    }

    pub(crate) fn clear(&self) -> LinkSnapshot {
        let mut snapshot = self.snapshot.write();
        self.unlinks.fetch_add(1, Ordering::SeqCst);
        *snapshot = LinkSnapshot::default();
        snapshot.clone()
    }

    /// Replace the status reported for `connection`.
    ///
    /// Refused unless `connection` is the linked device.
    pub(crate) fn set_status(
        &self,
        connection: &Connection,
        status: ConnectionStatus,
    ) -> Option<LinkSnapshot> {
        let mut snapshot = self.snapshot.write();
        let linked = snapshot.connection.as_ref()?;
        if linked.device.id != connection.device.id {
            return None;
        }
        snapshot.status = Some(status);
        Some(snapshot.clone())
    }

    /// Number of unlinks applied so far.
    pub(crate) fn unlinks(&self) -> u64 {
        self.unlinks.load(Ordering::SeqCst)
    }
}
