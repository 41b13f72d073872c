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

//! Pairing handshake with a relay device.

use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{PairingError, TransportResult};
use crate::link_manager::LinkManager;
use crate::operation::{OperationGuard, OperationSlot};
use crate::transport::{Connection, PairingConfig, Peripheral};
use crate::ui::{UiEvent, UiSink};
use crate::user_id::UserId;

/// Where a pairing attempt is.
#[derive(Debug, Clone, PartialEq)]
pub enum PairingState {
    Idle,
    /// A peripheral was picked; the user id is being checked.
    AwaitingUserId,
    RequestingPairing,
    AwaitingConfirmation,
    Linked(Connection),
    Failed(PairingError),
}

/// Drives one pairing attempt at a time.
#[derive(Clone)]
pub struct PairingSession {
    link: LinkManager,
    check_in_message: String,
    slot: OperationSlot,
    state: Arc<RwLock<PairingState>>,
    ui: UiSink,
}

impl PairingSession {
    pub fn new(link: LinkManager, check_in_message: impl Into<String>, ui: UiSink) -> Self {
        Self {
            link,
            check_in_message: check_in_message.into(),
            slot: OperationSlot::new(),
            state: Arc::new(RwLock::new(PairingState::Idle)),
            ui,
        }
    }

    pub fn state(&self) -> PairingState {
        self.state.read().clone()
    }

    pub fn is_pairing(&self) -> bool {
        self.slot.is_active()
    }

    /// Pair with `peripheral`, identifying ourselves as `raw_user_id`.
    ///
    /// An invalid id fails without contacting the transport. Transport
    /// failures are not retried; the user starts over.
    pub async fn pair(
        &self,
        peripheral: &Peripheral,
        raw_user_id: &str,
    ) -> Result<Connection, PairingError> {
        let guard = self.slot.try_begin().ok_or(PairingError::Busy)?;
        self.transition(&guard, PairingState::AwaitingUserId);

        let result = self.drive(&guard, peripheral, raw_user_id).await;
        if !guard.is_current() {
            debug!("Pairing with {} abandoned", peripheral.display_name());
            return result;
        }
        match &result {
            Ok(connection) => {
                info!("Linked with {}", connection.device.display_name());
                self.transition(&guard, PairingState::Linked(connection.clone()));
                self.ui.notify(UiEvent::PairingSucceeded(connection.clone()));
            }
            Err(PairingError::InvalidUserId(e)) => {
                info!("Rejected user id: {}", e);
                self.transition(&guard, PairingState::Failed(e.clone().into()));
                self.ui.notify(UiEvent::InvalidUserId(e.clone()));
            }
            Err(e) => {
                error!("Cannot connect to {}: {}", peripheral.display_name(), e);
                self.transition(&guard, PairingState::Failed(e.clone()));
                self.ui.notify(UiEvent::PairingFailed(e.clone()));
            }
        }
        result
    }

    /// Abandon the attempt in flight. It stops updating state immediately.
    pub fn cancel(&self) -> bool {
        if !self.slot.cancel() {
            return false;
        }
        info!("Pairing cancelled");
        *self.state.write() = PairingState::Failed(PairingError::Cancelled);
        true
    }

    async fn drive(
        &self,
        guard: &OperationGuard,
        peripheral: &Peripheral,
        raw_user_id: &str,
    ) -> Result<Connection, PairingError> {
        let user_id = UserId::parse(raw_user_id)?;
        let config = PairingConfig {
            user_id: user_id.clone(),
            check_in_message: self.check_in_message.clone(),
            check_in_number: user_id,
        };
        let transport = self.link.transport().clone();

        self.transition(guard, PairingState::RequestingPairing);
        let imsi = cancellable(guard, transport.request_pairing(peripheral, &config)).await?;
        info!("Linking peripheral with IMSI: {}", imsi);

        self.transition(guard, PairingState::AwaitingConfirmation);
        let unlinks_seen = self.link.unlink_count();
        let connection = cancellable(guard, transport.confirm_pairing()).await?;

        if !guard.is_current() {
            return Err(PairingError::Cancelled);
        }
        self.link.adopt(connection.clone(), unlinks_seen).await;
        Ok(connection)
    }

    fn transition(&self, guard: &OperationGuard, next: PairingState) {
        let mut state = self.state.write();
        if guard.is_current() {
            debug!("Pairing state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }
}

async fn cancellable<T>(
    guard: &OperationGuard,
    call: impl Future<Output = TransportResult<T>>,
) -> Result<T, PairingError> {
    tokio::select! {
        _ = guard.token().cancelled() => Err(PairingError::Cancelled),
        result = call => Ok(result?),
    }
}
