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

//! User interface notifications and the console front-end.

pub mod console;

use tracing::trace;

use crate::error::{PairingError, ValidationError};
use crate::state::LinkSnapshot;
use crate::storage::{DeliveryState, Message};
use crate::transport::{Connection, MessageId, Peripheral};

pub use console::{ConsoleAction, ConsoleView};

/// Everything the core tells the user interface.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// The link manager applied a change.
    LinkChanged(LinkSnapshot),
    ScanStarted,
    PeripheralFound(Peripheral),
    ScanFinished { found: usize },
    PairingSucceeded(Connection),
    /// Bad user id; the user should be asked again.
    InvalidUserId(ValidationError),
    PairingFailed(PairingError),
    MessageStored(Message),
    MessageStateChanged {
        message_id: MessageId,
        state: DeliveryState,
    },
    SendFailed {
        message_id: MessageId,
        error: String,
    },
}

/// Sending half of the UI notification channel.
///
/// Notifications are best effort: with no UI listening they are dropped.
#[derive(Debug, Clone)]
pub struct UiSink {
    tx: async_channel::Sender<UiEvent>,
}

impl UiSink {
    pub fn channel() -> (Self, async_channel::Receiver<UiEvent>) {
        let (tx, rx) = async_channel::unbounded();
        (Self { tx }, rx)
    }

    pub fn notify(&self, event: UiEvent) {
        if self.tx.try_send(event).is_err() {
            trace!("UI not listening, notification dropped");
        }
    }
}
