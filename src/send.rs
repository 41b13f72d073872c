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

//! Sending text messages over the satellite link.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::SendError;
use crate::link_manager::LinkManager;
use crate::operation::OperationSlot;
use crate::storage::{DeliveryState, Message, MessageStore};
use crate::transport::{BundleContent, DeliveryResult, MessageId};
use crate::ui::{UiEvent, UiSink};
use crate::user_id::UserId;

/// Progress of the most recent send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Composed,
    /// Recorded as `sending` and handed to the transport.
    Submitted,
    Acknowledged,
    Failed,
}

/// What a send call did.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// No device linked. Nothing was recorded or sent.
    NotLinked,
    /// Another send is in flight. Nothing was recorded or sent.
    Busy,
    Acknowledged(DeliveryResult),
}

/// Sends one message at a time through the linked device.
#[derive(Clone)]
pub struct SendSession {
    link: LinkManager,
    store: MessageStore,
    slot: OperationSlot,
    state: Arc<RwLock<Option<SendState>>>,
    mark_failed_sends: bool,
    ui: UiSink,
}

impl SendSession {
    /// With `mark_failed_sends` unset, a failed message stays `sending`.
    pub fn new(
        link: LinkManager,
        store: MessageStore,
        mark_failed_sends: bool,
        ui: UiSink,
    ) -> Self {
        Self {
            link,
            store,
            slot: OperationSlot::new(),
            state: Arc::new(RwLock::new(None)),
            mark_failed_sends,
            ui,
        }
    }

    /// State of the latest send, `None` before the first one.
    pub fn state(&self) -> Option<SendState> {
        *self.state.read()
    }

    pub fn is_sending(&self) -> bool {
        self.slot.is_active()
    }

    /// Send `text` to `partner` and wait for the transport.
    ///
    /// The message is stored as `sending` before the transport sees it, so
    /// an interrupted send leaves a visible record.
    pub async fn send(&self, partner: &UserId, text: &str) -> Result<SendOutcome, SendError> {
        let Some(connection) = self.link.connection() else {
            debug!("No linked device, message not sent");
            return Ok(SendOutcome::NotLinked);
        };
        let Some(_guard) = self.slot.try_begin() else {
            warn!("Send already in progress");
            return Ok(SendOutcome::Busy);
        };
        self.set_state(SendState::Composed);

        let transport = self.link.transport().clone();
        let content = BundleContent::text(partner.clone(), text);
        let bundle = transport.create_content_bundle(&connection, content);
        let message = Message::outgoing(bundle.message_id(), partner.clone(), text);
        let message_id = message.message_id.clone();

        if let Err(e) = self.store.insert(&message) {
            self.set_state(SendState::Failed);
            return Err(e.into());
        }
        self.set_state(SendState::Submitted);
        self.ui.notify(UiEvent::MessageStored(message));

        match transport.send(&connection, bundle).await {
            Ok(result) => {
                info!(message_id = %message_id, "Sent successful: {:?}", result.code);
                self.record(&message_id, DeliveryState::Sent);
                self.set_state(SendState::Acknowledged);
                Ok(SendOutcome::Acknowledged(result))
            }
            Err(e) => {
                error!(message_id = %message_id, "Failed to send message: {}", e);
                if self.mark_failed_sends {
                    self.record(&message_id, DeliveryState::Failed);
                }
                self.set_state(SendState::Failed);
                self.ui.notify(UiEvent::SendFailed {
                    message_id,
                    error: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Send in the background.
    ///
    /// The send keeps going when the caller moves on; its result lands in
    /// the store either way.
    pub fn submit(
        &self,
        partner: UserId,
        text: String,
    ) -> JoinHandle<Result<SendOutcome, SendError>> {
        let session = self.clone();
        tokio::spawn(async move { session.send(&partner, &text).await })
    }

    fn record(&self, message_id: &MessageId, state: DeliveryState) {
        match self.store.mark_state(message_id, state) {
            Ok(true) => self.ui.notify(UiEvent::MessageStateChanged {
                message_id: message_id.clone(),
                state,
            }),
            Ok(false) => warn!(message_id = %message_id, "Message no longer sending"),
            Err(e) => error!(message_id = %message_id, "Failed to update message: {}", e),
        }
    }

    fn set_state(&self, state: SendState) {
        *self.state.write() = Some(state);
    }
}
