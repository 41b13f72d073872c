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

//! At-most-one-in-flight operations.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    active: Option<CancellationToken>,
}

/// Presence flag for one kind of operation (scan, pairing, send).
///
/// Starting is refused while a guard is live. Cancelling bumps the
/// generation, so the cancelled operation's guard stops reporting
/// `is_current` even before it notices the token.
#[derive(Debug, Clone, Default)]
pub struct OperationSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl OperationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` if an operation is in flight.
    pub fn try_begin(&self) -> Option<OperationGuard> {
        let mut state = self.inner.lock();
        if state.active.is_some() {
            return None;
        }
        state.generation += 1;
        let token = CancellationToken::new();
        state.active = Some(token.clone());
        Some(OperationGuard {
            slot: self.inner.clone(),
            generation: state.generation,
            token,
        })
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active.is_some()
    }

    /// Cancel the operation in flight, if any, and free the slot.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.lock();
        match state.active.take() {
            Some(token) => {
                token.cancel();
                state.generation += 1;
                true
            }
            None => false,
        }
    }
}

/// Proof of owning an [`OperationSlot`]. Dropping it frees the slot.
#[derive(Debug)]
pub struct OperationGuard {
    slot: Arc<Mutex<SlotState>>,
    generation: u64,
    token: CancellationToken,
}

impl OperationGuard {
    /// Whether this operation may still touch shared state.
    pub fn is_current(&self) -> bool {
        !self.token.is_cancelled() && self.slot.lock().generation == self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        let mut state = self.slot.lock();
        if state.generation == self.generation {
            state.active = None;
        }
    }
}
