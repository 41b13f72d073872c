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

//! Scanning for relay peripherals.

use futures::StreamExt;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::operation::{OperationGuard, OperationSlot};
use crate::transport::{NamedPeripherals, Peripheral, Transport};
use crate::ui::{UiEvent, UiSink};

/// Runs at most one scan at a time and keeps its results.
#[derive(Clone)]
pub struct Scanner {
    transport: Arc<dyn Transport>,
    slot: OperationSlot,
    results: Arc<RwLock<Vec<Peripheral>>>,
    ui: UiSink,
}

impl Scanner {
    pub fn new(transport: Arc<dyn Transport>, ui: UiSink) -> Self {
        Self {
            transport,
            slot: OperationSlot::new(),
            results: Arc::new(RwLock::new(Vec::new())),
            ui,
        }
    }

    /// Start a scan in the background.
    ///
    /// Returns `None` without doing anything while a scan is running. The
    /// task resolves to the number of peripherals found.
    pub fn scan(&self) -> Option<JoinHandle<usize>> {
        let guard = self.slot.try_begin()?;
        self.results.write().clear();

        let results = self.results.clone();
        let ui = self.ui.clone();
        let transport = self.transport.clone();
        Some(tokio::spawn(async move {
            run_scan(guard, transport, results, ui).await
        }))
    }

    /// Stop the running scan. Its later sightings are discarded.
    pub fn cancel(&self) -> bool {
        self.slot.cancel()
    }

    pub fn is_scanning(&self) -> bool {
        self.slot.is_active()
    }

    /// Peripherals found so far, in discovery order.
    pub fn peripherals(&self) -> Vec<Peripheral> {
        self.results.read().clone()
    }

    pub fn peripheral(&self, index: usize) -> Option<Peripheral> {
        self.results.read().get(index).cloned()
    }
}

async fn run_scan(
    guard: OperationGuard,
    transport: Arc<dyn Transport>,
    results: Arc<RwLock<Vec<Peripheral>>>,
    ui: UiSink,
) -> usize {
    info!("Scanning for relay devices");
    ui.notify(UiEvent::ScanStarted);
    let mut sightings = NamedPeripherals::new(transport.list_devices());

    loop {
        let next = tokio::select! {
            _ = guard.token().cancelled() => {
                info!("Scan cancelled");
                break;
            }
            next = sightings.next() => next,
        };

        match next {
            Some(Ok(peripheral)) => {
                {
                    let mut results = results.write();
                    if !guard.is_current() {
                        break;
                    }
                    results.push(peripheral.clone());
                }
                info!(
                    "Found {} ({})",
                    peripheral.display_name(),
                    peripheral.id
                );
                ui.notify(UiEvent::PeripheralFound(peripheral));
            }
            Some(Err(e)) => {
                error!("Error in scanning: {}", e);
                break;
            }
            None => {
                info!("Scan ended because of timeout");
                break;
            }
        }
    }

    let found = results.read().len();
    if guard.is_current() {
        ui.notify(UiEvent::ScanFinished { found });
    }
    found
}
