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

//! Devices, connections and link status as seen through the transport.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::bundle::MessageId;
use crate::user_id::UserId;

/// A relay device discovered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peripheral {
    pub id: Uuid,
    pub name: Option<String>,
}

impl Peripheral {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

/// Subscriber identity returned by the device on a successful pairing request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Imsi(pub String);

impl fmt::Display for Imsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Live binding to the one linked relay device.
///
/// Transport calls that touch the satellite link take a `&Connection`, so
/// holding one is what allows a caller to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub device: Peripheral,
    pub imsi: Imsi,
    pub self_id: UserId,
}

/// Parameters of a pairing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingConfig {
    pub user_id: UserId,
    pub check_in_message: String,
    pub check_in_number: UserId,
}

/// Bluetooth link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Disconnected => "Disconnected",
            LinkState::Connecting => "Connecting...",
            LinkState::Connected => "Connected",
        }
    }

    /// Single-character marker for compact status lines.
    pub fn indicator(&self) -> &'static str {
        match self {
            LinkState::Disconnected => "○",
            LinkState::Connecting => "◐",
            LinkState::Connected => "●",
        }
    }
}

/// Satellite link state as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SatelliteState {
    Unknown,
    Searching,
    Connected,
    NoSignal,
}

impl SatelliteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SatelliteState::Unknown => "Unknown",
            SatelliteState::Searching => "Searching...",
            SatelliteState::Connected => "Connected",
            SatelliteState::NoSignal => "No signal",
        }
    }
}

/// Static details reported by the device once linked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: Option<String>,
    pub imsi: Option<String>,
    pub firmware_version: Option<String>,
    pub serial_number: Option<String>,
}

/// Health of the current connection. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub bluetooth: LinkState,
    pub satellite: SatelliteState,
    pub device: DeviceInfo,
}

/// How far the transport got with an outgoing bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryCode {
    Queued,
    Delivered,
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub message_id: MessageId,
    pub code: DeliveryCode,
}
