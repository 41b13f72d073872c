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

//! Line-oriented console front-end.

use super::UiEvent;
use crate::state::LinkSnapshot;
use crate::storage::{DeliveryState, Message};

pub const HELP: &str = "\
Commands:
  scan                  scan for relay devices
  stop                  stop scanning
  pair <n> [user-id]    pair with device <n> from the last scan
  cancel                cancel pairing
  partner <user-id>     change conversation partner
  send <text>           send a message to the partner
  history               show the conversation
  status                show link status
  forget                unlink the device
  quit                  exit";

/// Actions that can be triggered from the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    Scan,
    StopScan,
    /// Pair with the `index`-th scan result (1-based on screen).
    Pair { index: usize, user_id: Option<String> },
    CancelPairing,
    Partner(String),
    Send(String),
    History,
    Status,
    Forget,
    Help,
    Quit,
}

impl ConsoleAction {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let action = match command.to_lowercase().as_str() {
            "scan" => Self::Scan,
            "stop" => Self::StopScan,
            "pair" => {
                let mut args = rest.split_whitespace();
                let index = args
                    .next()
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(|| "usage: pair <n> [user-id]".to_string())?;
                let user_id = args.collect::<Vec<_>>().join(" ");
                Self::Pair {
                    index: index - 1,
                    user_id: (!user_id.is_empty()).then_some(user_id),
                }
            }
            "cancel" => Self::CancelPairing,
            "partner" if !rest.is_empty() => Self::Partner(rest.to_string()),
            "partner" => return Err("usage: partner <user-id>".to_string()),
            "send" if !rest.is_empty() => Self::Send(rest.to_string()),
            "send" => return Err("usage: send <text>".to_string()),
            "history" => Self::History,
            "status" => Self::Status,
            "forget" => Self::Forget,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command: {} (try 'help')", other)),
        };
        Ok(Some(action))
    }
}

/// Formats core state for the console.
pub struct ConsoleView;

impl ConsoleView {
    pub fn status_lines(snapshot: &LinkSnapshot) -> Vec<String> {
        let Some(connection) = &snapshot.connection else {
            return vec!["○ Not linked".to_string()];
        };

        let link = snapshot.link_state();
        let mut lines = vec![format!(
            "{} Linked: {} (IMSI {})",
            link.indicator(),
            connection.device.display_name(),
            connection.imsi
        )];
        if let Some(status) = &snapshot.status {
            let na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());
            lines.push(format!("  Bluetooth Connection: {}", status.bluetooth.as_str()));
            lines.push(format!("  Satellite Connection: {}", status.satellite.as_str()));
            lines.push(format!("  Firmware Version:     {}", na(&status.device.firmware_version)));
            lines.push(format!("  Serial Number:        {}", na(&status.device.serial_number)));
        }
        lines
    }

    pub fn message_line(message: &Message) -> String {
        let time = message
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S");
        let marker = match message.state {
            DeliveryState::Received => "<-",
            DeliveryState::Sending => "..",
            DeliveryState::Sent => "->",
            DeliveryState::Failed => "!!",
        };
        format!("[{}] {} {}", time, marker, message.content)
    }

    /// One line for an event, or `None` if it is not worth showing.
    pub fn render(event: &UiEvent) -> Option<String> {
        match event {
            UiEvent::LinkChanged(snapshot) => Some(Self::status_lines(snapshot).join("\n")),
            UiEvent::ScanStarted => Some("Scanning...".to_string()),
            UiEvent::PeripheralFound(_) => None,
            UiEvent::ScanFinished { found } => Some(format!("Scan finished, {} device(s)", found)),
            UiEvent::PairingSucceeded(connection) => {
                Some(format!("Paired with {}", connection.device.display_name()))
            }
            UiEvent::InvalidUserId(e) => Some(format!("Invalid User ID: {}", e)),
            UiEvent::PairingFailed(e) => Some(format!("Pairing failed: {}", e)),
            UiEvent::MessageStored(message) => Some(Self::message_line(message)),
            UiEvent::MessageStateChanged { message_id, state } => {
                Some(format!("Message {} {}", message_id, state.as_str()))
            }
            UiEvent::SendFailed { error, .. } => Some(format!("Send failed: {}", error)),
        }
    }
}
