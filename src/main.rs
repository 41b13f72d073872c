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


//! SatLink companion console application.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use satlink_companion::config::Config;
use satlink_companion::storage::{LinkedDeviceStore, MessageStore};
use satlink_companion::transport::{SimulatedTransport, Transport};
use satlink_companion::ui::{console, ConsoleAction, ConsoleView, UiEvent, UiSink};
use satlink_companion::{LinkManager, PairingSession, Scanner, SendSession, UserId};

/// Read console lines and forward parsed actions.
fn spawn_console_reader() -> mpsc::UnboundedReceiver<ConsoleAction> {
    let (action_tx, action_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match ConsoleAction::parse(&line) {
                    Ok(Some(action)) => {
                        if action_tx.send(action).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(usage) => println!("{}", usage),
                },
                Ok(None) => {
                    let _ = action_tx.send(ConsoleAction::Quit);
                    break;
                }
                Err(e) => {
                    error!("Console read error: {}", e);
                    let _ = action_tx.send(ConsoleAction::Quit);
                    break;
                }
            }
        }
    });

    action_rx
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("satlink_companion=info".parse()?)
                .add_directive("satlink=info".parse()?),
        )
        .init();

    info!("Starting SatLink v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = Config::load()?;
    info!("Configuration loaded");

    // Initialize storage
    let store = MessageStore::new(&config.data_dir)?;
    let linked_device = LinkedDeviceStore::new(&config.data_dir)?;
    info!("Message storage initialized");

    let transport: Arc<dyn Transport> = Arc::new(SimulatedTransport::new(
        config.simulator.clone(),
        Some(linked_device),
    ));

    let (ui, ui_rx) = UiSink::channel();
    let link = LinkManager::spawn(transport.clone(), store.clone(), ui.clone()).await;
    let scanner = Scanner::new(transport.clone(), ui.clone());
    let pairing = PairingSession::new(
        link.clone(),
        config.identity.check_in_message.clone(),
        ui.clone(),
    );
    let sender = SendSession::new(
        link.clone(),
        store.clone(),
        config.messaging.mark_failed_sends,
        ui.clone(),
    );

    let self_id = config.identity.self_user_id()?;
    let mut partner = config.identity.partner_user_id()?;
    let mut action_rx = spawn_console_reader();

    println!("{}", console::HELP);
    println!("{}", ConsoleView::status_lines(&link.snapshot()).join("\n"));
    info!("Ready. Chatting with {}", partner);

    loop {
        tokio::select! {
            Some(action) = action_rx.recv() => {
                match action {
                    ConsoleAction::Scan => {
                        if scanner.scan().is_none() {
                            println!("Already scanning");
                        }
                    }
                    ConsoleAction::StopScan => {
                        scanner.cancel();
                    }
                    ConsoleAction::Pair { index, user_id } => {
                        let Some(peripheral) = scanner.peripheral(index) else {
                            println!("No device #{} (run 'scan' first)", index + 1);
                            continue;
                        };
                        if pairing.is_pairing() {
                            println!("Already pairing");
                            continue;
                        }
                        let raw = user_id.unwrap_or_else(|| self_id.to_string());
                        println!("Pairing with {}...", peripheral.display_name());
                        let pairing = pairing.clone();
                        tokio::spawn(async move {
                            let _ = pairing.pair(&peripheral, &raw).await;
                        });
                    }
                    ConsoleAction::CancelPairing => {
                        if !pairing.cancel() {
                            println!("Not pairing");
                        }
                    }
                    ConsoleAction::Partner(raw) => match UserId::parse(&raw) {
                        Ok(id) => {
                            partner = id;
                            config.identity.partner_user_id = partner.to_string();
                            if let Err(e) = config.save() {
                                warn!("Failed to save configuration: {}", e);
                            }
                            println!("Chatting with {}", partner);
                        }
                        Err(e) => println!("Invalid User ID: {}", e),
                    },
                    ConsoleAction::Send(text) => {
                        if !link.is_connected() {
                            println!("Not connected to a relay device");
                            continue;
                        }
                        if sender.is_sending() {
                            println!("Send already in progress");
                            continue;
                        }
                        // Not awaited: the send finishes even if we move on.
                        drop(sender.submit(partner.clone(), text));
                    }
                    ConsoleAction::History => match store.messages_for(&partner) {
                        Ok(messages) if messages.is_empty() => {
                            println!("No messages with {}", partner)
                        }
                        Ok(messages) => {
                            for message in &messages {
                                println!("{}", ConsoleView::message_line(message));
                            }
                        }
                        Err(e) => error!("Failed to load messages: {}", e),
                    },
                    ConsoleAction::Status => {
                        println!("{}", ConsoleView::status_lines(&link.snapshot()).join("\n"));
                    }
                    ConsoleAction::Forget => {
                        if !link.is_linked() {
                            println!("No linked device");
                            continue;
                        }
                        let link = link.clone();
                        tokio::spawn(async move { link.forget().await });
                    }
                    ConsoleAction::Help => println!("{}", console::HELP),
                    ConsoleAction::Quit => {
                        info!("Quit requested");
                        break;
                    }
                }
            }
            Ok(event) = ui_rx.recv() => {
                if let UiEvent::PairingSucceeded(_) = &event {
                    scanner.cancel();
                }
                if let Some(line) = ConsoleView::render(&event) {
                    println!("{}", line);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    scanner.cancel();
    pairing.cancel();
    link.shutdown();
    info!("SatLink stopped");
    Ok(())
}
