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

//! SatLink companion: pair with a satellite relay device over Bluetooth
//! and exchange text messages through it.

pub mod config;
pub mod error;
pub mod link_manager;
pub mod operation;
pub mod pairing;
pub mod scanner;
pub mod send;
pub mod state;
pub mod storage;
pub mod transport;
pub mod ui;
pub mod user_id;

pub use link_manager::LinkManager;
pub use pairing::{PairingSession, PairingState};
pub use scanner::Scanner;
pub use send::{SendOutcome, SendSession, SendState};
pub use state::LinkSnapshot;
pub use user_id::UserId;
