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

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::error::ValidationError;
use crate::user_id::UserId;

const APP_DIR: &str = "satlink";
const DEFAULT_SELF_USER_ID: &str = "5551234";
const DEFAULT_PARTNER_USER_ID: &str = "5559876";

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for the message database and linked device record.
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// Who we are and who we talk to.
    pub identity: IdentityConfig,

    /// Message delivery settings.
    pub messaging: MessagingConfig,

    /// In-process relay device used when no hardware transport is present.
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Our user id, offered when pairing.
    pub self_user_id: String,

    /// Conversation partner for outgoing messages.
    pub partner_user_id: String,

    /// Check-in text registered with the device during pairing.
    pub check_in_message: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            self_user_id: DEFAULT_SELF_USER_ID.to_string(),
            partner_user_id: DEFAULT_PARTNER_USER_ID.to_string(),
            check_in_message: "Check In Message".to_string(),
        }
    }
}

impl IdentityConfig {
    /// Configured self id, or the default if the stored value is invalid.
    pub fn self_user_id(&self) -> Result<UserId, ValidationError> {
        parse_or_default(&self.self_user_id, DEFAULT_SELF_USER_ID, "self_user_id")
    }

    /// Configured partner id, or the default if the stored value is invalid.
    pub fn partner_user_id(&self) -> Result<UserId, ValidationError> {
        parse_or_default(
            &self.partner_user_id,
            DEFAULT_PARTNER_USER_ID,
            "partner_user_id",
        )
    }
}

fn parse_or_default(
    raw: &str,
    fallback: &'static str,
    field: &str,
) -> Result<UserId, ValidationError> {
    UserId::parse(raw).or_else(|e| {
        warn!("Invalid {} in config ({}), using {}", field, e, fallback);
        UserId::parse(fallback)
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Record failed sends as `failed` instead of leaving them `sending`.
    pub mark_failed_sends: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Names of the relay devices that advertise during a scan.
    pub devices: Vec<String>,

    /// Extra advertisers without a name (not relay devices).
    pub unnamed_advertisers: u32,

    /// How long a scan runs before the stream ends.
    pub scan_duration_ms: u64,

    /// Delay between advertisement sightings.
    pub advertisement_interval_ms: u64,

    /// Time the device takes to answer a pairing request.
    pub pairing_delay_ms: u64,

    /// Decline every pairing request.
    pub reject_pairing: bool,

    /// Time the satellite link takes to accept a bundle.
    pub send_delay_ms: u64,

    /// Probability in `[0, 1]` that a send times out.
    pub send_failure_rate: f64,

    /// Have the partner echo every text message back.
    pub echo_replies: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            devices: vec!["SatRelay-1A2B".to_string(), "SatRelay-3C4D".to_string()],
            unnamed_advertisers: 1,
            scan_duration_ms: 5_000,
            advertisement_interval_ms: 400,
            pairing_delay_ms: 800,
            reject_pairing: false,
            send_delay_ms: 1_500,
            send_failure_rate: 0.0,
            echo_replies: true,
        }
    }
}

impl SimulatorConfig {
    pub fn scan_duration(&self) -> Duration {
        Duration::from_millis(self.scan_duration_ms)
    }

    pub fn advertisement_interval(&self) -> Duration {
        Duration::from_millis(self.advertisement_interval_ms)
    }

    pub fn pairing_delay(&self) -> Duration {
        Duration::from_millis(self.pairing_delay_ms)
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }
}

impl Config {
    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        let config_dir = default_config_dir();
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            let config = Self::default();
            std::fs::write(&config_path, config.to_toml()?)?;
            config
        };

        // Set data directory
        config.data_dir = default_data_dir();
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        let config_dir = default_config_dir();
        std::fs::create_dir_all(&config_dir)?;
        std::fs::write(config_dir.join("config.toml"), self.to_toml()?)?;
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
