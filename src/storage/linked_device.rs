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

//! Persisted record of the linked relay device.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::StoreResult;
use crate::transport::Connection;

/// Linked device information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedDevice {
    pub connection: Connection,
    pub linked_at: chrono::DateTime<chrono::Local>,
}

/// JSON file holding at most one linked device.
#[derive(Debug, Clone)]
pub struct LinkedDeviceStore {
    path: PathBuf,
}

impl LinkedDeviceStore {
    pub fn new(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join("linked_device.json"),
        })
    }

    /// Load the stored device. A missing file means nothing is linked.
    pub fn load(&self) -> StoreResult<Option<LinkedDevice>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Like [`load`](Self::load), but a corrupt file is logged and ignored.
    pub fn load_or_forget(&self) -> Option<LinkedDevice> {
        match self.load() {
            Ok(device) => device,
            Err(e) => {
                warn!("Ignoring unreadable linked device record {:?}: {}", self.path, e);
                None
            }
        }
    }

    pub fn store(&self, connection: &Connection) -> StoreResult<()> {
        let record = LinkedDevice {
            connection: connection.clone(),
            linked_at: chrono::Local::now(),
        };
        let content = serde_json::to_string_pretty(&record)?;
        std::fs::write(&self.path, content)?;
        info!("Stored linked device {}", connection.device.display_name());
        Ok(())
    }

    pub fn clear(&self) -> StoreResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Imsi, Peripheral};
    use crate::user_id::UserId;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn connection() -> Connection {
        Connection {
            device: Peripheral {
                id: Uuid::from_u128(42),
                name: Some("Relay".to_string()),
            },
            imsi: Imsi("001010000000042".to_string()),
            self_id: UserId::parse("5551234").unwrap(),
        }
    }

    #[test]
    fn test_store_load_clear() {
        let dir = tempdir().unwrap();
        let store = LinkedDeviceStore::new(dir.path()).unwrap();
        assert!(store.load().unwrap().is_none());

        store.store(&connection()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.connection, connection());

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_record_is_ignored() {
        let dir = tempdir().unwrap();
        let store = LinkedDeviceStore::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("linked_device.json"), "{not json").unwrap();

        assert!(store.load().is_err());
        assert!(store.load_or_forget().is_none());
    }
}
