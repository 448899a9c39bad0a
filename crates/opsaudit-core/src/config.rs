//! OpsAudit configuration.
//!
//! Loaded from a TOML file when present; every field falls back to a sane
//! default so a bare `opsaudit` invocation works out of the box.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsAuditConfig {
    /// Path to the SQLite database.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub hub: HubConfig,
}

fn default_db_path() -> String {
    "opsaudit.db".into()
}

impl Default for OpsAuditConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            gateway: GatewayConfig::default(),
            hub: HubConfig::default(),
        }
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Seconds between SSE heartbeat events.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

fn default_listen() -> String {
    "127.0.0.1:8090".into()
}
fn default_heartbeat_secs() -> u64 {
    30
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

/// Event hub queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Capacity of the hub's inbound broadcast queue.
    #[serde(default = "default_queue")]
    pub queue_capacity: usize,
    /// Capacity of each client's outbound queue.
    #[serde(default = "default_queue")]
    pub client_capacity: usize,
}

fn default_queue() -> usize {
    256
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue(),
            client_capacity: default_queue(),
        }
    }
}

impl OpsAuditConfig {
    /// Load from a TOML file, or return defaults if the file is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AuditError::Config(format!("read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| AuditError::Config(format!("parse {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = OpsAuditConfig::default();
        assert_eq!(cfg.gateway.heartbeat_secs, 30);
        assert_eq!(cfg.hub.queue_capacity, 256);
    }

    #[test]
    fn test_partial_toml() {
        let cfg: OpsAuditConfig = toml::from_str("db_path = \"/tmp/x.db\"").unwrap();
        assert_eq!(cfg.db_path, "/tmp/x.db");
        assert_eq!(cfg.gateway.listen, "127.0.0.1:8090");
    }
}
