//! Tool configuration persisted as TOML.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Name of the environment variable carrying extra comma-separated
/// TCP pseudo-ports for discovery (e.g. `localhost:5761`).
pub const TCP_PORTS_ENV: &str = "OSD_TCP_PORTS";

/// Configuration for the host tool.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Port to connect to when none is given on the command line.
    pub preferred_port: Option<String>,
    /// TCP addresses listed alongside serial ports during discovery.
    pub tcp_ports: Vec<String>,
}

impl ToolConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ToolConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Configured TCP pseudo-ports plus any from the environment.
    pub fn discovery_tcp_ports(&self) -> Vec<String> {
        let mut ports = self.tcp_ports.clone();
        if let Ok(extra) = std::env::var(TCP_PORTS_ENV) {
            for addr in extra.split(',') {
                let addr = addr.trim();
                if !addr.is_empty() {
                    ports.push(addr.to_string());
                }
            }
        }
        ports
    }
}
