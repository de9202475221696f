use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read or parse config file: {0}")]
    Load(#[from] config::ConfigError),
    #[error("`privateKey` must be 64 bytes of hex (seed||public), got {0} bytes")]
    InvalidPrivateKeyLength(usize),
    #[error("`publicKey` is not valid hex: {0}")]
    InvalidPublicKey(#[source] hex::FromHexError),
    #[error("`privateKey` is not valid hex: {0}")]
    InvalidPrivateKeyHex(#[source] hex::FromHexError),
}

/// The hub's YAML configuration file, by default read from
/// `~/.config/symmetry/server.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubConfig {
    /// Directory holding the SQLite database file.
    pub path: String,
    /// Hex-encoded Ed25519 public key the hub advertises on the overlay.
    pub public_key: String,
    /// Hex-encoded 64-byte secret (32-byte seed || 32-byte public key).
    pub private_key: String,
    /// Origins allowed to call the HTTP front door.
    pub allowed_origins: Vec<String>,
    /// Port the HTTP/WebSocket front door listens on.
    pub api_port: u16,

    /// Ambient: minimum log level for the terminal logger.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Ambient: minimum `symmetryCoreVersion` a joining peer must advertise.
    #[serde(default = "default_min_peer_version")]
    pub min_peer_version: String,
    /// Ambient: how long teardown waits for in-flight work to drain.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Ambient: bind address for the peer-transport listener (C6). The real
    /// encrypted overlay this stands in for discovers peers by topic rather
    /// than by address, but the concrete TCP transport shipped here needs
    /// somewhere to listen.
    #[serde(default = "default_p2p_bind_addr")]
    pub p2p_bind_addr: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_min_peer_version() -> String {
    "1.0.0".to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_p2p_bind_addr() -> String {
    "0.0.0.0:7900".to_string()
}

impl HubConfig {
    /// Load and validate the config file at `path`.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let raw = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        let parsed: HubConfig = raw.try_deserialize()?;
        parsed.validate()?;

        Ok(parsed)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        hex::decode(&self.public_key).map_err(ConfigError::InvalidPublicKey)?;

        let private_key_bytes =
            hex::decode(&self.private_key).map_err(ConfigError::InvalidPrivateKeyHex)?;
        if private_key_bytes.len() != 64 {
            return Err(ConfigError::InvalidPrivateKeyLength(private_key_bytes.len()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HubConfig {
        HubConfig {
            path: "/tmp/hub".into(),
            public_key: "aa".repeat(32),
            private_key: "bb".repeat(64),
            allowed_origins: vec!["https://example.com".into()],
            api_port: 8080,
            log_level: default_log_level(),
            min_peer_version: default_min_peer_version(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            p2p_bind_addr: default_p2p_bind_addr(),
        }
    }

    #[test]
    fn rejects_short_private_key() {
        let mut config = sample();
        config.private_key = "bb".repeat(10);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPrivateKeyLength(_))
        ));
    }

    #[test]
    fn accepts_well_formed_config() {
        assert!(sample().validate().is_ok());
    }
}
