use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

const DEFAULT_PORT: u16 = 8080;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Daemon configuration, loaded from `config.toml` in the data directory
/// and overridable by CLI flags / environment variables.
///
/// ```toml
/// bind_address = "127.0.0.1"
/// port = 8080
/// slow_query_ms = 250
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Bind address for the REST server (use 0.0.0.0 for LAN access).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Slow-query log threshold in milliseconds. 0 disables it.
    pub slow_query_ms: u64,
    /// Data directory holding the SQLite database. Not read from the file;
    /// it decides where the file lives.
    #[serde(skip)]
    pub data_dir: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: DEFAULT_PORT,
            slow_query_ms: 0,
            data_dir: default_data_dir(),
        }
    }
}

/// `~/.devlab` when HOME is available, `./.devlab` otherwise.
pub fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".devlab")
}

impl DaemonConfig {
    /// Load `config.toml` from the data dir (if any), then apply CLI
    /// overrides. A malformed file is reported and ignored rather than
    /// aborting startup.
    pub fn load(
        data_dir: Option<PathBuf>,
        port: Option<u16>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let path = data_dir.join("config.toml");

        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str::<DaemonConfig>(&raw) {
                Ok(config) => config,
                Err(e) => {
                    warn!("ignoring malformed {}: {}", path.display(), e);
                    DaemonConfig::default()
                }
            },
            Err(_) => DaemonConfig::default(),
        };

        config.data_dir = data_dir;
        if let Some(port) = port {
            config.port = port;
        }
        if let Some(bind_address) = bind_address {
            config.bind_address = bind_address;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_local_only() {
        let config = DaemonConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn cli_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "port = 9000\n").unwrap();
        let config = DaemonConfig::load(
            Some(dir.path().to_path_buf()),
            Some(9100),
            Some("0.0.0.0".into()),
        );
        assert_eq!(config.port, 9100);
        assert_eq!(config.bind_address, "0.0.0.0");
    }

    #[test]
    fn file_values_apply_without_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "port = 9000\nslow_query_ms = 250\n",
        )
        .unwrap();
        let config = DaemonConfig::load(Some(dir.path().to_path_buf()), None, None);
        assert_eq!(config.port, 9000);
        assert_eq!(config.slow_query_ms, 250);
    }
}
