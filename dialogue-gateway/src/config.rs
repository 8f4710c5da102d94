//! Env-driven configuration, mirroring the teacher's `AppConfig::load`
//! (`broz-messaging/src/config.rs`): typed defaults, `config::Environment`
//! with a service-prefixed separator, deserialize-or-default fallback.

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_history_rate_limit_max")]
    pub history_rate_limit_max: u32,
    #[serde(default = "default_history_rate_limit_window_secs")]
    pub history_rate_limit_window_secs: u64,
    /// §9 Open Question: reject empty-allow-list dynamic rooms in production.
    #[serde(default)]
    pub forbid_wildcard_rooms: bool,
    /// Optional path to a JSON file of startup `RoomConfig`s, loaded before
    /// the server starts accepting connections.
    pub static_rooms_path: Option<String>,
}

fn default_port() -> u16 {
    4100
}
fn default_history_rate_limit_max() -> u32 {
    20
}
fn default_history_rate_limit_window_secs() -> u64 {
    60
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("DIALOGUE").separator("__"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_else(|_| Self {
            port: default_port(),
            history_rate_limit_max: default_history_rate_limit_max(),
            history_rate_limit_window_secs: default_history_rate_limit_window_secs(),
            forbid_wildcard_rooms: false,
            static_rooms_path: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_falls_back_to_defaults_without_env() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.port, 4100);
        assert_eq!(config.history_rate_limit_max, 20);
        assert!(!config.forbid_wildcard_rooms);
    }
}
