//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so the server starts with zero configuration
//! for local development.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use randping_types::models::CountryCode;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Env: `RANDPING_HOST`
    pub host: String,

    /// Env: `RANDPING_PORT`
    pub port: u16,

    /// SQLite file. Env: `RANDPING_DB_PATH`
    pub db_path: PathBuf,

    /// VAPID key pair file, `{"public": ..., "private": ...}`.
    /// Env: `RANDPING_KEYS_PATH`
    pub keys_path: PathBuf,

    /// Used when the keys file is absent.
    /// Env: `RANDPING_VAPID_PUBLIC_KEY`
    pub vapid_public_key: Option<String>,

    /// Env: `RANDPING_PING_COOLDOWN_SECS`
    pub ping_cooldown: Duration,

    /// Country given to every new account.
    /// Env: `RANDPING_DEFAULT_COUNTRY`
    pub default_country: Option<CountryCode>,

    /// HTTP push relay. Unset means notifications are only logged.
    /// Env: `RANDPING_PUSH_RELAY_URL`
    pub push_relay_url: Option<String>,

    /// Env: `RANDPING_TRUST_FORWARDED_FOR` (true/false)
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            db_path: PathBuf::from("randping.db"),
            keys_path: PathBuf::from("keys.json"),
            vapid_public_key: None,
            ping_cooldown: randping_core::pings::DEFAULT_PING_COOLDOWN,
            default_country: None,
            push_relay_url: None,
            trust_forwarded_for: false,
        }
    }
}

/// Only the public half is read; the private key stays with the push relay.
#[derive(Deserialize)]
struct KeyFile {
    public: String,
}

impl ServerConfig {
    /// Load configuration from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup("RANDPING_HOST") {
            config.host = host;
        }

        if let Some(port) = lookup("RANDPING_PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(_) => warn!(value = %port, "Invalid RANDPING_PORT, using default"),
            }
        }

        if let Some(path) = lookup("RANDPING_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("RANDPING_KEYS_PATH") {
            config.keys_path = PathBuf::from(path);
        }

        config.vapid_public_key = lookup("RANDPING_VAPID_PUBLIC_KEY").filter(|k| !k.is_empty());

        if let Some(secs) = lookup("RANDPING_PING_COOLDOWN_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) => config.ping_cooldown = Duration::from_secs(secs),
                Err(_) => warn!(value = %secs, "Invalid RANDPING_PING_COOLDOWN_SECS, using default"),
            }
        }

        if let Some(country) = lookup("RANDPING_DEFAULT_COUNTRY") {
            match country.parse() {
                Ok(code) => config.default_country = Some(code),
                Err(e) => warn!(error = %e, "Invalid RANDPING_DEFAULT_COUNTRY, ignoring"),
            }
        }

        config.push_relay_url = lookup("RANDPING_PUSH_RELAY_URL").filter(|u| !u.is_empty());

        if let Some(val) = lookup("RANDPING_TRUST_FORWARDED_FOR") {
            config.trust_forwarded_for = val == "true" || val == "1";
        }

        config
    }

    /// Public VAPID key: the keys file wins, then `RANDPING_VAPID_PUBLIC_KEY`.
    pub fn public_key(&self) -> Option<String> {
        match read_key_file(&self.keys_path) {
            Ok(Some(public)) => return Some(public),
            Ok(None) => {}
            Err(e) => warn!(path = %self.keys_path.display(), "Unreadable keys file: {}", e),
        }
        self.vapid_public_key.clone()
    }
}

fn read_key_file(path: &Path) -> anyhow::Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    let keys: KeyFile = serde_json::from_str(&raw)?;
    Ok(Some(keys.public))
}
