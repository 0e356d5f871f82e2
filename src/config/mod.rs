//! # Configuration Management Module
//!
//! Kingpin reads a single TOML file. Sections:
//!
//! - [`GatewayConfig`] - which remote authority to talk to and how long to wait on it
//! - [`ClientConfig`] - default account and status history size
//! - [`LoggingConfig`] - log level and optional log file
//! - [`LocalLedgerConfig`] - seed for the in-memory simulated ledger
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kingpin::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     config.validate()?;
//!     println!("Gateway: {}", config.gateway.kind);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [gateway]
//! kind = "local"
//! endpoint = "http://127.0.0.1:8545"
//! game_address = "0x00000000000000000000000000000000000000c0"
//! request_timeout_seconds = 10
//! confirmation_timeout_seconds = 120
//! event_poll_interval_ms = 2000
//!
//! [client]
//! message_history = 50
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::game::types::{Account, TokenAmount, TokenId};
use crate::validation::parse_account;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub local: LocalLedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// "local" (simulated ledger) or "http" (JSON-RPC relay)
    pub kind: String,
    pub endpoint: String,
    /// Game contract address; receives spend authorizations for purchases.
    pub game_address: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// 0 waits indefinitely
    #[serde(default)]
    pub confirmation_timeout_seconds: u64,
    #[serde(default = "default_poll_interval")]
    pub event_poll_interval_ms: u64,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    2000
}

impl GatewayConfig {
    pub fn game_account(&self) -> Result<Account> {
        parse_account(&self.game_address)
            .map_err(|e| anyhow!("Invalid gateway.game_address {}: {}", self.game_address, e))
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        match self.confirmation_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Account used by `play` when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default = "default_message_history")]
    pub message_history: usize,
}

fn default_message_history() -> usize {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalLedgerConfig {
    pub starting_action_points: u32,
    pub max_action_points: u32,
    /// Game tokens credited to the session account.
    pub starting_balance: u64,
    /// Identity tokens owned by the session account. Empty means the account
    /// cannot register until one is granted.
    pub identity_tokens: Vec<TokenId>,
    /// Probability (0.0-1.0) of an encounter on a move into a risk-10 district;
    /// scaled down linearly by district risk.
    pub encounter_chance: f64,
}

impl LocalLedgerConfig {
    pub fn starting_balance(&self) -> TokenAmount {
        TokenAmount::from(self.starting_balance)
    }
}

impl Default for LocalLedgerConfig {
    fn default() -> Self {
        Self {
            starting_action_points: 10,
            max_action_points: 10,
            starting_balance: 1_000,
            identity_tokens: vec![1],
            encounter_chance: 0.3,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        match self.gateway.kind.as_str() {
            "local" => {}
            "http" => {
                if self.gateway.endpoint.trim().is_empty() {
                    return Err(anyhow!("gateway.endpoint is required for the http gateway"));
                }
            }
            other => return Err(anyhow!("Unknown gateway.kind '{}'", other)),
        }
        self.gateway.game_account()?;
        if self.gateway.request_timeout_seconds == 0 {
            return Err(anyhow!("gateway.request_timeout_seconds must be at least 1"));
        }
        if let Some(account) = &self.client.account {
            parse_account(account)
                .map_err(|e| anyhow!("Invalid client.account {}: {}", account, e))?;
        }
        if self.client.message_history == 0 {
            return Err(anyhow!("client.message_history must be at least 1"));
        }
        let local = &self.local;
        if !(0.0..=1.0).contains(&local.encounter_chance) {
            return Err(anyhow!("local.encounter_chance must be between 0.0 and 1.0"));
        }
        if local.starting_action_points > local.max_action_points {
            return Err(anyhow!(
                "local.starting_action_points ({}) exceeds local.max_action_points ({})",
                local.starting_action_points,
                local.max_action_points
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gateway: GatewayConfig {
                kind: "local".to_string(),
                endpoint: "http://127.0.0.1:8545".to_string(),
                game_address: "0x00000000000000000000000000000000000000c0".to_string(),
                request_timeout_seconds: default_request_timeout(),
                confirmation_timeout_seconds: 120,
                event_poll_interval_ms: default_poll_interval(),
            },
            client: ClientConfig {
                account: Some("0x0000000000000000000000000000000000000001".to_string()),
                message_history: default_message_history(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("kingpin.log".to_string()),
            },
            local: LocalLedgerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(
            config.gateway.confirmation_timeout(),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn zero_confirmation_timeout_means_unbounded() {
        let mut config = Config::default();
        config.gateway.confirmation_timeout_seconds = 0;
        assert_eq!(config.gateway.confirmation_timeout(), None);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.gateway.game_address = "0x1234".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.client.message_history = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.gateway.kind = "carrier-pigeon".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.local.encounter_chance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_optional_sections_take_defaults() {
        let raw = r#"
            [gateway]
            kind = "http"
            endpoint = "https://relay.example"
            game_address = "0x00000000000000000000000000000000000000C0"

            [client]

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.gateway.request_timeout_seconds, 10);
        assert_eq!(config.gateway.confirmation_timeout(), None);
        assert_eq!(config.client.message_history, 50);
        assert!(config.client.account.is_none());
        assert_eq!(config.local.starting_action_points, 10);
        assert_eq!(
            config.gateway.game_account().unwrap().as_str(),
            "0x00000000000000000000000000000000000000c0"
        );
        config.validate().unwrap();
    }
}
