//! # Kingpin - client for the Crypto Kingpin ledger game
//!
//! Kingpin is the client side of a trading game whose rules and state live on
//! a remote, transaction-based ledger. Players move between eight city
//! districts, buy and sell assets whose prices vary by district, spend action
//! points, and receive random encounter notifications.
//!
//! ## Features
//!
//! - **State Mirror**: Read-only local copy of the catalog and the player's state, replaced wholesale on every resync.
//! - **Local Gatekeeping**: Registration, action point and inventory checks before any remote write is paid for.
//! - **Ordered Transactions**: Multi-step intents (spend authorization, then purchase) confirmed step by step.
//! - **Encounter Stream**: One long-lived, account-filtered subscription per session.
//! - **Pluggable Gateways**: In-memory simulated ledger or a JSON-RPC relay over HTTP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kingpin::config::Config;
//! use kingpin::game::{ClientSettings, GameClient};
//! use kingpin::gateway::local::LocalLedger;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let settings = ClientSettings::from_config(&config)?;
//!     let ledger = Arc::new(LocalLedger::builder(settings.spender.clone()).build());
//!     let mut client = GameClient::new(ledger, settings);
//!
//!     client.connect("0x0000000000000000000000000000000000000001".parse()?).await?;
//!     println!("{}", client.status().current());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - mirror, synchronizer, gatekeeper, orchestrator, event listener, client façade
//! - [`gateway`] - the remote operation set and its implementations
//! - [`console`] - line-oriented command parsing and text rendering for the CLI
//! - [`config`] - configuration management and validation
//! - [`validation`] - account address parsing
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   GameClient    │ ← gate, plan, resync, status
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Gateway       │ ← reads, submit/confirm, encounters
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Remote Ledger   │ ← authoritative game state
//! └─────────────────┘
//! ```

pub mod config;
pub mod console;
pub mod game;
pub mod gateway;
pub mod logutil;
pub mod metrics;
pub mod validation;
