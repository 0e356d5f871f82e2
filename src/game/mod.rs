//! # Game Client Core
//!
//! Client-side state and transaction layer for the on-ledger trading game.
//! The remote authority owns all state; this module keeps a read-only mirror
//! of it, checks actions locally before paying for a remote write, sequences
//! multi-step writes, and resynchronizes after every confirmed change.
//!
//! - [`types`] - data model (accounts, districts, assets, player snapshots)
//! - [`errors`] - [`KingpinError`], the user-facing failure kinds
//! - [`sync`] - [`StateSynchronizer`] and the [`GameMirror`] it publishes into
//! - [`gate`] - local fast-fail checks before any write is submitted
//! - [`orchestrator`] - ordered, confirmation-gated write plans
//! - [`events`] - single long-lived encounter subscription
//! - [`coords`] - district ⇄ grid position mapping
//! - [`status`] - status line and message history
//! - [`client`] - [`GameClient`], the façade the presentation layer calls

pub mod client;
pub mod coords;
pub mod errors;
pub mod events;
pub mod gate;
pub mod orchestrator;
pub mod status;
pub mod sync;
pub mod types;

pub use client::{ClientSettings, GameClient, Quote};
pub use errors::KingpinError;
pub use status::StatusBoard;
pub use sync::{Catalog, GameMirror, PlayerView, StateSynchronizer};
pub use types::{Account, District, GridPosition, PlayerSnapshot};
