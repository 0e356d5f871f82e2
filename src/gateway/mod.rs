//! # Remote Gateway
//!
//! The remote authority is reachable only through the fixed operation set of
//! [`Gateway`]: account-keyed reads, state-mutating writes that must be
//! confirmed before they take effect, and an encounter notification stream.
//!
//! Writes are two-phase. [`Gateway::submit`] hands the operation to the remote
//! side and returns a [`PendingTx`]; [`Gateway::confirm`] waits until the
//! remote authority has either finalized it (a [`Receipt`]) or reverted it
//! ([`KingpinError::SubmissionRejected`]).
//!
//! Implementations:
//! - [`local::LocalLedger`] - in-memory simulated authority used by the
//!   `local` CLI mode and the test suite
//! - [`http::HttpGateway`] - JSON-RPC relay client (feature `http-gateway`)

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

use crate::game::errors::KingpinError;
use crate::game::types::{
    Account, AssetDefinition, AssetId, District, DistrictDefinition, EncounterEvent,
    PlayerRecord, TokenAmount, TokenId,
};

#[cfg(feature = "http-gateway")]
pub mod http;
pub mod local;

/// A state-mutating remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WriteOp {
    Register {
        token_id: TokenId,
    },
    MoveToDistrict {
        district: District,
    },
    AuthorizeSpend {
        spender: Account,
        #[serde(with = "decimal_amount")]
        amount: TokenAmount,
    },
    BuyAsset { asset: AssetId, amount: u64 },
    SellAsset { asset: AssetId, amount: u64 },
    RestoreActionPoints,
}

impl WriteOp {
    /// Remote method name.
    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::Register { .. } => "register",
            WriteOp::MoveToDistrict { .. } => "moveToDistrict",
            WriteOp::AuthorizeSpend { .. } => "authorizeSpend",
            WriteOp::BuyAsset { .. } => "buyAsset",
            WriteOp::SellAsset { .. } => "sellAsset",
            WriteOp::RestoreActionPoints => "restoreActionPoints",
        }
    }
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOp::Register { token_id } => write!(f, "registration with token #{}", token_id),
            WriteOp::MoveToDistrict { district } => write!(f, "move to {}", district),
            WriteOp::AuthorizeSpend { amount, .. } => {
                write!(f, "spend authorization of {}", amount)
            }
            WriteOp::BuyAsset { asset, amount } => write!(f, "buy {} of asset #{}", amount, asset),
            WriteOp::SellAsset { asset, amount } => {
                write!(f, "sell {} of asset #{}", amount, asset)
            }
            WriteOp::RestoreActionPoints => f.write_str("action point restore"),
        }
    }
}

/// Token amounts travel as decimal strings; JSON numbers cannot carry the
/// full `u128` range.
pub mod decimal_amount {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::game::types::TokenAmount;

    pub fn serialize<S: Serializer>(amount: &TokenAmount, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<TokenAmount, D::Error> {
        let raw = String::deserialize(de)?;
        raw.trim().parse().map_err(D::Error::custom)
    }
}

/// Handle for a submitted, not yet confirmed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub hash: String,
    pub op: WriteOp,
}

/// Proof that a write was finalized by the remote authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub hash: String,
    pub block: u64,
}

/// The remote authority's operation set.
///
/// Implementations report transport failures as
/// [`KingpinError::RemoteUnavailable`] and declined writes as
/// [`KingpinError::SubmissionRejected`].
#[allow(async_fn_in_trait)]
pub trait Gateway {
    async fn is_active_player(&self, account: &Account) -> Result<bool, KingpinError>;
    async fn get_player(&self, account: &Account) -> Result<PlayerRecord, KingpinError>;
    async fn get_inventory(&self, account: &Account, asset: AssetId) -> Result<u64, KingpinError>;
    async fn get_asset_count(&self) -> Result<u32, KingpinError>;
    async fn get_asset(&self, id: AssetId) -> Result<AssetDefinition, KingpinError>;
    async fn get_district(&self, district: District) -> Result<DistrictDefinition, KingpinError>;
    async fn get_asset_price(
        &self,
        district: District,
        asset: AssetId,
    ) -> Result<TokenAmount, KingpinError>;
    async fn get_identity_token_balance(&self, account: &Account) -> Result<u64, KingpinError>;
    async fn get_identity_token_by_index(
        &self,
        account: &Account,
        index: u64,
    ) -> Result<TokenId, KingpinError>;

    /// Send a write signed by `from`. Returns once the remote side accepted it
    /// for processing; it has no effect until confirmed.
    async fn submit(&self, from: &Account, op: WriteOp) -> Result<PendingTx, KingpinError>;

    /// Wait for a submitted write to be finalized.
    async fn confirm(&self, pending: PendingTx) -> Result<Receipt, KingpinError>;

    /// A fresh receiver on the encounter notification stream. Events for every
    /// account are delivered; filtering is the caller's job.
    fn subscribe_encounters(&self) -> broadcast::Receiver<EncounterEvent>;
}
