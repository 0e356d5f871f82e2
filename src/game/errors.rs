use thiserror::Error;

use crate::game::types::AssetId;

/// Errors surfaced by the synchronization and orchestration layer.
///
/// Every variant renders as a sentence that can be shown to the player as-is;
/// the client prefixes it with the failed intent ("Purchase failed: ...").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KingpinError {
    /// The gateway could not be reached, errored, or a confirmation wait elapsed.
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// The remote authority declined a write (reverted or refused).
    #[error("transaction rejected: {0}")]
    SubmissionRejected(String),

    #[error("not enough action points (have {available}, need {required})")]
    InsufficientActionPoints { available: u32, required: u32 },

    #[error("not enough of asset #{asset} in inventory (have {held}, requested {requested})")]
    InsufficientInventory {
        asset: AssetId,
        held: u64,
        requested: u64,
    },

    /// Registration requires owning at least one identity token.
    #[error("you need to mint a player identity token first")]
    MissingIdentityToken,

    /// A location id or grid cell outside the district table.
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("no account connected")]
    NotConnected,

    #[error("account is not registered as a player")]
    NotRegistered,

    #[error("account is already registered as a player")]
    AlreadyRegistered,

    #[error("unknown asset #{0}")]
    UnknownAsset(AssetId),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The gateway answered with data outside the local data model.
    #[error("invalid response from remote: {0}")]
    InvalidResponse(String),
}

impl KingpinError {
    /// True for failures decided entirely client-side, before any remote write.
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            KingpinError::RemoteUnavailable(_)
                | KingpinError::SubmissionRejected(_)
                | KingpinError::InvalidResponse(_)
        )
    }
}
