//! Data model mirrored from the remote authority.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::game::errors::KingpinError;
use crate::validation::AccountError;

pub type AssetId = u32;
pub type TokenId = u64;
/// Game-token amounts (prices, costs, allowances).
pub type TokenAmount = u128;

/// A connected ledger identity, always stored as lowercase `0x` + 40 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account(String);

impl Account {
    /// Callers must have validated and lowercased `addr` already.
    pub(crate) fn from_normalized(addr: String) -> Self {
        Account(addr)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Account {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::validation::parse_account(s)
    }
}

impl TryFrom<String> for Account {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        crate::validation::parse_account(&value)
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.0
    }
}

/// The eight district kinds, in remote id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum District {
    Financial,
    TechHub,
    BlackMarket,
    Residential,
    Industrial,
    Docks,
    Downtown,
    Outskirts,
}

impl District {
    pub const COUNT: usize = 8;

    pub const ALL: [District; District::COUNT] = [
        District::Financial,
        District::TechHub,
        District::BlackMarket,
        District::Residential,
        District::Industrial,
        District::Docks,
        District::Downtown,
        District::Outskirts,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Resolve a remote or user-supplied location id.
    pub fn from_id(id: u32) -> Result<Self, KingpinError> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| District::ALL.get(idx).copied())
            .ok_or_else(|| KingpinError::InvalidLocation(format!("district id {}", id)))
    }

    /// Enumeration label used by the contract (e.g. `BLACK_MARKET`).
    pub fn label(self) -> &'static str {
        match self {
            District::Financial => "FINANCIAL",
            District::TechHub => "TECH_HUB",
            District::BlackMarket => "BLACK_MARKET",
            District::Residential => "RESIDENTIAL",
            District::Industrial => "INDUSTRIAL",
            District::Docks => "DOCKS",
            District::Downtown => "DOWNTOWN",
            District::Outskirts => "OUTSKIRTS",
        }
    }
}

impl fmt::Display for District {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<u8> for District {
    type Error = KingpinError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        District::from_id(u32::from(value))
    }
}

impl From<District> for u8 {
    fn from(d: District) -> Self {
        d.id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDefinition {
    pub id: AssetId,
    pub name: String,
    pub base_price: TokenAmount,
    pub volatility: u32,
    pub is_contraband: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictDefinition {
    pub id: District,
    pub name: String,
    /// 0-10
    pub risk_level: u8,
    /// 0-10
    pub police_presence: u8,
    pub active: bool,
}

/// Raw per-account record as returned by `getPlayer`. The district stays a raw
/// id here; the synchronizer validates it before it enters a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub district: u32,
    pub action_points: u32,
}

/// Complete local copy of one account's remote state. Never patched: every
/// resynchronization builds a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub current_district: District,
    pub action_points: u32,
    pub inventory: BTreeMap<AssetId, u64>,
}

impl PlayerSnapshot {
    pub fn quantity(&self, asset: AssetId) -> u64 {
        self.inventory.get(&asset).copied().unwrap_or(0)
    }

    /// Assets with a non-zero holding.
    pub fn holdings(&self) -> impl Iterator<Item = (AssetId, u64)> + '_ {
        self.inventory
            .iter()
            .filter(|(_, qty)| **qty > 0)
            .map(|(id, qty)| (*id, *qty))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: u8,
    pub y: u8,
}

impl GridPosition {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// `EncounterOccurred(account, encounterType)` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterEvent {
    pub account: Account,
    pub encounter_type: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn district_ids_follow_enumeration_order() {
        for (idx, district) in District::ALL.iter().enumerate() {
            assert_eq!(district.id() as usize, idx);
            assert_eq!(District::from_id(idx as u32).unwrap(), *district);
        }
        assert_eq!(District::BlackMarket.label(), "BLACK_MARKET");
    }

    #[test]
    fn out_of_range_district_is_invalid_location() {
        let err = District::from_id(9).unwrap_err();
        assert!(matches!(err, KingpinError::InvalidLocation(_)));
        assert!(District::try_from(8u8).is_err());
    }

    #[test]
    fn snapshot_quantity_defaults_to_zero() {
        let mut inventory = BTreeMap::new();
        inventory.insert(0, 4);
        inventory.insert(1, 0);
        let snap = PlayerSnapshot {
            current_district: District::Docks,
            action_points: 3,
            inventory,
        };
        assert_eq!(snap.quantity(0), 4);
        assert_eq!(snap.quantity(7), 0);
        assert_eq!(snap.holdings().collect::<Vec<_>>(), vec![(0, 4)]);
    }
}
