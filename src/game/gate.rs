//! # Action Gatekeeper
//!
//! Local fast-fail checks run against the current mirror before any remote
//! write is submitted. The remote authority re-enforces the same rules, so a
//! pass here is advisory; a failure here means nothing is sent.

use crate::game::errors::KingpinError;
use crate::game::sync::Catalog;
use crate::game::types::{AssetId, District, PlayerSnapshot};

/// Action points consumed by a move or a trade.
pub const ACTION_COST: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move(District),
    Buy { asset: AssetId, amount: u64 },
    Sell { asset: AssetId, amount: u64 },
    Restore,
}

impl Action {
    pub fn consumes_effort(&self) -> bool {
        !matches!(self, Action::Restore)
    }
}

/// What the gatekeeper sees: the mirror's state at the moment of the check.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub registered: bool,
    pub player: Option<&'a PlayerSnapshot>,
    pub catalog: Option<&'a Catalog>,
}

impl<'a> GateContext<'a> {
    /// Check a gameplay action.
    ///
    /// Order: registration, amount and asset validity, sell inventory, then
    /// action points. Inventory is checked before action points so that an
    /// oversized sell always reports `InsufficientInventory`.
    pub fn check(&self, action: &Action) -> Result<(), KingpinError> {
        if !self.registered {
            return Err(KingpinError::NotRegistered);
        }
        let player = self.player.ok_or_else(|| {
            KingpinError::RemoteUnavailable("player state has not been synchronized yet".into())
        })?;

        match *action {
            Action::Buy { asset, amount } => {
                check_amount(amount)?;
                self.check_asset(asset)?;
            }
            Action::Sell { asset, amount } => {
                check_amount(amount)?;
                self.check_asset(asset)?;
                let held = player.quantity(asset);
                if held < amount {
                    return Err(KingpinError::InsufficientInventory {
                        asset,
                        held,
                        requested: amount,
                    });
                }
            }
            Action::Move(_) | Action::Restore => {}
        }

        if action.consumes_effort() && player.action_points < ACTION_COST {
            return Err(KingpinError::InsufficientActionPoints {
                available: player.action_points,
                required: ACTION_COST,
            });
        }
        Ok(())
    }

    fn check_asset(&self, asset: AssetId) -> Result<(), KingpinError> {
        match self.catalog {
            Some(catalog) if catalog.asset(asset).is_some() => Ok(()),
            _ => Err(KingpinError::UnknownAsset(asset)),
        }
    }

    /// Registration is only offered to accounts that are not yet players.
    pub fn check_can_register(&self) -> Result<(), KingpinError> {
        if self.registered {
            Err(KingpinError::AlreadyRegistered)
        } else {
            Ok(())
        }
    }
}

/// Second half of the registration gate, fed by the remote balance query.
pub fn check_identity_balance(balance: u64) -> Result<(), KingpinError> {
    if balance == 0 {
        Err(KingpinError::MissingIdentityToken)
    } else {
        Ok(())
    }
}

fn check_amount(amount: u64) -> Result<(), KingpinError> {
    if amount == 0 {
        Err(KingpinError::InvalidAmount("amount must be at least 1".into()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::AssetDefinition;
    use std::collections::BTreeMap;

    fn catalog() -> Catalog {
        Catalog {
            assets: vec![
                AssetDefinition {
                    id: 0,
                    name: "GPU Rigs".into(),
                    base_price: 10,
                    volatility: 3,
                    is_contraband: false,
                },
                AssetDefinition {
                    id: 1,
                    name: "Stolen Data".into(),
                    base_price: 40,
                    volatility: 8,
                    is_contraband: true,
                },
            ],
            districts: Vec::new(),
        }
    }

    fn snapshot(action_points: u32, held: u64) -> PlayerSnapshot {
        let mut inventory = BTreeMap::new();
        inventory.insert(0, held);
        inventory.insert(1, 0);
        PlayerSnapshot {
            current_district: District::BlackMarket,
            action_points,
            inventory,
        }
    }

    fn ctx<'a>(snap: &'a PlayerSnapshot, cat: &'a Catalog) -> GateContext<'a> {
        GateContext {
            registered: true,
            player: Some(snap),
            catalog: Some(cat),
        }
    }

    #[test]
    fn zero_action_points_blocks_effortful_actions() {
        let cat = catalog();
        let snap = snapshot(0, 5);
        let gate = ctx(&snap, &cat);
        for action in [
            Action::Move(District::Docks),
            Action::Buy { asset: 0, amount: 1 },
            Action::Sell { asset: 0, amount: 1 },
        ] {
            assert!(
                matches!(
                    gate.check(&action),
                    Err(KingpinError::InsufficientActionPoints { available: 0, required: 1 })
                ),
                "{:?} should be blocked",
                action
            );
        }
        assert!(gate.check(&Action::Restore).is_ok());
    }

    #[test]
    fn oversized_sell_reports_inventory_regardless_of_action_points() {
        let cat = catalog();
        for ap in [0, 1, 10] {
            let snap = snapshot(ap, 2);
            let err = ctx(&snap, &cat)
                .check(&Action::Sell { asset: 0, amount: 3 })
                .unwrap_err();
            assert_eq!(
                err,
                KingpinError::InsufficientInventory {
                    asset: 0,
                    held: 2,
                    requested: 3
                }
            );
        }
    }

    #[test]
    fn unregistered_accounts_are_gated() {
        let gate = GateContext {
            registered: false,
            player: None,
            catalog: None,
        };
        assert_eq!(gate.check(&Action::Restore), Err(KingpinError::NotRegistered));
        assert!(gate.check_can_register().is_ok());
    }

    #[test]
    fn unknown_assets_and_zero_amounts_are_rejected() {
        let cat = catalog();
        let snap = snapshot(3, 1);
        let gate = ctx(&snap, &cat);
        assert_eq!(
            gate.check(&Action::Buy { asset: 9, amount: 1 }),
            Err(KingpinError::UnknownAsset(9))
        );
        assert!(matches!(
            gate.check(&Action::Buy { asset: 0, amount: 0 }),
            Err(KingpinError::InvalidAmount(_))
        ));
        assert!(gate.check(&Action::Buy { asset: 1, amount: 4 }).is_ok());
    }

    #[test]
    fn identity_balance_gate() {
        assert_eq!(check_identity_balance(0), Err(KingpinError::MissingIdentityToken));
        assert!(check_identity_balance(2).is_ok());
    }
}
