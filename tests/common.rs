#![allow(dead_code)]

//! Test utilities & fixtures.
//! Builds a seeded in-memory ledger and a client wired to it.

use std::sync::Arc;
use std::time::Duration;

use kingpin::config::LocalLedgerConfig;
use kingpin::game::types::{Account, District};
use kingpin::game::{ClientSettings, GameClient};
use kingpin::gateway::local::LocalLedger;
use kingpin::validation::parse_account;

pub fn account(n: u8) -> Account {
    parse_account(&format!("0x{:040x}", n)).expect("valid account")
}

pub fn game_account() -> Account {
    parse_account("0x00000000000000000000000000000000000000c0").expect("valid account")
}

pub fn player() -> Account {
    account(1)
}

pub fn settings() -> ClientSettings {
    ClientSettings {
        spender: game_account(),
        confirmation_timeout: Some(Duration::from_secs(5)),
        message_history: 20,
    }
}

/// Ledger where the player owns identity token #7 and 1000 game tokens.
/// Random encounters are off; tests emit them explicitly.
pub fn ledger() -> Arc<LocalLedger> {
    Arc::new(
        LocalLedger::builder(game_account())
            .config(LocalLedgerConfig {
                encounter_chance: 0.0,
                ..LocalLedgerConfig::default()
            })
            .with_account(player(), vec![7], 1_000)
            .build(),
    )
}

pub fn client(ledger: &Arc<LocalLedger>) -> GameClient<LocalLedger> {
    GameClient::new(ledger.clone(), settings())
}

/// Connected client for a player already registered at `district`.
pub async fn registered_client(
    ledger: &Arc<LocalLedger>,
    district: District,
    action_points: u32,
    inventory: &[(u32, u64)],
) -> GameClient<LocalLedger> {
    registered_client_with(ledger, settings(), district, action_points, inventory).await
}

pub async fn registered_client_with(
    ledger: &Arc<LocalLedger>,
    settings: ClientSettings,
    district: District,
    action_points: u32,
    inventory: &[(u32, u64)],
) -> GameClient<LocalLedger> {
    ledger.seed_player(&player(), district, action_points, inventory);
    let mut client = GameClient::new(ledger.clone(), settings);
    client.connect(player()).await.expect("connect");
    assert!(client.is_registered());
    ledger.clear_calls();
    client
}
