//! In-memory simulated game authority.
//!
//! `LocalLedger` applies the game's rules to a private state table so the
//! client can run without a network: registration against identity tokens,
//! action points, allowance-checked purchases, sales, restores and random
//! encounters. Writes take effect only in [`Gateway::confirm`], mirroring a
//! real ledger where a submitted transaction may still revert.
//!
//! Every gateway call is appended to a call log, and one-shot faults can be
//! armed per method, which is what the integration tests lean on.

use log::{debug, trace};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::LocalLedgerConfig;
use crate::game::errors::KingpinError;
use crate::game::types::{
    Account, AssetDefinition, AssetId, District, DistrictDefinition, EncounterEvent,
    PlayerRecord, TokenAmount, TokenId,
};
use crate::gateway::{Gateway, PendingTx, Receipt, WriteOp};

/// Kinds of encounter the simulated authority emits.
pub const ENCOUNTER_KINDS: u8 = 4;

/// One entry of the call log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    Read(&'static str),
    Submit(WriteOp),
    Confirm(WriteOp),
}

#[derive(Debug, Clone)]
struct PlayerState {
    district: District,
    action_points: u32,
    inventory: HashMap<AssetId, u64>,
}

#[derive(Debug, Default)]
struct LedgerState {
    assets: Vec<AssetDefinition>,
    districts: Vec<DistrictDefinition>,
    players: HashMap<Account, PlayerState>,
    identity_tokens: HashMap<Account, Vec<TokenId>>,
    used_tokens: HashSet<TokenId>,
    balances: HashMap<Account, TokenAmount>,
    allowances: HashMap<(Account, Account), TokenAmount>,
    prices: HashMap<(District, AssetId), TokenAmount>,
    pending: HashMap<String, (Account, WriteOp)>,
    nonce: u64,
    block: u64,
}

#[derive(Debug, Default)]
struct Faults {
    failing_reads: HashSet<&'static str>,
    rejected_writes: HashSet<&'static str>,
    stalled_confirms: HashSet<&'static str>,
    read_delay: Option<Duration>,
}

/// Builder for a seeded ledger.
pub struct LocalLedgerBuilder {
    game_account: Account,
    config: LocalLedgerConfig,
    accounts: Vec<(Account, Vec<TokenId>, TokenAmount)>,
    assets: Option<Vec<AssetDefinition>>,
    districts: Option<Vec<DistrictDefinition>>,
}

impl LocalLedgerBuilder {
    pub fn new(game_account: Account) -> Self {
        Self {
            game_account,
            config: LocalLedgerConfig::default(),
            accounts: Vec::new(),
            assets: None,
            districts: None,
        }
    }

    pub fn config(mut self, config: LocalLedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Give `account` identity tokens and a game-token balance.
    pub fn with_account(
        mut self,
        account: Account,
        identity_tokens: Vec<TokenId>,
        balance: TokenAmount,
    ) -> Self {
        self.accounts.push((account, identity_tokens, balance));
        self
    }

    pub fn assets(mut self, assets: Vec<AssetDefinition>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn districts(mut self, districts: Vec<DistrictDefinition>) -> Self {
        self.districts = Some(districts);
        self
    }

    pub fn build(self) -> LocalLedger {
        let mut state = LedgerState {
            assets: self.assets.unwrap_or_else(default_assets),
            districts: self.districts.unwrap_or_else(default_districts),
            ..LedgerState::default()
        };
        for (account, tokens, balance) in self.accounts {
            state.identity_tokens.insert(account.clone(), tokens);
            state.balances.insert(account, balance);
        }
        let (events, _) = broadcast::channel(64);
        LocalLedger {
            game_account: self.game_account,
            config: self.config,
            state: Mutex::new(state),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
            events,
        }
    }
}

pub struct LocalLedger {
    game_account: Account,
    config: LocalLedgerConfig,
    state: Mutex<LedgerState>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<LedgerCall>>,
    events: broadcast::Sender<EncounterEvent>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LocalLedger {
    pub fn builder(game_account: Account) -> LocalLedgerBuilder {
        LocalLedgerBuilder::new(game_account)
    }

    pub fn game_account(&self) -> &Account {
        &self.game_account
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<LedgerCall> {
        lock(&self.calls).clone()
    }

    /// Writes in submission order.
    pub fn submitted(&self) -> Vec<WriteOp> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                LedgerCall::Submit(op) => Some(op.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// The next call to read `method` fails with `RemoteUnavailable`.
    pub fn fail_next_read(&self, method: &'static str) {
        lock(&self.faults).failing_reads.insert(method);
    }

    /// The next confirmation of a `method` write reverts.
    pub fn reject_next_write(&self, method: &'static str) {
        lock(&self.faults).rejected_writes.insert(method);
    }

    /// The next confirmation of a `method` write never resolves.
    pub fn stall_next_confirm(&self, method: &'static str) {
        lock(&self.faults).stalled_confirms.insert(method);
    }

    /// Every read answers after `delay`, like a slow node.
    pub fn set_read_delay(&self, delay: Duration) {
        lock(&self.faults).read_delay = Some(delay).filter(|d| !d.is_zero());
    }

    pub fn set_price(&self, district: District, asset: AssetId, price: TokenAmount) {
        lock(&self.state).prices.insert((district, asset), price);
    }

    pub fn set_action_points(&self, account: &Account, action_points: u32) {
        if let Some(player) = lock(&self.state).players.get_mut(account) {
            player.action_points = action_points;
        }
    }

    /// Put an already-registered player in place, bypassing the register flow.
    pub fn seed_player(
        &self,
        account: &Account,
        district: District,
        action_points: u32,
        inventory: &[(AssetId, u64)],
    ) {
        lock(&self.state).players.insert(
            account.clone(),
            PlayerState {
                district,
                action_points,
                inventory: inventory.iter().copied().collect(),
            },
        );
    }

    pub fn balance_of(&self, account: &Account) -> TokenAmount {
        lock(&self.state).balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Account, spender: &Account) -> TokenAmount {
        lock(&self.state)
            .allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Publish an encounter as if the game had rolled one.
    pub fn emit_encounter(&self, account: &Account, encounter_type: u8) {
        let _ = self.events.send(EncounterEvent {
            account: account.clone(),
            encounter_type,
        });
    }

    async fn read(&self, method: &'static str) -> Result<(), KingpinError> {
        trace!("local ledger read {}", method);
        lock(&self.calls).push(LedgerCall::Read(method));
        let (fail, delay) = {
            let mut faults = lock(&self.faults);
            (faults.failing_reads.remove(method), faults.read_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(KingpinError::RemoteUnavailable(format!(
                "{} failed: connection reset",
                method
            )));
        }
        Ok(())
    }

    fn price_in(state: &LedgerState, district: District, asset: AssetId) -> Option<TokenAmount> {
        if let Some(price) = state.prices.get(&(district, asset)) {
            return Some(*price);
        }
        let base = state.assets.get(asset as usize)?.base_price;
        let risk = state
            .districts
            .iter()
            .find(|d| d.id == district)
            .map(|d| TokenAmount::from(d.risk_level))
            .unwrap_or(0);
        Some(base * (10 + risk) / 10)
    }

    fn apply(&self, from: &Account, op: &WriteOp) -> Result<Option<EncounterEvent>, String> {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        match op {
            WriteOp::Register { token_id } => {
                let owned = state
                    .identity_tokens
                    .get(from)
                    .map(|t| t.contains(token_id))
                    .unwrap_or(false);
                if !owned {
                    return Err(format!("token #{} is not owned by caller", token_id));
                }
                if state.players.contains_key(from) {
                    return Err("already registered".into());
                }
                if !state.used_tokens.insert(*token_id) {
                    return Err(format!("token #{} already registered", token_id));
                }
                state.players.insert(
                    from.clone(),
                    PlayerState {
                        district: District::Financial,
                        action_points: self.config.starting_action_points,
                        inventory: HashMap::new(),
                    },
                );
                Ok(None)
            }
            WriteOp::MoveToDistrict { district } => {
                let active = state
                    .districts
                    .iter()
                    .find(|d| d.id == *district)
                    .map(|d| (d.active, d.risk_level));
                let (is_active, risk) = active.ok_or("unknown district")?;
                if !is_active {
                    return Err("district is closed".into());
                }
                let player = state.players.get_mut(from).ok_or("not a player")?;
                spend_action_point(player)?;
                player.district = *district;

                let chance = (self.config.encounter_chance * f64::from(risk) / 10.0).clamp(0.0, 1.0);
                let mut rng = rand::thread_rng();
                if chance > 0.0 && rng.gen_bool(chance) {
                    return Ok(Some(EncounterEvent {
                        account: from.clone(),
                        encounter_type: rng.gen_range(0..ENCOUNTER_KINDS),
                    }));
                }
                Ok(None)
            }
            WriteOp::AuthorizeSpend { spender, amount } => {
                state
                    .allowances
                    .insert((from.clone(), spender.clone()), *amount);
                Ok(None)
            }
            WriteOp::BuyAsset { asset, amount } => {
                let district = state.players.get(from).ok_or("not a player")?.district;
                let price = Self::price_in(state, district, *asset).ok_or("unknown asset")?;
                let cost = price
                    .checked_mul(TokenAmount::from(*amount))
                    .ok_or("cost overflow")?;
                let key = (from.clone(), self.game_account.clone());
                let allowance = state.allowances.get(&key).copied().unwrap_or(0);
                if allowance < cost {
                    return Err(format!("allowance {} below cost {}", allowance, cost));
                }
                let balance = state.balances.get(from).copied().unwrap_or(0);
                if balance < cost {
                    return Err(format!("balance {} below cost {}", balance, cost));
                }
                let player = state.players.get_mut(from).ok_or("not a player")?;
                spend_action_point(player)?;
                *player.inventory.entry(*asset).or_insert(0) += amount;
                state.allowances.insert(key, allowance - cost);
                state.balances.insert(from.clone(), balance - cost);
                Ok(None)
            }
            WriteOp::SellAsset { asset, amount } => {
                let district = state.players.get(from).ok_or("not a player")?.district;
                let price = Self::price_in(state, district, *asset).ok_or("unknown asset")?;
                let proceeds = price
                    .checked_mul(TokenAmount::from(*amount))
                    .ok_or("proceeds overflow")?;
                let player = state.players.get_mut(from).ok_or("not a player")?;
                let held = player.inventory.get(asset).copied().unwrap_or(0);
                if held < *amount {
                    return Err(format!("holding {} below {}", held, amount));
                }
                spend_action_point(player)?;
                player.inventory.insert(*asset, held - amount);
                *state.balances.entry(from.clone()).or_insert(0) += proceeds;
                Ok(None)
            }
            WriteOp::RestoreActionPoints => {
                let player = state.players.get_mut(from).ok_or("not a player")?;
                player.action_points = self.config.max_action_points;
                Ok(None)
            }
        }
    }
}

fn spend_action_point(player: &mut PlayerState) -> Result<(), String> {
    if player.action_points == 0 {
        return Err("no action points".into());
    }
    player.action_points -= 1;
    Ok(())
}

impl Gateway for LocalLedger {
    async fn is_active_player(&self, account: &Account) -> Result<bool, KingpinError> {
        self.read("isActivePlayer").await?;
        Ok(lock(&self.state).players.contains_key(account))
    }

    async fn get_player(&self, account: &Account) -> Result<PlayerRecord, KingpinError> {
        self.read("getPlayer").await?;
        let state = lock(&self.state);
        // Unregistered accounts read as the zero record, like an unset mapping slot.
        Ok(state
            .players
            .get(account)
            .map(|p| PlayerRecord {
                district: u32::from(p.district.id()),
                action_points: p.action_points,
            })
            .unwrap_or(PlayerRecord {
                district: 0,
                action_points: 0,
            }))
    }

    async fn get_inventory(&self, account: &Account, asset: AssetId) -> Result<u64, KingpinError> {
        self.read("getInventory").await?;
        Ok(lock(&self.state)
            .players
            .get(account)
            .and_then(|p| p.inventory.get(&asset).copied())
            .unwrap_or(0))
    }

    async fn get_asset_count(&self) -> Result<u32, KingpinError> {
        self.read("getAssetCount").await?;
        Ok(lock(&self.state).assets.len() as u32)
    }

    async fn get_asset(&self, id: AssetId) -> Result<AssetDefinition, KingpinError> {
        self.read("getAsset").await?;
        lock(&self.state)
            .assets
            .get(id as usize)
            .cloned()
            .ok_or_else(|| KingpinError::RemoteUnavailable(format!("asset #{} out of range", id)))
    }

    async fn get_district(&self, district: District) -> Result<DistrictDefinition, KingpinError> {
        self.read("getDistrict").await?;
        // The district table is indexed by id, like the remote mapping.
        lock(&self.state)
            .districts
            .get(usize::from(district.id()))
            .cloned()
            .ok_or_else(|| {
                KingpinError::RemoteUnavailable(format!("district {} not configured", district))
            })
    }

    async fn get_asset_price(
        &self,
        district: District,
        asset: AssetId,
    ) -> Result<TokenAmount, KingpinError> {
        self.read("getAssetPrice").await?;
        let state = lock(&self.state);
        Self::price_in(&state, district, asset)
            .ok_or_else(|| KingpinError::RemoteUnavailable(format!("no price for asset #{}", asset)))
    }

    async fn get_identity_token_balance(&self, account: &Account) -> Result<u64, KingpinError> {
        self.read("getIdentityTokenBalance").await?;
        Ok(lock(&self.state)
            .identity_tokens
            .get(account)
            .map(|t| t.len() as u64)
            .unwrap_or(0))
    }

    async fn get_identity_token_by_index(
        &self,
        account: &Account,
        index: u64,
    ) -> Result<TokenId, KingpinError> {
        self.read("getIdentityTokenByIndex").await?;
        lock(&self.state)
            .identity_tokens
            .get(account)
            .and_then(|t| usize::try_from(index).ok().and_then(|i| t.get(i)).copied())
            .ok_or_else(|| {
                KingpinError::RemoteUnavailable(format!("owner index {} out of bounds", index))
            })
    }

    async fn submit(&self, from: &Account, op: WriteOp) -> Result<PendingTx, KingpinError> {
        lock(&self.calls).push(LedgerCall::Submit(op.clone()));
        let mut state = lock(&self.state);
        state.nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(state.nonce.to_be_bytes());
        hasher.update(from.as_str().as_bytes());
        hasher.update(op.name().as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .fold(String::from("0x"), |mut acc, b| {
                acc.push_str(&format!("{:02x}", b));
                acc
            });
        state
            .pending
            .insert(hash.clone(), (from.clone(), op.clone()));
        debug!("local ledger accepted {} as {}", op.name(), hash);
        Ok(PendingTx { hash, op })
    }

    async fn confirm(&self, pending: PendingTx) -> Result<Receipt, KingpinError> {
        lock(&self.calls).push(LedgerCall::Confirm(pending.op.clone()));
        let entry = lock(&self.state).pending.remove(&pending.hash);
        let (from, op) = entry.ok_or_else(|| {
            KingpinError::SubmissionRejected(format!("unknown transaction {}", pending.hash))
        })?;

        let stall = lock(&self.faults).stalled_confirms.remove(op.name());
        if stall {
            debug!("local ledger stalling confirmation of {}", pending.hash);
            std::future::pending::<()>().await;
        }
        if lock(&self.faults).rejected_writes.remove(op.name()) {
            return Err(KingpinError::SubmissionRejected(format!(
                "{} reverted",
                op.name()
            )));
        }

        let encounter = self.apply(&from, &op).map_err(|reason| {
            KingpinError::SubmissionRejected(format!("{} reverted: {}", op.name(), reason))
        })?;

        let block = {
            let mut state = lock(&self.state);
            state.block += 1;
            state.block
        };
        if let Some(event) = encounter {
            let _ = self.events.send(event);
        }
        Ok(Receipt {
            hash: pending.hash,
            block,
        })
    }

    fn subscribe_encounters(&self) -> broadcast::Receiver<EncounterEvent> {
        self.events.subscribe()
    }
}

pub fn default_assets() -> Vec<AssetDefinition> {
    [
        ("GPU Rigs", 10, 3, false),
        ("Rare Sneakers", 25, 5, false),
        ("Stolen Data", 40, 8, true),
        ("Vintage Wine", 60, 2, false),
        ("Smuggled Cigars", 15, 6, true),
    ]
    .into_iter()
    .enumerate()
    .map(|(id, (name, base_price, volatility, is_contraband))| AssetDefinition {
        id: id as AssetId,
        name: name.to_string(),
        base_price,
        volatility,
        is_contraband,
    })
    .collect()
}

pub fn default_districts() -> Vec<DistrictDefinition> {
    let table: [(District, &str, u8, u8); District::COUNT] = [
        (District::Financial, "Financial District", 2, 8),
        (District::TechHub, "Tech Hub", 3, 5),
        (District::BlackMarket, "Black Market", 9, 2),
        (District::Residential, "Residential", 2, 6),
        (District::Industrial, "Industrial Zone", 5, 4),
        (District::Docks, "Docks", 7, 3),
        (District::Downtown, "Downtown", 5, 7),
        (District::Outskirts, "Outskirts", 6, 1),
    ];
    table
        .into_iter()
        .map(|(id, name, risk_level, police_presence)| DistrictDefinition {
            id,
            name: name.to_string(),
            risk_level,
            police_presence,
            active: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::parse_account;

    fn acct(last: &str) -> Account {
        parse_account(&format!("0x{:0>40}", last)).unwrap()
    }

    #[tokio::test]
    async fn buy_requires_exact_allowance_for_the_game() {
        let game = acct("aa");
        let player = acct("01");
        let ledger = LocalLedger::builder(game.clone())
            .with_account(player.clone(), vec![7], 100)
            .build();
        ledger.seed_player(&player, District::BlackMarket, 3, &[]);
        ledger.set_price(District::BlackMarket, 0, 10);

        let buy = ledger
            .submit(&player, WriteOp::BuyAsset { asset: 0, amount: 3 })
            .await
            .unwrap();
        assert!(matches!(
            ledger.confirm(buy).await,
            Err(KingpinError::SubmissionRejected(_))
        ));

        let auth = ledger
            .submit(
                &player,
                WriteOp::AuthorizeSpend {
                    spender: game.clone(),
                    amount: 30,
                },
            )
            .await
            .unwrap();
        ledger.confirm(auth).await.unwrap();
        let buy = ledger
            .submit(&player, WriteOp::BuyAsset { asset: 0, amount: 3 })
            .await
            .unwrap();
        ledger.confirm(buy).await.unwrap();

        assert_eq!(ledger.balance_of(&player), 70);
        assert_eq!(ledger.allowance(&player, &game), 0);
        assert_eq!(ledger.get_inventory(&player, 0).await.unwrap(), 3);
        assert_eq!(ledger.get_player(&player).await.unwrap().action_points, 2);
    }

    #[tokio::test]
    async fn one_shot_faults_fire_once() {
        let ledger = LocalLedger::builder(acct("aa")).build();
        ledger.fail_next_read("getAssetCount");
        assert!(ledger.get_asset_count().await.is_err());
        assert_eq!(ledger.get_asset_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn stalled_confirmation_never_applies() {
        let player = acct("01");
        let ledger = LocalLedger::builder(acct("aa")).build();
        ledger.seed_player(&player, District::Docks, 0, &[]);
        ledger.stall_next_confirm("restoreActionPoints");

        let pending = ledger
            .submit(&player, WriteOp::RestoreActionPoints)
            .await
            .unwrap();
        let waited =
            tokio::time::timeout(Duration::from_millis(20), ledger.confirm(pending)).await;
        assert!(waited.is_err());
        assert_eq!(ledger.get_player(&player).await.unwrap().action_points, 0);

        let pending = ledger
            .submit(&player, WriteOp::RestoreActionPoints)
            .await
            .unwrap();
        ledger.confirm(pending).await.unwrap();
        assert_eq!(ledger.get_player(&player).await.unwrap().action_points, 10);
    }

    #[test]
    fn default_tables_cover_every_district() {
        let districts = default_districts();
        assert_eq!(districts.len(), District::COUNT);
        for (idx, d) in districts.iter().enumerate() {
            assert_eq!(d.id.id() as usize, idx);
            assert!(d.risk_level <= 10 && d.police_presence <= 10);
        }
    }
}
