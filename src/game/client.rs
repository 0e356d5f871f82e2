//! Session façade handed to the presentation layer.
//!
//! Every intent follows the same shape: gate locally, run the transaction plan,
//! resynchronize from the remote authority, then post a status message. Every
//! path (success, gate failure, remote failure) ends with a status post.

use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::game::coords;
use crate::game::errors::KingpinError;
use crate::game::events::EncounterListener;
use crate::game::gate::{self, Action, GateContext};
use crate::game::orchestrator::{self, Intent, PlanAborted, TransactionOrchestrator, TxPlan};
use crate::game::status::StatusBoard;
use crate::game::sync::{Catalog, GameMirror, PlayerView, StateSynchronizer};
use crate::game::types::{Account, AssetId, District, GridPosition, PlayerSnapshot, TokenAmount};
use crate::gateway::Gateway;
use crate::logutil::{escape_log, short_account};
use crate::metrics;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Address authorized to pull payment for purchases (the game contract).
    pub spender: Account,
    pub confirmation_timeout: Option<Duration>,
    pub message_history: usize,
}

impl ClientSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            spender: config.gateway.game_account()?,
            confirmation_timeout: config.gateway.confirmation_timeout(),
            message_history: config.client.message_history,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub asset: AssetId,
    pub amount: u64,
    pub price: TokenAmount,
    pub total: TokenAmount,
}

/// Why an intent did not complete, plus what the player should know about
/// remote effects that did happen.
struct Failure {
    error: KingpinError,
    note: Option<String>,
}

impl From<KingpinError> for Failure {
    fn from(error: KingpinError) -> Self {
        Failure { error, note: None }
    }
}

pub struct GameClient<G> {
    gateway: Arc<G>,
    mirror: Arc<GameMirror>,
    sync: StateSynchronizer<G>,
    orchestrator: TransactionOrchestrator<G>,
    listener: EncounterListener,
    status: StatusBoard,
    spender: Account,
    account: Option<Account>,
}

impl<G: Gateway> GameClient<G> {
    pub fn new(gateway: Arc<G>, settings: ClientSettings) -> Self {
        let mirror = Arc::new(GameMirror::new());
        Self {
            sync: StateSynchronizer::new(gateway.clone(), mirror.clone()),
            orchestrator: TransactionOrchestrator::new(
                gateway.clone(),
                settings.confirmation_timeout,
            ),
            gateway,
            mirror,
            listener: EncounterListener::new(),
            status: StatusBoard::new(settings.message_history),
            spender: settings.spender,
            account: None,
        }
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn mirror(&self) -> &GameMirror {
        &self.mirror
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        self.mirror.catalog()
    }

    pub fn player(&self) -> Option<Arc<PlayerView>> {
        self.mirror.player()
    }

    pub fn snapshot(&self) -> Option<PlayerSnapshot> {
        self.mirror.snapshot()
    }

    pub fn position(&self) -> Option<GridPosition> {
        self.mirror.position()
    }

    pub fn is_registered(&self) -> bool {
        self.mirror.is_registered()
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_active()
    }

    /// Start a session: game data and registration are loaded concurrently.
    pub async fn connect(&mut self, account: Account) -> Result<(), KingpinError> {
        if self.account.as_ref() != Some(&account) {
            self.disconnect();
        }
        info!("connecting as {}", short_account(account.as_str()));
        self.account = Some(account.clone());

        let (game_data, registration) = tokio::join!(
            self.sync.load_game_data(),
            self.sync.check_registration(&account)
        );
        match game_data.and(registration) {
            Ok(registered) => {
                let mut msg = format!("Connected as {}", short_account(account.as_str()));
                if !registered {
                    msg.push_str(" (not registered)");
                }
                self.status.post(msg);
                Ok(())
            }
            Err(e) => {
                self.status.post(format!("Connection failed: {}", e));
                Err(e)
            }
        }
    }

    /// End the session. The catalog is kept; everything account-bound is cleared.
    pub fn disconnect(&mut self) {
        if let Some(account) = self.account.take() {
            info!("disconnecting {}", short_account(account.as_str()));
            self.listener.cancel();
            self.mirror.clear_session();
            self.status.post("Disconnected");
        }
    }

    fn require_account(&self) -> Result<&Account, KingpinError> {
        self.account.as_ref().ok_or(KingpinError::NotConnected)
    }

    /// Re-fetch game data, reporting through the status board.
    pub async fn refresh_game_data(&self) -> Result<(), KingpinError> {
        match self.sync.load_game_data().await {
            Ok(_) => {
                self.status.post("Game data refreshed");
                Ok(())
            }
            Err(e) => {
                self.status.post(format!("Loading game data failed: {}", e));
                Err(e)
            }
        }
    }

    /// Re-fetch player state (and registration), reporting through the status board.
    pub async fn refresh_player(&self) -> Result<(), KingpinError> {
        let outcome = match self.require_account() {
            Ok(account) => self.sync.check_registration(account).await.map(|_| ()),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => {
                self.status.post("Player state refreshed");
                Ok(())
            }
            Err(e) => {
                self.status.post(format!("Loading player state failed: {}", e));
                Err(e)
            }
        }
    }

    fn gate_context<'a>(
        &self,
        player: Option<&'a PlayerSnapshot>,
        catalog: Option<&'a Catalog>,
    ) -> GateContext<'a> {
        GateContext {
            registered: self.mirror.is_registered(),
            player,
            catalog,
        }
    }

    fn gate(&self, action: &Action) -> Result<(), KingpinError> {
        let view = self.mirror.player();
        let catalog = self.mirror.catalog();
        self.gate_context(view.as_deref().map(|v| &v.snapshot), catalog.as_deref())
            .check(action)
    }

    pub async fn register(&self) -> Result<(), KingpinError> {
        let outcome = self.try_register().await;
        self.settle(Intent::Register, outcome)
    }

    async fn try_register(&self) -> Result<String, Failure> {
        let account = self.require_account()?;
        self.gate_context(None, None).check_can_register()?;
        let balance = self.gateway.get_identity_token_balance(account).await?;
        gate::check_identity_balance(balance)?;
        let token_id = self.gateway.get_identity_token_by_index(account, 0).await?;

        self.run_plan(account, &TxPlan::register(token_id)).await?;
        self.mirror.set_registered(true);
        self.refresh_after_commit(account).await?;
        Ok("Successfully registered as a player!".to_string())
    }

    /// Move to a district by raw location id.
    pub async fn move_to(&self, district_id: u32) -> Result<(), KingpinError> {
        let outcome = self.try_move(district_id).await;
        self.settle(Intent::Move, outcome)
    }

    /// Route a click on a grid cell to a move.
    pub async fn move_to_cell(&self, pos: GridPosition) -> Result<(), KingpinError> {
        let outcome = match coords::route_cell(pos) {
            Ok(district) => self.try_move(u32::from(district.id())).await,
            Err(e) => Err(e.into()),
        };
        self.settle(Intent::Move, outcome)
    }

    async fn try_move(&self, district_id: u32) -> Result<String, Failure> {
        let district = District::from_id(district_id)?;
        let account = self.require_account()?;
        self.gate(&Action::Move(district))?;

        self.run_plan(account, &TxPlan::move_to(district)).await?;
        let refreshed = self.refresh_after_commit(account).await;
        self.listener
            .ensure_subscribed(self.gateway.as_ref(), account, &self.status);
        refreshed?;

        let name = self
            .mirror
            .catalog()
            .map(|c| c.district_name(district))
            .unwrap_or_else(|| district.label().to_string());
        Ok(format!("Moved to {}", name))
    }

    /// Current price for `amount` of `asset` in the player's district.
    /// Nothing is submitted.
    pub async fn quote(&self, asset: AssetId, amount: u64) -> Result<Quote, KingpinError> {
        match self.try_quote(asset, amount).await {
            Ok(quote) => {
                self.status.post(format!(
                    "Quote: {} {} at {} = {}",
                    amount,
                    self.asset_name(asset),
                    quote.price,
                    quote.total
                ));
                Ok(quote)
            }
            Err(e) => {
                self.status.post(format!("Quote failed: {}", e));
                Err(e)
            }
        }
    }

    async fn try_quote(&self, asset: AssetId, amount: u64) -> Result<Quote, KingpinError> {
        self.require_account()?;
        let view = self.mirror.player().ok_or(KingpinError::NotRegistered)?;
        let price = self
            .gateway
            .get_asset_price(view.snapshot.current_district, asset)
            .await?;
        Ok(Quote {
            asset,
            amount,
            price,
            total: orchestrator::total_cost(price, amount)?,
        })
    }

    /// Unit prices of every catalog asset in the player's district, for market
    /// listings. Read-only and silent: the status line is left alone.
    pub async fn market_prices(&self) -> Result<BTreeMap<AssetId, TokenAmount>, KingpinError> {
        let view = self.mirror.player().ok_or(KingpinError::NotRegistered)?;
        let catalog = self
            .mirror
            .catalog()
            .ok_or_else(|| KingpinError::RemoteUnavailable("game data is not loaded".into()))?;
        let mut prices = BTreeMap::new();
        for id in catalog.asset_ids() {
            let price = self
                .gateway
                .get_asset_price(view.snapshot.current_district, id)
                .await?;
            prices.insert(id, price);
        }
        Ok(prices)
    }

    pub async fn buy(&self, asset: AssetId, amount: u64) -> Result<(), KingpinError> {
        let outcome = self.try_buy(asset, amount).await;
        self.settle(Intent::Buy, outcome)
    }

    async fn try_buy(&self, asset: AssetId, amount: u64) -> Result<String, Failure> {
        let account = self.require_account()?;
        self.gate(&Action::Buy { asset, amount })?;
        let view = self.mirror.player().ok_or(KingpinError::NotRegistered)?;

        // Price is read once here; the authorization is computed from it.
        let price = self
            .gateway
            .get_asset_price(view.snapshot.current_district, asset)
            .await?;
        let plan = TxPlan::buy(self.spender.clone(), price, asset, amount)?;

        self.run_plan(account, &plan).await?;
        self.refresh_after_commit(account).await?;
        Ok(format!("Bought {} {}", amount, self.asset_name(asset)))
    }

    pub async fn sell(&self, asset: AssetId, amount: u64) -> Result<(), KingpinError> {
        let outcome = self.try_sell(asset, amount).await;
        self.settle(Intent::Sell, outcome)
    }

    async fn try_sell(&self, asset: AssetId, amount: u64) -> Result<String, Failure> {
        let account = self.require_account()?;
        self.gate(&Action::Sell { asset, amount })?;

        self.run_plan(account, &TxPlan::sell(asset, amount)).await?;
        self.refresh_after_commit(account).await?;
        Ok(format!("Sold {} {}", amount, self.asset_name(asset)))
    }

    pub async fn restore_action_points(&self) -> Result<(), KingpinError> {
        let outcome = self.try_restore().await;
        self.settle(Intent::Restore, outcome)
    }

    async fn try_restore(&self) -> Result<String, Failure> {
        let account = self.require_account()?;
        self.gate(&Action::Restore)?;

        self.run_plan(account, &TxPlan::restore()).await?;
        self.refresh_after_commit(account).await?;
        Ok("Action points restored!".to_string())
    }

    fn asset_name(&self, asset: AssetId) -> String {
        self.mirror
            .catalog()
            .map(|c| c.asset_name(asset))
            .unwrap_or_else(|| format!("asset #{}", asset))
    }

    async fn run_plan(&self, account: &Account, plan: &TxPlan) -> Result<(), Failure> {
        match self.orchestrator.execute(account, plan).await {
            Ok(_) => Ok(()),
            Err(aborted) => Err(self.after_abort(account, aborted).await),
        }
    }

    /// Confirmed earlier steps still changed remote state, so resync before reporting.
    async fn after_abort(&self, account: &Account, aborted: PlanAborted) -> Failure {
        let note = if aborted.has_confirmed_steps() {
            if let Err(e) = self.sync.load_player_state(account).await {
                warn!("resync after partial {} failed: {}", aborted.intent.label(), e);
            }
            let done: Vec<String> = aborted
                .confirmed
                .iter()
                .map(|(op, _)| op.to_string())
                .collect();
            Some(format!("already confirmed: {}", done.join(", ")))
        } else {
            None
        };
        Failure {
            error: aborted.error,
            note,
        }
    }

    async fn refresh_after_commit(&self, account: &Account) -> Result<(), Failure> {
        self.sync
            .load_player_state(account)
            .await
            .map(|_| ())
            .map_err(|error| Failure {
                error,
                note: Some("the transaction was confirmed; refresh to see the result".into()),
            })
    }

    fn settle(&self, intent: Intent, outcome: Result<String, Failure>) -> Result<(), KingpinError> {
        match outcome {
            Ok(message) => {
                self.status.post(message);
                Ok(())
            }
            Err(Failure { error, note }) => {
                if error.is_local() {
                    metrics::inc_gate_rejections();
                }
                let mut message = format!("{} failed: {}", intent.label(), error);
                if let Some(note) = note {
                    message.push_str(&format!(" ({})", note));
                }
                warn!("{}", escape_log(&message));
                self.status.post(message);
                Err(error)
            }
        }
    }
}
