//! # State Synchronizer
//!
//! Owns the local mirror of remote state. Readers always get a complete,
//! immutable value behind an `Arc`; writers build a new value from a full set
//! of fetches and swap it in with a single `watch` send. Nothing is patched in
//! place, so a failed fetch leaves the previous value untouched and no reader
//! can observe a half-built snapshot.
//!
//! Game data (asset and district definitions) and player state are independent
//! and may be refreshed concurrently. Player refreshes are serialized among
//! themselves so that the last one to complete is the one that stays visible.

use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::game::coords;
use crate::game::errors::KingpinError;
use crate::game::types::{
    Account, AssetDefinition, AssetId, District, DistrictDefinition, GridPosition, PlayerSnapshot,
};
use crate::gateway::Gateway;
use crate::logutil::short_account;
use crate::metrics;

/// Upper bound of a district's risk level and police presence.
pub const MAX_DISTRICT_RATING: u8 = 10;

/// Session-wide asset and district definitions, published together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub assets: Vec<AssetDefinition>,
    pub districts: Vec<DistrictDefinition>,
}

impl Catalog {
    pub fn asset(&self, id: AssetId) -> Option<&AssetDefinition> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn district(&self, district: District) -> Option<&DistrictDefinition> {
        self.districts.iter().find(|d| d.id == district)
    }

    pub fn asset_ids(&self) -> Vec<AssetId> {
        self.assets.iter().map(|a| a.id).collect()
    }

    /// Display name for a district, falling back to its enumeration label.
    pub fn district_name(&self, district: District) -> String {
        self.district(district)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| district.label().to_string())
    }

    pub fn asset_name(&self, id: AssetId) -> String {
        self.asset(id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| format!("asset #{}", id))
    }
}

/// A player snapshot together with the grid cell derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub snapshot: PlayerSnapshot,
    pub position: GridPosition,
}

impl PlayerView {
    fn new(snapshot: PlayerSnapshot) -> Self {
        let position = coords::position_of(snapshot.current_district);
        Self { snapshot, position }
    }
}

/// Published local state. Only the synchronizer (and session lifecycle in the
/// client) writes here; everything else reads.
#[derive(Debug)]
pub struct GameMirror {
    catalog: watch::Sender<Option<Arc<Catalog>>>,
    player: watch::Sender<Option<Arc<PlayerView>>>,
    registered: watch::Sender<bool>,
}

impl Default for GameMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl GameMirror {
    pub fn new() -> Self {
        let (catalog, _) = watch::channel(None);
        let (player, _) = watch::channel(None);
        let (registered, _) = watch::channel(false);
        Self {
            catalog,
            player,
            registered,
        }
    }

    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        self.catalog.borrow().clone()
    }

    /// Current player view; `None` until registered and synchronized.
    pub fn player(&self) -> Option<Arc<PlayerView>> {
        self.player.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<PlayerSnapshot> {
        self.player().map(|view| view.snapshot.clone())
    }

    pub fn position(&self) -> Option<GridPosition> {
        self.player().map(|view| view.position)
    }

    pub fn is_registered(&self) -> bool {
        *self.registered.borrow()
    }

    pub fn watch_player(&self) -> watch::Receiver<Option<Arc<PlayerView>>> {
        self.player.subscribe()
    }

    pub fn watch_catalog(&self) -> watch::Receiver<Option<Arc<Catalog>>> {
        self.catalog.subscribe()
    }

    pub(crate) fn publish_catalog(&self, catalog: Arc<Catalog>) {
        self.catalog.send_replace(Some(catalog));
    }

    pub(crate) fn publish_player(&self, view: Arc<PlayerView>) {
        self.player.send_replace(Some(view));
    }

    /// Unregistered accounts have no snapshot.
    pub(crate) fn set_registered(&self, registered: bool) {
        self.registered.send_replace(registered);
        if !registered {
            self.player.send_replace(None);
        }
    }

    pub(crate) fn clear_session(&self) {
        self.set_registered(false);
    }
}

pub struct StateSynchronizer<G> {
    gateway: Arc<G>,
    mirror: Arc<GameMirror>,
    player_writes: Mutex<()>,
    catalog_writes: Mutex<()>,
}

impl<G: Gateway> StateSynchronizer<G> {
    pub fn new(gateway: Arc<G>, mirror: Arc<GameMirror>) -> Self {
        Self {
            gateway,
            mirror,
            player_writes: Mutex::new(()),
            catalog_writes: Mutex::new(()),
        }
    }

    pub fn mirror(&self) -> &Arc<GameMirror> {
        &self.mirror
    }

    /// Fetch every asset and district definition and publish them as one
    /// catalog. Any failed fetch discards everything fetched so far.
    pub async fn load_game_data(&self) -> Result<Arc<Catalog>, KingpinError> {
        let _guard = self.catalog_writes.lock().await;
        match self.fetch_catalog().await {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                self.mirror.publish_catalog(catalog.clone());
                info!(
                    "game data loaded: {} assets, {} districts",
                    catalog.assets.len(),
                    catalog.districts.len()
                );
                Ok(catalog)
            }
            Err(e) => {
                warn!("game data load failed: {}", e);
                Err(e)
            }
        }
    }

    async fn fetch_catalog(&self) -> Result<Catalog, KingpinError> {
        let count = self.gateway.get_asset_count().await?;
        let mut assets = Vec::with_capacity(count as usize);
        for idx in 0..count {
            let mut asset = self.gateway.get_asset(idx).await?;
            // The remote indexes assets by position; trust the index over any echoed id.
            asset.id = idx;
            assets.push(asset);
        }

        let mut districts = Vec::with_capacity(District::COUNT);
        for district in District::ALL {
            let def = self.gateway.get_district(district).await?;
            if def.id != district {
                return Err(KingpinError::InvalidResponse(format!(
                    "district {} answered with id {}",
                    district.id(),
                    def.id.id()
                )));
            }
            if def.risk_level > MAX_DISTRICT_RATING || def.police_presence > MAX_DISTRICT_RATING {
                return Err(KingpinError::InvalidResponse(format!(
                    "district {} has risk {} and police presence {} (max {})",
                    district.id(),
                    def.risk_level,
                    def.police_presence,
                    MAX_DISTRICT_RATING
                )));
            }
            districts.push(def);
        }
        Ok(Catalog { assets, districts })
    }

    /// Rebuild the account's snapshot from scratch and swap it in.
    ///
    /// Inventory is fetched for every known asset id (from the catalog when it
    /// is loaded, otherwise `0..getAssetCount()`). On failure the previous
    /// snapshot stays published.
    pub async fn load_player_state(
        &self,
        account: &Account,
    ) -> Result<Arc<PlayerView>, KingpinError> {
        let _guard = self.player_writes.lock().await;
        if !self.mirror.is_registered() {
            return Err(KingpinError::NotRegistered);
        }
        match self.fetch_player(account).await {
            Ok(snapshot) => {
                let view = Arc::new(PlayerView::new(snapshot));
                // Registration may have been cleared while fetching (disconnect).
                if !self.mirror.is_registered() {
                    return Err(KingpinError::NotRegistered);
                }
                self.mirror.publish_player(view.clone());
                metrics::inc_sync_ok();
                debug!(
                    "player state for {}: district={} ap={} position={}",
                    short_account(account.as_str()),
                    view.snapshot.current_district,
                    view.snapshot.action_points,
                    view.position
                );
                Ok(view)
            }
            Err(e) => {
                metrics::inc_sync_failed();
                warn!(
                    "player state load failed for {}: {}",
                    short_account(account.as_str()),
                    e
                );
                Err(e)
            }
        }
    }

    async fn fetch_player(&self, account: &Account) -> Result<PlayerSnapshot, KingpinError> {
        let record = self.gateway.get_player(account).await?;
        let current_district = District::from_id(record.district).map_err(|_| {
            KingpinError::InvalidResponse(format!("player is in unknown district {}", record.district))
        })?;

        let asset_ids = match self.mirror.catalog() {
            Some(catalog) => catalog.asset_ids(),
            None => (0..self.gateway.get_asset_count().await?).collect(),
        };
        let mut inventory = BTreeMap::new();
        for id in asset_ids {
            let qty = self.gateway.get_inventory(account, id).await?;
            inventory.insert(id, qty);
        }

        Ok(PlayerSnapshot {
            current_district,
            action_points: record.action_points,
            inventory,
        })
    }

    /// Query the active-player flag, publish it, and load player state when set.
    pub async fn check_registration(&self, account: &Account) -> Result<bool, KingpinError> {
        let active = self.gateway.is_active_player(account).await?;
        self.mirror.set_registered(active);
        info!(
            "registration status for {}: {}",
            short_account(account.as_str()),
            if active { "active" } else { "not registered" }
        );
        if active {
            self.load_player_state(account).await?;
        }
        Ok(active)
    }
}
