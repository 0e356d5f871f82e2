//! # Event Listener
//!
//! One long-lived encounter subscription per session. The subscription task
//! filters the gateway's broadcast stream down to the connected account and
//! posts each match to the status board. Asking for a subscription while one
//! is already running for the same account is a no-op; a different account
//! supersedes the old task, so repeated moves never stack listeners.

use log::{debug, info, warn};
use std::sync::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::game::status::StatusBoard;
use crate::game::types::{Account, EncounterEvent};
use crate::gateway::Gateway;
use crate::logutil::short_account;
use crate::metrics;

#[derive(Debug)]
struct Subscription {
    account: Account,
    task: JoinHandle<()>,
}

#[derive(Debug, Default)]
pub struct EncounterListener {
    current: Mutex<Option<Subscription>>,
}

impl EncounterListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure exactly one live subscription exists for `account`.
    /// Returns true when a new subscription task was started.
    pub fn ensure_subscribed<G: Gateway>(
        &self,
        gateway: &G,
        account: &Account,
        status: &StatusBoard,
    ) -> bool {
        let mut current = self.lock();
        if let Some(sub) = current.as_ref() {
            if sub.account == *account && !sub.task.is_finished() {
                return false;
            }
        }
        if let Some(old) = current.take() {
            debug!(
                "superseding encounter subscription for {}",
                short_account(old.account.as_str())
            );
            old.task.abort();
        }

        let events = gateway.subscribe_encounters();
        let task = tokio::spawn(listen(events, account.clone(), status.clone()));
        info!(
            "subscribed to encounters for {}",
            short_account(account.as_str())
        );
        *current = Some(Subscription {
            account: account.clone(),
            task,
        });
        true
    }

    pub fn is_active(&self) -> bool {
        self.lock()
            .as_ref()
            .map(|sub| !sub.task.is_finished())
            .unwrap_or(false)
    }

    pub fn cancel(&self) {
        if let Some(sub) = self.lock().take() {
            sub.task.abort();
            debug!(
                "encounter subscription for {} cancelled",
                short_account(sub.account.as_str())
            );
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Subscription>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for EncounterListener {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub fn encounter_message(event: &EncounterEvent) -> String {
    format!("Encounter: {}", event.encounter_type)
}

async fn listen(
    mut events: broadcast::Receiver<EncounterEvent>,
    account: Account,
    status: StatusBoard,
) {
    loop {
        match events.recv().await {
            Ok(event) if event.account == account => {
                metrics::inc_encounters();
                status.post(encounter_message(&event));
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!("encounter stream lagged; {} notifications skipped", skipped);
            }
            Err(RecvError::Closed) => {
                debug!("encounter stream closed");
                break;
            }
        }
    }
}
