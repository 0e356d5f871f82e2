//! # Transaction Orchestrator
//!
//! A user intent becomes a [`TxPlan`]: a finite, ordered list of remote writes.
//! [`TransactionOrchestrator::execute`] submits each step and waits for its
//! confirmation before starting the next. The first step that fails ends the
//! plan; earlier confirmed steps are not rolled back and are reported in
//! [`PlanAborted`] so the caller can tell the player what already happened.
//! Nothing is retried.

use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::game::errors::KingpinError;
use crate::game::types::{Account, AssetId, District, TokenAmount, TokenId};
use crate::gateway::{Gateway, Receipt, WriteOp};
use crate::logutil::{escape_log, short_account};
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Register,
    Move,
    Buy,
    Sell,
    Restore,
}

impl Intent {
    /// Noun used in status messages ("Purchase failed: ...").
    pub fn label(self) -> &'static str {
        match self {
            Intent::Register => "Registration",
            Intent::Move => "Move",
            Intent::Buy => "Purchase",
            Intent::Sell => "Sale",
            Intent::Restore => "Restore",
        }
    }
}

/// Ordered remote writes for one intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPlan {
    intent: Intent,
    steps: Vec<WriteOp>,
}

impl TxPlan {
    pub fn register(token_id: TokenId) -> Self {
        Self {
            intent: Intent::Register,
            steps: vec![WriteOp::Register { token_id }],
        }
    }

    pub fn move_to(district: District) -> Self {
        Self {
            intent: Intent::Move,
            steps: vec![WriteOp::MoveToDistrict { district }],
        }
    }

    /// Authorize exactly `price × amount` for `spender`, then buy.
    pub fn buy(
        spender: Account,
        price: TokenAmount,
        asset: AssetId,
        amount: u64,
    ) -> Result<Self, KingpinError> {
        let total = total_cost(price, amount)?;
        Ok(Self {
            intent: Intent::Buy,
            steps: vec![
                WriteOp::AuthorizeSpend {
                    spender,
                    amount: total,
                },
                WriteOp::BuyAsset { asset, amount },
            ],
        })
    }

    pub fn sell(asset: AssetId, amount: u64) -> Self {
        Self {
            intent: Intent::Sell,
            steps: vec![WriteOp::SellAsset { asset, amount }],
        }
    }

    pub fn restore() -> Self {
        Self {
            intent: Intent::Restore,
            steps: vec![WriteOp::RestoreActionPoints],
        }
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn steps(&self) -> &[WriteOp] {
        &self.steps
    }
}

pub fn total_cost(price: TokenAmount, amount: u64) -> Result<TokenAmount, KingpinError> {
    price
        .checked_mul(TokenAmount::from(amount))
        .ok_or_else(|| KingpinError::InvalidAmount(format!("{} × {} overflows", price, amount)))
}

/// A plan that stopped at `failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanAborted {
    pub intent: Intent,
    /// Steps that were confirmed before the failure; they remain in effect.
    pub confirmed: Vec<(WriteOp, Receipt)>,
    pub failed: WriteOp,
    pub error: KingpinError,
}

impl PlanAborted {
    pub fn has_confirmed_steps(&self) -> bool {
        !self.confirmed.is_empty()
    }
}

impl fmt::Display for PlanAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.failed)?;
        if !self.confirmed.is_empty() {
            let done: Vec<String> = self.confirmed.iter().map(|(op, _)| op.to_string()).collect();
            write!(f, "; already confirmed: {}", done.join(", "))?;
        }
        Ok(())
    }
}

pub struct TransactionOrchestrator<G> {
    gateway: Arc<G>,
    confirm_timeout: Option<Duration>,
}

impl<G: Gateway> TransactionOrchestrator<G> {
    pub fn new(gateway: Arc<G>, confirm_timeout: Option<Duration>) -> Self {
        Self {
            gateway,
            confirm_timeout,
        }
    }

    /// Run every step of `plan` in order, each confirmed before the next.
    pub async fn execute(
        &self,
        from: &Account,
        plan: &TxPlan,
    ) -> Result<Vec<Receipt>, PlanAborted> {
        let mut confirmed: Vec<(WriteOp, Receipt)> = Vec::with_capacity(plan.steps.len());
        for (idx, op) in plan.steps.iter().enumerate() {
            debug!(
                "{} step {}/{}: {} from {}",
                plan.intent.label(),
                idx + 1,
                plan.steps.len(),
                op.name(),
                short_account(from.as_str())
            );
            match self.run_step(from, op).await {
                Ok(receipt) => confirmed.push((op.clone(), receipt)),
                Err(error) => {
                    warn!(
                        "{} aborted at step {} ({}): {}",
                        plan.intent.label(),
                        idx + 1,
                        op.name(),
                        escape_log(&error.to_string())
                    );
                    return Err(PlanAborted {
                        intent: plan.intent,
                        confirmed,
                        failed: op.clone(),
                        error,
                    });
                }
            }
        }
        info!(
            "{} confirmed ({} step(s)) for {}",
            plan.intent.label(),
            confirmed.len(),
            short_account(from.as_str())
        );
        Ok(confirmed.into_iter().map(|(_, r)| r).collect())
    }

    async fn run_step(&self, from: &Account, op: &WriteOp) -> Result<Receipt, KingpinError> {
        let pending = self.gateway.submit(from, op.clone()).await?;
        metrics::inc_tx_submitted();
        let submitted_at = Instant::now();
        let hash = pending.hash.clone();

        let outcome = match self.confirm_timeout {
            Some(limit) => timeout(limit, self.gateway.confirm(pending))
                .await
                .unwrap_or_else(|_| {
                    Err(KingpinError::RemoteUnavailable(format!(
                        "confirmation of {} timed out after {:?}",
                        hash, limit
                    )))
                }),
            None => self.gateway.confirm(pending).await,
        };

        match outcome {
            Ok(receipt) => {
                metrics::inc_tx_confirmed();
                metrics::observe_confirm_latency(submitted_at);
                debug!("{} confirmed in block {}", receipt.hash, receipt.block);
                Ok(receipt)
            }
            Err(e) => {
                metrics::inc_tx_rejected();
                Err(e)
            }
        }
    }
}
