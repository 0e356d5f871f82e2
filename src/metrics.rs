//! Process-wide counters for transaction and synchronization activity.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static TX_SUBMITTED: AtomicU64 = AtomicU64::new(0);
static TX_CONFIRMED: AtomicU64 = AtomicU64::new(0);
static TX_REJECTED: AtomicU64 = AtomicU64::new(0);
static SYNC_OK: AtomicU64 = AtomicU64::new(0);
static SYNC_FAILED: AtomicU64 = AtomicU64::new(0);
static GATE_REJECTIONS: AtomicU64 = AtomicU64::new(0);
static ENCOUNTERS: AtomicU64 = AtomicU64::new(0);
static CONFIRM_LATENCY_SUM_MS: AtomicU64 = AtomicU64::new(0);
static CONFIRM_LATENCY_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn inc_tx_submitted() {
    TX_SUBMITTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_tx_confirmed() {
    TX_CONFIRMED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_tx_rejected() {
    TX_REJECTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_sync_ok() {
    SYNC_OK.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_sync_failed() {
    SYNC_FAILED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_gate_rejections() {
    GATE_REJECTIONS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_encounters() {
    ENCOUNTERS.fetch_add(1, Ordering::Relaxed);
}
pub fn observe_confirm_latency(submitted_at: Instant) {
    let ms = submitted_at.elapsed().as_millis() as u64;
    CONFIRM_LATENCY_SUM_MS.fetch_add(ms, Ordering::Relaxed);
    CONFIRM_LATENCY_COUNT.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tx_submitted: u64,
    pub tx_confirmed: u64,
    pub tx_rejected: u64,
    pub sync_ok: u64,
    pub sync_failed: u64,
    pub gate_rejections: u64,
    pub encounters: u64,
    pub confirm_latency_avg_ms: Option<u64>,
}

pub fn snapshot() -> Snapshot {
    let sum = CONFIRM_LATENCY_SUM_MS.load(Ordering::Relaxed);
    let count = CONFIRM_LATENCY_COUNT.load(Ordering::Relaxed);
    Snapshot {
        tx_submitted: TX_SUBMITTED.load(Ordering::Relaxed),
        tx_confirmed: TX_CONFIRMED.load(Ordering::Relaxed),
        tx_rejected: TX_REJECTED.load(Ordering::Relaxed),
        sync_ok: SYNC_OK.load(Ordering::Relaxed),
        sync_failed: SYNC_FAILED.load(Ordering::Relaxed),
        gate_rejections: GATE_REJECTIONS.load(Ordering::Relaxed),
        encounters: ENCOUNTERS.load(Ordering::Relaxed),
        confirm_latency_avg_ms: if count > 0 { Some(sum / count) } else { None },
    }
}
