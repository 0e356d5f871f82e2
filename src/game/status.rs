use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::logutil::escape_log;

/// Human-readable status line plus a bounded history of user-visible messages.
///
/// Cloning is cheap and every clone writes to the same board, so the encounter
/// listener task can append messages while intents replace the status line.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    inner: Arc<BoardInner>,
}

#[derive(Debug)]
struct BoardInner {
    current: watch::Sender<String>,
    history: Mutex<History>,
    capacity: usize,
}

#[derive(Debug)]
struct History {
    entries: VecDeque<String>,
    /// Messages ever posted, including those evicted from `entries`.
    posted: u64,
}

impl StatusBoard {
    pub fn new(capacity: usize) -> Self {
        let (current, _) = watch::channel(String::new());
        Self {
            inner: Arc::new(BoardInner {
                current,
                history: Mutex::new(History {
                    entries: VecDeque::with_capacity(capacity),
                    posted: 0,
                }),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Replace the status line and record it in the history.
    pub fn post(&self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("status: {}", escape_log(&message));
        {
            let mut history = self
                .inner
                .history
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if history.entries.len() >= self.inner.capacity {
                history.entries.pop_front();
            }
            history.entries.push_back(message.clone());
            history.posted += 1;
        }
        self.inner.current.send_replace(message);
    }

    pub fn current(&self) -> String {
        self.inner.current.borrow().clone()
    }

    /// Watch the status line for changes.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.inner.current.subscribe()
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<String> {
        self.lock_history().entries.iter().cloned().collect()
    }

    /// Number of messages posted so far; a mark for [`StatusBoard::messages_since`].
    pub fn posted(&self) -> u64 {
        self.lock_history().posted
    }

    /// Messages posted after `mark` that are still in the history, oldest
    /// first, with the mark to pass next time.
    pub fn messages_since(&self, mark: u64) -> (Vec<String>, u64) {
        let history = self.lock_history();
        let fresh = history.posted.saturating_sub(mark);
        let skip = history
            .entries
            .len()
            .saturating_sub(usize::try_from(fresh).unwrap_or(usize::MAX));
        let messages = history.entries.iter().skip(skip).cloned().collect();
        (messages, history.posted)
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, History> {
        self.inner
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
