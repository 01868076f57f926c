//! Pending-question rendezvous between long-running workers and the router.
//!
//! A worker that needs the user's input registers a question keyed by
//! session id and waits; the router resolves it with the user's next inbound
//! message. One slot per session — a newer ask replaces the older one, whose
//! waiter then resolves as unanswered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Default wait for a user answer.
pub const ASK_TIMEOUT_SECS: u64 = 300;

struct Slot {
    id: u64,
    question: String,
    tx: oneshot::Sender<String>,
}

/// Single-slot question mailbox keyed by session id.
#[derive(Default)]
pub struct PendingQuestions {
    slots: DashMap<String, Slot>,
    next_id: AtomicU64,
}

impl PendingQuestions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The question currently pending for a session, if any.
    pub fn pending(&self, session_id: &str) -> Option<String> {
        self.slots.get(session_id).map(|s| s.question.clone())
    }

    /// Resolve the pending question with the user's answer.
    ///
    /// Returns `false` when no question was pending for the session.
    pub fn answer(&self, session_id: &str, answer: &str) -> bool {
        match self.slots.remove(session_id) {
            Some((_, slot)) => {
                debug!(session = %session_id, "delivering pending-question answer");
                let _ = slot.tx.send(answer.to_string());
                true
            }
            None => false,
        }
    }

    /// Register a question and block until the answer arrives or the default
    /// timeout elapses. Returns `None` on timeout or when a newer question
    /// replaced this one.
    pub async fn ask(&self, session_id: &str, question: &str) -> Option<String> {
        self.ask_with_timeout(session_id, question, Duration::from_secs(ASK_TIMEOUT_SECS))
            .await
    }

    pub async fn ask_with_timeout(
        &self,
        session_id: &str,
        question: &str,
        timeout: Duration,
    ) -> Option<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        // Inserting drops any previous slot for this session; its waiter's
        // receiver closes and it resolves as unanswered.
        if self
            .slots
            .insert(
                session_id.to_string(),
                Slot {
                    id,
                    question: question.to_string(),
                    tx,
                },
            )
            .is_some()
        {
            info!(session = %session_id, "replacing previously pending question");
        }

        let answer = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(answer)) => Some(answer),
            // Channel closed: our slot was replaced by a newer question.
            Ok(Err(_)) => None,
            Err(_) => None,
        };

        // On timeout, clean up our slot — but only if it is still ours.
        if answer.is_none() {
            self.slots.remove_if(session_id, |_, slot| slot.id == id);
        }
        answer
    }
}
