//! Process-wide map of live conversations.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;

use super::{ConversationId, ConversationState};

/// Result of [`RelayRegistry::create`].
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub state: Arc<ConversationState>,
    /// `false` when a concurrent creator got there first. Only the caller
    /// that sees `true` may start the producer.
    pub created: bool,
}

/// Registry of conversations currently being relayed.
///
/// Owned by the application and injected into each platform adapter.
/// Operations on different conversation ids never block each other.
#[derive(Debug, Default)]
pub struct RelayRegistry {
    entries: DashMap<ConversationId, Arc<ConversationState>>,
}

impl RelayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new conversation unless one with this id already exists.
    pub fn create(&self, id: ConversationId, question: impl Into<String>) -> CreateOutcome {
        match self.entries.entry(id) {
            Entry::Occupied(entry) => CreateOutcome {
                state: entry.get().clone(),
                created: false,
            },
            Entry::Vacant(entry) => {
                let state = Arc::new(ConversationState::new(id, question.into()));
                entry.insert(state.clone());
                CreateOutcome {
                    state,
                    created: true,
                }
            }
        }
    }

    pub fn get(&self, id: &ConversationId) -> Option<Arc<ConversationState>> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    /// Removes a conversation.
    ///
    /// Returns the removed state to exactly one caller, which makes eviction
    /// the claim on emitting the one-time trailer.
    pub fn evict(&self, id: &ConversationId) -> Option<Arc<ConversationState>> {
        self.entries.remove(id).map(|(_, state)| state)
    }

    /// Force-evicts conversations older than `max_age`, finishing any that
    /// are still streaming so parked pollers are released. Returns the
    /// number removed.
    pub fn evict_expired(&self, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, state| {
            if state.age() < max_age {
                return true;
            }
            state.finish();
            false
        });
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Periodically evicts conversations that outlived `max_age`.
pub fn spawn_janitor(
    registry: Arc<RelayRegistry>,
    interval: Duration,
    max_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = registry.evict_expired(max_age);
            if evicted > 0 {
                tracing::info!(evicted, remaining = registry.len(), "Evicted stale conversations");
            }
        }
    })
}
