//! The bounded pub/sub event bus.

use crate::event::{RegistryEvent, RegistryEventType};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Default number of events retained in history.
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// A subscribed event listener.
pub type EventListener = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

/// Opaque handle identifying a subscribed listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Aggregate statistics over emitted events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStats {
    /// All-time number of emitted events (not bounded by history).
    pub total_emitted: u64,
    /// Per-type counts over the retained history.
    pub by_type: BTreeMap<RegistryEventType, usize>,
    /// Events emitted in the trailing hour (retained history only).
    pub last_hour: usize,
    /// Timestamp of the oldest retained event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest: Option<DateTime<Utc>>,
    /// Timestamp of the newest retained event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest: Option<DateTime<Utc>>,
}

struct BusState {
    history: VecDeque<RegistryEvent>,
    listeners: Vec<(ListenerId, EventListener)>,
    next_listener_id: u64,
    total_emitted: u64,
}

/// Bounded pub/sub bus for registry lifecycle events.
///
/// History is a circular buffer: once `max_history` events are retained, the
/// oldest is dropped on each emit. Listener notification is synchronous, and
/// a panicking listener is isolated — it is logged and the remaining
/// listeners are still notified.
pub struct EventManager {
    max_history: usize,
    state: Mutex<BusState>,
}

impl EventManager {
    /// Creates a bus with the default history bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    /// Creates a bus retaining at most `max_history` events.
    #[must_use]
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            state: Mutex::new(BusState {
                history: VecDeque::with_capacity(max_history.min(1024)),
                listeners: Vec::new(),
                next_listener_id: 0,
                total_emitted: 0,
            }),
        }
    }

    /// Emits an event: appends it to history and notifies all listeners.
    pub fn emit(
        &self,
        event_type: RegistryEventType,
        middleware_name: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) {
        let event = RegistryEvent::new(event_type, middleware_name, metadata);

        // Listeners are notified outside the lock so they may emit or query
        // without deadlocking.
        let listeners: Vec<(ListenerId, EventListener)> = {
            let mut state = self.state.lock();
            state.history.push_back(event.clone());
            while state.history.len() > self.max_history {
                state.history.pop_front();
            }
            state.total_emitted += 1;
            state.listeners.clone()
        };

        for (id, listener) in listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener(&event)));
            if outcome.is_err() {
                warn!(
                    listener_id = id.0,
                    event_type = %event.event_type,
                    middleware = %event.middleware_name,
                    "event listener panicked; remaining listeners still notified"
                );
            }
        }
    }

    /// Subscribes a listener and returns its handle.
    pub fn add_listener(&self, listener: EventListener) -> ListenerId {
        let mut state = self.state.lock();
        let id = ListenerId(state.next_listener_id);
        state.next_listener_id += 1;
        state.listeners.push((id, listener));
        id
    }

    /// Unsubscribes a listener. Returns `true` if it was subscribed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(lid, _)| *lid != id);
        state.listeners.len() != before
    }

    /// Returns retained events, most recent first, up to `limit`.
    #[must_use]
    pub fn event_history(&self, limit: Option<usize>) -> Vec<RegistryEvent> {
        let state = self.state.lock();
        let take = limit.unwrap_or(usize::MAX);
        state.history.iter().rev().take(take).cloned().collect()
    }

    /// Returns retained events of one type, most recent first.
    #[must_use]
    pub fn events_by_type(
        &self,
        event_type: RegistryEventType,
        limit: Option<usize>,
    ) -> Vec<RegistryEvent> {
        let state = self.state.lock();
        let take = limit.unwrap_or(usize::MAX);
        state
            .history
            .iter()
            .rev()
            .filter(|e| e.event_type == event_type)
            .take(take)
            .cloned()
            .collect()
    }

    /// Returns retained events concerning one middleware, most recent first.
    #[must_use]
    pub fn events_for_middleware(&self, name: &str, limit: Option<usize>) -> Vec<RegistryEvent> {
        let state = self.state.lock();
        let take = limit.unwrap_or(usize::MAX);
        state
            .history
            .iter()
            .rev()
            .filter(|e| e.middleware_name == name)
            .take(take)
            .cloned()
            .collect()
    }

    /// Returns aggregate event statistics.
    #[must_use]
    pub fn event_stats(&self) -> EventStats {
        let state = self.state.lock();
        let mut by_type = BTreeMap::new();
        let hour_ago = Utc::now() - ChronoDuration::hours(1);
        let mut last_hour = 0;

        for event in &state.history {
            *by_type.entry(event.event_type).or_insert(0) += 1;
            if event.timestamp >= hour_ago {
                last_hour += 1;
            }
        }

        EventStats {
            total_emitted: state.total_emitted,
            by_type,
            last_hour,
            oldest: state.history.front().map(|e| e.timestamp),
            newest: state.history.back().map(|e| e.timestamp),
        }
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventManager")
            .field("max_history", &self.max_history)
            .field("retained", &state.history.len())
            .field("listeners", &state.listeners.len())
            .field("total_emitted", &state.total_emitted)
            .finish()
    }
}
