//! Window-bounded duplicate suppression across transports.
//!
//! Entries are keyed by event kind and order id so an `order_update` is not
//! swallowed by the `new_order` that preceded it. Expired entries are swept
//! lazily once the map outgrows its bound, and on the coordinator's tick.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::domain::{EventKind, OrderEvent, OrderId};
use crate::port::outbound::Clock;

/// When an id was first accepted and when it becomes eligible again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupEntry {
    pub first_seen_at: Instant,
    pub expires_at: Instant,
}

/// Thread-safe deduplicator shared by every transport of one coordinator.
pub struct Deduplicator {
    entries: DashMap<String, DedupEntry>,
    window_ms: AtomicU64,
    max_entries: AtomicUsize,
    clock: Arc<dyn Clock>,
}

impl Deduplicator {
    #[must_use]
    pub fn new(window: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            window_ms: AtomicU64::new(duration_ms(window)),
            max_entries: AtomicUsize::new(max_entries),
            clock,
        }
    }

    fn key(kind: EventKind, id: &OrderId) -> String {
        format!("{}:{}", kind.as_str(), id.as_str())
    }

    /// Returns `true` when the event should be forwarded.
    ///
    /// Forwarding records the id for one window; a duplicate leaves the
    /// existing entry untouched. Suppression is per event kind: a
    /// `new_order` and an `order_update` for the same id are tracked
    /// separately, so one never hides the other.
    pub fn accept(&self, event: &OrderEvent) -> bool {
        let now = self.clock.now();
        let key = Self::key(event.kind, &event.id);

        if let Some(entry) = self.entries.get(&key) {
            if now < entry.expires_at {
                return false;
            }
        }

        self.entries.insert(
            key,
            DedupEntry {
                first_seen_at: now,
                expires_at: now + self.window(),
            },
        );

        if self.entries.len() > self.max_entries.load(Ordering::Relaxed) {
            self.gc();
        }
        true
    }

    /// Forget `id` for every event kind, making it deliverable again.
    pub fn remove(&self, id: &OrderId) -> bool {
        let new = self.entries.remove(&Self::key(EventKind::New, id)).is_some();
        let update = self.entries.remove(&Self::key(EventKind::Update, id)).is_some();
        new || update
    }

    /// Drop expired entries; if still over the bound, evict the oldest down
    /// to the low-water mark so the next sweep is not due for a while.
    pub fn gc(&self) {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);

        let max_entries = self.max_entries.load(Ordering::Relaxed);
        if self.entries.len() > max_entries {
            let mut entries: Vec<(String, Instant)> = self
                .entries
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().first_seen_at))
                .collect();
            entries.sort_by(|a, b| a.1.cmp(&b.1));

            let to_remove = entries.len().saturating_sub(low_water_mark(max_entries));
            for (key, _) in entries.into_iter().take(to_remove) {
                self.entries.remove(&key);
            }
        }

        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "Swept dedup entries");
        }
    }

    /// Forget every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Change the window for entries recorded from now on.
    pub fn set_window(&self, window: Duration) {
        self.window_ms.store(duration_ms(window), Ordering::Relaxed);
    }

    /// Change the bound; takes effect at the next insert.
    pub fn set_max_entries(&self, max_entries: usize) {
        self.max_entries.store(max_entries, Ordering::Relaxed);
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Size a full map is trimmed to: 90% of the bound.
fn low_water_mark(max_entries: usize) -> usize {
    max_entries - max_entries / 10
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransportMode;
    use crate::testkit::clock::ManualClock;

    fn event(id: &str, kind: EventKind, source: TransportMode) -> OrderEvent {
        OrderEvent::new(OrderId::new(id).unwrap(), kind, source)
    }

    fn dedup(clock: &ManualClock, max_entries: usize) -> Deduplicator {
        Deduplicator::new(Duration::from_secs(30), max_entries, Arc::new(clock.clone()))
    }

    #[test]
    fn same_id_across_transports_is_delivered_once() {
        let clock = ManualClock::new();
        let dedup = dedup(&clock, 100);

        assert!(dedup.accept(&event("ORD-1", EventKind::New, TransportMode::Polling)));
        clock.advance(Duration::from_secs(2));
        assert!(!dedup.accept(&event("ORD-1", EventKind::New, TransportMode::Websocket)));
        clock.advance(Duration::from_secs(33));
        assert!(dedup.accept(&event("ORD-1", EventKind::New, TransportMode::Websocket)));
    }

    #[test]
    fn update_is_not_swallowed_by_new() {
        let clock = ManualClock::new();
        let dedup = dedup(&clock, 100);

        assert!(dedup.accept(&event("ORD-1", EventKind::New, TransportMode::Polling)));
        assert!(dedup.accept(&event("ORD-1", EventKind::Update, TransportMode::Polling)));
        assert!(!dedup.accept(&event("ORD-1", EventKind::Update, TransportMode::Websocket)));
    }

    #[test]
    fn remove_allows_redelivery() {
        let clock = ManualClock::new();
        let dedup = dedup(&clock, 100);
        let ev = event("ORD-7", EventKind::New, TransportMode::Websocket);

        assert!(dedup.accept(&ev));
        assert!(dedup.remove(&ev.id));
        assert!(dedup.accept(&ev));
        assert!(!dedup.remove(&OrderId::new("unknown").unwrap()));
    }

    #[test]
    fn duplicate_does_not_extend_window() {
        let clock = ManualClock::new();
        let dedup = dedup(&clock, 100);
        let ev = event("ORD-1", EventKind::New, TransportMode::Polling);

        assert!(dedup.accept(&ev));
        clock.advance(Duration::from_secs(20));
        assert!(!dedup.accept(&ev));
        clock.advance(Duration::from_secs(11));
        assert!(dedup.accept(&ev));
    }

    #[test]
    fn gc_drops_expired_entries() {
        let clock = ManualClock::new();
        let dedup = dedup(&clock, 100);
        dedup.accept(&event("a", EventKind::New, TransportMode::Polling));
        clock.advance(Duration::from_secs(31));
        dedup.accept(&event("b", EventKind::New, TransportMode::Polling));

        dedup.gc();
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn bound_evicts_oldest() {
        let clock = ManualClock::new();
        let dedup = dedup(&clock, 2);
        for id in ["a", "b", "c"] {
            dedup.accept(&event(id, EventKind::New, TransportMode::Polling));
            clock.advance(Duration::from_millis(10));
        }

        assert_eq!(dedup.len(), 2);
        assert!(dedup.accept(&event("a", EventKind::New, TransportMode::Polling)));
    }

    #[test]
    fn overflow_trims_to_low_water_mark() {
        let clock = ManualClock::new();
        let dedup = dedup(&clock, 10);
        for i in 0..11 {
            dedup.accept(&event(&format!("ORD-{i}"), EventKind::New, TransportMode::Polling));
            clock.advance(Duration::from_millis(10));
        }
        assert_eq!(dedup.len(), 9);

        // Headroom: the next insert does not sweep.
        dedup.accept(&event("ORD-11", EventKind::New, TransportMode::Polling));
        assert_eq!(dedup.len(), 10);

        assert!(!dedup.accept(&event("ORD-2", EventKind::New, TransportMode::Polling)));
        assert!(dedup.accept(&event("ORD-0", EventKind::New, TransportMode::Polling)));
    }

    #[test]
    fn earlier_update_does_not_hide_new_order() {
        let clock = ManualClock::new();
        let dedup = dedup(&clock, 100);

        assert!(dedup.accept(&event("ORD-1", EventKind::Update, TransportMode::Polling)));
        clock.advance(Duration::from_secs(2));
        assert!(dedup.accept(&event("ORD-1", EventKind::New, TransportMode::Websocket)));
        assert!(!dedup.accept(&event("ORD-1", EventKind::New, TransportMode::Polling)));
    }

    #[test]
    fn window_change_applies_to_new_entries() {
        let clock = ManualClock::new();
        let dedup = dedup(&clock, 100);
        dedup.accept(&event("old", EventKind::New, TransportMode::Polling));
        dedup.set_window(Duration::from_secs(5));
        dedup.accept(&event("new", EventKind::New, TransportMode::Polling));

        clock.advance(Duration::from_secs(6));
        assert!(dedup.accept(&event("new", EventKind::New, TransportMode::Polling)));
        assert!(!dedup.accept(&event("old", EventKind::New, TransportMode::Polling)));
    }
}
