//! Expectation lifecycle: registration, prioritized matching, and
//! consumption.
//!
//! The store is the single mutable structure in the crate. Selection and
//! match-count consumption happen inside one write-lock critical
//! section, so a `Times::once` expectation is handed to exactly one of
//! any number of racing requests. Expiry is evaluated lazily against an
//! injected [`Clock`] at selection time; nothing runs in the background.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::{Expectation, HttpRequest, RequestDefinition};

// ============================================================================
// Clock
// ============================================================================

/// Time source for registration anchoring and expiry checks.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock [`Clock`] used outside tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Store Policy
// ============================================================================

/// Tunable store behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorePolicy {
    /// Keep exhausted and expired expectations around, marked inactive,
    /// instead of dropping them. Useful for post-hoc inspection.
    pub retain_inactive: bool,
}

// ============================================================================
// Expectation Store
// ============================================================================

struct Slot {
    sequence: u64,
    active: bool,
    expectation: Expectation,
}

struct Inner {
    next_sequence: u64,
    slots: Vec<Slot>,
}

/// Registry of live expectations.
///
/// Matching order is priority descending, then registration order
/// ascending. Re-registering an id keeps its original position in that
/// order.
pub struct ExpectationStore {
    clock: Arc<dyn Clock>,
    policy: StorePolicy,
    inner: RwLock<Inner>,
}

impl Default for ExpectationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpectationStore {
    /// Creates a store on the system clock with default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock), StorePolicy::default())
    }

    /// Creates a store with an explicit clock and policy.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>, policy: StorePolicy) -> Self {
        Self {
            clock,
            policy,
            inner: RwLock::new(Inner {
                next_sequence: 0,
                slots: Vec::new(),
            }),
        }
    }

    /// Registers an expectation, anchoring its expiry window at the
    /// current instant.
    ///
    /// An expectation whose id is already present replaces the existing
    /// one in place, keeping its slot in the matching order.
    pub fn register(&self, expectation: Expectation) {
        let mut expectation = expectation;
        expectation.time_to_live = expectation.time_to_live.anchored(self.clock.now());

        let mut inner = self.write();
        if let Some(slot) = inner
            .slots
            .iter_mut()
            .find(|slot| slot.expectation.id == expectation.id)
        {
            debug!(id = %expectation.id, "replacing expectation in place");
            slot.expectation = expectation;
            slot.active = true;
            return;
        }
        debug!(id = %expectation.id, priority = expectation.priority, "registering expectation");
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.slots.push(Slot {
            sequence,
            active: true,
            expectation,
        });
    }

    /// Selects the highest-priority live expectation matching `request`
    /// and consumes one match from its counter, atomically.
    ///
    /// Returns a snapshot of the expectation as selected. Expired and
    /// just-exhausted expectations are dropped (or deactivated, under
    /// [`StorePolicy::retain_inactive`]) as a side effect.
    #[must_use]
    pub fn first_match(&self, request: &HttpRequest) -> Option<Expectation> {
        let now = self.clock.now();
        let mut inner = self.write();

        let mut order: Vec<usize> = (0..inner.slots.len()).collect();
        order.sort_by_key(|&index| {
            let slot = &inner.slots[index];
            (std::cmp::Reverse(slot.expectation.priority), slot.sequence)
        });

        let mut selected = None;
        for index in order {
            let slot = &mut inner.slots[index];
            if !slot.active {
                continue;
            }
            if slot.expectation.time_to_live.is_expired(now) {
                debug!(id = %slot.expectation.id, "expectation expired");
                slot.active = false;
                continue;
            }
            if slot.expectation.times.is_exhausted() {
                slot.active = false;
                continue;
            }
            if !slot.expectation.request.matches(request) {
                continue;
            }
            slot.expectation.times.decrement();
            if slot.expectation.times.is_exhausted() {
                debug!(id = %slot.expectation.id, "expectation exhausted");
                slot.active = false;
            }
            selected = Some(slot.expectation.clone());
            break;
        }

        if !self.policy.retain_inactive {
            inner.slots.retain(|slot| slot.active);
        }
        selected
    }

    /// Snapshot of live expectations in matching order.
    #[must_use]
    pub fn active(&self) -> Vec<Expectation> {
        let inner = self.read();
        let now = self.clock.now();
        let mut slots: Vec<&Slot> = inner
            .slots
            .iter()
            .filter(|slot| {
                slot.active
                    && !slot.expectation.time_to_live.is_expired(now)
                    && !slot.expectation.times.is_exhausted()
            })
            .collect();
        slots.sort_by_key(|slot| (std::cmp::Reverse(slot.expectation.priority), slot.sequence));
        slots.iter().map(|slot| slot.expectation.clone()).collect()
    }

    /// Snapshot of retained inactive expectations, registration order.
    ///
    /// Always empty unless the store runs with
    /// [`StorePolicy::retain_inactive`].
    #[must_use]
    pub fn inactive(&self) -> Vec<Expectation> {
        let inner = self.read();
        inner
            .slots
            .iter()
            .filter(|slot| !slot.active)
            .map(|slot| slot.expectation.clone())
            .collect()
    }

    /// Removes an expectation by id, returning it when present.
    pub fn remove(&self, id: &str) -> Option<Expectation> {
        let mut inner = self.write();
        let index = inner
            .slots
            .iter()
            .position(|slot| slot.expectation.id == id)?;
        let slot = inner.slots.remove(index);
        debug!(id, "removed expectation");
        Some(slot.expectation)
    }

    /// Drops expectations: all of them, or with `Some(matcher)` only
    /// those whose stored request definition the matcher covers.
    ///
    /// A concrete stored definition is cleared when the matcher matches
    /// it; an OpenAPI-derived one is cleared only on structural
    /// equality, since interpreting it needs the external engine.
    pub fn clear(&self, matcher: Option<&RequestDefinition>) {
        let mut inner = self.write();
        match matcher {
            None => {
                inner.slots.clear();
                debug!("cleared expectation store");
            }
            Some(matcher) => {
                let before = inner.slots.len();
                inner
                    .slots
                    .retain(|slot| !definition_covered(matcher, &slot.expectation.request));
                debug!(removed = before - inner.slots.len(), "cleared matching expectations");
            }
        }
    }

    /// Number of registered slots, active or retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().slots.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().slots.is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn definition_covered(matcher: &RequestDefinition, stored: &RequestDefinition) -> bool {
    match stored.as_request() {
        Some(request) => matcher.matches(request),
        None => matcher == stored,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpResponse, TimeToLive, TimeUnit, Times};
    use chrono::Duration;
    use std::sync::Mutex;

    /// Clock advanced by hand from tests.
    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(now),
            })
        }

        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn expectation(path: &str) -> Expectation {
        Expectation::respond(
            HttpRequest::new().with_path(path),
            HttpResponse::new().with_status_code(200),
        )
    }

    #[test]
    fn test_first_match_selects_and_consumes() {
        let store = ExpectationStore::new();
        store.register(expectation("/a").with_times(Times::exactly(2)));

        let request = HttpRequest::new().with_method("GET").with_path("/a");
        assert!(store.first_match(&request).is_some());
        assert!(store.first_match(&request).is_some());
        assert!(store.first_match(&request).is_none());
    }

    #[test]
    fn test_exhausted_expectation_dropped_by_default() {
        let store = ExpectationStore::new();
        store.register(expectation("/a").with_times(Times::once()));

        let request = HttpRequest::new().with_path("/a");
        assert!(store.first_match(&request).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_retain_inactive_keeps_exhausted_visible() {
        let store = ExpectationStore::with_clock(
            Arc::new(SystemClock),
            StorePolicy {
                retain_inactive: true,
            },
        );
        store.register(expectation("/a").with_id("keep-me").with_times(Times::once()));

        let request = HttpRequest::new().with_path("/a");
        assert!(store.first_match(&request).is_some());
        assert!(store.active().is_empty());
        let inactive = store.inactive();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].id, "keep-me");
    }

    #[test]
    fn test_priority_beats_registration_order() {
        let store = ExpectationStore::new();
        store.register(expectation("/a").with_id("low"));
        store.register(expectation("/a").with_id("high").with_priority(10));

        let matched = store.first_match(&HttpRequest::new().with_path("/a")).unwrap();
        assert_eq!(matched.id, "high");
    }

    #[test]
    fn test_equal_priority_ties_break_on_registration_order() {
        let store = ExpectationStore::new();
        store.register(expectation("/a").with_id("first"));
        store.register(expectation("/a").with_id("second"));

        let matched = store.first_match(&HttpRequest::new().with_path("/a")).unwrap();
        assert_eq!(matched.id, "first");
    }

    #[test]
    fn test_replacement_keeps_slot_order() {
        let store = ExpectationStore::new();
        store.register(expectation("/a").with_id("first"));
        store.register(expectation("/a").with_id("second"));
        // Replacing "first" must not move it behind "second".
        store.register(expectation("/a").with_id("first").with_priority(0));

        let matched = store.first_match(&HttpRequest::new().with_path("/a")).unwrap();
        assert_eq!(matched.id, "first");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_ttl_window_enforced_lazily() {
        let clock = ManualClock::starting_at(Utc::now());
        let store = ExpectationStore::with_clock(clock.clone(), StorePolicy::default());
        store.register(
            expectation("/a").with_time_to_live(TimeToLive::limited(TimeUnit::Hours, 2)),
        );
        let request = HttpRequest::new().with_path("/a");

        clock.advance(Duration::minutes(119));
        assert!(store.first_match(&request).is_some());

        clock.advance(Duration::minutes(2));
        assert!(store.first_match(&request).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_expired_expectation_excluded_from_active() {
        let clock = ManualClock::starting_at(Utc::now());
        let store = ExpectationStore::with_clock(clock.clone(), StorePolicy::default());
        store.register(
            expectation("/a").with_time_to_live(TimeToLive::limited(TimeUnit::Seconds, 30)),
        );

        assert_eq!(store.active().len(), 1);
        clock.advance(Duration::minutes(1));
        assert!(store.active().is_empty());
    }

    #[test]
    fn test_once_is_consumed_by_exactly_one_thread() {
        let store = Arc::new(ExpectationStore::new());
        store.register(expectation("/race").with_times(Times::once()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let request = HttpRequest::new().with_path("/race");
                    usize::from(store.first_match(&request).is_some())
                })
            })
            .collect();
        let wins: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let store = ExpectationStore::new();
        store.register(expectation("/a").with_id("gone"));
        store.register(expectation("/b"));

        assert!(store.remove("gone").is_some());
        assert!(store.remove("gone").is_none());
        assert_eq!(store.len(), 1);

        store.clear(None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_with_matcher_is_selective() {
        let store = ExpectationStore::new();
        store.register(expectation("/widgets/1").with_id("one"));
        store.register(expectation("/widgets/2").with_id("two"));
        store.register(expectation("/gadgets").with_id("keep"));

        let matcher = RequestDefinition::from(HttpRequest::new().with_path("/widgets/[0-9]+"));
        store.clear(Some(&matcher));

        assert_eq!(store.len(), 1);
        let remaining = store.active();
        assert_eq!(remaining[0].id, "keep");
        assert!(
            store
                .first_match(&HttpRequest::new().with_path("/gadgets"))
                .is_some(),
            "unrelated expectation survives a selective clear"
        );
    }
}
