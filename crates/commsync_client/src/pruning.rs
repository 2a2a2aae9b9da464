//! Message cache eviction policy.

use crate::config::PruneConfig;
use crate::store::{ThreadCursorStore, ThreadSyncState};
use commsync_protocol::{ThreadId, Timestamp};
use std::time::Duration;

/// Decides which threads' cached backlog may be evicted, and when.
///
/// A thread becomes prunable at
/// `max(last_navigated_to + navigation_grace, last_pruned + prune_interval)`
/// unless it is the thread currently open.
#[derive(Debug, Clone)]
pub struct PruningPolicy {
    navigation_grace: u64,
    prune_interval: u64,
    min_sweep_delay: Duration,
}

impl PruningPolicy {
    /// Creates a policy from its configuration.
    pub fn new(config: &PruneConfig) -> Self {
        Self {
            navigation_grace: config.navigation_grace.as_millis() as u64,
            prune_interval: config.prune_interval.as_millis() as u64,
            min_sweep_delay: config.min_sweep_delay,
        }
    }

    /// Returns the earliest time `state` may be pruned.
    pub fn prune_time(&self, state: &ThreadSyncState) -> Timestamp {
        let after_navigation = state.last_navigated_to.saturating_add(self.navigation_grace);
        let after_prune = state.last_pruned.saturating_add(self.prune_interval);
        after_navigation.max(after_prune)
    }

    /// Returns the threads prunable at `now`, never including `active`.
    pub fn prunable_threads(
        &self,
        store: &ThreadCursorStore,
        now: Timestamp,
        active: Option<&ThreadId>,
    ) -> Vec<ThreadId> {
        store
            .threads()
            .iter()
            .filter(|(id, state)| Some(*id) != active && now > self.prune_time(state))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Returns the earliest prune time across all threads, ignoring which
    /// one is active. `None` if there are no threads.
    pub fn next_prune_time(&self, store: &ThreadCursorStore) -> Option<Timestamp> {
        store
            .threads()
            .values()
            .map(|state| self.prune_time(state))
            .min()
    }

    /// Returns how long to wait before the next sweep. Never shorter than
    /// the configured minimum, so an active thread that stays due does not
    /// cause a busy loop.
    pub fn next_sweep_delay(&self, store: &ThreadCursorStore, now: Timestamp) -> Option<Duration> {
        let due = self.next_prune_time(store)?;
        let wait = Duration::from_millis(due.saturating_sub(now));
        Some(wait.max(self.min_sweep_delay))
    }

    /// Prunes every eligible thread and returns the ones pruned.
    pub fn sweep(
        &self,
        store: &mut ThreadCursorStore,
        now: Timestamp,
        active: Option<&ThreadId>,
    ) -> Vec<ThreadId> {
        let prunable = self.prunable_threads(store, now, active);
        for thread_id in &prunable {
            store.prune_thread(thread_id, now);
        }
        prunable
    }
}

impl Default for PruningPolicy {
    fn default() -> Self {
        Self::new(&PruneConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commsync_protocol::CalendarQuery;
    use proptest::prelude::*;

    const HOUR: u64 = 60 * 60 * 1000;

    fn state(last_navigated_to: Timestamp, last_pruned: Timestamp) -> ThreadSyncState {
        ThreadSyncState {
            last_navigated_to,
            last_pruned,
            ..ThreadSyncState::new(0)
        }
    }

    fn store_with(threads: &[(&str, Timestamp, Timestamp)]) -> ThreadCursorStore {
        let mut store = ThreadCursorStore::new(CalendarQuery::home("2024-01-01", "2024-01-31"));
        for (id, navigated, pruned) in threads {
            store.insert_thread(ThreadId::new(*id), state(*navigated, *pruned));
        }
        store
    }

    #[test]
    fn next_prune_time_is_min_over_threads() {
        let policy = PruningPolicy::default();
        let store = store_with(&[("A", 0, 0), ("B", 1_000, 0)]);
        assert_eq!(policy.next_prune_time(&store), Some(21_600_000));
    }

    #[test]
    fn recent_navigation_delays_pruning() {
        let policy = PruningPolicy::default();
        let recent = state(10 * HOUR, 6 * HOUR);
        assert_eq!(policy.prune_time(&recent), 12 * HOUR);

        let stale = state(HOUR, 6 * HOUR);
        assert_eq!(policy.prune_time(&stale), 12 * HOUR);

        let opened_late = state(20 * HOUR, 6 * HOUR);
        assert_eq!(policy.prune_time(&opened_late), 21 * HOUR);
    }

    #[test]
    fn pruned_thread_waits_full_interval() {
        let policy = PruningPolicy::default();
        let p = 100 * HOUR;
        let mut store = store_with(&[("T", 0, 0)]);

        assert_eq!(policy.sweep(&mut store, p, None), vec![ThreadId::new("T")]);
        assert!(policy.prunable_threads(&store, p + 6 * HOUR - 1, None).is_empty());
        assert!(policy.prunable_threads(&store, p + 6 * HOUR, None).is_empty());
        assert_eq!(policy.prunable_threads(&store, p + 6 * HOUR + 1, None).len(), 1);
    }

    #[test]
    fn active_thread_is_never_pruned() {
        let policy = PruningPolicy::default();
        let store = store_with(&[("A", 0, 0), ("B", 0, 0)]);
        let active = ThreadId::new("A");

        let prunable = policy.prunable_threads(&store, 7 * HOUR, Some(&active));
        assert_eq!(prunable, vec![ThreadId::new("B")]);
        assert_eq!(policy.next_prune_time(&store), Some(6 * HOUR));
    }

    #[test]
    fn sweep_delay_has_floor() {
        let policy = PruningPolicy::default();
        let store = store_with(&[("A", 0, 0)]);
        assert_eq!(
            policy.next_sweep_delay(&store, 6 * HOUR - 5_000),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            policy.next_sweep_delay(&store, 5 * HOUR),
            Some(Duration::from_millis(HOUR))
        );
        assert_eq!(policy.next_sweep_delay(&store_with(&[]), 0), None);
    }

    proptest! {
        #[test]
        fn prune_time_dominates_both_terms(navigated in 0u64..1_000_000_000, pruned in 0u64..1_000_000_000) {
            let policy = PruningPolicy::default();
            let time = policy.prune_time(&state(navigated, pruned));
            prop_assert!(time >= navigated + HOUR);
            prop_assert!(time >= pruned + 6 * HOUR);
            prop_assert!(time == navigated + HOUR || time == pruned + 6 * HOUR);
        }
    }
}
