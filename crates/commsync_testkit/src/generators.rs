//! Property-based test generators using proptest.
//!
//! Strategies produce data that respects the protocol's own invariants:
//! message ids are unique per history, and histories are time-ordered.

use commsync_client::ThreadSyncState;
use commsync_protocol::{RawMessageInfo, ThreadId, Timestamp, TruncationStatus};
use proptest::prelude::*;

/// Strategy for generating thread ids from a small pool, so collisions
/// between generated values are common.
pub fn thread_id_strategy() -> impl Strategy<Value = ThreadId> {
    (1u8..=8).prop_map(|n| ThreadId::new(n.to_string()))
}

/// Strategy for generating timestamps within a few days of an epoch-ms
/// base.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    1_600_000_000_000u64..1_600_000_000_000 + 3 * 24 * 60 * 60 * 1000
}

/// Strategy for generating truncation statuses.
pub fn truncation_status_strategy() -> impl Strategy<Value = TruncationStatus> {
    prop_oneof![
        Just(TruncationStatus::Exhaustive),
        Just(TruncationStatus::Unchanged),
        Just(TruncationStatus::Truncated),
    ]
}

/// Strategy for generating a time-ordered message history in one thread.
/// Ids are sequential from 1.
pub fn message_history_strategy(
    thread_id: &'static str,
    max_len: usize,
) -> impl Strategy<Value = Vec<RawMessageInfo>> {
    (timestamp_strategy(), prop::collection::vec(1u64..120_000, 0..=max_len)).prop_map(
        move |(start, gaps)| {
            let mut time = start;
            gaps.into_iter()
                .enumerate()
                .map(|(i, gap)| {
                    time += gap;
                    RawMessageInfo::text(i as u64 + 1, thread_id, "5", time, format!("m{i}"))
                })
                .collect()
        },
    )
}

/// Strategy for generating client-side thread records.
pub fn thread_sync_state_strategy() -> impl Strategy<Value = ThreadSyncState> {
    (timestamp_strategy(), timestamp_strategy()).prop_map(|(navigated, pruned)| ThreadSyncState {
        last_navigated_to: navigated,
        last_pruned: pruned,
        messages: Vec::new(),
        truncation_status: TruncationStatus::Truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn histories_are_time_ordered(history in message_history_strategy("1", 30)) {
            for pair in history.windows(2) {
                prop_assert!(pair[0].time < pair[1].time);
                prop_assert!(pair[0].id < pair[1].id);
            }
        }
    }
}
