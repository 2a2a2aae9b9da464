//! Prune-plan command implementation.

use commsync_client::{PruningPolicy, ThreadCursorStore, ThreadSyncState};
use commsync_protocol::{CalendarQuery, Clock, SystemClock, ThreadId, Timestamp};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Bookkeeping of one thread, as read from the input file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadTimes {
    #[serde(default)]
    last_navigated_to: Timestamp,
    last_pruned: Timestamp,
}

/// Prune plan for one point in time.
#[derive(Debug)]
pub struct PrunePlan {
    /// Time the plan was computed for.
    pub now: Timestamp,
    /// Threads a sweep at `now` would prune.
    pub prunable: Vec<ThreadId>,
    /// Earliest prune time across all threads.
    pub next_prune_time: Option<Timestamp>,
    /// Delay a driver would wait before its next sweep.
    pub next_sweep_in: Option<Duration>,
}

/// Computes the plan for the threads listed in `path`.
pub fn plan(
    path: &Path,
    now: Timestamp,
    active: Option<&ThreadId>,
) -> Result<PrunePlan, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let threads: BTreeMap<ThreadId, ThreadTimes> = serde_json::from_str(&contents)?;

    // The calendar query plays no part in pruning.
    let mut store = ThreadCursorStore::new(CalendarQuery::home("1970-01-01", "1970-01-01"));
    for (thread_id, times) in threads {
        let mut state = ThreadSyncState::new(times.last_pruned);
        state.last_navigated_to = times.last_navigated_to;
        store.insert_thread(thread_id, state);
    }

    let policy = PruningPolicy::default();
    Ok(PrunePlan {
        now,
        prunable: policy.prunable_threads(&store, now, active),
        next_prune_time: policy.next_prune_time(&store),
        next_sweep_in: policy.next_sweep_delay(&store, now),
    })
}

/// Runs the prune-plan command.
pub fn run(
    path: &Path,
    now: Option<Timestamp>,
    active: Option<&ThreadId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let now = now.unwrap_or_else(|| SystemClock.now_ms());
    let plan = plan(path, now, active)?;

    println!("Prune plan at {}", plan.now);
    if let Some(active) = active {
        println!("Active thread: {active} (never pruned)");
    }
    println!();

    if plan.prunable.is_empty() {
        println!("No threads are prunable");
    } else {
        println!("Prunable threads:");
        for thread_id in &plan.prunable {
            println!("  {thread_id}");
        }
    }
    match (plan.next_prune_time, plan.next_sweep_in) {
        (Some(at), Some(delay)) => {
            println!();
            println!("Next prune time: {at}");
            println!("Next sweep in:   {:.1}s", delay.as_secs_f64());
        }
        _ => println!("No threads tracked; no sweep scheduled"),
    }
    Ok(())
}
