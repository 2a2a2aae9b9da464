//! Simulate command implementation.

use commsync_client::{
    ClientConfig, ClientInfo, DriverStats, SyncDriver, ThreadCursorStore, TokioClock,
};
use commsync_protocol::{Clock, Platform, RawMessageInfo, ThreadId, Timestamp, WireFormat};
use commsync_testkit::{
    demo_query, demo_server_with_clock, demo_viewer, LoopbackTransport, DEMO_NOW, DEMO_SESSION,
    OTHER_USER,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Client state sampled halfway between two pings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSample {
    /// Cycle number, from 0.
    pub cycle: u32,
    /// Client message cursor.
    pub messages_current_as_of: Timestamp,
    /// Messages cached for the open thread.
    pub cached_messages: usize,
}

/// Outcome of a simulation run.
#[derive(Debug)]
pub struct SimulationReport {
    /// One sample per cycle.
    pub samples: Vec<CycleSample>,
    /// Driver counters at shutdown.
    pub stats: DriverStats,
}

/// Runs `cycles` ping cycles against the demo world. A new message is
/// posted to the open thread after every sample.
pub async fn simulate(
    cycles: u32,
    frequency: Duration,
    format: WireFormat,
) -> Result<SimulationReport, Box<dyn std::error::Error>> {
    if frequency.is_zero() {
        return Err("frequency must be positive".into());
    }
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(DEMO_NOW));
    let server = Arc::new(demo_server_with_clock(Arc::clone(&clock)));
    demo_viewer(server.backend());

    // Keep the default ratio of near-due window to frequency.
    let config = ClientConfig::new()
        .with_ping_frequency(frequency)
        .with_near_due_window(frequency / 6);
    let transport = LoopbackTransport::new(Arc::clone(&server), DEMO_SESSION).with_format(format);
    let handle = SyncDriver::new(
        config,
        Arc::new(transport),
        ThreadCursorStore::new(demo_query()),
        ClientInfo::new(Platform::Android).with_device_token("simulated-token"),
    )
    .with_clock(Arc::clone(&clock))
    .spawn();

    let open_thread = ThreadId::new("1");
    handle.navigate_to(open_thread.clone())?;
    handle.set_active_thread(Some(open_thread.clone()))?;
    handle.set_logged_in(true)?;
    handle.set_visible(true)?;
    info!(cycles, frequency_ms = frequency.as_millis() as u64, "simulation started");

    let mut samples = Vec::new();
    tokio::time::sleep(frequency / 2).await;
    for cycle in 0..cycles {
        if cycle > 0 {
            tokio::time::sleep(frequency).await;
        }
        let sample = {
            let shared = handle.store();
            let store = shared.read();
            CycleSample {
                cycle,
                messages_current_as_of: store.cursors().messages_current_as_of,
                cached_messages: store
                    .thread(&open_thread)
                    .map_or(0, |thread| thread.messages.len()),
            }
        };
        samples.push(sample);
        server.backend().add_message(RawMessageInfo::text(
            1_000 + u64::from(cycle),
            "1",
            OTHER_USER,
            clock.now_ms(),
            format!("simulated message {cycle}"),
        ));
    }

    let stats = handle.shutdown().await?;
    Ok(SimulationReport { samples, stats })
}

/// Runs the simulate command.
pub fn run(
    cycles: u32,
    frequency_ms: u64,
    format: WireFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(simulate(cycles, Duration::from_millis(frequency_ms), format))?;

    println!("{:>5}  {:>16}  {:>6}", "cycle", "cursor", "cached");
    for sample in &report.samples {
        println!(
            "{:>5}  {:>16}  {:>6}",
            sample.cycle, sample.messages_current_as_of, sample.cached_messages
        );
    }
    println!();
    println!(
        "Pings: {} started, {} succeeded, {} failed",
        report.stats.pings_started, report.stats.pings_succeeded, report.stats.pings_failed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use commsync_testkit::MESSAGE_SPACING;

    #[tokio::test(start_paused = true)]
    async fn cursor_follows_new_messages() {
        let report = simulate(3, Duration::from_secs(1), WireFormat::Json)
            .await
            .unwrap();

        let cursors: Vec<_> = report
            .samples
            .iter()
            .map(|s| s.messages_current_as_of)
            .collect();
        assert_eq!(
            cursors,
            vec![DEMO_NOW - MESSAGE_SPACING, DEMO_NOW + 500, DEMO_NOW + 1_500]
        );
        let cached: Vec<_> = report.samples.iter().map(|s| s.cached_messages).collect();
        assert_eq!(cached, vec![20, 21, 22]);
        assert_eq!(report.stats.pings_started, 3);
        assert_eq!(report.stats.pings_failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cbor_traffic_syncs() {
        let report = simulate(2, Duration::from_millis(200), WireFormat::Cbor)
            .await
            .unwrap();
        assert_eq!(report.stats.pings_failed, 0);
        assert!(report.samples[1].messages_current_as_of > report.samples[0].messages_current_as_of);
    }

    #[tokio::test]
    async fn zero_frequency_is_rejected() {
        assert!(simulate(1, Duration::ZERO, WireFormat::Json).await.is_err());
    }
}
