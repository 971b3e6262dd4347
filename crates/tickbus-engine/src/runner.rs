//! Fixed-interval tick loop.
//!
//! [`run`] drives the bus on a `tokio` interval: before each tick the
//! scenario fires its driver events, then [`EventBus::tick`] drains the
//! queue. The loop ends after `max_ticks` ticks (when non-zero) or as soon
//! as the `shutdown` future resolves.

use std::future::Future;
use std::time::Duration;

use tickbus_core::{EventBus, TickSummary};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::LoopConfig;
use crate::scenario::Scenario;

/// Log a progress line every this many ticks.
const PROGRESS_EVERY_TICKS: u64 = 10;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// `max_ticks` was reached.
    MaxTicks,
    /// The shutdown signal resolved.
    Interrupted,
}

/// Totals accumulated over a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Why the loop stopped.
    pub end_reason: EndReason,
    /// Ticks executed.
    pub total_ticks: u64,
    /// Handler calls across all ticks.
    pub invocations: u64,
    /// Listener failures across all ticks.
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Totals {
    ticks: u64,
    invocations: u64,
    failures: u64,
}

impl Totals {
    fn record(&mut self, summary: &TickSummary) {
        self.ticks = self.ticks.saturating_add(1);
        self.invocations = self
            .invocations
            .saturating_add(u64::try_from(summary.invoked).unwrap_or(u64::MAX));
        self.failures = self
            .failures
            .saturating_add(u64::try_from(summary.failures.len()).unwrap_or(u64::MAX));
    }

    const fn finish(self, end_reason: EndReason) -> RunResult {
        RunResult {
            end_reason,
            total_ticks: self.ticks,
            invocations: self.invocations,
            failures: self.failures,
        }
    }
}

/// Run the tick loop until `max_ticks` is reached or `shutdown` resolves.
///
/// `config.tick_interval_ms` must be non-zero (enforced by
/// [`EngineConfig::validate`](crate::config::EngineConfig::validate)).
pub async fn run<F>(
    bus: &mut EventBus,
    scenario: &mut Scenario,
    config: &LoopConfig,
    shutdown: F,
) -> RunResult
where
    F: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(Duration::from_millis(config.tick_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(
        tick_interval_ms = config.tick_interval_ms,
        max_ticks = config.max_ticks,
        "tick loop starting"
    );

    let mut totals = Totals::default();
    let end_reason = loop {
        if config.max_ticks > 0 && totals.ticks >= config.max_ticks {
            break EndReason::MaxTicks;
        }

        tokio::select! {
            biased;
            () = &mut shutdown => break EndReason::Interrupted,
            _ = interval.tick() => {}
        }

        scenario.before_tick(bus);
        let summary = bus.tick();
        totals.record(&summary);

        debug!(
            tick = summary.tick,
            dispatched = summary.dispatched,
            invoked = summary.invoked,
            "tick"
        );
        if summary.tick.checked_rem(PROGRESS_EVERY_TICKS) == Some(0) {
            info!(
                tick = summary.tick,
                listeners_live = bus.event_count(),
                pending = bus.pending_events(),
                "progress"
            );
        }
    };

    let result = totals.finish(end_reason);
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        invocations = result.invocations,
        failures = result.failures,
        "tick loop stopped"
    );
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn loop_config(max_ticks: u64) -> LoopConfig {
        LoopConfig {
            tick_interval_ms: 10,
            max_ticks,
            seed: 3,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_ticks() {
        let mut bus = EventBus::new();
        let mut scenario = Scenario::install(&mut bus, 3).unwrap();

        let result = run(
            &mut bus,
            &mut scenario,
            &loop_config(12),
            std::future::pending(),
        )
        .await;

        assert_eq!(result.end_reason, EndReason::MaxTicks);
        assert_eq!(result.total_ticks, 12);
        assert_eq!(result.failures, 0);
        assert_eq!(bus.ticks(), 12);
        assert_eq!(scenario.stats().heartbeats, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_wins_before_first_tick() {
        let mut bus = EventBus::new();
        let mut scenario = Scenario::install(&mut bus, 3).unwrap();

        let result = run(&mut bus, &mut scenario, &loop_config(0), async {}).await;

        assert_eq!(result.end_reason, EndReason::Interrupted);
        assert_eq!(result.total_ticks, 0);
        assert_eq!(bus.ticks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_unbounded_run() {
        let mut bus = EventBus::new();
        let mut scenario = Scenario::install(&mut bus, 3).unwrap();

        let shutdown = tokio::time::sleep(Duration::from_millis(55));
        let result = run(&mut bus, &mut scenario, &loop_config(0), shutdown).await;

        assert_eq!(result.end_reason, EndReason::Interrupted);
        // Interval ticks at 0, 10, 20, 30, 40 and 50 ms.
        assert_eq!(result.total_ticks, 6);
        assert!(result.invocations >= 6);
    }
}
