//! Background tracking of executed swaps
//!
//! Polls every non-terminal swap in the store on a fixed interval, persists
//! forward transitions and broadcasts them as events. Swaps whose lookups
//! stay inconclusive back off exponentially with jitter, and tracking stops
//! once a swap has used up its budget of inconclusive polls. Conclusive
//! answers such as `awaiting_deposit` never count against the budget.

use super::StatusTracker;
use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::error::SwapResult;
use crate::events::{EventBus, SwapEvent};
use crate::metrics;
use crate::state::SwapStore;
use crate::swap::{ActiveSwap, SwapStatus};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

/// Exponent cap so the shift below cannot overflow
const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, Clone, Copy)]
struct TrackingState {
    polls: u32,
    unknown_polls: u32,
    consecutive_unknown: u32,
    next_poll_at: Option<DateTime<Utc>>,
    abandoned: bool,
}

impl TrackingState {
    fn new() -> Self {
        Self {
            polls: 0,
            unknown_polls: 0,
            consecutive_unknown: 0,
            next_poll_at: None,
            abandoned: false,
        }
    }
}

/// Outcome of a single pass over the active swaps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub polled: usize,
    pub changed: usize,
    pub abandoned: usize,
}

pub struct SwapMonitor {
    store: Arc<SwapStore>,
    tracker: Arc<StatusTracker>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
    tracked: DashMap<String, TrackingState>,
    shutdown: Arc<RwLock<bool>>,
}

impl SwapMonitor {
    pub fn new(
        store: Arc<SwapStore>,
        tracker: Arc<StatusTracker>,
        events: EventBus,
        clock: Arc<dyn Clock>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            store,
            tracker,
            events,
            clock,
            config,
            tracked: DashMap::new(),
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// Main tracking loop
    pub async fn run(&self) -> SwapResult<()> {
        let mut poll_interval = interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        let mut cleanup_interval = interval(Duration::from_secs(300));

        info!("Swap monitor started");

        loop {
            if *self.shutdown.read().await {
                break;
            }

            tokio::select! {
                _ = poll_interval.tick() => {
                    match self.poll_once().await {
                        Ok(summary) if summary.changed > 0 || summary.abandoned > 0 => {
                            debug!("Monitor pass: {:?}", summary);
                        }
                        Ok(_) => {}
                        Err(e) => error!("Error polling active swaps: {}", e),
                    }
                }

                _ = cleanup_interval.tick() => {
                    if let Err(e) = self.cleanup().await {
                        error!("Error cleaning up tracking state: {}", e);
                    }
                }
            }
        }

        info!("Swap monitor stopped");
        Ok(())
    }

    /// Signal the loop to stop after the current pass
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
    }

    /// Poll every active swap that is due
    pub async fn poll_once(&self) -> SwapResult<PollSummary> {
        let active = self.store.get_active_swaps().await?;
        metrics::record_active_swaps(active.len());

        let mut summary = PollSummary::default();
        for swap in active {
            let now = self.clock.now();
            // Copy the state out; no map guard is held across the awaits below
            let mut state = self
                .tracked
                .get(&swap.id)
                .map(|entry| *entry.value())
                .unwrap_or_else(TrackingState::new);

            if state.abandoned || state.next_poll_at.is_some_and(|at| now < at) {
                continue;
            }

            if state.unknown_polls >= self.config.max_polls {
                warn!(
                    "Giving up on swap {} after {} inconclusive polls (last status {})",
                    swap.id, state.unknown_polls, swap.status
                );
                state.abandoned = true;
                self.tracked.insert(swap.id.clone(), state);
                self.events.publish(SwapEvent::TrackingAbandoned {
                    swap_id: swap.id.clone(),
                    last_status: swap.status,
                    polls: state.polls,
                    at: now,
                });
                summary.abandoned += 1;
                continue;
            }

            let snapshot = self.tracker.poll_swap(&swap).await;
            summary.polled += 1;
            state.polls += 1;

            if snapshot.status == SwapStatus::Unknown {
                state.unknown_polls += 1;
                state.consecutive_unknown += 1;
                let jitter = rand::thread_rng().gen_range(0..=self.config.jitter_ms);
                let delay = backoff_delay(&self.config, state.consecutive_unknown, jitter);
                state.next_poll_at = chrono::Duration::from_std(delay).ok().map(|d| now + d);
                debug!("Swap {} lookup inconclusive, next poll in {:?}", swap.id, delay);
            } else {
                state.consecutive_unknown = 0;
                state.next_poll_at = None;
            }

            let mut swap = swap;
            let previous = swap.status;
            if swap.apply_snapshot(&snapshot, now) && self.persist(&swap, previous, now).await? {
                summary.changed += 1;
            }

            if swap.is_terminal() {
                self.tracked.remove(&swap.id);
            } else {
                self.tracked.insert(swap.id.clone(), state);
            }
        }

        Ok(summary)
    }

    /// Write a merged swap back and announce a status change. Returns
    /// whether the status moved.
    async fn persist(&self, swap: &ActiveSwap, previous: SwapStatus, now: DateTime<Utc>) -> SwapResult<bool> {
        if !self.store.update_status(swap).await? {
            debug!("Swap {} already terminal in store, skipping update", swap.id);
            return Ok(false);
        }

        if swap.status == previous {
            return Ok(false);
        }

        info!("Swap {} moved {} -> {}", swap.id, previous, swap.status);
        if swap.is_terminal() {
            let latency = (now - swap.created_at).num_milliseconds().max(0) as f64 / 1000.0;
            metrics::record_terminal(swap.status, latency);
        }
        self.events.publish(SwapEvent::transition(swap, previous, now));
        Ok(true)
    }

    /// Forget tracking state for swaps that are no longer active
    pub async fn cleanup(&self) -> SwapResult<usize> {
        let active: HashSet<String> = self
            .store
            .get_active_swaps()
            .await?
            .into_iter()
            .map(|swap| swap.id)
            .collect();

        let before = self.tracked.len();
        self.tracked.retain(|id, _| active.contains(id));
        let removed = before - self.tracked.len();
        if removed > 0 {
            debug!("Dropped tracking state for {} swaps", removed);
        }
        Ok(removed)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }
}

/// Delay before the next poll after `consecutive_unknown` inconclusive
/// lookups: the poll interval doubled per miss, capped, plus jitter.
pub fn backoff_delay(config: &TrackerConfig, consecutive_unknown: u32, jitter_ms: u64) -> Duration {
    let exponent = consecutive_unknown.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    let base = config
        .poll_interval_ms
        .saturating_mul(1u64 << exponent)
        .min(config.max_backoff_ms.max(config.poll_interval_ms));
    Duration::from_millis(base.saturating_add(jitter_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::DatabaseConfig;
    use crate::provider::{SimulatorProvider, SwapProvider};
    use crate::swap::{Asset, ExecParams, QuoteRequest, RefundContext, SwapDirection};
    use tokio::sync::broadcast::error::TryRecvError;

    fn config(max_polls: u32) -> TrackerConfig {
        TrackerConfig {
            poll_interval_ms: 100,
            max_backoff_ms: 1_000,
            jitter_ms: 0,
            max_polls,
        }
    }

    async fn store() -> Arc<SwapStore> {
        let store = SwapStore::new(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
        })
        .await
        .unwrap();
        store.run_migrations().await.unwrap();
        Arc::new(store)
    }

    async fn executed_swap(simulator: &SimulatorProvider, clock: &ManualClock) -> ActiveSwap {
        let request = QuoteRequest {
            direction: SwapDirection::Inbound,
            asset: Asset::new("BTC", "BTC", "Bitcoin", 8, None, None),
            amount: "1.0".to_string(),
            recipient: "t1VpYecBW4UudbGcy4ufh61eWxQCoFaUrPs".to_string(),
            refund: RefundContext {
                source_chain_refund_address: Some("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq".to_string()),
                home_refund_address: None,
            },
        };
        let params = ExecParams {
            destination_address: request.recipient.clone(),
            ..Default::default()
        };
        let quote = simulator.quote(&request).await.unwrap();
        let receipt = simulator.execute(&quote, &params).await.unwrap();
        ActiveSwap::from_execution(&quote, &params, receipt, clock.now())
    }

    #[test]
    fn test_backoff_delay() {
        let config = config(10);
        assert_eq!(backoff_delay(&config, 1, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(&config, 2, 0), Duration::from_millis(200));
        assert_eq!(backoff_delay(&config, 4, 0), Duration::from_millis(800));
        assert_eq!(backoff_delay(&config, 5, 0), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(&config, 500, 0), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(&config, 1, 50), Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_tracks_mock_swap_to_completion() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let simulator = Arc::new(SimulatorProvider::new(clock.clone()));
        let tracker = Arc::new(StatusTracker::new(vec![simulator.clone() as Arc<dyn SwapProvider>]));
        let store = store().await;
        let events = EventBus::default();
        let mut rx = events.subscribe();

        let swap = executed_swap(&simulator, &clock).await;
        store.save_swap(&swap).await.unwrap();

        let monitor = SwapMonitor::new(store.clone(), tracker, events, clock.clone(), config(100));

        let first = monitor.poll_once().await.unwrap();
        assert_eq!(first.polled, 1);
        assert_eq!(first.changed, 0);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        clock.advance(chrono::Duration::seconds(25));
        assert_eq!(monitor.poll_once().await.unwrap().changed, 1);
        match rx.try_recv().unwrap() {
            SwapEvent::StatusChanged { from, to, .. } => {
                assert_eq!(from, SwapStatus::AwaitingDeposit);
                assert_eq!(to, SwapStatus::Swapping);
            }
            other => panic!("unexpected event {other:?}"),
        }

        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(monitor.poll_once().await.unwrap().changed, 1);
        assert!(matches!(rx.try_recv().unwrap(), SwapEvent::Completed { .. }));

        let stored = store.get_swap(&swap.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SwapStatus::Completed);
        assert_eq!(stored.to_amount, "1680.00000000");
        assert!(stored.settlement_tx_ref.is_some());
        assert!(stored.completed_at.is_some());

        assert_eq!(monitor.poll_once().await.unwrap(), PollSummary::default());
        assert_eq!(monitor.tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_abandons_after_poll_budget() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let simulator = Arc::new(SimulatorProvider::new(clock.clone()));
        let store = store().await;
        let events = EventBus::default();
        let mut rx = events.subscribe();

        // An id the provider cannot resolve, so lookups stay unknown
        let mut swap = executed_swap(&simulator, &clock).await;
        swap.intent_id = Some("mock-intent-lost".to_string());
        store.save_swap(&swap).await.unwrap();

        let tracker = Arc::new(StatusTracker::new(vec![simulator as Arc<dyn SwapProvider>]));
        let monitor = SwapMonitor::new(store.clone(), tracker, events, clock.clone(), config(2));

        assert_eq!(monitor.poll_once().await.unwrap().polled, 1);

        // Backing off: not due yet
        assert_eq!(monitor.poll_once().await.unwrap().polled, 0);

        clock.advance(chrono::Duration::seconds(5));
        assert_eq!(monitor.poll_once().await.unwrap().polled, 1);

        clock.advance(chrono::Duration::seconds(5));
        assert_eq!(monitor.poll_once().await.unwrap().abandoned, 1);
        match rx.try_recv().unwrap() {
            SwapEvent::TrackingAbandoned { polls, last_status, .. } => {
                assert_eq!(polls, 2);
                assert_eq!(last_status, SwapStatus::AwaitingDeposit);
            }
            other => panic!("unexpected event {other:?}"),
        }

        clock.advance(chrono::Duration::seconds(5));
        assert_eq!(monitor.poll_once().await.unwrap(), PollSummary::default());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        let stored = store.get_swap(&swap.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SwapStatus::AwaitingDeposit);
    }

    #[tokio::test]
    async fn test_slow_deposit_is_not_abandoned() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let simulator = Arc::new(SimulatorProvider::new(clock.clone()));
        let tracker = Arc::new(StatusTracker::new(vec![simulator.clone() as Arc<dyn SwapProvider>]));
        let store = store().await;
        let events = EventBus::default();
        let mut rx = events.subscribe();

        let swap = executed_swap(&simulator, &clock).await;
        store.save_swap(&swap).await.unwrap();

        let monitor = SwapMonitor::new(store.clone(), tracker, events, clock.clone(), config(2));

        // Well past the budget while the swap still waits for its deposit
        for _ in 0..5 {
            let summary = monitor.poll_once().await.unwrap();
            assert_eq!(summary.polled, 1);
            assert_eq!(summary.abandoned, 0);
            clock.advance(chrono::Duration::seconds(1));
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        clock.advance(chrono::Duration::seconds(60));
        assert_eq!(monitor.poll_once().await.unwrap().changed, 1);
        assert!(matches!(rx.try_recv().unwrap(), SwapEvent::Completed { .. }));
    }

    #[tokio::test]
    async fn test_restarted_monitor_resumes_mock_swap() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = store().await;

        let executing = SimulatorProvider::new(clock.clone());
        let swap = executed_swap(&executing, &clock).await;
        store.save_swap(&swap).await.unwrap();
        drop(executing);

        let restarted = Arc::new(SimulatorProvider::new(clock.clone()));
        let tracker = Arc::new(StatusTracker::new(vec![restarted as Arc<dyn SwapProvider>]));
        let monitor = SwapMonitor::new(store.clone(), tracker, EventBus::default(), clock.clone(), config(2));

        clock.advance(chrono::Duration::seconds(60));
        assert_eq!(monitor.poll_once().await.unwrap().changed, 1);

        let stored = store.get_swap(&swap.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SwapStatus::Completed);
    }

    #[tokio::test]
    async fn test_cleanup_forgets_finished_swaps() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let simulator = Arc::new(SimulatorProvider::new(clock.clone()));
        let tracker = Arc::new(StatusTracker::new(vec![simulator.clone() as Arc<dyn SwapProvider>]));
        let store = store().await;

        let mut swap = executed_swap(&simulator, &clock).await;
        store.save_swap(&swap).await.unwrap();

        let monitor = SwapMonitor::new(store.clone(), tracker, EventBus::default(), clock.clone(), config(100));
        monitor.poll_once().await.unwrap();
        assert_eq!(monitor.tracked_count(), 1);

        swap.apply_snapshot(&crate::swap::StatusSnapshot::new(SwapStatus::Refunded), clock.now());
        store.update_status(&swap).await.unwrap();

        assert_eq!(monitor.cleanup().await.unwrap(), 1);
        assert_eq!(monitor.tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_ends_run_loop() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tracker = Arc::new(StatusTracker::new(vec![]));
        let monitor = Arc::new(SwapMonitor::new(
            store().await,
            tracker,
            EventBus::default(),
            clock,
            config(10),
        ));

        let runner = monitor.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        monitor.stop().await;

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
