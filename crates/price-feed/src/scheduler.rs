//! Periodic price refresh
//!
//! Each subscriber gets its own task that fetches from a [`PriceSource`] on
//! a fixed period or on demand, and publishes the result through a watch
//! channel. Fetches inside one task never overlap.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ngo_core::{DataOrigin, PriceFeedResult, PriceSet, TokenPriceSnapshot};

/// Anything that can produce the current watch-list prices
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn latest_prices(&self) -> PriceFeedResult<PriceSet>;
}

/// What a subscriber sees
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerState {
    pub prices: Vec<TokenPriceSnapshot>,
    pub origin: Option<DataOrigin>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Number of price sets applied so far
    pub updates_applied: u64,
}

impl TickerState {
    pub fn has_prices(&self) -> bool {
        !self.prices.is_empty()
    }

    fn apply(&mut self, result: PriceFeedResult<PriceSet>) {
        self.is_loading = false;
        match result {
            Ok(set) => {
                self.prices = set.snapshots;
                self.origin = Some(set.origin);
                self.last_updated = Some(set.produced_at);
                self.error = None;
                self.updates_applied += 1;
            }
            // keep the last good prices
            Err(e) => self.error = Some(e.to_string()),
        }
    }
}

pub struct RefreshScheduler {
    source: Arc<dyn PriceSource>,
    interval: Option<Duration>,
}

impl RefreshScheduler {
    /// `interval` of `None` fetches once and then only on manual refresh
    pub fn new(source: Arc<dyn PriceSource>, interval: Option<Duration>) -> Self {
        Self { source, interval }
    }

    /// Start a refresh task for one consumer
    pub fn subscribe(&self) -> Subscription {
        let (state_tx, state_rx) = watch::channel(TickerState::default());
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            Arc::clone(&self.source),
            self.interval,
            state_tx,
            refresh_rx,
            cancel.clone(),
        ));

        Subscription {
            state: state_rx,
            refresh_tx,
            cancel,
            task: Some(task),
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn run(
    source: Arc<dyn PriceSource>,
    period: Option<Duration>,
    state: watch::Sender<TickerState>,
    mut refresh_rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    let mut ticker = period.map(|period| {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    // the interval's first tick is immediate; without one, fetch up front
    if ticker.is_none() && !cancel.is_cancelled() {
        refresh_cycle(source.as_ref(), &state, &cancel).await;
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = next_tick(&mut ticker) => {}
            Some(()) = refresh_rx.recv() => debug!("Manual price refresh requested"),
        }

        refresh_cycle(source.as_ref(), &state, &cancel).await;
    }

    debug!("Refresh task stopped");
}

async fn refresh_cycle(
    source: &dyn PriceSource,
    state: &watch::Sender<TickerState>,
    cancel: &CancellationToken,
) {
    state.send_modify(|s| s.is_loading = true);

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = source.latest_prices() => result,
    };

    if cancel.is_cancelled() {
        return;
    }

    match &result {
        Ok(set) => info!(
            "Applied {} prices ({})",
            set.len(),
            if set.origin.is_live() { "live" } else { "synthetic" }
        ),
        Err(e) => warn!("Price refresh failed: {}", e),
    }

    state.send_modify(|s| s.apply(result));
}

/// Handle to one refresh task; dropping it stops the task
pub struct Subscription {
    state: watch::Receiver<TickerState>,
    refresh_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn state(&self) -> TickerState {
        self.state.borrow().clone()
    }

    /// Wait for the next state change; `false` once the task is gone
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Wait until the state satisfies `predicate`
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&TickerState) -> bool,
    ) -> Option<TickerState> {
        self.state.wait_for(predicate).await.ok().map(|s| s.clone())
    }

    /// Request an immediate refresh; `false` if one is already pending
    pub fn refresh(&self) -> bool {
        self.refresh_tx.try_send(()).is_ok()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ngo_core::{watch_list, PriceFeedError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that counts calls, tracks overlap and fails on chosen calls
    #[derive(Default)]
    struct ScriptedSource {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
        fail_on: Vec<usize>,
    }

    impl ScriptedSource {
        fn slow(delay: Duration) -> Self {
            Self { delay, ..Default::default() }
        }

        fn failing_on(calls: &[usize]) -> Self {
            Self { fail_on: calls.to_vec(), ..Default::default() }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        async fn latest_prices(&self) -> PriceFeedResult<PriceSet> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on.contains(&call) {
                return Err(PriceFeedError::Transport(format!("call {} failed", call)));
            }

            let now = Utc::now();
            let snapshots = watch_list().iter().map(|t| t.reference_snapshot(now)).collect();
            Ok(PriceSet::new(snapshots, DataOrigin::Live, now))
        }
    }

    fn subscribe(source: &Arc<ScriptedSource>, interval: Option<Duration>) -> Subscription {
        RefreshScheduler::new(Arc::clone(source) as Arc<dyn PriceSource>, interval).subscribe()
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticks_publish_updates() {
        let source = Arc::new(ScriptedSource::default());
        let mut sub = subscribe(&source, Some(Duration::from_secs(60)));

        let state = sub.wait_for(|s| s.updates_applied == 1).await.unwrap();
        assert_eq!(state.prices.len(), 8);
        assert_eq!(state.origin, Some(DataOrigin::Live));
        assert!(!state.is_loading);
        assert!(state.last_updated.is_some());

        let started = tokio::time::Instant::now();
        sub.wait_for(|s| s.updates_applied == 3).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(120));
        assert_eq!(source.calls(), 3);

        sub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_fetch_applies_nothing() {
        let source = Arc::new(ScriptedSource::default());
        let sub = subscribe(&source, Some(Duration::from_secs(60)));
        sub.cancel();

        let receiver = sub.state.clone();
        sub.shutdown().await;

        assert_eq!(receiver.borrow().updates_applied, 0);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_discards_in_flight_fetch() {
        let source = Arc::new(ScriptedSource::slow(Duration::from_secs(10)));
        let sub = subscribe(&source, None);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls(), 1);
        assert!(sub.state().is_loading);

        let receiver = sub.state.clone();
        sub.shutdown().await;
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(receiver.borrow().updates_applied, 0);
        assert!(receiver.borrow().prices.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticking() {
        let source = Arc::new(ScriptedSource::default());
        let mut sub = subscribe(&source, Some(Duration::from_secs(60)));
        sub.wait_for(|s| s.updates_applied == 1).await.unwrap();
        drop(sub);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_never_overlap() {
        let source = Arc::new(ScriptedSource::slow(Duration::from_secs(90)));
        let mut sub = subscribe(&source, Some(Duration::from_secs(60)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        for _ in 0..5 {
            sub.refresh();
        }

        sub.wait_for(|s| s.updates_applied >= 4).await.unwrap();
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);

        sub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_keeps_last_good_prices() {
        let source = Arc::new(ScriptedSource::failing_on(&[2]));
        let mut sub = subscribe(&source, Some(Duration::from_secs(60)));

        let good = sub.wait_for(|s| s.updates_applied == 1).await.unwrap();

        let failed = sub.wait_for(|s| s.error.is_some()).await.unwrap();
        assert_eq!(failed.error.as_deref(), Some("Transport error: call 2 failed"));
        assert_eq!(failed.prices, good.prices);
        assert_eq!(failed.updates_applied, 1);
        assert!(!failed.is_loading);

        // ticking continues and clears the error
        let recovered = sub.wait_for(|s| s.updates_applied == 2).await.unwrap();
        assert!(recovered.error.is_none());

        sub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_without_interval() {
        let source = Arc::new(ScriptedSource::default());
        let mut sub = subscribe(&source, None);

        sub.wait_for(|s| s.updates_applied == 1).await.unwrap();

        assert!(sub.refresh());
        // one request is already pending
        assert!(!sub.refresh());

        sub.wait_for(|s| s.updates_applied == 2).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(source.calls(), 2);

        sub.shutdown().await;
    }
}
