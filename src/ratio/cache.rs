use super::RatioSource;
use crate::errors::{AppError, Result};
use crate::models::ExchangeRatio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Refresh policy of a [`RatioCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatioCacheConfig {
    /// How often the background task refetches the ratio.
    pub refresh_interval: Duration,
    /// Maximum age of a cached ratio before reads are rejected.
    pub stale_tolerance: Duration,
}

impl Default for RatioCacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            stale_tolerance: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type RatioCallback = Arc<dyn Fn(&ExchangeRatio) + Send + Sync>;

#[derive(Default)]
struct Observers {
    next_id: u64,
    entries: Vec<(SubscriptionId, RatioCallback)>,
}

#[derive(Debug, Clone)]
struct CachedRatio {
    ratio: ExchangeRatio,
    fetched_at: Instant,
}

/// Last known ratio for one pair, kept fresh by a background task.
///
/// Reads never block and never trigger a fetch. A failed refresh leaves the
/// previous value in place; once that value outlives `stale_tolerance`,
/// [`RatioCache::snapshot`] fails with [`AppError::StaleRatio`] instead of
/// serving it.
pub struct RatioCache {
    pair: String,
    config: RatioCacheConfig,
    latest: watch::Receiver<CachedRatio>,
    observers: Arc<Mutex<Observers>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RatioCache {
    /// Fetch the initial ratio and spawn the refresh task.
    pub async fn start(
        source: Arc<dyn RatioSource>,
        pair: impl Into<String>,
        config: RatioCacheConfig,
    ) -> Result<Self> {
        let pair = pair.into();
        if config.refresh_interval.is_zero() {
            return Err(AppError::Config(
                "ratio refresh interval must be non-zero".to_string(),
            ));
        }

        let initial = source
            .fetch_ratio(&pair)
            .await
            .and_then(|ratio| ratio.validate().map(|_| ratio))
            .map_err(|e| AppError::RatioUnavailable(format!("initial fetch for {pair}: {e}")))?;
        info!(pair = %pair, ratio = %initial, "[RATIO] initial ratio fetched");

        let (tx, rx) = watch::channel(CachedRatio {
            ratio: initial,
            fetched_at: Instant::now(),
        });
        let observers = Arc::new(Mutex::new(Observers::default()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(refresh_loop(
            source,
            pair.clone(),
            config.refresh_interval,
            tx,
            observers.clone(),
            shutdown_rx,
        ));

        Ok(Self {
            pair,
            config,
            latest: rx,
            observers,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            task: Mutex::new(Some(task)),
        })
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn config(&self) -> RatioCacheConfig {
        self.config
    }

    /// Most recent ratio, provided it is within the stale tolerance.
    pub fn snapshot(&self) -> Result<ExchangeRatio> {
        let cached = self.latest.borrow().clone();
        let age = cached.fetched_at.elapsed();
        if age > self.config.stale_tolerance {
            return Err(AppError::StaleRatio {
                pair: self.pair.clone(),
                age_ms: age.as_millis(),
                tolerance_ms: self.config.stale_tolerance.as_millis(),
            });
        }
        Ok(cached.ratio)
    }

    /// Register a callback run after every successful refresh.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ExchangeRatio) + Send + Sync + 'static,
    {
        let mut observers = lock(&self.observers);
        observers.next_id += 1;
        let id = SubscriptionId(observers.next_id);
        observers.entries.push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` when `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = lock(&self.observers);
        let before = observers.entries.len();
        observers.entries.retain(|(entry, _)| *entry != id);
        observers.entries.len() != before
    }

    /// Stop the refresh task and wait for it to finish. Safe to call twice.
    pub async fn shutdown(&self) {
        let shutdown_tx = lock(&self.shutdown_tx).take();
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(());
        }
        let task = lock(&self.task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(pair = %self.pair, error = %e, "[RATIO] refresh task ended abnormally");
            }
            info!(pair = %self.pair, "[RATIO] cache stopped");
        }
    }
}

impl Drop for RatioCache {
    fn drop(&mut self) {
        let task = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

async fn refresh_loop(
    source: Arc<dyn RatioSource>,
    pair: String,
    every: Duration,
    tx: watch::Sender<CachedRatio>,
    observers: Arc<Mutex<Observers>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    // the initial value was fetched by `start`, so the first tick is one period out
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!(pair = %pair, "[RATIO] refresh loop stopping");
                break;
            }
            _ = ticker.tick() => {
                let fetched = tokio::select! {
                    _ = &mut shutdown => {
                        debug!(pair = %pair, "[RATIO] refresh loop stopping mid-fetch");
                        break;
                    }
                    fetched = source.fetch_ratio(&pair) => {
                        fetched.and_then(|ratio| ratio.validate().map(|_| ratio))
                    }
                };
                match fetched {
                    Ok(ratio) => {
                        debug!(pair = %pair, ratio = %ratio, "[RATIO] refreshed");
                        tx.send_replace(CachedRatio {
                            ratio: ratio.clone(),
                            fetched_at: Instant::now(),
                        });
                        notify(&observers, &ratio);
                    }
                    Err(e) => {
                        warn!(pair = %pair, error = %e, "[RATIO] refresh failed, keeping last good ratio");
                    }
                }
            }
        }
    }
}

fn notify(observers: &Mutex<Observers>, ratio: &ExchangeRatio) {
    // callbacks run outside the lock so they may (un)subscribe
    let callbacks: Vec<RatioCallback> = lock(observers)
        .entries
        .iter()
        .map(|(_, cb)| cb.clone())
        .collect();
    for callback in callbacks {
        callback(ratio);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratio::MockRatioSource;
    use bigdecimal::BigDecimal;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const EVERY: Duration = Duration::from_secs(10);

    fn ratio(n: i64, d: i64) -> ExchangeRatio {
        ExchangeRatio::new(BigDecimal::from(n), BigDecimal::from(d)).unwrap()
    }

    fn config(stale_tolerance: Duration) -> RatioCacheConfig {
        RatioCacheConfig {
            refresh_interval: EVERY,
            stale_tolerance,
        }
    }

    /// Replays a fixed sequence of fetch outcomes, then keeps failing.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<ExchangeRatio>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<ExchangeRatio>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl RatioSource for ScriptedSource {
        async fn fetch_ratio(&self, _pair: &str) -> Result<ExchangeRatio> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::RatioUnavailable("feed down".into())))
        }
    }

    #[tokio::test]
    async fn initial_fetch_failure_is_reported() {
        let mut source = MockRatioSource::new();
        source
            .expect_fetch_ratio()
            .times(1)
            .returning(|_| Err(AppError::RatioUnavailable("oracle offline".into())));

        let res = RatioCache::start(Arc::new(source), "SUI-USDC", config(EVERY * 3)).await;
        assert!(matches!(res, Err(AppError::RatioUnavailable(_))));
    }

    #[tokio::test]
    async fn zero_refresh_interval_is_rejected() {
        let source = ScriptedSource::new(vec![Ok(ratio(2, 1))]);
        let cfg = RatioCacheConfig {
            refresh_interval: Duration::ZERO,
            stale_tolerance: EVERY,
        };
        let res = RatioCache::start(source, "SUI-USDC", cfg).await;
        assert!(matches!(res, Err(AppError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_serves_initial_ratio() {
        let source = ScriptedSource::new(vec![Ok(ratio(2, 1))]);
        let cache = RatioCache::start(source, "SUI-USDC", config(EVERY * 3))
            .await
            .unwrap();
        assert_eq!(cache.snapshot().unwrap().numerator(), &BigDecimal::from(2));
        assert_eq!(cache.pair(), "SUI-USDC");
        cache.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_replaces_ratio_and_notifies() {
        let source = ScriptedSource::new(vec![Ok(ratio(2, 1)), Ok(ratio(3, 1))]);
        let cache = RatioCache::start(source.clone(), "SUI-USDC", config(EVERY * 3))
            .await
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        cache.subscribe(move |r| sink.lock().unwrap().push(r.numerator().clone()));

        tokio::time::sleep(EVERY + EVERY / 2).await;

        assert_eq!(cache.snapshot().unwrap().numerator(), &BigDecimal::from(3));
        assert_eq!(*seen.lock().unwrap(), vec![BigDecimal::from(3)]);
        assert_eq!(source.calls(), 2);
        cache.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_last_good_ratio() {
        let source = ScriptedSource::new(vec![Ok(ratio(2, 1))]);
        let cache = RatioCache::start(source.clone(), "SUI-USDC", config(EVERY * 3))
            .await
            .unwrap();
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        cache.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(EVERY * 2 + EVERY / 2).await;

        assert_eq!(source.calls(), 3);
        assert_eq!(cache.snapshot().unwrap().numerator(), &BigDecimal::from(2));
        assert_eq!(notified.load(Ordering::SeqCst), 0);
        cache.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stale_ratio_is_rejected() {
        let source = ScriptedSource::new(vec![Ok(ratio(2, 1))]);
        let cache = RatioCache::start(source, "SUI-USDC", config(EVERY + EVERY / 2))
            .await
            .unwrap();

        tokio::time::sleep(EVERY * 2).await;

        let err = cache.snapshot().unwrap_err();
        assert!(matches!(err, AppError::StaleRatio { .. }));
        cache.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_stops_notifications() {
        let source = ScriptedSource::new(vec![Ok(ratio(2, 1)), Ok(ratio(2, 1)), Ok(ratio(2, 1))]);
        let cache = RatioCache::start(source, "SUI-USDC", config(EVERY * 3))
            .await
            .unwrap();
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        let id = cache.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(EVERY + EVERY / 2).await;
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        assert!(cache.unsubscribe(id));
        assert!(!cache.unsubscribe(id));

        tokio::time::sleep(EVERY).await;
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        cache.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_refreshing() {
        let source = ScriptedSource::new(vec![Ok(ratio(2, 1))]);
        let cache = RatioCache::start(source.clone(), "SUI-USDC", config(EVERY * 3))
            .await
            .unwrap();

        cache.shutdown().await;
        cache.shutdown().await;
        tokio::time::sleep(EVERY * 3).await;

        assert_eq!(source.calls(), 1);
    }

    /// Answers the first fetch at once, then hangs for `hang` on every refresh.
    struct HangingSource {
        hang: Duration,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RatioSource for HangingSource {
        async fn fetch_ratio(&self, _pair: &str) -> Result<ExchangeRatio> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                tokio::time::sleep(self.hang).await;
            }
            Ok(ratio(2, 1))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_running_fetch() {
        let source = Arc::new(HangingSource {
            hang: Duration::from_secs(600),
            calls: AtomicUsize::new(0),
        });
        let cache = RatioCache::start(source.clone(), "SUI-USDC", config(EVERY * 3))
            .await
            .unwrap();

        tokio::time::sleep(EVERY + Duration::from_secs(1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        let started = Instant::now();
        cache.shutdown().await;
        assert!(started.elapsed() < EVERY);
    }
}
