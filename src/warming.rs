use crate::cache::predictive::PredictiveStore;
use crate::clock::Clock;
use crate::codec;
use crate::error::RemoteError;
use crate::metrics::CacheCounters;
use crate::scoring::top_candidates;
use crate::store::adapter::PrimaryStoreAdapter;
use crate::store::remote::RemoteStore;
use crate::tracker::AccessTracker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Settings for the warmup scheduler
#[derive(Debug, Clone)]
pub struct WarmupConfig {
    pub interval: Duration,
    /// Highest-priority keys considered per cycle
    pub batch_size: usize,
    /// TTL given to entries promoted by warmup
    pub ttl: Duration,
}

/// Outcome of one warmup cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmupReport {
    /// Candidates scored into the top batch
    pub candidates: usize,
    pub promoted: usize,
    /// Candidates already in the predictive store
    pub already_cached: usize,
    /// Candidates the remote store did not have
    pub absent: usize,
    pub failed: usize,
    /// The cycle did not run (another was in flight, or the remote is down)
    pub skipped: bool,
}

enum CandidateOutcome {
    Promoted,
    AlreadyCached,
    Absent,
}

/// Promotes the highest-priority tracked keys from the remote store into the
/// predictive store, once per `interval`.
pub struct WarmupScheduler<R: RemoteStore> {
    adapter: Arc<PrimaryStoreAdapter<R>>,
    tracker: Arc<RwLock<AccessTracker>>,
    predictive: Arc<RwLock<PredictiveStore>>,
    counters: Arc<CacheCounters>,
    clock: Arc<dyn Clock>,
    config: WarmupConfig,
    running: AtomicBool,
}

impl<R: RemoteStore> WarmupScheduler<R> {
    pub fn new(
        adapter: Arc<PrimaryStoreAdapter<R>>,
        tracker: Arc<RwLock<AccessTracker>>,
        predictive: Arc<RwLock<PredictiveStore>>,
        counters: Arc<CacheCounters>,
        clock: Arc<dyn Clock>,
        config: WarmupConfig,
    ) -> Self {
        Self {
            adapter,
            tracker,
            predictive,
            counters,
            clock,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &WarmupConfig {
        &self.config
    }

    /// Run a single warmup cycle. Overlapping calls are skipped, not queued.
    pub async fn warm_once(&self) -> WarmupReport {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Warmup cycle already running, skipping");
            return WarmupReport {
                skipped: true,
                ..Default::default()
            };
        }

        let report = self.run_cycle().await;
        self.running.store(false, Ordering::Release);
        report
    }

    async fn run_cycle(&self) -> WarmupReport {
        if !self.adapter.is_connected() {
            tracing::debug!("Remote store not connected, skipping warmup");
            return WarmupReport {
                skipped: true,
                ..Default::default()
            };
        }

        let patterns = self.tracker.read().await.patterns();
        let candidates = top_candidates(patterns, self.clock.now(), self.config.batch_size);

        let mut report = WarmupReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        for (pattern, score) in candidates {
            match self.warm_candidate(&pattern.key).await {
                Ok(CandidateOutcome::Promoted) => {
                    report.promoted += 1;
                    self.counters.record_warmup_hit();
                    tracing::debug!("Warmed key {} (score {:.3})", pattern.key, score);
                }
                Ok(CandidateOutcome::AlreadyCached) => report.already_cached += 1,
                Ok(CandidateOutcome::Absent) => report.absent += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("Failed to warm key {}: {}", pattern.key, e);
                }
            }
            // Let request handlers run between candidates.
            tokio::task::yield_now().await;
        }

        if report.promoted > 0 || report.failed > 0 {
            tracing::info!(
                "Warmup cycle promoted {} of {} candidates ({} failed)",
                report.promoted,
                report.candidates,
                report.failed
            );
        }
        report
    }

    async fn warm_candidate(&self, key: &str) -> Result<CandidateOutcome, RemoteError> {
        if self.predictive.read().await.contains(key) {
            return Ok(CandidateOutcome::AlreadyCached);
        }

        if !self.adapter.exists(key).await? {
            return Ok(CandidateOutcome::Absent);
        }

        let Some(text) = self.adapter.get(key).await? else {
            // Expired or deleted between the two calls
            return Ok(CandidateOutcome::Absent);
        };
        let value = codec::decode(&text);

        let tracker = self.tracker.read().await;
        let promoted = self
            .predictive
            .write()
            .await
            .promote(&tracker, key, value, self.config.ttl);

        Ok(if promoted {
            CandidateOutcome::Promoted
        } else {
            CandidateOutcome::Absent
        })
    }

    /// Run `warm_once` every `interval` until the returned handle is stopped.
    ///
    /// The first cycle runs one full interval after spawning. Ticks that fall
    /// due while a cycle is still running are dropped.
    pub fn spawn(self: Arc<Self>) -> WarmupHandle {
        let token = CancellationToken::new();
        let child = token.child_token();
        let period = self.config.interval;

        let join = tokio::spawn(async move {
            tracing::info!("Starting warmup scheduler with interval of {:?}", period);

            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        // Runs outside the select so a stop never interrupts a cycle.
                        self.warm_once().await;
                    }
                }
            }

            tracing::info!("Warmup scheduler stopped");
        });

        WarmupHandle { token, join }
    }
}

/// Handle to a spawned warmup scheduler
pub struct WarmupHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl WarmupHandle {
    /// Stop scheduling cycles. A cycle already running completes.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Err(e) = (&mut self.join).await {
            tracing::warn!("Warmup task ended abnormally: {}", e);
        }
    }
}

impl Drop for WarmupHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
