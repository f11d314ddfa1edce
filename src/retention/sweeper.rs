//! # RetentionSweeper: timer-driven purge of the telemetry tables.
//!
//! ```text
//! start() ─► spawn loop:
//!   loop {
//!     purge()
//!       ├─ Ok(n)  → PurgeCompleted, failures = 0, wait = interval
//!       └─ Err(e) → PurgeFailed,    wait = backoff.next(failures), failures += 1
//!     select (biased) { token cancelled → exit, sleep(wait) → continue }
//!   }
//! ```
//!
//! An unusable `purge_interval` disables the sweeper at construction: a warning
//! is logged, `SweeperDisabled` is published, and `start()` does nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::policy::{PurgeMode, RetentionPolicy};
use crate::config::RetentionConfig;
use crate::error::{RetentionError, StorageError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;
use crate::storage::{Row, Storage, tables};

const NAME: &str = "retention";

struct Worker {
    join: JoinHandle<()>,
    token: CancellationToken,
}

/// State shared between the handle and the sweep loop.
struct Sweep {
    storage: Arc<dyn Storage>,
    policy: Option<RetentionPolicy>,
    bus: Bus,
}

impl Sweep {
    async fn purge(&self) -> Result<u64, RetentionError> {
        let Some(policy) = self.policy else {
            debug!("retention disabled; nothing purged");
            return Ok(0);
        };

        let cutoff = match policy.mode {
            PurgeMode::FullWipe => None,
            PurgeMode::OlderThanInterval => chrono::Duration::from_std(policy.interval)
                .ok()
                .and_then(|age| Utc::now().checked_sub_signed(age)),
        };

        let mut total = 0;
        for table in tables::TELEMETRY {
            let res = match (policy.mode, cutoff) {
                (PurgeMode::FullWipe, _) => self.storage.delete_all(table).await,
                (PurgeMode::OlderThanInterval, Some(cutoff)) => {
                    self.storage
                        .delete(table, &|row: &Row| older_than(row, cutoff))
                        .await
                }
                (PurgeMode::OlderThanInterval, None) => Ok(0),
            };
            match res {
                Ok(n) => total += n,
                Err(StorageError::NotReady { .. }) => {
                    debug!(table, "table not ready; skipped");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(total)
    }

    async fn run(self: Arc<Self>, interval: Duration, backoff: BackoffPolicy, token: CancellationToken) {
        let mut failures: u32 = 0;
        loop {
            let wait = match self.purge().await {
                Ok(rows) => {
                    failures = 0;
                    info!(rows, "retention purge completed");
                    self.bus.publish(
                        Event::new(EventKind::PurgeCompleted).with_source(NAME).with_items(rows),
                    );
                    interval
                }
                Err(err) => {
                    let delay = backoff.next(failures);
                    failures = failures.saturating_add(1);
                    error!(err = %err, attempt = failures, delay = ?delay, "retention purge failed");
                    self.bus.publish(
                        Event::new(EventKind::PurgeFailed)
                            .with_source(NAME)
                            .with_reason(err.to_string())
                            .with_delay(delay)
                            .with_attempt(failures),
                    );
                    delay
                }
            };

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = time::sleep(wait) => {}
            }
        }
        debug!("retention loop exited");
    }
}

fn older_than(row: &Row, cutoff: DateTime<Utc>) -> bool {
    row.get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .is_some_and(|ts| ts.with_timezone(&Utc) < cutoff)
}

/// Periodically deletes telemetry rows.
pub struct RetentionSweeper {
    sweep: Arc<Sweep>,
    backoff: BackoffPolicy,
    worker: Mutex<Option<Worker>>,
}

impl RetentionSweeper {
    /// Reads the cadence from `cfg` once. An invalid cadence disables the sweeper.
    pub fn new(storage: Arc<dyn Storage>, cfg: &RetentionConfig, bus: Bus) -> Self {
        let policy = match RetentionPolicy::parse(&cfg.purge_interval, cfg.mode) {
            Ok(policy) => Some(policy),
            Err(err) => {
                warn!(interval = %cfg.purge_interval, err = %err, "retention sweeper disabled");
                bus.publish(
                    Event::new(EventKind::SweeperDisabled)
                        .with_source(NAME)
                        .with_reason(cfg.purge_interval.as_str()),
                );
                None
            }
        };
        Self {
            sweep: Arc::new(Sweep { storage, policy, bus }),
            backoff: cfg.backoff(),
            worker: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sweep.policy.is_some()
    }

    /// Sweep cadence, or `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.sweep.policy.map(|p| p.interval)
    }

    /// Runs one sweep now and returns the number of rows deleted.
    ///
    /// Tables that do not exist yet count as zero rows.
    pub async fn purge(&self) -> Result<u64, RetentionError> {
        self.sweep.purge().await
    }

    /// Spawns the sweep loop. Returns `false` if disabled or already running.
    pub fn start(&self) -> bool {
        let Some(policy) = self.sweep.policy else {
            return false;
        };
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return false;
        }
        let token = CancellationToken::new();
        let join = tokio::spawn(Arc::clone(&self.sweep).run(policy.interval, self.backoff, token.clone()));
        *worker = Some(Worker { join, token });
        debug!(interval = ?policy.interval, mode = ?policy.mode, "retention sweeper started");
        true
    }

    /// Signals the loop and waits for it to exit. An in-flight purge completes first.
    pub async fn stop(&self) {
        let worker = self.worker.lock().take();
        if let Some(Worker { join, token }) = worker {
            token.cancel();
            if let Err(err) = join.await {
                warn!(err = %err, "retention loop ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.join.is_finished())
    }
}

impl Drop for RetentionSweeper {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use tracing_test::traced_test;

    fn cfg(interval: &str, mode: PurgeMode) -> RetentionConfig {
        RetentionConfig {
            purge_interval: interval.into(),
            mode,
            ..RetentionConfig::default()
        }
    }

    async fn seeded() -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::initialized());
        let old = (Utc::now() - chrono::Duration::hours(3)).to_rfc3339();
        let fresh = Utc::now().to_rfc3339();
        for (table, ts) in [
            (tables::MESSAGE, &old),
            (tables::MESSAGE, &fresh),
            (tables::VERTEX_BUILD, &old),
            (tables::TRANSACTION, &fresh),
        ] {
            storage.append(table, json!({ "timestamp": ts })).await.expect("append");
        }
        storage
    }

    /// Fails the first `failures` wipes with a backend error.
    struct Flaky {
        inner: MemoryStorage,
        failures: Mutex<u32>,
    }

    #[async_trait::async_trait]
    impl Storage for Flaky {
        async fn append(&self, table: &str, row: Row) -> Result<(), StorageError> {
            self.inner.append(table, row).await
        }
        async fn transaction(&self, ops: Vec<crate::storage::WriteOp>) -> Result<(), StorageError> {
            self.inner.transaction(ops).await
        }
        async fn query(&self, table: &str, p: crate::storage::Predicate<'_>) -> Result<Vec<Row>, StorageError> {
            self.inner.query(table, p).await
        }
        async fn update(
            &self,
            table: &str,
            p: crate::storage::Predicate<'_>,
            f: crate::storage::Mutator<'_>,
        ) -> Result<Vec<Row>, StorageError> {
            self.inner.update(table, p, f).await
        }
        async fn delete(&self, table: &str, p: crate::storage::Predicate<'_>) -> Result<u64, StorageError> {
            self.inner.delete(table, p).await
        }
        async fn delete_all(&self, table: &str) -> Result<u64, StorageError> {
            {
                let mut left = self.failures.lock();
                if *left > 0 {
                    *left -= 1;
                    return Err(StorageError::Backend { error: "database is locked".into() });
                }
            }
            self.inner.delete_all(table).await
        }
        async fn drain(&self, table: &str) -> Result<Vec<Row>, StorageError> {
            self.inner.drain(table).await
        }
        async fn count(&self, table: &str) -> Result<u64, StorageError> {
            self.inner.count(table).await
        }
    }

    #[tokio::test]
    async fn full_wipe_removes_every_row() {
        let storage = seeded().await;
        let sweeper = RetentionSweeper::new(storage.clone(), &cfg("2h", PurgeMode::FullWipe), Bus::new(8));
        assert_eq!(sweeper.purge().await.expect("purge"), 4);
        assert!(storage.rows(tables::MESSAGE).is_empty());
    }

    #[tokio::test]
    async fn age_based_mode_keeps_fresh_rows() {
        let storage = seeded().await;
        let sweeper = RetentionSweeper::new(
            storage.clone(),
            &cfg("2h", PurgeMode::OlderThanInterval),
            Bus::new(8),
        );
        assert_eq!(sweeper.purge().await.expect("purge"), 2);
        assert_eq!(storage.rows(tables::MESSAGE).len(), 1);
        assert_eq!(storage.rows(tables::TRANSACTION).len(), 1);
    }

    #[tokio::test]
    async fn missing_tables_count_zero() {
        let storage = Arc::new(MemoryStorage::with_tables([tables::MESSAGE]));
        storage.append(tables::MESSAGE, json!({})).await.expect("append");
        let sweeper = RetentionSweeper::new(storage, &cfg("1d", PurgeMode::FullWipe), Bus::new(8));
        assert_eq!(sweeper.purge().await.expect("purge"), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn invalid_interval_disables_sweeper() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let sweeper = RetentionSweeper::new(Arc::new(MemoryStorage::initialized()), &cfg("90s", PurgeMode::FullWipe), bus);

        assert!(!sweeper.is_enabled());
        assert_eq!(sweeper.interval(), None);
        assert!(!sweeper.start());
        assert!(logs_contain("retention sweeper disabled"));
        assert_eq!(rx.try_recv().expect("event").kind, EventKind::SweeperDisabled);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_purges_every_interval_until_stopped() {
        let storage = Arc::new(MemoryStorage::initialized());
        let sweeper = RetentionSweeper::new(storage.clone(), &cfg("1m", PurgeMode::FullWipe), Bus::new(64));
        assert!(sweeper.start());
        assert!(!sweeper.start());

        time::sleep(Duration::from_secs(1)).await;
        storage.append(tables::MESSAGE, json!({})).await.expect("append");
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(storage.rows(tables::MESSAGE).len(), 1);

        time::sleep(Duration::from_secs(31)).await;
        assert!(storage.rows(tables::MESSAGE).is_empty());

        sweeper.stop().await;
        assert!(!sweeper.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_purge_retries_after_backoff() {
        let storage = Arc::new(Flaky {
            inner: MemoryStorage::initialized(),
            failures: Mutex::new(1),
        });
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let sweeper = RetentionSweeper::new(storage.clone(), &cfg("1d", PurgeMode::FullWipe), bus);
        sweeper.start();

        time::sleep(Duration::from_secs(1)).await;
        let failed = rx.try_recv().expect("event");
        assert_eq!(failed.kind, EventKind::PurgeFailed);
        assert_eq!(failed.delay_ms, Some(60_000));
        assert_eq!(failed.attempt, Some(1));

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(rx.try_recv().expect("event").kind, EventKind::PurgeCompleted);
        sweeper.stop().await;
    }
}
