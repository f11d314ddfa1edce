//! # Pipeline: explicit host lifecycle for the background components.
//!
//! ```text
//! PipelineBuilder::build()
//!   ├─► Bus (cfg.bus_capacity) + listener receiver
//!   ├─► TelemetryRecorder      (3 queues, not started)
//!   ├─► TaskNotificationFanout
//!   └─► RetentionSweeper       (cadence parsed once; may be disabled)
//!
//! start()
//!   ├─► listener: Bus ─► SubscriberSet::emit(Event)
//!   ├─► recorder.start()
//!   └─► sweeper.start()
//!
//! stop()
//!   ├─► Bus.publish(ShutdownRequested)
//!   ├─► sweeper.stop()
//!   ├─► recorder.stop(cfg.queue.drain_timeout)
//!   │      └─ any queue cancelled → RuntimeError::DrainExceeded
//!   └─► listener: forward remaining events, SubscriberSet::shutdown()
//!
//! run_until_signal() = start() ─► wait_for_shutdown_signal() ─► stop()
//! ```
//!
//! Components get their storage and bus from the builder; nothing is looked
//! up from globals.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{builder::PipelineBuilder, shutdown};
use crate::{
    Config,
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    notify::TaskNotificationFanout,
    retention::RetentionSweeper,
    subscribers::{Subscribe, SubscriberSet},
    telemetry::TelemetryRecorder,
};

/// Listener state before and after `start`.
enum Listener {
    Idle {
        events: broadcast::Receiver<Event>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    },
    Running {
        join: JoinHandle<()>,
        token: CancellationToken,
    },
    Stopped,
}

/// Owns the bus, the telemetry queues, the task fan-out, and the sweeper.
pub struct Pipeline {
    cfg: Config,
    bus: Bus,
    telemetry: TelemetryRecorder,
    tasks: TaskNotificationFanout,
    sweeper: RetentionSweeper,
    listener: Mutex<Listener>,
    stopped: AtomicBool,
}

impl Pipeline {
    /// Returns a builder with the given configuration.
    pub fn builder(cfg: Config) -> PipelineBuilder {
        PipelineBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: Config,
        bus: Bus,
        events: broadcast::Receiver<Event>,
        subscribers: Vec<Arc<dyn Subscribe>>,
        telemetry: TelemetryRecorder,
        tasks: TaskNotificationFanout,
        sweeper: RetentionSweeper,
    ) -> Self {
        Self {
            cfg,
            bus,
            telemetry,
            tasks,
            sweeper,
            listener: Mutex::new(Listener::Idle { events, subscribers }),
            stopped: AtomicBool::new(false),
        }
    }

    /// Spawns the event listener, the queue consumers, and the sweep loop.
    ///
    /// Idempotent. Must be called within a tokio runtime.
    pub fn start(&self) {
        {
            let mut listener = self.listener.lock();
            if !matches!(*listener, Listener::Idle { .. }) {
                return;
            }
            if let Listener::Idle { events, subscribers } =
                std::mem::replace(&mut *listener, Listener::Stopped)
            {
                let set = SubscriberSet::new(subscribers, self.bus.clone());
                let token = CancellationToken::new();
                let join = tokio::spawn(forward_events(events, set, token.clone()));
                *listener = Listener::Running { join, token };
            }
        }

        self.telemetry.start();
        if !self.sweeper.start() {
            debug!("retention sweeper not started");
        }
        info!(
            capacity = self.cfg.queue.capacity,
            batch_size = self.cfg.queue.batch_size,
            flush_interval = ?self.cfg.queue.flush_interval,
            "pipeline started"
        );
    }

    /// Stops everything, draining telemetry queues within `queue.drain_timeout`.
    ///
    /// Returns [`RuntimeError::DrainExceeded`] naming every queue whose consumer
    /// had to be force-cancelled. A second call is a no-op.
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        self.sweeper.stop().await;
        let timeout = self.cfg.queue.drain_timeout;
        let stuck = self.telemetry.stop(timeout).await;

        let listener = std::mem::replace(&mut *self.listener.lock(), Listener::Stopped);
        if let Listener::Running { join, token } = listener {
            token.cancel();
            if let Err(err) = join.await {
                warn!(err = %err, "event listener ended abnormally");
            }
        }

        if stuck.is_empty() {
            info!("pipeline stopped");
            Ok(())
        } else {
            let err = RuntimeError::DrainExceeded { timeout, stuck };
            warn!(err = %err.as_message(), "pipeline stopped with cancelled consumers");
            Err(err)
        }
    }

    /// Starts, waits for a termination signal, then stops.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        self.start();
        if let Err(err) = shutdown::wait_for_shutdown_signal().await {
            warn!(err = %err, "signal handlers unavailable; stopping now");
        }
        info!("shutdown signal received");
        self.stop().await
    }

    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    pub fn tasks(&self) -> &TaskNotificationFanout {
        &self.tasks
    }

    pub fn sweeper(&self) -> &RetentionSweeper {
        &self.sweeper
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }
}

/// Forwards bus events to the subscriber set until cancelled, then flushes
/// what is already buffered and shuts the workers down.
async fn forward_events(
    mut events: broadcast::Receiver<Event>,
    set: SubscriberSet,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            res = events.recv() => match res {
                Ok(ev) => set.emit(ev),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event listener lagged; events skipped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = token.cancelled() => break,
        }
    }
    while let Ok(ev) = events.try_recv() {
        set.emit(ev);
    }
    set.shutdown().await;
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Listener::Running { token, .. } = self.listener.get_mut() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MessageEvent;
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Default)]
    struct Kinds(parking_lot::Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Kinds {
        async fn on_event(&self, e: &Event) {
            self.0.lock().push(e.kind);
        }
        fn name(&self) -> &'static str {
            "kinds"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_drains_and_delivers_lifecycle_events() {
        let kinds = Arc::new(Kinds::default());
        let pipeline = Pipeline::builder(Config::default())
            .with_subscribers(vec![kinds.clone() as Arc<dyn Subscribe>])
            .build();
        pipeline.start();
        pipeline.start();

        pipeline
            .telemetry()
            .record(MessageEvent::new("User", "Ada", "hi", "s"));
        pipeline.stop().await.expect("clean stop");
        assert!(pipeline.stop().await.is_ok());

        assert_eq!(pipeline.telemetry().stats().messages.processed, 1);
        let seen = kinds.0.lock().clone();
        assert!(seen.contains(&EventKind::ShutdownRequested));
        assert!(seen.contains(&EventKind::BatchFlushed));
        assert!(seen.contains(&EventKind::ConsumerStopped));
        assert!(seen.contains(&EventKind::PurgeCompleted));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_sweeper_is_reported_to_subscribers() {
        let mut cfg = Config::default();
        cfg.retention.purge_interval = "bad".into();
        let kinds = Arc::new(Kinds::default());
        let pipeline = Pipeline::builder(cfg)
            .with_subscribers(vec![kinds.clone() as Arc<dyn Subscribe>])
            .build();

        assert!(!pipeline.sweeper().is_enabled());
        pipeline.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        pipeline.stop().await.expect("stop");

        assert!(kinds.0.lock().contains(&EventKind::SweeperDisabled));
    }
}
