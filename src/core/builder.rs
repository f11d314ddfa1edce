use std::sync::Arc;

use crate::{
    Config,
    events::Bus,
    notify::TaskNotificationFanout,
    retention::RetentionSweeper,
    storage::{MemoryStorage, Storage},
    subscribers::Subscribe,
    telemetry::TelemetryRecorder,
};

use super::pipeline::Pipeline;

/// Builder for a [`Pipeline`].
pub struct PipelineBuilder {
    cfg: Config,
    storage: Option<Arc<dyn Storage>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl PipelineBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            storage: None,
            subscribers: Vec::new(),
        }
    }

    /// Durable storage shared by every component.
    ///
    /// Defaults to an initialised [`MemoryStorage`].
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Event subscribers, each served by its own worker once the pipeline starts.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Wires the components. Nothing is spawned until [`Pipeline::start`].
    ///
    /// The event listener subscribes here, so events raised while building
    /// (e.g. a disabled sweeper) still reach the subscribers.
    pub fn build(self) -> Pipeline {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let events = bus.subscribe();
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::initialized()));

        let telemetry = TelemetryRecorder::new(Arc::clone(&storage), &self.cfg.queue, &bus);
        let tasks = TaskNotificationFanout::new(Arc::clone(&storage), bus.clone());
        let sweeper = RetentionSweeper::new(Arc::clone(&storage), &self.cfg.retention, bus.clone());

        Pipeline::new_internal(
            self.cfg,
            bus,
            events,
            self.subscribers,
            telemetry,
            tasks,
            sweeper,
        )
    }
}
