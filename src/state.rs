use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::config::Config;
use crate::lifecycle::Lifecycle;
use crate::lifecycle::store::MissionStore;
use crate::models::driver::Driver;
use crate::notify::{NotificationDispatcher, PushGateway};
use crate::observability::metrics::Metrics;
use crate::presence::PresenceTracker;

pub struct AppState {
    pub config: Config,
    pub drivers: Arc<DashMap<Uuid, Driver>>,
    pub lifecycle: Lifecycle,
    pub presence: PresenceTracker,
    pub notifier: NotificationDispatcher,
    pub bus: EventBus,
    pub metrics: Metrics,
}

impl AppState {
    /// Wires the components together. The store and push gateway are the two
    /// external collaborators; the binary passes the real ones, tests pass
    /// in-memory fakes.
    pub fn new(
        config: Config,
        store: Arc<dyn MissionStore>,
        gateway: Arc<dyn PushGateway>,
    ) -> Self {
        let metrics = Metrics::new();
        let bus = EventBus::new(config.event_buffer_size);
        let drivers: Arc<DashMap<Uuid, Driver>> = Arc::new(DashMap::new());
        let notifier = NotificationDispatcher::new(gateway, drivers.clone(), metrics.clone());
        let lifecycle = Lifecycle::new(store, bus.clone(), notifier.clone(), metrics.clone());

        Self {
            config,
            drivers,
            lifecycle,
            presence: PresenceTracker::new(),
            notifier,
            bus,
            metrics,
        }
    }
}
