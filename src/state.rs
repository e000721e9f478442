use tokio::sync::broadcast;

use crate::config::DispatchSettings;
use crate::engine::assignment::Dispatcher;
use crate::engine::location::CourierLocationStore;
use crate::models::assignment::Assignment;
use crate::observability::metrics::Metrics;
use crate::store::Stores;

pub struct AppState {
    pub settings: DispatchSettings,
    pub stores: Stores,
    pub locations: CourierLocationStore,
    pub dispatcher: Dispatcher,
    pub assignment_events_tx: broadcast::Sender<Assignment>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(settings: DispatchSettings, event_buffer_size: usize) -> Self {
        Self::with_stores(Stores::in_memory(), settings, event_buffer_size)
    }

    pub fn with_stores(stores: Stores, settings: DispatchSettings, event_buffer_size: usize) -> Self {
        let metrics = Metrics::new();
        let (assignment_events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        let locations = CourierLocationStore::new(
            stores.couriers.clone(),
            stores.orders.clone(),
            event_buffer_size,
            metrics.clone(),
        );
        let dispatcher = Dispatcher::new(
            stores.clone(),
            locations.clone(),
            assignment_events_tx.clone(),
            settings.clone(),
            metrics.clone(),
        );

        Self {
            settings,
            stores,
            locations,
            dispatcher,
            assignment_events_tx,
            metrics,
        }
    }
}
