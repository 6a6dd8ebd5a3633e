use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::Pricing;
use crate::models::cost::DeliveryCost;
use crate::models::delivery::KeyCardDelivery;
use crate::models::event::DeliveryEvent;
use crate::models::staff::DeliveryStaff;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub deliveries: DashMap<Uuid, KeyCardDelivery>,
    pub staff: DashMap<Uuid, DeliveryStaff>,
    pub costs: DashMap<Uuid, DeliveryCost>,
    /// delivery id -> cost id; a delivery owns at most one cost record.
    pub cost_by_delivery: DashMap<Uuid, Uuid>,
    pub events_tx: broadcast::Sender<DeliveryEvent>,
    pub metrics: Metrics,
    pub clock: Arc<dyn Clock>,
    pub pricing: Pricing,
}

impl AppState {
    pub fn new(event_buffer_size: usize, pricing: Pricing) -> Self {
        Self::with_clock(event_buffer_size, pricing, Arc::new(SystemClock))
    }

    pub fn with_clock(event_buffer_size: usize, pricing: Pricing, clock: Arc<dyn Clock>) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            deliveries: DashMap::new(),
            staff: DashMap::new(),
            costs: DashMap::new(),
            cost_by_delivery: DashMap::new(),
            events_tx,
            metrics: Metrics::new(),
            clock,
            pricing,
        }
    }

    /// Broadcasts to websocket subscribers; having none is not an error.
    pub fn publish(&self, event: DeliveryEvent) {
        let _ = self.events_tx.send(event);
    }
}
