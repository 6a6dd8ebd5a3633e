use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryEventKind {
    StatusChanged {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },
    FeeCalculated {
        fee: String,
    },
    CostSettled {
        cost_id: Uuid,
    },
    CostUnsettled {
        cost_id: Uuid,
    },
    DistanceCostRecalculated {
        cost_id: Uuid,
        distance_cost: String,
        total_cost: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub staff_id: Option<Uuid>,
    #[serde(flatten)]
    pub kind: DeliveryEventKind,
    pub occurred_at: DateTime<Utc>,
}

impl DeliveryEvent {
    pub fn new(
        delivery_id: Uuid,
        staff_id: Option<Uuid>,
        kind: DeliveryEventKind,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            delivery_id,
            staff_id,
            kind,
            occurred_at,
        }
    }
}
