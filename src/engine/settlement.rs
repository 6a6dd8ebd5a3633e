use dashmap::mapref::entry::Entry;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::cost::DeliveryCost;
use crate::models::event::{DeliveryEvent, DeliveryEventKind};
use crate::state::AppState;

/// Stores a new cost record. The delivery's index slot stays locked until the
/// record is in the store, so a delivery never ends up with two records.
pub fn record_cost(state: &AppState, cost: DeliveryCost) -> Result<DeliveryCost, AppError> {
    let delivery_id = cost.delivery_id();

    match state.cost_by_delivery.entry(delivery_id) {
        Entry::Occupied(_) => {
            warn!(delivery_id = %delivery_id, "delivery already has a cost record");
            return Err(AppError::Conflict(format!(
                "delivery {} already has a cost record",
                delivery_id
            )));
        }
        Entry::Vacant(slot) => {
            state.costs.insert(cost.id, cost.clone());
            slot.insert(cost.id);
        }
    }

    info!(
        cost_id = %cost.id,
        delivery_id = %delivery_id,
        total_cost = %cost.total_cost(),
        "cost recorded"
    );
    Ok(cost)
}

pub fn settle_cost(state: &AppState, cost_id: Uuid) -> Result<DeliveryCost, AppError> {
    let now = state.clock.now();

    let mut cost = state
        .costs
        .get_mut(&cost_id)
        .ok_or_else(|| cost_not_found(cost_id))?;

    if cost.is_settled() {
        warn!(cost_id = %cost_id, "cost already settled");
        return Err(AppError::Conflict(format!("cost {} is already settled", cost_id)));
    }

    cost.mark_as_settled(now);
    cost.touch(now);
    let updated = cost.clone();
    drop(cost);

    state
        .metrics
        .cost_settlements_total
        .with_label_values(&["settle"])
        .inc();
    info!(
        cost_id = %cost_id,
        delivery_id = %updated.delivery_id(),
        total_cost = %updated.total_cost(),
        "cost settled"
    );
    state.publish(DeliveryEvent::new(
        updated.delivery_id(),
        None,
        DeliveryEventKind::CostSettled { cost_id },
        now,
    ));

    Ok(updated)
}

pub fn unsettle_cost(state: &AppState, cost_id: Uuid) -> Result<DeliveryCost, AppError> {
    let now = state.clock.now();

    let mut cost = state
        .costs
        .get_mut(&cost_id)
        .ok_or_else(|| cost_not_found(cost_id))?;

    if !cost.is_settled() {
        warn!(cost_id = %cost_id, "cost is not settled");
        return Err(AppError::Conflict(format!("cost {} is not settled", cost_id)));
    }

    cost.set_settled(false, now);
    cost.touch(now);
    let updated = cost.clone();
    drop(cost);

    state
        .metrics
        .cost_settlements_total
        .with_label_values(&["unsettle"])
        .inc();
    info!(cost_id = %cost_id, delivery_id = %updated.delivery_id(), "cost settlement reverted");
    state.publish(DeliveryEvent::new(
        updated.delivery_id(),
        None,
        DeliveryEventKind::CostUnsettled { cost_id },
        now,
    ));

    Ok(updated)
}

pub fn recalculate_distance_cost(
    state: &AppState,
    cost_id: Uuid,
    rate_per_km: Option<f64>,
) -> Result<DeliveryCost, AppError> {
    let now = state.clock.now();
    let rate = rate_per_km.unwrap_or(state.pricing.rate_per_km);
    if rate < 0.0 {
        return Err(AppError::BadRequest("rate_per_km must be >= 0".to_string()));
    }

    let mut cost = state
        .costs
        .get_mut(&cost_id)
        .ok_or_else(|| cost_not_found(cost_id))?;
    let distance_cost = cost.calculate_distance_cost(rate)?;
    cost.touch(now);
    let updated = cost.clone();
    drop(cost);

    info!(
        cost_id = %cost_id,
        distance_km = updated.distance(),
        rate_per_km = rate,
        distance_cost = %distance_cost,
        total_cost = %updated.total_cost(),
        "distance cost recalculated"
    );
    state.publish(DeliveryEvent::new(
        updated.delivery_id(),
        None,
        DeliveryEventKind::DistanceCostRecalculated {
            cost_id,
            distance_cost: distance_cost.to_string(),
            total_cost: updated.total_cost().to_string(),
        },
        now,
    ));

    Ok(updated)
}

pub(crate) fn cost_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("cost {} not found", id))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::*;
    use crate::clock::{Clock, FixedClock};
    use crate::config::Pricing;

    fn state_with_cost() -> (AppState, Arc<FixedClock>, Uuid) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 9, 10, 15, 0, 0).unwrap(),
        ));
        let state = AppState::with_clock(16, Pricing::default(), clock.clone());

        let mut cost = DeliveryCost::new(Uuid::new_v4(), clock.now());
        cost.set_base_cost(Decimal::new(5000, 2)).unwrap().set_distance(5.2);
        let id = record_cost(&state, cost).unwrap().id;

        (state, clock, id)
    }

    #[test]
    fn settle_then_unsettle() {
        let (state, clock, id) = state_with_cost();

        let settled = settle_cost(&state, id).unwrap();
        assert!(settled.is_settled());
        assert_eq!(settled.settlement_time(), Some(clock.now()));

        clock.advance(Duration::hours(1));
        let reverted = unsettle_cost(&state, id).unwrap();
        assert!(!reverted.is_settled());
        assert!(reverted.settlement_time().is_none());
    }

    #[test]
    fn double_settlement_is_a_conflict() {
        let (state, _clock, id) = state_with_cost();

        settle_cost(&state, id).unwrap();
        assert!(matches!(settle_cost(&state, id), Err(AppError::Conflict(_))));
    }

    #[test]
    fn unsettling_open_cost_is_a_conflict() {
        let (state, _clock, id) = state_with_cost();
        assert!(matches!(unsettle_cost(&state, id), Err(AppError::Conflict(_))));
    }

    #[test]
    fn distance_recalculation_defaults_to_configured_rate() {
        let (state, _clock, id) = state_with_cost();

        let cost = recalculate_distance_cost(&state, id, None).unwrap();
        assert_eq!(cost.distance_cost().to_string(), "10.40");
        assert_eq!(cost.total_cost().to_string(), "60.40");

        let cost = recalculate_distance_cost(&state, id, Some(1.5)).unwrap();
        assert_eq!(cost.distance_cost().to_string(), "7.80");
        assert_eq!(cost.total_cost().to_string(), "57.80");
    }

    #[test]
    fn negative_rate_is_rejected() {
        let (state, _clock, id) = state_with_cost();
        assert!(matches!(
            recalculate_distance_cost(&state, id, Some(-1.0)),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn second_record_for_a_delivery_is_a_conflict() {
        let (state, _clock, id) = state_with_cost();
        let delivery_id = state.costs.get(&id).unwrap().delivery_id();

        let duplicate = DeliveryCost::new(delivery_id, state.clock.now());
        assert!(matches!(record_cost(&state, duplicate), Err(AppError::Conflict(_))));
        assert_eq!(state.costs.len(), 1);
    }

    #[test]
    fn concurrent_records_keep_one_cost_per_delivery() {
        let state = AppState::new(16, Pricing::default());
        let state = &state;
        let delivery_id = Uuid::new_v4();
        let now = state.clock.now();

        let accepted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(move |_| {
                    scope.spawn(move || {
                        record_cost(state, DeliveryCost::new(delivery_id, now)).is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|accepted| *accepted)
                .count()
        });

        assert_eq!(accepted, 1);
        assert_eq!(state.costs.len(), 1);
        let stored = state.cost_by_delivery.get(&delivery_id).map(|id| *id);
        assert_eq!(stored, state.costs.iter().next().map(|cost| cost.id));
    }
}
