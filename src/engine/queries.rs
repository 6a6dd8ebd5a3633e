use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::cost::DeliveryCost;
use crate::models::delivery::{DeliveryStatus, KeyCardDelivery};
use crate::models::money;
use crate::models::staff::{DeliveryStaff, StaffStatus};
use crate::state::AppState;

pub const URGENT_LIMIT: usize = 20;
pub const DEFAULT_LOW_WORKLOAD_THRESHOLD: usize = 5;

/// Optional filters for listing deliveries; all given filters must match.
#[derive(Debug, Default, Clone)]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
    pub hotel_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

impl DeliveryFilter {
    fn matches(&self, delivery: &KeyCardDelivery) -> bool {
        self.status.is_none_or(|status| delivery.status == status)
            && self.hotel_id.is_none_or(|id| {
                delivery.hotel.as_ref().is_some_and(|hotel| hotel.id == id)
            })
            && self.order_id.is_none_or(|id| {
                delivery.order.as_ref().is_some_and(|order| order.id == id)
            })
            && self
                .date
                .is_none_or(|date| scheduled_on(delivery, date))
    }
}

fn scheduled_on(delivery: &KeyCardDelivery, date: NaiveDate) -> bool {
    delivery
        .delivery_time
        .is_some_and(|time| time.date_naive() == date)
}

fn collect_deliveries<F>(state: &AppState, predicate: F) -> Vec<KeyCardDelivery>
where
    F: Fn(&KeyCardDelivery) -> bool,
{
    state
        .deliveries
        .iter()
        .filter_map(|entry| {
            let delivery = entry.value();
            if predicate(delivery) {
                Some(delivery.clone())
            } else {
                None
            }
        })
        .collect()
}

/// Matching deliveries, oldest first.
pub fn list_deliveries(state: &AppState, filter: &DeliveryFilter) -> Vec<KeyCardDelivery> {
    let mut deliveries = collect_deliveries(state, |delivery| filter.matches(delivery));
    deliveries.sort_by_key(|delivery| (delivery.created_at, delivery.id));
    deliveries
}

pub fn pending_deliveries(state: &AppState) -> Vec<KeyCardDelivery> {
    list_deliveries(
        state,
        &DeliveryFilter {
            status: Some(DeliveryStatus::Pending),
            ..DeliveryFilter::default()
        },
    )
}

pub fn count_on_date(state: &AppState, date: NaiveDate) -> usize {
    state
        .deliveries
        .iter()
        .filter(|entry| scheduled_on(entry.value(), date))
        .count()
}

/// Pending deliveries not yet due, soonest first, capped at [`URGENT_LIMIT`].
pub fn urgent_deliveries(state: &AppState, now: DateTime<Utc>) -> Vec<KeyCardDelivery> {
    let mut deliveries = collect_deliveries(state, |delivery| {
        delivery.status == DeliveryStatus::Pending
            && delivery.delivery_time.is_some_and(|time| time >= now)
    });
    deliveries.sort_by_key(|delivery| (delivery.delivery_time, delivery.id));
    deliveries.truncate(URGENT_LIMIT);
    deliveries
}

/// Unfinished deliveries scheduled on today's date.
pub fn today_deliveries(state: &AppState, now: DateTime<Utc>) -> Vec<KeyCardDelivery> {
    let today = now.date_naive();
    let mut deliveries = collect_deliveries(state, |delivery| {
        !delivery.status.is_finished() && scheduled_on(delivery, today)
    });
    deliveries.sort_by_key(|delivery| (delivery.delivery_time, delivery.id));
    deliveries
}

/// Sum of fees for completed deliveries scheduled within `[start, end]`.
pub fn total_fee_in_period(
    state: &AppState,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Decimal, DomainError> {
    let fees: Vec<Decimal> = state
        .deliveries
        .iter()
        .filter(|entry| {
            let delivery = entry.value();
            delivery.is_completed()
                && delivery
                    .delivery_time
                    .is_some_and(|time| time >= start && time <= end)
        })
        .map(|entry| entry.value().fee)
        .collect();

    money::checked_sum(fees).map(money::pad_money)
}

pub fn staff_by_status(state: &AppState, status: Option<StaffStatus>) -> Vec<DeliveryStaff> {
    let mut staff: Vec<DeliveryStaff> = state
        .staff
        .iter()
        .filter(|entry| status.is_none_or(|status| entry.value().status == status))
        .map(|entry| entry.value().clone())
        .collect();
    staff.sort_by_key(|member| (member.created_at, member.id));
    staff
}

/// Case-insensitive substring match on name or phone.
pub fn search_staff(state: &AppState, needle: &str) -> Vec<DeliveryStaff> {
    let needle = needle.to_lowercase();
    let mut staff: Vec<DeliveryStaff> = state
        .staff
        .iter()
        .filter(|entry| {
            let member = entry.value();
            member.name.to_lowercase().contains(&needle) || member.phone.contains(&needle)
        })
        .map(|entry| entry.value().clone())
        .collect();
    staff.sort_by_key(|member| (member.created_at, member.id));
    staff
}

/// Staff who pass `can_accept_more_work(date)`, least loaded first.
pub fn staff_for_assignment(state: &AppState, date: NaiveDate) -> Vec<DeliveryStaff> {
    let mut staff: Vec<(usize, DeliveryStaff)> = state
        .staff
        .iter()
        .filter(|entry| entry.value().can_accept_more_work(date))
        .map(|entry| {
            let member = entry.value();
            (member.calculate_workload(date), member.clone())
        })
        .collect();
    staff.sort_by_key(|(workload, member)| (*workload, member.created_at, member.id));
    staff.into_iter().map(|(_, member)| member).collect()
}

/// Idle staff whose workload on `date` is below `threshold`, least loaded first.
pub fn low_workload_staff(
    state: &AppState,
    date: NaiveDate,
    threshold: usize,
) -> Vec<DeliveryStaff> {
    let mut staff: Vec<(usize, DeliveryStaff)> = state
        .staff
        .iter()
        .filter_map(|entry| {
            let member = entry.value();
            let workload = member.calculate_workload(date);
            if member.status == StaffStatus::Idle && workload < threshold {
                Some((workload, member.clone()))
            } else {
                None
            }
        })
        .collect();
    staff.sort_by_key(|(workload, member)| (*workload, member.id));
    staff.into_iter().map(|(_, member)| member).collect()
}

pub fn cost_for_delivery(state: &AppState, delivery_id: Uuid) -> Option<DeliveryCost> {
    let cost_id = *state.cost_by_delivery.get(&delivery_id)?;
    state.costs.get(&cost_id).map(|cost| cost.value().clone())
}

pub fn list_costs(state: &AppState, unsettled_only: bool) -> Vec<DeliveryCost> {
    let mut costs: Vec<DeliveryCost> = state
        .costs
        .iter()
        .filter(|entry| !unsettled_only || !entry.value().is_settled())
        .map(|entry| entry.value().clone())
        .collect();
    costs.sort_by_key(|cost| (cost.created_at, cost.id));
    costs
}

pub fn costs_in_range(
    state: &AppState,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<DeliveryCost> {
    let mut costs: Vec<DeliveryCost> = state
        .costs
        .iter()
        .filter(|entry| {
            let created = entry.value().created_at;
            created >= start && created <= end
        })
        .map(|entry| entry.value().clone())
        .collect();
    costs.sort_by_key(|cost| (cost.created_at, cost.id));
    costs
}

pub fn total_cost_in_period(
    state: &AppState,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Decimal, DomainError> {
    let totals = costs_in_range(state, start, end)
        .iter()
        .map(DeliveryCost::total_cost)
        .collect::<Vec<_>>();

    money::checked_sum(totals).map(money::pad_money)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::*;
    use crate::config::Pricing;
    use crate::models::delivery::HotelRef;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap()
    }

    fn add_delivery(
        state: &AppState,
        status: DeliveryStatus,
        offset_hours: i64,
        fee: i64,
    ) -> KeyCardDelivery {
        let mut delivery = KeyCardDelivery::new(base_time() + Duration::seconds(offset_hours));
        delivery.status = status;
        delivery.delivery_time = Some(base_time() + Duration::hours(offset_hours));
        delivery.fee = Decimal::new(fee, 2);
        state.deliveries.insert(delivery.id, delivery.clone());
        delivery
    }

    #[test]
    fn urgent_returns_future_pending_soonest_first() {
        let state = AppState::new(16, Pricing::default());
        let later = add_delivery(&state, DeliveryStatus::Pending, 5, 0);
        let sooner = add_delivery(&state, DeliveryStatus::Pending, 1, 0);
        add_delivery(&state, DeliveryStatus::Pending, -2, 0);
        add_delivery(&state, DeliveryStatus::Assigned, 2, 0);

        let urgent = urgent_deliveries(&state, base_time());
        let ids: Vec<Uuid> = urgent.iter().map(|delivery| delivery.id).collect();
        assert_eq!(ids, vec![sooner.id, later.id]);
    }

    #[test]
    fn urgent_is_capped() {
        let state = AppState::new(16, Pricing::default());
        for hour in 0..25 {
            add_delivery(&state, DeliveryStatus::Pending, hour, 0);
        }
        assert_eq!(urgent_deliveries(&state, base_time()).len(), URGENT_LIMIT);
    }

    #[test]
    fn today_skips_finished_and_other_days() {
        let state = AppState::new(16, Pricing::default());
        add_delivery(&state, DeliveryStatus::Pending, 1, 0);
        add_delivery(&state, DeliveryStatus::InProgress, 2, 0);
        add_delivery(&state, DeliveryStatus::Completed, 3, 0);
        add_delivery(&state, DeliveryStatus::Pending, 30, 0);

        assert_eq!(today_deliveries(&state, base_time()).len(), 2);
        assert_eq!(count_on_date(&state, base_time().date_naive()), 3);
    }

    #[test]
    fn fee_total_counts_completed_in_period() {
        let state = AppState::new(16, Pricing::default());
        add_delivery(&state, DeliveryStatus::Completed, 1, 30000);
        add_delivery(&state, DeliveryStatus::Completed, 2, 15050);
        add_delivery(&state, DeliveryStatus::Cancelled, 2, 99999);
        add_delivery(&state, DeliveryStatus::Completed, 48, 10000);

        let total =
            total_fee_in_period(&state, base_time(), base_time() + Duration::hours(24)).unwrap();
        assert_eq!(total.to_string(), "450.50");

        let empty = total_fee_in_period(
            &state,
            base_time() - Duration::days(10),
            base_time() - Duration::days(9),
        )
        .unwrap();
        assert_eq!(empty.to_string(), "0.00");
    }

    #[test]
    fn fee_total_overflow_is_an_error() {
        let state = AppState::new(16, Pricing::default());
        for offset in [1, 2] {
            let mut delivery = add_delivery(&state, DeliveryStatus::Completed, offset, 0);
            delivery.fee = Decimal::MAX;
            state.deliveries.insert(delivery.id, delivery);
        }

        assert!(matches!(
            total_fee_in_period(&state, base_time(), base_time() + Duration::hours(24)),
            Err(DomainError::InvalidAmount(_))
        ));
    }

    #[test]
    fn filter_by_hotel_and_status() {
        let state = AppState::new(16, Pricing::default());
        let hotel = HotelRef {
            id: Uuid::from_u128(9),
            name: "Lakeside".to_string(),
        };
        let mut at_hotel = add_delivery(&state, DeliveryStatus::Pending, 1, 0);
        at_hotel.hotel = Some(hotel.clone());
        state.deliveries.insert(at_hotel.id, at_hotel.clone());
        add_delivery(&state, DeliveryStatus::Pending, 2, 0);

        let filter = DeliveryFilter {
            hotel_id: Some(hotel.id),
            ..DeliveryFilter::default()
        };
        let found = list_deliveries(&state, &filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, at_hotel.id);

        assert_eq!(pending_deliveries(&state).len(), 2);
    }

    #[test]
    fn assignment_candidates_exclude_busy_and_full_staff() {
        let state = AppState::new(16, Pricing::default());
        let date = base_time().date_naive();

        let free = DeliveryStaff::new("Free", "100", base_time());
        let mut busy = DeliveryStaff::new("Busy", "200", base_time());
        busy.mark_as_busy();
        let mut full = DeliveryStaff::new("Full", "300", base_time());
        full.workload_limit = 1;
        let delivery = add_delivery(&state, DeliveryStatus::Assigned, 1, 0);
        full.add_delivery(&delivery);

        for member in [free.clone(), busy, full.clone()] {
            state.staff.insert(member.id, member);
        }

        let candidates = staff_for_assignment(&state, date);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, free.id);

        let low = low_workload_staff(&state, date, DEFAULT_LOW_WORKLOAD_THRESHOLD);
        let ids: Vec<Uuid> = low.iter().map(|member| member.id).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], free.id);
        assert_eq!(ids[1], full.id);

        assert_eq!(search_staff(&state, "FUL").len(), 1);
        assert_eq!(search_staff(&state, "00").len(), 3);
        assert_eq!(staff_by_status(&state, Some(StaffStatus::Busy)).len(), 1);
    }

    #[test]
    fn cost_queries() {
        let state = AppState::new(16, Pricing::default());
        let delivery_id = Uuid::from_u128(77);

        let mut open = DeliveryCost::new(delivery_id, base_time());
        open.set_base_cost(Decimal::new(1250, 2)).unwrap();
        let mut settled = DeliveryCost::new(Uuid::new_v4(), base_time() + Duration::hours(1));
        settled
            .set_extra_cost(Decimal::new(500, 2))
            .unwrap()
            .mark_as_settled(base_time());
        let old = DeliveryCost::new(Uuid::new_v4(), base_time() - Duration::days(3));

        for cost in [open.clone(), settled, old] {
            state.cost_by_delivery.insert(cost.delivery_id(), cost.id);
            state.costs.insert(cost.id, cost);
        }

        assert_eq!(cost_for_delivery(&state, delivery_id).map(|cost| cost.id), Some(open.id));
        assert!(cost_for_delivery(&state, Uuid::from_u128(78)).is_none());
        assert_eq!(list_costs(&state, true).len(), 2);
        assert_eq!(list_costs(&state, false).len(), 3);
        let total =
            total_cost_in_period(&state, base_time(), base_time() + Duration::days(1)).unwrap();
        assert_eq!(total.to_string(), "17.50");
    }
}
