use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::{DeliveryStatus, KeyCardDelivery};
use crate::models::event::{DeliveryEvent, DeliveryEventKind};
use crate::state::AppState;

pub const DEFAULT_RECEIPT_URL: &str = "/uploads/receipts/default.jpg";
pub const DEFAULT_CANCEL_REASON: &str = "cancelled by operator";

/// Field changes that do not move the lifecycle.
#[derive(Debug, Default, Clone)]
pub struct DeliveryPatch {
    pub room_count: Option<u32>,
    pub delivery_time: Option<DateTime<Utc>>,
    pub remark: Option<String>,
}

pub fn assign_staff(
    state: &AppState,
    delivery_id: Uuid,
    staff_id: Uuid,
) -> Result<KeyCardDelivery, AppError> {
    let now = state.clock.now();

    // Lock order is always deliveries before staff.
    let mut delivery = state
        .deliveries
        .get_mut(&delivery_id)
        .ok_or_else(|| delivery_not_found(delivery_id))?;
    let from = delivery.status;
    check_transition(state, "assign", &delivery, DeliveryStatus::Assigned)?;

    let work_day = delivery.delivery_time.unwrap_or(now).date_naive();
    let mut staff = state
        .staff
        .get_mut(&staff_id)
        .ok_or_else(|| AppError::NotFound(format!("staff {} not found", staff_id)))?;

    if !staff.can_accept_more_work(work_day) {
        state
            .metrics
            .rejected_transitions_total
            .with_label_values(&["assign"])
            .inc();
        warn!(
            delivery_id = %delivery_id,
            staff_id = %staff_id,
            staff_status = %staff.status,
            workload = staff.calculate_workload(work_day),
            limit = staff.workload_limit,
            "staff cannot accept more work"
        );
        return Err(AppError::StaffUnavailable(staff_id));
    }

    delivery.assign_delivery_staff(staff_id);
    delivery.touch(now);
    staff.add_delivery(&delivery);
    staff.touch(now);

    state
        .metrics
        .staff_workload
        .with_label_values(&[&staff_id.to_string()])
        .set(staff.calculate_workload(work_day) as i64);

    let updated = delivery.clone();
    drop(staff);
    drop(delivery);

    record_transition(state, &updated, from, now);
    Ok(updated)
}

pub fn start_delivery(state: &AppState, delivery_id: Uuid) -> Result<KeyCardDelivery, AppError> {
    transition(
        state,
        delivery_id,
        "start",
        DeliveryStatus::InProgress,
        |delivery, _| delivery.mark_as_in_progress(),
    )
}

pub fn complete_delivery(
    state: &AppState,
    delivery_id: Uuid,
    receipt_photo_url: Option<String>,
) -> Result<KeyCardDelivery, AppError> {
    let receipt = receipt_photo_url
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_RECEIPT_URL.to_string());

    transition(
        state,
        delivery_id,
        "complete",
        DeliveryStatus::Completed,
        |delivery, now| delivery.mark_as_completed(receipt, now),
    )
}

pub fn cancel_delivery(
    state: &AppState,
    delivery_id: Uuid,
    reason: Option<String>,
) -> Result<KeyCardDelivery, AppError> {
    let reason = reason
        .filter(|reason| !reason.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());

    transition(
        state,
        delivery_id,
        "cancel",
        DeliveryStatus::Cancelled,
        |delivery, _| delivery.mark_as_cancelled(reason),
    )
}

pub fn report_exception(
    state: &AppState,
    delivery_id: Uuid,
    reason: String,
) -> Result<KeyCardDelivery, AppError> {
    if reason.trim().is_empty() {
        return Err(AppError::BadRequest(
            "exception reason cannot be empty".to_string(),
        ));
    }

    transition(
        state,
        delivery_id,
        "exception",
        DeliveryStatus::Exception,
        |delivery, _| delivery.mark_as_exception(reason),
    )
}

pub fn recalculate_fee(
    state: &AppState,
    delivery_id: Uuid,
    per_card_rate: Option<Decimal>,
) -> Result<KeyCardDelivery, AppError> {
    let now = state.clock.now();
    let rate = per_card_rate.unwrap_or(state.pricing.per_card_fee);

    let mut delivery = state
        .deliveries
        .get_mut(&delivery_id)
        .ok_or_else(|| delivery_not_found(delivery_id))?;
    let fee = delivery.calculate_fee(rate)?;
    delivery.touch(now);
    let updated = delivery.clone();
    drop(delivery);

    info!(
        delivery_id = %delivery_id,
        room_count = updated.room_count,
        rate = %rate,
        fee = %fee,
        "delivery fee calculated"
    );
    state.publish(DeliveryEvent::new(
        delivery_id,
        updated.delivery_staff,
        DeliveryEventKind::FeeCalculated {
            fee: fee.to_string(),
        },
        now,
    ));

    Ok(updated)
}

/// Applies a patch and keeps the assigned staff member's schedule in step.
/// A new schedule must fit the staff member's limit on the new day.
pub fn update_details(
    state: &AppState,
    delivery_id: Uuid,
    patch: DeliveryPatch,
) -> Result<KeyCardDelivery, AppError> {
    let now = state.clock.now();

    let mut delivery = state
        .deliveries
        .get_mut(&delivery_id)
        .ok_or_else(|| delivery_not_found(delivery_id))?;

    let mut staff = match (patch.delivery_time, delivery.delivery_staff) {
        (Some(_), _) if delivery.status.is_finished() => {
            warn!(
                delivery_id = %delivery_id,
                status = %delivery.status,
                "finished delivery cannot be rescheduled"
            );
            return Err(AppError::Conflict(format!(
                "delivery {} is {} and cannot be rescheduled",
                delivery_id, delivery.status
            )));
        }
        (Some(time), Some(staff_id)) => {
            let staff = state
                .staff
                .get_mut(&staff_id)
                .ok_or_else(|| AppError::NotFound(format!("staff {} not found", staff_id)))?;

            if !staff.can_reschedule_to(delivery_id, time.date_naive()) {
                state
                    .metrics
                    .rejected_transitions_total
                    .with_label_values(&["reschedule"])
                    .inc();
                warn!(
                    delivery_id = %delivery_id,
                    staff_id = %staff_id,
                    staff_status = %staff.status,
                    workload = staff.calculate_workload(time.date_naive()),
                    limit = staff.workload_limit,
                    "staff cannot take the rescheduled delivery"
                );
                return Err(AppError::StaffUnavailable(staff_id));
            }
            Some(staff)
        }
        _ => None,
    };

    if let Some(room_count) = patch.room_count {
        delivery.room_count = room_count;
    }
    if let Some(remark) = patch.remark {
        delivery.remark = Some(remark);
    }
    if let Some(time) = patch.delivery_time {
        delivery.delivery_time = Some(time);
    }
    delivery.touch(now);

    if let Some(staff) = staff.as_mut() {
        staff.add_delivery(&delivery);
        staff.touch(now);
    }

    Ok(delivery.clone())
}

fn transition<F>(
    state: &AppState,
    delivery_id: Uuid,
    action: &'static str,
    target: DeliveryStatus,
    apply: F,
) -> Result<KeyCardDelivery, AppError>
where
    F: FnOnce(&mut KeyCardDelivery, DateTime<Utc>),
{
    let now = state.clock.now();

    let mut delivery = state
        .deliveries
        .get_mut(&delivery_id)
        .ok_or_else(|| delivery_not_found(delivery_id))?;
    let from = delivery.status;
    check_transition(state, action, &delivery, target)?;

    apply(&mut delivery, now);
    delivery.touch(now);
    let updated = delivery.clone();
    drop(delivery);

    record_transition(state, &updated, from, now);
    Ok(updated)
}

fn check_transition(
    state: &AppState,
    action: &'static str,
    delivery: &KeyCardDelivery,
    target: DeliveryStatus,
) -> Result<(), AppError> {
    if let Err(err) = delivery.status.attempt_transition(target) {
        state
            .metrics
            .rejected_transitions_total
            .with_label_values(&[action])
            .inc();
        warn!(
            delivery_id = %delivery.id,
            status = %delivery.status,
            action,
            "transition rejected"
        );
        return Err(err.into());
    }

    Ok(())
}

fn record_transition(
    state: &AppState,
    delivery: &KeyCardDelivery,
    from: DeliveryStatus,
    now: DateTime<Utc>,
) {
    state
        .metrics
        .delivery_transitions_total
        .with_label_values(&[delivery.status.as_str()])
        .inc();

    info!(
        delivery_id = %delivery.id,
        from = %from,
        to = %delivery.status,
        staff_id = ?delivery.delivery_staff,
        "delivery status changed"
    );

    state.publish(DeliveryEvent::new(
        delivery.id,
        delivery.delivery_staff,
        DeliveryEventKind::StatusChanged {
            from,
            to: delivery.status,
        },
        now,
    ));
}

pub(crate) fn delivery_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("delivery {} not found", id))
}
