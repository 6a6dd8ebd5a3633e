use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::queries;
use crate::error::AppError;
use crate::models::staff::{DeliveryStaff, StaffStatus, DEFAULT_WORKLOAD_LIMIT};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/staff", post(create_staff).get(list_staff))
        .route("/staff/available", get(available_staff))
        .route("/staff/low-workload", get(low_workload_staff))
        .route("/staff/:id", get(get_staff))
        .route("/staff/:id/status", patch(update_staff_status))
        .route("/staff/:id/workload", get(staff_workload))
}

#[derive(Deserialize)]
pub struct CreateStaffRequest {
    pub name: String,
    pub phone: String,
    pub workload_limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: StaffStatus,
}

#[derive(Deserialize)]
pub struct ListStaffQuery {
    pub status: Option<String>,
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct LowWorkloadQuery {
    pub date: Option<NaiveDate>,
    pub threshold: Option<usize>,
}

#[derive(Serialize)]
pub struct WorkloadResponse {
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub workload: usize,
    pub workload_limit: u32,
    pub can_accept_more_work: bool,
}

async fn create_staff(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateStaffRequest>,
) -> Result<Json<DeliveryStaff>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    if payload.phone.trim().is_empty() {
        return Err(AppError::BadRequest("phone cannot be empty".to_string()));
    }

    let workload_limit = payload.workload_limit.unwrap_or(DEFAULT_WORKLOAD_LIMIT);
    if workload_limit == 0 {
        return Err(AppError::BadRequest("workload_limit must be > 0".to_string()));
    }

    let mut staff = DeliveryStaff::new(payload.name, payload.phone, state.clock.now());
    staff.workload_limit = workload_limit;

    state.staff.insert(staff.id, staff.clone());
    Ok(Json(staff))
}

async fn list_staff(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListStaffQuery>,
) -> Result<Json<Vec<DeliveryStaff>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<StaffStatus>)
        .transpose()?;

    let staff: Vec<DeliveryStaff> = match query.q.as_deref().map(str::trim) {
        Some(needle) if !needle.is_empty() => queries::search_staff(&state, needle)
            .into_iter()
            .filter(|member| status.is_none_or(|status| member.status == status))
            .collect(),
        _ => queries::staff_by_status(&state, status),
    };

    Ok(Json(staff))
}

async fn available_staff(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DateQuery>,
) -> Json<Vec<DeliveryStaff>> {
    let date = query.date.unwrap_or_else(|| state.clock.now().date_naive());
    Json(queries::staff_for_assignment(&state, date))
}

async fn low_workload_staff(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LowWorkloadQuery>,
) -> Json<Vec<DeliveryStaff>> {
    let date = query.date.unwrap_or_else(|| state.clock.now().date_naive());
    let threshold = query
        .threshold
        .unwrap_or(queries::DEFAULT_LOW_WORKLOAD_THRESHOLD);

    Json(queries::low_workload_staff(&state, date, threshold))
}

async fn get_staff(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryStaff>, AppError> {
    let staff = state
        .staff
        .get(&id)
        .ok_or_else(|| staff_not_found(id))?;

    Ok(Json(staff.value().clone()))
}

async fn update_staff_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<DeliveryStaff>, AppError> {
    let mut staff = state
        .staff
        .get_mut(&id)
        .ok_or_else(|| staff_not_found(id))?;

    match payload.status {
        StaffStatus::Idle => staff.mark_as_idle(),
        StaffStatus::Busy => staff.mark_as_busy(),
        StaffStatus::OnLeave => staff.mark_as_on_leave(),
    }
    staff.touch(state.clock.now());

    tracing::info!(staff_id = %id, status = %staff.status, "staff status changed");

    Ok(Json(staff.clone()))
}

async fn staff_workload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<DateQuery>,
) -> Result<Json<WorkloadResponse>, AppError> {
    let date = query.date.unwrap_or_else(|| state.clock.now().date_naive());
    let staff = state
        .staff
        .get(&id)
        .ok_or_else(|| staff_not_found(id))?;

    Ok(Json(WorkloadResponse {
        staff_id: id,
        date,
        workload: staff.calculate_workload(date),
        workload_limit: staff.workload_limit,
        can_accept_more_work: staff.can_accept_more_work(date),
    }))
}

fn staff_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("staff {} not found", id))
}
