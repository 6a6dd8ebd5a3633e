use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::lifecycle::{self, DeliveryPatch};
use crate::engine::queries::{self, DeliveryFilter};
use crate::error::AppError;
use crate::models::delivery::{DeliveryStatus, HotelRef, KeyCardDelivery, OrderRef};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery).get(list_deliveries))
        .route("/deliveries/pending", get(pending_deliveries))
        .route("/deliveries/count", get(count_deliveries))
        .route("/deliveries/urgent", get(urgent_deliveries))
        .route("/deliveries/today", get(today_deliveries))
        .route("/deliveries/:id", get(get_delivery).patch(update_delivery))
        .route("/deliveries/:id/assign", post(assign_staff))
        .route("/deliveries/:id/start", post(start_delivery))
        .route("/deliveries/:id/complete", post(complete_delivery))
        .route("/deliveries/:id/cancel", post(cancel_delivery))
        .route("/deliveries/:id/exception", post(report_exception))
        .route("/deliveries/:id/fee", post(calculate_fee))
}

#[derive(Deserialize)]
pub struct CreateDeliveryRequest {
    pub order: OrderRef,
    pub hotel: HotelRef,
    pub room_count: u32,
    pub delivery_time: DateTime<Utc>,
    pub remark: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateDeliveryRequest {
    pub room_count: Option<u32>,
    pub delivery_time: Option<DateTime<Utc>>,
    pub remark: Option<String>,
}

#[derive(Deserialize)]
pub struct ListDeliveriesQuery {
    pub status: Option<String>,
    pub hotel_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct CountQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub staff_id: Uuid,
}

#[derive(Deserialize, Default)]
pub struct CompleteRequest {
    pub receipt_photo_url: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct FeeRequest {
    pub per_card_rate: Option<Decimal>,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<Json<KeyCardDelivery>, AppError> {
    if payload.order.order_no.trim().is_empty() {
        return Err(AppError::BadRequest("order_no cannot be empty".to_string()));
    }

    if payload.hotel.name.trim().is_empty() {
        return Err(AppError::BadRequest("hotel name cannot be empty".to_string()));
    }

    let mut delivery = KeyCardDelivery::new(state.clock.now());
    delivery.order = Some(payload.order);
    delivery.hotel = Some(payload.hotel);
    delivery.room_count = payload.room_count;
    delivery.delivery_time = Some(payload.delivery_time);
    delivery.remark = payload.remark;
    delivery.calculate_fee(state.pricing.per_card_fee)?;

    tracing::info!(
        delivery_id = %delivery.id,
        room_count = delivery.room_count,
        fee = %delivery.fee,
        "delivery created"
    );

    state.deliveries.insert(delivery.id, delivery.clone());
    Ok(Json(delivery))
}

async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<Json<Vec<KeyCardDelivery>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<DeliveryStatus>)
        .transpose()?;

    let filter = DeliveryFilter {
        status,
        hotel_id: query.hotel_id,
        order_id: query.order_id,
        date: query.date,
    };

    Ok(Json(queries::list_deliveries(&state, &filter)))
}

async fn pending_deliveries(State(state): State<Arc<AppState>>) -> Json<Vec<KeyCardDelivery>> {
    Json(queries::pending_deliveries(&state))
}

/// Deliveries scheduled on a day, today when no date is given.
async fn count_deliveries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CountQuery>,
) -> Json<CountResponse> {
    let date = query.date.unwrap_or_else(|| state.clock.now().date_naive());

    Json(CountResponse {
        date,
        count: queries::count_on_date(&state, date),
    })
}

async fn urgent_deliveries(State(state): State<Arc<AppState>>) -> Json<Vec<KeyCardDelivery>> {
    Json(queries::urgent_deliveries(&state, state.clock.now()))
}

async fn today_deliveries(State(state): State<Arc<AppState>>) -> Json<Vec<KeyCardDelivery>> {
    Json(queries::today_deliveries(&state, state.clock.now()))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<KeyCardDelivery>, AppError> {
    let delivery = state
        .deliveries
        .get(&id)
        .ok_or_else(|| lifecycle::delivery_not_found(id))?;

    Ok(Json(delivery.value().clone()))
}

async fn update_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryRequest>,
) -> Result<Json<KeyCardDelivery>, AppError> {
    let patch = DeliveryPatch {
        room_count: payload.room_count,
        delivery_time: payload.delivery_time,
        remark: payload.remark,
    };

    lifecycle::update_details(&state, id, patch).map(Json)
}

async fn assign_staff(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<KeyCardDelivery>, AppError> {
    lifecycle::assign_staff(&state, id, payload.staff_id).map(Json)
}

async fn start_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<KeyCardDelivery>, AppError> {
    lifecycle::start_delivery(&state, id).map(Json)
}

async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<CompleteRequest>>,
) -> Result<Json<KeyCardDelivery>, AppError> {
    let Json(payload) = payload.unwrap_or_default();
    lifecycle::complete_delivery(&state, id, payload.receipt_photo_url).map(Json)
}

async fn cancel_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> Result<Json<KeyCardDelivery>, AppError> {
    let Json(payload) = payload.unwrap_or_default();
    lifecycle::cancel_delivery(&state, id, payload.reason).map(Json)
}

async fn report_exception(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReasonRequest>,
) -> Result<Json<KeyCardDelivery>, AppError> {
    let reason = payload
        .reason
        .ok_or_else(|| AppError::BadRequest("reason is required".to_string()))?;
    lifecycle::report_exception(&state, id, reason).map(Json)
}

async fn calculate_fee(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<FeeRequest>>,
) -> Result<Json<KeyCardDelivery>, AppError> {
    let Json(payload) = payload.unwrap_or_default();

    if payload.per_card_rate.is_some_and(|rate| rate.is_sign_negative()) {
        return Err(AppError::BadRequest("per_card_rate must be >= 0".to_string()));
    }

    lifecycle::recalculate_fee(&state, id, payload.per_card_rate).map(Json)
}
