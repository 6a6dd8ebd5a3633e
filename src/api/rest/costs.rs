use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::lifecycle::delivery_not_found;
use crate::engine::settlement::{self, cost_not_found};
use crate::engine::queries;
use crate::error::{AppError, DomainError};
use crate::models::cost::DeliveryCost;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/costs", post(create_cost).get(list_costs))
        .route("/costs/:id", get(get_cost).patch(update_cost))
        .route("/costs/:id/settle", post(settle_cost))
        .route("/costs/:id/unsettle", post(unsettle_cost))
        .route("/costs/:id/recalculate-distance", post(recalculate_distance))
}

#[derive(Deserialize, Default)]
pub struct CostFields {
    pub base_cost: Option<Decimal>,
    pub distance_cost: Option<Decimal>,
    pub urgency_cost: Option<Decimal>,
    pub extra_cost: Option<Decimal>,
    pub distance: Option<f64>,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateCostRequest {
    pub delivery_id: Uuid,
    #[serde(flatten)]
    pub fields: CostFields,
}

#[derive(Deserialize)]
pub struct ListCostsQuery {
    pub unsettled: Option<bool>,
    pub delivery_id: Option<Uuid>,
}

#[derive(Deserialize, Default)]
pub struct RecalculateRequest {
    pub rate_per_km: Option<f64>,
}

impl CostFields {
    fn validate(&self) -> Result<(), AppError> {
        let amounts = [
            ("base_cost", self.base_cost),
            ("distance_cost", self.distance_cost),
            ("urgency_cost", self.urgency_cost),
            ("extra_cost", self.extra_cost),
        ];
        for (name, value) in amounts {
            if value.is_some_and(|amount| amount.is_sign_negative() && !amount.is_zero()) {
                return Err(AppError::BadRequest(format!("{name} must be >= 0")));
            }
        }

        if let Some(distance) = self.distance {
            if !distance.is_finite() || distance < 0.0 {
                return Err(AppError::BadRequest("distance must be >= 0".to_string()));
            }
        }

        Ok(())
    }

    fn apply(self, cost: &mut DeliveryCost) -> Result<(), DomainError> {
        if let Some(value) = self.base_cost {
            cost.set_base_cost(value)?;
        }
        if let Some(value) = self.distance_cost {
            cost.set_distance_cost(value)?;
        }
        if let Some(value) = self.urgency_cost {
            cost.set_urgency_cost(value)?;
        }
        if let Some(value) = self.extra_cost {
            cost.set_extra_cost(value)?;
        }
        if let Some(distance) = self.distance {
            cost.set_distance(distance);
        }
        if self.remarks.is_some() {
            cost.set_remarks(self.remarks);
        }
        Ok(())
    }
}

async fn create_cost(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCostRequest>,
) -> Result<Json<DeliveryCost>, AppError> {
    payload.fields.validate()?;

    if !state.deliveries.contains_key(&payload.delivery_id) {
        return Err(delivery_not_found(payload.delivery_id));
    }

    let mut cost = DeliveryCost::new(payload.delivery_id, state.clock.now());
    payload.fields.apply(&mut cost)?;

    settlement::record_cost(&state, cost).map(Json)
}

async fn list_costs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListCostsQuery>,
) -> Json<Vec<DeliveryCost>> {
    if let Some(delivery_id) = query.delivery_id {
        return Json(
            queries::cost_for_delivery(&state, delivery_id)
                .into_iter()
                .collect(),
        );
    }

    Json(queries::list_costs(&state, query.unsettled.unwrap_or(false)))
}

async fn get_cost(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryCost>, AppError> {
    let cost = state.costs.get(&id).ok_or_else(|| cost_not_found(id))?;

    Ok(Json(cost.value().clone()))
}

async fn update_cost(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CostFields>,
) -> Result<Json<DeliveryCost>, AppError> {
    payload.validate()?;

    let mut cost = state.costs.get_mut(&id).ok_or_else(|| cost_not_found(id))?;

    // Fields land together or not at all.
    let mut updated = cost.clone();
    payload.apply(&mut updated)?;
    updated.touch(state.clock.now());
    *cost = updated.clone();

    Ok(Json(updated))
}

async fn settle_cost(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryCost>, AppError> {
    settlement::settle_cost(&state, id).map(Json)
}

async fn unsettle_cost(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryCost>, AppError> {
    settlement::unsettle_cost(&state, id).map(Json)
}

async fn recalculate_distance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RecalculateRequest>>,
) -> Result<Json<DeliveryCost>, AppError> {
    let Json(payload) = payload.unwrap_or_default();
    settlement::recalculate_distance_cost(&state, id, payload.rate_per_km).map(Json)
}
