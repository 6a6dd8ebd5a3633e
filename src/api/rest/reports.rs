use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::queries;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reports/fees", get(fee_report))
        .route("/reports/costs", get(cost_report))
}

#[derive(Deserialize)]
pub struct PeriodQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PeriodQuery {
    fn check(&self) -> Result<(), AppError> {
        if self.end < self.start {
            return Err(AppError::BadRequest("end must not be before start".to_string()));
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct PeriodTotal {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total: Decimal,
}

/// Fees of deliveries completed and scheduled within the period.
async fn fee_report(
    State(state): State<Arc<AppState>>,
    Query(period): Query<PeriodQuery>,
) -> Result<Json<PeriodTotal>, AppError> {
    period.check()?;
    let total = queries::total_fee_in_period(&state, period.start, period.end)?;

    Ok(Json(PeriodTotal {
        start: period.start,
        end: period.end,
        total,
    }))
}

/// Total cost of cost records created within the period.
async fn cost_report(
    State(state): State<Arc<AppState>>,
    Query(period): Query<PeriodQuery>,
) -> Result<Json<PeriodTotal>, AppError> {
    period.check()?;
    let total = queries::total_cost_in_period(&state, period.start, period.end)?;

    Ok(Json(PeriodTotal {
        start: period.start,
        end: period.end,
        total,
    }))
}
