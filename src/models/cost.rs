use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::money;

pub const DEFAULT_RATE_PER_KM: f64 = 2.0;

/// Cost record of one delivery. Sub-costs are private so the total can only
/// move through the setters, which re-derive it. A setter that would overflow
/// the total leaves the record untouched.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryCost {
    pub id: Uuid,
    delivery_id: Uuid,
    base_cost: Decimal,
    distance_cost: Decimal,
    urgency_cost: Decimal,
    extra_cost: Decimal,
    total_cost: Decimal,
    distance: f64,
    settled: bool,
    settlement_time: Option<DateTime<Utc>>,
    remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryCost {
    pub fn new(delivery_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            delivery_id,
            base_cost: money::zero(),
            distance_cost: money::zero(),
            urgency_cost: money::zero(),
            extra_cost: money::zero(),
            total_cost: money::zero(),
            distance: 0.0,
            settled: false,
            settlement_time: None,
            remarks: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn delivery_id(&self) -> Uuid {
        self.delivery_id
    }

    pub fn base_cost(&self) -> Decimal {
        self.base_cost
    }

    pub fn set_base_cost(&mut self, value: Decimal) -> Result<&mut Self, DomainError> {
        let mut next = self.sub_costs();
        next.base = value;
        self.commit(next)?;
        Ok(self)
    }

    pub fn distance_cost(&self) -> Decimal {
        self.distance_cost
    }

    pub fn set_distance_cost(&mut self, value: Decimal) -> Result<&mut Self, DomainError> {
        let mut next = self.sub_costs();
        next.distance = value;
        self.commit(next)?;
        Ok(self)
    }

    pub fn urgency_cost(&self) -> Decimal {
        self.urgency_cost
    }

    pub fn set_urgency_cost(&mut self, value: Decimal) -> Result<&mut Self, DomainError> {
        let mut next = self.sub_costs();
        next.urgency = value;
        self.commit(next)?;
        Ok(self)
    }

    pub fn extra_cost(&self) -> Decimal {
        self.extra_cost
    }

    pub fn set_extra_cost(&mut self, value: Decimal) -> Result<&mut Self, DomainError> {
        let mut next = self.sub_costs();
        next.extra = value;
        self.commit(next)?;
        Ok(self)
    }

    pub fn total_cost(&self) -> Decimal {
        self.total_cost
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn set_distance(&mut self, km: f64) -> &mut Self {
        self.distance = km;
        self
    }

    /// `distance_cost := round(distance * rate_per_km, 2)`, then the total follows.
    pub fn calculate_distance_cost(&mut self, rate_per_km: f64) -> Result<Decimal, DomainError> {
        let distance = money::decimal_from_f64(self.distance)?;
        let rate = money::decimal_from_f64(rate_per_km)?;
        let product = distance
            .checked_mul(rate)
            .ok_or_else(|| DomainError::InvalidAmount("distance cost overflow".to_string()))?;

        let mut next = self.sub_costs();
        next.distance = money::round_money(product);
        self.commit(next)?;
        Ok(self.distance_cost)
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn settlement_time(&self) -> Option<DateTime<Utc>> {
        self.settlement_time
    }

    /// Settling stamps `now` only when no settlement time exists yet.
    /// Unsettling clears the settlement time.
    pub fn set_settled(&mut self, settled: bool, now: DateTime<Utc>) -> &mut Self {
        self.settled = settled;
        if settled {
            self.settlement_time.get_or_insert(now);
        } else {
            self.settlement_time = None;
        }
        self
    }

    /// Unlike `set_settled(true, _)` this always restamps the settlement time.
    pub fn mark_as_settled(&mut self, now: DateTime<Utc>) -> &mut Self {
        self.settled = true;
        self.settlement_time = Some(now);
        self
    }

    pub fn remarks(&self) -> Option<&str> {
        self.remarks.as_deref()
    }

    pub fn set_remarks(&mut self, remarks: Option<String>) -> &mut Self {
        self.remarks = remarks;
        self
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn sub_costs(&self) -> SubCosts {
        SubCosts {
            base: self.base_cost,
            distance: self.distance_cost,
            urgency: self.urgency_cost,
            extra: self.extra_cost,
        }
    }

    /// Derives the total first and writes only once it is known to fit.
    fn commit(&mut self, next: SubCosts) -> Result<(), DomainError> {
        let sum = money::checked_sum([next.base, next.distance, next.urgency, next.extra])?;

        self.base_cost = next.base;
        self.distance_cost = next.distance;
        self.urgency_cost = next.urgency;
        self.extra_cost = next.extra;
        self.total_cost = money::round_money(sum);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SubCosts {
    base: Decimal,
    distance: Decimal,
    urgency: Decimal,
    extra: Decimal,
}

impl fmt::Display for DeliveryCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Delivery cost {} - {}", self.id, self.total_cost)
    }
}
