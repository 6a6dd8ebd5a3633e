use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::money;

/// `100.00` per key card.
pub fn default_per_card_fee() -> Decimal {
    Decimal::new(10_000, 2)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
    Exception,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 6] = [
        DeliveryStatus::Pending,
        DeliveryStatus::Assigned,
        DeliveryStatus::InProgress,
        DeliveryStatus::Completed,
        DeliveryStatus::Cancelled,
        DeliveryStatus::Exception,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::InProgress => "in_progress",
            DeliveryStatus::Completed => "completed",
            DeliveryStatus::Cancelled => "cancelled",
            DeliveryStatus::Exception => "exception",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Completed | DeliveryStatus::Cancelled | DeliveryStatus::Exception
        )
    }

    pub fn can_change_to_complete(&self) -> bool {
        *self == DeliveryStatus::InProgress
    }

    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Pending | DeliveryStatus::Assigned | DeliveryStatus::InProgress
        )
    }

    /// Checked move along the lifecycle graph. Self-transitions are rejected.
    pub fn attempt_transition(self, target: DeliveryStatus) -> Result<DeliveryStatus, DomainError> {
        let allowed = match target {
            DeliveryStatus::Pending => false,
            DeliveryStatus::Assigned => self == DeliveryStatus::Pending,
            DeliveryStatus::InProgress => {
                matches!(self, DeliveryStatus::Pending | DeliveryStatus::Assigned)
            }
            DeliveryStatus::Completed => self.can_change_to_complete(),
            DeliveryStatus::Cancelled => self.can_cancel(),
            DeliveryStatus::Exception => !self.is_finished(),
        };

        if allowed {
            Ok(target)
        } else {
            Err(DomainError::InvalidTransition {
                from: self,
                to: target,
            })
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        DeliveryStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| DomainError::InvalidStatus(raw.to_string()))
    }
}

/// Order owned by another system; only displayed here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRef {
    pub id: Uuid,
    pub order_no: String,
}

/// Hotel owned by another system; only displayed here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HotelRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyCardDelivery {
    pub id: Uuid,
    pub order: Option<OrderRef>,
    pub hotel: Option<HotelRef>,
    pub room_count: u32,
    pub delivery_time: Option<DateTime<Utc>>,
    pub delivery_staff: Option<Uuid>,
    pub status: DeliveryStatus,
    pub fee: Decimal,
    pub receipt_photo_url: Option<String>,
    pub completed_time: Option<DateTime<Utc>>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KeyCardDelivery {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order: None,
            hotel: None,
            room_count: 0,
            delivery_time: None,
            delivery_staff: None,
            status: DeliveryStatus::Pending,
            fee: money::zero(),
            receipt_photo_url: None,
            completed_time: None,
            remark: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn assign_delivery_staff(&mut self, staff_id: Uuid) {
        self.delivery_staff = Some(staff_id);
        self.status = DeliveryStatus::Assigned;
    }

    pub fn mark_as_in_progress(&mut self) {
        self.status = DeliveryStatus::InProgress;
    }

    pub fn mark_as_completed(&mut self, receipt_photo_url: impl Into<String>, now: DateTime<Utc>) {
        self.status = DeliveryStatus::Completed;
        self.receipt_photo_url = Some(receipt_photo_url.into());
        self.completed_time = Some(now);
    }

    pub fn mark_as_cancelled(&mut self, reason: impl Into<String>) {
        self.status = DeliveryStatus::Cancelled;
        self.remark = Some(reason.into());
    }

    pub fn mark_as_exception(&mut self, reason: impl Into<String>) {
        self.status = DeliveryStatus::Exception;
        self.remark = Some(reason.into());
    }

    /// Overwrites the fee with `room_count * per_card_rate`. On overflow the
    /// previous fee stays.
    pub fn calculate_fee(&mut self, per_card_rate: Decimal) -> Result<Decimal, DomainError> {
        let fee = Decimal::from(self.room_count)
            .checked_mul(per_card_rate)
            .ok_or_else(|| DomainError::InvalidAmount("delivery fee overflow".to_string()))?;

        self.fee = money::pad_money(fee);
        Ok(self.fee)
    }

    pub fn can_start_delivery(&self) -> bool {
        self.status == DeliveryStatus::Pending
    }

    pub fn can_assign_staff(&self) -> bool {
        self.status == DeliveryStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == DeliveryStatus::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == DeliveryStatus::Cancelled
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl fmt::Display for KeyCardDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order_no = self.order.as_ref().map_or("Unknown", |order| order.order_no.as_str());
        let hotel_name = self.hotel.as_ref().map_or("Unknown", |hotel| hotel.name.as_str());
        write!(f, "Key-card delivery: {order_no} - {hotel_name}")
    }
}
