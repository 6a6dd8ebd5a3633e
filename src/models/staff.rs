use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::delivery::KeyCardDelivery;

pub const DEFAULT_WORKLOAD_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StaffStatus {
    Idle,
    Busy,
    OnLeave,
}

impl StaffStatus {
    pub const ALL: [StaffStatus; 3] = [StaffStatus::Idle, StaffStatus::Busy, StaffStatus::OnLeave];

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffStatus::Idle => "idle",
            StaffStatus::Busy => "busy",
            StaffStatus::OnLeave => "on_leave",
        }
    }

    pub fn can_assign_work(&self) -> bool {
        *self == StaffStatus::Idle
    }
}

impl fmt::Display for StaffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StaffStatus {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        StaffStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| DomainError::InvalidStaffStatus(raw.to_string()))
    }
}

/// Back-reference to a delivery the staff member carries. The delivery itself
/// lives in the delivery store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignedDelivery {
    pub delivery_id: Uuid,
    pub delivery_time: Option<DateTime<Utc>>,
}

impl AssignedDelivery {
    fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        self.delivery_time.is_some_and(|time| time.date_naive() == date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStaff {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub status: StaffStatus,
    pub workload_limit: u32,
    pub deliveries: Vec<AssignedDelivery>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryStaff {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: phone.into(),
            status: StaffStatus::Idle,
            workload_limit: DEFAULT_WORKLOAD_LIMIT,
            deliveries: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Registers the delivery, or refreshes its scheduled time if already held.
    pub fn add_delivery(&mut self, delivery: &KeyCardDelivery) {
        match self
            .deliveries
            .iter_mut()
            .find(|held| held.delivery_id == delivery.id)
        {
            Some(held) => held.delivery_time = delivery.delivery_time,
            None => self.deliveries.push(AssignedDelivery {
                delivery_id: delivery.id,
                delivery_time: delivery.delivery_time,
            }),
        }
    }

    /// Deliveries scheduled on `date` (UTC calendar day). Unscheduled ones never count.
    pub fn calculate_workload(&self, date: NaiveDate) -> usize {
        self.deliveries
            .iter()
            .filter(|held| held.is_scheduled_on(date))
            .count()
    }

    pub fn can_accept_more_work(&self, date: NaiveDate) -> bool {
        self.status.can_assign_work()
            && self.calculate_workload(date) < self.workload_limit as usize
    }

    /// Same rule as `can_accept_more_work`, with `delivery_id` left out of the
    /// count so a held delivery can move to `date`.
    pub fn can_reschedule_to(&self, delivery_id: Uuid, date: NaiveDate) -> bool {
        let others = self
            .deliveries
            .iter()
            .filter(|held| held.delivery_id != delivery_id && held.is_scheduled_on(date))
            .count();

        self.status.can_assign_work() && others < self.workload_limit as usize
    }

    pub fn mark_as_busy(&mut self) {
        self.status = StaffStatus::Busy;
    }

    pub fn mark_as_idle(&mut self) {
        self.status = StaffStatus::Idle;
    }

    pub fn mark_as_on_leave(&mut self) {
        self.status = StaffStatus::OnLeave;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl fmt::Display for DeliveryStaff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::{DeliveryStaff, StaffStatus};
    use crate::error::DomainError;
    use crate::models::delivery::KeyCardDelivery;

    fn staff_with_deliveries(on_day: usize, other_day: usize) -> (DeliveryStaff, NaiveDate) {
        let day = Utc.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap();
        let mut staff = DeliveryStaff::new("Li Wei", "13800000000", day);

        for hour in 0..on_day {
            let mut delivery = KeyCardDelivery::new(day);
            delivery.delivery_time = Some(day + Duration::hours(hour as i64));
            staff.add_delivery(&delivery);
        }
        for _ in 0..other_day {
            let mut delivery = KeyCardDelivery::new(day);
            delivery.delivery_time = Some(day + Duration::days(1));
            staff.add_delivery(&delivery);
        }

        (staff, day.date_naive())
    }

    #[test]
    fn workload_counts_only_same_calendar_day() {
        let (staff, date) = staff_with_deliveries(3, 2);
        assert_eq!(staff.calculate_workload(date), 3);
        assert_eq!(staff.calculate_workload(date.succ_opt().unwrap()), 2);
        assert_eq!(
            staff.calculate_workload(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            0
        );
    }

    #[test]
    fn unscheduled_deliveries_do_not_count() {
        let (mut staff, date) = staff_with_deliveries(1, 0);
        let unscheduled = KeyCardDelivery::new(Utc::now());
        staff.add_delivery(&unscheduled);

        assert_eq!(staff.deliveries.len(), 2);
        assert_eq!(staff.calculate_workload(date), 1);
    }

    #[test]
    fn idle_staff_under_limit_accepts_work() {
        let (staff, date) = staff_with_deliveries(3, 0);
        assert_eq!(staff.workload_limit, 10);
        assert!(staff.can_accept_more_work(date));
    }

    #[test]
    fn busy_or_on_leave_staff_never_accepts_work() {
        let (mut staff, date) = staff_with_deliveries(3, 0);

        staff.mark_as_busy();
        assert!(!staff.can_accept_more_work(date));

        staff.mark_as_on_leave();
        assert!(!staff.can_accept_more_work(date));

        staff.mark_as_idle();
        assert!(staff.can_accept_more_work(date));
    }

    #[test]
    fn limit_is_strict() {
        let (mut staff, date) = staff_with_deliveries(3, 0);
        staff.workload_limit = 3;
        assert!(!staff.can_accept_more_work(date));

        staff.workload_limit = 4;
        assert!(staff.can_accept_more_work(date));
    }

    #[test]
    fn add_delivery_is_idempotent_and_refreshes_time() {
        let day = Utc.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap();
        let mut staff = DeliveryStaff::new("Chen Jing", "13900000000", day);
        let mut delivery = KeyCardDelivery::new(day);
        delivery.delivery_time = Some(day);

        staff.add_delivery(&delivery);
        staff.add_delivery(&delivery);
        assert_eq!(staff.deliveries.len(), 1);

        delivery.delivery_time = Some(day + Duration::days(2));
        staff.add_delivery(&delivery);
        assert_eq!(staff.calculate_workload(day.date_naive()), 0);
        assert_eq!(staff.calculate_workload((day + Duration::days(2)).date_naive()), 1);
    }

    #[test]
    fn reschedule_check_ignores_the_moving_delivery() {
        let (mut staff, date) = staff_with_deliveries(2, 1);
        staff.workload_limit = 2;
        let held_today = staff.deliveries[0].delivery_id;
        let held_tomorrow = staff.deliveries[2].delivery_id;

        assert!(!staff.can_accept_more_work(date));
        assert!(staff.can_reschedule_to(held_today, date));
        assert!(!staff.can_reschedule_to(held_tomorrow, date));

        staff.mark_as_on_leave();
        assert!(!staff.can_reschedule_to(held_today, date));
    }

    #[test]
    fn staff_status_round_trips_wire_names() {
        assert_eq!(StaffStatus::from_str("on_leave"), Ok(StaffStatus::OnLeave));
        assert_eq!(
            StaffStatus::from_str("sick"),
            Err(DomainError::InvalidStaffStatus("sick".to_string()))
        );
        assert!(StaffStatus::Idle.can_assign_work());
        assert!(!StaffStatus::Busy.can_assign_work());
    }
}
