//! Attendance records and statuses.
//!
//! One record exists per worker per calendar date. The record identifier is
//! derived from that natural key so repeated submissions land on the same
//! document.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A worker's status for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Worked in the workshop.
    Present,
    /// Worked on site (installation, measuring).
    Field,
    /// Did not work.
    Absent,
    /// On sick leave.
    Sick,
    /// On vacation.
    Vacation,
    /// Weekend day.
    Weekend,
}

impl AttendanceStatus {
    /// Returns true if the status earns labor cost.
    ///
    /// # Examples
    ///
    /// ```
    /// use labor_cost_engine::models::AttendanceStatus;
    ///
    /// assert!(AttendanceStatus::Field.is_working());
    /// assert!(!AttendanceStatus::Sick.is_working());
    /// ```
    pub fn is_working(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Field)
    }
}

/// A worker's recorded status on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Identifier derived from (worker, date).
    pub id: String,
    /// The tenant the record belongs to.
    pub tenant_id: String,
    /// The worker the record is about.
    pub worker_id: String,
    /// The calendar date.
    pub date: NaiveDate,
    /// The worker's status on that date.
    pub status: AttendanceStatus,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Builds the natural-key identifier for a worker and date.
    ///
    /// ```
    /// use labor_cost_engine::models::AttendanceRecord;
    /// use chrono::NaiveDate;
    ///
    /// let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    /// assert_eq!(AttendanceRecord::key("w_001", date), "w_001_2024-05-01");
    /// ```
    pub fn key(worker_id: &str, date: NaiveDate) -> String {
        format!("{}_{}", worker_id, date.format("%Y-%m-%d"))
    }

    /// Creates a new record for the given key fields.
    pub fn new(
        tenant_id: &str,
        worker_id: &str,
        date: NaiveDate,
        status: AttendanceStatus,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::key(worker_id, date),
            tenant_id: tenant_id.to_string(),
            worker_id: worker_id.to_string(),
            date,
            status,
            notes,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_working_statuses() {
        assert!(AttendanceStatus::Present.is_working());
        assert!(AttendanceStatus::Field.is_working());
        for status in [
            AttendanceStatus::Absent,
            AttendanceStatus::Sick,
            AttendanceStatus::Vacation,
            AttendanceStatus::Weekend,
        ] {
            assert!(!status.is_working(), "{:?} must not earn labor", status);
        }
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&AttendanceStatus::Present).unwrap(),
            "\"present\""
        );
        let status: AttendanceStatus = serde_json::from_str("\"vacation\"").unwrap();
        assert_eq!(status, AttendanceStatus::Vacation);
    }

    #[test]
    fn test_same_worker_and_date_share_identifier() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let now = Utc::now();
        let first = AttendanceRecord::new("acme", "w_1", date, AttendanceStatus::Present, None, now);
        let second = AttendanceRecord::new("acme", "w_1", date, AttendanceStatus::Sick, None, now);
        assert_eq!(first.id, second.id);
    }
}
