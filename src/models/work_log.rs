//! Derived labor cost entries.
//!
//! A [`WorkLog`] asserts that a worker earned a share of their daily rate on
//! a date for one task. Work logs are only written by the derivation stage
//! and are the single source of truth for actual labor cost.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Composite identity of a work log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkLogKey {
    /// The worker who earned the cost.
    pub worker_id: String,
    /// The task the cost is charged to.
    pub task_id: String,
    /// The calendar date.
    pub date: NaiveDate,
}

impl WorkLogKey {
    /// Renders the key as a document identifier.
    ///
    /// ```
    /// use labor_cost_engine::models::WorkLogKey;
    /// use chrono::NaiveDate;
    ///
    /// let key = WorkLogKey {
    ///     worker_id: "w_1".to_string(),
    ///     task_id: "t_7".to_string(),
    ///     date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
    /// };
    /// assert_eq!(key.document_id(), "w_1_t_7_2024-05-01");
    /// ```
    pub fn document_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.worker_id,
            self.task_id,
            self.date.format("%Y-%m-%d")
        )
    }
}

/// Labor cost earned by one worker on one date for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkLog {
    /// The tenant the entry belongs to.
    pub tenant_id: String,
    /// The worker who earned the cost.
    pub worker_id: String,
    /// The task the cost is charged to.
    pub task_id: String,
    /// The work order containing the task.
    pub work_order_id: String,
    /// The calendar date.
    pub date: NaiveDate,
    /// The split portion of the worker's daily rate.
    pub daily_rate: Decimal,
    /// The worker's full daily rate at derivation time.
    pub original_daily_rate: Decimal,
    /// How many concurrent assignments the rate was divided across.
    pub split_factor: u32,
    /// When the entry was first derived.
    pub created_at: DateTime<Utc>,
    /// When the entry was last rewritten.
    pub updated_at: DateTime<Utc>,
}

impl WorkLog {
    /// Returns the composite key of this entry.
    pub fn key(&self) -> WorkLogKey {
        WorkLogKey {
            worker_id: self.worker_id.clone(),
            task_id: self.task_id.clone(),
            date: self.date,
        }
    }
}
