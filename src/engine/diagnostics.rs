//! Read-only advisory queries.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::debug;

use crate::calculation::{expected_assignments, missing_attendance, profit_warnings};
use crate::error::{EngineError, EngineResult};
use crate::models::Diagnostic;

use super::Engine;

impl Engine {
    /// Warns about workers eligible on an active task who have no
    /// attendance record for the date.
    pub async fn missing_attendance_warnings(
        &self,
        tenant: &str,
        date: NaiveDate,
    ) -> EngineResult<Vec<Diagnostic>> {
        let (work_orders, tasks) = self.candidates_on(tenant, date).await?;
        let expected = expected_assignments(date, &work_orders, &tasks);
        let recorded: BTreeSet<String> = self
            .store
            .list_attendance(tenant, date, date)
            .await?
            .into_iter()
            .map(|r| r.worker_id)
            .collect();

        let warnings = missing_attendance(date, &expected, &recorded);
        debug!(tenant, %date, expected = expected.len(), missing = warnings.len(), "Checked attendance coverage");
        Ok(warnings)
    }

    /// Profit warnings for a work order as last recalculated.
    pub async fn validate_work_order_profit_warnings(
        &self,
        tenant: &str,
        work_order_id: &str,
    ) -> EngineResult<Vec<Diagnostic>> {
        let work_order = self
            .store
            .get_work_order(tenant, work_order_id)
            .await?
            .ok_or_else(|| EngineError::WorkOrderNotFound {
                id: work_order_id.to_string(),
            })?;
        let tasks = self.store.tasks_for_work_order(tenant, work_order_id).await?;
        Ok(profit_warnings(&work_order, &tasks, self.config.diagnostics()))
    }
}
