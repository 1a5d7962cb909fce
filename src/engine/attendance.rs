//! Attendance ledger.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::{AttendanceRecord, AttendanceStatus, DerivationOutcome};

use super::Engine;

/// What happened when an attendance fact was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceReceipt {
    /// Identifier of the (worker, date) record.
    pub record_id: String,
    /// False when an existing record was updated in place.
    pub created: bool,
    /// Work log changes made for the record.
    pub derivation: DerivationOutcome,
    /// Work orders recalculated afterwards.
    pub recalculated: Vec<String>,
    /// Work orders whose recalculation failed and will converge later.
    pub failed_recalculations: Vec<String>,
}

impl Engine {
    /// Upserts a worker's attendance for a date and cascades the change.
    ///
    /// The record write is the only step that can fail the call. Work log
    /// derivation and the recalculation of affected work orders run after
    /// it and are logged when they fail. Passing `None` as `notes` keeps
    /// the notes already stored.
    pub async fn record_attendance(
        &self,
        tenant: &str,
        worker_id: &str,
        date: NaiveDate,
        status: AttendanceStatus,
        notes: Option<String>,
    ) -> EngineResult<AttendanceReceipt> {
        let worker = self
            .workers
            .get_worker(tenant, worker_id)
            .await?
            .ok_or_else(|| EngineError::WorkerNotFound {
                id: worker_id.to_string(),
            })?;

        let existing = self.store.get_attendance(tenant, worker_id, date).await?;
        let created = existing.is_none();
        let notes = notes.or_else(|| existing.and_then(|r| r.notes));
        let record = AttendanceRecord::new(tenant, worker_id, date, status, notes, Utc::now());
        let record_id = record.id.clone();
        self.store.upsert_attendance(record).await?;

        let derivation = match self
            .derive_or_cleanup(tenant, worker_id, date, status, worker.daily_rate)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(tenant, worker_id, %date, error = %e, "Work log derivation failed after attendance write");
                DerivationOutcome::default()
            }
        };

        let (recalculated, failed_recalculations) = self
            .recalculate_affected(tenant, &derivation.affected_work_orders)
            .await;

        info!(
            tenant,
            worker_id,
            %date,
            ?status,
            created,
            recalculated = recalculated.len(),
            failed = failed_recalculations.len(),
            "Recorded attendance"
        );

        Ok(AttendanceReceipt {
            record_id,
            created,
            derivation,
            recalculated,
            failed_recalculations,
        })
    }

    /// Recalculates work orders and splits the ids into succeeded and failed.
    pub(crate) async fn recalculate_affected(
        &self,
        tenant: &str,
        work_order_ids: &BTreeSet<String>,
    ) -> (Vec<String>, Vec<String>) {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (id, result) in self.recalculate_many(tenant, work_order_ids).await {
            match result {
                Ok(_) => succeeded.push(id),
                Err(_) => failed.push(id),
            }
        }
        succeeded.sort();
        failed.sort();
        (succeeded, failed)
    }
}
