//! The labor cost engine.
//!
//! [`Engine`] drives the pipeline
//!
//! ```text
//! attendance -> work logs -> work order recalculation -> product/project status
//! ```
//!
//! Each stage returns the identifiers the next stage needs. Stages after the
//! primary write are best effort: their failures are logged and the
//! pipeline continues, relying on the next run (or a reconciliation job) to
//! converge.

mod aggregation;
mod attendance;
mod derivation;
mod diagnostics;
mod jobs;
mod locks;
mod propagation;
mod tasks;

#[cfg(test)]
pub(crate) mod fixtures;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::warn;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{AttendanceRecord, DerivationOutcome, RecalculationResult};
use crate::store::{DocumentStore, InMemoryStore, MaterialCostProvider, OfferLookup, WorkerDirectory};

pub use attendance::AttendanceReceipt;
pub use jobs::{JobFailure, JobProgress, JobReport, ProgressFn, RepairReport, StartupSyncReport};
pub use tasks::TaskMutationResult;

use locks::WorkOrderLocks;

/// Orchestrates derivation, aggregation and propagation over a store.
pub struct Engine {
    store: Arc<dyn DocumentStore>,
    workers: Arc<dyn WorkerDirectory>,
    materials: Arc<dyn MaterialCostProvider>,
    offers: Arc<dyn OfferLookup>,
    config: Arc<EngineConfig>,
    locks: WorkOrderLocks,
}

impl Engine {
    /// Creates an engine over the given store and collaborators.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        workers: Arc<dyn WorkerDirectory>,
        materials: Arc<dyn MaterialCostProvider>,
        offers: Arc<dyn OfferLookup>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            workers,
            materials,
            offers,
            config: Arc::new(config),
            locks: WorkOrderLocks::default(),
        }
    }

    /// Creates an engine where one in-memory store plays every role.
    pub fn in_memory(store: Arc<InMemoryStore>, config: EngineConfig) -> Self {
        Self::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            config,
        )
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Recalculates several work orders with bounded parallelism.
    ///
    /// Failures are logged and reported; they never stop the others.
    async fn recalculate_many(
        &self,
        tenant: &str,
        work_order_ids: &BTreeSet<String>,
    ) -> Vec<(String, EngineResult<RecalculationResult>)> {
        let parallelism = self.config.jobs().max_parallel_recalculations.max(1);
        stream::iter(work_order_ids.iter().cloned())
            .map(|id| async move {
                let result = self.recalculate_work_order(tenant, &id).await;
                if let Err(e) = &result {
                    warn!(tenant, work_order_id = %id, error = %e, "Recalculation failed");
                }
                (id, result)
            })
            .buffer_unordered(parallelism)
            .collect()
            .await
    }

    /// Re-runs derivation for every stored attendance record of the given
    /// workers in a date range.
    ///
    /// Used after task mutations that change eligibility. Work orders are
    /// not recalculated here; the affected set is returned instead.
    async fn rederive(
        &self,
        tenant: &str,
        workers: &BTreeSet<String>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DerivationOutcome {
        let mut outcome = DerivationOutcome::default();
        if workers.is_empty() || from > to {
            return outcome;
        }

        let records = match self.store.list_attendance(tenant, from, to).await {
            Ok(records) => records,
            Err(e) => {
                warn!(tenant, error = %e, "Could not read attendance for re-derivation");
                return outcome;
            }
        };

        let relevant: Vec<AttendanceRecord> = records
            .into_iter()
            .filter(|r| workers.contains(&r.worker_id))
            .collect();
        for record in relevant {
            match self.derive_for_record(tenant, &record).await {
                Ok(result) => outcome.merge(result),
                Err(e) => warn!(
                    tenant,
                    worker_id = %record.worker_id,
                    date = %record.date,
                    error = %e,
                    "Re-derivation failed"
                ),
            }
        }
        outcome
    }

    /// Derives work logs for an existing attendance record using the
    /// worker's current daily rate.
    async fn derive_for_record(
        &self,
        tenant: &str,
        record: &AttendanceRecord,
    ) -> EngineResult<DerivationOutcome> {
        let worker = self
            .workers
            .get_worker(tenant, &record.worker_id)
            .await?
            .ok_or_else(|| EngineError::WorkerNotFound {
                id: record.worker_id.clone(),
            })?;
        self.derive_or_cleanup(tenant, &worker.id, record.date, record.status, worker.daily_rate)
            .await
    }
}
