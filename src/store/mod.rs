//! Persistence and collaborator interfaces.
//!
//! The engine never talks to a concrete database. It works through
//! [`DocumentStore`] for its own documents and through three read-only
//! collaborator traits for data owned by other parts of the system:
//! [`WorkerDirectory`], [`MaterialCostProvider`] and [`OfferLookup`].
//!
//! The store offers no cross-document transactions. Every write is a
//! single-document upsert or delete keyed by a natural key, which is what
//! lets the engine re-run any stage safely.
//!
//! All operations are tenant-scoped.

mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::EngineResult;
use crate::models::{
    AcceptedOffer, AttendanceRecord, Product, Project, WorkLog, WorkLogKey, WorkOrder,
    WorkOrderSnapshot, WorkOrderTask, Worker,
};

pub use memory::{DEFAULT_BATCH_LIMIT, InMemoryStore, MaterialLine};

/// Document storage used by the engine.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches the attendance record of a worker on a date.
    async fn get_attendance(
        &self,
        tenant: &str,
        worker_id: &str,
        date: NaiveDate,
    ) -> EngineResult<Option<AttendanceRecord>>;

    /// Inserts or replaces an attendance record by its (worker, date) key.
    async fn upsert_attendance(&self, record: AttendanceRecord) -> EngineResult<()>;

    /// Writes a group of attendance records in one batch.
    ///
    /// Implementations may reject batches above their write limit.
    async fn upsert_attendance_batch(&self, records: Vec<AttendanceRecord>) -> EngineResult<()>;

    /// Lists attendance records with `from <= date <= to`, ordered by date.
    async fn list_attendance(
        &self,
        tenant: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<AttendanceRecord>>;

    /// Work logs of one worker on one date.
    async fn work_logs_for_worker_date(
        &self,
        tenant: &str,
        worker_id: &str,
        date: NaiveDate,
    ) -> EngineResult<Vec<WorkLog>>;

    /// Work logs referencing a task.
    async fn work_logs_for_task(&self, tenant: &str, task_id: &str) -> EngineResult<Vec<WorkLog>>;

    /// Inserts a work log unless one exists for its key.
    ///
    /// Returns true if the log was created.
    async fn insert_work_log_if_absent(&self, log: WorkLog) -> EngineResult<bool>;

    /// Inserts or replaces a work log by its key.
    async fn upsert_work_log(&self, log: WorkLog) -> EngineResult<()>;

    /// Deletes a work log. Deleting a missing log is not an error.
    async fn delete_work_log(&self, tenant: &str, key: &WorkLogKey) -> EngineResult<()>;

    /// Fetches a work order.
    async fn get_work_order(&self, tenant: &str, id: &str) -> EngineResult<Option<WorkOrder>>;

    /// Lists every work order of a tenant.
    async fn list_work_orders(&self, tenant: &str) -> EngineResult<Vec<WorkOrder>>;

    /// Writes a work order.
    async fn save_work_order(&self, work_order: WorkOrder) -> EngineResult<()>;

    /// Fetches a task.
    async fn get_task(&self, tenant: &str, id: &str) -> EngineResult<Option<WorkOrderTask>>;

    /// Tasks of a work order, ordered by id.
    async fn tasks_for_work_order(
        &self,
        tenant: &str,
        work_order_id: &str,
    ) -> EngineResult<Vec<WorkOrderTask>>;

    /// Tasks producing a product, ordered by id.
    async fn tasks_for_product(
        &self,
        tenant: &str,
        product_id: &str,
    ) -> EngineResult<Vec<WorkOrderTask>>;

    /// Every task of a tenant, ordered by id.
    async fn list_tasks(&self, tenant: &str) -> EngineResult<Vec<WorkOrderTask>>;

    /// Writes a task.
    async fn save_task(&self, task: WorkOrderTask) -> EngineResult<()>;

    /// Fetches a product.
    async fn get_product(&self, tenant: &str, id: &str) -> EngineResult<Option<Product>>;

    /// Products of a project, ordered by id.
    async fn products_for_project(
        &self,
        tenant: &str,
        project_id: &str,
    ) -> EngineResult<Vec<Product>>;

    /// Writes a product.
    async fn save_product(&self, product: Product) -> EngineResult<()>;

    /// Fetches a project.
    async fn get_project(&self, tenant: &str, id: &str) -> EngineResult<Option<Project>>;

    /// Lists every project of a tenant.
    async fn list_projects(&self, tenant: &str) -> EngineResult<Vec<Project>>;

    /// Writes a project.
    async fn save_project(&self, project: Project) -> EngineResult<()>;

    /// Persists a completion snapshot.
    async fn save_snapshot(&self, snapshot: WorkOrderSnapshot) -> EngineResult<()>;
}

/// Directory of workers and their daily rates.
#[async_trait]
pub trait WorkerDirectory: Send + Sync {
    /// Fetches a worker.
    async fn get_worker(&self, tenant: &str, id: &str) -> EngineResult<Option<Worker>>;

    /// Lists every worker of a tenant.
    async fn list_workers(&self, tenant: &str) -> EngineResult<Vec<Worker>>;
}

/// Current material costs of products.
#[async_trait]
pub trait MaterialCostProvider: Send + Sync {
    /// Sum of the product's material lines at current prices, `None` if the
    /// product has no material lines.
    async fn material_cost(&self, tenant: &str, product_id: &str) -> EngineResult<Option<Decimal>>;
}

/// Accepted pricing offers.
#[async_trait]
pub trait OfferLookup: Send + Sync {
    /// Accepted offers pricing the product.
    async fn accepted_offers(
        &self,
        tenant: &str,
        product_id: &str,
    ) -> EngineResult<Vec<AcceptedOffer>>;
}
