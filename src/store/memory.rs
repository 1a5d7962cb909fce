//! In-memory store for tests, benchmarks and the demo server.
//!
//! Implements [`DocumentStore`] and every collaborator trait on top of
//! tenant-keyed maps behind a `tokio` [`RwLock`]. Write batches above
//! [`DEFAULT_BATCH_LIMIT`] documents are rejected, mirroring the limit of
//! hosted document stores.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    AcceptedOffer, AttendanceRecord, Product, Project, WorkLog, WorkLogKey, WorkOrder,
    WorkOrderSnapshot, WorkOrderTask, Worker,
};

use super::{DocumentStore, MaterialCostProvider, OfferLookup, WorkerDirectory};

/// Largest write batch the store accepts.
pub const DEFAULT_BATCH_LIMIT: usize = 500;

type Key = (String, String);

fn key(tenant: &str, id: &str) -> Key {
    (tenant.to_string(), id.to_string())
}

/// A material used by a product.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialLine {
    /// The material.
    pub material_id: String,
    /// Amount of the material the product uses.
    pub quantity: Decimal,
}

#[derive(Default)]
struct Tables {
    attendance: BTreeMap<Key, AttendanceRecord>,
    work_logs: BTreeMap<(String, WorkLogKey), WorkLog>,
    work_orders: BTreeMap<Key, WorkOrder>,
    tasks: BTreeMap<Key, WorkOrderTask>,
    products: BTreeMap<Key, Product>,
    projects: BTreeMap<Key, Project>,
    snapshots: Vec<WorkOrderSnapshot>,
    workers: BTreeMap<Key, Worker>,
    material_lines: HashMap<Key, Vec<MaterialLine>>,
    material_prices: HashMap<Key, Decimal>,
    offers: Vec<(String, AcceptedOffer)>,
    unreadable_attendance: BTreeSet<String>,
}

/// Tenant-scoped in-memory document store.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    batch_limit: Option<usize>,
    fail_snapshots: AtomicBool,
}

impl InMemoryStore {
    /// Creates an empty store with the default batch limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with a custom batch limit.
    pub fn with_batch_limit(limit: usize) -> Self {
        Self {
            batch_limit: Some(limit),
            ..Self::default()
        }
    }

    fn batch_limit(&self) -> usize {
        self.batch_limit.unwrap_or(DEFAULT_BATCH_LIMIT)
    }

    /// Makes every following snapshot write fail.
    pub fn fail_snapshot_writes(&self, fail: bool) {
        self.fail_snapshots.store(fail, Ordering::SeqCst);
    }

    /// Makes every following attendance read of the worker fail.
    pub async fn fail_attendance_reads_for(&self, worker_id: &str) {
        let mut tables = self.tables.write().await;
        tables.unreadable_attendance.insert(worker_id.to_string());
    }

    /// Adds or replaces a worker in the directory.
    pub async fn insert_worker(&self, worker: Worker) {
        let mut tables = self.tables.write().await;
        tables
            .workers
            .insert(key(&worker.tenant_id, &worker.id), worker);
    }

    /// Sets the material lines of a product.
    pub async fn set_material_lines(&self, tenant: &str, product_id: &str, lines: Vec<MaterialLine>) {
        let mut tables = self.tables.write().await;
        tables.material_lines.insert(key(tenant, product_id), lines);
    }

    /// Sets the current unit price of a material.
    pub async fn set_material_price(&self, tenant: &str, material_id: &str, price: Decimal) {
        let mut tables = self.tables.write().await;
        tables.material_prices.insert(key(tenant, material_id), price);
    }

    /// Records an accepted offer.
    pub async fn insert_offer(&self, tenant: &str, offer: AcceptedOffer) {
        let mut tables = self.tables.write().await;
        tables.offers.push((tenant.to_string(), offer));
    }

    /// Every snapshot written so far.
    pub async fn snapshots(&self) -> Vec<WorkOrderSnapshot> {
        self.tables.read().await.snapshots.clone()
    }

    /// Every work log of a tenant, ordered by key.
    pub async fn all_work_logs(&self, tenant: &str) -> Vec<WorkLog> {
        self.tables
            .read()
            .await
            .work_logs
            .iter()
            .filter(|((t, _), _)| t == tenant)
            .map(|(_, log)| log.clone())
            .collect()
    }
}

fn tenant_values<V: Clone>(map: &BTreeMap<Key, V>, tenant: &str) -> Vec<V> {
    map.iter()
        .filter(|((t, _), _)| t == tenant)
        .map(|(_, v)| v.clone())
        .collect()
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get_attendance(
        &self,
        tenant: &str,
        worker_id: &str,
        date: NaiveDate,
    ) -> EngineResult<Option<AttendanceRecord>> {
        let tables = self.tables.read().await;
        if tables.unreadable_attendance.contains(worker_id) {
            return Err(EngineError::store(format!(
                "attendance of {worker_id} is unavailable"
            )));
        }
        Ok(tables
            .attendance
            .get(&key(tenant, &AttendanceRecord::key(worker_id, date)))
            .cloned())
    }

    async fn upsert_attendance(&self, record: AttendanceRecord) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .attendance
            .insert(key(&record.tenant_id, &record.id), record);
        Ok(())
    }

    async fn upsert_attendance_batch(&self, records: Vec<AttendanceRecord>) -> EngineResult<()> {
        if records.len() > self.batch_limit() {
            return Err(EngineError::store(format!(
                "batch of {} writes exceeds the limit of {}",
                records.len(),
                self.batch_limit()
            )));
        }
        let mut tables = self.tables.write().await;
        debug!(count = records.len(), "Committing attendance batch");
        for record in records {
            tables
                .attendance
                .insert(key(&record.tenant_id, &record.id), record);
        }
        Ok(())
    }

    async fn list_attendance(
        &self,
        tenant: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<AttendanceRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<AttendanceRecord> = tables
            .attendance
            .iter()
            .filter(|((t, _), r)| t == tenant && r.date >= from && r.date <= to)
            .map(|(_, r)| r.clone())
            .collect();
        records.sort_by(|a, b| (a.date, &a.worker_id).cmp(&(b.date, &b.worker_id)));
        Ok(records)
    }

    async fn work_logs_for_worker_date(
        &self,
        tenant: &str,
        worker_id: &str,
        date: NaiveDate,
    ) -> EngineResult<Vec<WorkLog>> {
        let tables = self.tables.read().await;
        Ok(tables
            .work_logs
            .iter()
            .filter(|((t, k), _)| t == tenant && k.worker_id == worker_id && k.date == date)
            .map(|(_, log)| log.clone())
            .collect())
    }

    async fn work_logs_for_task(&self, tenant: &str, task_id: &str) -> EngineResult<Vec<WorkLog>> {
        let tables = self.tables.read().await;
        Ok(tables
            .work_logs
            .iter()
            .filter(|((t, k), _)| t == tenant && k.task_id == task_id)
            .map(|(_, log)| log.clone())
            .collect())
    }

    async fn insert_work_log_if_absent(&self, log: WorkLog) -> EngineResult<bool> {
        let mut tables = self.tables.write().await;
        let entry_key = (log.tenant_id.clone(), log.key());
        if tables.work_logs.contains_key(&entry_key) {
            return Ok(false);
        }
        tables.work_logs.insert(entry_key, log);
        Ok(true)
    }

    async fn upsert_work_log(&self, log: WorkLog) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        tables.work_logs.insert((log.tenant_id.clone(), log.key()), log);
        Ok(())
    }

    async fn delete_work_log(&self, tenant: &str, key: &WorkLogKey) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        tables.work_logs.remove(&(tenant.to_string(), key.clone()));
        Ok(())
    }

    async fn get_work_order(&self, tenant: &str, id: &str) -> EngineResult<Option<WorkOrder>> {
        Ok(self.tables.read().await.work_orders.get(&key(tenant, id)).cloned())
    }

    async fn list_work_orders(&self, tenant: &str) -> EngineResult<Vec<WorkOrder>> {
        Ok(tenant_values(&self.tables.read().await.work_orders, tenant))
    }

    async fn save_work_order(&self, work_order: WorkOrder) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .work_orders
            .insert(key(&work_order.tenant_id, &work_order.id), work_order);
        Ok(())
    }

    async fn get_task(&self, tenant: &str, id: &str) -> EngineResult<Option<WorkOrderTask>> {
        Ok(self.tables.read().await.tasks.get(&key(tenant, id)).cloned())
    }

    async fn tasks_for_work_order(
        &self,
        tenant: &str,
        work_order_id: &str,
    ) -> EngineResult<Vec<WorkOrderTask>> {
        let tables = self.tables.read().await;
        Ok(tenant_values(&tables.tasks, tenant)
            .into_iter()
            .filter(|t| t.work_order_id == work_order_id)
            .collect())
    }

    async fn tasks_for_product(
        &self,
        tenant: &str,
        product_id: &str,
    ) -> EngineResult<Vec<WorkOrderTask>> {
        let tables = self.tables.read().await;
        Ok(tenant_values(&tables.tasks, tenant)
            .into_iter()
            .filter(|t| t.product_id == product_id)
            .collect())
    }

    async fn list_tasks(&self, tenant: &str) -> EngineResult<Vec<WorkOrderTask>> {
        Ok(tenant_values(&self.tables.read().await.tasks, tenant))
    }

    async fn save_task(&self, task: WorkOrderTask) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        tables.tasks.insert(key(&task.tenant_id, &task.id), task);
        Ok(())
    }

    async fn get_product(&self, tenant: &str, id: &str) -> EngineResult<Option<Product>> {
        Ok(self.tables.read().await.products.get(&key(tenant, id)).cloned())
    }

    async fn products_for_project(
        &self,
        tenant: &str,
        project_id: &str,
    ) -> EngineResult<Vec<Product>> {
        let tables = self.tables.read().await;
        Ok(tenant_values(&tables.products, tenant)
            .into_iter()
            .filter(|p| p.project_id == project_id)
            .collect())
    }

    async fn save_product(&self, product: Product) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .products
            .insert(key(&product.tenant_id, &product.id), product);
        Ok(())
    }

    async fn get_project(&self, tenant: &str, id: &str) -> EngineResult<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&key(tenant, id)).cloned())
    }

    async fn list_projects(&self, tenant: &str) -> EngineResult<Vec<Project>> {
        Ok(tenant_values(&self.tables.read().await.projects, tenant))
    }

    async fn save_project(&self, project: Project) -> EngineResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .projects
            .insert(key(&project.tenant_id, &project.id), project);
        Ok(())
    }

    async fn save_snapshot(&self, snapshot: WorkOrderSnapshot) -> EngineResult<()> {
        if self.fail_snapshots.load(Ordering::SeqCst) {
            return Err(EngineError::store("snapshot collection is unavailable"));
        }
        self.tables.write().await.snapshots.push(snapshot);
        Ok(())
    }
}

#[async_trait]
impl WorkerDirectory for InMemoryStore {
    async fn get_worker(&self, tenant: &str, id: &str) -> EngineResult<Option<Worker>> {
        Ok(self.tables.read().await.workers.get(&key(tenant, id)).cloned())
    }

    async fn list_workers(&self, tenant: &str) -> EngineResult<Vec<Worker>> {
        Ok(tenant_values(&self.tables.read().await.workers, tenant))
    }
}

#[async_trait]
impl MaterialCostProvider for InMemoryStore {
    async fn material_cost(&self, tenant: &str, product_id: &str) -> EngineResult<Option<Decimal>> {
        let tables = self.tables.read().await;
        let Some(lines) = tables.material_lines.get(&key(tenant, product_id)) else {
            return Ok(None);
        };
        if lines.is_empty() {
            return Ok(None);
        }
        let total: Decimal = lines
            .iter()
            .map(|line| {
                let price = tables
                    .material_prices
                    .get(&key(tenant, &line.material_id))
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                line.quantity * price
            })
            .sum();
        Ok(Some(total))
    }
}

#[async_trait]
impl OfferLookup for InMemoryStore {
    async fn accepted_offers(
        &self,
        tenant: &str,
        product_id: &str,
    ) -> EngineResult<Vec<AcceptedOffer>> {
        let tables = self.tables.read().await;
        Ok(tables
            .offers
            .iter()
            .filter(|(t, o)| t == tenant && o.product_id == product_id)
            .map(|(_, o)| o.clone())
            .collect())
    }
}
