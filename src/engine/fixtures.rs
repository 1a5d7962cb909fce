//! Shared test fixtures for engine tests.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::config::{ConfigLoader, EngineConfig};
use crate::models::{
    AcceptedOffer, Decomposition, Product, Project, TaskStatus, WorkOrder, WorkOrderStatus,
    WorkOrderTask, WorkOrderTotals, Worker,
};
use crate::store::{DocumentStore, InMemoryStore, MaterialLine};

use super::Engine;

pub(crate) fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub(crate) fn at(m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, m, d, h, 0, 0).unwrap()
}

pub(crate) fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

pub(crate) fn config() -> EngineConfig {
    ConfigLoader::load("./config/furniture").unwrap().into_config()
}

pub(crate) fn work_order(id: &str, kind: &str, started: DateTime<Utc>) -> WorkOrder {
    WorkOrder {
        id: id.to_string(),
        tenant_id: "acme".to_string(),
        name: id.to_uppercase(),
        kind: kind.to_string(),
        status: WorkOrderStatus::InProgress,
        started_at: Some(started),
        completed_at: None,
        planned_start: None,
        planned_end: None,
        totals: WorkOrderTotals::default(),
        recalculated_at: None,
    }
}

pub(crate) fn task(id: &str, work_order_id: &str, product_id: &str, workers: &[&str]) -> WorkOrderTask {
    WorkOrderTask {
        id: id.to_string(),
        tenant_id: "acme".to_string(),
        work_order_id: work_order_id.to_string(),
        product_id: product_id.to_string(),
        project_id: "prj_1".to_string(),
        quantity: 2,
        status: TaskStatus::InProgress,
        started_at: Some(at(4, 29, 8)),
        completed_at: None,
        is_paused: false,
        pause_periods: vec![],
        assigned_workers: workers.iter().map(|w| w.to_string()).collect(),
        decomposition: Decomposition::Whole,
        value: dec("1000"),
        offer_id: None,
        value_backfill_attempted: false,
        material_cost: Decimal::ZERO,
        material_cost_overridden: false,
        planned_labor_cost: dec("100"),
        actual_labor_cost: Decimal::ZERO,
        transport_share: Decimal::ZERO,
        services_total: Decimal::ZERO,
        frozen: false,
        frozen_labor_cost: None,
    }
}

/// An engine over an in-memory store seeded with a small workshop.
///
/// Worker `w_a` (rate 90) is assigned to `t_1` and `t_2` on work order
/// `wo_1` and to `t_3` on `wo_2`, all in progress since late April 2024.
/// Worker `w_b` (rate 120) shares `t_1`. Every product belongs to the
/// approved project `prj_1`.
pub(crate) struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub engine: Engine,
}

impl Fixture {
    pub async fn scenario() -> Self {
        Self::with_config(config()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        crate::logging::init_test();
        let store = Arc::new(InMemoryStore::new());

        for (id, rate) in [("w_a", "90"), ("w_b", "120"), ("w_z", "80")] {
            store
                .insert_worker(Worker {
                    id: id.to_string(),
                    tenant_id: "acme".to_string(),
                    name: id.to_uppercase(),
                    daily_rate: dec(rate),
                    role: "joiner".to_string(),
                })
                .await;
        }

        store
            .save_project(Project {
                id: "prj_1".to_string(),
                tenant_id: "acme".to_string(),
                name: "Kitchen".to_string(),
                status: "Approved".to_string(),
            })
            .await
            .unwrap();
        for product in ["p_1", "p_2", "p_3"] {
            store
                .save_product(Product {
                    id: product.to_string(),
                    tenant_id: "acme".to_string(),
                    project_id: "prj_1".to_string(),
                    name: product.to_uppercase(),
                    status: "MaterialsReady".to_string(),
                })
                .await
                .unwrap();
            store
                .set_material_lines(
                    "acme",
                    product,
                    vec![MaterialLine {
                        material_id: "oak".to_string(),
                        quantity: dec("2"),
                    }],
                )
                .await;
        }
        store.set_material_price("acme", "oak", dec("50")).await;

        store
            .save_work_order(work_order("wo_1", "production", at(4, 29, 7)))
            .await
            .unwrap();
        store
            .save_work_order(work_order("wo_2", "production", at(4, 30, 7)))
            .await
            .unwrap();
        store
            .save_task(task("t_1", "wo_1", "p_1", &["w_a", "w_b"]))
            .await
            .unwrap();
        store
            .save_task(task("t_2", "wo_1", "p_2", &["w_a"]))
            .await
            .unwrap();
        store
            .save_task(task("t_3", "wo_2", "p_3", &["w_a"]))
            .await
            .unwrap();

        let engine = Engine::in_memory(store.clone(), config);
        Self { store, engine }
    }

    pub async fn task(&self, id: &str) -> WorkOrderTask {
        self.store.get_task("acme", id).await.unwrap().unwrap()
    }

    pub async fn store_task(&self, task: WorkOrderTask) {
        self.store.save_task(task).await.unwrap();
    }

    pub async fn work_order(&self, id: &str) -> WorkOrder {
        self.store.get_work_order("acme", id).await.unwrap().unwrap()
    }

    pub async fn store_work_order(&self, work_order: WorkOrder) {
        self.store.save_work_order(work_order).await.unwrap();
    }

    pub async fn product(&self, id: &str) -> Product {
        self.store.get_product("acme", id).await.unwrap().unwrap()
    }

    pub async fn project(&self, id: &str) -> Project {
        self.store.get_project("acme", id).await.unwrap().unwrap()
    }

    pub async fn add_offer(&self, offer_id: &str, product_id: &str, price: &str, day: u32) {
        self.store
            .insert_offer(
                "acme",
                AcceptedOffer {
                    offer_id: offer_id.to_string(),
                    product_id: product_id.to_string(),
                    price: dec(price),
                    accepted_at: at(4, day, 12),
                },
            )
            .await;
    }
}
