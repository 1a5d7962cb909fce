//! Performance benchmarks for the labor cost engine.
//!
//! Covers the hot paths of the attendance pipeline:
//! - Splitting a daily rate across concurrent tasks
//! - Recording attendance (derivation plus recalculation)
//! - Recalculating a work order as its task count grows
//!
//! Run with: `cargo bench`
//! HTML reports are generated in `target/criterion/`

use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;

use labor_cost_engine::Engine;
use labor_cost_engine::calculation::split_daily_rate;
use labor_cost_engine::config::ConfigLoader;
use labor_cost_engine::models::{
    AttendanceStatus, Decomposition, Product, TaskStatus, WorkOrder, WorkOrderStatus,
    WorkOrderTask, WorkOrderTotals, Worker,
};
use labor_cost_engine::store::{DocumentStore, InMemoryStore, MaterialLine};

const TENANT: &str = "acme";

fn decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn bench_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

/// Creates an engine where worker `w_a` holds `task_count` tasks spread
/// over work orders of four tasks each.
async fn create_engine(task_count: usize) -> Engine {
    let store = Arc::new(InMemoryStore::new());
    let started = Utc.with_ymd_and_hms(2024, 4, 29, 8, 0, 0).unwrap();

    store
        .insert_worker(Worker {
            id: "w_a".to_string(),
            tenant_id: TENANT.to_string(),
            name: "W_A".to_string(),
            daily_rate: decimal("90"),
            role: "joiner".to_string(),
        })
        .await;
    store.set_material_price(TENANT, "oak", decimal("50")).await;

    for i in 0..task_count {
        let work_order_id = format!("wo_{:03}", i / 4);
        let product_id = format!("p_{:03}", i);
        if i % 4 == 0 {
            store
                .save_work_order(WorkOrder {
                    id: work_order_id.clone(),
                    tenant_id: TENANT.to_string(),
                    name: work_order_id.to_uppercase(),
                    kind: "production".to_string(),
                    status: WorkOrderStatus::InProgress,
                    started_at: Some(started),
                    completed_at: None,
                    planned_start: None,
                    planned_end: None,
                    totals: WorkOrderTotals::default(),
                    recalculated_at: None,
                })
                .await
                .unwrap();
        }
        store
            .save_product(Product {
                id: product_id.clone(),
                tenant_id: TENANT.to_string(),
                project_id: "prj_1".to_string(),
                name: product_id.to_uppercase(),
                status: "MaterialsReady".to_string(),
            })
            .await
            .unwrap();
        store
            .set_material_lines(
                TENANT,
                &product_id,
                vec![MaterialLine {
                    material_id: "oak".to_string(),
                    quantity: decimal("2"),
                }],
            )
            .await;
        store
            .save_task(WorkOrderTask {
                id: format!("t_{:03}", i),
                tenant_id: TENANT.to_string(),
                work_order_id,
                product_id,
                project_id: "prj_1".to_string(),
                quantity: 1,
                status: TaskStatus::InProgress,
                started_at: Some(started),
                completed_at: None,
                is_paused: false,
                pause_periods: vec![],
                assigned_workers: vec!["w_a".to_string()],
                decomposition: Decomposition::Whole,
                value: decimal("1000"),
                offer_id: None,
                value_backfill_attempted: false,
                material_cost: Decimal::ZERO,
                material_cost_overridden: false,
                planned_labor_cost: decimal("100"),
                actual_labor_cost: Decimal::ZERO,
                transport_share: Decimal::ZERO,
                services_total: Decimal::ZERO,
                frozen: false,
                frozen_labor_cost: None,
            })
            .await
            .unwrap();
    }

    let config = ConfigLoader::load("./config/furniture")
        .expect("Failed to load config")
        .into_config();
    Engine::in_memory(store, config)
}

/// Benchmark: Splitting a rate across a worker's tasks.
fn bench_split(c: &mut Criterion) {
    let rate = decimal("137.50");
    c.bench_function("split_daily_rate_7", |b| {
        b.iter(|| black_box(split_daily_rate(black_box(rate), 7)))
    });
}

/// Benchmark: Re-recording attendance for a worker on 8 tasks.
///
/// After the first pass every work log exists, so this measures the
/// steady state of derivation plus recalculation of two work orders.
fn bench_record_attendance(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = rt.block_on(create_engine(8));

    c.bench_function("record_attendance_8_tasks", |b| {
        b.to_async(&rt).iter(|| async {
            let receipt = engine
                .record_attendance(TENANT, "w_a", bench_date(), AttendanceStatus::Present, None)
                .await
                .unwrap();
            black_box(receipt)
        })
    });
}

/// Benchmark: Recalculation cost as the number of tasks grows.
fn bench_recalculation_scaling(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("recalculate_all_active");

    for task_count in [4, 16, 64].iter() {
        let engine = rt.block_on(async {
            let engine = create_engine(*task_count).await;
            engine
                .record_attendance(TENANT, "w_a", bench_date(), AttendanceStatus::Present, None)
                .await
                .unwrap();
            engine
        });

        group.throughput(Throughput::Elements(*task_count as u64));
        group.bench_with_input(BenchmarkId::new("tasks", task_count), task_count, |b, _| {
            b.to_async(&rt).iter(|| async {
                let report = engine.recalculate_all_active(TENANT, None).await.unwrap();
                black_box(report)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_split,
    bench_record_attendance,
    bench_recalculation_scaling,
);
criterion_main!(benches);
