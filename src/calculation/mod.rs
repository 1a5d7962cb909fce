//! Pure calculation logic for the labor cost engine.
//!
//! Nothing in this module touches the store. Each function takes the data
//! it needs and returns a decision, so the engine can drive the pipeline
//! (eligibility, rate splitting, cost decisions, profit, derived statuses
//! and diagnostics) and handle persistence separately.

mod costing;
pub mod diagnostics;
mod eligibility;
mod profit;
mod split;
mod status;

pub use costing::{
    CostDecision, FreezeAction, backfill_value, freeze_action, needs_value_backfill,
    resolve_labor_cost, resolve_material_cost, select_offer,
};
pub use diagnostics::{missing_attendance, profit_warnings};
pub use eligibility::{
    EligibleAssignment, expected_assignments, find_eligible_assignments, stale_logs,
    work_orders_active_on,
};
pub use profit::{TaskFigures, calculate_totals, derive_work_order_status, profit_margin};
pub use split::{reconcile_split, split_daily_rate};
pub use status::{
    ProductStanding, StatusDecision, decide_advance, derive_product_status,
    derive_project_status, highest_ranked, is_product_complete,
};
