//! Per-task cost decisions.
//!
//! Each function decides one cost figure of a task and records why in an
//! [`AuditStep`]. Frozen tasks keep their stored figures; everything else is
//! recomputed from the current source data.

use rust_decimal::Decimal;

use crate::config::OfferBackfillPolicy;
use crate::models::{AcceptedOffer, AuditStep, TaskStatus, WorkOrderTask};

/// A decided cost figure with the audit step explaining it.
#[derive(Debug, Clone)]
pub struct CostDecision {
    /// The decided amount.
    pub amount: Decimal,
    /// Whether the amount differs from what the task stores.
    pub changed: bool,
    /// The audit step recording the decision.
    pub audit_step: AuditStep,
}

/// What should happen to a task's frozen state in this recalculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeAction {
    /// Leave the frozen state as it is.
    Keep,
    /// The task just completed; lock its costs.
    Freeze,
    /// The task left the done state; unlock its costs.
    Reopen,
}

/// Decides the freeze transition for a task from its status.
pub fn freeze_action(task: &WorkOrderTask) -> FreezeAction {
    match (task.status == TaskStatus::Done, task.frozen) {
        (true, false) => FreezeAction::Freeze,
        (false, true) => FreezeAction::Reopen,
        _ => FreezeAction::Keep,
    }
}

/// Decides the material cost of a task.
///
/// `current` is the product's material-line sum as reported by the
/// material cost provider right now, `None` if the provider knows nothing
/// about the product. Frozen and manually overridden costs are kept.
pub fn resolve_material_cost(
    task: &WorkOrderTask,
    current: Option<Decimal>,
    step_number: u32,
) -> CostDecision {
    let stored = task.material_cost;
    let (amount, source, reasoning) = if task.frozen {
        (
            stored,
            "frozen",
            format!("Task is frozen; keeping stored material cost {}", stored),
        )
    } else if task.material_cost_overridden {
        (
            stored,
            "manual_override",
            format!("Material cost {} was entered by hand; keeping it", stored),
        )
    } else {
        match current {
            Some(sum) => {
                let sum = sum.round_dp(2);
                (
                    sum,
                    "provider",
                    format!("Current material lines of product {} sum to {}", task.product_id, sum),
                )
            }
            None => (
                stored,
                "stored_fallback",
                format!(
                    "No material lines found for product {}; keeping stored cost {}",
                    task.product_id, stored
                ),
            ),
        }
    };

    CostDecision {
        amount,
        changed: amount != stored,
        audit_step: AuditStep {
            step_number,
            rule_id: "material_cost".to_string(),
            subject: task.id.clone(),
            input: serde_json::json!({
                "stored": stored.to_string(),
                "current": current.map(|c| c.to_string()),
                "frozen": task.frozen,
                "overridden": task.material_cost_overridden,
            }),
            output: serde_json::json!({
                "material_cost": amount.to_string(),
                "source": source,
            }),
            reasoning,
        },
    }
}

/// Decides the actual labor cost of a task.
///
/// `logged` is the sum of the split daily rates of every work log that
/// references the task. A frozen task with a captured labor figure keeps it.
pub fn resolve_labor_cost(task: &WorkOrderTask, logged: Decimal, step_number: u32) -> CostDecision {
    let stored = task.actual_labor_cost;
    let (amount, source, reasoning) = match (task.frozen, task.frozen_labor_cost) {
        (true, Some(frozen)) => (
            frozen,
            "frozen",
            format!("Task is frozen; keeping captured labor cost {}", frozen),
        ),
        _ => (
            logged,
            "work_logs",
            format!("Work logs for task {} sum to {}", task.id, logged),
        ),
    };

    CostDecision {
        amount,
        changed: amount != stored,
        audit_step: AuditStep {
            step_number,
            rule_id: "actual_labor_cost".to_string(),
            subject: task.id.clone(),
            input: serde_json::json!({
                "stored": stored.to_string(),
                "logged": logged.to_string(),
                "frozen_labor_cost": task.frozen_labor_cost.map(|c| c.to_string()),
            }),
            output: serde_json::json!({
                "actual_labor_cost": amount.to_string(),
                "source": source,
            }),
            reasoning,
        },
    }
}

/// Returns true if the task's contracted value should be recovered from an
/// accepted offer.
///
/// The guard fires once: after an attempt the task is flagged and never
/// considered again, whatever the outcome.
pub fn needs_value_backfill(task: &WorkOrderTask, policy: OfferBackfillPolicy) -> bool {
    policy != OfferBackfillPolicy::Disabled
        && task.value.is_zero()
        && task.offer_id.is_some()
        && !task.value_backfill_attempted
}

/// Picks the accepted offer to recover a task's value from.
///
/// An offer whose id matches the task's own offer link wins outright.
/// Otherwise the configured policy chooses among the product's accepted
/// offers.
pub fn select_offer<'a>(
    task: &WorkOrderTask,
    offers: &'a [AcceptedOffer],
    policy: OfferBackfillPolicy,
) -> Option<&'a AcceptedOffer> {
    let candidates: Vec<&AcceptedOffer> = offers
        .iter()
        .filter(|o| o.product_id == task.product_id)
        .collect();

    if let Some(linked) = task.offer_id.as_deref() {
        if let Some(offer) = candidates.iter().find(|o| o.offer_id == linked) {
            return Some(*offer);
        }
    }

    match policy {
        OfferBackfillPolicy::Disabled => None,
        OfferBackfillPolicy::LatestAccepted => candidates.into_iter().max_by_key(|o| o.accepted_at),
        OfferBackfillPolicy::EarliestAccepted => {
            candidates.into_iter().min_by_key(|o| o.accepted_at)
        }
        OfferBackfillPolicy::SingleAcceptedOnly => match candidates.as_slice() {
            [only] => Some(*only),
            _ => None,
        },
    }
}

/// Decides the recovered value of a task from the chosen offer.
pub fn backfill_value(
    task: &WorkOrderTask,
    offer: Option<&AcceptedOffer>,
    policy: OfferBackfillPolicy,
    step_number: u32,
) -> CostDecision {
    let (amount, reasoning) = match offer {
        Some(offer) => (
            offer.price,
            format!(
                "Value was zero; recovered {} from accepted offer {}",
                offer.price, offer.offer_id
            ),
        ),
        None => (
            task.value,
            format!(
                "Value was zero but no accepted offer qualifies under {:?}",
                policy
            ),
        ),
    };

    CostDecision {
        amount,
        changed: amount != task.value,
        audit_step: AuditStep {
            step_number,
            rule_id: "value_backfill".to_string(),
            subject: task.id.clone(),
            input: serde_json::json!({
                "offer_id": task.offer_id,
                "policy": format!("{:?}", policy),
            }),
            output: serde_json::json!({
                "value": amount.to_string(),
                "offer_used": offer.map(|o| o.offer_id.clone()),
            }),
            reasoning,
        },
    }
}
