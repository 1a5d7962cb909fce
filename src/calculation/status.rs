//! Derived status rules for products and projects.
//!
//! Products and projects only ever move forward in their hierarchy. Every
//! candidate status is passed through [`decide_advance`], which rejects
//! anything that is not strictly higher than the current status.

use crate::config::{EngineConfig, StatusHierarchy};
use crate::models::{TaskStatus, WorkOrderTask};

/// Outcome of comparing a candidate status with the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusDecision {
    /// The candidate ranks higher and should be written.
    Advance {
        /// Current status.
        from: String,
        /// New status.
        to: String,
    },
    /// The candidate is the current status.
    Unchanged,
    /// The candidate ranks lower; writing it would regress.
    Regression {
        /// Current status.
        current: String,
        /// Rejected candidate.
        candidate: String,
    },
    /// The current or candidate status is not in the hierarchy.
    Unknown {
        /// The unranked status.
        status: String,
    },
}

/// Compares a candidate status against the current one.
///
/// # Example
///
/// ```
/// use labor_cost_engine::calculation::{StatusDecision, decide_advance};
/// use labor_cost_engine::config::StatusHierarchy;
///
/// let hierarchy = StatusHierarchy::new(["Waiting", "Cutting", "Ready"]);
/// assert!(matches!(
///     decide_advance("Ready", "Cutting", &hierarchy),
///     StatusDecision::Regression { .. }
/// ));
/// ```
pub fn decide_advance(current: &str, candidate: &str, hierarchy: &StatusHierarchy) -> StatusDecision {
    let Some(current_rank) = hierarchy.rank(current) else {
        return StatusDecision::Unknown {
            status: current.to_string(),
        };
    };
    let Some(candidate_rank) = hierarchy.rank(candidate) else {
        return StatusDecision::Unknown {
            status: candidate.to_string(),
        };
    };

    if candidate_rank > current_rank {
        StatusDecision::Advance {
            from: current.to_string(),
            to: candidate.to_string(),
        }
    } else if candidate_rank == current_rank {
        StatusDecision::Unchanged
    } else {
        StatusDecision::Regression {
            current: current.to_string(),
            candidate: candidate.to_string(),
        }
    }
}

/// Derives the product status a single task implies.
///
/// Done tasks map their last stage through the completed mapping, in
/// progress tasks map their active (or last completed) stage through the
/// in-progress mapping, and anything else is waiting.
pub fn derive_product_status(task: &WorkOrderTask, config: &EngineConfig) -> String {
    let stages = config.stages();
    match task.status {
        TaskStatus::Done => task
            .decomposition
            .final_stage(&stages.order)
            .and_then(|stage| stages.completed.get(stage))
            .unwrap_or(&stages.completed_default)
            .clone(),
        TaskStatus::InProgress => task
            .decomposition
            .active_stage(&stages.order)
            .or_else(|| task.decomposition.last_completed_stage())
            .and_then(|stage| stages.in_progress.get(stage))
            .unwrap_or(&stages.in_progress_default)
            .clone(),
        TaskStatus::Waiting => config.product_statuses().waiting.clone(),
    }
}

/// The highest ranked of several candidate statuses.
pub fn highest_ranked<'a, I>(candidates: I, hierarchy: &StatusHierarchy) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter_map(|s| hierarchy.rank(s).map(|rank| (rank, s)))
        .max_by_key(|(rank, _)| *rank)
        .map(|(_, s)| s)
}

/// A product's standing as seen by its project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStanding {
    /// Product id.
    pub product_id: String,
    /// Current product status.
    pub status: String,
    /// An installation work order for the product is still open.
    pub installation_pending: bool,
}

/// Returns true if the product counts as complete for its project.
///
/// A product with a pending installation only counts once it reaches the
/// final status; otherwise reaching the completion threshold is enough.
pub fn is_product_complete(product: &ProductStanding, config: &EngineConfig) -> bool {
    let statuses = config.product_statuses();
    if product.installation_pending {
        return product.status == statuses.final_status;
    }
    match (
        statuses.hierarchy.rank(&product.status),
        statuses.hierarchy.rank(&statuses.complete_threshold),
    ) {
        (Some(rank), Some(threshold)) => rank >= threshold,
        _ => false,
    }
}

/// Derives the project status its products imply, if any.
///
/// Returns the complete status when every product is complete, the
/// in-production status when the project is approved and any product has
/// left its idle statuses, and `None` when the products imply nothing.
pub fn derive_project_status(
    current: &str,
    products: &[ProductStanding],
    config: &EngineConfig,
) -> Option<String> {
    if products.is_empty() {
        return None;
    }
    let project = config.project_statuses();
    let product_statuses = config.product_statuses();

    if products.iter().all(|p| is_product_complete(p, config)) {
        return Some(project.complete.clone());
    }

    let started = products.iter().any(|p| {
        product_statuses.hierarchy.contains(&p.status)
            && !product_statuses.idle.iter().any(|idle| *idle == p.status)
    });
    if current == project.approved && started {
        return Some(project.in_production.clone());
    }

    None
}
