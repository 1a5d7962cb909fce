//! Configuration types for the labor cost engine.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files. The status hierarchies
//! and stage mappings live here rather than in code so the propagator can
//! be driven by data.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Identifying information about the configuration set.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineMetadata {
    /// Human-readable name.
    pub name: String,
    /// Version label.
    pub version: String,
}

/// How a missing contracted value is recovered from accepted offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferBackfillPolicy {
    /// Never recover values from offers.
    Disabled,
    /// Use the most recently accepted offer.
    LatestAccepted,
    /// Use the first accepted offer.
    EarliestAccepted,
    /// Recover only when exactly one offer was accepted.
    SingleAcceptedOnly,
}

/// Costing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CostingSettings {
    /// Largest tolerated drift of a stored split rate.
    pub split_tolerance: Decimal,
    /// Offer backfill policy.
    pub offer_backfill: OfferBackfillPolicy,
}

/// Batch job settings.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSettings {
    /// Maximum documents per write batch.
    pub write_batch_size: usize,
    /// Work orders recalculated concurrently.
    pub max_parallel_recalculations: usize,
    /// Planned duration given to auto-scheduled work orders.
    pub default_work_order_days: u32,
}

/// Diagnostic thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticSettings {
    /// Margins below this percentage are flagged.
    pub low_margin_percent: Decimal,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Socket address to bind.
    pub bind: String,
}

/// Top-level structure of `engine.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineFile {
    /// Configuration name.
    pub name: String,
    /// Configuration version.
    pub version: String,
    /// Costing settings.
    pub costing: CostingSettings,
    /// Job settings.
    pub jobs: JobSettings,
    /// Diagnostic thresholds.
    pub diagnostics: DiagnosticSettings,
    /// Server settings.
    pub server: ServerSettings,
}

/// A total order over status names.
///
/// # Example
///
/// ```
/// use labor_cost_engine::config::StatusHierarchy;
///
/// let hierarchy = StatusHierarchy::new(["Waiting", "Cutting", "Ready"]);
/// assert!(hierarchy.rank("Ready") > hierarchy.rank("Cutting"));
/// assert_eq!(hierarchy.rank("Painting"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct StatusHierarchy {
    statuses: Vec<String>,
}

impl StatusHierarchy {
    /// Builds a hierarchy from lowest to highest rank.
    pub fn new<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statuses: statuses.into_iter().map(Into::into).collect(),
        }
    }

    /// Position of a status in the hierarchy.
    pub fn rank(&self, status: &str) -> Option<usize> {
        self.statuses.iter().position(|s| s == status)
    }

    /// Returns true if the status is part of the hierarchy.
    pub fn contains(&self, status: &str) -> bool {
        self.rank(status).is_some()
    }

    /// The highest status.
    pub fn terminal(&self) -> Option<&str> {
        self.statuses.last().map(String::as_str)
    }

    /// All statuses from lowest to highest.
    pub fn statuses(&self) -> &[String] {
        &self.statuses
    }
}

/// Product status configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductStatusConfig {
    /// Ordered product statuses.
    pub hierarchy: StatusHierarchy,
    /// Status of a product whose tasks have not started.
    pub waiting: String,
    /// Statuses in which a product has not entered production.
    pub idle: Vec<String>,
    /// Lowest status counting a product as complete for its project.
    pub complete_threshold: String,
    /// The truly final status.
    pub final_status: String,
}

/// Project status configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectStatusConfig {
    /// Ordered project statuses.
    pub hierarchy: StatusHierarchy,
    /// Status of an approved project awaiting production.
    pub approved: String,
    /// Status once production starts.
    pub in_production: String,
    /// Status once every product is complete.
    pub complete: String,
}

/// Top-level structure of `statuses.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusesFile {
    /// Product statuses.
    pub product: ProductStatusConfig,
    /// Project statuses.
    pub project: ProjectStatusConfig,
    /// Work order kinds that install products on site.
    pub installation_work_order_kinds: Vec<String>,
}

/// Stage list and stage-to-status mappings (`stages.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    /// Production stages in order.
    pub order: Vec<String>,
    /// Target stage name that completes a subtask.
    pub done_marker: String,
    /// Product status while a stage is worked.
    pub in_progress: HashMap<String, String>,
    /// Product status for in-progress tasks with no known stage.
    pub in_progress_default: String,
    /// Product status of a finished task by its last stage.
    pub completed: HashMap<String, String>,
    /// Product status of a finished task with no mapped last stage.
    pub completed_default: String,
}

impl StageConfig {
    /// Returns true if the stage is a known production stage.
    pub fn is_known_stage(&self, stage: &str) -> bool {
        self.order.iter().any(|s| s == stage)
    }
}

/// The complete engine configuration loaded from YAML files.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    metadata: EngineMetadata,
    costing: CostingSettings,
    jobs: JobSettings,
    diagnostics: DiagnosticSettings,
    server: ServerSettings,
    statuses: StatusesFile,
    stages: StageConfig,
}

impl EngineConfig {
    /// Creates an EngineConfig from its component parts.
    pub fn new(engine: EngineFile, statuses: StatusesFile, stages: StageConfig) -> Self {
        Self {
            metadata: EngineMetadata {
                name: engine.name,
                version: engine.version,
            },
            costing: engine.costing,
            jobs: engine.jobs,
            diagnostics: engine.diagnostics,
            server: engine.server,
            statuses,
            stages,
        }
    }

    /// Returns the configuration metadata.
    pub fn metadata(&self) -> &EngineMetadata {
        &self.metadata
    }

    /// Returns the costing settings.
    pub fn costing(&self) -> &CostingSettings {
        &self.costing
    }

    /// Returns the job settings.
    pub fn jobs(&self) -> &JobSettings {
        &self.jobs
    }

    /// Returns the diagnostic thresholds.
    pub fn diagnostics(&self) -> &DiagnosticSettings {
        &self.diagnostics
    }

    /// Returns the server settings.
    pub fn server(&self) -> &ServerSettings {
        &self.server
    }

    /// Returns the product status configuration.
    pub fn product_statuses(&self) -> &ProductStatusConfig {
        &self.statuses.product
    }

    /// Returns the project status configuration.
    pub fn project_statuses(&self) -> &ProjectStatusConfig {
        &self.statuses.project
    }

    /// Returns true if work orders of this kind install products.
    pub fn is_installation_kind(&self, kind: &str) -> bool {
        self.statuses
            .installation_work_order_kinds
            .iter()
            .any(|k| k.eq_ignore_ascii_case(kind))
    }

    /// Returns the stage configuration.
    pub fn stages(&self) -> &StageConfig {
        &self.stages
    }

    /// Replaces the costing settings.
    pub fn with_costing(mut self, costing: CostingSettings) -> Self {
        self.costing = costing;
        self
    }

    /// Replaces the job settings.
    pub fn with_jobs(mut self, jobs: JobSettings) -> Self {
        self.jobs = jobs;
        self
    }
}
