//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading engine
//! configurations from YAML files.

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};

use super::types::{EngineConfig, EngineFile, StageConfig, StatusesFile};

/// Loads and validates engine configuration.
///
/// # Directory Structure
///
/// ```text
/// config/furniture/
/// ├── engine.yaml    # Costing, job, diagnostic and server settings
/// ├── statuses.yaml  # Product and project status hierarchies
/// └── stages.yaml    # Stage order and stage-to-status mappings
/// ```
///
/// # Example
///
/// ```no_run
/// use labor_cost_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/furniture")?;
/// println!("Loaded: {}", loader.config().metadata().name);
/// # Ok::<(), labor_cost_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: EngineConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` on success, or an error if:
    /// - Any required file is missing
    /// - Any file contains invalid YAML
    /// - A mapping refers to a status missing from its hierarchy
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let engine = Self::load_yaml::<EngineFile>(&path.join("engine.yaml"))?;
        let statuses = Self::load_yaml::<StatusesFile>(&path.join("statuses.yaml"))?;
        let stages = Self::load_yaml::<StageConfig>(&path.join("stages.yaml"))?;

        let config = EngineConfig::new(engine, statuses, stages);
        Self::validate(&config)?;

        Ok(Self { config })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Checks that every referenced status exists in its hierarchy.
    pub fn validate(config: &EngineConfig) -> EngineResult<()> {
        let product = config.product_statuses();
        let product_refs = [
            ("product.waiting", product.waiting.as_str()),
            ("product.complete_threshold", product.complete_threshold.as_str()),
            ("product.final_status", product.final_status.as_str()),
        ];
        for (field, status) in product_refs {
            if !product.hierarchy.contains(status) {
                return Err(invalid(format!(
                    "{} '{}' is not in the product hierarchy",
                    field, status
                )));
            }
        }
        if let Some(idle) = product.idle.iter().find(|s| !product.hierarchy.contains(s)) {
            return Err(invalid(format!(
                "idle status '{}' is not in the product hierarchy",
                idle
            )));
        }

        let project = config.project_statuses();
        for status in [&project.approved, &project.in_production, &project.complete] {
            if !project.hierarchy.contains(status) {
                return Err(invalid(format!(
                    "project status '{}' is not in the project hierarchy",
                    status
                )));
            }
        }

        let stages = config.stages();
        let mapped = stages
            .in_progress
            .values()
            .chain(stages.completed.values())
            .chain([&stages.in_progress_default, &stages.completed_default]);
        for status in mapped {
            if !product.hierarchy.contains(status) {
                return Err(invalid(format!(
                    "stage mapping target '{}' is not in the product hierarchy",
                    status
                )));
            }
        }
        if stages.is_known_stage(&stages.done_marker) {
            return Err(invalid(format!(
                "done marker '{}' collides with a production stage",
                stages.done_marker
            )));
        }

        let jobs = config.jobs();
        if jobs.write_batch_size == 0 || jobs.max_parallel_recalculations == 0 {
            return Err(invalid(
                "write_batch_size and max_parallel_recalculations must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Consumes the loader, returning the configuration.
    pub fn into_config(self) -> EngineConfig {
        self.config
    }
}

fn invalid(message: String) -> EngineError {
    EngineError::ConfigInvalid { message }
}
