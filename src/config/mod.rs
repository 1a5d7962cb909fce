//! Configuration loading and management for the labor cost engine.
//!
//! This module loads the status hierarchies, stage mappings and engine
//! settings from YAML files. The tables are immutable once loaded and are
//! passed into every pipeline stage.
//!
//! # Example
//!
//! ```no_run
//! use labor_cost_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/furniture").unwrap();
//! println!("Loaded: {}", config.config().metadata().name);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    CostingSettings, DiagnosticSettings, EngineConfig, EngineFile, EngineMetadata, JobSettings,
    OfferBackfillPolicy, ProductStatusConfig, ProjectStatusConfig, ServerSettings, StageConfig,
    StatusHierarchy, StatusesFile,
};
