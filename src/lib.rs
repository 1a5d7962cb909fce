//! Labor cost allocation and derived-status synchronization for furniture
//! production.
//!
//! Daily attendance is turned into per-task work logs, work logs and
//! materials roll up into work order costs and profit, and task progress
//! drives product and project statuses that only ever move forward.
//!
//! The [`Engine`] runs that pipeline over a [`store::DocumentStore`];
//! [`api::create_router`] exposes it over HTTP.

#![warn(missing_docs)]

pub mod api;
pub mod calculation;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod store;

pub use engine::Engine;
pub use error::{EngineError, EngineResult};
