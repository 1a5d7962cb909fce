//! Worker model.
//!
//! Workers are owned by the organization. The engine only reads them; the
//! daily rate is never mutated here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A production worker whose attendance is turned into labor cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// Unique identifier for the worker.
    pub id: String,
    /// The tenant (organization) the worker belongs to.
    pub tenant_id: String,
    /// Display name.
    pub name: String,
    /// Total compensation for one full working day.
    pub daily_rate: Decimal,
    /// Workshop role (e.g. "carpenter", "installer").
    #[serde(default)]
    pub role: String,
}
