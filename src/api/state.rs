//! Application state for the labor cost API.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::store::InMemoryStore;

/// Shared application state.
///
/// Holds the engine every handler drives.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
}

impl AppState {
    /// Creates a new application state around an engine.
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Creates a state backed by an in-memory store.
    pub fn in_memory(store: Arc<InMemoryStore>, config: EngineConfig) -> Self {
        Self::new(Engine::in_memory(store, config))
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
