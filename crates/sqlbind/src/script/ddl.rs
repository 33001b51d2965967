//! Process-wide record of DDL resources already executed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Set of DDL resource paths that have been run.
///
/// A DDL resource runs at most once per registry; long-lived processes that
/// build the same configuration repeatedly share [`DdlRegistry::global`].
#[derive(Debug, Default)]
pub struct DdlRegistry {
    executed: Mutex<HashSet<String>>,
}

impl DdlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> Arc<DdlRegistry> {
        static GLOBAL: OnceLock<Arc<DdlRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(DdlRegistry::new())).clone()
    }

    /// Record `path`. Returns `true` only the first time a path is marked.
    pub fn mark(&self, path: &str) -> bool {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }
}
