//! Lazily built registry of value accessors keyed by JDBC type code.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use super::ValueAccessor;

/// Looks up the [`ValueAccessor`] for a type code.
///
/// The code → accessor map is built on first use. Concurrent first calls
/// block on a single initializer and then share its map; later reads take
/// no lock.
#[derive(Debug, Default)]
pub struct ValueAccessorProvider {
    by_jdbc_type: OnceLock<HashMap<i32, ValueAccessor>>,
    builds: AtomicUsize,
}

impl ValueAccessorProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide provider.
    pub fn shared() -> Arc<ValueAccessorProvider> {
        static SHARED: OnceLock<Arc<ValueAccessorProvider>> = OnceLock::new();
        SHARED
            .get_or_init(|| Arc::new(ValueAccessorProvider::new()))
            .clone()
    }

    fn map(&self) -> &HashMap<i32, ValueAccessor> {
        self.by_jdbc_type.get_or_init(|| {
            self.builds.fetch_add(1, Ordering::SeqCst);
            let map: HashMap<i32, ValueAccessor> = ValueAccessor::ALL
                .iter()
                .map(|acc| (acc.jdbc_type(), *acc))
                .collect();
            debug!("Built value accessor registry with {} entries", map.len());
            map
        })
    }

    /// Accessor registered for `jdbc_type`.
    ///
    /// Never fails: an unknown code (e.g. SQL Server's internal -155 for
    /// `datetimeoffset`) falls back to [`ValueAccessor::Distinct`].
    pub fn get(&self, jdbc_type: i32) -> ValueAccessor {
        match self.map().get(&jdbc_type) {
            Some(acc) => *acc,
            None => {
                warn!(
                    "No direct ValueAccessor found for JDBC type: {}. Using default '{}'.",
                    jdbc_type,
                    ValueAccessor::Distinct
                );
                ValueAccessor::Distinct
            }
        }
    }

    /// Whether `jdbc_type` has its own accessor.
    pub fn contains(&self, jdbc_type: i32) -> bool {
        self.map().contains_key(&jdbc_type)
    }

    /// How many times the registry map has been built (0 or 1).
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::jdbc;

    #[test]
    fn test_lazy_build() {
        let provider = ValueAccessorProvider::new();
        assert_eq!(provider.build_count(), 0);
        assert_eq!(provider.get(jdbc::INTEGER), ValueAccessor::Integer);
        assert_eq!(provider.get(jdbc::VARCHAR), ValueAccessor::VarChar);
        assert_eq!(provider.build_count(), 1);
    }

    #[test]
    fn test_unknown_codes_fall_back_to_distinct() {
        let provider = ValueAccessorProvider::new();
        for code in [-155, 9999, jdbc::NULL, jdbc::STRUCT, jdbc::REF, i32::MIN] {
            assert!(!provider.contains(code));
            assert_eq!(provider.get(code), ValueAccessor::Distinct);
        }
    }

    #[test]
    fn test_every_accessor_registered() {
        let provider = ValueAccessorProvider::new();
        for acc in ValueAccessor::ALL {
            assert_eq!(provider.get(acc.jdbc_type()), acc);
        }
        assert_eq!(
            provider.get(jdbc::ORACLE_INTERVALYM),
            ValueAccessor::OracleIntervalYm
        );
    }

    #[test]
    fn test_shared_is_one_instance() {
        let a = ValueAccessorProvider::shared();
        let b = ValueAccessorProvider::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let provider = ValueAccessorProvider::new();
        let seen: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        provider.get(jdbc::BIGINT);
                        provider.map() as *const _ as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(provider.build_count(), 1);
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
    }
}
