//! The set of configurations known to a project, and default selection.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::DbConfig;
use crate::error::{BindError, Result};

/// All database configurations of a project, with one designated default.
///
/// The default is the config marked `isDefault`, or the only config when
/// there is just one. Ambiguity is an error.
#[derive(Debug, Clone)]
pub struct DbConfigSet {
    configs: Vec<Arc<DbConfig>>,
    default_index: usize,
}

impl DbConfigSet {
    pub fn new(configs: Vec<DbConfig>) -> Result<Self> {
        if configs.is_empty() {
            return Err(BindError::Config("No dbconfig files found".into()));
        }

        let mut seen = HashSet::new();
        for config in &configs {
            if !seen.insert(config.name()) {
                return Err(BindError::Config(format!(
                    "Duplicate dbconfig name '{}'",
                    config.name()
                )));
            }
        }

        let defaults: Vec<usize> = configs
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_default())
            .map(|(i, _)| i)
            .collect();

        let default_index = match defaults.as_slice() {
            [index] => *index,
            [] if configs.len() == 1 => 0,
            [] => {
                return Err(BindError::Config(format!(
                    "{} dbconfigs found but none is marked isDefault",
                    configs.len()
                )))
            }
            many => {
                let names: Vec<&str> = many.iter().map(|&i| configs[i].name()).collect();
                return Err(BindError::Config(format!(
                    "More than one dbconfig is marked isDefault: {}",
                    names.join(", ")
                )));
            }
        };

        debug!(
            "Default dbconfig is '{}' of {}",
            configs[default_index].name(),
            configs.len()
        );

        Ok(Self {
            configs: configs.into_iter().map(Arc::new).collect(),
            default_index,
        })
    }

    pub fn default_config(&self) -> &Arc<DbConfig> {
        &self.configs[self.default_index]
    }

    pub fn get(&self, name: &str) -> Option<&Arc<DbConfig>> {
        self.configs.iter().find(|c| c.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DbConfig>> {
        self.configs.iter()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::context::BindContext;
    use crate::resource::MemoryResourceLocator;

    fn make_test_config(name: &str, is_default: bool) -> DbConfig {
        let ctx = BindContext::new(Arc::new(MemoryResourceLocator::new()));
        let yaml = format!(
            "name: {}\nurl: \"sqlite::memory:\"\nisDefault: {}\n",
            name, is_default
        );
        DbConfig::from_yaml(&yaml, Mode::Runtime, &ctx).unwrap()
    }

    #[test]
    fn test_single_config_is_default() {
        let set = DbConfigSet::new(vec![make_test_config("Sales", false)]).unwrap();
        assert_eq!(set.default_config().name(), "Sales");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_explicit_default() {
        let set = DbConfigSet::new(vec![
            make_test_config("Sales", false),
            make_test_config("Hr", true),
        ])
        .unwrap();
        assert_eq!(set.default_config().name(), "Hr");
        assert!(set.get("Sales").is_some());
        assert!(set.get("Missing").is_none());
    }

    #[test]
    fn test_two_defaults_is_error() {
        let err = DbConfigSet::new(vec![
            make_test_config("Sales", true),
            make_test_config("Hr", true),
        ])
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Sales") && msg.contains("Hr"), "{}", msg);
    }

    #[test]
    fn test_no_default_among_many_is_error() {
        assert!(DbConfigSet::new(vec![
            make_test_config("Sales", false),
            make_test_config("Hr", false),
        ])
        .is_err());
    }

    #[test]
    fn test_empty_and_duplicates() {
        assert!(DbConfigSet::new(vec![]).is_err());
        let err = DbConfigSet::new(vec![
            make_test_config("Sales", false),
            make_test_config("Sales", true),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }
}
