use std::path::Path;
use std::sync::Arc;

use crate::config::DbConfig;
use crate::schema::Schema;

use super::{Issue, IssueKind};

/// Binds query files to the schema they are checked against.
///
/// A query file names its configuration with a secondary extension
/// (`FindPets.Sales.sql` belongs to dbconfig `Sales`); a file without one
/// belongs to the default configuration. A file no configuration covers
/// gets an errant scope carrying an error issue.
#[derive(Debug, Clone)]
pub struct QueryScope {
    schema: Option<Arc<Schema>>,
    issues: Vec<Issue>,
}

impl QueryScope {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema: Some(schema),
            issues: Vec::new(),
        }
    }

    /// Scope for query type `fqn` defined in `file`, which no configuration
    /// covers.
    pub fn errant(fqn: &str, file: &str) -> Self {
        let file_name = Path::new(file)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file);
        Self {
            schema: None,
            issues: vec![Issue::error(
                0,
                format!(
                    "SQL type '{}' from file '{}' is not covered in any .dbconfig files",
                    fqn, file_name
                ),
            )],
        }
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    pub fn db_config(&self) -> Option<&DbConfig> {
        self.schema.as_deref().map(Schema::config)
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn has_config_errors(&self) -> bool {
        self.issues.iter().any(|i| i.kind == IssueKind::Error)
    }

    /// Whether there is no database to check queries against.
    pub fn is_errant(&self) -> bool {
        self.db_config()
            .and_then(DbConfig::build_url_or_runtime_url)
            .is_none()
    }

    /// Whether `file` names this scope's configuration.
    pub fn applies_to(&self, file: &str) -> bool {
        if self.has_config_errors() {
            return false;
        }
        match (self.db_config(), Self::find_db_config_name(file)) {
            (Some(config), Some(name)) => config.name() == name,
            _ => false,
        }
    }

    /// Whether `file` names no configuration and so falls to the default.
    pub fn is_default_scope_applicable(file: &str) -> bool {
        Self::find_db_config_name(file).map_or(true, str::is_empty)
    }

    /// Configuration name in a query file name: `Name.Config.sql` → `Config`.
    pub fn find_db_config_name(file: &str) -> Option<&str> {
        let base = Path::new(file).file_stem()?.to_str()?;
        base.rfind('.').map(|dot| &base[dot + 1..])
    }
}
