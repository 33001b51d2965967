//! Database configuration loading, resolution and connection initialization.

mod expr;
mod set;
mod types;
mod validation;

pub use expr::{process_url, ExprHandler, ProcessedUrl};
pub use set::DbConfigSet;
pub use types::*;

use std::collections::HashMap;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::context::BindContext;
use crate::core::traits::Connection;
use crate::dialect::Vendor;
use crate::error::{BindError, Result};
use crate::resource::{load_resource, ResourceLocator};
use crate::script::{FailureHandler, SqlScriptRunner};

impl DbSettings {
    /// Parse settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse settings from a `.dbconfig` (JSON) string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a file: `.dbconfig` and `.json` are JSON,
    /// anything else YAML. `path` is filled in when the file leaves it unset.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("dbconfig") | Some("json")
        );
        let mut settings = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        if settings.path.is_none() {
            settings.path = Some(path.display().to_string());
        }
        Ok(settings)
    }
}

impl DbConfig {
    /// Resolve parsed settings into a configuration.
    ///
    /// Evaluates expressions in `url` and `buildUrl` (see [`process_url`]),
    /// assigns defaults, then validates.
    pub fn resolve(
        mut settings: DbSettings,
        mode: Mode,
        ctx: &BindContext,
        handler: Option<&ExprHandler>,
    ) -> Result<Self> {
        let mut initializers: HashMap<String, Vec<Initializer>> = HashMap::new();
        for field in [&mut settings.url, &mut settings.build_url] {
            let Some(url) = field.as_deref() else {
                continue;
            };
            let processed = process_url(url, mode, ctx.resources().as_ref(), handler)?;
            if !processed.initializers.is_empty() {
                initializers
                    .entry(processed.url.clone())
                    .or_default()
                    .extend(processed.initializers);
            }
            *field = Some(processed.url);
        }

        assign_defaults(&mut settings);
        validation::validate(&settings)?;

        Ok(DbConfig {
            settings,
            mode,
            initializers,
            resources: ctx.resources().clone(),
            ddl_registry: ctx.ddl_registry().clone(),
        })
    }

    /// Parse and resolve a YAML configuration.
    pub fn from_yaml(yaml: &str, mode: Mode, ctx: &BindContext) -> Result<Self> {
        Self::resolve(DbSettings::from_yaml(yaml)?, mode, ctx, None)
    }

    /// Parse and resolve a `.dbconfig` (JSON) configuration.
    pub fn from_json(json: &str, mode: Mode, ctx: &BindContext) -> Result<Self> {
        Self::resolve(DbSettings::from_json(json)?, mode, ctx, None)
    }

    /// Load and resolve a configuration file.
    pub fn load<P: AsRef<Path>>(path: P, mode: Mode, ctx: &BindContext) -> Result<Self> {
        Self::resolve(DbSettings::load(path)?, mode, ctx, None)
    }

    /// Prepare a freshly opened connection, in order:
    ///
    /// 1. run the initializers registered for `url`
    /// 2. select `schema_name`, when given and non-empty
    /// 3. run the `ddl` resource, unless it already ran in this process
    pub async fn init(
        &self,
        conn: &mut dyn Connection,
        url: &str,
        schema_name: Option<&str>,
        ddl: Option<&str>,
    ) -> Result<()> {
        for initializer in self.initializers(url) {
            run_initializer(initializer, conn, self.resources.as_ref()).await?;
        }

        if let Some(schema) = schema_name.filter(|s| !s.is_empty()) {
            debug!("Selecting schema {} on {}", schema, url);
            conn.set_schema(schema).await?;
        }

        self.exec_ddl(conn, ddl).await
    }

    async fn exec_ddl(&self, conn: &mut dyn Connection, ddl: Option<&str>) -> Result<()> {
        let Some(ddl) = ddl.filter(|d| !d.is_empty()) else {
            return Ok(());
        };
        if !self.ddl_registry.mark(ddl) {
            debug!("DDL {} already executed, skipping", ddl);
            return Ok(());
        }

        let path = if ddl.starts_with('/') || ddl.starts_with('\\') {
            ddl.to_string()
        } else {
            format!("/{}", ddl)
        };
        let script = load_resource(self.resources.as_ref(), &path)?;

        let vendor = conn.vendor();
        let tolerate = move |stmt: &str, _: &BindError| vendor.tolerates_ddl_failure(stmt);
        let handler: Option<FailureHandler<'_>> = match vendor {
            Vendor::Oracle => Some(&tolerate),
            _ => None,
        };

        info!("Running DDL {} for dbconfig '{}'", path, self.name());
        SqlScriptRunner::run_script(conn, &script, handler)
            .await
            .map_err(|e| BindError::script(path, e))
    }

    /// SHA-256 of the serialized settings, for logging and cache keys.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(&self.settings).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn assign_defaults(settings: &mut DbSettings) {
    if settings
        .schema_package
        .as_deref()
        .map_or(true, str::is_empty)
    {
        info!(
            "No 'schemaPackage' defined in dbconfig '{}'. Using default: '{}'.",
            settings.name, DEFAULT_SCHEMA_PACKAGE
        );
        settings.schema_package = Some(DEFAULT_SCHEMA_PACKAGE.to_string());
    }
}

async fn run_initializer(
    initializer: &Initializer,
    conn: &mut dyn Connection,
    resources: &dyn ResourceLocator,
) -> Result<()> {
    match initializer {
        Initializer::Script { resource } => {
            debug!("Running initializer script {}", resource);
            let script = load_resource(resources, resource)?;
            SqlScriptRunner::run_script(conn, &script, None)
                .await
                .map_err(|e| BindError::script(resource.clone(), e))
        }
        Initializer::Sql(script) => SqlScriptRunner::run_script(conn, script, None).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::resource::{FsResourceLocator, MemoryResourceLocator};

    fn make_test_context() -> BindContext {
        BindContext::new(Arc::new(MemoryResourceLocator::new()))
    }

    const YAML: &str = r#"
name: Sales
url: "jdbc:sqlite::memory:"
user: sa
password: secret
properties:
  journal_mode: wal
"#;

    #[test]
    fn test_from_yaml_assigns_default_schema_package() {
        let config = DbConfig::from_yaml(YAML, Mode::Runtime, &make_test_context()).unwrap();
        assert_eq!(config.name(), "Sales");
        assert_eq!(config.schema_package(), DEFAULT_SCHEMA_PACKAGE);
        assert_eq!(
            config.settings().schema_package.as_deref(),
            Some(DEFAULT_SCHEMA_PACKAGE)
        );
        assert_eq!(config.properties().get("journal_mode").map(String::as_str), Some("wal"));
    }

    #[test]
    fn test_from_json_camel_case() {
        let json = r#"{
            "name": "Inventory",
            "url": "jdbc:sqlite:inv.db",
            "buildUrl": "jdbc:sqlite:build/inv.db",
            "schemaName": "main",
            "isDefault": true,
            "schemaPackage": "inv.schema",
            "dbDdl": "ddl/inventory.sql"
        }"#;
        let ctx = make_test_context();
        let config = DbConfig::from_json(json, Mode::CompileTime, &ctx).unwrap();
        assert!(config.is_default());
        assert_eq!(config.schema_name(), Some("main"));
        assert_eq!(config.db_ddl(), Some("ddl/inventory.sql"));
        assert_eq!(config.effective_url(), Some("jdbc:sqlite:build/inv.db"));

        let runtime = DbConfig::from_json(json, Mode::Runtime, &ctx).unwrap();
        assert_eq!(runtime.effective_url(), Some("jdbc:sqlite:inv.db"));
    }

    #[test]
    fn test_equality_is_over_settings() {
        let ctx = make_test_context();
        let a = DbConfig::from_yaml(YAML, Mode::Runtime, &ctx).unwrap();
        let mut b = DbConfig::from_yaml(YAML, Mode::Runtime, &ctx).unwrap();
        b.register_initializer("jdbc:sqlite::memory:", Initializer::Sql("SELECT 1".into()));
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());

        let other = DbConfig::from_yaml(&YAML.replace("Sales", "Hr"), Mode::Runtime, &ctx).unwrap();
        assert_ne!(a, other);
        assert_ne!(a.hash(), other.hash());
    }

    #[test]
    fn test_password_not_serialized_or_logged() {
        let config = DbConfig::from_yaml(YAML, Mode::Runtime, &make_test_context()).unwrap();
        let yaml = serde_yaml::to_string(config.settings()).unwrap();
        assert!(!yaml.contains("secret"), "Password was serialized: {}", yaml);
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_resource_script_registers_initializer() {
        let ctx = BindContext::new(Arc::new(
            FsResourceLocator::new().with_runtime_root("/srv/app"),
        ));
        let yaml = "name: Sales\nurl: \"sqlite:#resource(/db/sales.db)#resource_script(/db/sales.sql)\"\n";
        let config = DbConfig::from_yaml(yaml, Mode::Runtime, &ctx).unwrap();
        assert_eq!(config.url(), Some("sqlite:/srv/app/db/sales.db"));
        assert_eq!(
            config.initializers("sqlite:/srv/app/db/sales.db"),
            &[Initializer::Script {
                resource: "/db/sales.sql".to_string()
            }]
        );
        assert!(config.initializers("sqlite:other.db").is_empty());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let err = DbConfig::from_yaml("name: Sales\n", Mode::Runtime, &make_test_context())
            .unwrap_err();
        assert!(matches!(err, BindError::Config(_)));
    }

    #[test]
    fn test_load_dbconfig_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Sales.dbconfig");
        std::fs::write(&file, r#"{"name": "Sales", "url": "jdbc:sqlite::memory:"}"#).unwrap();

        let config = DbConfig::load(&file, Mode::Runtime, &make_test_context()).unwrap();
        assert_eq!(config.name(), "Sales");
        assert_eq!(config.path(), Some(file.display().to_string().as_str()));
    }
}
