//! Configuration types.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::resource::ResourceLocator;
use crate::script::DdlRegistry;

/// Package generated schema types are placed in when none is configured.
pub const DEFAULT_SCHEMA_PACKAGE: &str = "sqlbind.schema";

/// Whether configuration is being resolved for a build or for a running
/// application. Selects the URL (`buildUrl` vs `url`) and the resource root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    CompileTime,
    Runtime,
    #[default]
    Unknown,
}

/// Settings of one named database configuration, as written in a
/// `.dbconfig` (JSON) or YAML file.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbSettings {
    /// Configuration name; also the preferred schema name.
    pub name: String,

    #[serde(default, alias = "catalog_name", skip_serializing_if = "Option::is_none")]
    pub catalog_name: Option<String>,

    /// Schema to select after connecting.
    #[serde(default, alias = "schema_name", skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,

    /// Location of the configuration file, when loaded from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Runtime connection URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Connection URL used at compile time; falls back to `url`.
    #[serde(default, alias = "build_url", skip_serializing_if = "Option::is_none")]
    pub build_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password (never serialized, redacted in Debug).
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Driver name (`sqlite`, `mysql`, `mssql`); chosen by URL when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    #[serde(default, alias = "is_default")]
    pub is_default: bool,

    /// Package for generated schema types (default: `sqlbind.schema`).
    #[serde(default, alias = "schema_package", skip_serializing_if = "Option::is_none")]
    pub schema_package: Option<String>,

    /// Driver properties, passed through unchanged.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,

    /// DDL resource run once when a connection is initialized.
    #[serde(default, alias = "db_ddl", skip_serializing_if = "Option::is_none")]
    pub db_ddl: Option<String>,
}

impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSettings")
            .field("name", &self.name)
            .field("catalog_name", &self.catalog_name)
            .field("schema_name", &self.schema_name)
            .field("path", &self.path)
            .field("url", &self.url)
            .field("build_url", &self.build_url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("driver", &self.driver)
            .field("is_default", &self.is_default)
            .field("schema_package", &self.schema_package)
            .field("properties", &self.properties)
            .field("db_ddl", &self.db_ddl)
            .finish()
    }
}

/// Work run on a connection before anything else uses it, registered for
/// one URL (typically an ephemeral database that must be created first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initializer {
    /// Run the script resource at this logical path.
    Script { resource: String },
    /// Run this script text.
    Sql(String),
}

/// A resolved database configuration.
///
/// Immutable once resolved. Equality and hashing consider the settings only,
/// so a `DbConfig` can key a cache of built schemas.
#[derive(Clone)]
pub struct DbConfig {
    pub(super) settings: DbSettings,
    pub(super) mode: Mode,
    pub(super) initializers: HashMap<String, Vec<Initializer>>,
    pub(super) resources: Arc<dyn ResourceLocator>,
    pub(super) ddl_registry: Arc<DdlRegistry>,
}

impl PartialEq for DbConfig {
    fn eq(&self, other: &Self) -> bool {
        self.settings == other.settings
    }
}

impl Eq for DbConfig {}

impl Hash for DbConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.settings.hash(state);
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("settings", &self.settings)
            .field("mode", &self.mode)
            .field("initializers", &self.initializers)
            .finish_non_exhaustive()
    }
}

impl DbConfig {
    pub fn settings(&self) -> &DbSettings {
        &self.settings
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn catalog_name(&self) -> Option<&str> {
        self.settings.catalog_name.as_deref()
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.settings.schema_name.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.settings.path.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.settings.url.as_deref()
    }

    pub fn build_url(&self) -> Option<&str> {
        self.settings.build_url.as_deref()
    }

    /// `build_url` if set, otherwise `url`.
    pub fn build_url_or_runtime_url(&self) -> Option<&str> {
        self.build_url().or_else(|| self.url())
    }

    /// URL to connect with in this configuration's mode.
    pub fn effective_url(&self) -> Option<&str> {
        match self.mode {
            Mode::CompileTime => self.build_url_or_runtime_url(),
            Mode::Runtime | Mode::Unknown => self.url().or_else(|| self.build_url()),
        }
    }

    pub fn user(&self) -> Option<&str> {
        self.settings.user.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.settings.password.as_deref()
    }

    pub fn driver(&self) -> Option<&str> {
        self.settings.driver.as_deref()
    }

    pub fn is_default(&self) -> bool {
        self.settings.is_default
    }

    pub fn schema_package(&self) -> &str {
        self.settings
            .schema_package
            .as_deref()
            .unwrap_or(DEFAULT_SCHEMA_PACKAGE)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.settings.properties
    }

    pub fn db_ddl(&self) -> Option<&str> {
        self.settings.db_ddl.as_deref()
    }

    /// Initializers registered for `url`.
    pub fn initializers(&self, url: &str) -> &[Initializer] {
        self.initializers.get(url).map_or(&[], Vec::as_slice)
    }

    /// Register an initializer to run when a connection to `url` is
    /// initialized. Only valid before the config is shared.
    pub fn register_initializer(&mut self, url: impl Into<String>, initializer: Initializer) {
        self.initializers
            .entry(url.into())
            .or_default()
            .push(initializer);
    }

    pub fn ddl_registry(&self) -> &Arc<DdlRegistry> {
        &self.ddl_registry
    }

    pub fn resources(&self) -> &Arc<dyn ResourceLocator> {
        &self.resources
    }
}
