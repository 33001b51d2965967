//! Error types for schema discovery, configuration and script execution.

use thiserror::Error;

/// Main error type for binding operations.
#[derive(Error, Debug)]
pub enum BindError {
    /// Configuration error (invalid YAML/JSON, missing fields, bad expressions).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A declared driver is not compiled into this build.
    #[error("Driver not found: {0}")]
    Driver(String),

    /// Connection could not be opened.
    #[error("Connection failed for {url}: {message}")]
    Connection { url: String, message: String },

    /// Schema discovery failed; no partial schema is exposed.
    #[error("Schema discovery failed: {0}")]
    SchemaDiscovery(String),

    /// Error reported by the database while executing a statement.
    #[error("SQL error: {message}")]
    Sql {
        message: String,
        sql_state: Option<String>,
    },

    /// A DDL or initializer script failed.
    #[error("Script {resource} failed: {source}")]
    Script {
        resource: String,
        #[source]
        source: Box<BindError>,
    },

    /// A referenced resource file could not be found.
    #[error("No resource file found matching: {0}")]
    Resource(String),

    /// Parameter or value marshalling error.
    #[error("Value error: {0}")]
    Value(String),

    /// IO error (resource files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BindError {
    /// Create a Connection error for the given URL.
    pub fn connection(url: impl Into<String>, message: impl ToString) -> Self {
        BindError::Connection {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a Sql error without a SQLSTATE.
    pub fn sql(message: impl Into<String>) -> Self {
        BindError::Sql {
            message: message.into(),
            sql_state: None,
        }
    }

    /// Wrap an error raised while running the script at `resource`.
    pub fn script(resource: impl Into<String>, source: BindError) -> Self {
        BindError::Script {
            resource: resource.into(),
            source: Box::new(source),
        }
    }

    /// The SQLSTATE (or vendor error code) reported by the driver, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            BindError::Sql { sql_state, .. } => sql_state.as_deref(),
            BindError::Script { source, .. } => source.sql_state(),
            _ => None,
        }
    }

    /// The driver's own message, without the variant prefix.
    pub fn driver_message(&self) -> String {
        match self {
            BindError::Sql { message, .. } => message.clone(),
            BindError::Script { source, .. } => source.driver_message(),
            other => other.to_string(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

impl From<sqlx::Error> for BindError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => BindError::Sql {
                message: db.message().to_string(),
                sql_state: db.code().map(|c| c.into_owned()),
            },
            _ => BindError::sql(e.to_string()),
        }
    }
}

#[cfg(feature = "mssql")]
impl From<tiberius::error::Error> for BindError {
    fn from(e: tiberius::error::Error) -> Self {
        match &e {
            tiberius::error::Error::Server(token) => BindError::Sql {
                message: token.message().to_string(),
                sql_state: Some(token.code().to_string()),
            },
            _ => BindError::sql(e.to_string()),
        }
    }
}

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, BindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_state_through_script_wrapper() {
        let inner = BindError::Sql {
            message: "user does not exist".to_string(),
            sql_state: Some("42000".to_string()),
        };
        let err = BindError::script("/ddl/init.sql", inner);
        assert_eq!(err.sql_state(), Some("42000"));
        assert_eq!(err.driver_message(), "user does not exist");
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let err = BindError::script("/ddl/init.sql", BindError::sql("near \"FRM\": syntax error"));
        let detailed = err.format_detailed();
        assert!(detailed.contains("Script /ddl/init.sql failed"));
        assert!(detailed.contains("Caused by:"));
        assert!(detailed.contains("syntax error"));
    }

    #[test]
    fn test_connection_error_names_url() {
        let err = BindError::connection("sqlite://missing.db", "unable to open database file");
        assert!(err.to_string().contains("sqlite://missing.db"));
    }
}
