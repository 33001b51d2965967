//! Configuration validation.

use super::DbSettings;
use crate::core::identifier::validate_identifier;
use crate::error::{BindError, Result};

/// Validate resolved settings.
pub fn validate(settings: &DbSettings) -> Result<()> {
    if settings.name.trim().is_empty() {
        return Err(BindError::Config("dbconfig name is required".into()));
    }
    validate_identifier(&settings.name)?;

    if settings.url.is_none() && settings.build_url.is_none() {
        return Err(BindError::Config(format!(
            "dbconfig '{}' requires a url or buildUrl",
            settings.name
        )));
    }

    for (field, value) in [
        ("catalogName", &settings.catalog_name),
        ("schemaName", &settings.schema_name),
    ] {
        if let Some(value) = value {
            validate_identifier(value).map_err(|e| {
                BindError::Config(format!("dbconfig '{}' {}: {}", settings.name, field, e))
            })?;
        }
    }

    if let Some(package) = &settings.schema_package {
        if !is_dotted_identifier(package) {
            return Err(BindError::Config(format!(
                "dbconfig '{}' schemaPackage must be a dotted identifier, got '{}'",
                settings.name, package
            )));
        }
    }

    Ok(())
}

fn is_dotted_identifier(s: &str) -> bool {
    s.split('.').all(|segment| {
        let mut chars = segment.chars();
        matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
            && chars.all(|c| c.is_alphanumeric() || c == '_')
    })
}
