//! Expressions embedded in URL fields.
//!
//! - `${name}`: value from the expression handler, else the environment
//! - `#resource(/path)`: the resource root for the current mode joined with `path`
//! - `#resource_script(/path)`: removed from the URL; the script is registered
//!   as an initializer for the resulting URL
//!
//! ```text
//! jdbc:sqlite:#resource(/db/sales.db)#resource_script(/db/sales.sql)
//!   → jdbc:sqlite:/app/resources/db/sales.db  (+ initializer running /db/sales.sql)
//! ```

use crate::error::{BindError, Result};
use crate::resource::ResourceLocator;

use super::types::{Initializer, Mode};

/// Evaluates `${name}` expressions before the environment is consulted.
pub type ExprHandler = dyn Fn(&str) -> Option<String> + Send + Sync;

const RESOURCE_SCRIPT: &str = "#resource_script(";
const RESOURCE: &str = "#resource(";

/// A URL with its expressions evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedUrl {
    pub url: String,
    pub initializers: Vec<Initializer>,
}

pub fn process_url(
    url: &str,
    mode: Mode,
    resources: &dyn ResourceLocator,
    handler: Option<&ExprHandler>,
) -> Result<ProcessedUrl> {
    let (url, scripts) = extract_calls(url, RESOURCE_SCRIPT)?;
    let initializers = scripts
        .into_iter()
        .map(|resource| Initializer::Script { resource })
        .collect();

    let url = replace_resource_roots(&url, mode, resources)?;
    let url = substitute_variables(&url, handler)?;

    Ok(ProcessedUrl { url, initializers })
}

/// Remove every `<prefix>arg)` call from `input`, returning the remaining
/// text and the arguments in order.
fn extract_calls(input: &str, prefix: &str) -> Result<(String, Vec<String>)> {
    let mut out = String::with_capacity(input.len());
    let mut args = Vec::new();
    let mut rest = input;

    while let Some(start) = rest.find(prefix) {
        out.push_str(&rest[..start]);
        let after = &rest[start + prefix.len()..];
        let end = after.find(')').ok_or_else(|| {
            BindError::Config(format!("Unterminated {}...) in url: {}", prefix, input))
        })?;
        args.push(after[..end].trim().to_string());
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok((out, args))
}

fn replace_resource_roots(url: &str, mode: Mode, resources: &dyn ResourceLocator) -> Result<String> {
    if !url.contains(RESOURCE) {
        return Ok(url.to_string());
    }

    let mut out = String::with_capacity(url.len());
    let mut rest = url;
    while let Some(start) = rest.find(RESOURCE) {
        out.push_str(&rest[..start]);
        let after = &rest[start + RESOURCE.len()..];
        let end = after.find(')').ok_or_else(|| {
            BindError::Config(format!("Unterminated {}...) in url: {}", RESOURCE, url))
        })?;
        let root = resources.root(mode).ok_or_else(|| {
            BindError::Config(format!(
                "No resource root configured for {:?} mode, needed by url: {}",
                mode, url
            ))
        })?;
        let path = root.join(after[..end].trim().trim_start_matches(['/', '\\']));
        out.push_str(&path.to_string_lossy());
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

fn substitute_variables(url: &str, handler: Option<&ExprHandler>) -> Result<String> {
    let mut out = String::with_capacity(url.len());
    let mut rest = url;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| BindError::Config(format!("Unterminated ${{...}} in url: {}", url)))?;
        let name = after[..end].trim();

        let value = handler
            .and_then(|h| h(name))
            .or_else(|| std::env::var(name).ok())
            .ok_or_else(|| {
                BindError::Config(format!("Unresolved expression ${{{}}} in url: {}", name, url))
            })?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}
