//! Diagnostics reported against a SQL query file.
//!
//! Errors raised while checking a query become [`Issue`]s positioned at the
//! character offset the database points at, when its messages carry one.

mod scope;

pub use scope::QueryScope;

use std::fmt;

use crate::dialect::Vendor;
use crate::error::BindError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: IssueKind,
    /// Character offset into the query text; 0 when unknown.
    pub offset: usize,
    pub message: String,
}

impl Issue {
    pub fn error(offset: usize, message: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::Error,
            offset,
            message: message.into(),
        }
    }

    pub fn warning(offset: usize, message: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::Warning,
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            IssueKind::Error => "error",
            IssueKind::Warning => "warning",
        };
        write!(f, "{} at {}: {}", kind, self.offset, self.message)
    }
}

/// Issues collected for one query.
#[derive(Debug, Clone, Default)]
pub struct IssueContainer {
    vendor: Option<Vendor>,
    query_is_crlf: bool,
    issues: Vec<Issue>,
}

impl IssueContainer {
    /// Turn `errors` into error issues. Without a vendor (an errant scope
    /// with no database) every offset is 0.
    pub fn new(vendor: Option<Vendor>, errors: &[BindError], query_is_crlf: bool) -> Self {
        let mut container = Self {
            vendor,
            query_is_crlf,
            issues: Vec::with_capacity(errors.len()),
        };
        container.add_errors(errors);
        container
    }

    pub fn add_errors(&mut self, errors: &[BindError]) {
        for error in errors {
            let offset = self
                .vendor
                .map(|v| v.find_offset(error, self.query_is_crlf))
                .unwrap_or(0);
            self.issues.push(Issue::error(offset, error.to_string()));
        }
    }

    pub fn add_issue(&mut self, kind: IssueKind, offset: usize, message: impl Into<String>) {
        self.issues.push(Issue {
            kind,
            offset,
            message: message.into(),
        });
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn errors(&self) -> Vec<&Issue> {
        self.of_kind(IssueKind::Error)
    }

    pub fn warnings(&self) -> Vec<&Issue> {
        self.of_kind(IssueKind::Warning)
    }

    fn of_kind(&self, kind: IssueKind) -> Vec<&Issue> {
        self.issues.iter().filter(|i| i.kind == kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H2_MESSAGE: &str =
        "Syntax error in SQL statement \"SELECT * FRM [*]person\"; expected \"FROM\"";

    #[test]
    fn test_h2_error_offset() {
        let container = IssueContainer::new(Some(Vendor::H2), &[BindError::sql(H2_MESSAGE)], false);
        assert_eq!(container.issues().len(), 1);
        let issue = &container.issues()[0];
        assert_eq!(issue.kind, IssueKind::Error);
        assert_eq!(issue.offset, 13);
        assert!(issue.message.contains("FRM"));
    }

    #[test]
    fn test_crlf_flag_reaches_offsets() {
        let msg = "Syntax error in SQL statement \"SELECT *\\000aFRM [*]x\"";
        let lf = IssueContainer::new(Some(Vendor::H2), &[BindError::sql(msg)], false);
        let crlf = IssueContainer::new(Some(Vendor::H2), &[BindError::sql(msg)], true);
        assert_eq!(crlf.issues()[0].offset, lf.issues()[0].offset + 1);
    }

    #[test]
    fn test_no_vendor_or_other_vendor_offset_zero() {
        let errors = [BindError::sql(H2_MESSAGE)];
        assert_eq!(IssueContainer::new(None, &errors, false).issues()[0].offset, 0);
        assert_eq!(
            IssueContainer::new(Some(Vendor::Sqlite), &errors, false).issues()[0].offset,
            0
        );
    }

    #[test]
    fn test_errors_and_warnings_partition() {
        let mut container = IssueContainer::new(None, &[], false);
        assert!(container.is_empty());

        container.add_issue(IssueKind::Warning, 4, "unused parameter");
        container.add_issue(IssueKind::Error, 0, "no such table: pet");
        assert!(!container.is_empty());
        assert_eq!(container.errors().len(), 1);
        assert_eq!(container.warnings().len(), 1);
        assert_eq!(container.warnings()[0].to_string(), "warning at 4: unused parameter");
    }
}
