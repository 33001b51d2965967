//! Common utilities shared across database drivers.
//!
//! - [`TxState`]: JDBC-style auto-commit over drivers that only offer
//!   explicit transactions
//! - [`type_qualifier`]: `(length, scale)` parsed from a declared type name

/// Auto-commit emulation.
///
/// With auto-commit off, the first statement opens a transaction that stays
/// open until commit or rollback; the next statement opens another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxState {
    auto_commit: bool,
    open: bool,
}

impl Default for TxState {
    fn default() -> Self {
        Self {
            auto_commit: true,
            open: false,
        }
    }
}

impl TxState {
    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    pub fn set_auto_commit(&mut self, auto_commit: bool) {
        self.auto_commit = auto_commit;
    }

    /// Whether a statement about to run must first open a transaction.
    pub fn needs_begin(&self) -> bool {
        !self.auto_commit && !self.open
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn opened(&mut self) {
        self.open = true;
    }

    pub fn closed(&mut self) {
        self.open = false;
    }
}

/// `(length, scale)` from a declared type such as `DECIMAL(10, 2)`;
/// `(0, 0)` when there is no qualifier.
pub fn type_qualifier(type_name: &str) -> (i32, i32) {
    let Some(inner) = type_name
        .split_once('(')
        .and_then(|(_, rest)| rest.split_once(')'))
        .map(|(inner, _)| inner)
    else {
        return (0, 0);
    };

    let mut parts = inner
        .split(',')
        .map(|p| p.trim().parse::<i32>().unwrap_or(0));
    let size = parts.next().unwrap_or(0);
    let scale = parts.next().unwrap_or(0);
    (size, scale)
}
