//! Statement identity: what makes two prepare requests "the same".

use std::sync::Arc;

/// Identity of a poolable statement.
///
/// A prepared statement is only reusable for a request that matches it on
/// every field: the SQL text, the catalog and schema it was prepared
/// under, and the options it was created with. Keys are compared
/// structurally; no normalization is applied to the SQL.
///
/// Cloning is cheap: the text fields are shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementKey {
    sql: Arc<str>,
    catalog: Option<Arc<str>>,
    schema: Option<Arc<str>>,
    options: StatementOptions,
}

impl StatementKey {
    /// Key for a plain prepared statement with default options and no
    /// session context.
    pub fn new(sql: impl Into<Arc<str>>) -> Self {
        StatementKey {
            sql: sql.into(),
            catalog: None,
            schema: None,
            options: StatementOptions::default(),
        }
    }

    /// Key the statement under a session catalog.
    pub fn with_catalog(mut self, catalog: impl Into<Arc<str>>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    /// Key the statement under a session schema.
    pub fn with_schema(mut self, schema: impl Into<Arc<str>>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Key the statement under explicit creation options.
    pub fn with_options(mut self, options: StatementOptions) -> Self {
        self.options = options;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn options(&self) -> StatementOptions {
        self.options
    }
}

/// Creation options that partition the pool alongside the SQL text.
///
/// A statement prepared as, say, a scrollable result set cannot stand in
/// for a forward-only one, so every combination pools separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StatementOptions {
    /// Plain prepared statement or stored-procedure call.
    pub kind: StatementKind,
    /// Requested result-set traversal behavior.
    pub result_set: ResultSetKind,
    /// Requested result-set concurrency.
    pub concurrency: Concurrency,
    /// Requested cursor holdability, `None` for the driver default.
    pub holdability: Option<Holdability>,
}

/// How the driver is asked to create the statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// An ordinary prepared statement.
    #[default]
    Prepared,
    /// A callable statement wrapping a stored-procedure invocation.
    Callable,
}

/// Result-set traversal requested at creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResultSetKind {
    #[default]
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

/// Result-set concurrency requested at creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Concurrency {
    #[default]
    ReadOnly,
    Updatable,
}

/// Cursor behavior across a transaction commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Holdability {
    HoldOverCommit,
    CloseAtCommit,
}
