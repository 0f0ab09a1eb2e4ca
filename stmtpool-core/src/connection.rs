use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::driver::StatementDriver;
use crate::error::Result;
use crate::key::{StatementKey, StatementKind, StatementOptions};
use crate::pool::{PoolMetricsSnapshot, PoolOptions, StatementPool};
use crate::statement::PooledStatement;

/// Session context mixed into every key the connection builds.
#[derive(Debug, Default)]
struct SessionContext {
    catalog: Option<Arc<str>>,
    schema: Option<Arc<str>>,
}

/// A connection-scoped facade that pools the statements prepared
/// through it.
///
/// Statements are keyed by their SQL text, the session catalog and
/// schema at prepare time, and their creation options. Changing the
/// catalog or schema leaves statements pooled under the old context
/// cached; they are reused once the context matches again.
///
/// Threads may share one `PoolingConnection`. Dropping it tears the
/// pool down and closes every pooled statement.
pub struct PoolingConnection<D: StatementDriver> {
    pool: StatementPool<D>,
    context: Mutex<SessionContext>,
}

impl<D: StatementDriver> PoolingConnection<D> {
    /// Wrap `driver` with default [`PoolOptions`].
    pub fn new(driver: D) -> Self {
        Self::with_options(driver, PoolOptions::new())
    }

    pub fn with_options(driver: D, options: PoolOptions) -> Self {
        PoolingConnection {
            pool: options.build(driver),
            context: Mutex::new(SessionContext::default()),
        }
    }

    /// Check out the pooled statement for `sql` under the current
    /// session context, preparing one on a cache miss.
    pub fn prepare(&self, sql: impl Into<Arc<str>>) -> Result<PooledStatement<D>> {
        self.prepare_with(sql, StatementOptions::default())
    }

    /// Like [`prepare`][Self::prepare], with explicit creation options.
    /// Every distinct option set pools separately.
    pub fn prepare_with(
        &self,
        sql: impl Into<Arc<str>>,
        options: StatementOptions,
    ) -> Result<PooledStatement<D>> {
        self.pool.prepare(self.key_for(sql.into(), options))
    }

    /// Check out a callable statement (a stored-procedure call).
    pub fn prepare_call(&self, sql: impl Into<Arc<str>>) -> Result<PooledStatement<D>> {
        self.prepare_with(
            sql,
            StatementOptions {
                kind: StatementKind::Callable,
                ..StatementOptions::default()
            },
        )
    }

    fn key_for(&self, sql: Arc<str>, options: StatementOptions) -> StatementKey {
        let context = self.context.lock();
        let mut key = StatementKey::new(sql).with_options(options);
        if let Some(catalog) = &context.catalog {
            key = key.with_catalog(Arc::clone(catalog));
        }
        if let Some(schema) = &context.schema {
            key = key.with_schema(Arc::clone(schema));
        }
        key
    }

    /// Set the session catalog. Statements prepared from now on are
    /// keyed under it.
    pub fn set_catalog(&self, catalog: impl Into<Arc<str>>) {
        self.context.lock().catalog = Some(catalog.into());
    }

    pub fn catalog(&self) -> Option<Arc<str>> {
        self.context.lock().catalog.clone()
    }

    /// Set the session schema. Statements prepared from now on are keyed
    /// under it.
    pub fn set_schema(&self, schema: impl Into<Arc<str>>) {
        self.context.lock().schema = Some(schema.into());
    }

    pub fn schema(&self) -> Option<Arc<str>> {
        self.context.lock().schema.clone()
    }

    /// Number of statements currently checked out.
    pub fn active_statements(&self) -> usize {
        self.pool.active_count()
    }

    /// Number of idle statements cached in the pool.
    pub fn idle_statements(&self) -> usize {
        self.pool.idle_count()
    }

    pub fn max_open(&self) -> i64 {
        self.pool.max_open()
    }

    /// Change the statement ceiling at runtime; see
    /// [`StatementPool::set_max_open`].
    pub fn set_max_open(&self, max_open: i64) {
        self.pool.set_max_open(max_open);
    }

    pub fn metrics(&self) -> PoolMetricsSnapshot {
        self.pool.metrics()
    }

    /// Destroy every pooled statement while keeping the connection
    /// usable; see [`StatementPool::invalidate_all`].
    pub fn invalidate_all(&self) -> Result<()> {
        self.pool.invalidate_all()
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// The pool behind this connection.
    pub fn pool(&self) -> &StatementPool<D> {
        &self.pool
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &D {
        self.pool.driver()
    }

    /// Close the connection's statement pool.
    ///
    /// Every pooled statement is destroyed, outstanding handles observe
    /// [`Error::StatementClosed`][crate::Error::StatementClosed], and
    /// further prepares fail. The first driver error encountered is
    /// returned; destruction continues regardless.
    pub fn close(self) -> Result<()> {
        self.pool.close_all()
    }
}

impl<D: StatementDriver> Drop for PoolingConnection<D> {
    fn drop(&mut self) {
        if let Err(error) = self.pool.close_all() {
            tracing::warn!(
                target: "stmtpool::pool",
                %error,
                "error closing pooled statements"
            );
        }
    }
}

impl<D: StatementDriver> Debug for PoolingConnection<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let context = self.context.lock();
        f.debug_struct("PoolingConnection")
            .field("pool", &self.pool)
            .field("catalog", &context.catalog)
            .field("schema", &context.schema)
            .finish()
    }
}
