//! In-memory driver and clock for exercising statement pooling without a
//! database.
//!
//! [`MockDriver`] hands out [`MockStatement`]s with process-unique
//! physical ids and records every prepare and close, including the most
//! statements ever open at once. A `MockStatement` clone shares state
//! with the pooled handle, so a test can keep a probe around and observe
//! the pool closing the statement later.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::{Clock, Timestamp};
use crate::driver::StatementDriver;
use crate::key::StatementKey;

/// Error produced by [`MockDriver`] and [`MockStatement`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MockError(pub String);

#[derive(Default)]
struct MockDriverState {
    open: HashSet<u64>,
    high_watermark: usize,
    prepared: u64,
    closed: u64,
    fail_next_prepare: Option<String>,
    fail_next_close: Option<String>,
}

/// An in-memory [`StatementDriver`].
pub struct MockDriver {
    next_id: AtomicU64,
    state: Mutex<MockDriverState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        MockDriver {
            next_id: AtomicU64::new(1),
            state: Mutex::new(MockDriverState::default()),
        }
    }

    /// Physical statements currently open: prepared and not yet closed.
    pub fn open_statements(&self) -> usize {
        self.state.lock().open.len()
    }

    /// The most physical statements ever open at once.
    pub fn high_watermark(&self) -> usize {
        self.state.lock().high_watermark
    }

    /// Total physical prepares so far.
    pub fn prepared(&self) -> u64 {
        self.state.lock().prepared
    }

    /// Total physical closes so far.
    pub fn closed(&self) -> u64 {
        self.state.lock().closed
    }

    /// Make the next `prepare` fail with `message`.
    pub fn fail_next_prepare(&self, message: impl Into<String>) {
        self.state.lock().fail_next_prepare = Some(message.into());
    }

    /// Make the next `close` fail with `message`. The statement is
    /// marked closed regardless, like a driver reporting an error while
    /// tearing the resource down anyway.
    pub fn fail_next_close(&self, message: impl Into<String>) {
        self.state.lock().fail_next_close = Some(message.into());
    }
}

impl StatementDriver for MockDriver {
    type Handle = MockStatement;
    type Error = MockError;

    fn prepare(&self, key: &StatementKey) -> Result<MockStatement, MockError> {
        let mut state = self.state.lock();

        if let Some(message) = state.fail_next_prepare.take() {
            return Err(MockError(message));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        state.prepared += 1;
        state.open.insert(id);
        state.high_watermark = state.high_watermark.max(state.open.len());

        Ok(MockStatement(Arc::new(MockStatementInner {
            id,
            sql: Arc::from(key.sql()),
            closed: AtomicBool::new(false),
            in_use: AtomicBool::new(false),
            executions: AtomicU64::new(0),
        })))
    }

    fn close(&self, handle: MockStatement) -> Result<(), MockError> {
        let mut state = self.state.lock();

        state.open.remove(&handle.0.id);
        state.closed += 1;
        handle.0.closed.store(true, Ordering::Release);

        if let Some(message) = state.fail_next_close.take() {
            return Err(MockError(message));
        }
        Ok(())
    }
}

struct MockStatementInner {
    id: u64,
    sql: Arc<str>,
    closed: AtomicBool,
    in_use: AtomicBool,
    executions: AtomicU64,
}

/// A fake physical prepared statement.
///
/// Clones share state, so a probe kept by a test observes closes
/// performed by the pool on the handle it kept pooled.
#[derive(Clone)]
pub struct MockStatement(Arc<MockStatementInner>);

impl MockStatement {
    /// Driver-assigned physical id; never reused, so two handles with
    /// the same id are the same physical statement.
    pub fn physical_id(&self) -> u64 {
        self.0.id
    }

    pub fn sql(&self) -> &str {
        &self.0.sql
    }

    /// Whether the driver has closed this physical statement.
    pub fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::Acquire)
    }

    /// How many times this physical statement has executed.
    pub fn executions(&self) -> u64 {
        self.0.executions.load(Ordering::Relaxed)
    }

    /// Run the statement; fails once the physical statement is closed.
    pub fn execute(&self) -> Result<(), MockError> {
        if self.is_closed() {
            return Err(MockError(format!(
                "physical statement {} is closed",
                self.0.id
            )));
        }
        self.0.executions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Run the statement while verifying no other thread is inside it,
    /// for tests asserting that a pooled statement is never checked out
    /// twice at once.
    pub fn execute_exclusive(&self) -> Result<(), MockError> {
        if self.0.in_use.swap(true, Ordering::AcqRel) {
            return Err(MockError(format!(
                "physical statement {} is already executing on another thread",
                self.0.id
            )));
        }
        let result = self.execute();
        self.0.in_use.store(false, Ordering::Release);
        result
    }
}

impl std::fmt::Debug for MockStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStatement")
            .field("id", &self.0.id)
            .field("sql", &self.0.sql)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A [`Clock`] tests advance by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(micros: u64) -> Self {
        ManualClock(Arc::new(AtomicU64::new(micros)))
    }

    /// Move the clock forward by `micros`.
    pub fn advance(&self, micros: u64) {
        self.0.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn set(&self, micros: u64) {
        self.0.store(micros, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.0.load(Ordering::Relaxed))
    }
}
