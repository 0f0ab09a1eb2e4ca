use stmtpool::testing::{ManualClock, MockDriver, MockStatement};
use stmtpool::{
    Error, PoolOptions, PooledStatement, PoolingConnection, ResultSetKind, StatementKey,
    StatementOptions, Timestamp,
};

fn connection(max_open: i64) -> (PoolingConnection<MockDriver>, ManualClock) {
    let clock = ManualClock::starting_at(1);
    let conn = PoolingConnection::with_options(
        MockDriver::new(),
        PoolOptions::new().max_open(max_open).clock(clock.clone()),
    );
    (conn, clock)
}

/// Grab a shared handle on the physical statement behind `stmt`.
fn probe(stmt: &PooledStatement<MockDriver>) -> MockStatement {
    stmt.lock_handle().unwrap().clone()
}

#[test]
fn reuses_the_statement_for_a_repeated_key() {
    let (conn, _clock) = connection(10);

    let stmt = conn.prepare("SELECT * FROM users WHERE id = ?").unwrap();
    let first = probe(&stmt);
    first.execute().unwrap();
    stmt.close().unwrap();

    let stmt = conn.prepare("SELECT * FROM users WHERE id = ?").unwrap();

    assert_eq!(probe(&stmt).physical_id(), first.physical_id());
    assert_eq!(conn.driver().prepared(), 1);

    // same physical statement, so its execution count carries over
    probe(&stmt).execute().unwrap();
    assert_eq!(first.executions(), 2);
}

#[test]
fn concurrent_requests_get_distinct_statements() {
    let (conn, _clock) = connection(10);

    let a = conn.prepare("SELECT 1").unwrap();
    let b = conn.prepare("SELECT 1").unwrap();

    assert_ne!(probe(&a).physical_id(), probe(&b).physical_id());
    assert_eq!(conn.active_statements(), 2);
}

#[test]
fn capacity_bounds_open_statements() {
    let (conn, clock) = connection(2);

    let a = conn.prepare("SELECT a FROM t").unwrap();
    let b = conn.prepare("SELECT b FROM t").unwrap();
    assert_ne!(probe(&a).physical_id(), probe(&b).physical_id());

    // both slots are checked out: nothing idle to evict
    let err = conn.prepare("SELECT c FROM t").unwrap_err();
    assert!(matches!(err, Error::PoolExhausted { max_open: 2 }));

    // returning one makes room: the non-matching idle statement is
    // evicted to admit the new key
    let b_probe = probe(&b);
    b.close().unwrap();
    clock.advance(1);
    let c = conn.prepare("SELECT c FROM t").unwrap();
    assert!(b_probe.is_closed());
    assert!(!probe(&c).is_closed());
    assert_eq!(conn.driver().open_statements(), 2);

    // a matching idle statement is reused, not evicted
    let a_probe = probe(&a);
    a.close().unwrap();
    let again = conn.prepare("SELECT a FROM t").unwrap();
    assert_eq!(probe(&again).physical_id(), a_probe.physical_id());
}

#[test]
fn evicts_the_least_recently_returned() {
    let (conn, clock) = connection(3);

    let a = conn.prepare("SELECT a FROM t").unwrap();
    let b = conn.prepare("SELECT b FROM t").unwrap();
    let c = conn.prepare("SELECT c FROM t").unwrap();
    let (pa, pb, pc) = (probe(&a), probe(&b), probe(&c));

    // the return order fixes the eviction order: a is oldest
    a.close().unwrap();
    clock.advance(10);
    b.close().unwrap();
    clock.advance(10);
    c.close().unwrap();
    clock.advance(10);

    // admitting a fourth key evicts a
    let _d = conn.prepare("SELECT d FROM t").unwrap();
    assert!(pa.is_closed());
    assert!(pa.execute().is_err());
    assert!(pb.execute().is_ok());
    assert!(pc.execute().is_ok());

    // "a" was destroyed, not cached: preparing it again is a miss,
    // which evicts b, the next oldest
    let a2 = conn.prepare("SELECT a FROM t").unwrap();
    assert_ne!(probe(&a2).physical_id(), pa.physical_id());
    assert!(pb.is_closed());
    assert!(pc.execute().is_ok());
}

#[test]
fn catalog_partitions_the_pool() {
    let (conn, _clock) = connection(10);

    conn.set_catalog("catalog1");
    let stmt = conn.prepare("SELECT 1 FROM dual").unwrap();
    let inner1 = probe(&stmt);
    assert_eq!(stmt.key().catalog(), Some("catalog1"));
    stmt.close().unwrap();

    // same SQL under another catalog is a different pooled statement
    conn.set_catalog("catalog2");
    let stmt = conn.prepare("SELECT 1 FROM dual").unwrap();
    let inner2 = probe(&stmt);
    stmt.close().unwrap();
    assert_ne!(inner1.physical_id(), inner2.physical_id());

    // both stay cached; switching back reuses the first
    assert_eq!(conn.idle_statements(), 2);
    conn.set_catalog("catalog1");
    let stmt = conn.prepare("SELECT 1 FROM dual").unwrap();
    assert_eq!(probe(&stmt).physical_id(), inner1.physical_id());
}

#[test]
fn schema_partitions_the_pool() {
    let (conn, _clock) = connection(10);

    conn.set_schema("app");
    let stmt = conn.prepare("SELECT 1 FROM dual").unwrap();
    let inner1 = probe(&stmt);
    stmt.close().unwrap();

    conn.set_schema("audit");
    let stmt = conn.prepare("SELECT 1 FROM dual").unwrap();
    assert_ne!(probe(&stmt).physical_id(), inner1.physical_id());
    stmt.close().unwrap();

    conn.set_schema("app");
    let stmt = conn.prepare("SELECT 1 FROM dual").unwrap();
    assert_eq!(probe(&stmt).physical_id(), inner1.physical_id());
}

#[test]
fn creation_options_partition_the_pool() {
    let (conn, _clock) = connection(10);

    let plain = conn.prepare("SELECT * FROM logs").unwrap();
    let scroll = conn
        .prepare_with(
            "SELECT * FROM logs",
            StatementOptions {
                result_set: ResultSetKind::ScrollInsensitive,
                ..StatementOptions::default()
            },
        )
        .unwrap();
    let call = conn.prepare_call("SELECT * FROM logs").unwrap();

    let ids = [
        probe(&plain).physical_id(),
        probe(&scroll).physical_id(),
        probe(&call).physical_id(),
    ];
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[0], ids[2]);
    assert_ne!(ids[1], ids[2]);

    // each option set pools separately
    plain.close().unwrap();
    let plain_again = conn.prepare("SELECT * FROM logs").unwrap();
    assert_eq!(probe(&plain_again).physical_id(), ids[0]);
}

#[test]
fn evicted_statements_are_not_resurrected() {
    let (conn, clock) = connection(1);

    let a = conn.prepare("SELECT a FROM t").unwrap();
    let pa = probe(&a);
    a.close().unwrap();
    clock.advance(1);

    let b = conn.prepare("SELECT b FROM t").unwrap();
    assert!(pa.is_closed());
    b.close().unwrap();
    clock.advance(1);

    // the evicted statement's key coming back gets a fresh physical
    // statement, never the destroyed one
    let a2 = conn.prepare("SELECT a FROM t").unwrap();
    assert_ne!(probe(&a2).physical_id(), pa.physical_id());
    assert!(pa.execute().is_err());
}

#[test]
fn reuse_prefers_the_most_recently_returned() {
    let (conn, clock) = connection(10);

    let older = conn.prepare("SELECT 1").unwrap();
    let newer = conn.prepare("SELECT 1").unwrap();
    let p_new = probe(&newer);

    older.close().unwrap();
    clock.advance(10);
    newer.close().unwrap();

    let again = conn.prepare("SELECT 1").unwrap();

    assert_eq!(probe(&again).physical_id(), p_new.physical_id());
    assert_eq!(conn.idle_statements(), 1);
}

#[test]
fn eviction_ties_fall_to_the_lowest_slot_id() {
    let (conn, _clock) = connection(2);

    // the clock never advances, so both returns carry the same stamp
    let a = conn.prepare("SELECT 1").unwrap();
    let b = conn.prepare("SELECT 2").unwrap();
    let (pa, pb) = (probe(&a), probe(&b));
    a.close().unwrap();
    b.close().unwrap();

    let _c = conn.prepare("SELECT 3").unwrap();

    assert!(pa.is_closed());
    assert!(!pb.is_closed());
}

#[test]
fn reuse_ties_fall_to_the_highest_slot_id() {
    let (conn, _clock) = connection(10);

    let a = conn.prepare("SELECT 1").unwrap();
    let b = conn.prepare("SELECT 1").unwrap();
    let pb = probe(&b);
    a.close().unwrap();
    b.close().unwrap();

    let again = conn.prepare("SELECT 1").unwrap();

    assert_eq!(probe(&again).physical_id(), pb.physical_id());
}

#[test]
fn exhaustion_is_immediate_and_recoverable() {
    let (conn, _clock) = connection(1);

    let held = conn.prepare("SELECT 1").unwrap();
    let err = conn.prepare("SELECT 2").unwrap_err();
    assert!(matches!(err, Error::PoolExhausted { max_open: 1 }));

    held.close().unwrap();
    conn.prepare("SELECT 2").unwrap();
}

#[test]
fn zero_capacity_admits_nothing() {
    let (conn, _clock) = connection(0);

    let err = conn.prepare("SELECT 1").unwrap_err();

    assert!(matches!(err, Error::PoolExhausted { max_open: 0 }));
    assert_eq!(conn.driver().prepared(), 0);
}

#[test]
fn negative_max_open_is_unbounded() {
    let (conn, _clock) = connection(-1);

    let stmts: Vec<_> = (0..50)
        .map(|i| conn.prepare(format!("SELECT {i}")).unwrap())
        .collect();
    assert_eq!(conn.active_statements(), 50);

    for stmt in stmts {
        stmt.close().unwrap();
    }

    assert_eq!(conn.idle_statements(), 50);
    assert_eq!(conn.driver().open_statements(), 50);
    assert_eq!(conn.driver().high_watermark(), 50);
}

#[test]
fn invalidate_all_revokes_outstanding_handles() {
    let (conn, _clock) = connection(10);

    let held = conn.prepare("SELECT 1").unwrap();
    let idle = conn.prepare("SELECT 2").unwrap();
    let (p_held, p_idle) = (probe(&held), probe(&idle));
    idle.close().unwrap();

    conn.invalidate_all().unwrap();

    assert!(p_held.is_closed());
    assert!(p_idle.is_closed());
    assert!(held.is_destroyed());
    assert!(matches!(held.lock_handle(), Err(Error::StatementClosed)));
    assert_eq!(conn.active_statements(), 0);
    assert_eq!(conn.idle_statements(), 0);

    // the pool stays usable and starts fresh
    let fresh = conn.prepare("SELECT 1").unwrap();
    assert_ne!(probe(&fresh).physical_id(), p_held.physical_id());

    // returning the dead handle afterwards is a quiet no-op
    held.close().unwrap();
    assert_eq!(conn.active_statements(), 1);
    assert_eq!(conn.idle_statements(), 0);
}

#[test]
fn dropping_the_connection_closes_everything() {
    let (conn, _clock) = connection(10);

    let held = conn.prepare("SELECT 1").unwrap();
    let idle = conn.prepare("SELECT 2").unwrap();
    let (p_held, p_idle) = (probe(&held), probe(&idle));
    idle.close().unwrap();

    let pool = conn.pool().clone();
    drop(conn);

    assert!(p_held.is_closed());
    assert!(p_idle.is_closed());
    assert!(pool.is_closed());
    assert_eq!(pool.driver().open_statements(), 0);
    assert!(matches!(held.lock_handle(), Err(Error::StatementClosed)));

    // prepares on the torn-down pool fail cleanly
    let err = pool.prepare(StatementKey::new("SELECT 3")).unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));

    // returning the orphaned handle cannot fail or panic
    held.close().unwrap();
}

#[test]
fn close_surfaces_the_first_driver_error() {
    let (conn, _clock) = connection(10);

    let a = conn.prepare("SELECT 1").unwrap();
    let pa = probe(&a);
    a.close().unwrap();
    let b = conn.prepare("SELECT 2").unwrap();
    let pb = probe(&b);
    b.close().unwrap();

    let pool = conn.pool().clone();
    conn.driver().fail_next_close("connection torn down");
    let err = conn.close().unwrap_err();

    assert!(matches!(err, Error::Driver(_)));
    // both statements went down regardless
    assert!(pa.is_closed());
    assert!(pb.is_closed());
    assert_eq!(pool.driver().open_statements(), 0);
}

#[test]
fn shrinking_destroys_returned_statements() {
    let (conn, _clock) = connection(2);

    let a = conn.prepare("SELECT 1").unwrap();
    let b = conn.prepare("SELECT 2").unwrap();
    let (pa, pb) = (probe(&a), probe(&b));

    // nothing idle yet, so nothing can be trimmed eagerly
    conn.set_max_open(1);
    assert_eq!(conn.active_statements(), 2);

    // the first return is over capacity and gets closed
    a.close().unwrap();
    assert!(pa.is_closed());
    assert_eq!(conn.idle_statements(), 0);

    // the second one fits
    b.close().unwrap();
    assert!(!pb.is_closed());
    assert_eq!(conn.idle_statements(), 1);
}

#[test]
fn shrinking_trims_idle_statements_oldest_first() {
    let (conn, clock) = connection(3);

    let a = conn.prepare("SELECT 1").unwrap();
    let b = conn.prepare("SELECT 2").unwrap();
    let c = conn.prepare("SELECT 3").unwrap();
    let (pa, pb, pc) = (probe(&a), probe(&b), probe(&c));

    a.close().unwrap();
    clock.advance(1);
    b.close().unwrap();
    clock.advance(1);
    c.close().unwrap();

    conn.set_max_open(1);

    assert!(pa.is_closed());
    assert!(pb.is_closed());
    assert!(!pc.is_closed());
    assert_eq!(conn.idle_statements(), 1);
    assert_eq!(conn.max_open(), 1);
}

#[test]
fn driver_prepare_failures_propagate() {
    let (conn, _clock) = connection(10);

    conn.driver().fail_next_prepare("no such table");
    let err = conn.prepare("SELECT * FROM missing").unwrap_err();

    assert!(matches!(err, Error::Driver(_)));
    assert!(err.to_string().contains("no such table"));
    assert_eq!(conn.active_statements(), 0);
    assert_eq!(conn.idle_statements(), 0);

    // the failure left nothing behind; the next attempt works
    conn.prepare("SELECT * FROM missing").unwrap();
}

#[test]
fn eviction_survives_a_failing_driver_close() {
    let (conn, clock) = connection(1);

    let a = conn.prepare("SELECT 1").unwrap();
    let pa = probe(&a);
    a.close().unwrap();
    clock.advance(1);

    conn.driver().fail_next_close("already gone");
    let b = conn.prepare("SELECT 2").unwrap();

    assert!(pa.is_closed());
    assert_eq!(conn.active_statements(), 1);
    assert_eq!(conn.idle_statements(), 0);
    assert_eq!(conn.driver().open_statements(), 1);

    // and the pool keeps working afterwards
    b.close().unwrap();
    assert_eq!(conn.idle_statements(), 1);
}

#[test]
fn invalidate_destroys_instead_of_caching() {
    let (conn, _clock) = connection(10);

    let stmt = conn.prepare("SELECT 1").unwrap();
    let p = probe(&stmt);
    stmt.invalidate().unwrap();

    assert!(p.is_closed());
    assert_eq!(conn.idle_statements(), 0);

    // the next prepare gets a fresh physical statement
    let again = conn.prepare("SELECT 1").unwrap();
    assert_ne!(probe(&again).physical_id(), p.physical_id());
    assert_eq!(conn.metrics().invalidations, 1);
}

#[test]
fn metrics_count_hits_misses_and_evictions() {
    let (conn, clock) = connection(1);

    let a = conn.prepare("SELECT 1").unwrap(); // miss
    a.close().unwrap();
    clock.advance(1);
    let a = conn.prepare("SELECT 1").unwrap(); // hit
    a.close().unwrap();
    clock.advance(1);
    let _b = conn.prepare("SELECT 2").unwrap(); // miss, evicting "SELECT 1"

    let metrics = conn.metrics();
    assert_eq!(metrics.hits, 1);
    assert_eq!(metrics.misses, 2);
    assert_eq!(metrics.evictions, 1);
    assert_eq!(metrics.destroyed, 1);
    assert_eq!(metrics.active, 1);
    assert_eq!(metrics.idle, 0);
}

#[test]
fn statement_reports_its_key() {
    let (conn, clock) = connection(10);
    conn.set_catalog("main");
    conn.set_schema("public");

    let stmt = conn.prepare("SELECT 1").unwrap();

    assert_eq!(stmt.sql(), "SELECT 1");
    assert_eq!(stmt.key().catalog(), Some("main"));
    assert_eq!(stmt.key().schema(), Some("public"));
    assert_eq!(stmt.key().options(), StatementOptions::default());
    assert_eq!(stmt.created_at(), Timestamp::from_micros(1));
    assert!(!stmt.is_destroyed());

    // a reused statement keeps its original preparation time
    stmt.close().unwrap();
    clock.advance(5);
    let again = conn.prepare("SELECT 1").unwrap();
    assert_eq!(again.created_at(), Timestamp::from_micros(1));
}
