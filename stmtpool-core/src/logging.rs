/// Whether anything downstream listens for the pool's statement-level
/// events.
///
/// Checked before building a summary, so a disabled logger costs the
/// hot path nothing.
pub(crate) fn pool_events_enabled() -> bool {
    log::log_enabled!(target: "stmtpool::pool", log::Level::Debug)
}

pub(crate) fn sql_summary(sql: &str) -> String {
    // Just the leading words; enough to identify the statement in a
    // log line without echoing the whole text.
    sql.split_whitespace()
        .take(3)
        .collect::<Vec<&str>>()
        .join(" ")
}
