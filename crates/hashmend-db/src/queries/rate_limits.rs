use anyhow::Result;
use rusqlite::Connection;

/// Outcome of one atomic window increment.
pub struct WindowState {
    pub allowed: bool,
    pub request_count: i64,
    pub window_start: i64,
}

/// Purge-then-increment for one (ip, action) key.
///
/// The increment is a conditional UPDATE (`request_count < limit`), so two
/// concurrent requests can never both slip past the cap by racing a
/// read-then-write: the row either increments or it doesn't.
pub fn check_and_increment(
    conn: &Connection,
    ip: &str,
    action_type: &str,
    user_id: Option<&str>,
    limit: i64,
    window_secs: i64,
    now: i64,
) -> Result<WindowState> {
    conn.execute(
        "DELETE FROM rate_limits
         WHERE ip = ?1 AND action_type = ?2 AND window_start <= ?3",
        rusqlite::params![ip, action_type, now - window_secs],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO rate_limits (ip, action_type, user_id, request_count, window_start)
         VALUES (?1, ?2, ?3, 0, ?4)",
        rusqlite::params![ip, action_type, user_id, now],
    )?;

    let changed = conn.execute(
        "UPDATE rate_limits
         SET request_count = request_count + 1
         WHERE ip = ?1 AND action_type = ?2 AND request_count < ?3",
        rusqlite::params![ip, action_type, limit],
    )?;

    let (request_count, window_start): (i64, i64) = conn.query_row(
        "SELECT request_count, window_start FROM rate_limits
         WHERE ip = ?1 AND action_type = ?2",
        rusqlite::params![ip, action_type],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;

    Ok(WindowState {
        allowed: changed == 1,
        request_count,
        window_start,
    })
}
