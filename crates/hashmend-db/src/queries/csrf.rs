use anyhow::Result;
use rusqlite::Connection;

pub fn insert(
    conn: &Connection,
    token_hash: &str,
    user_id: &str,
    session_id: &str,
    action: &str,
    created_at: i64,
    expires_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO csrf_tokens (token_hash, user_id, session_id, action, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![token_hash, user_id, session_id, action, created_at, expires_at],
    )?;
    Ok(())
}

/// Atomic validate-and-consume. The WHERE clause carries the whole scope
/// check (owner, session, action, unexpired, unused); setting `used_at`
/// in the same statement closes the replay window between two concurrent
/// validations of the same token.
pub fn consume(
    conn: &Connection,
    token_hash: &str,
    user_id: &str,
    session_id: &str,
    action: &str,
    now: i64,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE csrf_tokens
         SET used_at = ?5
         WHERE token_hash = ?1
           AND user_id = ?2
           AND session_id = ?3
           AND action = ?4
           AND used_at IS NULL
           AND expires_at > ?5",
        rusqlite::params![token_hash, user_id, session_id, action, now],
    )?;
    Ok(changed == 1)
}

pub fn purge_expired(conn: &Connection, now: i64) -> Result<usize> {
    let purged = conn.execute("DELETE FROM csrf_tokens WHERE expires_at <= ?1", [now])?;
    Ok(purged)
}
