use anyhow::Result;
use rusqlite::Connection;

use crate::Database;

pub struct NewLogEntry<'a> {
    pub event_type: &'a str,
    pub category: &'a str,
    pub level: &'a str,
    pub user_id: Option<&'a str>,
    pub session_id: Option<&'a str>,
    pub ip: &'a str,
    pub user_agent: Option<&'a str>,
    pub details: &'a str,
    pub created_at: i64,
}

pub fn insert(conn: &Connection, e: &NewLogEntry<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO auth_logs
            (event_type, category, level, user_id, session_id, ip, user_agent, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            e.event_type,
            e.category,
            e.level,
            e.user_id,
            e.session_id,
            e.ip,
            e.user_agent,
            e.details,
            e.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Events of one type from one IP since `since` — threshold-check input.
pub fn count_recent_by_ip(
    conn: &Connection,
    event_type: &str,
    ip: &str,
    since: i64,
) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM auth_logs
         WHERE event_type = ?1 AND ip = ?2 AND created_at >= ?3",
        rusqlite::params![event_type, ip, since],
        |r| r.get(0),
    )?;
    Ok(count)
}

pub fn count_recent_by_type(conn: &Connection, event_type: &str, since: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM auth_logs WHERE event_type = ?1 AND created_at >= ?2",
        rusqlite::params![event_type, since],
        |r| r.get(0),
    )?;
    Ok(count)
}

pub fn total_since(conn: &Connection, since: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM auth_logs WHERE created_at >= ?1",
        [since],
        |r| r.get(0),
    )?;
    Ok(count)
}

pub fn counts_by_column(
    conn: &Connection,
    column: LogGroup,
    since: i64,
) -> Result<Vec<(String, i64)>> {
    let sql = match column {
        LogGroup::Category => {
            "SELECT category, COUNT(*) FROM auth_logs
             WHERE created_at >= ?1 GROUP BY category ORDER BY COUNT(*) DESC"
        }
        LogGroup::Level => {
            "SELECT level, COUNT(*) FROM auth_logs
             WHERE created_at >= ?1 GROUP BY level ORDER BY COUNT(*) DESC"
        }
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([since], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Grouping axes for the stats queries; a closed set keeps the SQL static.
#[derive(Clone, Copy)]
pub enum LogGroup {
    Category,
    Level,
}

pub fn top_ips(conn: &Connection, since: i64, limit: u32) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT ip, COUNT(*) FROM auth_logs
         WHERE created_at >= ?1
         GROUP BY ip ORDER BY COUNT(*) DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![since, limit], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Database {
    pub fn insert_auth_log(&self, entry: &NewLogEntry<'_>) -> Result<i64> {
        self.with_conn_mut(|conn| insert(conn, entry))
    }
}
