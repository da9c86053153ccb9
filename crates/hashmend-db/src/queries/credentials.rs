use anyhow::Result;
use rusqlite::Connection;

use super::OptionalExt;
use crate::models::UserRow;
use crate::Database;

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        role: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn
        .prepare("SELECT id, email, password, role, created_at FROM users WHERE id = ?1")?;
    stmt.query_row([id], row_to_user).optional()
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn
        .prepare("SELECT id, email, password, role, created_at FROM users WHERE email = ?1")?;
    stmt.query_row([email], row_to_user).optional()
}

pub fn create_user(
    conn: &Connection,
    id: &str,
    email: &str,
    password_hash: &str,
    role: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, password, role) VALUES (?1, ?2, ?3, ?4)",
        (id, email, password_hash, role),
    )?;
    Ok(())
}

/// Single-row hash update. Returns false when the user row is absent.
pub fn update_hash(conn: &Connection, user_id: &str, new_hash: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET password = ?2 WHERE id = ?1",
        (user_id, new_hash),
    )?;
    Ok(changed == 1)
}

pub fn list_users(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, password, role, created_at FROM users
         ORDER BY created_at, id LIMIT ?1 OFFSET ?2",
    )?;
    let rows = stmt
        .query_map([limit, offset], row_to_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Introspect the password column of the users table.
/// SQLite does not expose per-column collation through `table_info`, so
/// the collation slot stays empty here; callers treat that as "default".
pub fn password_column_info(conn: &Connection) -> Result<Option<(String, bool)>> {
    let mut stmt = conn.prepare("SELECT name, type, \"notnull\" FROM pragma_table_info('users')")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;
    for row in rows {
        let (name, col_type, notnull) = row?;
        if name == "password" {
            return Ok(Some((col_type, notnull == 0)));
        }
    }
    Ok(None)
}

pub fn database_encoding(conn: &Connection) -> Result<String> {
    let enc: String = conn.query_row("PRAGMA encoding", [], |r| r.get(0))?;
    Ok(enc)
}

impl Database {
    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| get_user_by_id(conn, id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| get_user_by_email(conn, email))
    }

    pub fn create_user(&self, id: &str, email: &str, password_hash: &str, role: &str) -> Result<()> {
        self.with_conn_mut(|conn| create_user(conn, id, email, password_hash, role))
    }

    pub fn list_users(&self, limit: u32, offset: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| list_users(conn, limit, offset))
    }
}
