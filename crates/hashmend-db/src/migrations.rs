use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("DB: running migration v1 (credential integrity schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'customer',
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE hash_backups (
                id                   TEXT PRIMARY KEY,
                user_id              TEXT NOT NULL REFERENCES users(id),
                email                TEXT NOT NULL,
                original_hash        TEXT NOT NULL,
                hash_length          INTEGER NOT NULL,
                corruption_detected  INTEGER NOT NULL DEFAULT 0,
                corruption_types     TEXT NOT NULL DEFAULT '',
                corruption_severity  TEXT NOT NULL DEFAULT 'none',
                reason               TEXT NOT NULL,
                created_by           TEXT NOT NULL,
                rollback_performed   INTEGER NOT NULL DEFAULT 0,
                rollback_at          TEXT,
                created_at           TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_backups_user
                ON hash_backups(user_id, created_at);

            CREATE TABLE hash_audit_log (
                id                   TEXT PRIMARY KEY,
                user_id              TEXT NOT NULL,
                action_type          TEXT NOT NULL,
                old_hash_prefix      TEXT,
                new_hash_prefix      TEXT,
                backup_id            TEXT REFERENCES hash_backups(id),
                corruption_detected  INTEGER NOT NULL DEFAULT 0,
                corruption_types     TEXT,
                reason               TEXT,
                performed_by         TEXT NOT NULL,
                ip                   TEXT NOT NULL,
                user_agent           TEXT NOT NULL,
                created_at           TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_audit_user
                ON hash_audit_log(user_id, created_at);

            CREATE TABLE auth_logs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type  TEXT NOT NULL,
                category    TEXT NOT NULL,
                level       TEXT NOT NULL,
                user_id     TEXT,
                session_id  TEXT,
                ip          TEXT NOT NULL,
                user_agent  TEXT,
                details     TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_auth_logs_created
                ON auth_logs(created_at);
            CREATE INDEX idx_auth_logs_ip
                ON auth_logs(ip, event_type, created_at);

            CREATE TABLE rate_limits (
                ip             TEXT NOT NULL,
                action_type    TEXT NOT NULL,
                user_id        TEXT,
                request_count  INTEGER NOT NULL DEFAULT 0,
                window_start   INTEGER NOT NULL,
                PRIMARY KEY (ip, action_type)
            );

            CREATE TABLE csrf_tokens (
                token_hash  TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                session_id  TEXT NOT NULL,
                action      TEXT NOT NULL,
                created_at  INTEGER NOT NULL,
                expires_at  INTEGER NOT NULL,
                used_at     INTEGER
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
