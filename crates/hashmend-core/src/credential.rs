use hashmend_db::models::UserRow;
use hashmend_db::queries::credentials;
use hashmend_db::Database;
use hashmend_types::api::{CharsetReport, ColumnSpec};
use hashmend_types::error::{ServiceError, ServiceResult};
use hashmend_types::verdict::{HashRecord, EXPECTED_HASH_LENGTH};
use rusqlite::Connection;

/// Read/write access to the credential column of the user table, plus the
/// introspection used for environment-level diagnosis.
pub struct CredentialStore<'a> {
    db: &'a Database,
}

impl<'a> CredentialStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn retrieve(&self, user_id: &str) -> ServiceResult<HashRecord> {
        let row = self
            .db
            .get_user_by_id(user_id)?
            .ok_or_else(|| ServiceError::not_found("user", user_id))?;
        Ok(record_from_row(&row))
    }

    /// Column shape of the stored-hash column, with actionable findings.
    /// Deviations are recommendations, never fatal.
    pub fn describe_column(&self) -> ServiceResult<(ColumnSpec, Vec<String>)> {
        let info = self
            .db
            .with_conn(credentials::password_column_info)?
            .ok_or_else(|| {
                ServiceError::Environment("users table has no password column".into())
            })?;
        let (column_type, nullable) = info;

        let spec = ColumnSpec {
            column_type: column_type.clone(),
            nullable,
            collation: None,
        };

        let mut recommendations = Vec::new();
        if nullable {
            recommendations
                .push("password column allows NULL; declare it NOT NULL".to_string());
        }
        if let Some(max) = declared_capacity(&column_type) {
            if max < EXPECTED_HASH_LENGTH {
                recommendations.push(format!(
                    "password column capacity {max} is below the {EXPECTED_HASH_LENGTH} \
                     characters a stored hash needs; widen the column"
                ));
            }
        } else if !is_string_type(&column_type) {
            recommendations.push(format!(
                "password column type '{column_type}' is not a string type; stored hashes \
                 may be silently coerced"
            ));
        }
        Ok((spec, recommendations))
    }

    pub fn describe_charset(&self) -> ServiceResult<(CharsetReport, Vec<String>)> {
        let encoding = self.db.with_conn(credentials::database_encoding)?;
        let report = CharsetReport {
            db_charset: encoding.clone(),
            // SQLite has no per-table or per-column collation catalog;
            // absence reads as "database default".
            db_collation: None,
            table_collation: None,
            column_collation: None,
        };
        let mut recommendations = Vec::new();
        if !encoding.to_ascii_uppercase().starts_with("UTF-8")
            && !encoding.to_ascii_uppercase().starts_with("UTF-16")
        {
            recommendations.push(format!(
                "database encoding '{encoding}' is not a Unicode encoding; hash bytes may \
                 be mangled on write"
            ));
        }
        Ok((report, recommendations))
    }
}

pub fn record_from_row(row: &UserRow) -> HashRecord {
    HashRecord {
        user_id: row.id.clone(),
        email: row.email.clone(),
        raw_hash: row.password.clone(),
        trimmed_hash: row.password.trim().to_string(),
        byte_length: row.password.len(),
        char_length: row.password.chars().count(),
    }
}

/// Transaction-scoped read, for the verify step of a repair.
pub fn read_record(conn: &Connection, user_id: &str) -> ServiceResult<HashRecord> {
    let row = credentials::get_user_by_id(conn, user_id)?
        .ok_or_else(|| ServiceError::not_found("user", user_id))?;
    Ok(record_from_row(&row))
}

/// Transaction-scoped write. Callers own the surrounding transaction and
/// the backup-before-write invariant.
pub fn write_hash(conn: &Connection, user_id: &str, new_hash: &str) -> ServiceResult<()> {
    if !credentials::update_hash(conn, user_id, new_hash)? {
        return Err(ServiceError::not_found("user", user_id));
    }
    Ok(())
}

fn is_string_type(column_type: &str) -> bool {
    let upper = column_type.to_ascii_uppercase();
    upper.starts_with("TEXT")
        || upper.starts_with("VARCHAR")
        || upper.starts_with("CHAR")
        || upper.starts_with("CLOB")
}

/// Declared capacity of a `VARCHAR(n)`/`CHAR(n)` style type, if any.
/// Bare TEXT is unbounded and returns None.
fn declared_capacity(column_type: &str) -> Option<usize> {
    let open = column_type.find('(')?;
    let close = column_type.find(')')?;
    column_type.get(open + 1..close)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_parsing() {
        assert_eq!(declared_capacity("VARCHAR(255)"), Some(255));
        assert_eq!(declared_capacity("CHAR(40)"), Some(40));
        assert_eq!(declared_capacity("TEXT"), None);
    }

    #[test]
    fn retrieve_surfaces_byte_vs_char_metadata() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "a@example.com", "caf\u{e9}hash", "customer")
            .unwrap();
        let record = CredentialStore::new(&db).retrieve("u1").unwrap();
        assert_eq!(record.char_length, 8);
        assert_eq!(record.byte_length, 9);
        assert!(record.has_encoding_mismatch());
    }

    #[test]
    fn retrieve_missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = CredentialStore::new(&db).retrieve("ghost").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }
}
