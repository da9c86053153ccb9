pub mod analyzer;
pub mod audit;
pub mod backup;
pub mod credential;
pub mod csrf;
pub mod events;
pub mod hashing;
pub mod ratelimit;
pub mod repair;
pub mod validator;

use hashmend_db::Database;
use hashmend_types::error::{ServiceError, ServiceResult};

/// Run a fallible, typed operation inside one database transaction.
///
/// `ServiceError`s raised inside the closure survive the anyhow boundary
/// of `Database::with_tx` and come back out typed; anything else is a
/// store error. Either way a closure error means the transaction rolled
/// back.
pub(crate) fn tx_scope<T>(
    db: &Database,
    f: impl FnOnce(&rusqlite::Transaction) -> ServiceResult<T>,
) -> ServiceResult<T> {
    match db.with_tx(|tx| f(tx).map_err(anyhow::Error::from)) {
        Ok(out) => Ok(out),
        Err(e) => Err(match e.downcast::<ServiceError>() {
            Ok(service) => service,
            Err(other) => ServiceError::Store(other),
        }),
    }
}
