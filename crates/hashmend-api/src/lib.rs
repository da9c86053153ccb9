pub mod auth;
pub mod command;
pub mod diagnostics;
pub mod failure;
pub mod middleware;

use std::sync::Arc;

use hashmend_core::ratelimit::RateLimiter;
use hashmend_db::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub limiter: RateLimiter,
}
