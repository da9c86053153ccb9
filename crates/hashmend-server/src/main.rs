use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use hashmend_api::middleware::require_admin;
use hashmend_api::{auth, diagnostics, AppState, AppStateInner};
use hashmend_core::hashing;
use hashmend_core::ratelimit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hashmend=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("HASHMEND_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("HASHMEND_DB_PATH").unwrap_or_else(|_| "hashmend.db".into());
    let host = std::env::var("HASHMEND_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HASHMEND_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = hashmend_db::Database::open(&PathBuf::from(&db_path))?;

    seed_admin(&db)?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        limiter: RateLimiter::with_defaults(),
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/csrf", post(diagnostics::issue_csrf))
        .route("/admin/diagnostics", post(diagnostics::run_diagnostics))
        .route("/admin/stats", get(diagnostics::get_stats))
        .route("/admin/audit", get(diagnostics::get_audit_trail))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("hashmend server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Bootstrap an admin account from the environment so a fresh deployment
/// can reach the diagnostic surface. No-op when unset or already present.
fn seed_admin(db: &hashmend_db::Database) -> anyhow::Result<()> {
    let (Ok(email), Ok(password)) = (
        std::env::var("HASHMEND_ADMIN_EMAIL"),
        std::env::var("HASHMEND_ADMIN_PASSWORD"),
    ) else {
        return Ok(());
    };

    if db.get_user_by_email(&email)?.is_some() {
        return Ok(());
    }
    let hash = match hashing::generate_verified(&password) {
        Ok(hash) => hash,
        Err(e) => {
            warn!("admin seed skipped, hashing primitive unavailable: {e}");
            return Ok(());
        }
    };
    let id = uuid::Uuid::new_v4().to_string();
    db.create_user(&id, &email, &hash, "admin")?;
    info!("seeded admin account {id}");
    Ok(())
}
