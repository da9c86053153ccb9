use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use hashmend_core::events::{EventLogger, LogLevel};
use hashmend_types::context::RequestContext;
use hashmend_types::error::ServiceError;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::failure::ApiFailure;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub session_id: String,
    pub role: String,
    pub exp: usize,
}

/// Extract and validate the admin session JWT, then build the
/// per-request context every component call receives. Missing token,
/// bad token, and insufficient role all produce the same generic denial;
/// the reason lives in the server-side log next to the correlation id.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiFailure> {
    let ctx = context_from_headers(&req, "", "");

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let claims = token.and_then(|t| {
        decode::<Claims>(
            t,
            &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .ok()
        .map(|d| d.claims)
    });

    let claims = match claims {
        Some(c) if c.role == "admin" => c,
        other => {
            let reason = if other.is_none() {
                "missing or invalid session token"
            } else {
                "non-admin role"
            };
            let correlation_id = Uuid::new_v4().to_string();
            EventLogger::new(&state.db).log(
                &ctx,
                "access_denied",
                None,
                serde_json::json!({ "reason": reason, "correlation_id": correlation_id }),
                LogLevel::Warning,
            );
            return Err(ServiceError::AccessDenied { correlation_id }.into());
        }
    };
    let ctx = context_from_headers(&req, &claims.sub, &claims.session_id);
    req.extensions_mut().insert(ctx);
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Client metadata comes from headers; this service sits behind the
/// storefront's reverse proxy, which sets X-Forwarded-For.
pub fn context_from_headers(req: &Request, user_id: &str, session_id: &str) -> RequestContext {
    let ip = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    RequestContext::new(user_id, session_id, ip, user_agent)
}
