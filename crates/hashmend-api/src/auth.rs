use axum::{extract::State, response::IntoResponse, Json};
use axum::extract::Request;
use hashmend_core::events::{EventLogger, LogLevel};
use hashmend_core::hashing;
use hashmend_types::api::{ApiEnvelope, LoginRequest, LoginResponse};
use hashmend_types::error::ServiceError;
use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use crate::failure::ApiFailure;
use crate::middleware::{context_from_headers, Claims};
use crate::AppState;

const SESSION_HOURS: i64 = 8;

/// Issue an admin session. Failures log a `login_failed` event (feeding
/// the per-IP threshold check) and leave with the same generic denial
/// regardless of whether the account exists.
pub async fn login(
    State(state): State<AppState>,
    req: Request,
) -> Result<impl IntoResponse, ApiFailure> {
    let ctx = context_from_headers(&req, "", "");
    let body = axum::body::to_bytes(req.into_body(), 64 * 1024)
        .await
        .map_err(|_| ServiceError::validation("unreadable request body"))?;
    let login: LoginRequest = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::validation(format!("invalid login payload: {e}")))?;

    let events = EventLogger::new(&state.db);
    let user = state
        .db
        .get_user_by_email(&login.email)
        .map_err(ServiceError::Store)?;

    let verified = user
        .as_ref()
        .map(|u| hashing::verify_password(&login.password, &u.password))
        .unwrap_or(false);

    let Some(user) = user.filter(|_| verified) else {
        let correlation_id = Uuid::new_v4().to_string();
        events.log(
            &ctx,
            "login_failed",
            None,
            serde_json::json!({ "email": login.email, "correlation_id": correlation_id }),
            LogLevel::Warning,
        );
        return Err(ServiceError::AccessDenied { correlation_id }.into());
    };

    let session_id = Uuid::new_v4().to_string();
    let token = create_token(&state.jwt_secret, &user.id, &session_id, &user.role)
        .map_err(ServiceError::Store)?;

    events.log(
        &ctx,
        "login_success",
        Some(&user.id),
        serde_json::json!({ "email": user.email, "role": user.role }),
        LogLevel::Info,
    );

    Ok(Json(ApiEnvelope::ok(LoginResponse {
        user_id: user.id,
        token,
    })))
}

fn create_token(
    secret: &str,
    user_id: &str,
    session_id: &str,
    role: &str,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        session_id: session_id.to_string(),
        role: role.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(SESSION_HOURS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
