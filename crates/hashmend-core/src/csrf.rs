use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hashmend_db::queries::csrf;
use hashmend_db::Database;
use hashmend_types::context::RequestContext;
use hashmend_types::error::ServiceResult;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const DEFAULT_TTL_SECS: i64 = 15 * 60;
const TOKEN_BYTES: usize = 32;

/// Single-use, action-scoped tokens bound to one (user, session). Only a
/// SHA-256 digest of the token is stored; the opaque value exists once,
/// in the issue response.
pub struct CsrfTokenService<'a> {
    db: &'a Database,
}

impl<'a> CsrfTokenService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn issue(
        &self,
        ctx: &RequestContext,
        action: &str,
        ttl_secs: i64,
    ) -> ServiceResult<(String, DateTime<Utc>)> {
        let mut raw = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = URL_SAFE_NO_PAD.encode(raw);
        let digest = digest_of(&token);

        let now = Utc::now();
        let expires = now + Duration::seconds(ttl_secs);
        self.db.with_conn_mut(|conn| {
            // Opportunistic cleanup; expired rows carry no value.
            csrf::purge_expired(conn, now.timestamp())?;
            csrf::insert(
                conn,
                &digest,
                &ctx.user_id,
                &ctx.session_id,
                action,
                now.timestamp(),
                expires.timestamp(),
            )
        })?;
        Ok((token, expires))
    }

    /// Validate and consume in one atomic store operation. False for
    /// every failure mode: missing, expired, replayed, or scoped to a
    /// different user, session, or action. Callers translate false into
    /// a generic denial; the distinction stays server-side.
    pub fn consume(&self, ctx: &RequestContext, action: &str, token: &str) -> ServiceResult<bool> {
        let digest = digest_of(token);
        let now = Utc::now().timestamp();
        let ok = self.db.with_conn_mut(|conn| {
            csrf::consume(conn, &digest, &ctx.user_id, &ctx.session_id, action, now)
        })?;
        Ok(ok)
    }
}

fn digest_of(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
