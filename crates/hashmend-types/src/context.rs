use serde::{Deserialize, Serialize};

/// Per-request identity and client metadata, built once at the HTTP
/// boundary and passed explicitly into every component call. No component
/// reaches into ambient session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub user_id: String,
    pub session_id: String,
    pub client_ip: String,
    pub user_agent: String,
}

impl RequestContext {
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        client_ip: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            client_ip: client_ip.into(),
            user_agent: user_agent.into(),
        }
    }
}
