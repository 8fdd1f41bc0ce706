use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts, HeaderMap};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// In-memory session store mapping an opaque token to the account it
/// authenticates. Sessions live for the lifetime of the process.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, String>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session bound to the given account and return its token
    pub fn open(&self, child_id: &str) -> Uuid {
        let token = Uuid::new_v4();
        self.inner
            .write()
            .expect("session store lock poisoned")
            .insert(token, child_id.to_string());
        info!("Opened session for account: {}", child_id);
        token
    }

    /// Resolve a token to the account it authenticates, if any
    pub fn resolve(&self, token: Uuid) -> Option<String> {
        self.inner
            .read()
            .expect("session store lock poisoned")
            .get(&token)
            .cloned()
    }

    /// Drop a session. Unconditional; an unknown token is a no-op.
    pub fn close(&self, token: Uuid) {
        self.inner
            .write()
            .expect("session store lock poisoned")
            .remove(&token);
    }
}

/// Extract the session token from the request's Cookie headers
pub fn session_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, token)| token.parse().ok())
}

/// The authenticated account for the current request. Extraction fails with
/// a redirect to /login when no valid session accompanies the request, so
/// handlers taking this argument are gated on being logged in.
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentAccount
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = SessionStore::from_ref(state);
        let token = session_token(&parts.headers).ok_or(AppError::Unauthenticated)?;
        let child_id = sessions.resolve(token).ok_or(AppError::Unauthenticated)?;
        Ok(CurrentAccount(child_id))
    }
}
