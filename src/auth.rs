use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    error::ClientError,
    models::Role,
    transport::{ApiRequest, TransportState},
};

// 1. RoleSource Contract
/// RoleSource
///
/// Where `AuthContext::refresh` gets the current role from. The backend is the
/// authority for roles; the client never derives one locally.
#[async_trait]
pub trait RoleSource: Send + Sync {
    /// Fetch the role bound to `token`. `Ok(None)` means the account has no role.
    async fn fetch_role(&self, token: &str) -> Result<Option<Role>, ClientError>;
}

/// RefreshResponse
///
/// Body of the role refresh endpoint. The role arrives as a raw string so an
/// unknown value degrades to "no role" instead of failing the refresh.
#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    role: Option<String>,
}

// 2. The Real Implementation (backend endpoint)
/// HttpRoleSource
///
/// Calls `GET {refresh_path}` with the bearer token and reads `role` from the
/// JSON response.
pub struct HttpRoleSource {
    transport: TransportState,
    refresh_path: String,
}

impl HttpRoleSource {
    pub fn new(transport: TransportState, refresh_path: impl Into<String>) -> Self {
        Self {
            transport,
            refresh_path: refresh_path.into(),
        }
    }
}

#[async_trait]
impl RoleSource for HttpRoleSource {
    async fn fetch_role(&self, token: &str) -> Result<Option<Role>, ClientError> {
        let body = self
            .transport
            .send(ApiRequest::get(self.refresh_path.as_str()).bearer(token))
            .await?;
        let response: RefreshResponse = serde_json::from_value(body)?;

        Ok(response.role.and_then(|raw| match raw.parse::<Role>() {
            Ok(role) => Some(role),
            Err(reason) => {
                tracing::warn!(%reason, "ignoring role returned by refresh");
                None
            }
        }))
    }
}

// 3. The Mock Implementation (For Tests)
/// StaticRoleSource
///
/// Answers every refresh with a fixed role (or a fixed failure) and counts how
/// often it was asked.
#[derive(Clone)]
pub struct StaticRoleSource {
    outcome: Arc<Mutex<Result<Option<Role>, String>>>,
    calls: Arc<Mutex<usize>>,
}

impl StaticRoleSource {
    pub fn new(role: Option<Role>) -> Self {
        Self {
            outcome: Arc::new(Mutex::new(Ok(role))),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Arc::new(Mutex::new(Err(message.to_string()))),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Change the role returned by subsequent refreshes.
    pub fn set_role(&self, role: Option<Role>) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Ok(role);
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RoleSource for StaticRoleSource {
    async fn fetch_role(&self, _token: &str) -> Result<Option<Role>, ClientError> {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .map_err(ClientError::Transport)
    }
}

#[derive(Debug, Default)]
struct Session {
    token: Option<String>,
    role: Option<Role>,
}

/// AuthContext
///
/// The session shared by the navigation guard and every entity service: an
/// optional bearer token and the last role the backend reported.
///
/// No lock is held across an `.await`, so a refresh racing with another
/// refresh resolves last-writer-wins and readers may briefly see a stale role.
pub struct AuthContext {
    session: RwLock<Session>,
    roles: Arc<dyn RoleSource>,
}

/// AuthHandle
///
/// The handle type injected into the guard and the services.
pub type AuthHandle = Arc<AuthContext>;

impl AuthContext {
    pub fn new(roles: Arc<dyn RoleSource>) -> Self {
        Self {
            session: RwLock::new(Session::default()),
            roles,
        }
    }

    pub fn with_token(roles: Arc<dyn RoleSource>, token: impl Into<String>) -> Self {
        let context = Self::new(roles);
        context.sign_in(token);
        context
    }

    pub fn into_handle(self) -> AuthHandle {
        Arc::new(self)
    }

    pub fn token(&self) -> Option<String> {
        self.read(|session| session.token.clone())
    }

    pub fn role(&self) -> Option<Role> {
        self.read(|session| session.role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.read(|session| session.token.is_some())
    }

    /// Start a session with `token`. The role is unknown until the next refresh.
    pub fn sign_in(&self, token: impl Into<String>) {
        self.write(|session| {
            session.token = Some(token.into());
            session.role = None;
        });
    }

    pub fn sign_out(&self) {
        self.write(|session| *session = Session::default());
    }

    /// Overwrite the cached role, e.g. from a login response.
    pub fn set_role(&self, role: Option<Role>) {
        self.write(|session| session.role = role);
    }

    /// refresh
    ///
    /// Re-fetches the role from the `RoleSource` and stores it. Without a token
    /// there is nothing to refresh: the role is cleared and no call is made.
    ///
    /// # Errors
    /// Propagates the role source failure; the cached role is left unchanged.
    pub async fn refresh(&self) -> Result<Option<Role>, ClientError> {
        let Some(token) = self.token() else {
            self.set_role(None);
            return Ok(None);
        };

        let role = self.roles.fetch_role(&token).await?;
        // The session may have been signed out while the refresh was in flight.
        self.write(|session| {
            if session.token.as_deref() == Some(token.as_str()) {
                session.role = role;
            }
        });
        tracing::debug!(role = ?role, "role refreshed");
        Ok(role)
    }

    fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        let guard = self.session.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut Session)) {
        let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

