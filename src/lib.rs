use std::sync::Arc;

// --- Module Structure ---

// Session, role refresh and the entity services.
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod transport;

// Client-side routing: route table, guard and the host navigator.
pub mod guard;
pub mod navigator;
pub mod routes;

// --- Public Re-exports ---

pub use auth::{AuthContext, AuthHandle, HttpRoleSource, RoleSource, StaticRoleSource};
pub use config::AppConfig;
pub use error::ClientError;
pub use guard::{DenyReason, NavigationDecision, NavigationGuard, RefreshFailurePolicy};
pub use models::{AuthorRecord, Role};
pub use navigator::{NavigationError, Navigator};
pub use routes::{Route, RouteMeta, RouteTable};
pub use service::{AuthorService, Entity, EntityService};
pub use transport::{HttpTransport, MockTransport, ReqwestTransport, TransportState};

/// PortalState
///
/// Everything a view needs, wired from one `AppConfig`: the shared transport,
/// the session handle, and the author service. The guard and the navigator
/// are built from the same handle so role refreshes are visible everywhere.
#[derive(Clone)]
pub struct PortalState {
    pub transport: TransportState,
    pub auth: AuthHandle,
    pub authors: Arc<AuthorService>,
    pub config: AppConfig,
}

impl PortalState {
    /// from_config
    ///
    /// Builds the reqwest transport, an auth context that refreshes its role
    /// from `config.refresh_path`, and seeds the session with `config.token`.
    ///
    /// # Errors
    /// Fails if the HTTP client cannot be constructed.
    pub fn from_config(config: AppConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(ReqwestTransport::new(&config)?) as TransportState;
        Ok(Self::with_transport(config, transport))
    }

    /// Same wiring as `from_config` over any transport (e.g. `MockTransport`).
    pub fn with_transport(config: AppConfig, transport: TransportState) -> Self {
        let roles = Arc::new(HttpRoleSource::new(
            Arc::clone(&transport),
            config.refresh_path.clone(),
        ));
        let auth = AuthContext::new(roles).into_handle();
        if let Some(token) = &config.token {
            auth.sign_in(token.clone());
        }
        let authors = Arc::new(AuthorService::new(Arc::clone(&transport), Arc::clone(&auth)));

        Self {
            transport,
            auth,
            authors,
            config,
        }
    }

    pub fn guard(&self) -> NavigationGuard {
        NavigationGuard::new(Arc::clone(&self.auth))
            .with_refresh_failure(self.config.refresh_failure)
    }

    /// A navigator over the default route table, starting with no current route.
    pub fn navigator(&self) -> Navigator {
        Navigator::new(RouteTable::default_routes(), self.guard())
    }
}
