use std::fmt;

use crate::{
    auth::AuthHandle,
    models::Role,
    routes::{Route, RouteMeta, SIGN_IN_ROUTE},
};

/// RefreshFailurePolicy
///
/// What the guard does when the role refresh for a restricted route fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshFailurePolicy {
    /// Treat the session as stale and send the user to sign in again.
    #[default]
    RedirectToSignIn,
    /// Refuse the navigation.
    Deny,
}

/// DenyReason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The refreshed role is not allowed on the target route.
    Unauthorized,
    /// The role could not be refreshed and the policy is `Deny`.
    RefreshFailed(String),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Unauthorized => f.write_str("unauthorized"),
            DenyReason::RefreshFailed(message) => write!(f, "role refresh failed: {message}"),
        }
    }
}

/// NavigationDecision
///
/// The guard's verdict for one transition. Returned as a value so the host
/// router handles all three outcomes the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Proceed,
    /// Go to the named route instead.
    Redirect { to: String },
    Deny(DenyReason),
}

impl NavigationDecision {
    fn sign_in() -> Self {
        NavigationDecision::Redirect {
            to: SIGN_IN_ROUTE.to_string(),
        }
    }
}

/// Whether `role` is one of the roles `meta` lets in.
pub fn role_allows(role: Option<Role>, meta: &RouteMeta) -> bool {
    match role {
        Some(Role::Admin) => meta.admin,
        Some(Role::Librarian) => meta.librarian,
        _ => false,
    }
}

/// NavigationGuard
///
/// Runs before every route transition. Stateless across calls; the only shared
/// state it touches is the injected `AuthContext`, whose role it refreshes when
/// a restricted route is requested.
#[derive(Clone)]
pub struct NavigationGuard {
    auth: AuthHandle,
    on_refresh_failure: RefreshFailurePolicy,
}

impl NavigationGuard {
    pub fn new(auth: AuthHandle) -> Self {
        Self {
            auth,
            on_refresh_failure: RefreshFailurePolicy::default(),
        }
    }

    pub fn with_refresh_failure(mut self, policy: RefreshFailurePolicy) -> Self {
        self.on_refresh_failure = policy;
        self
    }

    /// check
    ///
    /// 1. public route: proceed.
    /// 2. no token: redirect to sign-in.
    /// 3. authenticated, unrestricted: proceed.
    /// 4. restricted: refresh the role, proceed if the route flags it, else deny.
    pub async fn check(&self, to: &Route) -> NavigationDecision {
        let meta = &to.meta;

        if !meta.require_auth {
            tracing::debug!(route = %to.name, "public route");
            return NavigationDecision::Proceed;
        }

        if !self.auth.is_authenticated() {
            tracing::info!(route = %to.name, "no session, redirecting to sign-in");
            return NavigationDecision::sign_in();
        }

        if !meta.restricted {
            return NavigationDecision::Proceed;
        }

        let role = match self.auth.refresh().await {
            Ok(role) => role,
            Err(err) => {
                tracing::warn!(route = %to.name, error = %err, "role refresh failed");
                return match self.on_refresh_failure {
                    RefreshFailurePolicy::RedirectToSignIn => NavigationDecision::sign_in(),
                    RefreshFailurePolicy::Deny => {
                        NavigationDecision::Deny(DenyReason::RefreshFailed(err.to_string()))
                    }
                };
            }
        };

        if role_allows(role, meta) {
            tracing::debug!(route = %to.name, role = ?role, "role accepted");
            NavigationDecision::Proceed
        } else {
            tracing::warn!(route = %to.name, role = ?role, "role not allowed on route");
            NavigationDecision::Deny(DenyReason::Unauthorized)
        }
    }
}
