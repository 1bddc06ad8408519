use thiserror::Error;

use crate::{
    guard::{DenyReason, NavigationDecision, NavigationGuard},
    routes::{Route, RouteTable},
};

/// NavigationError
///
/// Every way a navigation can end without reaching the requested page. In all
/// cases the navigator's current route is left as it was.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("no route matches {0:?}")]
    NotFound(String),

    #[error("redirect to unknown route {0:?}")]
    UnknownRoute(String),

    #[error("redirect loop while navigating to {0:?}")]
    RedirectLoop(String),

    #[error("navigation denied: {0}")]
    Denied(DenyReason),
}

/// Navigator
///
/// The host router: owns the current route and applies guard decisions.
/// A `Deny` cancels the transition cleanly; a `Redirect` is followed once.
pub struct Navigator {
    routes: RouteTable,
    guard: NavigationGuard,
    current: Option<Route>,
}

impl Navigator {
    pub fn new(routes: RouteTable, guard: NavigationGuard) -> Self {
        Self {
            routes,
            guard,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Route> {
        self.current.as_ref()
    }

    /// navigate
    ///
    /// Resolves `path`, runs the guard, and on success makes the landed route
    /// current. The returned route is where navigation actually ended, which
    /// differs from `path` after a redirect.
    ///
    /// # Errors
    /// See `NavigationError`; the current route is unchanged on error.
    pub async fn navigate(&mut self, path: &str) -> Result<&Route, NavigationError> {
        let target = self
            .routes
            .resolve(path)
            .cloned()
            .ok_or_else(|| NavigationError::NotFound(path.to_string()))?;

        let landed = match self.guard.check(&target).await {
            NavigationDecision::Proceed => target,
            NavigationDecision::Deny(reason) => return Err(NavigationError::Denied(reason)),
            NavigationDecision::Redirect { to } => {
                let redirect = self
                    .routes
                    .by_name(&to)
                    .cloned()
                    .ok_or(NavigationError::UnknownRoute(to))?;
                match self.guard.check(&redirect).await {
                    NavigationDecision::Proceed => redirect,
                    NavigationDecision::Deny(reason) => {
                        return Err(NavigationError::Denied(reason));
                    }
                    NavigationDecision::Redirect { .. } => {
                        return Err(NavigationError::RedirectLoop(path.to_string()));
                    }
                }
            }
        };

        tracing::info!(requested = path, landed = %landed.path, "navigated");
        Ok(self.current.insert(landed))
    }
}
