use serde::{Deserialize, Serialize};

/// Route name the guard redirects unauthenticated users to.
pub const SIGN_IN_ROUTE: &str = "signin";

/// RouteMeta
///
/// Authorization metadata declared per route. Adding a role-gated page only
/// requires declaring these flags; the guard reads nothing else.
///
/// Missing keys default to `false`, so a route with no metadata is public.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteMeta {
    /// The route needs a signed-in session.
    pub require_auth: bool,
    /// The route additionally needs one of the roles flagged below.
    #[serde(alias = "restringed")]
    pub restricted: bool,
    /// Admins may enter a restricted route.
    pub admin: bool,
    /// Librarians may enter a restricted route.
    pub librarian: bool,
}

impl RouteMeta {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self {
            require_auth: true,
            ..Self::default()
        }
    }

    /// A restricted route open to the flagged roles.
    pub fn restricted(admin: bool, librarian: bool) -> Self {
        Self {
            require_auth: true,
            restricted: true,
            admin,
            librarian,
        }
    }
}

/// Route
///
/// One entry of the route table. `component` names the view to render and is
/// opaque to the navigation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub name: String,
    pub component: String,
    #[serde(default)]
    pub meta: RouteMeta,
}

impl Route {
    pub fn new(path: &str, name: &str, component: &str, meta: RouteMeta) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            component: component.to_string(),
            meta,
        }
    }
}

/// RouteTable
///
/// The ordered list of routes exposed to the navigator. Lookups return the
/// first match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// default_routes
    ///
    /// The library portal's pages: public home, sign-in, sign-up and author
    /// table, plus the user table restricted to admins.
    pub fn default_routes() -> Self {
        Self::new(vec![
            Route::new("/", "home", "HomeView", RouteMeta::public()),
            Route::new("/auth/signin", SIGN_IN_ROUTE, "AuthSignInView", RouteMeta::public()),
            Route::new("/auth/signup", "signup", "AuthSignUpView", RouteMeta::public()),
            Route::new("/author", "authorTable", "AuthorTableView", RouteMeta::public()),
            Route::new("/user", "userTable", "UserTableView", RouteMeta::restricted(true, false)),
        ])
    }

    /// Match a path exactly, ignoring a trailing slash (except on `/`).
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        let wanted = normalize(path);
        self.routes.iter().find(|route| normalize(&route.path) == wanted)
    }

    pub fn by_name(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}
