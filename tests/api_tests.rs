use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    routing::{get, patch},
};
use library_portal::{
    AppConfig, AuthorRecord, ClientError, DenyReason, NavigationError, PortalState, Role,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

// --- Fake backend ---

#[derive(Debug, Clone)]
struct SeenRequest {
    method: &'static str,
    accept: Option<String>,
    content_type: Option<String>,
    authorization: Option<String>,
    request_id: Option<String>,
    body: Option<Value>,
}

#[derive(Default)]
struct BackendData {
    authors: Vec<Value>,
    next_id: i64,
    seen: Vec<SeenRequest>,
}

#[derive(Clone, Default)]
struct Backend {
    data: Arc<Mutex<BackendData>>,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

impl Backend {
    fn record(&self, method: &'static str, headers: &HeaderMap, body: Option<Value>) {
        self.data.lock().unwrap().seen.push(SeenRequest {
            method,
            accept: header_value(headers, header::ACCEPT.as_str()),
            content_type: header_value(headers, header::CONTENT_TYPE.as_str()),
            authorization: header_value(headers, header::AUTHORIZATION.as_str()),
            request_id: header_value(headers, "x-request-id"),
            body,
        });
    }

    fn seen(&self) -> Vec<SeenRequest> {
        self.data.lock().unwrap().seen.clone()
    }

    fn authors(&self) -> Vec<Value> {
        self.data.lock().unwrap().authors.clone()
    }
}

fn rejection(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({"error": true, "message": message})))
}

fn authorized(headers: &HeaderMap) -> bool {
    matches!(
        header_value(headers, header::AUTHORIZATION.as_str()).as_deref(),
        Some("Bearer admin-token" | "Bearer librarian-token")
    )
}

async fn list_authors(State(backend): State<Backend>, headers: HeaderMap) -> Json<Value> {
    backend.record("GET", &headers, None);
    Json(Value::Array(backend.authors()))
}

async fn create_author(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    backend.record("POST", &headers, Some(body.clone()));
    if !authorized(&headers) {
        return rejection(StatusCode::UNAUTHORIZED, "invalid token");
    }
    if body["name"] == "Duplicate" {
        return rejection(StatusCode::CONFLICT, "dup");
    }

    let mut data = backend.data.lock().unwrap();
    data.next_id += 1;
    let mut created = body;
    created["id"] = json!(data.next_id);
    data.authors.push(created.clone());
    (StatusCode::CREATED, Json(created))
}

async fn update_author(
    State(backend): State<Backend>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    backend.record("PATCH", &headers, Some(body.clone()));
    if !authorized(&headers) {
        return rejection(StatusCode::UNAUTHORIZED, "invalid token");
    }

    let mut data = backend.data.lock().unwrap();
    match data.authors.iter_mut().find(|a| a["id"] == json!(id)) {
        Some(author) => {
            if let (Some(target), Some(fields)) = (author.as_object_mut(), body.as_object()) {
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
            (StatusCode::OK, Json(author.clone()))
        }
        None => rejection(StatusCode::NOT_FOUND, "author not found"),
    }
}

async fn delete_author(
    State(backend): State<Backend>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    backend.record("DELETE", &headers, None);
    if !authorized(&headers) {
        return Err(rejection(StatusCode::UNAUTHORIZED, "invalid token"));
    }
    backend.data.lock().unwrap().authors.retain(|a| a["id"] != json!(id));
    Ok(StatusCode::NO_CONTENT)
}

async fn refresh_role(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match header_value(&headers, header::AUTHORIZATION.as_str()).as_deref() {
        Some("Bearer admin-token") => (StatusCode::OK, Json(json!({"role": "Admin"}))),
        Some("Bearer librarian-token") => (StatusCode::OK, Json(json!({"role": "Librarian"}))),
        Some("Bearer reader-token") => (StatusCode::OK, Json(json!({"role": "Reader"}))),
        _ => rejection(StatusCode::UNAUTHORIZED, "invalid token"),
    }
}

struct TestBackend {
    address: String,
    backend: Backend,
}

async fn spawn_backend(seed: Vec<Value>) -> TestBackend {
    let backend = Backend::default();
    {
        let mut data = backend.data.lock().unwrap();
        data.next_id = seed.len() as i64;
        data.authors = seed;
    }

    let router = Router::new()
        .route("/author", get(list_authors).post(create_author))
        .route("/author/{id}", patch(update_author).delete(delete_author))
        .route("/auth/refresh", get(refresh_role))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestBackend { address, backend }
}

fn portal(address: &str, token: Option<&str>) -> PortalState {
    let config = AppConfig {
        backend_host: address.to_string(),
        token: token.map(str::to_string),
        ..AppConfig::default()
    };
    PortalState::from_config(config).expect("client builds")
}

// --- Tests ---

#[tokio::test]
async fn test_author_lifecycle_against_backend() {
    let app = spawn_backend(vec![json!({"id": 1, "name": "Borges", "country": "AR"})]).await;
    let state = portal(&app.address, Some("admin-token"));
    let authors = &state.authors;

    assert_eq!(authors.fetch_all().await.unwrap(), 1);
    assert_eq!(authors.get(1).unwrap().details.get("country"), Some(&json!("AR")));

    let mut created = AuthorRecord::new("Lispector").with_detail("country", "BR");
    authors.create(&mut created).await.unwrap();
    assert_eq!(created.id, Some(2));

    let renamed = AuthorRecord {
        name: "Clarice Lispector".to_string(),
        ..created.clone()
    };
    authors.update(&renamed).await.unwrap();
    assert_eq!(authors.get(2).unwrap().name, "Clarice Lispector");

    authors.delete(1).await.unwrap();
    assert_eq!(authors.snapshot(), vec![renamed.clone()]);

    // The cache agrees with the server after a full reload.
    authors.fetch_all().await.unwrap();
    assert_eq!(authors.snapshot(), vec![renamed]);
    assert_eq!(app.backend.authors().len(), 1);
}

#[tokio::test]
async fn test_requests_carry_json_headers_and_bearer() {
    let app = spawn_backend(vec![json!({"id": 1, "name": "Borges"})]).await;
    let state = portal(&app.address, Some("librarian-token"));

    state.authors.fetch_all().await.unwrap();
    state
        .authors
        .update(&AuthorRecord::new("Jorge Luis Borges").with_id(1))
        .await
        .unwrap();

    let seen = app.backend.seen();
    assert_eq!(seen.len(), 2);
    for request in &seen {
        assert_eq!(request.accept.as_deref(), Some("application/json"));
        assert_eq!(request.content_type.as_deref(), Some("application/json"));
        assert!(request.request_id.is_some(), "{} missing x-request-id", request.method);
    }
    assert_ne!(seen[0].request_id, seen[1].request_id);
    assert_eq!(seen[0].authorization, None);
    assert_eq!(seen[1].authorization.as_deref(), Some("Bearer librarian-token"));
    assert_eq!(seen[1].body, Some(json!({"name": "Jorge Luis Borges"})));
}

#[tokio::test]
async fn test_create_rejection_surfaces_server_message() {
    let app = spawn_backend(vec![]).await;
    let state = portal(&app.address, Some("admin-token"));

    let mut author = AuthorRecord::new("Duplicate");
    let err = state.authors.create(&mut author).await.unwrap_err();

    assert!(err.to_string().contains("dup"), "got {err}");
    assert!(state.authors.is_empty());
    assert!(app.backend.authors().is_empty());
}

#[tokio::test]
async fn test_invalid_token_rejected_on_mutation() {
    let app = spawn_backend(vec![json!({"id": 1, "name": "Borges"})]).await;
    let state = portal(&app.address, Some("stale-token"));
    state.authors.fetch_all().await.unwrap();

    let err = state.authors.delete(1).await.unwrap_err();

    assert!(matches!(err, ClientError::DeleteFailed(_)));
    assert_eq!(err.rejection_message(), Some("invalid token"));
    assert_eq!(state.authors.len(), 1);
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let state = portal("http://127.0.0.1:9", None);

    let err = state.authors.fetch_all().await.unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
    assert!(state.authors.is_empty());
}

#[tokio::test]
async fn test_can_manage_uses_refresh_endpoint() {
    let app = spawn_backend(vec![]).await;

    let librarian = portal(&app.address, Some("librarian-token"));
    assert!(librarian.authors.can_manage().await.unwrap());
    assert_eq!(librarian.auth.role(), Some(Role::Librarian));

    let reader = portal(&app.address, Some("reader-token"));
    assert!(!reader.authors.can_manage().await.unwrap());
    assert_eq!(reader.auth.role(), None);

    let stale = portal(&app.address, Some("stale-token"));
    assert!(stale.authors.can_manage().await.is_err());
}

#[tokio::test]
async fn test_navigation_against_backend_roles() {
    let app = spawn_backend(vec![]).await;

    let admin = portal(&app.address, Some("admin-token"));
    let mut nav = admin.navigator();
    assert_eq!(nav.navigate("/user").await.unwrap().name, "userTable");

    let librarian = portal(&app.address, Some("librarian-token"));
    let mut nav = librarian.navigator();
    assert_eq!(
        nav.navigate("/user").await.unwrap_err(),
        NavigationError::Denied(DenyReason::Unauthorized)
    );

    // A token the backend no longer accepts sends the user back to sign in.
    let stale = portal(&app.address, Some("stale-token"));
    let mut nav = stale.navigator();
    assert_eq!(nav.navigate("/user").await.unwrap().name, "signin");
}
