//! In-memory user service.
//!
//! Routes:
//! - `POST /api/users` creates a pending user (201)
//! - `POST /api/users/{id}/activate` activates with code `123456` (200), else 400
//! - `GET /api/users/{id}` returns the user (200)
//! - `PUT /api/users/{id}` replaces name, email and password (200)
//! - `DELETE /api/users/{id}` removes the user (204)
//!
//! Unknown ids answer 404 with `{"message": "User not found"}`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

pub const ACTIVATION_CODE: &str = "123456";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
struct UserInput {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

/// Shared state behind the router.
#[derive(Clone, Default)]
pub struct UserStore {
    users: Arc<Mutex<HashMap<String, User>>>,
    next_id: Arc<AtomicU64>,
}

impl UserStore {
    pub fn get(&self, id: &str) -> Option<User> {
        self.users.lock().ok()?.get(id).cloned()
    }

    fn with_users<T>(&self, apply: impl FnOnce(&mut HashMap<String, User>) -> T) -> Result<T, Response> {
        let mut users = self.users.lock().map_err(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(json!({"message": "store unavailable"}))).into_response()
        })?;
        Ok(apply(&mut users))
    }
}

pub fn router(store: UserStore) -> Router {
    Router::new()
        .route("/api/users", post(create_user))
        .route("/api/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/api/users/{id}/activate", post(activate_user))
        .with_state(store)
}

/// Handle to a server running on a background task.
pub struct MockServer {
    pub base_url: String,
    pub store: UserStore,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    /// Bind `addr` (use port 0 for an ephemeral port) and serve until dropped.
    pub async fn start(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        let store = UserStore::default();
        let app = router(store.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(error) = server.await {
                tracing::error!(error = %error, "mock server stopped");
            }
        });
        info!(addr = %local, "mock server listening");
        Ok(Self {
            base_url: format!("http://{local}"),
            store,
            shutdown: Some(shutdown_tx),
        })
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, axum::Json(json!({"message": "User not found"}))).into_response()
}

fn parse_input(body: &Bytes) -> UserInput {
    serde_json::from_slice(body).unwrap_or_default()
}

async fn create_user(State(store): State<UserStore>, body: Bytes) -> Response {
    let input = parse_input(&body);
    let id = (store.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string();
    let user = User {
        id: id.clone(),
        name: input.name,
        email: input.email,
        password: input.password,
        status: "pending".to_string(),
    };
    let created = json!({"id": user.id, "name": user.name, "email": user.email, "status": user.status});
    match store.with_users(|users| users.insert(id, user)) {
        Ok(_) => (StatusCode::CREATED, axum::Json(created)).into_response(),
        Err(response) => response,
    }
}

async fn activate_user(State(store): State<UserStore>, Path(id): Path<String>, body: Bytes) -> Response {
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let code_matches = payload.get("activationCode").and_then(Value::as_str) == Some(ACTIVATION_CODE);

    let outcome = store.with_users(|users| {
        let user = users.get_mut(&id)?;
        if code_matches {
            user.status = "active".to_string();
        }
        Some(())
    });
    match outcome {
        Err(response) => response,
        Ok(None) => not_found(),
        Ok(Some(())) if code_matches => {
            (StatusCode::OK, axum::Json(json!({"message": "User activated successfully"}))).into_response()
        }
        Ok(Some(())) => (StatusCode::BAD_REQUEST, axum::Json(json!({"message": "Invalid activation code"}))).into_response(),
    }
}

async fn get_user(State(store): State<UserStore>, Path(id): Path<String>) -> Response {
    match store.with_users(|users| users.get(&id).cloned()) {
        Err(response) => response,
        Ok(None) => not_found(),
        Ok(Some(user)) => (StatusCode::OK, axum::Json(user)).into_response(),
    }
}

async fn update_user(State(store): State<UserStore>, Path(id): Path<String>, body: Bytes) -> Response {
    let input = parse_input(&body);
    let updated = store.with_users(|users| {
        let user = users.get_mut(&id)?;
        user.name = input.name;
        user.email = input.email;
        user.password = input.password;
        Some(user.clone())
    });
    match updated {
        Err(response) => response,
        Ok(None) => not_found(),
        Ok(Some(user)) => (StatusCode::OK, axum::Json(user)).into_response(),
    }
}

async fn delete_user(State(store): State<UserStore>, Path(id): Path<String>) -> Response {
    match store.with_users(|users| users.remove(&id)) {
        Err(response) => response,
        Ok(None) => not_found(),
        Ok(Some(_)) => StatusCode::NO_CONTENT.into_response(),
    }
}
