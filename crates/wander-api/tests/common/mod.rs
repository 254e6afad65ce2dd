#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use wander_api::{AppState, AppStateInner, auth::hash_password, router};
use wander_db::Database;

pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

/// Router over a fresh in-memory database.
pub fn app() -> TestApp {
    let db = Database::open_in_memory().unwrap();
    let state: AppState = Arc::new(AppStateInner::new(db, "test-secret-key-for-tests"));
    TestApp {
        router: router(state.clone()),
        state,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Registers a traveller and returns `(user_id, token)`.
    pub async fn register(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .send(
                "POST",
                "/api/users/register",
                None,
                Some(json!({ "email": email, "password": PASSWORD, "name": "Traveller" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["user"]["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    /// Seeds an admin straight into the database and logs in.
    pub async fn admin(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let hash = hash_password(PASSWORD).unwrap();
        self.state
            .db
            .create_user(&id, "admin@wander.test", "Admin", &hash, "ADMIN", None)
            .unwrap();

        let (status, body) = self
            .send(
                "POST",
                "/api/users/login",
                None,
                Some(json!({ "email": "admin@wander.test", "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Creates a destination through the admin API and returns its id.
    pub async fn destination(&self, admin: &str, name: &str, city: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/destinations",
                Some(admin),
                Some(json!({ "name": name, "country": "France", "city": city })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }
}
