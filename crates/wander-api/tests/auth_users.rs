mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;
use sha2::{Digest, Sha256};
use tower::ServiceExt;

use common::{PASSWORD, app};

#[tokio::test]
async fn register_then_me() {
    let app = app();
    let (user_id, token) = app.register("Ada@Example.com").await;

    let (status, body) = app.send("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user_id);
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["role"], "USER");
    assert_eq!(body["email_verified"], false);
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = app();
    app.register("ada@example.com").await;

    let (status, body) = app
        .send(
            "POST",
            "/api/users/register",
            None,
            Some(json!({ "email": "ADA@example.com", "password": PASSWORD, "name": "Ada" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "email is already registered");
}

#[tokio::test]
async fn registration_validates_input() {
    let app = app();
    let (status, _) = app
        .send(
            "POST",
            "/api/users/register",
            None,
            Some(json!({ "email": "not-an-email", "password": PASSWORD, "name": "Ada" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/api/users/register",
            None,
            Some(json!({ "email": "ada@example.com", "password": "short", "name": "Ada" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            "POST",
            "/api/users/register",
            None,
            Some(json!({ "email": "ada@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name"), "{body}");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = app();
    app.register("ada@example.com").await;

    let (status, _) = app
        .send(
            "POST",
            "/api/users/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            "POST",
            "/api/users/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_cookie_authenticates() {
    let app = app();
    app.register("ada@example.com").await;

    let login = Request::builder()
        .method("POST")
        .uri("/api/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "ada@example.com", "password": PASSWORD }).to_string(),
        ))
        .unwrap();
    let response = app.router.clone().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));

    let pair = cookie.split(';').next().unwrap().to_string();
    let me = Request::builder()
        .uri("/api/users/me")
        .header(header::COOKIE, pair)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(me).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_and_invalid_tokens() {
    let app = app();

    let (status, _) = app.send("GET", "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.send("GET", "/api/destinations", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid or expired token");

    let (status, _) = app.send("GET", "/api/destinations", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn email_verification() {
    let app = app();
    let (_, token) = app.register("ada@example.com").await;

    let verification: String = app
        .state
        .db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT verification_token FROM users WHERE email = ?1",
                ["ada@example.com"],
                |r| r.get(0),
            )?)
        })
        .unwrap();

    let (status, _) = app
        .send("POST", "/api/users/verify-email", None, Some(json!({ "token": "nope" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send("POST", "/api/users/verify-email", None, Some(json!({ "token": verification })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);

    let (_, me) = app.send("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(me["email_verified"], true);
}

#[tokio::test]
async fn password_reset_flow() {
    let app = app();
    let (user_id, _) = app.register("ada@example.com").await;

    // Unknown addresses get the same answer as known ones.
    let (status, _) = app
        .send(
            "POST",
            "/api/users/forgot-password",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let digest = hex::encode(Sha256::digest(b"known-reset-token"));
    app.state.db.set_reset_token(&user_id, &digest, 60).unwrap();

    let reset = json!({ "token": "known-reset-token", "password": "a brand new password" });
    let (status, _) = app
        .send("POST", "/api/users/reset-password", None, Some(reset.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Tokens are single use.
    let (status, _) = app
        .send("POST", "/api/users/reset-password", None, Some(reset))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/api/users/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "a brand new password" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn expired_reset_token_is_rejected() {
    let app = app();
    let (user_id, _) = app.register("ada@example.com").await;

    let digest = hex::encode(Sha256::digest(b"stale"));
    app.state.db.set_reset_token(&user_id, &digest, -5).unwrap();

    let (status, _) = app
        .send(
            "POST",
            "/api/users/reset-password",
            None,
            Some(json!({ "token": "stale", "password": "a brand new password" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_listing_is_admin_only() {
    let app = app();
    let (_, token) = app.register("ada@example.com").await;
    let admin = app.admin().await;

    let (status, _) = app.send("GET", "/api/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send("GET", "/api/users?role=USER&limit=5", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["pagination"]["limit"], 5);
    assert_eq!(body["data"][0]["email"], "ada@example.com");
}

#[tokio::test]
async fn users_manage_only_themselves() {
    let app = app();
    let (ada, ada_token) = app.register("ada@example.com").await;
    let (bob, _) = app.register("bob@example.com").await;

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/users/{ada}"),
            Some(&ada_token),
            Some(json!({ "name": "Ada L." })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ada L.");

    let (status, _) = app
        .send("GET", &format!("/api/users/{bob}"), Some(&ada_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/users/{ada}"),
            Some(&ada_token),
            Some(json!({ "role": "ADMIN" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/users/{ada}"),
            Some(&ada_token),
            Some(json!({ "email": "bob@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send("DELETE", &format!("/api/users/{ada}"), Some(&ada_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn deleted_account_token_is_rejected() {
    let app = app();
    let (ada, token) = app.register("ada@example.com").await;

    let (status, _) = app
        .send("DELETE", &format!("/api/users/{ada}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send(
            "POST",
            "/api/wishlists",
            Some(&token),
            Some(json!({ "name": "Someday" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "account no longer exists");
}

#[tokio::test]
async fn admin_promotes_but_last_admin_stays() {
    let app = app();
    let (ada, _) = app.register("ada@example.com").await;
    let admin = app.admin().await;

    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/users/{ada}"),
            Some(&admin),
            Some(json!({ "role": "ADMIN" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "ADMIN");

    let (_, me) = app.send("GET", "/api/users/me", Some(&admin), None).await;
    let admin_id = me["id"].as_str().unwrap().to_string();

    // Two admins: one may go.
    let (status, _) = app
        .send("DELETE", &format!("/api/users/{ada}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send("DELETE", &format!("/api/users/{admin_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "cannot delete the last admin");
}

#[tokio::test]
async fn health_and_stats() {
    let app = app();
    let (_, token) = app.register("ada@example.com").await;
    let admin = app.admin().await;

    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = app.send("GET", "/api/admin/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send("GET", "/api/admin/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], 2);
    assert_eq!(body["destinations"], 0);
}
