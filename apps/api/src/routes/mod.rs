pub mod health;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::ai::handlers as ai;
use crate::auth::handlers as auth;
use crate::cv::handlers as cv;
use crate::payment::handlers as payment;
use crate::pdf::handlers as pdf;
use crate::rate_limit::middleware::rate_limit_middleware;
use crate::rate_limit::RateLimiter;
use crate::share::handlers as share;
use crate::state::AppState;

pub fn build_router(state: AppState, limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .route("/api", get(health::root_handler))
        .route("/api/health", get(health::health_handler))
        // Auth
        .route("/api/auth/register", post(auth::handle_register))
        .route("/api/auth/login", post(auth::handle_login))
        .route("/api/auth/session", post(auth::handle_oauth_session))
        .route("/api/auth/me", get(auth::handle_me))
        .route("/api/auth/logout", post(auth::handle_logout))
        // CVs
        .route("/api/cvs", get(cv::handle_list_cvs).post(cv::handle_create_cv))
        .route(
            "/api/cvs/:id",
            get(cv::handle_get_cv)
                .put(cv::handle_update_cv)
                .delete(cv::handle_delete_cv),
        )
        // Sharing
        .route(
            "/api/cvs/:id/share",
            post(share::handle_create_share)
                .get(share::handle_get_share)
                .delete(share::handle_delete_share),
        )
        .route("/api/public/cv/:token", get(share::handle_public_cv))
        // AI
        .route("/api/ai/analyze", post(ai::handle_analyze))
        .route("/api/ai/improve", post(ai::handle_improve))
        .route("/api/ai/optimize-for-job", post(ai::handle_optimize_for_job))
        .route("/api/ai/suggest-skills", post(ai::handle_suggest_skills))
        // PDF
        .route("/api/generate-pdf/:id", post(pdf::handle_generate_pdf))
        // Payments
        .route("/api/stripe/create-checkout", post(payment::handle_create_checkout))
        .route("/api/stripe/status/:id", get(payment::handle_checkout_status))
        .route("/api/webhook/stripe", post(payment::handle_stripe_webhook))
        .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::Body,
        http::{header, HeaderMap, Method, Request, StatusCode},
    };
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::llm_client::fake::{Reply, ScriptedCompletion};
    use crate::models::session::Session;
    use crate::rate_limit::MemoryCounters;
    use crate::store::{MemoryStore, Store};

    struct TestApp {
        app: Router,
        store: Arc<MemoryStore>,
    }

    fn test_app_with(llm: ScriptedCompletion, general: u32, ai: u32) -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::fake(store.clone(), Arc::new(llm));
        let limiter = Arc::new(RateLimiter::new(Arc::new(MemoryCounters::new()), general, ai));
        TestApp {
            app: build_router(state, limiter),
            store,
        }
    }

    fn test_app() -> TestApp {
        test_app_with(ScriptedCompletion::default(), 1000, 1000)
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send_raw(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, bytes.to_vec())
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let (status, headers, bytes) = send_raw(app, req).await;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    fn session_cookie(headers: &HeaderMap) -> String {
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        cookie
            .split(';')
            .next()
            .and_then(|pair| pair.strip_prefix("session_token="))
            .unwrap()
            .to_string()
    }

    fn error_message(body: &Value) -> &str {
        body["error"]["message"].as_str().unwrap()
    }

    /// Registers an account and returns `(user_id, session_token)`.
    async fn register(app: &Router, email: &str, name: &str) -> (String, String) {
        let (status, headers, body) = send(
            app,
            request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"email": email, "password": "correct-horse", "name": name})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (body["user_id"].as_str().unwrap().to_string(), session_cookie(&headers))
    }

    async fn create_cv(app: &Router, token: &str, body: Option<Value>) -> Value {
        let (status, _, cv) = send(app, request(Method::POST, "/api/cvs", Some(token), body)).await;
        assert_eq!(status, StatusCode::CREATED);
        cv
    }

    // ── health ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_health_and_root() {
        let t = test_app();
        let (status, _, body) = send(&t.app, request(Method::GET, "/api/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "healthy", "environment": "development"}));

        let (status, _, body) = send(&t.app, request(Method::GET, "/api", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Smart Resume Builder API");
    }

    // ── auth ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_register_returns_user_without_hash() {
        let t = test_app();
        let (status, headers, body) = send(
            &t.app,
            request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"email": "alice@example.com", "password": "correct-horse", "name": "Alice"})),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["user_id"].as_str().unwrap().starts_with("user_"));
        assert!(body.get("password_hash").is_none());
        assert_eq!(body["is_pro"], false);

        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let t = test_app();
        register(&t.app, "alice@example.com", "Alice").await;

        let (status, _, body) = send(
            &t.app,
            request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"email": "ALICE@example.com", "password": "another-pass", "name": "A"})),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_message(&body), "Email already registered");
        assert_eq!(t.store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let t = test_app();
        for body in [
            json!({"email": "not-an-email", "password": "correct-horse", "name": "Alice"}),
            json!({"email": "a@example.com", "password": "short", "name": "Alice"}),
            json!({"email": "a@example.com", "password": "correct-horse", "name": ""}),
            json!({"email": "a@example.com", "password": "correct-horse", "name": "   "}),
        ] {
            let (status, _, _) =
                send(&t.app, request(Method::POST, "/api/auth/register", None, Some(body))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        assert_eq!(t.store.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_login_checks_password() {
        let t = test_app();
        let (user_id, _) = register(&t.app, "alice@example.com", "Alice").await;

        let (status, _, body) = send(
            &t.app,
            request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "alice@example.com", "password": "wrong-password"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(&body), "Invalid credentials");

        let (status, headers, body) = send(
            &t.app,
            request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "alice@example.com", "password": "correct-horse"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], user_id.as_str());
        assert!(!session_cookie(&headers).is_empty());
        // logging in replaced the registration session
        assert_eq!(t.store.session_count_for(&user_id).await, 1);
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let t = test_app();
        let (status, _, body) = send(
            &t.app,
            request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "nobody@example.com", "password": "whatever1"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(&body), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_me_requires_valid_session() {
        let t = test_app();
        let (user_id, token) = register(&t.app, "alice@example.com", "Alice").await;

        let (status, _, body) = send(&t.app, request(Method::GET, "/api/auth/me", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], user_id.as_str());

        let (status, _, body) = send(&t.app, request(Method::GET, "/api/auth/me", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(&body), "Not authenticated");

        let (status, _, body) =
            send(&t.app, request(Method::GET, "/api/auth/me", Some("st_bogus"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(&body), "Invalid session");
    }

    #[tokio::test]
    async fn test_cookie_session_is_accepted() {
        let t = test_app();
        let (_, token) = register(&t.app, "alice@example.com", "Alice").await;
        let req = Request::builder()
            .uri("/api/auth/me")
            .header(header::COOKIE, format!("theme=dark; session_token={token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&t.app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "alice@example.com");
    }

    #[tokio::test]
    async fn test_expired_session_rejected_everywhere() {
        let t = test_app();
        let (user_id, _) = register(&t.app, "alice@example.com", "Alice").await;
        let now = Utc::now();
        t.store
            .insert_session(&Session {
                session_token: "st_expired".to_string(),
                user_id,
                expires_at: now - Duration::minutes(1),
                created_at: now - Duration::days(7),
            })
            .await
            .unwrap();

        for (method, uri) in [
            (Method::GET, "/api/auth/me"),
            (Method::GET, "/api/cvs"),
            (Method::POST, "/api/cvs"),
            (Method::GET, "/api/cvs/cv_anything"),
            (Method::POST, "/api/generate-pdf/cv_anything"),
        ] {
            let (status, _, body) = send(&t.app, request(method, uri, Some("st_expired"), None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(error_message(&body), "Session expired");
        }
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let t = test_app();
        let (_, token) = register(&t.app, "alice@example.com", "Alice").await;

        let (status, headers, body) =
            send(&t.app, request(Method::POST, "/api/auth/logout", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Logged out"}));
        assert!(headers
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));

        let (status, _, _) = send(&t.app, request(Method::GET, "/api/auth/me", Some(&token), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // logging out again is harmless
        let (status, _, _) = send(&t.app, request(Method::POST, "/api/auth/logout", None, None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oauth_session_exchange() {
        let t = test_app();

        let (status, _, body) =
            send(&t.app, request(Method::POST, "/api/auth/session", None, Some(json!({})))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_message(&body), "session_id required");

        let (status, _, body) = send(
            &t.app,
            request(Method::POST, "/api/auth/session", None, Some(json!({"session_id": "nope"}))),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(&body), "Invalid session_id");

        let (status, headers, first) = send(
            &t.app,
            request(Method::POST, "/api/auth/session", None, Some(json!({"session_id": "oauth_ok"}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["email"], "carol@example.com");
        assert!(!session_cookie(&headers).is_empty());

        let (_, _, second) = send(
            &t.app,
            request(Method::POST, "/api/auth/session", None, Some(json!({"session_id": "oauth_ok"}))),
        )
        .await;
        assert_eq!(second["user_id"], first["user_id"]);
        assert_eq!(t.store.user_count().await, 1);

        let (status, _, body) = send(
            &t.app,
            request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "carol@example.com", "password": "anything1"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(&body), "Please login with Google");
    }

    // ── CVs ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_cv_lifecycle() {
        let t = test_app();
        let (user_id, token) = register(&t.app, "alice@example.com", "Alice").await;

        let cv = create_cv(&t.app, &token, None).await;
        assert_eq!(cv["title"], "Untitled CV");
        assert_eq!(cv["user_id"], user_id.as_str());
        assert_eq!(cv["settings"]["template"], "minimal");
        let cv_id = cv["cv_id"].as_str().unwrap().to_string();

        let named = create_cv(&t.app, &token, Some(json!({"title": "Backend CV"}))).await;
        assert_eq!(named["title"], "Backend CV");

        let (status, _, list) = send(&t.app, request(Method::GET, "/api/cvs", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 2);

        let uri = format!("/api/cvs/{cv_id}");
        let (status, _, body) = send(&t.app, request(Method::DELETE, &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "CV deleted"}));

        let (status, _, body) = send(&t.app, request(Method::GET, &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_message(&body), "CV not found");
    }

    #[tokio::test]
    async fn test_cv_partial_update() {
        let t = test_app();
        let (_, token) = register(&t.app, "alice@example.com", "Alice").await;
        let cv = create_cv(&t.app, &token, None).await;
        let uri = format!("/api/cvs/{}", cv["cv_id"].as_str().unwrap());

        let (status, _, with_data) = send(
            &t.app,
            request(
                Method::PUT,
                &uri,
                Some(&token),
                Some(json!({"data": {"summary": "Systems engineer", "skills": [{"name": "Rust"}]}})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(with_data["data"]["summary"], "Systems engineer");
        assert!(with_data["data"]["skills"][0]["id"].as_str().is_some());

        let (_, _, renamed) = send(
            &t.app,
            request(Method::PUT, &uri, Some(&token), Some(json!({"title": "Platform CV"}))),
        )
        .await;
        assert_eq!(renamed["title"], "Platform CV");
        assert_eq!(renamed["data"], with_data["data"]);
        assert_eq!(renamed["settings"], with_data["settings"]);

        let (_, _, replaced) = send(
            &t.app,
            request(Method::PUT, &uri, Some(&token), Some(json!({"data": {"summary": "New"}}))),
        )
        .await;
        assert_eq!(replaced["data"]["summary"], "New");
        assert_eq!(replaced["data"]["skills"], json!([]));
    }

    #[tokio::test]
    async fn test_cvs_are_owner_scoped() {
        let t = test_app();
        let (_, alice) = register(&t.app, "alice@example.com", "Alice").await;
        let (_, bob) = register(&t.app, "bob@example.com", "Bob").await;
        let cv = create_cv(&t.app, &alice, None).await;
        let uri = format!("/api/cvs/{}", cv["cv_id"].as_str().unwrap());

        for (method, body) in [
            (Method::GET, None),
            (Method::PUT, Some(json!({"title": "mine now"}))),
            (Method::DELETE, None),
        ] {
            let (status, _, _) = send(&t.app, request(method, &uri, Some(&bob), body)).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        }

        let (_, _, list) = send(&t.app, request(Method::GET, "/api/cvs", Some(&bob), None)).await;
        assert_eq!(list, json!([]));

        let (_, _, still_there) = send(&t.app, request(Method::GET, &uri, Some(&alice), None)).await;
        assert_eq!(still_there["title"], "Untitled CV");
    }

    // ── sharing ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_share_requires_premium() {
        let t = test_app();
        let (_, token) = register(&t.app, "alice@example.com", "Alice").await;
        let cv = create_cv(&t.app, &token, None).await;
        let uri = format!("/api/cvs/{}/share", cv["cv_id"].as_str().unwrap());

        let (status, _, body) = send(&t.app, request(Method::POST, &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(error_message(&body), "Premium subscription required");
    }

    #[tokio::test]
    async fn test_public_share_counts_views() {
        let t = test_app();
        let (user_id, token) = register(&t.app, "alice@example.com", "Alice").await;
        t.store
            .set_subscription(&user_id, true, Some(Utc::now() + Duration::days(30)))
            .await
            .unwrap();
        let cv = create_cv(&t.app, &token, Some(json!({"title": "Shared"}))).await;
        let cv_id = cv["cv_id"].as_str().unwrap().to_string();
        let share_uri = format!("/api/cvs/{cv_id}/share");

        let (status, _, created) = send(&t.app, request(Method::POST, &share_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        let share_token = created["share_token"].as_str().unwrap().to_string();
        assert_eq!(share_token.len(), 24);
        assert!(created["expires_at"].as_str().is_some());

        let (_, _, current) = send(&t.app, request(Method::GET, &share_uri, Some(&token), None)).await;
        assert_eq!(current["share_token"], share_token.as_str());

        let public_uri = format!("/api/public/cv/{share_token}");
        for expected in 1..=2 {
            let (status, _, body) = send(&t.app, request(Method::GET, &public_uri, None, None)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["views"], expected);
            assert_eq!(body["cv"]["cv_id"], cv_id.as_str());
            assert_eq!(body["owner"]["name"], "Alice");
        }

        let (status, _, body) = send(&t.app, request(Method::DELETE, &share_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Share link deleted"}));

        let (status, _, body) = send(&t.app, request(Method::GET, &public_uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_message(&body), "CV not found or link expired");

        let (_, _, current) = send(&t.app, request(Method::GET, &share_uri, Some(&token), None)).await;
        assert_eq!(current, json!({"share_token": null}));
    }

    #[tokio::test]
    async fn test_reshare_replaces_token_and_resets_views() {
        let t = test_app();
        let (user_id, token) = register(&t.app, "alice@example.com", "Alice").await;
        t.store.set_subscription(&user_id, true, None).await.unwrap();
        let cv = create_cv(&t.app, &token, None).await;
        let share_uri = format!("/api/cvs/{}/share", cv["cv_id"].as_str().unwrap());

        let (_, _, first) = send(&t.app, request(Method::POST, &share_uri, Some(&token), None)).await;
        let first_uri = format!("/api/public/cv/{}", first["share_token"].as_str().unwrap());
        for _ in 0..2 {
            let (status, _, _) = send(&t.app, request(Method::GET, &first_uri, None, None)).await;
            assert_eq!(status, StatusCode::OK);
        }

        // Re-share after a soft delete reactivates the link under a new token.
        let (status, _, _) = send(&t.app, request(Method::DELETE, &share_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, second) = send(&t.app, request(Method::POST, &share_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        let second_token = second["share_token"].as_str().unwrap().to_string();
        assert_ne!(second["share_token"], first["share_token"]);

        let (status, _, body) = send(&t.app, request(Method::GET, &first_uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_message(&body), "CV not found or link expired");

        let (_, _, current) = send(&t.app, request(Method::GET, &share_uri, Some(&token), None)).await;
        assert_eq!(current["share_token"], second_token.as_str());

        let second_uri = format!("/api/public/cv/{second_token}");
        let (status, _, body) = send(&t.app, request(Method::GET, &second_uri, None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["views"], 1);
    }

    #[tokio::test]
    async fn test_expired_share_link() {
        let t = test_app();
        let (user_id, token) = register(&t.app, "alice@example.com", "Alice").await;
        t.store.set_subscription(&user_id, true, None).await.unwrap();
        let cv = create_cv(&t.app, &token, None).await;
        let cv_id = cv["cv_id"].as_str().unwrap().to_string();
        let share_uri = format!("/api/cvs/{cv_id}/share");
        send(&t.app, request(Method::POST, &share_uri, Some(&token), None)).await;

        let mut link = t
            .store
            .find_active_share_for_cv(&cv_id, &user_id)
            .await
            .unwrap()
            .unwrap();
        link.expires_at = Utc::now() - Duration::seconds(1);
        t.store.upsert_share_link(&link).await.unwrap();

        let public_uri = format!("/api/public/cv/{}", link.share_token);
        let (status, _, body) = send(&t.app, request(Method::GET, &public_uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_message(&body), "Share link expired");

        let (_, _, current) = send(&t.app, request(Method::GET, &share_uri, Some(&token), None)).await;
        assert_eq!(current, json!({"share_token": null, "expired": true}));
    }

    #[tokio::test]
    async fn test_share_missing_cv_and_link() {
        let t = test_app();
        let (user_id, token) = register(&t.app, "alice@example.com", "Alice").await;
        t.store.set_subscription(&user_id, true, None).await.unwrap();

        let (status, _, body) = send(
            &t.app,
            request(Method::POST, "/api/cvs/cv_missing/share", Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_message(&body), "CV not found");

        let (status, _, body) = send(
            &t.app,
            request(Method::DELETE, "/api/cvs/cv_missing/share", Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_message(&body), "Share link not found");
    }

    // ── AI ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_ai_analyze_parses_fenced_reply() {
        let reply = "```json\n{\"overall_score\": 91, \"breakdown\": {\"content\": 90, \"formatting\": 92, \"keywords\": 88, \"ats_compatibility\": 95}}\n```";
        let t = test_app_with(ScriptedCompletion::text(reply), 1000, 1000);
        let (_, token) = register(&t.app, "alice@example.com", "Alice").await;

        let (status, _, body) = send(
            &t.app,
            request(Method::POST, "/api/ai/analyze", Some(&token), Some(json!({"cv_data": {}}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall_score"], 91);
        assert_eq!(body["strengths"], json!([]));
    }

    #[tokio::test]
    async fn test_ai_garbage_reply_degrades_to_fallback() {
        let t = test_app_with(ScriptedCompletion::text("no json here"), 1000, 1000);
        let (_, token) = register(&t.app, "alice@example.com", "Alice").await;

        let (status, _, body) = send(
            &t.app,
            request(
                Method::POST,
                "/api/ai/suggest-skills",
                Some(&token),
                Some(json!({"job_title": "Data Engineer"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["soft_skills"], json!(["Communication", "Teamwork", "Problem-solving"]));
    }

    #[tokio::test]
    async fn test_ai_not_configured_is_server_error() {
        let t = test_app_with(ScriptedCompletion::new(vec![Reply::NotConfigured]), 1000, 1000);
        let (_, token) = register(&t.app, "alice@example.com", "Alice").await;

        let (status, _, body) = send(
            &t.app,
            request(Method::POST, "/api/ai/analyze", Some(&token), Some(json!({"cv_data": {}}))),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_message(&body), "AI service not configured");
    }

    #[tokio::test]
    async fn test_ai_input_validation_and_auth() {
        let t = test_app();
        let (_, token) = register(&t.app, "alice@example.com", "Alice").await;

        let (status, _, _) = send(
            &t.app,
            request(
                Method::POST,
                "/api/ai/improve",
                Some(&token),
                Some(json!({"section": "summary", "content": "   "})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(
            &t.app,
            request(
                Method::POST,
                "/api/ai/optimize-for-job",
                Some(&token),
                Some(json!({"cv_data": {}, "job_description": ""})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(
            &t.app,
            request(Method::POST, "/api/ai/analyze", None, Some(json!({"cv_data": {}}))),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // ── rate limiting ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_general_rate_limit() {
        let t = test_app_with(ScriptedCompletion::default(), 3, 10);

        for _ in 0..3 {
            let (status, _, _) = send(&t.app, request(Method::GET, "/api/cvs", None, None)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let (status, headers, body) = send(&t.app, request(Method::GET, "/api/cvs", None, None)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "60");
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
        assert_eq!(error_message(&body), "Rate limit exceeded. Please try again later.");

        let (status, _, _) = send(&t.app, request(Method::GET, "/api/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ai_rate_limit_is_separate() {
        let t = test_app_with(ScriptedCompletion::default(), 100, 2);
        let (_, token) = register(&t.app, "alice@example.com", "Alice").await;
        let analyze = || {
            request(Method::POST, "/api/ai/analyze", Some(&token), Some(json!({"cv_data": {}})))
        };

        for _ in 0..2 {
            let (status, _, _) = send(&t.app, analyze()).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _, body) = send(&t.app, analyze()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(error_message(&body), "AI rate limit exceeded. Please try again later.");

        let (status, _, _) = send(&t.app, request(Method::GET, "/api/cvs", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    // ── PDF ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_generate_pdf() {
        let t = test_app();
        let (_, alice) = register(&t.app, "alice@example.com", "Alice").await;
        let (_, bob) = register(&t.app, "bob@example.com", "Bob").await;
        let cv = create_cv(&t.app, &alice, Some(json!({"title": "Backend CV"}))).await;
        let uri = format!("/api/generate-pdf/{}", cv["cv_id"].as_str().unwrap());

        let (status, headers, bytes) =
            send_raw(&t.app, request(Method::POST, &uri, Some(&alice), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/pdf");
        assert_eq!(
            headers.get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"Backend CV.pdf\""
        );
        assert!(bytes.starts_with(b"%PDF"));

        let (status, _, _) = send_raw(&t.app, request(Method::POST, &uri, Some(&bob), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ── payments ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_checkout_with_dev_provider() {
        let t = test_app();
        let (user_id, token) = register(&t.app, "alice@example.com", "Alice").await;

        let (status, _, body) = send(
            &t.app,
            request(
                Method::POST,
                "/api/stripe/create-checkout",
                Some(&token),
                Some(json!({"origin_url": "https://app.example"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["url"], "https://example.com/checkout");
        let session_id = body["session_id"].as_str().unwrap().to_string();
        assert!(session_id.starts_with("dev_session_"));

        let txn = t.store.find_transaction(&session_id).await.unwrap().unwrap();
        assert_eq!(txn.user_id, user_id);
        assert_eq!(txn.payment_status, "pending");
        assert_eq!(txn.amount, 4.99);

        let status_uri = format!("/api/stripe/status/{session_id}");
        let (status, _, body) =
            send(&t.app, request(Method::GET, &status_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "complete", "payment_status": "unpaid", "amount_total": 0, "currency": "usd"})
        );
        let user = t.store.find_user_by_id(&user_id).await.unwrap().unwrap();
        assert!(!user.is_pro);
    }

    #[tokio::test]
    async fn test_checkouts_from_two_users_are_kept_apart() {
        let t = test_app();
        let mut sessions = Vec::new();
        for (email, name) in [("alice@example.com", "Alice"), ("bob@example.com", "Bob")] {
            let (user_id, token) = register(&t.app, email, name).await;
            let (status, _, body) = send(
                &t.app,
                request(
                    Method::POST,
                    "/api/stripe/create-checkout",
                    Some(&token),
                    Some(json!({"origin_url": "https://app.example/"})),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            sessions.push((user_id, body["session_id"].as_str().unwrap().to_string()));
        }

        assert_ne!(sessions[0].1, sessions[1].1);
        for (user_id, session_id) in &sessions {
            let txn = t.store.find_transaction(session_id).await.unwrap().unwrap();
            assert_eq!(&txn.user_id, user_id);
            assert_eq!(txn.payment_status, "pending");
        }
    }

    #[tokio::test]
    async fn test_webhook_always_acknowledges() {
        let t = test_app();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/webhook/stripe")
            .header("Stripe-Signature", "t=1,v1=00")
            .body(Body::from("{}"))
            .unwrap();
        let (status, _, body) = send(&t.app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }
}
