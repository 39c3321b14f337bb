//! Axum router setup and shared application state.

use crate::auth::auth_middleware;
use crate::config::ServerConfig;
use crate::handlers::{audit, auth, collections, passwords, shares, tags};
use crate::rate_limit::{rate_limit_middleware, RateLimiter, RateLimiters};
use crate::storage::Storage;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub config: Arc<ServerConfig>,
    pub limiters: RateLimiters,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(storage: Storage, config: ServerConfig) -> anyhow::Result<Self> {
        let limiters = RateLimiters {
            auth: RateLimiter::new(config.auth_rate_limit, config.rate_limit_window_secs),
            general: RateLimiter::new(config.general_rate_limit, config.rate_limit_window_secs),
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            storage,
            config: Arc::new(config),
            limiters,
            http,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    // Routes behind the authorization filter
    let authenticated = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/revoke-all", post(auth::revoke_all))
        .route(
            "/api/passwords",
            get(passwords::list).post(passwords::create),
        )
        .route("/api/passwords/direct-save", post(passwords::direct_save))
        .route("/api/passwords/bulk-delete", post(passwords::bulk_delete))
        .route("/api/passwords/health", get(passwords::health))
        .route("/api/passwords/export", get(passwords::export))
        .route("/api/passwords/import", post(passwords::import))
        .route(
            "/api/passwords/{id}",
            get(passwords::get)
                .put(passwords::update)
                .delete(passwords::delete),
        )
        .route("/api/passwords/{id}/favorite", post(passwords::toggle_favorite))
        .route("/api/passwords/{id}/pin", post(passwords::toggle_pin))
        .route("/api/passwords/{id}/copy", post(passwords::copy))
        .route("/api/passwords/{id}/share", post(shares::create))
        .route(
            "/api/collections",
            get(collections::list).post(collections::create),
        )
        .route("/api/collections/assign", post(collections::assign))
        .route(
            "/api/collections/{id}",
            put(collections::update).delete(collections::delete),
        )
        .route("/api/tags", get(tags::list).post(tags::create))
        .route("/api/tags/{id}", delete(tags::delete))
        .route("/api/shares", get(shares::list))
        .route("/api/shares/{id}", delete(shares::revoke))
        .route("/api/audit", get(audit::list))
        .route("/api/audit/summary", get(audit::summary))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Public routes
    let public = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/{provider}", get(auth::oauth_start))
        .route("/api/auth/{provider}/callback", get(auth::oauth_callback))
        .route("/api/share/{token}", get(shares::access))
        .route("/api/health", get(health));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.request_timeout_secs,
        )))
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origin = config
        .frontend_origin
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:5173"));

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let storage = Storage::in_memory().unwrap();
        let state = AppState::new(storage, ServerConfig::for_tests()).unwrap();
        build_router(state)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn authed_request(
        method: &str,
        uri: &str,
        token: &str,
        body: Option<serde_json::Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"));
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        builder
            .body(match body {
                Some(value) => Body::from(value.to_string()),
                None => Body::empty(),
            })
            .unwrap()
    }

    /// Register an account, returning `(access_token, refresh_cookie)`.
    async fn register(app: &Router, email: &str) -> (String, String) {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/register",
                serde_json::json!({ "email": email, "password": "Passw0rd!", "name": "Test" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let cookie = response
            .headers()
            .get("set-cookie")
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let body = body_json(response).await;
        let token = body["accessToken"].as_str().unwrap().to_string();
        (token, cookie)
    }

    async fn create_entry(
        app: &Router,
        token: &str,
        title: &str,
        password: &str,
    ) -> serde_json::Value {
        let response = app
            .clone()
            .oneshot(authed_request(
                "POST",
                "/api/passwords",
                token,
                Some(serde_json::json!({ "title": title, "password": password })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["entry"].clone()
    }

    #[tokio::test]
    async fn test_register_create_list_reveal_and_audit() {
        let app = test_app();
        let (token, _) = register(&app, "a@x.test").await;

        create_entry(&app, &token, "Gmail", "Hunter2A!").await;

        // List: one entry, no password field
        let response = app
            .clone()
            .oneshot(authed_request("GET", "/api/passwords", &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let entries = body["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].get("password").is_none());
        let id = entries[0]["id"].as_str().unwrap().to_string();

        // Get by id: password revealed
        let response = app
            .clone()
            .oneshot(authed_request(
                "GET",
                &format!("/api/passwords/{id}"),
                &token,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["entry"]["password"], "Hunter2A!");

        // Audit trail: login, create, reveal
        let response = app
            .clone()
            .oneshot(authed_request("GET", "/api/audit/summary", &token, None))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["actions"]["login"], 1);
        assert_eq!(body["actions"]["create"], 1);
        assert_eq!(body["actions"]["reveal"], 1);
    }

    #[tokio::test]
    async fn test_update_secret_recomputes_strength_and_health() {
        let app = test_app();
        let (token, _) = register(&app, "a@x.test").await;

        let entry = create_entry(&app, &token, "Weak", "aaa").await;
        assert_eq!(entry["strength"], 0);
        let id = entry["id"].as_str().unwrap();

        let response = app
            .clone()
            .oneshot(authed_request(
                "PUT",
                &format!("/api/passwords/{id}"),
                &token,
                Some(serde_json::json!({ "password": "Correct-Horse-Battery-Staple-9" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["entry"]["strength"], 4);

        let response = app
            .clone()
            .oneshot(authed_request("GET", "/api/passwords/health", &token, None))
            .await
            .unwrap();
        let health = body_json(response).await;
        assert_eq!(health["strong"], 1);
        assert_eq!(health["weak"], 0);
    }

    #[tokio::test]
    async fn test_share_respects_view_limit_and_disclosure() {
        let app = test_app();
        let (token, _) = register(&app, "a@x.test").await;
        let entry = create_entry(&app, &token, "Shared", "Secret123!").await;
        let id = entry["id"].as_str().unwrap();

        let response = app
            .clone()
            .oneshot(authed_request(
                "POST",
                &format!("/api/passwords/{id}/share"),
                &token,
                Some(serde_json::json!({
                    "maxViews": 2,
                    "expiresInHours": 24,
                    "includeSecret": true,
                    "includeNotes": false,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        let share_token = body["token"].as_str().unwrap().to_string();

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri(format!("/api/share/{share_token}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let view = body_json(response).await;
            assert_eq!(view["password"], "Secret123!");
            assert!(view.get("notes").is_none());
        }

        // Third access: exhausted, indistinguishable from absent
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/share/{share_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Owner listing never exposes the raw token
        let response = app
            .clone()
            .oneshot(authed_request("GET", "/api/shares", &token, None))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert!(body["shares"][0].get("token").is_none());
        assert_eq!(body["shares"][0]["viewCount"], 2);
    }

    #[tokio::test]
    async fn test_cross_account_isolation_returns_not_found() {
        let app = test_app();
        let (token_a, _) = register(&app, "a@x.test").await;
        let (token_b, _) = register(&app, "b@x.test").await;

        let entry = create_entry(&app, &token_a, "Private", "Secret123!").await;
        let id = entry["id"].as_str().unwrap();

        let response = app
            .clone()
            .oneshot(authed_request(
                "GET",
                &format!("/api/passwords/{id}"),
                &token_b,
                None,
            ))
            .await
            .unwrap();
        // 404, not 403: existence is not confirmed
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_refresh_then_logout_invalidates_cookie() {
        let app = test_app();
        let (token, cookie) = register(&app, "a@x.test").await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/refresh")
                    .header("cookie", &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["accessToken"].as_str().is_some());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/logout")
                    .header("authorization", format!("Bearer {token}"))
                    .header("cookie", &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/refresh")
                    .header("cookie", &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_reused_passwords_reported_by_health() {
        let app = test_app();
        let (token, _) = register(&app, "a@x.test").await;

        for title in ["one", "two", "three"] {
            create_entry(&app, &token, title, "reuse-me").await;
        }

        let response = app
            .clone()
            .oneshot(authed_request("GET", "/api/passwords/health", &token, None))
            .await
            .unwrap();
        let health = body_json(response).await;
        assert_eq!(health["total"], 3);
        assert_eq!(health["reused"], 3);
    }

    #[tokio::test]
    async fn test_registration_policy_and_conflict() {
        let app = test_app();

        // Policy violation: no digit
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/register",
                serde_json::json!({ "email": "a@x.test", "password": "NoDigits!" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["details"].as_array().is_some());

        // Duplicate email
        register(&app, "a@x.test").await;
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/register",
                serde_json::json!({ "email": "a@x.test", "password": "Passw0rd!" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_same_error() {
        let app = test_app();
        register(&app, "a@x.test").await;

        let wrong = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/login",
                serde_json::json!({ "email": "a@x.test", "password": "Wrong0pass!" }),
            ))
            .await
            .unwrap();
        let unknown = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/login",
                serde_json::json!({ "email": "nobody@x.test", "password": "Wrong0pass!" }),
            ))
            .await
            .unwrap();

        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(wrong).await, body_json(unknown).await);
    }

    #[tokio::test]
    async fn test_unauthenticated_and_invalid_bearer() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/passwords")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(authed_request("GET", "/api/passwords", "garbage", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn test_unknown_body_fields_rejected() {
        let app = test_app();
        let (token, _) = register(&app, "a@x.test").await;

        let response = app
            .clone()
            .oneshot(authed_request(
                "POST",
                "/api/passwords",
                &token,
                Some(serde_json::json!({
                    "title": "x",
                    "password": "y",
                    "unexpected": true,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_collections_and_tags_flow() {
        let app = test_app();
        let (token, _) = register(&app, "a@x.test").await;

        let response = app
            .clone()
            .oneshot(authed_request(
                "POST",
                "/api/collections",
                &token,
                Some(serde_json::json!({ "name": "Work" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let collection = body_json(response).await["collection"].clone();
        let collection_id = collection["id"].as_str().unwrap().to_string();

        // Entry created with tags and collection
        let response = app
            .clone()
            .oneshot(authed_request(
                "POST",
                "/api/passwords",
                &token,
                Some(serde_json::json!({
                    "title": "VPN",
                    "password": "Secret123!",
                    "tags": ["infra", "work"],
                    "collectionId": collection_id,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let entry = body_json(response).await["entry"].clone();
        assert_eq!(entry["tags"].as_array().unwrap().len(), 2);
        let entry_id = entry["id"].as_str().unwrap().to_string();

        // Filter by collection
        let response = app
            .clone()
            .oneshot(authed_request(
                "GET",
                &format!("/api/passwords?collectionId={collection_id}"),
                &token,
                None,
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);

        // Deleting the collection re-parents the entry
        let response = app
            .clone()
            .oneshot(authed_request(
                "DELETE",
                &format!("/api/collections/{collection_id}"),
                &token,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(authed_request(
                "GET",
                &format!("/api/passwords/{entry_id}"),
                &token,
                None,
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert!(body["entry"]["collectionId"].is_null());
    }

    #[tokio::test]
    async fn test_export_import_roundtrip_is_idempotent_per_entry() {
        let app = test_app();
        let (token, _) = register(&app, "a@x.test").await;
        create_entry(&app, &token, "Gmail", "Hunter2A!").await;

        let response = app
            .clone()
            .oneshot(authed_request("GET", "/api/passwords/export", &token, None))
            .await
            .unwrap();
        let export = body_json(response).await;
        assert_eq!(export["entries"][0]["password"], "Hunter2A!");

        // Import: one valid, one missing password (skipped)
        let response = app
            .clone()
            .oneshot(authed_request(
                "POST",
                "/api/passwords/import",
                &token,
                Some(serde_json::json!({
                    "entries": [
                        { "title": "Imported", "password": "Import3d!" },
                        { "title": "Broken" },
                    ]
                })),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["imported"], 1);
        assert_eq!(body["skipped"], 1);
    }

    #[tokio::test]
    async fn test_bulk_delete_and_toggles() {
        let app = test_app();
        let (token, _) = register(&app, "a@x.test").await;

        let first = create_entry(&app, &token, "one", "Secret123!").await;
        let second = create_entry(&app, &token, "two", "Secret123!").await;
        let first_id = first["id"].as_str().unwrap();

        let response = app
            .clone()
            .oneshot(authed_request(
                "POST",
                &format!("/api/passwords/{first_id}/favorite"),
                &token,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["isFavorite"], true);

        let response = app
            .clone()
            .oneshot(authed_request(
                "POST",
                "/api/passwords/bulk-delete",
                &token,
                Some(serde_json::json!({
                    "entryIds": [first["id"], second["id"], uuid::Uuid::new_v4()],
                })),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["count"], 2);
    }

    #[tokio::test]
    async fn test_auth_rate_limit_returns_429() {
        let storage = Storage::in_memory().unwrap();
        let mut config = ServerConfig::for_tests();
        config.auth_rate_limit = 2;
        let state = AppState::new(storage, config).unwrap();
        let app = build_router(state);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/api/auth/login",
                    serde_json::json!({ "email": "a@x.test", "password": "Nope1234!" }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/auth/login",
                serde_json::json!({ "email": "a@x.test", "password": "Nope1234!" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
