//! API routes

mod associations;
mod auth;
mod health;
pub mod metrics;
pub mod types;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::state::{AppState, MetricsHandle};

pub use auth::{REFRESH_COOKIE, RefreshCookie, RequireAuth};

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(users::routes())
        .merge(associations::routes())
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use assocnet_auth::{AuthService, AuthSettings, JwtSettings, RotationPolicy};
    use assocnet_db::Database;
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode, header};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct TestApp {
        _dir: tempfile::TempDir,
        router: Router,
    }

    async fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("api.db").display());
        let db = Database::new(&url).await.unwrap();

        let settings = AuthSettings {
            jwt: JwtSettings {
                key: "router-test-signing-key".to_string(),
                issuer: "assocnet".to_string(),
                audience: "assocnet-clients".to_string(),
                expiration_minutes: 15,
            },
            refresh_token_expiration_days: 7,
            rotation: RotationPolicy::ReuseWhileValid,
            default_roles: vec!["user".to_string()],
        };
        let auth =
            AuthService::new(&settings, Arc::new(db.clone()), Arc::new(db.clone())).unwrap();
        let state = AppState::new(db, Arc::new(auth));

        TestApp {
            _dir: dir,
            router: create_router(state, None),
        }
    }

    impl TestApp {
        async fn send(&self, request: Request<Body>) -> Response<Body> {
            self.router.clone().oneshot(request).await.unwrap()
        }

        async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
            self.send(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }

        async fn with_cookie(&self, uri: &str, cookie: &str) -> Response<Body> {
            self.send(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
        }

        async fn with_bearer(&self, method: &str, uri: &str, token: &str, body: Option<Value>) -> Response<Body> {
            let builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"));
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string())),
                None => builder.body(Body::empty()),
            };
            self.send(request.unwrap()).await
        }

        /// Register and log in, returning (access token, cookie pair)
        async fn sign_in(&self, username: &str, password: &str) -> (String, String) {
            let response = self
                .post_json("/auth/register", json!({"userName": username, "password": password}))
                .await;
            assert_eq!(response.status(), StatusCode::OK);

            let response = self
                .post_json("/auth/login", json!({"userName": username, "password": password}))
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            let cookie = cookie_pair(&response);
            let body = json_body(response).await;
            (body["accessToken"].as_str().unwrap().to_string(), cookie)
        }
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn set_cookie(response: &Response<Body>) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    /// `name=value` part of the `Set-Cookie` header
    fn cookie_pair(response: &Response<Body>) -> String {
        set_cookie(response).split(';').next().unwrap().to_string()
    }

    fn minimal_auth(db: &Database) -> AuthService {
        let settings = AuthSettings {
            jwt: JwtSettings {
                key: "k".to_string(),
                issuer: "i".to_string(),
                audience: "a".to_string(),
                expiration_minutes: 1,
            },
            refresh_token_expiration_days: 1,
            rotation: RotationPolicy::default(),
            default_roles: vec![],
        };
        AuthService::new(&settings, Arc::new(db.clone()), Arc::new(db.clone())).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let response = app
            .send(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "ok");
    }

    #[tokio::test]
    async fn test_health_reports_unavailable_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("api.db").display());
        let db = Database::new(&url).await.unwrap();
        let auth = minimal_auth(&db);
        let router = create_router(AppState::new(db.clone(), Arc::new(auth)), None);
        db.pool().close().await;

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["database"], "unavailable");
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("api.db").display());
        let db = Database::new(&url).await.unwrap();
        let auth = minimal_auth(&db);
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let router = create_router(AppState::new(db, Arc::new(auth)), Some(Arc::new(handle)));

        let response = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain; version=0.0.4")
        );
    }

    #[tokio::test]
    async fn test_auth_flow_end_to_end() {
        let app = test_app().await;

        let response = app
            .post_json("/auth/register", json!({"userName": "alice", "password": "Pw1!"}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let registered = json_body(response).await;
        assert_eq!(registered["userName"], "alice");
        assert_eq!(registered["roles"], json!(["user"]));
        assert!(registered.get("passwordHash").is_none());

        let response = app
            .post_json("/auth/login", json!({"userName": "alice", "password": "Pw1!"}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie_header = set_cookie(&response);
        assert!(cookie_header.starts_with("refreshToken="));
        assert!(cookie_header.contains("HttpOnly"));
        assert!(cookie_header.contains("Secure"));
        assert!(cookie_header.contains("SameSite=Strict"));
        let cookie = cookie_pair(&response);
        let login = json_body(response).await;
        assert_eq!(login["tokenType"], "Bearer");
        assert_eq!(login["expiresIn"], 15 * 60);
        assert!(login["accessToken"].as_str().unwrap().split('.').count() == 3);

        let response = app
            .post_json("/auth/login", json!({"userName": "alice", "password": "wrong"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid username or password");

        let response = app.with_cookie("/auth/refresh-token", &cookie).await;
        assert_eq!(response.status(), StatusCode::OK);
        let refreshed = json_body(response).await;
        assert!(refreshed["accessToken"].is_string());

        let response = app.with_cookie("/auth/logout", &cookie).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).contains("Max-Age=0"));

        let response = app.with_cookie("/auth/refresh-token", &cookie).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_conflict_is_generic_bad_request() {
        let app = test_app().await;
        app.sign_in("alice", "Pw1!").await;

        let response = app
            .post_json("/auth/register", json!({"userName": "alice", "password": "Other1!"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid username or password");
    }

    #[tokio::test]
    async fn test_undecodable_bodies_are_bad_requests() {
        let app = test_app().await;

        let incomplete = app
            .post_json("/auth/register", json!({"userName": "alice"}))
            .await;
        assert_eq!(incomplete.status(), StatusCode::BAD_REQUEST);
        let body = json_body(incomplete).await;
        assert_eq!(body["error"], "Invalid request body");
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(!body.to_string().contains("password"));

        let malformed = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await;
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(malformed).await["code"], "BAD_REQUEST");

        let no_content_type = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/associations")
                    .body(Body::from(r#"{"name":"Chess"}"#))
                    .unwrap(),
            )
            .await;
        assert_eq!(no_content_type.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(no_content_type).await["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn test_unknown_user_login_matches_wrong_password() {
        let app = test_app().await;
        app.sign_in("alice", "Pw1!").await;

        let unknown = app
            .post_json("/auth/login", json!({"userName": "mallory", "password": "Pw1!"}))
            .await;
        let wrong = app
            .post_json("/auth/login", json!({"userName": "alice", "password": "nope"}))
            .await;

        assert_eq!(unknown.status(), wrong.status());
        assert_eq!(json_body(unknown).await, json_body(wrong).await);
    }

    #[tokio::test]
    async fn test_refresh_and_logout_require_cookie() {
        let app = test_app().await;

        for uri in ["/auth/refresh-token", "/auth/logout"] {
            let response = app
                .send(Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap())
                .await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            let response = app.with_cookie(uri, "refreshToken=not-a-real-token").await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_users_require_bearer_token() {
        let app = test_app().await;

        let response = app
            .send(Request::builder().uri("/users").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.with_bearer("GET", "/users", "garbage", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_user_management() {
        let app = test_app().await;
        let (token, _) = app.sign_in("alice", "Pw1!").await;
        app.sign_in("bob", "Pw2!").await;

        let response = app.with_bearer("GET", "/users", &token, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let users = json_body(response).await;
        assert_eq!(users.as_array().unwrap().len(), 2);
        let bob_id = users[1]["id"].as_i64().unwrap();

        let response = app
            .with_bearer(
                "PUT",
                &format!("/users/{bob_id}"),
                &token,
                Some(json!({"phoneNumber": "555-0100", "active": false})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let bob = json_body(response).await;
        assert_eq!(bob["phoneNumber"], "555-0100");
        assert_eq!(bob["active"], false);

        let response = app
            .with_bearer("DELETE", &format!("/users/{bob_id}"), &token, None)
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .with_bearer("GET", &format!("/users/{bob_id}"), &token, None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Access tokens are stateless, so alice can still list after removing herself
        let alice_id = users[0]["id"].as_i64().unwrap();
        let response = app
            .with_bearer("DELETE", &format!("/users/{alice_id}"), &token, None)
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.with_bearer("GET", "/users", &token, None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_deleted_user_loses_refresh_token() {
        let app = test_app().await;
        let (token, _) = app.sign_in("alice", "Pw1!").await;
        let (_, bob_cookie) = app.sign_in("bob", "Pw2!").await;

        let response = app.with_bearer("GET", "/users", &token, None).await;
        let bob_id = json_body(response).await[1]["id"].as_i64().unwrap();

        app.with_bearer("DELETE", &format!("/users/{bob_id}"), &token, None)
            .await;

        let response = app.with_cookie("/auth/refresh-token", &bob_cookie).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_association_crud() {
        let app = test_app().await;

        let response = app
            .post_json(
                "/associations",
                json!({"name": "Chess Club", "website": "https://chess.example.org"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["active"], true);
        let id = created["id"].as_i64().unwrap();

        let response = app
            .send(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/associations/{id}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"name": "Chess Society", "website": "https://chess.example.org", "active": false})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = json_body(response).await;
        assert_eq!(updated["name"], "Chess Society");
        assert!(updated["updatedAt"].is_string());

        let response = app
            .send(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/associations/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .send(
                Request::builder()
                    .uri(format!("/associations/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .send(Request::builder().uri("/associations").body(Body::empty()).unwrap())
            .await;
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_association_validation() {
        let app = test_app().await;
        let response = app
            .post_json("/associations", json!({"name": "", "website": ""}))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "BAD_REQUEST");
    }
}
