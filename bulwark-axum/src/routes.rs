use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use bulwark::{AttemptRepo, Bulwark};
use bulwark_core::{CredentialVerifier, LoginOrchestrator, RepositoryProvider};
use serde::Serialize;

use crate::{
    error::{ApiError, Result},
    types::*,
};

/// Shared state for the lockout routes
pub struct ApiState<R: RepositoryProvider, V: CredentialVerifier> {
    pub bulwark: Arc<Bulwark<R>>,
    pub login: Arc<LoginOrchestrator<AttemptRepo<R>, V>>,
}

impl<R: RepositoryProvider, V: CredentialVerifier> Clone for ApiState<R, V> {
    fn clone(&self) -> Self {
        Self {
            bulwark: self.bulwark.clone(),
            login: self.login.clone(),
        }
    }
}

pub fn create_router<R, V>(bulwark: Arc<Bulwark<R>>, verifier: Arc<V>) -> Router
where
    R: RepositoryProvider,
    V: CredentialVerifier,
    V::Principal: Serialize,
{
    let login = Arc::new(bulwark.login(verifier));
    let state = ApiState { bulwark, login };

    Router::new()
        .route("/health", get(health_handler))
        .route("/security-status", post(security_status_handler))
        .route("/login", post(login_handler))
        .with_state(state)
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

async fn health_handler<R, V>(State(state): State<ApiState<R, V>>) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    V: CredentialVerifier,
{
    state.bulwark.health_check().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn security_status_handler<R, V>(
    State(state): State<ApiState<R, V>>,
    payload: std::result::Result<Json<SecurityStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    V: CredentialVerifier,
{
    let payload = json_body(payload)?;
    let status = state.bulwark.get_security_status(&payload.email).await;

    Ok(Json(ApiResponse::ok(status)))
}

async fn login_handler<R, V>(
    State(state): State<ApiState<R, V>>,
    connection_info: ConnectionInfo,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
    V: CredentialVerifier,
    V::Principal: Serialize,
{
    let payload = json_body(payload)?;

    let principal = state
        .login
        .authenticate(
            &payload.email,
            &payload.password,
            payload.captcha_verified,
            connection_info.ip.as_deref(),
            connection_info.user_agent.as_deref(),
        )
        .await?;

    Ok(Json(ApiResponse::ok(LoginResponse { principal })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use bulwark::MemoryRepositoryProvider;
    use bulwark_core::{Error, IdentityKey};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct Accounts;

    #[async_trait]
    impl CredentialVerifier for Accounts {
        type Principal = String;

        async fn verify(
            &self,
            identity: &IdentityKey,
            password: &str,
        ) -> std::result::Result<Option<String>, Error> {
            Ok((identity.as_str() == "clerk@example.com" && password == "s3cret")
                .then(|| "user_1".to_string()))
        }
    }

    fn app() -> Router {
        let bulwark = Arc::new(Bulwark::new(Arc::new(MemoryRepositoryProvider::new())));
        create_router(bulwark, Arc::new(Accounts))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn login(password: &str, captcha_verified: bool) -> Request<Body> {
        post_json(
            "/login",
            json!({
                "email": "clerk@example.com",
                "password": password,
                "captchaVerified": captcha_verified
            }),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_security_status_for_new_account() {
        let app = app();

        let (status, body) = send(
            &app,
            post_json("/security-status", json!({ "email": "clerk@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "success": true,
                "data": {
                    "requiresCaptcha": false,
                    "isLocked": false,
                    "lockoutEndsAt": null,
                    "attemptsRemaining": null
                }
            })
        );
    }

    #[tokio::test]
    async fn test_security_status_rejects_malformed_body() {
        let app = app();

        let (status, body) = send(&app, post_json("/security-status", json!({ "mail": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn test_login_success() {
        let app = app();

        let (status, body) = send(&app, login("s3cret", false)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "data": { "principal": "user_1" } }));
    }

    #[tokio::test]
    async fn test_login_escalates_to_captcha_then_lockout() {
        let app = app();

        for _ in 0..3 {
            let (status, body) = send(&app, login("guess", false)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["code"], 401);
        }

        // Three failures: credentials are not even checked without a CAPTCHA.
        let (status, body) = send(&app, login("s3cret", false)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);

        let (status, _) = send(&app, login("guess", true)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, login("guess", true)).await;
        assert_eq!(status, StatusCode::LOCKED);
        assert!(body["lockoutEndsAt"].is_string());

        let (status, body) = send(
            &app,
            post_json("/security-status", json!({ "email": "clerk@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["isLocked"], true);
        assert_eq!(body["data"]["requiresCaptcha"], true);
    }

    #[tokio::test]
    async fn test_locked_response_sets_retry_after() {
        let app = app();
        for _ in 0..5 {
            send(&app, login("guess", true)).await;
        }

        let response = app.clone().oneshot(login("s3cret", true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::LOCKED);
        let retry_after: i64 = response.headers()["retry-after"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(retry_after > 14 * 60);
    }

    #[tokio::test]
    async fn test_login_with_invalid_email() {
        let app = app();

        let (status, _) = send(
            &app,
            post_json("/login", json!({ "email": "nobody", "password": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
