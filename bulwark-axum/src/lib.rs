//! # Bulwark Axum Integration
//!
//! Axum routes for the Bulwark lockout engine: a status probe for the login
//! form and a login endpoint guarded by the CAPTCHA and lockout checks.
//!
//! ## Routes
//!
//! - `POST /security-status` with `{ "email" }` returns the form's status snapshot
//! - `POST /login` with `{ "email", "password", "captchaVerified" }` checks
//!   credentials through your [`CredentialVerifier`]
//! - `GET /health` reports storage health
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::{net::SocketAddr, sync::Arc};
//! use axum::Router;
//! use bulwark::BulwarkBuilder;
//! use bulwark_core::{CredentialVerifier, Error, IdentityKey};
//!
//! struct Users;
//!
//! #[async_trait::async_trait]
//! impl CredentialVerifier for Users {
//!     type Principal = String;
//!
//!     async fn verify(&self, identity: &IdentityKey, password: &str) -> Result<Option<String>, Error> {
//!         // Look the user up and check the password hash here
//!         Ok(None)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bulwark = Arc::new(BulwarkBuilder::new().with_memory().build().await?);
//!
//!     let app = Router::new().nest("/auth", bulwark_axum::routes(bulwark, Arc::new(Users)));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .await?;
//!     Ok(())
//! }
//! ```

mod error;
mod extractors;
mod routes;
mod types;

pub use error::{ApiError, Result};
pub use routes::{ApiState, create_router};
pub use types::{
    ApiResponse, ConnectionInfo, HealthResponse, LoginRequest, LoginResponse,
    SecurityStatusRequest,
};

use std::sync::Arc;

use axum::Router;
use bulwark::Bulwark;
use bulwark_core::{CredentialVerifier, RepositoryProvider};
use serde::Serialize;

/// Create the lockout routes for your Axum application.
///
/// The returned router can be nested at any path, e.g. `/auth`. Serve it
/// with `into_make_service_with_connect_info::<SocketAddr>()` so client
/// addresses are recorded with each attempt.
pub fn routes<R, V>(bulwark: Arc<Bulwark<R>>, verifier: Arc<V>) -> Router
where
    R: RepositoryProvider,
    V: CredentialVerifier,
    V::Principal: Serialize,
{
    create_router(bulwark, verifier)
}
