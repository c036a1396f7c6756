//! Login orchestration: lockout and CAPTCHA gates around a credential check.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Error, IdentityKey,
    error::AuthError,
    repositories::AttemptRepository,
    services::SecurityStatusService,
};

/// Checks a password against whatever stores the application's credentials.
///
/// Password hashing and user lookup live outside this crate. Implementations
/// return `Ok(None)` for an unknown account as well as a wrong password so the
/// two cases are indistinguishable to the caller.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    /// What a successful login yields, e.g. a user record or a session handle.
    type Principal: Send;

    async fn verify(
        &self,
        identity: &IdentityKey,
        password: &str,
    ) -> Result<Option<Self::Principal>, Error>;
}

/// Runs a login attempt through the lockout checks.
///
/// Order of checks:
///
/// 1. The email must be a valid identity, otherwise the attempt is rejected
///    as invalid credentials and nothing is recorded.
/// 2. A locked account is rejected before credentials are checked.
/// 3. When a CAPTCHA is required but was not solved, the attempt is rejected
///    without counting as a failure.
/// 4. The verifier decides; its verdict is recorded.
///
/// A storage error at any step denies the login.
pub struct LoginOrchestrator<R: AttemptRepository, V: CredentialVerifier> {
    security: Arc<SecurityStatusService<R>>,
    verifier: Arc<V>,
}

impl<R: AttemptRepository, V: CredentialVerifier> LoginOrchestrator<R, V> {
    pub fn new(security: Arc<SecurityStatusService<R>>, verifier: Arc<V>) -> Self {
        Self { security, verifier }
    }

    pub fn security(&self) -> &SecurityStatusService<R> {
        &self.security
    }

    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        captcha_verified: bool,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<V::Principal, Error> {
        let Ok(identity) = IdentityKey::parse(email) else {
            return Err(AuthError::InvalidCredentials.into());
        };

        let state = self.security.evaluate_identity(&identity).await?;

        if let Some(locked_until) = state.lockout_ends_at {
            tracing::debug!(identity = %identity, "Rejected login for locked account");
            return Err(AuthError::AccountLocked { locked_until }.into());
        }

        if state.requires_captcha && !captcha_verified {
            return Err(AuthError::CaptchaRequired.into());
        }

        match self.verifier.verify(&identity, password).await? {
            Some(principal) => {
                self.security
                    .record_success_for(&identity, ip_address, user_agent)
                    .await?;
                Ok(principal)
            }
            None => {
                let state = self
                    .security
                    .record_failure_for(&identity, ip_address, user_agent)
                    .await?;

                // A concurrent failure may have started the episode instead of
                // this one; the account is locked either way.
                match state.lockout_ends_at {
                    Some(locked_until) => Err(AuthError::AccountLocked { locked_until }.into()),
                    None => Err(AuthError::InvalidCredentials.into()),
                }
            }
        }
    }
}
