use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use marquee_core::{AppResult, BearerCredential, VerifiedIdentity};

/// Port for the identity provider's credential verification.
///
/// The only input is the credential itself; the subject is always derived
/// from it, never supplied by the caller.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verifies a bearer credential and returns the trusted identity.
    ///
    /// Fails with `InvalidCredential` for expired, malformed, or forged
    /// credentials and `VerifierUnavailable` when the provider is unreachable.
    async fn verify(&self, credential: &BearerCredential) -> AppResult<VerifiedIdentity>;
}

/// Port for obtaining short-lived credentials from the identity provider.
#[async_trait]
pub trait FreshTokenSource: Send + Sync {
    /// Returns a credential, forcing the provider to reissue when requested.
    async fn fresh_token(&self, force_refresh: bool) -> AppResult<BearerCredential>;
}

/// Credential presented with the current request.
///
/// A request-scoped credential is as fresh as the server can obtain, so a
/// forced refresh returns the same value.
#[derive(Debug, Clone)]
pub struct PresentedCredential(BearerCredential);

impl PresentedCredential {
    /// Wraps a credential received with the current request.
    #[must_use]
    pub fn new(credential: BearerCredential) -> Self {
        Self(credential)
    }
}

#[async_trait]
impl FreshTokenSource for PresentedCredential {
    async fn fresh_token(&self, _force_refresh: bool) -> AppResult<BearerCredential> {
        Ok(self.0.clone())
    }
}

/// Verification entry point for privileged write paths.
///
/// Combines provider verification with the freshness bound every
/// trust-sensitive action requires.
#[derive(Clone)]
pub struct TrustBoundary {
    verifier: Arc<dyn IdentityVerifier>,
    max_credential_age: Duration,
}

impl TrustBoundary {
    /// Creates a trust boundary from a verifier and the maximum credential age.
    #[must_use]
    pub fn new(verifier: Arc<dyn IdentityVerifier>, max_credential_age: Duration) -> Self {
        Self {
            verifier,
            max_credential_age,
        }
    }

    /// Verifies a credential for display-only checks.
    pub async fn verify(&self, credential: &BearerCredential) -> AppResult<VerifiedIdentity> {
        self.verifier.verify(credential).await
    }

    /// Verifies a credential and requires that it was issued recently.
    pub async fn verify_fresh(
        &self,
        credential: &BearerCredential,
    ) -> AppResult<VerifiedIdentity> {
        let identity = self.verifier.verify(credential).await?;
        identity.ensure_fresh(Utc::now(), self.max_credential_age)?;
        Ok(identity)
    }
}
