use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_application::IdentityVerifier;
use marquee_core::{AppError, AppResult, BearerCredential, VerifiedIdentity};
use reqwest::StatusCode;
use tracing::warn;
use url::Url;

use crate::TokenClaims;

/// Identity verifier that delegates to the provider's token introspection
/// endpoint.
///
/// The endpoint receives the credential as a bearer token and answers with the
/// token's claims. A 400, 401 or 403 means the credential is invalid. Transport
/// failures and any other non-success status mean the provider is unavailable.
#[derive(Clone)]
pub struct HttpIdentityVerifier {
    http_client: reqwest::Client,
    endpoint: Url,
}

impl HttpIdentityVerifier {
    /// Creates a verifier for the given introspection endpoint.
    #[must_use]
    pub fn new(http_client: reqwest::Client, endpoint: Url) -> Self {
        Self {
            http_client,
            endpoint,
        }
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, credential: &BearerCredential) -> AppResult<VerifiedIdentity> {
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|error| {
                AppError::VerifierUnavailable(format!("identity provider request failed: {error}"))
            })?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(AppError::InvalidCredential(
                "identity provider rejected the credential".to_owned(),
            ));
        }
        if !status.is_success() {
            warn!(%status, "identity provider returned an error status");
            return Err(AppError::VerifierUnavailable(format!(
                "identity provider returned status {status}"
            )));
        }

        let claims: TokenClaims = response.json().await.map_err(|error| {
            AppError::VerifierUnavailable(format!(
                "identity provider returned an unreadable response: {error}"
            ))
        })?;

        let (Some(issued_at), Some(expires_at)) = (
            DateTime::from_timestamp(claims.iat, 0),
            DateTime::from_timestamp(claims.exp, 0),
        ) else {
            return Err(AppError::InvalidCredential(
                "token timestamp is out of range".to_owned(),
            ));
        };
        if expires_at <= Utc::now() {
            return Err(AppError::InvalidCredential("token has expired".to_owned()));
        }

        Ok(VerifiedIdentity::from_verified_claims(
            claims.sub,
            claims.email,
            issued_at,
            expires_at,
        ))
    }
}
