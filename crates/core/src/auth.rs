use chrono::{DateTime, Duration, Utc};

use crate::{AppError, AppResult};

/// Opaque bearer credential issued by the identity provider.
///
/// The raw token never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerCredential(String);

impl BearerCredential {
    /// Wraps a raw token, rejecting empty values.
    pub fn new(token: impl Into<String>) -> AppResult<Self> {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::InvalidCredential(
                "credential must not be empty".to_owned(),
            ));
        }

        Ok(Self(token.to_owned()))
    }

    /// Returns the raw token.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for BearerCredential {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("BearerCredential(<redacted>)")
    }
}

/// Identity produced by a verifier after checking a bearer credential.
///
/// There is no public constructor taking raw caller input in request paths:
/// verifiers build this from checked claims only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    subject: String,
    email: Option<String>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl VerifiedIdentity {
    /// Creates an identity from verified claims.
    #[must_use]
    pub fn from_verified_claims(
        subject: impl Into<String>,
        email: Option<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: subject.into(),
            email,
            issued_at,
            expires_at,
        }
    }

    /// Returns the provider-issued subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the email claim, if the provider returned one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns when the credential was issued.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns when the credential expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Rejects credentials issued more than `max_age` before `now`.
    ///
    /// Trust-sensitive actions require a freshly issued credential so that a
    /// stale but unexpired token cannot mask a revoked grant.
    pub fn ensure_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> AppResult<()> {
        if now >= self.expires_at {
            return Err(AppError::InvalidCredential(
                "credential has expired".to_owned(),
            ));
        }

        if now - self.issued_at > max_age {
            return Err(AppError::InvalidCredential(
                "credential is too old for this action, sign in again".to_owned(),
            ));
        }

        Ok(())
    }
}
