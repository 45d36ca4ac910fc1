//! Locally verified HS256 identity tokens.
//!
//! Tokens use the compact JWS layout `header.claims.signature`, each segment
//! base64url-encoded without padding, signed with HMAC-SHA256 over a shared
//! secret held by the identity provider and this server.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use marquee_application::IdentityVerifier;
use marquee_core::{AppError, AppResult, BearerCredential, VerifiedIdentity};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Shortest accepted signing secret, in bytes.
pub const MIN_TOKEN_SECRET_BYTES: usize = 32;

const ALGORITHM: &str = "HS256";
const ISSUED_AT_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Claims carried by an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Stable subject identifier.
    pub sub: String,
    /// Email claim, when the provider shares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issue time in seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry time in seconds since the Unix epoch.
    pub exp: i64,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Identity verifier for HMAC-signed tokens.
#[derive(Clone)]
pub struct HmacTokenVerifier {
    secret: Vec<u8>,
    issuer: Option<String>,
}

impl HmacTokenVerifier {
    /// Creates a verifier for the given shared secret and optional expected issuer.
    pub fn new(secret: impl Into<Vec<u8>>, issuer: Option<String>) -> AppResult<Self> {
        let secret = secret.into();
        if secret.len() < MIN_TOKEN_SECRET_BYTES {
            return Err(AppError::Misconfiguration(format!(
                "identity token secret must be at least {MIN_TOKEN_SECRET_BYTES} bytes"
            )));
        }

        Ok(Self { secret, issuer })
    }

    /// Signs claims into a token.
    ///
    /// Used by development tooling and tests that stand in for the identity
    /// provider.
    pub fn issue(&self, claims: &TokenClaims) -> AppResult<String> {
        let header = TokenHeader {
            alg: ALGORITHM.to_owned(),
            typ: Some("JWT".to_owned()),
        };
        let header = encode_segment(&header)?;
        let claims = encode_segment(claims)?;
        let signing_input = format!("{header}.{claims}");
        let signature = self.mac(signing_input.as_bytes())?.finalize().into_bytes();
        let signature = URL_SAFE_NO_PAD.encode(signature);

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verifies a token against a fixed clock.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AppResult<VerifiedIdentity> {
        let Some((signing_input, signature)) = token.rsplit_once('.') else {
            return Err(invalid("token must have three segments"));
        };
        let Some((header, claims)) = signing_input.split_once('.') else {
            return Err(invalid("token must have three segments"));
        };
        if claims.contains('.') {
            return Err(invalid("token must have three segments"));
        }

        let header: TokenHeader = decode_segment(header)?;
        if header.alg != ALGORITHM {
            return Err(invalid("unsupported token algorithm"));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| invalid("token signature is not base64url"))?;
        self.mac(signing_input.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| invalid("token signature mismatch"))?;

        let claims: TokenClaims = decode_segment(claims)?;
        self.validate_claims(claims, now)
    }

    fn validate_claims(
        &self,
        claims: TokenClaims,
        now: DateTime<Utc>,
    ) -> AppResult<VerifiedIdentity> {
        if claims.sub.trim().is_empty() {
            return Err(invalid("token subject is empty"));
        }

        if let Some(expected) = &self.issuer
            && claims.iss.as_deref() != Some(expected.as_str())
        {
            return Err(invalid("token issuer mismatch"));
        }

        let issued_at = timestamp(claims.iat)?;
        let expires_at = timestamp(claims.exp)?;
        if expires_at <= now {
            return Err(invalid("token has expired"));
        }
        if issued_at.timestamp() > now.timestamp() + ISSUED_AT_SKEW_SECONDS {
            return Err(invalid("token is issued in the future"));
        }

        Ok(VerifiedIdentity::from_verified_claims(
            claims.sub,
            claims.email,
            issued_at,
            expires_at,
        ))
    }

    fn mac(&self, signing_input: &[u8]) -> AppResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_slice()).map_err(|error| {
            AppError::Misconfiguration(format!("invalid identity token secret: {error}"))
        })?;
        mac.update(signing_input);
        Ok(mac)
    }
}

#[async_trait]
impl IdentityVerifier for HmacTokenVerifier {
    async fn verify(&self, credential: &BearerCredential) -> AppResult<VerifiedIdentity> {
        self.verify_at(credential.expose(), Utc::now())
    }
}

fn invalid(reason: &str) -> AppError {
    AppError::InvalidCredential(reason.to_owned())
}

fn timestamp(seconds: i64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| invalid("token timestamp is out of range"))
}

fn encode_segment<T: Serialize>(value: &T) -> AppResult<String> {
    let json = serde_json::to_vec(value)
        .map_err(|error| AppError::Internal(format!("failed to encode token segment: {error}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> AppResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| invalid("token segment is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| invalid("token segment is not valid JSON"))
}
