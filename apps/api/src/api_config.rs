use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use marquee_application::PrivilegedIdentityAllowList;
use marquee_core::AppError;
use marquee_domain::OverridePolicy;
use marquee_infrastructure::MIN_TOKEN_SECRET_BYTES;
use tracing_subscriber::EnvFilter;
use url::{Origin, Url};

const DEFAULT_FRESH_CREDENTIAL_MAX_AGE_SECONDS: i64 = 300;
const DEFAULT_RESOLUTION_TIMEOUT_SECONDS: i64 = 5;
const DEFAULT_SESSION_AUTHORIZATION_MAX_AGE_SECONDS: i64 = 60;

#[derive(Clone)]
pub enum IdentityProviderConfig {
    Hmac {
        secret: String,
        issuer: Option<String>,
    },
    Http {
        endpoint: Url,
    },
}

impl std::fmt::Debug for IdentityProviderConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hmac { issuer, .. } => formatter
                .debug_struct("Hmac")
                .field("secret", &"<redacted>")
                .field("issuer", issuer)
                .finish(),
            Self::Http { endpoint } => formatter
                .debug_struct("Http")
                .field("endpoint", &endpoint.as_str())
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub frontend_url: String,
    pub frontend_origin: Origin,
    pub api_host: String,
    pub api_port: u16,
    pub cookie_secure: bool,
    pub identity_provider: IdentityProviderConfig,
    pub privileged_identities: PrivilegedIdentityAllowList,
    pub fresh_credential_max_age: chrono::Duration,
    pub resolution_timeout: Duration,
    /// How long a session may serve its cached authorization before re-reading the record.
    pub session_authorization_max_age: chrono::Duration,
    pub override_policy: OverridePolicy,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    pub fn from_lookup(
        migrate_only: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let database_url = required_var(&lookup, "DATABASE_URL")?;
        let frontend_url =
            lookup("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".to_owned());
        let frontend_origin = parse_frontend_origin(frontend_url.as_str())?;

        let api_host = lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = lookup("API_PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);
        let cookie_secure = lookup("SESSION_COOKIE_SECURE")
            .unwrap_or_else(|| "false".to_owned())
            .eq_ignore_ascii_case("true");

        let identity_provider = match lookup("IDENTITY_PROVIDER")
            .unwrap_or_else(|| "hmac".to_owned())
            .as_str()
        {
            "hmac" => {
                let secret = required_non_empty_var(&lookup, "IDENTITY_TOKEN_SECRET")?;
                if secret.len() < MIN_TOKEN_SECRET_BYTES {
                    return Err(AppError::Validation(format!(
                        "IDENTITY_TOKEN_SECRET must be at least {MIN_TOKEN_SECRET_BYTES} bytes"
                    )));
                }
                IdentityProviderConfig::Hmac {
                    secret,
                    issuer: lookup("IDENTITY_TOKEN_ISSUER")
                        .filter(|value| !value.trim().is_empty()),
                }
            }
            "http" => {
                let raw = required_non_empty_var(&lookup, "IDENTITY_PROVIDER_URL")?;
                let endpoint = Url::parse(raw.as_str()).map_err(|error| {
                    AppError::Validation(format!("invalid IDENTITY_PROVIDER_URL: {error}"))
                })?;
                IdentityProviderConfig::Http { endpoint }
            }
            other => {
                return Err(AppError::Validation(format!(
                    "IDENTITY_PROVIDER must be either 'hmac' or 'http', got '{other}'"
                )));
            }
        };

        let privileged_identities = match lookup("PRIVILEGED_IDENTITY_EMAILS") {
            Some(raw) => PrivilegedIdentityAllowList::parse(raw.as_str()).map_err(|error| {
                AppError::Validation(format!("invalid PRIVILEGED_IDENTITY_EMAILS: {error}"))
            })?,
            None => PrivilegedIdentityAllowList::default(),
        };

        let fresh_credential_max_age = chrono::Duration::seconds(positive_seconds(
            &lookup,
            "FRESH_CREDENTIAL_MAX_AGE_SECONDS",
            DEFAULT_FRESH_CREDENTIAL_MAX_AGE_SECONDS,
        )?);
        let resolution_timeout = Duration::from_secs(
            positive_seconds(
                &lookup,
                "SESSION_RESOLUTION_TIMEOUT_SECONDS",
                DEFAULT_RESOLUTION_TIMEOUT_SECONDS,
            )?
            .unsigned_abs(),
        );
        let session_authorization_max_age = chrono::Duration::seconds(positive_seconds(
            &lookup,
            "SESSION_AUTHORIZATION_MAX_AGE_SECONDS",
            DEFAULT_SESSION_AUTHORIZATION_MAX_AGE_SECONDS,
        )?);

        let override_policy = match lookup("CAPABILITY_OVERRIDE_POLICY") {
            Some(raw) => OverridePolicy::from_str(raw.trim()).map_err(|error| {
                AppError::Validation(format!("invalid CAPABILITY_OVERRIDE_POLICY: {error}"))
            })?,
            None => OverridePolicy::default(),
        };

        Ok(Self {
            migrate_only,
            database_url,
            frontend_url,
            frontend_origin,
            api_host,
            api_port,
            cookie_secure,
            identity_provider,
            privileged_identities,
            fresh_credential_max_age,
            resolution_timeout,
            session_authorization_max_age,
            override_policy,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, AppError> {
    lookup(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_var(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<String, AppError> {
    let value = required_var(lookup, name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_frontend_origin(raw: &str) -> Result<Origin, AppError> {
    let url = Url::parse(raw)
        .map_err(|error| AppError::Validation(format!("invalid FRONTEND_URL: {error}")))?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(AppError::Validation(format!(
            "FRONTEND_URL must have an http(s) origin, got '{raw}'"
        )));
    }

    Ok(origin)
}

fn positive_seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: i64,
) -> Result<i64, AppError> {
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };

    match raw.trim().parse::<i64>() {
        Ok(seconds) if seconds > 0 => Ok(seconds),
        _ => Err(AppError::Validation(format!(
            "{name} must be a positive number of seconds, got '{raw}'"
        ))),
    }
}
