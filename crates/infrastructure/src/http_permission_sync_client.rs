use async_trait::async_trait;
use marquee_application::{PermissionSyncAction, SyncOutcome};
use marquee_core::{AppError, AppResult, BearerCredential};
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

/// Client for the server's `/auth/sync` trust-boundary action.
///
/// Lets a session resolve in a different process from the one allowed to
/// write capabilities.
#[derive(Clone)]
pub struct HttpPermissionSyncClient {
    http_client: reqwest::Client,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
struct SyncResponseBody {
    outcome: String,
    from_version: u32,
    to_version: u32,
}

impl HttpPermissionSyncClient {
    /// Creates a client for the server at `base_url`.
    pub fn new(http_client: reqwest::Client, base_url: &Url) -> AppResult<Self> {
        let endpoint = base_url.join("auth/sync").map_err(|error| {
            AppError::Misconfiguration(format!("invalid permission sync base url: {error}"))
        })?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }
}

#[async_trait]
impl PermissionSyncAction for HttpPermissionSyncClient {
    async fn sync_if_stale(&self, credential: &BearerCredential) -> AppResult<SyncOutcome> {
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|error| {
                AppError::VerifierUnavailable(format!("permission sync request failed: {error}"))
            })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED => {
                return Err(AppError::InvalidCredential(
                    "permission sync rejected the credential".to_owned(),
                ));
            }
            StatusCode::NOT_FOUND => {
                return Err(AppError::NotFound("no user record to resync".to_owned()));
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                return Err(AppError::VerifierUnavailable(
                    "permission sync could not verify the credential".to_owned(),
                ));
            }
            status => {
                return Err(AppError::Internal(format!(
                    "permission sync returned status {status}"
                )));
            }
        }

        let body: SyncResponseBody = response.json().await.map_err(|error| {
            AppError::Internal(format!("permission sync returned an unreadable response: {error}"))
        })?;

        match body.outcome.as_str() {
            "already_current" => Ok(SyncOutcome::AlreadyCurrent {
                version: body.to_version,
            }),
            "refreshed" => Ok(SyncOutcome::Refreshed {
                from_version: body.from_version,
                to_version: body.to_version,
            }),
            other => Err(AppError::Internal(format!(
                "permission sync returned unknown outcome '{other}'"
            ))),
        }
    }
}
