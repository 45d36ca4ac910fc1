//! In-process API state for handler tests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use chrono::{Duration, Utc};
use marquee_application::{AuditEvent, AuditRepository, UserRecordStore};
use marquee_core::AppResult;
use marquee_domain::{CAPABILITY_SCHEMA_VERSION, CapabilitySet, Role, UserRecord};
use marquee_infrastructure::{HmacTokenVerifier, InMemoryUserRecordStore, TokenClaims};
use tokio::sync::Mutex;

use crate::api_config::ApiConfig;
use crate::api_services::assemble_app_state;
use crate::state::AppState;

pub(crate) const FRONTEND_URL: &str = "http://localhost:3000";
const SECRET: &str = "test-secret-test-secret-test-secret";

#[derive(Default)]
pub(crate) struct RecordingAuditRepository {
    pub(crate) events: Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditRepository for RecordingAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

pub(crate) struct TestApi {
    pub(crate) state: AppState,
    pub(crate) store: Arc<InMemoryUserRecordStore>,
    pub(crate) audit: Arc<RecordingAuditRepository>,
    issuer: HmacTokenVerifier,
}

impl TestApi {
    pub(crate) fn new() -> Self {
        Self::with_privileged("")
    }

    pub(crate) fn with_privileged(emails: &str) -> Self {
        let config = ApiConfig::from_lookup(false, |name| match name {
            "DATABASE_URL" => Some("postgres://localhost/marquee_test".to_owned()),
            "IDENTITY_TOKEN_SECRET" => Some(SECRET.to_owned()),
            "FRONTEND_URL" => Some(FRONTEND_URL.to_owned()),
            "PRIVILEGED_IDENTITY_EMAILS" => Some(emails.to_owned()),
            _ => None,
        })
        .unwrap_or_else(|error| panic!("test config failed: {error}"));

        let issuer = HmacTokenVerifier::new(SECRET, None)
            .unwrap_or_else(|error| panic!("test verifier failed: {error}"));
        let store = Arc::new(InMemoryUserRecordStore::new());
        let audit = Arc::new(RecordingAuditRepository::default());
        let state = assemble_app_state(
            store.clone(),
            audit.clone(),
            Arc::new(issuer.clone()),
            &config,
        );

        Self {
            state,
            store,
            audit,
            issuer,
        }
    }

    /// Authorization headers carrying a freshly issued token.
    pub(crate) fn bearer(&self, subject: &str, email: Option<&str>) -> HeaderMap {
        self.bearer_issued_minutes_ago(subject, email, 0)
    }

    pub(crate) fn bearer_issued_minutes_ago(
        &self,
        subject: &str,
        email: Option<&str>,
        minutes: i64,
    ) -> HeaderMap {
        let now = Utc::now();
        let token = self
            .issuer
            .issue(&TokenClaims {
                sub: subject.to_owned(),
                email: email.map(ToOwned::to_owned),
                iat: (now - Duration::minutes(minutes)).timestamp(),
                exp: (now + Duration::minutes(60)).timestamp(),
                iss: None,
            })
            .unwrap_or_else(|error| panic!("token issue failed: {error}"));

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(format!("Bearer {token}").as_str())
                .unwrap_or_else(|_| panic!("token must be a valid header value")),
        );
        headers
    }

    pub(crate) async fn seed(&self, subject: &str, role: Role, version: u32) {
        let now = Utc::now();
        let record = UserRecord {
            role,
            capabilities: CapabilitySet::for_role(role),
            schema_version: version,
            email: None,
            overrides: Default::default(),
            created_at: now,
            updated_at: now,
        };
        self.store
            .create(subject, &record)
            .await
            .unwrap_or_else(|error| panic!("seeding '{subject}' failed: {error}"));
    }

    pub(crate) async fn seed_current(&self, subject: &str, role: Role) {
        self.seed(subject, role, CAPABILITY_SCHEMA_VERSION).await;
    }

    pub(crate) async fn record(&self, subject: &str) -> UserRecord {
        self.store
            .get(subject)
            .await
            .unwrap_or_else(|error| panic!("reading '{subject}' failed: {error}"))
            .unwrap_or_else(|| panic!("no record for '{subject}'"))
    }
}
