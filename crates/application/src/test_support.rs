//! Fake ports shared by service tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::{Mutex, Notify};

use marquee_core::{AppError, AppResult, BearerCredential, VerifiedIdentity};
use marquee_domain::{Capability, CapabilityOverrides, CapabilitySet, Role, UserRecord};

use crate::{
    AuditEvent, AuditRepository, FreshTokenSource, IdentityVerifier, PermissionSyncAction,
    SyncOutcome, UserRecordStore,
};

pub(crate) fn credential(token: &str) -> BearerCredential {
    BearerCredential::new(token).unwrap_or_else(|_| panic!("test credential must not be empty"))
}

pub(crate) fn stored_record(role: Role, version: u32) -> UserRecord {
    let now = Utc::now();
    UserRecord {
        role,
        capabilities: CapabilitySet::for_role(role),
        schema_version: version,
        email: None,
        overrides: CapabilityOverrides::default(),
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
pub(crate) struct FakeUserRecordStore {
    records: Mutex<HashMap<String, UserRecord>>,
    writes: AtomicUsize,
    successful_creates: AtomicUsize,
    hidden_reads: AtomicUsize,
    fail_writes: AtomicBool,
    read_gate: Option<Arc<Notify>>,
}

impl FakeUserRecordStore {
    /// Blocks every `get` until the gate is notified once per call.
    pub(crate) fn gated(gate: Arc<Notify>) -> Self {
        Self {
            read_gate: Some(gate),
            ..Self::default()
        }
    }

    /// Makes the next `count` reads report no record, as if a concurrent
    /// create had not become visible yet.
    pub(crate) fn hide_next_reads(&self, count: usize) {
        self.hidden_reads.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn insert(&self, subject: &str, record: UserRecord) {
        self.records.lock().await.insert(subject.to_owned(), record);
    }

    pub(crate) async fn record(&self, subject: &str) -> UserRecord {
        self.records
            .lock()
            .await
            .get(subject)
            .cloned()
            .unwrap_or_else(|| panic!("no record for '{subject}'"))
    }

    pub(crate) async fn contains(&self, subject: &str) -> bool {
        self.records.lock().await.contains_key(subject)
    }

    pub(crate) async fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn successful_creates(&self) -> usize {
        self.successful_creates.load(Ordering::SeqCst)
    }

    fn begin_write(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("document store write failed".to_owned()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn mutate(
        &self,
        subject: &str,
        change: impl FnOnce(&mut UserRecord) + Send,
    ) -> AppResult<()> {
        self.begin_write()?;
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(subject)
            .ok_or_else(|| AppError::NotFound(format!("no record for '{subject}'")))?;
        change(record);
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UserRecordStore for FakeUserRecordStore {
    async fn get(&self, subject: &str) -> AppResult<Option<UserRecord>> {
        if let Some(gate) = &self.read_gate {
            gate.notified().await;
        }

        let hidden = self
            .hidden_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            })
            .is_ok();
        if hidden {
            return Ok(None);
        }

        Ok(self.records.lock().await.get(subject).cloned())
    }

    async fn create(&self, subject: &str, record: &UserRecord) -> AppResult<()> {
        self.begin_write()?;
        let mut records = self.records.lock().await;
        if records.contains_key(subject) {
            return Err(AppError::AlreadyExists(format!(
                "record for '{subject}' already exists"
            )));
        }
        records.insert(subject.to_owned(), record.clone());
        self.successful_creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_capabilities(
        &self,
        subject: &str,
        capabilities: &CapabilitySet,
        version: u32,
    ) -> AppResult<()> {
        let capabilities = *capabilities;
        self.mutate(subject, move |record| {
            record.capabilities = capabilities;
            record.schema_version = version;
        })
        .await
    }

    async fn update_role(
        &self,
        subject: &str,
        role: Role,
        capabilities: &CapabilitySet,
        version: u32,
    ) -> AppResult<()> {
        let capabilities = *capabilities;
        self.mutate(subject, move |record| {
            record.role = role;
            record.capabilities = capabilities;
            record.schema_version = version;
            record.overrides = CapabilityOverrides::default();
        })
        .await
    }

    async fn update_one_capability(
        &self,
        subject: &str,
        capability: Capability,
        value: bool,
    ) -> AppResult<()> {
        self.mutate(subject, move |record| {
            record.capabilities.set(capability, value);
            record.overrides.record(capability, value);
        })
        .await
    }
}

#[derive(Default)]
pub(crate) struct FakeIdentityVerifier {
    identities: HashMap<String, VerifiedIdentity>,
    unavailable: bool,
}

impl FakeIdentityVerifier {
    pub(crate) fn with_subject(token: &str, subject: &str, email: Option<&str>) -> Self {
        Self::default().and(token, subject, email)
    }

    pub(crate) fn and(mut self, token: &str, subject: &str, email: Option<&str>) -> Self {
        let now = Utc::now();
        self.identities.insert(
            token.to_owned(),
            VerifiedIdentity::from_verified_claims(
                subject,
                email.map(ToOwned::to_owned),
                now,
                now + Duration::minutes(60),
            ),
        );
        self
    }

    pub(crate) fn and_issued_at(
        mut self,
        token: &str,
        subject: &str,
        email: Option<&str>,
        issued_minutes_ago: i64,
    ) -> Self {
        let now = Utc::now();
        self.identities.insert(
            token.to_owned(),
            VerifiedIdentity::from_verified_claims(
                subject,
                email.map(ToOwned::to_owned),
                now - Duration::minutes(issued_minutes_ago),
                now + Duration::minutes(60),
            ),
        );
        self
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl IdentityVerifier for FakeIdentityVerifier {
    async fn verify(&self, credential: &BearerCredential) -> AppResult<VerifiedIdentity> {
        if self.unavailable {
            return Err(AppError::VerifierUnavailable(
                "identity provider unreachable".to_owned(),
            ));
        }

        self.identities
            .get(credential.expose())
            .cloned()
            .ok_or_else(|| AppError::InvalidCredential("signature mismatch".to_owned()))
    }
}

pub(crate) struct FakeTokenSource {
    token: String,
    refreshed: Option<String>,
    forced_refreshes: AtomicUsize,
}

impl FakeTokenSource {
    pub(crate) fn new(token: &str) -> Self {
        Self {
            token: token.to_owned(),
            refreshed: None,
            forced_refreshes: AtomicUsize::new(0),
        }
    }

    /// Hands out `refreshed` instead of `token` once a refresh is forced.
    pub(crate) fn refreshing_to(token: &str, refreshed: &str) -> Self {
        Self {
            refreshed: Some(refreshed.to_owned()),
            ..Self::new(token)
        }
    }

    pub(crate) fn forced_refreshes(&self) -> usize {
        self.forced_refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FreshTokenSource for FakeTokenSource {
    async fn fresh_token(&self, force_refresh: bool) -> AppResult<BearerCredential> {
        if force_refresh {
            self.forced_refreshes.fetch_add(1, Ordering::SeqCst);
            if let Some(refreshed) = &self.refreshed {
                return Ok(credential(refreshed.as_str()));
            }
        }
        Ok(credential(self.token.as_str()))
    }
}

pub(crate) struct UnavailableSyncAction;

#[async_trait]
impl PermissionSyncAction for UnavailableSyncAction {
    async fn sync_if_stale(&self, _credential: &BearerCredential) -> AppResult<SyncOutcome> {
        Err(AppError::VerifierUnavailable(
            "identity provider unreachable".to_owned(),
        ))
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    pub(crate) events: Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
