use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use marquee_application::UserRecordStore;
use marquee_core::{AppError, AppResult};
use marquee_domain::{Capability, CapabilitySet, Role, UserRecord, UserRecordDocument};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// In-memory document store for user records.
///
/// Holds encoded documents rather than decoded records so reads go through the
/// same validation as the PostgreSQL adapter.
#[derive(Debug, Default)]
pub struct InMemoryUserRecordStore {
    documents: RwLock<HashMap<String, UserRecordDocument>>,
    writes: AtomicUsize,
}

impl InMemoryUserRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful store writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Writes a raw document, replacing any existing one.
    pub async fn put_document(&self, subject: &str, document: UserRecordDocument) {
        self.documents
            .write()
            .await
            .insert(subject.to_owned(), document);
    }

    async fn modify(
        &self,
        subject: &str,
        change: impl FnOnce(&mut UserRecordDocument) + Send,
    ) -> AppResult<()> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(subject)
            .ok_or_else(|| AppError::NotFound(format!("no user record for '{subject}'")))?;

        change(document);
        document.updated_at = Utc::now();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl UserRecordStore for InMemoryUserRecordStore {
    async fn get(&self, subject: &str) -> AppResult<Option<UserRecord>> {
        let document = self.documents.read().await.get(subject).cloned();

        document
            .map(|document| {
                UserRecord::try_from(document).map_err(|error| {
                    AppError::Internal(format!(
                        "stored user record for '{subject}' is invalid: {error}"
                    ))
                })
            })
            .transpose()
    }

    async fn create(&self, subject: &str, record: &UserRecord) -> AppResult<()> {
        match self.documents.write().await.entry(subject.to_owned()) {
            Entry::Occupied(_) => Err(AppError::AlreadyExists(format!(
                "user record for '{subject}' already exists"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(UserRecordDocument::from(record));
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    async fn update_capabilities(
        &self,
        subject: &str,
        capabilities: &CapabilitySet,
        version: u32,
    ) -> AppResult<()> {
        let permissions = UserRecordDocument::encode_permissions(capabilities, version);
        self.modify(subject, move |document| document.permissions = permissions)
            .await
    }

    async fn update_role(
        &self,
        subject: &str,
        role: Role,
        capabilities: &CapabilitySet,
        version: u32,
    ) -> AppResult<()> {
        let permissions = UserRecordDocument::encode_permissions(capabilities, version);
        self.modify(subject, move |document| {
            document.role = role.as_str().to_owned();
            document.permissions = permissions;
            document.overrides = Map::new();
        })
        .await
    }

    async fn update_one_capability(
        &self,
        subject: &str,
        capability: Capability,
        value: bool,
    ) -> AppResult<()> {
        self.modify(subject, move |document| {
            let key = capability.as_str().to_owned();
            document.permissions.insert(key.clone(), Value::Bool(value));
            document.overrides.insert(key, Value::Bool(value));
        })
        .await
    }
}
