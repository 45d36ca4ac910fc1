//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod hmac_token_verifier;
mod http_identity_verifier;
mod http_permission_sync_client;
mod in_memory_user_record_store;
mod postgres_audit_repository;
mod postgres_user_record_store;

#[cfg(test)]
mod test_http;

pub use hmac_token_verifier::{HmacTokenVerifier, MIN_TOKEN_SECRET_BYTES, TokenClaims};
pub use http_identity_verifier::HttpIdentityVerifier;
pub use http_permission_sync_client::HttpPermissionSyncClient;
pub use in_memory_user_record_store::InMemoryUserRecordStore;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_user_record_store::PostgresUserRecordStore;
