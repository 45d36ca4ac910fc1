use async_trait::async_trait;

use marquee_core::AppResult;
use marquee_domain::AuditAction;

/// Audit event written after a privileged mutation succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Verified subject that performed the action.
    pub actor: String,
    /// Stable action identifier.
    pub action: AuditAction,
    /// Subject whose record changed.
    pub target_subject: String,
    /// Optional human-readable detail.
    pub detail: Option<String>,
}

/// Repository port for append-only audit persistence.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends an audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
