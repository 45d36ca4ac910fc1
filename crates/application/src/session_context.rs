//! Per-session cache of the resolved identity and capability set.
//!
//! A context is constructed explicitly for one client session and passed to
//! whatever needs capability checks. It is a cache over the user record
//! store, never a source of truth: every population comes from a fresh
//! resolution against the store.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use marquee_domain::{Capability, CapabilitySet, Role};

mod resolver;

pub use resolver::{AuthStateChange, DEFAULT_RESOLUTION_TIMEOUT, SessionResolver};

/// Resolved authorization for one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAuthorization {
    subject: String,
    role: Role,
    capabilities: CapabilitySet,
}

impl ResolvedAuthorization {
    /// Creates a resolved authorization snapshot.
    #[must_use]
    pub fn new(subject: impl Into<String>, role: Role, capabilities: CapabilitySet) -> Self {
        Self {
            subject: subject.into(),
            role,
            capabilities,
        }
    }

    /// Returns the verified subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the stored role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the capability set.
    #[must_use]
    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    /// Returns whether one capability is granted.
    #[must_use]
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.get(capability)
    }
}

/// Observable state of a session context.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionAuthState {
    /// A resolution is in flight.
    Loading,
    /// The last resolution succeeded.
    Resolved(ResolvedAuthorization),
    /// Signed out, never signed in, or the last resolution failed or timed out.
    #[default]
    Unauthenticated,
}

/// Identifies one resolution attempt.
///
/// Completions carrying a ticket from a superseded generation are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionTicket(u64);

/// Process-local authorization cache for one client session.
#[derive(Debug)]
pub struct SessionAuthorizationContext {
    state: watch::Sender<SessionAuthState>,
    generation: AtomicU64,
}

impl Default for SessionAuthorizationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAuthorizationContext {
    /// Creates an unauthenticated context.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionAuthState::Unauthenticated);
        Self {
            state,
            generation: AtomicU64::new(0),
        }
    }

    /// Returns whether the current session holds a capability.
    ///
    /// Always false while loading or unauthenticated.
    #[must_use]
    pub fn can(&self, capability: Capability) -> bool {
        match &*self.state.borrow() {
            SessionAuthState::Resolved(resolved) => resolved.can(capability),
            SessionAuthState::Loading | SessionAuthState::Unauthenticated => false,
        }
    }

    /// Returns the current role, if resolved.
    #[must_use]
    pub fn current_role(&self) -> Option<Role> {
        match &*self.state.borrow() {
            SessionAuthState::Resolved(resolved) => Some(resolved.role()),
            SessionAuthState::Loading | SessionAuthState::Unauthenticated => None,
        }
    }

    /// Returns whether a resolution is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(*self.state.borrow(), SessionAuthState::Loading)
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionAuthState {
        self.state.borrow().clone()
    }

    /// Subscribes to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionAuthState> {
        self.state.subscribe()
    }

    /// Starts a new resolution, superseding any in flight.
    pub fn begin_resolution(&self) -> ResolutionTicket {
        let ticket = self.advance();
        self.state.send_replace(SessionAuthState::Loading);
        ticket
    }

    /// Stores a resolution result if its ticket is still current.
    ///
    /// A late result for the current ticket is accepted even after
    /// [`Self::expire`] cleared the context. Returns whether it was applied.
    pub fn complete(&self, ticket: ResolutionTicket, resolved: ResolvedAuthorization) -> bool {
        self.replace_if_current(ticket, SessionAuthState::Resolved(resolved))
    }

    /// Marks the current resolution as failed.
    pub fn fail(&self, ticket: ResolutionTicket) -> bool {
        self.replace_if_current(ticket, SessionAuthState::Unauthenticated)
    }

    /// Treats the session as unauthenticated if the ticket's resolution is
    /// still loading.
    pub fn expire(&self, ticket: ResolutionTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        self.state.send_if_modified(|state| {
            if matches!(state, SessionAuthState::Loading) {
                *state = SessionAuthState::Unauthenticated;
                true
            } else {
                false
            }
        })
    }

    /// Clears the context and invalidates every outstanding ticket.
    pub fn sign_out(&self) {
        self.advance();
        self.state.send_replace(SessionAuthState::Unauthenticated);
    }

    fn advance(&self) -> ResolutionTicket {
        ResolutionTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn is_current(&self, ticket: ResolutionTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    fn replace_if_current(&self, ticket: ResolutionTicket, next: SessionAuthState) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        self.state.send_replace(next);
        true
    }
}
