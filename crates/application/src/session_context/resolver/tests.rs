use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc, watch};
use tokio::time::Instant;

use marquee_core::{AppResult, BearerCredential};
use marquee_domain::{CAPABILITY_SCHEMA_VERSION, Capability, Role};

use super::{AuthStateChange, DEFAULT_RESOLUTION_TIMEOUT, SessionResolver};
use crate::session_context::{SessionAuthState, SessionAuthorizationContext};
use crate::test_support::{
    FakeIdentityVerifier, FakeTokenSource, FakeUserRecordStore, UnavailableSyncAction, credential,
    stored_record,
};
use crate::{FreshTokenSource, IdentityResolutionService, TrustBoundary};

struct GatedTokenSource {
    gate: Arc<Notify>,
    token: String,
    issued: AtomicUsize,
}

impl GatedTokenSource {
    fn new(gate: Arc<Notify>, token: &str) -> Self {
        Self {
            gate,
            token: token.to_owned(),
            issued: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FreshTokenSource for GatedTokenSource {
    async fn fresh_token(&self, _force_refresh: bool) -> AppResult<BearerCredential> {
        self.gate.notified().await;
        self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(credential(self.token.as_str()))
    }
}

fn resolution(
    store: Arc<FakeUserRecordStore>,
    verifier: FakeIdentityVerifier,
) -> IdentityResolutionService {
    IdentityResolutionService::new(
        TrustBoundary::new(Arc::new(verifier), chrono::Duration::minutes(5)),
        store,
        Arc::new(UnavailableSyncAction),
    )
}

fn resolver(store: Arc<FakeUserRecordStore>, verifier: FakeIdentityVerifier) -> SessionResolver {
    SessionResolver::new(
        Arc::new(SessionAuthorizationContext::new()),
        resolution(store, verifier),
    )
}

async fn wait_until(
    state: &mut watch::Receiver<SessionAuthState>,
    predicate: impl FnMut(&SessionAuthState) -> bool,
) {
    state
        .wait_for(predicate)
        .await
        .unwrap_or_else(|_| panic!("context dropped"));
}

fn is_resolved_as(role: Role) -> impl FnMut(&SessionAuthState) -> bool {
    move |state| matches!(state, SessionAuthState::Resolved(resolved) if resolved.role() == role)
}

#[tokio::test]
async fn sign_in_populates_context() {
    let store = Arc::new(FakeUserRecordStore::default());
    let resolver = resolver(
        Arc::clone(&store),
        FakeIdentityVerifier::with_subject("t1", "u1", None),
    );
    let context = Arc::clone(resolver.context());
    let mut state = context.subscribe();

    let (changes, receiver) = mpsc::channel(8);
    let _handle = resolver.spawn(receiver);
    changes
        .send(AuthStateChange::SignedIn(Arc::new(FakeTokenSource::new("t1"))))
        .await
        .unwrap_or_else(|_| panic!("resolver stopped"));

    wait_until(&mut state, is_resolved_as(Role::User)).await;
    assert!(context.can(Capability::WatchContent));
    assert!(!context.can(Capability::ManageUsers));
    assert!(store.contains("u1").await);
}

#[tokio::test]
async fn sign_out_clears_a_resolved_context() {
    let store = Arc::new(FakeUserRecordStore::default());
    store
        .insert("admin-1", stored_record(Role::Admin, CAPABILITY_SCHEMA_VERSION))
        .await;
    let resolver = resolver(
        Arc::clone(&store),
        FakeIdentityVerifier::with_subject("t1", "admin-1", None),
    );
    let context = Arc::clone(resolver.context());
    let mut state = context.subscribe();

    let (changes, receiver) = mpsc::channel(8);
    let _handle = resolver.spawn(receiver);
    changes
        .send(AuthStateChange::SignedIn(Arc::new(FakeTokenSource::new("t1"))))
        .await
        .unwrap_or_else(|_| panic!("resolver stopped"));
    wait_until(&mut state, is_resolved_as(Role::Admin)).await;
    assert!(context.can(Capability::ManageUsers));

    changes
        .send(AuthStateChange::SignedOut)
        .await
        .unwrap_or_else(|_| panic!("resolver stopped"));
    wait_until(&mut state, |state| {
        matches!(state, SessionAuthState::Unauthenticated)
    })
    .await;

    assert!(Capability::all().iter().all(|capability| !context.can(*capability)));
    assert_eq!(context.current_role(), None);
}

#[tokio::test(start_paused = true)]
async fn newer_sign_in_aborts_the_previous_resolution() {
    let store = Arc::new(FakeUserRecordStore::default());
    store
        .insert("admin-1", stored_record(Role::Admin, CAPABILITY_SCHEMA_VERSION))
        .await;
    store
        .insert("user-1", stored_record(Role::User, CAPABILITY_SCHEMA_VERSION))
        .await;
    let resolver = resolver(
        Arc::clone(&store),
        FakeIdentityVerifier::with_subject("admin-token", "admin-1", None).and(
            "user-token",
            "user-1",
            None,
        ),
    );
    let context = Arc::clone(resolver.context());
    let mut state = context.subscribe();

    let gate = Arc::new(Notify::new());
    let slow_admin = Arc::new(GatedTokenSource::new(Arc::clone(&gate), "admin-token"));

    let (changes, receiver) = mpsc::channel(8);
    let _handle = resolver.spawn(receiver);
    changes
        .send(AuthStateChange::SignedIn(slow_admin.clone()))
        .await
        .unwrap_or_else(|_| panic!("resolver stopped"));
    changes
        .send(AuthStateChange::SignedIn(Arc::new(FakeTokenSource::new(
            "user-token",
        ))))
        .await
        .unwrap_or_else(|_| panic!("resolver stopped"));

    wait_until(&mut state, is_resolved_as(Role::User)).await;

    gate.notify_one();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(slow_admin.issued.load(Ordering::SeqCst), 0);
    assert_eq!(context.current_role(), Some(Role::User));
    assert!(!context.can(Capability::ManageUsers));
}

#[tokio::test(start_paused = true)]
async fn slow_resolution_times_out_then_late_result_is_accepted() {
    let gate = Arc::new(Notify::new());
    let store = Arc::new(FakeUserRecordStore::gated(Arc::clone(&gate)));
    let resolver = resolver(
        Arc::clone(&store),
        FakeIdentityVerifier::with_subject("t1", "u1", None),
    );
    let context = Arc::clone(resolver.context());
    let mut state = context.subscribe();

    let (changes, receiver) = mpsc::channel(8);
    let _handle = resolver.spawn(receiver);
    let started = Instant::now();
    changes
        .send(AuthStateChange::SignedIn(Arc::new(FakeTokenSource::new("t1"))))
        .await
        .unwrap_or_else(|_| panic!("resolver stopped"));

    wait_until(&mut state, |state| matches!(state, SessionAuthState::Loading)).await;
    wait_until(&mut state, |state| {
        matches!(state, SessionAuthState::Unauthenticated)
    })
    .await;
    assert!(started.elapsed() >= DEFAULT_RESOLUTION_TIMEOUT);
    assert!(!context.can(Capability::WatchContent));

    gate.notify_one();
    wait_until(&mut state, is_resolved_as(Role::User)).await;
    assert!(context.can(Capability::WatchContent));
}
