use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{FreshTokenSource, IdentityResolutionService};

use super::{ResolutionTicket, SessionAuthorizationContext};

/// Advisory bound on one session-start resolution.
pub const DEFAULT_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Authentication state transition emitted by the identity provider client.
#[derive(Clone)]
pub enum AuthStateChange {
    /// A user signed in; the source yields their credentials.
    SignedIn(Arc<dyn FreshTokenSource>),
    /// The user signed out.
    SignedOut,
}

impl std::fmt::Debug for AuthStateChange {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignedIn(_) => formatter.write_str("SignedIn(..)"),
            Self::SignedOut => formatter.write_str("SignedOut"),
        }
    }
}

/// Keeps one session context in step with authentication state changes.
#[derive(Clone)]
pub struct SessionResolver {
    context: Arc<SessionAuthorizationContext>,
    resolution: IdentityResolutionService,
    timeout: Duration,
}

impl SessionResolver {
    /// Creates a resolver using [`DEFAULT_RESOLUTION_TIMEOUT`].
    #[must_use]
    pub fn new(
        context: Arc<SessionAuthorizationContext>,
        resolution: IdentityResolutionService,
    ) -> Self {
        Self {
            context,
            resolution,
            timeout: DEFAULT_RESOLUTION_TIMEOUT,
        }
    }

    /// Overrides the resolution timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the context this resolver populates.
    #[must_use]
    pub fn context(&self) -> &Arc<SessionAuthorizationContext> {
        &self.context
    }

    /// Consumes state changes until the producer is dropped.
    ///
    /// Each sign-in aborts the resolution task of the previous one.
    pub fn spawn(self, mut changes: mpsc::Receiver<AuthStateChange>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut in_flight: Option<JoinHandle<()>> = None;

            while let Some(change) = changes.recv().await {
                if let Some(task) = in_flight.take() {
                    task.abort();
                }

                match change {
                    AuthStateChange::SignedIn(tokens) => {
                        in_flight = Some(self.start(tokens));
                    }
                    AuthStateChange::SignedOut => {
                        debug!("session signed out, clearing authorization context");
                        self.context.sign_out();
                    }
                }
            }

            if let Some(task) = in_flight {
                task.abort();
            }
        })
    }

    fn start(&self, tokens: Arc<dyn FreshTokenSource>) -> JoinHandle<()> {
        let ticket = self.context.begin_resolution();
        let context = Arc::clone(&self.context);
        let resolution = self.resolution.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            run_resolution(context, resolution, tokens, ticket, timeout).await;
        })
    }
}

async fn run_resolution(
    context: Arc<SessionAuthorizationContext>,
    resolution: IdentityResolutionService,
    tokens: Arc<dyn FreshTokenSource>,
    ticket: ResolutionTicket,
    timeout: Duration,
) {
    let resolve = resolution.resolve(tokens.as_ref());
    tokio::pin!(resolve);

    let outcome = match tokio::time::timeout(timeout, &mut resolve).await {
        Ok(outcome) => outcome,
        Err(_) => {
            if context.expire(ticket) {
                warn!(
                    timeout_ms = timeout.as_millis(),
                    "identity resolution timed out, treating session as unauthenticated"
                );
            }
            resolve.await
        }
    };

    match outcome {
        Ok(resolved) => {
            if !context.complete(ticket, resolved) {
                debug!("discarded resolution for a superseded session state");
            }
        }
        Err(error) => {
            warn!(%error, "identity resolution failed");
            context.fail(ticket);
        }
    }
}

#[cfg(test)]
mod tests;
