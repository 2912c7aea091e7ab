// SPDX-License-Identifier: MIT

//! Session validation and the auth-session state machine.
//!
//! Two layers, deliberately separated:
//!
//! - a pure transition table (`transition`) over a closed set of states and
//!   provider events, so illegal transitions are structurally inert rather
//!   than scattered through conditionals; and
//! - [`SessionService`], the driver that owns per-user state, a validated
//!   session cache, and the authoritative provider round-trip.
//!
//! The service is the sole writer of session state; everything else reads
//! through `peek`/`snapshot`/`subscribe`.

use crate::config::{Config, TrustPolicy};
use crate::error::AppError;
use crate::models::{Session, User};
use crate::services::auth::AuthProvider;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};

/// Auth-session states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Validating,
    Authenticated(User),
    PasswordRecovery(User),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) | SessionState::PasswordRecovery(user) => Some(user),
            _ => None,
        }
    }

    pub fn kind(&self) -> SessionStateKind {
        match self {
            SessionState::Unauthenticated => SessionStateKind::Unauthenticated,
            SessionState::Validating => SessionStateKind::Validating,
            SessionState::Authenticated(_) => SessionStateKind::Authenticated,
            SessionState::PasswordRecovery(_) => SessionStateKind::PasswordRecovery,
        }
    }
}

/// State tag exposed on the API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStateKind {
    Unauthenticated,
    Validating,
    Authenticated,
    PasswordRecovery,
}

/// Why an authoritative validation came back negative.
///
/// Transient trouble and a rejected credential resolve identically (fail
/// closed) but stay distinguishable in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    /// Provider answered: no session for this credential.
    Absent,
    /// Provider rejected the credential outright.
    Rejected,
    /// Network/provider trouble; could not get an answer.
    Transient,
    /// The bounded validation timeout elapsed.
    Timeout,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValidationFailure::Absent => "absent",
            ValidationFailure::Rejected => "rejected",
            ValidationFailure::Transient => "transient",
            ValidationFailure::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Events the machine consumes: provider-pushed plus validation outcomes.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    InitialSession(Option<Session>),
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
    PasswordRecovery(Session),
    PasswordUpdated,
    ValidationSucceeded {
        user: User,
        /// Sequence number allocated when the validation started; stale
        /// results lose to newer ones at cache-write time.
        seq: u64,
    },
    ValidationFailed {
        reason: ValidationFailure,
        access_token: Option<String>,
    },
}

/// Side effects a transition asks the driver to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Purge the credential at the provider. Emitted on every error-path
    /// transition into `Unauthenticated` so a later cached read cannot
    /// resurrect a dead session.
    SignOutProvider,
    /// Drop the local validated-session cache entry.
    ClearCache,
    /// Record this user as the current validated snapshot. Carries the
    /// originating validation's sequence number; `None` means the write is
    /// not racing an in-flight validation and allocates a fresh one.
    CacheUser(User, Option<u64>),
    /// Run a fresh authoritative check for this token.
    Revalidate(String),
}

/// The transition table: `state × event → (state, effects)`.
///
/// Pure; the driver applies events strictly in arrival order. Combinations
/// not listed leave the state unchanged and emit nothing.
pub fn transition(
    state: &SessionState,
    event: &AuthEvent,
    policy: TrustPolicy,
) -> (SessionState, Vec<Effect>) {
    use AuthEvent::*;
    use SessionState::*;

    match (state, event) {
        // Explicit sign-out (user action or provider push): no provider-level
        // sign-out effect, the credential is already dead.
        (_, SignedOut) => (Unauthenticated, vec![Effect::ClearCache]),

        (SessionState::PasswordRecovery(user), PasswordUpdated) => (
            Authenticated(user.clone()),
            vec![Effect::CacheUser(user.clone(), None)],
        ),
        // Recovery exits only through a successful password update.
        (SessionState::PasswordRecovery(_), _) => (state.clone(), vec![]),

        (_, AuthEvent::PasswordRecovery(session)) => (
            SessionState::PasswordRecovery(session.user.clone()),
            vec![],
        ),

        (_, ValidationSucceeded { user, seq }) => (
            Authenticated(user.clone()),
            vec![Effect::CacheUser(user.clone(), Some(*seq))],
        ),

        (_, ValidationFailed { .. }) => (
            Unauthenticated,
            vec![Effect::SignOutProvider, Effect::ClearCache],
        ),

        (_, InitialSession(None)) => (Unauthenticated, vec![]),

        // A session-bearing push while not in recovery. Under cache-first the
        // payload is trusted directly; under authoritative it only triggers a
        // fresh check, never a blend of the two.
        (_, InitialSession(Some(session)) | SignedIn(session) | TokenRefreshed(session)) => {
            match (policy, &session.access_token) {
                (TrustPolicy::Authoritative, Some(token)) => {
                    (Validating, vec![Effect::Revalidate(token.clone())])
                }
                _ => (
                    Authenticated(session.user.clone()),
                    vec![Effect::CacheUser(session.user.clone(), None)],
                ),
            }
        }

        (_, PasswordUpdated) => (state.clone(), vec![]),
    }
}

/// A state change published to subscribers.
#[derive(Debug, Clone)]
pub struct SessionChange {
    pub user_id: String,
    pub state: SessionStateKind,
}

/// The `{ user, auth_loading }` projection the app shell consumes.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub state: SessionStateKind,
    pub auth_loading: bool,
}

/// Claims inside a provider-issued access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (provider user ID)
    pub sub: String,
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
}

/// Validated session snapshot held in memory for synchronous reads.
#[derive(Clone)]
struct CachedSession {
    user: User,
    verified_at: Instant,
    /// Validation sequence number; only the latest write wins.
    seq: u64,
}

enum CheckOutcome {
    Valid(User),
    Failed(ValidationFailure),
}

/// Owns the "is this user really signed in" decision.
///
/// Cached reads are cheap hints; the authoritative check is a provider
/// round-trip under a bounded timeout, and every negative outcome purges the
/// credential so a stale token cannot loop back in.
pub struct SessionService {
    provider: Arc<dyn AuthProvider>,
    policy: TrustPolicy,
    validate_timeout: Duration,
    cache_ttl: Duration,
    jwt_secret: Vec<u8>,
    cache: DashMap<String, CachedSession>,
    states: DashMap<String, SessionState>,
    /// Per-user mutex so events apply strictly in arrival order.
    event_locks: DashMap<String, Arc<Mutex<()>>>,
    /// One-shot email-confirmation acknowledgments, keyed by user.
    pending_confirmations: DashMap<String, ()>,
    validation_seq: AtomicU64,
    changes: broadcast::Sender<SessionChange>,
}

impl SessionService {
    pub fn new(provider: Arc<dyn AuthProvider>, config: &Config) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            provider,
            policy: config.trust_policy,
            validate_timeout: Duration::from_secs(config.session_validate_timeout_secs),
            cache_ttl: Duration::from_secs(config.session_cache_ttl_secs),
            jwt_secret: config.auth_jwt_secret.clone(),
            cache: DashMap::new(),
            states: DashMap::new(),
            event_locks: DashMap::new(),
            pending_confirmations: DashMap::new(),
            validation_seq: AtomicU64::new(0),
            changes,
        }
    }

    pub fn policy(&self) -> TrustPolicy {
        self.policy
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    /// Synchronous cached read. Quick UI hints only — never the sole basis
    /// for granting access to protected data.
    pub fn peek(&self, user_id: &str) -> Option<User> {
        let cached = self.cache.get(user_id)?;
        if cached.verified_at.elapsed() <= self.cache_ttl {
            Some(cached.user.clone())
        } else {
            None
        }
    }

    /// Current `{ user, auth_loading }` projection for a user.
    pub fn snapshot(&self, user_id: &str) -> SessionSnapshot {
        let state = self
            .states
            .get(user_id)
            .map(|s| s.clone())
            .unwrap_or(SessionState::Validating);
        SessionSnapshot {
            user: state.user().cloned(),
            auth_loading: state.kind() == SessionStateKind::Validating,
            state: state.kind(),
        }
    }

    /// Decode the provider-signed access token locally (no network).
    pub fn decode_claims(&self, access_token: &str) -> Result<Claims, AppError> {
        let key = jsonwebtoken::DecodingKey::from_secret(&self.jwt_secret);
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        // Provider tokens carry an audience we don't pin on.
        validation.validate_aud = false;

        jsonwebtoken::decode::<Claims>(access_token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::InvalidSession(format!("Token decode failed: {}", e)))
    }

    /// Authoritative session check. Returns the validated user, or `None`
    /// after failing closed (provider-level sign-out + cache purge). Never
    /// returns an error; failures are logged with their reason.
    pub async fn validate(&self, access_token: &str) -> Option<User> {
        let seq = self.validation_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let user_hint = self.decode_claims(access_token).ok().map(|c| c.sub);

        match self.check_provider(access_token).await {
            CheckOutcome::Valid(user) => {
                let lock = self.lock_for(&user.id);
                let _guard = lock.lock().await;
                self.drive(
                    &user.id,
                    AuthEvent::ValidationSucceeded {
                        user: user.clone(),
                        seq,
                    },
                )
                .await;
                Some(user)
            }
            CheckOutcome::Failed(reason) => {
                match user_hint {
                    Some(user_id) => {
                        let lock = self.lock_for(&user_id);
                        let guard = lock.lock().await;
                        self.drive(
                            &user_id,
                            AuthEvent::ValidationFailed {
                                reason,
                                access_token: Some(access_token.to_string()),
                            },
                        )
                        .await;
                        drop(guard);
                    }
                    None => {
                        // Undecodable token: still purge it at the provider.
                        tracing::info!(reason = %reason, "Validation failed for undecodable token");
                        self.provider_sign_out(Some(access_token)).await;
                    }
                }
                None
            }
        }
    }

    /// Apply a provider-pushed event, serialized per user in arrival order.
    pub async fn apply_event(&self, user_id: &str, event: AuthEvent) {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;
        self.drive(user_id, event).await;
    }

    /// Gate a request token per the configured trust policy.
    ///
    /// Cache-first trusts a locally decoded, unexpired token immediately;
    /// callers are expected to kick off a background `validate` so revocation
    /// still catches up. Authoritative requires a server-verified session
    /// (fresh cache entry or a blocking check). The cache only ever holds
    /// server-verified snapshots.
    pub async fn authorize(&self, access_token: &str) -> Result<User, AppError> {
        let claims = self
            .decode_claims(access_token)
            .map_err(|_| AppError::Unauthorized)?;

        if let Some(user) = self.peek(&claims.sub) {
            return Ok(user);
        }

        match self.policy {
            TrustPolicy::CacheFirst => Ok(User {
                id: claims.sub,
                email: claims.email,
            }),
            TrustPolicy::Authoritative => self
                .validate(access_token)
                .await
                .ok_or(AppError::Unauthorized),
        }
    }

    /// Force a fail-closed sign-out; used when a persistence error turns out
    /// to be authorization-shaped.
    pub async fn force_sign_out(&self, user_id: &str, access_token: Option<&str>) {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;
        self.drive(
            user_id,
            AuthEvent::ValidationFailed {
                reason: ValidationFailure::Rejected,
                access_token: access_token.map(str::to_string),
            },
        )
        .await;
    }

    /// Arm the one-shot email-confirmation acknowledgment for a user.
    pub fn note_email_confirmed(&self, user_id: &str) {
        self.pending_confirmations.insert(user_id.to_string(), ());
    }

    /// Consume the pending confirmation acknowledgment, if armed.
    pub fn take_email_confirmed(&self, user_id: &str) -> bool {
        self.pending_confirmations.remove(user_id).is_some()
    }

    /// Drop expired cache entries and per-user bookkeeping for signed-out
    /// users. Called periodically; the maps would otherwise only ever grow.
    pub fn evict_expired(&self) {
        self.cache
            .retain(|_, cached| cached.verified_at.elapsed() <= self.cache_ttl);
        self.states.retain(|user_id, state| {
            *state != SessionState::Unauthenticated || self.cache.contains_key(user_id)
        });
        // A lock is only droppable when nobody outside the map holds it.
        self.event_locks.retain(|user_id, lock| {
            Arc::strong_count(lock) > 1 || self.states.contains_key(user_id)
        });
        self.pending_confirmations
            .retain(|user_id, _| self.states.contains_key(user_id));
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.event_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Insert a validated snapshot unless a newer validation already wrote.
    fn record_validated(&self, user: &User, seq: u64) {
        use dashmap::mapref::entry::Entry;
        match self.cache.entry(user.id.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().seq <= seq {
                    existing.insert(CachedSession {
                        user: user.clone(),
                        verified_at: Instant::now(),
                        seq,
                    });
                } else {
                    tracing::debug!(user_id = %user.id, "Stale validation result discarded");
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(CachedSession {
                    user: user.clone(),
                    verified_at: Instant::now(),
                    seq,
                });
            }
        }
    }

    async fn provider_sign_out(&self, access_token: Option<&str>) {
        if let Err(e) = self.provider.sign_out(access_token.unwrap_or_default()).await {
            tracing::warn!(error = %e, "Provider sign-out during fail-closed path failed");
        }
    }

    /// Run the authoritative provider check under the bounded timeout and
    /// classify the outcome.
    async fn check_provider(&self, access_token: &str) -> CheckOutcome {
        match tokio::time::timeout(self.validate_timeout, self.provider.fetch_user(access_token))
            .await
        {
            Ok(Ok(Some(user))) => CheckOutcome::Valid(user),
            Ok(Ok(None)) => {
                tracing::info!("Authoritative check: no session");
                CheckOutcome::Failed(ValidationFailure::Absent)
            }
            Ok(Err(AppError::AuthProvider(msg))) => {
                tracing::warn!(error = %msg, "Authoritative check: provider unreachable");
                CheckOutcome::Failed(ValidationFailure::Transient)
            }
            Ok(Err(e)) => {
                tracing::info!(error = %e, "Authoritative check: credential rejected");
                CheckOutcome::Failed(ValidationFailure::Rejected)
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.validate_timeout.as_secs(),
                    "Authoritative check timed out"
                );
                CheckOutcome::Failed(ValidationFailure::Timeout)
            }
        }
    }

    /// Apply one event (and any follow-up validation outcomes) to a user's
    /// state. Caller must hold the user's event lock.
    async fn drive(&self, user_id: &str, first: AuthEvent) {
        let mut queue = VecDeque::from([first]);

        while let Some(event) = queue.pop_front() {
            let current = self
                .states
                .get(user_id)
                .map(|s| s.clone())
                .unwrap_or(SessionState::Validating);

            let (next, effects) = transition(&current, &event, self.policy);

            if next != current {
                tracing::debug!(
                    user_id,
                    from = ?current.kind(),
                    to = ?next.kind(),
                    "Session transition"
                );
                self.states.insert(user_id.to_string(), next.clone());
                let _ = self.changes.send(SessionChange {
                    user_id: user_id.to_string(),
                    state: next.kind(),
                });
            }

            for effect in effects {
                match effect {
                    Effect::ClearCache => {
                        self.cache.remove(user_id);
                    }
                    Effect::CacheUser(user, seq) => {
                        // A carried seq belongs to the validation that produced
                        // this event; re-reading the counter here would let a
                        // stale result clobber a newer one.
                        let seq = seq.unwrap_or_else(|| {
                            self.validation_seq.fetch_add(1, Ordering::SeqCst) + 1
                        });
                        self.record_validated(&user, seq);
                    }
                    Effect::SignOutProvider => {
                        self.provider_sign_out(event_token(&event)).await;
                    }
                    Effect::Revalidate(token) => match self.check_provider(&token).await {
                        CheckOutcome::Valid(user) => {
                            let seq = self.validation_seq.fetch_add(1, Ordering::SeqCst) + 1;
                            queue.push_back(AuthEvent::ValidationSucceeded { user, seq });
                        }
                        CheckOutcome::Failed(reason) => {
                            queue.push_back(AuthEvent::ValidationFailed {
                                reason,
                                access_token: Some(token),
                            });
                        }
                    },
                }
            }
        }
    }
}

/// The access token associated with an event, if it carries one.
fn event_token(event: &AuthEvent) -> Option<&str> {
    match event {
        AuthEvent::InitialSession(Some(session))
        | AuthEvent::SignedIn(session)
        | AuthEvent::TokenRefreshed(session)
        | AuthEvent::PasswordRecovery(session) => session.access_token.as_deref(),
        AuthEvent::ValidationFailed { access_token, .. } => access_token.as_deref(),
        _ => None,
    }
}
