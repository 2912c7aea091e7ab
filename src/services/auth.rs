// SPDX-License-Identifier: MIT

//! Auth provider client.
//!
//! The provider is a pluggable external service behind [`AuthProvider`];
//! [`AuthApiClient`] speaks a GoTrue-style REST API. All boundary calls are
//! normalized: no provider error ever escapes as an unhandled panic or a raw
//! message to the UI.

use crate::error::AppError;
use crate::models::{Session, User};
use async_trait::async_trait;
use serde::Deserialize;

/// Contract with the external auth provider.
///
/// `Err(AppError::AuthProvider(_))` means transient trouble (network,
/// timeout-adjacent); `Err(AppError::InvalidSession(_))` means the credential
/// itself was rejected. Callers fail closed on both.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Password sign-in. Returns a fresh session on success.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError>;

    /// Account creation. `Ok(None)` means a confirmation email was sent and
    /// the user is not yet authenticated.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError>;

    /// Invalidate the credential server-side.
    async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;

    /// Authoritative session check: confirms the credential is still valid
    /// server-side. `Ok(None)` means no valid session (revoked, deleted,
    /// expired).
    async fn fetch_user(&self, access_token: &str) -> Result<Option<User>, AppError>;

    /// Send a password recovery email.
    async fn send_recovery(&self, email: &str) -> Result<(), AppError>;

    /// Set a new password for the holder of this token.
    async fn update_password(&self, access_token: &str, new_password: &str)
        -> Result<(), AppError>;
}

/// Best-effort "does this account exist" hint from provider error text.
///
/// Provider wording is not a stable contract, so this is UX hinting only —
/// never an authorization decision. `None` means the wording was inconclusive.
pub fn classify_existence_hint(raw_error: &str) -> Option<bool> {
    let lower = raw_error.to_lowercase();
    if lower.contains("email not confirmed") {
        Some(true)
    } else if lower.contains("user not found") || lower.contains("no user found") {
        Some(false)
    } else {
        None
    }
}

/// HTTP client for a GoTrue-style auth API.
#[derive(Clone)]
pub struct AuthApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_at: Option<i64>,
    user: ProviderUser,
}

/// Signup responses vary: a session when auto-confirm is on, a bare user
/// record when a confirmation email went out.
#[derive(Debug, Deserialize)]
struct SignupResponse {
    access_token: Option<String>,
    expires_at: Option<i64>,
    user: Option<ProviderUser>,
    id: Option<String>,
    email: Option<String>,
}

impl AuthApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Pull a human-oriented message out of a provider error body.
    fn error_message(body: &str) -> String {
        #[derive(Deserialize)]
        struct ErrorBody {
            msg: Option<String>,
            message: Option<String>,
            error_description: Option<String>,
        }

        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.msg.or(b.message).or(b.error_description))
            .unwrap_or_else(|| body.to_string())
    }

    /// Normalize a non-success response: 4xx means the credential/request was
    /// rejected, everything else is transient.
    async fn rejection(response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = Self::error_message(&body);

        if status.is_client_error() {
            AppError::InvalidSession(message)
        } else {
            AppError::AuthProvider(format!("HTTP {}: {}", status, message))
        }
    }
}

#[async_trait]
impl AuthProvider for AuthApiClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let response = self
            .http
            .post(self.url("/token?grant_type=password"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::AuthProvider(format!("Sign-in request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::AuthProvider(format!("Malformed token response: {}", e)))?;

        Ok(Session {
            user: User {
                id: token.user.id,
                email: token.user.email,
            },
            access_token: Some(token.access_token),
            expires_at: token.expires_at,
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError> {
        let response = self
            .http
            .post(self.url("/signup"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::AuthProvider(format!("Sign-up request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body: SignupResponse = response
            .json()
            .await
            .map_err(|e| AppError::AuthProvider(format!("Malformed signup response: {}", e)))?;

        match (body.access_token, body.user) {
            (Some(access_token), Some(user)) => Ok(Some(Session {
                user: User {
                    id: user.id,
                    email: user.email,
                },
                access_token: Some(access_token),
                expires_at: body.expires_at,
            })),
            _ => {
                // Bare user record: confirmation email sent, not yet signed in.
                tracing::info!(user_id = ?body.id, email = ?body.email, "Signup pending confirmation");
                Ok(None)
            }
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(self.url("/logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::AuthProvider(format!("Sign-out request failed: {}", e)))?;

        // 401 on logout means the token was already dead, which is fine.
        if response.status().is_success() || response.status().as_u16() == 401 {
            Ok(())
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Option<User>, AppError> {
        let response = self
            .http
            .get(self.url("/user"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::AuthProvider(format!("Session check failed: {}", e)))?;

        match response.status().as_u16() {
            200 => {
                let user: ProviderUser = response.json().await.map_err(|e| {
                    AppError::AuthProvider(format!("Malformed user response: {}", e))
                })?;
                Ok(Some(User {
                    id: user.id,
                    email: user.email,
                }))
            }
            401 | 403 | 404 => Ok(None),
            _ => Err(Self::rejection(response).await),
        }
    }

    async fn send_recovery(&self, email: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(self.url("/recover"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(|e| AppError::AuthProvider(format!("Recovery request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .put(self.url("/user"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "password": new_password }))
            .send()
            .await
            .map_err(|e| AppError::AuthProvider(format!("Password update failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejection(response).await)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MockAuthProvider - scriptable provider for tests and offline development
// ─────────────────────────────────────────────────────────────────────────────

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// How the mock answers authoritative session checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFetchMode {
    /// Answer from the in-memory session table.
    Normal,
    /// Fail every check with a transient provider error.
    Transient,
    /// Never answer; exercises the caller's timeout handling.
    Hang,
}

struct MockAccount {
    user_id: String,
    password: String,
    confirmed: bool,
}

/// In-memory auth provider used by tests and offline development.
///
/// All behavior is scriptable: accounts, live sessions, fetch failure modes.
/// `sign_out_calls` counts provider-level sign-outs so tests can assert the
/// fail-closed discipline. Issued tokens are real HS256 JWTs so the local
/// decode path works against them.
pub struct MockAuthProvider {
    accounts: DashMap<String, MockAccount>,
    sessions: DashMap<String, User>,
    fetch_mode: Mutex<Option<MockFetchMode>>,
    require_confirmation: AtomicBool,
    sign_out_calls: AtomicU64,
    jwt_secret: Vec<u8>,
}

impl Default for MockAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthProvider {
    pub fn new() -> Self {
        // Matches Config::test_default().
        Self::with_secret(b"test_jwt_secret_32_bytes_long!!!")
    }

    pub fn with_secret(jwt_secret: &[u8]) -> Self {
        Self {
            accounts: DashMap::new(),
            sessions: DashMap::new(),
            fetch_mode: Mutex::new(None),
            require_confirmation: AtomicBool::new(false),
            sign_out_calls: AtomicU64::new(0),
            jwt_secret: jwt_secret.to_vec(),
        }
    }

    /// Require email confirmation before sign-in (signup returns no session).
    pub fn set_require_confirmation(&self, on: bool) {
        self.require_confirmation.store(on, Ordering::SeqCst);
    }

    pub fn set_fetch_mode(&self, mode: MockFetchMode) {
        *self.fetch_mode.lock().unwrap() = Some(mode);
    }

    /// Register a live session the authoritative check will accept.
    pub fn insert_session(&self, access_token: &str, user: User) {
        self.sessions.insert(access_token.to_string(), user);
    }

    /// Mark an account's email as confirmed.
    pub fn confirm_email(&self, email: &str) {
        if let Some(mut account) = self.accounts.get_mut(email) {
            account.confirmed = true;
        }
    }

    pub fn sign_out_calls(&self) -> u64 {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    fn fetch_mode(&self) -> MockFetchMode {
        self.fetch_mode
            .lock()
            .unwrap()
            .unwrap_or(MockFetchMode::Normal)
    }

    fn new_session(&self, user_id: &str, email: &str) -> Session {
        let claims = serde_json::json!({
            "sub": user_id,
            "email": email,
            "exp": chrono::Utc::now().timestamp() + 3600,
        });
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(&self.jwt_secret),
        )
        .unwrap_or_else(|_| format!("mock-token-{}", uuid::Uuid::new_v4()));
        let user = User {
            id: user_id.to_string(),
            email: Some(email.to_string()),
        };
        self.sessions.insert(token.clone(), user.clone());
        Session {
            user,
            access_token: Some(token),
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
        }
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let account = self
            .accounts
            .get(email)
            .ok_or_else(|| AppError::InvalidSession("Invalid login credentials".to_string()))?;

        // Unconfirmed accounts are blocked before the password check, like
        // providers that gate on confirmation at the door.
        if !account.confirmed {
            return Err(AppError::InvalidSession("Email not confirmed".to_string()));
        }
        if account.password != password {
            return Err(AppError::InvalidSession(
                "Invalid login credentials".to_string(),
            ));
        }

        Ok(self.new_session(&account.user_id, email))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AppError> {
        if self.accounts.contains_key(email) {
            return Err(AppError::InvalidSession(
                "User already registered".to_string(),
            ));
        }

        let require_confirmation = self.require_confirmation.load(Ordering::SeqCst);
        let user_id = format!("user-{}", uuid::Uuid::new_v4());
        self.accounts.insert(
            email.to_string(),
            MockAccount {
                user_id: user_id.clone(),
                password: password.to_string(),
                confirmed: !require_confirmation,
            },
        );

        if require_confirmation {
            Ok(None)
        } else {
            Ok(Some(self.new_session(&user_id, email)))
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.sessions.remove(access_token);
        Ok(())
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Option<User>, AppError> {
        match self.fetch_mode() {
            MockFetchMode::Normal => Ok(self.sessions.get(access_token).map(|u| u.clone())),
            MockFetchMode::Transient => {
                Err(AppError::AuthProvider("connection refused".to_string()))
            }
            MockFetchMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
        }
    }

    async fn send_recovery(&self, _email: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self
            .sessions
            .get(access_token)
            .map(|u| u.clone())
            .ok_or_else(|| AppError::InvalidSession("Invalid token".to_string()))?;

        if let Some(email) = &user.email {
            if let Some(mut account) = self.accounts.get_mut(email) {
                account.password = new_password.to_string();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existence_hint_classification() {
        assert_eq!(classify_existence_hint("Email not confirmed"), Some(true));
        assert_eq!(classify_existence_hint("User not found"), Some(false));
        // Shared wording for wrong-password and unknown-account is inconclusive.
        assert_eq!(classify_existence_hint("Invalid login credentials"), None);
    }

    #[tokio::test]
    async fn test_mock_signup_then_signin() {
        let provider = MockAuthProvider::new();

        let session = provider.sign_up("a@x.com", "pw12345").await.unwrap();
        assert!(session.is_some());

        let session = provider.sign_in("a@x.com", "pw12345").await.unwrap();
        assert_eq!(session.user.email.as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn test_mock_confirmation_gate() {
        let provider = MockAuthProvider::new();
        provider.set_require_confirmation(true);

        let session = provider.sign_up("a@x.com", "pw12345").await.unwrap();
        assert!(session.is_none(), "signup should be pending confirmation");

        let err = provider.sign_in("a@x.com", "pw12345").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidSession(ref m) if m.contains("not confirmed")));

        provider.confirm_email("a@x.com");
        assert!(provider.sign_in("a@x.com", "pw12345").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_sign_out_invalidates_session() {
        let provider = MockAuthProvider::new();
        let session = provider.sign_up("a@x.com", "pw12345").await.unwrap().unwrap();
        let token = session.access_token.unwrap();

        assert!(provider.fetch_user(&token).await.unwrap().is_some());
        provider.sign_out(&token).await.unwrap();
        assert!(provider.fetch_user(&token).await.unwrap().is_none());
        assert_eq!(provider.sign_out_calls(), 1);
    }
}
