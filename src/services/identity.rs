//! Identity boundary
//!
//! The dashboard only needs to know *who* is signed in. That question is
//! answered by an [`IdentityProvider`]; [`LocalIdentityProvider`] is the
//! built-in email/password implementation backed by the `users` and
//! `sessions` tables.
//!
//! Handlers never consult global state. Middleware resolves the request's
//! token into an [`AuthContext`] and hands it to the handler explicitly.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::password::{hash_password, verify_password};
use crate::services::LoginRateLimiter;

const AUTH_EVENT_CAPACITY: usize = 64;

/// Sign-in and sign-up failures, worded for display
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No account found with this email.")]
    UserNotFound,

    #[error("Incorrect password.")]
    WrongPassword,

    #[error("Invalid email address.")]
    InvalidEmail,

    #[error("An account with this email already exists.")]
    EmailInUse,

    #[error("Password should be at least {0} characters.")]
    WeakPassword(usize),

    #[error("Too many failed attempts. Please try again later.")]
    TooManyAttempts,

    #[error("Authentication required.")]
    Unauthenticated,

    #[error("Something went wrong. Please try again.")]
    Internal(#[from] anyhow::Error),
}

/// Change in authentication state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    SignedIn { user_id: i64, email: String },
    SignedOut { user_id: i64 },
}

/// A freshly issued session
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// Create an account and sign it in
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;

    /// User behind `token`, or `None` if the token is unknown or expired
    async fn resolve(&self, token: &str) -> Result<Option<User>, AuthError>;

    /// Stream of sign-in/sign-out events
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Lowercased, trimmed email if it looks deliverable
fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    let valid = !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace);
    valid.then_some(email)
}

/// Email/password accounts stored in the document store
pub struct LocalIdentityProvider {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    rate_limiter: LoginRateLimiter,
    events: broadcast::Sender<AuthEvent>,
    config: AuthConfig,
}

impl LocalIdentityProvider {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        config: AuthConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            users,
            sessions,
            rate_limiter: LoginRateLimiter::new(),
            events,
            config,
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: LoginRateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    async fn issue_session(&self, user: User) -> Result<AuthSession, AuthError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + Duration::days(self.config.session_expiration_days),
            created_at: now,
        };
        let session = self.sessions.create(&session).await?;

        let _ = self.events.send(AuthEvent::SignedIn {
            user_id: user.id,
            email: user.email.clone(),
        });

        Ok(AuthSession {
            token: session.id,
            user,
            expires_at: session.expires_at,
        })
    }

    /// Remove expired sessions and stale rate-limit entries
    pub async fn cleanup(&self) -> Result<u64, AuthError> {
        self.rate_limiter.cleanup().await;
        Ok(self.sessions.delete_expired().await?)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email).ok_or(AuthError::InvalidEmail)?;

        if self.rate_limiter.is_limited(&email).await {
            tracing::warn!("Sign-in throttled for {}", email);
            return Err(AuthError::TooManyAttempts);
        }

        let user = match self.users.get_by_email(&email).await? {
            Some(user) => user,
            None => {
                self.rate_limiter.record_failure(&email).await;
                return Err(AuthError::UserNotFound);
            }
        };

        if !verify_password(password, &user.password_hash)? {
            self.rate_limiter.record_failure(&email).await;
            return Err(AuthError::WrongPassword);
        }

        self.rate_limiter.clear(&email).await;
        tracing::info!("User {} signed in", user.id);
        self.issue_session(user).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email).ok_or(AuthError::InvalidEmail)?;
        if password.chars().count() < self.config.min_password_len {
            return Err(AuthError::WeakPassword(self.config.min_password_len));
        }
        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let password_hash = hash_password(password)?;
        let user = self.users.create(&User::new(email, password_hash)).await?;
        tracing::info!("Registered user {}", user.id);

        self.issue_session(user).await
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        let session = self.sessions.get_by_id(token).await?;
        self.sessions.delete(token).await?;

        if let Some(session) = session {
            let _ = self.events.send(AuthEvent::SignedOut {
                user_id: session.user_id,
            });
        }
        Ok(())
    }

    async fn resolve(&self, token: &str) -> Result<Option<User>, AuthError> {
        let session = match self.sessions.get_by_id(token).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.sessions.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        Ok(self.users.get_by_id(session.user_id).await?)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

/// Authentication state of one request
#[derive(Clone)]
pub struct AuthContext {
    provider: Arc<dyn IdentityProvider>,
    current_user: Option<User>,
    token: Option<String>,
}

impl AuthContext {
    /// Resolve `token` (if any) through `provider`
    pub async fn resolve(
        provider: Arc<dyn IdentityProvider>,
        token: Option<String>,
    ) -> Result<Self, AuthError> {
        let current_user = match &token {
            Some(token) => provider.resolve(token).await?,
            None => None,
        };
        let token = current_user.as_ref().and(token);

        Ok(Self {
            provider,
            current_user,
            token,
        })
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    /// The signed-in user, or `Unauthenticated`
    pub fn require_user(&self) -> Result<&User, AuthError> {
        self.current_user.as_ref().ok_or(AuthError::Unauthenticated)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let session = self.provider.sign_in(email, password).await?;
        self.current_user = Some(session.user.clone());
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub async fn logout(&mut self) -> Result<(), AuthError> {
        if let Some(token) = self.token.take() {
            self.provider.sign_out(&token).await?;
        }
        self.current_user = None;
        Ok(())
    }
}
