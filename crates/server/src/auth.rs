//! Admin authentication: password checks, login throttling, and the session extractor.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    extract::cookie::{Key, SignedCookieJar},
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

use crate::{
    db::Admin,
    error::{AppError, Result},
    state::AppState,
};

pub const SESSION_COOKIE: &str = "wedding_session";

const SESSION_TOKEN_LEN: usize = 48;
const MAX_FAILED_LOGINS: u32 = 5;
const LOCKOUT_WINDOW: Duration = Duration::from_secs(15 * 60);

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(e.to_string()))
}

fn verify_hash(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// How a login attempt was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCheck {
    PersonalHash,
    SharedPassword,
    /// Neither a hash nor ADMIN_PASSWORD is configured
    DevBypass,
}

/// Checks `password` for `admin`. `Ok(None)` means the password is wrong.
pub fn check_password(
    admin: &Admin,
    password: &str,
    shared_password: Option<&str>,
) -> Result<Option<PasswordCheck>> {
    if admin.has_password() {
        return Ok(verify_hash(password, &admin.password_hash)?.then_some(PasswordCheck::PersonalHash));
    }
    match shared_password {
        Some(expected) => {
            let matches: bool = expected.as_bytes().ct_eq(password.as_bytes()).into();
            Ok(matches.then_some(PasswordCheck::SharedPassword))
        }
        None => Ok(Some(PasswordCheck::DevBypass)),
    }
}

pub fn generate_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

// ============================================================================
// Login throttling
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct FailureWindow {
    started: Instant,
    failures: u32,
}

/// Per-email failed login counter, kept in memory
#[derive(Debug)]
pub struct LoginThrottle {
    windows: DashMap<String, FailureWindow>,
    max_failures: u32,
    window: Duration,
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new(MAX_FAILED_LOGINS, LOCKOUT_WINDOW)
    }
}

impl LoginThrottle {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_failures,
            window,
        }
    }

    /// Rejects the attempt while the email is locked out
    pub fn check(&self, email: &str) -> Result<()> {
        self.windows.retain(|_, w| w.started.elapsed() < self.window);
        match self.windows.get(email) {
            Some(w) if w.failures >= self.max_failures => Err(AppError::TooManyRequests(
                "Too many failed login attempts, try again later".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn record_failure(&self, email: &str) {
        let mut entry = self.windows.entry(email.to_string()).or_insert(FailureWindow {
            started: Instant::now(),
            failures: 0,
        });
        if entry.started.elapsed() >= self.window {
            *entry = FailureWindow {
                started: Instant::now(),
                failures: 0,
            };
        }
        entry.failures += 1;
        if entry.failures >= self.max_failures {
            tracing::warn!("Login locked for {} after {} failures", email, entry.failures);
        }
    }

    pub fn reset(&self, email: &str) {
        self.windows.remove(email);
    }
}

// ============================================================================
// Session extractor
// ============================================================================

/// An authenticated admin, resolved from the session cookie or a bearer token
#[derive(Debug, Clone)]
pub struct AuthAdmin {
    pub email: String,
    pub name: String,
    pub token: String,
    pub expires_at: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = session_token(parts, state)
            .await
            .ok_or_else(|| AppError::Unauthorized("Not logged in".to_string()))?;

        let session = state
            .db
            .get_admin_session(&token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Session is invalid or has ended".to_string()))?;

        if is_expired(&session.expires_at, Utc::now()) {
            state.db.delete_admin_session(&token).await?;
            tracing::debug!("Removed expired session for {}", session.admin_email);
            return Err(AppError::Unauthorized("Session has expired".to_string()));
        }

        Ok(AuthAdmin {
            email: session.admin_email,
            name: session.admin_name,
            token: session.token,
            expires_at: session.expires_at,
        })
    }
}

/// Bearer header first, then the signed cookie
async fn session_token(parts: &mut Parts, state: &AppState) -> Option<String> {
    if let Ok(TypedHeader(Authorization(bearer))) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
    {
        return Some(bearer.token().to_string());
    }
    let jar = SignedCookieJar::<Key>::from_request_parts(parts, state).await.ok()?;
    jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string())
}

fn is_expired(expires_at: &str, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(expires_at) {
        Ok(at) => at.with_timezone(&Utc) <= now,
        Err(_) => true,
    }
}
