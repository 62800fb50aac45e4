//! Staff sign-in and permission checks.
//!
//! The backend issues a bearer token and a role on login. The session is
//! held in memory only: the token lives in a zeroizing buffer and is wiped
//! on sign-out or when the session is dropped. Sessions expire after a
//! period of inactivity or a maximum duration, whichever comes first.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::api::{ApiClient, ApiError};
use crate::models::{LoginRequest, LoginResponse};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const SESSION_INACTIVITY_MINUTES: i64 = 30;
const SESSION_MAX_DURATION_HOURS: i64 = 12;

pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
pub const ROLE_USER: &str = "ROLE_USER";

/// Permissions granted to administrators.
const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::Checkout,
    Permission::ViewHistory,
    Permission::ViewReports,
    Permission::ManageItems,
    Permission::ManageCategories,
    Permission::ManageUsers,
    Permission::ManageSettings,
];

/// Permissions granted to counter staff.
const USER_PERMISSIONS: &[Permission] = &[Permission::Checkout, Permission::ViewHistory];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Checkout,
    ViewHistory,
    ViewReports,
    ManageItems,
    ManageCategories,
    ManageUsers,
    ManageSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case(ROLE_ADMIN) {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::Admin => ADMIN_PERMISSIONS,
            Role::User => USER_PERMISSIONS,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Session expired, please sign in again")]
    Expired,

    #[error("You are not permitted to perform this action")]
    Forbidden { permission: Permission },

    #[error(transparent)]
    Login(#[from] ApiError),
}

/// A signed-in staff member.
pub struct StaffSession {
    session_id: String,
    email: String,
    name: String,
    role: Role,
    token: Zeroizing<String>,
    login_time: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for StaffSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaffSession")
            .field("session_id", &self.session_id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// What the shell shows about the current session. Never carries the token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub login_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StaffSession {
    pub fn from_login(response: &LoginResponse, email: &str, now: DateTime<Utc>) -> Self {
        let name = response
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("User")
            .to_string();
        Self {
            session_id: Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            name,
            role: Role::parse(&response.role),
            token: Zeroizing::new(response.token.clone()),
            login_time: now,
            last_activity: now,
            expires_at: now + Duration::hours(SESSION_MAX_DURATION_HOURS),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &str {
        self.token.as_str()
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.permissions().contains(&permission)
    }

    /// Expired by inactivity or by maximum duration.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
            || now - self.last_activity > Duration::minutes(SESSION_INACTIVITY_MINUTES)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            permissions: self.role.permissions().to_vec(),
            login_time: self.login_time,
            expires_at: self.expires_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Auth state
// ---------------------------------------------------------------------------

/// Holds the counter's current session, if any, and keeps the client's
/// bearer token in step with it.
#[derive(Debug)]
pub struct AuthState {
    api: Arc<ApiClient>,
    current: Mutex<Option<StaffSession>>,
}

impl AuthState {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            current: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<StaffSession>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Log in against the backend and install the session. The client keeps
    /// the bearer token for subsequent calls.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionInfo, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let credentials = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let response = match self.api.login(&credentials).await {
            Ok(r) => r,
            Err(e) => {
                warn!(email = %credentials.email, error = %e, "login failed");
                return Err(e.into());
            }
        };
        let session = StaffSession::from_login(&response, email, Utc::now());
        let info = session.info();
        info!(session_id = %info.session_id, role = ?info.role, "staff signed in");
        *self.lock() = Some(session);
        Ok(info)
    }

    /// Install an already established session and its token.
    pub fn install(&self, session: StaffSession) -> SessionInfo {
        let info = session.info();
        self.api.set_token(session.token());
        *self.lock() = Some(session);
        info
    }

    /// Drop the session (wiping its token) and clear the client's token.
    pub fn sign_out(&self) {
        if let Some(session) = self.lock().take() {
            info!(session_id = %session.session_id, "staff signed out");
        }
        self.api.clear_token();
    }

    pub fn current(&self) -> Option<SessionInfo> {
        let now = Utc::now();
        self.lock()
            .as_ref()
            .filter(|s| !s.is_expired(now))
            .map(StaffSession::info)
    }

    /// Refresh the inactivity timer.
    pub fn track_activity(&self) {
        if let Some(session) = self.lock().as_mut() {
            session.last_activity = Utc::now();
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.require_at(permission, Utc::now()).is_ok()
    }

    pub fn require(&self, permission: Permission) -> Result<(), AuthError> {
        self.require_at(permission, Utc::now())
    }

    fn require_at(&self, permission: Permission, now: DateTime<Utc>) -> Result<(), AuthError> {
        let mut current = self.lock();
        let Some(session) = current.as_ref() else {
            return Err(AuthError::NotSignedIn);
        };
        if session.is_expired(now) {
            info!(session_id = %session.session_id, "session expired");
            *current = None;
            self.api.clear_token();
            return Err(AuthError::Expired);
        }
        if session.has_permission(permission) {
            Ok(())
        } else {
            Err(AuthError::Forbidden { permission })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(role: &str) -> LoginResponse {
        LoginResponse {
            token: "jwt-token".to_string(),
            role: role.to_string(),
            name: Some("Kiran".to_string()),
        }
    }

    #[test]
    fn roles_map_to_permissions() {
        let admin = StaffSession::from_login(&response("ROLE_ADMIN"), "a@x.com", Utc::now());
        assert_eq!(admin.role(), Role::Admin);
        assert!(admin.has_permission(Permission::ManageUsers));

        let user = StaffSession::from_login(&response("ROLE_USER"), "u@x.com", Utc::now());
        assert_eq!(user.role(), Role::User);
        assert!(user.has_permission(Permission::Checkout));
        assert!(!user.has_permission(Permission::ManageItems));

        let odd = StaffSession::from_login(&response("ROLE_SOMETHING"), "o@x.com", Utc::now());
        assert_eq!(odd.role(), Role::User);
    }

    #[test]
    fn missing_name_defaults_to_user() {
        let mut r = response("ROLE_USER");
        r.name = None;
        let session = StaffSession::from_login(&r, "u@x.com", Utc::now());
        assert_eq!(session.name(), "User");
        assert_eq!(session.token(), "jwt-token");
    }

    #[test]
    fn debug_output_hides_token() {
        let session = StaffSession::from_login(&response("ROLE_ADMIN"), "a@x.com", Utc::now());
        let printed = format!("{session:?}");
        assert!(!printed.contains("jwt-token"));
    }

    fn client() -> Arc<ApiClient> {
        Arc::new(
            ApiClient::new("http://127.0.0.1:9", std::time::Duration::from_secs(1))
                .expect("client"),
        )
    }

    #[test]
    fn require_checks_session_and_role() {
        let auth = AuthState::new(client());
        assert!(matches!(
            auth.require(Permission::Checkout),
            Err(AuthError::NotSignedIn)
        ));

        auth.install(StaffSession::from_login(
            &response("ROLE_USER"),
            "u@x.com",
            Utc::now(),
        ));
        assert!(auth.require(Permission::Checkout).is_ok());
        assert!(matches!(
            auth.require(Permission::ManageUsers),
            Err(AuthError::Forbidden {
                permission: Permission::ManageUsers
            })
        ));
        assert!(auth.current().is_some());
    }

    #[test]
    fn inactive_session_expires() {
        let api = client();
        let auth = AuthState::new(api.clone());
        let start = Utc::now() - Duration::minutes(SESSION_INACTIVITY_MINUTES + 1);
        auth.install(StaffSession::from_login(
            &response("ROLE_ADMIN"),
            "a@x.com",
            start,
        ));
        assert!(api.has_token());
        assert!(auth.current().is_none());
        assert!(matches!(
            auth.require(Permission::Checkout),
            Err(AuthError::Expired)
        ));
        assert!(!api.has_token());
        // The expired session has been dropped.
        assert!(matches!(
            auth.require(Permission::Checkout),
            Err(AuthError::NotSignedIn)
        ));
    }

    #[test]
    fn maximum_duration_applies_despite_activity() {
        let start = Utc::now();
        let mut session = StaffSession::from_login(&response("ROLE_ADMIN"), "a@x.com", start);
        let later = start + Duration::hours(SESSION_MAX_DURATION_HOURS);
        session.last_activity = later;
        assert!(session.is_expired(later));
        assert!(!session.is_expired(start + Duration::minutes(5)));
    }

    #[tokio::test]
    async fn blank_credentials_are_rejected_before_network() {
        let auth = AuthState::new(client());
        let err = auth.sign_in("  ", "secret").await.expect_err("blank");
        assert!(matches!(err, AuthError::MissingCredentials));
    }

    #[test]
    fn sign_out_clears_client_token() {
        let api = client();
        let auth = AuthState::new(api.clone());
        auth.install(StaffSession::from_login(
            &response("ROLE_USER"),
            "u@x.com",
            Utc::now(),
        ));
        assert!(api.has_token());
        auth.sign_out();
        assert!(!api.has_token());
        assert!(auth.current().is_none());
    }
}
