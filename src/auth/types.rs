//! Types for authentication and user management

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user ID
    pub id: UserId,

    /// The user's email address
    pub email: String,

    /// First name
    #[serde(default)]
    pub first_name: String,

    /// Last name
    #[serde(default)]
    pub last_name: String,

    /// Whether the email address has been verified
    #[serde(default)]
    pub is_verified: bool,

    /// The creation time
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Federated identity provider, e.g. `google`
    #[serde(default)]
    pub provider: Option<String>,

    /// Profile picture URL
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Login request body
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Reply to a successful login or federated login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Opaque session token
    pub token: String,

    /// The authenticated user
    pub user: User,

    /// Server message
    #[serde(default)]
    pub message: Option<String>,
}

/// Account details for registration
#[derive(Debug, Clone, Serialize)]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Signup request body; the API wants the password twice.
#[derive(Debug, Serialize)]
pub(crate) struct SignupRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub password_confirm: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

impl<'a> From<&'a RegisterData> for SignupRequest<'a> {
    fn from(data: &'a RegisterData) -> Self {
        Self {
            email: &data.email,
            password: &data.password,
            password_confirm: &data.password,
            first_name: &data.first_name,
            last_name: &data.last_name,
        }
    }
}

/// Reply to a registration request
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub user: Option<User>,

    /// Absent when email verification is required
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub email_verification_required: bool,

    #[serde(default)]
    pub email_send_failed: bool,
}

/// What a registration produced, for routing the caller
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterOutcome {
    /// The new user, when the server returned one
    pub user: Option<User>,

    /// The caller should route to the verification step
    pub verification_required: bool,

    /// The verification email could not be sent
    pub email_send_failed: bool,
}

/// Purpose of an email verification code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    #[default]
    Signup,
    EmailChange,
    PasswordReset,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendVerificationRequest<'a> {
    pub email: &'a str,
    pub verification_type: VerificationKind,
}

#[derive(Debug, Serialize)]
pub(crate) struct VerifyCodeRequest<'a> {
    pub email: &'a str,
    pub code: &'a str,
    pub verification_type: VerificationKind,
}

/// Reply to a verification code check
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyCodeResponse {
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GoogleAuthRequest<'a> {
    pub access_token: &'a str,
}
