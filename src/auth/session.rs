//! Session state and token persistence

use crate::auth::types::{User, UserId};
use crate::error::Error;
use crate::storage::StorageArea;

/// Identity state of the session
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    /// Nothing is known yet
    #[default]
    Unknown,
    /// A stored token is being checked against the profile endpoint
    Restoring,
    /// A user is logged in
    Authenticated(User),
    /// Nobody is logged in
    Anonymous,
}

impl AuthState {
    /// The logged-in user, if any
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Whether the state is final for this page load.
    ///
    /// `Unknown` and `Restoring` are transient.
    pub fn is_settled(&self) -> bool {
        matches!(self, AuthState::Authenticated(_) | AuthState::Anonymous)
    }

    /// The settled user id: `None` while unsettled, `Some(None)` when anonymous.
    pub fn settled_user_id(&self) -> Option<Option<UserId>> {
        match self {
            AuthState::Authenticated(user) => Some(Some(user.id)),
            AuthState::Anonymous => Some(None),
            AuthState::Unknown | AuthState::Restoring => None,
        }
    }
}

/// The durable slot holding the opaque session token
#[derive(Debug, Clone)]
pub struct TokenSlot {
    storage: StorageArea,
    key: String,
}

impl TokenSlot {
    pub fn new(storage: StorageArea, key: &str) -> Self {
        Self {
            storage,
            key: key.to_string(),
        }
    }

    /// The stored token; blank values count as absent
    pub fn load(&self) -> Option<String> {
        self.storage
            .get(&self.key)
            .filter(|token| !token.trim().is_empty())
    }

    pub fn store(&self, token: &str) -> Result<(), Error> {
        self.storage.set(&self.key, token)
    }

    /// Remove the token. The in-memory removal always happens; only a
    /// failure to persist it is reported.
    pub fn clear(&self) -> Result<(), Error> {
        self.storage.remove(&self.key)
    }
}
