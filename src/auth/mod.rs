//! Session management for the market-entry API
//!
//! [`Auth`] is the single source of truth for who is logged in. Identity
//! changes are published through a `watch` channel (see [`Auth::subscribe`]);
//! the only thing persisted is the opaque session token.

mod session;
mod types;

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use reqwest::Client;
use tokio::sync::watch;

use crate::config::ClientOptions;
use crate::error::Error;
use crate::fetch::{Fetch, FetchBuilder};
use crate::storage::StorageArea;

pub use session::*;
pub use types::*;

/// Client for authentication and session state
pub struct Auth {
    /// API base URL, including the version prefix
    url: String,

    /// HTTP client used for requests
    client: Client,

    /// Client options
    options: ClientOptions,

    /// Durable token slot
    token: TokenSlot,

    /// Current identity
    state: watch::Sender<AuthState>,

    /// Credential requests in flight
    pending: AtomicUsize,

    restore_started: AtomicBool,

    last_error: Mutex<Option<String>>,
}

struct PendingGuard<'a>(&'a AtomicUsize);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Auth {
    /// Create a new Auth client
    pub(crate) fn new(
        url: &str,
        client: Client,
        storage: StorageArea,
        options: ClientOptions,
    ) -> Self {
        let token = TokenSlot::new(storage, &options.token_storage_key);
        let (state, _) = watch::channel(AuthState::Unknown);

        Self {
            url: url.trim_end_matches('/').to_string(),
            client,
            options,
            token,
            state,
            pending: AtomicUsize::new(0),
            restore_started: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    fn get_auth_url(&self, path: &str) -> String {
        format!("{}/auth{}", self.url, path)
    }

    fn post(&self, path: &str) -> FetchBuilder<'_> {
        Fetch::post(&self.client, &self.get_auth_url(path))
            .header("X-Client-Info", &self.options.client_info)
    }

    fn begin_request(&self) -> PendingGuard<'_> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        PendingGuard(&self.pending)
    }

    /// Restore the session from a stored token.
    ///
    /// Runs at most once per instance. Without a stored token the session
    /// becomes anonymous without any request; with one, the profile endpoint
    /// decides. Any failure removes the token and leaves the session
    /// anonymous. Never fails.
    pub async fn restore(&self) {
        if self.restore_started.swap(true, Ordering::SeqCst) {
            log::debug!("Session restore already ran");
            return;
        }

        let stored = self.token.load();
        let started = self.state.send_if_modified(|state| {
            if state.is_settled() {
                return false;
            }
            *state = if stored.is_some() {
                AuthState::Restoring
            } else {
                AuthState::Anonymous
            };
            true
        });

        if !started {
            log::debug!("Session already settled, skipping restore");
            return;
        }

        let token = match stored {
            Some(token) => token,
            None => return,
        };

        match self.profile_with(&token).await {
            Ok(user) => {
                log::info!("Restored session for user {}", user.id);
                self.state.send_if_modified(|state| {
                    if *state != AuthState::Restoring {
                        return false;
                    }
                    *state = AuthState::Authenticated(user);
                    true
                });
            }
            Err(err) => {
                log::warn!("Session restore failed: {}", err);
                // A login that finished meanwhile owns the slot now.
                if self.token.load().as_deref() == Some(token.as_str()) {
                    if let Err(err) = self.token.clear() {
                        log::error!("Failed to persist token removal: {}", err);
                    }
                }
                self.state.send_if_modified(|state| {
                    if *state != AuthState::Restoring {
                        return false;
                    }
                    *state = AuthState::Anonymous;
                    true
                });
            }
        }
    }

    /// Log in with email and password.
    ///
    /// On failure the previous identity and token are left as they were and
    /// the display message is available from [`last_error`](Self::last_error).
    pub async fn login(&self, email: &str, password: &str) -> Result<User, Error> {
        let _pending = self.begin_request();

        let result = async {
            let response = self
                .post("/login/")
                .json(&LoginRequest { email, password })?
                .execute::<LoginResponse>()
                .await
                .map_err(|err| err.into_credentials_error("Login failed"))?;
            self.accept(Some(response.token.as_str()), Some(response.user.clone()));
            Ok::<_, Error>(response.user)
        }
        .await;

        self.record("Login", result)
    }

    /// Register a new account.
    ///
    /// When the server requires email verification it may return no token;
    /// the identity is still set from the returned user and the caller
    /// should route to the verification step.
    pub async fn register(&self, data: &RegisterData) -> Result<RegisterOutcome, Error> {
        let _pending = self.begin_request();

        let result = async {
            let response = self
                .post("/signup/")
                .json(&SignupRequest::from(data))?
                .execute::<RegisterResponse>()
                .await
                .map_err(|err| err.into_credentials_error("Registration failed"))?;

            self.accept(response.token.as_deref(), response.user.clone());

            Ok::<_, Error>(RegisterOutcome {
                user: response.user,
                verification_required: response.email_verification_required,
                email_send_failed: response.email_send_failed,
            })
        }
        .await;

        self.record("Registration", result)
    }

    /// Log out.
    ///
    /// Identity and token are cleared before this returns. The returned
    /// future only notifies the server, best effort; its failure is logged
    /// and never restores the session. Dropping it skips the notification.
    pub fn logout(&self) -> impl Future<Output = ()> + Send + 'static {
        let token = self.token.load();

        if let Err(err) = self.token.clear() {
            log::error!("Failed to persist token removal: {}", err);
        }
        self.state.send_replace(AuthState::Anonymous);
        self.set_last_error(None);
        log::info!("Logged out");

        let client = self.client.clone();
        let url = self.get_auth_url("/logout/");
        let client_info = self.options.client_info.clone();

        async move {
            let token = match token {
                Some(token) => token,
                None => return,
            };

            let result = Fetch::post(&client, &url)
                .header("X-Client-Info", &client_info)
                .token_auth(&token)
                .send()
                .await;

            if let Err(err) = result {
                log::warn!("Logout API call failed, local session already cleared: {}", err);
            }
        }
    }

    /// Overwrite the identity with a user obtained elsewhere
    pub fn set_user(&self, user: User) {
        self.state.send_replace(AuthState::Authenticated(user));
    }

    /// Ask the server to email a verification code
    pub async fn send_verification_email(
        &self,
        email: &str,
        kind: VerificationKind,
    ) -> Result<(), Error> {
        let result = async {
            self.post("/send-verification-email/")
                .json(&SendVerificationRequest {
                    email,
                    verification_type: kind,
                })?
                .send()
                .await
                .map_err(|err| err.into_credentials_error("Failed to send verification email"))
        }
        .await;

        self.record("Sending verification email", result)
    }

    /// Check a verification code.
    ///
    /// A token in the reply is stored and a user in the reply becomes the
    /// current identity.
    pub async fn verify_email_code(
        &self,
        email: &str,
        code: &str,
        kind: VerificationKind,
    ) -> Result<Option<User>, Error> {
        let _pending = self.begin_request();

        let result = async {
            let response = self
                .post("/verify-email-code/")
                .json(&VerifyCodeRequest {
                    email,
                    code,
                    verification_type: kind,
                })?
                .execute::<VerifyCodeResponse>()
                .await
                .map_err(|err| err.into_credentials_error("Verification failed"))?;

            self.accept(response.token.as_deref(), response.user.clone());
            Ok::<_, Error>(response.user)
        }
        .await;

        self.record("Email verification", result)
    }

    /// Exchange a Google credential for a session
    pub async fn google_auth(&self, credential: &str) -> Result<User, Error> {
        let _pending = self.begin_request();

        let result = async {
            let response = self
                .post("/google-auth/")
                .json(&GoogleAuthRequest {
                    access_token: credential,
                })?
                .execute::<LoginResponse>()
                .await
                .map_err(|err| err.into_credentials_error("Google authentication failed"))?;
            self.accept(Some(response.token.as_str()), Some(response.user.clone()));
            Ok::<_, Error>(response.user)
        }
        .await;

        self.record("Google authentication", result)
    }

    /// Fetch the profile for the stored token without changing any state
    pub async fn fetch_profile(&self) -> Result<User, Error> {
        let token = self.token.load().ok_or(Error::Unauthenticated)?;
        self.profile_with(&token).await
    }

    async fn profile_with(&self, token: &str) -> Result<User, Error> {
        let url = self.get_auth_url("/profile/");
        Fetch::get(&self.client, &url)
            .header("X-Client-Info", &self.options.client_info)
            .token_auth(token)
            .execute::<User>()
            .await
    }

    fn accept(&self, token: Option<&str>, user: Option<User>) {
        if let Some(token) = token {
            // The in-memory slot is updated even when persisting fails.
            if let Err(err) = self.token.store(token) {
                log::error!("Failed to persist session token: {}", err);
            }
        }

        if let Some(user) = user {
            log::info!("Authenticated user {}", user.id);
            self.state.send_replace(AuthState::Authenticated(user));
        }
    }

    fn record<T>(&self, operation: &str, result: Result<T, Error>) -> Result<T, Error> {
        match &result {
            Ok(_) => self.set_last_error(None),
            Err(err) => {
                log::warn!("{} failed: {}", operation, err);
                self.set_last_error(Some(err.display_message()));
            }
        }
        result
    }

    fn set_last_error(&self, message: Option<String>) {
        let mut last_error = self.last_error.lock().unwrap_or_else(PoisonError::into_inner);
        *last_error = message;
    }

    /// The current identity state
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// The logged-in user, if any
    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    /// Whether a user is logged in
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().user().is_some()
    }

    /// True until the session has settled, and while a credential request
    /// is in flight
    pub fn is_loading(&self) -> bool {
        !self.state.borrow().is_settled() || self.pending.load(Ordering::SeqCst) > 0
    }

    /// Display message of the last failed operation
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The stored session token
    pub fn token(&self) -> Option<String> {
        self.token.load()
    }

    /// Watch identity changes
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }
}
