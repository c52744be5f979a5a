//! Market-entry intelligence client library
//!
//! Client-side session and analysis-data synchronization for the
//! market-entry intelligence API: who is logged in ([`auth::Auth`]) and which
//! analysis is on display ([`data::DataCache`]), backed by the remote report
//! store with an origin-scoped local fallback ([`storage`]).

pub mod auth;
pub mod cancel;
pub mod config;
pub mod data;
pub mod error;
pub mod fetch;
pub mod storage;

use std::env;
use std::sync::Arc;

use reqwest::Client;
use tokio::task::JoinHandle;

use crate::auth::Auth;
use crate::config::{ClientOptions, DEFAULT_API_BASE_URL, ENV_API_URL, ENV_STORAGE_PATH};
use crate::data::{DataCache, ReportsClient};
use crate::error::Error;
use crate::storage::{LocalStore, StorageArea};

/// The composition root: one per browsing context
pub struct MarketEntry {
    /// API base URL, including the version prefix
    pub url: String,
    /// HTTP client used for requests
    pub http_client: Client,
    /// Client options
    pub options: ClientOptions,
    storage: StorageArea,
    auth: Arc<Auth>,
    data: Arc<DataCache>,
}

impl MarketEntry {
    /// Create a client with in-memory storage
    ///
    /// # Example
    ///
    /// ```
    /// use market_entry_client::MarketEntry;
    ///
    /// let client = MarketEntry::new("https://api.example.com/api/v1");
    /// assert!(client.auth().current_user().is_none());
    /// ```
    pub fn new(api_url: &str) -> Self {
        Self::new_with_options(api_url, ClientOptions::default())
    }

    /// Create a client with custom options and in-memory storage
    pub fn new_with_options(api_url: &str, options: ClientOptions) -> Self {
        Self::with_storage(api_url, options, LocalStore::in_memory().area())
    }

    /// Create a client working through an existing storage context.
    ///
    /// Clients built on areas of the same [`LocalStore`] behave like tabs of
    /// one browser: they share the token and fallback slots and see each
    /// other's writes.
    ///
    /// # Example
    ///
    /// ```
    /// use market_entry_client::{config::ClientOptions, storage::LocalStore, MarketEntry};
    ///
    /// let store = LocalStore::in_memory();
    /// let first = MarketEntry::with_storage("https://api.example.com/api/v1", ClientOptions::default(), store.area());
    /// let second = MarketEntry::with_storage("https://api.example.com/api/v1", ClientOptions::default(), store.area());
    /// assert_ne!(first.storage().context(), second.storage().context());
    /// ```
    pub fn with_storage(api_url: &str, options: ClientOptions, storage: StorageArea) -> Self {
        let url = api_url.trim_end_matches('/').to_string();
        let http_client = options.http_client();

        let auth = Arc::new(Auth::new(
            &url,
            http_client.clone(),
            storage.clone(),
            options.clone(),
        ));
        let reports = ReportsClient::new(&url, http_client.clone(), &options.client_info);
        let data = Arc::new(DataCache::new(Arc::clone(&auth), storage.clone(), reports));

        Self {
            url,
            http_client,
            options,
            storage,
            auth,
            data,
        }
    }

    /// Create a client from `MARKET_ENTRY_*` environment variables.
    ///
    /// `MARKET_ENTRY_STORAGE_PATH` selects a file-backed store; without it
    /// storage is in-memory.
    pub fn from_env() -> Result<Self, Error> {
        let url = env::var(ENV_API_URL).unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        url::Url::parse(&url)?;

        let store = match env::var(ENV_STORAGE_PATH) {
            Ok(path) if !path.trim().is_empty() => LocalStore::open(path.trim())?,
            _ => LocalStore::in_memory(),
        };

        Ok(Self::with_storage(&url, ClientOptions::from_env(), store.area()))
    }

    /// The session manager
    pub fn auth(&self) -> &Arc<Auth> {
        &self.auth
    }

    /// The analysis data cache
    pub fn data(&self) -> &Arc<DataCache> {
        &self.data
    }

    /// This context's storage area
    pub fn storage(&self) -> &StorageArea {
        &self.storage
    }

    /// Restore the session in the background and keep the data cache in
    /// step with it. Dropping the returned guard stops both tasks.
    pub fn start(&self) -> SyncGuard {
        let auth = Arc::clone(&self.auth);
        let restore = tokio::spawn(async move { auth.restore().await });
        let sync = self.data.spawn_sync();

        SyncGuard {
            tasks: vec![restore, sync],
        }
    }
}

/// Background tasks started by [`MarketEntry::start`]
#[derive(Debug)]
pub struct SyncGuard {
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::auth::{Auth, AuthState, RegisterData, User, UserId};
    pub use crate::config::ClientOptions;
    pub use crate::data::{AnalysisSnapshot, DataCache, LocalAnalysis, ReportId};
    pub use crate::error::Error;
    pub use crate::storage::LocalStore;
    pub use crate::MarketEntry;
}
