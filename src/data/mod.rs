//! Analysis data cache
//!
//! [`DataCache`] keeps one [`AnalysisSnapshot`] in step with the session's
//! identity. Loads prefer the remote report store and fall back to the
//! user-scoped local slots. Each load or report switch cancels the one
//! before it, and only the most recently started operation may commit.

pub mod fallback;
mod remote;
mod types;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::auth::{Auth, UserId};
use crate::cancel::{CancelHandle, CancelToken};
use crate::error::Error;
use crate::storage::keys::parse_scoped_key;
use crate::storage::{StorageArea, StorageEvent};

pub use fallback::{FallbackRecord, SlotRead};
pub use remote::ReportsClient;
pub use types::*;

/// Everything a load needs, captured when it starts
struct LoadTicket {
    cancel: CancelToken,
    user: Option<UserId>,
    token: Option<String>,
}

enum RemoteOutcome {
    /// The server holds analysis data
    Data(AnalysisSnapshot),
    /// The server explicitly has nothing; keeps the selector list
    Empty(Vec<ReportSummary>),
}

/// Clears the loading flag when the operation holding it ends without
/// committing, e.g. because its future was dropped
struct SettleOnDrop<'a> {
    cache: &'a DataCache,
    cancel: &'a CancelToken,
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        let _inflight = self.cache.lock_inflight();
        if self.cancel.is_cancelled() {
            return;
        }
        self.cache.snapshot.send_if_modified(|snapshot| {
            if !snapshot.is_loading {
                return false;
            }
            snapshot.is_loading = false;
            true
        });
    }
}

/// Cache of the analysis currently on display
pub struct DataCache {
    auth: Arc<Auth>,
    storage: StorageArea,
    reports: ReportsClient,
    snapshot: watch::Sender<AnalysisSnapshot>,
    inflight: Mutex<Option<CancelHandle>>,
}

impl DataCache {
    pub(crate) fn new(auth: Arc<Auth>, storage: StorageArea, reports: ReportsClient) -> Self {
        let (snapshot, _) = watch::channel(AnalysisSnapshot::loading());
        Self {
            auth,
            storage,
            reports,
            snapshot,
            inflight: Mutex::new(None),
        }
    }

    /// The snapshot currently on display
    pub fn snapshot(&self) -> AnalysisSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch snapshot replacements
    pub fn subscribe(&self) -> watch::Receiver<AnalysisSnapshot> {
        self.snapshot.subscribe()
    }

    fn lock_inflight(&self) -> MutexGuard<'_, Option<CancelHandle>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel whatever is in flight and mark the snapshot as loading
    fn begin(&self) -> CancelToken {
        let mut inflight = self.lock_inflight();
        if let Some(previous) = inflight.take() {
            previous.cancel();
        }

        let (handle, token) = CancelHandle::new();
        *inflight = Some(handle);

        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.is_loading {
                return false;
            }
            snapshot.is_loading = true;
            true
        });
        token
    }

    /// Apply `update` unless `cancel` was superseded. Returns whether it applied.
    fn commit(&self, cancel: &CancelToken, update: impl FnOnce(&mut AnalysisSnapshot)) -> bool {
        // Same lock as `begin`: a newer operation cannot start between the
        // check and the write.
        let _inflight = self.lock_inflight();
        if cancel.is_cancelled() {
            log::debug!("Discarding result of a superseded load");
            return false;
        }
        self.snapshot.send_modify(update);
        true
    }

    fn begin_load(&self) -> LoadTicket {
        let cancel = self.begin();
        LoadTicket {
            cancel,
            user: self.auth.current_user().map(|user| user.id),
            token: self.auth.token(),
        }
    }

    /// Reload the snapshot for the current identity.
    ///
    /// Anonymous sessions settle to an empty snapshot without any request.
    /// Otherwise the report list and then the latest dashboard are fetched;
    /// an explicit "no data" reply or any failure falls back to the local
    /// slots of the current user.
    pub async fn load(&self) {
        let ticket = self.begin_load();
        self.run_load(ticket).await;
    }

    /// Re-run [`load`](Self::load), e.g. after an analysis completed elsewhere
    pub async fn refresh(&self) {
        self.load().await;
    }

    /// Start a load now and finish it in a background task.
    ///
    /// The previous operation is cancelled before this returns, so call
    /// order decides which load wins.
    pub fn start_load(self: &Arc<Self>) -> JoinHandle<()> {
        let ticket = self.begin_load();
        let cache = Arc::clone(self);
        tokio::spawn(async move { cache.run_load(ticket).await })
    }

    async fn run_load(&self, ticket: LoadTicket) {
        let _settle = SettleOnDrop {
            cache: self,
            cancel: &ticket.cancel,
        };

        let user = match ticket.user {
            Some(user) => user,
            None => {
                self.commit(&ticket.cancel, |snapshot| {
                    *snapshot = AnalysisSnapshot::empty()
                });
                return;
            }
        };

        let mut reports = Vec::new();
        match ticket.token.as_deref() {
            Some(token) => match self.fetch_remote(token, &ticket.cancel).await {
                Ok(RemoteOutcome::Data(remote)) => {
                    log::debug!("Loaded remote analysis for user {}", user);
                    self.commit(&ticket.cancel, |snapshot| *snapshot = remote);
                    return;
                }
                Ok(RemoteOutcome::Empty(summaries)) => {
                    log::debug!("No remote analysis for user {}", user);
                    reports = summaries;
                }
                Err(err) if err.is_cancelled() => {
                    log::debug!("Load for user {} was superseded", user);
                    return;
                }
                Err(err) => {
                    log::warn!(
                        "Remote load failed for user {}, using local data: {}",
                        user,
                        err
                    );
                }
            },
            None => log::debug!("No session token for user {}, using local data", user),
        }

        let record = FallbackRecord::read(&self.storage, user);
        let local = AnalysisSnapshot {
            dashboard_data: record.dashboard.into_value(),
            competitor_summary: record.competitors.into_value(),
            arbitrage_data: record.arbitrage.into_value(),
            has_analysis_history: record.has_history,
            is_loading: false,
            available_reports: reports,
            current_report_id: None,
        };
        self.commit(&ticket.cancel, |snapshot| *snapshot = local);
    }

    async fn fetch_remote(
        &self,
        token: &str,
        cancel: &CancelToken,
    ) -> Result<RemoteOutcome, Error> {
        // The list comes first so the detail never gets ahead of the selector.
        let summaries = cancel.run(self.reports.list_summaries(token)).await?;
        let payload = cancel.run(self.reports.latest_dashboard(token)).await?;

        let current_report_id = most_recent(&summaries).or(payload.report_id);
        let remote = AnalysisSnapshot {
            dashboard_data: payload.dashboard_data,
            competitor_summary: payload.competitor_summary,
            arbitrage_data: payload.arbitrage_data,
            has_analysis_history: true,
            is_loading: false,
            available_reports: summaries,
            current_report_id,
        };

        if payload.has_data.unwrap_or_else(|| remote.has_data()) {
            Ok(RemoteOutcome::Data(remote))
        } else {
            Ok(RemoteOutcome::Empty(remote.available_reports))
        }
    }

    /// Show report `id`.
    ///
    /// On success the data fields are replaced wholesale and `id` becomes
    /// the current report; the selector list is kept. On failure only the
    /// loading flag is cleared and the previous data stays.
    pub async fn load_specific_report(&self, id: ReportId) -> Result<(), Error> {
        let cancel = self.begin();
        let _settle = SettleOnDrop {
            cache: self,
            cancel: &cancel,
        };

        let token = match (self.auth.is_authenticated(), self.auth.token()) {
            (true, Some(token)) => token,
            _ => {
                self.commit(&cancel, |snapshot| snapshot.is_loading = false);
                return Err(Error::Unauthenticated);
            }
        };

        match cancel.run(self.reports.report(id, &token)).await {
            Ok(payload) => {
                let committed = self.commit(&cancel, |snapshot| {
                    snapshot.dashboard_data = payload.dashboard_data;
                    snapshot.competitor_summary = payload.competitor_summary;
                    snapshot.arbitrage_data = payload.arbitrage_data;
                    snapshot.has_analysis_history = true;
                    snapshot.current_report_id = Some(id);
                    snapshot.is_loading = false;
                });
                if committed {
                    Ok(())
                } else {
                    Err(Error::Cancelled)
                }
            }
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => {
                log::warn!("Failed to load report {}: {}", id, err);
                self.commit(&cancel, |snapshot| snapshot.is_loading = false);
                Err(err)
            }
        }
    }

    /// Store a completed analysis in the current user's local slots and
    /// reload.
    pub async fn save_local_analysis(&self, analysis: &LocalAnalysis) -> Result<(), Error> {
        let user = self.auth.current_user().ok_or(Error::Unauthenticated)?;
        let written = fallback::write(&self.storage, user.id, analysis);
        self.load().await;
        written
    }

    /// Whether `event` is another context writing one of the current
    /// user's slots
    fn is_relevant(&self, event: &StorageEvent) -> bool {
        if event.origin == self.storage.context() {
            return false;
        }

        let current = match self.auth.current_user() {
            Some(user) => user.id,
            None => return false,
        };

        matches!(parse_scoped_key(&event.key), Some((_, owner)) if owner == current)
    }

    /// Keep the snapshot in step with the session and with other contexts.
    ///
    /// Reloads whenever the settled identity changes user, and whenever
    /// another context writes one of the current user's slots.
    pub fn spawn_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let mut identity = self.auth.subscribe();
        let mut events = self.storage.subscribe();

        tokio::spawn(async move {
            let mut loaded_for: Option<Option<UserId>> = None;

            loop {
                let settled = identity.borrow_and_update().settled_user_id();
                if let Some(user) = settled {
                    if loaded_for != Some(user) {
                        loaded_for = Some(user);
                        cache.start_load();
                    }
                }

                tokio::select! {
                    changed = identity.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    event = events.recv() => match event {
                        Ok(event) => {
                            if cache.is_relevant(&event) {
                                log::debug!("Local slot {} changed in another context", event.key);
                                cache.start_load();
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            log::debug!("Missed {} storage events, reloading", missed);
                            cache.start_load();
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}
