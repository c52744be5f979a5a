//! Local fallback slots
//!
//! Each slot is read on its own; a corrupt value only empties that slot.

use serde_json::Value;

use crate::auth::UserId;
use crate::data::types::LocalAnalysis;
use crate::error::Error;
use crate::storage::keys::{scoped_key, FallbackSlot};
use crate::storage::StorageArea;

/// Outcome of reading one slot
#[derive(Debug, Clone, PartialEq)]
pub enum SlotRead {
    Missing,
    Parsed(Value),
    Corrupt(String),
}

impl SlotRead {
    fn read(storage: &StorageArea, slot: FallbackSlot, user: UserId) -> Self {
        let key = scoped_key(slot, user);
        match storage.get(&key) {
            None => SlotRead::Missing,
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Null) => SlotRead::Missing,
                Ok(value) => SlotRead::Parsed(value),
                Err(err) => {
                    log::warn!("Ignoring corrupt fallback slot {}: {}", key, err);
                    SlotRead::Corrupt(err.to_string())
                }
            },
        }
    }

    /// The parsed value; missing and corrupt slots are both empty
    pub fn into_value(self) -> Option<Value> {
        match self {
            SlotRead::Parsed(value) => Some(value),
            SlotRead::Missing | SlotRead::Corrupt(_) => None,
        }
    }
}

/// Everything stored locally for one user
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackRecord {
    pub dashboard: SlotRead,
    pub competitors: SlotRead,
    pub arbitrage: SlotRead,
    /// The existence marker is present
    pub has_history: bool,
}

impl FallbackRecord {
    /// Read every slot of `user`; never fails
    pub fn read(storage: &StorageArea, user: UserId) -> Self {
        Self {
            dashboard: SlotRead::read(storage, FallbackSlot::DashboardData, user),
            competitors: SlotRead::read(storage, FallbackSlot::CompetitorSummary, user),
            arbitrage: SlotRead::read(storage, FallbackSlot::SegmentArbitrage, user),
            has_history: storage.contains(&scoped_key(FallbackSlot::AnalysisMarker, user)),
        }
    }
}

/// Store `analysis` in the slots of `user` and set the existence marker.
///
/// Every slot is attempted; the first persistence error is returned.
pub fn write(storage: &StorageArea, user: UserId, analysis: &LocalAnalysis) -> Result<(), Error> {
    let slots = [
        (FallbackSlot::DashboardData, &analysis.dashboard_data),
        (FallbackSlot::CompetitorSummary, &analysis.competitor_summary),
        (FallbackSlot::SegmentArbitrage, &analysis.arbitrage_data),
    ];

    let mut first_error = None;
    for (slot, value) in slots {
        let key = scoped_key(slot, user);
        let result = match value {
            Some(value) => serde_json::to_string(value)
                .map_err(Error::from)
                .and_then(|raw| storage.set(&key, &raw)),
            None => storage.remove(&key),
        };
        if let Err(err) = result {
            first_error.get_or_insert(err);
        }
    }

    let marker = serde_json::json!({ "saved_at": chrono::Utc::now() }).to_string();
    if let Err(err) = storage.set(&scoped_key(FallbackSlot::AnalysisMarker, user), &marker) {
        first_error.get_or_insert(err);
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
