//! Storage key derivation
//!
//! Every per-user key is built by [`scoped_key`]; nothing else in the crate
//! formats fallback keys by hand.

use std::fmt;

use crate::auth::UserId;

/// Default key holding the session token
pub const DEFAULT_TOKEN_KEY: &str = "authToken";

/// Per-user fallback slots in durable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackSlot {
    /// Dashboard metrics block
    DashboardData,
    /// Competitor list
    CompetitorSummary,
    /// Segment arbitrage opportunities
    SegmentArbitrage,
    /// Marker recording that a local analysis was stored at least once
    AnalysisMarker,
}

impl FallbackSlot {
    /// Every slot, data slots first
    pub const ALL: [FallbackSlot; 4] = [
        FallbackSlot::DashboardData,
        FallbackSlot::CompetitorSummary,
        FallbackSlot::SegmentArbitrage,
        FallbackSlot::AnalysisMarker,
    ];

    fn prefix(self) -> &'static str {
        match self {
            FallbackSlot::DashboardData => "dashboardData",
            FallbackSlot::CompetitorSummary => "competitorSummary",
            FallbackSlot::SegmentArbitrage => "segmentArbitrage",
            FallbackSlot::AnalysisMarker => "analysis",
        }
    }
}

impl fmt::Display for FallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Key for `slot` belonging to `user`, e.g. `dashboardData_7`.
pub fn scoped_key(slot: FallbackSlot, user: UserId) -> String {
    format!("{}_{}", slot.prefix(), user)
}

/// Inverse of [`scoped_key`]. Unscoped or foreign keys yield `None`.
pub fn parse_scoped_key(key: &str) -> Option<(FallbackSlot, UserId)> {
    let (prefix, id) = key.rsplit_once('_')?;
    let slot = FallbackSlot::ALL
        .into_iter()
        .find(|slot| slot.prefix() == prefix)?;
    let id = id.parse::<i64>().ok()?;
    Some((slot, UserId(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_keys() {
        let user = UserId(7);
        assert_eq!(scoped_key(FallbackSlot::DashboardData, user), "dashboardData_7");
        assert_eq!(
            scoped_key(FallbackSlot::CompetitorSummary, user),
            "competitorSummary_7"
        );
        assert_eq!(
            scoped_key(FallbackSlot::SegmentArbitrage, user),
            "segmentArbitrage_7"
        );
        assert_eq!(scoped_key(FallbackSlot::AnalysisMarker, user), "analysis_7");
    }

    #[test]
    fn test_distinct_users_never_share_keys() {
        for slot in FallbackSlot::ALL {
            assert_ne!(scoped_key(slot, UserId(1)), scoped_key(slot, UserId(11)));
        }
    }

    #[test]
    fn test_parse_scoped_key() {
        assert_eq!(
            parse_scoped_key("segmentArbitrage_42"),
            Some((FallbackSlot::SegmentArbitrage, UserId(42)))
        );
        assert_eq!(
            parse_scoped_key("analysis_3"),
            Some((FallbackSlot::AnalysisMarker, UserId(3)))
        );
        // Legacy unscoped keys are not part of any user's namespace.
        assert_eq!(parse_scoped_key("dashboardData"), None);
        assert_eq!(parse_scoped_key("dashboardData_abc"), None);
        assert_eq!(parse_scoped_key("authToken"), None);
    }
}
