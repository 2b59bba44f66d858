//! Battle Results
//!
//! What both callers of a pairing receive.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::battle::engine::BattleReport;
use crate::battle::outcome::BattleOutcome;
use crate::store::StoreError;

/// Result of a paired battle, shared by the waiter and the counterpart.
#[derive(Clone, Debug)]
pub struct BattleResult {
    /// Unique battle id (also feeds the RNG seed).
    pub battle_id: Uuid,
    /// When the engine finished.
    pub finished_at: DateTime<Utc>,
    /// Engine report.
    pub report: BattleReport,
    /// Encoded `BattleSetup`; replaying it reproduces `report`.
    pub replay: Option<Vec<u8>>,
    /// Set when applying rating/statistics updates failed.
    /// The computed result stands either way.
    pub persistence_error: Option<StoreError>,
}

impl BattleResult {
    /// Battle outcome.
    pub fn outcome(&self) -> &BattleOutcome {
        &self.report.outcome
    }

    /// Full narration, in order.
    pub fn log_lines(&self) -> Vec<String> {
        self.report.log_lines()
    }

    /// One-line summary: the closing log line.
    pub fn summary(&self) -> String {
        self.report
            .events
            .last()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    /// Whether ratings and statistics were fully written.
    pub fn is_persisted(&self) -> bool {
        self.persistence_error.is_none()
    }
}
