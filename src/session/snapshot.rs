//! Per-session JSON snapshot for post-hoc analysis.
//!
//! One file per session, written once at session end. Snapshot
//! failures are logged and swallowed; the terminal report is the only
//! output a session is allowed to fail on.

use crate::budget::{CostSummary, UsageRecord};
use crate::config::ResearchConfig;
use crate::govern::GovernorStats;
use crate::metrics::MetricsExport;
use crate::score::VerificationResult;
use crate::session::TerminationReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Everything worth keeping about a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub query: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub termination_reason: TerminationReason,
    pub final_confidence: f64,
    pub config: ResearchConfig,
    pub verifications: Vec<VerificationResult>,
    pub cost: CostSummary,
    pub usage_history: Vec<UsageRecord>,
    pub governor: GovernorStats,
    pub metrics: MetricsExport,
}

impl SessionSnapshot {
    /// Write the snapshot as pretty-printed JSON under `dir`, creating
    /// the directory if needed. Returns the path written.
    pub fn write(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("session-{}.json", self.session_id));
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsTracker;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            session_id: Uuid::new_v4(),
            query: "q".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            termination_reason: TerminationReason::Satisfied,
            final_confidence: 0.9,
            config: ResearchConfig::default(),
            verifications: vec![VerificationResult::default()],
            cost: CostSummary {
                total_usd: 0.1,
                limit_usd: 1.0,
                limit_used_pct: 10.0,
                total_input_units: 100,
                total_output_units: 50,
                total_calls: 2,
                by_operation: Default::default(),
            },
            usage_history: vec![],
            governor: GovernorStats::default(),
            metrics: MetricsTracker::new().export(),
        }
    }

    #[test]
    fn test_write_creates_one_file_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let snap = snapshot();
        let path = snap.write(dir.path()).unwrap();
        assert!(path.exists());
        assert!(
            path.file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .contains(&snap.session_id.to_string())
        );

        let other = snapshot();
        let other_path = other.write(dir.path()).unwrap();
        assert_ne!(path, other_path);
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let snap = snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let back: SessionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.session_id, snap.session_id);
        assert_eq!(back.termination_reason, TerminationReason::Satisfied);
    }
}
