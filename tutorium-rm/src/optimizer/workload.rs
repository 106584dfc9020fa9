//! Per-tutor workload aggregation
//!
//! Sums scheduled teaching time across a tutor's upcoming sessions and
//! active classes into hours per week, then bands the total into a
//! workload tier against fixed thresholds.

use serde::{Deserialize, Serialize};
use tutorium_common::store::DocumentStore;
use tutorium_common::Result;

use super::{load_active_classes_for, load_active_sessions_for};

/// Weekly hours above which a tutor is considered overloaded
pub const OVERLOADED_HOURS: f64 = 35.0;
/// Weekly hours above which a tutor's workload is high
pub const HIGH_HOURS: f64 = 25.0;
/// Weekly hours above which a tutor's workload is medium; below is low
pub const MEDIUM_HOURS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadTier {
    Low,
    Medium,
    High,
    Overloaded,
}

/// Derived workload summary for one tutor. Recomputed on each request,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorWorkload {
    pub tutor_id: String,
    pub session_ids: Vec<String>,
    pub class_ids: Vec<String>,
    pub total_hours: f64,
    pub tier: WorkloadTier,
}

/// Band weekly hours into a workload tier
pub fn classify_hours(total_hours: f64) -> WorkloadTier {
    if total_hours > OVERLOADED_HOURS {
        WorkloadTier::Overloaded
    } else if total_hours > HIGH_HOURS {
        WorkloadTier::High
    } else if total_hours > MEDIUM_HOURS {
        WorkloadTier::Medium
    } else {
        WorkloadTier::Low
    }
}

/// Aggregate one tutor's scheduled sessions and active classes into a
/// weekly workload. A tutor with no work yields zero hours and the low
/// tier rather than an error.
pub async fn calculate_tutor_workload(
    store: &dyn DocumentStore,
    tutor_id: &str,
) -> Result<TutorWorkload> {
    let sessions = load_active_sessions_for(store, tutor_id).await?;
    let classes = load_active_classes_for(store, tutor_id).await?;

    let session_minutes: i64 = sessions.iter().map(|s| s.duration_minutes).sum();
    let class_minutes: i64 = classes.iter().map(|c| c.weekly_minutes()).sum();
    let total_hours = (session_minutes + class_minutes) as f64 / 60.0;

    Ok(TutorWorkload {
        tutor_id: tutor_id.to_string(),
        session_ids: sessions.into_iter().map(|s| s.id).collect(),
        class_ids: classes.into_iter().map(|c| c.id).collect(),
        total_hours,
        tier: classify_hours(total_hours),
    })
}
