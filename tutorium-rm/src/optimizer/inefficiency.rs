//! Resource inefficiency detection
//!
//! Scans every active tutor's workload plus the class and session data for
//! allocation problems. Emission order is deterministic for a given store
//! snapshot: tutor findings sorted by tutor id, then class fill findings by
//! class id, then scheduling conflicts by tutor and session start. Sorting
//! by severity and filtering are the HTTP layer's job.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tutorium_common::store::DocumentStore;
use tutorium_common::Result;

use super::workload::{calculate_tutor_workload, WorkloadTier, MEDIUM_HOURS, OVERLOADED_HOURS};
use super::{load_active_classes, load_active_enrollments_for, load_active_sessions_for,
            load_active_tutors};

/// Hours over the overloaded cutoff that escalate severity to high
const SEVERE_OVERLOAD_MARGIN: f64 = 10.0;
/// Hours under which an underutilized tutor escalates to medium severity
const SEVERE_UNDERUSE_HOURS: f64 = 5.0;
/// Fill ratio below which a class is flagged as under-filled
const UNDERFILL_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InefficiencyKind {
    OverloadedTutor,
    UnderutilizedTutor,
    InefficientGroupSize,
    SchedulingConflict,
}

impl FromStr for InefficiencyKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "overloaded_tutor" => Ok(Self::OverloadedTutor),
            "underutilized_tutor" => Ok(Self::UnderutilizedTutor),
            "inefficient_group_size" => Ok(Self::InefficientGroupSize),
            "scheduling_conflict" => Ok(Self::SchedulingConflict),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(()),
        }
    }
}

/// One detected allocation problem. Derived, recomputed per request,
/// never persisted. Every id in `affected_resource_ids` was read from the
/// store during this scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inefficiency {
    pub kind: InefficiencyKind,
    pub severity: Severity,
    pub description: String,
    pub affected_resource_ids: Vec<String>,
}

/// Scan all tutors and scheduling data for allocation inefficiencies
pub async fn identify_inefficiencies(store: &dyn DocumentStore) -> Result<Vec<Inefficiency>> {
    let tutors = load_active_tutors(store).await?;
    let mut findings = Vec::new();

    // Workload findings, one pass per tutor in id order
    for tutor in &tutors {
        let workload = calculate_tutor_workload(store, &tutor.id).await?;
        match workload.tier {
            WorkloadTier::Overloaded => {
                let excess = workload.total_hours - OVERLOADED_HOURS;
                let severity = if excess >= SEVERE_OVERLOAD_MARGIN {
                    Severity::High
                } else {
                    Severity::Medium
                };
                findings.push(Inefficiency {
                    kind: InefficiencyKind::OverloadedTutor,
                    severity,
                    description: format!(
                        "Tutor {} is scheduled for {:.1} h/week, {:.1} h over the {:.0} h ceiling",
                        tutor.name, workload.total_hours, excess, OVERLOADED_HOURS
                    ),
                    affected_resource_ids: std::iter::once(tutor.id.clone())
                        .chain(workload.session_ids.iter().cloned())
                        .collect(),
                });
            }
            WorkloadTier::Low => {
                let severity = if workload.total_hours < SEVERE_UNDERUSE_HOURS {
                    Severity::Medium
                } else {
                    Severity::Low
                };
                findings.push(Inefficiency {
                    kind: InefficiencyKind::UnderutilizedTutor,
                    severity,
                    description: format!(
                        "Tutor {} is scheduled for only {:.1} h/week (capacity up to {:.0} h)",
                        tutor.name, workload.total_hours, MEDIUM_HOURS
                    ),
                    affected_resource_ids: vec![tutor.id.clone()],
                });
            }
            _ => {}
        }
    }

    // Under-filled classes, in class id order
    for class in load_active_classes(store).await? {
        if class.max_students <= 0 {
            continue;
        }
        let enrolled = load_active_enrollments_for(store, &class.id).await?.len() as i64;
        let fill = enrolled as f64 / class.max_students as f64;
        if fill < UNDERFILL_THRESHOLD {
            let severity = if fill < 0.25 {
                Severity::High
            } else if fill < 0.4 {
                Severity::Medium
            } else {
                Severity::Low
            };
            findings.push(Inefficiency {
                kind: InefficiencyKind::InefficientGroupSize,
                severity,
                description: format!(
                    "Class {} has {} of {} seats filled ({:.0}%)",
                    class.name,
                    enrolled,
                    class.max_students,
                    fill * 100.0
                ),
                affected_resource_ids: vec![class.id.clone(), class.tutor_id.clone()],
            });
        }
    }

    // Scheduling conflicts: overlapping session windows for the same tutor
    for tutor in &tutors {
        let sessions = load_active_sessions_for(store, &tutor.id).await?;
        for (i, a) in sessions.iter().enumerate() {
            for b in &sessions[i + 1..] {
                if a.overlaps(b) {
                    findings.push(Inefficiency {
                        kind: InefficiencyKind::SchedulingConflict,
                        severity: Severity::High,
                        description: format!(
                            "Tutor {} has overlapping sessions at {} and {}",
                            tutor.name, a.scheduled_at, b.scheduled_at
                        ),
                        affected_resource_ids: vec![
                            tutor.id.clone(),
                            a.id.clone(),
                            b.id.clone(),
                        ],
                    });
                }
            }
        }
    }

    Ok(findings)
}
