//! Optimization plan generation
//!
//! Maps detected inefficiencies onto concrete proposed changes. Given the
//! same store snapshot and the same inputs the generated change list is
//! identical in content and order, so plans stay auditable.

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use tutorium_common::store::models::{
    new_id, ChangeType, OptimizationChange, OptimizationPlan, PlanStatus, TutoringSession,
};
use tutorium_common::store::{collections, decode, DocumentStore};
use tutorium_common::Result;

use super::inefficiency::{identify_inefficiencies, Inefficiency, InefficiencyKind, Severity};
use super::{load_active_enrollments_for, load_active_sessions_for, load_active_tutors};

/// Seats added above current enrollment when shrinking an under-filled class
pub const GROUP_SIZE_BUFFER: i64 = 2;

/// Caller-supplied limits on plan generation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Constraints {
    /// Hard cap on the number of proposed changes
    #[serde(default)]
    pub max_changes: Option<usize>,
    /// Tutors that must not gain or lose sessions through reassignment
    #[serde(default)]
    pub excluded_tutor_ids: Vec<String>,
}

impl Constraints {
    fn excludes(&self, tutor_id: &str) -> bool {
        self.excluded_tutor_ids.iter().any(|id| id == tutor_id)
    }
}

/// Run the detector and turn its findings into a persisted draft plan
pub async fn generate_optimization_plan(
    store: &dyn DocumentStore,
    focus_areas: Option<Vec<InefficiencyKind>>,
    constraints: Option<Constraints>,
) -> Result<OptimizationPlan> {
    let constraints = constraints.unwrap_or_default();
    let findings = identify_inefficiencies(store).await?;

    // Reassignment targets come from the full scan even when the focus
    // filter drops the underutilized findings themselves
    let mut targets: Vec<String> = findings
        .iter()
        .filter(|f| f.kind == InefficiencyKind::UnderutilizedTutor)
        .filter_map(|f| f.affected_resource_ids.first().cloned())
        .filter(|id| !constraints.excludes(id))
        .collect();

    let retained: Vec<&Inefficiency> = match &focus_areas {
        Some(kinds) if !kinds.is_empty() => findings
            .iter()
            .filter(|f| kinds.contains(&f.kind))
            .collect(),
        _ => findings.iter().collect(),
    };

    let tutors = load_active_tutors(store).await?;
    let mut changes = Vec::new();

    for finding in &retained {
        if let Some(max) = constraints.max_changes {
            if changes.len() >= max {
                break;
            }
        }
        match finding.kind {
            InefficiencyKind::OverloadedTutor => {
                if let Some(change) =
                    plan_reallocation(store, finding, &targets, &tutors, &constraints).await?
                {
                    // Each target absorbs at most one reassignment per plan
                    if let Some(to) = change.to.as_ref().and_then(|v| v.as_str()) {
                        targets.retain(|id| id != to);
                    }
                    changes.push(change);
                }
            }
            // Underutilized tutors are reassignment targets, not standalone changes
            InefficiencyKind::UnderutilizedTutor => {}
            InefficiencyKind::InefficientGroupSize => {
                if let Some(change) = plan_group_resize(store, finding).await? {
                    changes.push(change);
                }
            }
            InefficiencyKind::SchedulingConflict => {
                if let Some(change) = plan_schedule_review(store, finding).await? {
                    changes.push(change);
                }
            }
        }
    }

    let plan = OptimizationPlan {
        id: new_id(),
        name: format!("Resource optimization plan ({} changes)", changes.len()),
        description: describe_scope(&findings, &changes),
        status: PlanStatus::Draft,
        changes,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    store
        .create(collections::OPTIMIZATION_PLANS, serde_json::to_value(&plan)?)
        .await?;
    info!("Generated optimization plan {} ({} changes)", plan.id, plan.changes.len());

    Ok(plan)
}

/// Move one session from an overloaded tutor to a compatible underutilized
/// tutor teaching the same subject. Returns None when no pairing exists.
async fn plan_reallocation(
    store: &dyn DocumentStore,
    finding: &Inefficiency,
    targets: &[String],
    tutors: &[tutorium_common::store::models::User],
    constraints: &Constraints,
) -> Result<Option<OptimizationChange>> {
    let Some(overloaded_id) = finding.affected_resource_ids.first() else {
        return Ok(None);
    };
    if constraints.excludes(overloaded_id) {
        return Ok(None);
    }

    let sessions = load_active_sessions_for(store, overloaded_id).await?;
    for session in &sessions {
        for target_id in targets {
            let teaches_subject = tutors
                .iter()
                .find(|t| &t.id == target_id)
                .is_some_and(|t| t.subjects.iter().any(|s| s == &session.subject));
            if target_id != overloaded_id && teaches_subject {
                return Ok(Some(OptimizationChange {
                    change_type: ChangeType::ReallocateSession,
                    resource_id: session.id.clone(),
                    from: Some(json!(overloaded_id)),
                    to: Some(json!(target_id)),
                    reason: format!(
                        "Rebalance workload: move {} session from overloaded tutor to {}",
                        session.subject, target_id
                    ),
                }));
            }
        }
    }

    Ok(None)
}

/// Shrink an under-filled class's seat cap to current enrollment plus a
/// small buffer
async fn plan_group_resize(
    store: &dyn DocumentStore,
    finding: &Inefficiency,
) -> Result<Option<OptimizationChange>> {
    let Some(class_id) = finding.affected_resource_ids.first() else {
        return Ok(None);
    };
    let Some(doc) = store.find_by_id(collections::CLASSES, class_id).await? else {
        warn!("Class {} vanished during plan generation", class_id);
        return Ok(None);
    };
    let Some(class) = decode::<tutorium_common::store::models::ClassGroup>(doc) else {
        return Ok(None);
    };

    let enrolled = load_active_enrollments_for(store, class_id).await?.len() as i64;
    Ok(Some(OptimizationChange {
        change_type: ChangeType::AdjustGroupSize,
        resource_id: class.id,
        from: Some(json!({
            "max_students": class.max_students,
            "current_students": enrolled,
        })),
        to: Some(json!({
            "max_students": enrolled + GROUP_SIZE_BUFFER,
            "current_students": enrolled,
        })),
        reason: format!(
            "Class is under-filled ({} of {} seats); right-size the group",
            enrolled, class.max_students
        ),
    }))
}

/// Flag a conflicting session for manual rescheduling. The replacement time
/// is deliberately left equal to the current time: choosing a new slot needs
/// calendar context this routine does not have.
async fn plan_schedule_review(
    store: &dyn DocumentStore,
    finding: &Inefficiency,
) -> Result<Option<OptimizationChange>> {
    // Conflict findings carry [tutor, first_session, second_session]; the
    // later session is the one proposed for a move
    let Some(session_id) = finding.affected_resource_ids.get(2) else {
        return Ok(None);
    };
    let Some(doc) = store.find_by_id(collections::SESSIONS, session_id).await? else {
        warn!("Session {} vanished during plan generation", session_id);
        return Ok(None);
    };
    let Some(session) = decode::<TutoringSession>(doc) else {
        return Ok(None);
    };

    let at = json!(session.scheduled_at);
    Ok(Some(OptimizationChange {
        change_type: ChangeType::ModifySchedule,
        resource_id: session.id,
        from: Some(at.clone()),
        to: Some(at),
        reason: "Session overlaps another booking for the same tutor; needs a new time slot \
                 (manual follow-up)"
            .to_string(),
    }))
}

fn describe_scope(findings: &[Inefficiency], changes: &[OptimizationChange]) -> String {
    let count_severity =
        |s: Severity| findings.iter().filter(|f| f.severity == s).count();
    let count_type =
        |t: ChangeType| changes.iter().filter(|c| c.change_type == t).count();

    format!(
        "Addresses {} detected finding(s) ({} high, {} medium, {} low severity) with \
         {} session reallocation(s), {} group size adjustment(s), {} schedule review(s)",
        findings.len(),
        count_severity(Severity::High),
        count_severity(Severity::Medium),
        count_severity(Severity::Low),
        count_type(ChangeType::ReallocateSession),
        count_type(ChangeType::AdjustGroupSize),
        count_type(ChangeType::ModifySchedule),
    )
}
