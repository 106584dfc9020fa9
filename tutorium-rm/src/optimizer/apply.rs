//! Change application: approval bridge and manual override
//!
//! `apply_optimization` never mutates scheduling records itself. It
//! translates the selected plan changes against current store state, files
//! a management approval request with a 48 hour deadline, and flips the
//! plan to pending; the actual mutations happen once another management
//! user approves. `manual_override` is the privileged escape hatch that
//! applies a single vetted change immediately.
//!
//! Two concurrent applies against the same plan can both file approval
//! requests; there is no idempotency key. The store only serializes the
//! individual document writes.

use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use tutorium_common::notify::Notifier;
use tutorium_common::store::models::{
    new_id, ApprovalRequest, ApprovalStatus, ChangeType, ClassGroup, Enrollment,
    OptimizationChange, OptimizationPlan, ResourceAllocationData, TutoringSession, User,
    APPROVAL_TYPE_RESOURCE_ALLOCATION,
};
use tutorium_common::store::{collections, decode, decode_all, DocumentStore};
use tutorium_common::{Error, Result};

use super::load_active_enrollments_for;
use super::plan::GROUP_SIZE_BUFFER;

/// Hours a filed approval request stays open before the deadline lapses
const APPROVAL_DEADLINE_HOURS: i64 = 48;
/// Surviving-change count at which a request is filed as high priority
const HIGH_PRIORITY_CHANGES: usize = 4;

/// Changes translated against current store state plus the id sets they touch
struct TranslatedChanges {
    changes: Vec<OptimizationChange>,
    tutor_ids: BTreeSet<String>,
    session_ids: BTreeSet<String>,
    student_ids: BTreeSet<String>,
}

impl TranslatedChanges {
    fn new() -> Self {
        Self {
            changes: Vec::new(),
            tutor_ids: BTreeSet::new(),
            session_ids: BTreeSet::new(),
            student_ids: BTreeSet::new(),
        }
    }
}

/// File an approval request for the selected changes of a stored plan.
///
/// Fails NotFound for an unknown plan and InvalidInput when the selection
/// matches nothing or nothing survives translation. Changes whose resource
/// no longer resolves against the store are dropped, not fatal.
pub async fn apply_optimization(
    store: &dyn DocumentStore,
    notifier: &Notifier,
    requester_id: &str,
    plan_id: &str,
    selected_change_resource_ids: &[String],
    description: Option<String>,
) -> Result<ApprovalRequest> {
    let Some(doc) = store
        .find_by_id(collections::OPTIMIZATION_PLANS, plan_id)
        .await?
    else {
        return Err(Error::NotFound(format!("Optimization plan {}", plan_id)));
    };
    let plan: OptimizationPlan = serde_json::from_value(doc)?;

    let selected: Vec<&OptimizationChange> = plan
        .changes
        .iter()
        .filter(|c| selected_change_resource_ids.iter().any(|id| id == &c.resource_id))
        .collect();
    if selected.is_empty() {
        return Err(Error::InvalidInput(
            "Selected changes match nothing in the plan".to_string(),
        ));
    }

    let mut translated = TranslatedChanges::new();
    for change in selected {
        match translate_change(store, change).await? {
            Some(resolved) => resolved.collect_into(&mut translated),
            None => warn!(
                "Dropping unresolvable change {:?} on {}",
                change.change_type, change.resource_id
            ),
        }
    }
    if translated.changes.is_empty() {
        return Err(Error::InvalidInput(
            "No selected change could be resolved against current data".to_string(),
        ));
    }

    let priority = if translated.changes.len() >= HIGH_PRIORITY_CHANGES {
        "high"
    } else {
        "medium"
    };
    let now = Utc::now();
    let request = ApprovalRequest {
        id: new_id(),
        request_type: APPROVAL_TYPE_RESOURCE_ALLOCATION.to_string(),
        requester_id: requester_id.to_string(),
        target_id: plan.id.clone(),
        title: format!("Resource allocation: {}", plan.name),
        description: description.unwrap_or_else(|| {
            format!(
                "{} change(s) from plan {} awaiting management approval",
                translated.changes.len(),
                plan.name
            )
        }),
        status: ApprovalStatus::Pending,
        priority: priority.to_string(),
        deadline: now + Duration::hours(APPROVAL_DEADLINE_HOURS),
        resource_allocation: ResourceAllocationData {
            optimization_plan_id: plan.id.clone(),
            changes: translated.changes,
            affected_tutor_ids: translated.tutor_ids.into_iter().collect(),
            affected_session_ids: translated.session_ids.into_iter().collect(),
            affected_student_ids: translated.student_ids.into_iter().collect(),
        },
        created_at: now,
        updated_at: now,
    };

    store
        .create(
            collections::APPROVAL_REQUESTS,
            serde_json::to_value(&request)?,
        )
        .await?;
    store
        .update(
            collections::OPTIMIZATION_PLANS,
            &plan.id,
            json!({"status": "pending", "updated_at": now}),
        )
        .await?;

    notify_management(store, notifier, requester_id, &request).await?;
    info!(
        "Filed approval request {} for plan {} ({} changes)",
        request.id,
        plan.id,
        request.resource_allocation.changes.len()
    );

    Ok(request)
}

/// One translated change plus the ids it touches
struct ResolvedChange {
    change: OptimizationChange,
    tutor_ids: Vec<String>,
    session_ids: Vec<String>,
    student_ids: Vec<String>,
}

impl ResolvedChange {
    fn collect_into(self, out: &mut TranslatedChanges) {
        out.changes.push(self.change);
        out.tutor_ids.extend(self.tutor_ids);
        out.session_ids.extend(self.session_ids);
        out.student_ids.extend(self.student_ids);
    }
}

/// Re-read current store state and produce the concrete from/to pair for
/// one selected change. Returns None when the referenced record no longer
/// resolves.
async fn translate_change(
    store: &dyn DocumentStore,
    change: &OptimizationChange,
) -> Result<Option<ResolvedChange>> {
    match change.change_type {
        ChangeType::ReallocateSession => {
            let Some(session) = fetch_session(store, &change.resource_id).await? else {
                return Ok(None);
            };
            let Some(target) = change.to.as_ref().and_then(|v| v.as_str()) else {
                return Ok(None);
            };
            let target = target.to_string();
            let current_tutor = session.tutor_id.clone();
            Ok(Some(ResolvedChange {
                change: OptimizationChange {
                    change_type: ChangeType::ReallocateSession,
                    resource_id: session.id.clone(),
                    from: Some(json!(current_tutor)),
                    to: Some(json!(target)),
                    reason: change.reason.clone(),
                },
                tutor_ids: vec![session.tutor_id, target],
                session_ids: vec![session.id],
                student_ids: vec![session.student_id],
            }))
        }
        ChangeType::ReallocateStudent => {
            let Some(enrollment) =
                fetch_active_enrollment(store, &change.resource_id, None).await?
            else {
                return Ok(None);
            };
            let Some(target) = change.to.as_ref().and_then(|v| v.as_str()) else {
                return Ok(None);
            };
            Ok(Some(ResolvedChange {
                change: OptimizationChange {
                    change_type: ChangeType::ReallocateStudent,
                    resource_id: change.resource_id.clone(),
                    from: Some(json!(enrollment.class_id)),
                    to: Some(json!(target)),
                    reason: change.reason.clone(),
                },
                tutor_ids: Vec::new(),
                session_ids: Vec::new(),
                student_ids: vec![enrollment.student_id],
            }))
        }
        ChangeType::AdjustGroupSize => {
            let Some(class) = fetch_class(store, &change.resource_id).await? else {
                return Ok(None);
            };
            let enrollments = load_active_enrollments_for(store, &class.id).await?;
            let enrolled = enrollments.len() as i64;
            let new_max = (enrolled + GROUP_SIZE_BUFFER).max(class.max_students);
            Ok(Some(ResolvedChange {
                change: OptimizationChange {
                    change_type: ChangeType::AdjustGroupSize,
                    resource_id: class.id.clone(),
                    from: Some(json!({
                        "max_students": class.max_students,
                        "current_students": enrolled,
                    })),
                    to: Some(json!({
                        "max_students": new_max,
                        "current_students": enrolled,
                    })),
                    reason: change.reason.clone(),
                },
                tutor_ids: vec![class.tutor_id],
                session_ids: Vec::new(),
                student_ids: enrollments.into_iter().map(|e| e.student_id).collect(),
            }))
        }
        ChangeType::ModifySchedule => {
            let Some(session) = fetch_session(store, &change.resource_id).await? else {
                return Ok(None);
            };
            // Placeholder translation: the replacement slot is chosen manually
            let at = json!(session.scheduled_at);
            Ok(Some(ResolvedChange {
                change: OptimizationChange {
                    change_type: ChangeType::ModifySchedule,
                    resource_id: session.id.clone(),
                    from: Some(at.clone()),
                    to: Some(at),
                    reason: change.reason.clone(),
                },
                tutor_ids: vec![session.tutor_id.clone()],
                session_ids: vec![session.id],
                student_ids: vec![session.student_id],
            }))
        }
    }
}

/// Notify every management user except the requester that an approval is
/// waiting. Notification failures never fail the apply call.
async fn notify_management(
    store: &dyn DocumentStore,
    notifier: &Notifier,
    requester_id: &str,
    request: &ApprovalRequest,
) -> Result<()> {
    let docs = store
        .find(collections::USERS, &|doc| {
            doc.get("role").and_then(serde_json::Value::as_str) == Some("management")
        })
        .await?;
    let managers: Vec<User> = decode_all(docs);

    for manager in managers.iter().filter(|m| m.active && m.id != requester_id) {
        notifier
            .notify(
                &manager.id,
                "approval_request",
                "Resource allocation approval needed",
                &format!(
                    "{} (deadline {})",
                    request.title,
                    request.deadline.format("%Y-%m-%d %H:%M UTC")
                ),
            )
            .await;
    }
    Ok(())
}

/// A single immediately-applied change, bypassing the approval workflow
#[derive(Debug, Clone, Deserialize)]
pub struct ManualOverrideRequest {
    pub change_type: ChangeType,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    pub resource_id: String,
    pub reason: String,
}

/// Apply one change right now. The caller is assumed to have vetted it;
/// no confirmation step exists. Plan status is never touched since the
/// override operates outside any plan.
pub async fn manual_override(
    store: &dyn DocumentStore,
    notifier: &Notifier,
    request: ManualOverrideRequest,
) -> Result<OptimizationChange> {
    let (applied, recipient) = match request.change_type {
        ChangeType::ReallocateSession => {
            let target = require_target(&request)?.to_string();
            let Some(session) = fetch_session(store, &request.resource_id).await? else {
                return Err(Error::NotFound(format!("Session {}", request.resource_id)));
            };
            store
                .update(
                    collections::SESSIONS,
                    &session.id,
                    json!({"tutor_id": target}),
                )
                .await?;
            let applied = OptimizationChange {
                change_type: ChangeType::ReallocateSession,
                resource_id: session.id,
                from: Some(json!(session.tutor_id)),
                to: Some(json!(target)),
                reason: request.reason.clone(),
            };
            (applied, target)
        }
        ChangeType::ReallocateStudent => {
            let target = require_target(&request)?.to_string();
            let Some(enrollment) =
                fetch_active_enrollment(store, &request.resource_id, request.from.as_deref())
                    .await?
            else {
                return Err(Error::NotFound(format!(
                    "Active enrollment for student {}",
                    request.resource_id
                )));
            };
            store
                .update(
                    collections::ENROLLMENTS,
                    &enrollment.id,
                    json!({"class_id": target}),
                )
                .await?;
            let applied = OptimizationChange {
                change_type: ChangeType::ReallocateStudent,
                resource_id: request.resource_id.clone(),
                from: Some(json!(enrollment.class_id)),
                to: Some(json!(target)),
                reason: request.reason.clone(),
            };
            (applied, target)
        }
        ChangeType::AdjustGroupSize => {
            let Some(class) = fetch_class(store, &request.resource_id).await? else {
                return Err(Error::NotFound(format!("Class {}", request.resource_id)));
            };
            let enrolled = load_active_enrollments_for(store, &class.id).await?.len() as i64;
            let new_max = (enrolled + GROUP_SIZE_BUFFER).max(class.max_students);
            store
                .update(
                    collections::CLASSES,
                    &class.id,
                    json!({"max_students": new_max}),
                )
                .await?;
            // The class tutor hears about the resize; there is no target user
            let recipient = class.tutor_id.clone();
            let applied = OptimizationChange {
                change_type: ChangeType::AdjustGroupSize,
                resource_id: class.id,
                from: Some(json!(class.max_students)),
                to: Some(json!(new_max)),
                reason: request.reason.clone(),
            };
            (applied, recipient)
        }
        ChangeType::ModifySchedule => {
            // The override signature carries no replacement time, so this
            // remains unimplemented rather than guessing a slot
            return Err(Error::NotImplemented(
                "Schedule modification requires a replacement time".to_string(),
            ));
        }
    };

    notifier
        .notify(
            &recipient,
            "resource_override",
            "Resource allocation override applied",
            &format!(
                "{:?} on {}: {}",
                applied.change_type, applied.resource_id, applied.reason
            ),
        )
        .await;
    info!(
        "Manual override applied: {:?} on {}",
        applied.change_type, applied.resource_id
    );

    Ok(applied)
}

fn require_target(request: &ManualOverrideRequest) -> Result<&str> {
    request
        .to
        .as_deref()
        .ok_or_else(|| Error::InvalidInput("Missing target (to) for override".to_string()))
}

async fn fetch_session(
    store: &dyn DocumentStore,
    id: &str,
) -> Result<Option<TutoringSession>> {
    Ok(store
        .find_by_id(collections::SESSIONS, id)
        .await?
        .and_then(decode::<TutoringSession>))
}

async fn fetch_class(store: &dyn DocumentStore, id: &str) -> Result<Option<ClassGroup>> {
    Ok(store
        .find_by_id(collections::CLASSES, id)
        .await?
        .and_then(decode::<ClassGroup>))
}

/// The student's active enrollment, optionally constrained to a source class
async fn fetch_active_enrollment(
    store: &dyn DocumentStore,
    student_id: &str,
    class_id: Option<&str>,
) -> Result<Option<Enrollment>> {
    let docs = store
        .find(collections::ENROLLMENTS, &|doc| {
            doc.get("student_id").and_then(serde_json::Value::as_str) == Some(student_id)
                && doc.get("status").and_then(serde_json::Value::as_str) == Some("active")
        })
        .await?;
    let enrollments: Vec<Enrollment> = decode_all(docs);
    Ok(enrollments
        .into_iter()
        .find(|e| class_id.map_or(true, |c| e.class_id == c)))
}
