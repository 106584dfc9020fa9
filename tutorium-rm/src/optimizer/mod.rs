//! Resource allocation optimizer
//!
//! Batch analytics over the platform's scheduling data, decomposed into
//! four stages: per-tutor workload aggregation, inefficiency detection,
//! optimization plan generation, and the approval-gated change applier.
//! All stages read through the injected [`DocumentStore`] and tolerate
//! partially-decodable collections by skipping bad records.

use serde_json::Value;
use tutorium_common::store::models::{ClassGroup, ClassStatus, Enrollment, TutoringSession, User};
use tutorium_common::store::{collections, decode_all, DocumentStore};
use tutorium_common::Result;

pub mod apply;
pub mod inefficiency;
pub mod plan;
pub mod workload;

pub use apply::{apply_optimization, manual_override, ManualOverrideRequest};
pub use inefficiency::{identify_inefficiencies, Inefficiency, InefficiencyKind, Severity};
pub use plan::{generate_optimization_plan, Constraints};
pub use workload::{calculate_tutor_workload, TutorWorkload, WorkloadTier};

fn value_str<'a>(doc: &'a Value, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str)
}

/// Active tutors, sorted by id for deterministic scans
pub(crate) async fn load_active_tutors(store: &dyn DocumentStore) -> Result<Vec<User>> {
    let docs = store
        .find(collections::USERS, &|doc| {
            value_str(doc, "role") == Some("tutor")
        })
        .await?;
    let mut tutors: Vec<User> = decode_all(docs);
    tutors.retain(|t| t.active);
    tutors.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(tutors)
}

/// Scheduled or in-progress sessions for one tutor, sorted by start time
pub(crate) async fn load_active_sessions_for(
    store: &dyn DocumentStore,
    tutor_id: &str,
) -> Result<Vec<TutoringSession>> {
    let docs = store
        .find(collections::SESSIONS, &|doc| {
            value_str(doc, "tutor_id") == Some(tutor_id)
        })
        .await?;
    let mut sessions: Vec<TutoringSession> = decode_all(docs);
    sessions.retain(|s| s.status.is_active());
    sessions.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));
    Ok(sessions)
}

/// Active classes taught by one tutor, sorted by id
pub(crate) async fn load_active_classes_for(
    store: &dyn DocumentStore,
    tutor_id: &str,
) -> Result<Vec<ClassGroup>> {
    let docs = store
        .find(collections::CLASSES, &|doc| {
            value_str(doc, "tutor_id") == Some(tutor_id)
        })
        .await?;
    let mut classes: Vec<ClassGroup> = decode_all(docs);
    classes.retain(|c| matches!(c.status, ClassStatus::Active));
    classes.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(classes)
}

/// All active classes, sorted by id
pub(crate) async fn load_active_classes(store: &dyn DocumentStore) -> Result<Vec<ClassGroup>> {
    let docs = store
        .find(collections::CLASSES, &|doc| {
            value_str(doc, "status") == Some("active")
        })
        .await?;
    let mut classes: Vec<ClassGroup> = decode_all(docs);
    classes.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(classes)
}

/// Active enrollments for one class
pub(crate) async fn load_active_enrollments_for(
    store: &dyn DocumentStore,
    class_id: &str,
) -> Result<Vec<Enrollment>> {
    let docs = store
        .find(collections::ENROLLMENTS, &|doc| {
            value_str(doc, "class_id") == Some(class_id)
                && value_str(doc, "status") == Some("active")
        })
        .await?;
    Ok(decode_all(docs))
}
