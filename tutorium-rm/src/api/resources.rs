//! Management resource endpoints
//!
//! The four optimizer operations plus the workload overview, all behind
//! the management-role gate. Success bodies use the platform envelope
//! `{success: true, data, message?}`; failures map the shared error
//! taxonomy onto `{success: false, error}`.

use std::collections::BTreeSet;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;
use tutorium_common::Error;

use crate::api::auth::Caller;
use crate::optimizer::{
    self, apply_optimization, calculate_tutor_workload, generate_optimization_plan,
    identify_inefficiencies, manual_override, Constraints, Inefficiency, InefficiencyKind,
    ManualOverrideRequest, Severity, WorkloadTier,
};
use crate::AppState;
use tutorium_common::store::{collections, DocumentStore};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TutorSummary {
    pub tutor_id: String,
    pub name: String,
    pub total_hours: f64,
    pub tier: WorkloadTier,
    pub session_count: usize,
    pub class_count: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct TierCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub overloaded: usize,
}

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub tutor_count: usize,
    pub unique_student_count: usize,
    pub total_scheduled_hours: f64,
    pub workload_distribution: TierCounts,
    pub tutors: Vec<TutorSummary>,
}

#[derive(Debug, Deserialize)]
pub struct InefficiencyQuery {
    pub severity: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Serialize)]
pub struct InefficiencyResponse {
    pub inefficiencies: Vec<Inefficiency>,
    pub total: usize,
    pub counts: SeverityCounts,
}

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    #[serde(default)]
    pub focus_areas: Option<Vec<InefficiencyKind>>,
    #[serde(default)]
    pub constraints: Option<Constraints>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub plan_id: String,
    #[serde(default)]
    pub selected_changes: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/management/resources/overview
///
/// Workload summary across all active tutors plus the unique student count
/// and the workload tier distribution.
pub async fn get_overview(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let store = state.store.as_ref();
    let tutors = optimizer::load_active_tutors(store).await?;

    let mut summaries = Vec::with_capacity(tutors.len());
    let mut distribution = TierCounts::default();
    let mut total_scheduled_hours = 0.0;

    for tutor in &tutors {
        let workload = calculate_tutor_workload(store, &tutor.id).await?;
        total_scheduled_hours += workload.total_hours;
        match workload.tier {
            WorkloadTier::Low => distribution.low += 1,
            WorkloadTier::Medium => distribution.medium += 1,
            WorkloadTier::High => distribution.high += 1,
            WorkloadTier::Overloaded => distribution.overloaded += 1,
        }
        summaries.push(TutorSummary {
            tutor_id: workload.tutor_id,
            name: tutor.name.clone(),
            total_hours: workload.total_hours,
            tier: workload.tier,
            session_count: workload.session_ids.len(),
            class_count: workload.class_ids.len(),
        });
    }

    let unique_student_count = count_unique_students(store).await?;

    let response = OverviewResponse {
        tutor_count: tutors.len(),
        unique_student_count,
        total_scheduled_hours,
        workload_distribution: distribution,
        tutors: summaries,
    };
    Ok((StatusCode::OK, success(response)))
}

/// Distinct students with an active enrollment or an upcoming session,
/// verified against the user collection in one batched lookup
async fn count_unique_students(store: &dyn DocumentStore) -> Result<usize, Error> {
    let mut ids: BTreeSet<String> = BTreeSet::new();

    let enrollments = store
        .find(collections::ENROLLMENTS, &|doc| {
            doc.get("status").and_then(Value::as_str) == Some("active")
        })
        .await?;
    for doc in &enrollments {
        if let Some(id) = doc.get("student_id").and_then(Value::as_str) {
            ids.insert(id.to_string());
        }
    }

    let sessions = store
        .find(collections::SESSIONS, &|doc| {
            matches!(
                doc.get("status").and_then(Value::as_str),
                Some("scheduled") | Some("in_progress")
            )
        })
        .await?;
    for doc in &sessions {
        if let Some(id) = doc.get("student_id").and_then(Value::as_str) {
            ids.insert(id.to_string());
        }
    }

    let ids: Vec<String> = ids.into_iter().collect();
    let students = store.find_by_ids(collections::USERS, &ids).await?;
    Ok(students.len())
}

/// GET /api/management/resources/inefficiencies?severity=&type=
///
/// Detected inefficiencies filtered by the query parameters and sorted
/// high > medium > low, with counts over the returned set.
pub async fn get_inefficiencies(
    State(state): State<AppState>,
    Query(query): Query<InefficiencyQuery>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let severity = query
        .severity
        .as_deref()
        .map(|raw| {
            raw.parse::<Severity>()
                .map_err(|_| Error::InvalidInput(format!("Unknown severity: {}", raw)))
        })
        .transpose()?;
    let kind = query
        .kind
        .as_deref()
        .map(|raw| {
            raw.parse::<InefficiencyKind>()
                .map_err(|_| Error::InvalidInput(format!("Unknown inefficiency type: {}", raw)))
        })
        .transpose()?;

    let mut findings = identify_inefficiencies(state.store.as_ref()).await?;
    if let Some(severity) = severity {
        findings.retain(|f| f.severity == severity);
    }
    if let Some(kind) = kind {
        findings.retain(|f| f.kind == kind);
    }
    // Stable sort keeps detector emission order within each severity band
    findings.sort_by_key(|f| std::cmp::Reverse(f.severity));

    let count = |s: Severity| findings.iter().filter(|f| f.severity == s).count();
    let response = InefficiencyResponse {
        total: findings.len(),
        counts: SeverityCounts {
            high: count(Severity::High),
            medium: count(Severity::Medium),
            low: count(Severity::Low),
        },
        inefficiencies: findings,
    };
    Ok((StatusCode::OK, success(response)))
}

/// POST /api/management/resources/optimize
///
/// Generate and persist a new draft optimization plan.
pub async fn optimize(
    State(state): State<AppState>,
    Json(request): Json<OptimizeRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let plan = generate_optimization_plan(
        state.store.as_ref(),
        request.focus_areas,
        request.constraints,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        success_with_message(plan, "Optimization plan created"),
    ))
}

/// POST /api/management/resources/apply
///
/// File an approval request for the selected changes of a stored plan.
/// Nothing but the plan status and the new approval request is written.
pub async fn apply_plan(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if request.selected_changes.is_empty() {
        return Err(Error::InvalidInput("No changes selected".to_string()).into());
    }

    let approval = apply_optimization(
        state.store.as_ref(),
        &state.notifier,
        &caller.user_id,
        &request.plan_id,
        &request.selected_changes,
        request.description,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        success_with_message(approval, "Approval request filed"),
    ))
}

/// POST /api/management/resources/manual-override
///
/// Apply a single change immediately, bypassing the approval workflow.
pub async fn manual_override_change(
    State(state): State<AppState>,
    Json(request): Json<ManualOverrideRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let applied = manual_override(state.store.as_ref(), &state.notifier, request).await?;

    Ok((
        StatusCode::OK,
        success_with_message(applied, "Override applied"),
    ))
}

// ============================================================================
// Envelopes
// ============================================================================

fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({"success": true, "data": data}))
}

fn success_with_message<T: Serialize>(data: T, message: &str) -> Json<Value> {
    Json(json!({"success": true, "data": data, "message": message}))
}

/// HTTP projection of the shared error taxonomy
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, self.0.to_string()),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            Error::InvalidInput(_) | Error::NotImplemented(_) => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
