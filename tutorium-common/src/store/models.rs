//! Persisted document models
//!
//! Typed views over the platform's JSON collections. Documents are decoded
//! with [`decode_all`](super::decode_all), so records written by older
//! platform versions that no longer fit the schema are skipped, not fatal.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a fresh document id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Tutor,
    Management,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Subjects taught (tutors) or studied (students)
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// Scheduled and in-progress sessions count toward workload and
    /// participate in conflict detection
    pub fn is_active(self) -> bool {
        matches!(self, SessionStatus::Scheduled | SessionStatus::InProgress)
    }
}

/// A one-on-one tutoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutoringSession {
    pub id: String,
    pub tutor_id: String,
    pub student_id: String,
    pub subject: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: SessionStatus,
}

impl TutoringSession {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes)
    }

    /// Whether two sessions occupy overlapping time windows
    pub fn overlaps(&self, other: &TutoringSession) -> bool {
        self.scheduled_at < other.ends_at() && other.scheduled_at < self.ends_at()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassStatus {
    Active,
    Archived,
}

/// A recurring group class taught by one tutor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassGroup {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub tutor_id: String,
    pub max_students: i64,
    pub sessions_per_week: i64,
    pub session_minutes: i64,
    pub status: ClassStatus,
}

impl ClassGroup {
    /// Scheduled teaching minutes per week for this class
    pub fn weekly_minutes(&self) -> i64 {
        self.sessions_per_week * self.session_minutes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Withdrawn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    ReallocateSession,
    ReallocateStudent,
    AdjustGroupSize,
    ModifySchedule,
}

/// One proposed mutation inside an optimization plan.
///
/// Immutable once part of a stored plan; `from`/`to` are loose JSON because
/// their shape depends on the change type (tutor ids for reallocation,
/// `{max_students, current_students}` objects for group sizing, timestamps
/// for schedule changes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationChange {
    pub change_type: ChangeType,
    pub resource_id: String,
    #[serde(default)]
    pub from: Option<serde_json::Value>,
    #[serde(default)]
    pub to: Option<serde_json::Value>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Applied,
}

/// Plan lifecycle: draft -> pending (apply filed) -> approved/rejected
/// (management decision) -> applied (execution, outside this service)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationPlan {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: PlanStatus,
    pub changes: Vec<OptimizationChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// Ids and translated changes embedded in a resource-allocation approval
/// request. The affected id sets cover every id the changes touch so the
/// approval UI can show blast radius without re-deriving it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAllocationData {
    pub optimization_plan_id: String,
    pub changes: Vec<OptimizationChange>,
    pub affected_tutor_ids: Vec<String>,
    pub affected_session_ids: Vec<String>,
    pub affected_student_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    /// Always "resource_allocation" for requests filed by this service
    pub request_type: String,
    pub requester_id: String,
    /// The optimization plan this request gates
    pub target_id: String,
    pub title: String,
    pub description: String,
    pub status: ApprovalStatus,
    pub priority: String,
    pub deadline: DateTime<Utc>,
    pub resource_allocation: ResourceAllocationData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const APPROVAL_TYPE_RESOURCE_ALLOCATION: &str = "resource_allocation";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}
