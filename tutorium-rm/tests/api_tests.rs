//! Integration tests for tutorium-rm API endpoints
//!
//! Drives the real router over an in-memory store, covering:
//! - Health endpoint (no role required)
//! - Management role gate on every resource endpoint
//! - Workload overview shape
//! - Inefficiency listing, filtering, and sorting
//! - Plan generation, the apply/approval bridge, and manual override

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot` method
use tutorium_common::store::{collections, DocumentStore, MemoryStore};
use tutorium_rm::{build_router, AppState};

/// Test helper: in-memory store seeded with a small campus
async fn setup_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .seed(
            collections::USERS,
            vec![
                json!({
                    "id": "mgr_1", "name": "Morgan", "email": "morgan@tutorium.test",
                    "role": "management", "subjects": [], "active": true
                }),
                json!({
                    "id": "mgr_2", "name": "Robin", "email": "robin@tutorium.test",
                    "role": "management", "subjects": [], "active": true
                }),
                json!({
                    "id": "stu_1", "name": "Sam", "email": "sam@tutorium.test",
                    "role": "student", "subjects": ["math"], "active": true
                }),
                json!({
                    "id": "stu_2", "name": "Ade", "email": "ade@tutorium.test",
                    "role": "student", "subjects": ["math"], "active": true
                }),
                json!({
                    "id": "tut_busy", "name": "Blake", "email": "blake@tutorium.test",
                    "role": "tutor", "subjects": ["math"], "active": true
                }),
                json!({
                    "id": "tut_idle", "name": "Indra", "email": "indra@tutorium.test",
                    "role": "tutor", "subjects": ["math"], "active": true
                }),
            ],
        )
        .await;
    store
        .seed(
            collections::SESSIONS,
            vec![
                json!({
                    "id": "ses_1", "tutor_id": "tut_busy", "student_id": "stu_1",
                    "subject": "math", "scheduled_at": "2026-03-02T08:00:00Z",
                    "duration_minutes": 1380, "status": "scheduled"
                }),
                json!({
                    "id": "ses_2", "tutor_id": "tut_busy", "student_id": "stu_2",
                    "subject": "math", "scheduled_at": "2026-03-04T08:00:00Z",
                    "duration_minutes": 1380, "status": "scheduled"
                }),
                json!({
                    "id": "ses_9", "tutor_id": "tut_busy", "student_id": "stu_1",
                    "subject": "math", "scheduled_at": "2026-03-06T10:00:00Z",
                    "duration_minutes": 60, "status": "scheduled"
                }),
            ],
        )
        .await;
    store
        .seed(
            collections::CLASSES,
            vec![json!({
                "id": "cls_1", "name": "Algebra", "subject": "math",
                "tutor_id": "tut_idle", "max_students": 10,
                "sessions_per_week": 1, "session_minutes": 60,
                "status": "active"
            })],
        )
        .await;
    store
        .seed(
            collections::ENROLLMENTS,
            vec![
                json!({
                    "id": "enr_1", "student_id": "stu_1", "class_id": "cls_1",
                    "status": "active", "enrolled_at": "2026-01-05T00:00:00Z"
                }),
                json!({
                    "id": "enr_2", "student_id": "stu_2", "class_id": "cls_1",
                    "status": "active", "enrolled_at": "2026-01-06T00:00:00Z"
                }),
                json!({
                    "id": "enr_3", "student_id": "stu_3", "class_id": "cls_1",
                    "status": "active", "enrolled_at": "2026-01-07T00:00:00Z"
                }),
            ],
        )
        .await;
    store
        .seed(
            collections::OPTIMIZATION_PLANS,
            vec![json!({
                "id": "plan_1",
                "name": "Resource optimization plan (2 changes)",
                "description": "seeded fixture",
                "status": "draft",
                "changes": [
                    {
                        "change_type": "adjust_group_size",
                        "resource_id": "cls_1",
                        "from": null, "to": null,
                        "reason": "low fill"
                    },
                    {
                        "change_type": "reallocate_session",
                        "resource_id": "ses_9",
                        "from": "tut_busy", "to": "tut_idle",
                        "reason": "rebalance"
                    }
                ],
                "created_at": "2026-03-01T00:00:00Z",
                "updated_at": "2026-03-01T00:00:00Z"
            })],
        )
        .await;
    store
}

/// Test helper: app over a seeded store
fn setup_app(store: Arc<MemoryStore>) -> axum::Router {
    build_router(AppState::new(store))
}

/// Test helper: GET request as a given user
fn get_as(user_id: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-user-id", user_id)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: POST request with JSON body as a given user
fn post_as(user_id: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", user_id)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_role_required() {
    let app = setup_app(setup_store().await);

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "tutorium-rm");
    assert!(body["version"].is_string());
}

// =============================================================================
// Role Gate Tests
// =============================================================================

#[tokio::test]
async fn test_non_management_callers_get_403_everywhere() {
    let store = setup_store().await;

    let requests: Vec<Request<Body>> = vec![
        get_as("stu_1", "/api/management/resources/overview"),
        get_as("tut_busy", "/api/management/resources/inefficiencies"),
        post_as("stu_1", "/api/management/resources/optimize", json!({})),
        post_as(
            "tut_busy",
            "/api/management/resources/apply",
            json!({"plan_id": "plan_1", "selected_changes": ["ses_9"]}),
        ),
        post_as(
            "stu_1",
            "/api/management/resources/manual-override",
            json!({
                "change_type": "reallocate_session",
                "to": "tut_idle", "resource_id": "ses_9", "reason": "nope"
            }),
        ),
    ];

    for request in requests {
        let app = setup_app(store.clone());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = extract_json(response.into_body()).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    // No state change leaked through the gate
    assert!(store
        .find_all(collections::APPROVAL_REQUESTS)
        .await
        .unwrap()
        .is_empty());
    let session = store
        .find_by_id(collections::SESSIONS, "ses_9")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session["tutor_id"], "tut_busy");
}

#[tokio::test]
async fn test_missing_user_header_is_403() {
    let app = setup_app(setup_store().await);

    let request = Request::builder()
        .method("GET")
        .uri("/api/management/resources/overview")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Overview Tests
// =============================================================================

#[tokio::test]
async fn test_overview_reports_workloads_and_distribution() {
    let app = setup_app(setup_store().await);

    let response = app
        .oneshot(get_as("mgr_1", "/api/management/resources/overview"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["tutor_count"], 2);
    // stu_3 has an enrollment but no user record, so only stu_1 and stu_2 count
    assert_eq!(data["unique_student_count"], 2);
    assert_eq!(data["workload_distribution"]["overloaded"], 1);
    assert_eq!(data["workload_distribution"]["low"], 1);
    assert_eq!(data["tutors"].as_array().unwrap().len(), 2);
}

// =============================================================================
// Inefficiency Listing Tests
// =============================================================================

#[tokio::test]
async fn test_inefficiencies_sorted_high_to_low() {
    let app = setup_app(setup_store().await);

    let response = app
        .oneshot(get_as("mgr_1", "/api/management/resources/inefficiencies"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let findings = body["data"]["inefficiencies"].as_array().unwrap();
    assert!(!findings.is_empty());

    let rank = |s: &str| match s {
        "high" => 2,
        "medium" => 1,
        _ => 0,
    };
    let severities: Vec<i32> = findings
        .iter()
        .map(|f| rank(f["severity"].as_str().unwrap()))
        .collect();
    let mut sorted = severities.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(severities, sorted);

    let counts = &body["data"]["counts"];
    let total = counts["high"].as_u64().unwrap()
        + counts["medium"].as_u64().unwrap()
        + counts["low"].as_u64().unwrap();
    assert_eq!(total, findings.len() as u64);
}

#[tokio::test]
async fn test_severity_filter_returns_only_that_severity() {
    let store = setup_store().await;

    let app = setup_app(store.clone());
    let response = app
        .oneshot(get_as(
            "mgr_1",
            "/api/management/resources/inefficiencies?severity=high",
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    let high = body["data"]["inefficiencies"].as_array().unwrap().clone();
    assert!(high.iter().all(|f| f["severity"] == "high"));

    // Union of the three severity-filtered subsets equals the unfiltered set
    let mut union = 0;
    for severity in ["high", "medium", "low"] {
        let app = setup_app(store.clone());
        let response = app
            .oneshot(get_as(
                "mgr_1",
                &format!("/api/management/resources/inefficiencies?severity={severity}"),
            ))
            .await
            .unwrap();
        let body = extract_json(response.into_body()).await;
        union += body["data"]["inefficiencies"].as_array().unwrap().len();
    }
    let app = setup_app(store.clone());
    let response = app
        .oneshot(get_as("mgr_1", "/api/management/resources/inefficiencies"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(
        union,
        body["data"]["inefficiencies"].as_array().unwrap().len()
    );
}

#[tokio::test]
async fn test_type_filter_and_invalid_values() {
    let store = setup_store().await;

    let app = setup_app(store.clone());
    let response = app
        .oneshot(get_as(
            "mgr_1",
            "/api/management/resources/inefficiencies?type=scheduling_conflict",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert!(body["data"]["inefficiencies"]
        .as_array()
        .unwrap()
        .iter()
        .all(|f| f["kind"] == "scheduling_conflict"));

    let app = setup_app(store);
    let response = app
        .oneshot(get_as(
            "mgr_1",
            "/api/management/resources/inefficiencies?severity=catastrophic",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
}

// =============================================================================
// Plan Generation Tests
// =============================================================================

#[tokio::test]
async fn test_optimize_creates_draft_plan() {
    let store = setup_store().await;
    let app = setup_app(store.clone());

    let response = app
        .oneshot(post_as(
            "mgr_1",
            "/api/management/resources/optimize",
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    let plan = &body["data"];
    assert_eq!(plan["status"], "draft");
    assert!(!plan["changes"].as_array().unwrap().is_empty());

    let stored = store
        .find_by_id(collections::OPTIMIZATION_PLANS, plan["id"].as_str().unwrap())
        .await
        .unwrap();
    assert!(stored.is_some());
}

// =============================================================================
// Apply / Approval Bridge Tests
// =============================================================================

#[tokio::test]
async fn test_apply_unknown_plan_is_404() {
    let app = setup_app(setup_store().await);

    let response = app
        .oneshot(post_as(
            "mgr_1",
            "/api/management/resources/apply",
            json!({"plan_id": "plan_missing", "selected_changes": ["ses_9"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_apply_empty_selection_is_400_and_files_nothing() {
    let store = setup_store().await;

    for selected in [json!([]), json!(["not_in_plan"])] {
        let app = setup_app(store.clone());
        let response = app
            .oneshot(post_as(
                "mgr_1",
                "/api/management/resources/apply",
                json!({"plan_id": "plan_1", "selected_changes": selected}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = extract_json(response.into_body()).await;
        assert_eq!(body["success"], false);
    }

    assert!(store
        .find_all(collections::APPROVAL_REQUESTS)
        .await
        .unwrap()
        .is_empty());
    let plan = store
        .find_by_id(collections::OPTIMIZATION_PLANS, "plan_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(plan["status"], "draft");
}

#[tokio::test]
async fn test_apply_success_files_approval_and_flips_plan() {
    let store = setup_store().await;
    let app = setup_app(store.clone());

    let response = app
        .oneshot(post_as(
            "mgr_1",
            "/api/management/resources/apply",
            json!({
                "plan_id": "plan_1",
                "selected_changes": ["cls_1", "ses_9"],
                "description": "week 10 rebalance"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = extract_json(response.into_body()).await;
    let approval = &body["data"];
    assert_eq!(approval["request_type"], "resource_allocation");
    assert_eq!(approval["status"], "pending");
    assert_eq!(approval["target_id"], "plan_1");
    assert_eq!(approval["requester_id"], "mgr_1");
    assert_eq!(approval["description"], "week 10 rebalance");

    let data = &approval["resource_allocation"];
    // 3 enrolled in a 10 seat class: max(3+2, 10) keeps the cap at 10
    let resize = &data["changes"][0];
    assert_eq!(resize["from"], json!({"max_students": 10, "current_students": 3}));
    assert_eq!(resize["to"], json!({"max_students": 10, "current_students": 3}));

    // Session ids of reallocation changes appear in the affected set
    let affected_sessions = data["affected_session_ids"].as_array().unwrap();
    assert!(affected_sessions.contains(&json!("ses_9")));
    assert!(data["affected_tutor_ids"]
        .as_array()
        .unwrap()
        .contains(&json!("tut_idle")));

    // Plan flipped to pending, scheduling records untouched
    let plan = store
        .find_by_id(collections::OPTIMIZATION_PLANS, "plan_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(plan["status"], "pending");
    let session = store
        .find_by_id(collections::SESSIONS, "ses_9")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session["tutor_id"], "tut_busy");

    // The other management user was notified, not the requester
    let notifications = store.find_all(collections::NOTIFICATIONS).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["user_id"], "mgr_2");
}

// =============================================================================
// Manual Override Tests
// =============================================================================

#[tokio::test]
async fn test_manual_override_reassigns_session() {
    let store = setup_store().await;
    let app = setup_app(store.clone());

    let response = app
        .oneshot(post_as(
            "mgr_1",
            "/api/management/resources/manual-override",
            json!({
                "change_type": "reallocate_session",
                "to": "tut_idle",
                "resource_id": "ses_9",
                "reason": "rebalance"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["from"], "tut_busy");
    assert_eq!(body["data"]["to"], "tut_idle");

    let session = store
        .find_by_id(collections::SESSIONS, "ses_9")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session["tutor_id"], "tut_idle");

    let notifications = store.find_all(collections::NOTIFICATIONS).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["user_id"], "tut_idle");
}

#[tokio::test]
async fn test_manual_override_schedule_modification_is_400() {
    let app = setup_app(setup_store().await);

    let response = app
        .oneshot(post_as(
            "mgr_1",
            "/api/management/resources/manual-override",
            json!({
                "change_type": "modify_schedule",
                "resource_id": "ses_9",
                "reason": "conflict"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_manual_override_unknown_resource_is_404() {
    let app = setup_app(setup_store().await);

    let response = app
        .oneshot(post_as(
            "mgr_1",
            "/api/management/resources/manual-override",
            json!({
                "change_type": "reallocate_session",
                "to": "tut_idle",
                "resource_id": "ses_missing",
                "reason": "rebalance"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
