use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDateTime;
use tower::ServiceExt;

use beberia::config::AppConfig;
use beberia::db::{self, queries};
use beberia::handlers;
use beberia::models::{
    AdditionalService, DiscountType, Hospital, LocalizedText, Procedure, Promotion, ServiceType,
};
use beberia::state::AppState;

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        booking_number_attempts: 5,
        default_list_limit: 50,
        max_list_limit: 2,
    }
}

fn text(s: &str) -> LocalizedText {
    LocalizedText {
        vi: s.to_string(),
        ko: s.to_string(),
        en: s.to_string(),
    }
}

fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn seed(conn: &rusqlite::Connection) {
    queries::insert_hospital(
        conn,
        &Hospital {
            id: "hosp-1".to_string(),
            name: text("Seoul Beauty Clinic"),
            is_active: true,
        },
    )
    .unwrap();
    queries::insert_procedure(
        conn,
        &Procedure {
            id: "rhino".to_string(),
            hospital_id: "hosp-1".to_string(),
            name: text("Rhinoplasty"),
            description: LocalizedText::default(),
            original_price: 5_000_000,
            discounted_price: Some(3_500_000),
            beberia_price: Some(2_800_000),
            duration_minutes: Some(120),
            recovery_days: Some(14),
            is_popular: true,
            is_active: true,
        },
    )
    .unwrap();
    queries::insert_service(
        conn,
        &AdditionalService {
            id: "translate".to_string(),
            service_type: ServiceType::Translation,
            name: text("Medical interpreter"),
            description: LocalizedText::default(),
            price: 200_000,
            options: serde_json::json!({"languages": ["vi", "ko"]}),
            is_active: true,
        },
    )
    .unwrap();
    queries::insert_promotion(
        conn,
        &Promotion {
            id: "promo-welcome".to_string(),
            code: "WELCOME50".to_string(),
            discount_type: DiscountType::FixedAmount,
            discount_value: 50_000,
            max_discount: None,
            min_order_amount: None,
            beberia_only: false,
            valid_from: dt("2000-01-01 00:00:00"),
            valid_to: dt("2999-12-31 23:59:59"),
            max_usage: None,
            current_usage: 0,
            is_active: true,
        },
    )
    .unwrap();
}

fn test_state() -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();
    seed(&conn);
    Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
    })
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

fn user_request(method: &str, uri: &str, user: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user)
        .header("Content-Type", "application/json");
    match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn admin_request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", "Bearer test-token")
        .header("Content-Type", "application/json");
    match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(res: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn draft_json(promotion_code: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "hospital_id": "hosp-1",
        "procedures": [{"procedure_id": "rhino", "quantity": 1}],
        "promotion_code": promotion_code,
        "passport_name": "LE VAN C",
        "phone": "+84905555555",
        "arrival_date": "2026-11-01",
        "departure_date": "2026-11-10",
    })
}

async fn create_booking(state: &Arc<AppState>, user: &str) -> serde_json::Value {
    let res = test_app(state.clone())
        .oneshot(user_request("POST", "/api/bookings", user, Some(draft_json(None))))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    json_body(res).await
}

async fn admin_transition(
    state: &Arc<AppState>,
    booking_id: &str,
    status: &str,
) -> axum::response::Response {
    test_app(state.clone())
        .oneshot(admin_request(
            "POST",
            &format!("/api/admin/bookings/{booking_id}/status"),
            Some(serde_json::json!({
                "requested_status": status,
                "actor_id": "staff-1",
                "note": "updated from console",
            })),
        ))
        .await
        .unwrap()
}

// ── Health & Catalog ──

#[tokio::test]
async fn test_health() {
    let res = test_app(test_state())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_procedure_prices_follow_membership() {
    let state = test_state();

    let res = test_app(state.clone())
        .oneshot(user_request("GET", "/api/hospitals/hosp-1/procedures", "u1", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json[0]["price"], 3_500_000);

    let res = test_app(state)
        .oneshot(
            Request::builder()
                .uri("/api/hospitals/hosp-1/procedures")
                .header("x-user-id", "u2")
                .header("x-membership-tier", "beberia")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = json_body(res).await;
    assert_eq!(json[0]["price"], 2_800_000);
}

#[tokio::test]
async fn test_unknown_hospital_procedures_not_found() {
    let res = test_app(test_state())
        .oneshot(user_request("GET", "/api/hospitals/nope/procedures", "u1", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_services() {
    let res = test_app(test_state())
        .oneshot(Request::builder().uri("/api/services").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = json_body(res).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["service_type"], "TRANSLATION");
}

// ── Customer Bookings ──

#[tokio::test]
async fn test_booking_requires_identity() {
    let res = test_app(test_state())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/bookings")
                .header("Content-Type", "application/json")
                .body(Body::from(draft_json(None).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_booking_with_promotion() {
    let state = test_state();
    let res = test_app(state.clone())
        .oneshot(user_request(
            "POST",
            "/api/bookings",
            "u1",
            Some(draft_json(Some("WELCOME50"))),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let json = json_body(res).await;
    assert_eq!(json["status"], "PENDING");
    assert_eq!(json["subtotal"], 3_500_000);
    assert_eq!(json["discount_amount"], 50_000);
    assert_eq!(json["total_amount"], 3_450_000);
    assert_eq!(json["promotion"]["applied"], true);
    assert!(json["booking_number"]
        .as_str()
        .unwrap()
        .starts_with("BB-"));
}

#[tokio::test]
async fn test_rejected_promotion_reported_not_fatal() {
    let res = test_app(test_state())
        .oneshot(user_request(
            "POST",
            "/api/bookings",
            "u1",
            Some(draft_json(Some("BOGUS"))),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let json = json_body(res).await;
    assert_eq!(json["discount_amount"], 0);
    assert_eq!(json["promotion"]["applied"], false);
    assert_eq!(json["promotion"]["reason"], "not_found");
}

#[tokio::test]
async fn test_quote_with_services() {
    let mut draft = draft_json(None);
    draft["service_ids"] = serde_json::json!(["translate"]);

    let res = test_app(test_state())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/bookings/quote")
                .header("x-user-id", "u1")
                .header("x-membership-tier", "beberia")
                .header("Content-Type", "application/json")
                .body(Body::from(draft.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json["subtotal"], 2_800_000 + 200_000);
    assert_eq!(json["total_amount"], 3_000_000);
}

#[tokio::test]
async fn test_empty_draft_is_bad_request() {
    let mut draft = draft_json(None);
    draft["procedures"] = serde_json::json!([]);

    let res = test_app(test_state())
        .oneshot(user_request("POST", "/api/bookings", "u1", Some(draft)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_huge_quantity_rejected_and_service_keeps_working() {
    let state = test_state();
    let mut draft = draft_json(None);
    draft["procedures"] = serde_json::json!([
        {"procedure_id": "rhino", "quantity": i32::MAX},
        {"procedure_id": "rhino", "quantity": i32::MAX},
    ]);

    for uri in ["/api/bookings/quote", "/api/bookings"] {
        let res = test_app(state.clone())
            .oneshot(user_request("POST", uri, "u1", Some(draft.clone())))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    let created = create_booking(&state, "u1").await;
    assert_eq!(created["total_amount"], 3_500_000);
}

#[tokio::test]
async fn test_customer_sees_only_own_bookings() {
    let state = test_state();
    let created = create_booking(&state, "u1").await;
    create_booking(&state, "u2").await;
    let number = created["booking_number"].as_str().unwrap();

    let res = test_app(state.clone())
        .oneshot(user_request("GET", "/api/bookings", "u1", None))
        .await
        .unwrap();
    let json = json_body(res).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let res = test_app(state.clone())
        .oneshot(user_request("GET", &format!("/api/bookings/{number}"), "u1", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json["status_history"].as_array().unwrap().len(), 1);
    assert_eq!(json["arrival_date"], "2026-11-01");

    let res = test_app(state)
        .oneshot(user_request("GET", &format!("/api/bookings/{number}"), "u2", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_customer_cancel_window() {
    let state = test_state();
    let first = create_booking(&state, "u1").await;
    let number = first["booking_number"].as_str().unwrap();

    let res = test_app(state.clone())
        .oneshot(user_request(
            "POST",
            &format!("/api/bookings/{number}/cancel"),
            "u1",
            Some(serde_json::json!({"note": "changed my mind"})),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json["status"], "CANCELLED");

    let second = create_booking(&state, "u1").await;
    let id = second["booking_id"].as_str().unwrap();
    let number = second["booking_number"].as_str().unwrap();
    for status in ["CONFIRMED", "SCHEDULED"] {
        assert_eq!(admin_transition(&state, id, status).await.status(), StatusCode::OK);
    }

    let res = test_app(state)
        .oneshot(user_request(
            "POST",
            &format!("/api/bookings/{number}/cancel"),
            "u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

// ── Admin API ──

#[tokio::test]
async fn test_admin_requires_auth() {
    let res = test_app(test_state())
        .oneshot(
            Request::builder()
                .uri("/api/admin/status")
                .header("Authorization", "Bearer wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_transition_and_history() {
    let state = test_state();
    let created = create_booking(&state, "u1").await;
    let id = created["booking_id"].as_str().unwrap();

    let res = admin_transition(&state, id, "CONFIRMED").await;
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["new_status"], "CONFIRMED");

    let res = test_app(state.clone())
        .oneshot(admin_request("GET", &format!("/api/admin/bookings/{id}"), None))
        .await
        .unwrap();
    let json = json_body(res).await;
    assert_eq!(json["status"], "CONFIRMED");
    let history = json["status_history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["status"], "CONFIRMED");
    assert_eq!(history[1]["changed_by"], "staff-1");
    assert_eq!(
        json["allowed_transitions"],
        serde_json::json!(["SCHEDULED", "CANCELLED"])
    );

    let res = test_app(state)
        .oneshot(admin_request("GET", "/api/admin/bookings?status=confirmed", None))
        .await
        .unwrap();
    let json = json_body(res).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_list_limit_is_capped() {
    let state = test_state();
    for user in ["u1", "u2", "u3"] {
        create_booking(&state, user).await;
    }

    let res = test_app(state)
        .oneshot(admin_request("GET", "/api/admin/bookings?limit=100000", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_invalid_transition() {
    let state = test_state();
    let created = create_booking(&state, "u1").await;
    let id = created["booking_id"].as_str().unwrap();

    let res = admin_transition(&state, id, "COMPLETED").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let json = json_body(res).await;
    assert_eq!(json["error"], "InvalidTransition");
    assert_eq!(json["current_status"], "PENDING");
    assert_eq!(json["requested_status"], "COMPLETED");

    let res = admin_transition(&state, id, "ARCHIVED").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = admin_transition(&state, "missing", "CONFIRMED").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_status_counts_and_revenue() {
    let state = test_state();
    let created = create_booking(&state, "u1").await;
    create_booking(&state, "u2").await;
    let id = created["booking_id"].as_str().unwrap();

    for status in ["CONFIRMED", "SCHEDULED", "IN_PROGRESS", "COMPLETED"] {
        assert_eq!(admin_transition(&state, id, status).await.status(), StatusCode::OK);
    }

    let res = test_app(state)
        .oneshot(admin_request("GET", "/api/admin/status", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json["total_bookings"], 2);
    assert_eq!(json["bookings_by_status"]["COMPLETED"], 1);
    assert_eq!(json["bookings_by_status"]["PENDING"], 1);
    assert_eq!(json["bookings_by_status"]["DEPOSIT_PAID"], 0);
    assert_eq!(json["completed_revenue"], 3_500_000);
}
