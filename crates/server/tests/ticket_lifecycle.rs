//! Ticket endpoints: form intake, state changes, history and board listings.

mod common;

use axum::http::StatusCode;
use common::TestFixture;
use serde_json::json;

async fn fixture_with_ticket() -> (TestFixture, i64, i64) {
    let fixture = TestFixture::new().await;
    let board_id = fixture.create_board("support").await;
    let ticket_id = fixture.create_ticket(board_id, "VPN drops every hour").await;
    (fixture, board_id, ticket_id)
}

#[tokio::test]
async fn test_form_submission_creates_new_ticket() {
    let (fixture, board_id, ticket_id) = fixture_with_ticket().await;

    let response = fixture.get(&format!("/api/v1/tickets/{}", ticket_id)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["state"], "new");
    assert_eq!(response.body["source"], "form");
    assert_eq!(response.body["board_id"], board_id);
    assert_eq!(response.body["creator_email"], "reporter@example.com");

    let history = fixture
        .get(&format!("/api/v1/tickets/{}/history", ticket_id))
        .await;
    assert_status!(history, StatusCode::OK);
    assert_eq!(history.body, json!([]));
}

#[tokio::test]
async fn test_legal_transition_appends_history() {
    let (fixture, _, ticket_id) = fixture_with_ticket().await;

    let response = fixture
        .post(
            &format!("/api/v1/tickets/{}/state", ticket_id),
            json!({ "new_state": "in_progress", "comment": "starting work" }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["state"], "in_progress");

    let history = fixture
        .get(&format!("/api/v1/tickets/{}/history", ticket_id))
        .await;
    let records = history.body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["previous_state"], "new");
    assert_eq!(records[0]["new_state"], "in_progress");
    assert_eq!(records[0]["comment"], "starting work");
    assert_eq!(records[0]["changed_by"], "anonymous");
}

#[tokio::test]
async fn test_new_cannot_jump_to_resolved() {
    let (fixture, _, ticket_id) = fixture_with_ticket().await;

    let response = fixture
        .post(
            &format!("/api/v1/tickets/{}/state", ticket_id),
            json!({ "new_state": "resolved" }),
        )
        .await;
    assert_error_code!(response, StatusCode::CONFLICT, "ILLEGAL_TRANSITION");

    let ticket = fixture.get(&format!("/api/v1/tickets/{}", ticket_id)).await;
    assert_eq!(ticket.body["state"], "new");
    let history = fixture
        .get(&format!("/api/v1/tickets/{}/history", ticket_id))
        .await;
    assert_eq!(history.body, json!([]));
}

#[tokio::test]
async fn test_reopening_closed_ticket_goes_through_in_progress() {
    let (fixture, _, ticket_id) = fixture_with_ticket().await;
    let path = format!("/api/v1/tickets/{}/state", ticket_id);

    let closed = fixture.post(&path, json!({ "new_state": "closed" })).await;
    assert_status!(closed, StatusCode::OK);

    for target in ["waiting", "resolved", "new"] {
        let response = fixture.post(&path, json!({ "new_state": target })).await;
        assert_error_code!(response, StatusCode::CONFLICT, "ILLEGAL_TRANSITION");
    }

    let reopened = fixture
        .post(&path, json!({ "new_state": "in_progress" }))
        .await;
    assert_status!(reopened, StatusCode::OK);
    assert_eq!(reopened.body["state"], "in_progress");
}

#[tokio::test]
async fn test_history_forms_a_chain() {
    let (fixture, _, ticket_id) = fixture_with_ticket().await;
    let path = format!("/api/v1/tickets/{}/state", ticket_id);

    for target in ["waiting", "in_progress", "resolved", "in_progress", "closed"] {
        let response = fixture.post(&path, json!({ "new_state": target })).await;
        assert_status!(response, StatusCode::OK);
    }

    let history = fixture
        .get(&format!("/api/v1/tickets/{}/history", ticket_id))
        .await;
    let records = history.body.as_array().unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[0]["previous_state"], "new");
    for pair in records.windows(2) {
        assert_eq!(pair[0]["new_state"], pair[1]["previous_state"]);
        assert_ne!(pair[1]["previous_state"], pair[1]["new_state"]);
    }
}

#[tokio::test]
async fn test_unknown_state_string_is_invalid_state() {
    let (fixture, _, ticket_id) = fixture_with_ticket().await;

    let response = fixture
        .post(
            &format!("/api/v1/tickets/{}/state", ticket_id),
            json!({ "new_state": "escalated" }),
        )
        .await;
    assert_error_code!(response, StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATE");
}

#[tokio::test]
async fn test_malformed_state_body_is_validation_error() {
    let (fixture, _, ticket_id) = fixture_with_ticket().await;
    let path = format!("/api/v1/tickets/{}/state", ticket_id);

    let response = fixture.post_raw(&path, "{not json").await;
    assert_error_code!(
        response,
        StatusCode::UNPROCESSABLE_ENTITY,
        "VALIDATION_ERROR"
    );

    let response = fixture.post(&path, json!({ "state": "closed" })).await;
    assert_error_code!(
        response,
        StatusCode::UNPROCESSABLE_ENTITY,
        "VALIDATION_ERROR"
    );
}

#[tokio::test]
async fn test_missing_ticket_is_not_found() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/tickets/999").await;
    assert_error_code!(response, StatusCode::NOT_FOUND, "NOT_FOUND");

    let response = fixture.get("/api/v1/tickets/999/history").await;
    assert_error_code!(response, StatusCode::NOT_FOUND, "NOT_FOUND");

    let response = fixture
        .post(
            "/api/v1/tickets/999/state",
            json!({ "new_state": "in_progress" }),
        )
        .await;
    assert_error_code!(response, StatusCode::NOT_FOUND, "NOT_FOUND");

    let response = fixture.get("/api/v1/tickets/not-a-number").await;
    assert_error_code!(response, StatusCode::NOT_FOUND, "NOT_FOUND");
}

#[tokio::test]
async fn test_board_listing_filters_by_state() {
    let fixture = TestFixture::new().await;
    let board_id = fixture.create_board("ops").await;
    let other_board = fixture.create_board("sales").await;

    let first = fixture.create_ticket(board_id, "Disk full").await;
    let second = fixture.create_ticket(board_id, "Backup failed").await;
    let _third = fixture.create_ticket(board_id, "Cert expiring").await;
    fixture.create_ticket(other_board, "Quote request").await;

    fixture
        .post(
            &format!("/api/v1/tickets/{}/state", first),
            json!({ "new_state": "in_progress" }),
        )
        .await;
    fixture
        .post(
            &format!("/api/v1/tickets/{}/state", second),
            json!({ "new_state": "waiting" }),
        )
        .await;

    let all = fixture
        .get(&format!("/api/v1/boards/{}/tickets", board_id))
        .await;
    assert_status!(all, StatusCode::OK);
    assert_eq!(all.body["total"], 3);

    let active = fixture
        .get(&format!(
            "/api/v1/boards/{}/tickets?state=in_progress,waiting",
            board_id
        ))
        .await;
    assert_eq!(active.body["total"], 2);
    let ids: Vec<i64> = active.body["tickets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_i64().unwrap())
        .collect();
    assert!(ids.contains(&first));
    assert!(ids.contains(&second));

    let paged = fixture
        .get(&format!("/api/v1/boards/{}/tickets?limit=1&offset=1", board_id))
        .await;
    assert_eq!(paged.body["tickets"].as_array().unwrap().len(), 1);
    assert_eq!(paged.body["total"], 3);
    assert_eq!(paged.body["limit"], 1);

    let bad_state = fixture
        .get(&format!("/api/v1/boards/{}/tickets?state=open", board_id))
        .await;
    assert_error_code!(bad_state, StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATE");

    let missing = fixture.get("/api/v1/boards/999/tickets").await;
    assert_error_code!(missing, StatusCode::NOT_FOUND, "NOT_FOUND");
}

#[tokio::test]
async fn test_form_rejects_bad_input_and_archived_boards() {
    let fixture = TestFixture::new().await;
    let board_id = fixture.create_board("help").await;
    let path = format!("/api/v1/boards/{}/tickets", board_id);

    let bad_email = fixture
        .post(
            &path,
            json!({ "title": "Hi", "description": "Hello", "email": "not-an-address" }),
        )
        .await;
    assert_error_code!(
        bad_email,
        StatusCode::UNPROCESSABLE_ENTITY,
        "VALIDATION_ERROR"
    );

    let blank_title = fixture
        .post(
            &path,
            json!({ "title": "   ", "description": "Hello", "email": "a@example.com" }),
        )
        .await;
    assert_error_code!(
        blank_title,
        StatusCode::UNPROCESSABLE_ENTITY,
        "VALIDATION_ERROR"
    );

    let unknown_board = fixture
        .post(
            "/api/v1/boards/999/tickets",
            json!({ "title": "Hi", "description": "Hello", "email": "a@example.com" }),
        )
        .await;
    assert_error_code!(unknown_board, StatusCode::NOT_FOUND, "NOT_FOUND");

    let archived = fixture
        .post_empty(&format!("/api/v1/boards/{}/archive", board_id))
        .await;
    assert_status!(archived, StatusCode::OK);

    let response = fixture
        .post(
            &path,
            json!({ "title": "Hi", "description": "Hello", "email": "a@example.com" }),
        )
        .await;
    assert_error_code!(response, StatusCode::UNPROCESSABLE_ENTITY, "BOARD_ARCHIVED");
}

#[tokio::test]
async fn test_manager_routes_require_key() {
    let fixture = TestFixture::with_api_key("desk-key").await;
    let board_id = fixture.create_board("secure").await;
    let ticket_id = fixture.create_ticket(board_id, "Locked out").await;

    let anonymous = fixture.get(&format!("/api/v1/tickets/{}", ticket_id)).await;
    assert_error_code!(anonymous, StatusCode::UNAUTHORIZED, "UNAUTHORIZED");

    let wrong = fixture
        .request_as(
            "nope",
            "GET",
            &format!("/api/v1/tickets/{}", ticket_id),
            None,
        )
        .await;
    assert_error_code!(wrong, StatusCode::UNAUTHORIZED, "UNAUTHORIZED");

    // Public endpoints stay open
    let health = fixture.get("/api/v1/health").await;
    assert_status!(health, StatusCode::OK);
    assert_eq!(health.body["status"], "ok");

    let form = fixture
        .post(
            &format!("/api/v1/boards/{}/tickets", board_id),
            json!({ "title": "Printer", "description": "Jammed", "email": "a@example.com" }),
        )
        .await;
    assert_status!(form, StatusCode::CREATED);
}

#[tokio::test]
async fn test_changed_by_is_the_authenticated_manager() {
    let fixture = TestFixture::with_api_key("desk-key").await;
    let board_id = fixture.create_board("secure").await;
    let ticket_id = fixture.create_ticket(board_id, "Locked out").await;
    let path = format!("/api/v1/tickets/{}/state", ticket_id);

    let first = fixture
        .request_as(
            "desk-key",
            "POST",
            &path,
            Some(json!({ "new_state": "in_progress" })),
        )
        .await;
    assert_status!(first, StatusCode::OK);

    let second = fixture
        .request_as(
            "desk-key-2",
            "POST",
            &path,
            Some(json!({ "new_state": "resolved", "comment": "reset password" })),
        )
        .await;
    assert_status!(second, StatusCode::OK);

    let history = fixture
        .request_as(
            "desk-key",
            "GET",
            &format!("/api/v1/tickets/{}/history", ticket_id),
            None,
        )
        .await;
    let records = history.body.as_array().unwrap();
    assert_eq!(records[0]["changed_by"], "manager");
    assert_eq!(records[1]["changed_by"], "second-manager");
}
