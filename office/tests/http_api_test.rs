//! HTTP API tests against the full router.
//!
//! The router runs in-process over the in-memory record store, the mock
//! auth provider and a scripted chat agent.
//!
//! Run with: `cargo test --test http_api_test`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use backline_agent::AgentError;
use backline_agent::mocks::ScriptedAgent;
use backline_auth::mocks::MockAuthProvider;
use backline_office::config::BandConfig;
use backline_office::testing::office_schema;
use backline_office::{AppState, build_router};
use backline_testing::{InMemoryRecordStore, test_clock};
use backline_web::CORRELATION_ID_HEADER;
use serde_json::{Value, json};
use std::sync::Arc;

const ADMIN_EMAIL: &str = "kacie@example.com";
const ADMIN_PASSWORD: &str = "correct horse";

struct Harness {
    server: TestServer,
    agent: ScriptedAgent,
}

fn harness(agent: ScriptedAgent) -> Harness {
    let store = InMemoryRecordStore::new(office_schema());
    let auth = MockAuthProvider::new().with_user(ADMIN_EMAIL, ADMIN_PASSWORD);
    let state = AppState::new(
        Arc::new(store),
        Arc::new(auth),
        Arc::new(agent.clone()),
        Arc::new(test_clock()),
        BandConfig::default(),
    );
    Harness {
        server: TestServer::new(build_router(state)).unwrap(),
        agent,
    }
}

async fn sign_in(server: &TestServer) -> String {
    let response = server
        .post("/api/auth/sign-in")
        .json(&json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD}))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn health_and_readiness_need_no_session() {
    let h = harness(ScriptedAgent::new());
    h.server.get("/health").await.assert_status_ok();
    h.server.get("/ready").await.assert_status_ok();
}

#[tokio::test]
async fn responses_carry_the_correlation_id() {
    let h = harness(ScriptedAgent::new());
    let id = "6f1c2b0a-3d4e-4f5a-8b9c-0d1e2f3a4b5c";
    let response = h
        .server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-correlation-id"),
            HeaderValue::from_static(id),
        )
        .await;
    assert_eq!(response.header(CORRELATION_ID_HEADER), id);
}

#[tokio::test]
async fn admin_routes_reject_missing_and_unknown_tokens() {
    let h = harness(ScriptedAgent::new());
    h.server
        .get("/api/admin/bookings")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .get("/api/admin/bookings")
        .authorization_bearer("token-999")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let h = harness(ScriptedAgent::new());
    h.server
        .post("/api/auth/sign-in")
        .json(&json!({"email": ADMIN_EMAIL, "password": "nope"}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_out_token_stops_working() {
    let h = harness(ScriptedAgent::new());
    let token = sign_in(&h.server).await;
    h.server
        .get("/api/auth/session")
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
    h.server
        .post("/api/auth/sign-out")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    h.server
        .get("/api/admin/contacts")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_lifecycle_is_enforced_over_http() {
    let h = harness(ScriptedAgent::new());
    let token = sign_in(&h.server).await;

    let created = h
        .server
        .post("/api/admin/bookings")
        .authorization_bearer(&token)
        .json(&json!({
            "venue_name": "The Hall",
            "contact_name": "Sam",
            "contact_email": "sam@hall.org"
        }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let booking = created.json::<Value>();
    assert_eq!(booking["state"], "inquiry");
    let id = booking["id"].as_str().unwrap();

    h.server
        .post(&format!("/api/admin/bookings/{id}/transitions"))
        .authorization_bearer(&token)
        .json(&json!({"action": "approve"}))
        .await
        .assert_status(StatusCode::CONFLICT);

    let available = h
        .server
        .get(&format!("/api/admin/bookings/{id}/transitions"))
        .authorization_bearer(&token)
        .await
        .json::<Value>();
    let actions = available["actions"].as_array().unwrap();
    assert!(actions.contains(&json!("send_proposal")));
    assert!(!actions.contains(&json!("approve")));

    h.server
        .get("/api/admin/bookings")
        .authorization_bearer(&token)
        .add_query_param("state", "bogus")
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn contact_delete_needs_confirmation_and_no_dependents() {
    let h = harness(ScriptedAgent::new());
    let token = sign_in(&h.server).await;

    let contact = h
        .server
        .post("/api/admin/contacts")
        .authorization_bearer(&token)
        .json(&json!({"first_name": "Jo", "email": "jo@x.com"}))
        .await
        .json::<Value>();
    let id = contact["id"].as_str().unwrap();

    h.server
        .post("/api/admin/payments")
        .authorization_bearer(&token)
        .json(&json!({"contact_id": id, "amount": 250.0}))
        .await
        .assert_status(StatusCode::CREATED);

    h.server
        .delete(&format!("/api/admin/contacts/{id}"))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let refused = h
        .server
        .delete(&format!("/api/admin/contacts/{id}"))
        .authorization_bearer(&token)
        .add_query_param("confirm", true)
        .await;
    refused.assert_status(StatusCode::CONFLICT);
    assert!(
        refused.json::<Value>()["message"]
            .as_str()
            .unwrap()
            .starts_with("Cannot delete this contact")
    );

    h.server
        .get(&format!("/api/admin/contacts/{id}"))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn invoice_totals_are_computed_server_side() {
    let h = harness(ScriptedAgent::new());
    let token = sign_in(&h.server).await;

    let contact = h
        .server
        .post("/api/admin/contacts")
        .authorization_bearer(&token)
        .json(&json!({"first_name": "Jo", "email": "jo@x.com"}))
        .await
        .json::<Value>();

    let invoice = h
        .server
        .post("/api/admin/invoices")
        .authorization_bearer(&token)
        .json(&json!({
            "contact_id": contact["id"],
            "tax": 8,
            "subtotal": 1.0,
            "total": 1.0,
            "items": [{"description": "Show", "quantity": 1, "rate": 1500}]
        }))
        .await;
    invoice.assert_status(StatusCode::CREATED);
    let invoice = invoice.json::<Value>();
    assert_eq!(invoice["subtotal"], json!(1500.0));
    assert_eq!(invoice["total"], json!(1620.0));
    let id = invoice["id"].as_str().unwrap();

    let paid = h
        .server
        .post(&format!("/api/admin/invoices/{id}/mark-paid"))
        .authorization_bearer(&token)
        .await;
    paid.assert_status_ok();
    assert_eq!(paid.json::<Value>()["payment"]["amount"], json!(1620.0));

    h.server
        .post(&format!("/api/admin/invoices/{id}/mark-paid"))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn contact_csv_import_skips_known_emails() {
    let h = harness(ScriptedAgent::new());
    let token = sign_in(&h.server).await;

    h.server
        .post("/api/admin/contacts")
        .authorization_bearer(&token)
        .json(&json!({"first_name": "Jo", "email": "jo@x.com"}))
        .await
        .assert_status(StatusCode::CREATED);

    let csv = "first_name,last_name,email,labels\n\
               Jo,Doe,jo@x.com,\n\
               Ana,Lee,ana@x.com,\"venue, promoter\"\n";
    let report = h
        .server
        .post("/api/admin/contacts/import")
        .authorization_bearer(&token)
        .text(csv)
        .await;
    report.assert_status_ok();
    let report = report.json::<Value>();
    assert_eq!(report["added"], 1);
    assert_eq!(report["skipped"], 1);

    let contacts = h
        .server
        .get("/api/admin/contacts")
        .authorization_bearer(&token)
        .add_query_param("search", "ana")
        .await
        .json::<Value>();
    assert_eq!(contacts[0]["labels"], json!(["venue", "promoter"]));
}

#[tokio::test]
async fn public_chat_relays_to_the_agent() {
    let h = harness(ScriptedAgent::new().reply(Some("conv-1"), "We'd love to play!"));
    let reply = h
        .server
        .post("/api/chat")
        .json(&json!({
            "message": "Free on June 1?",
            "sender_name": "Sam",
            "sender_email": "sam@hall.org",
            "venue_name": "The Hall"
        }))
        .await;
    reply.assert_status_ok();
    let reply = reply.json::<Value>();
    assert_eq!(reply["conversation_id"], "conv-1");
    assert_eq!(reply["response"], "We'd love to play!");
    assert_eq!(h.agent.requests().len(), 1);
}

#[tokio::test]
async fn public_chat_falls_back_when_the_agent_fails() {
    let h = harness(ScriptedAgent::new().fail(AgentError::Timeout));
    let reply = h
        .server
        .post("/api/chat")
        .json(&json!({
            "message": "Hello?",
            "conversation_id": "conv-7",
            "sender_name": "Sam",
            "sender_email": "sam@hall.org"
        }))
        .await;
    reply.assert_status_ok();
    let reply = reply.json::<Value>();
    assert_eq!(reply["conversation_id"], "conv-7");
    assert!(
        reply["response"]
            .as_str()
            .unwrap()
            .starts_with("Sorry, I'm having trouble connecting right now.")
    );

    h.server
        .post("/api/chat")
        .json(&json!({"message": "  ", "sender_name": "Sam", "sender_email": "sam@hall.org"}))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn availability_chat_reports_agent_failure_as_bad_gateway() {
    let h = harness(ScriptedAgent::new());
    let token = sign_in(&h.server).await;

    let member = h
        .server
        .post("/api/admin/band-members")
        .authorization_bearer(&token)
        .json(&json!({"name": "Ferris", "email": "ferris@band.com", "instrument": "drums"}))
        .await;
    member.assert_status(StatusCode::CREATED);
    let id = member.json::<Value>()["id"].as_str().unwrap().to_string();

    let failed = h
        .server
        .post(&format!("/api/admin/band-members/{id}/availability-chat"))
        .authorization_bearer(&token)
        .json(&json!({"message": "I'm away June 1-3"}))
        .await;
    failed.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(failed.json::<Value>()["message"], "Error contacting agent.");
}
