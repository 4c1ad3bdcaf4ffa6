mod common;

use common::{amount, dec, Actor, TestApp};
use quote_service::services::attachments::{AttachmentPoint, AttachmentTarget};
use quote_service::services::ConfiguredAttachmentRules;
use serde_json::{json, Value};
use uuid::Uuid;

async fn draft_correction(app: &TestApp, actor: &Actor, target_type: &str, target_id: &Value, changes: Value) -> Value {
    let response = app
        .post(
            "/corrections",
            actor,
            json!({
                "target_type": target_type,
                "target_id": target_id,
                "reason": "Wrong customer on the original document",
                "changes_json": changes,
                "occurred_date": "2026-01-15"
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201, "create correction failed");
    response.json().await.expect("Failed to parse correction")
}

#[tokio::test]
async fn executing_a_quote_correction_voids_and_reissues() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let approver = Actor::approver();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("250.00", None), ("750.00", None)])
        .await;
    let old_id = quote["quote_id"].as_str().unwrap();

    let correction = draft_correction(
        &app,
        &sales,
        "quote",
        &quote["quote_id"],
        json!({ "customer_name": "Acme Mining Holdings" }),
    )
    .await;
    assert_eq!(correction["status"], "draft");
    let correction_id = correction["correction_id"].as_str().unwrap();

    let response = app
        .post(&format!("/corrections/{}/submit", correction_id), &sales, json!({}))
        .await;
    assert!(response.status().is_success());
    let pending = app.get_json(&format!("/quotes/{}", old_id), &sales).await;
    assert_eq!(pending["void_status"], "void_pending");

    let response = app
        .post(
            &format!("/corrections/{}/approve-execute", correction_id),
            &approver,
            json!({}),
        )
        .await;
    assert!(response.status().is_success());
    let executed: Value = response.json().await.unwrap();
    assert_eq!(executed["status"], "executed");
    let new_id = executed["new_record_id"].as_str().unwrap();
    assert_ne!(new_id, old_id);

    let old = app.get_json(&format!("/quotes/{}", old_id), &sales).await;
    assert_eq!(old["void_status"], "voided");
    assert_eq!(old["status"], "cancelled");

    let new = app.get_json(&format!("/quotes/{}", new_id), &sales).await;
    assert_eq!(new["parent_quote_id"], old_id);
    assert_ne!(new["quote_no"], old["quote_no"]);
    assert_eq!(new["status"], "draft");
    assert_eq!(new["payment_status"], "unpaid");
    assert_eq!(amount(&new["paid_amount"]), dec("0.00"));
    assert_eq!(amount(&new["total_amount"]), dec("1000.00"));
    assert_eq!(new["customer_name"], "Acme Mining Holdings");
    assert_eq!(new["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn rejecting_a_quote_correction_lifts_the_pending_void() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("100.00", None)])
        .await;
    let quote_id = quote["quote_id"].as_str().unwrap();

    let correction = draft_correction(&app, &sales, "quote", &quote["quote_id"], json!({})).await;
    let correction_id = correction["correction_id"].as_str().unwrap();
    app.post(&format!("/corrections/{}/submit", correction_id), &sales, json!({}))
        .await;

    // Payments are blocked while the void is pending
    let response = app
        .post(
            &format!("/quotes/{}/payments", quote_id),
            &sales,
            json!({ "amount": "10.00", "payment_method_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let response = app
        .post(
            &format!("/corrections/{}/reject", correction_id),
            &Actor::approver(),
            json!({ "note": "Customer name was right" }),
        )
        .await;
    assert!(response.status().is_success());
    let rejected: Value = response.json().await.unwrap();
    assert_eq!(rejected["status"], "rejected");

    let quote = app.get_json(&format!("/quotes/{}", quote_id), &sales).await;
    assert_eq!(quote["void_status"], "none");
}

#[tokio::test]
async fn failed_execution_changes_nothing() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("100.00", None)])
        .await;
    let quote_id = quote["quote_id"].as_str().unwrap();

    let correction = draft_correction(
        &app,
        &sales,
        "quote",
        &quote["quote_id"],
        json!({ "quote_no": "Q-HACKED" }),
    )
    .await;
    let correction_id = correction["correction_id"].as_str().unwrap();
    app.post(&format!("/corrections/{}/submit", correction_id), &sales, json!({}))
        .await;

    let response = app
        .post(
            &format!("/corrections/{}/approve-execute", correction_id),
            &Actor::approver(),
            json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let correction = app
        .get_json(&format!("/corrections/{}", correction_id), &sales)
        .await;
    assert_eq!(correction["status"], "submitted");
    assert!(correction["new_record_id"].is_null());
    let quote = app.get_json(&format!("/quotes/{}", quote_id), &sales).await;
    assert_eq!(quote["void_status"], "void_pending");
    assert_eq!(quote["status"], "confirmed");
}

#[tokio::test]
async fn approval_requires_authority_and_blank_reason_is_rejected() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("100.00", None)])
        .await;

    let response = app
        .post(
            "/corrections",
            &sales,
            json!({
                "target_type": "quote",
                "target_id": quote["quote_id"],
                "reason": "   ",
                "occurred_date": "2026-01-15"
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let correction = draft_correction(&app, &sales, "quote", &quote["quote_id"], json!({})).await;
    let correction_id = correction["correction_id"].as_str().unwrap();

    // A second open correction on the same record conflicts
    let response = app
        .post(
            "/corrections",
            &sales,
            json!({
                "target_type": "quote",
                "target_id": quote["quote_id"],
                "reason": "Duplicate",
                "occurred_date": "2026-01-15"
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);

    app.post(&format!("/corrections/{}/submit", correction_id), &sales, json!({}))
        .await;
    let response = app
        .post(
            &format!("/corrections/{}/approve-execute", correction_id),
            &sales,
            json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 403);

    let listed: Value = app
        .get_json(
            &format!(
                "/corrections?target_type=quote&target_id={}",
                quote["quote_id"].as_str().unwrap()
            ),
            &sales,
        )
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn submit_enforces_configured_attachment_minimum() {
    let rules = ConfiguredAttachmentRules::new().with_minimum(
        AttachmentTarget::Correction,
        AttachmentPoint::Submit,
        1,
    );
    let Some(app) = TestApp::spawn_with_rules(rules).await else { return };
    let sales = Actor::sales();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("100.00", None)])
        .await;
    let correction = draft_correction(&app, &sales, "quote", &quote["quote_id"], json!({})).await;
    let correction_id = correction["correction_id"].as_str().unwrap();

    let response = app
        .post(&format!("/corrections/{}/submit", correction_id), &sales, json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Missing attachments"));

    let response = app
        .post(
            &format!("/corrections/{}/submit", correction_id),
            &sales,
            json!({ "attachments": ["https://files.test/approval.pdf"] }),
        )
        .await;
    assert!(response.status().is_success());
}

#[tokio::test]
async fn settled_customer_payment_cannot_be_corrected() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let customer = Uuid::new_v4();
    let quote = app.confirmed_quote(&sales, customer, &[("300.00", None)]).await;

    let response = app
        .post(
            "/customer-payments",
            &sales,
            json!({
                "customer_id": customer,
                "amount": "300.00",
                "currency": "USD",
                "allocations": [{ "quote_id": quote["quote_id"], "amount": "300.00" }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let payment: Value = response.json().await.unwrap();
    let payment_id = payment["payment_id"].as_str().unwrap();

    let response = app
        .post(
            &format!("/customer-payments/{}/statement", payment_id),
            &sales,
            json!({ "statement_id": Uuid::new_v4() }),
        )
        .await;
    assert!(response.status().is_success());

    let correction = draft_correction(&app, &sales, "payment", &payment["payment_id"], json!({})).await;
    let correction_id = correction["correction_id"].as_str().unwrap();
    app.post(&format!("/corrections/{}/submit", correction_id), &sales, json!({}))
        .await;

    let response = app
        .post(
            &format!("/corrections/{}/approve-execute", correction_id),
            &Actor::approver(),
            json!({}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn expense_correction_reissues_with_changes() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();

    let response = app
        .post(
            "/expenses",
            &sales,
            json!({
                "category": "travel",
                "amount": "120.50",
                "currency": "USD",
                "incurred_date": "2026-01-10"
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let expense: Value = response.json().await.unwrap();
    let old_id = expense["expense_id"].as_str().unwrap();

    let correction = draft_correction(
        &app,
        &sales,
        "expense",
        &expense["expense_id"],
        json!({ "amount": "102.50" }),
    )
    .await;
    let correction_id = correction["correction_id"].as_str().unwrap();
    app.post(&format!("/corrections/{}/submit", correction_id), &sales, json!({}))
        .await;
    let executed: Value = app
        .post(
            &format!("/corrections/{}/approve-execute", correction_id),
            &Actor::approver(),
            json!({}),
        )
        .await
        .json()
        .await
        .unwrap();
    let new_id = executed["new_record_id"].as_str().unwrap();

    let old = app.get_json(&format!("/expenses/{}", old_id), &sales).await;
    assert_eq!(old["status"], "void");
    let new = app.get_json(&format!("/expenses/{}", new_id), &sales).await;
    assert_eq!(new["parent_expense_id"], old_id);
    assert_eq!(amount(&new["amount"]), dec("102.50"));
    assert_eq!(new["status"], "draft");
}

#[tokio::test]
async fn unsettled_customer_payment_correction_reissues_a_draft() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let customer = Uuid::new_v4();
    let first = app.confirmed_quote(&sales, customer, &[("200.00", None)]).await;
    let second = app.confirmed_quote(&sales, customer, &[("100.00", None)]).await;

    let response = app
        .post(
            "/customer-payments",
            &sales,
            json!({
                "customer_id": customer,
                "amount": "200.00",
                "currency": "USD",
                "allocations": [{ "quote_id": first["quote_id"], "amount": "200.00" }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let payment: Value = response.json().await.unwrap();
    let old_id = payment["payment_id"].as_str().unwrap();

    let correction = draft_correction(
        &app,
        &sales,
        "payment",
        &payment["payment_id"],
        json!({
            "amount": "300.00",
            "note": "fixed",
            "allocations": [
                { "quote_id": first["quote_id"], "amount": "200.00" },
                { "quote_id": second["quote_id"], "amount": "100.00" }
            ]
        }),
    )
    .await;
    let correction_id = correction["correction_id"].as_str().unwrap();
    app.post(&format!("/corrections/{}/submit", correction_id), &sales, json!({}))
        .await;
    let response = app
        .post(
            &format!("/corrections/{}/approve-execute", correction_id),
            &Actor::approver(),
            json!({}),
        )
        .await;
    assert!(response.status().is_success());
    let executed: Value = response.json().await.unwrap();
    let new_id = executed["new_record_id"].as_str().unwrap();

    let old = app
        .get_json(&format!("/customer-payments/{}", old_id), &sales)
        .await;
    assert_eq!(old["status"], "void");

    let new = app
        .get_json(&format!("/customer-payments/{}", new_id), &sales)
        .await;
    assert_eq!(new["status"], "draft");
    assert_eq!(new["parent_payment_id"], old_id);
    assert_ne!(new["payment_no"], old["payment_no"]);
    assert!(new["payment_no"].as_str().unwrap().starts_with("PAY"));
    assert!(new["statement_id"].is_null());
    assert_eq!(new["note"], "fixed");
    assert_eq!(amount(&new["amount"]), dec("300.00"));

    let allocations = new["allocations"].as_array().unwrap();
    assert_eq!(allocations.len(), 2);
    let allocated: rust_decimal::Decimal = allocations.iter().map(|a| amount(&a["amount"])).sum();
    assert_eq!(allocated, dec("300.00"));
}
