mod common;

use common::{amount, dec, Actor, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn customer_payment_allocations_must_sum_to_amount() {
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
                "allocations": [{ "quote_id": quote["quote_id"], "amount": "299.99" }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .post(
            "/customer-payments",
            &sales,
            json!({
                "customer_id": customer,
                "amount": "300.00",
                "currency": "usd",
                "allocations": [{ "quote_id": quote["quote_id"], "amount": "300.00" }]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let payment: Value = response.json().await.unwrap();
    assert_eq!(payment["status"], "draft");
    assert_eq!(payment["currency"], "USD");
    assert!(payment["payment_no"].as_str().unwrap().starts_with("PAY"));
    assert_eq!(payment["allocations"].as_array().unwrap().len(), 1);

    let payment_id = payment["payment_id"].as_str().unwrap();
    let statement = Uuid::new_v4();
    app.post(
        &format!("/customer-payments/{}/statement", payment_id),
        &sales,
        json!({ "statement_id": statement }),
    )
    .await;
    let response = app
        .post(
            &format!("/customer-payments/{}/statement", payment_id),
            &sales,
            json!({ "statement_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let stored = app
        .get_json(&format!("/customer-payments/{}", payment_id), &sales)
        .await;
    assert_eq!(stored["statement_id"], statement.to_string());
}

#[tokio::test]
async fn only_the_creator_voids_a_draft_expense() {
    let Some(app) = TestApp::spawn().await else { return };
    let creator = Actor::sales();

    let expense: Value = app
        .post(
            "/expenses",
            &creator,
            json!({
                "category": "fuel",
                "amount": "40.00",
                "currency": "USD",
                "incurred_date": "2026-02-01"
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let expense_id = expense["expense_id"].as_str().unwrap();

    let response = app
        .post(&format!("/expenses/{}/void", expense_id), &Actor::sales(), json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 403);

    let voided: Value = app
        .post(&format!("/expenses/{}/void", expense_id), &creator, json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(voided["status"], "void");

    let response = app
        .post(
            &format!("/expenses/{}/claim", expense_id),
            &creator,
            json!({ "claim_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn freight_bill_links_shipments_and_correction_moves_them() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();

    let mut shipment_ids = Vec::new();
    for _ in 0..2 {
        let shipment: Value = app
            .post("/shipments", &sales, json!({}))
            .await
            .json()
            .await
            .unwrap();
        shipment_ids.push(shipment["shipment_id"].as_str().unwrap().to_string());
    }

    let response = app
        .post(
            "/freight-bills",
            &sales,
            json!({
                "carrier_name": "Northern Haulage",
                "currency": "USD",
                "items": [
                    { "shipment_id": shipment_ids[0], "amount": "80.00" },
                    { "shipment_id": shipment_ids[1], "amount": "45.00" }
                ]
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let bill: Value = response.json().await.unwrap();
    let bill_id = bill["bill_id"].as_str().unwrap();
    assert_eq!(amount(&bill["total_amount"]), dec("125.00"));

    let shipment = app
        .get_json(&format!("/shipments/{}", shipment_ids[0]), &sales)
        .await;
    assert_eq!(shipment["freight_bill_id"], bill_id);

    let correction: Value = app
        .post(
            "/corrections",
            &sales,
            json!({
                "target_type": "freight_bill",
                "target_id": bill_id,
                "reason": "Carrier invoiced under a new name",
                "changes_json": { "carrier_name": "Northern Haulage Ltd" },
                "occurred_date": "2026-02-03"
            }),
        )
        .await
        .json()
        .await
        .unwrap();
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
    let new_bill_id = executed["new_record_id"].as_str().unwrap();

    let old = app.get_json(&format!("/freight-bills/{}", bill_id), &sales).await;
    assert_eq!(old["status"], "void");
    let new = app
        .get_json(&format!("/freight-bills/{}", new_bill_id), &sales)
        .await;
    assert_eq!(new["carrier_name"], "Northern Haulage Ltd");
    assert_eq!(new["parent_bill_id"], bill_id);
    assert_eq!(new["items"].as_array().unwrap().len(), 2);

    let shipment = app
        .get_json(&format!("/shipments/{}", shipment_ids[1]), &sales)
        .await;
    assert_eq!(shipment["freight_bill_id"], new_bill_id);
}

#[tokio::test]
async fn shipment_dropped_by_correction_leaves_the_voided_bill() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();

    let mut shipment_ids = Vec::new();
    for _ in 0..2 {
        let shipment: Value = app
            .post("/shipments", &sales, json!({}))
            .await
            .json()
            .await
            .unwrap();
        shipment_ids.push(shipment["shipment_id"].as_str().unwrap().to_string());
    }

    let bill: Value = app
        .post(
            "/freight-bills",
            &sales,
            json!({
                "carrier_name": "Coastal Freight",
                "currency": "USD",
                "items": [
                    { "shipment_id": shipment_ids[0], "amount": "60.00" },
                    { "shipment_id": shipment_ids[1], "amount": "30.00" }
                ]
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let bill_id = bill["bill_id"].as_str().unwrap();

    // The second shipment was billed by mistake
    let correction: Value = app
        .post(
            "/corrections",
            &sales,
            json!({
                "target_type": "freight_bill",
                "target_id": bill_id,
                "reason": "Second shipment belongs to another carrier",
                "changes_json": {
                    "items": [{ "shipment_id": shipment_ids[0], "amount": "60.00" }]
                },
                "occurred_date": "2026-02-04"
            }),
        )
        .await
        .json()
        .await
        .unwrap();
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
    assert_eq!(executed["status"], "executed");
    let new_bill_id = executed["new_record_id"].as_str().unwrap();

    let new = app
        .get_json(&format!("/freight-bills/{}", new_bill_id), &sales)
        .await;
    assert_eq!(amount(&new["total_amount"]), dec("60.00"));
    assert_eq!(new["items"].as_array().unwrap().len(), 1);

    let kept = app
        .get_json(&format!("/shipments/{}", shipment_ids[0]), &sales)
        .await;
    assert_eq!(kept["freight_bill_id"], new_bill_id);

    let dropped = app
        .get_json(&format!("/shipments/{}", shipment_ids[1]), &sales)
        .await;
    assert!(dropped["freight_bill_id"].is_null());
}
