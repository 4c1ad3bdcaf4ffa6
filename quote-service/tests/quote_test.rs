mod common;

use common::{amount, dec, Actor, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn draft_quote_gets_number_and_tracks_item_total() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .draft_quote(&sales, Uuid::new_v4(), &[("100.00", None), ("25.50", None)])
        .await;
    let quote_id = quote["quote_id"].as_str().unwrap();

    assert!(quote["quote_no"].as_str().unwrap().starts_with("QSA"));
    assert_eq!(quote["status"], "draft");
    assert_eq!(amount(&quote["total_amount"]), dec("125.50"));

    let item_id = quote["items"][0]["item_id"].as_str().unwrap().to_string();
    let response = app
        .put(
            &format!("/quotes/{}/items/{}", quote_id, item_id),
            &sales,
            json!({ "quantity": "3" }),
        )
        .await;
    assert!(response.status().is_success());
    let updated: Value = response.json().await.unwrap();
    assert_eq!(amount(&updated["total_amount"]), dec("325.50"));

    let response = app
        .delete(&format!("/quotes/{}/items/{}", quote_id, item_id), &sales)
        .await;
    assert!(response.status().is_success());
    let updated: Value = response.json().await.unwrap();
    assert_eq!(amount(&updated["total_amount"]), dec("25.50"));
    assert_eq!(updated["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_items_are_rejected() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app.draft_quote(&sales, Uuid::new_v4(), &[]).await;
    let quote_id = quote["quote_id"].as_str().unwrap();

    let response = app
        .post(
            &format!("/quotes/{}/items", quote_id),
            &sales,
            json!({ "description": "Pump", "quantity": "0", "unit_price": "10.00" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .post(&format!("/quotes/{}/submit", quote_id), &sales, json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("at least one item"));
}

#[tokio::test]
async fn approval_flow_with_return_and_item_lock() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let approver = Actor::approver();
    let quote = app
        .draft_quote(&sales, Uuid::new_v4(), &[("100.00", None)])
        .await;
    let quote_id = quote["quote_id"].as_str().unwrap();

    app.post(&format!("/quotes/{}/submit", quote_id), &sales, json!({}))
        .await;

    // Salespeople cannot approve their own quotes
    let response = app
        .post(&format!("/quotes/{}/approve", quote_id), &sales, json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .post(&format!("/quotes/{}/return", quote_id), &approver, json!({}))
        .await;
    let returned: Value = response.json().await.unwrap();
    assert_eq!(returned["status"], "returned");

    // Returned quotes are editable again
    let response = app
        .post(
            &format!("/quotes/{}/items", quote_id),
            &sales,
            json!({ "description": "Filter", "quantity": "1", "unit_price": "5.00" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    app.post(&format!("/quotes/{}/submit", quote_id), &sales, json!({}))
        .await;
    let confirmed: Value = app
        .post(&format!("/quotes/{}/approve", quote_id), &approver, json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(confirmed["status"], "confirmed");
    assert!(!confirmed["confirmed_utc"].is_null());

    let response = app
        .post(
            &format!("/quotes/{}/items", quote_id),
            &sales,
            json!({ "description": "Late add", "quantity": "1", "unit_price": "5.00" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn cancel_is_refused_once_money_is_confirmed() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("100.00", None)])
        .await;
    let quote_id = quote["quote_id"].as_str().unwrap();

    app.post(
        &format!("/quotes/{}/payments", quote_id),
        &Actor::finance(),
        json!({ "amount": "150.00", "payment_method_id": Uuid::new_v4() }),
    )
    .await;

    let response = app
        .post(&format!("/quotes/{}/cancel", quote_id), &sales, json!({}))
        .await;
    assert_eq!(response.status().as_u16(), 409);

    let other = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("100.00", None)])
        .await;
    let cancelled: Value = app
        .post(
            &format!("/quotes/{}/cancel", other["quote_id"].as_str().unwrap()),
            &sales,
            json!({}),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(cancelled["status"], "cancelled");
}

#[tokio::test]
async fn downstream_document_is_linked_once() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("100.00", None)])
        .await;
    let quote_id = quote["quote_id"].as_str().unwrap();
    let shipment_id = Uuid::new_v4();

    let linked: Value = app
        .post(
            &format!("/quotes/{}/downstream", quote_id),
            &sales,
            json!({ "downstream_type": "shipment", "downstream_id": shipment_id }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(linked["downstream_type"], "shipment");
    assert_eq!(linked["downstream_id"], shipment_id.to_string());

    let response = app
        .post(
            &format!("/quotes/{}/downstream", quote_id),
            &sales,
            json!({ "downstream_type": "work_order", "downstream_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn unknown_quote_is_not_found() {
    let Some(app) = TestApp::spawn().await else { return };

    let response = app
        .get(&format!("/quotes/{}", Uuid::new_v4()), &Actor::sales())
        .await;
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NOT_FOUND");
}
