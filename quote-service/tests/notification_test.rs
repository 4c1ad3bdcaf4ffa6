mod common;

use common::{Actor, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn warehouse_cc_is_sent_once_across_edits_and_approval() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .draft_quote(&sales, Uuid::new_v4(), &[("100.00", Some("HQ"))])
        .await;
    let quote_id = quote["quote_id"].as_str().unwrap();
    let quote_no = quote["quote_no"].as_str().unwrap();
    assert_eq!(quote["is_warehouse_cc_sent"], true);

    // A second headquarters line triggers the same gate again
    let response = app
        .post(
            &format!("/quotes/{}/items", quote_id),
            &sales,
            json!({
                "description": "Seal kit",
                "quantity": "2",
                "unit_price": "15.00",
                "warehouse_code": "hq"
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    app.post(&format!("/quotes/{}/submit", quote_id), &sales, json!({}))
        .await;
    app.post(&format!("/quotes/{}/approve", quote_id), &Actor::approver(), json!({}))
        .await;

    let sent = app.notifications_for(quote_no);
    assert_eq!(sent.len(), 1, "expected exactly one notification, got {:?}", sent);
    assert!(sent[0].contains("headquarters"));

    let recorded = app.notifier.sent();
    let cc = recorded
        .iter()
        .find(|n| n.title.contains(quote_no))
        .unwrap();
    assert_eq!(cc.recipient_id, app.warehouse_recipient);
    assert_eq!(cc.target_url, format!("http://quotes.test/quotes/{}", quote_id));
}

#[tokio::test]
async fn item_response_reports_the_cc_flag_it_just_set() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app.draft_quote(&sales, Uuid::new_v4(), &[("10.00", None)]).await;
    let quote_id = quote["quote_id"].as_str().unwrap();
    assert_eq!(quote["is_warehouse_cc_sent"], false);

    let response = app
        .post(
            &format!("/quotes/{}/items", quote_id),
            &sales,
            json!({
                "description": "Bearing",
                "quantity": "1",
                "unit_price": "8.00",
                "warehouse_code": "HQ"
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["is_warehouse_cc_sent"], true);

    let stored = app.get_json(&format!("/quotes/{}", quote_id), &sales).await;
    assert_eq!(stored["is_warehouse_cc_sent"], true);
    assert_eq!(app.notifications_for(quote["quote_no"].as_str().unwrap()).len(), 1);
}

#[tokio::test]
async fn quotes_without_headquarters_stock_send_no_cc() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .draft_quote(&sales, Uuid::new_v4(), &[("100.00", Some("EAST")), ("20.00", None)])
        .await;

    assert_eq!(quote["is_warehouse_cc_sent"], false);
    assert!(app
        .notifications_for(quote["quote_no"].as_str().unwrap())
        .is_empty());
}

#[tokio::test]
async fn ship_notice_is_sent_once_when_confirmed_quote_is_paid() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let finance = Actor::finance();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("1000.00", None)])
        .await;
    let quote_id = quote["quote_id"].as_str().unwrap();
    let quote_no = quote["quote_no"].as_str().unwrap();

    let mut payment_ids = Vec::new();
    for value in ["600.00", "400.00"] {
        let outcome: Value = app
            .post(
                &format!("/quotes/{}/payments", quote_id),
                &sales,
                json!({ "amount": value, "payment_method_id": Uuid::new_v4() }),
            )
            .await
            .json()
            .await
            .unwrap();
        payment_ids.push(outcome["payment"]["payment_id"].as_str().unwrap().to_string());
    }

    app.post(
        &format!("/payments/{}/finance-confirm", payment_ids[0]),
        &finance,
        json!({ "decision": "confirm" }),
    )
    .await;
    assert!(app.notifications_for(quote_no).is_empty());

    let decided: Value = app
        .post(
            &format!("/payments/{}/finance-confirm", payment_ids[1]),
            &finance,
            json!({ "decision": "confirm" }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decided["quote"]["payment_status"], "paid");
    assert_eq!(decided["quote"]["is_warehouse_ship_sent"], true);

    let sent = app.notifications_for(quote_no);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("ready to ship"));
}
