mod common;

use common::{amount, dec, Actor, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

async fn submit(app: &TestApp, quote_id: &str, actor: &Actor, value: &str) -> reqwest::Response {
    app.post(
        &format!("/quotes/{}/payments", quote_id),
        actor,
        json!({ "amount": value, "payment_method_id": Uuid::new_v4() }),
    )
    .await
}

async fn decide(app: &TestApp, payment_id: &str, decision: &str) -> Value {
    let response = app
        .post(
            &format!("/payments/{}/finance-confirm", payment_id),
            &Actor::finance(),
            json!({ "decision": decision }),
        )
        .await;
    assert!(response.status().is_success(), "finance decision failed");
    response.json().await.expect("Failed to parse decision")
}

#[tokio::test]
async fn partial_then_full_payment_reaches_paid() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("1000.00", None)])
        .await;
    let quote_id = quote["quote_id"].as_str().unwrap();

    let response = submit(&app, quote_id, &sales, "400.00").await;
    assert_eq!(response.status().as_u16(), 201);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["payment"]["status"], "submitted");
    assert_eq!(outcome["payment"]["is_finance_confirmed"], false);
    assert_eq!(outcome["quote"]["payment_status"], "unpaid");

    let decided = decide(&app, outcome["payment"]["payment_id"].as_str().unwrap(), "confirm").await;
    assert_eq!(decided["payment"]["status"], "confirmed");
    assert_eq!(decided["quote"]["payment_status"], "partial");
    assert_eq!(amount(&decided["quote"]["paid_amount"]), dec("400.00"));

    let outcome: Value = submit(&app, quote_id, &sales, "600.00").await.json().await.unwrap();
    let decided = decide(&app, outcome["payment"]["payment_id"].as_str().unwrap(), "confirm").await;
    assert_eq!(decided["quote"]["payment_status"], "paid");
    assert_eq!(amount(&decided["quote"]["paid_amount"]), dec("1000.00"));

    let payments: Value = app
        .get_json(&format!("/quotes/{}/payments", quote_id), &sales)
        .await;
    let confirmed: Decimal = payments
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["status"] == "confirmed")
        .map(|p| amount(&p["amount"]))
        .sum();
    assert_eq!(confirmed, dec("1000.00"));
}

#[tokio::test]
async fn finance_overpayment_is_confirmed_at_balance_with_credit() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("1000.00", None)])
        .await;
    let quote_id = quote["quote_id"].as_str().unwrap();

    let response = submit(&app, quote_id, &Actor::finance(), "1200.00").await;
    assert_eq!(response.status().as_u16(), 201);
    let outcome: Value = response.json().await.unwrap();

    assert_eq!(outcome["payment"]["status"], "confirmed");
    assert_eq!(outcome["payment"]["is_finance_confirmed"], true);
    assert_eq!(amount(&outcome["payment"]["amount"]), dec("1000.00"));
    assert_eq!(amount(&outcome["credit"]["amount"]), dec("200.00"));
    assert_eq!(outcome["quote"]["payment_status"], "paid");

    let credits: Value = app
        .get_json(&format!("/quotes/{}/credits", quote_id), &sales)
        .await;
    assert_eq!(credits.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn collector_cannot_exceed_unpaid_balance() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("100.00", None)])
        .await;
    let quote_id = quote["quote_id"].as_str().unwrap();

    let response = submit(&app, quote_id, &sales, "100.01").await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("unpaid balance"));
}

#[tokio::test]
async fn payments_require_confirmed_quote() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .draft_quote(&sales, Uuid::new_v4(), &[("100.00", None)])
        .await;

    let response = submit(&app, quote["quote_id"].as_str().unwrap(), &sales, "50.00").await;
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_STATE");
}

#[tokio::test]
async fn only_finance_decides_and_only_once() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("100.00", None)])
        .await;
    let outcome: Value = submit(&app, quote["quote_id"].as_str().unwrap(), &sales, "50.00")
        .await
        .json()
        .await
        .unwrap();
    let payment_id = outcome["payment"]["payment_id"].as_str().unwrap();

    let response = app
        .post(
            &format!("/payments/{}/finance-confirm", payment_id),
            &sales,
            json!({ "decision": "confirm" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 403);

    let decided = decide(&app, payment_id, "reject").await;
    assert_eq!(decided["payment"]["status"], "rejected");
    assert_eq!(decided["quote"]["payment_status"], "unpaid");

    let response = app
        .post(
            &format!("/payments/{}/finance-confirm", payment_id),
            &Actor::finance(),
            json!({ "decision": "confirm" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn missing_actor_headers_are_unauthorized() {
    let Some(app) = TestApp::spawn().await else { return };

    let response = app
        .client
        .get(format!("{}/payments/{}", app.address, Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn concurrent_confirms_keep_paid_amount_equal_to_confirmed_sum() {
    let Some(app) = TestApp::spawn().await else { return };
    let sales = Actor::sales();
    let quote = app
        .confirmed_quote(&sales, Uuid::new_v4(), &[("1000.00", None)])
        .await;
    let quote_id = quote["quote_id"].as_str().unwrap().to_string();

    let mut payment_ids = Vec::new();
    for _ in 0..10 {
        let response = submit(&app, &quote_id, &sales, "100.00").await;
        assert_eq!(response.status().as_u16(), 201);
        let outcome: Value = response.json().await.unwrap();
        payment_ids.push(outcome["payment"]["payment_id"].as_str().unwrap().to_string());
    }

    let mut handles = Vec::new();
    for payment_id in payment_ids {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            decide(&app, &payment_id, "confirm").await
        }));
    }
    for handle in handles {
        let decided = handle.await.unwrap();
        assert_eq!(decided["payment"]["status"], "confirmed");
    }

    let stored = app.get_json(&format!("/quotes/{}", quote_id), &sales).await;
    assert_eq!(amount(&stored["paid_amount"]), dec("1000.00"));
    assert_eq!(stored["payment_status"], "paid");

    let payments: Value = app
        .get_json(&format!("/quotes/{}/payments", quote_id), &sales)
        .await;
    let confirmed: Decimal = payments
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["status"] == "confirmed")
        .map(|p| amount(&p["amount"]))
        .sum();
    assert_eq!(confirmed, amount(&stored["paid_amount"]));
    assert_eq!(app.notifications_for(stored["quote_no"].as_str().unwrap()).len(), 1);
}
