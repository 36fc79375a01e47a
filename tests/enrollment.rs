mod common;

use std::collections::HashSet;

use enrollment_server::domain::enrollment::models::VerificationResult;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

async fn start(client: &Client, addr: &str, document: &str) -> Value {
    let response = client
        .get(format!("{addr}/v2/{document}/start"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

async fn verify(client: &Client, addr: &str, document: &str, body: &Value) -> (StatusCode, Value) {
    let response = client
        .post(format!("{addr}/v2/{document}/verify-document"))
        .json(body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_start_returns_distinct_tokens() {
    let server = common::spawn_server().await;
    let client = Client::new();

    let mut tokens = HashSet::new();
    for document in ["passport", "dl", "passport", "dl"] {
        let body = start(&client, &server.addr, document).await;
        let token = body["sessionToken"].as_str().unwrap().to_string();
        assert!(token.len() >= 20);
        assert!(body["nonce"].as_str().is_some());
        assert!(tokens.insert(token));
    }
}

#[tokio::test]
async fn test_passport_verification_derives_attributes() {
    let server = common::spawn_server().await;
    let client = Client::new();

    let token = start(&client, &server.addr, "passport").await["sessionToken"]
        .as_str()
        .unwrap()
        .to_string();
    let (status, body) = verify(
        &client,
        &server.addr,
        "passport",
        &common::passport_body(&token),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "success");
    assert_eq!(body["issuingSessionRef"]["version"], "2.0");

    let announced = server.issuing_server.announced.lock().unwrap()[0].clone();
    let announced = serde_json::to_value(announced).unwrap();
    assert_eq!(announced["irma-demo.MijnOverheid.ageLower"]["over21"], "yes");
    assert_eq!(announced["irma-demo.MijnOverheid.ageHigher"]["over50"], "no");
    assert_eq!(
        announced["irma-demo.MijnOverheid.fullName"],
        json!({
            "familyname": "Berg",
            "prefix": "van der",
            "firstnames": "Jan-Willem Pieter",
            "firstname": "Jan-Willem"
        })
    );
    assert_eq!(announced["irma-demo.MijnOverheid.idDocument"]["type"], "Passport");
    assert_eq!(
        announced["irma-demo.MijnOverheid.idDocument"]["expires"],
        "Apr 5, 2030"
    );

    // No replay on the same session
    let (status, body) = verify(
        &client,
        &server.addr,
        "passport",
        &common::passport_body(&token),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_licence_verification() {
    let server = common::spawn_server().await;
    let client = Client::new();

    let token = start(&client, &server.addr, "dl").await["sessionToken"]
        .as_str()
        .unwrap()
        .to_string();
    let (status, body) = verify(&client, &server.addr, "dl", &common::licence_body(&token)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let announced = server.issuing_server.announced.lock().unwrap()[0].clone();
    let announced = serde_json::to_value(announced).unwrap();
    assert_eq!(announced["irma-demo.MijnOverheid.fullName"]["familyname"], "O'Brien");
    assert_eq!(announced["irma-demo.MijnOverheid.fullName"]["prefix"], "");
    assert_eq!(announced["irma-demo.MijnOverheid.ageHigher"]["over75"], "yes");
    assert_eq!(
        announced["irma-demo.MijnOverheid.idDocument"]["type"],
        "Driving licence"
    );
}

#[tokio::test]
async fn test_failed_verification_ends_session() {
    let server = common::spawn_server().await;
    let client = Client::new();
    *server.verifier.result.lock().unwrap() = VerificationResult::NonceMismatch;

    let token = start(&client, &server.addr, "passport").await["sessionToken"]
        .as_str()
        .unwrap()
        .to_string();
    let (status, body) = verify(
        &client,
        &server.addr,
        "passport",
        &common::passport_body(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": "nonce_mismatch"}));

    let (status, body) = verify(
        &client,
        &server.addr,
        "passport",
        &common::passport_body(&token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "SESSION_UNKNOWN");
}

#[tokio::test]
async fn test_unknown_session_and_malformed_body() {
    let server = common::spawn_server().await;
    let client = Client::new();

    let (status, body) = verify(
        &client,
        &server.addr,
        "passport",
        &common::passport_body("does-not-exist"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "SESSION_UNKNOWN");

    let mut missing_token = common::passport_body("x");
    missing_token.as_object_mut().unwrap().remove("sessionToken");
    let (status, body) = verify(&client, &server.addr, "passport", &missing_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "MALFORMED_INPUT");
    assert_eq!(body["status"], 400);

    let response = client
        .post(format!("{}/v2/passport/verify-document", server.addr))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "MALFORMED_INPUT");
}

#[tokio::test]
async fn test_unparseable_dates() {
    let server = common::spawn_server().await;
    let client = Client::new();

    let token = start(&client, &server.addr, "passport").await["sessionToken"]
        .as_str()
        .unwrap()
        .to_string();
    let mut body = common::passport_body(&token);
    body["dateOfBirth"] = json!("99AB01");

    let (status, body) = verify(&client, &server.addr, "passport", &body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "ATTRIBUTES_UNAVAILABLE");
}
