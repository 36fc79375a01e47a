use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{endpoint, post_json};
use crate::domain::enrollment::{
    UpstreamError,
    models::{DocumentRecord, VerificationResult},
    ports::DocumentVerifier,
};

const SERVICE: &str = "document verifier";

#[derive(Serialize)]
struct VerifyRequest<'a> {
    document: &'a DocumentRecord,
    nonce: String,
}

#[derive(Deserialize)]
struct VerifyResponse {
    result: VerificationResult,
}

/// Delegates passive and active authentication of documents to a verification service.
#[derive(Debug, Clone)]
pub struct HttpDocumentVerifier {
    client: Client,
    url: String,
}

impl HttpDocumentVerifier {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            url: endpoint(base_url, "verify"),
        }
    }
}

#[async_trait]
impl DocumentVerifier for HttpDocumentVerifier {
    async fn verify(
        &self,
        record: &DocumentRecord,
        nonce: &[u8],
    ) -> Result<VerificationResult, UpstreamError> {
        let request = VerifyRequest {
            document: record,
            nonce: STANDARD.encode(nonce),
        };
        let response: VerifyResponse = post_json(&self.client, SERVICE, &self.url, &request).await?;
        Ok(response.result)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    use super::*;
    use crate::adapters::{build_client, tests::serve};
    use crate::domain::enrollment::models::EdlRecord;

    fn record() -> DocumentRecord {
        DocumentRecord::DrivingLicence(EdlRecord {
            document_number: "5123456789".into(),
            issuing_member_state: "NLD".into(),
            family_name: "JANSEN".into(),
            given_names: "ANNA".into(),
            date_of_birth: "02031985".into(),
            date_of_expiry: "01022031".into(),
            sod_file: vec![1],
            dg1_file: vec![2],
            dg13_file: None,
            response: Some(vec![3]),
        })
    }

    #[tokio::test]
    async fn test_verify_posts_document_and_nonce() {
        let app = Router::new().route(
            "/verify",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["nonce"], "AQIDBAUGBwg=");
                assert_eq!(body["document"]["documentType"], "driving_licence");
                assert_eq!(body["document"]["response"], "Aw==");
                Json(json!({"result": "hashes_invalid"}))
            }),
        );
        let base = serve(app).await;
        let verifier = HttpDocumentVerifier::new(build_client(Duration::from_secs(5)).unwrap(), &base);

        let result = verifier
            .verify(&record(), &[1, 2, 3, 4, 5, 6, 7, 8])
            .await
            .unwrap();
        assert_eq!(result, VerificationResult::HashesInvalid);
    }

    #[tokio::test]
    async fn test_verify_rejects_error_status() {
        let app = Router::new().route(
            "/verify",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(app).await;
        let verifier = HttpDocumentVerifier::new(build_client(Duration::from_secs(5)).unwrap(), &base);

        let err = verifier.verify(&record(), &[0; 8]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Rejected { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_verify_rejects_unknown_result() {
        let app = Router::new().route(
            "/verify",
            post(|| async { Json(json!({"result": "maybe"})) }),
        );
        let base = serve(app).await;
        let verifier = HttpDocumentVerifier::new(build_client(Duration::from_secs(5)).unwrap(), &base);

        let err = verifier.verify(&record(), &[0; 8]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Malformed { .. }), "{err}");
    }
}
