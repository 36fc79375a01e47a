use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::Serialize;

use super::http::{endpoint, post_json};
use crate::{
    apdu::{ProtocolCommand, ProtocolResponse, WireCommand, WireResponse, decode_commands},
    domain::enrollment::{
        UpstreamError,
        models::{
            CardVersion, CommitmentMessage, CredentialDescription, RawAttributes,
            SignatureMessage,
        },
        ports::IdemixIssuer,
    },
};

const SERVICE: &str = "idemix issuer";

/// Attribute bytes as base64 strings.
#[derive(Serialize)]
struct AttributesBody {
    credential: String,
    values: BTreeMap<String, String>,
}

impl From<&RawAttributes> for AttributesBody {
    fn from(attributes: &RawAttributes) -> Self {
        Self {
            credential: attributes.credential.to_string(),
            values: attributes
                .values
                .iter()
                .map(|(name, value)| (name.clone(), STANDARD.encode(value)))
                .collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitmentCommandsRequest<'a> {
    card_version: &'a CardVersion,
    description: &'a CredentialDescription,
    attributes: AttributesBody,
    nonce1: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitmentRequest<'a> {
    card_version: &'a CardVersion,
    responses: Vec<WireResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignatureRequest<'a> {
    commitment: &'a CommitmentMessage,
    description: &'a CredentialDescription,
    attributes: AttributesBody,
    nonce1: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignatureCommandsRequest<'a> {
    card_version: &'a CardVersion,
    description: &'a CredentialDescription,
    signature: &'a SignatureMessage,
}

/// Client for an idemix issuing service holding the issuer's secret key.
#[derive(Debug, Clone)]
pub struct HttpIdemixIssuer {
    client: Client,
    base_url: String,
}

impl HttpIdemixIssuer {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn commands<Req: Serialize>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Vec<ProtocolCommand>, UpstreamError> {
        let url = endpoint(&self.base_url, path);
        let batch: Vec<WireCommand> = post_json(&self.client, SERVICE, &url, body).await?;
        decode_commands(batch).map_err(|e| UpstreamError::Malformed {
            service: SERVICE,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl IdemixIssuer for HttpIdemixIssuer {
    async fn commitment_commands(
        &self,
        card_version: &CardVersion,
        description: &CredentialDescription,
        attributes: &RawAttributes,
        nonce1: &[u8],
    ) -> Result<Vec<ProtocolCommand>, UpstreamError> {
        let body = CommitmentCommandsRequest {
            card_version,
            description,
            attributes: attributes.into(),
            nonce1: hex::encode(nonce1),
        };
        self.commands("commitment-commands", &body).await
    }

    async fn parse_commitment(
        &self,
        card_version: &CardVersion,
        responses: &[ProtocolResponse],
    ) -> Result<CommitmentMessage, UpstreamError> {
        let body = CommitmentRequest {
            card_version,
            responses: responses.iter().cloned().map(WireResponse::from).collect(),
        };
        let url = endpoint(&self.base_url, "commitment");
        post_json(&self.client, SERVICE, &url, &body).await
    }

    async fn issue_signature(
        &self,
        commitment: &CommitmentMessage,
        description: &CredentialDescription,
        attributes: &RawAttributes,
        nonce1: &[u8],
    ) -> Result<SignatureMessage, UpstreamError> {
        let body = SignatureRequest {
            commitment,
            description,
            attributes: attributes.into(),
            nonce1: hex::encode(nonce1),
        };
        let url = endpoint(&self.base_url, "signature");
        post_json(&self.client, SERVICE, &url, &body).await
    }

    async fn signature_commands(
        &self,
        card_version: &CardVersion,
        description: &CredentialDescription,
        signature: &SignatureMessage,
    ) -> Result<Vec<ProtocolCommand>, UpstreamError> {
        let body = SignatureCommandsRequest {
            card_version,
            description,
            signature,
        };
        self.commands("signature-commands", &body).await
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, time::Duration};

    use axum::{Json, Router, routing::post};
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        adapters::{build_client, tests::serve},
        domain::enrollment::models::CredentialIdentifier,
    };

    fn description() -> (CredentialDescription, RawAttributes) {
        let id = CredentialIdentifier::new("irma-demo", "MijnOverheid", "ageLower");
        let attrs = BTreeMap::from([("over18".to_string(), "yes".to_string())]);
        (
            CredentialDescription::new(id.clone(), &attrs),
            RawAttributes::from_attributes(id, &attrs),
        )
    }

    fn stub() -> Router {
        Router::new()
            .route(
                "/commitment-commands",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["cardVersion"], "AQI=");
                    assert_eq!(body["nonce1"], "0a0b0c0d0e0f10111213");
                    assert_eq!(body["attributes"]["credential"], "irma-demo.MijnOverheid.ageLower");
                    assert_eq!(body["attributes"]["values"]["over18"], "eWVz");
                    assert_eq!(body["description"]["attributeNames"], json!(["over18"]));
                    Json(json!([{"key": "start", "command": "8010000000"}]))
                }),
            )
            .route(
                "/commitment",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["responses"], json!([{"key": "start", "apdu": "9000"}]));
                    Json(json!({"U": "1234"}))
                }),
            )
            .route(
                "/signature",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({"A": "99", "commitment": body["commitment"]}))
                }),
            )
            .route(
                "/signature-commands",
                post(|| async { Json(json!([{"key": "sig", "command": "zz"}])) }),
            )
    }

    #[tokio::test]
    async fn test_issuance_round() {
        let base = serve(stub()).await;
        let issuer = HttpIdemixIssuer::new(build_client(Duration::from_secs(5)).unwrap(), base);
        let (description, attributes) = description();
        let card_version = CardVersion(vec![1, 2]);
        let nonce1: Vec<u8> = (10..20).collect();

        let commands = issuer
            .commitment_commands(&card_version, &description, &attributes, &nonce1)
            .await
            .unwrap();
        assert_eq!(commands[0].key, "start");
        assert_eq!(commands[0].apdu, vec![0x80, 0x10, 0x00, 0x00, 0x00]);

        let responses = vec![ProtocolResponse::new("start", vec![0x90, 0x00]).unwrap()];
        let commitment = issuer
            .parse_commitment(&card_version, &responses)
            .await
            .unwrap();
        assert_eq!(commitment.0, json!({"U": "1234"}));

        let signature = issuer
            .issue_signature(&commitment, &description, &attributes, &nonce1)
            .await
            .unwrap();
        assert_eq!(signature.0["commitment"]["U"], "1234");
    }

    #[tokio::test]
    async fn test_malformed_command_batch() {
        let base = serve(stub()).await;
        let issuer = HttpIdemixIssuer::new(build_client(Duration::from_secs(5)).unwrap(), base);
        let (description, _) = description();

        let err = issuer
            .signature_commands(
                &CardVersion(vec![1]),
                &description,
                &SignatureMessage(json!({})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Malformed { .. }), "{err}");
    }
}
