#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use enrollment_server::{
    apdu::{ProtocolCommand, ProtocolResponse},
    config::{Config, TlsConfig},
    domain::enrollment::{
        AttributeDeriver, EnrollmentEngine, UpstreamError,
        models::{
            CardVersion, CommitmentMessage, CredentialDescription, CredentialList,
            DocumentRecord, IssuingSessionRef, RawAttributes, SignatureMessage,
            VerificationResult,
        },
        ports::{DocumentVerifier, IdemixIssuer, IssuingServer},
    },
    server::Server,
    session::{MemoryStore, SessionManager},
};
use serde_json::{Value, json};

/// Answers every document with the configured result.
pub struct MockVerifier {
    pub result: Mutex<VerificationResult>,
}

#[async_trait]
impl DocumentVerifier for MockVerifier {
    async fn verify(
        &self,
        _record: &DocumentRecord,
        nonce: &[u8],
    ) -> Result<VerificationResult, UpstreamError> {
        assert_eq!(nonce.len(), 8);
        Ok(*self.result.lock().unwrap())
    }
}

pub struct MockIssuer;

#[async_trait]
impl IdemixIssuer for MockIssuer {
    async fn commitment_commands(
        &self,
        _card_version: &CardVersion,
        _description: &CredentialDescription,
        _attributes: &RawAttributes,
        _nonce1: &[u8],
    ) -> Result<Vec<ProtocolCommand>, UpstreamError> {
        Ok(vec![
            ProtocolCommand::new("start_issuance", vec![0x80, 0x10, 0x00, 0x00, 0x00]).unwrap(),
            ProtocolCommand::new("commitment", vec![0x80, 0x1A, 0x00, 0x00]).unwrap(),
        ])
    }

    async fn parse_commitment(
        &self,
        _card_version: &CardVersion,
        responses: &[ProtocolResponse],
    ) -> Result<CommitmentMessage, UpstreamError> {
        Ok(CommitmentMessage(json!({ "count": responses.len() })))
    }

    async fn issue_signature(
        &self,
        commitment: &CommitmentMessage,
        _description: &CredentialDescription,
        _attributes: &RawAttributes,
        _nonce1: &[u8],
    ) -> Result<SignatureMessage, UpstreamError> {
        Ok(SignatureMessage(commitment.0.clone()))
    }

    async fn signature_commands(
        &self,
        _card_version: &CardVersion,
        _description: &CredentialDescription,
        _signature: &SignatureMessage,
    ) -> Result<Vec<ProtocolCommand>, UpstreamError> {
        Ok(vec![
            ProtocolCommand::new("signature_A", vec![0x80, 0x1C, 0x01, 0x00]).unwrap(),
            ProtocolCommand::new("signature_e", vec![0x80, 0x1C, 0x02, 0x00]).unwrap(),
        ])
    }
}

/// Records the announced credential lists.
#[derive(Default)]
pub struct MockIssuingServer {
    pub announced: Mutex<Vec<CredentialList>>,
}

#[async_trait]
impl IssuingServer for MockIssuingServer {
    async fn create_session(
        &self,
        credentials: &CredentialList,
    ) -> Result<IssuingSessionRef, UpstreamError> {
        self.announced.lock().unwrap().push(credentials.clone());
        Ok(IssuingSessionRef {
            url: "https://issuer.test/irma_api_server/api/v2/issue/qr".into(),
            version: "2.0".into(),
        })
    }
}

pub struct TestServer {
    pub addr: String,
    pub verifier: Arc<MockVerifier>,
    pub issuing_server: Arc<MockIssuingServer>,
}

// Helper function to spawn a test server on a random port
pub async fn spawn_server() -> TestServer {
    spawn_server_with(None).await
}

/// Serves over TLS with the self-signed certificate from `test_data/`.
pub async fn spawn_tls_server() -> TestServer {
    let test_data = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("test_data");
    spawn_server_with(Some(TlsConfig {
        cert_path: test_data.join("tls_server.crt"),
        key_path: test_data.join("tls_server.key"),
    }))
    .await
}

async fn spawn_server_with(tls: Option<TlsConfig>) -> TestServer {
    let config = {
        let mut config = Config::load_with_sources(Some(HashMap::new())).unwrap();
        config.server.host = "127.0.0.1".to_string();
        // Use a random OS port
        config.server.port = 0;
        config.server.tls = tls;
        config
    };
    let scheme = if config.server.tls.is_some() {
        "https"
    } else {
        "http"
    };

    let verifier = Arc::new(MockVerifier {
        result: Mutex::new(VerificationResult::Success),
    });
    let issuing_server = Arc::new(MockIssuingServer::default());
    let engine = EnrollmentEngine::new(
        SessionManager::new(MemoryStore::new()),
        AttributeDeriver::new(&config.credentials.scheme_manager, &config.credentials.issuer),
        verifier.clone(),
        Arc::new(MockIssuer),
        issuing_server.clone(),
    );

    let server = Server::new(Arc::new(engine), config.server.clone());
    let (port, _handle) = server.run_with_port().await.unwrap();

    TestServer {
        addr: format!("{scheme}://{}:{}", config.server.host, port),
        verifier,
        issuing_server,
    }
}

/// Passport of a holder who turned 25 on January 1st of this year.
pub fn passport_body(session_token: &str) -> Value {
    let year = (Utc::now().year() - 25).rem_euclid(100);
    json!({
        "sessionToken": session_token,
        "documentNumber": "NX1234567",
        "documentCode": "P<",
        "nationality": "NLD",
        "primaryIdentifier": "VAN DER BERG",
        "secondaryIdentifiers": ["JAN-WILLEM", "PIETER"],
        "dateOfBirth": format!("{year:02}0101"),
        "dateOfExpiry": "300405",
        "sodFile": "d4IBAA==",
        "dg1File": "YQ==",
        "response": "AQID"
    })
}

pub fn licence_body(session_token: &str) -> Value {
    json!({
        "sessionToken": session_token,
        "documentNumber": "5123456789",
        "issuingMemberState": "NLD",
        "familyName": "O'BRIEN",
        "givenNames": "ANNA MARIA",
        "dateOfBirth": "02031950",
        "dateOfExpiry": "01022031",
        "sodFile": "d4IBAA==",
        "dg1File": "YQ=="
    })
}
