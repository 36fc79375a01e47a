//! Collaborators the enrollment engine depends on.

use async_trait::async_trait;

use super::{
    errors::UpstreamError,
    models::{
        CardVersion, CommitmentMessage, CredentialDescription, CredentialList, DocumentRecord,
        IssuingSessionRef, RawAttributes, SignatureMessage, VerificationResult,
    },
};
use crate::apdu::{ProtocolCommand, ProtocolResponse};

type Result<T> = std::result::Result<T, UpstreamError>;

/// Checks the authenticity of a document and its active authentication response.
#[async_trait]
pub trait DocumentVerifier: Send + Sync {
    async fn verify(&self, record: &DocumentRecord, nonce: &[u8]) -> Result<VerificationResult>;
}

/// The idemix issuer, driving the card through the issuance protocol.
#[async_trait]
pub trait IdemixIssuer: Send + Sync {
    /// Commands asking the card to commit to its secret key.
    async fn commitment_commands(
        &self,
        card_version: &CardVersion,
        description: &CredentialDescription,
        attributes: &RawAttributes,
        nonce1: &[u8],
    ) -> Result<Vec<ProtocolCommand>>;

    /// Extracts the card's commitment from its responses.
    async fn parse_commitment(
        &self,
        card_version: &CardVersion,
        responses: &[ProtocolResponse],
    ) -> Result<CommitmentMessage>;

    /// Signs the credential over the card's commitment.
    async fn issue_signature(
        &self,
        commitment: &CommitmentMessage,
        description: &CredentialDescription,
        attributes: &RawAttributes,
        nonce1: &[u8],
    ) -> Result<SignatureMessage>;

    /// Commands storing the signature on the card.
    async fn signature_commands(
        &self,
        card_version: &CardVersion,
        description: &CredentialDescription,
        signature: &SignatureMessage,
    ) -> Result<Vec<ProtocolCommand>>;
}

/// The server that issues credentials to the holder's app.
#[async_trait]
pub trait IssuingServer: Send + Sync {
    /// Announces the credentials to issue and returns where the client picks them up.
    async fn create_session(&self, credentials: &CredentialList) -> Result<IssuingSessionRef>;
}

/// Produces compact JWS tokens.
pub trait JwtSigner: Send + Sync {
    /// The `alg` header value.
    fn algorithm(&self) -> &'static str;

    /// Signs `message` (the encoded header and claims joined by a dot).
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}
