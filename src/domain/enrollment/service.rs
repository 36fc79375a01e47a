//! The enrollment state machine.

use std::{future::Future, sync::Arc, time::Duration};

use tracing::{debug, info, instrument, warn};

use super::{
    attributes::AttributeDeriver,
    errors::{EnrollmentError, UpstreamError},
    models::{
        CardVersion, CredentialDescription, CredentialIdentifier, CredentialList, DocumentRecord,
        EnrollmentStartMessage, IssuanceState, RawAttributes, VerificationResultMessage,
    },
    ports::{DocumentVerifier, IdemixIssuer, IssuingServer},
};
use crate::{
    apdu::{ProtocolCommand, WireResponse, decode_responses},
    session::{
        EnrollmentSession, MemoryStore, SessionHandle, SessionManager, SessionState, SessionStore,
        random_bytes,
    },
};

type Result<T> = std::result::Result<T, EnrollmentError>;

/// 80 bits of freshness for each issuance.
pub const NONCE1_BYTES: usize = 10;
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives enrollment sessions from the start message to the last issued credential.
pub struct EnrollmentEngine<S: SessionStore = MemoryStore> {
    sessions: SessionManager<S>,
    deriver: AttributeDeriver,
    verifier: Arc<dyn DocumentVerifier>,
    issuer: Arc<dyn IdemixIssuer>,
    issuing_server: Arc<dyn IssuingServer>,
    upstream_timeout: Duration,
}

impl<S: SessionStore> EnrollmentEngine<S> {
    pub fn new(
        sessions: SessionManager<S>,
        deriver: AttributeDeriver,
        verifier: Arc<dyn DocumentVerifier>,
        issuer: Arc<dyn IdemixIssuer>,
        issuing_server: Arc<dyn IssuingServer>,
    ) -> Self {
        Self {
            sessions,
            deriver,
            verifier,
            issuer,
            issuing_server,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    /// Bounds every collaborator call.
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn sessions(&self) -> &SessionManager<S> {
        &self.sessions
    }

    /// Opens a new session and hands out its token and document nonce.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<EnrollmentStartMessage> {
        let (token, handle) = self.sessions.create().await?;
        let nonce = handle.lock().await.nonce().to_vec();
        info!(session = %short(&token), "Enrollment session started");
        Ok(EnrollmentStartMessage {
            session_token: token,
            nonce,
        })
    }

    /// Verifies the session's document and, on success, derives its credentials
    /// and announces them to the issuing server.
    ///
    /// A document that fails verification ends the session.
    #[instrument(skip_all, fields(session = %short(token)))]
    pub async fn verify_document(
        &self,
        token: &str,
        record: DocumentRecord,
    ) -> Result<VerificationResultMessage> {
        let handle = self.lookup(token).await?;
        let mut session = handle.lock().await;
        self.ensure_registered(token).await?;

        if session.state != SessionState::Started {
            warn!(state = ?session.state, "Document already submitted");
            return Err(EnrollmentError::Unauthorized(
                "document already verified for this session".into(),
            ));
        }

        let result = self
            .call("document verifier", self.verifier.verify(&record, session.nonce()))
            .await?;
        if !result.is_success() {
            info!(?result, "Document verification failed, closing session");
            self.sessions.remove(token).await?;
            return Ok(VerificationResultMessage::new(result));
        }

        let credentials = match self.deriver.derive(&record) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(error = %e, "Cannot derive attributes, closing session");
                self.sessions.remove(token).await?;
                return Err(e.into());
            }
        };
        debug!(credentials = credentials.len(), "Derived credentials");
        session.mark_verified(record, credentials);

        let credentials = session.credentials().cloned().unwrap_or_default();
        let issuing_ref = self
            .call(
                "issuing server",
                self.issuing_server.create_session(&credentials),
            )
            .await?;
        info!("Document verified");

        Ok(VerificationResultMessage {
            result,
            issuing_session_ref: Some(issuing_ref),
        })
    }

    /// Credentials offered to a verified session.
    #[instrument(skip_all, fields(session = %short(token)))]
    pub async fn credential_list(&self, token: &str) -> Result<CredentialList> {
        let handle = self.lookup(token).await?;
        let session = handle.lock().await;
        self.ensure_registered(token).await?;
        Ok(verified_credentials(&session)?.clone())
    }

    /// Begins issuing `credential` and returns the commands for the card.
    #[instrument(skip(self, token, card_version), fields(session = %short(token)))]
    pub async fn start_issuance(
        &self,
        token: &str,
        credential: &str,
        card_version: CardVersion,
    ) -> Result<Vec<ProtocolCommand>> {
        let id = self.resolve_credential(credential)?;
        let handle = self.lookup(token).await?;
        let mut session = handle.lock().await;
        self.ensure_registered(token).await?;

        let attributes = offered_attributes(&session, &id)?;
        let raw_attributes = RawAttributes::from_attributes(id.clone(), attributes);
        let description = CredentialDescription::new(id.clone(), attributes);
        let nonce1 = random_bytes(NONCE1_BYTES);

        session.begin_issuance(
            id.clone(),
            IssuanceState {
                raw_attributes: raw_attributes.clone(),
                nonce1: nonce1.clone(),
                card_version: card_version.clone(),
            },
        );

        let commands = self
            .call(
                "idemix issuer",
                self.issuer
                    .commitment_commands(&card_version, &description, &raw_attributes, &nonce1),
            )
            .await?;
        info!(%id, commands = commands.len(), "Issuance started");
        Ok(commands)
    }

    /// Completes issuing `credential` from the card's responses and returns the
    /// commands that store the signature.
    ///
    /// The pending issuance is only consumed once the signature commands are
    /// built, so a failed collaborator call can be retried with the same responses.
    #[instrument(skip(self, token, responses), fields(session = %short(token)))]
    pub async fn finish_issuance(
        &self,
        token: &str,
        credential: &str,
        responses: Vec<WireResponse>,
    ) -> Result<Vec<ProtocolCommand>> {
        let id = self.resolve_credential(credential)?;
        let handle = self.lookup(token).await?;
        let mut session = handle.lock().await;
        self.ensure_registered(token).await?;

        let attributes = offered_attributes(&session, &id)?;
        let description = CredentialDescription::new(id.clone(), attributes);
        let responses = decode_responses(responses)?;
        for response in &responses {
            if let Ok(status) = response.status()
                && !status.is_success()
            {
                debug!(key = %response.key, %status, "Card reported an error status");
            }
        }

        let state = session.issuance(&id).ok_or_else(|| {
            EnrollmentError::Unauthorized(format!("issuance of {id} was not started"))
        })?;

        let commitment = self
            .call(
                "idemix issuer",
                self.issuer.parse_commitment(&state.card_version, &responses),
            )
            .await?;
        let signature = self
            .call(
                "idemix issuer",
                self.issuer.issue_signature(
                    &commitment,
                    &description,
                    &state.raw_attributes,
                    &state.nonce1,
                ),
            )
            .await?;
        let commands = self
            .call(
                "idemix issuer",
                self.issuer
                    .signature_commands(&state.card_version, &description, &signature),
            )
            .await?;

        session.take_issuance(&id);
        info!(%id, "Issuance finished");
        Ok(commands)
    }

    /// Accepts either a bare credential type or a full `scheme.issuer.credential` identifier.
    fn resolve_credential(&self, name: &str) -> Result<CredentialIdentifier> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EnrollmentError::InputInvalid("missing credential name".into()));
        }
        if name.contains('.') {
            return name
                .parse()
                .map_err(|e: super::models::InvalidIdentifier| {
                    EnrollmentError::InputInvalid(e.to_string())
                });
        }
        Ok(self.deriver.credential_id(name))
    }

    async fn lookup(&self, token: &str) -> Result<SessionHandle> {
        if token.is_empty() {
            return Err(EnrollmentError::InputInvalid("missing session token".into()));
        }
        self.sessions
            .get(token)
            .await?
            .ok_or(EnrollmentError::SessionUnknown)
    }

    /// A request may have waited on the lock of a session another request removed.
    async fn ensure_registered(&self, token: &str) -> Result<()> {
        if self.sessions.contains(token).await? {
            Ok(())
        } else {
            Err(EnrollmentError::SessionUnknown)
        }
    }

    async fn call<T>(
        &self,
        service: &'static str,
        request: impl Future<Output = std::result::Result<T, UpstreamError>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.upstream_timeout, request).await {
            Ok(result) => result.map_err(|e| {
                warn!(service, error = %e, "Collaborator call failed");
                e.into()
            }),
            Err(_) => {
                warn!(service, "Collaborator call timed out");
                Err(UpstreamError::Timeout {
                    service,
                    secs: self.upstream_timeout.as_secs(),
                }
                .into())
            }
        }
    }
}

fn verified_credentials(session: &EnrollmentSession) -> Result<&CredentialList> {
    match session.credentials() {
        Some(credentials) if session.state.is_verified() => Ok(credentials),
        _ => Err(EnrollmentError::Unauthorized(
            "document not verified".into(),
        )),
    }
}

fn offered_attributes<'a>(
    session: &'a EnrollmentSession,
    id: &CredentialIdentifier,
) -> Result<&'a std::collections::BTreeMap<String, String>> {
    verified_credentials(session)?
        .get(id)
        .ok_or_else(|| EnrollmentError::Unauthorized(format!("credential {id} not offered")))
}

/// Enough of the token to correlate log lines without leaking the capability.
fn short(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
