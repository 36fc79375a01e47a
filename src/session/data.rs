use std::collections::BTreeMap;

use crate::domain::enrollment::models::{
    CredentialIdentifier, CredentialList, DocumentRecord, IssuanceState,
};

/// Progress of an enrollment session. Finished or failed sessions are removed from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Started,
    DocumentVerified,
    Issuing,
}

impl SessionState {
    /// Whether the identity document of the session has been verified.
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::DocumentVerified | Self::Issuing)
    }
}

/// One enrollment attempt, from the start message up to the last issued credential.
#[derive(Debug, Clone)]
pub struct EnrollmentSession {
    token: String,
    nonce: Vec<u8>,
    pub state: SessionState,
    document: Option<DocumentRecord>,
    credentials: Option<CredentialList>,
    issuance: BTreeMap<CredentialIdentifier, IssuanceState>,
}

impl EnrollmentSession {
    pub fn new(token: impl Into<String>, nonce: Vec<u8>) -> Self {
        Self {
            token: token.into(),
            nonce,
            state: SessionState::Started,
            document: None,
            credentials: None,
            issuance: BTreeMap::new(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    pub fn credentials(&self) -> Option<&CredentialList> {
        self.credentials.as_ref()
    }

    /// Records the verified document and the credentials derived from it.
    ///
    /// Both are write-once; a session that already holds a document keeps it.
    pub fn mark_verified(&mut self, document: DocumentRecord, credentials: CredentialList) {
        if self.document.is_some() {
            return;
        }
        self.document = Some(document);
        self.credentials = Some(credentials);
        self.state = SessionState::DocumentVerified;
    }

    pub fn begin_issuance(&mut self, credential: CredentialIdentifier, state: IssuanceState) {
        self.issuance.insert(credential, state);
        self.state = SessionState::Issuing;
    }

    /// Removes and returns the pending issuance of `credential` once it has completed.
    pub fn take_issuance(&mut self, credential: &CredentialIdentifier) -> Option<IssuanceState> {
        self.issuance.remove(credential)
    }

    pub fn issuance(&self, credential: &CredentialIdentifier) -> Option<&IssuanceState> {
        self.issuance.get(credential)
    }
}
