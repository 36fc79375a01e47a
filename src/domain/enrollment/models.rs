use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Attribute name to attribute value, per credential.
pub type CredentialAttributes = BTreeMap<String, String>;

/// Credentials offered to a session after its document was verified.
pub type CredentialList = BTreeMap<CredentialIdentifier, CredentialAttributes>;

/// Scheme manager, issuer and credential type naming a credential template.
///
/// Displayed and serialized as `scheme.issuer.credential` so it can be used as a JSON map key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CredentialIdentifier {
    pub scheme_manager: String,
    pub issuer: String,
    pub credential: String,
}

impl CredentialIdentifier {
    pub fn new(
        scheme_manager: impl Into<String>,
        issuer: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            scheme_manager: scheme_manager.into(),
            issuer: issuer.into(),
            credential: credential.into(),
        }
    }
}

impl fmt::Display for CredentialIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.scheme_manager, self.issuer, self.credential)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid credential identifier: {0}")]
pub struct InvalidIdentifier(pub String);

impl FromStr for CredentialIdentifier {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(scheme), Some(issuer), Some(credential), None)
                if !scheme.is_empty() && !issuer.is_empty() && !credential.is_empty() =>
            {
                Ok(Self::new(scheme, issuer, credential))
            }
            _ => Err(InvalidIdentifier(s.to_string())),
        }
    }
}

impl Serialize for CredentialIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CredentialIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The kind of identity document, as it appears in the `idDocument` credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    IdCard,
    Passport,
    DrivingLicence,
    Unknown,
}

impl DocumentType {
    /// Maps an MRZ document code (`P<`, `I<`, `ID`, ...) to a document type.
    pub fn from_mrz_code(code: &str) -> Self {
        match code.trim().chars().next() {
            Some('P') | Some('p') => Self::Passport,
            Some('I') | Some('i') | Some('A') | Some('a') | Some('C') | Some('c') => Self::IdCard,
            _ => Self::Unknown,
        }
    }

    pub fn as_attribute(&self) -> &'static str {
        match self {
            Self::IdCard => "ID card",
            Self::Passport => "Passport",
            Self::DrivingLicence => "Driving licence",
            Self::Unknown => "unknown",
        }
    }
}

/// Machine readable data of a passport or ID card, as produced by the MRZ parser,
/// together with the security objects needed to verify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassportRecord {
    pub document_number: String,
    pub document_code: String,
    pub nationality: String,
    /// Family name, fillers already replaced by spaces
    pub primary_identifier: String,
    /// Given names, one entry per name
    #[serde(default)]
    pub secondary_identifiers: Vec<String>,
    /// `yyMMdd`
    pub date_of_birth: String,
    /// `yyMMdd`
    pub date_of_expiry: String,
    #[serde(with = "b64")]
    pub sod_file: Vec<u8>,
    #[serde(with = "b64")]
    pub dg1_file: Vec<u8>,
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub dg14_file: Option<Vec<u8>>,
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub dg15_file: Option<Vec<u8>>,
    /// Active authentication signature over the session nonce
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub response: Option<Vec<u8>>,
}

/// Demographic data of an electronic driving licence plus its security objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdlRecord {
    pub document_number: String,
    pub issuing_member_state: String,
    pub family_name: String,
    /// Whitespace separated given names
    #[serde(default)]
    pub given_names: String,
    /// `ddMMyyyy`
    pub date_of_birth: String,
    /// `ddMMyyyy`
    pub date_of_expiry: String,
    #[serde(with = "b64")]
    pub sod_file: Vec<u8>,
    #[serde(with = "b64")]
    pub dg1_file: Vec<u8>,
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub dg13_file: Option<Vec<u8>>,
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub response: Option<Vec<u8>>,
}

/// A verified (or to be verified) identity document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "documentType", rename_all = "snake_case")]
pub enum DocumentRecord {
    Passport(PassportRecord),
    DrivingLicence(EdlRecord),
}

/// Outcome of the document verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationResult {
    Success,
    SignatureInvalid,
    HashesInvalid,
    NonceMismatch,
    DataMalformed,
    Expired,
}

impl VerificationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Client facing reference to a session on the issuing server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuingSessionRef {
    pub url: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentStartMessage {
    pub session_token: String,
    #[serde(with = "b64")]
    pub nonce: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResultMessage {
    pub result: VerificationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuing_session_ref: Option<IssuingSessionRef>,
}

impl VerificationResultMessage {
    pub fn new(result: VerificationResult) -> Self {
        Self {
            result,
            issuing_session_ref: None,
        }
    }
}

/// Version information reported by the card applet, opaque to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardVersion(#[serde(with = "b64")] pub Vec<u8>);

/// Credential attributes as bytes, ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttributes {
    pub credential: CredentialIdentifier,
    pub values: BTreeMap<String, Vec<u8>>,
}

impl RawAttributes {
    pub fn from_attributes(credential: CredentialIdentifier, attrs: &CredentialAttributes) -> Self {
        let values = attrs
            .iter()
            .map(|(name, value)| (name.clone(), value.as_bytes().to_vec()))
            .collect();
        Self { credential, values }
    }
}

/// What the issuer needs to know about the credential template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDescription {
    pub id: CredentialIdentifier,
    pub attribute_names: Vec<String>,
}

impl CredentialDescription {
    pub fn new(id: CredentialIdentifier, attrs: &CredentialAttributes) -> Self {
        Self {
            id,
            attribute_names: attrs.keys().cloned().collect(),
        }
    }
}

/// Per-credential state kept between the start and the finish of an issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceState {
    pub raw_attributes: RawAttributes,
    pub nonce1: Vec<u8>,
    pub card_version: CardVersion,
}

/// Commitment produced by the card, opaque to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitmentMessage(pub serde_json::Value);

/// Signature produced by the issuer, opaque to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureMessage(pub serde_json::Value);

pub(crate) mod b64 {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.trim()).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod b64_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => super::b64::serialize(bytes, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::b64")] Vec<u8>);

        let wrapper = Option::<Wrapper>::deserialize(deserializer)?;
        Ok(wrapper.map(|Wrapper(bytes)| bytes))
    }
}
