use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use reqwest::{Client, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    http::{endpoint, truncate},
    jwt,
};
use crate::domain::enrollment::{
    UpstreamError,
    models::{CredentialAttributes, CredentialList, IssuingSessionRef},
    ports::{IssuingServer, JwtSigner},
};

const SERVICE: &str = "issuing server";
/// Seconds the holder gets to pick up the credentials.
const ISSUE_TIMEOUT_SECS: u64 = 120;
const VALIDITY_MONTHS: u32 = 6;
const WEEK_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Serialize)]
struct CredentialRequest<'a> {
    credential: String,
    validity: i64,
    attributes: &'a CredentialAttributes,
}

#[derive(Debug, Serialize)]
struct IssuingRequest<'a> {
    credentials: Vec<CredentialRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct IdentityProviderRequest<'a> {
    data: &'static str,
    timeout: u64,
    request: IssuingRequest<'a>,
}

#[derive(Debug, Serialize)]
struct IssuingClaims<'a> {
    iprequest: IdentityProviderRequest<'a>,
    iat: i64,
    iss: &'a str,
    sub: &'static str,
}

/// Session reference as the issuing server answers it.
#[derive(Debug, Deserialize)]
struct ClientQr {
    #[serde(alias = "url")]
    u: String,
    #[serde(alias = "version")]
    v: String,
}

/// Error body of the issuing server API.
#[derive(Debug, Deserialize)]
struct ApiErrorMessage {
    error: String,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl std::fmt::Display for ApiErrorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(status) = self.status {
            write!(f, " ({status})")?;
        }
        if let Some(description) = &self.description {
            write!(f, ": {description}")?;
        }
        if let Some(message) = &self.message {
            write!(f, " [{message}]")?;
        }
        Ok(())
    }
}

/// Announces credential lists to the issuing server as (optionally signed) JWTs.
#[derive(Clone)]
pub struct ApiServerClient {
    client: Client,
    base_url: String,
    api_name: String,
    signer: Arc<dyn JwtSigner>,
}

impl ApiServerClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_name: impl Into<String>,
        signer: Arc<dyn JwtSigner>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_name: api_name.into(),
            signer,
        }
    }

    fn issue_url(&self) -> String {
        endpoint(&self.base_url, "issue/")
    }

    fn request_jwt(
        &self,
        credentials: &CredentialList,
        now: DateTime<Utc>,
    ) -> Result<String, UpstreamError> {
        let validity = credential_validity(now);
        let claims = IssuingClaims {
            iprequest: IdentityProviderRequest {
                data: "",
                timeout: ISSUE_TIMEOUT_SECS,
                request: IssuingRequest {
                    credentials: credentials
                        .iter()
                        .map(|(id, attributes)| CredentialRequest {
                            credential: id.to_string(),
                            validity,
                            attributes,
                        })
                        .collect(),
                },
            },
            iat: now.timestamp(),
            iss: &self.api_name,
            sub: "issue_request",
        };
        jwt::encode(self.signer.as_ref(), &claims)
    }
}

#[async_trait]
impl IssuingServer for ApiServerClient {
    async fn create_session(
        &self,
        credentials: &CredentialList,
    ) -> Result<IssuingSessionRef, UpstreamError> {
        let token = self.request_jwt(credentials, Utc::now())?;
        let url = self.issue_url();
        debug!(url, credentials = credentials.len(), "Creating issuing session");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/plain")
            .body(token)
            .send()
            .await
            .map_err(|source| UpstreamError::Http {
                service: SERVICE,
                source,
            })?;
        let status = response.status();
        let body = response.text().await.map_err(|source| UpstreamError::Http {
            service: SERVICE,
            source,
        })?;

        if status.is_success()
            && let Ok(qr) = serde_json::from_str::<ClientQr>(&body)
        {
            if qr.u.trim().is_empty() || qr.v.trim().is_empty() {
                return Err(UpstreamError::Malformed {
                    service: SERVICE,
                    message: format!("empty session reference: {}", truncate(&body)),
                });
            }
            return Ok(IssuingSessionRef {
                url: format!("{url}{}", qr.u),
                version: qr.v,
            });
        }

        match serde_json::from_str::<ApiErrorMessage>(&body) {
            Ok(error) => {
                warn!(%error, "Issuing server refused the request");
                Err(UpstreamError::Rejected {
                    service: SERVICE,
                    message: error.to_string(),
                })
            }
            Err(_) => Err(UpstreamError::Malformed {
                service: SERVICE,
                message: format!("HTTP {status}: {}", truncate(&body)),
            }),
        }
    }
}

/// Expiry of issued credentials: six months out, rounded down to a whole week since the epoch.
fn credential_validity(now: DateTime<Utc>) -> i64 {
    let until = now
        .checked_add_months(Months::new(VALIDITY_MONTHS))
        .unwrap_or(now)
        .timestamp();
    until - until.rem_euclid(WEEK_SECS)
}
