//! Compact JWS signing for issuing requests.

use std::{fs, path::Path};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ring::{
    rand::SystemRandom,
    signature::{RSA_PKCS1_SHA256, RsaKeyPair},
};
use serde::Serialize;
use tracing::info;

use crate::domain::enrollment::{UpstreamError, ports::JwtSigner};

#[derive(thiserror::Error, Debug)]
pub enum KeyError {
    #[error("Failed to read private key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid PKCS#8 RSA private key: {0}")]
    Rejected(String),
}

/// RS256 signer over a PKCS#8 DER encoded RSA key.
#[derive(Debug)]
pub struct Rs256Signer {
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl Rs256Signer {
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, KeyError> {
        let key_pair =
            RsaKeyPair::from_pkcs8(der).map_err(|e| KeyError::Rejected(format!("{e:?}")))?;
        Ok(Self {
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref();
        info!("Loading JWT signing key from {}", path.display());
        let der = fs::read(path).map_err(|source| KeyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_pkcs8_der(&der)
    }

    /// DER encoded `RSAPublicKey`, for whoever needs to check our tokens.
    pub fn public_key(&self) -> &[u8] {
        self.key_pair.public().as_ref()
    }
}

impl JwtSigner for Rs256Signer {
    fn algorithm(&self) -> &'static str {
        "RS256"
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, UpstreamError> {
        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(&RSA_PKCS1_SHA256, &self.rng, message, &mut signature)
            .map_err(|e| UpstreamError::Signing(format!("{e:?}")))?;
        Ok(signature)
    }
}

/// Produces `alg: none` tokens, for issuing servers that do not check signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsignedJwt;

impl JwtSigner for UnsignedJwt {
    fn algorithm(&self) -> &'static str {
        "none"
    }

    fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, UpstreamError> {
        Ok(Vec::new())
    }
}

#[derive(Serialize)]
struct Header<'a> {
    typ: &'static str,
    alg: &'a str,
}

/// Encodes `claims` as a compact JWS signed by `signer`.
pub fn encode<C: Serialize>(signer: &dyn JwtSigner, claims: &C) -> Result<String, UpstreamError> {
    let header = serde_json::to_vec(&Header {
        typ: "JWT",
        alg: signer.algorithm(),
    })
    .map_err(|e| UpstreamError::Signing(e.to_string()))?;
    let claims = serde_json::to_vec(claims).map_err(|e| UpstreamError::Signing(e.to_string()))?;

    let message = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(claims)
    );
    let signature = signer.sign(message.as_bytes())?;
    Ok(format!("{message}.{}", URL_SAFE_NO_PAD.encode(signature)))
}
