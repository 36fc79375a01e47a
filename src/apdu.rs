pub mod codec;

pub use codec::{WireCommand, WireResponse, decode_commands, decode_responses};

use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, Error>;

/// Largest extended-length command APDU: header, 3-byte Lc, 65535 data bytes and 2-byte Le.
pub const MAX_COMMAND_LEN: usize = 4 + 3 + 0xFFFF + 2;
/// Largest extended-length response APDU: 65536 data bytes followed by SW1 SW2.
pub const MAX_RESPONSE_LEN: usize = 0x1_0000 + 2;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid hex payload in `{field}`: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("APDU payload of {len} bytes exceeds the maximum of {max}")]
    TooLong { len: usize, max: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// ISO7816 status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const SUCCESS: StatusCode = StatusCode(0x9000);

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// A labelled command APDU destined for the smartcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireCommand", try_from = "WireCommand")]
pub struct ProtocolCommand {
    pub key: String,
    pub apdu: Vec<u8>,
}

impl ProtocolCommand {
    pub fn new(key: impl Into<String>, apdu: impl Into<Vec<u8>>) -> Result<Self> {
        let apdu = apdu.into();
        check_len(apdu.len(), MAX_COMMAND_LEN)?;
        Ok(Self {
            key: key.into(),
            apdu,
        })
    }
}

/// A labelled response APDU as returned by the smartcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireResponse", try_from = "WireResponse")]
pub struct ProtocolResponse {
    pub key: String,
    pub apdu: Vec<u8>,
}

impl ProtocolResponse {
    pub fn new(key: impl Into<String>, apdu: impl Into<Vec<u8>>) -> Result<Self> {
        let apdu = apdu.into();
        check_len(apdu.len(), MAX_RESPONSE_LEN)?;
        Ok(Self {
            key: key.into(),
            apdu,
        })
    }

    /// The SW1 SW2 status word, or an error when the response is shorter than two bytes.
    pub fn status(&self) -> Result<StatusCode> {
        let len = self.apdu.len();
        if len < 2 {
            return Err(Error::InvalidData("Invalid APDU format".into()));
        }
        let sw1 = self.apdu[len - 2];
        let sw2 = self.apdu[len - 1];
        Ok(StatusCode((sw1 as u16) << 8 | (sw2 as u16)))
    }
}

fn check_len(len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(Error::TooLong { len, max });
    }
    Ok(())
}
