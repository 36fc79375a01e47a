//! Textual wire form of protocol commands and responses.
//!
//! A command travels as `{"key": "...", "command": "00A40400"}` and a response as
//! `{"key": "...", "apdu": "9000"}`, the payload being the uppercase hex encoding
//! of the raw APDU bytes. Batches are JSON arrays of these objects, order preserved.
//! Unknown object keys are ignored; missing fields and malformed hex are reported
//! as [`Error`]s once the whole object has been read.

use serde::{Deserialize, Serialize};

use super::{Error, MAX_COMMAND_LEN, MAX_RESPONSE_LEN, ProtocolCommand, ProtocolResponse};

/// Wire representation of a [`ProtocolCommand`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Wire representation of a [`ProtocolResponse`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apdu: Option<String>,
}

impl From<ProtocolCommand> for WireCommand {
    fn from(cmd: ProtocolCommand) -> Self {
        Self {
            command: Some(hex::encode_upper(&cmd.apdu)),
            key: Some(cmd.key),
        }
    }
}

impl From<ProtocolResponse> for WireResponse {
    fn from(response: ProtocolResponse) -> Self {
        Self {
            apdu: Some(hex::encode_upper(&response.apdu)),
            key: Some(response.key),
        }
    }
}

impl TryFrom<WireCommand> for ProtocolCommand {
    type Error = Error;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        let key = wire.key.ok_or(Error::MissingField("key"))?;
        let payload = wire.command.ok_or(Error::MissingField("command"))?;
        let apdu = decode_hex("command", &payload, MAX_COMMAND_LEN)?;
        Ok(ProtocolCommand { key, apdu })
    }
}

impl TryFrom<WireResponse> for ProtocolResponse {
    type Error = Error;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        let key = wire.key.ok_or(Error::MissingField("key"))?;
        let payload = wire.apdu.ok_or(Error::MissingField("apdu"))?;
        let apdu = decode_hex("apdu", &payload, MAX_RESPONSE_LEN)?;
        Ok(ProtocolResponse { key, apdu })
    }
}

/// Decodes a batch of wire commands, failing on the first malformed entry.
pub fn decode_commands(batch: Vec<WireCommand>) -> Result<Vec<ProtocolCommand>, Error> {
    batch.into_iter().map(ProtocolCommand::try_from).collect()
}

/// Decodes a batch of wire responses, failing on the first malformed entry.
pub fn decode_responses(batch: Vec<WireResponse>) -> Result<Vec<ProtocolResponse>, Error> {
    batch.into_iter().map(ProtocolResponse::try_from).collect()
}

fn decode_hex(field: &'static str, payload: &str, max: usize) -> Result<Vec<u8>, Error> {
    // Two hex digits per byte
    if payload.len() / 2 > max {
        return Err(Error::TooLong {
            len: payload.len() / 2,
            max,
        });
    }
    hex::decode(payload).map_err(|e| Error::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_encodes_uppercase_hex() {
        let cmd = ProtocolCommand::new("select", vec![0x00, 0xa4, 0x04, 0x0c]).unwrap();
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"key": "select", "command": "00A4040C"})
        );
    }

    #[test]
    fn test_response_encodes_apdu_field() {
        let response = ProtocolResponse::new("pin", vec![0x90, 0x00]).unwrap();
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"key":"pin","apdu":"9000"}"#);
    }

    #[test]
    fn test_batch_preserves_order() {
        let batch = vec![
            ProtocolCommand::new("b", vec![0x02]).unwrap(),
            ProtocolCommand::new("a", vec![0x01]).unwrap(),
            ProtocolCommand::new("b", vec![0x03]).unwrap(),
        ];
        let json = serde_json::to_string(&batch).unwrap();
        assert_eq!(
            json,
            r#"[{"key":"b","command":"02"},{"key":"a","command":"01"},{"key":"b","command":"03"}]"#
        );
        let decoded: Vec<ProtocolCommand> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_decode_accepts_lowercase_and_ignores_unknown_keys() {
        let json = r#"{"description":"ignored","key":"k","extra":{"nested":[1,2]},"apdu":"6a82"}"#;
        let response: ProtocolResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.key, "k");
        assert_eq!(response.apdu, vec![0x6A, 0x82]);
    }

    #[test]
    fn test_round_trip_edge_lengths() {
        for len in [0, 1, 255, 256, MAX_COMMAND_LEN] {
            let bytes: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
            let cmd = ProtocolCommand::new("edge", bytes.clone()).unwrap();

            let wire = WireCommand::from(cmd.clone());
            assert_eq!(wire.command.as_deref().map(str::len), Some(len * 2));
            assert_eq!(ProtocolCommand::try_from(wire.clone()).unwrap(), cmd);

            // encode(decode(x)) == x on the textual side
            let text = wire.command.clone().unwrap();
            let reencoded = WireCommand::from(
                ProtocolCommand::try_from(WireCommand {
                    key: Some("edge".into()),
                    command: Some(text.clone()),
                })
                .unwrap(),
            );
            assert_eq!(reencoded.command.unwrap(), text);
        }
    }

    #[test]
    fn test_response_round_trip_edge_lengths() {
        for len in [0, 2, 258, MAX_RESPONSE_LEN] {
            let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let response = ProtocolResponse::new("edge", bytes).unwrap();

            let wire = WireResponse::from(response.clone());
            let text = wire.apdu.clone().unwrap();
            assert_eq!(text.len(), len * 2);
            assert_eq!(text, text.to_uppercase());

            let decoded = ProtocolResponse::try_from(wire).unwrap();
            assert_eq!(decoded, response);
            assert_eq!(WireResponse::from(decoded).apdu.unwrap(), text);
        }
    }

    #[test]
    fn test_odd_length_hex_is_format_error() {
        let err = ProtocolCommand::try_from(WireCommand {
            key: Some("k".into()),
            command: Some("00A".into()),
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidHex { field: "command", .. }));
    }

    #[test]
    fn test_non_hex_is_format_error() {
        let err = decode_responses(vec![WireResponse {
            key: Some("k".into()),
            apdu: Some("90ZZ".into()),
        }])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidHex { field: "apdu", .. }));
    }

    #[test]
    fn test_missing_fields() {
        let err = decode_responses(vec![WireResponse {
            key: None,
            apdu: Some("9000".into()),
        }])
        .unwrap_err();
        assert_eq!(err, Error::MissingField("key"));

        let err = decode_commands(vec![WireCommand {
            key: Some("k".into()),
            command: None,
        }])
        .unwrap_err();
        assert_eq!(err, Error::MissingField("command"));
    }

    #[test]
    fn test_serde_rejects_missing_payload_without_panicking() {
        let result: Result<Vec<ProtocolResponse>, _> =
            serde_json::from_str(r#"[{"key":"a","apdu":"9000"},{"key":"b"}]"#);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("apdu"), "{err}");
    }

    #[test]
    fn test_oversized_payload_rejected_before_decoding() {
        let payload = "00".repeat(MAX_RESPONSE_LEN + 1);
        let err = ProtocolResponse::try_from(WireResponse {
            key: Some("big".into()),
            apdu: Some(payload),
        })
        .unwrap_err();
        assert!(matches!(err, Error::TooLong { .. }));
    }
}
