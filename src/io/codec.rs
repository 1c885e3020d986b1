// src/io/codec.rs
//
// Base station wire codec.
//
// Inbound (one per line):
//   {"buttonPressed": <int>, "address": <int>}>
//
// Outbound (ASCII, each terminated by '>'):
//   Q1 TWO / Q1 MUL   start a yes/no or multiple choice question
//   Q0                stop the current question
//   AN <addr> <val>   light the remote's LED, both fields two-digit lowercase hex

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::io::error::LinkError;
use crate::question::{QuestionKind, QuestionMode};

/// Byte that terminates every frame on the wire
pub const FRAME_DELIMITER: u8 = b'>';

const CODEC: &str = "vote-frame";

/// A decoded button press. Fields are kept wide so out-of-range values
/// reach validation instead of failing as JSON overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteFrame {
    #[serde(rename = "buttonPressed")]
    pub value: i64,
    pub address: i64,
}

/// Command sent to the base station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartQuestion(QuestionKind),
    StopQuestion,
    Ack { address: u8, value: u8 },
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::StartQuestion(kind) => f.write_str(encode_start_command(*kind)),
            Command::StopQuestion => f.write_str(encode_stop_command()),
            Command::Ack { address, value } => f.write_str(&encode_ack(*address, *value)),
        }
    }
}

impl Command {
    /// ASCII command followed by the frame delimiter
    pub fn to_wire(&self) -> Vec<u8> {
        VoteCodec::encode(self)
    }
}

/// Base station frame codec.
pub struct VoteCodec;

impl VoteCodec {
    /// Decode one inbound line.
    ///
    /// Trailing whitespace and a single trailing `>` are stripped; the rest
    /// must be a JSON object with integer `buttonPressed` and `address`.
    pub fn decode(raw: &[u8]) -> Result<VoteFrame, LinkError> {
        let mut body = raw.trim_ascii();
        if let Some(stripped) = body.strip_suffix(&[FRAME_DELIMITER]) {
            body = stripped.trim_ascii_end();
        }

        if body.is_empty() {
            return Err(LinkError::protocol(CODEC, "empty frame"));
        }

        serde_json::from_slice::<VoteFrame>(body).map_err(|e| {
            LinkError::protocol(
                CODEC,
                format!("{} in {:?}", e, String::from_utf8_lossy(raw)),
            )
        })
    }

    /// Encode a command with its trailing delimiter.
    pub fn encode(command: &Command) -> Vec<u8> {
        let mut bytes = command.to_string().into_bytes();
        bytes.push(FRAME_DELIMITER);
        bytes
    }
}

/// Whether `value` is an acceptable answer while `mode` is active.
pub fn is_valid_value(value: i64, mode: QuestionMode) -> bool {
    match mode {
        QuestionMode::TwoChoice => value == 0 || value == 1,
        QuestionMode::MultipleChoice => (0..=3).contains(&value),
        QuestionMode::None => false,
    }
}

/// `AN <address> <value>`; lights the LED on the remote that voted.
pub fn encode_ack(address: u8, value: u8) -> String {
    format!("AN {} {}", hex::encode([address]), hex::encode([value]))
}

pub fn encode_start_command(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::TwoChoice => "Q1 TWO",
        QuestionKind::MultipleChoice => "Q1 MUL",
    }
}

pub fn encode_stop_command() -> &'static str {
    "Q0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_with_delimiter() {
        let frame = VoteCodec::decode(br#"{"buttonPressed": 1, "address": 4}>"#).unwrap();
        assert_eq!(frame, VoteFrame { value: 1, address: 4 });
    }

    #[test]
    fn test_decode_tolerates_carriage_return_and_missing_delimiter() {
        let frame = VoteCodec::decode(b"{\"address\":9,\"buttonPressed\":3}>\r").unwrap();
        assert_eq!(frame, VoteFrame { value: 3, address: 9 });

        let frame = VoteCodec::decode(br#"{"buttonPressed":0,"address":2}"#).unwrap();
        assert_eq!(frame, VoteFrame { value: 0, address: 2 });
    }

    #[test]
    fn test_decode_rejects_type_mismatch() {
        assert!(VoteCodec::decode(br#"{"buttonPressed":"1","address":4}>"#).is_err());
        assert!(VoteCodec::decode(br#"{"buttonPressed":1.5,"address":4}>"#).is_err());
        assert!(VoteCodec::decode(br#"{"buttonPressed":1,"address":null}>"#).is_err());
    }

    #[test]
    fn test_decode_rejects_missing_field_and_garbage() {
        assert!(VoteCodec::decode(br#"{"buttonPressed":1}>"#).is_err());
        assert!(VoteCodec::decode(br#"{"buttonPressed":1,"address":4}>>"#).is_err());
        assert!(VoteCodec::decode(b"\xff\xfe").is_err());
        assert!(matches!(
            VoteCodec::decode(b" >\r"),
            Err(LinkError::Protocol { .. })
        ));
    }

    #[test]
    fn test_valid_values_two_choice() {
        let accepted: Vec<i64> = (-2..6)
            .filter(|v| is_valid_value(*v, QuestionMode::TwoChoice))
            .collect();
        assert_eq!(accepted, vec![0, 1]);
    }

    #[test]
    fn test_valid_values_multiple_choice() {
        let accepted: Vec<i64> = (-2..6)
            .filter(|v| is_valid_value(*v, QuestionMode::MultipleChoice))
            .collect();
        assert_eq!(accepted, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_no_values_valid_without_question() {
        assert!((-2..6).all(|v| !is_valid_value(v, QuestionMode::None)));
    }

    #[test]
    fn test_command_encoding() {
        assert_eq!(Command::StartQuestion(QuestionKind::TwoChoice).to_wire(), b"Q1 TWO>".to_vec());
        assert_eq!(Command::StartQuestion(QuestionKind::MultipleChoice).to_wire(), b"Q1 MUL>".to_vec());
        assert_eq!(Command::StopQuestion.to_wire(), b"Q0>".to_vec());
    }

    #[test]
    fn test_ack_is_two_digit_lowercase_hex() {
        assert_eq!(encode_ack(3, 1), "AN 03 01");
        assert_eq!(encode_ack(10, 2), "AN 0a 02");
        assert_eq!(
            Command::Ack { address: 255, value: 3 }.to_wire(),
            b"AN ff 03>".to_vec()
        );
    }
}
