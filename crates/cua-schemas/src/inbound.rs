use std::fmt;

use cua_handshake::{AckPayload, AckPhase};
use serde_json::Value;

use crate::{Fields, MSG_TYPE};

const SCAN: &str = "SCAN";
const SCAN_ACK: &str = "SCAN_ACK";
const NEW_CATCHUP_ARCHIVE_ITEM_ACK: &str = "NEW_CATCHUP_ARCHIVE_ITEM_ACK";
const ARCHIVE_HEALTH_CHECK_ACK: &str = "ARCHIVE_HEALTH_CHECK_ACK";
const ASSOCIATED_ACK: &str = "ASSOCIATED_ACK";

const XFER_PARAMS_ACK: &str = "XFER_PARAMS_ACK";
const END_READOUT_ACK: &str = "END_READOUT_ACK";
const HEADER_READY_ACK: &str = "HEADER_READY_ACK";

/// Closed set of inbound message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTag {
    Scan,
    ScanAck,
    NewCatchupArchiveItemAck,
    ArchiveHealthCheckAck,
    AssociatedAck,
    /// `<prefix>XFER_PARAMS_ACK`, `<prefix>END_READOUT_ACK`,
    /// `<prefix>HEADER_READY_ACK`.
    ForwarderAck(AckPhase),
}

impl MessageTag {
    /// Classify a raw `MSG_TYPE`. Forwarder acks must carry `ack_prefix`;
    /// the same suffix under another prefix belongs to a different
    /// forwarder and is unknown here.
    pub fn parse(raw: &str, ack_prefix: &str) -> Option<Self> {
        let tag = match raw {
            SCAN => MessageTag::Scan,
            SCAN_ACK => MessageTag::ScanAck,
            NEW_CATCHUP_ARCHIVE_ITEM_ACK => MessageTag::NewCatchupArchiveItemAck,
            ARCHIVE_HEALTH_CHECK_ACK => MessageTag::ArchiveHealthCheckAck,
            ASSOCIATED_ACK => MessageTag::AssociatedAck,
            other => {
                let suffix = other.strip_prefix(ack_prefix)?;
                let phase = match suffix {
                    XFER_PARAMS_ACK => AckPhase::Start,
                    END_READOUT_ACK => AckPhase::EndReadout,
                    HEADER_READY_ACK => AckPhase::Lfoa,
                    _ => return None,
                };
                MessageTag::ForwarderAck(phase)
            }
        };
        Some(tag)
    }

    /// Wire name (prefix-less for forwarder acks), for logs.
    pub fn name(&self) -> &'static str {
        match self {
            MessageTag::Scan => SCAN,
            MessageTag::ScanAck => SCAN_ACK,
            MessageTag::NewCatchupArchiveItemAck => NEW_CATCHUP_ARCHIVE_ITEM_ACK,
            MessageTag::ArchiveHealthCheckAck => ARCHIVE_HEALTH_CHECK_ACK,
            MessageTag::AssociatedAck => ASSOCIATED_ACK,
            MessageTag::ForwarderAck(AckPhase::Start) => XFER_PARAMS_ACK,
            MessageTag::ForwarderAck(AckPhase::EndReadout) => END_READOUT_ACK,
            MessageTag::ForwarderAck(AckPhase::Lfoa) => HEADER_READY_ACK,
        }
    }
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why an inbound payload could not be routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NotAnObject,
    MissingMsgType,
    UnknownTag(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotAnObject => write!(f, "message is not a JSON object"),
            RejectReason::MissingMsgType => write!(f, "message has no string {MSG_TYPE}"),
            RejectReason::UnknownTag(t) => write!(f, "no handler for {MSG_TYPE}={t}"),
        }
    }
}

impl std::error::Error for RejectReason {}

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub tag: MessageTag,
    pub fields: Fields,
}

impl InboundMessage {
    pub fn parse(raw: &Value, ack_prefix: &str) -> Result<Self, RejectReason> {
        let fields = raw.as_object().ok_or(RejectReason::NotAnObject)?;
        let msg_type = fields
            .get(MSG_TYPE)
            .and_then(Value::as_str)
            .ok_or(RejectReason::MissingMsgType)?;
        let tag = MessageTag::parse(msg_type, ack_prefix)
            .ok_or_else(|| RejectReason::UnknownTag(msg_type.to_string()))?;
        Ok(Self {
            tag,
            fields: fields.clone(),
        })
    }

    /// String-valued field; numbers are rendered, everything else is absent.
    pub fn field_str(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Fields the handshake reads from a forwarder ack.
    pub fn ack_payload(&self) -> AckPayload {
        AckPayload {
            image_id: self.field_str("IMAGE_ID"),
            target_dir: self.field_str("TARGET_DIR"),
            filename: self.field_str("FILENAME"),
        }
    }

    pub fn association_key(&self) -> Option<String> {
        self.field_str("ASSOCIATION_KEY")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PREFIX: &str = "CATCHUP_FWDR_";

    #[test]
    fn fixed_tags_parse() {
        assert_eq!(MessageTag::parse("SCAN", PREFIX), Some(MessageTag::Scan));
        assert_eq!(MessageTag::parse("SCAN_ACK", PREFIX), Some(MessageTag::ScanAck));
        assert_eq!(
            MessageTag::parse("ASSOCIATED_ACK", PREFIX),
            Some(MessageTag::AssociatedAck)
        );
    }

    #[test]
    fn forwarder_acks_need_configured_prefix() {
        assert_eq!(
            MessageTag::parse("CATCHUP_FWDR_END_READOUT_ACK", PREFIX),
            Some(MessageTag::ForwarderAck(AckPhase::EndReadout))
        );
        assert_eq!(MessageTag::parse("AT_FWDR_END_READOUT_ACK", PREFIX), None);
        assert_eq!(MessageTag::parse("CATCHUP_FWDR_BOGUS_ACK", PREFIX), None);
    }

    #[test]
    fn name_round_trips_through_prefix() {
        for phase in [AckPhase::Start, AckPhase::EndReadout, AckPhase::Lfoa] {
            let tag = MessageTag::ForwarderAck(phase);
            let wire = format!("{PREFIX}{}", tag.name());
            assert_eq!(MessageTag::parse(&wire, PREFIX), Some(tag));
        }
    }

    #[test]
    fn parse_rejects_malformed_payloads() {
        assert_eq!(
            InboundMessage::parse(&json!([1, 2]), PREFIX).unwrap_err(),
            RejectReason::NotAnObject
        );
        assert_eq!(
            InboundMessage::parse(&json!({"IMAGE_ID": "a"}), PREFIX).unwrap_err(),
            RejectReason::MissingMsgType
        );
        assert_eq!(
            InboundMessage::parse(&json!({"MSG_TYPE": 7}), PREFIX).unwrap_err(),
            RejectReason::MissingMsgType
        );
        assert_eq!(
            InboundMessage::parse(&json!({"MSG_TYPE": "NOPE"}), PREFIX).unwrap_err(),
            RejectReason::UnknownTag("NOPE".into())
        );
    }

    #[test]
    fn ack_payload_extracts_upper_case_fields() {
        let msg = InboundMessage::parse(
            &json!({
                "MSG_TYPE": "CATCHUP_FWDR_XFER_PARAMS_ACK",
                "IMAGE_ID": "img1",
                "TARGET_DIR": "/data/staging",
                "FILENAME": null,
            }),
            PREFIX,
        )
        .unwrap();
        let p = msg.ack_payload();
        assert_eq!(p.image_id.as_deref(), Some("img1"));
        assert_eq!(p.target_dir.as_deref(), Some("/data/staging"));
        assert_eq!(p.filename, None);
    }
}
