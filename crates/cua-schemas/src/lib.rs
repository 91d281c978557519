//! cua-schemas
//!
//! Wire shapes exchanged over the message transport.
//!
//! Every message is a JSON object carrying a `MSG_TYPE` tag plus
//! upper-case, message-specific fields. Inbound messages are classified
//! into the closed [`MessageTag`] set; outbound payloads are plain serde
//! structs rendered into a field map for the publisher.

mod inbound;
mod outbound;

pub use inbound::{InboundMessage, MessageTag, RejectReason};
pub use outbound::{HeaderReady, NewArchiveItem, ScanRequest, TransferRequest};

/// Field naming the message type.
pub const MSG_TYPE: &str = "MSG_TYPE";

/// A rendered wire message: field name -> JSON value.
pub type Fields = serde_json::Map<String, serde_json::Value>;
