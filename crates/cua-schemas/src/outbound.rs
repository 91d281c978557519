use serde::Serialize;
use serde_json::Value;

use crate::Fields;

/// Placeholder sequence fields sent with every transfer request. The
/// catch-up path re-drives a lone image, so index and sequence length are
/// zero and date and exposure are unknown.
const PLACEHOLDER_INDEX: u32 = 0;
const PLACEHOLDER_SEQUENCE_LEN: u32 = 0;
const PLACEHOLDER_EXPOSURE: f64 = 0.0;

fn to_fields<T: Serialize>(msg: &T) -> Fields {
    match serde_json::to_value(msg) {
        Ok(Value::Object(map)) => map,
        // Only structs with string keys are rendered here.
        _ => Fields::new(),
    }
}

/// Asks the forwarder to scan the DAQ catalog and populate the discovery
/// key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ScanRequest {
    pub msg_type: String,
    pub minutes: u32,
    pub key: String,
    pub reply_queue: String,
}

impl ScanRequest {
    pub fn new(minutes: u32, key: impl Into<String>, reply_queue: impl Into<String>) -> Self {
        Self {
            msg_type: "SCAN".to_string(),
            minutes,
            key: key.into(),
            reply_queue: reply_queue.into(),
        }
    }

    pub fn to_fields(&self) -> Fields {
        to_fields(self)
    }
}

/// Start (transfer params) and end-readout requests share this shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct TransferRequest {
    pub msg_type: String,
    pub image_id: String,
    pub image_index: u32,
    pub images_in_sequence: u32,
    pub image_date: String,
    pub exposure_time: f64,
    pub reply_queue: String,
}

impl TransferRequest {
    pub fn placeholder(
        msg_type: impl Into<String>,
        image_id: impl Into<String>,
        reply_queue: impl Into<String>,
    ) -> Self {
        Self {
            msg_type: msg_type.into(),
            image_id: image_id.into(),
            image_index: PLACEHOLDER_INDEX,
            images_in_sequence: PLACEHOLDER_SEQUENCE_LEN,
            image_date: String::new(),
            exposure_time: PLACEHOLDER_EXPOSURE,
            reply_queue: reply_queue.into(),
        }
    }

    pub fn to_fields(&self) -> Fields {
        to_fields(self)
    }
}

/// Large-file-object-available notice: the header file is ready at `url`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct HeaderReady {
    pub msg_type: String,
    pub image_id: String,
    /// Header URL from the large-file-object record.
    pub filename: String,
    pub reply_queue: String,
}

impl HeaderReady {
    pub fn new(
        msg_type: impl Into<String>,
        image_id: impl Into<String>,
        url: impl Into<String>,
        reply_queue: impl Into<String>,
    ) -> Self {
        Self {
            msg_type: msg_type.into(),
            image_id: image_id.into(),
            filename: url.into(),
            reply_queue: reply_queue.into(),
        }
    }

    pub fn to_fields(&self) -> Fields {
        to_fields(self)
    }
}

/// Tells the archive controller that a catch-up image was handed to the
/// forwarder. Acknowledged with `NEW_CATCHUP_ARCHIVE_ITEM_ACK`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct NewArchiveItem {
    pub msg_type: String,
    pub image_id: String,
    /// Transfer parameters echoed on the start ack, when the forwarder sent
    /// them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub reply_queue: String,
}

impl NewArchiveItem {
    pub const MSG_TYPE: &'static str = "NEW_CATCHUP_ARCHIVE_ITEM";

    pub fn new(
        image_id: impl Into<String>,
        target_dir: Option<String>,
        filename: Option<String>,
        reply_queue: impl Into<String>,
    ) -> Self {
        Self {
            msg_type: Self::MSG_TYPE.to_string(),
            image_id: image_id.into(),
            target_dir,
            filename,
            reply_queue: reply_queue.into(),
        }
    }

    pub fn to_fields(&self) -> Fields {
        to_fields(self)
    }
}
