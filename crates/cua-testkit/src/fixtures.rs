use anyhow::Result;
use cua_config::{load_layered_yaml_from_strings, CatchupConfig};
use cua_handshake::AckPhase;
use cua_reconcile::{CameraGeometry, ImageId, IngestionRecord};
use cua_schemas::MessageTag;
use serde_json::{json, Value};

/// The shipped base configuration (one WFS location, three sensors).
pub const BASE_CONFIG_YAML: &str = include_str!("../../../config/catchup.yaml");

/// Base config, optionally overridden by YAML overlays.
pub fn base_config(overlays: &[&str]) -> Result<CatchupConfig> {
    let mut docs = vec![BASE_CONFIG_YAML];
    docs.extend_from_slice(overlays);
    let loaded = load_layered_yaml_from_strings(&docs)?;
    CatchupConfig::from_config_json(&loaded.config_json)
}

/// Every expected row of `image_id`, confirmed.
pub fn fully_confirmed(image_id: &str, geometry: &CameraGeometry) -> Vec<IngestionRecord> {
    geometry.expand(&ImageId::from(image_id))
}

/// Inbound message with only a type tag.
pub fn msg(msg_type: &str) -> Value {
    json!({ "MSG_TYPE": msg_type })
}

/// Forwarder ack for `phase` on `image_id`, under `ack_prefix`.
pub fn forwarder_ack(ack_prefix: &str, phase: AckPhase, image_id: &str) -> Value {
    json!({
        "MSG_TYPE": format!("{ack_prefix}{}", MessageTag::ForwarderAck(phase).name()),
        "IMAGE_ID": image_id,
    })
}
