use anyhow::{bail, Context, Result};
use cua_reconcile::CameraGeometry;
use serde_json::Value;

pub const DEFAULT_DISCOVERY_KEY: &str = "images";
pub const DEFAULT_JOBS_KEY: &str = "catchup_jobs";
pub const DEFAULT_FORWARDER_ACK_PREFIX: &str = "CATCHUP_FWDR_";
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 300;

/// Named queues on the message transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    /// Archive controller -> us.
    pub archive_ctrl_publish: String,
    /// Us -> archive controller.
    pub archive_ctrl_consume: String,
    /// Forwarder -> us (acks, SCAN_ACK).
    pub forwarder_publish: String,
    /// Us -> forwarder.
    pub forwarder_consume: String,
    /// Forwarder telemetry -> us.
    pub telemetry: String,
}

/// `MSG_TYPE` values of outbound forwarder messages, plus the prefix the
/// forwarder uses on its acks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwarderMessages {
    pub xfer_params: String,
    pub end_readout: String,
    pub header_ready: String,
    pub ack_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchupSettings {
    /// Lookback window for both the DAQ scan and the ingestion query.
    pub expiration_minutes: u32,
    /// Period of the SCAN ticker; 0 disables it.
    pub scan_interval_secs: u64,
    /// An awaiting-ack session older than this yields its slot.
    pub handshake_timeout_secs: u64,
    pub discovery_key: String,
    pub jobs_key: String,
}

/// Where the discovery list and job set live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// The redis database the forwarder writes its scan results to.
    Redis,
    /// In-process; only reachable through the daemon itself.
    Memory,
}

impl StoreBackend {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => bail!("CONFIG_INVALID_VALUE /store/backend must be redis or memory (got {other})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub host: String,
    pub db: u32,
}

/// Outbound message transport.
///
/// With `base_url` set, messages are POSTed to `{base_url}/queues/{queue}`.
/// Without it the daemon runs standalone: outbound queues are drained into
/// the log and inbound messages arrive on `POST /v1/messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportSettings {
    pub base_url: Option<String>,
}

/// EFD topic names (SAL topics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EfdTopics {
    pub image_in_oods: String,
    pub large_file_object_available: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EfdSettings {
    pub base_url: String,
    pub database: String,
    pub topics: EfdTopics,
}

/// Immutable configuration of one catch-up archiver instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchupConfig {
    pub camera_name: String,
    pub archive_controller_name: String,
    pub association_key: String,
    pub queues: QueueNames,
    pub messages: ForwarderMessages,
    pub catchup: CatchupSettings,
    pub store: StoreSettings,
    pub transport: TransportSettings,
    pub efd: EfdSettings,
    pub geometry: CameraGeometry,
}

impl CatchupConfig {
    /// Build from the merged config JSON produced by
    /// [`crate::load_layered_yaml_from_strings`].
    ///
    /// Required: everything except `messages.forwarder_ack_prefix`,
    /// `store.backend` (default redis), `transport.base_url`, and the
    /// `catchup` keys other than `expiration_minutes`.
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let expiration_minutes = require_u64(cfg, "/catchup/expiration_minutes")?;
        if expiration_minutes == 0 || expiration_minutes > u64::from(u32::MAX) {
            bail!(
                "CONFIG_INVALID_VALUE /catchup/expiration_minutes must be in 1..={} (got {})",
                u32::MAX,
                expiration_minutes
            );
        }

        let store_db = require_u64(cfg, "/store/db")?;
        let store_db = u32::try_from(store_db)
            .with_context(|| format!("CONFIG_INVALID_VALUE /store/db out of range: {store_db}"))?;

        let locations = require_str_list(cfg, "/geometry/wfs_ccd")?;
        let geometry = CameraGeometry::new(locations)
            .map_err(|e| anyhow::anyhow!("CONFIG_INVALID_VALUE /geometry/wfs_ccd: {e}"))?;

        Ok(Self {
            camera_name: require_str(cfg, "/camera/name")?,
            archive_controller_name: require_str(cfg, "/camera/archive_controller_name")?,
            association_key: require_str(cfg, "/camera/association_key")?,
            queues: QueueNames {
                archive_ctrl_publish: require_str(cfg, "/queues/archive_ctrl_publish")?,
                archive_ctrl_consume: require_str(cfg, "/queues/archive_ctrl_consume")?,
                forwarder_publish: require_str(cfg, "/queues/forwarder_publish")?,
                forwarder_consume: require_str(cfg, "/queues/forwarder_consume")?,
                telemetry: require_str(cfg, "/queues/telemetry")?,
            },
            messages: ForwarderMessages {
                xfer_params: require_str(cfg, "/messages/fwdr_xfer_params")?,
                end_readout: require_str(cfg, "/messages/fwdr_end_readout")?,
                header_ready: require_str(cfg, "/messages/fwdr_header_ready")?,
                ack_prefix: optional_str(cfg, "/messages/forwarder_ack_prefix")
                    .unwrap_or_else(|| DEFAULT_FORWARDER_ACK_PREFIX.to_string()),
            },
            catchup: CatchupSettings {
                expiration_minutes: expiration_minutes as u32,
                scan_interval_secs: optional_u64(cfg, "/catchup/scan_interval_secs")?.unwrap_or(0),
                handshake_timeout_secs: optional_u64(cfg, "/catchup/handshake_timeout_secs")?
                    .unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
                discovery_key: optional_str(cfg, "/catchup/discovery_key")
                    .unwrap_or_else(|| DEFAULT_DISCOVERY_KEY.to_string()),
                jobs_key: optional_str(cfg, "/catchup/jobs_key")
                    .unwrap_or_else(|| DEFAULT_JOBS_KEY.to_string()),
            },
            store: StoreSettings {
                backend: match optional_str(cfg, "/store/backend") {
                    Some(raw) => StoreBackend::parse(&raw)?,
                    None => StoreBackend::Redis,
                },
                host: require_str(cfg, "/store/host")?,
                db: store_db,
            },
            transport: TransportSettings {
                base_url: optional_str(cfg, "/transport/base_url")
                    .map(|u| u.trim().trim_end_matches('/').to_string()),
            },
            efd: EfdSettings {
                base_url: require_str(cfg, "/efd/base_url")?,
                database: require_str(cfg, "/efd/database")?,
                topics: EfdTopics {
                    image_in_oods: require_str(cfg, "/efd/topics/imageInOODS")?,
                    large_file_object_available: require_str(
                        cfg,
                        "/efd/topics/largeFileObjectAvailable",
                    )?,
                },
            },
            geometry,
        })
    }
}

fn require_str(cfg: &Value, ptr: &str) -> Result<String> {
    match cfg.pointer(ptr) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => bail!("CONFIG_INVALID_VALUE {ptr} must not be empty"),
        Some(other) => bail!("CONFIG_INVALID_VALUE {ptr} must be a string (got {other})"),
        None => bail!("CONFIG_MISSING_KEY {ptr}"),
    }
}

fn optional_str(cfg: &Value, ptr: &str) -> Option<String> {
    cfg.pointer(ptr)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn require_u64(cfg: &Value, ptr: &str) -> Result<u64> {
    optional_u64(cfg, ptr)?.with_context(|| format!("CONFIG_MISSING_KEY {ptr}"))
}

/// Accepts a non-negative integer or a numeric string.
fn optional_u64(cfg: &Value, ptr: &str) -> Result<Option<u64>> {
    match cfg.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .with_context(|| format!("CONFIG_INVALID_VALUE {ptr} must be a non-negative integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("CONFIG_INVALID_VALUE {ptr} is not an integer: {s}")),
        Some(other) => bail!("CONFIG_INVALID_VALUE {ptr} must be an integer (got {other})"),
    }
}

fn require_str_list(cfg: &Value, ptr: &str) -> Result<Vec<String>> {
    let arr = match cfg.pointer(ptr) {
        Some(Value::Array(arr)) => arr,
        Some(other) => bail!("CONFIG_INVALID_VALUE {ptr} must be a list (got {other})"),
        None => bail!("CONFIG_MISSING_KEY {ptr}"),
    };
    arr.iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str()
                .map(str::to_string)
                .with_context(|| format!("CONFIG_INVALID_VALUE {ptr}/{i} must be a string"))
        })
        .collect()
}
