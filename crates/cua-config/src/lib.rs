//! cua-config
//!
//! Layered YAML configuration for the catch-up archiver.
//!
//! - YAML documents merge in order: earlier docs are base, later override.
//! - The merged tree is canonicalized and hashed (SHA-256) so every log line
//!   about a cycle can be tied back to the exact configuration in force.
//! - Literal credentials are refused (`CONFIG_SECRET_DETECTED`): a
//!   credential-named key holding a value, or a value shaped like a token.
//! - [`CatchupConfig::from_config_json`] extracts the typed, immutable view
//!   the daemon runs on; missing keys fail with `CONFIG_MISSING_KEY`.

mod catchup;
mod pointer;

pub use catchup::{
    CatchupConfig, CatchupSettings, EfdSettings, EfdTopics, ForwarderMessages, QueueNames,
    StoreBackend, StoreSettings, TransportSettings, DEFAULT_DISCOVERY_KEY,
    DEFAULT_FORWARDER_ACK_PREFIX, DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_JOBS_KEY,
};

use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Keys whose value is a credential whatever it looks like. Credentials
/// come from the environment; `${VAR}` references are allowed.
const CREDENTIAL_KEYS: &[&str] = &["password", "passwd", "token", "secret", "api_key"];

/// Value prefixes of well-known token formats.
const TOKEN_PREFIXES: &[&str] = &[
    "-----BEGIN",
    "AKIA",
    "ghp_",
    "github_pat_",
    "glpat-",
    "sk-",
    "xoxb-",
];

/// JSON-pointer prefixes the daemon reads. A leaf under any of them is
/// consumed; keep in step with `CatchupConfig::from_config_json`.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/camera/name",
    "/camera/archive_controller_name",
    "/camera/association_key",
    "/queues",
    "/messages",
    "/catchup",
    "/store/backend",
    "/store/host",
    "/store/db",
    "/transport",
    "/efd/base_url",
    "/efd/database",
    "/efd/topics",
    "/geometry/wfs_ccd",
];

// ---------------------------------------------------------------------------
// Unused keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Registry entries checked against, sorted and deduplicated.
    pub consumed_prefixes: Vec<String>,
    /// Leaves no registry entry covers, sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Compare every leaf of `config_json` against [`CONSUMED_POINTERS`].
/// Under [`UnusedKeyPolicy::Fail`] a stray leaf is an error.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = CONSUMED_POINTERS
        .iter()
        .map(|p| pointer::canonical(p))
        .collect();
    let unused: BTreeSet<String> = pointer::leaves(config_json)
        .into_iter()
        .map(|(ptr, _)| ptr)
        .filter(|leaf| !consumed.iter().any(|c| pointer::covers(c, leaf)))
        .collect();

    let report = UnusedKeyReport {
        consumed_prefixes: consumed.into_iter().collect(),
        unused_leaf_pointers: unused.into_iter().collect(),
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let shown: Vec<&str> = report
            .unused_leaf_pointers
            .iter()
            .take(12)
            .map(String::as_str)
            .collect();
        bail!(
            "CONFIG_UNUSED_KEYS: {} key(s) are never read by the daemon: {}",
            report.unused_leaf_pointers.len(),
            shown.join(", ")
        );
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// SHA-256 of `canonical_json`, lowercase hex.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

/// Read and layer the YAML files at `paths`, first file lowest.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| std::fs::read_to_string(p).with_context(|| format!("read config layer {p}")))
        .collect::<Result<Vec<String>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for (layer, raw) in yaml_docs.iter().enumerate() {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {layer}"))?;
        let doc = serde_json::to_value(doc)
            .with_context(|| format!("layer {layer} is not representable as json"))?;
        // A null (or empty) document changes nothing.
        if !doc.is_null() {
            pointer::merge_into(&mut merged, doc);
        }
    }

    if let Some(leaf) = credential_leaf(&merged) {
        bail!("CONFIG_SECRET_DETECTED leaf={leaf} value=REDACTED");
    }

    // serde_json's default Map keeps keys sorted, so the text is key-order stable.
    let canonical_json = serde_json::to_string(&merged).context("serialize merged config")?;
    Ok(LoadedConfig {
        config_hash: hex::encode(Sha256::digest(canonical_json.as_bytes())),
        canonical_json,
        config_json: merged,
    })
}

/// Pointer of the first leaf holding a literal credential.
fn credential_leaf(root: &Value) -> Option<String> {
    pointer::leaves(root).into_iter().find_map(|(ptr, v)| {
        let value = v.as_str()?.trim();
        let key = ptr.rsplit('/').next().unwrap_or_default();
        let named = CREDENTIAL_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k))
            && !value.is_empty()
            && !value.starts_with("${");
        let shaped = value.len() >= 8 && TOKEN_PREFIXES.iter().any(|p| value.starts_with(p));
        (named || shaped).then_some(ptr)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credential_named_key_needs_a_value() {
        assert_eq!(
            credential_leaf(&json!({"store": {"password": "hunter22"}})).as_deref(),
            Some("/store/password")
        );
        assert!(credential_leaf(&json!({"store": {"password": ""}})).is_none());
        assert!(credential_leaf(&json!({"efd": {"token": "${EFD_TOKEN}"}})).is_none());
    }

    #[test]
    fn token_shape_is_caught_under_any_key() {
        assert_eq!(
            credential_leaf(&json!({"queues": ["ok", "glpat-0123456789"]})).as_deref(),
            Some("/queues/1")
        );
        assert!(credential_leaf(&json!({"camera": {"association_key": "catchup-comcam"}})).is_none());
    }

    #[test]
    fn null_layer_is_ignored() {
        let a = load_layered_yaml_from_strings(&["store:\n  db: 3\n"]).unwrap();
        let b = load_layered_yaml_from_strings(&["store:\n  db: 3\n", "~\n"]).unwrap();
        assert_eq!(a.config_hash, b.config_hash);
    }
}
