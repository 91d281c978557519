//! JSON-pointer plumbing over the merged config tree.

use serde_json::Value;

/// Registry form of a pointer: one leading slash, no trailing slash.
/// The empty pointer is the root, `/`.
pub(crate) fn canonical(p: &str) -> String {
    format!("/{}", p.trim().trim_matches('/'))
}

/// Whether registry entry `prefix` covers `leaf`. Matching is per token:
/// `/store/db` covers `/store/db/0` but not `/store/dbx`.
pub(crate) fn covers(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    leaf.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// RFC 6901 escaping for one reference token.
fn escape(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        match c {
            '~' => out.push_str("~0"),
            '/' => out.push_str("~1"),
            c => out.push(c),
        }
    }
    out
}

/// Every scalar leaf under `root` with its pointer, in document order.
/// A scalar root is the single leaf `/`.
pub(crate) fn leaves(root: &Value) -> Vec<(String, &Value)> {
    let mut out = Vec::new();
    let mut stack: Vec<(String, &Value)> = vec![(String::new(), root)];

    while let Some((ptr, v)) = stack.pop() {
        match v {
            Value::Object(map) => {
                for (k, child) in map.iter().rev() {
                    stack.push((format!("{ptr}/{}", escape(k)), child));
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate().rev() {
                    stack.push((format!("{ptr}/{i}"), child));
                }
            }
            scalar => {
                let ptr = if ptr.is_empty() { "/".to_string() } else { ptr };
                out.push((ptr, scalar));
            }
        }
    }
    out
}

/// Lay `top` over `base`. Objects merge key by key; anything else in `top`
/// (lists included) replaces what `base` had.
pub(crate) fn merge_into(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(under), Value::Object(over)) => {
            for (k, v) in over {
                match under.get_mut(&k) {
                    Some(slot) => merge_into(slot, v),
                    None => {
                        under.insert(k, v);
                    }
                }
            }
        }
        (slot, top) => *slot = top,
    }
}
