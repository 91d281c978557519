//! InfluxQL rendering. Identifiers and literals are always quoted, so a
//! topic or image id can never change the shape of a query.

use chrono::SecondsFormat;
use cua_reconcile::TaiInstant;

/// `"ident"` with `\` and `"` escaped.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('\\', "\\\\").replace('"', "\\\""))
}

/// `'literal'` with `\` and `'` escaped.
pub fn quote_literal(lit: &str) -> String {
    format!("'{}'", lit.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn field_list(fields: &[&str]) -> String {
    if fields.is_empty() || fields == ["*"] {
        return "*".to_string();
    }
    fields
        .iter()
        .map(|f| quote_ident(f))
        .collect::<Vec<_>>()
        .join(", ")
}

fn utc_literal(t: TaiInstant) -> String {
    quote_literal(&t.to_utc().to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub fn select_time_series(topic: &str, fields: &[&str], start: TaiInstant, end: TaiInstant) -> String {
    format!(
        "SELECT {} FROM {} WHERE time >= {} AND time <= {}",
        field_list(fields),
        quote_ident(topic),
        utc_literal(start),
        utc_literal(end)
    )
}

pub fn point_query(topic: &str, fields: &[&str], key_field: &str, key: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = {}",
        field_list(fields),
        quote_ident(topic),
        quote_ident(key_field),
        quote_literal(key)
    )
}
