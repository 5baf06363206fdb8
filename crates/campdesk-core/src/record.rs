//! Normalization of raw campaign records into canonical tree nodes.
//!
//! Records in the collection come from several generations of the admin UI,
//! so field names and value types vary. Everything the compiler needs is
//! pulled out here; the rest of the record stays in the collection untouched.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Partition used when a record names no `topParent` / `parent`.
pub const DEFAULT_PARTITION: &str = "Other";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    #[default]
    Category,
}

impl NodeKind {
    /// Only the two exact literals are recognized; anything else is a category.
    pub fn parse(value: Option<&Value>) -> NodeKind {
        match value.and_then(Value::as_str) {
            Some("folder") => NodeKind::Folder,
            _ => NodeKind::Category,
        }
    }
}

/// A record after normalization, ready for tree building.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalNode {
    pub id: String,
    pub top_parent: String,
    pub parent_id: Option<String>,
    pub kind: NodeKind,
    pub name: String,
    pub lead_form_id: Option<String>,
}

/// Result of normalizing a whole collection.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub nodes: Vec<CanonicalNode>,
    /// Records skipped for lacking a usable id or name.
    pub dropped: usize,
}

/// Largest float that still holds every integer below it exactly (2^53).
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Integral floats print without a fraction, so `1.0` and `1` name the same record.
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT => {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

/// Stringify a scalar JSON value. Strings are trimmed; empty results,
/// `null`, arrays and objects yield `None`.
pub fn coerce_scalar(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => number_text(n),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Accept only non-blank strings, trimmed.
fn non_blank_str(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// The id a record is addressed by, using the same coercion as the compiler.
pub fn record_id(record: &Value) -> Option<String> {
    coerce_scalar(record.get("id"))
}

/// Normalize a single raw record. Returns `None` for records the view skips.
pub fn normalize_record(record: &Value) -> Option<CanonicalNode> {
    let fields = record.as_object()?;
    let id = coerce_scalar(fields.get("id"))?;
    let name = coerce_scalar(fields.get("name")).or_else(|| coerce_scalar(fields.get("title")))?;
    let top_parent = coerce_scalar(fields.get("topParent"))
        .or_else(|| coerce_scalar(fields.get("parent")))
        .unwrap_or_else(|| DEFAULT_PARTITION.to_string());

    Some(CanonicalNode {
        id,
        top_parent,
        parent_id: non_blank_str(fields.get("parentId")),
        kind: NodeKind::parse(fields.get("type")),
        name,
        lead_form_id: non_blank_str(fields.get("leadFormId")),
    })
}

/// Normalize a collection, silently filtering records without an id or name.
pub fn normalize(records: &[Value]) -> Normalized {
    let mut out = Normalized::default();
    for (index, record) in records.iter().enumerate() {
        match normalize_record(record) {
            Some(node) => out.nodes.push(node),
            None => {
                tracing::debug!(index, "skipping record without usable id or name");
                out.dropped += 1;
            }
        }
    }
    out
}
