//! Response normalization.
//!
//! Tool responses arrive with their real payload buried under a variable
//! number of transport envelopes: `{content: [{type: "text", text:
//! "<json>"}]}` blocks, list-wrapped copies of the same, or bare
//! JSON-encoded strings. Underneath sits a `{"results": [{type, data}]}`
//! payload. This module unwraps the envelopes — iteratively, with a hard
//! depth cap — and converts the payload into one of three canonical
//! shapes: an index catalog, a mapping tree per index, or a tabular
//! row-set.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use quarry_core::{Column, FieldTree, TabularRows, WorkflowError};

/// Maximum number of envelope layers unwrapped before the response is
/// declared unparseable. Malformed or self-referential wrapping must not
/// loop forever.
pub const MAX_ENVELOPE_DEPTH: usize = 3;

/// Canonical result of the index-discovery tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexCatalog {
    pub indices: BTreeSet<String>,
    pub data_streams: BTreeSet<String>,
}

impl IndexCatalog {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() && self.data_streams.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indices.len() + self.data_streams.len()
    }
}

/// The payload shape shared by all backend tools.
#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    results: Vec<ResultEntry>,
}

#[derive(Debug, Deserialize)]
struct ResultEntry {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Peel one envelope layer. Returns `None` when the value matches no
/// known envelope form.
fn unwrap_layer(value: &Value) -> Option<Value> {
    // {"content": [{"type": "text", "text": "<json>"}, ...]}
    if let Some(items) = value.get("content").and_then(Value::as_array) {
        let text = items
            .iter()
            .find_map(|item| item.get("text").and_then(Value::as_str))?;
        return serde_json::from_str(text).ok();
    }
    // list-of-envelope: [{"text": "<json>"}, ...] or [<envelope>, ...]
    if let Some(first) = value.as_array().and_then(|items| items.first()) {
        if let Some(text) = first.get("text").and_then(Value::as_str) {
            return serde_json::from_str(text).ok();
        }
        return Some(first.clone());
    }
    // bare {"type": "text", "text": "<json>"} block
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        return serde_json::from_str(text).ok();
    }
    // JSON-encoded string at the top level
    if let Some(s) = value.as_str() {
        return serde_json::from_str(s).ok();
    }
    None
}

/// Error flag some envelopes carry alongside their content.
fn envelope_error(value: &Value) -> Option<String> {
    let flagged = value
        .get("isError")
        .or_else(|| value.get("is_error"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !flagged {
        return None;
    }
    let message = value
        .get("content")
        .and_then(Value::as_array)
        .and_then(|items| {
            items
                .iter()
                .find_map(|item| item.get("text").and_then(Value::as_str))
        })
        .unwrap_or("tool reported an error");
    Some(message.to_string())
}

/// Error entry inside an otherwise well-formed payload.
fn payload_error(payload: &Payload) -> Option<String> {
    payload
        .results
        .iter()
        .find(|entry| entry.kind.as_deref() == Some("error"))
        .map(|entry| {
            entry
                .data
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string()
        })
}

/// Unwrap envelopes until the `{"results": ...}` payload appears.
///
/// Explicit error markers — an `isError` flag on any envelope layer or a
/// `results` entry of type `"error"` — propagate as
/// [`WorkflowError::Tool`]. Hitting the depth cap, or a shape that
/// matches no known envelope, is [`WorkflowError::Parse`]; the caller
/// decides whether that degrades or fails.
fn parse_payload(raw: &Value) -> Result<Payload, WorkflowError> {
    let mut current = raw.clone();
    let mut depth = 0;

    loop {
        if let Some(message) = envelope_error(&current) {
            return Err(WorkflowError::Tool(message));
        }

        if current.get("results").is_some() {
            let payload: Payload = serde_json::from_value(current)
                .map_err(|e| WorkflowError::Parse(format!("malformed results payload: {e}")))?;
            if let Some(message) = payload_error(&payload) {
                return Err(WorkflowError::Tool(message));
            }
            return Ok(payload);
        }

        if depth >= MAX_ENVELOPE_DEPTH {
            return Err(WorkflowError::Parse(format!(
                "no recognized payload after {depth} unwrap attempts"
            )));
        }

        match unwrap_layer(&current) {
            Some(inner) => {
                current = inner;
                depth += 1;
            }
            None => {
                return Err(WorkflowError::Parse(
                    "response matches no known envelope shape".to_string(),
                ));
            }
        }
    }
}

/// Extract index and data-stream names from a discovery response.
pub fn extract_indices(raw: &Value) -> Result<IndexCatalog, WorkflowError> {
    let payload = parse_payload(raw)?;
    let mut catalog = IndexCatalog::default();

    let Some(entry) = payload.results.first() else {
        return Ok(catalog);
    };

    collect_names(&entry.data, "indices", &mut catalog.indices);
    collect_names(&entry.data, "data_streams", &mut catalog.data_streams);

    debug!(
        indices = catalog.indices.len(),
        data_streams = catalog.data_streams.len(),
        "normalized index catalog"
    );
    Ok(catalog)
}

fn collect_names(data: &Value, key: &str, out: &mut BTreeSet<String>) {
    if let Some(items) = data.get(key).and_then(Value::as_array) {
        for item in items {
            if let Some(name) = item.get("name").and_then(Value::as_str) {
                out.insert(name.to_string());
            }
        }
    }
}

/// Extract per-index field trees from a mapping response.
pub fn extract_mappings(raw: &Value) -> Result<BTreeMap<String, FieldTree>, WorkflowError> {
    let payload = parse_payload(raw)?;
    let mut mappings = BTreeMap::new();

    let Some(entry) = payload.results.first() else {
        return Ok(mappings);
    };

    let Some(raw_mappings) = entry.data.get("mappings").and_then(Value::as_object) else {
        return Ok(mappings);
    };

    for (index, mapping) in raw_mappings {
        // Some backends nest one more `mappings` level per index.
        let mapping = mapping.get("mappings").unwrap_or(mapping);
        let tree: FieldTree = mapping
            .get("properties")
            .cloned()
            .and_then(|props| serde_json::from_value(props).ok())
            .unwrap_or_default();
        mappings.insert(index.clone(), tree);
    }

    Ok(mappings)
}

/// Extract a tabular row-set from a query-execution response.
///
/// A payload without a `tabular_data` entry yields an empty row-set;
/// whether that is an error is an execution-stage decision.
pub fn extract_rows(raw: &Value) -> Result<TabularRows, WorkflowError> {
    let payload = parse_payload(raw)?;

    let Some(entry) = payload
        .results
        .iter()
        .find(|entry| entry.kind.as_deref() == Some("tabular_data"))
    else {
        return Ok(TabularRows::default());
    };

    let columns = entry
        .data
        .get("columns")
        .and_then(Value::as_array)
        .map(|cols| cols.iter().map(lenient_column).collect())
        .unwrap_or_default();

    let rows = entry
        .data
        .get("values")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| row.as_array().cloned().unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();

    Ok(TabularRows { columns, rows })
}

/// Columns arrive as `{name, type}` objects or bare name strings.
fn lenient_column(value: &Value) -> Column {
    match value {
        Value::String(name) => Column::named(name.clone()),
        Value::Object(map) => Column {
            name: map
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            column_type: map
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        other => Column::named(other.to_string()),
    }
}
