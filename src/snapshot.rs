//! Snapshot body decoding and row extraction.

use crate::error::ImportError;
use crate::types::{ObjectRecord, Resource};
use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use serde_json::Value;
use std::io;

/// Body of a `<resource>-0.json` snapshot.
#[derive(Deserialize, Debug)]
pub(crate) struct Snapshot {
    pub data: Vec<Value>,
}

/// Decodes a snapshot body into its `data` array.
pub(crate) fn parse_snapshot(body: &[u8]) -> Result<Vec<Value>, ImportError> {
    let snapshot: Snapshot = serde_json::from_slice(body)?;
    Ok(snapshot.data)
}

/// Compact JSON formatter that writes non-ASCII characters as `\uXXXX`
/// escapes (UTF-16 units, lowercase hex).
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Serializes `value` as compact, ASCII-only JSON.
pub(crate) fn to_compact_json(value: &Value) -> Result<String, ImportError> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, AsciiFormatter);
    value.serialize(&mut ser)?;
    String::from_utf8(out)
        .map_err(|e| ImportError::IoError(io::Error::new(io::ErrorKind::InvalidData, e)))
}

impl ObjectRecord {
    /// Builds a row from one element of a snapshot's `data` array.
    ///
    /// `index` is the element's position, used only for error reporting.
    pub fn from_value(resource: Resource, index: usize, obj: &Value) -> Result<Self, ImportError> {
        let obj_id = obj
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ImportError::MissingId {
                resource: resource.to_string(),
                index,
            })?;
        let updated = obj
            .get("updated")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        Ok(Self {
            resource,
            obj_id,
            updated,
            payload: to_compact_json(obj)?,
        })
    }
}

/// Converts a snapshot's `data` array into rows, keeping source order.
pub fn records_from_snapshot(
    resource: Resource,
    data: &[Value],
) -> Result<Vec<ObjectRecord>, ImportError> {
    data.iter()
        .enumerate()
        .map(|(index, obj)| ObjectRecord::from_value(resource, index, obj))
        .collect()
}
