//! Placement records: the atomic unit of level output.
//!
//! A record is an ordered list of `(field key, value)` pairs serialized as
//! `key,value,key,value;`. Field order is part of the external format, so
//! the builder appends fields exactly in call order.
//!
//! ```
//! use corridorgen_logic::record::PlacementRecord;
//!
//! let rec = PlacementRecord::new(1338).at(465, 195).rotation(90).fixed_flags();
//! assert_eq!(rec.to_string(), "1,1338,2,465,3,195,6,90,64,1,67,1;");
//! ```

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::fields;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i64),
    /// Written in shortest round-trip form (`15.5`, `0.5`, `1`).
    Float(f64),
    /// Written verbatim. Parsed records keep their original value text here.
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// One placed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    fields: Vec<(u16, FieldValue)>,
}

impl PlacementRecord {
    /// Start a record with its object id.
    pub fn new(object_id: u32) -> Self {
        Self {
            fields: vec![(fields::OBJECT_ID, FieldValue::from(object_id))],
        }
    }

    /// Build a record from already ordered fields.
    pub fn from_fields(fields: Vec<(u16, FieldValue)>) -> Self {
        Self { fields }
    }

    /// Append an arbitrary field.
    pub fn field(mut self, key: u16, value: impl Into<FieldValue>) -> Self {
        self.fields.push((key, value.into()));
        self
    }

    pub fn at(self, x: impl Into<FieldValue>, y: impl Into<FieldValue>) -> Self {
        self.field(fields::X, x).field(fields::Y, y)
    }

    pub fn rotation(self, degrees: i32) -> Self {
        self.field(fields::ROTATION, degrees)
    }

    pub fn scale(self, scale: f64) -> Self {
        self.field(fields::SCALE, scale)
    }

    /// The `64,1,67,1` pair carried by nearly every structural piece.
    pub fn fixed_flags(self) -> Self {
        self.field(fields::NO_GLOW, 1).field(fields::NO_EFFECTS, 1)
    }

    pub fn z_layer(self, layer: i32) -> Self {
        self.field(fields::Z_LAYER, layer)
    }

    /// Object id, if the first field is one and holds an integer.
    pub fn object_id(&self) -> Option<i64> {
        match self.fields.first() {
            Some((fields::OBJECT_ID, FieldValue::Int(id))) => Some(*id),
            Some((fields::OBJECT_ID, FieldValue::Text(raw))) => raw.parse().ok(),
            _ => None,
        }
    }

    /// First value stored under `key`.
    pub fn get(&self, key: u16) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// First value under `key` rendered as text.
    pub fn get_text(&self, key: u16) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    pub fn fields(&self) -> &[(u16, FieldValue)] {
        &self.fields
    }
}

impl fmt::Display for PlacementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key},{value}")?;
        }
        f.write_str(";")
    }
}

/// Malformed record text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordParseError {
    #[error("record `{0}` has an odd number of comma-separated items")]
    UnpairedField(String),
    #[error("record `{record}` has non-numeric field key `{key}`")]
    InvalidKey { record: String, key: String },
    #[error("record `{0}` is empty")]
    Empty(String),
}

impl FromStr for PlacementRecord {
    type Err = RecordParseError;

    /// Parse one record (with or without its trailing `;`). Values are kept
    /// as raw text so re-serialization is byte-identical.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim().trim_end_matches(';');
        if body.is_empty() {
            return Err(RecordParseError::Empty(s.to_string()));
        }
        let items: Vec<&str> = body.split(',').collect();
        if items.len() % 2 != 0 {
            return Err(RecordParseError::UnpairedField(body.to_string()));
        }
        let mut parsed = Vec::with_capacity(items.len() / 2);
        for pair in items.chunks(2) {
            let key = pair[0].trim();
            let key: u16 = key.parse().map_err(|_| RecordParseError::InvalidKey {
                record: body.to_string(),
                key: key.to_string(),
            })?;
            parsed.push((key, FieldValue::Text(pair[1].trim().to_string())));
        }
        Ok(Self { fields: parsed })
    }
}

/// Parse a `;`-separated block of records. Blank entries are skipped.
pub fn parse_records(block: &str) -> Result<Vec<PlacementRecord>, RecordParseError> {
    block
        .split(';')
        .filter(|piece| !piece.trim().is_empty())
        .map(PlacementRecord::from_str)
        .collect()
}

/// Concatenate records into the level wire format.
pub fn serialize_records(records: &[PlacementRecord]) -> String {
    records.iter().map(|r| r.to_string()).collect()
}

/// Encode label text the way the level format embeds strings (URL-safe
/// base64, padded).
pub fn encode_text(text: &str) -> String {
    URL_SAFE.encode(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_call_order() {
        let rec = PlacementRecord::new(200)
            .at(450, 210)
            .rotation(-45)
            .scale(0.5)
            .fixed_flags()
            .z_layer(1);
        assert_eq!(
            rec.to_string(),
            "1,200,2,450,3,210,6,-45,32,0.5,64,1,67,1,155,1;"
        );
    }

    #[test]
    fn floats_use_shortest_form() {
        assert_eq!(FieldValue::Float(15.5).to_string(), "15.5");
        assert_eq!(FieldValue::Float(1.0).to_string(), "1");
        assert_eq!(FieldValue::Float(0.62).to_string(), "0.62");
    }

    #[test]
    fn parse_preserves_text() {
        let raw = "1,1717,2,465,3,195,21,1004,43,0a1a0.60a0a0,6,0;";
        let rec: PlacementRecord = raw.parse().unwrap();
        assert_eq!(rec.to_string(), raw);
        assert_eq!(rec.object_id(), Some(1717));
        assert_eq!(rec.get_text(fields::HSV).as_deref(), Some("0a1a0.60a0a0"));
    }

    #[test]
    fn parse_block_skips_blank_entries() {
        let recs = parse_records("1,1,2,15,3,15;;\n1,1,2,45,3,15;").unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(serialize_records(&recs), "1,1,2,15,3,15;1,1,2,45,3,15;");
    }

    #[test]
    fn parse_rejects_unpaired() {
        let err = "1,1338,2".parse::<PlacementRecord>().unwrap_err();
        assert!(matches!(err, RecordParseError::UnpairedField(_)));
    }

    #[test]
    fn parse_rejects_bad_key() {
        let err = "1,1338,x,15".parse::<PlacementRecord>().unwrap_err();
        assert!(matches!(err, RecordParseError::InvalidKey { .. }));
    }

    #[test]
    fn label_encoding() {
        assert_eq!(encode_text("100m"), "MTAwbQ==");
        assert_eq!(encode_text("200m"), "MjAwbQ==");
    }
}
