use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Scalar value stored in a search document field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Boolean(bool),
    Date(DateTime<FixedOffset>),
    /// Exact decimal, kept in its textual form
    Decimal(String),
    Double(f64),
    Long(i64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) | FieldValue::Decimal(s) => write!(f, "{}", s),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Date(d) => write!(f, "{}", format_date(d)),
            FieldValue::Double(v) => write!(f, "{}", v),
            FieldValue::Long(v) => write!(f, "{}", v),
        }
    }
}

// Search engines expect UTC timestamps with a trailing `Z`
fn format_date(date: &DateTime<FixedOffset>) -> String {
    date.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::String(s) | FieldValue::Decimal(s) => serializer.serialize_str(s),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::Date(d) => serializer.serialize_str(&format_date(d)),
            FieldValue::Double(v) => serializer.serialize_f64(*v),
            FieldValue::Long(v) => serializer.serialize_i64(*v),
        }
    }
}

/// Value read from a node for one field: a scalar, or the values of a multi-valued property
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Single(FieldValue),
    Multiple(Vec<FieldValue>),
}

impl ResolvedValue {
    pub fn into_values(self) -> Vec<FieldValue> {
        match self {
            ResolvedValue::Single(value) => vec![value],
            ResolvedValue::Multiple(values) => values,
        }
    }
}

/// Flat search document: field id -> one or more values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: BTreeMap<String, Vec<FieldValue>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append values to a field; empty value lists leave the document untouched
    pub fn add_field(&mut self, id: impl Into<String>, value: ResolvedValue) {
        let values = value.into_values();
        if values.is_empty() {
            return;
        }
        self.fields.entry(id.into()).or_default().extend(values);
    }

    pub fn get(&self, id: &str) -> Option<&[FieldValue]> {
        self.fields.get(id).map(Vec::as_slice)
    }

    /// First value of a field, mostly useful for single-valued ids
    pub fn first(&self, id: &str) -> Option<&FieldValue> {
        self.fields.get(id).and_then(|values| values.first())
    }

    pub fn field_ids(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document{{")?;
        for (i, (id, values)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
            write!(f, "{}={}", id, rendered.join("|"))?;
        }
        write!(f, "}}")
    }
}

struct Values<'a>(&'a [FieldValue]);

impl Serialize for Values<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for value in self.0 {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (id, values) in &self.fields {
            match values.as_slice() {
                [single] => map.serialize_entry(id, single)?,
                many => map.serialize_entry(id, &Values(many))?,
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_serializes_single_and_multi_values() {
        let mut document = Document::new();
        document.add_field("id", ResolvedValue::Single(FieldValue::String("abc".into())));
        document.add_field(
            "dynamic_tags",
            ResolvedValue::Multiple(vec![
                FieldValue::String("rust".into()),
                FieldValue::String("search".into()),
            ]),
        );
        document.add_field("dynamic_count", ResolvedValue::Single(FieldValue::Long(3)));

        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(
            value,
            json!({"id": "abc", "dynamic_tags": ["rust", "search"], "dynamic_count": 3})
        );
    }

    #[test]
    fn test_dates_are_written_in_utc() {
        let date = DateTime::parse_from_rfc3339("2012-02-06T23:12:13+01:00").unwrap();
        let value = serde_json::to_value(FieldValue::Date(date)).unwrap();
        assert_eq!(value, json!("2012-02-06T22:12:13.000Z"));
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let mut document = Document::new();
        document.add_field("dynamic_tags", ResolvedValue::Multiple(vec![]));
        assert!(document.is_empty());
    }
}
