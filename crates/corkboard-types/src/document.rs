//! Generic document model shared by every document store adapter.
//!
//! A document is a flat mapping of field name to scalar or timestamp value,
//! addressed by `(collection, id)`. Stores push full ordered result sets as
//! [`Snapshot`]s whenever a watched collection changes.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single field value inside a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Null,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Total order used when sorting documents by a field.
    ///
    /// Values of different kinds order by kind (null first), which keeps
    /// sorting total even for heterogeneous collections.
    pub fn cmp_for_order(&self, other: &FieldValue) -> Ordering {
        use FieldValue::*;
        match (self, other) {
            (String(a), String(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Boolean(a), Boolean(b)) => a.cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Boolean(_) => 1,
            FieldValue::Integer(_) => 2,
            FieldValue::Timestamp(_) => 3,
            FieldValue::String(_) => 4,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(ts)
    }
}

/// Field map of a document. Ordered so serialized documents are stable.
pub type Fields = BTreeMap<String, FieldValue>;

/// A stored document: store-assigned id plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    pub fn get_timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get(field).and_then(FieldValue::as_timestamp)
    }
}

/// Sort direction for a watched query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

/// Ordering of a watched query: one field plus a direction.
///
/// Ties on the field are broken by document id in the same direction, so
/// result sets are reproducible regardless of the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    /// Compare two documents under this ordering.
    ///
    /// Documents missing the order field sort as if the field were null.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let null = FieldValue::Null;
        let av = a.get(&self.field).unwrap_or(&null);
        let bv = b.get(&self.field).unwrap_or(&null);
        let ord = av.cmp_for_order(bv).then_with(|| a.id.cmp(&b.id));
        match self.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }

    /// Sort documents in place under this ordering.
    pub fn sort(&self, documents: &mut [Document]) {
        documents.sort_by(|a, b| self.compare(a, b));
    }
}

/// A full, point-in-time result set for a watched collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Collection revision this snapshot was read at.
    pub revision: u64,
    /// Every document in the collection, already ordered.
    pub documents: Vec<Document>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn doc(id: &str, created_secs: i64) -> Document {
        let mut fields = Fields::new();
        fields.insert(
            "createdAt".to_string(),
            FieldValue::Timestamp(Utc.timestamp_opt(created_secs, 0).unwrap()),
        );
        Document::new(id, fields)
    }

    #[test]
    fn test_order_desc_newest_first() {
        let mut docs = vec![doc("a", 10), doc("b", 30), doc("c", 20)];
        OrderBy::desc("createdAt").sort(&mut docs);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_order_ties_broken_by_id() {
        let mut docs = vec![doc("a", 10), doc("c", 10), doc("b", 10)];
        OrderBy::desc("createdAt").sort(&mut docs);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        OrderBy::asc("createdAt").sort(&mut docs);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_field_sorts_as_null() {
        let mut docs = vec![Document::new("x", Fields::new()), doc("y", 5)];
        OrderBy::desc("createdAt").sort(&mut docs);
        assert_eq!(docs[0].id, "y");
        assert_eq!(docs[1].id, "x");
    }

    #[test]
    fn test_field_value_json_shape() {
        let json = serde_json::to_string(&FieldValue::String("hi".to_string())).unwrap();
        assert_eq!(json, r#"{"string":"hi"}"#);
        let parsed: FieldValue = serde_json::from_str(r#""null""#).unwrap();
        assert_eq!(parsed, FieldValue::Null);
    }

    #[test]
    fn test_document_accessors() {
        let d = doc("m1", 42);
        assert!(d.get_timestamp("createdAt").is_some());
        assert!(d.get_str("createdAt").is_none());
        assert!(d.get("missing").is_none());
    }
}
