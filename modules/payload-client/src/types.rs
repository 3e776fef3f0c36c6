use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Document id. Postgres-backed collections use integers, Mongo-backed ones strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocId {
    Int(i64),
    Text(String),
}

impl DocId {
    /// Read an id out of a relation entry: a raw id or a populated `{id, ..}` object.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(DocId::Int),
            Value::String(s) if !s.is_empty() => Some(DocId::Text(s.clone())),
            Value::Object(map) => map.get("id").and_then(DocId::from_value),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DocId::Int(n) => Value::from(*n),
            DocId::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocId::Int(n) => write!(f, "{n}"),
            DocId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for DocId {
    fn from(n: i64) -> Self {
        DocId::Int(n)
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        DocId::Text(s.to_string())
    }
}

/// The subset of the Payload query language the seeders need.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    Equals { field: String, value: String },
    Or(Vec<Where>),
}

impl Where {
    pub fn equals(field: &str, value: &str) -> Self {
        Where::Equals {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn or(clauses: Vec<Where>) -> Self {
        Where::Or(clauses)
    }

    /// Bracket-encoded query pairs, e.g. `where[or][0][title][equals]=Tax`.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.push_pairs("where", &mut out);
        out
    }

    fn push_pairs(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        match self {
            Where::Equals { field, value } => {
                out.push((format!("{prefix}[{field}][equals]"), value.clone()));
            }
            Where::Or(clauses) => {
                for (i, clause) in clauses.iter().enumerate() {
                    clause.push_pairs(&format!("{prefix}[or][{i}]"), out);
                }
            }
        }
    }

    /// Evaluate the clause against a document the way the server would.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Where::Equals { field, value } => match doc.fields.get(field) {
                Some(Value::String(s)) => s == value,
                Some(Value::Number(n)) => n.to_string() == *value,
                Some(Value::Bool(b)) => b.to_string() == *value,
                _ => field == "id" && doc.id.to_string() == *value,
            },
            Where::Or(clauses) => clauses.iter().any(|c| c.matches(doc)),
        }
    }
}

/// A collection document. Everything except `id` stays untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// IDs held in a relationship field, whether stored raw or populated.
    pub fn relation_ids(&self, field: &str) -> Vec<DocId> {
        self.fields
            .get(field)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(DocId::from_value).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FindResponse {
    #[serde(default)]
    pub docs: Vec<Document>,
    #[serde(default)]
    pub total_docs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocResponse {
    pub doc: Document,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn or_clause_encodes_indexed_brackets() {
        let clause = Where::or(vec![
            Where::equals("title", "Health Care"),
            Where::equals("slug", "health-care"),
        ]);
        assert_eq!(
            clause.query_pairs(),
            vec![
                ("where[or][0][title][equals]".to_string(), "Health Care".to_string()),
                ("where[or][1][slug][equals]".to_string(), "health-care".to_string()),
            ]
        );
    }

    #[test]
    fn doc_id_accepts_numbers_strings_and_objects() {
        assert_eq!(DocId::from_value(&json!(7)), Some(DocId::Int(7)));
        assert_eq!(DocId::from_value(&json!("abc")), Some(DocId::from("abc")));
        assert_eq!(DocId::from_value(&json!({ "id": 3, "title": "Tax" })), Some(DocId::Int(3)));
        assert_eq!(DocId::from_value(&json!(null)), None);
    }

    #[test]
    fn document_keeps_untyped_fields() {
        let d = doc(json!({ "id": "64f0", "slug": "tax", "industries": [1, { "id": 2 }] }));
        assert_eq!(d.id, DocId::from("64f0"));
        assert_eq!(d.get_str("slug"), Some("tax"));
        assert_eq!(d.relation_ids("industries"), vec![DocId::Int(1), DocId::Int(2)]);
        assert!(d.relation_ids("missing").is_empty());
    }

    #[test]
    fn where_matches_like_the_server() {
        let d = doc(json!({ "id": 1, "title": "Health Care", "slug": "health-care" }));
        assert!(Where::equals("slug", "health-care").matches(&d));
        assert!(!Where::equals("slug", "healthcare").matches(&d));
        assert!(Where::or(vec![
            Where::equals("title", "Healthcare"),
            Where::equals("slug", "health-care"),
        ])
        .matches(&d));
    }
}
