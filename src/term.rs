//! RDF terms and query results as returned by a store.
//!
//! Stores hand back either a boolean (ASK) or a table of binding rows. The
//! W3C SPARQL 1.1 Query Results JSON format is parsed with `serde_json`;
//! clients speaking other formats construct [`QueryResult`] directly.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Result, SparqlateError};
use crate::value::Value;
use crate::xsd;

/// A single RDF term bound to a variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Uri(String),
    Literal {
        value: String,
        language: Option<String>,
        datatype: Option<String>,
    },
    /// Blank node label without the `_:` prefix.
    BlankNode(String),
}

impl Term {
    pub fn uri(uri: &str) -> Self {
        Term::Uri(uri.to_string())
    }

    pub fn plain(value: &str) -> Self {
        Term::Literal {
            value: value.to_string(),
            language: None,
            datatype: None,
        }
    }

    pub fn typed(value: &str, datatype: &str) -> Self {
        Term::Literal {
            value: value.to_string(),
            language: None,
            datatype: Some(datatype.to_string()),
        }
    }

    pub fn lang(value: &str, language: &str) -> Self {
        Term::Literal {
            value: value.to_string(),
            language: Some(language.to_string()),
            datatype: None,
        }
    }

    /// The subject identifier of a resource term: the URI, or `_:label` for
    /// blank nodes. Literals have none.
    pub fn resource_id(&self) -> Option<String> {
        match self {
            Term::Uri(uri) => Some(uri.clone()),
            Term::BlankNode(label) => Some(format!("_:{label}")),
            Term::Literal { .. } => None,
        }
    }

    /// Convert to a typed value.
    pub fn to_value(&self) -> Value {
        match self {
            Term::Uri(_) | Term::BlankNode(_) => {
                Value::Uri(self.resource_id().unwrap_or_default())
            }
            Term::Literal {
                value,
                language: Some(lang),
                ..
            } => Value::LangString {
                text: value.clone(),
                lang: lang.clone(),
            },
            Term::Literal {
                value,
                datatype: Some(datatype),
                ..
            } if datatype != xsd::RDF_LANG_STRING => xsd::parse_literal(value, datatype),
            Term::Literal { value, .. } => Value::String(value.clone()),
        }
    }
}

/// One solution of a SELECT query: variable name (without sigil) to term.
///
/// Unbound variables are absent. Bindings keep the order of the result
/// header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingRow {
    bindings: Vec<(String, Term)>,
}

impl BindingRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, term: Term) -> Self {
        self.bindings.push((name.to_string(), term));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Term> {
        let name = name.trim_start_matches(['?', '$']);
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, term)| term)
    }

    /// The first bound term of the row.
    pub fn first(&self) -> Option<&Term> {
        self.bindings.first().map(|(_, term)| term)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.bindings.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// The answer to a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Boolean(bool),
    Bindings {
        variables: Vec<String>,
        rows: Vec<BindingRow>,
    },
}

impl QueryResult {
    /// Parse a `application/sparql-results+json` document.
    pub fn from_json(input: &str) -> Result<Self> {
        let doc: JsonResults = serde_json::from_str(input)?;

        if let Some(answer) = doc.boolean {
            return Ok(QueryResult::Boolean(answer));
        }

        let Some(results) = doc.results else {
            return Err(SparqlateError::Results(
                "document has neither 'boolean' nor 'results'".into(),
            ));
        };

        let variables = doc.head.vars;
        let rows = results
            .bindings
            .into_iter()
            .map(|mut solution| {
                let mut row = BindingRow::new();
                for var in &variables {
                    if let Some(term) = solution.remove(var) {
                        row.bindings.push((var.clone(), term.into()));
                    }
                }
                row
            })
            .collect();

        Ok(QueryResult::Bindings { variables, rows })
    }

    pub fn bindings(variables: &[&str], rows: Vec<BindingRow>) -> Self {
        QueryResult::Bindings {
            variables: variables.iter().map(|v| v.to_string()).collect(),
            rows,
        }
    }

    /// The boolean answer of an ASK query.
    pub fn answer(&self) -> Result<bool> {
        match self {
            QueryResult::Boolean(b) => Ok(*b),
            QueryResult::Bindings { .. } => Err(SparqlateError::Results(
                "expected a boolean answer, got bindings".into(),
            )),
        }
    }

    /// The rows of a SELECT query.
    pub fn rows(&self) -> Result<&[BindingRow]> {
        match self {
            QueryResult::Bindings { rows, .. } => Ok(rows),
            QueryResult::Boolean(_) => Err(SparqlateError::Results(
                "expected bindings, got a boolean answer".into(),
            )),
        }
    }
}

// ── SPARQL JSON results wire format ─────────────────────────────────────

#[derive(Deserialize)]
struct JsonResults {
    #[serde(default)]
    head: JsonHead,
    #[serde(default)]
    results: Option<JsonBindings>,
    #[serde(default)]
    boolean: Option<bool>,
}

#[derive(Deserialize, Default)]
struct JsonHead {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Deserialize)]
struct JsonBindings {
    bindings: Vec<HashMap<String, JsonTerm>>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum JsonTerm {
    Uri {
        value: String,
    },
    Literal {
        value: String,
        #[serde(rename = "xml:lang", default)]
        lang: Option<String>,
        #[serde(default)]
        datatype: Option<String>,
    },
    /// Emitted by older SPARQL 1.0 endpoints.
    TypedLiteral {
        value: String,
        datatype: String,
    },
    Bnode {
        value: String,
    },
}

impl From<JsonTerm> for Term {
    fn from(term: JsonTerm) -> Self {
        match term {
            JsonTerm::Uri { value } => Term::Uri(value),
            JsonTerm::Literal {
                value,
                lang,
                datatype,
            } => Term::Literal {
                value,
                language: lang,
                datatype,
            },
            JsonTerm::TypedLiteral { value, datatype } => Term::Literal {
                value,
                language: None,
                datatype: Some(datatype),
            },
            JsonTerm::Bnode { value } => Term::BlankNode(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boolean_result() {
        let result = QueryResult::from_json(r#"{"head": {}, "boolean": true}"#).unwrap();
        assert_eq!(result, QueryResult::Boolean(true));
        assert!(result.answer().unwrap());
        assert!(result.rows().is_err());
    }

    #[test]
    fn test_parse_bindings_keeps_header_order() {
        let json = r#"{
            "head": {"vars": ["s_", "p_", "o_"]},
            "results": {"bindings": [
                {
                    "o_": {"type": "literal", "value": "Alice", "xml:lang": "en"},
                    "s_": {"type": "uri", "value": "http://ex.org/alice"},
                    "p_": {"type": "uri", "value": "http://ex.org/name"}
                },
                {
                    "s_": {"type": "bnode", "value": "b0"},
                    "p_": {"type": "uri", "value": "http://ex.org/age"},
                    "o_": {"type": "typed-literal", "value": "42",
                           "datatype": "http://www.w3.org/2001/XMLSchema#int"}
                }
            ]}
        }"#;
        let result = QueryResult::from_json(json).unwrap();
        let rows = result.rows().unwrap();
        assert_eq!(rows.len(), 2);

        let names: Vec<&str> = rows[0].iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["s_", "p_", "o_"]);
        assert_eq!(rows[0].get("?o_"), Some(&Term::lang("Alice", "en")));
        assert_eq!(rows[1].get("s_").unwrap().resource_id().unwrap(), "_:b0");
        assert_eq!(rows[1].get("o_").unwrap().to_value(), Value::Int(42));
    }

    #[test]
    fn test_unbound_variables_are_absent() {
        let json = r#"{
            "head": {"vars": ["a", "b"]},
            "results": {"bindings": [{"b": {"type": "literal", "value": "x"}}]}
        }"#;
        let result = QueryResult::from_json(json).unwrap();
        let row = &result.rows().unwrap()[0];
        assert_eq!(row.len(), 1);
        assert!(row.get("a").is_none());
        assert_eq!(row.first(), Some(&Term::plain("x")));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(QueryResult::from_json("not json").is_err());
        assert!(QueryResult::from_json(r#"{"head": {"vars": []}}"#).is_err());
        let err = QueryResult::from_json(
            r#"{"head": {}, "results": {"bindings": [{"x": {"type": "triple", "value": ""}}]}}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::SparqlateErrorKind::Store);
    }

    #[test]
    fn test_term_to_value() {
        assert_eq!(Term::uri("http://a").to_value(), Value::uri("http://a"));
        assert_eq!(Term::BlankNode("x1".into()).to_value(), Value::uri("_:x1"));
        assert_eq!(Term::plain("hi").to_value(), Value::string("hi"));
        assert_eq!(
            Term::typed("true", xsd::BOOLEAN).to_value(),
            Value::Bool(true)
        );
        assert_eq!(
            Term::typed("hi", xsd::STRING).to_value(),
            Value::string("hi")
        );
    }
}
