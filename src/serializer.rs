//! Serialization of values and resources into SPARQL text, and the wrapper
//! queries the executor builds around a compiled query.
//!
//! The wrappers take the root graph pattern, the global variables and the
//! ORDER BY clause from the preprocessed [`SparqlQuery`], never from the
//! generator, so they work for hand-written queries as well.

use std::fmt::Write as _;

use crate::mapping::{RDF_TYPE, ResourceData};
use crate::preprocessor::SparqlQuery;
use crate::value::Value;
use crate::xsd;

/// The graphs a query ranges over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    graphs: Vec<String>,
}

impl Dataset {
    /// The store's default graph.
    pub fn default_graph() -> Self {
        Self::default()
    }

    pub fn graph(uri: &str) -> Self {
        Dataset {
            graphs: vec![uri.to_string()],
        }
    }

    pub fn union<'a>(uris: impl IntoIterator<Item = &'a str>) -> Self {
        Dataset {
            graphs: uris.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn graphs(&self) -> &[String] {
        &self.graphs
    }
}

/// `FROM <g> ` for every graph of the dataset; empty for the default graph.
pub fn dataset_clause(dataset: &Dataset) -> String {
    dataset
        .graphs
        .iter()
        .map(|g| format!("FROM {} ", serialize_uri(g)))
        .collect()
}

// ── Literals ────────────────────────────────────────────────────────────

/// A string literal.
///
/// Backslashes and quotes are escaped. Text containing a newline is wrapped
/// in triple quotes, anything else in single quotes.
pub fn serialize_string(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('\'', "\\'");
    if escaped.contains('\n') {
        format!("'''{escaped}'''")
    } else {
        format!("'{escaped}'")
    }
}

/// A language-tagged string literal. The tag is lower-cased.
pub fn serialize_translated_string(text: &str, lang: &str) -> String {
    format!("{}@{}", serialize_string(text), lang.to_lowercase())
}

/// `'lexical'^^<datatype>`.
pub fn serialize_typed_literal(lexical: &str, datatype: &str) -> String {
    format!("{}^^<{datatype}>", serialize_string(lexical))
}

/// A URI reference. Blank node identifiers (`_:x`) are written verbatim.
pub fn serialize_uri(uri: &str) -> String {
    if uri.starts_with('_') {
        uri.to_string()
    } else {
        format!("<{uri}>")
    }
}

/// Any value, in the form matching its type.
pub fn serialize_value(value: &Value) -> String {
    match value {
        Value::String(s) => serialize_string(s),
        Value::LangString { text, lang } => serialize_translated_string(text, lang),
        Value::Uri(uri) => serialize_uri(uri),
        other => match xsd::datatype_of(other) {
            Some(datatype) => serialize_typed_literal(&xsd::lexical_form(other), datatype),
            None => serialize_string(&xsd::lexical_form(other)),
        },
    }
}

/// A resource as a triple block: `<s> <p1> o1; <p2> o2, o3. `
///
/// Empty for a resource without values.
pub fn serialize_resource(resource: &ResourceData) -> String {
    let mut pairs: Vec<String> = resource
        .properties
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(predicate, values)| {
            let objects: Vec<String> = values.iter().map(serialize_value).collect();
            format!("{} {}", serialize_uri(predicate), objects.join(", "))
        })
        .collect();

    if !resource.types.is_empty() {
        let classes: Vec<String> = resource.types.iter().map(|c| serialize_uri(c)).collect();
        pairs.push(format!("{} {}", serialize_uri(RDF_TYPE), classes.join(", ")));
    }

    if pairs.is_empty() {
        return String::new();
    }
    format!("{} {}. ", serialize_uri(&resource.uri), pairs.join("; "))
}

// ── Wrapper queries ─────────────────────────────────────────────────────

fn prefix_declarations(query: &SparqlQuery) -> String {
    query
        .prefixes()
        .iter()
        .map(|(prefix, iri)| format!("PREFIX {prefix}: <{iri}> "))
        .collect()
}

fn subject_variable(query: &SparqlQuery) -> String {
    match query.global_variables().first() {
        Some(name) => format!("?{name}"),
        None => "?s".into(),
    }
}

fn solution_modifiers(out: &mut String, offset: Option<usize>, limit: Option<usize>) {
    if let Some(offset) = offset {
        let _ = write!(out, " OFFSET {offset}");
    }
    if let Some(limit) = limit {
        let _ = write!(out, " LIMIT {limit}");
    }
}

/// Count the distinct subjects a query selects.
pub fn count_query(dataset: &Dataset, query: &SparqlQuery) -> String {
    format!(
        "{}SELECT ( COUNT(DISTINCT {}) AS ?count ) {}WHERE {{ {} }}",
        prefix_declarations(query),
        subject_variable(query),
        dataset_clause(dataset),
        query.root_graph_pattern(),
    )
}

/// Select the distinct subject URIs of a query, in the query's order.
pub fn fetch_uris_query(
    dataset: &Dataset,
    query: &SparqlQuery,
    offset: Option<usize>,
    limit: Option<usize>,
) -> String {
    let mut out = format!(
        "{}SELECT DISTINCT {} {}WHERE {{ {} }}",
        prefix_declarations(query),
        subject_variable(query),
        dataset_clause(dataset),
        query.root_graph_pattern(),
    );
    if !query.order_by().is_empty() {
        out.push(' ');
        out.push_str(query.order_by());
    }
    solution_modifiers(&mut out, offset, limit);
    out
}

/// Fetch every triple of a bounded window of subjects.
///
/// The window is selected by an inner `SELECT DISTINCT` carrying the ORDER BY
/// and the solution modifiers, so offset and limit count subjects rather
/// than triples.
pub fn offset_limit_query(
    dataset: &Dataset,
    query: &SparqlQuery,
    offset: Option<usize>,
    limit: Option<usize>,
) -> String {
    let subject = subject_variable(query);
    let mut out = format!(
        "{}SELECT {subject} ?p ?o {}WHERE {{ {subject} ?p ?o {{ SELECT DISTINCT {subject} WHERE {{ {} }}",
        prefix_declarations(query),
        dataset_clause(dataset),
        query.root_graph_pattern(),
    );
    if !query.order_by().is_empty() {
        out.push(' ');
        out.push_str(query.order_by());
    }
    solution_modifiers(&mut out, offset, limit);
    out.push_str(" } }");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_serialize_string_escaping() {
        assert_eq!(serialize_string("Hello"), "'Hello'");
        assert_eq!(serialize_string("O'Brien"), "'O\\'Brien'");
        assert_eq!(serialize_string("C:\\temp"), "'C:\\\\temp'");
        assert_eq!(serialize_string("line1\nline2"), "'''line1\nline2'''");
        // A run of quotes cannot close triple-quoted text early.
        assert_eq!(serialize_string("it's\nok"), "'''it\\'s\nok'''");
        assert_eq!(serialize_string("a'''\nb"), "'''a\\'\\'\\'\nb'''");
    }

    #[test]
    fn test_serialize_translated_string() {
        assert_eq!(serialize_translated_string("Hallo", "DE"), "'Hallo'@de");
    }

    #[test]
    fn test_serialize_value_typed_literals() {
        assert_eq!(
            serialize_value(&Value::Int(30)),
            "'30'^^<http://www.w3.org/2001/XMLSchema#long>"
        );
        assert_eq!(
            serialize_value(&Value::Bool(true)),
            "'true'^^<http://www.w3.org/2001/XMLSchema#boolean>"
        );
        let dt = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            serialize_value(&Value::DateTime(dt)),
            "'2010-01-01T00:00:00Z'^^<http://www.w3.org/2001/XMLSchema#dateTime>"
        );
    }

    #[test]
    fn test_serialize_uri() {
        assert_eq!(serialize_uri("http://ex.org/a"), "<http://ex.org/a>");
        assert_eq!(serialize_uri("_:b0"), "_:b0");
        assert_eq!(serialize_value(&Value::uri("http://ex.org/a")), "<http://ex.org/a>");
    }

    #[test]
    fn test_serialize_resource() {
        let mut resource = ResourceData::new("http://example.com/ex");
        resource.add("nameGiven", Value::string("Peter"));
        resource.add(RDF_TYPE, Value::uri("PersonContact"));
        assert_eq!(
            serialize_resource(&resource),
            "<http://example.com/ex> <nameGiven> 'Peter'; \
             <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <PersonContact>. "
        );
    }

    #[test]
    fn test_serialize_resource_multiple_values_and_empty() {
        let mut resource = ResourceData::new("http://ex.org/r");
        assert_eq!(serialize_resource(&resource), "");

        resource.add("http://ex.org/label", Value::lang_string("Hallo", "de"));
        resource.add("http://ex.org/label", Value::lang_string("Hello", "en"));
        resource.properties.push(("http://ex.org/empty".into(), Vec::new()));
        assert_eq!(
            serialize_resource(&resource),
            "<http://ex.org/r> <http://ex.org/label> 'Hallo'@de, 'Hello'@en. "
        );
    }

    #[test]
    fn test_dataset_clause() {
        assert_eq!(dataset_clause(&Dataset::default_graph()), "");
        assert_eq!(
            dataset_clause(&Dataset::union(["http://ex.org/g1", "http://ex.org/g2"])),
            "FROM <http://ex.org/g1> FROM <http://ex.org/g2> "
        );
    }

    fn triples_query() -> SparqlQuery {
        SparqlQuery::parse(
            "SELECT ?s_ ?p_ ?o_ WHERE { ?s_ ?p_ ?o_ . ?s_ <http://ex.org/age> ?o1 . } ORDER BY DESC(?o1)",
        )
        .unwrap()
    }

    #[test]
    fn test_count_query() {
        let query = triples_query();
        assert_eq!(
            count_query(&Dataset::graph("http://ex.org/g"), &query),
            "SELECT ( COUNT(DISTINCT ?s_) AS ?count ) FROM <http://ex.org/g> WHERE { \
             ?s_ ?p_ ?o_ . ?s_ <http://ex.org/age> ?o1 . }"
        );
    }

    #[test]
    fn test_fetch_uris_query() {
        let query = triples_query();
        assert_eq!(
            fetch_uris_query(&Dataset::default_graph(), &query, Some(10), Some(5)),
            "SELECT DISTINCT ?s_ WHERE { ?s_ ?p_ ?o_ . ?s_ <http://ex.org/age> ?o1 . } \
             ORDER BY DESC ( ?o1 ) OFFSET 10 LIMIT 5"
        );
    }

    #[test]
    fn test_offset_limit_query() {
        let query = triples_query();
        assert_eq!(
            offset_limit_query(&Dataset::default_graph(), &query, None, Some(3)),
            "SELECT ?s_ ?p ?o WHERE { ?s_ ?p ?o { SELECT DISTINCT ?s_ WHERE { \
             ?s_ ?p_ ?o_ . ?s_ <http://ex.org/age> ?o1 . } ORDER BY DESC ( ?o1 ) LIMIT 3 } }"
        );
    }

    #[test]
    fn test_wrappers_repeat_prefixes() {
        let query = SparqlQuery::parse(
            "PREFIX foaf: <http://xmlns.com/foaf/0.1/> SELECT ?s ?p ?o WHERE { ?s ?p ?o . ?s a foaf:Person . }",
        )
        .unwrap();
        assert!(count_query(&Dataset::default_graph(), &query)
            .starts_with("PREFIX foaf: <http://xmlns.com/foaf/0.1/> SELECT"));
    }
}
