//! Query-text preprocessor.
//!
//! Re-parses SPARQL text (generated or hand-written) to answer structural
//! questions about it without a full parser:
//!
//! - the query form (ASK, SELECT, DESCRIBE, CONSTRUCT);
//! - the global variables, i.e. those projected at nesting level 0 (or, for
//!   a wildcard projection, every variable used in the body);
//! - whether the query yields triples: exactly three global variables matched
//!   in order by one triple pattern, or a wildcard over exactly three
//!   variables;
//! - whether it is ordered, and where its LIMIT/OFFSET values sit.
//!
//! The preprocessor also patches LIMIT and OFFSET in place, and extracts the
//! root graph pattern and ORDER BY clause the serializer's wrapper queries
//! are built from.

pub mod lexer;

use std::fmt;

use tracing::trace;

use crate::error::{Result, SparqlateError};
use lexer::{Token, TokenKind};

/// The form of a SPARQL query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryForm {
    #[default]
    Unknown,
    Ask,
    Select,
    Describe,
    Construct,
}

impl fmt::Display for QueryForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryForm::Unknown => write!(f, "UNKNOWN"),
            QueryForm::Ask => write!(f, "ASK"),
            QueryForm::Select => write!(f, "SELECT"),
            QueryForm::Describe => write!(f, "DESCRIBE"),
            QueryForm::Construct => write!(f, "CONSTRUCT"),
        }
    }
}

/// Classification state over a token stream.
#[derive(Debug, Clone)]
pub struct QueryPreprocessor {
    tokens: Vec<Token>,
    form: QueryForm,
    nesting: i32,
    parse_variables: bool,
    wildcard: bool,
    provides_statements: bool,
    global_variables: Vec<String>,
    in_scope_variables: Vec<String>,
    is_ordered: bool,
    limit_token: Option<usize>,
    offset_token: Option<usize>,
}

impl QueryPreprocessor {
    /// Tokenize and classify `text`.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = lexer::tokenize(text)?;
        let mut pre = QueryPreprocessor {
            tokens,
            form: QueryForm::Unknown,
            nesting: 0,
            parse_variables: false,
            wildcard: false,
            provides_statements: false,
            global_variables: Vec::new(),
            in_scope_variables: Vec::new(),
            is_ordered: false,
            limit_token: None,
            offset_token: None,
        };

        for index in 0..pre.tokens.len() {
            pre.process(index)?;
        }

        trace!(
            form = %pre.form,
            globals = ?pre.global_variables,
            triples = pre.provides_statements,
            "classified query text"
        );
        Ok(pre)
    }

    fn process(&mut self, index: usize) -> Result<()> {
        let token = &self.tokens[index];
        let kind = token.kind;
        let previous = index
            .checked_sub(1)
            .map(|i| self.tokens[i].kind);

        match kind {
            TokenKind::Ask => self.set_form(QueryForm::Ask, false, false),
            TokenKind::Describe => self.set_form(QueryForm::Describe, false, true),
            TokenKind::Select => self.set_form(QueryForm::Select, true, false),
            TokenKind::Construct => self.set_form(QueryForm::Construct, false, true),
            TokenKind::Eof => {
                if self.nesting != 0 {
                    return Err(SparqlateError::MalformedTokenStream {
                        offset: token.offset,
                        message: format!("{} unclosed '{{'", self.nesting),
                    });
                }
                if self.wildcard && self.global_variables.len() == 3 {
                    self.provides_statements = true;
                }
            }
            TokenKind::LeftCurly => {
                self.nesting += 1;
                if self.parse_variables {
                    self.process_in_scope_variables();
                }
            }
            TokenKind::RightCurly => {
                self.nesting -= 1;
                if self.nesting < 0 {
                    return Err(SparqlateError::MalformedTokenStream {
                        offset: token.offset,
                        message: "unbalanced '}'".into(),
                    });
                }
                self.parse_variables &= self.nesting > 0;
                if self.parse_variables {
                    self.process_in_scope_variables();
                }
            }
            TokenKind::Dot => {
                if self.parse_variables {
                    self.process_in_scope_variables();
                }
            }
            TokenKind::All => self.wildcard = true,
            TokenKind::Variable => {
                if self.parse_variables {
                    let name = token.variable_name().to_string();
                    if self.nesting == 0 {
                        if !self.global_variables.contains(&name) {
                            self.global_variables.push(name);
                        }
                    } else {
                        if self.wildcard && !self.global_variables.contains(&name) {
                            self.global_variables.push(name.clone());
                        }
                        self.in_scope_variables.push(name);
                    }
                }
            }
            TokenKind::OrderBy => self.is_ordered = true,
            TokenKind::Literal if self.nesting == 0 => match previous {
                Some(TokenKind::Offset) => self.offset_token = Some(index),
                Some(TokenKind::Limit) => self.limit_token = Some(index),
                _ => {}
            },
            _ => {}
        }
        Ok(())
    }

    /// Query-form keywords only change the state at the outermost level;
    /// nested sub-selects leave the form alone.
    fn set_form(&mut self, form: QueryForm, parse_variables: bool, provides_statements: bool) {
        if self.nesting == 0 {
            self.form = form;
            self.parse_variables = parse_variables;
            self.provides_statements = provides_statements;
        }
    }

    fn process_in_scope_variables(&mut self) {
        if self.global_variables.len() == 3 {
            if !self.provides_statements {
                self.provides_statements = self.global_variables == self.in_scope_variables;
            }
        } else {
            self.provides_statements = false;
        }
        self.in_scope_variables.clear();
    }

    // ── Patching ────────────────────────────────────────────────────────

    /// Replace the LIMIT value, or append `LIMIT n` before the end.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit_token = Some(self.set_modifier(self.limit_token, TokenKind::Limit, limit));
    }

    /// Replace the OFFSET value, or append `OFFSET n` before the end.
    pub fn set_offset(&mut self, offset: usize) {
        self.offset_token = Some(self.set_modifier(self.offset_token, TokenKind::Offset, offset));
    }

    fn set_modifier(&mut self, cached: Option<usize>, keyword: TokenKind, value: usize) -> usize {
        let value = value.to_string();
        match cached {
            Some(index) => {
                self.tokens[index].text = value;
                index
            }
            None => {
                let keyword_text = match keyword {
                    TokenKind::Limit => "LIMIT",
                    _ => "OFFSET",
                };
                let eof = self.tokens.len() - 1;
                self.tokens.insert(eof, Token::new(keyword, keyword_text, 0));
                self.tokens.insert(eof + 1, Token::new(TokenKind::Literal, &value, 0));
                eof + 1
            }
        }
    }

    // ── Derived views ───────────────────────────────────────────────────

    /// The token stream as text, tokens separated by single spaces.
    pub fn serialize(&self) -> String {
        join(self.tokens.iter().filter(|t| t.kind != TokenKind::Eof))
    }

    /// The tokens inside the outermost braces following the query form,
    /// i.e. the WHERE clause body.
    pub fn root_graph_pattern(&self) -> String {
        let mut depth = 0;
        let mut start = None;
        for (i, token) in self.tokens.iter().enumerate() {
            match token.kind {
                TokenKind::LeftCurly => {
                    depth += 1;
                    if depth == 1 && start.is_none() && self.is_where_brace(i) {
                        start = Some(i + 1);
                    }
                }
                TokenKind::RightCurly => {
                    depth -= 1;
                    if depth == 0
                        && let Some(s) = start
                    {
                        return join(self.tokens[s..i].iter());
                    }
                }
                _ => {}
            }
        }
        String::new()
    }

    /// Skips the template braces of CONSTRUCT.
    fn is_where_brace(&self, index: usize) -> bool {
        if self.form != QueryForm::Construct {
            return true;
        }
        index > 0 && self.tokens[index - 1].kind == TokenKind::Where
    }

    /// `ORDER BY` and its terms after the last closing brace; empty if the
    /// query is not ordered at the outermost level.
    pub fn order_by_clause(&self) -> String {
        let Some(last_close) = self
            .tokens
            .iter()
            .rposition(|t| t.kind == TokenKind::RightCurly)
        else {
            return String::new();
        };

        let tail = &self.tokens[last_close + 1..];
        let Some(start) = tail.iter().position(|t| t.kind == TokenKind::OrderBy) else {
            return String::new();
        };
        let end = tail[start..]
            .iter()
            .position(|t| {
                matches!(
                    t.kind,
                    TokenKind::Limit | TokenKind::Offset | TokenKind::Eof | TokenKind::RightCurly
                )
            })
            .map_or(tail.len(), |p| start + p);

        join(tail[start..end].iter())
    }

    /// `PREFIX name: <iri>` declarations as `(name, iri)` pairs.
    pub fn declared_prefixes(&self) -> Vec<(String, String)> {
        self.tokens
            .windows(3)
            .filter(|w| {
                w[0].kind == TokenKind::Prefix
                    && w[1].kind == TokenKind::PrefixedName
                    && w[2].kind == TokenKind::Iri
            })
            .map(|w| {
                let name = w[1].text.trim_end_matches(':').to_string();
                let iri = w[2].text.trim_start_matches('<').trim_end_matches('>').to_string();
                (name, iri)
            })
            .collect()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn form(&self) -> QueryForm {
        self.form
    }

    pub fn global_variables(&self) -> &[String] {
        &self.global_variables
    }

    pub fn provides_statements(&self) -> bool {
        self.provides_statements
    }

    pub fn is_ordered(&self) -> bool {
        self.is_ordered
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit_token.and_then(|i| self.tokens[i].text.parse().ok())
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset_token.and_then(|i| self.tokens[i].text.parse().ok())
    }
}

fn join<'a>(tokens: impl Iterator<Item = &'a Token>) -> String {
    tokens.map(|t| t.text.as_str()).collect::<Vec<_>>().join(" ")
}

/// A query ready to be sent to a store, with the structural facts the
/// preprocessor derived from its text.
#[derive(Debug, Clone, PartialEq)]
pub struct SparqlQuery {
    prologue: String,
    text: String,
    form: QueryForm,
    global_variables: Vec<String>,
    provides_statements: bool,
    is_ordered: bool,
    root_graph_pattern: String,
    order_by: String,
    prefixes: Vec<(String, String)>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl SparqlQuery {
    /// Classify hand-written query text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self::from_preprocessor(&QueryPreprocessor::parse(text)?))
    }

    pub fn from_preprocessor(pre: &QueryPreprocessor) -> Self {
        SparqlQuery {
            prologue: String::new(),
            text: pre.serialize(),
            form: pre.form(),
            global_variables: pre.global_variables().to_vec(),
            provides_statements: pre.provides_statements(),
            is_ordered: pre.is_ordered(),
            root_graph_pattern: pre.root_graph_pattern(),
            order_by: pre.order_by_clause(),
            prefixes: pre.declared_prefixes(),
            limit: pre.limit(),
            offset: pre.offset(),
        }
    }

    /// Prepend store-specific text (e.g. `DEFINE input:inference ...`).
    pub fn with_prologue(mut self, prologue: &str) -> Self {
        self.prologue = prologue.to_string();
        self
    }

    /// The full query text, including the prologue.
    pub fn text(&self) -> String {
        format!("{}{}", self.prologue, self.text)
    }

    /// The query text without the prologue.
    pub fn body(&self) -> &str {
        &self.text
    }

    pub fn form(&self) -> QueryForm {
        self.form
    }

    pub fn global_variables(&self) -> &[String] {
        &self.global_variables
    }

    /// Whether every solution is an `(s, p, o)` triple.
    pub fn provides_statements(&self) -> bool {
        self.provides_statements
    }

    pub fn is_ordered(&self) -> bool {
        self.is_ordered
    }

    pub fn root_graph_pattern(&self) -> &str {
        &self.root_graph_pattern
    }

    pub fn order_by(&self) -> &str {
        &self.order_by
    }

    pub fn prefixes(&self) -> &[(String, String)] {
        &self.prefixes
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }
}

impl fmt::Display for SparqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prologue, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> QueryPreprocessor {
        QueryPreprocessor::parse(text).unwrap()
    }

    // ── Classification ──────────────────────────────────────────────────

    #[test]
    fn test_select_triples_provides_statements() {
        let pre = parse("SELECT ?s ?p ?o WHERE { ?s ?p ?o . }");
        assert_eq!(pre.form(), QueryForm::Select);
        assert_eq!(pre.global_variables(), ["s", "p", "o"]);
        assert!(pre.provides_statements());
    }

    #[test]
    fn test_select_triples_with_extra_patterns() {
        let pre = parse(
            "SELECT ?s_ ?p_ ?o_ WHERE { ?s_ ?p_ ?o_ . ?s_ a <http://ex.org/C> . \
             ?s_ <http://ex.org/age> ?o1 . FILTER(?o1 > 30) }",
        );
        assert!(pre.provides_statements());
    }

    #[test]
    fn test_wildcard_over_three_variables() {
        let pre = parse("SELECT * WHERE { ?s ?p ?o }");
        assert_eq!(pre.global_variables(), ["s", "p", "o"]);
        assert!(pre.provides_statements());
    }

    #[test]
    fn test_wildcard_over_four_variables() {
        let pre = parse("SELECT * WHERE { ?s ?p ?o . ?o ?q ?x . }");
        assert!(!pre.provides_statements());
    }

    #[test]
    fn test_single_variable_select() {
        let pre = parse("SELECT ?s WHERE { ?s ?p ?o }");
        assert_eq!(pre.global_variables(), ["s"]);
        assert!(!pre.provides_statements());
    }

    #[test]
    fn test_variables_out_of_order() {
        let pre = parse("SELECT ?s ?p ?o WHERE { ?o ?p ?s . }");
        assert!(!pre.provides_statements());
    }

    #[test]
    fn test_ask_never_provides_statements() {
        let pre = parse("ASK WHERE { ?s ?p ?o }");
        assert_eq!(pre.form(), QueryForm::Ask);
        assert!(!pre.provides_statements());
        assert!(pre.global_variables().is_empty());
    }

    #[test]
    fn test_describe_and_construct_provide_statements() {
        assert!(parse("DESCRIBE ?s WHERE { ?s ?p ?o }").provides_statements());
        let pre = parse("CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o . ?s a ?t }");
        assert_eq!(pre.form(), QueryForm::Construct);
        assert!(pre.provides_statements());
        assert_eq!(pre.root_graph_pattern(), "?s ?p ?o . ?s a ?t");
    }

    #[test]
    fn test_nested_select_keeps_outer_form() {
        let pre = parse("ASK { { SELECT ?s WHERE { ?s ?p ?o } } }");
        assert_eq!(pre.form(), QueryForm::Ask);
    }

    #[test]
    fn test_ordered_flag() {
        assert!(parse("SELECT ?s WHERE { ?s ?p ?o } ORDER BY ?o").is_ordered());
        assert!(!parse("SELECT ?s WHERE { ?s ?p ?o }").is_ordered());
    }

    // ── Patching ────────────────────────────────────────────────────────

    #[test]
    fn test_set_limit_appends_and_replaces() {
        let mut pre = parse("SELECT ?s WHERE { ?s ?p ?o }");
        pre.set_limit(10);
        assert_eq!(pre.serialize(), "SELECT ?s WHERE { ?s ?p ?o } LIMIT 10");
        pre.set_limit(5);
        assert_eq!(pre.serialize(), "SELECT ?s WHERE { ?s ?p ?o } LIMIT 5");
        assert_eq!(pre.limit(), Some(5));
    }

    #[test]
    fn test_set_offset_replaces_existing() {
        let mut pre = parse("SELECT ?s WHERE { ?s ?p ?o } OFFSET 3 LIMIT 2");
        assert_eq!(pre.offset(), Some(3));
        pre.set_offset(7);
        pre.set_offset(7);
        assert_eq!(pre.serialize(), "SELECT ?s WHERE { ?s ?p ?o } OFFSET 7 LIMIT 2");
    }

    #[test]
    fn test_nested_limit_is_not_cached() {
        let mut pre = parse("SELECT ?s WHERE { { SELECT ?s WHERE { ?s ?p ?o } LIMIT 1 } }");
        assert_eq!(pre.limit(), None);
        pre.set_limit(4);
        assert!(pre.serialize().ends_with("LIMIT 1 } } LIMIT 4"));
    }

    // ── Derived views ───────────────────────────────────────────────────

    #[test]
    fn test_root_graph_pattern() {
        let pre = parse("SELECT ?s FROM <http://g> WHERE { ?s ?p ?o . { ?s a ?t } } ORDER BY ?s");
        assert_eq!(pre.root_graph_pattern(), "?s ?p ?o . { ?s a ?t }");
    }

    #[test]
    fn test_order_by_clause() {
        let pre = parse("SELECT ?s WHERE { ?s ?p ?o } ORDER BY ?o DESC(?s) LIMIT 3");
        assert_eq!(pre.order_by_clause(), "ORDER BY ?o DESC ( ?s )");
        let pre = parse("SELECT ?s WHERE { { SELECT ?s WHERE { ?s ?p ?o } ORDER BY ?o } }");
        assert_eq!(pre.order_by_clause(), "");
    }

    #[test]
    fn test_declared_prefixes() {
        let pre = parse(
            "PREFIX foaf: <http://xmlns.com/foaf/0.1/> PREFIX : <http://ex.org/> \
             SELECT ?s WHERE { ?s a foaf:Person }",
        );
        assert_eq!(
            pre.declared_prefixes(),
            vec![
                ("foaf".to_string(), "http://xmlns.com/foaf/0.1/".to_string()),
                (String::new(), "http://ex.org/".to_string()),
            ]
        );
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(matches!(
            QueryPreprocessor::parse("SELECT ?s WHERE { ?s ?p ?o"),
            Err(SparqlateError::MalformedTokenStream { .. })
        ));
        assert!(matches!(
            QueryPreprocessor::parse("SELECT ?s WHERE ?s ?p ?o }"),
            Err(SparqlateError::MalformedTokenStream { offset: 25, .. })
        ));
    }

    #[test]
    fn test_sparql_query_prologue() {
        let query = SparqlQuery::parse("ASK { ?s ?p ?o }")
            .unwrap()
            .with_prologue("DEFINE input:inference 'urn:rules' \n");
        assert_eq!(query.text(), "DEFINE input:inference 'urn:rules' \nASK { ?s ?p ?o }");
        assert_eq!(query.body(), "ASK { ?s ?p ?o }");
        assert_eq!(query.form(), QueryForm::Ask);
    }
}
