//! Shared fixtures for integration tests: a FOAF-style mapping, model
//! builders and an in-memory store client that replays scripted results.

use std::cell::RefCell;
use std::collections::VecDeque;

use sparqlate::{
    BindingRow, Expr, QueryModel, QueryResult, Result, SparqlClient, SparqlQuery, SparqlateError,
    StaticMapping, Term, TypeRef,
};

pub const FOAF: &str = "http://xmlns.com/foaf/0.1/";

#[allow(dead_code)]
pub fn mapping() -> StaticMapping {
    StaticMapping::new()
        .class("Agent", &format!("{FOAF}Agent"))
        .class("Person", &format!("{FOAF}Person"))
        .class("Organization", &format!("{FOAF}Organization"))
        .subtype("Agent", "Person")
        .subtype("Agent", "Organization")
        .property("Agent", "Name", &format!("{FOAF}name"))
        .property("Person", "Age", &format!("{FOAF}age"))
        .property("Person", "KnownPeople", &format!("{FOAF}knows"))
        .property("Person", "Member", &format!("{FOAF}member"))
}

#[allow(dead_code)]
pub fn person() -> TypeRef {
    TypeRef::resource("Person")
}

/// `from p in Model<Person>`.
#[allow(dead_code)]
pub fn people() -> QueryModel {
    QueryModel::from_model("p", person())
}

#[allow(dead_code)]
pub fn name() -> Expr {
    Expr::source("p").member("Agent", "Name", TypeRef::string())
}

#[allow(dead_code)]
pub fn age() -> Expr {
    Expr::source("p").member("Person", "Age", TypeRef::integer())
}

/// `p.KnownPeople` as a sub-query source.
#[allow(dead_code)]
pub fn friends() -> QueryModel {
    QueryModel::from_expr(
        "f",
        person(),
        Expr::source("p").member("Person", "KnownPeople", person()),
    )
}

#[allow(dead_code)]
pub fn uri_row(variable: &str, uri: &str) -> BindingRow {
    BindingRow::new().with(variable, Term::uri(uri))
}

/// A client that answers with queued results and records every query text.
#[derive(Default)]
pub struct ScriptedClient {
    results: RefCell<VecDeque<Result<QueryResult>>>,
    pub queries: RefCell<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, result: QueryResult) -> Self {
        self.results.borrow_mut().push_back(Ok(result));
        self
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.results
            .borrow_mut()
            .push_back(Err(SparqlateError::Store(message.to_string())));
        self
    }

    pub fn query(&self, index: usize) -> String {
        self.queries.borrow()[index].clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.borrow().len()
    }
}

impl SparqlClient for ScriptedClient {
    fn execute(&self, query: &SparqlQuery) -> Result<QueryResult> {
        self.queries.borrow_mut().push(query.text());
        self.results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(SparqlateError::Store("no scripted result left".into())))
    }
}
