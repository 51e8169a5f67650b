//! Shared fixtures for expression compiler unit tests.
//!
//! Provides a small FOAF-flavoured mapping, member builders for the
//! `Person` type and helpers that compile a model to query text.

use crate::compiler::generator::GeneratorKind;
use crate::compiler::model::{Expr, QueryModel, TypeKind, TypeRef};
use crate::config::QueryConfig;
use crate::error::Result;
use crate::mapping::StaticMapping;
use crate::serializer::Dataset;

const FOAF: &str = "http://xmlns.com/foaf/0.1/";
const EX: &str = "http://ex.org/";

// ── Mapping ─────────────────────────────────────────────────────────────

/// `Agent` with subtypes `Person` and `Robot`; people have names, ages,
/// friends, an activity flag and a group.
pub fn mapping() -> StaticMapping {
    StaticMapping::new()
        .class("Agent", &format!("{FOAF}Agent"))
        .class("Person", &format!("{FOAF}Person"))
        .class("Robot", &format!("{EX}Robot"))
        .class("Group", &format!("{FOAF}Group"))
        .subtype("Agent", "Person")
        .subtype("Agent", "Robot")
        .property("Person", "Name", &format!("{FOAF}name"))
        .property("Person", "Age", &format!("{FOAF}age"))
        .property("Person", "KnownPeople", &format!("{FOAF}knows"))
        .property("Person", "Active", &format!("{EX}active"))
        .property("Person", "Group", &format!("{EX}group"))
        .property("Group", "Name", &format!("{EX}name"))
}

// ── Builders ────────────────────────────────────────────────────────────

pub fn person() -> TypeRef {
    TypeRef::resource("Person")
}

pub fn agent() -> TypeRef {
    TypeRef::resource("Agent")
}

/// `from x in Model<Person>`.
pub fn person_query() -> QueryModel {
    QueryModel::from_model("x", person())
}

pub fn name() -> Expr {
    Expr::source("x").member("Person", "Name", TypeRef::string())
}

pub fn age() -> Expr {
    Expr::source("x").member("Person", "Age", TypeRef::integer())
}

pub fn status() -> Expr {
    Expr::source("x").member("Person", "Active", TypeRef::bool())
}

/// `x.Group.Name`.
pub fn group_name() -> Expr {
    Expr::source("x")
        .member("Person", "Group", TypeRef::resource("Group"))
        .member("Group", "Name", TypeRef::string())
}

pub fn uri_of(item: &str) -> Expr {
    Expr::source(item).member("Resource", "Uri", TypeRef::new("Uri", TypeKind::Uri))
}

// ── Compilation ─────────────────────────────────────────────────────────

pub fn compile(model: &QueryModel, kind: GeneratorKind) -> Result<String> {
    let query = crate::compiler::compile(
        model,
        kind,
        &mapping(),
        &QueryConfig::new(),
        &Dataset::default_graph(),
    )?;
    Ok(query.text())
}

/// Compile as a value-selecting query.
pub fn compile_select(model: &QueryModel) -> Result<String> {
    compile(model, GeneratorKind::SelectBindings)
}

pub fn compile_with(model: &QueryModel, config: &QueryConfig) -> Result<String> {
    let query = crate::compiler::compile(
        model,
        GeneratorKind::SelectBindings,
        &mapping(),
        config,
        &Dataset::default_graph(),
    )?;
    Ok(query.text())
}

// ── Assertions ──────────────────────────────────────────────────────────

/// Assert that every fragment occurs in the compiled text.
pub fn assert_sparql_contains(sparql: &str, fragments: &[&str]) {
    for fragment in fragments {
        assert!(
            sparql.contains(fragment),
            "expected fragment not found.\nFragment: {fragment}\nQuery:    {sparql}"
        );
    }
}
