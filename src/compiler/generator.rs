//! Query generators.
//!
//! A generator owns the clauses of one (sub-)query: its shape, subject and
//! object variables, projection modifiers and solution ordering. Graph
//! patterns live in the [`GeneratorTree`](super::tree::GeneratorTree) arena;
//! a generator only points at its root pattern and, for sub-queries, at the
//! enclosing group filters on its result are written into.

use std::fmt;

use super::model::QueryModel;
use super::tree::{GeneratorId, PatternId};
use super::variables::{ScopeId, Variable};

/// The shape of query a generator renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// `ASK WHERE { ... }`: does any solution exist?
    Ask,
    /// `SELECT ?s ?p_ ?o_ WHERE { ?s ?p_ ?o_ . ... }`: every triple of
    /// every selected resource.
    SelectTriples,
    /// `SELECT ?v WHERE { ... }`: one value (or aggregate) per solution.
    SelectBindings,
    /// A correlated sub-query nested in another generator.
    SubQuery,
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorKind::Ask => write!(f, "ask"),
            GeneratorKind::SelectTriples => write!(f, "select-triples"),
            GeneratorKind::SelectBindings => write!(f, "select-bindings"),
            GeneratorKind::SubQuery => write!(f, "sub-query"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub variable: Variable,
    pub descending: bool,
}

impl fmt::Display for OrderTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "DESC({})", self.variable)
        } else {
            write!(f, "{}", self.variable)
        }
    }
}

/// One node of the generator tree.
#[derive(Debug)]
pub struct QueryGenerator<'m> {
    pub id: GeneratorId,
    pub kind: GeneratorKind,
    pub model: &'m QueryModel,
    pub parent: Option<GeneratorId>,
    pub scope: ScopeId,
    pub root: PatternId,
    /// Every place the generator is linked into a parent, as
    /// `(parent pattern, pattern that filters on the result go to)`.
    pub links: Vec<(PatternId, PatternId)>,
    pub subject: Variable,
    pub object: Option<Variable>,
    /// Outer variables an aggregate sub-query is grouped by.
    pub group_by: Vec<Variable>,
    pub order_by: Vec<OrderTerm>,
    pub distinct: bool,
}

impl<'m> QueryGenerator<'m> {
    pub fn new(
        id: GeneratorId,
        kind: GeneratorKind,
        model: &'m QueryModel,
        parent: Option<GeneratorId>,
        scope: ScopeId,
        root: PatternId,
        subject: Variable,
    ) -> Self {
        QueryGenerator {
            id,
            kind,
            model,
            parent,
            scope,
            root,
            links: Vec::new(),
            subject,
            object: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            distinct: false,
        }
    }

    /// The selected variable; the subject unless a projection chose another.
    pub fn object(&self) -> &Variable {
        self.object.as_ref().unwrap_or(&self.subject)
    }

    /// The pattern filters on the result go to when the generator is
    /// referenced from `pattern`, if it is linked there.
    pub fn enclosing_at(&self, pattern: PatternId) -> Option<PatternId> {
        self.links
            .iter()
            .find(|(at, _)| *at == pattern)
            .map(|(_, enclosing)| *enclosing)
    }

    pub fn is_aggregate(&self) -> bool {
        self.object().aggregate().is_some()
    }

    pub fn order_by(&mut self, variable: Variable, descending: bool) {
        self.order_by.push(OrderTerm {
            variable,
            descending,
        });
    }

    /// Leading clause up to, not including, the dataset clause.
    pub fn select_clause(&self) -> String {
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        match self.kind {
            GeneratorKind::Ask => "ASK".into(),
            GeneratorKind::SelectTriples => {
                let [s, p, o] = self.triple_variables();
                format!("SELECT {s} {p} {o}")
            }
            GeneratorKind::SelectBindings => {
                format!("SELECT {distinct}{}", self.object().projection())
            }
            GeneratorKind::SubQuery => {
                let mut terms: Vec<String> = self.group_by.iter().map(Variable::sparql).collect();
                terms.push(self.object().projection());
                format!("SELECT {distinct}{}", terms.join(" "))
            }
        }
    }

    /// The `?s ?p_ ?o_` variables of a triple-selecting query.
    pub fn triple_variables(&self) -> [String; 3] {
        [
            self.object().sparql(),
            Variable::global("p").sparql(),
            Variable::global("o").sparql(),
        ]
    }

    /// GROUP BY and ORDER BY, each preceded by a space; empty if neither.
    pub fn modifiers(&self) -> String {
        let mut out = String::new();
        if !self.group_by.is_empty() {
            let vars: Vec<String> = self.group_by.iter().map(Variable::sparql).collect();
            out.push_str(" GROUP BY ");
            out.push_str(&vars.join(" "));
        }
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self.order_by.iter().map(OrderTerm::to_string).collect();
            out.push_str(" ORDER BY ");
            out.push_str(&terms.join(" "));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::model::TypeRef;
    use crate::compiler::variables::{Aggregate, VariableAllocator};

    fn generator(kind: GeneratorKind, model: &QueryModel) -> QueryGenerator<'_> {
        let alloc = VariableAllocator::new();
        QueryGenerator::new(
            GeneratorId::ROOT,
            kind,
            model,
            None,
            alloc.root_scope(),
            PatternId::ROOT,
            VariableAllocator::global_subject(),
        )
    }

    #[test]
    fn test_select_clauses() {
        let model = QueryModel::from_model("x", TypeRef::resource("Person"));
        assert_eq!(generator(GeneratorKind::Ask, &model).select_clause(), "ASK");
        assert_eq!(
            generator(GeneratorKind::SelectTriples, &model).select_clause(),
            "SELECT ?s_ ?p_ ?o_"
        );

        let mut g = generator(GeneratorKind::SelectBindings, &model);
        g.distinct = true;
        g.object = Some(Variable::local("o1"));
        assert_eq!(g.select_clause(), "SELECT DISTINCT ?o1");
    }

    #[test]
    fn test_subquery_clause_projects_group_keys() {
        let model = QueryModel::from_model("x", TypeRef::resource("Person"));
        let mut g = generator(GeneratorKind::SubQuery, &model);
        g.object = Some(Variable::local("o1").with_aggregate(Aggregate::Count));
        g.group_by.push(VariableAllocator::global_subject());
        assert!(g.is_aggregate());
        assert_eq!(
            g.select_clause(),
            "SELECT ?s_ (COUNT(DISTINCT ?o1) AS ?o1_count)"
        );
        assert_eq!(g.modifiers(), " GROUP BY ?s_");
    }

    #[test]
    fn test_order_terms() {
        let model = QueryModel::from_model("x", TypeRef::resource("Person"));
        let mut g = generator(GeneratorKind::SelectTriples, &model);
        g.order_by(Variable::local("o1"), false);
        g.order_by(Variable::local("o2"), true);
        assert_eq!(g.modifiers(), " ORDER BY ?o1 DESC(?o2)");
    }

    #[test]
    fn test_triples_of_projected_resource() {
        let model = QueryModel::from_model("x", TypeRef::resource("Person"));
        let mut g = generator(GeneratorKind::SelectTriples, &model);
        g.object = Some(Variable::local("o3"));
        assert_eq!(g.select_clause(), "SELECT ?o3 ?p_ ?o_");
    }
}
