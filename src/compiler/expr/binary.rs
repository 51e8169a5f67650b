//! Comparisons and logical operators.
//!
//! A comparison always has a constant on one side after normalization. The
//! other side decides the emitted pattern:
//!
//! - member access: `FILTER(?v op constant)` on the member's object variable
//! - `null`: a `FILTER NOT EXISTS` for `== null`, a plain binding for `!= null`
//! - sub-query: a filter on the sub-query's result next to its sub-select
//! - query source: `FILTER(?s = <uri>)`
//! - `GetType()`: an exact type filter

use super::member::TypeMatch;
use super::{Comparison, ExpressionCompiler, Trace};
use crate::compiler::model::{BinaryOp, Constant, Expr};
use crate::compiler::tree::{Cursor, PatternId};
use crate::compiler::variables::Variable;
use crate::error::{Result, SparqlateError};
use crate::serializer::serialize_value;
use crate::value::Value;

impl<'m> ExpressionCompiler<'m> {
    pub(super) fn visit_comparison(
        &mut self,
        cmp: Comparison<'m>,
        cx: Cursor,
        trace: Option<&Trace<'_>>,
    ) -> Result<()> {
        match cmp.operand {
            Expr::Member { .. } => self.compare_member(cmp, cx),
            Expr::SubQuery(model) => {
                let (id, pattern) = self.ensure_subquery(cmp.operand, model, cx)?;
                let value = comparable_value(&cmp)?;
                let var = self.tree.result_variable(id);
                self.filter_compare(pattern, &var, cmp.op, value);
                Ok(())
            }
            Expr::QuerySource(_) => {
                if !matches!(cmp.op, BinaryOp::Equal | BinaryOp::NotEqual) {
                    return Err(SparqlateError::unsupported(format!(
                        "operator '{}' on a resource identity",
                        cmp.op
                    )));
                }
                let value = comparable_value(&cmp)?;
                let var = self.resolve_subject(cx, cmp.operand)?;
                self.filter_compare(cx.pattern, &var, cmp.op, value);
                Ok(())
            }
            Expr::MethodCall {
                target: Some(target),
                method: crate::compiler::model::Method::GetType,
                ..
            } => self.compare_type(target, cmp, cx, trace),
            other => Err(SparqlateError::unsupported(format!(
                "comparison on a {}: {other}",
                other.kind_name()
            ))),
        }
    }

    pub(super) fn visit_or(
        &mut self,
        left: &'m Expr,
        right: &'m Expr,
        cx: Cursor,
        trace: Option<&Trace<'_>>,
    ) -> Result<()> {
        let (l, r) = self.tree.add_union(cx.pattern);
        self.visit(left, cx.with_pattern(l), trace)?;
        self.visit(right, cx.with_pattern(r), trace)
    }

    fn compare_member(&mut self, cmp: Comparison<'m>, cx: Cursor) -> Result<()> {
        if let Constant::Null = cmp.constant {
            return self.compare_null(cmp, cx);
        }
        let value = comparable_value(&cmp)?;
        let var = self.resolve_member(cx, cmp.operand)?;
        self.filter_compare(cx.pattern, &var, cmp.op, value);
        Ok(())
    }

    /// `x.Member == null` holds when no value exists; `!= null` when one does.
    fn compare_null(&mut self, cmp: Comparison<'m>, cx: Cursor) -> Result<()> {
        let Expr::Member { target, member } = cmp.operand else {
            return Err(SparqlateError::InternalError(
                "null comparison on a non-member".into(),
            ));
        };
        if member.name == "Uri" {
            return Err(SparqlateError::unsupported(
                "null comparison on a resource identity",
            ));
        }
        match cmp.op {
            BinaryOp::Equal => {
                let subject = self.resolve_subject(cx, target)?;
                let predicate = self.predicate_of(member)?;
                let inner = self.tree.add_not_exists(cx.pattern);
                let value = self.tree.variables.create_local("o");
                self.tree
                    .add_triple(inner, &subject.sparql(), &predicate, &value.sparql());
                Ok(())
            }
            BinaryOp::NotEqual => self.resolve_member(cx, cmp.operand).map(|_| ()),
            op => Err(SparqlateError::unsupported(format!(
                "operator '{op}' against null"
            ))),
        }
    }

    fn compare_type(
        &mut self,
        target: &'m Expr,
        cmp: Comparison<'m>,
        cx: Cursor,
        trace: Option<&Trace<'_>>,
    ) -> Result<()> {
        let Constant::Type(ty) = cmp.constant else {
            return Err(SparqlateError::unsupported(format!(
                "GetType() compared with {}",
                cmp.constant
            )));
        };
        let negated = match cmp.op {
            BinaryOp::NotEqual => true,
            BinaryOp::Equal => Trace::is_negated(trace),
            op => {
                return Err(SparqlateError::unsupported(format!(
                    "operator '{op}' on GetType()"
                )));
            }
        };
        let var = self.resolve_subject(cx, target)?;
        self.type_filter(cx.pattern, &var, ty, TypeMatch::Exact, negated)
    }

    pub(super) fn filter_compare(
        &mut self,
        pattern: PatternId,
        var: &Variable,
        op: BinaryOp,
        value: &Value,
    ) {
        let expr = format!("{} {} {}", var.sparql(), op.sparql(), serialize_value(value));
        self.tree.add_filter(pattern, expr);
    }
}

/// The literal side of a comparison.
fn comparable_value<'a>(cmp: &Comparison<'a>) -> Result<&'a Value> {
    match cmp.constant {
        Constant::Value(value) => Ok(value),
        other => Err(SparqlateError::unsupported(format!(
            "comparison of {} with {other}",
            cmp.operand
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::*;
    use crate::compiler::model::{Expr, TypeRef};
    use crate::error::SparqlateError;

    // ── Member comparisons ──────────────────────────────────────────────

    #[test]
    fn test_compare_member_greater_than() {
        let model = person_query().filter(age().greater_than(Expr::int(30)));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &[
            "?s_ <http://xmlns.com/foaf/0.1/age> ?o1 .",
            "FILTER ( ?o1 > '30'^^<http://www.w3.org/2001/XMLSchema#long> )",
        ]);
    }

    #[test]
    fn test_compare_constant_on_left_is_mirrored() {
        let model = person_query().filter(Expr::int(30).less_than(age()));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["FILTER ( ?o1 > '30'"]);
    }

    #[test]
    fn test_compare_string_equality() {
        let model = person_query().filter(name().equal(Expr::string("Alice")));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["FILTER ( ?o1 = 'Alice' )"]);
    }

    #[test]
    fn test_same_member_shares_variable() {
        let model = person_query()
            .filter(age().greater_than(Expr::int(18)))
            .filter(age().less_than(Expr::int(65)));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["?o1 > '18'", "?o1 < '65'"]);
        assert!(!sparql.contains("?o2"), "{sparql}");
    }

    #[test]
    fn test_chained_member_binds_intermediate() {
        let model = person_query().filter(group_name().equal(Expr::string("Admins")));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &[
            "?s_ <http://ex.org/group> ?o1 .",
            "?o1 <http://ex.org/name> ?o2 .",
            "FILTER ( ?o2 = 'Admins' )",
        ]);
    }

    // ── Null ────────────────────────────────────────────────────────────

    #[test]
    fn test_compare_null() {
        let model = person_query().filter(name().equal(Expr::null()));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &[
            "FILTER NOT EXISTS { ?s_ <http://xmlns.com/foaf/0.1/name> ?o1 . }",
        ]);

        let model = person_query().filter(name().not_equal(Expr::null()));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["?s_ <http://xmlns.com/foaf/0.1/name> ?o1 ."]);
        assert!(!sparql.contains("NOT EXISTS"));
    }

    #[test]
    fn test_compare_null_ordering_is_unsupported() {
        let model = person_query().filter(age().greater_than(Expr::null()));
        assert!(matches!(
            compile_select(&model),
            Err(SparqlateError::UnsupportedShape(_))
        ));
    }

    // ── Logical operators ───────────────────────────────────────────────

    #[test]
    fn test_or_emits_union() {
        let model = person_query().filter(
            age()
                .greater_than(Expr::int(30))
                .or_else(name().starts_with("A")),
        );
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &[
            "{ ?s_ <http://xmlns.com/foaf/0.1/age> ?o1 . FILTER ( ?o1 > '30'",
            "} UNION { ?s_ <http://xmlns.com/foaf/0.1/name> ?o2 . FILTER ( REGEX ( STR ( ?o2 ) , '^A' ) ) }",
        ]);
    }

    #[test]
    fn test_and_stays_in_same_pattern() {
        let model = person_query().filter(
            age()
                .greater_than(Expr::int(30))
                .and_also(name().equal(Expr::string("Bob"))),
        );
        let sparql = compile_select(&model).unwrap();
        assert!(!sparql.contains("UNION"));
        assert_sparql_contains(&sparql, &["?o1 > '30'", "?o2 = 'Bob'"]);
    }

    // ── Identity and types ──────────────────────────────────────────────

    #[test]
    fn test_compare_query_source_with_uri() {
        let model = person_query().filter(
            Expr::source("x").equal(Expr::uri("http://ex.org/people/alice")),
        );
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["FILTER ( ?s_ = <http://ex.org/people/alice> )"]);
    }

    #[test]
    fn test_compare_uri_member() {
        let model = person_query().filter(uri_of("x").not_equal(Expr::uri("http://ex.org/a")));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["FILTER ( ?s_ != <http://ex.org/a> )"]);
    }

    #[test]
    fn test_compare_get_type() {
        let model = person_query()
            .filter(Expr::source("x").get_type().equal(Expr::type_of(agent())));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["?s_ a <http://xmlns.com/foaf/0.1/Agent> ."]);
        assert!(!sparql.contains("NOT EXISTS"));

        let model = person_query()
            .filter(Expr::source("x").get_type().not_equal(Expr::type_of(agent())));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &[
            "FILTER NOT EXISTS { ?s_ a <http://xmlns.com/foaf/0.1/Agent> . }",
        ]);
    }

    #[test]
    fn test_negated_get_type_equals() {
        let model = person_query().filter(
            !Expr::source("x")
                .get_type()
                .equals(Expr::type_of(TypeRef::resource("Agent"))),
        );
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["FILTER NOT EXISTS { ?s_ a <http://xmlns.com/foaf/0.1/Agent> . }"]);
    }

    #[test]
    fn test_get_type_against_value_is_unsupported() {
        let model = person_query().filter(Expr::source("x").get_type().equal(Expr::int(1)));
        assert!(compile_select(&model).is_err());
    }
}
