//! Query models: the root query and nested sub-queries.
//!
//! [`ExpressionCompiler::compile_model`] walks the clauses of one model into
//! its generator: source, predicates, projection, result operators, then
//! orderings. A sub-query expression gets its own generator the first time
//! it is seen and is linked into the pattern that referenced it.

use tracing::trace;

use super::member::TypeMatch;
use super::ExpressionCompiler;
use crate::compiler::model::{Expr, QueryModel, ResultOperator, SourceExpr};
use crate::compiler::tree::{Cursor, GeneratorId, PatternId};
use crate::compiler::variables::{Aggregate, VariableAllocator};
use crate::error::{Result, SparqlateError};

impl<'m> ExpressionCompiler<'m> {
    /// The generator of a sub-query expression, compiling it on first use,
    /// and the pattern that filters on its result go to when referenced
    /// from `cx`.
    ///
    /// A generator is compiled once per key but linked into every pattern
    /// that references it, so a filter never lands in a sibling branch.
    pub(super) fn ensure_subquery(
        &mut self,
        expr: &'m Expr,
        model: &'m QueryModel,
        cx: Cursor,
    ) -> Result<(GeneratorId, PatternId)> {
        let key = expr.key();
        match self.tree.subquery(&key) {
            Some(id) => Ok((id, self.tree.link_at(cx, id))),
            None => self.visit_subquery(model, &key, cx),
        }
    }

    fn visit_subquery(
        &mut self,
        model: &'m QueryModel,
        key: &str,
        cx: Cursor,
    ) -> Result<(GeneratorId, PatternId)> {
        if let Some(op) = model.result_operators.iter().find(|op| {
            matches!(
                op,
                ResultOperator::First { .. }
                    | ResultOperator::Last { .. }
                    | ResultOperator::Single { .. }
                    | ResultOperator::Skip(_)
                    | ResultOperator::Take(_)
            )
        }) {
            return Err(SparqlateError::unsupported(format!(
                "{op} is not supported in sub-queries"
            )));
        }

        let id = self.tree.create_subquery(cx.generator, key, model);
        self.compile_model(id)?;

        if self.tree.generator(id).is_aggregate() {
            let result = self.tree.result_variable(id);
            let scope = self.scope(cx);
            self.tree.variables.set_object(scope, key, result);
        }
        let enclosing = self.tree.link_child(cx, id);
        Ok((id, enclosing))
    }

    /// Compile every clause of a generator's model.
    pub(crate) fn compile_model(&mut self, id: GeneratorId) -> Result<()> {
        let model = self.tree.generator(id).model;
        let cx = self.tree.cursor(id);
        trace!(generator = ?id, model = %model, "compile model");

        self.visit_source(id, model, cx)?;
        for predicate in &model.predicates {
            self.visit(predicate, cx, None)?;
        }
        self.visit_projection(id, model, cx)?;
        self.visit_result_operators(id, model, cx)?;
        self.visit_orderings(id, model, cx)
    }

    fn visit_source(&mut self, id: GeneratorId, model: &'m QueryModel, cx: Cursor) -> Result<()> {
        let scope = self.scope(cx);
        let item = &model.source.item_name;

        match &model.source.source {
            SourceExpr::Model => {
                let key = format!("Model<{}>", model.source.item_type.name);
                let subject = if id == GeneratorId::ROOT {
                    VariableAllocator::global_subject()
                } else {
                    self.tree.variables.create_local("s")
                };
                self.tree.variables.set_subject(scope, &key, subject.clone());
                self.tree.variables.add_source(scope, item, &key);
                self.tree.generator_mut(id).subject = subject.clone();
                self.source_type_constraint(cx.pattern, &subject, &model.source.item_type)
            }
            SourceExpr::Expr(source) => {
                if !matches!(source.as_ref(), Expr::Member { .. }) {
                    return Err(SparqlateError::unsupported(format!(
                        "query over a {}: {source}",
                        source.kind_name()
                    )));
                }
                let key = source.key();
                let subject = self.resolve_member(cx, source)?;
                self.tree.variables.set_subject(scope, &key, subject.clone());
                self.tree.variables.add_source(scope, item, &key);

                let correlation = match source.source_root() {
                    Some(outer) => Some(self.source_subject(scope, outer)?),
                    None => None,
                };
                let generator = self.tree.generator_mut(id);
                generator.subject = subject;
                generator.group_by.extend(correlation);
                Ok(())
            }
        }
    }

    fn visit_projection(&mut self, id: GeneratorId, model: &'m QueryModel, cx: Cursor) -> Result<()> {
        let object = match &model.projection {
            None | Some(Expr::QuerySource(_)) => None,
            Some(expr @ Expr::Member { .. }) => Some(self.resolve_member(cx, expr)?),
            Some(expr @ Expr::SubQuery(inner)) => {
                let (child, _) = self.ensure_subquery(expr, inner, cx)?;
                Some(self.tree.result_variable(child))
            }
            Some(other) => {
                return Err(SparqlateError::unsupported(format!(
                    "projection of a {}: {other}",
                    other.kind_name()
                )));
            }
        };
        self.tree.generator_mut(id).object = object;
        Ok(())
    }

    fn visit_result_operators(
        &mut self,
        id: GeneratorId,
        model: &'m QueryModel,
        cx: Cursor,
    ) -> Result<()> {
        for op in &model.result_operators {
            match op {
                ResultOperator::Count | ResultOperator::LongCount => {
                    self.aggregate(id, Aggregate::Count)?
                }
                ResultOperator::Sum => self.aggregate(id, Aggregate::Sum)?,
                ResultOperator::Average => self.aggregate(id, Aggregate::Average)?,
                ResultOperator::Min => self.aggregate(id, Aggregate::Min)?,
                ResultOperator::Max => self.aggregate(id, Aggregate::Max)?,
                ResultOperator::Distinct => self.tree.generator_mut(id).distinct = true,
                ResultOperator::OfType(ty) => {
                    let subject = self.tree.generator(id).subject.clone();
                    self.type_filter(cx.pattern, &subject, ty, TypeMatch::WithSubclasses, false)?;
                }
                // Existence and solution bounds are applied to the query
                // text, not the pattern.
                ResultOperator::Any
                | ResultOperator::First { .. }
                | ResultOperator::Last { .. }
                | ResultOperator::Single { .. }
                | ResultOperator::Skip(_)
                | ResultOperator::Take(_) => {}
            }
        }
        Ok(())
    }

    fn aggregate(&mut self, id: GeneratorId, aggregate: Aggregate) -> Result<()> {
        let generator = self.tree.generator_mut(id);
        if let Some(existing) = generator.object().aggregate() {
            return Err(SparqlateError::unsupported(format!(
                "{} over {}",
                aggregate.functor(),
                existing.functor()
            )));
        }
        generator.object = Some(generator.object().with_aggregate(aggregate));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::*;
    use crate::compiler::generator::GeneratorKind;
    use crate::compiler::model::{Expr, QueryModel, ResultOperator};
    use crate::error::SparqlateError;

    fn known_people() -> QueryModel {
        QueryModel::from_expr("p", person(), Expr::source("x").member("Person", "KnownPeople", person()))
    }

    // ── Aggregate sub-queries ───────────────────────────────────────────

    #[test]
    fn test_count_subquery_filter() {
        let count = Expr::subquery(known_people().with(ResultOperator::Count));
        let model = person_query().filter(count.greater_than(Expr::int(1)));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &[
            "{ { SELECT ?s_ ( COUNT ( DISTINCT ?o1 ) AS ?o1_count ) WHERE { ?s_ <http://xmlns.com/foaf/0.1/knows> ?o1 . } GROUP BY ?s_ }",
            "FILTER ( ?o1_count > '1'^^<http://www.w3.org/2001/XMLSchema#long> ) }",
        ]);
    }

    #[test]
    fn test_subquery_reused_for_same_expression() {
        let count = || Expr::subquery(known_people().with(ResultOperator::Count));
        let model = person_query()
            .filter(count().greater_than(Expr::int(1)))
            .filter(count().less_than(Expr::int(10)));
        let sparql = compile_select(&model).unwrap();
        assert_eq!(sparql.matches("GROUP BY").count(), 1, "{sparql}");
        assert_sparql_contains(&sparql, &["?o1_count > '1'", "?o1_count < '10'"]);
    }

    #[test]
    fn test_subquery_in_both_union_branches() {
        let count = || Expr::subquery(known_people().with(ResultOperator::Count));
        let model = person_query().filter(
            count()
                .greater_than(Expr::int(5))
                .or_else(count().equal(Expr::int(0))),
        );
        let sparql = compile_select(&model).unwrap();
        assert!(!sparql.contains("UNION { }"), "{sparql}");
        assert_eq!(sparql.matches("GROUP BY ?s_").count(), 2, "{sparql}");
        assert_sparql_contains(&sparql, &[
            "FILTER ( ?o1_count > '5'^^<http://www.w3.org/2001/XMLSchema#long> ) } } UNION { { {",
            "FILTER ( ?o1_count = '0'^^<http://www.w3.org/2001/XMLSchema#long> ) } } }",
        ]);
    }

    #[test]
    fn test_subquery_with_predicate() {
        let adults = known_people()
            .filter(
                Expr::source("p")
                    .member("Person", "Age", crate::compiler::model::TypeRef::integer())
                    .greater_or_equal(Expr::int(18)),
            )
            .with(ResultOperator::Count);
        let model = person_query().filter(Expr::subquery(adults).equal(Expr::int(0)));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &[
            "?s_ <http://xmlns.com/foaf/0.1/knows> ?o1 . ?o1 <http://xmlns.com/foaf/0.1/age> ?o2 .",
            "FILTER ( ?o2 >= '18'",
            "GROUP BY ?s_",
        ]);
    }

    #[test]
    fn test_max_over_projected_member() {
        let oldest = known_people()
            .select(Expr::source("p").member("Person", "Age", crate::compiler::model::TypeRef::integer()))
            .with(ResultOperator::Max);
        let model = person_query().filter(Expr::subquery(oldest).greater_than(Expr::int(60)));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &[
            "( MAX ( ?o2 ) AS ?o2_max )",
            "FILTER ( ?o2_max > '60'",
        ]);
    }

    #[test]
    fn test_first_in_subquery_is_rejected() {
        for op in [
            ResultOperator::First { or_default: false },
            ResultOperator::Last { or_default: true },
            ResultOperator::Take(3),
        ] {
            let sub = Expr::subquery(known_people().with(op));
            let model = person_query().filter(sub.not_equal(Expr::null()));
            assert!(matches!(
                compile_select(&model),
                Err(SparqlateError::UnsupportedShape(_))
            ));
        }
    }

    #[test]
    fn test_nested_aggregates_are_rejected() {
        let model = person_query()
            .with(ResultOperator::Count)
            .with(ResultOperator::Sum);
        assert!(compile(&model, GeneratorKind::SelectBindings).is_err());
    }

    // ── Projections and operators ───────────────────────────────────────

    #[test]
    fn test_member_projection() {
        let model = person_query().select(name());
        let sparql = compile_select(&model).unwrap();
        assert!(sparql.starts_with("SELECT ?o1 WHERE"), "{sparql}");
    }

    #[test]
    fn test_distinct_projection() {
        let model = person_query().select(name()).with(ResultOperator::Distinct);
        let sparql = compile_select(&model).unwrap();
        assert!(sparql.starts_with("SELECT DISTINCT ?o1 WHERE"), "{sparql}");
    }

    #[test]
    fn test_count_of_root() {
        let model = person_query().with(ResultOperator::Count);
        let sparql = compile(&model, GeneratorKind::SelectBindings).unwrap();
        assert!(
            sparql.starts_with("SELECT ( COUNT ( DISTINCT ?s_ ) AS ?s__count ) WHERE"),
            "{sparql}"
        );
    }

    #[test]
    fn test_unsupported_projection() {
        let model = person_query().select(Expr::New("Summary".into()));
        assert!(matches!(
            compile_select(&model),
            Err(SparqlateError::UnsupportedShape(_))
        ));
    }
}
