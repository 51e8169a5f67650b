//! Member access, query-source references and type filters.

use super::ExpressionCompiler;
use crate::compiler::model::{BinaryOp, Expr, MemberRef, TypeRef};
use crate::compiler::tree::{Cursor, PatternId};
use crate::compiler::variables::{ScopeId, Variable};
use crate::error::{Result, SparqlateError};
use crate::serializer::serialize_uri;
use crate::value::Value;

/// Whether a type filter also accepts instances of mapped subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TypeMatch {
    /// `x.GetType() == typeof(T)`.
    Exact,
    /// `x is T`, `OfType<T>()`, query sources.
    WithSubclasses,
}

impl<'m> ExpressionCompiler<'m> {
    /// A member used as a predicate on its own.
    ///
    /// A member that already has a variable is re-bound at `cx`. A boolean
    /// member seen for the first time means `member == true`. Any other
    /// member gets a binding only when an ordering needs it.
    pub(super) fn visit_member(&mut self, expr: &'m Expr, cx: Cursor) -> Result<()> {
        let Expr::Member { member, .. } = expr else {
            return Err(SparqlateError::InternalError(format!(
                "visit_member on a {}",
                expr.kind_name()
            )));
        };

        let scope = self.scope(cx);
        if member.name == "Uri" || self.tree.variables.try_object(scope, &expr.key()).is_some() {
            return self.resolve_member(cx, expr).map(|_| ());
        }

        if member.ty.is_bool() {
            let var = self.resolve_member(cx, expr)?;
            self.filter_compare(cx.pattern, &var, BinaryOp::Equal, &Value::Bool(true));
        } else if self.tree.generator(cx.generator).model.has_ordering(expr) {
            self.resolve_member(cx, expr)?;
        }
        Ok(())
    }

    /// The object variable of a member chain, emitting its triples at `cx`.
    ///
    /// `x.Uri` resolves to the subject of `x`; nothing is emitted for it.
    pub(super) fn resolve_member(&mut self, cx: Cursor, expr: &'m Expr) -> Result<Variable> {
        let Expr::Member { target, member } = expr else {
            return self.resolve_subject(cx, expr);
        };
        if member.name == "Uri" {
            return self.resolve_subject(cx, target);
        }

        let subject = self.resolve_subject(cx, target)?;
        let predicate = self.predicate_of(member)?;
        let scope = self.scope(cx);
        let key = expr.key();
        let var = match self.tree.variables.try_object(scope, &key) {
            Some(var) => var,
            None => self.tree.variables.create_object(scope, &key),
        };
        self.tree
            .add_triple(cx.pattern, &subject.sparql(), &predicate, &var.sparql());
        Ok(var)
    }

    /// The variable denoting the resource `expr` evaluates to.
    pub(super) fn resolve_subject(&mut self, cx: Cursor, expr: &'m Expr) -> Result<Variable> {
        match expr {
            Expr::QuerySource(item) => self.source_subject(self.scope(cx), item),
            Expr::Member { .. } => self.resolve_member(cx, expr),
            Expr::SubQuery(model) => {
                let (id, _) = self.ensure_subquery(expr, model, cx)?;
                Ok(self.tree.result_variable(id))
            }
            other => Err(SparqlateError::unsupported(format!(
                "member access on a {}: {other}",
                other.kind_name()
            ))),
        }
    }

    /// The subject variable of a query-source item visible from `scope`.
    pub(super) fn source_subject(&self, scope: ScopeId, item: &str) -> Result<Variable> {
        self.tree
            .variables
            .source_key(scope, item)
            .and_then(|key| self.tree.variables.try_subject(scope, &key))
            .ok_or_else(|| {
                SparqlateError::UnresolvedReference(format!("query source '{item}' is not in scope"))
            })
    }

    /// `<predicate>` of a member.
    pub(super) fn predicate_of(&self, member: &MemberRef) -> Result<String> {
        self.mapping
            .predicate(&member.declaring_type, &member.name)
            .map(|p| serialize_uri(&p))
            .ok_or_else(|| {
                SparqlateError::UnresolvedReference(format!(
                    "no predicate mapped for {}.{}",
                    member.declaring_type, member.name
                ))
            })
    }

    /// Constrain `var` to instances of `ty`.
    ///
    /// With inference enabled the store is trusted to entail superclasses,
    /// so one triple per mapped class suffices. Without it, subclasses are
    /// enumerated from the mapping and matched through a class variable.
    /// Negated filters wrap the constraint in `FILTER NOT EXISTS`.
    pub(super) fn type_filter(
        &mut self,
        pattern: PatternId,
        var: &Variable,
        ty: &TypeRef,
        matching: TypeMatch,
        negated: bool,
    ) -> Result<()> {
        let classes = self.mapping.rdf_classes(ty);
        if classes.is_empty() {
            return Err(SparqlateError::UnresolvedReference(format!(
                "no RDF class mapped for type {}",
                ty.name
            )));
        }

        if negated {
            let inner = self.tree.add_not_exists(pattern);
            self.class_constraint(inner, var, classes);
            return Ok(());
        }

        if self.config.inference_enabled {
            for class in &classes {
                self.tree
                    .add_triple(pattern, &var.sparql(), "a", &serialize_uri(class));
            }
            return Ok(());
        }

        let mut accepted = classes;
        if matching == TypeMatch::WithSubclasses {
            for class in self.mapping.subclasses(ty) {
                if !accepted.contains(&class) {
                    accepted.push(class);
                }
            }
        }
        self.class_constraint(pattern, var, accepted);
        Ok(())
    }

    /// `?v a <C>` for a single class, `?v a ?t . FILTER(?t IN (...))` for several.
    fn class_constraint(&mut self, pattern: PatternId, var: &Variable, classes: Vec<String>) {
        if let [class] = classes.as_slice() {
            self.tree
                .add_triple(pattern, &var.sparql(), "a", &serialize_uri(class));
            return;
        }
        let class_var = self.tree.variables.create_local("t");
        self.tree
            .add_triple(pattern, &var.sparql(), "a", &class_var.sparql());
        let list: Vec<String> = classes.iter().map(|c| serialize_uri(c)).collect();
        self.tree.add_filter(
            pattern,
            format!("{} IN ({})", class_var.sparql(), list.join(", ")),
        );
    }

    /// The type constraint on a query over `Model<T>`. Unmapped types range
    /// over every resource.
    pub(super) fn source_type_constraint(
        &mut self,
        pattern: PatternId,
        var: &Variable,
        ty: &TypeRef,
    ) -> Result<()> {
        if !ty.is_resource() || self.mapping.rdf_classes(ty).is_empty() {
            return Ok(());
        }
        self.type_filter(pattern, var, ty, TypeMatch::WithSubclasses, false)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::*;
    use crate::compiler::model::{Expr, QueryModel, ResultOperator, TypeRef};
    use crate::config::QueryConfig;
    use crate::error::SparqlateError;

    // ── Bare members ────────────────────────────────────────────────────

    #[test]
    fn test_bare_bool_member_means_true() {
        let model = person_query().filter(status());
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &[
            "?s_ <http://ex.org/active> ?o1 .",
            "FILTER ( ?o1 = 'true'^^<http://www.w3.org/2001/XMLSchema#boolean> )",
        ]);
    }

    #[test]
    fn test_negated_bool_member_means_false() {
        let model = person_query().filter(!status());
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["FILTER ( ?o1 = 'false'^^"]);
    }

    #[test]
    fn test_bool_member_seen_before_is_only_rebound() {
        let model = person_query()
            .filter(status().equal(Expr::bool(false)))
            .filter(status());
        let sparql = compile_select(&model).unwrap();
        assert!(!sparql.contains("'true'"), "{sparql}");
    }

    #[test]
    fn test_bare_non_bool_member_emits_nothing() {
        let model = person_query().filter(name());
        let sparql = compile_select(&model).unwrap();
        assert!(!sparql.contains("foaf/0.1/name"), "{sparql}");
    }

    #[test]
    fn test_unmapped_member_is_unresolved() {
        let shoe_size = Expr::source("x").member("Person", "ShoeSize", TypeRef::integer());
        let model = person_query().filter(shoe_size.greater_than(Expr::int(40)));
        assert!(matches!(
            compile_select(&model),
            Err(SparqlateError::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_unknown_query_source_is_unresolved() {
        let stray = Expr::source("y").member("Person", "Name", TypeRef::string());
        let model = person_query().filter(stray.equal(Expr::string("a")));
        assert!(matches!(
            compile_select(&model),
            Err(SparqlateError::UnresolvedReference(_))
        ));
    }

    // ── Type filters ────────────────────────────────────────────────────

    #[test]
    fn test_source_over_supertype_enumerates_subclasses() {
        let model = QueryModel::from_model("x", agent());
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &[
            "?s_ a ?t1 .",
            "FILTER ( ?t1 IN ( <http://xmlns.com/foaf/0.1/Agent> , <http://xmlns.com/foaf/0.1/Person> , <http://ex.org/Robot> ) )",
        ]);
    }

    #[test]
    fn test_source_with_inference_trusts_store() {
        let model = QueryModel::from_model("x", agent());
        let config = QueryConfig::new().with_inference(true);
        let sparql = compile_with(&model, &config).unwrap();
        assert_sparql_contains(&sparql, &["?s_ a <http://xmlns.com/foaf/0.1/Agent> ."]);
        assert!(!sparql.contains(" IN "), "{sparql}");
    }

    #[test]
    fn test_is_type_test() {
        let model = QueryModel::from_model("x", agent())
            .filter(Expr::source("x").is_type(person()));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["?s_ a <http://xmlns.com/foaf/0.1/Person> ."]);
    }

    #[test]
    fn test_of_type_operator() {
        let model = QueryModel::from_model("x", agent())
            .with(ResultOperator::OfType(person()));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["?s_ a <http://xmlns.com/foaf/0.1/Person> ."]);
    }

    #[test]
    fn test_type_test_for_unmapped_type_is_unresolved() {
        let model = person_query().filter(Expr::source("x").is_type(TypeRef::resource("Planet")));
        assert!(matches!(
            compile_select(&model),
            Err(SparqlateError::UnresolvedReference(_))
        ));
    }
}
