//! Solution ordering.

use super::ExpressionCompiler;
use crate::compiler::generator::GeneratorKind;
use crate::compiler::model::{Direction, Expr, QueryModel};
use crate::compiler::tree::{Cursor, GeneratorId};
use crate::error::{Result, SparqlateError};

impl<'m> ExpressionCompiler<'m> {
    /// Turn the model's orderings into ORDER BY terms of the root query.
    ///
    /// `Last` reads the first solution of the reversed order: the first
    /// ordering is inverted, or the subject is sorted descending when the
    /// model has no ordering.
    pub(super) fn visit_orderings(
        &mut self,
        id: GeneratorId,
        model: &'m QueryModel,
        cx: Cursor,
    ) -> Result<()> {
        if id != GeneratorId::ROOT || self.tree.generator(id).kind == GeneratorKind::Ask {
            return Ok(());
        }
        let reverse = model.takes_last();

        for (i, ordering) in model.orderings.iter().enumerate() {
            let var = match &ordering.expr {
                expr @ Expr::Member { .. } => self.resolve_member(cx, expr)?,
                expr @ Expr::SubQuery(inner) => {
                    let (child, _) = self.ensure_subquery(expr, inner, cx)?;
                    self.tree.result_variable(child)
                }
                Expr::QuerySource(item) => self.source_subject(self.scope(cx), item)?,
                other => {
                    return Err(SparqlateError::UnresolvedReference(format!(
                        "no variable to order by for {other}"
                    )));
                }
            };
            let mut descending = ordering.direction == Direction::Descending;
            if reverse && i == 0 {
                descending = !descending;
            }
            self.tree.generator_mut(id).order_by(var, descending);
        }

        if reverse && model.orderings.is_empty() {
            let generator = self.tree.generator_mut(id);
            let subject = generator.subject.clone();
            generator.order_by(subject, true);
        }
        Ok(())
    }
}
