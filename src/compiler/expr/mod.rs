//! Expression compiler.
//!
//! Walks predicate, projection and ordering expressions and drives the
//! generator tree. Each node kind is handled in its own module:
//!
//! | Module       | Handles                                               |
//! |--------------|-------------------------------------------------------|
//! | `binary`     | comparisons, AND/OR, `GetType()` tests                |
//! | `member`     | member chains, source references, type filters        |
//! | `method`     | `Contains`/`StartsWith`/`EndsWith`/`Regex.IsMatch`    |
//! | `subquery`   | sub-queries and the clauses of a query model          |
//! | `ordering`   | ORDER BY terms                                        |
//!
//! Before dispatch every node is normalized: `a.Equals(b)` compiles as
//! `a == b`, `!flag` over a boolean member as `flag == false`, and a
//! comparison with the constant on the left is mirrored.

mod binary;
mod member;
mod method;
mod ordering;
mod subquery;

#[cfg(test)]
pub(crate) mod test_helpers;

use tracing::trace;

use super::generator::GeneratorKind;
use super::model::{BinaryOp, Constant, Expr, Method, QueryModel, UnaryOp};
use super::tree::{Cursor, GeneratorTree};
use super::variables::ScopeId;
use crate::config::QueryConfig;
use crate::error::{Result, SparqlateError};
use crate::mapping::Mapping;
use crate::value::Value;

static FALSE: Constant = Constant::Value(Value::Bool(false));

/// Ancestor frame kinds relevant to negation detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Not,
    Logical,
    Other,
}

/// The chain of ancestors of the node being visited, innermost first.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Trace<'t> {
    frame: Frame,
    parent: Option<&'t Trace<'t>>,
}

impl<'t> Trace<'t> {
    fn push(parent: Option<&'t Trace<'t>>, expr: &Expr) -> Trace<'t> {
        let frame = match expr {
            Expr::Unary {
                op: UnaryOp::Not, ..
            } => Frame::Not,
            Expr::Binary { op, .. } if op.is_logical() => Frame::Logical,
            _ => Frame::Other,
        };
        Trace { frame, parent }
    }

    /// Whether a negation sits between the node and the nearest enclosing
    /// AND/OR.
    pub(crate) fn is_negated(trace: Option<&Trace<'_>>) -> bool {
        let mut current = trace;
        while let Some(t) = current {
            match t.frame {
                Frame::Not => return true,
                Frame::Logical => return false,
                Frame::Other => current = t.parent,
            }
        }
        false
    }
}

/// A comparison against a constant, after normalization.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Comparison<'m> {
    pub op: BinaryOp,
    pub operand: &'m Expr,
    pub constant: &'m Constant,
}

impl<'m> Comparison<'m> {
    /// Recognize comparison-shaped nodes.
    fn classify(expr: &'m Expr) -> Result<Option<Self>> {
        let (op, left, right) = match expr {
            Expr::Binary { op, left, right } if op.is_comparison() => (*op, &**left, &**right),
            Expr::MethodCall {
                target: Some(target),
                method: Method::Equals,
                args,
            } => match args.as_slice() {
                [arg] => (BinaryOp::Equal, &**target, arg),
                _ => return Err(SparqlateError::unsupported("Equals() with more than one argument")),
            },
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                return Ok(match operand.as_ref() {
                    Expr::Member { member, .. } if member.ty.is_bool() => Some(Comparison {
                        op: BinaryOp::Equal,
                        operand: &**operand,
                        constant: &FALSE,
                    }),
                    _ => None,
                });
            }
            _ => return Ok(None),
        };

        match (left.as_constant(), right.as_constant()) {
            (_, Some(constant)) => Ok(Some(Comparison {
                op,
                operand: left,
                constant,
            })),
            (Some(constant), None) => Ok(Some(Comparison {
                op: op.mirrored(),
                operand: right,
                constant,
            })),
            (None, None) => Err(SparqlateError::unsupported(format!(
                "comparison without a constant operand: {expr}"
            ))),
        }
    }
}

/// Compiles one query model into a generator tree.
pub struct ExpressionCompiler<'m> {
    pub tree: GeneratorTree<'m>,
    mapping: &'m dyn Mapping,
    config: &'m QueryConfig,
}

impl<'m> ExpressionCompiler<'m> {
    pub fn new(
        kind: GeneratorKind,
        model: &'m QueryModel,
        mapping: &'m dyn Mapping,
        config: &'m QueryConfig,
    ) -> Self {
        ExpressionCompiler {
            tree: GeneratorTree::new(kind, model),
            mapping,
            config,
        }
    }

    fn scope(&self, cx: Cursor) -> ScopeId {
        self.tree.generator(cx.generator).scope
    }

    /// Visit an expression, writing at `cx`.
    pub(crate) fn visit(
        &mut self,
        expr: &'m Expr,
        cx: Cursor,
        trace: Option<&Trace<'_>>,
    ) -> Result<()> {
        let frame = Trace::push(trace, expr);
        let trace = Some(&frame);
        trace!(kind = expr.kind_name(), expr = %expr, "visit");

        if let Some(comparison) = Comparison::classify(expr)? {
            return self.visit_comparison(comparison, cx, trace);
        }

        match expr {
            Expr::Binary {
                op: BinaryOp::AndAlso,
                left,
                right,
            } => {
                self.visit(left, cx, trace)?;
                self.visit(right, cx, trace)
            }
            Expr::Binary {
                op: BinaryOp::OrElse,
                left,
                right,
            } => self.visit_or(left, right, cx, trace),
            Expr::Binary { op, .. } => Err(SparqlateError::unsupported(format!(
                "binary operator '{op}' in a predicate"
            ))),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => match operand.as_ref() {
                Expr::MethodCall { .. } => self.visit(operand, cx, trace),
                other => Err(SparqlateError::unsupported(format!(
                    "negation of a {}",
                    other.kind_name()
                ))),
            },
            Expr::Unary { op, .. } => Err(SparqlateError::unsupported(format!(
                "unary operator {op}"
            ))),
            Expr::Member { .. } => self.visit_member(expr, cx),
            Expr::MethodCall { .. } => self.visit_method_call(expr, cx, trace),
            Expr::SubQuery(model) => self.ensure_subquery(expr, model, cx).map(|_| ()),
            Expr::TypeTest { ty, .. } => {
                let subject = self.tree.generator(cx.generator).subject.clone();
                self.type_filter(cx.pattern, &subject, ty, member::TypeMatch::WithSubclasses, false)
            }
            Expr::Constant(_) | Expr::QuerySource(_) => Ok(()),
            Expr::New(_)
            | Expr::NewArray(_)
            | Expr::ListInit(_)
            | Expr::Invocation(_)
            | Expr::Conditional { .. }
            | Expr::Parameter(_) => Err(SparqlateError::unsupported(format!(
                "{} in a predicate: {expr}",
                expr.kind_name()
            ))),
        }
    }
}
