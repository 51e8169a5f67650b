//! Query compiler: object query model to SPARQL text.
//!
//! Compilation walks a [`QueryModel`] into a tree of query generators (one
//! per sub-query), renders the root generator, and runs the rendered text
//! through the [`QueryPreprocessor`] so solution modifiers can be patched
//! and the structural facts the executor needs are derived from the text
//! itself.
//!
//! # Submodules
//! - `model` — the typed query model
//! - `variables` — unique variable allocation and scoping
//! - `generator` — per-(sub-)query clause state
//! - `tree` — the generator and pattern arena, and rendering
//! - `expr` — the expression compiler driving the tree
//!
//! # Usage
//! ```ignore
//! use sparqlate::compiler::{compile, GeneratorKind};
//!
//! let query = compile(&model, GeneratorKind::SelectTriples, &mapping, &config, &dataset)?;
//! let text = query.text();
//! ```

pub mod expr;
pub mod generator;
pub mod model;
pub mod tree;
pub mod variables;

pub use expr::ExpressionCompiler;
pub use generator::GeneratorKind;
pub use model::{Expr, QueryModel, ResultOperator, TypeRef};

use tracing::debug;

use crate::config::QueryConfig;
use crate::error::Result;
use crate::mapping::Mapping;
use crate::preprocessor::{QueryPreprocessor, SparqlQuery};
use crate::serializer::{Dataset, dataset_clause};
use tree::GeneratorId;

/// OFFSET and LIMIT implied by a model's result operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolutionBounds {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl SolutionBounds {
    /// Fold `Skip`, `Take`, `First`, `Last` and `Single` in order.
    ///
    /// `Single` fetches two solutions so a second match can be detected.
    pub fn of(model: &QueryModel) -> Self {
        let mut bounds = SolutionBounds::default();
        for op in &model.result_operators {
            match op {
                ResultOperator::Skip(n) => {
                    bounds.offset = Some(bounds.offset.unwrap_or(0) + n);
                    bounds.limit = bounds.limit.map(|limit| limit.saturating_sub(*n));
                }
                ResultOperator::Take(n) => bounds.cap(*n),
                ResultOperator::First { .. } | ResultOperator::Last { .. } => bounds.cap(1),
                ResultOperator::Single { .. } => bounds.cap(2),
                _ => {}
            }
        }
        bounds
    }

    fn cap(&mut self, n: usize) {
        self.limit = Some(self.limit.map_or(n, |limit| limit.min(n)));
    }

    pub fn is_unbounded(&self) -> bool {
        self.offset.is_none() && self.limit.is_none()
    }
}

/// The query shape a model compiles to when the caller does not choose.
pub fn infer_kind(model: &QueryModel) -> GeneratorKind {
    use ResultOperator::*;
    if model.has_result_operator(|op| matches!(op, Any)) {
        GeneratorKind::Ask
    } else if model.has_result_operator(|op| {
        matches!(op, Count | LongCount | Sum | Average | Min | Max)
    }) || !model.result_type().is_resource()
    {
        GeneratorKind::SelectBindings
    } else {
        GeneratorKind::SelectTriples
    }
}

/// Compile a model into a query of the given shape.
///
/// Solution bounds are written into the text for every shape except
/// [`GeneratorKind::SelectTriples`]: bounding triples would cut resources
/// in half, so the executor applies them to the distinct subjects instead.
pub fn compile(
    model: &QueryModel,
    kind: GeneratorKind,
    mapping: &dyn Mapping,
    config: &QueryConfig,
    dataset: &Dataset,
) -> Result<SparqlQuery> {
    let mut compiler = ExpressionCompiler::new(kind, model, mapping, config);
    compiler.compile_model(GeneratorId::ROOT)?;
    let text = compiler.tree.render(&dataset_clause(dataset));
    debug!(%kind, generators = compiler.tree.len(), query = %text, "compiled query model");

    let mut pre = QueryPreprocessor::parse(&text)?;
    if kind != GeneratorKind::SelectTriples {
        let bounds = SolutionBounds::of(model);
        if let Some(offset) = bounds.offset {
            pre.set_offset(offset);
        }
        if let Some(limit) = bounds.limit {
            pre.set_limit(limit);
        }
    }
    Ok(SparqlQuery::from_preprocessor(&pre).with_prologue(&config.query_prologue()))
}
