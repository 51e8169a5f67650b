//! sparqlate: typed object queries compiled to SPARQL.
//!
//! A [`QueryModel`] (source, predicates, projection, orderings, result
//! operators over a mapped object model) is compiled into SPARQL graph
//! pattern text, sent to a store through a [`SparqlClient`], and the
//! returned bindings are turned back into typed values or grouped resources.
//!
//! Generated text is always re-read by the [`QueryPreprocessor`], so the
//! structural facts the executor relies on (query form, global variables,
//! whether every solution is a triple, the ORDER BY clause, LIMIT/OFFSET
//! positions) come from the text itself and work for hand-written queries
//! too.
//!
//! # Modules
//! - `compiler` — query model, variable allocation, generator tree and
//!   expression compiler
//! - `preprocessor` — SPARQL tokenizer, classification and patching
//! - `serializer` — literals, resources and wrapper queries
//! - `executor` — store round-trips and result conversion
//! - `mapping` — seams to the object-mapping layer
//! - `term`, `value`, `xsd` — result terms and typed values
//! - `config`, `error`

pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod preprocessor;
pub mod serializer;
pub mod term;
pub mod value;
pub mod xsd;

pub use compiler::model::{
    Constant, Direction, Expr, MemberRef, Method, Ordering, QueryModel, RegexOptions,
    ResultOperator, SourceClause, SourceExpr, StringComparison, TypeKind, TypeRef,
};
pub use compiler::{GeneratorKind, SolutionBounds, compile, infer_kind};
pub use config::{QueryConfig, StoreProvider};
pub use error::{Result, SparqlateError, SparqlateErrorKind};
pub use executor::{QueryExecutor, SparqlClient};
pub use mapping::{Mapping, Materializer, RawResources, ResourceData, StaticMapping};
pub use preprocessor::{QueryForm, QueryPreprocessor, SparqlQuery};
pub use serializer::Dataset;
pub use term::{BindingRow, QueryResult, Term};
pub use value::{FromValue, Value};
