//! Query execution.
//!
//! [`QueryExecutor`] picks the query shape for a request, compiles the
//! model, sends the text through a [`SparqlClient`] and converts what comes
//! back: grouped resources for object queries, typed values for projections,
//! booleans for existence checks and counts.
//!
//! Resource queries select every triple of every matching subject. Bounding
//! or ordering such a query at the triple level would split resources, so
//! bounded or ordered resource queries first fetch the ordered window of
//! subject URIs and then the triples of exactly those subjects.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::compiler::{self, GeneratorKind, QueryModel, ResultOperator, SolutionBounds};
use crate::config::QueryConfig;
use crate::error::{Result, SparqlateError};
use crate::mapping::{Mapping, Materializer, ResourceData};
use crate::preprocessor::SparqlQuery;
use crate::serializer::{self, Dataset};
use crate::term::{BindingRow, QueryResult};
use crate::value::FromValue;

/// The store round-trip.
pub trait SparqlClient {
    fn execute(&self, query: &SparqlQuery) -> Result<QueryResult>;
}

impl<C: SparqlClient + ?Sized> SparqlClient for &C {
    fn execute(&self, query: &SparqlQuery) -> Result<QueryResult> {
        (**self).execute(query)
    }
}

/// Compiles and runs object queries against one store.
pub struct QueryExecutor<C, M> {
    client: C,
    mapping: M,
    config: QueryConfig,
    dataset: Dataset,
}

impl<C: SparqlClient, M: Mapping> QueryExecutor<C, M> {
    pub fn new(client: C, mapping: M) -> Self {
        QueryExecutor {
            client,
            mapping,
            config: QueryConfig::default(),
            dataset: Dataset::default_graph(),
        }
    }

    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.dataset = dataset;
        self
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Compile without executing.
    pub fn compile(&self, model: &QueryModel, kind: GeneratorKind) -> Result<SparqlQuery> {
        compiler::compile(model, kind, &self.mapping, &self.config, &self.dataset)
    }

    // ── Resources ───────────────────────────────────────────────────────

    /// Every resource the model selects, materialized in solution order.
    pub fn execute_resources<T: Materializer>(
        &self,
        model: &QueryModel,
        materializer: &T,
    ) -> Result<Vec<T::Output>> {
        let item_type = model.result_type();
        self.fetch_resources(model)?
            .into_iter()
            .map(|resource| materializer.materialize(&item_type, resource))
            .collect()
    }

    /// The one resource selected by a model ending in `First`, `Last` or
    /// `Single`.
    pub fn execute_resource<T: Materializer>(
        &self,
        model: &QueryModel,
        materializer: &T,
    ) -> Result<Option<T::Output>> {
        let items = self.execute_resources(model, materializer)?;
        pick(items, model)
    }

    fn fetch_resources(&self, model: &QueryModel) -> Result<Vec<ResourceData>> {
        let query = self.compile(model, GeneratorKind::SelectTriples)?;
        let bounds = SolutionBounds::of(model);

        if !query.is_ordered() && bounds.is_unbounded() {
            let [s, p, o] = statement_variables(&query)?;
            let rows = self.run(&query)?;
            return Ok(group_resources(rows.rows()?, [&s, &p, &o], None));
        }

        let uris = self.wrap(serializer::fetch_uris_query(
            &self.dataset,
            &query,
            bounds.offset,
            bounds.limit,
        ))?;
        let subject = subject_name(&query)?;
        let order: Vec<String> = self
            .run(&uris)?
            .rows()?
            .iter()
            .filter_map(|row| row.get(&subject).and_then(|t| t.resource_id()))
            .collect();
        debug!(subjects = order.len(), "fixed subject order");

        let triples = self.wrap(serializer::offset_limit_query(
            &self.dataset,
            &query,
            bounds.offset,
            bounds.limit,
        ))?;
        let rows = self.run(&triples)?;
        Ok(group_resources(rows.rows()?, [&subject, "p", "o"], Some(&order)))
    }

    /// Number of distinct resources the model selects.
    pub fn count_resources(&self, model: &QueryModel) -> Result<u64> {
        let query = self.compile(model, GeneratorKind::SelectTriples)?;
        let count = self.wrap(serializer::count_query(&self.dataset, &query))?;
        let result = self.run(&count)?;
        first_value(result.rows()?, Some("count")).map(|n| n.unwrap_or(0))
    }

    // ── Values ──────────────────────────────────────────────────────────

    /// The projected values of every solution. Values that do not convert
    /// to `T` are skipped.
    pub fn execute_collection<T: FromValue>(&self, model: &QueryModel) -> Result<Vec<T>> {
        let query = self.compile(model, GeneratorKind::SelectBindings)?;
        let variable = query.global_variables().last().cloned();
        let result = self.run(&query)?;
        Ok(convert_rows(result.rows()?, variable.as_deref()))
    }

    /// The only value; `None` for an empty result of `SingleOrDefault`.
    pub fn execute_single<T: FromValue>(&self, model: &QueryModel) -> Result<Option<T>> {
        let values = self.execute_collection(model)?;
        let or_default = model.result_operators.iter().any(|op| {
            matches!(op, ResultOperator::Single { or_default: true })
        });
        expect_single(values, or_default)
    }

    /// The first value; `None` for an empty result of `FirstOrDefault`.
    pub fn execute_first<T: FromValue>(&self, model: &QueryModel) -> Result<Option<T>> {
        let values = self.execute_collection(model)?;
        let or_default = model.result_operators.iter().any(|op| {
            matches!(op, ResultOperator::First { or_default: true })
        });
        expect_first(values, or_default)
    }

    /// The last value in the model's order; `None` for an empty result of
    /// `LastOrDefault`. A model without `Last` is read as ending in `Last()`.
    pub fn execute_last<T: FromValue>(&self, model: &QueryModel) -> Result<Option<T>> {
        let reversed;
        let model = if model.takes_last() {
            model
        } else {
            reversed = model.clone().with(ResultOperator::Last { or_default: false });
            &reversed
        };
        let values = self.execute_collection(model)?;
        let or_default = model.result_operators.iter().any(|op| {
            matches!(op, ResultOperator::Last { or_default: true })
        });
        expect_first(values, or_default)
    }

    /// Whether any solution exists.
    pub fn execute_any(&self, model: &QueryModel) -> Result<bool> {
        let query = self.compile(model, GeneratorKind::Ask)?;
        self.run(&query)?.answer()
    }

    /// `COUNT(DISTINCT ...)` of the projected variable; 0 when unbound.
    pub fn execute_count(&self, model: &QueryModel) -> Result<u64> {
        let counted;
        let model = if model.has_result_operator(|op| {
            matches!(op, ResultOperator::Count | ResultOperator::LongCount)
        }) {
            model
        } else {
            counted = model.clone().with(ResultOperator::Count);
            &counted
        };
        let query = self.compile(model, GeneratorKind::SelectBindings)?;
        let variable = query.global_variables().last().cloned();
        let result = self.run(&query)?;
        first_value(result.rows()?, variable.as_deref()).map(|n| n.unwrap_or(0))
    }

    // ── Plumbing ────────────────────────────────────────────────────────

    fn run(&self, query: &SparqlQuery) -> Result<QueryResult> {
        debug!(form = %query.form(), query = %query, "executing query");
        self.client.execute(query)
    }

    /// Classify wrapper text and attach the configured prologue.
    fn wrap(&self, text: String) -> Result<SparqlQuery> {
        Ok(SparqlQuery::parse(&text)?.with_prologue(&self.config.query_prologue()))
    }
}

fn subject_name(query: &SparqlQuery) -> Result<String> {
    query.global_variables().first().cloned().ok_or_else(|| {
        SparqlateError::InternalError(format!("resource query without variables: {query}"))
    })
}

fn statement_variables(query: &SparqlQuery) -> Result<[String; 3]> {
    match query.global_variables() {
        [s, p, o] => Ok([s.clone(), p.clone(), o.clone()]),
        other => Err(SparqlateError::InternalError(format!(
            "resource query selects {} variables",
            other.len()
        ))),
    }
}

/// Group `(subject, predicate, object)` rows into resources.
///
/// With `order`, resources come out in that subject order; otherwise in
/// first-seen order. Rows without a resource subject or a URI predicate are
/// skipped.
fn group_resources(
    rows: &[BindingRow],
    [s, p, o]: [&str; 3],
    order: Option<&[String]>,
) -> Vec<ResourceData> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut resources: Vec<ResourceData> = Vec::new();

    for row in rows {
        let (Some(subject), Some(predicate), Some(object)) = (
            row.get(s).and_then(|t| t.resource_id()),
            row.get(p).and_then(|t| t.resource_id()),
            row.get(o),
        ) else {
            warn!(?row, "skipping incomplete statement row");
            continue;
        };
        let slot = *index.entry(subject.clone()).or_insert_with(|| {
            resources.push(ResourceData::new(&subject));
            resources.len() - 1
        });
        resources[slot].add(&predicate, object.to_value());
    }

    match order {
        None => resources,
        Some(order) => {
            let mut slots: Vec<Option<ResourceData>> = resources.into_iter().map(Some).collect();
            order
                .iter()
                .filter_map(|uri| index.get(uri).and_then(|&i| slots[i].take()))
                .collect()
        }
    }
}

fn convert_rows<T: FromValue>(rows: &[BindingRow], variable: Option<&str>) -> Vec<T> {
    rows.iter()
        .filter_map(|row| {
            let term = variable.and_then(|v| row.get(v)).or_else(|| row.first())?;
            let value = term.to_value();
            let converted = T::from_value(&value);
            if converted.is_none() {
                warn!(%value, "skipping value of unexpected type");
            }
            converted
        })
        .collect()
}

fn first_value<T: FromValue>(rows: &[BindingRow], variable: Option<&str>) -> Result<Option<T>> {
    let Some(row) = rows.first() else {
        return Ok(None);
    };
    let Some(term) = variable.and_then(|v| row.get(v)).or_else(|| row.first()) else {
        return Ok(None);
    };
    T::from_value(&term.to_value())
        .map(Some)
        .ok_or_else(|| SparqlateError::Results(format!("unexpected value {term:?}")))
}

fn expect_single<T>(mut items: Vec<T>, or_default: bool) -> Result<Option<T>> {
    match items.len() {
        0 if or_default => Ok(None),
        1 => Ok(items.pop()),
        found => Err(SparqlateError::CardinalityMismatch {
            expected: "exactly one row",
            found,
        }),
    }
}

fn expect_first<T>(items: Vec<T>, or_default: bool) -> Result<Option<T>> {
    match items.into_iter().next() {
        Some(item) => Ok(Some(item)),
        None if or_default => Ok(None),
        None => Err(SparqlateError::CardinalityMismatch {
            expected: "at least one row",
            found: 0,
        }),
    }
}

/// Apply the model's single-element operator to a sequence.
fn pick<T>(items: Vec<T>, model: &QueryModel) -> Result<Option<T>> {
    let last = model.result_operators.iter().rev().find_map(|op| match op {
        ResultOperator::Single { or_default } => Some((true, *or_default)),
        ResultOperator::First { or_default } | ResultOperator::Last { or_default } => {
            Some((false, *or_default))
        }
        _ => None,
    });
    match last {
        Some((true, or_default)) => expect_single(items, or_default),
        Some((false, or_default)) => expect_first(items, or_default),
        None => expect_single(items, false),
    }
}
