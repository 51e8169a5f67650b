//! The generator tree: an arena of generators and graph patterns.
//!
//! Generators and patterns are addressed by index. Sub-query generators are
//! registered under their expression key so that repeated references to the
//! same sub-query reuse one generator. Emission goes through a [`Cursor`]
//! naming the generator and pattern to write into; union branches are just
//! new patterns, so a caller's cursor is never disturbed by a nested visit.

use std::collections::HashMap;

use tracing::trace;

use super::generator::{GeneratorKind, QueryGenerator};
use super::model::QueryModel;
use super::variables::{Variable, VariableAllocator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeneratorId(usize);

impl GeneratorId {
    pub const ROOT: GeneratorId = GeneratorId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternId(usize);

impl PatternId {
    pub const ROOT: PatternId = PatternId(0);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternElement {
    Triple(Triple),
    /// `FILTER(expr)`.
    Filter(String),
    /// `FILTER NOT EXISTS { pattern }`.
    NotExists(PatternId),
    /// `{ left } UNION { right }`.
    Union(PatternId, PatternId),
    /// `{ pattern }`.
    Group(PatternId),
    /// `{ SELECT ... }` rendered from a sub-query generator.
    SubSelect(GeneratorId),
}

/// Where the expression compiler currently writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub generator: GeneratorId,
    pub pattern: PatternId,
}

impl Cursor {
    pub fn with_pattern(self, pattern: PatternId) -> Self {
        Cursor { pattern, ..self }
    }
}

#[derive(Debug)]
pub struct GeneratorTree<'m> {
    generators: Vec<QueryGenerator<'m>>,
    patterns: Vec<Vec<PatternElement>>,
    by_key: HashMap<String, GeneratorId>,
    pub variables: VariableAllocator,
}

impl<'m> GeneratorTree<'m> {
    /// A tree with a single root generator of `kind` for `model`.
    pub fn new(kind: GeneratorKind, model: &'m QueryModel) -> Self {
        let variables = VariableAllocator::new();
        let root = QueryGenerator::new(
            GeneratorId::ROOT,
            kind,
            model,
            None,
            variables.root_scope(),
            PatternId::ROOT,
            VariableAllocator::global_subject(),
        );
        GeneratorTree {
            generators: vec![root],
            patterns: vec![Vec::new()],
            by_key: HashMap::new(),
            variables,
        }
    }

    pub fn root(&self) -> GeneratorId {
        GeneratorId::ROOT
    }

    pub fn generator(&self, id: GeneratorId) -> &QueryGenerator<'m> {
        &self.generators[id.0]
    }

    pub fn generator_mut(&mut self, id: GeneratorId) -> &mut QueryGenerator<'m> {
        &mut self.generators[id.0]
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Cursor at the root pattern of a generator.
    pub fn cursor(&self, id: GeneratorId) -> Cursor {
        Cursor {
            generator: id,
            pattern: self.generators[id.0].root,
        }
    }

    /// Create the generator of a sub-query, registered under `key`.
    pub fn create_subquery(
        &mut self,
        parent: GeneratorId,
        key: &str,
        model: &'m QueryModel,
    ) -> GeneratorId {
        let id = GeneratorId(self.generators.len());
        let parent_scope = self.generators[parent.0].scope;
        let scope = self.variables.new_scope(parent_scope);
        let root = self.new_pattern();
        // The real subject is set once the source clause is resolved.
        let subject = VariableAllocator::global_subject();
        self.generators.push(QueryGenerator::new(
            id,
            GeneratorKind::SubQuery,
            model,
            Some(parent),
            scope,
            root,
            subject,
        ));
        self.by_key.insert(key.to_string(), id);
        trace!(generator = id.0, parent = parent.0, key, "created sub-query generator");
        id
    }

    /// The generator registered for a sub-query key.
    pub fn subquery(&self, key: &str) -> Option<GeneratorId> {
        self.by_key.get(key).copied()
    }

    // ── Pattern emission ────────────────────────────────────────────────

    pub fn new_pattern(&mut self) -> PatternId {
        self.patterns.push(Vec::new());
        PatternId(self.patterns.len() - 1)
    }

    /// Add `subject predicate object .` unless the pattern already has it.
    pub fn add_triple(&mut self, pattern: PatternId, subject: &str, predicate: &str, object: &str) {
        let triple = PatternElement::Triple(Triple {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
        });
        let elements = &mut self.patterns[pattern.0];
        if !elements.contains(&triple) {
            elements.push(triple);
        }
    }

    pub fn add_filter(&mut self, pattern: PatternId, expr: String) {
        self.patterns[pattern.0].push(PatternElement::Filter(expr));
    }

    /// Open `FILTER NOT EXISTS { }` and return its inner pattern.
    pub fn add_not_exists(&mut self, pattern: PatternId) -> PatternId {
        let inner = self.new_pattern();
        self.patterns[pattern.0].push(PatternElement::NotExists(inner));
        inner
    }

    /// Open a two-branch union and return the branch patterns.
    pub fn add_union(&mut self, pattern: PatternId) -> (PatternId, PatternId) {
        let left = self.new_pattern();
        let right = self.new_pattern();
        self.patterns[pattern.0].push(PatternElement::Union(left, right));
        (left, right)
    }

    /// Open a nested group and return its pattern.
    pub fn add_group(&mut self, pattern: PatternId) -> PatternId {
        let inner = self.new_pattern();
        self.patterns[pattern.0].push(PatternElement::Group(inner));
        inner
    }

    /// Link a sub-query generator into the pattern at `cursor` and return
    /// the pattern that filters on its result go to.
    ///
    /// An aggregate sub-query becomes a grouped sub-select inside a new
    /// enclosing group, so filters on its result stay next to it. Any other
    /// sub-query is inlined as a group of its own pattern, and filters go
    /// next to that group. A generator referenced from several patterns
    /// (e.g. both branches of a union) is linked into each of them.
    pub fn link_child(&mut self, cursor: Cursor, child: GeneratorId) -> PatternId {
        let enclosing = if self.generators[child.0].is_aggregate() {
            let enclosing = self.add_group(cursor.pattern);
            self.patterns[enclosing.0].push(PatternElement::SubSelect(child));
            enclosing
        } else {
            let root = self.generators[child.0].root;
            self.patterns[cursor.pattern.0].push(PatternElement::Group(root));
            cursor.pattern
        };
        self.generators[child.0].links.push((cursor.pattern, enclosing));
        enclosing
    }

    /// The enclosing pattern of `child` as seen from `cursor`, linking the
    /// child there first if it is not linked yet.
    pub fn link_at(&mut self, cursor: Cursor, child: GeneratorId) -> PatternId {
        match self.generators[child.0].enclosing_at(cursor.pattern) {
            Some(enclosing) => enclosing,
            None => {
                trace!(generator = child.0, pattern = cursor.pattern.0, "re-linking sub-query");
                self.link_child(cursor, child)
            }
        }
    }

    pub fn elements(&self, pattern: PatternId) -> &[PatternElement] {
        &self.patterns[pattern.0]
    }

    // ── Rendering ───────────────────────────────────────────────────────

    /// Render the root generator as query text.
    pub fn render(&self, dataset_clause: &str) -> String {
        let mut out = String::new();
        self.render_generator(GeneratorId::ROOT, dataset_clause, &mut out);
        out
    }

    fn render_generator(&self, id: GeneratorId, dataset_clause: &str, out: &mut String) {
        let generator = &self.generators[id.0];
        out.push_str(&generator.select_clause());
        out.push(' ');
        out.push_str(dataset_clause);
        out.push_str("WHERE { ");
        if generator.kind == GeneratorKind::SelectTriples {
            let [s, p, o] = generator.triple_variables();
            out.push_str(&format!("{s} {p} {o} . "));
        }
        self.render_pattern(generator.root, out);
        out.push('}');
        out.push_str(&generator.modifiers());
    }

    fn render_pattern(&self, pattern: PatternId, out: &mut String) {
        for element in &self.patterns[pattern.0] {
            match element {
                PatternElement::Triple(t) => {
                    out.push_str(&format!("{} {} {} . ", t.subject, t.predicate, t.object));
                }
                PatternElement::Filter(expr) => {
                    out.push_str(&format!("FILTER({expr}) "));
                }
                PatternElement::NotExists(inner) => {
                    out.push_str("FILTER NOT EXISTS { ");
                    self.render_pattern(*inner, out);
                    out.push_str("} ");
                }
                PatternElement::Union(left, right) => {
                    out.push_str("{ ");
                    self.render_pattern(*left, out);
                    out.push_str("} UNION { ");
                    self.render_pattern(*right, out);
                    out.push_str("} ");
                }
                PatternElement::Group(inner) => {
                    out.push_str("{ ");
                    self.render_pattern(*inner, out);
                    out.push_str("} ");
                }
                PatternElement::SubSelect(child) => {
                    out.push_str("{ ");
                    self.render_generator(*child, "", out);
                    out.push_str(" } ");
                }
            }
        }
    }

    /// The variable a sub-query's result is known by in its parent.
    pub fn result_variable(&self, id: GeneratorId) -> Variable {
        let generator = &self.generators[id.0];
        if generator.is_aggregate() {
            generator.object().by_name()
        } else {
            generator.object().clone()
        }
    }
}
