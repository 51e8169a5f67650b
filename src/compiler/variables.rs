//! Variable allocation.
//!
//! Every variable in a compiled query is unique. Local variables are named
//! from one counter shared by the whole compilation (`o1`, `s2`, `t3`, ...);
//! global variables are fixed names carrying the reserved `_` suffix
//! (`s_`, `p_`, `o_`), which no local name can end in.
//!
//! Scopes form a parent chain: a sub-query generator gets a child scope, so
//! it sees the variables of its enclosing query (correlation) while its own
//! variables stay invisible to siblings.

use std::collections::HashMap;
use std::fmt;

/// An aggregate applied to a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Average,
    Min,
    Max,
}

impl Aggregate {
    /// Lower-case functor used in the result variable name.
    pub fn functor(self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Average => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }

    /// The aggregate expression over `variable`.
    ///
    /// Counts are distinct: the pattern may bind the same value through
    /// several join paths.
    pub fn apply(self, variable: &str) -> String {
        match self {
            Aggregate::Count => format!("COUNT(DISTINCT {variable})"),
            Aggregate::Sum => format!("SUM({variable})"),
            Aggregate::Average => format!("AVG({variable})"),
            Aggregate::Min => format!("MIN({variable})"),
            Aggregate::Max => format!("MAX({variable})"),
        }
    }
}

/// A query variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    name: String,
    global: bool,
    aggregate: Option<Aggregate>,
}

impl Variable {
    pub fn local(name: &str) -> Self {
        Variable {
            name: name.to_string(),
            global: false,
            aggregate: None,
        }
    }

    pub fn global(name: &str) -> Self {
        Variable {
            name: name.to_string(),
            global: true,
            aggregate: None,
        }
    }

    /// A copy that carries the aggregate's result name.
    pub fn with_aggregate(&self, aggregate: Aggregate) -> Self {
        Variable {
            aggregate: Some(aggregate),
            ..self.clone()
        }
    }

    /// A plain reference to this variable's visible name, as seen from an
    /// enclosing scope that only knows the result.
    pub fn by_name(&self) -> Self {
        Variable::local(&self.visible_name())
    }

    /// The bound name: `o1`, or `s_` for globals.
    pub fn name(&self) -> String {
        if self.global {
            format!("{}_", self.name)
        } else {
            self.name.clone()
        }
    }

    /// The projected name: `o1_count` for an aggregate, else the bound name.
    pub fn visible_name(&self) -> String {
        match self.aggregate {
            Some(agg) => format!("{}_{}", self.name(), agg.functor()),
            None => self.name(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn aggregate(&self) -> Option<Aggregate> {
        self.aggregate
    }

    /// `?o1`: reference to the bound (not aggregated) variable.
    pub fn sparql(&self) -> String {
        format!("?{}", self.name())
    }

    /// Projection term: `?o1` or `(COUNT(DISTINCT ?o1) AS ?o1_count)`.
    pub fn projection(&self) -> String {
        match self.aggregate {
            Some(agg) => format!("({} AS ?{})", agg.apply(&self.sparql()), self.visible_name()),
            None => self.sparql(),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.visible_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    subjects: HashMap<String, Variable>,
    objects: HashMap<String, Variable>,
    /// Query-source item name to the key of the expression it ranges over.
    sources: HashMap<String, String>,
}

/// Allocates unique variables and memoizes them per expression key.
#[derive(Debug)]
pub struct VariableAllocator {
    counter: usize,
    scopes: Vec<Scope>,
}

impl Default for VariableAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableAllocator {
    pub fn new() -> Self {
        VariableAllocator {
            counter: 0,
            scopes: vec![Scope::default()],
        }
    }

    pub fn root_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn new_scope(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope {
            parent: Some(parent),
            ..Scope::default()
        });
        ScopeId(self.scopes.len() - 1)
    }

    /// The subject of the root query: `?s_`.
    pub fn global_subject() -> Variable {
        Variable::global("s")
    }

    /// Fresh local variable `{prefix}{n}`.
    pub fn create_local(&mut self, prefix: &str) -> Variable {
        self.counter += 1;
        Variable::local(&format!("{prefix}{}", self.counter))
    }

    pub fn create_subject(&mut self, scope: ScopeId, key: &str) -> Variable {
        let var = self.create_local("s");
        self.set_subject(scope, key, var.clone());
        var
    }

    pub fn create_object(&mut self, scope: ScopeId, key: &str) -> Variable {
        let var = self.create_local("o");
        self.set_object(scope, key, var.clone());
        var
    }

    pub fn set_subject(&mut self, scope: ScopeId, key: &str, var: Variable) {
        self.scopes[scope.0].subjects.insert(key.to_string(), var);
    }

    pub fn set_object(&mut self, scope: ScopeId, key: &str, var: Variable) {
        self.scopes[scope.0].objects.insert(key.to_string(), var);
    }

    pub fn add_source(&mut self, scope: ScopeId, item_name: &str, source_key: &str) {
        self.scopes[scope.0]
            .sources
            .insert(item_name.to_string(), source_key.to_string());
    }

    /// Subject variable for `key`, searching enclosing scopes.
    pub fn try_subject(&self, scope: ScopeId, key: &str) -> Option<Variable> {
        self.lookup(scope, |s| s.subjects.get(key))
    }

    /// Object variable for `key`, searching enclosing scopes.
    pub fn try_object(&self, scope: ScopeId, key: &str) -> Option<Variable> {
        self.lookup(scope, |s| s.objects.get(key))
    }

    /// The key of the expression a query-source item ranges over.
    pub fn source_key(&self, scope: ScopeId, item_name: &str) -> Option<String> {
        self.lookup(scope, |s| s.sources.get(item_name))
    }

    fn lookup<T: Clone>(&self, scope: ScopeId, get: impl Fn(&Scope) -> Option<&T>) -> Option<T> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(found) = get(scope) {
                return Some(found.clone());
            }
            current = scope.parent;
        }
        None
    }
}
