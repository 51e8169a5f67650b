//! Query model: the typed object query the compiler consumes.
//!
//! A [`QueryModel`] is the parsed form of a chain like
//! `from x in Model<Person> where x.Age > 30 orderby x.Name select x`.
//! Predicates, projections and orderings are [`Expr`] trees. Everything here
//! is plain data; the builder methods exist so callers (and tests) can write
//! models without spelling out every box.
//!
//! Expression identity is structural. [`Expr::key`] renders a canonical
//! text form that the compiler uses to memoize variables and sub-query
//! generators, so two structurally equal sub-trees share one variable.

use std::fmt;

use crate::value::Value;

// ── Types ───────────────────────────────────────────────────────────────

/// Coarse classification of a mapped type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A mapped class backed by RDF resources.
    Resource,
    Bool,
    String,
    Integer,
    Float,
    Decimal,
    DateTime,
    Uri,
    Other,
}

/// A reference to a type of the object model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub name: String,
    pub kind: TypeKind,
}

impl TypeRef {
    pub fn new(name: &str, kind: TypeKind) -> Self {
        TypeRef {
            name: name.to_string(),
            kind,
        }
    }

    pub fn resource(name: &str) -> Self {
        Self::new(name, TypeKind::Resource)
    }

    pub fn bool() -> Self {
        Self::new("bool", TypeKind::Bool)
    }

    pub fn string() -> Self {
        Self::new("string", TypeKind::String)
    }

    pub fn integer() -> Self {
        Self::new("int", TypeKind::Integer)
    }

    pub fn float() -> Self {
        Self::new("double", TypeKind::Float)
    }

    pub fn decimal() -> Self {
        Self::new("decimal", TypeKind::Decimal)
    }

    pub fn datetime() -> Self {
        Self::new("DateTime", TypeKind::DateTime)
    }

    pub fn is_resource(&self) -> bool {
        self.kind == TypeKind::Resource
    }

    pub fn is_bool(&self) -> bool {
        self.kind == TypeKind::Bool
    }
}

/// A property of a mapped type.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRef {
    /// Name of the type that declares the member.
    pub declaring_type: String,
    pub name: String,
    /// The member's value type (element type for collections).
    pub ty: TypeRef,
}

// ── Constants ───────────────────────────────────────────────────────────

/// Case handling requested for a string method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringComparison {
    CaseSensitive,
    IgnoreCase,
}

/// Options of a regular-expression match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegexOptions {
    pub ignore_case: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Value(Value),
    Type(TypeRef),
    Comparison(StringComparison),
    RegexOptions(RegexOptions),
    Null,
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Value(v) => write!(f, "{v}"),
            Constant::Type(t) => write!(f, "typeof({})", t.name),
            Constant::Comparison(c) => write!(f, "StringComparison.{c:?}"),
            Constant::RegexOptions(o) if o.ignore_case => write!(f, "RegexOptions.IgnoreCase"),
            Constant::RegexOptions(_) => write!(f, "RegexOptions.None"),
            Constant::Null => write!(f, "null"),
        }
    }
}

// ── Operators ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    AndAlso,
    OrElse,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::AndAlso | BinaryOp::OrElse)
    }

    /// The operator with its operands swapped: `a < b` ⇔ `b > a`.
    pub fn mirrored(self) -> Self {
        match self {
            BinaryOp::GreaterThan => BinaryOp::LessThan,
            BinaryOp::GreaterThanOrEqual => BinaryOp::LessThanOrEqual,
            BinaryOp::LessThan => BinaryOp::GreaterThan,
            BinaryOp::LessThanOrEqual => BinaryOp::GreaterThanOrEqual,
            other => other,
        }
    }

    /// SPARQL operator text for comparisons.
    pub fn sparql(self) -> &'static str {
        match self {
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Equal => write!(f, "=="),
            other => write!(f, "{}", other.sparql()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Convert,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "Not"),
            UnaryOp::Negate => write!(f, "Negate"),
            UnaryOp::Convert => write!(f, "Convert"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    Contains,
    StartsWith,
    EndsWith,
    /// `Regex.IsMatch(input, pattern[, options])`; static, no target.
    IsMatch,
    GetType,
    Equals,
    Other(String),
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Contains => write!(f, "Contains"),
            Method::StartsWith => write!(f, "StartsWith"),
            Method::EndsWith => write!(f, "EndsWith"),
            Method::IsMatch => write!(f, "Regex.IsMatch"),
            Method::GetType => write!(f, "GetType"),
            Method::Equals => write!(f, "Equals"),
            Method::Other(name) => write!(f, "{name}"),
        }
    }
}

// ── Expressions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Member {
        target: Box<Expr>,
        member: MemberRef,
    },
    MethodCall {
        target: Option<Box<Expr>>,
        method: Method,
        args: Vec<Expr>,
    },
    Constant(Constant),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    SubQuery(Box<QueryModel>),
    TypeTest {
        operand: Box<Expr>,
        ty: TypeRef,
    },
    /// Reference to the item of a query source, e.g. `x` in `from x in ...`.
    QuerySource(String),
    New(String),
    NewArray(Vec<Expr>),
    ListInit(String),
    Invocation(String),
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    Parameter(String),
}

impl Expr {
    /// Canonical identity of the expression.
    ///
    /// `x.Uri` shares its key with `x`: both denote the subject itself.
    pub fn key(&self) -> String {
        match self {
            Expr::Member { target, member } if member.name == "Uri" => target.key(),
            _ => self.to_string(),
        }
    }

    /// Name of the construct for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Binary { .. } => "binary expression",
            Expr::Member { .. } => "member access",
            Expr::MethodCall { .. } => "method call",
            Expr::Constant(_) => "constant",
            Expr::Unary { .. } => "unary expression",
            Expr::SubQuery(_) => "sub-query",
            Expr::TypeTest { .. } => "type test",
            Expr::QuerySource(_) => "query source reference",
            Expr::New(_) => "object construction",
            Expr::NewArray(_) => "array construction",
            Expr::ListInit(_) => "list initializer",
            Expr::Invocation(_) => "delegate invocation",
            Expr::Conditional { .. } => "conditional expression",
            Expr::Parameter(_) => "parameter",
        }
    }

    /// The query-source item a member chain starts at.
    pub fn source_root(&self) -> Option<&str> {
        match self {
            Expr::QuerySource(name) => Some(name),
            Expr::Member { target, .. } => target.source_root(),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Expr::Constant(c) => Some(c),
            _ => None,
        }
    }

    // ── Builders ────────────────────────────────────────────────────────

    pub fn source(item: &str) -> Self {
        Expr::QuerySource(item.to_string())
    }

    pub fn member(self, declaring_type: &str, name: &str, ty: TypeRef) -> Self {
        Expr::Member {
            target: Box::new(self),
            member: MemberRef {
                declaring_type: declaring_type.to_string(),
                name: name.to_string(),
                ty,
            },
        }
    }

    pub fn constant(value: Value) -> Self {
        Expr::Constant(Constant::Value(value))
    }

    pub fn string(text: &str) -> Self {
        Self::constant(Value::string(text))
    }

    pub fn int(i: i64) -> Self {
        Self::constant(Value::Int(i))
    }

    pub fn bool(b: bool) -> Self {
        Self::constant(Value::Bool(b))
    }

    pub fn uri(uri: &str) -> Self {
        Self::constant(Value::uri(uri))
    }

    pub fn null() -> Self {
        Expr::Constant(Constant::Null)
    }

    pub fn type_of(ty: TypeRef) -> Self {
        Expr::Constant(Constant::Type(ty))
    }

    pub fn subquery(model: QueryModel) -> Self {
        Expr::SubQuery(Box::new(model))
    }

    fn binary(self, op: BinaryOp, other: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn equal(self, other: Expr) -> Self {
        self.binary(BinaryOp::Equal, other)
    }

    pub fn not_equal(self, other: Expr) -> Self {
        self.binary(BinaryOp::NotEqual, other)
    }

    pub fn greater_than(self, other: Expr) -> Self {
        self.binary(BinaryOp::GreaterThan, other)
    }

    pub fn greater_or_equal(self, other: Expr) -> Self {
        self.binary(BinaryOp::GreaterThanOrEqual, other)
    }

    pub fn less_than(self, other: Expr) -> Self {
        self.binary(BinaryOp::LessThan, other)
    }

    pub fn less_or_equal(self, other: Expr) -> Self {
        self.binary(BinaryOp::LessThanOrEqual, other)
    }

    pub fn and_also(self, other: Expr) -> Self {
        self.binary(BinaryOp::AndAlso, other)
    }

    pub fn or_else(self, other: Expr) -> Self {
        self.binary(BinaryOp::OrElse, other)
    }

    fn call(self, method: Method, args: Vec<Expr>) -> Self {
        Expr::MethodCall {
            target: Some(Box::new(self)),
            method,
            args,
        }
    }

    /// `a.Equals(b)`.
    pub fn equals(self, other: Expr) -> Self {
        self.call(Method::Equals, vec![other])
    }

    pub fn contains(self, text: &str) -> Self {
        self.call(Method::Contains, vec![Expr::string(text)])
    }

    pub fn starts_with(self, text: &str) -> Self {
        self.call(Method::StartsWith, vec![Expr::string(text)])
    }

    pub fn ends_with(self, text: &str) -> Self {
        self.call(Method::EndsWith, vec![Expr::string(text)])
    }

    /// A string method with an explicit comparison argument.
    pub fn string_method(self, method: Method, text: &str, comparison: StringComparison) -> Self {
        self.call(
            method,
            vec![Expr::string(text), Expr::Constant(Constant::Comparison(comparison))],
        )
    }

    pub fn get_type(self) -> Self {
        self.call(Method::GetType, Vec::new())
    }

    /// `Regex.IsMatch(input, pattern, options)`.
    pub fn is_match(input: Expr, pattern: &str, options: RegexOptions) -> Self {
        Expr::MethodCall {
            target: None,
            method: Method::IsMatch,
            args: vec![
                input,
                Expr::string(pattern),
                Expr::Constant(Constant::RegexOptions(options)),
            ],
        }
    }

    pub fn is_type(self, ty: TypeRef) -> Self {
        Expr::TypeTest {
            operand: Box::new(self),
            ty,
        }
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            Expr::Member { target, member } => write!(f, "{target}.{}", member.name),
            Expr::MethodCall {
                target,
                method,
                args,
            } => {
                if let Some(target) = target {
                    write!(f, "{target}.")?;
                }
                write!(f, "{method}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::Constant(c) => write!(f, "{c}"),
            Expr::Unary { op, operand } => write!(f, "{op}({operand})"),
            Expr::SubQuery(model) => write!(f, "{{{model}}}"),
            Expr::TypeTest { operand, ty } => write!(f, "({operand} is {})", ty.name),
            Expr::QuerySource(name) => write!(f, "[{name}]"),
            Expr::New(ty) => write!(f, "new {ty}()"),
            Expr::NewArray(items) => {
                write!(f, "new[] {{")?;
                write_list(f, items)?;
                write!(f, "}}")
            }
            Expr::ListInit(ty) => write!(f, "new {ty} {{...}}"),
            Expr::Invocation(name) => write!(f, "Invoke({name})"),
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => write!(f, "IIF({test}, {if_true}, {if_false})"),
            Expr::Parameter(name) => write!(f, "{name}"),
        }
    }
}

// ── Query model ─────────────────────────────────────────────────────────

/// What a query ranges over.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceExpr {
    /// All instances of the item type in the model.
    Model,
    /// A collection member of an outer item, e.g. `x.KnownPeople`.
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceClause {
    pub item_name: String,
    pub item_type: TypeRef,
    pub source: SourceExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub expr: Expr,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultOperator {
    Count,
    LongCount,
    Sum,
    Average,
    Min,
    Max,
    Any,
    First { or_default: bool },
    Last { or_default: bool },
    Single { or_default: bool },
    Distinct,
    Skip(usize),
    Take(usize),
    /// Restrict the sequence to items of a (sub)type.
    OfType(TypeRef),
}

impl fmt::Display for ResultOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_default = |flag: bool| if flag { "OrDefault" } else { "" };
        match self {
            ResultOperator::Count => write!(f, "Count()"),
            ResultOperator::LongCount => write!(f, "LongCount()"),
            ResultOperator::Sum => write!(f, "Sum()"),
            ResultOperator::Average => write!(f, "Average()"),
            ResultOperator::Min => write!(f, "Min()"),
            ResultOperator::Max => write!(f, "Max()"),
            ResultOperator::Any => write!(f, "Any()"),
            ResultOperator::First { or_default: d } => write!(f, "First{}()", or_default(*d)),
            ResultOperator::Last { or_default: d } => write!(f, "Last{}()", or_default(*d)),
            ResultOperator::Single { or_default: d } => write!(f, "Single{}()", or_default(*d)),
            ResultOperator::Distinct => write!(f, "Distinct()"),
            ResultOperator::Skip(n) => write!(f, "Skip({n})"),
            ResultOperator::Take(n) => write!(f, "Take({n})"),
            ResultOperator::OfType(ty) => write!(f, "OfType<{}>()", ty.name),
        }
    }
}

/// A complete object query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryModel {
    pub source: SourceClause,
    /// Conjoined `where` clauses.
    pub predicates: Vec<Expr>,
    pub projection: Option<Expr>,
    pub orderings: Vec<Ordering>,
    pub result_operators: Vec<ResultOperator>,
}

impl QueryModel {
    /// A query over every instance of `item_type`.
    pub fn from_model(item: &str, item_type: TypeRef) -> Self {
        Self::with_source(item, item_type, SourceExpr::Model)
    }

    /// A query over a collection member of an outer item.
    pub fn from_expr(item: &str, item_type: TypeRef, source: Expr) -> Self {
        Self::with_source(item, item_type, SourceExpr::Expr(Box::new(source)))
    }

    fn with_source(item: &str, item_type: TypeRef, source: SourceExpr) -> Self {
        QueryModel {
            source: SourceClause {
                item_name: item.to_string(),
                item_type,
                source,
            },
            predicates: Vec::new(),
            projection: None,
            orderings: Vec::new(),
            result_operators: Vec::new(),
        }
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn select(mut self, projection: Expr) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn order_by(mut self, expr: Expr) -> Self {
        self.orderings.push(Ordering {
            expr,
            direction: Direction::Ascending,
        });
        self
    }

    pub fn order_by_descending(mut self, expr: Expr) -> Self {
        self.orderings.push(Ordering {
            expr,
            direction: Direction::Descending,
        });
        self
    }

    pub fn with(mut self, op: ResultOperator) -> Self {
        self.result_operators.push(op);
        self
    }

    /// The item reference of the main source, `x` in `from x in ...`.
    pub fn item(&self) -> Expr {
        Expr::source(&self.source.item_name)
    }

    /// Whether one of the orderings sorts by `expr`.
    pub fn has_ordering(&self, expr: &Expr) -> bool {
        let key = expr.key();
        self.orderings.iter().any(|o| o.expr.key() == key)
    }

    pub fn has_result_operator(&self, pred: impl Fn(&ResultOperator) -> bool) -> bool {
        self.result_operators.iter().any(pred)
    }

    /// Whether the model ends in `Last`/`LastOrDefault`.
    pub fn takes_last(&self) -> bool {
        self.has_result_operator(|op| matches!(op, ResultOperator::Last { .. }))
    }

    /// Element type of the query's result sequence, before aggregation.
    pub fn result_type(&self) -> TypeRef {
        match &self.projection {
            Some(Expr::Member { member, .. }) if member.name != "Uri" => member.ty.clone(),
            Some(Expr::SubQuery(model)) => model.result_type(),
            _ => self.source.item_type.clone(),
        }
    }
}

impl fmt::Display for QueryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "from {} {} in ", self.source.item_type.name, self.source.item_name)?;
        match &self.source.source {
            SourceExpr::Model => write!(f, "Model<{}>", self.source.item_type.name)?,
            SourceExpr::Expr(e) => write!(f, "{e}")?,
        }
        for p in &self.predicates {
            write!(f, " where {p}")?;
        }
        if !self.orderings.is_empty() {
            write!(f, " orderby ")?;
            for (i, o) in self.orderings.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", o.expr)?;
                if o.direction == Direction::Descending {
                    write!(f, " desc")?;
                }
            }
        }
        match &self.projection {
            Some(p) => write!(f, " select {p}")?,
            None => write!(f, " select [{}]", self.source.item_name)?,
        }
        for op in &self.result_operators {
            write!(f, " => {op}")?;
        }
        Ok(())
    }
}
