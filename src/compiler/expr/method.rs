//! String matching methods, compiled to `REGEX` filters.
//!
//! `Contains`, `StartsWith` and `EndsWith` match their argument literally,
//! with XPath regex metacharacters escaped; `Regex.IsMatch` passes its
//! pattern through untouched.

use super::{ExpressionCompiler, Trace};
use crate::compiler::model::{Constant, Expr, Method, StringComparison};
use crate::compiler::tree::Cursor;
use crate::error::{Result, SparqlateError};
use crate::serializer::serialize_string;
use crate::value::Value;

impl<'m> ExpressionCompiler<'m> {
    pub(super) fn visit_method_call(
        &mut self,
        expr: &'m Expr,
        cx: Cursor,
        trace: Option<&Trace<'_>>,
    ) -> Result<()> {
        let Expr::MethodCall {
            target,
            method,
            args,
        } = expr
        else {
            return Err(SparqlateError::InternalError(format!(
                "visit_method_call on a {}",
                expr.kind_name()
            )));
        };

        match method {
            Method::Contains | Method::StartsWith | Method::EndsWith => {
                let Some(target) = target.as_deref() else {
                    return Err(SparqlateError::unsupported(format!("{method}() without a target")));
                };
                let text = string_argument(method, args.first())?;
                let ignore_case = ignore_case_argument(method, args.get(1))?;
                let escaped = escape_pattern(text);
                let pattern = match method {
                    Method::StartsWith => format!("^{escaped}"),
                    Method::EndsWith => format!("{escaped}$"),
                    _ => escaped,
                };
                self.regex_filter(target, &pattern, ignore_case, cx, trace)
            }
            Method::IsMatch => {
                let [input, pattern, options @ ..] = args.as_slice() else {
                    return Err(SparqlateError::unsupported(
                        "Regex.IsMatch() needs an input and a pattern",
                    ));
                };
                let pattern = string_argument(method, Some(pattern))?;
                let ignore_case = ignore_case_argument(method, options.first())?;
                self.regex_filter(input, pattern, ignore_case, cx, trace)
            }
            Method::GetType => Err(SparqlateError::unsupported(
                "GetType() outside a type comparison",
            )),
            Method::Equals => Err(SparqlateError::InternalError(
                "Equals() reached method dispatch".into(),
            )),
            Method::Other(name) => Err(SparqlateError::unsupported(format!("method '{name}'"))),
        }
    }

    fn regex_filter(
        &mut self,
        input: &'m Expr,
        pattern: &str,
        ignore_case: bool,
        cx: Cursor,
        trace: Option<&Trace<'_>>,
    ) -> Result<()> {
        let (var, at) = match input {
            Expr::Member { .. } => (self.resolve_member(cx, input)?, cx.pattern),
            Expr::SubQuery(model) => {
                let (id, enclosing) = self.ensure_subquery(input, model, cx)?;
                (self.tree.result_variable(id), enclosing)
            }
            other => {
                return Err(SparqlateError::unsupported(format!(
                    "string match on a {}: {other}",
                    other.kind_name()
                )));
            }
        };

        let negation = if Trace::is_negated(trace) { "!" } else { "" };
        let flags = if ignore_case {
            format!(", {}", serialize_string("i"))
        } else {
            String::new()
        };
        self.tree.add_filter(
            at,
            format!(
                "{negation}REGEX(STR({}), {}{flags})",
                var.sparql(),
                serialize_string(pattern)
            ),
        );
        Ok(())
    }
}

/// Escape the XPath regular expression metacharacters of literal text, so
/// the store's `REGEX` matches it verbatim. Nothing else is escaped: `\#`
/// or `\&` are not valid XPath escapes.
fn escape_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '|' | '.' | '?' | '*' | '+' | '(' | ')' | '{' | '}' | '-' | '[' | ']' | '^' | '$'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn string_argument<'a>(method: &Method, arg: Option<&'a Expr>) -> Result<&'a str> {
    match arg.and_then(Expr::as_constant) {
        Some(Constant::Value(Value::String(text))) => Ok(text),
        _ => Err(SparqlateError::unsupported(format!(
            "{method}() needs a constant string argument"
        ))),
    }
}

/// Case handling from an optional trailing argument: a `bool`, a
/// `StringComparison` or `RegexOptions`.
fn ignore_case_argument(method: &Method, arg: Option<&Expr>) -> Result<bool> {
    let Some(arg) = arg else {
        return Ok(false);
    };
    match arg.as_constant() {
        Some(Constant::Value(Value::Bool(flag))) => Ok(*flag),
        Some(Constant::Comparison(comparison)) => {
            Ok(*comparison == StringComparison::IgnoreCase)
        }
        Some(Constant::RegexOptions(options)) => Ok(options.ignore_case),
        _ => Err(SparqlateError::unsupported(format!(
            "{method}() with argument {arg}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::*;
    use super::escape_pattern;
    use crate::compiler::model::{Expr, Method, RegexOptions, StringComparison};
    use crate::error::SparqlateError;

    #[test]
    fn test_starts_with() {
        let model = person_query().filter(name().starts_with("A"));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["FILTER ( REGEX ( STR ( ?o1 ) , '^A' ) )"]);
    }

    #[test]
    fn test_ends_with_and_contains() {
        let model = person_query().filter(name().ends_with("son"));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["REGEX ( STR ( ?o1 ) , 'son$' )"]);

        let model = person_query().filter(name().contains("li"));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["REGEX ( STR ( ?o1 ) , 'li' )"]);
    }

    #[test]
    fn test_literal_argument_is_escaped() {
        let model = person_query().filter(name().contains("a.b"));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &[r"'a\\.b'"]);
    }

    #[test]
    fn test_escape_pattern_only_touches_xpath_metacharacters() {
        assert_eq!(escape_pattern("C# & ~x"), "C# & ~x");
        assert_eq!(escape_pattern("a.b*(c)"), r"a\.b\*\(c\)");
        assert_eq!(escape_pattern(r"x-y[1]|{2}^$?+\"), r"x\-y\[1\]\|\{2\}\^\$\?\+\\");
    }

    #[test]
    fn test_contains_with_non_meta_symbols() {
        let model = person_query().filter(name().contains("C# & ~x"));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["REGEX ( STR ( ?o1 ) , 'C# & ~x' )"]);
        assert!(!sparql.contains(r"\#"), "{sparql}");
    }

    #[test]
    fn test_ignore_case_comparison() {
        let model = person_query().filter(name().string_method(
            Method::StartsWith,
            "al",
            StringComparison::IgnoreCase,
        ));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["REGEX ( STR ( ?o1 ) , '^al' , 'i' )"]);
    }

    #[test]
    fn test_negated_method_call() {
        let model = person_query().filter(!name().contains("x"));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["FILTER ( ! REGEX ( STR ( ?o1 ) , 'x' ) )"]);
    }

    #[test]
    fn test_negation_does_not_cross_logical_operator() {
        let model = person_query().filter(
            name()
                .contains("x")
                .and_also(name().ends_with("y")),
        );
        let sparql = compile_select(&model).unwrap();
        assert!(!sparql.contains('!'), "{sparql}");
    }

    #[test]
    fn test_regex_is_match_passes_pattern_verbatim() {
        let model = person_query().filter(Expr::is_match(
            name(),
            "^[A-C].*",
            RegexOptions { ignore_case: true },
        ));
        let sparql = compile_select(&model).unwrap();
        assert_sparql_contains(&sparql, &["REGEX ( STR ( ?o1 ) , '^[A-C].*' , 'i' )"]);
    }

    #[test]
    fn test_unknown_method_is_unsupported() {
        let call = Expr::MethodCall {
            target: Some(Box::new(name())),
            method: Method::Other("ToUpper".into()),
            args: Vec::new(),
        };
        let model = person_query().filter(call);
        assert!(matches!(
            compile_select(&model),
            Err(SparqlateError::UnsupportedShape(_))
        ));
    }

    #[test]
    fn test_non_constant_argument_is_unsupported() {
        let call = Expr::MethodCall {
            target: Some(Box::new(name())),
            method: Method::Contains,
            args: vec![name()],
        };
        let model = person_query().filter(call);
        assert!(compile_select(&model).is_err());
    }
}
