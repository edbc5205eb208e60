//! A small SQL-like filter expression language used to scope a queue or
//! topic subscription to a subset of messages, matched against a message's
//! headers.
//!
//! ```text
//! repo-name == 'drone' AND ram >= 2
//! platform GLOB 'linux/*' OR platform REGEXP 'linux/(.+)'
//! platform NOT IN ('windows/amd64', 'windows/386')
//! ```

mod ast;
mod error;
mod eval;
mod lexer;
mod parser;

pub use ast::{Expr, Operator, Right, Value};
pub use error::{EvalError, ParseError};
pub use eval::Row;

/// A parsed, reusable selector expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    expr: Expr,
}

impl Selector {
    /// Parses a selector expression. Fails on any syntax error; callers
    /// that want to swallow a bad selector rather than reject it (as a
    /// subscribe-time selector does) should match on the error themselves.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        Ok(Selector {
            expr: parser::parse(input)?,
        })
    }

    /// Evaluates the selector against `row`. A runtime failure (e.g. an
    /// invalid `REGEXP` pattern) is reported rather than silently treated
    /// as a non-match — callers decide whether that should fail closed.
    pub fn eval(&self, row: &dyn Row) -> Result<bool, EvalError> {
        eval::eval(&self.expr, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapRow(HashMap<&'static str, &'static str>);

    impl Row for MapRow {
        fn field(&self, name: &str) -> Option<&str> {
            self.0.get(name).copied()
        }
    }

    fn row(pairs: &[(&'static str, &'static str)]) -> MapRow {
        MapRow(pairs.iter().copied().collect())
    }

    fn check(selector: &str, row: &MapRow, expected: bool) {
        let parsed = Selector::parse(selector).unwrap();
        assert_eq!(
            parsed.eval(row).unwrap(),
            expected,
            "selector {selector:?} against {:?}",
            row.0
        );
    }

    #[test]
    fn string_equality() {
        check("repo-name == 'drone'", &row(&[("repo-name", "drone")]), true);
        check(
            "repo-name == 'drone'",
            &row(&[("repo-name", "coverage")]),
            false,
        );
        check("repo-name == 'drone'", &row(&[]), false);
    }

    #[test]
    fn numeric_comparison() {
        check("ram >= 2", &row(&[("ram", "2")]), true);
        check("ram >= 2", &row(&[("ram", "1.5")]), false);
        check("ram >= 2", &row(&[("ram", "4")]), true);
    }

    #[test]
    fn glob_matching() {
        check(
            "platform GLOB 'linux/*'",
            &row(&[("platform", "linux/amd64")]),
            true,
        );
        check(
            "platform GLOB 'linux/*'",
            &row(&[("platform", "windows/amd64")]),
            false,
        );
    }

    #[test]
    fn regexp_matching() {
        check(
            "platform REGEXP 'linux/(.+)'",
            &row(&[("platform", "linux/arm64")]),
            true,
        );
        check(
            "platform REGEXP 'linux/(.+)'",
            &row(&[("platform", "windows/amd64")]),
            false,
        );
    }

    #[test]
    fn not_in_list() {
        check(
            "platform NOT IN ('windows/amd64', 'windows/386')",
            &row(&[("platform", "linux/amd64")]),
            true,
        );
        check(
            "platform NOT IN ('windows/amd64', 'windows/386')",
            &row(&[("platform", "windows/amd64")]),
            false,
        );
    }

    #[test]
    fn in_list() {
        check(
            "repo-name IN ('drone', 'coverage')",
            &row(&[("repo-name", "coverage")]),
            true,
        );
        check(
            "repo-name IN ('drone', 'coverage')",
            &row(&[("repo-name", "other")]),
            false,
        );
    }

    #[test]
    fn boolean_literal() {
        check(
            "repo-private == true",
            &row(&[("repo-private", "true")]),
            true,
        );
        check(
            "repo-private == true",
            &row(&[("repo-private", "false")]),
            false,
        );
        check(
            "repo-private == false",
            &row(&[("repo-private", "FALSE")]),
            true,
        );
    }

    #[test]
    fn and_or_combinations() {
        check(
            "repo-name == 'drone' AND ram >= 2",
            &row(&[("repo-name", "drone"), ("ram", "4")]),
            true,
        );
        check(
            "repo-name == 'drone' AND ram >= 2",
            &row(&[("repo-name", "drone"), ("ram", "1")]),
            false,
        );
        check(
            "repo-name IN ('drone', 'coverage') OR repo-private == true",
            &row(&[("repo-name", "other"), ("repo-private", "true")]),
            true,
        );
        check(
            "repo-name IN ('drone', 'coverage') OR repo-private == true",
            &row(&[("repo-name", "other"), ("repo-private", "false")]),
            false,
        );
    }

    #[test]
    fn and_binds_right_leaning_across_chains() {
        // a AND b AND c must parse as a AND (b AND c), not (a AND b) AND c;
        // both associate the same for AND, but this pins the parse shape.
        let parsed = Selector::parse("a == '1' AND b == '2' AND c == '3'").unwrap();
        match parsed.expr {
            Expr::And(_, rest) => assert!(matches!(*rest, Expr::And(_, _))),
            _ => panic!("expected a right-leaning AND chain"),
        }
    }

    #[test]
    fn malformed_selectors_fail_to_parse() {
        for input in ["", "==", "a ==", "a IN (", "a IN (1,"] {
            assert!(
                Selector::parse(input).is_err(),
                "expected parse error for {input:?}"
            );
        }
    }

    #[test]
    fn bad_regexp_fails_closed_at_eval_time() {
        let parsed = Selector::parse("platform REGEXP '(unterminated'").unwrap();
        assert!(parsed.eval(&row(&[("platform", "linux")])).is_err());
    }
}
