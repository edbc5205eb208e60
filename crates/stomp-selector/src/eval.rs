use regex::Regex;

use crate::ast::{Expr, Operator, Right, Value};
use crate::error::EvalError;

/// A row of fields a selector is evaluated against — typically a message's
/// headers. A missing field resolves to an empty string, matching a
/// `Header.Get` miss on the wire format this grammar was lifted from.
pub trait Row {
    fn field(&self, name: &str) -> Option<&str>;
}

pub fn eval(expr: &Expr, row: &dyn Row) -> Result<bool, EvalError> {
    match expr {
        Expr::And(left, right) => Ok(eval(left, row)? && eval(right, row)?),
        Expr::Or(left, right) => Ok(eval(left, row)? || eval(right, row)?),
        Expr::Comparison { op, left, right } => eval_comparison(*op, left, right, row),
    }
}

fn resolve(value: &Value, row: &dyn Row) -> (Option<bool>, String) {
    match value {
        Value::Field(name) => (None, row.field(name).unwrap_or_default().to_owned()),
        Value::Text(s) => (None, s.clone()),
        Value::Number(s) => (None, s.clone()),
        Value::Bool(b) => (Some(*b), if *b { "true".to_owned() } else { "false".to_owned() }),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parses a token as a number only if the *entire* token matches
/// `-?[0-9]+(\.[0-9]+)?` — trailing garbage (`"2x"`) is a string, not `2`.
fn parse_number(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && bytes[i] == b'-' {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == frac_start {
            return None;
        }
    }
    if i != bytes.len() {
        return None;
    }
    s.parse::<f64>().ok()
}

fn values_equal(left_bool: Option<bool>, left_text: &str, right_bool: Option<bool>, right_text: &str) -> bool {
    if left_bool.is_some() || right_bool.is_some() {
        let lb = left_bool.or_else(|| parse_bool(left_text));
        let rb = right_bool.or_else(|| parse_bool(right_text));
        if let (Some(l), Some(r)) = (lb, rb) {
            return l == r;
        }
    }
    if let (Some(l), Some(r)) = (parse_number(left_text), parse_number(right_text)) {
        return l == r;
    }
    left_text == right_text
}

const REGEX_META: &[char] = &[
    '.', '+', '(', ')', '|', '[', ']', '{', '}', '^', '$', '\\',
];

/// Translates a shell-style glob (`*` = any run, `?` = any one character)
/// into an anchored regex pattern, escaping every other regex metacharacter
/// literally.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ if REGEX_META.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('$');
    out
}

fn eval_comparison(
    op: Operator,
    left: &Value,
    right: &Right,
    row: &dyn Row,
) -> Result<bool, EvalError> {
    let (left_bool, left_text) = resolve(left, row);

    match op {
        Operator::Eq | Operator::Neq => {
            let Right::Single(rv) = right else {
                return Err(EvalError::Eval {
                    reason: "expected a single right-hand value".into(),
                });
            };
            let (right_bool, right_text) = resolve(rv, row);
            let equal = values_equal(left_bool, &left_text, right_bool, &right_text);
            Ok(if op == Operator::Eq { equal } else { !equal })
        }
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
            let Right::Single(rv) = right else {
                return Err(EvalError::Eval {
                    reason: "expected a single right-hand value".into(),
                });
            };
            let (_, right_text) = resolve(rv, row);
            let ordering = if let (Some(l), Some(r)) = (parse_number(&left_text), parse_number(&right_text)) {
                l.partial_cmp(&r).unwrap_or(std::cmp::Ordering::Equal)
            } else {
                left_text.as_str().cmp(right_text.as_str())
            };
            Ok(match op {
                Operator::Lt => ordering.is_lt(),
                Operator::Lte => ordering.is_le(),
                Operator::Gt => ordering.is_gt(),
                Operator::Gte => ordering.is_ge(),
                _ => unreachable!(),
            })
        }
        Operator::In | Operator::NotIn => {
            let Right::List(entries) = right else {
                return Err(EvalError::Eval {
                    reason: "expected a parenthesized list".into(),
                });
            };
            let found = entries.iter().any(|entry| {
                let (entry_bool, entry_text) = resolve(entry, row);
                values_equal(left_bool, &left_text, entry_bool, &entry_text)
            });
            Ok(if op == Operator::In { found } else { !found })
        }
        Operator::Glob | Operator::NotGlob => {
            let Right::Single(rv) = right else {
                return Err(EvalError::Eval {
                    reason: "expected a single right-hand value".into(),
                });
            };
            let (_, pattern) = resolve(rv, row);
            let re = Regex::new(&glob_to_regex(&pattern)).map_err(|e| EvalError::Eval {
                reason: format!("invalid glob pattern: {e}"),
            })?;
            let matched = re.is_match(&left_text);
            Ok(if op == Operator::Glob { matched } else { !matched })
        }
        Operator::Regexp | Operator::NotRegexp => {
            let Right::Single(rv) = right else {
                return Err(EvalError::Eval {
                    reason: "expected a single right-hand value".into(),
                });
            };
            let (_, pattern) = resolve(rv, row);
            let re = Regex::new(&pattern).map_err(|e| EvalError::Eval {
                reason: format!("invalid regular expression: {e}"),
            })?;
            let matched = re.is_match(&left_text);
            Ok(if op == Operator::Regexp { matched } else { !matched })
        }
    }
}
