/// A single operand: either a field reference resolved against a [`crate::Row`]
/// at evaluation time, or a literal parsed straight out of the source text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Field(String),
    Text(String),
    Number(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Glob,
    NotGlob,
    Regexp,
    NotRegexp,
}

/// The right-hand side of a comparison: a single value for every operator
/// except `IN`/`NOT IN`, which take a parenthesized list.
#[derive(Debug, Clone, PartialEq)]
pub enum Right {
    Single(Value),
    List(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Comparison {
        op: Operator,
        left: Value,
        right: Right,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}
