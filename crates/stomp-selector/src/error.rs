use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("selector parse error at byte {pos}: {reason}")]
    Syntax { pos: usize, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("selector evaluation error: {reason}")]
    Eval { reason: String },
}
