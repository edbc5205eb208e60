use thiserror::Error;

/// Errors surfaced by [`crate::Router`] operations.
///
/// `MalformedFrame` (bad bytes on the wire) and `SelectorParse` (bad
/// selector syntax) are not represented here: the former is the peer's
/// problem to report before a frame ever reaches the router, and the
/// latter is swallowed at subscribe time rather than propagated (see
/// `Session::open_subscription`).
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("expected STOMP as the first frame")]
    ExpectedStomp,

    #[error("not authorized")]
    NotAuthorized,

    #[error("no such destination")]
    NoDestination,

    #[error("no such subscription")]
    NoSubscription,

    #[error("selector evaluation error: {0}")]
    SelectorEval(#[from] stomp_selector::EvalError),

    #[error("peer closed")]
    Closed,
}
