//! Optional authorization callback invoked on a session's first frame.

use stomp_frame::Frame;
use subtle::ConstantTimeEq;

use crate::error::RouterError;

/// A callback invoked with the first (STOMP) frame of a session. Returning
/// an error aborts the connection before a session is ever recorded.
pub type Authorizer = Box<dyn Fn(&Frame) -> Result<(), RouterError> + Send + Sync>;

/// Authorizes a connection against a single configured username/password
/// pair, comparing both by constant-time byte comparison so a credential
/// check can't leak timing information about how many leading bytes
/// matched.
pub fn basic_auth(username: impl Into<String>, password: impl Into<String>) -> Authorizer {
    let user = username.into().into_bytes();
    let pass = password.into().into_bytes();
    Box::new(move |frame: &Frame| {
        let ok_user = frame
            .user
            .as_deref()
            .is_some_and(|u| u.len() == user.len() && bool::from(u.ct_eq(&user)));
        let ok_pass = frame
            .pass
            .as_deref()
            .is_some_and(|p| p.len() == pass.len() && bool::from(p.ct_eq(&pass)));
        if ok_user && ok_pass {
            Ok(())
        } else {
            Err(RouterError::NotAuthorized)
        }
    })
}
