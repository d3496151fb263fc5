//! Password mode selection.

use std::sync::Arc;

use pdfload_engine::PasswordCallback;
use tracing::trace;

/// How password requests of one load are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordMode {
    /// The caller's `on_password` callback answers.
    Delegated,
    /// The static `password` is resupplied on every request.
    Default,
    /// Nobody answers; the engine fails the load.
    Unhandled,
}

/// Pick the password callback for a load.
///
/// `on_password` wins over `password`. An empty password counts as unset.
pub(crate) fn select(
    on_password: Option<PasswordCallback>,
    password: Option<String>,
) -> (PasswordMode, Option<PasswordCallback>) {
    match (on_password, password) {
        (Some(callback), _) => (PasswordMode::Delegated, Some(callback)),
        (None, Some(password)) if !password.is_empty() => {
            (PasswordMode::Default, Some(resupply(password)))
        }
        _ => (PasswordMode::Unhandled, None),
    }
}

/// Answer every request with the same password, whatever the reason.
///
/// A wrong password is resupplied for as long as the engine keeps asking.
fn resupply(password: String) -> PasswordCallback {
    Arc::new(move |responder, reason| {
        trace!(%reason, "resupplying static password");
        responder.supply(password.as_str());
    })
}
