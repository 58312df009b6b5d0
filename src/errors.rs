//! Error taxonomy for the session engine and its playback layer.

use thiserror::Error;

use crate::validation::NameError;

/// Errors surfaced by the session engine.
///
/// None of these are fatal: the session turns every one of them into an inline
/// `error` display line and returns to its previous stable state.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A command needs a logged-in identity (or an active actor) and there is none.
    #[error("You need to log in first. Type LOGIN or REGISTER.")]
    NotAuthenticated,

    /// Malformed or missing user input.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// An external collaborator (auth, command execution, store lookups) failed.
    #[error("{service} failed: {detail}")]
    RemoteService { service: &'static str, detail: String },

    /// Media playback failure.
    #[error("audio: {0}")]
    Playback(#[from] PlaybackError),
}

impl EngineError {
    pub fn remote(service: &'static str, detail: impl Into<String>) -> Self {
        EngineError::RemoteService {
            service,
            detail: detail.into(),
        }
    }
}

/// Input validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Usage: {0}")]
    MissingArgument(&'static str),

    #[error("That doesn't look like an email address.")]
    InvalidEmail,

    #[error("Password must be at least {min} characters.")]
    PasswordTooShort { min: usize },

    #[error("Passwords do not match. Type REGISTER to start over.")]
    PasswordMismatch,

    #[error("Invalid character name: {0}")]
    InvalidName(#[from] NameError),

    #[error("No one called '{0}' is here.")]
    UnknownTarget(String),

    #[error("No character named '{0}' on this account.")]
    UnknownCharacter(String),
}

/// Outcome of a failed play attempt on the shared playback resource.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// A newer load superseded this play request (rapid track switching).
    #[error("playback aborted")]
    Aborted,

    /// The output refused to start until the user interacts with it.
    #[error("playback blocked until you interact; type ':audio on' to retry")]
    PermissionDenied,

    #[error("media error: {0}")]
    Media(String),
}
