use playback::PlaybackError;
use reqwest::StatusCode;
use shared::{domain::FormId, protocol::EncodeError};
use thiserror::Error;

/// Failure of one form submission. Every variant is terminal for that
/// submission: nothing is retried.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no binding registered for form '{form}'")]
    UnboundForm { form: FormId },
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("request could not be completed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("server rejected the request with status {status}")]
    Status { status: StatusCode },
    #[error("returned audio could not be played: {0}")]
    Playback(#[from] PlaybackError),
}
