//! Hub error types.

use thiserror::Error;

pub type HubResult<T> = Result<T, HubError>;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("job not found: {0}")]
    JobNotFound(String),
}
