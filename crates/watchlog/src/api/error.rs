use thiserror::Error;

#[derive(Error, Debug)]
pub enum InnerApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}
