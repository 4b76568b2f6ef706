use thiserror::Error;

#[derive(Error, Debug)]
pub enum KVError {
    /// The underlying store could not be opened or prepared.
    #[error("connection error: {0}")]
    Connection(String),

    /// The operation is not valid in the current connection/transaction state.
    #[error("state error: {0}")]
    State(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying store failed while serving an operation.
    #[error("storage error: {0}")]
    Storage(String),
}
