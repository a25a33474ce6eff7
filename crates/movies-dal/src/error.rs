use std::fmt::Display;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Create,
    Update,
    Delete,
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self {
            Operation::Fetch => "fetch",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        write!(f, "{verb}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Unknown genre: {0}")]
    UnknownGenre(String),

    #[error("Invalid genre name: {0}")]
    InvalidGenre(String),

    #[error("Failed to {operation} movie")]
    OperationFailed {
        operation: Operation,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps low level failures into an operation specific error,
    /// domain errors are passed through unchanged.
    pub(crate) fn failed(operation: Operation, error: Error) -> Self {
        match error {
            e @ (Error::UnknownGenre(_)
            | Error::InvalidGenre(_)
            | Error::OperationFailed { .. }) => e,
            e => Error::OperationFailed {
                operation,
                source: Box::new(e),
            },
        }
    }
}
