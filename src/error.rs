use thiserror::Error;

/// ClientError
///
/// Every failure the service layer can surface to a caller. The three
/// `*Failed` variants wrap the underlying cause so the server's message stays
/// visible in the rendered error text.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network failure, non-JSON body, or a response that does not decode.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a JSON payload carrying an `error` key.
    #[error("server rejected request: {0}")]
    Rejected(String),

    /// An authenticated call was attempted without a bearer token.
    #[error("not signed in")]
    Unauthenticated,

    /// The caller broke a precondition (e.g. updating a record without an id).
    #[error("caller contract violation: {0}")]
    ContractViolation(&'static str),

    #[error("creation failed: {0}")]
    CreationFailed(#[source] Box<ClientError>),

    #[error("update failed: {0}")]
    UpdateFailed(#[source] Box<ClientError>),

    #[error("delete failed: {0}")]
    DeleteFailed(#[source] Box<ClientError>),
}

impl ClientError {
    pub fn creation(cause: ClientError) -> Self {
        ClientError::CreationFailed(Box::new(cause))
    }

    pub fn update(cause: ClientError) -> Self {
        ClientError::UpdateFailed(Box::new(cause))
    }

    pub fn delete(cause: ClientError) -> Self {
        ClientError::DeleteFailed(Box::new(cause))
    }

    /// The server-supplied message, if this error (or its cause) is a rejection.
    pub fn rejection_message(&self) -> Option<&str> {
        match self {
            ClientError::Rejected(message) => Some(message),
            ClientError::CreationFailed(cause)
            | ClientError::UpdateFailed(cause)
            | ClientError::DeleteFailed(cause) => cause.rejection_message(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Transport(format!("invalid JSON: {err}"))
    }
}
