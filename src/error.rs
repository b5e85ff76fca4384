/// Errors reported by the backend document store boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Network or backend failure on a subscription or command.
    Transport(String),
    /// The backend reported that the referenced document does not exist.
    NotFound(String),
    /// Anonymous identity provisioning failed.
    Identity(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Transport(msg) => write!(f, "Transport error: {msg}"),
            StoreError::NotFound(msg) => write!(f, "Not found: {msg}"),
            StoreError::Identity(msg) => write!(f, "Identity error: {msg}"),
        }
    }
}

/// Errors returned by the write path. Validation failures are resolved
/// locally and never reach the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitError {
    Validation(String),
    IdentityNotReady,
    Store(StoreError),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Validation(msg) => write!(f, "Validation failed: {msg}"),
            SubmitError::IdentityNotReady => {
                write!(f, "Session identity is not ready; writes are disabled")
            }
            SubmitError::Store(err) => write!(f, "Store error: {err}"),
        }
    }
}

impl From<StoreError> for SubmitError {
    fn from(err: StoreError) -> Self {
        SubmitError::Store(err)
    }
}
