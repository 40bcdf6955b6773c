use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdempotencyError {
    #[error("idempotency key '{0}' was reused with a different request body")]
    KeyReused(String),

    #[error("no pending claim found to complete for key '{0}'")]
    NoPendingClaim(String),
}
