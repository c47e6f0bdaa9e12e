//! Storage error taxonomy.

mod types;

pub use types::{EmailVerificationError, QueryErrorKind, TotpError, UserRolesError};

use thiserror::Error;

/// Errors surfaced by the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// The engine stayed unreachable past the retry deadline, or setup hit a
    /// non-retryable error
    #[error("Storage initialization failed: {message}")]
    Initialization { message: String },

    /// Constraint violation or SQL runtime/syntax error
    #[error("Query failed: {message}")]
    Query { kind: QueryErrorKind, message: String },

    /// A transaction body failed; wraps the cause
    #[error("Transaction logic failed: {source}")]
    TransactionLogic { source: Box<StorageError> },

    /// The harness was used before its scope was initialized
    #[error("Illegal usage: {message}")]
    IllegalUsage { message: String },

    #[error("Tenant or app not found")]
    TenantOrAppNotFound,

    // Bridge to feature specific outcomes
    #[error(transparent)]
    EmailVerification(#[from] EmailVerificationError),

    #[error(transparent)]
    Totp(#[from] TotpError),

    #[error(transparent)]
    UserRoles(#[from] UserRolesError),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization {
            message: message.into(),
        }
    }

    pub fn query(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self::Query {
            kind,
            message: message.into(),
        }
    }

    pub fn illegal_usage(message: impl Into<String>) -> Self {
        Self::IllegalUsage {
            message: message.into(),
        }
    }

    /// Wraps a query failure raised inside a transaction body. Anything else
    /// is already meaningful to the caller and passes through.
    pub fn transaction_logic(cause: StorageError) -> Self {
        match cause {
            Self::Query { .. } => Self::TransactionLogic {
                source: Box::new(cause),
            },
            other => other,
        }
    }

    /// Kind of the underlying query failure, looking through transaction wrapping
    pub fn query_kind(&self) -> Option<QueryErrorKind> {
        match self {
            Self::Query { kind, .. } => Some(*kind),
            Self::TransactionLogic { source } => source.query_kind(),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.query_kind() == Some(QueryErrorKind::UniqueViolation)
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        self.query_kind() == Some(QueryErrorKind::ForeignKeyViolation)
    }

    /// Whether this is a constraint violation naming `constraint`.
    ///
    /// The MySQL driver does not expose the violated constraint separately, so
    /// the server's diagnostic is searched for the schema-assigned name.
    pub fn violates_constraint(&self, constraint: &str) -> bool {
        match self {
            Self::Query { kind, message } => {
                *kind != QueryErrorKind::Other && message.contains(constraint)
            }
            Self::TransactionLogic { source } => source.violates_constraint(constraint),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests;
