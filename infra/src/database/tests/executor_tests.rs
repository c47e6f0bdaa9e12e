//! Unit tests for query error mapping

use tv_core::errors::{QueryErrorKind, StorageError};

use crate::database::executor::map_query_error;

#[test]
fn test_non_database_errors_map_to_other() {
    let err = map_query_error(sqlx::Error::RowNotFound);
    assert_eq!(err.query_kind(), Some(QueryErrorKind::Other));

    let err = map_query_error(sqlx::Error::PoolTimedOut);
    assert_eq!(err.query_kind(), Some(QueryErrorKind::Other));
}

#[test]
fn test_mapped_errors_are_wrapped_by_transactions() {
    let err = StorageError::transaction_logic(map_query_error(sqlx::Error::PoolClosed));

    assert!(matches!(err, StorageError::TransactionLogic { .. }));
    assert_eq!(err.query_kind(), Some(QueryErrorKind::Other));
}
