//! Unit tests for storage error types

use crate::errors::{QueryErrorKind, StorageError, TotpError, UserRolesError};

#[test]
fn test_transaction_logic_wraps_query_failures_only() {
    let wrapped = StorageError::transaction_logic(StorageError::query(
        QueryErrorKind::UniqueViolation,
        "Duplicate entry 'public-user-phone' for key 'PRIMARY'",
    ));
    assert!(matches!(wrapped, StorageError::TransactionLogic { .. }));
    assert!(wrapped.is_unique_violation());

    let passed = StorageError::transaction_logic(TotpError::UnknownDevice.into());
    assert!(matches!(passed, StorageError::Totp(TotpError::UnknownDevice)));
}

#[test]
fn test_query_kind_looks_through_wrapping() {
    let error = StorageError::transaction_logic(StorageError::query(
        QueryErrorKind::ForeignKeyViolation,
        "a foreign key constraint fails",
    ));
    assert_eq!(error.query_kind(), Some(QueryErrorKind::ForeignKeyViolation));
    assert!(error.is_foreign_key_violation());
    assert!(!error.is_unique_violation());

    assert_eq!(StorageError::illegal_usage("not initialised").query_kind(), None);
}

#[test]
fn test_violates_constraint() {
    let error = StorageError::query(
        QueryErrorKind::ForeignKeyViolation,
        "Cannot add or update a child row: a foreign key constraint fails \
         (`db`.`user_roles`, CONSTRAINT `user_roles_role_fkey` FOREIGN KEY (`app_id`, `role`))",
    );
    assert!(error.violates_constraint("user_roles_role_fkey"));
    assert!(!error.violates_constraint("user_roles_tenant_id_fkey"));

    let other = StorageError::query(QueryErrorKind::Other, "user_roles_role_fkey");
    assert!(!other.violates_constraint("user_roles_role_fkey"));
}

#[test]
fn test_feature_errors_bridge() {
    let error: StorageError = UserRolesError::UnknownRole.into();
    assert_eq!(error.to_string(), "Unknown role");
}

#[test]
fn test_display_messages() {
    let error = StorageError::initialization("MySQL unreachable");
    assert_eq!(error.to_string(), "Storage initialization failed: MySQL unreachable");

    let inner = StorageError::query(QueryErrorKind::Other, "boom");
    let wrapped = StorageError::transaction_logic(inner);
    assert_eq!(wrapped.to_string(), "Transaction logic failed: Query failed: boom");
}
