//! Integration tests for the MySQL storage
//!
//! These tests require a running MySQL instance configured through the
//! `MYSQL_*` environment variables (see `DatabaseConfig::from_env`). Every
//! test works on its own table prefix and drops its tables afterwards.
//! Run with: cargo test -p tv_infra --test mysql_storage -- --ignored

use std::sync::Arc;

use uuid::Uuid;

use tv_core::domain::entities::{
    EmailVerificationTokenInfo, TotpDevice, TotpUsedCode, UserIdAndEmail,
};
use tv_core::domain::value_objects::{AppIdentifier, TenantIdentifier};
use tv_core::errors::{EmailVerificationError, StorageError, TotpError, UserRolesError};
use tv_core::repositories::{
    ActiveUsersRepository, EmailVerificationRepository, MultitenancyRepository, TotpRepository,
    UserRolesRepository,
};
use tv_infra::database::executor::count_column;
use tv_infra::{MySqlStorage, PoolManager, WaitPolicy};
use tv_shared::time::current_time_millis;
use tv_shared::DatabaseConfig;

async fn storage() -> MySqlStorage {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let prefix = format!("t{}", &Uuid::new_v4().simple().to_string()[..8]);
    let config = DatabaseConfig::from_env().with_table_names_prefix(prefix);
    let storage = MySqlStorage::with_config(Arc::new(PoolManager::new()), "integration", config);
    storage.init(WaitPolicy::NoWait).await.unwrap();
    storage
}

async fn teardown(storage: MySqlStorage) {
    let tables = storage.executor().tables().clone();
    for table in tables.creation_order().iter().rev() {
        let sql = format!("DROP TABLE IF EXISTS {}", table);
        storage.executor().update(&sql, |q| q).await.unwrap();
    }
    storage.close().await;
}

async fn count_rows(storage: &MySqlStorage, table: &str, app_id: &str) -> u64 {
    let sql = format!("SELECT COUNT(*) AS total FROM {} WHERE app_id = ?", table);
    storage
        .executor()
        .execute(&sql, |q| q.bind(app_id), |rows| count_column(&rows[0], "total"))
        .await
        .unwrap()
}

async fn app_with_tenant(
    storage: &MySqlStorage,
    app_id: &str,
    tenant_id: &str) -> (AppIdentifier, TenantIdentifier,
) {
    let app = AppIdentifier::new(app_id);
    let tenant = TenantIdentifier::new(app_id, tenant_id);
    storage.multitenancy().create_app(&app).await.unwrap();
    storage.multitenancy().create_tenant(&tenant).await.unwrap();
    (app, tenant)
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_init_is_idempotent() {
    let storage = storage().await;

    // Hold a connection so a rebuilt pool would be visible in the statistics
    let held = storage
        .executor()
        .manager()
        .acquire_connection(storage.executor().scope())
        .await
        .unwrap();
    storage.init(WaitPolicy::NoWait).await.unwrap();

    let stats = storage.statistics().await.unwrap();
    assert!(stats.connections >= 1);
    assert!(storage.health_check().await.unwrap());
    assert!(storage
        .multitenancy()
        .does_app_exist(&AppIdentifier::default())
        .await
        .unwrap());

    drop(held);
    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_init_restores_missing_index() {
    let storage = storage().await;
    let table = storage.executor().tables().user_last_active.clone();
    let index_count = "SELECT COUNT(*) AS total FROM information_schema.statistics \
                       WHERE table_schema = DATABASE() AND table_name = ? AND index_name = ?";

    // As if a previous bootstrap stopped between the table and its index
    let drop = format!("DROP INDEX user_last_active_app_id_index ON {}", table);
    storage.executor().update(&drop, |q| q).await.unwrap();

    storage.init(WaitPolicy::NoWait).await.unwrap();

    let found = storage
        .executor()
        .execute(
            index_count,
            |q| q.bind(table.as_str()).bind("user_last_active_app_id_index"),
            |rows| count_column(&rows[0], "total"),
        )
        .await
        .unwrap();
    assert!(found >= 1);

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_role_creation_is_idempotent() {
    let storage = storage().await;
    let app = AppIdentifier::default();
    let roles = storage.user_roles();

    assert!(roles.create_new_role_or_do_nothing_if_exists(&app, "admin").await.unwrap());
    assert!(!roles.create_new_role_or_do_nothing_if_exists(&app, "admin").await.unwrap());

    assert_eq!(roles.get_roles(&app).await.unwrap(), vec!["admin".to_string()]);
    let table = storage.executor().tables().roles.clone();
    assert_eq!(count_rows(&storage, &table, app.app_id()).await, 1);

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_role_for_missing_app_is_rejected() {
    let storage = storage().await;

    let err = storage
        .user_roles()
        .create_new_role_or_do_nothing_if_exists(&AppIdentifier::new("missing"), "admin")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::TenantOrAppNotFound));

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_failed_device_creation_leaves_no_user_row() {
    let storage = storage().await;
    let app = AppIdentifier::default();

    // The user row is inserted first; the device insert then fails on length
    let device = TotpDevice::new("user-1", "d".repeat(300), "secret", 30, 1);
    let err = storage.totp().create_device(&app, &device).await.unwrap_err();
    assert!(matches!(err, StorageError::TransactionLogic { .. }));

    let table = storage.executor().tables().totp_users.clone();
    assert_eq!(count_rows(&storage, &table, app.app_id()).await, 0);

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_uncommitted_transaction_is_rolled_back() {
    let storage = storage().await;
    let app = AppIdentifier::default();
    let roles = storage.user_roles().clone();

    let created = storage
        .executor()
        .start_transaction(|mut tx| async move {
            roles
                .create_new_role_or_do_nothing_if_exists_transaction(&mut tx, &app, "ghost")
                .await
        })
        .await
        .unwrap();
    assert!(created);

    assert!(!storage
        .user_roles()
        .does_role_exist(&AppIdentifier::default(), "ghost")
        .await
        .unwrap());

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_bulk_verification_returns_exact_matches() {
    let storage = storage().await;
    let app = AppIdentifier::default();
    let ev = storage.email_verification();

    for (user, email) in [("u1", "a@x.io"), ("u2", "b@x.io"), ("u2", "a@x.io"), ("u3", "c@x.io")] {
        ev.update_is_email_verified(&app, user, email, true).await.unwrap();
    }
    // Verifying twice is tolerated
    ev.update_is_email_verified(&app, "u1", "a@x.io", true).await.unwrap();

    let request = vec![
        UserIdAndEmail::new("u1", "a@x.io"),
        UserIdAndEmail::new("u2", "c@x.io"),
        UserIdAndEmail::new("u3", "c@x.io"),
        UserIdAndEmail::new("u4", "d@x.io"),
    ];
    let mut verified = ev.is_email_verified_bulk(&app, &request).await.unwrap();
    verified.sort();
    assert_eq!(verified, vec!["u1".to_string(), "u3".to_string()]);

    assert!(ev.is_email_verified_bulk(&app, &[]).await.unwrap().is_empty());

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_verify_email_using_token() {
    let storage = storage().await;
    let tenant = TenantIdentifier::default();
    let app = tenant.to_app_identifier();
    let ev = storage.email_verification();
    let expiry = current_time_millis() + 60_000;

    let token = EmailVerificationTokenInfo::new("user-1", "token-1", expiry, "a@x.io");
    ev.add_email_verification_token(&tenant, &token).await.unwrap();
    ev.add_email_verification_token(
        &tenant,
        &EmailVerificationTokenInfo::new("user-1", "token-2", expiry, "a@x.io"),
    )
    .await
    .unwrap();

    let err = ev.add_email_verification_token(&tenant, &token).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::EmailVerification(EmailVerificationError::DuplicateToken)
    ));

    let verified = ev.verify_email_using_token(&tenant, "token-1").await.unwrap();
    assert_eq!(verified, token);
    assert!(ev.is_email_verified(&app, "user-1", "a@x.io").await.unwrap());
    // Every token of the pair is consumed
    assert!(ev
        .get_all_email_verification_tokens_for_user(&tenant, "user-1", "a@x.io")
        .await
        .unwrap()
        .is_empty());

    let err = ev.verify_email_using_token(&tenant, "token-2").await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::EmailVerification(EmailVerificationError::InvalidToken)
    ));

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_expired_token_is_consumed_and_rejected() {
    let storage = storage().await;
    let tenant = TenantIdentifier::default();
    let ev = storage.email_verification();

    let expired =
        EmailVerificationTokenInfo::new("user-1", "old", current_time_millis() - 1, "a@x.io");
    ev.add_email_verification_token(&tenant, &expired).await.unwrap();

    let err = ev.verify_email_using_token(&tenant, "old").await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::EmailVerification(EmailVerificationError::InvalidToken)
    ));
    assert!(ev.get_email_verification_token_info(&tenant, "old").await.unwrap().is_none());
    assert!(!ev
        .is_email_verified(&tenant.to_app_identifier(), "user-1", "a@x.io")
        .await
        .unwrap());

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_user_id_in_use_only_while_a_token_is_pending() {
    let storage = storage().await;
    let tenant = TenantIdentifier::default();
    let app = tenant.to_app_identifier();
    let ev = storage.email_verification();

    ev.update_is_email_verified(&app, "user-1", "a@x.io", true).await.unwrap();
    assert!(!ev
        .is_user_id_being_used_for_email_verification(&app, "user-1")
        .await
        .unwrap());

    let token =
        EmailVerificationTokenInfo::new("user-1", "t1", current_time_millis() + 60_000, "b@x.io");
    ev.add_email_verification_token(&tenant, &token).await.unwrap();
    assert!(ev
        .is_user_id_being_used_for_email_verification(&app, "user-1")
        .await
        .unwrap());

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_device_lifecycle() {
    let storage = storage().await;
    let app = AppIdentifier::default();
    let totp = storage.totp();

    totp.create_device(&app, &TotpDevice::new("user-1", "phone", "s1", 30, 1)).await.unwrap();
    totp.create_device(&app, &TotpDevice::new("user-1", "laptop", "s2", 30, 1)).await.unwrap();

    let err = totp
        .create_device(&app, &TotpDevice::new("user-1", "phone", "s3", 30, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Totp(TotpError::DeviceAlreadyExists)));

    totp.mark_device_as_verified(&app, "user-1", "phone").await.unwrap();
    totp.mark_device_as_verified(&app, "user-1", "phone").await.unwrap();
    let err = totp
        .mark_device_as_verified(&app, "user-1", "tablet")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Totp(TotpError::UnknownDevice)));

    let err = totp
        .update_device_name(&app, "user-1", "laptop", "phone")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Totp(TotpError::DeviceAlreadyExists)));
    totp.update_device_name(&app, "user-1", "laptop", "desktop").await.unwrap();

    let devices = totp.get_devices(&app, "user-1").await.unwrap();
    assert_eq!(devices.len(), 2);
    assert!(devices.iter().any(|d| d.device_name == "phone" && d.verified));
    assert!(devices.iter().any(|d| d.device_name == "desktop" && !d.verified));

    totp.delete_device(&app, "user-1", "phone").await.unwrap();
    assert_eq!(storage.active_users().count_users_enabled_totp(&app).await.unwrap(), 1);

    // Deleting the last device removes the TOTP user
    totp.delete_device(&app, "user-1", "desktop").await.unwrap();
    assert_eq!(storage.active_users().count_users_enabled_totp(&app).await.unwrap(), 0);

    let err = totp.delete_device(&app, "user-1", "desktop").await.unwrap_err();
    assert!(matches!(err, StorageError::Totp(TotpError::UnknownDevice)));

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_used_code_constraints() {
    let storage = storage().await;
    let tenant = TenantIdentifier::default();
    let app = tenant.to_app_identifier();
    let totp = storage.totp();
    let now = current_time_millis();

    let code = TotpUsedCode::new("user-1", "123456", true, now + 60_000, now);
    let err = totp.insert_used_code(&tenant, &code).await.unwrap_err();
    assert!(matches!(err, StorageError::Totp(TotpError::UnknownUserId)));

    totp.create_device(&app, &TotpDevice::new("user-1", "phone", "s1", 30, 1)).await.unwrap();
    totp.insert_used_code(&tenant, &code).await.unwrap();
    totp.insert_used_code(&tenant, &TotpUsedCode::new("user-1", "654321", false, now - 1, now + 1))
        .await
        .unwrap();

    let err = totp.insert_used_code(&tenant, &code).await.unwrap_err();
    assert!(matches!(err, StorageError::Totp(TotpError::UsedCodeAlreadyExists)));

    let missing_tenant = TenantIdentifier::new(app.app_id(), "missing");
    let err = totp.insert_used_code(&missing_tenant, &code).await.unwrap_err();
    assert!(matches!(err, StorageError::TenantOrAppNotFound));

    let codes = totp.get_all_used_codes_desc_order(&tenant, "user-1").await.unwrap();
    assert_eq!(codes.len(), 2);
    assert!(codes[0].created_time_ms > codes[1].created_time_ms);

    assert_eq!(totp.remove_expired_codes(&tenant, now).await.unwrap(), 1);
    assert!(totp.remove_user(&tenant, "user-1").await.unwrap());
    assert!(totp.remove_user_from_app(&app, "user-1").await.unwrap());

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_role_assignment() {
    let storage = storage().await;
    let tenant = TenantIdentifier::default();
    let app = tenant.to_app_identifier();
    let roles = storage.user_roles();

    let err = roles.add_role_to_user(&tenant, "user-1", "admin").await.unwrap_err();
    assert!(matches!(err, StorageError::UserRoles(UserRolesError::UnknownRole)));

    let permissions = vec!["read".to_string(), "write".to_string()];
    assert!(roles
        .create_new_role_or_modify_its_permissions(&app, "admin", &permissions)
        .await
        .unwrap());
    assert!(!roles
        .create_new_role_or_modify_its_permissions(&app, "admin", &permissions)
        .await
        .unwrap());

    roles.add_role_to_user(&tenant, "user-1", "admin").await.unwrap();
    let err = roles.add_role_to_user(&tenant, "user-1", "admin").await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::UserRoles(UserRolesError::DuplicateUserRoleMapping)
    ));

    assert_eq!(roles.get_users_for_role(&tenant, "admin").await.unwrap(), vec!["user-1"]);
    assert_eq!(roles.get_roles_that_have_permission(&app, "write").await.unwrap(), vec!["admin"]);

    let only_write = vec!["write".to_string()];
    assert_eq!(
        roles.delete_permissions_for_role(&app, "admin", Some(&only_write)).await.unwrap(),
        1
    );
    assert_eq!(roles.get_permissions_for_role(&app, "admin").await.unwrap(), vec!["read"]);

    let err = roles
        .delete_permissions_for_role(&app, "nobody", None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::UserRoles(UserRolesError::UnknownRole)));

    // Role assignments cascade with the role
    assert!(roles.delete_role(&app, "admin").await.unwrap());
    assert!(roles.get_roles_for_user(&tenant, "user-1").await.unwrap().is_empty());

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_active_user_counts() {
    let storage = storage().await;
    let app = AppIdentifier::default();
    let active = storage.active_users();
    let before = current_time_millis();

    active.update_last_active(&app, "user-1").await.unwrap();
    active.update_last_active(&app, "user-2").await.unwrap();
    active.update_last_active(&app, "user-1").await.unwrap();
    storage
        .totp()
        .create_device(&app, &TotpDevice::new("user-1", "phone", "s1", 30, 1))
        .await
        .unwrap();
    storage
        .totp()
        .create_device(&app, &TotpDevice::new("user-3", "phone", "s1", 30, 1))
        .await
        .unwrap();

    assert_eq!(active.count_users_active_since(&app, before).await.unwrap(), 2);
    assert_eq!(active.count_users_enabled_totp(&app).await.unwrap(), 2);
    assert_eq!(
        active.count_users_enabled_totp_and_active_since(&app, before).await.unwrap(),
        1
    );

    let last_active = active.get_last_active_by_user_id(&app, "user-1").await.unwrap();
    assert!(last_active.unwrap() >= before);
    assert_eq!(active.get_last_active_by_user_id(&app, "nobody").await.unwrap(), None);

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_delete_user_data() {
    let storage = storage().await;
    let (app, tenant) = app_with_tenant(&storage, "acme", "eu").await;

    storage.user_roles().create_new_role_or_do_nothing_if_exists(&app, "admin").await.unwrap();
    storage.user_roles().add_role_to_user(&tenant, "user-1", "admin").await.unwrap();
    storage
        .totp()
        .create_device(&app, &TotpDevice::new("user-1", "phone", "s1", 30, 1))
        .await
        .unwrap();
    storage.active_users().update_last_active(&app, "user-1").await.unwrap();
    storage
        .email_verification()
        .update_is_email_verified(&app, "user-1", "a@x.io", true)
        .await
        .unwrap();
    storage
        .email_verification()
        .add_email_verification_token(
            &tenant,
            &EmailVerificationTokenInfo::new(
                "user-1",
                "t",
                current_time_millis() + 60_000,
                "b@x.io",
            ),
        )
        .await
        .unwrap();

    storage.delete_user_data(&app, "user-1").await.unwrap();

    assert!(!storage
        .email_verification()
        .is_user_id_being_used_for_email_verification(&app, "user-1")
        .await
        .unwrap());
    assert!(storage
        .user_roles()
        .get_roles_for_user_in_app(&app, "user-1")
        .await
        .unwrap()
        .is_empty());
    assert!(storage.totp().get_devices(&app, "user-1").await.unwrap().is_empty());
    assert_eq!(
        storage.active_users().get_last_active_by_user_id(&app, "user-1").await.unwrap(),
        None
    );
    assert!(!storage
        .email_verification()
        .is_email_verified(&app, "user-1", "a@x.io")
        .await
        .unwrap());
    // The role itself belongs to the app and survives
    assert!(storage.user_roles().does_role_exist(&app, "admin").await.unwrap());

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_app_deletion_cascades_to_every_table() {
    let storage = storage().await;
    let (app, tenant) = app_with_tenant(&storage, "acme", "eu").await;
    let now = current_time_millis();

    storage
        .user_roles()
        .create_new_role_or_modify_its_permissions(&app, "admin", &["read".to_string()])
        .await
        .unwrap();
    storage.user_roles().add_role_to_user(&tenant, "user-1", "admin").await.unwrap();
    storage
        .totp()
        .create_device(&app, &TotpDevice::new("user-1", "phone", "s1", 30, 1))
        .await
        .unwrap();
    storage
        .totp()
        .insert_used_code(&tenant, &TotpUsedCode::new("user-1", "123456", true, now + 60_000, now))
        .await
        .unwrap();
    storage.active_users().update_last_active(&app, "user-1").await.unwrap();
    storage
        .email_verification()
        .update_is_email_verified(&app, "user-1", "a@x.io", true)
        .await
        .unwrap();
    storage
        .email_verification()
        .add_email_verification_token(
            &tenant,
            &EmailVerificationTokenInfo::new("user-1", "t", now + 60_000, "b@x.io"),
        )
        .await
        .unwrap();

    let tables = storage.executor().tables().clone();
    for table in tables.creation_order() {
        assert!(count_rows(&storage, table, "acme").await > 0, "{} was not populated", table);
    }

    assert!(storage.multitenancy().delete_app(&app).await.unwrap());

    for table in tables.creation_order() {
        assert_eq!(count_rows(&storage, table, "acme").await, 0, "orphans left in {}", table);
    }
    // The default app is untouched
    assert!(storage
        .multitenancy()
        .does_app_exist(&AppIdentifier::default())
        .await
        .unwrap());

    teardown(storage).await;
}

#[tokio::test]
#[ignore] // Requires actual database
async fn test_tenant_for_missing_app_is_rejected() {
    let storage = storage().await;

    let err = storage
        .multitenancy()
        .create_tenant(&TenantIdentifier::new("missing", "eu"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::TenantOrAppNotFound));

    let (_, tenant) = app_with_tenant(&storage, "acme", "eu").await;
    assert!(!storage.multitenancy().create_tenant(&tenant).await.unwrap());
    assert!(storage.multitenancy().delete_tenant(&tenant).await.unwrap());
    assert!(!storage.multitenancy().delete_tenant(&tenant).await.unwrap());

    teardown(storage).await;
}
