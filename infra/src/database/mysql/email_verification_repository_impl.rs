//! MySQL implementation of the EmailVerificationRepository trait.
//!
//! Tokens are tenant scoped; verified (user, email) pairs are app scoped.
//! Methods suffixed `_transaction` run on a caller's open transaction and are
//! composed by [`verify_email_using_token`] and by cascading user deletion.
//!
//! [`verify_email_using_token`]: EmailVerificationRepository::verify_email_using_token

use async_trait::async_trait;
use sqlx::mysql::MySqlRow;
use std::collections::HashMap;

use tv_core::domain::entities::{EmailVerificationTokenInfo, UserIdAndEmail};
use tv_core::domain::value_objects::{AppIdentifier, TenantIdentifier};
use tv_core::errors::{EmailVerificationError, StorageError};
use tv_core::repositories::EmailVerificationRepository;
use tv_shared::sql::placeholders;
use tv_shared::time::current_time_millis;

use crate::database::executor::{
    column, execute_on, millis_column, update_on, MySqlQuery, QueryExecutor,
};
use crate::database::transaction::TransactionConnection;

/// MySQL implementation of EmailVerificationRepository
#[derive(Clone)]
pub struct MySqlEmailVerificationRepository {
    executor: QueryExecutor,
}

impl MySqlEmailVerificationRepository {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    fn row_to_token_info(row: &MySqlRow) -> Result<EmailVerificationTokenInfo, StorageError> {
        Ok(EmailVerificationTokenInfo {
            user_id: column(row, "user_id")?,
            token: column(row, "token")?,
            token_expiry: millis_column(row, "token_expiry")?,
            email: column(row, "email")?,
        })
    }

    /// Statement that marks a (user, email) pair verified or unverified
    fn verified_sql(&self, verified: bool) -> String {
        let table = &self.executor.tables().email_verification;
        if verified {
            format!("INSERT INTO {} (app_id, user_id, email) VALUES (?, ?, ?)", table)
        } else {
            format!("DELETE FROM {} WHERE app_id = ? AND user_id = ? AND email = ?", table)
        }
    }

    fn bulk_verified_sql(&self, count: usize) -> String {
        format!(
            "SELECT user_id, email FROM {} WHERE app_id = ? AND user_id IN ({}) AND email IN ({})",
            self.executor.tables().email_verification,
            placeholders(count),
            placeholders(count)
        )
    }

    /// Marking an already verified pair verified again is a no-op.
    fn verified_insert_outcome(result: Result<u64, StorageError>) -> Result<(), StorageError> {
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_unique_violation() => Ok(()),
            Err(e) if e.is_foreign_key_violation() => Err(StorageError::TenantOrAppNotFound),
            Err(e) => Err(e),
        }
    }

    /// Lock and return every token of the (user, email) pair in the tenant.
    pub async fn get_all_email_verification_tokens_for_user_transaction(
        &self,
        tx: &mut TransactionConnection,
        tenant: &TenantIdentifier,
        user_id: &str,
        email: &str,
    ) -> Result<Vec<EmailVerificationTokenInfo>, StorageError> {
        let sql = format!(
            "SELECT user_id, token, token_expiry, email FROM {} \
             WHERE app_id = ? AND tenant_id = ? AND user_id = ? AND email = ? FOR UPDATE",
            self.executor.tables().email_verification_tokens
        );

        execute_on(
            tx.connection()?,
            &sql,
            |q| {
                q.bind(tenant.app_id())
                    .bind(tenant.tenant_id())
                    .bind(user_id)
                    .bind(email)
            },
            |rows| rows.iter().map(Self::row_to_token_info).collect(),
        )
        .await
    }

    pub async fn delete_all_email_verification_tokens_for_user_transaction(
        &self,
        tx: &mut TransactionConnection,
        tenant: &TenantIdentifier,
        user_id: &str,
        email: &str,
    ) -> Result<u64, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND tenant_id = ? AND user_id = ? AND email = ?",
            self.executor.tables().email_verification_tokens
        );

        update_on(tx.connection()?, &sql, |q| {
            q.bind(tenant.app_id())
                .bind(tenant.tenant_id())
                .bind(user_id)
                .bind(email)
        })
        .await
    }

    pub async fn update_is_email_verified_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        user_id: &str,
        email: &str,
        verified: bool,
    ) -> Result<(), StorageError> {
        let sql = self.verified_sql(verified);
        let result = update_on(tx.connection()?, &sql, |q| {
            q.bind(app.app_id()).bind(user_id).bind(email)
        })
        .await;

        if verified {
            Self::verified_insert_outcome(result)
        } else {
            result.map(|_| ())
        }
    }

    pub async fn is_email_verified_bulk_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        users: &[UserIdAndEmail],
    ) -> Result<Vec<String>, StorageError> {
        if users.is_empty() {
            return Ok(Vec::new());
        }
        let expected = expected_emails(users)?;
        let sql = self.bulk_verified_sql(users.len());

        execute_on(
            tx.connection()?,
            &sql,
            |q| bind_bulk(q, app, users),
            |rows| verified_user_ids(&expected, &rows),
        )
        .await
    }

    /// Remove every token and verified email of the user across the app.
    pub async fn delete_email_verification_user_info_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<u64, StorageError> {
        let tables = self.executor.tables();
        let mut deleted = 0;

        for table in [&tables.email_verification, &tables.email_verification_tokens] {
            let sql = format!("DELETE FROM {} WHERE app_id = ? AND user_id = ?", table);
            deleted += update_on(tx.connection()?, &sql, |q| q.bind(app.app_id()).bind(user_id))
                .await?;
        }
        Ok(deleted)
    }
}

/// Map each requested user id to its requested email, rejecting repeats.
fn expected_emails(users: &[UserIdAndEmail]) -> Result<HashMap<&str, &str>, StorageError> {
    let mut expected = HashMap::with_capacity(users.len());
    for user in users {
        if expected
            .insert(user.user_id.as_str(), user.email.as_str())
            .is_some()
        {
            return Err(StorageError::illegal_usage(format!(
                "User id '{}' appears more than once in a bulk verification check",
                user.user_id
            )));
        }
    }
    Ok(expected)
}

fn bind_bulk<'q>(
    query: MySqlQuery<'q>,
    app: &'q AppIdentifier,
    users: &'q [UserIdAndEmail],
) -> MySqlQuery<'q> {
    let query = users
        .iter()
        .fold(query.bind(app.app_id()), |q, user| q.bind(user.user_id.as_str()));
    users
        .iter()
        .fold(query, |q, user| q.bind(user.email.as_str()))
}

fn verified_user_ids(
    expected: &HashMap<&str, &str>,
    rows: &[MySqlRow],
) -> Result<Vec<String>, StorageError> {
    let pairs = rows
        .iter()
        .map(|row| Ok((column(row, "user_id")?, column(row, "email")?)))
        .collect::<Result<Vec<(String, String)>, StorageError>>()?;
    Ok(matching_user_ids(expected, pairs))
}

/// The `IN` lists match the cross product of ids and emails, so a row only
/// counts when its email is the one requested for its user id.
pub(crate) fn matching_user_ids<I>(expected: &HashMap<&str, &str>, rows: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    rows.into_iter()
        .filter(|(user_id, email)| expected.get(user_id.as_str()) == Some(&email.as_str()))
        .map(|(user_id, _)| user_id)
        .collect()
}

#[async_trait]
impl EmailVerificationRepository for MySqlEmailVerificationRepository {
    async fn add_email_verification_token(
        &self,
        tenant: &TenantIdentifier,
        info: &EmailVerificationTokenInfo,
    ) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO {} (app_id, tenant_id, user_id, token, token_expiry, email) \
             VALUES (?, ?, ?, ?, ?, ?)",
            self.executor.tables().email_verification_tokens
        );

        self.executor
            .update(&sql, |q| {
                q.bind(tenant.app_id())
                    .bind(tenant.tenant_id())
                    .bind(info.user_id.as_str())
                    .bind(info.token.as_str())
                    .bind(info.token_expiry)
                    .bind(info.email.as_str())
            })
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    EmailVerificationError::DuplicateToken.into()
                } else if e.is_foreign_key_violation() {
                    StorageError::TenantOrAppNotFound
                } else {
                    e
                }
            })?;
        Ok(())
    }

    async fn get_email_verification_token_info(
        &self,
        tenant: &TenantIdentifier,
        token: &str,
    ) -> Result<Option<EmailVerificationTokenInfo>, StorageError> {
        let sql = format!(
            "SELECT user_id, token, token_expiry, email FROM {} \
             WHERE app_id = ? AND tenant_id = ? AND token = ?",
            self.executor.tables().email_verification_tokens
        );

        self.executor
            .execute(
                &sql,
                |q| q.bind(tenant.app_id()).bind(tenant.tenant_id()).bind(token),
                |rows| rows.first().map(Self::row_to_token_info).transpose(),
            )
            .await
    }

    async fn get_all_email_verification_tokens_for_user(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
        email: &str,
    ) -> Result<Vec<EmailVerificationTokenInfo>, StorageError> {
        let sql = format!(
            "SELECT user_id, token, token_expiry, email FROM {} \
             WHERE app_id = ? AND tenant_id = ? AND user_id = ? AND email = ?",
            self.executor.tables().email_verification_tokens
        );

        self.executor
            .execute(
                &sql,
                |q| {
                    q.bind(tenant.app_id())
                        .bind(tenant.tenant_id())
                        .bind(user_id)
                        .bind(email)
                },
                |rows| rows.iter().map(Self::row_to_token_info).collect(),
            )
            .await
    }

    async fn revoke_all_tokens(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
        email: &str,
    ) -> Result<(), StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND tenant_id = ? AND user_id = ? AND email = ?",
            self.executor.tables().email_verification_tokens
        );

        self.executor
            .update(&sql, |q| {
                q.bind(tenant.app_id())
                    .bind(tenant.tenant_id())
                    .bind(user_id)
                    .bind(email)
            })
            .await?;
        Ok(())
    }

    async fn verify_email_using_token(
        &self,
        tenant: &TenantIdentifier,
        token: &str,
    ) -> Result<EmailVerificationTokenInfo, StorageError> {
        let info = self
            .get_email_verification_token_info(tenant, token)
            .await?
            .ok_or(EmailVerificationError::InvalidToken)?;
        let app = tenant.to_app_identifier();
        let now = current_time_millis();

        self.executor
            .start_transaction(|mut tx| async move {
                let tokens = self
                    .get_all_email_verification_tokens_for_user_transaction(
                        &mut tx,
                        tenant,
                        &info.user_id,
                        &info.email,
                    )
                    .await?;

                // Another caller may have consumed the token since the lookup
                let matched = tokens
                    .into_iter()
                    .find(|t| t.token == token)
                    .ok_or(EmailVerificationError::InvalidToken)?;

                self.delete_all_email_verification_tokens_for_user_transaction(
                    &mut tx,
                    tenant,
                    &matched.user_id,
                    &matched.email,
                )
                .await?;

                if matched.is_expired_at(now) {
                    tx.commit().await?;
                    return Err(EmailVerificationError::InvalidToken.into());
                }

                self.update_is_email_verified_transaction(
                    &mut tx,
                    &app,
                    &matched.user_id,
                    &matched.email,
                    true,
                )
                .await?;
                tx.commit().await?;
                Ok(matched)
            })
            .await
    }

    async fn update_is_email_verified(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        email: &str,
        verified: bool,
    ) -> Result<(), StorageError> {
        let sql = self.verified_sql(verified);
        let result = self
            .executor
            .update(&sql, |q| q.bind(app.app_id()).bind(user_id).bind(email))
            .await;

        if verified {
            Self::verified_insert_outcome(result)
        } else {
            result.map(|_| ())
        }
    }

    async fn is_email_verified(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        email: &str,
    ) -> Result<bool, StorageError> {
        let sql = format!(
            "SELECT user_id FROM {} WHERE app_id = ? AND user_id = ? AND email = ?",
            self.executor.tables().email_verification
        );

        self.executor
            .execute(
                &sql,
                |q| q.bind(app.app_id()).bind(user_id).bind(email),
                |rows| Ok(!rows.is_empty()),
            )
            .await
    }

    async fn is_email_verified_bulk(
        &self,
        app: &AppIdentifier,
        users: &[UserIdAndEmail],
    ) -> Result<Vec<String>, StorageError> {
        if users.is_empty() {
            return Ok(Vec::new());
        }
        let expected = expected_emails(users)?;
        let sql = self.bulk_verified_sql(users.len());

        self.executor
            .execute(
                &sql,
                |q| bind_bulk(q, app, users),
                |rows| verified_user_ids(&expected, &rows),
            )
            .await
    }

    async fn unverify_email(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        email: &str,
    ) -> Result<(), StorageError> {
        self.update_is_email_verified(app, user_id, email, false)
            .await
    }

    async fn delete_expired_email_verification_tokens(&self) -> Result<u64, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE token_expiry < ?",
            self.executor.tables().email_verification_tokens
        );

        let deleted = self
            .executor
            .update(&sql, |q| q.bind(current_time_millis()))
            .await?;
        if deleted > 0 {
            tracing::debug!(deleted, "Removed expired email verification tokens");
        }
        Ok(deleted)
    }

    async fn delete_email_verification_user_info(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
    ) -> Result<bool, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND tenant_id = ? AND user_id = ?",
            self.executor.tables().email_verification_tokens
        );

        let deleted = self
            .executor
            .update(&sql, |q| {
                q.bind(tenant.app_id())
                    .bind(tenant.tenant_id())
                    .bind(user_id)
            })
            .await?;
        Ok(deleted > 0)
    }

    async fn is_user_id_being_used_for_email_verification(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<bool, StorageError> {
        let sql = format!(
            "SELECT user_id FROM {} WHERE app_id = ? AND user_id = ? LIMIT 1",
            self.executor.tables().email_verification_tokens
        );

        self.executor
            .execute(
                &sql,
                |q| q.bind(app.app_id()).bind(user_id),
                |rows| Ok(!rows.is_empty()),
            )
            .await
    }
}
