//! Explicit transactions
//!
//! Statements that take a [`TransactionConnection`] can only run inside a
//! transaction, which is what makes their `FOR UPDATE` reads meaningful.

use sqlx::{mysql::MySqlConnection, MySql, Transaction};
use tracing::debug;

use tv_core::errors::StorageError;

use super::executor::map_query_error;

/// A connection with an open transaction.
///
/// Dropping it without [`commit`](Self::commit) rolls the transaction back.
pub struct TransactionConnection {
    tx: Option<Transaction<'static, MySql>>,
}

impl TransactionConnection {
    pub(crate) fn new(tx: Transaction<'static, MySql>) -> Self {
        Self { tx: Some(tx) }
    }

    /// The underlying connection, for [`execute_on`](super::executor::execute_on)
    /// and [`update_on`](super::executor::update_on).
    pub fn connection(&mut self) -> Result<&mut MySqlConnection, StorageError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| StorageError::illegal_usage("Transaction is already finished"))
    }

    pub fn is_active(&self) -> bool {
        self.tx.is_some()
    }

    pub async fn commit(&mut self) -> Result<(), StorageError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StorageError::illegal_usage("Transaction is already finished"))?;
        tx.commit().await.map_err(map_query_error)
    }

    pub async fn rollback(&mut self) -> Result<(), StorageError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StorageError::illegal_usage("Transaction is already finished"))?;
        tx.rollback().await.map_err(map_query_error)
    }
}

impl Drop for TransactionConnection {
    fn drop(&mut self) {
        // sqlx issues the rollback when the connection goes back to the pool
        if self.tx.is_some() {
            debug!("Rolling back uncommitted transaction");
        }
    }
}
