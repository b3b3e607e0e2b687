//! Scoped transactions. A [`Transaction`] that is dropped without being finished (early
//! return, cancelled future, panic) is rolled back by `sqlx`, so a caller never observes a
//! dangling transaction.

use crate::error::{Result, ResultExt};
use sqlx::{Sqlite, SqlitePool};

pub(crate) type Transaction = sqlx::Transaction<'static, Sqlite>;

pub(crate) async fn begin(pool: &SqlitePool) -> Result<Transaction> {
    pool.begin().await.context("error beginning transaction")
}

/// Commits when `result` is `Ok`; otherwise rolls back and returns the original error.
/// A failed rollback is only logged so that it cannot shadow the error that caused it.
pub(crate) async fn finish<T>(tx: Transaction, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await.context("error committing transaction")?;
            Ok(value)
        }
        Err(err) => {
            log::warn!("rolling back transaction: {err}");
            if let Err(rollback) = tx.rollback().await {
                log::error!("error rolling back transaction: {rollback}");
            }
            Err(err)
        }
    }
}
