use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    db::PgStore,
    transactions::repo_types::{NewTransaction, Transaction},
};

/// Every query is scoped by the owning user's id.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert_transaction(&self, new: NewTransaction) -> anyhow::Result<Transaction>;
    async fn find_owned_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
    ) -> anyhow::Result<Option<Transaction>>;
    /// Persists all mutable fields; `false` if the row vanished or belongs to someone else.
    async fn update_transaction(&self, tx: &Transaction) -> anyhow::Result<bool>;
    async fn delete_owned_transaction(&self, user_id: i64, transaction_id: i64)
        -> anyhow::Result<bool>;
    async fn list_transactions(&self, user_id: i64) -> anyhow::Result<Vec<Transaction>>;
    /// Σ income − Σ expense straight from the rows.
    async fn sum_balance(&self, user_id: i64) -> anyhow::Result<Decimal>;
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn insert_transaction(&self, new: NewTransaction) -> anyhow::Result<Transaction> {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (user_id, description, amount, kind, transaction_date, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, description, amount, kind, transaction_date, created_at
            "#,
        )
        .bind(new.user_id)
        .bind(&new.description)
        .bind(new.amount)
        .bind(new.kind)
        .bind(new.transaction_date)
        .bind(new.created_at)
        .fetch_one(&self.db)
        .await
        .context("insert transaction")?;
        Ok(row)
    }

    async fn find_owned_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
    ) -> anyhow::Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, description, amount, kind, transaction_date, created_at
            FROM transactions
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(transaction_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("find transaction")?;
        Ok(row)
    }

    async fn update_transaction(&self, tx: &Transaction) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE transactions
               SET description = $3, amount = $4, kind = $5, transaction_date = $6
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(tx.id)
        .bind(tx.user_id)
        .bind(&tx.description)
        .bind(tx.amount)
        .bind(tx.kind)
        .bind(tx.transaction_date)
        .execute(&self.db)
        .await
        .context("update transaction")?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_owned_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            DELETE FROM transactions
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(transaction_id)
        .bind(user_id)
        .execute(&self.db)
        .await
        .context("delete transaction")?;
        Ok(res.rows_affected() == 1)
    }

    async fn list_transactions(&self, user_id: i64) -> anyhow::Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, description, amount, kind, transaction_date, created_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY transaction_date DESC, created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list transactions")?;
        Ok(rows)
    }

    async fn sum_balance(&self, user_id: i64) -> anyhow::Result<Decimal> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(CASE WHEN kind = 'income' THEN amount ELSE -amount END), 0)
            FROM transactions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .context("sum balance")?;
        Ok(balance)
    }
}
