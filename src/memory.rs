//! In-memory stores backing `AppState::fake()` in tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::{
    auth::{
        repo::{SessionStore, UserStore},
        repo_types::{NewSession, NewUser, User, UserSession},
    },
    transactions::{
        repo::TransactionStore,
        repo_types::{NewTransaction, Transaction, TransactionKind},
    },
};

/// Σ income − Σ expense over the given rows.
fn fold_balance<'a, I>(rows: I) -> Decimal
where
    I: IntoIterator<Item = &'a Transaction>,
{
    rows.into_iter().fold(Decimal::ZERO, |acc, t| match t.kind {
        TransactionKind::Income => acc + t.amount,
        TransactionKind::Expense => acc - t.amount,
    })
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    sessions: Vec<UserSession>,
    transactions: Vec<Transaction>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_balance_writes: AtomicBool,
}

impl MemoryStore {
    /// Makes every subsequent `set_balance` fail, simulating a storage fault.
    pub fn fail_balance_writes(&self, fail: bool) {
        self.fail_balance_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn deactivate(&self, user_id: i64) {
        let mut t = self.tables.write().await;
        if let Some(u) = t.users.iter_mut().find(|u| u.id == user_id) {
            u.is_active = false;
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_active_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users
            .iter()
            .find(|u| u.email == email && u.is_active)
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: i64) -> anyhow::Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn create_user(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.email == new.email) {
            return Ok(None);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: t.next_id(),
            email: new.email,
            password_hash: new.password_hash,
            full_name: new.full_name,
            balance: Decimal::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        t.users.push(user.clone());
        Ok(Some(user))
    }

    async fn set_balance(&self, user_id: i64, balance: Decimal) -> anyhow::Result<bool> {
        if self.fail_balance_writes.load(Ordering::SeqCst) {
            anyhow::bail!("simulated balance write failure");
        }
        // users.balance is NUMERIC(28,2): 26 integer digits.
        if balance.abs() >= Decimal::from_i128_with_scale(10_i128.pow(26), 0) {
            anyhow::bail!("numeric field overflow");
        }
        let mut t = self.tables.write().await;
        match t.users.iter_mut().find(|u| u.id == user_id) {
            Some(u) => {
                u.balance = balance;
                u.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, new: NewSession) -> anyhow::Result<UserSession> {
        let mut t = self.tables.write().await;
        if t.sessions.iter().any(|s| s.token == new.token) {
            anyhow::bail!("duplicate session token");
        }
        let session = UserSession {
            id: t.next_id(),
            user_id: new.user_id,
            token: new.token,
            created_at: OffsetDateTime::now_utc(),
            expires_at: new.expires_at,
            is_valid: true,
        };
        t.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_session(&self, user_id: i64, token: &str) -> anyhow::Result<Option<UserSession>> {
        let t = self.tables.read().await;
        Ok(t.sessions
            .iter()
            .find(|s| s.user_id == user_id && s.token == token)
            .cloned())
    }

    async fn find_session_by_token(&self, token: &str) -> anyhow::Result<Option<UserSession>> {
        let t = self.tables.read().await;
        Ok(t.sessions.iter().find(|s| s.token == token).cloned())
    }

    async fn update_session(&self, session: &UserSession) -> anyhow::Result<()> {
        let mut t = self.tables.write().await;
        if let Some(s) = t
            .sessions
            .iter_mut()
            .find(|s| s.id == session.id && s.user_id == session.user_id)
        {
            s.is_valid = session.is_valid;
            s.expires_at = session.expires_at;
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_transaction(&self, new: NewTransaction) -> anyhow::Result<Transaction> {
        let mut t = self.tables.write().await;
        let row = Transaction {
            id: t.next_id(),
            user_id: new.user_id,
            description: new.description,
            amount: new.amount,
            kind: new.kind,
            transaction_date: new.transaction_date,
            created_at: new.created_at,
        };
        t.transactions.push(row.clone());
        Ok(row)
    }

    async fn find_owned_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
    ) -> anyhow::Result<Option<Transaction>> {
        let t = self.tables.read().await;
        Ok(t.transactions
            .iter()
            .find(|x| x.id == transaction_id && x.user_id == user_id)
            .cloned())
    }

    async fn update_transaction(&self, tx: &Transaction) -> anyhow::Result<bool> {
        let mut t = self.tables.write().await;
        match t
            .transactions
            .iter_mut()
            .find(|x| x.id == tx.id && x.user_id == tx.user_id)
        {
            Some(row) => {
                row.description = tx.description.clone();
                row.amount = tx.amount;
                row.kind = tx.kind;
                row.transaction_date = tx.transaction_date;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_owned_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
    ) -> anyhow::Result<bool> {
        let mut t = self.tables.write().await;
        let before = t.transactions.len();
        t.transactions
            .retain(|x| !(x.id == transaction_id && x.user_id == user_id));
        Ok(t.transactions.len() < before)
    }

    async fn list_transactions(&self, user_id: i64) -> anyhow::Result<Vec<Transaction>> {
        let t = self.tables.read().await;
        let mut rows: Vec<Transaction> = t
            .transactions
            .iter()
            .filter(|x| x.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (b.transaction_date, b.created_at, b.id).cmp(&(a.transaction_date, a.created_at, a.id))
        });
        Ok(rows)
    }

    async fn sum_balance(&self, user_id: i64) -> anyhow::Result<Decimal> {
        let t = self.tables.read().await;
        Ok(fold_balance(t.transactions.iter().filter(|x| x.user_id == user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(user_id: i64, cents: i64, kind: TransactionKind) -> Transaction {
        let now = OffsetDateTime::now_utc();
        Transaction {
            id: 1,
            user_id,
            description: "entry".into(),
            amount: Decimal::new(cents, 2),
            kind,
            transaction_date: now,
            created_at: now,
        }
    }

    #[test]
    fn fold_subtracts_expenses() {
        let rows = vec![
            tx(1, 100_000, TransactionKind::Income),
            tx(1, 40_000, TransactionKind::Expense),
            tx(1, 1_050, TransactionKind::Expense),
        ];
        assert_eq!(fold_balance(&rows), Decimal::new(58_950, 2));
        assert_eq!(fold_balance(&Vec::<Transaction>::new()), Decimal::ZERO);
    }

    #[tokio::test]
    async fn balance_outside_numeric_28_2_is_rejected() {
        let store = MemoryStore::default();
        let user = store
            .create_user(NewUser {
                email: "a@x.com".into(),
                password_hash: "h".into(),
                full_name: "Alice".into(),
            })
            .await
            .unwrap()
            .unwrap();
        let limit = Decimal::from_i128_with_scale(10_i128.pow(26), 0);
        assert!(store.set_balance(user.id, limit - Decimal::new(1, 2)).await.unwrap());
        assert!(store.set_balance(user.id, limit).await.is_err());
        assert!(store.set_balance(user.id, -limit).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_email_yields_none() {
        let store = MemoryStore::default();
        let new = || NewUser {
            email: "a@x.com".into(),
            password_hash: "h".into(),
            full_name: "Alice".into(),
        };
        assert!(store.create_user(new()).await.unwrap().is_some());
        assert!(store.create_user(new()).await.unwrap().is_none());
    }
}
