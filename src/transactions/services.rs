use rust_decimal::Decimal;
use time::{OffsetDateTime, UtcOffset};
use tracing::{info, instrument, warn};

use crate::{
    error::{check_len, AppError, AppResult},
    state::AppState,
    transactions::{
        dto::{Recomputed, TransactionRequest, TransactionSummary},
        repo_types::{NewTransaction, Transaction, TransactionKind},
    },
};

/// NUMERIC(18,2) leaves 16 integer digits.
fn max_amount() -> Decimal {
    Decimal::from(10_000_000_000_000_000_i64)
}

struct Entry {
    description: String,
    amount: Decimal,
    transaction_date: OffsetDateTime,
}

fn parse_kind(text: &str) -> AppResult<TransactionKind> {
    text.parse()
        .map_err(|_| AppError::InvalidKind(text.trim().to_string()))
}

fn validate_amount(amount: Decimal) -> AppResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation("amount must be positive"));
    }
    let mut amount = amount.normalize();
    if amount.scale() > 2 {
        return Err(AppError::validation(
            "amount supports at most 2 decimal places",
        ));
    }
    if amount >= max_amount() {
        return Err(AppError::validation("amount is too large"));
    }
    amount.rescale(2);
    Ok(amount)
}

fn validate_entry(req: &TransactionRequest) -> AppResult<Entry> {
    let description = req.description.trim().to_string();
    check_len("description", &description, 3, 255)?;
    Ok(Entry {
        description,
        amount: validate_amount(req.amount)?,
        transaction_date: req.transaction_date.to_offset(UtcOffset::UTC),
    })
}

#[instrument(skip(st, req))]
pub async fn add_transaction(
    st: &AppState,
    user_id: i64,
    req: TransactionRequest,
) -> AppResult<Recomputed<TransactionSummary>> {
    let kind = parse_kind(&req.kind)?;
    let entry = validate_entry(&req)?;

    let row = st
        .transactions
        .insert_transaction(NewTransaction {
            user_id,
            description: entry.description,
            amount: entry.amount,
            kind,
            transaction_date: entry.transaction_date,
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;
    info!(user_id, transaction_id = row.id, "transaction added");

    let balance = recompute_after_mutation(st, user_id).await;
    Ok(Recomputed {
        value: row.into(),
        balance,
    })
}

/// Overwrites every mutable field of a transaction owned by `user_id`.
#[instrument(skip(st, req))]
pub async fn update_transaction(
    st: &AppState,
    user_id: i64,
    transaction_id: i64,
    req: TransactionRequest,
) -> AppResult<Recomputed<TransactionSummary>> {
    let entry = validate_entry(&req)?;

    let mut row = st
        .transactions
        .find_owned_transaction(user_id, transaction_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let kind = parse_kind(&req.kind)?;

    row.description = entry.description;
    row.amount = entry.amount;
    row.kind = kind;
    row.transaction_date = entry.transaction_date;

    if !st.transactions.update_transaction(&row).await? {
        return Err(AppError::NotFound);
    }
    info!(user_id, transaction_id, "transaction updated");

    let balance = recompute_after_mutation(st, user_id).await;
    Ok(Recomputed {
        value: row.into(),
        balance,
    })
}

#[instrument(skip(st))]
pub async fn delete_transaction(
    st: &AppState,
    user_id: i64,
    transaction_id: i64,
) -> AppResult<Recomputed<()>> {
    let row = st
        .transactions
        .find_owned_transaction(user_id, transaction_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !st
        .transactions
        .delete_owned_transaction(row.user_id, row.id)
        .await?
    {
        return Err(AppError::NotFound);
    }
    info!(user_id, transaction_id, "transaction removed");

    let balance = recompute_after_mutation(st, user_id).await;
    Ok(Recomputed { value: (), balance })
}

/// Newest first: transaction date, then creation time, then id.
pub async fn list_transactions(st: &AppState, user_id: i64) -> AppResult<Vec<Transaction>> {
    Ok(st.transactions.list_transactions(user_id).await?)
}

/// Σ income − Σ expense from the persisted rows. Never reads the cached field.
pub async fn compute_balance(st: &AppState, user_id: i64) -> AppResult<Decimal> {
    Ok(st.transactions.sum_balance(user_id).await?)
}

/// Recomputes the balance from scratch and stores it on the user row.
pub async fn refresh_balance(st: &AppState, user_id: i64) -> AppResult<Decimal> {
    let balance = compute_balance(st, user_id).await?;
    if !st.users.set_balance(user_id, balance).await? {
        return Err(AppError::NotFound);
    }
    Ok(balance)
}

/// The mutation has already committed, so a failure here only leaves the
/// cached balance stale until the next successful refresh.
async fn recompute_after_mutation(st: &AppState, user_id: i64) -> Option<Decimal> {
    match refresh_balance(st, user_id).await {
        Ok(balance) => Some(balance),
        Err(e) => {
            warn!(user_id, error = %e, "balance recompute failed; cached balance is stale");
            None
        }
    }
}
