use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::transactions::repo_types::{Transaction, TransactionKind};

/// Body for create and update; `kind` is parsed case-insensitively by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRequest {
    pub description: String,
    pub amount: Decimal,
    #[serde(alias = "type")]
    pub kind: String,
    #[serde(with = "time::serde::rfc3339")]
    pub transaction_date: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionSummary {
    pub id: i64,
    pub user_id: i64,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    #[serde(with = "time::serde::rfc3339")]
    pub transaction_date: OffsetDateTime,
}

impl From<Transaction> for TransactionSummary {
    fn from(t: Transaction) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            description: t.description,
            amount: t.amount,
            kind: t.kind,
            transaction_date: t.transaction_date,
        }
    }
}

/// Outcome of a ledger mutation. `balance` is `None` when the mutation
/// committed but the cached balance could not be refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recomputed<T> {
    pub value: T,
    pub balance: Option<Decimal>,
}

impl<T> Recomputed<T> {
    pub fn is_degraded(&self) -> bool {
        self.balance.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct MutationResponse<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub balance: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
}

pub const STALE_BALANCE_WARNING: &str =
    "change saved, but the balance could not be refreshed and may be stale";

impl<T: Serialize> MutationResponse<T> {
    pub fn from_outcome<U>(outcome: Recomputed<U>, data: impl FnOnce(U) -> Option<T>) -> Self {
        let warning = outcome.is_degraded().then_some(STALE_BALANCE_WARNING);
        Self {
            data: data(outcome.value),
            balance: outcome.balance,
            warning,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_type_alias_and_numeric_amount() {
        let req: TransactionRequest = serde_json::from_str(
            r#"{"description":"Rent","amount":400.5,"type":"expense","transaction_date":"2025-11-25T10:00:00-03:00"}"#,
        )
        .unwrap();
        assert_eq!(req.kind, "expense");
        assert_eq!(req.amount, Decimal::new(4005, 1));
        assert_eq!(req.transaction_date.offset().whole_hours(), -3);
    }

    #[test]
    fn degraded_response_carries_warning() {
        let res: MutationResponse<()> =
            MutationResponse::from_outcome(Recomputed { value: (), balance: None }, |_| None);
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["warning"], STALE_BALANCE_WARNING);
        assert!(json["balance"].is_null());
        assert!(json.get("data").is_none());
    }
}
