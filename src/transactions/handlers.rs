use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::AppResult,
    extract::{ApiJson, ApiPath},
    state::AppState,
    transactions::{
        dto::{BalanceResponse, MutationResponse, TransactionRequest, TransactionSummary},
        repo_types::Transaction,
        services,
    },
};

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list_transactions).post(add_transaction))
        .route("/transactions/balance", get(get_balance))
        .route(
            "/transactions/:id",
            put(update_transaction).delete(delete_transaction),
        )
}

#[instrument(skip(state, auth), fields(user_id = auth.user_id))]
pub async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Transaction>>> {
    Ok(Json(services::list_transactions(&state, auth.user_id).await?))
}

#[instrument(skip(state, auth), fields(user_id = auth.user_id))]
pub async fn get_balance(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<BalanceResponse>> {
    let balance = services::compute_balance(&state, auth.user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

#[instrument(skip(state, auth, body), fields(user_id = auth.user_id))]
pub async fn add_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<TransactionRequest>,
) -> AppResult<(StatusCode, Json<MutationResponse<TransactionSummary>>)> {
    let outcome = services::add_transaction(&state, auth.user_id, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::from_outcome(outcome, Some)),
    ))
}

#[instrument(skip(state, auth, body), fields(user_id = auth.user_id))]
pub async fn update_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<TransactionRequest>,
) -> AppResult<Json<MutationResponse<TransactionSummary>>> {
    let outcome = services::update_transaction(&state, auth.user_id, id, body).await?;
    Ok(Json(MutationResponse::from_outcome(outcome, Some)))
}

#[instrument(skip(state, auth), fields(user_id = auth.user_id))]
pub async fn delete_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<MutationResponse<()>>> {
    let outcome = services::delete_transaction(&state, auth.user_id, id).await?;
    Ok(Json(MutationResponse::from_outcome(outcome, |_| None)))
}
