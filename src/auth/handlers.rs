use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, MeResponse, RegisterRequest, RegisterResponse},
        extractors::AuthUser,
        services,
    },
    error::AppResult,
    extract::ApiJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/validate", get(validate))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let user = services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "registration successful, please log in",
            user,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    Ok(Json(services::login(&state, payload).await?))
}

#[instrument(skip(state, auth), fields(user_id = auth.user_id))]
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Value>> {
    services::logout(&state, auth.user_id, &auth.token).await?;
    Ok(Json(json!({ "message": "logged out" })))
}

/// Reaching this handler means the extractor accepted the bearer.
pub async fn validate(auth: AuthUser) -> Json<Value> {
    Json(json!({ "message": "token is valid", "user_id": auth.user_id }))
}

#[instrument(skip(state, auth), fields(user_id = auth.user_id))]
pub async fn get_me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<MeResponse>> {
    let user = services::profile(&state, auth.user_id).await?;
    Ok(Json(MeResponse::from(user)))
}
