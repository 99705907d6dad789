use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, RegisterRequest, UserSummary},
        password::{hash_password, verify_password},
        repo_types::{NewSession, NewUser, User},
    },
    error::{check_len, AppError, AppResult},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    email.chars().count() <= 255 && EMAIL_RE.is_match(email)
}

fn validate_registration(req: &RegisterRequest) -> AppResult<()> {
    if !is_valid_email(&req.email) {
        return Err(AppError::validation("invalid email"));
    }
    check_len("full name", &req.full_name, 3, 255)?;
    check_len("password", &req.password, 6, 100)?;
    if req.password != req.confirm_password {
        return Err(AppError::validation("passwords do not match"));
    }
    Ok(())
}

/// Creates an account. Does not log the user in.
pub async fn register(st: &AppState, mut req: RegisterRequest) -> AppResult<UserSummary> {
    // Case is preserved: emails are unique exactly as stored.
    req.email = req.email.trim().to_string();
    req.full_name = req.full_name.trim().to_string();
    validate_registration(&req)?;

    if st.users.find_user_by_email(&req.email).await?.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = hash_password(&req.password)?;
    let created = st
        .users
        .create_user(NewUser {
            email: req.email.clone(),
            password_hash,
            full_name: req.full_name,
        })
        .await?;

    match created {
        Some(user) => {
            info!(user_id = user.id, email = %user.email, "user registered");
            Ok(UserSummary::from(&user))
        }
        None => {
            warn!(email = %req.email, "email registered concurrently");
            Err(AppError::DuplicateEmail)
        }
    }
}

/// Verifies credentials, issues a token and records a new session for it.
pub async fn login(st: &AppState, req: LoginRequest) -> AppResult<LoginResponse> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("email and password are required"));
    }

    let user = match st.users.find_active_user_by_email(email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let issued = st.keys.issue(&user)?;
    st.sessions
        .create_session(NewSession {
            user_id: user.id,
            token: issued.token.clone(),
            expires_at: issued.expires_at,
        })
        .await?;

    info!(user_id = user.id, "user logged in");
    Ok(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user: UserSummary::from(&user),
    })
}

/// Revokes the session for `(user_id, token)`. Missing sessions are not an error.
pub async fn logout(st: &AppState, user_id: i64, token: &str) -> AppResult<()> {
    let Some(mut session) = st.sessions.find_session(user_id, token).await? else {
        return Ok(());
    };
    if session.is_valid {
        session.is_valid = false;
        st.sessions.update_session(&session).await?;
        info!(user_id, session_id = session.id, "session revoked");
    }
    Ok(())
}

/// True iff a stored session for `token` is still valid and unexpired.
pub async fn validate_token(st: &AppState, token: &str) -> bool {
    match st.sessions.find_session_by_token(token).await {
        Ok(Some(session)) => session.is_usable_at(OffsetDateTime::now_utc()),
        Ok(None) => false,
        Err(e) => {
            error!(error = ?e, "session lookup failed");
            false
        }
    }
}

/// Cryptographic check followed by the session check. Returns the user id.
pub async fn authenticate(st: &AppState, token: &str) -> AppResult<i64> {
    let claims = st.keys.validate(token).map_err(|e| {
        warn!(reason = %e, "bearer token rejected");
        AppError::Unauthorized
    })?;
    let user_id = claims.user_id().ok_or(AppError::Unauthorized)?;

    match st.sessions.find_session(user_id, token).await? {
        Some(s) if s.is_usable_at(OffsetDateTime::now_utc()) => Ok(user_id),
        _ => {
            warn!(user_id, "token has no live session");
            Err(AppError::Unauthorized)
        }
    }
}

pub async fn profile(st: &AppState, user_id: i64) -> AppResult<User> {
    st.users
        .find_user_by_id(user_id)
        .await?
        .ok_or(AppError::NotFound)
}
