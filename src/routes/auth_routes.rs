use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{
        generate_access_token, hash_access_token, hash_password, validate_password,
        verify_password,
    },
    error::ApiError,
    middleware::{auth_context::AuthContext, json_body::JsonBody},
    models::{AppState, Envelope, NewUser, Role, UserProfile, UserRow},
    repo::RepoError,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile).put(update_profile))
        .route("/change-password", put(change_password))
        .route("/logout", post(logout))
}

/// Issued on register and login. The raw token is only ever returned here.
#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub user: UserProfile,
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// `local@domain.tld`, no whitespace.
fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn user_exists() -> ApiError {
    ApiError::BadRequest("USER_EXISTS", "User already exists".into())
}

async fn issue_session(state: &AppState, user: UserRow) -> Result<AuthPayload, ApiError> {
    let token = generate_access_token();
    let expires_at = Utc::now() + Duration::hours(state.session_ttl_hours);

    let session = state
        .sessions
        .create(user.id, &hash_access_token(&token), expires_at)
        .await?;

    tracing::info!(
        user_id = user.id,
        session_token_id = %session.session_token_id,
        "session issued"
    );

    Ok(AuthPayload {
        token,
        expires_at: session.expires_at,
        user: user.into(),
    })
}

async fn current_user(state: &AppState, auth: &AuthContext) -> Result<UserRow, ApiError> {
    state
        .users
        .find_by_id(auth.user_id)
        .await?
        .ok_or_else(ApiError::session_expired)
}

// =========================
// Register / login
// =========================

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<AuthPayload>>), ApiError> {
    let email = req.email.as_deref().map(normalize_email).unwrap_or_default();
    let password = req.password.unwrap_or_default();
    let full_name = req
        .full_name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    if email.is_empty() || password.is_empty() || full_name.is_empty() {
        return Err(ApiError::validation(
            "Email, password, and full name are required",
        ));
    }
    if !looks_like_email(&email) {
        return Err(ApiError::validation("Please provide a valid email"));
    }
    validate_password(&password, "Password")?;

    let role = match req.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => r
            .parse::<Role>()
            .map_err(|_| ApiError::validation("role must be doctor or patient"))?,
        None => Role::Patient,
    };
    if role == Role::Admin {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Admin accounts cannot be self-registered".into(),
        ));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(user_exists());
    }

    let user = state
        .users
        .insert(NewUser {
            email,
            password_hash: hash_password(&password)?,
            full_name,
            phone: req
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            role,
        })
        .await
        .map_err(|e| match e {
            RepoError::Conflict(_) => user_exists(),
            other => other.into(),
        })?;

    tracing::info!(user_id = user.id, role = role.as_str(), "user registered");

    let payload = issue_session(&state, user).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(payload).with_message("User registered successfully")),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<Envelope<AuthPayload>>, ApiError> {
    let email = req.email.as_deref().map(normalize_email).unwrap_or_default();
    let password = req.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password(&password, &user.password) {
        return Err(ApiError::invalid_credentials());
    }

    let payload = issue_session(&state, user).await?;
    Ok(Json(
        Envelope::data(payload).with_message("Login successful"),
    ))
}

// =========================
// Profile
// =========================

pub async fn profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Envelope<UserProfile>>, ApiError> {
    let user = current_user(&state, &auth).await?;
    Ok(Json(Envelope::data(user.into())))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<Json<Envelope<UserProfile>>, ApiError> {
    let full_name = req.full_name.as_deref().map(str::trim);
    if full_name == Some("") {
        return Err(ApiError::validation("full_name cannot be empty"));
    }
    let phone = req.phone.as_deref().map(str::trim);

    let user = state
        .users
        .update_profile(auth.user_id, full_name, phone)
        .await?
        .ok_or_else(ApiError::session_expired)?;

    Ok(Json(
        Envelope::data(UserProfile::from(user)).with_message("Profile updated successfully"),
    ))
}

// =========================
// Password management
// =========================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let (Some(current), Some(new)) = (
        req.current_password.filter(|p| !p.is_empty()),
        req.new_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::validation(
            "Current password and new password are required",
        ));
    };
    validate_password(&new, "New password")?;

    let user = current_user(&state, &auth).await?;
    if !verify_password(&current, &user.password) {
        return Err(ApiError::Unauthorized(
            "INVALID_CREDENTIALS",
            "Current password is incorrect".into(),
        ));
    }

    if !state
        .users
        .update_password(user.id, &hash_password(&new)?)
        .await?
    {
        return Err(ApiError::session_expired());
    }

    // Keep the session that made the change.
    let revoked = state
        .sessions
        .revoke_others(user.id, auth.session_token_id)
        .await?;
    tracing::info!(user_id = user.id, revoked, "password changed");

    Ok(Json(Envelope::message("Password changed successfully")))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Envelope<()>>, ApiError> {
    if !state.sessions.revoke(auth.session_token_id).await? {
        return Err(ApiError::session_expired());
    }
    Ok(Json(Envelope::message("Logged out successfully")))
}
