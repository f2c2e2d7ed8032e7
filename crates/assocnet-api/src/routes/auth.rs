//! Authentication extractors and routes

use assocnet_auth::{AuthError, AuthUser, Registration, Tokens};
use axum::{
    Json, Router,
    extract::{FromRef, FromRequestParts, State, rejection::JsonRejection},
    http::{
        HeaderMap, HeaderName,
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        request::Parts,
    },
    routing::post,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{
    LoginRequest, MessageResponse, RegisterRequest, RegisterResponse, TokenResponse,
};

/// Name of the cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refreshToken";

/// JSON body plus one `Set-Cookie` header
type WithCookie<T> = ([(HeaderName, String); 1], Json<T>);

// ==================== Auth Extractors ====================

/// Extractor for authenticated user (required)
pub struct RequireAuth(pub AuthUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let user = AuthUser::authenticate(&app_state.jwt, header).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            ApiError::Unauthorized
        })?;
        Ok(RequireAuth(user))
    }
}

/// Extractor for the refresh token cookie (required)
pub struct RefreshCookie(pub String);

impl<S> FromRequestParts<S> for RefreshCookie
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        find_cookie(&parts.headers, REFRESH_COOKIE)
            .map(RefreshCookie)
            .ok_or(ApiError::Unauthorized)
    }
}

/// Find a non-empty cookie value across all `Cookie` headers
fn find_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

// ==================== Cookies ====================

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `Set-Cookie` value handing a refresh token to the browser
fn refresh_cookie(token: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let max_age = (expires_at - now).num_seconds().max(0);
    format!(
        "{REFRESH_COOKIE}={token}; Path=/; Expires={}; Max-Age={max_age}; HttpOnly; Secure; SameSite=Strict",
        http_date(expires_at)
    )
}

/// `Set-Cookie` value removing the refresh token
fn clear_refresh_cookie() -> String {
    format!(
        "{REFRESH_COOKIE}=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; HttpOnly; Secure; SameSite=Strict"
    )
}

fn token_response(tokens: &Tokens) -> WithCookie<TokenResponse> {
    let cookie = refresh_cookie(
        &tokens.refresh_token,
        tokens.refresh_token_expires_at,
        Utc::now(),
    );
    ([(SET_COOKIE, cookie)], Json(TokenResponse::from(tokens)))
}

// ==================== Input Validation ====================

/// Maximum allowed username length
const MAX_USERNAME_LENGTH: usize = 64;
/// Maximum allowed password length (prevent DoS with very large passwords)
const MAX_PASSWORD_LENGTH: usize = 256;
/// Minimum allowed password length
const MIN_PASSWORD_LENGTH: usize = 4;
/// Maximum length of email and phone number
const MAX_CONTACT_LENGTH: usize = 256;

/// Validate username format and length
fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username cannot be empty".to_string()));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Username exceeds maximum length of {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '@')
    {
        return Err(ApiError::BadRequest(
            "Username can only contain alphanumeric characters and _ - . @".to_string(),
        ));
    }
    Ok(())
}

/// Validate password length
fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

pub(crate) fn validate_contact(field: &str, value: Option<&str>) -> Result<(), ApiError> {
    if let Some(value) = value
        && value.len() > MAX_CONTACT_LENGTH
    {
        return Err(ApiError::BadRequest(format!(
            "{} exceeds maximum length of {} characters",
            field, MAX_CONTACT_LENGTH
        )));
    }
    Ok(())
}

// ==================== Auth Routes ====================

/// POST /auth/register
async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(request) = body?;
    validate_username(&request.user_name)?;
    validate_password(&request.password)?;
    validate_contact("Email", request.email.as_deref())?;
    validate_contact("Phone number", request.phone_number.as_deref())?;

    debug!("Registering user: {}", request.user_name);

    let user = state
        .auth
        .register(Registration {
            username: request.user_name,
            password: request.password,
            email: request.email,
            phone_number: request.phone_number,
        })
        .await?;

    Ok(Json(RegisterResponse::from(user)))
}

/// POST /auth/login
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<WithCookie<TokenResponse>, ApiError> {
    let Json(request) = body?;
    // Oversized input never reaches the hasher
    if request.user_name.len() > MAX_USERNAME_LENGTH || request.password.len() > MAX_PASSWORD_LENGTH
    {
        return Err(AuthError::InvalidCredentials.into());
    }

    let tokens = state.auth.login(&request.user_name, &request.password).await?;
    Ok(token_response(&tokens))
}

/// POST /auth/refresh-token
async fn refresh_token(
    State(state): State<AppState>,
    RefreshCookie(token): RefreshCookie,
) -> Result<WithCookie<TokenResponse>, ApiError> {
    let tokens = state.auth.refresh_tokens(&token).await?;
    Ok(token_response(&tokens))
}

/// POST /auth/logout
async fn logout(
    State(state): State<AppState>,
    RefreshCookie(token): RefreshCookie,
) -> Result<WithCookie<MessageResponse>, ApiError> {
    state.auth.logout(&token).await?;
    info!("Refresh token revoked on logout");

    Ok((
        [(SET_COOKIE, clear_refresh_cookie())],
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    ))
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh-token", post(refresh_token))
        .route("/auth/logout", post(logout))
}
