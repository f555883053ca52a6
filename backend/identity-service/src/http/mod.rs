/// HTTP API for identity-service
///
/// Form-encoded requests, JSON responses. Protected routes require an
/// `Authorization: Bearer <token>` header; a missing or invalid token is
/// answered with 403.
use crate::error::{IdentityError, MessageResponse};
use crate::models::{LoginRequest, ProfileUpdateRequest, RegistrationRequest};
use crate::services::{
    IdentityService, LoginInput, LoginOutcome, RegisterInput, RegisterOutcome,
    UpdateProfileInput, UpdateProfileOutcome,
};
use crate::validators::{check, ValidationOutcome};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Serialize;
use std::future::Future;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const PHONE_NUMBER_USED_MESSAGE: &str = "Phone number already used";
pub const PHONE_NUMBER_NOT_FOUND_MESSAGE: &str = "Phone number not found";
pub const WRONG_PASSWORD_MESSAGE: &str = "Wrong password";
pub const LOGIN_SUCCESS_MESSAGE: &str = "Login success";
pub const UPDATE_SUCCESS_MESSAGE: &str = "Update success";

/// Shared HTTP server state
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityService,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub phone_number: String,
    pub full_name: String,
}

/// Build the HTTP router with all public endpoints
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/registration", post(register))
        .route("/login", post(login))
        .route("/profile", get(get_profile).put(update_profile))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Token from an `Authorization` header value
///
/// The value must split on spaces into exactly two parts; the second is the
/// token. The scheme word itself is not checked.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let parts: Vec<&str> = header.split(' ').collect();
    match parts.as_slice() {
        [_, token] => Some(*token),
        _ => None,
    }
}

/// Id of the caller, taken from a verified bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub i64);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = IdentityError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(extract_bearer_token)
            .ok_or(IdentityError::InvalidToken)?;

        let user_id = state.identity.tokens().verify(token)?;
        Ok(AuthenticatedUser(user_id))
    }
}

fn validation_failed(outcome: ValidationOutcome) -> Response {
    (StatusCode::BAD_REQUEST, Json(outcome.into_violations())).into_response()
}

fn message(status: StatusCode, message: &str) -> Response {
    (status, Json(MessageResponse::new(message))).into_response()
}

async fn register(
    State(state): State<AppState>,
    Form(request): Form<RegistrationRequest>,
) -> Result<Response, IdentityError> {
    let violations = check(&request);
    if !violations.is_valid() {
        return Ok(validation_failed(violations));
    }

    let outcome = state
        .identity
        .register(RegisterInput {
            phone_number: request.phone_number,
            full_name: request.full_name,
            password: request.password,
        })
        .await?;

    Ok(match outcome {
        RegisterOutcome::Registered { id } => (
            StatusCode::OK,
            Json(RegistrationResponse { id: id.to_string() }),
        )
            .into_response(),
        RegisterOutcome::PhoneNumberExists => {
            message(StatusCode::CONFLICT, PHONE_NUMBER_USED_MESSAGE)
        }
    })
}

async fn login(
    State(state): State<AppState>,
    Form(request): Form<LoginRequest>,
) -> Result<Response, IdentityError> {
    let outcome = state
        .identity
        .login(LoginInput {
            phone_number: request.phone_number,
            password: request.password,
        })
        .await?;

    Ok(match outcome {
        LoginOutcome::Authenticated { token, .. } => (
            StatusCode::OK,
            Json(LoginResponse {
                message: LOGIN_SUCCESS_MESSAGE.to_string(),
                token,
            }),
        )
            .into_response(),
        LoginOutcome::NotFound => message(StatusCode::BAD_REQUEST, PHONE_NUMBER_NOT_FOUND_MESSAGE),
        LoginOutcome::WrongPassword => message(StatusCode::BAD_REQUEST, WRONG_PASSWORD_MESSAGE),
    })
}

async fn get_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<ProfileResponse>, IdentityError> {
    let identity = state.identity.get_profile(user_id).await?;

    Ok(Json(ProfileResponse {
        phone_number: identity.phone_number,
        full_name: identity.full_name,
    }))
}

async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Form(request): Form<ProfileUpdateRequest>,
) -> Result<Response, IdentityError> {
    let violations = check(&request);
    if !violations.is_valid() {
        return Ok(validation_failed(violations));
    }

    let outcome = state
        .identity
        .update_profile(UpdateProfileInput {
            id: user_id,
            phone_number: request.phone_number,
            full_name: request.full_name,
        })
        .await?;

    Ok(match outcome {
        UpdateProfileOutcome::Updated => message(StatusCode::OK, UPDATE_SUCCESS_MESSAGE),
        UpdateProfileOutcome::PhoneNumberExists => {
            message(StatusCode::CONFLICT, PHONE_NUMBER_USED_MESSAGE)
        }
    })
}

/// Serve the router until `shutdown` resolves
pub async fn start_http_server<F>(
    state: AppState,
    host: &str,
    port: u16,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Starting HTTP API server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    Ok(())
}
