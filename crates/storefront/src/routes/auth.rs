//! Auth session handlers.
//!
//! Login is the cart reconciliation point: after the ID token verifies and
//! the user row is upserted, the guest cart this device built merges into
//! the user's server cart, and the merged result comes back in the response
//! so the client can render it immediately.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::RequireAuth;
use crate::middleware::auth::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::routes::cart::{CartResponse, cart_session};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub id_token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: CurrentUser,
    /// The reconciled cart, already merged and stock-clamped.
    pub cart: CartResponse,
}

/// Login: verify the ID token, mirror the user, reconcile carts.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let identity = state.auth().verify_id_token(&request.id_token).await?;
    let user = state
        .users()
        .upsert(&identity.subject, &identity.email)
        .await?;

    let current = CurrentUser {
        id: user.id.clone(),
        email: user.email.clone(),
        is_admin: user.is_admin,
    };

    // New privilege level, new session ID.
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::Internal(format!("session cycle failed: {e}")))?;
    set_current_user(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("session write failed: {e}")))?;
    set_sentry_user(&current.id, Some(current.email.as_str()));

    let cart = cart_session(&state, session, Some(&current))
        .reconcile_login(&current.id)
        .await?;

    tracing::info!(user = %current.id, "login");
    Ok(Json(SessionResponse {
        user: current,
        cart: cart.into(),
    }))
}

/// The logged-in identity, straight from the session.
pub async fn me(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
    Json(user)
}

/// Logout: discard the guest cart and the logged-in identity. The server
/// cart is left in place for the next login.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    cart_session(&state, session.clone(), None)
        .reconcile_logout()
        .await?;
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session write failed: {e}")))?;
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::Internal(format!("session cycle failed: {e}")))?;
    clear_sentry_user();

    Ok(StatusCode::NO_CONTENT)
}
