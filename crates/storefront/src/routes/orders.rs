//! Order history handlers.

use axum::{Json, extract::Path, extract::State};
use tracing::instrument;

use colibri_core::{Order, OrderId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// The current user's orders, newest first.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_for_user(&user.id).await?))
}

/// Order detail. Owners see their own orders; admins see all of them. A
/// foreign order reads as absent rather than forbidden.
#[instrument(skip(state, user), fields(order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = state
        .orders()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    let owned = order.user_id.as_ref() == Some(&user.id);
    if !owned && !user.is_admin {
        return Err(AppError::NotFound(format!("order {id}")));
    }
    Ok(Json(order))
}
