//! Account route handlers.
//!
//! These routes require authentication.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use filamento_core::{AddressId, OrderId};

use crate::db::{AddressRepository, OrderRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Address, AddressInput, Order, ProfileUpdate, UserProfile};
use crate::services::auth::AuthService;
use crate::state::AppState;

fn address_not_found() -> AppError {
    AppError::NotFound("Endereço não encontrado".to_owned())
}

// =============================================================================
// Profile
// =============================================================================

/// GET /api/account/profile
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UserProfile>> {
    let profile = AuthService::new(state.pool()).profile(user.id).await?;
    Ok(Json(profile))
}

/// PUT /api/account/profile
#[instrument(skip(state, user, update), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>> {
    let profile = AuthService::new(state.pool())
        .update_profile(user.id, &update)
        .await?;
    Ok(Json(profile))
}

// =============================================================================
// Addresses
// =============================================================================

/// GET /api/account/addresses
pub async fn addresses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Address>>> {
    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(addresses))
}

/// POST /api/account/addresses
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    let input = input.validate()?;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// PUT /api/account/addresses/{id}
#[instrument(skip(state, user, input), fields(user_id = %user.id))]
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
    Json(input): Json<AddressInput>,
) -> Result<Json<Address>> {
    let input = input.validate()?;
    let address = AddressRepository::new(state.pool())
        .update(user.id, AddressId::new(id), &input)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => address_not_found(),
            other => other.into(),
        })?;
    Ok(Json(address))
}

/// DELETE /api/account/addresses/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    let deleted = AddressRepository::new(state.pool())
        .delete(user.id, AddressId::new(id))
        .await?;
    if !deleted {
        return Err(address_not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Orders
// =============================================================================

/// GET /api/account/orders
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// GET /api/account/orders/{id}
pub async fn order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<Order>> {
    OrderRepository::new(state.pool())
        .get_for_user(user.id, OrderId::new(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Pedido não encontrado".to_owned()))
}
