//! Checkout route handlers.
//!
//! `POST /api/checkout` freezes the cart together with the buyer data. The
//! payment step reads that snapshot and consumes it once the gateway accepts
//! the payment.

use axum::{Json, extract::State};
use chrono::Utc;
use tower_sessions::Session;
use tracing::instrument;

use filamento_core::cart::{CartError, CheckoutData};
use filamento_core::payment::Buyer;

use crate::db::AddressRepository;
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::session::keys;
use crate::routes::cart::load_cart;
use crate::services::print_service::PaymentSession;
use crate::state::AppState;

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the checkout snapshot from the session.
pub(crate) async fn load_checkout(session: &Session) -> Result<Option<CheckoutData>> {
    Ok(session.get::<CheckoutData>(keys::CHECKOUT).await?)
}

/// Drop the checkout snapshot.
pub(crate) async fn consume_checkout(session: &Session) -> Result<()> {
    session.remove::<CheckoutData>(keys::CHECKOUT).await?;
    Ok(())
}

// =============================================================================
// Routes
// =============================================================================

/// Snapshot the cart with the buyer's data.
///
/// POST /api/checkout
///
/// A logged-in buyer who sends no address gets their default address.
#[instrument(skip(state, session, user, buyer))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(mut buyer): Json<Buyer>,
) -> Result<Json<CheckoutData>> {
    let cart = load_cart(&session).await?;

    let user_id = user.as_ref().map(|u| u.id);
    if let Some(user_id) = user_id.filter(|_| buyer.address.is_none()) {
        let addresses = AddressRepository::new(state.pool()).list(user_id).await?;
        buyer.address = addresses
            .iter()
            .find(|a| a.is_default)
            .map(crate::models::Address::to_billing);
    }

    let checkout = CheckoutData::snapshot(&cart, buyer, Utc::now())?;
    session.insert(keys::CHECKOUT, &checkout).await?;

    tracing::info!(
        items = checkout.cart.items.len(),
        total = %checkout.total_amount,
        "Checkout started"
    );
    Ok(Json(checkout))
}

/// GET /api/checkout
pub async fn show(session: Session) -> Result<Json<CheckoutData>> {
    load_checkout(&session)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Nenhum checkout em andamento".to_owned()))
}

/// Create a hosted payment page for the cart through the estimation service.
///
/// POST /api/checkout/session
#[instrument(skip(state, session))]
pub async fn payment_session(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<PaymentSession>> {
    let cart = match load_checkout(&session).await? {
        Some(checkout) => checkout.cart,
        None => load_cart(&session).await?,
    };
    if cart.is_empty() {
        return Err(CartError::Empty.into());
    }

    let payment_session = state.print_service().create_payment_session(&cart).await?;
    Ok(Json(payment_session))
}
