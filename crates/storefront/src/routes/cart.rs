//! Cart route handlers.
//!
//! The cart lives in the session. Lines are priced on the server from a
//! configured upload; the client only picks the upload and the quantity.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use filamento_core::cart::{Cart, CartItem, CheckoutData};
use filamento_core::pricing::{FillTier, Material, quote_estimate};

use crate::error::{AppError, Result};
use crate::models::session::keys;
use crate::routes::uploads::{find_upload, load_uploads};
use crate::services::uploads::UploadedFile;
use crate::state::AppState;

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the cart from the session.
pub(crate) async fn load_cart(session: &Session) -> Result<Cart> {
    Ok(session.get::<Cart>(keys::CART).await?.unwrap_or_default())
}

/// Store the cart in the session.
///
/// A checkout snapshot taken from an older cart is dropped, so payment
/// never charges lines the buyer has since changed.
pub(crate) async fn save_cart(session: &Session, cart: &Cart) -> Result<()> {
    session.insert(keys::CART, cart).await?;
    session.remove::<CheckoutData>(keys::CHECKOUT).await?;
    Ok(())
}

/// Cart line id for a model printed with a given configuration.
///
/// Adding the same configuration twice merges into one line.
fn line_id(upload_id: Uuid, material: Material, fill: FillTier, color: &str) -> String {
    format!(
        "{upload_id}-{}-{}-{}",
        material.id(),
        fill.as_str(),
        color.trim().to_lowercase().replace(' ', "_")
    )
}

/// Build the cart line for a configured upload at `unit_price`.
fn cart_line(upload: &UploadedFile, unit_price: rust_decimal::Decimal) -> Result<CartItem> {
    let (fill, material, color) = upload.selection()?;

    let mut item = CartItem::new(
        line_id(upload.id, material, fill, color),
        upload.name.clone(),
        unit_price,
        upload.quantity,
    );
    item.material = Some(material);
    item.fill = Some(fill);
    item.color = Some(color.to_owned());
    item.file_ref = Some(upload.id.to_string());
    Ok(item)
}

// =============================================================================
// Routes
// =============================================================================

/// GET /api/cart
pub async fn show(session: Session) -> Result<Json<Cart>> {
    Ok(Json(load_cart(&session).await?))
}

/// Add to cart request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub upload_id: Uuid,
}

/// Add a configured upload to the cart.
///
/// POST /api/cart/items
///
/// The model is sliced with its chosen material and fill, and the line is
/// priced from that estimate.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<Cart>> {
    let uploads = load_uploads(&session).await?;
    let upload = find_upload(&uploads, request.upload_id)?;
    let (fill, material, _) = upload.selection()?;

    let file = state.uploads().get(upload.id).await?;
    let estimate = state
        .print_service()
        .estimate(&file, fill, material, upload.quantity)
        .await?;
    let quote = quote_estimate(&estimate, material, upload.quantity, state.print_service().rates())
        .quote
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "Não foi possível calcular o preço em {}",
                material.name()
            ))
        })?;

    let item = cart_line(upload, quote.unit_price)?;
    let mut cart = load_cart(&session).await?;
    cart.add_item(item)?;
    save_cart(&session, &cart).await?;

    tracing::info!(
        material = %material,
        unit_price = %quote.unit_price,
        total_quantity = cart.total_quantity,
        "Added to cart"
    );
    Ok(Json(cart))
}

/// Update quantity request.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

/// Change a line's quantity. Zero removes the line.
///
/// PATCH /api/cart/items/{id}
#[instrument(skip(session))]
pub async fn update(
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<Cart>> {
    let mut cart = load_cart(&session).await?;
    cart.update_quantity(&id, request.quantity)?;
    save_cart(&session, &cart).await?;
    Ok(Json(cart))
}

/// DELETE /api/cart/items/{id}
#[instrument(skip(session))]
pub async fn remove(session: Session, Path(id): Path<String>) -> Result<Json<Cart>> {
    let mut cart = load_cart(&session).await?;
    cart.remove_item(&id)?;
    save_cart(&session, &cart).await?;
    Ok(Json(cart))
}

/// DELETE /api/cart
pub async fn clear(session: Session) -> Result<Json<Cart>> {
    let mut cart = load_cart(&session).await?;
    cart.clear();
    save_cart(&session, &cart).await?;
    Ok(Json(cart))
}
