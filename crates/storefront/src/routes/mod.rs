//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                       - Liveness
//! GET    /health/ready                 - Database readiness
//!
//! # Catalog and models
//! GET    /api/materials                - Materials, fill tiers, energy rates
//! POST   /api/uploads                  - Upload models (multipart)
//! GET    /api/uploads                  - Uploaded models
//! PUT    /api/uploads/{id}             - Configure fill/material/color/quantity
//! DELETE /api/uploads/{id}             - Remove an upload
//! POST   /api/uploads/{id}/quote       - Quote an upload in every material
//! POST   /api/estimate                 - One-shot estimate (multipart)
//!
//! # Cart
//! GET    /api/cart                     - Current cart
//! POST   /api/cart/items               - Add a configured upload
//! PATCH  /api/cart/items/{id}          - Change quantity (0 removes)
//! DELETE /api/cart/items/{id}          - Remove a line
//! DELETE /api/cart                     - Clear the cart
//!
//! # Checkout and payment
//! POST   /api/checkout                 - Snapshot cart and buyer
//! GET    /api/checkout                 - Current snapshot
//! POST   /api/checkout/session         - Hosted payment page
//! POST   /api/create-order             - Pay through the gateway
//! POST   /api/webhooks/pagarme         - Gateway status updates
//!
//! # Auth
//! POST   /api/auth/register            - Create account
//! POST   /api/auth/login               - Login
//! POST   /api/auth/logout              - Logout
//! GET    /api/auth/me                  - Current user
//!
//! # Account (requires auth)
//! GET    /api/account/profile          - Profile
//! PUT    /api/account/profile          - Update profile
//! GET    /api/account/addresses        - Address list
//! POST   /api/account/addresses        - Create address
//! PUT    /api/account/addresses/{id}   - Update address
//! DELETE /api/account/addresses/{id}   - Delete address
//! GET    /api/account/orders           - Order history
//! GET    /api/account/orders/{id}      - Order detail
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod materials;
pub mod orders;
pub mod uploads;
pub mod webhooks;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Room for multipart boundaries and the thumbnail on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Create the auth routes router.
pub fn auth_routes(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter(trust_proxy_headers))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the upload routes router.
pub fn upload_routes(max_upload_bytes: usize, trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(uploads::create)
                .get(uploads::index)
                .layer(DefaultBodyLimit::max(
                    max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
                )),
        )
        .route("/{id}", put(uploads::configure).delete(uploads::delete))
        .route(
            "/{id}/quote",
            post(uploads::quote).layer(api_rate_limiter(trust_proxy_headers)),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route("/items/{id}", delete(cart::remove).patch(cart::update))
}

/// Create the checkout and payment routes router.
pub fn checkout_routes(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout::create).get(checkout::show))
        .route("/checkout/session", post(checkout::payment_session))
        .route(
            "/create-order",
            post(orders::create).layer(api_rate_limiter(trust_proxy_headers)),
        )
        .route("/webhooks/pagarme", post(webhooks::pagarme))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(account::profile).put(account::update_profile),
        )
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route(
            "/addresses/{id}",
            put(account::update_address).delete(account::delete_address),
        )
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order))
}

/// Create all API routes for the storefront.
///
/// `trust_proxy_headers` decides whether rate limits key on proxy headers or
/// only on the peer address.
pub fn routes(max_upload_bytes: usize, trust_proxy_headers: bool) -> Router<AppState> {
    let api = Router::new()
        .route("/materials", get(materials::index))
        .route(
            "/estimate",
            post(uploads::estimate)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::max(
                    max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
                ))
                .layer(api_rate_limiter(trust_proxy_headers)),
        )
        .nest("/uploads", upload_routes(max_upload_bytes, trust_proxy_headers))
        .nest("/cart", cart_routes())
        .merge(checkout_routes(trust_proxy_headers))
        .nest("/auth", auth_routes(trust_proxy_headers))
        .nest("/account", account_routes());

    Router::new().nest("/api", api)
}
