//! Payment orchestration.
//!
//! `POST /api/create-order` validates the buyer and payment method, sends
//! the order to the gateway and records the result. Every request carries an
//! idempotency key (the `Idempotency-Key` header, or a fresh one); replaying
//! a key returns the stored result without charging again.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use filamento_core::OrderId;
use filamento_core::cart::{Cart, CartError, CartItem, check_quantity};
use filamento_core::payment::{Buyer, PaymentMethod};

use crate::db::OrderRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::models::order::NewOrder;
use crate::models::session::{CurrentUser, keys};
use crate::routes::cart::{load_cart, save_cart};
use crate::routes::checkout::{consume_checkout, load_checkout};
use crate::services::pagarme::{OrderOutcome, build_order_request};
use crate::state::AppState;

/// Header carrying the client's idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Longest accepted idempotency key.
const MAX_IDEMPOTENCY_KEY_LEN: usize = 64;

/// Requested line: an id from the cart and the quantity to buy.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestedItem {
    pub id: String,
    pub quantity: u32,
}

/// Create order request.
///
/// `payment` and `payments[0]` are both accepted; `payment` wins.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Option<Vec<RequestedItem>>,
    #[serde(default)]
    pub customer: Option<Buyer>,
    #[serde(default)]
    pub payment: Option<PaymentMethod>,
    #[serde(default)]
    pub payments: Vec<PaymentMethod>,
}

/// Create order response: the gateway outcome plus the local order id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    #[serde(flatten)]
    pub outcome: OrderOutcome,
    /// Absent when the order could not be recorded locally.
    pub local_order_id: Option<OrderId>,
    pub idempotency_key: String,
    /// Whether this answer was replayed from an earlier request.
    pub replayed: bool,
}

fn idempotency_key(headers: &HeaderMap) -> Result<String> {
    let Some(value) = headers.get(IDEMPOTENCY_HEADER) else {
        return Ok(Uuid::new_v4().to_string());
    };
    let key = value
        .to_str()
        .map(str::trim)
        .map_err(|_| AppError::BadRequest("Idempotency-Key inválida".to_owned()))?;
    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(AppError::BadRequest("Idempotency-Key inválida".to_owned()));
    }
    Ok(key.to_owned())
}

/// Lines to charge.
///
/// Without `requested`, every session line is charged as is. Otherwise each
/// requested id must be a session line; its price comes from the session and
/// only the quantity from the request.
fn resolve_items(
    requested: Option<&[RequestedItem]>,
    session_items: &[CartItem],
) -> Result<Vec<CartItem>> {
    let Some(requested) = requested else {
        if session_items.is_empty() {
            return Err(CartError::Empty.into());
        }
        return Ok(session_items.to_vec());
    };

    if requested.is_empty() {
        return Err(CartError::Empty.into());
    }

    requested
        .iter()
        .map(|req| {
            check_quantity(req.quantity)?;
            let line = session_items
                .iter()
                .find(|i| i.id == req.id)
                .ok_or_else(|| CartError::ItemNotFound(req.id.clone()))?;
            let mut item =
                CartItem::new(line.id.clone(), line.name.clone(), line.price, req.quantity);
            item.material = line.material;
            item.fill = line.fill;
            item.color.clone_from(&line.color);
            item.file_ref.clone_from(&line.file_ref);
            Ok(item)
        })
        .collect()
}

/// Gateway order code; stable per owner and idempotency key so a retried
/// request reaches the gateway with the same code, and two owners sending
/// the same key never share one.
fn order_code(owner: &str, key: &str) -> String {
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{owner}\n{key}").as_bytes());
    format!("FIL-{}", id.simple())
}

/// Digest of what the client asked for. A key reused with a different
/// digest is refused rather than replayed.
fn request_fingerprint(request: &CreateOrderRequest) -> String {
    let items = request.items.as_ref().map_or_else(
        || "cart".to_owned(),
        |items| {
            items
                .iter()
                .map(|i| format!("{}*{}", i.id, i.quantity))
                .collect::<Vec<_>>()
                .join(",")
        },
    );
    let method = request
        .payment
        .as_ref()
        .or_else(|| request.payments.first())
        .map_or("none", |p| p.kind().as_str());
    let (email, document) = request.customer.as_ref().map_or(("", ""), |c| {
        (c.email.as_str(), c.document.as_deref().unwrap_or_default())
    });
    let canonical = format!("{items}\n{method}\n{email}\n{document}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, canonical.as_bytes())
        .simple()
        .to_string()
}

fn user_owner(user: &CurrentUser) -> String {
    format!("user:{}", user.id)
}

fn session_owner(token: &str) -> String {
    format!("session:{token}")
}

/// The owner orders from this request are stored under, if it has one yet.
///
/// An anonymous session gets its owner token on its first order, so a
/// session that never ordered has nothing to replay.
async fn existing_owner(session: &Session, user: Option<&CurrentUser>) -> Result<Option<String>> {
    if let Some(user) = user {
        return Ok(Some(user_owner(user)));
    }
    let token = session.get::<String>(keys::ORDER_OWNER).await?;
    Ok(token.as_deref().map(session_owner))
}

async fn new_session_owner(session: &Session) -> Result<String> {
    let token = Uuid::new_v4().simple().to_string();
    session.insert(keys::ORDER_OWNER, &token).await?;
    Ok(session_owner(&token))
}

/// Create an order with the payment gateway.
///
/// POST /api/create-order
#[instrument(skip_all, fields(idempotency_key, payment_method))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>)> {
    let key = idempotency_key(&headers)?;
    tracing::Span::current().record("idempotency_key", key.as_str());
    let fingerprint = request_fingerprint(&request);

    let orders = OrderRepository::new(state.pool());
    let owner = existing_owner(&session, user.as_ref()).await?;
    let stored = match owner.as_deref() {
        Some(owner) => orders.get_by_idempotency_key(owner, &key).await?,
        None => None,
    };
    if let Some(order) = stored {
        if order.request_fingerprint != fingerprint {
            return Err(AppError::Conflict(
                "Idempotency-Key já usada em outro pedido".to_owned(),
            ));
        }
        tracing::info!(order_id = %order.id, "Replaying stored order");
        return Ok((
            StatusCode::OK,
            Json(CreateOrderResponse {
                outcome: order.outcome,
                local_order_id: Some(order.id),
                idempotency_key: key,
                replayed: true,
            }),
        ));
    }

    let checkout = load_checkout(&session).await?;
    let (session_cart, session_buyer) = match checkout {
        Some(checkout) => (checkout.cart, Some(checkout.buyer)),
        None => (load_cart(&session).await?, None),
    };

    let buyer = request
        .customer
        .or(session_buyer)
        .ok_or_else(|| AppError::BadRequest("Dados do comprador são obrigatórios".to_owned()))?;
    let payment = request
        .payment
        .or_else(|| request.payments.into_iter().next())
        .ok_or_else(|| AppError::BadRequest("Forma de pagamento é obrigatória".to_owned()))?;
    tracing::Span::current().record("payment_method", payment.kind().as_str());

    let validated = payment.validate(&buyer, Utc::now().date_naive())?;
    let items = resolve_items(request.items.as_deref(), &session_cart.items)?;

    let owner = match owner {
        Some(owner) => owner,
        None => new_session_owner(&session).await?,
    };
    let code = order_code(&owner, &key);
    let gateway_request =
        build_order_request(&code, &items, &validated, &state.pagarme().settings())?;

    add_breadcrumb(
        "checkout",
        "Order submitted",
        &[
            ("payment_method", payment.kind().as_str()),
            ("items", &items.len().to_string()),
        ],
    );

    let outcome = state.pagarme().create_order(&gateway_request, &code).await?;

    let total_amount: Decimal = items.iter().map(|i| i.total_price).sum();
    let recorded = orders
        .create(&NewOrder {
            user_id: user.as_ref().map(|u| u.id),
            owner: &owner,
            idempotency_key: &key,
            request_fingerprint: &fingerprint,
            total_amount,
            items: &items,
            customer_name: &validated.buyer.name,
            customer_email: validated.buyer.email.as_str(),
            outcome: &outcome,
        })
        .await;

    // The gateway already answered; a storage failure must not hide the result
    let local_order_id = match recorded {
        Ok(order) => Some(order.id),
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                error = %e,
                sentry_event_id = %event_id,
                gateway_order_id = %outcome.order_id,
                "Failed to record order"
            );
            None
        }
    };

    if outcome.success {
        consume_checkout(&session).await?;
        save_cart(&session, &Cart::new()).await?;
        tracing::info!(
            gateway_order_id = %outcome.order_id,
            charge_status = %outcome.charge_status,
            "Payment accepted"
        );
    } else {
        tracing::warn!(
            gateway_order_id = %outcome.order_id,
            message = outcome.message.as_deref().unwrap_or_default(),
            "Payment refused"
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            outcome,
            local_order_id,
            idempotency_key: key,
            replayed: false,
        }),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::HeaderValue;
    use filamento_core::cart::MAX_QUANTITY;
    use filamento_core::{Email, UserId};
    use filamento_core::pricing::Material;
    use tower_sessions::MemoryStore;

    use super::*;

    fn session_items() -> Vec<CartItem> {
        let mut vaso = CartItem::new("vaso-pla", "vaso.stl", Decimal::new(2500, 2), 2);
        vaso.material = Some(Material::Pla);
        vaso.color = Some("Branco".to_owned());
        vec![
            vaso,
            CartItem::new("suporte-abs", "suporte.stl", Decimal::new(1000, 2), 1),
        ]
    }

    #[test]
    fn test_resolve_items_defaults_to_session() {
        let items = resolve_items(None, &session_items()).unwrap();
        assert_eq!(items.len(), 2);
        assert!(matches!(
            resolve_items(None, &[]),
            Err(AppError::Cart(CartError::Empty))
        ));
    }

    #[test]
    fn test_resolve_items_takes_price_from_session() {
        let requested = [RequestedItem {
            id: "vaso-pla".to_owned(),
            quantity: 3,
        }];
        let items = resolve_items(Some(&requested), &session_items()).unwrap();
        assert_eq!(items.len(), 1);
        let item = items.first().unwrap();
        assert_eq!(item.price, Decimal::new(2500, 2));
        assert_eq!(item.total_price, Decimal::new(7500, 2));
        assert_eq!(item.material, Some(Material::Pla));
        assert_eq!(item.color.as_deref(), Some("Branco"));
    }

    #[test]
    fn test_resolve_items_rejects_unknown_or_zero() {
        let unknown = [RequestedItem {
            id: "outro".to_owned(),
            quantity: 1,
        }];
        assert!(matches!(
            resolve_items(Some(&unknown), &session_items()),
            Err(AppError::Cart(CartError::ItemNotFound(_)))
        ));

        let zero = [RequestedItem {
            id: "vaso-pla".to_owned(),
            quantity: 0,
        }];
        assert!(matches!(
            resolve_items(Some(&zero), &session_items()),
            Err(AppError::Cart(CartError::InvalidQuantity))
        ));
    }

    #[test]
    fn test_idempotency_key_from_header_or_generated() {
        let mut headers = HeaderMap::new();
        let generated = idempotency_key(&headers).unwrap();
        assert!(Uuid::parse_str(&generated).is_ok());

        headers.insert(IDEMPOTENCY_HEADER, HeaderValue::from_static("pedido-123"));
        assert_eq!(idempotency_key(&headers).unwrap(), "pedido-123");

        headers.insert(
            IDEMPOTENCY_HEADER,
            HeaderValue::from_str(&"k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1)).unwrap(),
        );
        assert!(idempotency_key(&headers).is_err());
    }

    #[test]
    fn test_resolve_items_rejects_quantity_above_cap() {
        let huge = [RequestedItem {
            id: "vaso-pla".to_owned(),
            quantity: u32::MAX,
        }];
        assert!(matches!(
            resolve_items(Some(&huge), &session_items()),
            Err(AppError::Cart(CartError::InvalidQuantity))
        ));

        let at_cap = [RequestedItem {
            id: "vaso-pla".to_owned(),
            quantity: MAX_QUANTITY,
        }];
        assert!(resolve_items(Some(&at_cap), &session_items()).is_ok());
    }

    #[test]
    fn test_order_code_is_stable_per_owner_and_key() {
        assert_eq!(order_code("session:a", "abc"), order_code("session:a", "abc"));
        assert_ne!(order_code("session:a", "abc"), order_code("session:a", "abd"));
        assert_ne!(order_code("session:a", "abc"), order_code("session:b", "abc"));
        assert_ne!(order_code("user:1", "abc"), order_code("session:1", "abc"));
        assert!(order_code("session:a", "abc").len() <= 52);
    }

    fn request(value: serde_json::Value) -> CreateOrderRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_fingerprint_tracks_what_was_asked() {
        let original = request(serde_json::json!({
            "items": [{"id": "vaso-pla", "quantity": 2}],
            "customer": {"name": "Ana", "email": "ana@exemplo.com", "document": "52998224725"},
            "payment": {"method": "pix"},
        }));
        let same = request(serde_json::json!({
            "items": [{"id": "vaso-pla", "quantity": 2}],
            "customer": {"name": "Ana Souza", "email": "ana@exemplo.com", "document": "52998224725"},
            "payments": [{"method": "pix"}],
        }));
        assert_eq!(request_fingerprint(&original), request_fingerprint(&same));

        let more = request(serde_json::json!({
            "items": [{"id": "vaso-pla", "quantity": 3}],
            "customer": {"name": "Ana", "email": "ana@exemplo.com", "document": "52998224725"},
            "payment": {"method": "pix"},
        }));
        assert_ne!(request_fingerprint(&original), request_fingerprint(&more));

        let other_buyer = request(serde_json::json!({
            "items": [{"id": "vaso-pla", "quantity": 2}],
            "customer": {"name": "Bia", "email": "bia@exemplo.com", "document": "11144477735"},
            "payment": {"method": "pix"},
        }));
        assert_ne!(request_fingerprint(&original), request_fingerprint(&other_buyer));

        let boleto = request(serde_json::json!({
            "items": [{"id": "vaso-pla", "quantity": 2}],
            "customer": {"name": "Ana", "email": "ana@exemplo.com", "document": "52998224725"},
            "payment": {"method": "boleto"},
        }));
        assert_ne!(request_fingerprint(&original), request_fingerprint(&boleto));
    }

    fn memory_session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_fresh_session_has_no_owner_to_replay() {
        let session = memory_session();
        assert_eq!(existing_owner(&session, None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_owner_is_created_once() {
        let session = memory_session();
        let owner = new_session_owner(&session).await.unwrap();
        assert!(owner.starts_with("session:"));
        assert_eq!(existing_owner(&session, None).await.unwrap(), Some(owner.clone()));

        // Another session gets a different owner for the same key space
        let other = memory_session();
        let other_owner = new_session_owner(&other).await.unwrap();
        assert_ne!(owner, other_owner);
    }

    #[tokio::test]
    async fn test_logged_in_owner_is_the_account() {
        let session = memory_session();
        new_session_owner(&session).await.unwrap();
        let user = CurrentUser {
            id: UserId::new(42),
            email: Email::parse("ana@exemplo.com").unwrap(),
        };
        assert_eq!(
            existing_owner(&session, Some(&user)).await.unwrap(),
            Some("user:42".to_owned())
        );
    }

    #[test]
    fn test_payment_wins_over_payments() {
        let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "payment": {"method": "pix"},
            "payments": [{"method": "boleto"}],
        }))
        .unwrap();
        let chosen = request
            .payment
            .or_else(|| request.payments.into_iter().next())
            .unwrap();
        assert_eq!(chosen.kind().as_str(), "pix");
    }

    #[test]
    fn test_response_flattens_outcome() {
        use filamento_core::ChargeStatus;
        use filamento_core::payment::PaymentMethodKind;

        let response = CreateOrderResponse {
            outcome: OrderOutcome {
                success: true,
                order_id: "or_123".to_owned(),
                order_status: Some("paid".to_owned()),
                charge_status: ChargeStatus::Paid,
                transaction_status: ChargeStatus::Paid,
                payment_method: PaymentMethodKind::CreditCard,
                boleto: None,
                pix: None,
                message: None,
            },
            local_order_id: Some(OrderId::new(7)),
            idempotency_key: "k".to_owned(),
            replayed: false,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["orderId"], "or_123");
        assert_eq!(json["localOrderId"], 7);
        assert_eq!(json["chargeStatus"], "paid");
    }
}
