//! Outbound `POST /orders` body.
//!
//! Only validated data reaches this module: [`build_order_request`] takes a
//! [`ValidatedCheckout`] so every field below is already normalized.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use filamento_core::Price;
use filamento_core::br::Phone;
use filamento_core::cart::CartItem;
use filamento_core::payment::{
    PaymentMethodKind, ValidCard, ValidatedAddress, ValidatedBuyer, ValidatedCheckout,
    ValidatedPayment,
};

use super::PagarmeError;

/// Boleto instructions printed when the buyer gives none.
const DEFAULT_BOLETO_INSTRUCTIONS: &str = "Pagar até o vencimento";

/// Boleto document kind ("duplicata mercantil").
const BOLETO_TYPE: &str = "DM";

/// Gateway descriptors are capped at 13 characters.
const MAX_STATEMENT_DESCRIPTOR: usize = 13;

/// Per-store values that shape every order.
#[derive(Debug, Clone)]
pub struct OrderSettings {
    pub statement_descriptor: String,
    pub boleto_due_days: u32,
    pub pix_expires_in: u32,
    /// Reference time for boleto due dates.
    pub now: DateTime<Utc>,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    /// Store-side reference, echoed back by the gateway.
    pub code: String,
    pub items: Vec<OrderItem>,
    pub customer: Customer,
    pub payments: Vec<Payment>,
    pub closed: bool,
    pub metadata: BTreeMap<String, String>,
}

impl CreateOrderRequest {
    /// Method of the (single) payment entry.
    #[must_use]
    pub fn payment_method(&self) -> Option<PaymentMethodKind> {
        self.payments.first().map(Payment::kind)
    }

    /// Sum of `amount * quantity` in centavos.
    #[must_use]
    pub fn total_cents(&self) -> i64 {
        self.items
            .iter()
            .map(|i| i.amount.saturating_mul(i64::from(i.quantity)))
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OrderItem {
    /// Unit price in centavos.
    pub amount: i64,
    pub description: String,
    pub quantity: u32,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<&'static str>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phones: Option<Phones>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Phones {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_phone: Option<PhoneNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_phone: Option<PhoneNumber>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhoneNumber {
    pub country_code: &'static str,
    pub area_code: String,
    pub number: String,
}

/// Gateway address: `line_1` is "number, street, neighborhood".
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Address {
    pub line_1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_2: Option<String>,
    pub zip_code: String,
    pub city: String,
    pub state: String,
    pub country: &'static str,
}

/// One entry of `payments[]`, tagged by `payment_method`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "payment_method", rename_all = "snake_case")]
pub enum Payment {
    CreditCard { credit_card: CreditCardPayment },
    Boleto { boleto: BoletoPayment },
    Pix { pix: PixPayment },
}

impl Payment {
    #[must_use]
    pub const fn kind(&self) -> PaymentMethodKind {
        match self {
            Self::CreditCard { .. } => PaymentMethodKind::CreditCard,
            Self::Boleto { .. } => PaymentMethodKind::Boleto,
            Self::Pix { .. } => PaymentMethodKind::Pix,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditCardPayment {
    pub installments: u32,
    pub statement_descriptor: String,
    pub card: Card,
}

/// Raw card data. `Debug` prints only the last four digits.
#[derive(Clone, Serialize)]
pub struct Card {
    pub number: String,
    pub holder_name: String,
    pub exp_month: u32,
    pub exp_year: i32,
    pub cvv: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last_four = self.number.get(self.number.len().saturating_sub(4)..).unwrap_or("");
        f.debug_struct("Card")
            .field("last_four", &last_four)
            .field("holder_name", &self.holder_name)
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoletoPayment {
    pub instructions: String,
    pub due_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PixPayment {
    /// QR code lifetime in seconds.
    pub expires_in: u32,
}

/// Assemble the gateway body for a validated checkout.
///
/// # Errors
///
/// Returns [`PagarmeError::InvalidRequest`] if there are no items or an item
/// price cannot be expressed as a positive amount of centavos.
pub fn build_order_request(
    code: &str,
    items: &[CartItem],
    checkout: &ValidatedCheckout,
    settings: &OrderSettings,
) -> Result<CreateOrderRequest, PagarmeError> {
    if items.is_empty() {
        return Err(PagarmeError::InvalidRequest("pedido sem itens".to_owned()));
    }

    let items = items.iter().map(order_item).collect::<Result<Vec<_>, _>>()?;
    let customer = customer(&checkout.buyer);
    let payment = payment(checkout, settings);

    let mut metadata = BTreeMap::new();
    metadata.insert("source".to_owned(), "filamento-storefront".to_owned());
    metadata.insert(
        "payment_method".to_owned(),
        checkout.payment.kind().as_str().to_owned(),
    );

    Ok(CreateOrderRequest {
        code: code.to_owned(),
        items,
        customer,
        payments: vec![payment],
        closed: true,
        metadata,
    })
}

fn order_item(item: &CartItem) -> Result<OrderItem, PagarmeError> {
    let amount = Price::brl(item.price)
        .to_cents()
        .filter(|cents| *cents > 0)
        .ok_or_else(|| {
            PagarmeError::InvalidRequest(format!("preço inválido para o item {}", item.id))
        })?;
    if item.quantity == 0 {
        return Err(PagarmeError::InvalidRequest(format!(
            "quantidade inválida para o item {}",
            item.id
        )));
    }

    Ok(OrderItem {
        amount,
        description: describe(item),
        quantity: item.quantity,
        code: item.id.clone(),
    })
}

/// "Suporte (PLA, medium, Azul)"
fn describe(item: &CartItem) -> String {
    let details: Vec<&str> = [
        item.material.map(filamento_core::pricing::Material::name),
        item.fill.map(filamento_core::pricing::FillTier::as_str),
        item.color.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();

    if details.is_empty() {
        item.name.clone()
    } else {
        format!("{} ({})", item.name, details.join(", "))
    }
}

fn address(address: &ValidatedAddress) -> Address {
    Address {
        line_1: format!(
            "{}, {}, {}",
            address.number, address.street, address.neighborhood
        ),
        line_2: address.complement.clone(),
        zip_code: address.zip_code.as_str().to_owned(),
        city: address.city.clone(),
        state: address.state.clone(),
        country: "BR",
    }
}

fn phone_number(phone: &Phone) -> PhoneNumber {
    PhoneNumber {
        country_code: Phone::COUNTRY_CODE,
        area_code: phone.area_code.clone(),
        number: phone.number.clone(),
    }
}

fn customer(buyer: &ValidatedBuyer) -> Customer {
    let phones = buyer.phone.as_ref().map(|phone| {
        if phone.is_mobile() {
            Phones {
                mobile_phone: Some(phone_number(phone)),
                home_phone: None,
            }
        } else {
            Phones {
                mobile_phone: None,
                home_phone: Some(phone_number(phone)),
            }
        }
    });

    Customer {
        name: buyer.name.clone(),
        email: buyer.email.as_str().to_owned(),
        document: buyer.document.as_ref().map(|d| d.digits().to_owned()),
        document_type: buyer.document.as_ref().map(|d| d.document_type()),
        kind: buyer
            .document
            .as_ref()
            .map_or("individual", |d| d.customer_type()),
        phones,
        address: buyer.address.as_ref().map(address),
    }
}

fn card(card: &ValidCard, billing_address: Option<Address>) -> Card {
    Card {
        number: card.number.clone(),
        holder_name: card.holder_name.clone(),
        exp_month: card.exp_month,
        exp_year: card.exp_year,
        cvv: card.cvv.clone(),
        billing_address,
    }
}

fn payment(checkout: &ValidatedCheckout, settings: &OrderSettings) -> Payment {
    match &checkout.payment {
        ValidatedPayment::CreditCard {
            card: valid,
            installments,
        } => Payment::CreditCard {
            credit_card: CreditCardPayment {
                installments: *installments,
                statement_descriptor: settings
                    .statement_descriptor
                    .chars()
                    .take(MAX_STATEMENT_DESCRIPTOR)
                    .collect(),
                card: card(valid, checkout.buyer.address.as_ref().map(address)),
            },
        },
        ValidatedPayment::Boleto { instructions } => Payment::Boleto {
            boleto: BoletoPayment {
                instructions: instructions
                    .as_deref()
                    .map(str::trim)
                    .filter(|i| !i.is_empty())
                    .unwrap_or(DEFAULT_BOLETO_INSTRUCTIONS)
                    .to_owned(),
                due_at: settings.now + Duration::days(i64::from(settings.boleto_due_days)),
                kind: BOLETO_TYPE,
            },
        },
        ValidatedPayment::Pix { expires_in } => Payment::Pix {
            pix: PixPayment {
                expires_in: expires_in.unwrap_or(settings.pix_expires_in),
            },
        },
    }
}
