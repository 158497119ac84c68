//! Payment method model.
//!
//! A checkout carries one [`PaymentMethod`]. Each variant validates its own
//! fields together with the buyer data it depends on, producing a
//! [`ValidatedCheckout`] that the gateway request builder accepts. Nothing
//! unvalidated reaches the network.

use core::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::br::{Document, DocumentError, Phone, ZipCode};
use crate::types::Email;

const MAX_INSTALLMENTS: u32 = 12;

/// Validation failures, with messages shown to the buyer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentValidationError {
    #[error("Nome do comprador é obrigatório")]
    MissingName,
    #[error("E-mail inválido")]
    InvalidEmail,
    #[error("CPF/CNPJ é obrigatório para pagamento via {0}")]
    MissingDocument(PaymentMethodKind),
    #[error("{0}")]
    InvalidDocument(DocumentError),
    #[error("Endereço é obrigatório para pagamento via {0}")]
    MissingAddress(PaymentMethodKind),
    #[error("Endereço incompleto: {0} é obrigatório")]
    IncompleteAddress(&'static str),
    #[error("CEP inválido")]
    InvalidZipCode,
    #[error("UF inválida")]
    InvalidState,
    #[error("Telefone inválido")]
    InvalidPhone,
    #[error("Número do cartão inválido")]
    InvalidCardNumber,
    #[error("Nome impresso no cartão é obrigatório")]
    MissingHolderName,
    #[error("Mês de validade inválido")]
    InvalidExpiryMonth,
    #[error("Cartão vencido")]
    CardExpired,
    #[error("CVV deve ter 3 ou 4 dígitos")]
    InvalidCvv,
    #[error("Parcelamento deve ser entre 1 e 12 vezes")]
    InvalidInstallments,
}

/// Payment method discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    CreditCard,
    Boleto,
    Pix,
}

impl PaymentMethodKind {
    /// Gateway `payment_method` value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::Boleto => "boleto",
            Self::Pix => "pix",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::CreditCard => "cartão de crédito",
            Self::Boleto => "boleto",
            Self::Pix => "PIX",
        }
    }
}

impl fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for PaymentMethodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" => Ok(Self::CreditCard),
            "boleto" => Ok(Self::Boleto),
            "pix" => Ok(Self::Pix),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Buyer data as submitted by the checkout form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<BillingAddress>,
}

/// Address as submitted by the checkout form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
}

/// Payment method chosen at checkout, tagged by `method`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard(CardDetails),
    Boleto(BoletoDetails),
    Pix(PixDetails),
}

/// Card fields. `Debug` never prints the number or the CVV.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub number: String,
    pub holder_name: String,
    pub exp_month: u32,
    /// Two or four digit year.
    pub exp_year: u32,
    pub cvv: String,
    #[serde(default = "default_installments")]
    pub installments: u32,
}

const fn default_installments() -> u32 {
    1
}

/// Boleto options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BoletoDetails {
    #[serde(default)]
    pub instructions: Option<String>,
}

/// PIX options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PixDetails {
    /// QR code lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u32>,
}

impl fmt::Debug for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreditCard(card) => f.debug_tuple("CreditCard").field(card).finish(),
            Self::Boleto(b) => f.debug_tuple("Boleto").field(b).finish(),
            Self::Pix(p) => f.debug_tuple("Pix").field(p).finish(),
        }
    }
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &"[REDACTED]")
            .field("holder_name", &self.holder_name)
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvv", &"[REDACTED]")
            .field("installments", &self.installments)
            .finish()
    }
}

/// Buyer after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBuyer {
    pub name: String,
    pub email: Email,
    pub document: Option<Document>,
    pub phone: Option<Phone>,
    pub address: Option<ValidatedAddress>,
}

/// Address after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAddress {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    /// Two letter state code, uppercase.
    pub state: String,
    pub zip_code: ZipCode,
}

/// A card that passed validation.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidCard {
    pub number: String,
    pub holder_name: String,
    pub exp_month: u32,
    /// Four digit year.
    pub exp_year: i32,
    pub cvv: String,
}

impl ValidCard {
    /// Last four digits, for logs and receipts.
    #[must_use]
    pub fn last_four(&self) -> &str {
        self.number.get(self.number.len().saturating_sub(4)..).unwrap_or("")
    }
}

impl fmt::Debug for ValidCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidCard")
            .field("last_four", &self.last_four())
            .field("holder_name", &self.holder_name)
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .finish_non_exhaustive()
    }
}

/// Payment method after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedPayment {
    CreditCard { card: ValidCard, installments: u32 },
    Boleto { instructions: Option<String> },
    Pix { expires_in: Option<u32> },
}

impl ValidatedPayment {
    /// Discriminant.
    #[must_use]
    pub const fn kind(&self) -> PaymentMethodKind {
        match self {
            Self::CreditCard { .. } => PaymentMethodKind::CreditCard,
            Self::Boleto { .. } => PaymentMethodKind::Boleto,
            Self::Pix { .. } => PaymentMethodKind::Pix,
        }
    }
}

/// Buyer and payment ready for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCheckout {
    pub buyer: ValidatedBuyer,
    pub payment: ValidatedPayment,
}

impl PaymentMethod {
    /// Discriminant.
    #[must_use]
    pub const fn kind(&self) -> PaymentMethodKind {
        match self {
            Self::CreditCard(_) => PaymentMethodKind::CreditCard,
            Self::Boleto(_) => PaymentMethodKind::Boleto,
            Self::Pix(_) => PaymentMethodKind::Pix,
        }
    }

    /// Validate this method against the buyer data.
    ///
    /// `today` decides whether a card has expired.
    ///
    /// # Errors
    ///
    /// Returns the first [`PaymentValidationError`] found.
    pub fn validate(
        &self,
        buyer: &Buyer,
        today: NaiveDate,
    ) -> Result<ValidatedCheckout, PaymentValidationError> {
        let kind = self.kind();
        let needs_document_and_address =
            matches!(kind, PaymentMethodKind::Boleto | PaymentMethodKind::Pix);

        let name = buyer.name.trim();
        if name.is_empty() {
            return Err(PaymentValidationError::MissingName);
        }
        let email = Email::parse(&buyer.email).map_err(|_| PaymentValidationError::InvalidEmail)?;

        let document = match non_blank(buyer.document.as_deref()) {
            Some(raw) => Some(Document::parse(raw).map_err(PaymentValidationError::InvalidDocument)?),
            None if needs_document_and_address => {
                return Err(PaymentValidationError::MissingDocument(kind));
            }
            None => None,
        };

        let address = match &buyer.address {
            Some(address) => Some(validate_address(address)?),
            None if needs_document_and_address => {
                return Err(PaymentValidationError::MissingAddress(kind));
            }
            None => None,
        };

        let phone = non_blank(buyer.phone.as_deref())
            .map(Phone::parse)
            .transpose()
            .map_err(|_| PaymentValidationError::InvalidPhone)?;

        let payment = match self {
            Self::CreditCard(card) => {
                if !(1..=MAX_INSTALLMENTS).contains(&card.installments) {
                    return Err(PaymentValidationError::InvalidInstallments);
                }
                ValidatedPayment::CreditCard {
                    card: validate_card(card, today)?,
                    installments: card.installments,
                }
            }
            Self::Boleto(boleto) => ValidatedPayment::Boleto {
                instructions: boleto.instructions.clone(),
            },
            Self::Pix(pix) => ValidatedPayment::Pix {
                expires_in: pix.expires_in,
            },
        };

        Ok(ValidatedCheckout {
            buyer: ValidatedBuyer {
                name: name.to_owned(),
                email,
                document,
                phone,
                address,
            },
            payment,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required(value: &str, field: &'static str) -> Result<String, PaymentValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PaymentValidationError::IncompleteAddress(field));
    }
    Ok(value.to_owned())
}

impl BillingAddress {
    /// Validate and normalize the address.
    ///
    /// # Errors
    ///
    /// Returns the first [`PaymentValidationError`] found.
    pub fn validate(&self) -> Result<ValidatedAddress, PaymentValidationError> {
        validate_address(self)
    }
}

fn validate_address(address: &BillingAddress) -> Result<ValidatedAddress, PaymentValidationError> {
    let zip_code =
        ZipCode::parse(&address.zip_code).map_err(|_| PaymentValidationError::InvalidZipCode)?;

    let state = address.state.trim().to_uppercase();
    if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(PaymentValidationError::InvalidState);
    }

    Ok(ValidatedAddress {
        street: required(&address.street, "rua")?,
        number: required(&address.number, "número")?,
        complement: non_blank(address.complement.as_deref()).map(str::to_owned),
        neighborhood: required(&address.neighborhood, "bairro")?,
        city: required(&address.city, "cidade")?,
        state,
        zip_code,
    })
}

/// Luhn checksum over an all-digit string.
fn luhn_valid(digits: &str) -> bool {
    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

fn validate_card(card: &CardDetails, today: NaiveDate) -> Result<ValidCard, PaymentValidationError> {
    let number: String = card.number.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !(13..=19).contains(&number.len())
        || !number.chars().all(|c| c.is_ascii_digit())
        || !luhn_valid(&number)
    {
        return Err(PaymentValidationError::InvalidCardNumber);
    }

    let holder_name = card.holder_name.trim();
    if holder_name.is_empty() {
        return Err(PaymentValidationError::MissingHolderName);
    }

    if !(1..=12).contains(&card.exp_month) {
        return Err(PaymentValidationError::InvalidExpiryMonth);
    }
    let exp_year = i32::try_from(card.exp_year).map_err(|_| PaymentValidationError::CardExpired)?;
    let exp_year = if exp_year < 100 { 2000 + exp_year } else { exp_year };

    // Valid through the last day of the expiry month
    let current = (today.year(), today.month());
    if (exp_year, card.exp_month) < current {
        return Err(PaymentValidationError::CardExpired);
    }

    let cvv = card.cvv.trim();
    if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(PaymentValidationError::InvalidCvv);
    }

    Ok(ValidCard {
        number,
        holder_name: holder_name.to_uppercase(),
        exp_month: card.exp_month,
        exp_year,
        cvv: cvv.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn address() -> BillingAddress {
        BillingAddress {
            street: "Av. Paulista".to_owned(),
            number: "1000".to_owned(),
            complement: Some("  ".to_owned()),
            neighborhood: "Bela Vista".to_owned(),
            city: "São Paulo".to_owned(),
            state: "sp".to_owned(),
            zip_code: "01310-100".to_owned(),
        }
    }

    fn buyer() -> Buyer {
        Buyer {
            name: "Maria Souza".to_owned(),
            email: "maria@exemplo.com.br".to_owned(),
            document: Some("529.982.247-25".to_owned()),
            phone: Some("(11) 98765-4321".to_owned()),
            address: Some(address()),
        }
    }

    fn card() -> CardDetails {
        CardDetails {
            number: "4111 1111 1111 1111".to_owned(),
            holder_name: "Maria Souza".to_owned(),
            exp_month: 12,
            exp_year: 2030,
            cvv: "123".to_owned(),
            installments: 1,
        }
    }

    #[test]
    fn test_boleto_without_address_short_circuits() {
        let mut buyer = buyer();
        buyer.address = None;
        let result = PaymentMethod::Boleto(BoletoDetails::default()).validate(&buyer, today());
        assert_eq!(
            result,
            Err(PaymentValidationError::MissingAddress(PaymentMethodKind::Boleto))
        );
    }

    #[test]
    fn test_pix_requires_document() {
        let mut buyer = buyer();
        buyer.document = Some("   ".to_owned());
        let result = PaymentMethod::Pix(PixDetails::default()).validate(&buyer, today());
        assert_eq!(
            result,
            Err(PaymentValidationError::MissingDocument(PaymentMethodKind::Pix))
        );
    }

    #[test]
    fn test_invalid_document_rejected() {
        let mut buyer = buyer();
        buyer.document = Some("111.111.111-11".to_owned());
        let result = PaymentMethod::Pix(PixDetails::default()).validate(&buyer, today());
        assert_eq!(
            result,
            Err(PaymentValidationError::InvalidDocument(DocumentError::InvalidCpf))
        );
    }

    #[test]
    fn test_invalid_zip_code_rejected() {
        let mut buyer = buyer();
        let mut addr = address();
        addr.zip_code = "0131".to_owned();
        buyer.address = Some(addr);
        let result = PaymentMethod::Boleto(BoletoDetails::default()).validate(&buyer, today());
        assert_eq!(result, Err(PaymentValidationError::InvalidZipCode));
    }

    #[test]
    fn test_boleto_validates_and_normalizes() {
        let checkout = PaymentMethod::Boleto(BoletoDetails::default())
            .validate(&buyer(), today())
            .unwrap();
        let address = checkout.buyer.address.unwrap();
        assert_eq!(address.state, "SP");
        assert_eq!(address.complement, None);
        assert_eq!(address.zip_code.as_str(), "01310100");
        assert_eq!(checkout.payment.kind(), PaymentMethodKind::Boleto);
    }

    #[test]
    fn test_credit_card_without_document_or_address() {
        let buyer = Buyer {
            document: None,
            address: None,
            phone: None,
            ..buyer()
        };
        let checkout = PaymentMethod::CreditCard(card()).validate(&buyer, today()).unwrap();
        let ValidatedPayment::CreditCard { card, installments } = checkout.payment else {
            panic!("expected credit card");
        };
        assert_eq!(card.number, "4111111111111111");
        assert_eq!(card.last_four(), "1111");
        assert_eq!(card.holder_name, "MARIA SOUZA");
        assert_eq!(installments, 1);
    }

    #[test]
    fn test_card_number_must_pass_luhn() {
        let mut details = card();
        details.number = "4111111111111112".to_owned();
        let result = PaymentMethod::CreditCard(details).validate(&buyer(), today());
        assert_eq!(result, Err(PaymentValidationError::InvalidCardNumber));
    }

    #[test]
    fn test_card_expiry() {
        let mut details = card();
        details.exp_month = 9;
        details.exp_year = 26;
        let result = PaymentMethod::CreditCard(details.clone()).validate(&buyer(), today());
        assert_eq!(result, Err(PaymentValidationError::CardExpired));

        // Current month is still valid
        details.exp_month = 10;
        assert!(PaymentMethod::CreditCard(details).validate(&buyer(), today()).is_ok());
    }

    #[test]
    fn test_card_cvv_and_month() {
        let mut details = card();
        details.cvv = "12".to_owned();
        assert_eq!(
            PaymentMethod::CreditCard(details.clone()).validate(&buyer(), today()),
            Err(PaymentValidationError::InvalidCvv)
        );

        details.cvv = "1234".to_owned();
        details.exp_month = 13;
        assert_eq!(
            PaymentMethod::CreditCard(details).validate(&buyer(), today()),
            Err(PaymentValidationError::InvalidExpiryMonth)
        );
    }

    #[test]
    fn test_installments_bounds() {
        let mut details = card();
        details.installments = 13;
        assert_eq!(
            PaymentMethod::CreditCard(details).validate(&buyer(), today()),
            Err(PaymentValidationError::InvalidInstallments)
        );
    }

    #[test]
    fn test_tagged_deserialization() {
        let method: PaymentMethod = serde_json::from_str(
            r#"{"method":"credit_card","number":"4111111111111111","holder_name":"A",
                "exp_month":1,"exp_year":2031,"cvv":"123"}"#,
        )
        .unwrap();
        assert_eq!(method.kind(), PaymentMethodKind::CreditCard);

        let method: PaymentMethod = serde_json::from_str(r#"{"method":"pix"}"#).unwrap();
        assert_eq!(method, PaymentMethod::Pix(PixDetails::default()));
    }

    #[test]
    fn test_card_debug_is_redacted() {
        let debug = format!("{:?}", PaymentMethod::CreditCard(card()));
        assert!(!debug.contains("4111"));
        assert!(!debug.contains("123"));
    }
}
