//! Saved addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use filamento_core::payment::{BillingAddress, PaymentValidationError, ValidatedAddress};
use filamento_core::{AddressId, UserId};

/// A user's saved shipping/billing address.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    #[serde(skip)]
    pub user_id: UserId,
    /// Short name chosen by the user ("Casa", "Trabalho").
    pub label: Option<String>,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    /// CEP, digits only.
    pub zip_code: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Convert to the checkout form shape.
    #[must_use]
    pub fn to_billing(&self) -> BillingAddress {
        BillingAddress {
            street: self.street.clone(),
            number: self.number.clone(),
            complement: self.complement.clone(),
            neighborhood: self.neighborhood.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip_code: self.zip_code.clone(),
        }
    }
}

/// Create/update request for an address.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub address: BillingAddress,
    #[serde(default)]
    pub is_default: bool,
}

/// An [`AddressInput`] that passed validation.
#[derive(Debug, Clone)]
pub struct ValidAddressInput {
    pub label: Option<String>,
    pub address: ValidatedAddress,
    pub is_default: bool,
}

impl AddressInput {
    /// Validate the address fields.
    ///
    /// # Errors
    ///
    /// Returns the first [`PaymentValidationError`] found.
    pub fn validate(&self) -> Result<ValidAddressInput, PaymentValidationError> {
        Ok(ValidAddressInput {
            label: self
                .label
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_owned),
            address: self.address.validate()?,
            is_default: self.is_default,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_address_input_deserializes_flat() {
        let input: AddressInput = serde_json::from_str(
            r#"{"label":" Casa ","street":"Rua Augusta","number":"500",
                "neighborhood":"Consolação","city":"São Paulo","state":"sp",
                "zip_code":"01304-000","isDefault":true}"#,
        )
        .unwrap();
        let valid = input.validate().unwrap();
        assert_eq!(valid.label.as_deref(), Some("Casa"));
        assert_eq!(valid.address.state, "SP");
        assert_eq!(valid.address.zip_code.as_str(), "01304000");
        assert!(valid.is_default);
    }

    #[test]
    fn test_address_input_rejects_bad_zip() {
        let input: AddressInput = serde_json::from_str(
            r#"{"street":"Rua Augusta","number":"500","neighborhood":"Centro",
                "city":"São Paulo","state":"SP","zip_code":"123"}"#,
        )
        .unwrap();
        assert_eq!(
            input.validate().unwrap_err(),
            PaymentValidationError::InvalidZipCode
        );
    }
}
