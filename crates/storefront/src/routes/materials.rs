//! Material catalog.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Serialize;

use filamento_core::pricing::{EnergyRates, FillTier, Material};

use crate::state::AppState;

/// One material with its filament price.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialView {
    pub id: Material,
    pub name: &'static str,
    pub price_per_kg: Decimal,
}

/// One infill tier.
#[derive(Debug, Serialize)]
pub struct FillTierView {
    pub id: FillTier,
    pub percent: u8,
}

/// Energy figures used in the price.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyView {
    pub printer_watts: Decimal,
    pub electricity_rate: Decimal,
}

impl From<&EnergyRates> for EnergyView {
    fn from(rates: &EnergyRates) -> Self {
        Self {
            printer_watts: rates.printer_watts,
            electricity_rate: rates.electricity_rate,
        }
    }
}

/// Everything the configurator needs to render its options.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub materials: Vec<MaterialView>,
    pub fill_tiers: Vec<FillTierView>,
    pub default_fill: FillTier,
    pub energy: EnergyView,
}

fn catalog(rates: &EnergyRates) -> CatalogResponse {
    CatalogResponse {
        materials: Material::ALL
            .into_iter()
            .map(|m| MaterialView {
                id: m,
                name: m.name(),
                price_per_kg: m.price_per_kg(),
            })
            .collect(),
        fill_tiers: FillTier::ALL
            .into_iter()
            .map(|f| FillTierView {
                id: f,
                percent: f.percent(),
            })
            .collect(),
        default_fill: FillTier::default(),
        energy: rates.into(),
    }
}

/// GET /api/materials
pub async fn index(State(state): State<AppState>) -> Json<CatalogResponse> {
    Json(catalog(state.print_service().rates()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_shape() {
        let json = serde_json::to_value(catalog(&EnergyRates::default())).unwrap();
        assert_eq!(json["materials"].as_array().unwrap().len(), 5);
        assert_eq!(json["materials"][0]["id"], "pla");
        assert_eq!(json["materials"][0]["pricePerKg"], "120.00");
        assert_eq!(json["fillTiers"][0]["id"], "solid");
        assert_eq!(json["fillTiers"][0]["percent"], 100);
        assert_eq!(json["defaultFill"], "medium");
        assert_eq!(json["energy"]["printerWatts"], "200");
    }
}
