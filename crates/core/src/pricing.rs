//! Print cost calculation.
//!
//! The slicing service estimates the filament weight and print time for an
//! uploaded model. The price of one piece is the filament cost plus the
//! energy the printer draws during the print:
//!
//! ```text
//! unit  = (weight_g / 1000) * price_per_kg + (watts / 1000) * hours * rate
//! total = round_cents(unit) * quantity
//! ```

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Named infill density tiers offered in the configurator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FillTier {
    Solid,
    High,
    #[default]
    Medium,
    Low,
    Hollow,
}

impl FillTier {
    /// Every tier, densest first.
    pub const ALL: [Self; 5] = [Self::Solid, Self::High, Self::Medium, Self::Low, Self::Hollow];

    /// Infill percentage sent to the slicer.
    #[must_use]
    pub const fn percent(self) -> u8 {
        match self {
            Self::Solid => 100,
            Self::High => 75,
            Self::Medium => 50,
            Self::Low => 25,
            Self::Hollow => 0,
        }
    }

    /// Lowercase tier name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Solid => "solid",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Hollow => "hollow",
        }
    }
}

/// Filament materials and their price per kilogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    Pla,
    Abs,
    Petg,
    Tpu,
    Nylon,
}

impl Material {
    /// Every material in catalog order.
    pub const ALL: [Self; 5] = [Self::Pla, Self::Abs, Self::Petg, Self::Tpu, Self::Nylon];

    /// Identifier understood by the slicing service.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Pla => "pla",
            Self::Abs => "abs",
            Self::Petg => "petg",
            Self::Tpu => "tpu",
            Self::Nylon => "nylon",
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pla => "PLA",
            Self::Abs => "ABS",
            Self::Petg => "PETG",
            Self::Tpu => "TPU (flexível)",
            Self::Nylon => "Nylon",
        }
    }

    /// Filament price in BRL per kilogram.
    #[must_use]
    pub const fn price_per_kg(self) -> Decimal {
        match self {
            Self::Pla => Decimal::from_parts(12000, 0, 0, false, 2),
            Self::Abs => Decimal::from_parts(11000, 0, 0, false, 2),
            Self::Petg => Decimal::from_parts(13000, 0, 0, false, 2),
            Self::Tpu => Decimal::from_parts(18000, 0, 0, false, 2),
            Self::Nylon => Decimal::from_parts(25000, 0, 0, false, 2),
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for Material {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown material: {s}"))
    }
}

/// Estimated print duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PrintTime {
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub seconds: u32,
}

impl PrintTime {
    /// Duration in fractional hours.
    #[must_use]
    pub fn as_hours(&self) -> Decimal {
        Decimal::from(self.hours)
            + Decimal::from(self.minutes) / Decimal::from(60)
            + Decimal::from(self.seconds) / Decimal::from(3600)
    }
}

/// What the slicing service reported for one model/material combination.
///
/// Either field may be missing when the slicer could not process the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SliceEstimate {
    pub weight_grams: Option<Decimal>,
    pub time: Option<PrintTime>,
}

/// Printer power draw and electricity tariff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyRates {
    /// Average power draw while printing, in watts.
    pub printer_watts: Decimal,
    /// Electricity price in BRL per kWh.
    pub electricity_rate: Decimal,
}

impl Default for EnergyRates {
    fn default() -> Self {
        Self {
            printer_watts: Decimal::from(200),
            electricity_rate: Decimal::new(85, 2),
        }
    }
}

/// Cost breakdown for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub material: Material,
    pub weight_grams: Decimal,
    pub time: PrintTime,
    /// Filament cost for one piece.
    pub material_cost: Decimal,
    /// Energy cost for one piece.
    pub energy_cost: Decimal,
    /// Price of one piece, rounded to centavos.
    pub unit_price: Decimal,
    pub quantity: u32,
    /// `unit_price * quantity`.
    pub total_price: Decimal,
}

/// Price for one material, `None` when the estimate was unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialQuote {
    pub material: Material,
    pub quote: Option<PriceQuote>,
}

impl MaterialQuote {
    /// Whether a price could be computed.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.quote.is_some()
    }
}

fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute the price of `quantity` pieces.
///
/// Returns `None` when the weight, the material or the time is missing, or
/// when `quantity` is zero.
#[must_use]
pub fn calculate_material_price(
    weight_grams: Option<Decimal>,
    material: Option<Material>,
    time: Option<PrintTime>,
    quantity: u32,
    rates: &EnergyRates,
) -> Option<PriceQuote> {
    let (weight_grams, material, time) = (weight_grams?, material?, time?);
    if quantity == 0 || weight_grams.is_sign_negative() {
        return None;
    }

    let thousand = Decimal::from(1000);
    let material_cost = weight_grams / thousand * material.price_per_kg();
    let energy_cost =
        rates.printer_watts / thousand * time.as_hours() * rates.electricity_rate;
    let unit_price = round_cents(material_cost + energy_cost);

    Some(PriceQuote {
        material,
        weight_grams,
        time,
        material_cost: round_cents(material_cost),
        energy_cost: round_cents(energy_cost),
        unit_price,
        quantity,
        total_price: unit_price * Decimal::from(quantity),
    })
}

/// Price a slicer estimate for `material`.
#[must_use]
pub fn quote_estimate(
    estimate: &SliceEstimate,
    material: Material,
    quantity: u32,
    rates: &EnergyRates,
) -> MaterialQuote {
    MaterialQuote {
        material,
        quote: calculate_material_price(
            estimate.weight_grams,
            Some(material),
            estimate.time,
            quantity,
            rates,
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn two_hours() -> PrintTime {
        PrintTime {
            hours: 2,
            minutes: 0,
            seconds: 0,
        }
    }

    #[test]
    fn test_fill_tier_percentages() {
        let percents: Vec<u8> = FillTier::ALL.iter().map(|t| t.percent()).collect();
        assert_eq!(percents, vec![100, 75, 50, 25, 0]);
    }

    #[test]
    fn test_price_follows_formula() {
        // 100 g of PLA = 12.00, 200 W * 2 h * 0.85 = 0.34
        let quote = calculate_material_price(
            Some(Decimal::from(100)),
            Some(Material::Pla),
            Some(two_hours()),
            1,
            &EnergyRates::default(),
        )
        .unwrap();

        assert_eq!(quote.material_cost, Decimal::new(1200, 2));
        assert_eq!(quote.energy_cost, Decimal::new(34, 2));
        assert_eq!(quote.unit_price, Decimal::new(1234, 2));
        assert_eq!(quote.total_price, Decimal::new(1234, 2));
    }

    #[test]
    fn test_price_scales_with_quantity() {
        let quote = calculate_material_price(
            Some(Decimal::from(100)),
            Some(Material::Pla),
            Some(two_hours()),
            3,
            &EnergyRates::default(),
        )
        .unwrap();
        assert_eq!(quote.total_price, Decimal::new(3702, 2));
    }

    #[test]
    fn test_partial_hours() {
        let time = PrintTime {
            hours: 1,
            minutes: 30,
            seconds: 0,
        };
        assert_eq!(time.as_hours(), Decimal::new(15, 1));

        let rates = EnergyRates {
            printer_watts: Decimal::from(1000),
            electricity_rate: Decimal::ONE,
        };
        let quote = calculate_material_price(
            Some(Decimal::from(500)),
            Some(Material::Nylon),
            Some(time),
            2,
            &rates,
        )
        .unwrap();
        // 0.5 kg * 250 + 1 kW * 1.5 h * 1.00 = 126.50
        assert_eq!(quote.unit_price, Decimal::new(12650, 2));
        assert_eq!(quote.total_price, Decimal::new(25300, 2));
    }

    #[test]
    fn test_missing_inputs_return_none() {
        let rates = EnergyRates::default();
        let weight = Some(Decimal::from(10));
        let time = Some(two_hours());
        assert!(calculate_material_price(None, Some(Material::Abs), time, 1, &rates).is_none());
        assert!(calculate_material_price(weight, None, time, 1, &rates).is_none());
        assert!(calculate_material_price(weight, Some(Material::Abs), None, 1, &rates).is_none());
        assert!(calculate_material_price(weight, Some(Material::Abs), time, 0, &rates).is_none());
    }

    #[test]
    fn test_quote_estimate_marks_unavailable() {
        let estimate = SliceEstimate {
            weight_grams: None,
            time: Some(two_hours()),
        };
        let quote = quote_estimate(&estimate, Material::Petg, 1, &EnergyRates::default());
        assert_eq!(quote.material, Material::Petg);
        assert!(!quote.is_available());
    }

    #[test]
    fn test_material_from_str() {
        assert_eq!("PETG".parse::<Material>().unwrap(), Material::Petg);
        assert!("wood".parse::<Material>().is_err());
    }
}
