//! Offline price quote.
//!
//! Prices a print from a weight and duration the operator already knows
//! (read off a local slicer, for instance) without calling the print
//! service. Uses the same formula as the storefront.
//!
//! ```bash
//! fil-cli quote --weight 85.5 --hours 3 --minutes 20 --material petg -q 2
//! ```

use filamento_core::pricing::{
    EnergyRates, Material, MaterialQuote, PrintTime, SliceEstimate, quote_estimate,
};
use rust_decimal::Decimal;

/// Inputs of the `quote` command.
#[derive(Debug, Clone)]
pub struct QuoteArgs {
    pub weight_grams: Decimal,
    pub time: PrintTime,
    /// `None` quotes every material.
    pub material: Option<Material>,
    pub quantity: u32,
    pub rates: EnergyRates,
}

/// Quote the requested materials.
#[must_use]
pub fn quotes(args: &QuoteArgs) -> Vec<MaterialQuote> {
    let estimate = SliceEstimate {
        weight_grams: Some(args.weight_grams),
        time: Some(args.time),
    };
    let materials = args
        .material
        .map_or_else(|| Material::ALL.to_vec(), |m| vec![m]);

    materials
        .into_iter()
        .map(|m| quote_estimate(&estimate, m, args.quantity, &args.rates))
        .collect()
}

/// One line per material, `-` where no price could be computed.
#[must_use]
pub fn render(quotes: &[MaterialQuote]) -> String {
    quotes
        .iter()
        .map(|q| match &q.quote {
            Some(p) => format!(
                "{:<16} unit R$ {:>9}  total R$ {:>10}  (material {}, energia {})",
                q.material.name(),
                p.unit_price,
                p.total_price,
                p.material_cost,
                p.energy_cost,
            ),
            None => format!("{:<16} -", q.material.name()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print the quote to stdout, as a table or as JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn run(args: &QuoteArgs, json: bool) -> Result<(), serde_json::Error> {
    let quotes = quotes(args);
    let output = if json {
        serde_json::to_string_pretty(&quotes)?
    } else {
        render(&quotes)
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{output}");
    }
    Ok(())
}
