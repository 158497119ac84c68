//! Filamento CLI - Database migrations and offline quotes.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! fil-cli migrate
//!
//! # Price a print in every material
//! fil-cli quote --weight 120 --hours 4 --minutes 15
//!
//! # Price 3 pieces in PETG, as JSON
//! fil-cli quote --weight 120 --hours 4 --material petg -q 3 --json
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use filamento_core::pricing::{EnergyRates, Material, PrintTime};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "fil-cli")]
#[command(author, version, about = "Filamento CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Price a print from a known weight and duration
    Quote {
        /// Filament weight of one piece, in grams
        #[arg(short, long)]
        weight: Decimal,

        /// Print time, hours part
        #[arg(long, default_value_t = 0)]
        hours: u32,

        /// Print time, minutes part
        #[arg(long, default_value_t = 0)]
        minutes: u32,

        /// Material id (pla, abs, petg, tpu, nylon); all when omitted
        #[arg(short, long)]
        material: Option<Material>,

        /// Number of pieces
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Printer power draw in watts
        #[arg(long, env = "PRINTER_WATTAGE")]
        printer_watts: Option<Decimal>,

        /// Electricity price in BRL per kWh
        #[arg(long, env = "ELECTRICITY_RATE")]
        electricity_rate: Option<Decimal>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Quote {
            weight,
            hours,
            minutes,
            material,
            quantity,
            printer_watts,
            electricity_rate,
            json,
        } => {
            let defaults = EnergyRates::default();
            let args = commands::quote::QuoteArgs {
                weight_grams: weight,
                time: PrintTime {
                    hours,
                    minutes,
                    seconds: 0,
                },
                material,
                quantity,
                rates: EnergyRates {
                    printer_watts: printer_watts.unwrap_or(defaults.printer_watts),
                    electricity_rate: electricity_rate.unwrap_or(defaults.electricity_rate),
                },
            };
            commands::quote::run(&args, json)?;
        }
    }
    Ok(())
}
