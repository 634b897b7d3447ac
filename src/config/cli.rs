use crate::core::client::TARIFF_WAREHOUSE_DOOR;
use crate::core::tariffs::DEFAULT_SEARCH_LIMIT;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "cdek-delivery")]
#[command(about = "CDEK delivery quotes, city search and order registration")]
pub struct CliArgs {
    /// Path to TOML configuration file; environment variables are used when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Quote a single tariff
    Quote {
        /// Destination city code
        #[arg(long)]
        to: i64,

        /// Origin city code, defaults to shipment.from_city_code
        #[arg(long)]
        from: Option<i64>,

        /// Tariff code, defaults to parcel warehouse-to-door
        #[arg(long, default_value_t = TARIFF_WAREHOUSE_DOOR)]
        tariff: i64,

        /// JSON file with line items (weight_g, length_mm, width_mm, height_mm, quantity)
        #[arg(long)]
        items: Option<PathBuf>,
    },

    /// List tariffs available for a delivery mode
    Tariffs {
        /// Destination city code or city name
        #[arg(long)]
        to: String,

        /// office or door
        #[arg(long, default_value = "office")]
        mode: String,

        /// PVZ or POSTAMAT
        #[arg(long, default_value = "PVZ")]
        point_type: String,

        #[arg(long)]
        items: Option<PathBuf>,
    },

    /// Search the carrier city reference
    Cities {
        query: String,

        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// Register an order (JSON file) with the carrier
    Register { order: PathBuf },
}
