pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliArgs, Command};

pub use config::CarrierConfig;
pub use core::{
    client::{client_from_config, CarrierClient},
    registration::OrderRegistrar,
    tariffs::TariffService,
};
pub use utils::error::{CarrierError, RegistrationFailure, Result};
