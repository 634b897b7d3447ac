pub mod auth;
pub mod classifier;
pub mod client;
pub mod registration;
pub mod tariffs;
pub mod transport;
pub mod units;

pub use crate::domain::model::{Order, TariffQuote, TrackingId};
pub use crate::domain::ports::{CarrierApi, Clock, ExpiringCache};
pub use crate::utils::error::Result;
