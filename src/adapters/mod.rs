// Adapters layer: concrete implementations of the domain ports.

pub mod cache;
pub mod clock;

pub use cache::MemoryCache;
pub use clock::{ManualClock, SystemClock};
