pub mod booking;
pub mod config;
pub mod engine;
pub mod evaluator;
pub mod profile;

pub use booking::{Booker, BookingOutcome};
pub use config::{load_config, MainConfig};
pub use engine::Policy;
