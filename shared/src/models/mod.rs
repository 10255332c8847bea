//! Domain models for the stock ledger

mod batch;
mod location;
mod movement;
mod stock;

pub use batch::*;
pub use location::*;
pub use movement::*;
pub use stock::*;
