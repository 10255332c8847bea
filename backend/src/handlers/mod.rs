//! HTTP handlers

pub mod batch;
pub mod health;
pub mod location;
pub mod movement;
pub mod stock;
pub mod transfer;

pub use batch::*;
pub use health::*;
pub use location::*;
pub use movement::*;
pub use stock::*;
pub use transfer::*;
