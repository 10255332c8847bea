//! Shared types and rules for the stock ledger
//!
//! This crate contains the domain model and the pure ledger rules shared
//! between the backend, the browser (via WASM), and tooling. Nothing in here
//! performs I/O; persistence layers feed current state in and write the
//! resulting transitions back.

pub mod ledger;
pub mod models;
pub mod planner;
pub mod types;
pub mod validation;

pub use ledger::*;
pub use models::*;
pub use planner::*;
pub use types::*;
pub use validation::*;
