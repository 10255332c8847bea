//! Business logic services for the stock ledger

pub mod catalog;
pub mod ledger;
pub mod location;
pub mod transfer;

pub use catalog::CatalogService;
pub use ledger::LedgerService;
pub use location::LocationService;
pub use transfer::TransferService;
