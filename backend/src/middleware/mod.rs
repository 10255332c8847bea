//! Request middleware and extractors

mod context;

pub use context::{Acting, EMPLOYEE_HEADER};
