//! Acting-employee extraction
//!
//! Authentication is handled upstream; the caller forwards the acting
//! employee in the `X-Employee-Id` header. The header is optional unless
//! `ledger.require_performer` is set.

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::ActingContext;
use uuid::Uuid;

use crate::error::AppError;

pub const EMPLOYEE_HEADER: &str = "x-employee-id";

/// Who is acting on this request, stamped with the request time
#[derive(Clone, Copy, Debug)]
pub struct Acting(pub ActingContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Acting
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let employee_id = match parts.headers.get(EMPLOYEE_HEADER) {
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| AppError::validation("X-Employee-Id", "header is not valid text"))?;
                let id = Uuid::parse_str(raw.trim()).map_err(|_| {
                    AppError::validation("X-Employee-Id", "header must be a UUID")
                })?;
                Some(id)
            }
            None => None,
        };

        Ok(Acting(ActingContext::new(employee_id, chrono::Utc::now())))
    }
}
