//! Extraction of portal pages into domain values. Pure, no I/O.

mod document;
mod error;
mod invoice;
mod service;

pub use document::{Document, Row};
pub use error::ParseError;
pub use invoice::{parse_amount, parse_invoices, Invoice, PaymentState};
pub use service::{parse_services, Service, ServiceState};

/// CSRF token of the login form.
pub fn parse_csrf_token(html: &str) -> Result<String, ParseError> {
    Document::parse(html)?.csrf_token().ok_or(ParseError::MissingCsrfToken)
}
