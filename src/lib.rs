//! Client for a WHMCS-style subscription portal: CSRF-protected login, authenticated
//! page fetches, and extraction of services and invoices with derived status.

#[macro_use]
extern crate log;

pub mod config;
pub mod error;
pub mod parser;
pub mod portal;
pub mod status;

pub use config::{build_config, ConfigError, PortalConfig};
pub use error::{DecodeError, PortalError, PortalResult};
pub use parser::{parse_csrf_token, parse_invoices, parse_services, Invoice, ParseError, PaymentState, Service, ServiceState};
pub use portal::{fetch_page, login, AuthError, AuthService, Credentials, PageFetcher, Session, SessionCookie};
pub use status::{invoice_status, service_status, StatusSummary};

#[cfg(test)]
mod tests;
