//! Human-facing status of parsed entities. Deterministic for a given (entity, day).

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::parser::{Invoice, PaymentState, Service, ServiceState};

pub const NEEDS_PAYMENT: &str = "needs payment";
pub const NO_PAYMENT_NEEDED: &str = "no payment needed";
pub const EXPIRED: &str = "expired";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub message: String,
    /// Whether anything is left for the user to do.
    pub resolved: bool,
}

/// Calendar day of `now` in the reference timezone (UTC).
pub fn reference_day(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Expiry and payment are independent: an expired paid invoice stays resolved.
pub fn invoice_status(invoice: &Invoice, now: DateTime<Utc>) -> StatusSummary {
    let (mut message, resolved) = match invoice.state {
        PaymentState::NeedsPayment => (NEEDS_PAYMENT.to_string(), false),
        PaymentState::Paid => (NO_PAYMENT_NEEDED.to_string(), true),
    };

    if reference_day(now) > invoice.expire_date {
        message.push_str(", ");
        message.push_str(EXPIRED);
    }

    StatusSummary { message, resolved }
}

pub fn service_status(service: &Service, now: DateTime<Utc>) -> StatusSummary {
    let mut message = service.state.label().to_string();

    if service.next_due.is_some_and(|due| reference_day(now) > due) {
        message.push_str(", ");
        message.push_str(EXPIRED);
    }

    StatusSummary {
        message,
        resolved: service.state == ServiceState::Active,
    }
}
