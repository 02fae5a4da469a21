use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::status::{self, StatusSummary};

use super::document::{cell_date, element_text, Document, Row, INVOICE_ROWS};
use super::ParseError;

static AMOUNT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d(?:[\d,.]*\d)?").expect("Failed to create amount token regex"));

/// Whole number with optional three-digit grouping, then an optional fraction.
static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,3}(?:,\d{3})+|\d+)(?:\.(\d+))?$").expect("Failed to create amount regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentState {
    NeedsPayment,
    Paid,
}

impl PaymentState {
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "unpaid" | "overdue" | "collections" | "payment-pending" => Some(PaymentState::NeedsPayment),
            "paid" | "refunded" | "cancelled" => Some(PaymentState::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub number: String,
    pub link: String,
    /// Coverage start, calendar day in UTC.
    pub start_date: NaiveDate,
    /// Coverage end, calendar day in UTC.
    pub expire_date: NaiveDate,
    /// Whole currency units.
    pub payment: i64,
    pub state: PaymentState,
}

impl Invoice {
    pub fn status_at(&self, now: DateTime<Utc>) -> StatusSummary {
        status::invoice_status(self, now)
    }
}

/// Extract the invoice rows of the first invoice-list page in document order.
/// The portal lists unpaid invoices first; that order is preserved as is.
pub fn parse_invoices(html: &str) -> Result<Vec<Invoice>, ParseError> {
    let document = Document::parse(html)?;

    let mut invoices = Vec::new();
    for row in document.rows(&INVOICE_ROWS) {
        if let Some(invoice) = parse_row(row)? {
            invoices.push(invoice);
        }
    }

    debug!("Extracted {} invoices", invoices.len());

    Ok(invoices)
}

/// `Ok(None)` for a row missing required fields; an unusable amount is an error.
fn parse_row(row: Row<'_>) -> Result<Option<Invoice>, ParseError> {
    let cells = row.cells();
    if cells.len() < 5 {
        debug!("Skipping invoice row with {} cells", cells.len());
        return Ok(None);
    }

    let number = element_text(cells[0]);
    if number.is_empty() {
        debug!("Skipping invoice row without a number");
        return Ok(None);
    }

    let Some(link) = row.link("viewinvoice.php") else {
        debug!("Skipping invoice {}: no link", number);
        return Ok(None);
    };

    let (Some(start_date), Some(expire_date)) = (cell_date(cells[1]), cell_date(cells[2])) else {
        debug!("Skipping invoice {}: unreadable dates", number);
        return Ok(None);
    };

    let Some(state) = row.status_marker().as_deref().and_then(PaymentState::from_marker) else {
        debug!("Skipping invoice {}: unknown payment state", number);
        return Ok(None);
    };

    let payment = parse_amount(&element_text(cells[3]))?;

    Ok(Some(Invoice {
        number,
        link,
        start_date,
        expire_date,
        payment,
        state,
    }))
}

/// First number in `text` as whole units. `¥1,200.00 CNY` is 1200; `¥10.50` and
/// comma decimals like `10,50 €` are rejected.
pub fn parse_amount(text: &str) -> Result<i64, ParseError> {
    let invalid = || ParseError::InvalidAmount(text.to_string());

    let token = AMOUNT_TOKEN.find(text).ok_or_else(invalid)?;
    let caps = AMOUNT.captures(token.as_str()).ok_or_else(invalid)?;

    if let Some(fraction) = caps.get(2) {
        if fraction.as_str().chars().any(|c| c != '0') {
            return Err(ParseError::FractionalAmount(text.to_string()));
        }
    }

    caps[1].replace(',', "").parse::<i64>().map_err(|_| invalid())
}
