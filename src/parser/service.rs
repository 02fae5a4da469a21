use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::status::{self, StatusSummary};

use super::document::{element_text, hidden_date, Document, Row, SERVICE_ROWS};
use super::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceState {
    Active,
    Pending,
    Suspended,
    Terminated,
    Cancelled,
    Fraud,
    Unknown,
}

impl ServiceState {
    pub fn from_marker(marker: &str) -> Self {
        match marker {
            "active" => ServiceState::Active,
            "pending" => ServiceState::Pending,
            "suspended" => ServiceState::Suspended,
            "terminated" => ServiceState::Terminated,
            "cancelled" => ServiceState::Cancelled,
            "fraud" => ServiceState::Fraud,
            _ => ServiceState::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceState::Active => "active",
            ServiceState::Pending => "pending",
            ServiceState::Suspended => "suspended",
            ServiceState::Terminated => "terminated",
            ServiceState::Cancelled => "cancelled",
            ServiceState::Fraud => "fraud",
            ServiceState::Unknown => "unknown",
        }
    }
}

/// One purchased offering from the service list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    /// Detail page, relative to the portal root. Input to the next fetch.
    pub link: String,
    pub state: ServiceState,
    pub next_due: Option<NaiveDate>,
}

impl Service {
    pub fn status_at(&self, now: DateTime<Utc>) -> StatusSummary {
        status::service_status(self, now)
    }
}

/// Extract purchased services in document order. No rows is a valid result.
pub fn parse_services(html: &str) -> Result<Vec<Service>, ParseError> {
    let document = Document::parse(html)?;

    let services: Vec<Service> = document.rows(&SERVICE_ROWS).filter_map(parse_row).collect();

    debug!("Extracted {} services", services.len());

    Ok(services)
}

fn parse_row(row: Row<'_>) -> Option<Service> {
    let cells = row.cells();

    let name = row
        .strong_text()
        .or_else(|| cells.iter().map(|cell| element_text(*cell)).find(|text| !text.is_empty()));
    let Some(name) = name else {
        debug!("Skipping service row without a name");
        return None;
    };

    let Some(link) = row.link("action=productdetails") else {
        debug!("Skipping service {}: no link", name);
        return None;
    };

    let state = row
        .status_marker()
        .map(|marker| ServiceState::from_marker(&marker))
        .unwrap_or(ServiceState::Unknown);

    let next_due = cells.iter().find_map(|cell| hidden_date(*cell));

    Some(Service {
        name,
        link,
        state,
        next_due,
    })
}
