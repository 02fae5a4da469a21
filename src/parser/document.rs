use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::ParseError;

// Extraction rules. Each one names a single shape the portal renders.

pub static CSRF_TOKEN: LazyLock<Selector> = LazyLock::new(|| selector("input[type='hidden'][name='token']"));

pub static SERVICE_ROWS: LazyLock<Selector> = LazyLock::new(|| selector("#tableServicesList tbody tr"));

pub static INVOICE_ROWS: LazyLock<Selector> = LazyLock::new(|| selector("#tableInvoicesList tbody tr"));

static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));

static STRONG: LazyLock<Selector> = LazyLock::new(|| selector("strong"));

static HIDDEN_SPAN: LazyLock<Selector> = LazyLock::new(|| selector("span.hidden"));

static STATUS_LABEL: LazyLock<Selector> = LazyLock::new(|| selector("span.status, span.label"));

static EDIT_BUTTON_LINK: LazyLock<Selector> = LazyLock::new(|| selector("td.responsive-edit-button a[href]"));

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));

static REDIRECT_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"clickableSafeRedirect\(\s*event\s*,\s*'([^']+)'").expect("Failed to create redirect target regex")
});

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

fn selector(rule: &'static str) -> Selector {
    Selector::parse(rule).expect("Failed to parse extraction rule")
}

/// A parsed portal page. Not `Send`; parse, extract and drop it without crossing an await.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(body: &str) -> Result<Self, ParseError> {
        let head = body.trim_start_matches('\u{feff}').trim_start();
        if !head.starts_with('<') {
            return Err(ParseError::NotHtml);
        }

        Ok(Self {
            html: Html::parse_document(body),
        })
    }

    /// Value of the first hidden `token` input, if any.
    pub fn csrf_token(&self) -> Option<String> {
        self.html
            .select(&CSRF_TOKEN)
            .next()
            .and_then(|input| input.value().attr("value"))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    pub fn rows<'a>(&'a self, rule: &'a Selector) -> impl Iterator<Item = Row<'a>> + 'a {
        self.html.select(rule).map(|element| Row { element })
    }
}

#[derive(Clone, Copy)]
pub struct Row<'a> {
    element: ElementRef<'a>,
}

impl<'a> Row<'a> {
    pub fn cells(&self) -> Vec<ElementRef<'a>> {
        self.element.select(&CELL).collect()
    }

    pub fn strong_text(&self) -> Option<String> {
        self.element
            .select(&STRONG)
            .map(element_text)
            .find(|text| !text.is_empty())
    }

    /// Link the row navigates to: the `onclick` redirect target, else the edit
    /// button, else the first anchor whose href contains `needle`.
    pub fn link(&self, needle: &str) -> Option<String> {
        let redirect = self
            .element
            .value()
            .attr("onclick")
            .and_then(|onclick| REDIRECT_TARGET.captures(onclick))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());

        redirect
            .or_else(|| {
                self.element
                    .select(&EDIT_BUTTON_LINK)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_string)
            })
            .or_else(|| {
                self.element
                    .select(&ANCHOR)
                    .filter_map(|a| a.value().attr("href"))
                    .find(|href| href.contains(needle))
                    .map(str::to_string)
            })
            .map(|link| link.trim().to_string())
            .filter(|link| !link.is_empty())
    }

    /// The `<state>` part of a `status-<state>` class on the row's status label.
    pub fn status_marker(&self) -> Option<String> {
        self.element.select(&STATUS_LABEL).find_map(|label| {
            label
                .value()
                .classes()
                .find_map(|class| class.strip_prefix("status-"))
                .map(str::to_ascii_lowercase)
        })
    }
}

/// Text content with whitespace runs collapsed to single spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_ws(&element.text().collect::<String>())
}

/// Date shown in a cell. The sortable hidden span wins over the visible text.
pub fn cell_date(cell: ElementRef<'_>) -> Option<NaiveDate> {
    hidden_date(cell).or_else(|| parse_date(&element_text(cell)))
}

pub fn hidden_date(cell: ElementRef<'_>) -> Option<NaiveDate> {
    cell.select(&HIDDEN_SPAN)
        .map(element_text)
        .find_map(|text| parse_date(&text))
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
