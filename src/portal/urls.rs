use url::Url;

use crate::parser::ParseError;

pub const LOGIN_PAGE_PATH: &str = "clientarea.php";
pub const LOGIN_ACTION_PATH: &str = "dologin.php";
pub const SERVICE_LIST_PATH: &str = "clientarea.php?action=products";
/// First page only; later pages are not fetched.
pub const INVOICE_LIST_PATH: &str = "clientarea.php?action=invoices";

#[derive(Clone, Debug)]
pub struct PortalUrls {
    root: Url,
}

impl PortalUrls {
    pub fn new(root: Url) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    pub fn origin(&self) -> String {
        self.root.origin().ascii_serialization()
    }

    pub fn login_page(&self) -> Result<Url, ParseError> {
        self.resolve(LOGIN_PAGE_PATH)
    }

    pub fn login_action(&self) -> Result<Url, ParseError> {
        self.resolve(LOGIN_ACTION_PATH)
    }

    /// Referer for authenticated navigation.
    pub fn client_area(&self) -> Result<Url, ParseError> {
        self.resolve(LOGIN_PAGE_PATH)
    }

    /// Resolve a path or a link scraped from a page. Links leaving the portal's
    /// origin are refused so session cookies never reach another host.
    pub fn resolve(&self, target: &str) -> Result<Url, ParseError> {
        let url = self
            .root
            .join(target.trim())
            .map_err(|e| ParseError::InvalidLink(format!("{}: {}", target, e)))?;

        if url.origin() != self.root.origin() {
            return Err(ParseError::InvalidLink(format!("{} leaves the portal", target)));
        }

        Ok(url)
    }
}
