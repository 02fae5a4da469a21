use reqwest::header;

use crate::{
    config::PortalConfig,
    error::PortalResult,
    parser::{self, Invoice, Service},
};

use super::{
    http::{read_gzip_body, HttpService},
    session::Session,
    urls::{PortalUrls, INVOICE_LIST_PATH, SERVICE_LIST_PATH},
};

/// Authenticated GETs for one session. Owns its own client and jar.
///
/// Calls are meant to be awaited one after another. Each session gets its own
/// fetcher; sessions of different users may run concurrently on separate fetchers,
/// but one fetcher is never shared across sessions.
pub struct PageFetcher {
    http: HttpService,
    urls: PortalUrls,
    session: Session,
}

impl PageFetcher {
    pub fn new(config: &PortalConfig, session: Session) -> PortalResult<Self> {
        let http = HttpService::new(config)?;
        let urls = PortalUrls::new(config.base_url.clone());

        http.restore_cookies(session.cookies(), urls.root());

        Ok(Self { http, urls, session })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// One GET of `target` (a portal path or a scraped link), returning the
    /// decompressed HTML.
    pub async fn fetch(&self, target: &str) -> PortalResult<String> {
        let url = self.urls.resolve(target)?;

        let mut request = self
            .http
            .client()
            .get(url)
            .header(header::REFERER, self.urls.client_area()?.as_str());
        if let Some(cookie) = self.session.cookie_header()? {
            request = request.header(header::COOKIE, cookie);
        }

        debug!("Fetching {}", target);
        let response = request.send().await?.error_for_status()?;

        read_gzip_body(response).await
    }

    pub async fn service_list_html(&self) -> PortalResult<String> {
        self.fetch(SERVICE_LIST_PATH).await
    }

    pub async fn invoice_list_html(&self) -> PortalResult<String> {
        self.fetch(INVOICE_LIST_PATH).await
    }

    pub async fn service_detail_html(&self, service: &Service) -> PortalResult<String> {
        self.fetch(&service.link).await
    }

    pub async fn services(&self) -> PortalResult<Vec<Service>> {
        let html = self.service_list_html().await?;
        Ok(parser::parse_services(&html)?)
    }

    pub async fn invoices(&self) -> PortalResult<Vec<Invoice>> {
        let html = self.invoice_list_html().await?;
        Ok(parser::parse_invoices(&html)?)
    }
}

/// One-shot fetch on a fresh client.
pub async fn fetch_page(config: &PortalConfig, session: &Session, target: &str) -> PortalResult<String> {
    PageFetcher::new(config, session.clone())?.fetch(target).await
}
