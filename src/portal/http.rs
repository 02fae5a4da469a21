use std::{io::Read, sync::Arc};

use flate2::read::GzDecoder;
use reqwest::{
    cookie::{CookieStore, Jar},
    header::{self, HeaderMap, HeaderValue},
    Client, Proxy, Response,
};
use url::Url;

use crate::{
    config::{ConfigError, PortalConfig},
    error::{DecodeError, PortalResult},
};

use super::session::SessionCookie;

/// A client plus the jar it writes cookies into. One per login attempt or fetcher;
/// never share one across different users.
#[derive(Clone)]
pub struct HttpService {
    client: Client,
    cookie_jar: Arc<Jar>,
}

impl HttpService {
    /// Builds the client without touching the network.
    pub fn new(config: &PortalConfig) -> Result<Self, ConfigError> {
        let cookie_jar = Arc::new(Jar::default());
        let client = Self::create_client(Arc::clone(&cookie_jar), config)?;

        Ok(Self { client, cookie_jar })
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        headers
    }

    fn create_client(cookie_jar: Arc<Jar>, config: &PortalConfig) -> Result<Client, ConfigError> {
        let builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .cookie_provider(cookie_jar)
            .default_headers(Self::default_headers())
            .user_agent(config.user_agent.as_str())
            // Bodies are inflated by read_gzip_body, which needs the Content-Encoding header
            .no_gzip();

        let builder = match &config.proxy {
            Some(proxy) => {
                info!("Configuring client with proxy");
                builder.proxy(Proxy::all(proxy.as_str()).map_err(|e| ConfigError::InvalidProxy(e.to_string()))?)
            }
            None => builder.no_proxy(),
        };

        builder.build().map_err(|e| ConfigError::Client(e.to_string()))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn get_cookie_jar(&self) -> Arc<Jar> {
        Arc::clone(&self.cookie_jar)
    }

    /// Cookies the jar would send to `url`.
    pub fn cookies(&self, url: &Url) -> Vec<SessionCookie> {
        let domain = url.host_str().unwrap_or_default();

        let Some(header) = self.cookie_jar.cookies(url) else {
            return Vec::new();
        };
        let Ok(header) = header.to_str() else {
            warn!("Cookie jar produced a non-ascii header for {}", domain);
            return Vec::new();
        };

        header
            .split(';')
            .map(str::trim)
            .filter_map(|pair| pair.split_once('='))
            .map(|(name, value)| SessionCookie::new(name, value, domain))
            .collect()
    }

    /// Seed the jar so redirects keep carrying `cookies` to `url`'s host.
    pub fn restore_cookies(&self, cookies: &[SessionCookie], url: &Url) {
        for cookie in cookies {
            let cookie_string = format!("{}; Path={}", cookie.pair(), cookie.path);
            self.cookie_jar.add_cookie_str(&cookie_string, url);
        }
    }
}

/// Inflate a portal page. Pages always arrive gzip encoded, so a body without that
/// envelope is a decode failure, not plain text.
pub async fn read_gzip_body(response: Response) -> PortalResult<String> {
    let encoding = response
        .headers()
        .get(header::CONTENT_ENCODING)
        .map(|value| value.to_str().unwrap_or_default().trim().to_ascii_lowercase());

    if !matches!(encoding.as_deref(), Some("gzip" | "x-gzip")) {
        warn!("Page from {} is not gzip encoded: {:?}", response.url().path(), encoding);
        return Err(DecodeError::UnexpectedEncoding(encoding).into());
    }

    let body = response.bytes().await?;
    inflate(&body)
}

fn inflate(body: &[u8]) -> PortalResult<String> {
    let mut html = String::new();
    GzDecoder::new(body)
        .read_to_string(&mut html)
        .map_err(DecodeError::Inflate)?;

    Ok(html)
}
