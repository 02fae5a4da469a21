mod error;
mod model;
pub use error::AuthError;
pub use model::*;

use reqwest::header;
use url::Url;

use crate::{
    config::PortalConfig,
    error::PortalResult,
    parser::{self, ParseError},
};

use super::{
    http::{read_gzip_body, HttpService},
    session::{self, Session},
    urls::PortalUrls,
};

/// Cookie set by the edge proxy in front of the portal. The portal checks it during
/// login but does not reissue it, so it is carried into the session by hand.
pub const EDGE_COOKIE_NAME: &str = "__cfduid";

/// Runs one login attempt. Both requests go through the same client so the jar
/// accumulates cookies across them. No retries.
pub struct AuthService {
    http: HttpService,
    urls: PortalUrls,
}

impl AuthService {
    pub fn new(config: &PortalConfig) -> PortalResult<Self> {
        Ok(Self {
            http: HttpService::new(config)?,
            urls: PortalUrls::new(config.base_url.clone()),
        })
    }

    pub async fn login(&self, credentials: &Credentials) -> PortalResult<Session> {
        info!("Requesting login form");
        let handshake = self.get_csrf_token().await?;

        info!("Submitting credentials for {}", credentials.username());
        self.submit_credentials(&handshake, credentials).await
    }

    /// GET the login page and read its form token. Fails before any POST when the
    /// token is missing.
    pub async fn get_csrf_token(&self) -> PortalResult<CsrfHandshake> {
        let response = self
            .http
            .client()
            .get(self.urls.login_page()?)
            .header(header::REFERER, self.urls.root().as_str())
            .send()
            .await?
            .error_for_status()?;

        let body = read_gzip_body(response).await?;
        let token = parser::parse_csrf_token(&body)?;

        let pre_login_cookies = self.http.cookies(self.urls.root());
        let edge_cookie = pre_login_cookies
            .iter()
            .find(|cookie| cookie.name == EDGE_COOKIE_NAME)
            .cloned();

        debug!(
            "Pre-login cookies: {:?}",
            pre_login_cookies.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );
        if edge_cookie.is_none() {
            debug!("No {} cookie issued before login", EDGE_COOKIE_NAME);
        }

        Ok(CsrfHandshake {
            token,
            pre_login_cookies,
            edge_cookie,
        })
    }

    /// POST the login form. A redirect landing on `incorrect=true` is a rejected
    /// login, reported as `AuthError::BadCredentials`.
    pub async fn submit_credentials(
        &self,
        handshake: &CsrfHandshake,
        credentials: &Credentials,
    ) -> PortalResult<Session> {
        let form = [
            ("token", handshake.token.as_str()),
            ("username", credentials.username()),
            ("password", credentials.password()),
        ];

        let mut request = self
            .http
            .client()
            .post(self.urls.login_action()?)
            .header(header::REFERER, self.urls.login_page()?.as_str())
            .header(header::ORIGIN, self.urls.origin())
            .form(&form);

        // The jar may not hold the edge cookie at this scope yet
        if let Some(cookie) = session::cookie_header(&handshake.pre_login_cookies)? {
            request = request.header(header::COOKIE, cookie);
        }

        let response = request.send().await?;

        if login_rejected(response.url()) {
            warn!("Portal rejected credentials for {}", credentials.username());
            return Err(AuthError::BadCredentials.into());
        }
        response.error_for_status_ref()?;

        let mut cookies = self.http.cookies(self.urls.root());
        if !cookies.iter().any(|cookie| cookie.name != EDGE_COOKIE_NAME) {
            return Err(ParseError::MissingSessionCookie.into());
        }

        if let Some(edge) = &handshake.edge_cookie {
            if !cookies.iter().any(|cookie| cookie.name == edge.name) {
                cookies.push(edge.clone());
            }
        }

        info!("Login succeeded with {} session cookies", cookies.len());

        Ok(Session::new(handshake.token.clone(), cookies))
    }
}

/// Full token + login sequence on a fresh client.
pub async fn login(config: &PortalConfig, credentials: &Credentials) -> PortalResult<Session> {
    AuthService::new(config)?.login(credentials).await
}

fn login_rejected(url: &Url) -> bool {
    url.query_pairs().any(|(key, value)| key == "incorrect" && value == "true")
}
