use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

const REDACTED: &str = "<redacted>";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

impl SessionCookie {
    pub fn new(name: &str, value: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
        }
    }

    /// `name=value`, as sent in a `Cookie` header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("value", &REDACTED)
            .field("domain", &self.domain)
            .field("path", &self.path)
            .finish()
    }
}

/// Authenticated cookie bundle. Only a successful login produces one; after that it
/// is a plain value that can be cloned, persisted by a caller, or handed to a fetcher.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    csrf_token: String,
    cookies: Vec<SessionCookie>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(csrf_token: String, cookies: Vec<SessionCookie>) -> Self {
        Self {
            csrf_token,
            cookies,
            created_at: Utc::now(),
        }
    }

    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&SessionCookie> {
        self.cookies.iter().find(|cookie| cookie.name == name)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn cookie_header(&self) -> Result<Option<HeaderValue>, ConfigError> {
        cookie_header(&self.cookies)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("csrf_token", &REDACTED)
            .field("cookies", &self.cookies)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// `Cookie` header carrying every cookie in `cookies`; `None` when there are none.
pub fn cookie_header(cookies: &[SessionCookie]) -> Result<Option<HeaderValue>, ConfigError> {
    if cookies.is_empty() {
        return Ok(None);
    }

    let header = cookies.iter().map(SessionCookie::pair).collect::<Vec<_>>().join("; ");

    HeaderValue::from_str(&header)
        .map(Some)
        .map_err(|_| ConfigError::InvalidHeader("cookie value contains invalid characters".to_string()))
}
