use std::fmt;

use crate::portal::session::SessionCookie;

use super::AuthError;

#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Result<Self, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::Validation("username must not be empty".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::Validation("password must not be empty".to_string()));
        }

        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of the token request: the form token and the cookies issued before login.
#[derive(Clone)]
pub struct CsrfHandshake {
    pub token: String,
    pub pre_login_cookies: Vec<SessionCookie>,
    /// Edge-protection cookie, copied by value into the login request and the final session.
    pub edge_cookie: Option<SessionCookie>,
}

impl fmt::Debug for CsrfHandshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfHandshake")
            .field("token", &"<redacted>")
            .field("pre_login_cookies", &self.pre_login_cookies)
            .field("edge_cookie", &self.edge_cookie)
            .finish()
    }
}
