#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("csrf token missing")]
    MissingCsrfToken,
    #[error("document is not html")]
    NotHtml,
    #[error("invalid payment amount: {0}")]
    InvalidAmount(String),
    #[error("fractional payment amount: {0}")]
    FractionalAmount(String),
    #[error("session cookie missing after login")]
    MissingSessionCookie,
    #[error("invalid link: {0}")]
    InvalidLink(String),
}
