#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Login failed: incorrect username or password")]
    BadCredentials,
    #[error("Validation error: {0}")]
    Validation(String),
}
