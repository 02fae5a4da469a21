use std::time::Duration;

use url::Url;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const PROXY_SCHEMES: [&str; 4] = ["http", "https", "socks5", "socks5h"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing config key: {0}")]
    MissingKey(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
    #[error("Invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("Invalid proxy address: {0}")]
    InvalidProxy(String),
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
    #[error("Failed to build http client: {0}")]
    Client(String),
}

#[derive(Clone, Debug)]
pub struct PortalConfig {
    /// Site root; every portal path is resolved against it.
    pub base_url: Url,
    pub proxy: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl PortalConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            proxy: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    pub fn with_proxy(mut self, proxy: &str) -> Result<Self, ConfigError> {
        self.proxy = normalize_proxy(proxy)?;
        Ok(self)
    }

    pub fn with_timeouts(mut self, timeout: Duration, connect_timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() || connect_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("timeouts must be greater than zero".to_string()));
        }
        self.timeout = timeout;
        self.connect_timeout = connect_timeout;
        Ok(self)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        build_config(|key| std::env::var(key).ok())
    }
}

pub fn build_config<F>(lookup: F) -> Result<PortalConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    info!("Building PortalConfig...");

    let base_url = lookup("SCHAN_BASE_URL").ok_or_else(|| ConfigError::MissingKey("SCHAN_BASE_URL".to_string()))?;

    let timeout = match lookup("SCHAN_TIMEOUT_SECS") {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("Invalid SCHAN_TIMEOUT_SECS".to_string()))?,
        None => DEFAULT_TIMEOUT_SECS,
    };
    let connect_timeout = match lookup("SCHAN_CONNECT_TIMEOUT_SECS") {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("Invalid SCHAN_CONNECT_TIMEOUT_SECS".to_string()))?,
        None => DEFAULT_CONNECT_TIMEOUT_SECS,
    };

    let mut config = PortalConfig::new(&base_url)?
        .with_proxy(&lookup("SCHAN_PROXY").unwrap_or_default())?
        .with_timeouts(Duration::from_secs(timeout), Duration::from_secs(connect_timeout))?;

    if let Some(user_agent) = lookup("SCHAN_USER_AGENT").filter(|ua| !ua.trim().is_empty()) {
        config.user_agent = user_agent;
    }

    info!("PortalConfig built");

    Ok(config)
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidBaseUrl(format!("{}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }

    // Relative joins drop the last segment unless the path ends with '/'
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// Empty input means "no proxy". Anything else must be `scheme://host:port`.
fn normalize_proxy(raw: &str) -> Result<Option<String>, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidProxy(format!("{}: {}", raw, e)))?;

    if !PROXY_SCHEMES.contains(&url.scheme()) {
        return Err(ConfigError::InvalidProxy(format!("unsupported scheme in {}", raw)));
    }
    if url.host_str().is_none() || url.port_or_known_default().is_none() {
        return Err(ConfigError::InvalidProxy(format!("missing host or port in {}", raw)));
    }

    Ok(Some(raw.to_string()))
}
