//! Network side of the client. Every login attempt and every [`PageFetcher`] builds
//! its own client and cookie jar, so independent sessions can run concurrently as
//! long as none of them shares a jar with another.

pub mod auth;
pub mod http;
pub mod page;
pub mod session;
pub mod urls;

pub use auth::{login, AuthError, AuthService, Credentials, CsrfHandshake, EDGE_COOKIE_NAME};
pub use http::HttpService;
pub use page::{fetch_page, PageFetcher};
pub use session::{Session, SessionCookie};
pub use urls::PortalUrls;
