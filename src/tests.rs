use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tower_http::compression::CompressionLayer;

use crate::{
    fetch_page, login, status, AuthError, Credentials, DecodeError, PageFetcher, ParseError, PaymentState,
    PortalConfig, PortalError, Session,
};

const TOKEN: &str = "6b1e4f0c2d";
const PASSWORD: &str = "hunter2";
const EDGE_COOKIE: &str = "__cfduid=edge-1";
const SESSION_COOKIE: &str = "WHMCSsess=sess-1";

const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Client Area</title></head><body>
  <form method="post" action="dologin.php">
    <input type="hidden" name="token" value="6b1e4f0c2d" />
    <input type="email" name="username" />
    <input type="password" name="password" />
  </form>
</body></html>"#;

const LOGIN_PAGE_WITHOUT_TOKEN: &str = r#"<!DOCTYPE html>
<html><head><title>Client Area</title></head><body>
  <div class="alert">Please enable JavaScript to continue</div>
</body></html>"#;

const SERVICES_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<table id="tableServicesList" class="table table-list">
  <thead><tr><th></th><th>Product/Service</th><th>Pricing</th><th>Next Due Date</th><th>Status</th></tr></thead>
  <tbody>
    <tr onclick="clickableSafeRedirect(event, 'clientarea.php?action=productdetails&amp;id=1', false)">
      <td></td><td><strong>A</strong></td><td>¥10 CNY</td>
      <td><span class="hidden">2018-04-01</span>01/04/2018</td>
      <td><span class="label status status-active">Active</span></td>
    </tr>
    <tr onclick="clickableSafeRedirect(event, 'clientarea.php?action=productdetails&amp;id=2', false)">
      <td></td><td><strong>B</strong></td><td>¥20 CNY</td>
      <td><span class="hidden">2018-05-01</span>01/05/2018</td>
      <td><span class="label status status-active">Active</span></td>
    </tr>
    <tr onclick="clickableSafeRedirect(event, 'clientarea.php?action=productdetails&amp;id=3', false)">
      <td></td><td><strong>C</strong></td><td>¥30 CNY</td>
      <td><span class="hidden">2018-06-01</span>01/06/2018</td>
      <td><span class="label status status-suspended">Suspended</span></td>
    </tr>
  </tbody>
</table>
</body></html>"#;

const INVOICES_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<table id="tableInvoicesList" class="table table-list">
  <thead><tr><th>Invoice #</th><th>Invoice Date</th><th>Due Date</th><th>Total</th><th>Status</th></tr></thead>
  <tbody>
    <tr onclick="clickableSafeRedirect(event, 'viewinvoice.php?id=303', false)">
      <td>303</td>
      <td><span class="hidden">2018-03-01</span>01/03/2018</td>
      <td><span class="hidden">2018-04-01</span>01/04/2018</td>
      <td>¥10 CNY</td>
      <td><span class="label status status-unpaid">Unpaid</span></td>
    </tr>
    <tr onclick="clickableSafeRedirect(event, 'viewinvoice.php?id=302', false)">
      <td>302</td>
      <td><span class="hidden">2018-02-01</span>01/02/2018</td>
      <td><span class="hidden">2018-03-01</span>01/03/2018</td>
      <td>¥10 CNY</td>
      <td><span class="label status status-paid">Paid</span></td>
    </tr>
    <tr onclick="clickableSafeRedirect(event, 'viewinvoice.php?id=301', false)">
      <td>301</td>
      <td><span class="hidden">2018-01-01</span>01/01/2018</td>
      <td><span class="hidden">2018-02-01</span>01/02/2018</td>
      <td>¥10.00 CNY</td>
      <td><span class="label status status-unpaid">Unpaid</span></td>
    </tr>
  </tbody>
</table>
</body></html>"#;

#[derive(Debug, Clone, Deserialize)]
struct LoginForm {
    token: String,
    username: String,
    password: String,
}

#[derive(Default)]
struct FixturePortal {
    serve_token: bool,
    /// Login answer clears the edge cookie instead of leaving it alone
    expire_edge_on_login: bool,
    posts: AtomicUsize,
    login_cookie_header: Mutex<Option<String>>,
    login_form: Mutex<Option<LoginForm>>,
    /// (cookie, referer) of every authenticated page request
    page_requests: Mutex<Vec<(String, String)>>,
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn client_area(
    State(portal): State<Arc<FixturePortal>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let cookie = header_string(&headers, header::COOKIE);

    let Some(action) = query.get("action") else {
        let page = if portal.serve_token {
            LOGIN_PAGE
        } else {
            LOGIN_PAGE_WITHOUT_TOKEN
        };
        // The edge cookie is only handed out before login
        if cookie.contains(SESSION_COOKIE) {
            return Html(page).into_response();
        }
        return ([(header::SET_COOKIE, format!("{}; Path=/", EDGE_COOKIE))], Html(page)).into_response();
    };

    let referer = header_string(&headers, header::REFERER);
    portal
        .page_requests
        .lock()
        .unwrap()
        .push((cookie.clone(), referer));

    if !cookie.contains(SESSION_COOKIE) {
        return StatusCode::FORBIDDEN.into_response();
    }

    match action.as_str() {
        "products" => Html(SERVICES_PAGE.to_string()).into_response(),
        "invoices" => Html(INVOICES_PAGE.to_string()).into_response(),
        "productdetails" => {
            let id = query.get("id").cloned().unwrap_or_default();
            Html(format!(
                "<!DOCTYPE html><html><body><h1>Product details</h1><p>Service {} usage and nodes</p></body></html>",
                id
            ))
            .into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn do_login(State(portal): State<Arc<FixturePortal>>, headers: HeaderMap, Form(form): Form<LoginForm>) -> Response {
    portal.posts.fetch_add(1, Ordering::SeqCst);
    *portal.login_cookie_header.lock().unwrap() = Some(header_string(&headers, header::COOKIE));
    *portal.login_form.lock().unwrap() = Some(form.clone());

    let edge_present = header_string(&headers, header::COOKIE).contains(EDGE_COOKIE);
    if form.token != TOKEN || form.password != PASSWORD || !edge_present {
        return Redirect::to("/clientarea.php?incorrect=true").into_response();
    }

    let mut cookies = vec![(header::SET_COOKIE, format!("{}; Path=/; HttpOnly", SESSION_COOKIE))];
    if portal.expire_edge_on_login {
        cookies.push((header::SET_COOKIE, "__cfduid=; Max-Age=0; Path=/".to_string()));
    }

    (AppendHeaders(cookies), Redirect::to("/clientarea.php")).into_response()
}

async fn broken_gzip() -> Response {
    ([(header::CONTENT_ENCODING, "gzip")], "this body was never gzip compressed").into_response()
}

async fn plain_page() -> Html<&'static str> {
    Html("<!DOCTYPE html><html><body><p>sent without compression</p></body></html>")
}

async fn spawn_portal(serve_token: bool) -> (SocketAddr, Arc<FixturePortal>) {
    spawn(FixturePortal {
        serve_token,
        ..Default::default()
    })
    .await
}

async fn spawn(portal: FixturePortal) -> (SocketAddr, Arc<FixturePortal>) {
    let portal = Arc::new(portal);

    let router = Router::new()
        .route("/clientarea.php", get(client_area))
        .route("/dologin.php", post(do_login))
        .layer(CompressionLayer::new())
        .merge(
            Router::new()
                .route("/broken.php", get(broken_gzip))
                .route("/plain.php", get(plain_page)),
        )
        .with_state(Arc::clone(&portal));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, portal)
}

fn config_for(addr: SocketAddr) -> PortalConfig {
    PortalConfig::new(&format!("http://{}/", addr)).unwrap()
}

fn credentials(password: &str) -> Credentials {
    Credentials::new("user@example.com", password).unwrap()
}

async fn logged_in(addr: SocketAddr) -> Session {
    login(&config_for(addr), &credentials(PASSWORD)).await.unwrap()
}

#[tokio::test]
async fn test_login_returns_session_and_edge_cookie() {
    let (addr, portal) = spawn_portal(true).await;

    let session = login(&config_for(addr), &credentials(PASSWORD)).await.unwrap();

    assert_eq!(session.csrf_token(), TOKEN);
    assert_eq!(session.cookie("WHMCSsess").map(|c| c.value.as_str()), Some("sess-1"));
    assert_eq!(session.cookie("__cfduid").map(|c| c.value.as_str()), Some("edge-1"));
    assert_eq!(session.cookies().iter().filter(|c| c.name == "__cfduid").count(), 1);

    assert_eq!(portal.posts.load(Ordering::SeqCst), 1);
    let form = portal.login_form.lock().unwrap().clone().unwrap();
    assert_eq!(form.token, TOKEN);
    assert_eq!(form.username, "user@example.com");
    assert_eq!(form.password, PASSWORD);
    let cookie_header = portal.login_cookie_header.lock().unwrap().clone().unwrap();
    assert!(cookie_header.contains(EDGE_COOKIE));
}

#[tokio::test]
async fn test_edge_cookie_survives_login_that_clears_it() {
    let (addr, portal) = spawn(FixturePortal {
        serve_token: true,
        expire_edge_on_login: true,
        ..Default::default()
    })
    .await;

    let session = login(&config_for(addr), &credentials(PASSWORD)).await.unwrap();

    assert_eq!(session.cookie("WHMCSsess").map(|c| c.value.as_str()), Some("sess-1"));
    let edge: Vec<_> = session.cookies().iter().filter(|c| c.name == "__cfduid").collect();
    assert_eq!(edge.len(), 1);
    assert_eq!(edge[0].value, "edge-1");
    assert_eq!(portal.posts.load(Ordering::SeqCst), 1);

    // The carried cookie goes out with later page requests
    let fetcher = PageFetcher::new(&config_for(addr), session).unwrap();
    fetcher.service_list_html().await.unwrap();
    let requests = portal.page_requests.lock().unwrap().clone();
    assert!(requests[0].0.contains(EDGE_COOKIE));
}

#[tokio::test]
async fn test_incorrect_credentials_are_an_authentication_error() {
    let (addr, portal) = spawn_portal(true).await;

    let result = login(&config_for(addr), &credentials("wrong-password")).await;

    assert!(matches!(
        result,
        Err(PortalError::Authentication(AuthError::BadCredentials))
    ));
    assert_eq!(portal.posts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_token_fails_before_post() {
    let (addr, portal) = spawn_portal(false).await;

    let result = login(&config_for(addr), &credentials(PASSWORD)).await;

    assert!(matches!(result, Err(PortalError::Parse(ParseError::MissingCsrfToken))));
    assert_eq!(portal.posts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_portal_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = login(&config_for(addr), &credentials(PASSWORD)).await;

    assert!(matches!(result, Err(PortalError::Transport(_))));
}

#[tokio::test]
async fn test_fetch_and_parse_account_pages() {
    let (addr, portal) = spawn_portal(true).await;
    let session = logged_in(addr).await;
    let fetcher = PageFetcher::new(&config_for(addr), session).unwrap();

    let services = fetcher.services().await.unwrap();
    let names: Vec<_> = services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(services[1].link, "clientarea.php?action=productdetails&id=2");

    let invoices = fetcher.invoices().await.unwrap();
    let states: Vec<_> = invoices.iter().map(|i| (i.number.as_str(), i.state)).collect();
    assert_eq!(
        states,
        vec![
            ("303", PaymentState::NeedsPayment),
            ("302", PaymentState::Paid),
            ("301", PaymentState::NeedsPayment),
        ]
    );

    let now = Utc.with_ymd_and_hms(2018, 3, 15, 12, 0, 0).unwrap();
    let summaries: Vec<_> = invoices.iter().map(|i| status::invoice_status(i, now)).collect();
    assert_eq!(summaries[0].message, "needs payment");
    assert_eq!(summaries[1].message, "no payment needed, expired");
    assert!(summaries[1].resolved);
    assert_eq!(summaries[2].message, "needs payment, expired");

    let detail = fetcher.service_detail_html(&services[1]).await.unwrap();
    assert!(detail.contains("Service 2 usage"));

    let requests = portal.page_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 3);
    for (cookie, referer) in requests {
        assert!(cookie.contains(SESSION_COOKIE));
        assert!(cookie.contains(EDGE_COOKIE));
        assert_eq!(referer, format!("http://{}/clientarea.php", addr));
    }
}

fn stored_session(session_value: &str) -> Session {
    serde_json::from_value(serde_json::json!({
        "csrf_token": TOKEN,
        "cookies": [
            { "name": "WHMCSsess", "value": session_value, "domain": "127.0.0.1", "path": "/" },
            { "name": "__cfduid", "value": "edge-1", "domain": "127.0.0.1", "path": "/" },
        ],
        "created_at": "2018-01-01T00:00:00Z",
    }))
    .unwrap()
}

#[tokio::test]
async fn test_fetch_with_stale_session_is_a_transport_error() {
    let (addr, _portal) = spawn_portal(true).await;

    let error = fetch_page(&config_for(addr), &stored_session("expired"), "clientarea.php?action=products")
        .await
        .unwrap_err();

    assert!(matches!(error, PortalError::Transport(_)));
    assert_eq!(error.status(), Some(reqwest::StatusCode::FORBIDDEN));
    assert!(error.to_string().starts_with("Transport error"));
    assert!(!error.to_string().contains("unreachable"));
    assert!(std::error::Error::source(&error).is_some());
}

#[tokio::test]
async fn test_concurrent_sessions_keep_their_own_cookies() {
    let (addr, portal) = spawn_portal(true).await;
    let config = config_for(addr);
    let current = PageFetcher::new(&config, stored_session("sess-1")).unwrap();
    let stale = PageFetcher::new(&config, stored_session("expired")).unwrap();

    let (current_services, stale_services) = tokio::join!(current.services(), stale.services());

    assert_eq!(current_services.unwrap().len(), 3);
    assert!(matches!(stale_services, Err(PortalError::Transport(_))));

    let requests = portal.page_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests.iter().filter(|(cookie, _)| cookie.contains(SESSION_COOKIE)).count(), 1);
    assert_eq!(requests.iter().filter(|(cookie, _)| cookie.contains("WHMCSsess=expired")).count(), 1);
}

#[tokio::test]
async fn test_fetch_refuses_links_off_the_portal() {
    let (addr, portal) = spawn_portal(true).await;
    let session = logged_in(addr).await;

    let result = fetch_page(&config_for(addr), &session, "https://elsewhere.example.net/clientarea.php").await;

    assert!(matches!(result, Err(PortalError::Parse(ParseError::InvalidLink(_)))));
    assert!(portal.page_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_compression_envelope_is_a_decode_error() {
    let (addr, _portal) = spawn_portal(true).await;
    let session = logged_in(addr).await;

    let result = fetch_page(&config_for(addr), &session, "broken.php").await;

    assert!(matches!(result, Err(PortalError::Decode(DecodeError::Inflate(_)))));
}

#[tokio::test]
async fn test_uncompressed_page_is_a_decode_error() {
    let (addr, _portal) = spawn_portal(true).await;
    let session = logged_in(addr).await;

    let result = fetch_page(&config_for(addr), &session, "plain.php").await;

    assert!(matches!(
        result,
        Err(PortalError::Decode(DecodeError::UnexpectedEncoding(None)))
    ));
}

#[tokio::test]
async fn test_fixture_pages_are_gzip_encoded() {
    let (addr, _portal) = spawn_portal(true).await;

    let response = reqwest::Client::builder()
        .no_gzip()
        .no_proxy()
        .build()
        .unwrap()
        .get(format!("http://{}/clientarea.php", addr))
        .header(reqwest::header::ACCEPT_ENCODING, "gzip")
        .send()
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(reqwest::header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok()),
        Some("gzip")
    );
}
