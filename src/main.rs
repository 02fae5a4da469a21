use anyhow::Context;
use chrono::Utc;
use schanclient::{login, Credentials, PageFetcher, PortalConfig};
use serde_json::json;

extern crate pretty_env_logger;
#[macro_use]
extern crate log;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = pretty_env_logger::try_init_timed();

    let config = PortalConfig::from_env()?;
    let username = std::env::var("SCHAN_USERNAME").context("SCHAN_USERNAME is not set")?;
    let password = std::env::var("SCHAN_PASSWORD").context("SCHAN_PASSWORD is not set")?;
    let credentials = Credentials::new(&username, &password)?;

    info!("Logging in to {}", config.base_url);
    let session = login(&config, &credentials).await?;

    let fetcher = PageFetcher::new(&config, session)?;
    let services = fetcher.services().await?;
    let invoices = fetcher.invoices().await?;
    info!("Found {} services and {} invoices", services.len(), invoices.len());

    let now = Utc::now();
    let report = json!({
        "services": services
            .iter()
            .map(|service| json!({ "service": service, "status": service.status_at(now) }))
            .collect::<Vec<_>>(),
        "invoices": invoices
            .iter()
            .map(|invoice| json!({ "invoice": invoice, "status": invoice.status_at(now) }))
            .collect::<Vec<_>>(),
    });

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
