use anyhow::Result;
use popcast::{
    controller::ViewController,
    fetch::{self, DEFAULT_DATA_URL},
    forecast::{HttpOracle, DEFAULT_HORIZON_YEAR},
};
use reqwest::Client;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load the dataset ─────────────────────────────────────────
    let client = Client::new();
    let data_url = Url::parse(
        &env::var("POPCAST_DATA_URL").unwrap_or_else(|_| DEFAULT_DATA_URL.to_string()),
    )?;

    let mut ctl = ViewController::new(DEFAULT_HORIZON_YEAR);
    ctl.begin_load();
    ctl.complete_load(fetch::load_dataset(&client, &data_url).await);
    if let Some(message) = ctl.error() {
        anyhow::bail!("load failed: {}", message);
    }
    info!(
        countries = ctl.countries().len(),
        selected = %ctl.selected_country(),
        rows = ctl.working_series().len(),
        "dataset ready"
    );

    // ─── 3) with an oracle configured, extend the series to the horizon ──
    match env::var("POPCAST_ORACLE_URL") {
        Ok(endpoint) => {
            let oracle = HttpOracle::new(client.clone(), Url::parse(&endpoint)?);
            if let Some(pending) = ctl.set_prediction(true) {
                ctl.run_forecast(&oracle, pending).await;
            }
            match ctl.error() {
                Some(message) => warn!("prediction unavailable: {}", message),
                None => info!(
                    rows = ctl.working_series().len(),
                    boundary = ?ctl.boundary_year(),
                    "forecast merged"
                ),
            }
        }
        Err(_) => info!("POPCAST_ORACLE_URL not set; historical view only"),
    }

    Ok(())
}
