use anyhow::Result;
use carscraper::{
    config::{ScrapeConfig, BASE_URL, CSS_SELECTOR, OUTPUT_FILE, REQUIRED_KEYS, SESSION_ID},
    extract::{Extractor, OpenAiExtractor},
    fetch::WebDriverSource,
    process::{fetch_and_process_page, SeenListings},
    write::save_listings_to_csv,
};
use reqwest::Client;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!(session = SESSION_ID, "startup");

    // ─── 2) configure clients ────────────────────────────────────────
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(e) => debug!(error = %e, "no .env file loaded"),
    }
    let config = ScrapeConfig::from_env()?;
    let extractor = OpenAiExtractor::new(Client::new(), &config);
    let mut seen = SeenListings::new();
    let mut all_listings = Vec::new();

    // ─── 3) scrape the listings page ─────────────────────────────────
    match WebDriverSource::launch(&config.webdriver_url).await {
        Ok(mut browser) => {
            let listings = fetch_and_process_page(
                &mut browser,
                &extractor,
                BASE_URL,
                CSS_SELECTOR,
                REQUIRED_KEYS,
                &mut seen,
            )
            .await;
            if listings.is_empty() {
                warn!("no cars extracted");
            } else {
                all_listings.extend(listings);
            }
        }
        Err(e) => error!(error = %format!("{:#}", e), "failed to launch browser"),
    }

    // ─── 4) write results ────────────────────────────────────────────
    if all_listings.is_empty() {
        info!("no cars were found during the crawl");
    } else {
        match save_listings_to_csv(&all_listings, OUTPUT_FILE) {
            Ok(n) => info!(count = n, file = OUTPUT_FILE, "saved cars"),
            Err(e) => error!(error = %format!("{:#}", e), file = OUTPUT_FILE, "failed to save cars"),
        }
    }

    extractor.usage().log();
    info!("all done");
    Ok(())
}
