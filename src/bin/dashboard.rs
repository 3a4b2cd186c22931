use anyhow::{Context, Result};
use carscraper::{
    config::OUTPUT_FILE,
    dashboard::{load_listings, render_dashboard, stats, Selection},
};
use chrono::Utc;
use clap::Parser;
use std::{fs, path::PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Render the car listings dashboard from scraped CSV")]
struct Args {
    /// CSV written by the scraper
    #[arg(long, default_value = OUTPUT_FILE)]
    input: PathBuf,
    /// HTML page to write
    #[arg(long, default_value = "dashboard.html")]
    output: PathBuf,
    /// Years to show in the year filter (repeatable; default all)
    #[arg(long = "year")]
    years: Vec<i64>,
    /// Price ranges to show, e.g. "$20,000-$30,000" (repeatable; default all)
    #[arg(long = "price-range")]
    price_ranges: Vec<String>,
    /// Kilometer ranges to show, e.g. "0-25,000 km" (repeatable; default all)
    #[arg(long = "km-range")]
    km_ranges: Vec<String>,
    /// Brands to show (repeatable; default all)
    #[arg(long = "brand")]
    brands: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let selection = Selection {
        years: args.years,
        price_ranges: args.price_ranges,
        km_ranges: args.km_ranges,
        brands: args.brands,
    };
    selection.check()?;

    let batch = load_listings(&args.input)?;
    let ov = stats::overview(&batch)?;
    info!(
        total = ov.total,
        avg_price = ?ov.avg_price,
        avg_km = ?ov.avg_km,
        oldest = ?ov.oldest,
        newest = ?ov.newest,
        "overview"
    );

    let page = render_dashboard(&batch, &selection, Utc::now())?;
    fs::write(&args.output, page.into_string())
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(path = %args.output.display(), "dashboard written");
    Ok(())
}
