// src/process/pipeline.rs

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use super::{
    dedupe::{SeenListings, SeenMarkup},
    normalize::{first_record, flagged_as_error, normalize},
};
use crate::{
    config::SELECTOR_TIMEOUT,
    extract::Extractor,
    fetch::{IsolatedDocument, ListingSource},
    listing::{identifier, is_complete, RawListing},
};

/// Load `base_url`, pull every element matching `css_selector`, and run each
/// one through extraction, normalization and dedup. Elements are handled one
/// at a time; any failure skips that element. Failures before the element
/// loop end the page with no results. The session is closed before return.
#[instrument(level = "info", skip_all, fields(url = %base_url))]
pub async fn fetch_and_process_page<S, E>(
    source: &mut S,
    extractor: &E,
    base_url: &str,
    css_selector: &str,
    required_keys: &[&str],
    seen: &mut SeenListings,
) -> Vec<RawListing>
where
    S: ListingSource + ?Sized,
    E: Extractor + ?Sized,
{
    let mut listings = Vec::new();

    // ─── 1) load page and locate listings ───────────────────────────
    let total = match locate_listings(source, base_url, css_selector).await {
        Ok(n) => n,
        Err(e) => {
            error!(error = %format!("{:#}", e), "page setup failed");
            close_source(source).await;
            return listings;
        }
    };
    info!(total, selector = css_selector, "found listing elements");

    // ─── 2) process each element in turn ────────────────────────────
    let mut seen_markup = SeenMarkup::default();
    for idx in 0..total {
        let element = idx + 1;
        debug!(element, total, "processing element");

        let html = match source.inner_html(idx).await {
            Ok(h) => h,
            Err(e) => {
                error!(element, error = %e, "failed to read element HTML");
                continue;
            }
        };
        debug!(element, len = html.len(), "element HTML read");

        let Some(markup_id) = seen_markup.insert(&html) else {
            info!(element, "skipped duplicate element");
            continue;
        };
        debug!(element, markup_id, "element markup recorded");

        let mut record = match extract_record(extractor, element, &html).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                info!(element, "no valid data extracted");
                continue;
            }
            Err(e) => {
                error!(element, error = %format!("{:#}", e), "extraction failed");
                continue;
            }
        };

        if let Err(e) = normalize(&mut record) {
            error!(element, error = %e, "post-processing failed");
            continue;
        }

        if flagged_as_error(&record) {
            info!(element, "skipped: extraction flagged an error");
            continue;
        }

        if !is_complete(&record, required_keys) {
            info!(element, ?record, "skipped: missing required keys");
            continue;
        }

        let Some(id) = identifier(&record) else {
            continue;
        };
        if !seen.insert(id.clone()) {
            info!(element, id = %id, "skipped duplicate listing");
            continue;
        }

        info!(element, id = %id, "listing added");
        listings.push(record);
    }

    // ─── 3) release the browser ─────────────────────────────────────
    close_source(source).await;
    info!(count = listings.len(), "page processed");
    listings
}

async fn locate_listings<S>(source: &mut S, url: &str, selector: &str) -> Result<usize>
where
    S: ListingSource + ?Sized,
{
    source.open(url).await?;
    info!(%url, "navigated");
    source.wait_for(selector, SELECTOR_TIMEOUT).await?;
    source.find_listings(selector).await
}

async fn close_source<S>(source: &mut S)
where
    S: ListingSource + ?Sized,
{
    match source.close().await {
        Ok(()) => info!("browser closed"),
        Err(e) => error!(error = %e, "failed to close browser"),
    }
}

/// Isolate `html` into its own document, run extraction over it, and parse
/// the payload. `Ok(None)` means the provider answered with nothing usable.
async fn extract_record<E>(extractor: &E, element: usize, html: &str) -> Result<Option<RawListing>>
where
    E: Extractor + ?Sized,
{
    let doc = IsolatedDocument::create(html)?;
    if let Ok(url) = doc.url() {
        debug!(element, %url, "temporary document created");
    }

    let outcome = extractor.extract(&doc).await;

    let path = doc.path().to_path_buf();
    match doc.close() {
        Ok(()) => debug!(element, path = %path.display(), "temporary document deleted"),
        Err(e) => warn!(element, error = %e, "failed to delete temporary document"),
    }

    let extraction = outcome?;
    if !extraction.succeeded() {
        anyhow::bail!(
            "provider returned no content: {}",
            extraction.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    let content = extraction.content.unwrap_or_default();

    let payload: Value =
        serde_json::from_str(&content).context("parsing extracted content as JSON")?;
    debug!(element, %payload, "extracted data");
    Ok(first_record(payload))
}
