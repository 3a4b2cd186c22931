// src/fetch/mod.rs

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::{
    io::Write,
    path::Path,
    time::Duration,
};
use tempfile::NamedTempFile;
use url::Url;

pub mod browser;

pub use browser::WebDriverSource;

static BODY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("body selector should parse"));

/// A rendered page that can hand out the markup of the elements matching a
/// selector, one at a time.
#[async_trait]
pub trait ListingSource: Send {
    /// Navigate the session to `url`.
    async fn open(&mut self, url: &str) -> Result<()>;

    /// Block until at least one element matches `selector`, or `timeout` passes.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()>;

    /// Locate every element matching `selector`; returns how many were found.
    async fn find_listings(&mut self, selector: &str) -> Result<usize>;

    /// Inner HTML of the `idx`-th element from the last `find_listings` call.
    async fn inner_html(&mut self, idx: usize) -> Result<String>;

    /// End the session. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// One listing's markup on its own, wrapped in a bare document and backed by
/// a temporary `.html` file that lives as long as this value.
#[derive(Debug)]
pub struct IsolatedDocument {
    html: String,
    file: NamedTempFile,
}

impl IsolatedDocument {
    pub fn create(inner_html: &str) -> Result<Self> {
        let html = format!("<html><body>{}</body></html>", inner_html);
        let mut file = tempfile::Builder::new()
            .prefix("listing-")
            .suffix(".html")
            .tempfile()
            .context("creating temporary listing document")?;
        file.write_all(html.as_bytes())
            .with_context(|| format!("writing {}", file.path().display()))?;
        file.flush()?;
        Ok(Self { html, file })
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn url(&self) -> Result<Url> {
        Url::from_file_path(self.path())
            .map_err(|_| anyhow!("not an absolute path: {}", self.path().display()))
    }

    /// Visible text of the document, one trimmed text node per line.
    pub fn to_text(&self) -> String {
        let doc = Html::parse_document(&self.html);
        let Some(body) = doc.select(&BODY).next() else {
            return String::new();
        };
        body.text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Delete the backing file now instead of on drop, so failures surface.
    pub fn close(self) -> Result<()> {
        let path = self.file.path().to_path_buf();
        self.file
            .close()
            .with_context(|| format!("deleting {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_document_wraps_and_cleans_up() -> Result<()> {
        let doc = IsolatedDocument::create(
            "<div><h3>2020 Model A</h3><p> 50,000 km </p><span>$20,000</span></div>",
        )?;
        assert!(doc.html().starts_with("<html><body><div>"));
        assert!(doc.html().ends_with("</div></body></html>"));

        let path = doc.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("html"));
        assert_eq!(doc.url()?.scheme(), "file");
        assert_eq!(std::fs::read_to_string(&path)?, doc.html());

        assert_eq!(doc.to_text(), "2020 Model A\n50,000 km\n$20,000");

        doc.close()?;
        assert!(!path.exists());
        Ok(())
    }
}
