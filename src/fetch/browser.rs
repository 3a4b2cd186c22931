// src/fetch/browser.rs

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use fantoccini::{elements::Element, wd::Capabilities, Client, ClientBuilder, Locator};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ListingSource;
use crate::config::{USER_AGENT, VIEWPORT};

const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined })";

/// Headless Chromium driven over WebDriver (chromedriver on `WEBDRIVER_URL`).
pub struct WebDriverSource {
    client: Option<Client>,
    elements: Vec<Element>,
}

fn chrome_capabilities() -> Capabilities {
    let (width, height) = VIEWPORT;
    let mut caps = Capabilities::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": [
                "--headless=new",
                "--no-sandbox",
                "--disable-gpu",
                "--disable-dev-shm-usage",
                format!("--window-size={},{}", width, height),
                format!("--user-agent={}", USER_AGENT),
            ]
        }),
    );
    caps
}

impl WebDriverSource {
    pub async fn launch(webdriver_url: &str) -> Result<Self> {
        info!(%webdriver_url, "launching browser");
        let mut builder = ClientBuilder::native();
        builder.capabilities(chrome_capabilities());
        let client = builder
            .connect(webdriver_url)
            .await
            .with_context(|| format!("connecting to webdriver at {}", webdriver_url))?;
        info!("browser launched");
        Ok(Self {
            client: Some(client),
            elements: Vec::new(),
        })
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or_else(|| anyhow!("browser session is closed"))
    }
}

#[async_trait]
impl ListingSource for WebDriverSource {
    async fn open(&mut self, url: &str) -> Result<()> {
        let client = self.client()?;
        client
            .goto(url)
            .await
            .with_context(|| format!("navigating to {}", url))?;
        // WebDriver has no init-script hook, so patch the page once loaded.
        if let Err(e) = client.execute(HIDE_WEBDRIVER, vec![]).await {
            warn!(error = %e, "anti-detection script failed");
        } else {
            debug!("anti-detection script applied");
        }
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        self.client()?
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .with_context(|| format!("waiting {:?} for '{}'", timeout, selector))?;
        Ok(())
    }

    async fn find_listings(&mut self, selector: &str) -> Result<usize> {
        let found = self
            .client()?
            .find_all(Locator::Css(selector))
            .await
            .with_context(|| format!("querying '{}'", selector))?;
        self.elements = found;
        Ok(self.elements.len())
    }

    async fn inner_html(&mut self, idx: usize) -> Result<String> {
        let element = self
            .elements
            .get(idx)
            .ok_or_else(|| anyhow!("no element at index {}", idx))?;
        element
            .html(true)
            .await
            .with_context(|| format!("reading inner HTML of element {}", idx + 1))
    }

    async fn close(&mut self) -> Result<()> {
        self.elements.clear();
        if let Some(client) = self.client.take() {
            client.close().await.context("closing browser session")?;
        }
        Ok(())
    }
}
