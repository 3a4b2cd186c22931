// src/config.rs

use anyhow::{Context, Result};
use std::{env, time::Duration};

/// Listings page scraped on every run.
pub const BASE_URL: &str = "https://www.clutch.ca/cars";

/// Matches one card per vehicle on the listings page.
pub const CSS_SELECTOR: &str = "[class^='MuiStack-root css-ufpmpi']";

/// Keys an extracted record must carry to be kept.
pub const REQUIRED_KEYS: &[&str] = &["year", "name", "kilometers", "price"];

/// Written once at the end of a run, overwriting any previous file.
pub const OUTPUT_FILE: &str = "complete_cars.csv";

pub const SESSION_ID: &str = "car_crawl_session";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

pub const VIEWPORT: (u32, u32) = (1920, 1080);

/// How long to wait for the first listing card before giving up.
pub const SELECTOR_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// Runtime settings pulled from the environment.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub webdriver_url: String,
}

impl ScrapeConfig {
    /// `OPENAI_API_KEY` is required; everything else has a default.
    /// Values from a `.env` file must already be loaded into the process
    /// environment (the scraper does this at startup).
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        Ok(Self {
            api_key,
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_base: env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            webdriver_url: env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| DEFAULT_WEBDRIVER_URL.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_credentials_from_dotenv_file() -> Result<()> {
        let dir = tempdir()?;
        let dotenv = dir.path().join(".env");
        fs::write(
            &dotenv,
            "OPENAI_API_KEY=sk-from-file\nOPENAI_MODEL=gpt-4o-mini\nWEBDRIVER_URL=http://127.0.0.1:9515\n",
        )?;
        dotenvy::from_path_override(&dotenv)?;

        let config = ScrapeConfig::from_env()?;
        assert_eq!(config.api_key, "sk-from-file");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.webdriver_url, "http://127.0.0.1:9515");
        Ok(())
    }
}
