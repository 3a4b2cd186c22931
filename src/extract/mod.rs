// src/extract/mod.rs

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tracing::info;

use crate::fetch::IsolatedDocument;

pub mod openai;

pub use openai::OpenAiExtractor;

/// Fixed prompt sent with every listing.
pub const INSTRUCTION: &str = "\
Extract a car object with 'year', 'name', 'kilometers', and 'price' from the following content. \
The content represents a single car listing. Follow these rules strictly:
- 'year' must be an integer (e.g., 2020). It is typically the first part of the car title.
- 'name' must be the car model as a string (e.g., 'Mercedes-Benz C-Class C 300 4MATIC'). It follows the year in the car title.
- 'kilometers' must be a string with the unit 'km' (e.g., '72,942 km'). It is usually below the car title.
- 'price' must be a string with the currency symbol (e.g., '$32,990'). It is the main price, typically the largest price text. \
Exclude any additional text like 'or $321/biweekly', 'SALE', or other payment details.
If any field cannot be extracted correctly, return an empty object {}.";

/// JSON schema of the object the model is asked to return.
pub static LISTING_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "title": "Car",
        "description": "Represents the data structure of a Car.",
        "type": "object",
        "properties": {
            "year": { "title": "Year", "type": "integer" },
            "name": { "title": "Name", "type": "string" },
            "kilometers": { "title": "Kilometers", "type": "string" },
            "price": { "title": "Price", "type": "string" }
        },
        "required": ["year", "name", "kilometers", "price"]
    })
});

/// Outcome of one extraction call. `content` is the raw JSON text the
/// provider returned; `None` means the call completed but produced nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub content: Option<String>,
    pub error_message: Option<String>,
}

impl Extraction {
    pub fn succeeded(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// Running token totals across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, prompt: u64, completion: u64, total: u64) {
        self.requests += 1;
        self.prompt_tokens += prompt;
        self.completion_tokens += completion;
        self.total_tokens += total;
    }

    pub fn log(&self) {
        info!(
            requests = self.requests,
            prompt_tokens = self.prompt_tokens,
            completion_tokens = self.completion_tokens,
            total_tokens = self.total_tokens,
            "extraction usage"
        );
    }
}

/// Turns one isolated listing document into structured fields.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, doc: &IsolatedDocument) -> Result<Extraction>;

    fn usage(&self) -> Usage {
        Usage::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_is_not_a_success() {
        let blank = Extraction {
            content: Some("  ".into()),
            error_message: None,
        };
        assert!(!blank.succeeded());
        assert!(!Extraction::default().succeeded());
        let ok = Extraction {
            content: Some("{}".into()),
            error_message: None,
        };
        assert!(ok.succeeded());
    }

    #[test]
    fn usage_accumulates() {
        let mut u = Usage::default();
        u.add(100, 20, 120);
        u.add(50, 10, 60);
        assert_eq!(
            u,
            Usage {
                requests: 2,
                prompt_tokens: 150,
                completion_tokens: 30,
                total_tokens: 180,
            }
        );
    }

    #[test]
    fn schema_requires_every_output_field() {
        let required: Vec<&str> = LISTING_SCHEMA["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, crate::listing::FIELDS);
    }
}
