// src/process/dedupe.rs

use std::{
    collections::{hash_map::DefaultHasher, HashSet},
    hash::{Hash, Hasher},
};

/// Listing identifiers (`<year>_<name>`) seen so far in this run.
#[derive(Debug, Default)]
pub struct SeenListings {
    seen: HashSet<String>,
}

impl SeenListings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `id` was already recorded.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.seen.insert(id.into())
    }
}

pub fn markup_hash(html: &str) -> u64 {
    let mut h = DefaultHasher::new();
    html.hash(&mut h);
    h.finish()
}

/// Hashes of element markup already sent for extraction on this page.
#[derive(Debug, Default)]
pub struct SeenMarkup {
    seen: HashSet<u64>,
}

impl SeenMarkup {
    /// Records `html` and returns its hash, or `None` if identical markup
    /// was already recorded.
    pub fn insert(&mut self, html: &str) -> Option<u64> {
        let id = markup_hash(html);
        self.seen.insert(id).then_some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_identifier_wins() {
        let mut seen = SeenListings::new();
        assert!(seen.insert("2020_Model A"));
        assert!(!seen.insert("2020_Model A"));
        assert!(seen.insert("2020_model a"));
        assert!(seen.insert("2020_Model A "));
        assert!(!seen.insert("2020_model a"));
    }

    #[test]
    fn identical_markup_is_skipped() {
        let mut seen = SeenMarkup::default();
        let first = seen.insert("<div>a</div>");
        assert!(first.is_some());
        assert_eq!(seen.insert("<div>a</div>"), None);
        assert!(seen.insert("<div>b</div>").is_some());
        assert_eq!(first, Some(markup_hash("<div>a</div>")));
    }
}
