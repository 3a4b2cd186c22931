// src/listing.rs

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One extracted record as it comes back from the model, before it is cut
/// down to the fixed field list.
pub type RawListing = Map<String, Value>;

/// Column order of the output file.
pub const FIELDS: [&str; 4] = ["year", "name", "kilometers", "price"];

/// One scraped car.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub year: i64,
    pub name: String,
    pub kilometers: String,
    pub price: String,
}

impl Listing {
    /// Keep only the fixed fields of `record`. Extra keys (like `error`)
    /// are dropped; a missing or non-integer `year` is an error.
    pub fn from_record(record: &RawListing) -> Result<Self> {
        let year = record
            .get("year")
            .ok_or_else(|| anyhow!("missing key 'year'"))?;
        let year = year
            .as_i64()
            .with_context(|| format!("'year' is not an integer: {}", year))?;

        Ok(Self {
            year,
            name: text_field(record, "name")?,
            kilometers: text_field(record, "kilometers")?,
            price: text_field(record, "price")?,
        })
    }

    pub fn identifier(&self) -> String {
        format!("{}_{}", self.year, self.name)
    }
}

fn text_field(record: &RawListing, key: &str) -> Result<String> {
    record
        .get(key)
        .map(value_to_text)
        .ok_or_else(|| anyhow!("missing key '{}'", key))
}

/// Render a JSON value the way it should appear in a text cell: strings
/// without their quotes, everything else in its JSON form.
pub fn value_to_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Dedup key of a raw record: `<year>_<name>`. Name text is used verbatim.
pub fn identifier(record: &RawListing) -> Option<String> {
    let year = record.get("year")?;
    let name = record.get("name")?;
    Some(format!("{}_{}", value_to_text(year), value_to_text(name)))
}

/// True when every key in `required` is present on `record`.
pub fn is_complete(record: &RawListing, required: &[&str]) -> bool {
    required.iter().all(|k| record.contains_key(*k))
}
