// src/dashboard/load.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Int64Array, StringArray},
    datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema, SchemaRef},
    record_batch::RecordBatch,
};
use once_cell::sync::Lazy;
use std::{path::Path, sync::Arc};
use tracing::{info, instrument};

use crate::listing::Listing;

/// Columns of the cleaned dashboard table, in order.
pub static SCHEMA: Lazy<SchemaRef> = Lazy::new(|| {
    Arc::new(ArrowSchema::new(vec![
        Field::new("year", ArrowDataType::Int64, false),
        Field::new("name", ArrowDataType::Utf8, false),
        Field::new("kilometers", ArrowDataType::Int64, false),
        Field::new("price", ArrowDataType::Int64, false),
        Field::new("brand", ArrowDataType::Utf8, false),
    ]))
});

/// "72,942 km" -> 72942
pub fn parse_kilometers(raw: &str) -> Result<i64> {
    let digits = raw.replace(" km", "").replace(',', "");
    digits
        .trim()
        .parse()
        .with_context(|| format!("kilometers {:?} is not an integer", raw))
}

/// "$32,990" -> 32990
pub fn parse_price(raw: &str) -> Result<i64> {
    let digits = raw.replace('$', "").replace(',', "");
    digits
        .trim()
        .parse()
        .with_context(|| format!("price {:?} is not an integer", raw))
}

/// First whitespace-separated word of the model name.
pub fn brand_of(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or("")
}

/// Build the cleaned table from listings: kilometers and price become
/// integers and a `brand` column is derived from the name.
pub fn clean_listings(listings: &[Listing]) -> Result<RecordBatch> {
    let mut years = Vec::with_capacity(listings.len());
    let mut names = Vec::with_capacity(listings.len());
    let mut kms = Vec::with_capacity(listings.len());
    let mut prices = Vec::with_capacity(listings.len());
    let mut brands = Vec::with_capacity(listings.len());

    for (idx, l) in listings.iter().enumerate() {
        let row = idx + 1;
        years.push(l.year);
        names.push(l.name.as_str());
        kms.push(parse_kilometers(&l.kilometers).with_context(|| format!("row {}", row))?);
        prices.push(parse_price(&l.price).with_context(|| format!("row {}", row))?);
        brands.push(brand_of(&l.name));
    }

    let cols: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(years)),
        Arc::new(StringArray::from(names)),
        Arc::new(Int64Array::from(kms)),
        Arc::new(Int64Array::from(prices)),
        Arc::new(StringArray::from(brands)),
    ];
    RecordBatch::try_new(SCHEMA.clone(), cols).map_err(Into::into)
}

/// Read the scraper's CSV output and clean it into a table.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_listings<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut listings = Vec::new();
    for (idx, result) in rdr.deserialize::<Listing>().enumerate() {
        let listing =
            result.with_context(|| format!("CSV parse error in {} at row {}", path.display(), idx + 1))?;
        listings.push(listing);
    }
    info!(rows = listings.len(), "loaded listings");

    clean_listings(&listings).with_context(|| format!("cleaning {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::stats::{int_column, str_column};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn column_parsing() -> Result<()> {
        assert_eq!(parse_kilometers("72,942 km")?, 72942);
        assert_eq!(parse_kilometers("50000 km")?, 50000);
        assert_eq!(parse_price("$32,990")?, 32990);
        assert!(parse_price("$32,990 or $321/biweekly").is_err());
        assert!(parse_kilometers("n/a").is_err());
        Ok(())
    }

    #[test]
    fn brand_is_first_word() {
        assert_eq!(brand_of("Mercedes-Benz C-Class C 300 4MATIC"), "Mercedes-Benz");
        assert_eq!(brand_of("  Honda Civic"), "Honda");
        assert_eq!(brand_of(""), "");
    }

    #[test]
    fn loads_scraper_output() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("complete_cars.csv");
        fs::write(
            &path,
            "year,name,kilometers,price\n\
             2020,Model A,50000 km,\"$20,000\"\n\
             2018,Honda Civic LX,\"72,942 km\",\"$15,490\"\n",
        )?;

        let batch = load_listings(&path)?;
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema(), SCHEMA.clone());
        assert_eq!(int_column(&batch, "kilometers")?.values().to_vec(), vec![50000, 72942]);
        assert_eq!(int_column(&batch, "price")?.values().to_vec(), vec![20000, 15490]);
        assert_eq!(str_column(&batch, "brand")?.value(1), "Honda");
        Ok(())
    }

    #[test]
    fn bad_row_reports_its_position() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("complete_cars.csv");
        fs::write(
            &path,
            "year,name,kilometers,price\n2020,Model A,50000 km,$20000\n2019,Model B,lots,$1\n",
        )?;
        let err = load_listings(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("row 2"));
        Ok(())
    }
}
