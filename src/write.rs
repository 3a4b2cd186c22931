// src/write.rs

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::{debug, error, info};

use crate::listing::{Listing, RawListing, FIELDS};

/// Write `records` to `path` as CSV with the fixed `year,name,kilometers,price`
/// header, replacing any existing file.
///
/// - each record is cut down to the fixed fields first; a record that cannot
///   be is logged and skipped
/// - nothing is written when no record survives
/// - returns the number of rows written
pub fn save_listings_to_csv<P: AsRef<Path>>(records: &[RawListing], path: P) -> Result<usize> {
    let path = path.as_ref();
    if records.is_empty() {
        info!("no listings to save");
        return Ok(0);
    }
    info!(path = %path.display(), fields = ?FIELDS, "saving listings");

    // 1) Clean each record down to the output fields
    let total = records.len();
    let mut cleaned: Vec<Listing> = Vec::with_capacity(total);
    for (idx, record) in records.iter().enumerate() {
        match Listing::from_record(record) {
            Ok(listing) => {
                debug!(record = idx + 1, total, ?listing, "cleaned listing");
                cleaned.push(listing);
            }
            Err(e) => {
                error!(record = idx + 1, total, error = %e, ?record, "failed to clean listing; skipping");
            }
        }
    }
    if cleaned.is_empty() {
        info!("no listings to save after cleaning");
        return Ok(0);
    }

    // 2) Write to a temp file next to the target, then persist it over the
    //    target; the temp file is removed on drop if anything fails
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "listings.csv".to_string());
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    let tmp_path = tmp.path().to_path_buf();

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(tmp);
    writer
        .write_record(FIELDS)
        .with_context(|| format!("writing header to {}", tmp_path.display()))?;

    let mut written = 0;
    for listing in &cleaned {
        match writer.write_record([
            listing.year.to_string().as_str(),
            listing.name.as_str(),
            listing.kilometers.as_str(),
            listing.price.as_str(),
        ]) {
            Ok(()) => written += 1,
            Err(e) => error!(id = %listing.identifier(), error = %e, "failed to write row; skipping"),
        }
    }
    let tmp = writer
        .into_inner()
        .map_err(|e| anyhow!("flushing {}: {}", tmp_path.display(), e.error()))?;

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("renaming {} to {}", tmp_path.display(), path.display()))?;

    info!(count = written, path = %path.display(), "saved listings");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::tempdir;

    fn record(v: Value) -> RawListing {
        v.as_object().cloned().unwrap()
    }

    fn entries(dir: &Path) -> Result<Vec<String>> {
        let mut names = fs::read_dir(dir)?
            .map(|e| Ok(e?.file_name().to_string_lossy().to_string()))
            .collect::<Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }

    #[test]
    fn header_and_order_are_fixed() -> Result<()> {
        let dir = tempdir()?;
        let out = dir.path().join("cars.csv");
        let records = vec![
            record(json!({
                "price": "$31,990",
                "error": false,
                "kilometers": "12,000 km",
                "name": "Toyota RAV4",
                "year": 2021
            })),
            record(json!({"year": 2015, "name": "Ford Focus", "kilometers": "98,100 km", "price": "$9,400"})),
        ];

        assert_eq!(save_listings_to_csv(&records, &out)?, 2);
        let text = fs::read_to_string(&out)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "year,name,kilometers,price",
                "2021,Toyota RAV4,\"12,000 km\",\"$31,990\"",
                "2015,Ford Focus,\"98,100 km\",\"$9,400\"",
            ]
        );
        assert_eq!(entries(dir.path())?, vec!["cars.csv".to_string()]);
        Ok(())
    }

    #[test]
    fn unusable_records_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        let out = dir.path().join("cars.csv");
        let records = vec![
            record(json!({"name": "No Year", "kilometers": "1 km", "price": "$1"})),
            record(json!({"year": 2019, "name": "Mazda 3", "kilometers": "40,000 km", "price": "$17,000"})),
        ];
        assert_eq!(save_listings_to_csv(&records, &out)?, 1);
        let mut rdr = csv::Reader::from_path(&out)?;
        let rows: Vec<Listing> = rdr.deserialize().collect::<Result<_, _>>()?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Mazda 3");
        Ok(())
    }

    #[test]
    fn nothing_to_write_leaves_existing_file() -> Result<()> {
        let dir = tempdir()?;
        let out = dir.path().join("cars.csv");
        fs::write(&out, "previous")?;
        assert_eq!(save_listings_to_csv(&[], &out)?, 0);
        let bad = vec![record(json!({"year": "x"}))];
        assert_eq!(save_listings_to_csv(&bad, &out)?, 0);
        assert_eq!(fs::read_to_string(&out)?, "previous");
        Ok(())
    }

    #[test]
    fn existing_file_is_overwritten() -> Result<()> {
        let dir = tempdir()?;
        let out = dir.path().join("cars.csv");
        fs::write(&out, "stale,contents\n1,2\n3,4\n")?;
        let records =
            vec![record(json!({"year": 2020, "name": "Model A", "kilometers": "50000 km", "price": "$20,000"}))];
        save_listings_to_csv(&records, &out)?;
        assert_eq!(
            fs::read_to_string(&out)?,
            "year,name,kilometers,price\n2020,Model A,50000 km,\"$20,000\"\n"
        );
        Ok(())
    }

    #[test]
    fn failed_rename_removes_temp_file() -> Result<()> {
        let dir = tempdir()?;
        // a non-empty directory at the target path makes the final rename fail
        let out = dir.path().join("cars.csv");
        fs::create_dir(&out)?;
        fs::write(out.join("keep"), "x")?;
        let records =
            vec![record(json!({"year": 2020, "name": "Model A", "kilometers": "50000 km", "price": "$20,000"}))];

        assert!(save_listings_to_csv(&records, &out).is_err());
        assert_eq!(entries(dir.path())?, vec!["cars.csv".to_string()]);
        assert!(out.is_dir());
        Ok(())
    }
}
