// src/process/normalize.rs

use anyhow::{bail, Result};
use serde_json::{Map, Value};

use crate::listing::RawListing;

/// Tidy the fields of a freshly extracted record in place. Only keys that
/// are present are touched; a missing key is left for the completeness check.
pub fn normalize(record: &mut RawListing) -> Result<()> {
    if let Some(v) = record.get("year") {
        let year = coerce_year(v)?;
        record.insert("year".into(), Value::from(year));
    }
    if let Some(v) = record.get("price") {
        let Value::String(price) = v else {
            bail!("'price' is not a string: {}", v);
        };
        let price = clean_price(price);
        record.insert("price".into(), Value::String(price));
    }
    if let Some(v) = record.get("kilometers") {
        let km = match v {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => bail!("'kilometers' is not text: {}", other),
        };
        record.insert("kilometers".into(), Value::String(with_km_suffix(&km)));
    }
    Ok(())
}

/// Integers pass through, floats truncate, numeric strings parse.
pub fn coerce_year(v: &Value) -> Result<i64> {
    match v {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64().filter(|f| f.is_finite()) {
                Ok(f.trunc() as i64)
            } else {
                bail!("'year' out of range: {}", n)
            }
        }
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(i) => Ok(i),
            Err(e) => bail!("'year' is not an integer ({:?}): {}", s, e),
        },
        other => bail!("'year' is not an integer: {}", other),
    }
}

/// Cut everything from the first " or " on, then drop "SALE" markers.
pub fn clean_price(raw: &str) -> String {
    let head = raw.split(" or ").next().unwrap_or(raw);
    head.trim().replace("SALE", "").trim().to_string()
}

/// Append " km" unless the value already mentions "km" anywhere.
pub fn with_km_suffix(raw: &str) -> String {
    if raw.contains("km") {
        raw.to_string()
    } else {
        format!("{} km", raw)
    }
}

/// Parse the extraction payload into a single record. Objects are taken
/// as-is, arrays yield their first element; anything empty is `None`.
pub fn first_record(payload: Value) -> Option<RawListing> {
    let record: Map<String, Value> = match payload {
        Value::Object(m) => m,
        Value::Array(items) => match items.into_iter().next()? {
            Value::Object(m) => m,
            _ => return None,
        },
        _ => return None,
    };
    (!record.is_empty()).then_some(record)
}

/// The model may flag its own failure with `"error": true`.
pub fn flagged_as_error(record: &RawListing) -> bool {
    matches!(record.get("error"), Some(Value::Bool(true)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> RawListing {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn price_drops_payment_and_sale_text() {
        assert_eq!(clean_price("$20,000 or $199/biweekly SALE"), "$20,000");
        assert_eq!(clean_price("SALE $18,500"), "$18,500");
        assert_eq!(clean_price("$32,990"), "$32,990");
        assert_eq!(clean_price("$9,999 or $99/biweekly or less"), "$9,999");
        assert_eq!(clean_price("  $15,000SALE  "), "$15,000");
    }

    #[test]
    fn km_suffix_only_added_when_missing() {
        assert_eq!(with_km_suffix("50000"), "50000 km");
        assert_eq!(with_km_suffix("72,942 km"), "72,942 km");
        assert_eq!(with_km_suffix("72,942km"), "72,942km");
    }

    #[test]
    fn year_coercion() {
        assert_eq!(coerce_year(&json!(2020)).unwrap(), 2020);
        assert_eq!(coerce_year(&json!(2019.0)).unwrap(), 2019);
        assert_eq!(coerce_year(&json!(" 2018 ")).unwrap(), 2018);
        assert!(coerce_year(&json!("2018 Honda")).is_err());
        assert!(coerce_year(&json!(null)).is_err());
    }

    #[test]
    fn normalize_rewrites_present_fields_only() -> Result<()> {
        let mut r = record(json!({
            "year": "2020",
            "name": "Model A",
            "kilometers": 50000,
            "price": "$20,000 or $199/biweekly SALE",
            "error": false
        }));
        normalize(&mut r)?;
        assert_eq!(
            Value::Object(r),
            json!({
                "year": 2020,
                "name": "Model A",
                "kilometers": "50000 km",
                "price": "$20,000",
                "error": false
            })
        );

        let mut partial = record(json!({"name": "Model B"}));
        normalize(&mut partial)?;
        assert_eq!(Value::Object(partial), json!({"name": "Model B"}));
        Ok(())
    }

    #[test]
    fn normalize_rejects_non_text_price() {
        let mut r = record(json!({"price": 20000}));
        assert!(normalize(&mut r).is_err());
    }

    #[test]
    fn payload_shapes() {
        assert_eq!(
            first_record(json!([{"year": 2020}, {"year": 2021}])),
            Some(record(json!({"year": 2020})))
        );
        assert_eq!(first_record(json!({})), None);
        assert_eq!(first_record(json!([])), None);
        assert_eq!(first_record(json!("text")), None);
    }

    #[test]
    fn error_flag() {
        assert!(flagged_as_error(&record(json!({"error": true}))));
        assert!(!flagged_as_error(&record(json!({"error": false}))));
        assert!(!flagged_as_error(&record(json!({"error": "true"}))));
        assert!(!flagged_as_error(&record(json!({}))));
    }
}
