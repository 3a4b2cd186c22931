// src/dashboard/stats.rs

use anyhow::{anyhow, bail, Result};
use arrow::{
    array::{Array, BooleanArray, Int64Array, StringArray},
    compute::{filter_record_batch, max, min, sum},
    record_batch::RecordBatch,
};
use std::collections::{BTreeMap, HashMap};

pub fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("no column '{}'", name))?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| anyhow!("column '{}' is not Int64", name))
}

pub fn str_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("no column '{}'", name))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("column '{}' is not Utf8", name))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub total: usize,
    pub avg_price: Option<f64>,
    pub avg_km: Option<f64>,
    pub oldest: Option<i64>,
    pub newest: Option<i64>,
}

fn mean(arr: &Int64Array) -> Option<f64> {
    let n = arr.len() - arr.null_count();
    sum(arr).filter(|_| n > 0).map(|s| s as f64 / n as f64)
}

pub fn overview(batch: &RecordBatch) -> Result<Overview> {
    let years = int_column(batch, "year")?;
    Ok(Overview {
        total: batch.num_rows(),
        avg_price: mean(int_column(batch, "price")?),
        avg_km: mean(int_column(batch, "kilometers")?),
        oldest: min(years),
        newest: max(years),
    })
}

/// Listings per model year, oldest first.
pub fn year_counts(batch: &RecordBatch) -> Result<Vec<(i64, usize)>> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for y in int_column(batch, "year")?.iter().flatten() {
        *counts.entry(y).or_default() += 1;
    }
    Ok(counts.into_iter().collect())
}

/// Listings per brand, most common first; ties by name.
pub fn brand_counts(batch: &RecordBatch) -> Result<Vec<(String, usize)>> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for b in str_column(batch, "brand")?.iter().flatten() {
        *counts.entry(b).or_default() += 1;
    }
    let mut out: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(b, n)| (b.to_string(), n))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(out)
}

/// Sorted distinct brands.
pub fn brands(batch: &RecordBatch) -> Result<Vec<String>> {
    let mut out: Vec<String> = brand_counts(batch)?.into_iter().map(|(b, _)| b).collect();
    out.sort();
    Ok(out)
}

/// Labelled, right-closed ranges starting at `edges[0]` (inclusive); the
/// last range has no upper bound.
#[derive(Debug, Clone, Copy)]
pub struct RangeBins {
    pub edges: &'static [i64],
    pub labels: &'static [&'static str],
}

pub const PRICE_RANGES: RangeBins = RangeBins {
    edges: &[0, 20_000, 30_000, 40_000, 50_000],
    labels: &[
        "< $20,000",
        "$20,000-$30,000",
        "$30,000-$40,000",
        "$40,000-$50,000",
        "> $50,000",
    ],
};

pub const KM_RANGES: RangeBins = RangeBins {
    edges: &[0, 25_000, 50_000, 75_000, 100_000],
    labels: &[
        "0-25,000 km",
        "25,001-50,000 km",
        "50,001-75,000 km",
        "75,001-100,000 km",
        "> 100,000 km",
    ],
};

impl RangeBins {
    /// Index of the range holding `v`, or `None` below the first edge.
    pub fn index_of(&self, v: i64) -> Option<usize> {
        if v < *self.edges.first()? {
            return None;
        }
        for i in 0..self.labels.len() {
            match self.edges.get(i + 1) {
                Some(upper) if v <= *upper => return Some(i),
                Some(_) => continue,
                None => return Some(i),
            }
        }
        None
    }

    pub fn label_of(&self, v: i64) -> Option<&'static str> {
        self.index_of(v).map(|i| self.labels[i])
    }

    /// Count per range, every range listed in order even when empty.
    pub fn counts(&self, values: &Int64Array) -> Vec<(&'static str, usize)> {
        let mut counts = vec![0usize; self.labels.len()];
        for i in values.iter().flatten().filter_map(|v| self.index_of(v)) {
            counts[i] += 1;
        }
        self.labels.iter().copied().zip(counts).collect()
    }

    pub fn check(&self, selected: &[String]) -> Result<()> {
        for s in selected {
            if !self.labels.iter().any(|l| l == s) {
                bail!("unknown range {:?}; expected one of {:?}", s, self.labels);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// `nbins` equal-width bins spanning the values; the last bin is closed.
pub fn histogram(values: &Int64Array, nbins: usize) -> Vec<HistogramBin> {
    let vals: Vec<i64> = values.iter().flatten().collect();
    let (Some(lo), Some(hi)) = (vals.iter().min().copied(), vals.iter().max().copied()) else {
        return Vec::new();
    };
    if nbins == 0 {
        return Vec::new();
    }
    if lo == hi {
        return vec![HistogramBin {
            start: lo as f64,
            end: lo as f64 + 1.0,
            count: vals.len(),
        }];
    }

    let (lo, hi) = (lo as f64, hi as f64);
    let width = (hi - lo) / nbins as f64;
    let mut bins: Vec<HistogramBin> = (0..nbins)
        .map(|i| HistogramBin {
            start: lo + width * i as f64,
            end: lo + width * (i + 1) as f64,
            count: 0,
        })
        .collect();
    for v in vals {
        let i = (((v as f64 - lo) / width) as usize).min(nbins - 1);
        bins[i].count += 1;
    }
    bins
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarSummary {
    pub name: String,
    pub year: i64,
    pub price: i64,
}

fn car_at(batch: &RecordBatch, row: usize) -> Result<CarSummary> {
    Ok(CarSummary {
        name: str_column(batch, "name")?.value(row).to_string(),
        year: int_column(batch, "year")?.value(row),
        price: int_column(batch, "price")?.value(row),
    })
}

/// First listing with the highest price.
pub fn most_expensive(batch: &RecordBatch) -> Result<Option<CarSummary>> {
    let prices = int_column(batch, "price")?;
    let mut best: Option<(usize, i64)> = None;
    for (row, p) in prices.iter().enumerate() {
        if let Some(p) = p {
            if best.map_or(true, |(_, b)| p > b) {
                best = Some((row, p));
            }
        }
    }
    best.map(|(row, _)| car_at(batch, row)).transpose()
}

/// First listing with the lowest price.
pub fn least_expensive(batch: &RecordBatch) -> Result<Option<CarSummary>> {
    let prices = int_column(batch, "price")?;
    let mut best: Option<(usize, i64)> = None;
    for (row, p) in prices.iter().enumerate() {
        if let Some(p) = p {
            if best.map_or(true, |(_, b)| p < b) {
                best = Some((row, p));
            }
        }
    }
    best.map(|(row, _)| car_at(batch, row)).transpose()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStats {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Linear-interpolated quantile of already sorted values.
pub fn quantile(sorted: &[i64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] as f64 + (sorted[hi] - sorted[lo]) as f64 * frac)
}

impl BoxStats {
    pub fn from_values(mut values: Vec<i64>) -> Option<Self> {
        values.sort_unstable();
        Some(Self {
            count: values.len(),
            min: quantile(&values, 0.0)?,
            q1: quantile(&values, 0.25)?,
            median: quantile(&values, 0.5)?,
            q3: quantile(&values, 0.75)?,
            max: quantile(&values, 1.0)?,
        })
    }
}

/// Price spread for each model year, oldest first.
pub fn price_by_year(batch: &RecordBatch) -> Result<Vec<(i64, BoxStats)>> {
    let years = int_column(batch, "year")?;
    let prices = int_column(batch, "price")?;
    let mut groups: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for (y, p) in years.iter().zip(prices.iter()) {
        if let (Some(y), Some(p)) = (y, p) {
            groups.entry(y).or_default().push(p);
        }
    }
    Ok(groups
        .into_iter()
        .filter_map(|(y, v)| BoxStats::from_values(v).map(|b| (y, b)))
        .collect())
}

/// Chosen values for each dashboard filter. An empty list selects all.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub years: Vec<i64>,
    pub price_ranges: Vec<String>,
    pub km_ranges: Vec<String>,
    pub brands: Vec<String>,
}

impl Selection {
    pub fn check(&self) -> Result<()> {
        PRICE_RANGES.check(&self.price_ranges)?;
        KM_RANGES.check(&self.km_ranges)
    }
}

fn filter_rows(batch: &RecordBatch, keep: impl Fn(usize) -> bool) -> Result<RecordBatch> {
    let mask: BooleanArray = (0..batch.num_rows()).map(|i| Some(keep(i))).collect();
    filter_record_batch(batch, &mask).map_err(Into::into)
}

pub fn filter_years(batch: &RecordBatch, years: &[i64]) -> Result<RecordBatch> {
    if years.is_empty() {
        return Ok(batch.clone());
    }
    let col = int_column(batch, "year")?;
    filter_rows(batch, |i| col.is_valid(i) && years.contains(&col.value(i)))
}

pub fn filter_ranges(
    batch: &RecordBatch,
    column: &str,
    bins: &RangeBins,
    labels: &[String],
) -> Result<RecordBatch> {
    if labels.is_empty() {
        return Ok(batch.clone());
    }
    let col = int_column(batch, column)?;
    filter_rows(batch, |i| {
        col.is_valid(i)
            && bins
                .label_of(col.value(i))
                .is_some_and(|l| labels.iter().any(|s| s == l))
    })
}

pub fn filter_brands(batch: &RecordBatch, brands: &[String]) -> Result<RecordBatch> {
    if brands.is_empty() {
        return Ok(batch.clone());
    }
    let col = str_column(batch, "brand")?;
    filter_rows(batch, |i| {
        col.is_valid(i) && brands.iter().any(|b| b == col.value(i))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dashboard::load::clean_listings, listing::Listing};

    fn car(year: i64, name: &str, km: &str, price: &str) -> Listing {
        Listing {
            year,
            name: name.into(),
            kilometers: km.into(),
            price: price.into(),
        }
    }

    fn sample() -> RecordBatch {
        clean_listings(&[
            car(2020, "Toyota Corolla LE", "20,000 km", "$20,000"),
            car(2018, "Honda Civic LX", "60,000 km", "$15,000"),
            car(2020, "Toyota RAV4 XLE", "25,001 km", "$35,500"),
            car(2015, "Ford F-150 XLT", "140,000 km", "$55,000"),
            car(2018, "Honda Accord", "50,000 km", "$20,001"),
        ])
        .unwrap()
    }

    #[test]
    fn overview_numbers() -> Result<()> {
        let o = overview(&sample())?;
        assert_eq!(o.total, 5);
        assert_eq!(o.avg_price, Some(29_100.2));
        assert_eq!(o.avg_km, Some(59_000.2));
        assert_eq!(o.oldest, Some(2015));
        assert_eq!(o.newest, Some(2020));

        let empty = clean_listings(&[])?;
        let o = overview(&empty)?;
        assert_eq!(o.total, 0);
        assert_eq!(o.avg_price, None);
        assert_eq!(o.oldest, None);
        Ok(())
    }

    #[test]
    fn counts_by_year_and_brand() -> Result<()> {
        let b = sample();
        assert_eq!(year_counts(&b)?, vec![(2015, 1), (2018, 2), (2020, 2)]);
        assert_eq!(
            brand_counts(&b)?,
            vec![("Honda".to_string(), 2), ("Toyota".to_string(), 2), ("Ford".to_string(), 1)]
        );
        assert_eq!(brands(&b)?, vec!["Ford", "Honda", "Toyota"]);
        Ok(())
    }

    #[test]
    fn range_edges_are_right_closed() {
        assert_eq!(PRICE_RANGES.label_of(0), Some("< $20,000"));
        assert_eq!(PRICE_RANGES.label_of(20_000), Some("< $20,000"));
        assert_eq!(PRICE_RANGES.label_of(20_001), Some("$20,000-$30,000"));
        assert_eq!(PRICE_RANGES.label_of(50_000), Some("$40,000-$50,000"));
        assert_eq!(PRICE_RANGES.label_of(50_001), Some("> $50,000"));
        assert_eq!(PRICE_RANGES.label_of(-1), None);
        assert_eq!(KM_RANGES.label_of(25_000), Some("0-25,000 km"));
        assert_eq!(KM_RANGES.label_of(25_001), Some("25,001-50,000 km"));
    }

    #[test]
    fn range_counts_list_every_range() -> Result<()> {
        let b = sample();
        assert_eq!(
            PRICE_RANGES.counts(int_column(&b, "price")?),
            vec![
                ("< $20,000", 2),
                ("$20,000-$30,000", 1),
                ("$30,000-$40,000", 1),
                ("$40,000-$50,000", 0),
                ("> $50,000", 1),
            ]
        );
        Ok(())
    }

    #[test]
    fn histogram_spans_min_to_max() -> Result<()> {
        let b = sample();
        let h = histogram(int_column(&b, "price")?, 10);
        assert_eq!(h.len(), 10);
        assert_eq!(h[0].start, 15_000.0);
        assert_eq!(h[9].end, 55_000.0);
        assert_eq!(h.iter().map(|b| b.count).sum::<usize>(), 5);
        assert_eq!(h[0].count, 1);
        assert_eq!(h[1].count, 2);
        assert_eq!(h[9].count, 1);
        Ok(())
    }

    #[test]
    fn extremes_take_first_match() -> Result<()> {
        let b = clean_listings(&[
            car(2019, "A One", "1 km", "$10"),
            car(2020, "B Two", "1 km", "$30"),
            car(2021, "C Three", "1 km", "$30"),
            car(2022, "D Four", "1 km", "$10"),
        ])?;
        assert_eq!(most_expensive(&b)?.map(|c| c.name), Some("B Two".to_string()));
        assert_eq!(least_expensive(&b)?.map(|c| c.name), Some("A One".to_string()));
        assert_eq!(most_expensive(&clean_listings(&[])?)?, None);
        Ok(())
    }

    #[test]
    fn box_stats_interpolate() -> Result<()> {
        let s = BoxStats::from_values(vec![4, 1, 3, 2]).unwrap();
        assert_eq!((s.min, s.q1, s.median, s.q3, s.max), (1.0, 1.75, 2.5, 3.25, 4.0));
        assert_eq!(BoxStats::from_values(vec![]), None);

        let by_year = price_by_year(&sample())?;
        assert_eq!(by_year.len(), 3);
        assert_eq!(by_year[1].0, 2018);
        assert_eq!(by_year[1].1.median, 17_500.5);
        Ok(())
    }

    #[test]
    fn filters_apply_independently() -> Result<()> {
        let b = sample();
        assert_eq!(filter_years(&b, &[2018])?.num_rows(), 2);
        assert_eq!(filter_years(&b, &[])?.num_rows(), 5);
        assert_eq!(
            filter_ranges(&b, "price", &PRICE_RANGES, &["> $50,000".to_string()])?.num_rows(),
            1
        );
        assert_eq!(
            filter_ranges(&b, "kilometers", &KM_RANGES, &["25,001-50,000 km".to_string()])?
                .num_rows(),
            2
        );
        let hondas = filter_brands(&b, &["Honda".to_string()])?;
        assert_eq!(str_column(&hondas, "name")?.value(0), "Honda Civic LX");
        Ok(())
    }

    #[test]
    fn unknown_range_labels_are_rejected() {
        let sel = Selection {
            price_ranges: vec!["cheap".into()],
            ..Default::default()
        };
        assert!(sel.check().is_err());
        assert!(Selection::default().check().is_ok());
    }
}
