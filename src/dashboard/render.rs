// src/dashboard/render.rs

use anyhow::Result;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use maud::{html, Markup, PreEscaped, DOCTYPE};

use super::stats::{
    brand_counts, brands, filter_brands, filter_ranges, filter_years, histogram, int_column,
    least_expensive, most_expensive, overview, price_by_year, str_column, year_counts, BoxStats,
    RangeBins, Selection, KM_RANGES, PRICE_RANGES,
};

const PALETTE: &[&str] = &[
    "#636efa", "#ef553b", "#00cc96", "#ab63fa", "#ffa15a", "#19d3f3", "#ff6692", "#b6e880",
    "#ff97ff", "#fecb52",
];

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0 auto; max-width: 1100px; padding: 1rem 2rem; color: #222; }
h1 { margin-bottom: 0.25rem; }
section { margin: 2rem 0; }
.stats { display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 0.75rem; }
.stat { background: #f4f6fa; border-radius: 6px; padding: 0.75rem; }
.stat strong { display: block; font-size: 1.3rem; }
.scroll { max-height: 320px; overflow-y: auto; border: 1px solid #ddd; }
table { border-collapse: collapse; width: 100%; font-size: 0.9rem; }
th, td { border-bottom: 1px solid #eee; padding: 0.25rem 0.5rem; text-align: left; }
th { background: #fafafa; position: sticky; top: 0; }
.filter { display: flex; flex-wrap: wrap; gap: 0.5rem 1rem; list-style: none; padding: 0; }
svg { background: #fff; border: 1px solid #eee; }
footer { color: #777; font-size: 0.85rem; border-top: 1px solid #ddd; padding-top: 0.5rem; }
"#;

const W: f64 = 760.0;
const H: f64 = 320.0;
const PAD_L: f64 = 70.0;
const PAD_R: f64 = 20.0;
const PAD_T: f64 = 30.0;
const PAD_B: f64 = 60.0;

/// 1234567 -> "1,234,567"
pub fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

/// 29100.2 -> "$29,100.20"
pub fn money(v: f64) -> String {
    let cents = (v * 100.0).round() as i64;
    format!("${}.{:02}", thousands(cents / 100), (cents % 100).abs())
}

fn color(i: usize) -> &'static str {
    PALETTE[i % PALETTE.len()]
}

/// Linear map from a data interval onto a pixel interval.
struct Scale {
    lo: f64,
    hi: f64,
    from: f64,
    to: f64,
}

impl Scale {
    fn new(lo: f64, hi: f64, from: f64, to: f64) -> Self {
        let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 1.0, hi + 1.0) };
        Self { lo, hi, from, to }
    }

    fn at(&self, v: f64) -> f64 {
        self.from + (v - self.lo) / (self.hi - self.lo) * (self.to - self.from)
    }
}

fn chart_frame(title: &str, x_label: &str, y_label: &str, body: Markup) -> Markup {
    html! {
        figure {
            svg width=(W) height=(H) viewBox=(format!("0 0 {} {}", W, H)) {
                text x=(W / 2.0) y="18" text-anchor="middle" font-weight="bold" { (title) }
                line x1=(PAD_L) y1=(H - PAD_B) x2=(W - PAD_R) y2=(H - PAD_B) stroke="#999" {}
                line x1=(PAD_L) y1=(PAD_T) x2=(PAD_L) y2=(H - PAD_B) stroke="#999" {}
                text x=((PAD_L + W - PAD_R) / 2.0) y=(H - 8.0) text-anchor="middle" font-size="12" { (x_label) }
                text x="14" y=(H / 2.0) text-anchor="middle" font-size="12"
                    transform=(format!("rotate(-90 14 {})", H / 2.0)) { (y_label) }
                (body)
            }
        }
    }
}

/// Vertical bars, one per `(label, count)`, in the given order.
pub fn bar_chart(title: &str, x_label: &str, y_label: &str, bars: &[(String, usize)]) -> Markup {
    let peak = bars.iter().map(|(_, n)| *n).max().unwrap_or(0).max(1) as f64;
    let y = Scale::new(0.0, peak, H - PAD_B, PAD_T);
    let slot = (W - PAD_L - PAD_R) / bars.len().max(1) as f64;
    let body = html! {
        text x=(PAD_L - 6.0) y=(PAD_T + 4.0) text-anchor="end" font-size="10" { (peak) }
        @for (i, (label, n)) in bars.iter().enumerate() {
            @let x = PAD_L + slot * i as f64 + slot * 0.1;
            @let top = y.at(*n as f64);
            g {
                title { (label) ": " (n) }
                rect x=(x) y=(top) width=(slot * 0.8) height=(H - PAD_B - top) fill=(color(i)) {}
                text x=(x + slot * 0.4) y=(H - PAD_B + 14.0) text-anchor="middle" font-size="10" { (label) }
                text x=(x + slot * 0.4) y=(top - 3.0) text-anchor="middle" font-size="10" { (n) }
            }
        }
    };
    chart_frame(title, x_label, y_label, body)
}

/// Slices clockwise from twelve o'clock, one per `(label, count)`, with a
/// legend on the right.
pub fn pie_chart(title: &str, slices: &[(String, usize)]) -> Markup {
    let total: usize = slices.iter().map(|(_, n)| *n).sum();
    let (cx, cy) = (W * 0.35, (H + PAD_T) / 2.0);
    let r = (H - PAD_T - 20.0) / 2.0;
    let point = |frac: f64| {
        let angle = frac * std::f64::consts::TAU - std::f64::consts::FRAC_PI_2;
        (cx + r * angle.cos(), cy + r * angle.sin())
    };
    let mut start = 0.0;
    let mut arcs = Vec::with_capacity(slices.len());
    for (label, n) in slices {
        let share = if total == 0 { 0.0 } else { *n as f64 / total as f64 };
        arcs.push((label, *n, share, start));
        start += share;
    }
    html! {
        figure {
            svg width=(W) height=(H) viewBox=(format!("0 0 {} {}", W, H)) {
                text x=(W / 2.0) y="18" text-anchor="middle" font-weight="bold" { (title) }
                @for (i, (label, n, share, from)) in arcs.iter().enumerate() {
                    g {
                        title { (label) ": " (n) " (" (format!("{:.1}%", share * 100.0)) ")" }
                        @if *share >= 1.0 {
                            circle cx=(cx) cy=(cy) r=(r) fill=(color(i)) stroke="#fff" {}
                        } @else if *share > 0.0 {
                            @let (x0, y0) = point(*from);
                            @let (x1, y1) = point(from + share);
                            @let large = if *share > 0.5 { 1 } else { 0 };
                            path d=(format!("M {cx} {cy} L {x0} {y0} A {r} {r} 0 {large} 1 {x1} {y1} Z"))
                                fill=(color(i)) stroke="#fff" {}
                        }
                    }
                }
                @for (i, (label, n, share, _)) in arcs.iter().enumerate() {
                    @let y = PAD_T + 10.0 + 16.0 * i as f64;
                    rect x=(W * 0.7) y=(y - 9.0) width="10" height="10" fill=(color(i)) {}
                    text x=(W * 0.7 + 16.0) y=(y) font-size="11" {
                        (label) " (" (n) ", " (format!("{:.1}%", share * 100.0)) ")"
                    }
                }
            }
        }
    }
}

pub struct Point {
    pub x: f64,
    pub y: f64,
    /// Relative size in `0.0..=1.0`.
    pub size: f64,
    pub color: &'static str,
    pub label: String,
}

pub fn scatter_chart(title: &str, x_label: &str, y_label: &str, points: &[Point]) -> Markup {
    let fold = |f: fn(&Point) -> f64| {
        points.iter().map(f).fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
    };
    let (x_lo, x_hi) = if points.is_empty() { (0.0, 1.0) } else { fold(|p| p.x) };
    let (y_lo, y_hi) = if points.is_empty() { (0.0, 1.0) } else { fold(|p| p.y) };
    let xs = Scale::new(x_lo, x_hi, PAD_L + 10.0, W - PAD_R - 10.0);
    let ys = Scale::new(y_lo, y_hi, H - PAD_B - 10.0, PAD_T + 10.0);
    let body = html! {
        text x=(PAD_L) y=(H - PAD_B + 14.0) font-size="10" { (thousands(x_lo as i64)) }
        text x=(W - PAD_R) y=(H - PAD_B + 14.0) text-anchor="end" font-size="10" { (thousands(x_hi as i64)) }
        text x=(PAD_L - 6.0) y=(H - PAD_B) text-anchor="end" font-size="10" { (thousands(y_lo as i64)) }
        text x=(PAD_L - 6.0) y=(PAD_T + 10.0) text-anchor="end" font-size="10" { (thousands(y_hi as i64)) }
        @for p in points {
            circle cx=(xs.at(p.x)) cy=(ys.at(p.y)) r=(3.0 + 12.0 * p.size.clamp(0.0, 1.0).sqrt())
                fill=(p.color) fill-opacity="0.6" stroke="#333" stroke-width="0.5" {
                title { (p.label) }
            }
        }
    };
    chart_frame(title, x_label, y_label, body)
}

/// One box per group: whiskers at min/max, box from q1 to q3, median line.
pub fn box_chart(title: &str, x_label: &str, y_label: &str, groups: &[(i64, BoxStats)]) -> Markup {
    let y_lo = groups.iter().map(|(_, b)| b.min).fold(f64::MAX, f64::min);
    let y_hi = groups.iter().map(|(_, b)| b.max).fold(f64::MIN, f64::max);
    let (y_lo, y_hi) = if groups.is_empty() { (0.0, 1.0) } else { (y_lo, y_hi) };
    let ys = Scale::new(y_lo, y_hi, H - PAD_B - 10.0, PAD_T + 10.0);
    let slot = (W - PAD_L - PAD_R) / groups.len().max(1) as f64;
    let body = html! {
        text x=(PAD_L - 6.0) y=(H - PAD_B) text-anchor="end" font-size="10" { (thousands(y_lo as i64)) }
        text x=(PAD_L - 6.0) y=(PAD_T + 10.0) text-anchor="end" font-size="10" { (thousands(y_hi as i64)) }
        @for (i, (year, b)) in groups.iter().enumerate() {
            @let mid = PAD_L + slot * (i as f64 + 0.5);
            @let half = (slot * 0.3).min(30.0);
            g stroke=(color(i)) {
                title { (year) ": median " (money(b.median)) " (n=" (b.count) ")" }
                line x1=(mid) y1=(ys.at(b.min)) x2=(mid) y2=(ys.at(b.q1)) {}
                line x1=(mid) y1=(ys.at(b.q3)) x2=(mid) y2=(ys.at(b.max)) {}
                rect x=(mid - half) y=(ys.at(b.q3)) width=(half * 2.0)
                    height=((ys.at(b.q1) - ys.at(b.q3)).max(1.0)) fill=(color(i)) fill-opacity="0.3" {}
                line x1=(mid - half) y1=(ys.at(b.median)) x2=(mid + half) y2=(ys.at(b.median)) stroke-width="2" {}
                text x=(mid) y=(H - PAD_B + 14.0) text-anchor="middle" font-size="10" stroke="none" { (year) }
            }
        }
    };
    chart_frame(title, x_label, y_label, body)
}

/// Every row of the table, formatted the way the CSV shows it.
pub fn listing_table(batch: &RecordBatch) -> Result<Markup> {
    let years = int_column(batch, "year")?;
    let names = str_column(batch, "name")?;
    let kms = int_column(batch, "kilometers")?;
    let prices = int_column(batch, "price")?;
    let brands = str_column(batch, "brand")?;
    Ok(html! {
        div class="scroll" {
            table {
                thead { tr { th { "year" } th { "name" } th { "kilometers" } th { "price" } th { "brand" } } }
                tbody {
                    @for i in 0..batch.num_rows() {
                        tr {
                            td { (years.value(i)) }
                            td { (names.value(i)) }
                            td { (thousands(kms.value(i))) " km" }
                            td { "$" (thousands(prices.value(i))) }
                            td { (brands.value(i)) }
                        }
                    }
                }
            }
        }
    })
}

/// Checkbox list showing which options a filter keeps. Empty `selected`
/// means every option is on.
fn filter_widget<T: ToString>(label: &str, options: &[T], selected: &[T]) -> Markup
where
    T: PartialEq,
{
    html! {
        p { strong { "Filter by " (label) } }
        ul class="filter" {
            @for opt in options {
                li {
                    label {
                        input type="checkbox" disabled checked[selected.is_empty() || selected.contains(opt)];
                        " " (opt.to_string())
                    }
                }
            }
        }
    }
}

fn filtered_section(label: &str, filtered: &RecordBatch) -> Result<Markup> {
    Ok(html! {
        p { strong { "Cars in Selected " (label) " (" (filtered.num_rows()) " cars):" } }
        (listing_table(filtered)?)
    })
}

fn range_bars(bins: &RangeBins, batch: &RecordBatch, column: &str) -> Result<Vec<(String, usize)>> {
    Ok(bins
        .counts(int_column(batch, column)?)
        .into_iter()
        .map(|(l, n)| (l.to_string(), n))
        .collect())
}

fn range_labels(bins: &RangeBins) -> Vec<String> {
    bins.labels.iter().map(|l| l.to_string()).collect()
}

fn relative(v: i64, peak: i64) -> f64 {
    if peak <= 0 {
        0.0
    } else {
        v as f64 / peak as f64
    }
}

/// The full dashboard page over a cleaned listings table.
pub fn render_dashboard(
    batch: &RecordBatch,
    selection: &Selection,
    generated_at: DateTime<Utc>,
) -> Result<Markup> {
    let ov = overview(batch)?;
    let years_col = int_column(batch, "year")?;
    let names_col = str_column(batch, "name")?;
    let kms_col = int_column(batch, "kilometers")?;
    let prices_col = int_column(batch, "price")?;
    let brands_col = str_column(batch, "brand")?;

    // ─── per-section aggregates ──────────────────────────────────────
    let by_year = year_counts(batch)?;
    let all_years: Vec<i64> = by_year.iter().map(|(y, _)| *y).collect();
    let year_bars: Vec<(String, usize)> = by_year.iter().map(|(y, n)| (y.to_string(), *n)).collect();

    let price_hist: Vec<(String, usize)> = histogram(prices_col, 10)
        .into_iter()
        .map(|b| (format!("{}-{}", thousands(b.start as i64), thousands(b.end as i64)), b.count))
        .collect();
    let priciest = most_expensive(batch)?;
    let cheapest = least_expensive(batch)?;

    let by_brand = brand_counts(batch)?;
    let all_brands = brands(batch)?;

    let max_price = prices_col.iter().flatten().max().unwrap_or(0);
    let max_km = kms_col.iter().flatten().max().unwrap_or(0);
    let year_color = |y: i64| color(all_years.iter().position(|v| *v == y).unwrap_or(0));
    let brand_color = |b: &str| color(all_brands.iter().position(|v| v == b).unwrap_or(0));

    let km_price: Vec<Point> = (0..batch.num_rows())
        .map(|i| Point {
            x: kms_col.value(i) as f64,
            y: prices_col.value(i) as f64,
            size: relative(prices_col.value(i), max_price),
            color: year_color(years_col.value(i)),
            label: format!("{} ({})", names_col.value(i), years_col.value(i)),
        })
        .collect();
    let year_price: Vec<Point> = (0..batch.num_rows())
        .map(|i| Point {
            x: years_col.value(i) as f64,
            y: prices_col.value(i) as f64,
            size: relative(kms_col.value(i), max_km),
            color: brand_color(brands_col.value(i)),
            label: format!("{}, {} km", names_col.value(i), thousands(kms_col.value(i))),
        })
        .collect();

    // ─── filtered views, each independent of the others ──────────────
    let by_selected_year = filter_years(batch, &selection.years)?;
    let by_selected_price = filter_ranges(batch, "price", &PRICE_RANGES, &selection.price_ranges)?;
    let by_selected_km = filter_ranges(batch, "kilometers", &KM_RANGES, &selection.km_ranges)?;
    let by_selected_brand = filter_brands(batch, &selection.brands)?;

    let body = html! {
        h1 { "Car Data Explorer" }
        p { "Used car listings by year, price, kilometers driven, and brand." }

        section {
            h2 { "Overview" }
            div class="stats" {
                div class="stat" { "Total Cars" strong { (ov.total) } }
                div class="stat" { "Average Price" strong { (ov.avg_price.map(money).unwrap_or_else(|| "-".into())) } }
                div class="stat" { "Average Kilometers"
                    strong { (ov.avg_km.map(|k| format!("{} km", thousands(k.round() as i64))).unwrap_or_else(|| "-".into())) } }
                div class="stat" { "Oldest Car" strong { (ov.oldest.map(|y| y.to_string()).unwrap_or_else(|| "-".into())) } }
                div class="stat" { "Newest Car" strong { (ov.newest.map(|y| y.to_string()).unwrap_or_else(|| "-".into())) } }
            }
            h3 { "Raw Data" }
            (listing_table(batch)?)
        }

        section {
            h2 { "Cars by Year" }
            (bar_chart("Number of Cars by Year", "Year", "Number of Cars", &year_bars))
            (filter_widget("Year", &all_years, &selection.years))
            (filtered_section("Years", &by_selected_year)?)
        }

        section {
            h2 { "Price Analysis" }
            (bar_chart("Distribution of Car Prices", "Price ($)", "Count", &price_hist))
            @if let Some(c) = &priciest {
                p { strong { "Most Expensive Car:" } " " (c.name) " (" (c.year) ") - $" (thousands(c.price)) }
            }
            @if let Some(c) = &cheapest {
                p { strong { "Least Expensive Car:" } " " (c.name) " (" (c.year) ") - $" (thousands(c.price)) }
            }
            (bar_chart("Cars by Price Range", "Price Range", "Number of Cars", &range_bars(&PRICE_RANGES, batch, "price")?))
            (filter_widget("Price Range", &range_labels(&PRICE_RANGES), &selection.price_ranges))
            (filtered_section("Price Range", &by_selected_price)?)
        }

        section {
            h2 { "Kilometers Analysis" }
            (scatter_chart("Kilometers vs Price (Color by Year, Size by Price)", "Kilometers Driven", "Price ($)", &km_price))
            (bar_chart("Cars by Kilometer Range", "Kilometer Range", "Number of Cars", &range_bars(&KM_RANGES, batch, "kilometers")?))
            (filter_widget("Kilometer Range", &range_labels(&KM_RANGES), &selection.km_ranges))
            (filtered_section("Kilometer Range", &by_selected_km)?)
        }

        section {
            h2 { "Brand Analysis" }
            (pie_chart("Distribution of Cars by Brand", &by_brand))
            (filter_widget("Brand", &all_brands, &selection.brands))
            (filtered_section("Brand", &by_selected_brand)?)
        }

        section {
            h2 { "More Views" }
            (scatter_chart("Year vs Price (Size by Kilometers, Color by Brand)", "Year", "Price ($)", &year_price))
            (box_chart("Price Distribution by Year", "Year", "Price ($)", &price_by_year(batch)?))
        }

        footer { "Generated " (generated_at.format("%Y-%m-%d %H:%M UTC").to_string()) }
    };

    Ok(html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { "Car Data Explorer" }
                style { (PreEscaped(STYLE)) }
            }
            body { (body) }
        }
    })
}
