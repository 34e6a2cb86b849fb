use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::error::BunkerError;
use crate::query::Selection;
use crate::schema::{metric, ops, port, price};
use crate::store::DatasetStore;

/// Minimum per-port sample size for a distribution to be shown.
pub const MIN_SAMPLE_SIZE: usize = 30;

/// Per-port quantile above which metric values are treated as outliers.
pub const OUTLIER_QUANTILE: f64 = 0.95;

/// Waiting times above this many hours are reported as the cap itself.
pub const WAITING_CAP_HOURS: f64 = 13.0;

/// Number of ports in the ranking view.
pub const RANKING_TOP_N: usize = 5;

/// Default width, in years, of a barge-age histogram bin.
pub const DEFAULT_AGE_BIN_SIZE: u32 = 2;

// ── Metrics ─────────────────────────────────────────────────────────────────

/// Which duration the distribution view describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Service,
    Waiting,
}

impl Metric {
    pub fn column(self) -> &'static str {
        match self {
            Metric::Service => ops::SERVICE_TIME,
            Metric::Waiting => ops::WAITING_TIME,
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = BunkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            metric::SERVICE => Ok(Metric::Service),
            metric::WAITING => Ok(Metric::Waiting),
            other => Err(BunkerError::InvalidData(format!(
                "Invalid metric: '{other}'. Must be '{}' or '{}'",
                metric::SERVICE,
                metric::WAITING
            ))),
        }
    }
}

// ── Result types ────────────────────────────────────────────────────────────

/// Trimmed metric values for one port, ready for density-plot rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PortDistribution {
    pub port: String,
    pub values: Vec<f64>,
}

/// Outcome of the distribution aggregator. `InsufficientSample` is a
/// user-facing notice, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DistributionResult {
    InsufficientSample { excluded: Vec<String> },
    Distributions {
        included: Vec<PortDistribution>,
        excluded: Vec<String>,
    },
}

impl DistributionResult {
    pub fn is_insufficient(&self) -> bool {
        matches!(self, DistributionResult::InsufficientSample { .. })
    }

    /// Ports dropped for having too few observations in the subset.
    pub fn excluded(&self) -> &[String] {
        match self {
            DistributionResult::InsufficientSample { excluded } => excluded,
            DistributionResult::Distributions { excluded, .. } => excluded,
        }
    }
}

/// One row of the top-ports ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingEntry {
    pub rank: u32,
    pub port: String,
    pub operations: u64,
    pub percentage: f64,
}

/// One fixed-width bin of the barge-age histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeBin {
    pub start: i32,
    pub count: u64,
}

/// One point of the price trend.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// One port on the map, with a highlight flag for the current selection.
#[derive(Debug, Clone, PartialEq)]
pub struct PortMarker {
    pub code: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub selected: bool,
}

// ── Distribution ────────────────────────────────────────────────────────────

/// Per-port distributions of the chosen metric over `subset`.
///
/// Ports with fewer than [`MIN_SAMPLE_SIZE`] rows are listed as excluded.
/// Values strictly above the port-local 95th percentile are dropped; waiting
/// times are additionally capped at [`WAITING_CAP_HOURS`] after trimming.
/// Included ports keep the order they first appear in the subset.
pub fn distribution(
    subset: &DataFrame,
    metric: Metric,
) -> Result<DistributionResult, BunkerError> {
    let (order, counts) = port_counts(subset)?;

    let mut qualified = Vec::new();
    let mut excluded = Vec::new();
    for name in order {
        if counts[&name] >= MIN_SAMPLE_SIZE {
            qualified.push(name);
        } else {
            excluded.push(name);
        }
    }

    if qualified.is_empty() {
        return Ok(DistributionResult::InsufficientSample { excluded });
    }

    let metric_col = metric.column();
    let mut included = Vec::with_capacity(qualified.len());
    for name in qualified {
        let per_port = subset
            .clone()
            .lazy()
            .filter(col(ops::BUNKERING_PORT).eq(lit(name.as_str())))
            .filter(col(metric_col).is_not_null())
            .select([col(metric_col)])
            .collect()?;

        let series = per_port.column(metric_col)?.as_materialized_series();
        let threshold = series
            .quantile_reduce(OUTLIER_QUANTILE, QuantileMethod::Linear)?
            .value()
            .try_extract::<f64>()
            .unwrap_or(f64::NAN);

        let mut values: Vec<f64> = series
            .f64()?
            .into_no_null_iter()
            .filter(|v| *v <= threshold)
            .collect();

        if metric == Metric::Waiting {
            for v in &mut values {
                if *v > WAITING_CAP_HOURS {
                    *v = WAITING_CAP_HOURS;
                }
            }
        }

        included.push(PortDistribution { port: name, values });
    }

    Ok(DistributionResult::Distributions { included, excluded })
}

// ── Ranking ─────────────────────────────────────────────────────────────────

/// Top ports of the subset by operation count, with percentage share of the
/// whole subset. Empty subset yields an empty ranking.
pub fn ranking(subset: &DataFrame) -> Result<Vec<RankingEntry>, BunkerError> {
    let total = subset.height();
    if total == 0 {
        return Ok(Vec::new());
    }

    let (order, counts) = port_counts(subset)?;
    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|name| {
            let count = counts[&name];
            (name, count)
        })
        .collect();
    // stable sort: ties keep first-encounter order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(RANKING_TOP_N);

    Ok(ranked
        .into_iter()
        .enumerate()
        .map(|(i, (port, operations))| RankingEntry {
            rank: (i + 1) as u32,
            port,
            operations: operations as u64,
            percentage: 100.0 * operations as f64 / total as f64,
        })
        .collect())
}

// ── Barge age ───────────────────────────────────────────────────────────────

/// Histogram of barge age at operation over the subset.
///
/// Ages at or below zero are invalid (unknown build year) and excluded.
/// Bins are contiguous from the minimum valid age; interior bins may be
/// empty. An empty subset yields an empty histogram.
pub fn barge_age_histogram(
    subset: &DataFrame,
    bin_size: u32,
) -> Result<Vec<AgeBin>, BunkerError> {
    if bin_size == 0 {
        return Err(BunkerError::InvalidData(
            "bin_size must be positive".to_string(),
        ));
    }

    let ages_series = subset
        .column(ops::BARGE_AGE_AT_OP)?
        .as_materialized_series();
    let ages = ages_series.i32()?;
    let valid: Vec<i32> = ages.into_iter().flatten().filter(|a| *a > 0).collect();
    if valid.is_empty() {
        return Ok(Vec::new());
    }

    let mut min = i32::MAX;
    let mut max = i32::MIN;
    for &age in &valid {
        min = min.min(age);
        max = max.max(age);
    }

    let size = bin_size as i32;
    let nbins = ((max - min) / size + 1) as usize;
    let mut counts = vec![0u64; nbins];
    for &age in &valid {
        counts[((age - min) / size) as usize] += 1;
    }

    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| AgeBin {
            start: min + i as i32 * size,
            count,
        })
        .collect())
}

// ── Price series ────────────────────────────────────────────────────────────

/// Slice of the price table over the inclusive date range, ascending.
pub fn price_series(
    store: &DatasetStore,
    date_from: NaiveDateTime,
    date_to: NaiveDateTime,
) -> Result<Vec<PricePoint>, BunkerError> {
    let from_us = date_from.and_utc().timestamp_micros();
    let to_us = date_to.and_utc().timestamp_micros();

    let sliced = store
        .prices()
        .clone()
        .lazy()
        .filter(
            col(price::DATE)
                .gt_eq(lit(from_us))
                .and(col(price::DATE).lt_eq(lit(to_us))),
        )
        .collect()?;

    let dates_series = sliced
        .column(price::DATE)?
        .as_materialized_series()
        .cast(&DataType::Int64)?;
    let dates = dates_series.i64()?;
    let prices_series = sliced.column(price::PRICE)?.as_materialized_series();
    let prices = prices_series.f64()?;

    let mut out = Vec::with_capacity(sliced.height());
    for i in 0..sliced.height() {
        let (Some(us), Some(value)) = (dates.get(i), prices.get(i)) else {
            continue;
        };
        let Some(ts) = chrono::DateTime::from_timestamp_micros(us) else {
            continue;
        };
        out.push(PricePoint {
            date: ts.date_naive(),
            price: value,
        });
    }
    Ok(out)
}

// ── Port markers ────────────────────────────────────────────────────────────

/// All retained ports with coordinates, flagging the ones in the current
/// selection so the presentation layer can highlight them.
pub fn port_markers(
    store: &DatasetStore,
    ports: &Selection,
) -> Result<Vec<PortMarker>, BunkerError> {
    let df = store.port_positions();
    let codes_series = df.column(port::PORT_CODE)?.as_materialized_series();
    let codes = codes_series.str()?;
    let names_series = df.column(port::DISPLAY_NAME)?.as_materialized_series();
    let names = names_series.str()?;
    let lat_series = df.column(port::LAT)?.as_materialized_series();
    let lats = lat_series.f64()?;
    let lon_series = df.column(port::LONG)?.as_materialized_series();
    let lons = lon_series.f64()?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(code), Some(name), Some(lat), Some(lon)) =
            (codes.get(i), names.get(i), lats.get(i), lons.get(i))
        else {
            continue;
        };
        let selected = ports
            .only()
            .is_some_and(|set| set.iter().any(|c| c == code));
        out.push(PortMarker {
            code: code.to_string(),
            name: name.to_string(),
            lat,
            lon,
            selected,
        });
    }
    Ok(out)
}

// ── Shared helpers ──────────────────────────────────────────────────────────

/// Rows per port, with ports listed in first-encounter order.
fn port_counts(
    subset: &DataFrame,
) -> Result<(Vec<String>, HashMap<String, usize>), BunkerError> {
    let port_series = subset
        .column(ops::BUNKERING_PORT)?
        .as_materialized_series();
    let ports = port_series.str()?;

    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for name in ports.into_iter().flatten() {
        match counts.get_mut(name) {
            Some(count) => *count += 1,
            None => {
                counts.insert(name.to_string(), 1);
                order.push(name.to_string());
            }
        }
    }
    Ok((order, counts))
}
