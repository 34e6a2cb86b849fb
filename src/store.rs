use std::path::{Path, PathBuf};

use chrono::Datelike;
use polars::datatypes::TimeUnit;
use polars::prelude::StrptimeOptions;
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::BunkerError;
use crate::schema::{ops, port, price};

/// Default file names under the data directory.
pub const OPERATIONS_FILE: &str = "bunkering_ops_mediterranean.csv";
pub const PRICES_FILE: &str = "brent-daily.csv";
pub const PORT_POSITIONS_FILE: &str = "ports_positions.csv";

/// Ports with this many total observations or fewer are dropped at load.
const MIN_PORT_OBSERVATIONS: i64 = 30;

const OPS_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const PRICE_DATE_FORMAT: &str = "%Y-%m-%d";

const MICROS_PER_HOUR: f64 = 3_600_000_000.0;

/// In-memory, read-only holder of the three base tables plus derived views.
///
/// Built once at process start; aggregators and the filter engine borrow it
/// and never mutate it.
#[derive(Debug)]
pub struct DatasetStore {
    operations: DataFrame,
    prices: DataFrame,
    port_positions: DataFrame,
    barges: DataFrame,
    reference_year: i32,
}

impl DatasetStore {
    // ── Loading ─────────────────────────────────────────────────────────────

    /// Load and cleanse all tables from CSV files under `base_path`.
    ///
    /// Missing required columns or unparsable timestamps are configuration
    /// errors and fail the whole load.
    pub fn load(base_path: impl Into<PathBuf>) -> Result<Self, BunkerError> {
        let base: PathBuf = base_path.into();
        let ops_raw = Self::read_csv_as_strings(&base.join(OPERATIONS_FILE))?;
        let prices_raw = Self::read_csv_as_strings(&base.join(PRICES_FILE))?;
        let ports_raw = Self::read_csv_as_strings(&base.join(PORT_POSITIONS_FILE))?;

        let store = Self::from_frames(ops_raw, prices_raw, ports_raw)?;
        info!(
            operations = store.operations.height(),
            prices = store.prices.height(),
            ports = store.port_positions.height(),
            reference_year = store.reference_year,
            "dataset loaded"
        );
        Ok(store)
    }

    /// Cleanse already-read string-typed frames.
    ///
    /// Operations: timestamps parsed, port names title-cased, ports at or
    /// below the minimum observation count dropped, `waiting_time` (hours)
    /// and `barge_age_at_op` derived. The age reference year is the year of
    /// the first retained row's `start_of_service`, applied to every barge.
    pub fn from_frames(
        operations: DataFrame,
        prices: DataFrame,
        port_positions: DataFrame,
    ) -> Result<Self, BunkerError> {
        Self::require_columns(&operations, &ops::REQUIRED)?;
        Self::require_columns(&prices, &[price::DATE, price::PRICE])?;
        Self::require_columns(
            &port_positions,
            &[port::PORT_CODE, port::DISPLAY_NAME, port::LAT, port::LONG],
        )?;

        let operations = Self::cleanse_operations(operations)?;
        let reference_year = Self::reference_year_of(&operations)?;

        let operations = operations
            .lazy()
            .with_columns([
                ((col(ops::START_OF_SERVICE) - col(ops::VESSEL_INSIDE_PORT))
                    .cast(DataType::Int64)
                    / lit(MICROS_PER_HOUR))
                .alias(ops::WAITING_TIME),
                (lit(reference_year) - col(ops::BARGE_BUILT)).alias(ops::BARGE_AGE_AT_OP),
            ])
            .collect()?;

        // Latest state per barge, by start of service
        let barges = operations
            .sort([ops::START_OF_SERVICE], SortMultipleOptions::default())?
            .unique_stable(
                Some(&[ops::BARGE_IMO.to_string()]),
                UniqueKeepStrategy::Last,
                None,
            )?;

        let prices = Self::parse_datetime_column(prices, price::DATE, PRICE_DATE_FORMAT)?
            .lazy()
            .with_columns([col(price::PRICE).cast(DataType::Float64)])
            .sort([price::DATE], Default::default())
            .collect()?;

        // Keep only positions for ports present in the operations table
        let known_codes = operations
            .column(ops::CODE)?
            .as_materialized_series()
            .clone();
        let port_positions = port_positions
            .lazy()
            .with_columns([
                col(port::LAT).cast(DataType::Float64),
                col(port::LONG).cast(DataType::Float64),
            ])
            .filter(col(port::PORT_CODE).is_in(lit(known_codes), false))
            .collect()?;

        debug!(
            operations = operations.height(),
            barges = barges.height(),
            "frames cleansed"
        );

        Ok(Self {
            operations,
            prices,
            port_positions,
            barges,
            reference_year,
        })
    }

    // ── Read-only views ─────────────────────────────────────────────────────

    pub fn operations(&self) -> &DataFrame {
        &self.operations
    }

    pub fn prices(&self) -> &DataFrame {
        &self.prices
    }

    pub fn port_positions(&self) -> &DataFrame {
        &self.port_positions
    }

    /// Most recent operation row per `barge_imo`.
    pub fn barges(&self) -> &DataFrame {
        &self.barges
    }

    /// Year used as the fixed reference for `barge_age_at_op`.
    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    // ── Private helpers ─────────────────────────────────────────────────────

    /// Parse timestamps, normalize port names, and restrict the port universe
    /// to ports with more than the minimum number of observations.
    fn cleanse_operations(raw: DataFrame) -> Result<DataFrame, BunkerError> {
        let parsed =
            Self::parse_datetime_column(raw, ops::START_OF_SERVICE, OPS_DATETIME_FORMAT)?;
        let mut parsed =
            Self::parse_datetime_column(parsed, ops::VESSEL_INSIDE_PORT, OPS_DATETIME_FORMAT)?;

        // Title-case the display name before counting, so the restriction
        // operates on the normalized spelling.
        let titled: Vec<Option<String>> = parsed
            .column(ops::BUNKERING_PORT)?
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|v| v.map(title_case))
            .collect();
        parsed.replace(
            ops::BUNKERING_PORT,
            Series::new(ops::BUNKERING_PORT.into(), titled),
        )?;

        let typed = parsed
            .lazy()
            .with_columns([
                col(ops::SERVICE_TIME).cast(DataType::Float64),
                col(ops::BARGE_BUILT).cast(DataType::Int32),
            ])
            .collect()?;

        let retained = typed
            .clone()
            .lazy()
            .group_by([col(ops::BUNKERING_PORT)])
            .agg([len().alias("count")])
            .filter(col("count").gt(lit(MIN_PORT_OBSERVATIONS)))
            .select([col(ops::BUNKERING_PORT)])
            .collect()?;
        let retained_ports = retained
            .column(ops::BUNKERING_PORT)?
            .as_materialized_series()
            .clone();

        let restricted = typed
            .lazy()
            .filter(col(ops::BUNKERING_PORT).is_in(lit(retained_ports), false))
            .collect()?;

        Ok(restricted)
    }

    /// Year of the first retained row's `start_of_service`.
    fn reference_year_of(operations: &DataFrame) -> Result<i32, BunkerError> {
        let micros_series = operations
            .column(ops::START_OF_SERVICE)?
            .as_materialized_series()
            .cast(&DataType::Int64)?;
        let micros_ca = micros_series.i64()?;
        let micros = if micros_ca.is_empty() {
            None
        } else {
            micros_ca.get(0)
        }
        .ok_or_else(|| {
                BunkerError::InvalidData(
                    "operations table is empty after cleansing; no port meets the \
                     minimum observation count"
                        .to_string(),
                )
            })?;
        let first = chrono::DateTime::from_timestamp_micros(micros).ok_or_else(|| {
            BunkerError::InvalidData(format!("start_of_service out of range: {micros}"))
        })?;
        Ok(first.year())
    }

    /// Read a CSV file with all columns as String dtype.
    /// Trims whitespace from column names.
    fn read_csv_as_strings(path: &Path) -> Result<DataFrame, BunkerError> {
        let mut df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0)) // all columns as String
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let trimmed: Vec<String> = df
            .get_column_names_str()
            .iter()
            .map(|c| c.trim().to_string())
            .collect();
        df.set_column_names(trimmed.as_slice())?;

        Ok(df)
    }

    fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), BunkerError> {
        for &col_name in required {
            if df.column(col_name).is_err() {
                return Err(BunkerError::MissingColumn(col_name.to_string()));
            }
        }
        Ok(())
    }

    /// Parse a string column to Datetime using the given format string.
    fn parse_datetime_column(
        df: DataFrame,
        column: &str,
        format: &str,
    ) -> Result<DataFrame, BunkerError> {
        let df = df
            .lazy()
            .with_columns([col(column)
                .str()
                .strip_chars(lit(" \t\r\n"))
                .str()
                .to_datetime(
                    Some(TimeUnit::Microseconds),
                    None,
                    StrptimeOptions {
                        format: Some(format.into()),
                        strict: true,
                        ..Default::default()
                    },
                    lit("raise"),
                )])
            .collect()?;
        Ok(df)
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Test fixtures ───────────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::Duration;

    #[test]
    fn load_fails_on_missing_required_column() {
        let mut b = OpsBuilder::new();
        b.port_block("ALGECIRAS", "ESALG", 31, 0);
        let bad = b.frame().drop(ops::SERVICE_TIME).unwrap();
        let err = DatasetStore::from_frames(bad, empty_prices(), empty_ports()).unwrap_err();
        assert!(matches!(err, BunkerError::MissingColumn(c) if c == ops::SERVICE_TIME));
    }

    #[test]
    fn port_names_are_title_cased() {
        let store = sample_store();
        let ports = store
            .operations()
            .column(ops::BUNKERING_PORT)
            .unwrap()
            .as_materialized_series()
            .clone();
        let names: Vec<&str> = ports.str().unwrap().into_iter().flatten().collect();
        assert!(names.contains(&"Algeciras"));
        assert!(names.contains(&"Gibraltar"));
        assert!(!names.iter().any(|n| *n == "ALGECIRAS"));
    }

    #[test]
    fn retention_drops_ports_at_threshold_keeps_above() {
        let mut b = OpsBuilder::new();
        b.port_block("ALGECIRAS", "ESALG", 30, 0); // exactly 30: dropped
        b.port_block("GIBRALTAR", "GIGIB", 31, 24); // 31: kept
        let store =
            DatasetStore::from_frames(b.frame(), empty_prices(), empty_ports()).unwrap();
        let names = store
            .operations()
            .column(ops::BUNKERING_PORT)
            .unwrap()
            .as_materialized_series()
            .clone();
        let names: Vec<String> = names
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .map(String::from)
            .collect();
        assert!(names.iter().all(|n| n == "Gibraltar"));
        assert_eq!(store.operations().height(), 31);
    }

    #[test]
    fn load_fails_when_no_port_meets_threshold() {
        let mut b = OpsBuilder::new();
        b.port_block("ALGECIRAS", "ESALG", 10, 0);
        let err =
            DatasetStore::from_frames(b.frame(), empty_prices(), empty_ports()).unwrap_err();
        assert!(matches!(err, BunkerError::InvalidData(_)));
    }

    #[test]
    fn waiting_time_is_hours_between_arrival_and_service() {
        let mut b = OpsBuilder::new();
        b.port_block("ALGECIRAS", "ESALG", 31, 0);
        let start = base_time() + Duration::hours(5000);
        b.row(
            "ALGECIRAS",
            "ESALG",
            start,
            start - Duration::minutes(90),
            2.0,
            "9000001",
            2010,
            None,
        );
        let store =
            DatasetStore::from_frames(b.frame(), empty_prices(), empty_ports()).unwrap();
        let waiting = store
            .operations()
            .column(ops::WAITING_TIME)
            .unwrap()
            .as_materialized_series()
            .clone();
        let last = waiting.f64().unwrap().get(31).unwrap();
        assert!((last - 1.5).abs() < 1e-9);
    }

    #[test]
    fn negative_waiting_time_is_preserved() {
        let mut b = OpsBuilder::new();
        b.port_block("ALGECIRAS", "ESALG", 31, 0);
        let start = base_time() + Duration::hours(5000);
        // service started before the vessel was registered inside the port
        b.row(
            "ALGECIRAS",
            "ESALG",
            start,
            start + Duration::hours(2),
            2.0,
            "9000002",
            2010,
            None,
        );
        let store =
            DatasetStore::from_frames(b.frame(), empty_prices(), empty_ports()).unwrap();
        let waiting = store
            .operations()
            .column(ops::WAITING_TIME)
            .unwrap()
            .as_materialized_series()
            .clone();
        let last = waiting.f64().unwrap().get(31).unwrap();
        assert!((last + 2.0).abs() < 1e-9);
    }

    #[test]
    fn barge_age_uses_first_row_year_for_every_row() {
        let mut b = OpsBuilder::new();
        // First retained row is in 2015; a row three years later still has
        // its age computed against 2015.
        b.port_block("ALGECIRAS", "ESALG", 31, 0);
        let late = base_time() + Duration::days(3 * 365);
        b.row("ALGECIRAS", "ESALG", late, late, 2.0, "9000003", 2010, None);
        let store =
            DatasetStore::from_frames(b.frame(), empty_prices(), empty_ports()).unwrap();
        assert_eq!(store.reference_year(), 2015);
        let ages = store
            .operations()
            .column(ops::BARGE_AGE_AT_OP)
            .unwrap()
            .as_materialized_series()
            .clone();
        let last = ages.i32().unwrap().get(31).unwrap();
        assert_eq!(last, 2015 - 2010);
    }

    #[test]
    fn barges_view_keeps_latest_row_per_imo() {
        let mut b = OpsBuilder::new();
        b.port_block("ALGECIRAS", "ESALG", 31, 0);
        let store =
            DatasetStore::from_frames(b.frame(), empty_prices(), empty_ports()).unwrap();
        // port_block rotates 4 imo values
        assert_eq!(store.barges().height(), 4);
        let heights = store.barges().height();
        let imos = store
            .barges()
            .column(ops::BARGE_IMO)
            .unwrap()
            .as_materialized_series()
            .clone();
        let unique: std::collections::HashSet<String> = imos
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .map(String::from)
            .collect();
        assert_eq!(unique.len(), heights);
    }

    #[test]
    fn port_positions_restricted_to_known_ports() {
        let store = sample_store();
        let codes = store
            .port_positions()
            .column(port::PORT_CODE)
            .unwrap()
            .as_materialized_series()
            .clone();
        let codes: Vec<String> = codes
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .map(String::from)
            .collect();
        assert_eq!(codes.len(), 6);
        assert!(!codes.contains(&"FRMRS".to_string())); // no operations there
    }

    #[test]
    fn prices_are_sorted_ascending() {
        let prices = prices_frame(&[("2016-02-01", "32.2"), ("2014-01-02", "107.9")]);
        let mut b = OpsBuilder::new();
        b.port_block("ALGECIRAS", "ESALG", 31, 0);
        let store = DatasetStore::from_frames(b.frame(), prices, empty_ports()).unwrap();
        let dates = store
            .prices()
            .column(price::DATE)
            .unwrap()
            .as_materialized_series()
            .cast(&DataType::Int64)
            .unwrap();
        let dates: Vec<i64> = dates.i64().unwrap().into_iter().flatten().collect();
        assert!(dates.windows(2).all(|w| w[0] <= w[1]));
    }
}
