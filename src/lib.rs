//! Filtering and aggregation core for a Mediterranean bunkering-operations
//! dashboard.
//!
//! The [`DatasetStore`] loads and cleanses the operations, oil-price, and
//! port-position tables once at startup; [`filter_operations`] derives the
//! operation subset for a date range plus port/vessel-type selections; the
//! aggregators turn a subset into render-ready view data (per-port duration
//! distributions, port ranking, barge-age histogram, price trend, map
//! markers). [`on_filter_changed`] bundles one full recomputation cycle.
//!
//! The store is immutable after load and every aggregator is a pure function
//! of its inputs, so concurrent readers need no locking.

mod aggregation;
mod coordinator;
mod error;
mod query;
pub mod schema;
mod store;

#[cfg(feature = "python")]
mod python;

pub use aggregation::{
    barge_age_histogram, distribution, port_markers, price_series, ranking, AgeBin,
    DistributionResult, Metric, PortDistribution, PortMarker, PricePoint, RankingEntry,
    DEFAULT_AGE_BIN_SIZE, MIN_SAMPLE_SIZE, OUTLIER_QUANTILE, RANKING_TOP_N, WAITING_CAP_HOURS,
};
pub use coordinator::{on_filter_changed, ViewResults, MAX_PORT_SELECTION};
pub use error::BunkerError;
pub use query::{filter_operations, FilterQuery, Selection};
pub use store::{DatasetStore, OPERATIONS_FILE, PORT_POSITIONS_FILE, PRICES_FILE};
