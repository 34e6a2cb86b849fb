//! PyO3 surface for the Python presentation layer.
//!
//! Wraps the pure-Rust core in a `BunkerModel` class plus lightweight result
//! classes with getters, so the dashboard can call one method per view and
//! hand the returned bundles straight to its chart layer.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::aggregation::{
    self, AgeBin, DistributionResult, Metric, PortDistribution, PortMarker, PricePoint,
    RankingEntry, DEFAULT_AGE_BIN_SIZE,
};
use crate::coordinator::{self, ViewResults, MAX_PORT_SELECTION};
use crate::error::BunkerError;
use crate::query::{filter_operations, FilterQuery, Selection};
use crate::schema;
use crate::store::DatasetStore;

// ── Result classes ──────────────────────────────────────────────────────────

#[pyclass(name = "PortDistribution", module = "bunker_analytics")]
#[derive(Debug, Clone)]
pub struct PyPortDistribution {
    #[pyo3(get)]
    pub port: String,
    #[pyo3(get)]
    pub values: Vec<f64>,
}

#[pymethods]
impl PyPortDistribution {
    fn __repr__(&self) -> String {
        format!(
            "PortDistribution(port='{}', values={})",
            self.port,
            self.values.len()
        )
    }
}

impl From<PortDistribution> for PyPortDistribution {
    fn from(d: PortDistribution) -> Self {
        Self {
            port: d.port,
            values: d.values,
        }
    }
}

/// Distribution view result: either per-port value sequences or an
/// insufficient-sample notice, plus the ports dropped for small samples.
#[pyclass(name = "DistributionResult", module = "bunker_analytics")]
#[derive(Debug, Clone)]
pub struct PyDistributionResult {
    #[pyo3(get)]
    pub insufficient_sample: bool,
    #[pyo3(get)]
    pub ports: Vec<PyPortDistribution>,
    #[pyo3(get)]
    pub excluded: Vec<String>,
}

#[pymethods]
impl PyDistributionResult {
    fn __repr__(&self) -> String {
        format!(
            "DistributionResult(insufficient_sample={}, ports={}, excluded={})",
            self.insufficient_sample,
            self.ports.len(),
            self.excluded.len()
        )
    }
}

impl From<DistributionResult> for PyDistributionResult {
    fn from(r: DistributionResult) -> Self {
        match r {
            DistributionResult::InsufficientSample { excluded } => Self {
                insufficient_sample: true,
                ports: Vec::new(),
                excluded,
            },
            DistributionResult::Distributions { included, excluded } => Self {
                insufficient_sample: false,
                ports: included.into_iter().map(Into::into).collect(),
                excluded,
            },
        }
    }
}

#[pyclass(name = "RankingEntry", module = "bunker_analytics")]
#[derive(Debug, Clone)]
pub struct PyRankingEntry {
    #[pyo3(get)]
    pub rank: u32,
    #[pyo3(get)]
    pub port: String,
    #[pyo3(get)]
    pub operations: u64,
    #[pyo3(get)]
    pub percentage: f64,
}

#[pymethods]
impl PyRankingEntry {
    fn __repr__(&self) -> String {
        format!(
            "RankingEntry(rank={}, port='{}', operations={}, percentage={:.2})",
            self.rank, self.port, self.operations, self.percentage
        )
    }
}

impl From<RankingEntry> for PyRankingEntry {
    fn from(e: RankingEntry) -> Self {
        Self {
            rank: e.rank,
            port: e.port,
            operations: e.operations,
            percentage: e.percentage,
        }
    }
}

#[pyclass(name = "AgeBin", module = "bunker_analytics")]
#[derive(Debug, Clone)]
pub struct PyAgeBin {
    #[pyo3(get)]
    pub start: i32,
    #[pyo3(get)]
    pub count: u64,
}

#[pymethods]
impl PyAgeBin {
    fn __repr__(&self) -> String {
        format!("AgeBin(start={}, count={})", self.start, self.count)
    }
}

impl From<AgeBin> for PyAgeBin {
    fn from(b: AgeBin) -> Self {
        Self {
            start: b.start,
            count: b.count,
        }
    }
}

#[pyclass(name = "PricePoint", module = "bunker_analytics")]
#[derive(Debug, Clone)]
pub struct PyPricePoint {
    #[pyo3(get)]
    pub date: NaiveDate,
    #[pyo3(get)]
    pub price: f64,
}

#[pymethods]
impl PyPricePoint {
    fn __repr__(&self) -> String {
        format!("PricePoint(date={}, price={:.2})", self.date, self.price)
    }
}

impl From<PricePoint> for PyPricePoint {
    fn from(p: PricePoint) -> Self {
        Self {
            date: p.date,
            price: p.price,
        }
    }
}

#[pyclass(name = "PortMarker", module = "bunker_analytics")]
#[derive(Debug, Clone)]
pub struct PyPortMarker {
    #[pyo3(get)]
    pub code: String,
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub lat: f64,
    #[pyo3(get)]
    pub lon: f64,
    #[pyo3(get)]
    pub selected: bool,
}

#[pymethods]
impl PyPortMarker {
    fn __repr__(&self) -> String {
        format!(
            "PortMarker(code='{}', name='{}', lat={:.2}, lon={:.2}, selected={})",
            self.code, self.name, self.lat, self.lon, self.selected
        )
    }
}

impl From<PortMarker> for PyPortMarker {
    fn from(m: PortMarker) -> Self {
        Self {
            code: m.code,
            name: m.name,
            lat: m.lat,
            lon: m.lon,
            selected: m.selected,
        }
    }
}

/// Everything one filter change produces, bundled.
#[pyclass(name = "ViewResults", module = "bunker_analytics")]
#[derive(Debug, Clone)]
pub struct PyViewResults {
    #[pyo3(get)]
    pub service: PyDistributionResult,
    #[pyo3(get)]
    pub waiting: PyDistributionResult,
    #[pyo3(get)]
    pub ranking: Vec<PyRankingEntry>,
    #[pyo3(get)]
    pub barge_age: Vec<PyAgeBin>,
    #[pyo3(get)]
    pub prices: Vec<PyPricePoint>,
    #[pyo3(get)]
    pub ports: Vec<PyPortMarker>,
}

#[pymethods]
impl PyViewResults {
    fn __repr__(&self) -> String {
        format!(
            "ViewResults(ranking={}, barge_age_bins={}, prices={}, ports={})",
            self.ranking.len(),
            self.barge_age.len(),
            self.prices.len(),
            self.ports.len()
        )
    }
}

impl From<ViewResults> for PyViewResults {
    fn from(r: ViewResults) -> Self {
        Self {
            service: r.service.into(),
            waiting: r.waiting.into(),
            ranking: r.ranking.into_iter().map(Into::into).collect(),
            barge_age: r.barge_age.into_iter().map(Into::into).collect(),
            prices: r.prices.into_iter().map(Into::into).collect(),
            ports: r.ports.into_iter().map(Into::into).collect(),
        }
    }
}

// ── Model ───────────────────────────────────────────────────────────────────

#[pyclass]
pub struct BunkerModel {
    base_path: PathBuf,
    store: Option<DatasetStore>,
}

#[pymethods]
impl BunkerModel {
    #[new]
    fn new(base_path: String) -> Self {
        Self {
            base_path: PathBuf::from(base_path),
            store: None,
        }
    }

    /// Load and cleanse the operations, price, and port-position CSVs.
    /// Must be called once before any query method.
    fn load(&mut self) -> PyResult<()> {
        self.store = Some(DatasetStore::load(self.base_path.clone())?);
        Ok(())
    }

    // ── Properties ──────────────────────────────────────────────────────

    #[getter]
    fn operations_df(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.store()?.operations().clone()))
    }

    #[getter]
    fn prices_df(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.store()?.prices().clone()))
    }

    #[getter]
    fn port_positions_df(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.store()?.port_positions().clone()))
    }

    #[getter]
    fn barges_df(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.store()?.barges().clone()))
    }

    #[getter]
    fn reference_year(&self) -> PyResult<i32> {
        Ok(self.store()?.reference_year())
    }

    // ── Filtering ───────────────────────────────────────────────────────

    /// Operation subset for an inclusive date range and optional port /
    /// vessel-type subsets. Empty or missing lists mean no restriction.
    #[pyo3(signature = (date_from, date_to, ports=None, vessel_types=None))]
    fn filter(
        &self,
        date_from: NaiveDateTime,
        date_to: NaiveDateTime,
        ports: Option<Vec<String>>,
        vessel_types: Option<Vec<String>>,
    ) -> PyResult<PyDataFrame> {
        let query = build_query(date_from, date_to, ports, vessel_types);
        let subset = filter_operations(self.store()?, &query)?;
        Ok(PyDataFrame(subset))
    }

    // ── Views ───────────────────────────────────────────────────────────

    /// Per-port distribution of `"service"` or `"waiting"` hours.
    #[pyo3(signature = (graph, date_from, date_to, ports=None, vessel_types=None))]
    fn distribution(
        &self,
        graph: &str,
        date_from: NaiveDateTime,
        date_to: NaiveDateTime,
        ports: Option<Vec<String>>,
        vessel_types: Option<Vec<String>>,
    ) -> PyResult<PyDistributionResult> {
        let metric = Metric::from_str(graph)?;
        let query = build_query(date_from, date_to, ports, vessel_types);
        let subset = filter_operations(self.store()?, &query)?;
        Ok(aggregation::distribution(&subset, metric)?.into())
    }

    /// Top ports by operation count, with percentage share.
    #[pyo3(signature = (date_from, date_to, ports=None, vessel_types=None))]
    fn ranking(
        &self,
        date_from: NaiveDateTime,
        date_to: NaiveDateTime,
        ports: Option<Vec<String>>,
        vessel_types: Option<Vec<String>>,
    ) -> PyResult<Vec<PyRankingEntry>> {
        let query = build_query(date_from, date_to, ports, vessel_types);
        let subset = filter_operations(self.store()?, &query)?;
        Ok(aggregation::ranking(&subset)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Histogram of barge age at operation.
    #[pyo3(signature = (date_from, date_to, ports=None, vessel_types=None, bin_size=DEFAULT_AGE_BIN_SIZE))]
    fn barge_age_histogram(
        &self,
        date_from: NaiveDateTime,
        date_to: NaiveDateTime,
        ports: Option<Vec<String>>,
        vessel_types: Option<Vec<String>>,
        bin_size: u32,
    ) -> PyResult<Vec<PyAgeBin>> {
        let query = build_query(date_from, date_to, ports, vessel_types);
        let subset = filter_operations(self.store()?, &query)?;
        Ok(aggregation::barge_age_histogram(&subset, bin_size)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Price points in the inclusive date range, ascending.
    fn price_series(
        &self,
        date_from: NaiveDateTime,
        date_to: NaiveDateTime,
    ) -> PyResult<Vec<PyPricePoint>> {
        Ok(aggregation::price_series(self.store()?, date_from, date_to)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Map markers for every retained port; the current selection is
    /// flagged so the frontend can highlight it.
    #[pyo3(signature = (ports=None))]
    fn port_markers(&self, ports: Option<Vec<String>>) -> PyResult<Vec<PyPortMarker>> {
        let selection = selection_from(ports);
        Ok(aggregation::port_markers(self.store()?, &selection)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Recompute every view for a changed filter state.
    ///
    /// Raises ValueError when `date_from` is after `date_to`; a selection of
    /// more than five ports falls back to all ports.
    #[pyo3(signature = (date_from, date_to, ports=None, vessel_types=None))]
    fn on_filter_changed(
        &self,
        date_from: NaiveDateTime,
        date_to: NaiveDateTime,
        ports: Option<Vec<String>>,
        vessel_types: Option<Vec<String>>,
    ) -> PyResult<PyViewResults> {
        let state = build_query(date_from, date_to, ports, vessel_types);
        Ok(coordinator::on_filter_changed(self.store()?, &state)?.into())
    }
}

impl BunkerModel {
    fn store(&self) -> Result<&DatasetStore, BunkerError> {
        self.store
            .as_ref()
            .ok_or_else(|| BunkerError::NotLoaded("datasets".into()))
    }
}

/// None or an empty list both mean "no restriction", matching the dashboard
/// dropdowns.
fn selection_from(values: Option<Vec<String>>) -> Selection {
    match values {
        Some(values) if !values.is_empty() => Selection::Only(values),
        _ => Selection::All,
    }
}

fn build_query(
    date_from: NaiveDateTime,
    date_to: NaiveDateTime,
    ports: Option<Vec<String>>,
    vessel_types: Option<Vec<String>>,
) -> FilterQuery {
    FilterQuery {
        date_from,
        date_to,
        ports: selection_from(ports),
        vessel_types: selection_from(vessel_types),
    }
}

// ── Module ──────────────────────────────────────────────────────────────────

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Operations
    let ops = PyModule::new(m.py(), "ops")?;
    ops.add("BUNKERING_PORT", schema::ops::BUNKERING_PORT)?;
    ops.add("CODE", schema::ops::CODE)?;
    ops.add("START_OF_SERVICE", schema::ops::START_OF_SERVICE)?;
    ops.add("VESSEL_INSIDE_PORT", schema::ops::VESSEL_INSIDE_PORT)?;
    ops.add("SERVICE_TIME", schema::ops::SERVICE_TIME)?;
    ops.add("BARGE_IMO", schema::ops::BARGE_IMO)?;
    ops.add("BARGE_BUILT", schema::ops::BARGE_BUILT)?;
    ops.add("CON_TYPE", schema::ops::CON_TYPE)?;
    ops.add("WAITING_TIME", schema::ops::WAITING_TIME)?;
    ops.add("BARGE_AGE_AT_OP", schema::ops::BARGE_AGE_AT_OP)?;
    m.add_submodule(&ops)?;

    // Prices
    let price = PyModule::new(m.py(), "price")?;
    price.add("DATE", schema::price::DATE)?;
    price.add("PRICE", schema::price::PRICE)?;
    m.add_submodule(&price)?;

    // Port positions
    let port = PyModule::new(m.py(), "port")?;
    port.add("PORT_CODE", schema::port::PORT_CODE)?;
    port.add("DISPLAY_NAME", schema::port::DISPLAY_NAME)?;
    port.add("LAT", schema::port::LAT)?;
    port.add("LONG", schema::port::LONG)?;
    m.add_submodule(&port)?;

    // Metric
    let metric = PyModule::new(m.py(), "metric")?;
    metric.add("SERVICE", schema::metric::SERVICE)?;
    metric.add("WAITING", schema::metric::WAITING)?;
    m.add_submodule(&metric)?;

    Ok(())
}

#[pymodule]
fn bunker_analytics(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<BunkerModel>()?;
    m.add_class::<PyDistributionResult>()?;
    m.add_class::<PyPortDistribution>()?;
    m.add_class::<PyRankingEntry>()?;
    m.add_class::<PyAgeBin>()?;
    m.add_class::<PyPricePoint>()?;
    m.add_class::<PyPortMarker>()?;
    m.add_class::<PyViewResults>()?;
    m.add("MAX_PORT_SELECTION", MAX_PORT_SELECTION)?;
    add_schema_exports(m)?;
    Ok(())
}
