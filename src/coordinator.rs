use tracing::{debug, warn};

use crate::aggregation::{
    barge_age_histogram, distribution, port_markers, price_series, ranking, AgeBin,
    DistributionResult, Metric, PortMarker, PricePoint, RankingEntry, DEFAULT_AGE_BIN_SIZE,
};
use crate::error::BunkerError;
use crate::query::{filter_operations, FilterQuery, Selection};
use crate::store::DatasetStore;

/// The dashboard allows at most this many ports in a selection; wider
/// selections fall back to showing all ports.
pub const MAX_PORT_SELECTION: usize = 5;

/// Render-ready bundle for one recomputation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewResults {
    pub service: DistributionResult,
    pub waiting: DistributionResult,
    pub ranking: Vec<RankingEntry>,
    pub barge_age: Vec<AgeBin>,
    pub prices: Vec<PricePoint>,
    pub ports: Vec<PortMarker>,
}

/// Recompute every view for a changed filter state.
///
/// The operation subset is computed once and shared by all aggregators.
/// An inverted date range is a validation error; empty results flow through
/// as structured values.
pub fn on_filter_changed(
    store: &DatasetStore,
    state: &FilterQuery,
) -> Result<ViewResults, BunkerError> {
    state.validate()?;

    let mut query = state.clone();
    if query
        .ports
        .only()
        .is_some_and(|ports| ports.len() > MAX_PORT_SELECTION)
    {
        warn!(
            limit = MAX_PORT_SELECTION,
            "port selection over the limit; showing all ports"
        );
        query.ports = Selection::All;
    }

    let subset = filter_operations(store, &query)?;
    debug!(rows = subset.height(), "recomputing views");

    Ok(ViewResults {
        service: distribution(&subset, Metric::Service)?,
        waiting: distribution(&subset, Metric::Waiting)?,
        ranking: ranking(&subset)?,
        barge_age: barge_age_histogram(&subset, DEFAULT_AGE_BIN_SIZE)?,
        prices: price_series(store, query.date_from, query.date_to)?,
        ports: port_markers(store, &query.ports)?,
    })
}
