use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::error::BunkerError;
use crate::schema::ops;
use crate::store::DatasetStore;

/// Filter along one categorical dimension: everything, or a named subset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Only(Vec<String>),
}

impl Selection {
    /// The explicit subset, if any.
    pub fn only(&self) -> Option<&[String]> {
        match self {
            Selection::All => None,
            Selection::Only(values) => Some(values),
        }
    }
}

/// A filter request: inclusive date range plus port and vessel-type subsets.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterQuery {
    pub date_from: NaiveDateTime,
    pub date_to: NaiveDateTime,
    pub ports: Selection,
    pub vessel_types: Selection,
}

impl Default for FilterQuery {
    /// The dashboard's initial state: 2014-01-01 through 2019-06-01, no
    /// port or vessel-type restriction.
    fn default() -> Self {
        Self {
            date_from: NaiveDate::from_ymd_opt(2014, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            date_to: NaiveDate::from_ymd_opt(2019, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            ports: Selection::All,
            vessel_types: Selection::All,
        }
    }
}

impl FilterQuery {
    /// An inverted range is a user-input error, reported as such rather than
    /// silently computed as an empty range.
    pub fn validate(&self) -> Result<(), BunkerError> {
        if self.date_from > self.date_to {
            return Err(BunkerError::InvalidDateRange {
                from: self.date_from,
                to: self.date_to,
            });
        }
        Ok(())
    }
}

/// Select the operations whose `start_of_service` lies in the inclusive date
/// range, restricted to the requested ports and vessel types.
///
/// An empty result is valid output; the store is never mutated.
pub fn filter_operations(
    store: &DatasetStore,
    query: &FilterQuery,
) -> Result<DataFrame, BunkerError> {
    let from_us = query.date_from.and_utc().timestamp_micros();
    let to_us = query.date_to.and_utc().timestamp_micros();

    let mut lazy = store.operations().clone().lazy().filter(
        col(ops::START_OF_SERVICE)
            .gt_eq(lit(from_us))
            .and(col(ops::START_OF_SERVICE).lt_eq(lit(to_us))),
    );

    if let Selection::Only(codes) = &query.ports {
        let codes = Series::new(ops::CODE.into(), codes.clone());
        lazy = lazy.filter(col(ops::CODE).is_in(lit(codes), false));
    }

    if let Selection::Only(types) = &query.vessel_types {
        let types = Series::new(ops::CON_TYPE.into(), types.clone());
        lazy = lazy.filter(col(ops::CON_TYPE).is_in(lit(types), false));
    }

    Ok(lazy.collect()?)
}
