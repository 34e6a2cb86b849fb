use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BunkerError {
    #[error("Data not loaded: {0}")]
    NotLoaded(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid date range: from {from} is after to {to}")]
    InvalidDateRange { from: NaiveDateTime, to: NaiveDateTime },

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("{0}")]
    General(String),
}

#[cfg(feature = "python")]
impl From<BunkerError> for pyo3::PyErr {
    fn from(err: BunkerError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyRuntimeError, PyValueError};
        match err {
            BunkerError::InvalidDateRange { .. } | BunkerError::InvalidData(_) => {
                PyValueError::new_err(err.to_string())
            }
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}
