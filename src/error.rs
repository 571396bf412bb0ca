// src/error.rs

use thiserror::Error;

/// Everything that can go wrong between the dataset source, the forecast
/// oracle and the view state.
///
/// Load-time failures (`FetchFailure`, `ParseFailure`) halt the pipeline and
/// leave the dataset uncommitted; forecast-time failures are caught at the
/// controller boundary and revert the view to historical data.
#[derive(Debug, Error)]
pub enum Error {
    /// Non-success HTTP status or transport failure while fetching the
    /// dataset. `status` is `None` when the request never got a response.
    #[error("dataset fetch failed: {detail}")]
    FetchFailure { status: Option<u16>, detail: String },

    /// The payload as a whole could not be understood as delimited tabular
    /// text with the expected header.
    #[error("could not parse dataset: {0}")]
    ParseFailure(String),

    /// A forecast was requested for a country with no historical rows.
    #[error("no historical data for {0:?}")]
    NoDataForSelection(String),

    /// The oracle answered with something other than a sequence of
    /// `{year, pop}` points.
    #[error("forecast response is not a sequence of {{year, pop}} points: {0}")]
    InvalidForecastShape(String),

    /// Any other oracle-side failure (transport, HTTP status, ...).
    #[error("forecast oracle failed: {0}")]
    OracleFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
