// src/forecast.rs

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::row::Row;

/// Horizon year the reference deployment forecasts to.
pub const DEFAULT_HORIZON_YEAR: i32 = 2025;

/// How many trailing historical observations are handed to the oracle.
const CONTEXT_WINDOW: usize = 10;

/// One `{year, pop}` point on the oracle wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub year: i32,
    pub pop: f64,
}

/// Input handed to the forecast oracle for one country.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRequest {
    pub country: String,
    pub recent_context: Vec<ForecastPoint>,
    pub range_start: i32,
    pub range_end: i32,
}

/// External forecasting collaborator. Implementations return the raw
/// structured payload; shape validation happens in [`decode_points`].
#[async_trait]
pub trait ForecastOracle: Send + Sync {
    async fn forecast(&self, request: &ForecastRequest) -> Result<Value>;
}

/// Last year with historical (non-predicted) data; `None` for a series with
/// no historical rows. Marks the historical/forecast transition for display.
pub fn boundary_year(rows: &[Row]) -> Option<i32> {
    rows.iter()
        .filter(|row| !row.predicted)
        .map(|row| row.year)
        .max()
}

/// Build the oracle request for `country`: the last `CONTEXT_WINDOW`
/// historical points as context, asking for the years from just past the
/// boundary through `horizon_year`.
///
/// An empty historical series is `NoDataForSelection`; no request is issued.
pub fn build_request(
    country: &str,
    historical: &[Row],
    horizon_year: i32,
) -> Result<ForecastRequest> {
    let boundary = boundary_year(historical)
        .ok_or_else(|| Error::NoDataForSelection(country.to_string()))?;

    let past: Vec<&Row> = historical.iter().filter(|row| !row.predicted).collect();
    let start = past.len().saturating_sub(CONTEXT_WINDOW);
    let recent_context = past[start..]
        .iter()
        .map(|row| ForecastPoint {
            year: row.year,
            pop: row.population,
        })
        .collect();

    Ok(ForecastRequest {
        country: country.to_string(),
        recent_context,
        range_start: boundary + 1,
        range_end: horizon_year,
    })
}

/// Validate the oracle payload: anything but a sequence of `{year, pop}`
/// objects is an `InvalidForecastShape`.
pub fn decode_points(payload: &Value) -> Result<Vec<ForecastPoint>> {
    let items = payload.as_array().ok_or_else(|| {
        Error::InvalidForecastShape(format!("expected a JSON array, got {}", kind_of(payload)))
    })?;

    items
        .iter()
        .map(|item| {
            serde_json::from_value(item.clone())
                .map_err(|err| Error::InvalidForecastShape(err.to_string()))
        })
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Metadata copied onto predicted rows, lifted from the first historical row.
#[derive(Debug, Clone, Default)]
pub struct CountryMeta {
    pub continent: String,
    pub iso_alpha: String,
    pub iso_numeric: i64,
}

impl CountryMeta {
    pub fn from_rows(rows: &[Row]) -> Self {
        rows.first()
            .map(|row| Self {
                continent: row.continent.clone(),
                iso_alpha: row.iso_alpha.clone(),
                iso_numeric: row.iso_numeric,
            })
            .unwrap_or_default()
    }
}

/// Merge a fresh forecast batch into `historical` for one country.
///
/// Previously predicted rows are discarded first, so at most one predicted
/// batch is ever present. The result is not re-sorted; ordering for display
/// is the presentation layer's job. Years outside the requested range pass
/// through untouched.
pub fn merge_forecast(
    country: &str,
    historical: &[Row],
    points: &[ForecastPoint],
    meta: &CountryMeta,
) -> Vec<Row> {
    let mut merged: Vec<Row> = historical
        .iter()
        .filter(|row| !row.predicted)
        .cloned()
        .collect();

    merged.extend(points.iter().map(|point| Row {
        country: country.to_string(),
        continent: meta.continent.clone(),
        year: point.year,
        population: point.pop,
        life_expectancy: 0.0,
        gdp_per_capita: 0.0,
        iso_alpha: meta.iso_alpha.clone(),
        iso_numeric: meta.iso_numeric,
        predicted: true,
    }));

    merged
}

/// Oracle backed by an HTTP endpoint: POSTs the request as JSON and expects
/// a JSON body back. The model behind the endpoint is opaque to this crate.
pub struct HttpOracle {
    client: Client,
    endpoint: Url,
}

impl HttpOracle {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl ForecastOracle for HttpOracle {
    async fn forecast(&self, request: &ForecastRequest) -> Result<Value> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|err| Error::OracleFailure(Box::new(err)))?
            .error_for_status()
            .map_err(|err| Error::OracleFailure(Box::new(err)))?;

        response
            .json()
            .await
            .map_err(|err| Error::OracleFailure(Box::new(err)))
    }
}
