// src/controller.rs

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::forecast::{self, CountryMeta, ForecastOracle, ForecastRequest};
use crate::index::Dataset;
use crate::row::Row;

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    LoadingDataset,
    Ready,
    RequestingForecast,
    Error,
}

/// A forecast the driver still has to run against the oracle. The `token`
/// must be handed back to [`ViewController::complete_forecast`] so a
/// superseded request can be recognised and dropped.
#[derive(Debug)]
pub struct PendingForecast {
    pub token: u64,
    pub request: ForecastRequest,
}

/// Orchestrates country selection and the prediction toggle over an
/// immutable dataset, and owns the working series the presentation layer
/// displays. Sole writer: readers only ever see committed snapshots.
///
/// Forecasts use a split begin/complete flow so the suspending oracle call
/// stays outside the controller: a selection method may return a
/// [`PendingForecast`], the driver awaits the oracle, then hands the outcome
/// back. A monotonically increasing token detects results that a later
/// selection or toggle change has superseded (cancellation by staleness, not
/// true cancellation).
pub struct ViewController {
    horizon_year: i32,
    phase: Phase,
    dataset: Option<Dataset>,
    selected_country: String,
    prediction_enabled: bool,
    working: Vec<Row>,
    boundary_year: Option<i32>,
    error: Option<String>,
    next_token: u64,
    /// Token of the one logically-active forecast request, if any.
    active_token: Option<u64>,
}

impl ViewController {
    pub fn new(horizon_year: i32) -> Self {
        Self {
            horizon_year,
            phase: Phase::Idle,
            dataset: None,
            selected_country: String::new(),
            prediction_enabled: false,
            working: Vec::new(),
            boundary_year: None,
            error: None,
            next_token: 0,
            active_token: None,
        }
    }

    /// Startup (and retry) entry: the driver should now run the dataset load
    /// and hand the outcome to [`Self::complete_load`].
    pub fn begin_load(&mut self) {
        self.phase = Phase::LoadingDataset;
        self.error = None;
    }

    /// Commit a load outcome. On success the first country in the sorted
    /// list becomes the selection and prediction starts disabled; on failure
    /// nothing is committed and the phase becomes `Error` with a retriable
    /// message.
    pub fn complete_load(&mut self, outcome: Result<Dataset>) {
        match outcome {
            Ok(dataset) => {
                let first = dataset
                    .index()
                    .countries()
                    .first()
                    .cloned()
                    .unwrap_or_default();
                self.dataset = Some(dataset);
                self.selected_country = first;
                self.prediction_enabled = false;
                self.active_token = None;
                self.refresh_historical();
                self.phase = Phase::Ready;
                info!(country = %self.selected_country, "dataset ready");
            }
            Err(err) => {
                warn!("dataset load failed: {}", err);
                self.error = Some(err.to_string());
                self.phase = Phase::Error;
            }
        }
    }

    /// Re-enter the load path after a failed load.
    pub fn retry_load(&mut self) {
        if self.phase == Phase::Error && self.dataset.is_none() {
            self.begin_load();
        }
    }

    /// Change the selection. With prediction off this only recomputes the
    /// historical subseries; with prediction on it starts a replacement
    /// forecast for the new country, superseding any in-flight request.
    pub fn select_country(&mut self, country: &str) -> Option<PendingForecast> {
        if self.dataset.is_none() {
            return None;
        }
        self.selected_country = country.to_string();
        self.error = None;
        self.active_token = None;

        if self.prediction_enabled {
            self.start_forecast()
        } else {
            self.refresh_historical();
            self.phase = Phase::Ready;
            None
        }
    }

    /// Toggle prediction. Turning it on starts a forecast for the current
    /// selection; turning it off immediately reverts to the unmodified
    /// historical subseries, with any in-flight result discarded on arrival.
    pub fn set_prediction(&mut self, enabled: bool) -> Option<PendingForecast> {
        if self.dataset.is_none() || enabled == self.prediction_enabled {
            return None;
        }
        self.error = None;
        self.active_token = None;
        self.prediction_enabled = enabled;

        if enabled {
            self.start_forecast()
        } else {
            self.refresh_historical();
            self.phase = Phase::Ready;
            None
        }
    }

    /// Commit a forecast outcome. A token that is no longer the active one
    /// identifies a superseded request; its result is dropped unapplied.
    pub fn complete_forecast(&mut self, token: u64, outcome: Result<Value>) {
        if self.active_token != Some(token) {
            info!(token, "dropping stale forecast result");
            return;
        }
        self.active_token = None;

        match outcome.and_then(|payload| forecast::decode_points(&payload)) {
            Ok(points) => {
                let historical: Vec<Row> = self.historical_rows().to_vec();
                let meta = CountryMeta::from_rows(&historical);
                self.boundary_year = forecast::boundary_year(&historical);
                self.working = forecast::merge_forecast(
                    &self.selected_country,
                    &historical,
                    &points,
                    &meta,
                );
                self.phase = Phase::Ready;
                info!(
                    country = %self.selected_country,
                    points = points.len(),
                    "forecast merged"
                );
            }
            Err(err) => self.fail_closed(err),
        }
    }

    /// Convenience for drivers without their own scheduling: run a pending
    /// forecast against `oracle` and apply the outcome.
    pub async fn run_forecast(&mut self, oracle: &dyn ForecastOracle, pending: PendingForecast) {
        let outcome = oracle.forecast(&pending.request).await;
        self.complete_forecast(pending.token, outcome);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn countries(&self) -> &[String] {
        self.dataset
            .as_ref()
            .map(|d| d.index().countries())
            .unwrap_or(&[])
    }

    pub fn selected_country(&self) -> &str {
        &self.selected_country
    }

    pub fn prediction_enabled(&self) -> bool {
        self.prediction_enabled
    }

    /// The currently displayed series. Not re-sorted after a merge; the
    /// presentation layer sorts by year before display.
    pub fn working_series(&self) -> &[Row] {
        &self.working
    }

    pub fn boundary_year(&self) -> Option<i32> {
        self.boundary_year
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn loading(&self) -> bool {
        self.phase == Phase::LoadingDataset
    }

    pub fn predicting(&self) -> bool {
        self.phase == Phase::RequestingForecast
    }

    fn start_forecast(&mut self) -> Option<PendingForecast> {
        let historical: Vec<Row> = self.historical_rows().to_vec();
        match forecast::build_request(&self.selected_country, &historical, self.horizon_year) {
            Ok(request) => {
                // show plain history while the forecast is in flight
                self.refresh_historical();
                let token = self.next_token;
                self.next_token += 1;
                self.active_token = Some(token);
                self.phase = Phase::RequestingForecast;
                Some(PendingForecast { token, request })
            }
            Err(err) => {
                self.fail_closed(err);
                None
            }
        }
    }

    /// Forecast errors never take the app down: force the toggle off, keep a
    /// human-readable message, fall back to plain historical data.
    fn fail_closed(&mut self, err: Error) {
        warn!("forecast failed: {}", err);
        self.prediction_enabled = false;
        self.error = Some(err.to_string());
        self.refresh_historical();
        self.phase = Phase::Error;
    }

    fn refresh_historical(&mut self) {
        let rows: Vec<Row> = self.historical_rows().to_vec();
        self.boundary_year = forecast::boundary_year(&rows);
        self.working = rows;
    }

    fn historical_rows(&self) -> &[Row] {
        self.dataset
            .as_ref()
            .map(|d| d.index().series(&self.selected_country))
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(country: &str, year: i32, pop: f64) -> Row {
        Row {
            country: country.to_string(),
            continent: "Americas".to_string(),
            year,
            population: pop,
            life_expectancy: 75.0,
            gdp_per_capita: 30_000.0,
            iso_alpha: "CAN".to_string(),
            iso_numeric: 124,
            predicted: false,
        }
    }

    fn canada_and_chile() -> Dataset {
        Dataset::new(vec![
            row("Canada", 1952, 14_785_584.0),
            row("Canada", 2002, 31_902_268.0),
            row("Canada", 2007, 33_390_141.0),
            row("Chile", 2002, 15_497_046.0),
            row("Chile", 2007, 16_284_741.0),
        ])
    }

    fn ready_controller() -> ViewController {
        let mut ctl = ViewController::new(2025);
        ctl.begin_load();
        ctl.complete_load(Ok(canada_and_chile()));
        assert_eq!(ctl.phase(), Phase::Ready);
        ctl
    }

    #[test]
    fn load_selects_first_country_and_exposes_historical_series() {
        let ctl = ready_controller();

        assert_eq!(ctl.countries(), ["Canada", "Chile"]);
        assert_eq!(ctl.selected_country(), "Canada");
        assert!(!ctl.prediction_enabled());
        assert_eq!(ctl.working_series().len(), 3);
        assert_eq!(ctl.boundary_year(), Some(2007));
    }

    #[test]
    fn fetch_failure_enters_error_phase_and_retry_reloads() {
        let mut ctl = ViewController::new(2025);
        ctl.begin_load();
        ctl.complete_load(Err(Error::FetchFailure {
            status: Some(500),
            detail: "HTTP 500 Internal Server Error".to_string(),
        }));

        assert_eq!(ctl.phase(), Phase::Error);
        assert!(ctl.error().expect("message").contains("500"));

        ctl.retry_load();
        assert_eq!(ctl.phase(), Phase::LoadingDataset);
        assert!(ctl.error().is_none());

        ctl.complete_load(Ok(canada_and_chile()));
        assert_eq!(ctl.phase(), Phase::Ready);
    }

    #[test]
    fn selecting_a_country_without_prediction_recomputes_history_only() {
        let mut ctl = ready_controller();
        let pending = ctl.select_country("Chile");

        assert!(pending.is_none());
        assert_eq!(ctl.phase(), Phase::Ready);
        assert_eq!(ctl.working_series().len(), 2);
        assert_eq!(ctl.boundary_year(), Some(2007));
        assert!(ctl.working_series().iter().all(|r| r.country == "Chile"));
    }

    #[test]
    fn successful_forecast_appends_predicted_rows() {
        let mut ctl = ready_controller();
        let pending = ctl.set_prediction(true).expect("forecast should start");

        assert_eq!(ctl.phase(), Phase::RequestingForecast);
        assert!(ctl.predicting());
        assert_eq!(pending.request.range_start, 2008);
        assert_eq!(pending.request.range_end, 2025);

        ctl.complete_forecast(
            pending.token,
            Ok(json!([
                {"year": 2008, "pop": 34000000.0},
                {"year": 2025, "pop": 40000000.0},
            ])),
        );

        assert_eq!(ctl.phase(), Phase::Ready);
        assert_eq!(ctl.boundary_year(), Some(2007));
        let series = ctl.working_series();
        assert_eq!(series.len(), 5);
        assert!(series[..3].iter().all(|r| !r.predicted));
        assert!(series[3..].iter().all(|r| r.predicted));
        assert_eq!(series[3].year, 2008);
        assert_eq!(series[4].population, 40_000_000.0);
    }

    #[test]
    fn toggle_off_reverts_to_exact_historical_rows() {
        let mut ctl = ready_controller();
        let pending = ctl.set_prediction(true).expect("forecast should start");
        ctl.complete_forecast(pending.token, Ok(json!([{"year": 2008, "pop": 1.0}])));
        assert_eq!(ctl.working_series().len(), 4);

        assert!(ctl.set_prediction(false).is_none());
        assert_eq!(ctl.phase(), Phase::Ready);
        assert!(!ctl.prediction_enabled());
        let years: Vec<i32> = ctl.working_series().iter().map(|r| r.year).collect();
        assert_eq!(years, [1952, 2002, 2007]);
        assert!(ctl.working_series().iter().all(|r| !r.predicted));
    }

    #[test]
    fn invalid_forecast_shape_fails_closed() {
        let mut ctl = ready_controller();
        let pending = ctl.set_prediction(true).expect("forecast should start");
        ctl.complete_forecast(pending.token, Ok(json!({"unexpected": "object"})));

        assert_eq!(ctl.phase(), Phase::Error);
        assert!(!ctl.prediction_enabled());
        assert!(ctl.error().expect("message").contains("sequence"));
        assert_eq!(ctl.working_series().len(), 3);
        assert!(ctl.working_series().iter().all(|r| !r.predicted));
    }

    #[test]
    fn oracle_failure_fails_closed_and_app_stays_usable() {
        let mut ctl = ready_controller();
        let pending = ctl.set_prediction(true).expect("forecast should start");
        ctl.complete_forecast(
            pending.token,
            Err(Error::OracleFailure("model unavailable".into())),
        );

        assert_eq!(ctl.phase(), Phase::Error);
        assert!(!ctl.prediction_enabled());

        // the next interaction clears the error
        assert!(ctl.select_country("Chile").is_none());
        assert_eq!(ctl.phase(), Phase::Ready);
        assert!(ctl.error().is_none());
    }

    #[test]
    fn forecast_for_unknown_country_is_no_data_for_selection() {
        let mut ctl = ready_controller();
        assert!(ctl.select_country("Atlantis").is_none());
        let pending = ctl.set_prediction(true);

        assert!(pending.is_none());
        assert_eq!(ctl.phase(), Phase::Error);
        assert!(!ctl.prediction_enabled());
        assert!(ctl.error().expect("message").contains("Atlantis"));
    }

    #[test]
    fn stale_forecast_result_is_dropped() {
        let mut ctl = ready_controller();
        let for_canada = ctl.set_prediction(true).expect("forecast should start");

        // selection changes while the Canada request is in flight
        let for_chile = ctl
            .select_country("Chile")
            .expect("replacement forecast should start");
        assert_ne!(for_canada.token, for_chile.token);

        // the late Canada result must not touch Chile's series
        ctl.complete_forecast(for_canada.token, Ok(json!([{"year": 2008, "pop": 99.0}])));
        assert_eq!(ctl.phase(), Phase::RequestingForecast);
        assert!(ctl.working_series().iter().all(|r| !r.predicted));

        ctl.complete_forecast(for_chile.token, Ok(json!([{"year": 2008, "pop": 17000000.0}])));
        assert_eq!(ctl.phase(), Phase::Ready);
        let predicted: Vec<&Row> = ctl.working_series().iter().filter(|r| r.predicted).collect();
        assert_eq!(predicted.len(), 1);
        assert_eq!(predicted[0].country, "Chile");
        assert_eq!(predicted[0].population, 17_000_000.0);
    }

    #[test]
    fn toggle_off_mid_flight_discards_the_result_on_arrival() {
        let mut ctl = ready_controller();
        let pending = ctl.set_prediction(true).expect("forecast should start");

        assert!(ctl.set_prediction(false).is_none());
        assert_eq!(ctl.phase(), Phase::Ready);

        ctl.complete_forecast(pending.token, Ok(json!([{"year": 2008, "pop": 1.0}])));
        assert_eq!(ctl.phase(), Phase::Ready);
        assert!(ctl.working_series().iter().all(|r| !r.predicted));
    }

    #[test]
    fn repeated_forecasts_keep_only_the_latest_batch() {
        let mut ctl = ready_controller();
        let first = ctl.set_prediction(true).expect("forecast should start");
        ctl.complete_forecast(
            first.token,
            Ok(json!([{"year": 2010, "pop": 1.0}, {"year": 2015, "pop": 2.0}])),
        );

        // toggling off and on again issues a fresh request
        assert!(ctl.set_prediction(false).is_none());
        let second = ctl.set_prediction(true).expect("forecast should start");
        ctl.complete_forecast(second.token, Ok(json!([{"year": 2012, "pop": 3.0}])));

        let predicted: Vec<(i32, f64)> = ctl
            .working_series()
            .iter()
            .filter(|r| r.predicted)
            .map(|r| (r.year, r.population))
            .collect();
        assert_eq!(predicted, [(2012, 3.0)]);
    }
}
