// src/lib.rs

pub mod controller;
pub mod error;
pub mod fetch;
pub mod forecast;
pub mod index;
pub mod row;

pub use controller::{PendingForecast, Phase, ViewController};
pub use error::Error;
pub use forecast::{ForecastOracle, ForecastPoint, ForecastRequest, HttpOracle};
pub use index::{Dataset, SeriesIndex};
pub use row::Row;
