//! # Forecast Power
//!
//! A Rust crate for fitting vector autoregression (VAR) models to historical
//! power-output and weather time series.
//!
//! ## Features
//!
//! - Time series data handling over timestamp-indexed tables (power output,
//!   temperature, irradiance, cloud cover, precipitation)
//! - Stationarity transforms (hour/day lag differencing, optional scaling)
//!   with exact inverse transforms back to physical units
//! - Least-squares VAR estimation with bounded iterative refinement for
//!   moving-average terms
//! - In-sample prediction, stochastic simulation, and residual diagnostics
//! - Error metrics (RMSE, MAE, R², range-normalised MAPE) per series
//! - PNG plot rendering (real vs. predicted panels, residual series and
//!   density, raw vs. stationary power spectra)
//! - Model persistence with optional training-data stripping
//!
//! ## Quick Start
//!
//! ```no_run
//! use forecast_power::data::{DataLoader, Lag};
//! use forecast_power::model::{OutputPaths, PredictOptions, VarModel};
//! use forecast_power::models::VarOrder;
//!
//! # fn run() -> forecast_power::Result<()> {
//! // Load and merge weather and power readings
//! let raw = DataLoader::merged("data/weather.csv", "data/power.csv")?;
//!
//! // Difference by hour and day to remove trend and daily seasonality
//! let stationary = raw.transform(&[Lag::Hour, Lag::Day], false)?;
//!
//! // Fit a VAR(10) over the first 70% of the data
//! let mut model = VarModel::new(
//!     stationary,
//!     VarOrder::new(10, 0),
//!     0.7,
//!     None,
//!     OutputPaths::default(),
//! )?;
//! model.fit()?;
//!
//! // In-sample predictions over a 24 h window, back in physical units
//! let (pred, real) = model.predict(
//!     "2018-01-03 01:00:00",
//!     "2018-01-04 01:00:00",
//!     &PredictOptions::default(),
//! )?;
//! model.summary()?;
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod metrics;
pub mod model;
pub mod models;
pub mod plot;
pub mod utils;

// Re-export commonly used types
pub use crate::data::{DataLoader, Dataset, Lag};
pub use crate::error::{ForecastError, Result};
pub use crate::model::{OutputPaths, PredictOptions, VarModel};
pub use crate::models::{FittedVar, VarOrder};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
