//! Time series data handling for power and weather observations

use crate::error::{ForecastError, Result};
use crate::utils;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Differencing period for the stationarity transform.
///
/// Periods are expressed in row steps and assume hourly cadence: `Hour` is
/// one row, `Day` is 24 rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lag {
    Hour,
    Day,
}

impl Lag {
    /// Number of rows spanned by this period.
    pub fn steps(&self) -> usize {
        match self {
            Lag::Hour => 1,
            Lag::Day => 24,
        }
    }
}

/// Per-column standardisation (zero mean, unit variance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit means and standard deviations over the given columns.
    pub fn fit(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let mut means = Vec::with_capacity(columns.len());
        let mut stds = Vec::with_capacity(columns.len());

        for name in columns {
            let values = column_as_f64(df, name)?;
            if values.is_empty() {
                return Err(ForecastError::DataError(format!(
                    "Cannot fit scaler on empty column '{}'",
                    name
                )));
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
            let std = variance.sqrt();
            means.push(mean);
            // Constant columns pass through unscaled
            stds.push(if std > 0.0 { std } else { 1.0 });
        }

        Ok(Self {
            columns: columns.to_vec(),
            means,
            stds,
        })
    }

    /// Scale all fitted columns of `df`.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for (i, name) in self.columns.iter().enumerate() {
            let values = column_as_f64(df, name)?;
            let scaled: Vec<f64> = values
                .iter()
                .map(|v| (v - self.means[i]) / self.stds[i])
                .collect();
            out.replace(name, Series::new(name, scaled))?;
        }
        Ok(out)
    }

    /// Undo scaling for whichever fitted columns are present in `df`.
    pub fn invert(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for (i, name) in self.columns.iter().enumerate() {
            if df.column(name).is_err() {
                continue;
            }
            let values = column_as_f64(df, name)?;
            let unscaled: Vec<f64> = values
                .iter()
                .map(|v| v * self.stds[i] + self.means[i])
                .collect();
            out.replace(name, Series::new(name, unscaled))?;
        }
        Ok(out)
    }
}

/// Loader for timestamp-indexed CSV files
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a timestamp-indexed CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Dataset> {
        let file = File::open(path.as_ref())?;
        let df = CsvReader::new(file)
            .infer_schema(Some(200))
            .has_header(true)
            .finish()?;

        let time_column = Self::detect_time_column(&df)?;
        Dataset::from_frame(df, &time_column)
    }

    /// Load a weather file and a power-readings file and merge them by inner
    /// join on timestamp.
    pub fn merged<P: AsRef<Path>>(weather_path: P, power_path: P) -> Result<Dataset> {
        let weather = Self::from_csv(weather_path)?;
        let power = Self::from_csv(power_path)?;
        let merged = weather.inner_join(&power)?;
        info!(
            "merged weather and power sources: {} rows, {} series",
            merged.len(),
            merged.value_columns().len()
        );
        Ok(merged)
    }

    /// Create a dataset from an existing DataFrame.
    pub fn from_dataframe(df: DataFrame, time_column: &str) -> Result<Dataset> {
        Dataset::from_frame(df, time_column)
    }

    /// Detect the timestamp column by name.
    fn detect_time_column(df: &DataFrame) -> Result<String> {
        for name in df.get_column_names() {
            let lower = name.to_lowercase();
            if lower.contains("time") || lower.contains("date") {
                return Ok(name.to_string());
            }
        }

        Err(ForecastError::DataError(
            "No timestamp column found in data".to_string(),
        ))
    }
}

/// A time-indexed table of observations.
///
/// The timestamp column is stored as epoch seconds and is monotonically
/// increasing; all remaining columns are numeric series. A transformed
/// dataset keeps the pre-transform table so predictions can be mapped back
/// to physical units.
#[derive(Debug, Clone)]
pub struct Dataset {
    df: DataFrame,
    time_column: String,
    /// Pre-transform table, present only after `transform`
    raw: Option<DataFrame>,
    /// Differencing steps applied in order
    lag_steps: Vec<usize>,
    scaler: Option<StandardScaler>,
}

impl Dataset {
    fn from_frame(df: DataFrame, time_column: &str) -> Result<Self> {
        let df = normalise_time_column(&df, time_column)?;
        let df = df.sort([time_column], false, false)?;
        Ok(Self {
            df,
            time_column: time_column.to_string(),
            raw: None,
            lag_steps: Vec::new(),
            scaler: None,
        })
    }

    /// Get the underlying DataFrame.
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Get the timestamp column name.
    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    /// Names of the value columns, in table order.
    pub fn value_columns(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .filter(|name| **name != self.time_column)
            .map(|name| name.to_string())
            .collect()
    }

    /// Timestamps as epoch seconds.
    pub fn timestamps(&self) -> Vec<i64> {
        column_as_i64(&self.df, &self.time_column).unwrap_or_default()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.df.height()
    }

    /// Check whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Value columns as a row-major matrix of f64.
    pub fn values_matrix(&self) -> Result<Vec<Vec<f64>>> {
        let columns = self.value_columns();
        let mut by_column = Vec::with_capacity(columns.len());
        for name in &columns {
            let values = column_as_f64(&self.df, name)?;
            if values.len() != self.len() {
                return Err(ForecastError::DataError(format!(
                    "Column '{}' contains missing values",
                    name
                )));
            }
            by_column.push(values);
        }

        let rows = (0..self.len())
            .map(|t| by_column.iter().map(|col| col[t]).collect())
            .collect();
        Ok(rows)
    }

    /// Contiguous row slice, preserving transform state.
    pub fn slice(&self, offset: usize, len: usize) -> Dataset {
        Dataset {
            df: self.df.slice(offset as i64, len),
            time_column: self.time_column.clone(),
            raw: self.raw.clone(),
            lag_steps: self.lag_steps.clone(),
            scaler: self.scaler.clone(),
        }
    }

    /// Deterministic prefix/suffix partition: the train set holds exactly
    /// `floor(train_fraction * len)` rows, the test set the remainder.
    pub fn split(&self, train_fraction: f64) -> Result<(Dataset, Dataset)> {
        if !(train_fraction > 0.0 && train_fraction <= 1.0) {
            return Err(ForecastError::ValidationError(format!(
                "Train fraction must be in (0, 1], got {}",
                train_fraction
            )));
        }

        let stop = (train_fraction * self.len() as f64).floor() as usize;
        let train = self.slice(0, stop);
        let test = self.slice(stop, self.len() - stop);
        Ok((train, test))
    }

    /// Inner join with another dataset on timestamp.
    pub fn inner_join(&self, other: &Dataset) -> Result<Dataset> {
        let joined = self.df.inner_join(
            &other.df,
            [self.time_column.as_str()],
            [other.time_column.as_str()],
        )?;
        let joined = joined.sort([self.time_column.as_str()], false, false)?;
        Ok(Dataset {
            df: joined,
            time_column: self.time_column.clone(),
            raw: None,
            lag_steps: Vec::new(),
            scaler: None,
        })
    }

    /// Drop columns from the dataset and from the retained raw table.
    pub fn drop_columns(&mut self, columns: &[&str]) -> Result<()> {
        for name in columns {
            self.df = self.df.drop(name)?;
            if let Some(raw) = &self.raw {
                self.raw = Some(raw.drop(name)?);
            }
        }
        Ok(())
    }

    /// Cast a column to f64.
    pub fn cast_float(&mut self, column: &str) -> Result<()> {
        let values = column_as_f64(&self.df, column)?;
        self.df.replace(column, Series::new(column, values))?;
        if let Some(raw) = &mut self.raw {
            if raw.column(column).is_ok() {
                let raw_values = column_as_f64(raw, column)?;
                raw.replace(column, Series::new(column, raw_values))?;
            }
        }
        Ok(())
    }

    /// Rename a column.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        self.df.rename(old, new)?;
        if let Some(raw) = &mut self.raw {
            if raw.column(old).is_ok() {
                raw.rename(old, new)?;
            }
        }
        Ok(())
    }

    /// Apply successive lag differencing and optional standard scaling.
    ///
    /// Each lag of `l` steps replaces `x[t]` with `x[t] - x[t - l]` and drops
    /// the first `l` rows. The pre-transform table is retained so
    /// `inverse_transform` can undo the operation exactly.
    pub fn transform(&self, lags: &[Lag], scale: bool) -> Result<Dataset> {
        let steps: Vec<usize> = lags.iter().map(|lag| lag.steps()).collect();
        let trimmed: usize = steps.iter().sum();
        if self.len() <= trimmed {
            return Err(ForecastError::ValidationError(format!(
                "Dataset of {} rows is too short for lags {:?}",
                self.len(),
                steps
            )));
        }

        let columns = self.value_columns();
        let mut matrix = self.values_matrix()?;
        let mut timestamps = self.timestamps();

        for &lag in &steps {
            let differenced: Vec<Vec<f64>> = (lag..matrix.len())
                .map(|t| {
                    matrix[t]
                        .iter()
                        .zip(&matrix[t - lag])
                        .map(|(a, b)| a - b)
                        .collect()
                })
                .collect();
            matrix = differenced;
            timestamps = timestamps[lag..].to_vec();
        }

        let mut df = frame_from_matrix(&self.time_column, &timestamps, &columns, &matrix)?;
        let scaler = if scale {
            let scaler = StandardScaler::fit(&df, &columns)?;
            df = scaler.apply(&df)?;
            Some(scaler)
        } else {
            None
        };

        info!(
            "stationarity transform applied: lag steps {:?}, {} rows retained",
            steps,
            df.height()
        );

        Ok(Dataset {
            df,
            time_column: self.time_column.clone(),
            raw: Some(self.df.clone()),
            lag_steps: steps,
            scaler,
        })
    }

    /// Map a frame of transformed values back to physical units.
    ///
    /// The frame must carry this dataset's timestamp column; every timestamp
    /// must exist in the retained raw table with enough history to resolve
    /// the differencing chain.
    pub fn inverse_transform(&self, frame: &DataFrame) -> Result<DataFrame> {
        let mut frame = frame.clone();
        if let Some(scaler) = &self.scaler {
            frame = scaler.invert(&frame)?;
        }

        let raw = match &self.raw {
            Some(raw) => raw,
            None => return Ok(frame),
        };

        let raw_timestamps = column_as_i64(raw, &self.time_column)?;
        let timestamps = column_as_i64(&frame, &self.time_column)?;
        let history_needed: usize = self.lag_steps.iter().sum();

        let mut out_columns = vec![frame.column(&self.time_column)?.clone()];
        for name in frame.get_column_names() {
            if name == self.time_column {
                continue;
            }
            let raw_column = column_as_f64(raw, name)?;
            let values = column_as_f64(&frame, name)?;

            let mut inverted = Vec::with_capacity(values.len());
            for (value, ts) in values.iter().zip(&timestamps) {
                let idx = raw_timestamps.binary_search(ts).map_err(|_| {
                    ForecastError::DataError(format!(
                        "Timestamp {} not present in raw data",
                        utils::format_timestamp(*ts, "%Y-%m-%d %H:%M:%S")
                    ))
                })?;
                if idx < history_needed {
                    return Err(ForecastError::DataError(format!(
                        "Timestamp {} has insufficient history for the inverse transform",
                        utils::format_timestamp(*ts, "%Y-%m-%d %H:%M:%S")
                    )));
                }
                inverted.push(invert_level(&raw_column, *value, idx, &self.lag_steps));
            }
            out_columns.push(Series::new(name, inverted));
        }

        DataFrame::new(out_columns).map_err(Into::into)
    }

    /// Periodogram of one series: frequencies in cycles per sample and the
    /// corresponding spectral power, computed by direct DFT. The zero
    /// frequency (series mean) is omitted.
    pub fn periodogram(&self, column: &str) -> Result<(Vec<f64>, Vec<f64>)> {
        let values = column_as_f64(&self.df, column)?;
        let n = values.len();
        if n < 4 {
            return Err(ForecastError::DataError(format!(
                "Column '{}' is too short for a periodogram",
                column
            )));
        }

        let mut frequencies = Vec::with_capacity(n / 2);
        let mut power = Vec::with_capacity(n / 2);
        for k in 1..=n / 2 {
            let mut re = 0.0;
            let mut im = 0.0;
            for (t, &x) in values.iter().enumerate() {
                let angle = -2.0 * std::f64::consts::PI * k as f64 * t as f64 / n as f64;
                re += x * angle.cos();
                im += x * angle.sin();
            }
            frequencies.push(k as f64 / n as f64);
            power.push((re * re + im * im) / n as f64);
        }

        Ok((frequencies, power))
    }
}

/// Forward-differenced value at row `idx` of a raw column after applying
/// `lags` in order.
fn level_value(raw: &[f64], idx: usize, lags: &[usize]) -> f64 {
    match lags.split_last() {
        None => raw[idx],
        Some((&lag, rest)) => level_value(raw, idx, rest) - level_value(raw, idx - lag, rest),
    }
}

/// Undo the differencing chain for a single transformed value at raw row
/// `idx`, using the raw column for the required history.
fn invert_level(raw: &[f64], value: f64, idx: usize, lags: &[usize]) -> f64 {
    match lags.split_last() {
        None => value,
        Some((&lag, rest)) => {
            let previous = level_value(raw, idx - lag, rest);
            invert_level(raw, value + previous, idx, rest)
        }
    }
}

fn normalise_time_column(df: &DataFrame, time_column: &str) -> Result<DataFrame> {
    let col = df.column(time_column)?;
    let epochs: Vec<i64> = match col.dtype() {
        DataType::Utf8 => {
            let mut out = Vec::with_capacity(df.height());
            for value in col.utf8()?.into_iter() {
                let value = value.ok_or_else(|| {
                    ForecastError::DataError(format!("Missing timestamp in '{}'", time_column))
                })?;
                out.push(utils::parse_timestamp(value)?);
            }
            out
        }
        DataType::Int64 => col.i64()?.into_iter().flatten().collect(),
        DataType::Int32 => col.i32()?.into_iter().flatten().map(|v| v as i64).collect(),
        other => {
            return Err(ForecastError::DataError(format!(
                "Unsupported timestamp dtype {:?} in '{}'",
                other, time_column
            )))
        }
    };

    if epochs.len() != df.height() {
        return Err(ForecastError::DataError(format!(
            "Missing timestamps in '{}'",
            time_column
        )));
    }

    let mut out = df.clone();
    out.replace(time_column, Series::new(time_column, epochs))?;
    Ok(out)
}

fn frame_from_matrix(
    time_column: &str,
    timestamps: &[i64],
    columns: &[String],
    matrix: &[Vec<f64>],
) -> Result<DataFrame> {
    let mut series = vec![Series::new(time_column, timestamps)];
    for (j, name) in columns.iter().enumerate() {
        let values: Vec<f64> = matrix.iter().map(|row| row[j]).collect();
        series.push(Series::new(name, values));
    }
    DataFrame::new(series).map_err(Into::into)
}

/// Get a column as f64 values.
pub fn column_as_f64(df: &DataFrame, column_name: &str) -> Result<Vec<f64>> {
    let col = df.column(column_name).map_err(|e| {
        ForecastError::DataError(format!("Column '{}' not found: {}", column_name, e))
    })?;

    match col.dtype() {
        DataType::Float64 => Ok(col.f64()?.into_iter().flatten().collect()),
        DataType::Float32 => Ok(col
            .f32()?
            .into_iter()
            .flatten()
            .map(|v| v as f64)
            .collect()),
        DataType::Int64 => Ok(col
            .i64()?
            .into_iter()
            .flatten()
            .map(|v| v as f64)
            .collect()),
        DataType::Int32 => Ok(col
            .i32()?
            .into_iter()
            .flatten()
            .map(|v| v as f64)
            .collect()),
        DataType::UInt64 => Ok(col
            .u64()?
            .into_iter()
            .flatten()
            .map(|v| v as f64)
            .collect()),
        DataType::UInt32 => Ok(col
            .u32()?
            .into_iter()
            .flatten()
            .map(|v| v as f64)
            .collect()),
        _ => Err(ForecastError::DataError(format!(
            "Column '{}' cannot be converted to f64",
            column_name
        ))),
    }
}

/// Get a column as i64 values.
pub fn column_as_i64(df: &DataFrame, column_name: &str) -> Result<Vec<i64>> {
    let col = df.column(column_name).map_err(|e| {
        ForecastError::DataError(format!("Column '{}' not found: {}", column_name, e))
    })?;

    match col.dtype() {
        DataType::Int64 => Ok(col.i64()?.into_iter().flatten().collect()),
        DataType::Int32 => Ok(col
            .i32()?
            .into_iter()
            .flatten()
            .map(|v| v as i64)
            .collect()),
        _ => Err(ForecastError::DataError(format!(
            "Column '{}' cannot be converted to i64",
            column_name
        ))),
    }
}
