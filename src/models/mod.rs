//! VAR estimation and fitted-state types

use crate::error::{ForecastError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::ops::Range;
use std::path::Path;

pub mod var;

pub use var::VarEstimator;

/// Model order: autoregressive lag depth and moving-average depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarOrder {
    /// Autoregressive lag depth (p)
    pub ar: usize,
    /// Moving-average depth (q)
    pub ma: usize,
}

impl VarOrder {
    pub fn new(ar: usize, ma: usize) -> Self {
        Self { ar, ma }
    }
}

impl fmt::Display for VarOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.ar, self.ma)
    }
}

/// Descriptive statistics for one residual series.
#[derive(Debug, Clone)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesStats {
    fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                count: 0,
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        Self {
            count,
            mean,
            std: variance.sqrt(),
            min,
            max,
        }
    }
}

/// Parameter estimates and residuals produced by the estimation procedure.
///
/// Immutable after fitting; can be persisted with [`FittedVar::save`] and
/// reloaded with [`FittedVar::load`] instead of re-estimated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedVar {
    pub order: VarOrder,
    /// Series names, in equation order
    pub columns: Vec<String>,
    /// Intercept per equation
    pub intercept: Vec<f64>,
    /// `ar[l][i][j]`: coefficient of series j at lag l+1 in equation i
    pub ar: Vec<Vec<Vec<f64>>>,
    /// `ma[l][i][j]`: coefficient of residual j at lag l+1 in equation i
    pub ma: Vec<Vec<Vec<f64>>>,
    /// Residual covariance
    pub sigma: Vec<Vec<f64>>,
    /// Residuals aligned to training rows (zero before the first estimable
    /// row); empty when stripped on save
    pub residuals: Vec<Vec<f64>>,
    /// Training observations; empty when stripped on save
    pub train_data: Vec<Vec<f64>>,
    /// Observations used in estimation
    pub nobs: usize,
    pub log_likelihood: f64,
    pub aic: f64,
    /// Mean squared residual across all equations
    pub mse: f64,
}

impl FittedVar {
    /// Number of series.
    pub fn num_series(&self) -> usize {
        self.columns.len()
    }

    /// One-step in-sample predictions for the given row range of `data`.
    ///
    /// Rows without enough history for a lag term simply omit that term, so
    /// the earliest rows fall back towards the intercept.
    pub fn predict_rows(&self, data: &[Vec<f64>], rows: Range<usize>) -> Vec<Vec<f64>> {
        let k = self.num_series();
        let mut out = Vec::with_capacity(rows.len());

        for t in rows {
            if t >= data.len() {
                break;
            }
            let mut row = self.intercept.clone();
            for (l, coeff) in self.ar.iter().enumerate() {
                let lag = l + 1;
                if t < lag {
                    continue;
                }
                let previous = &data[t - lag];
                for i in 0..k {
                    for j in 0..k {
                        row[i] += coeff[i][j] * previous[j];
                    }
                }
            }
            for (l, coeff) in self.ma.iter().enumerate() {
                let lag = l + 1;
                if t < lag || self.residuals.len() <= t - lag {
                    continue;
                }
                let innovation = &self.residuals[t - lag];
                for i in 0..k {
                    for j in 0..k {
                        row[i] += coeff[i][j] * innovation[j];
                    }
                }
            }
            out.push(row);
        }

        out
    }

    /// Draw a stochastic trajectory of length `n` from the fitted
    /// parameters. `initial` seeds the autoregressive history (typically the
    /// tail of the training data); innovations are Gaussian with the
    /// residual covariance.
    pub fn simulate(&self, initial: &[Vec<f64>], n: usize, seed: u64) -> Result<Vec<Vec<f64>>> {
        let k = self.num_series();
        let chol = var::cholesky(&self.sigma).ok_or_else(|| {
            ForecastError::EstimationError(
                "Residual covariance is not positive definite".to_string(),
            )
        })?;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut history: Vec<Vec<f64>> = initial.to_vec();
        let mut innovations: Vec<Vec<f64>> = Vec::new();
        let mut out = Vec::with_capacity(n);

        for _ in 0..n {
            let z: Vec<f64> = (0..k).map(|_| rng.sample(rand_distr::StandardNormal)).collect();
            let noise: Vec<f64> = (0..k)
                .map(|i| (0..=i).map(|j| chol[i][j] * z[j]).sum())
                .collect();

            let mut row = self.intercept.clone();
            for (l, coeff) in self.ar.iter().enumerate() {
                if history.len() <= l {
                    continue;
                }
                let previous = &history[history.len() - 1 - l];
                for i in 0..k {
                    for j in 0..k {
                        row[i] += coeff[i][j] * previous[j];
                    }
                }
            }
            for (l, coeff) in self.ma.iter().enumerate() {
                if innovations.len() <= l {
                    continue;
                }
                let past = &innovations[innovations.len() - 1 - l];
                for i in 0..k {
                    for j in 0..k {
                        row[i] += coeff[i][j] * past[j];
                    }
                }
            }
            for i in 0..k {
                row[i] += noise[i];
            }

            history.push(row.clone());
            innovations.push(noise);
            out.push(row);
        }

        Ok(out)
    }

    /// Descriptive statistics of the residuals, per series.
    pub fn residual_stats(&self) -> Vec<(String, SeriesStats)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let series: Vec<f64> = self.residuals.iter().map(|row| row[i]).collect();
                (name.clone(), SeriesStats::from_values(&series))
            })
            .collect()
    }

    /// Persist the fitted state. `remove_data` strips the stored training
    /// data and residuals to reduce file size.
    pub fn save<P: AsRef<Path>>(&self, path: P, remove_data: bool) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path.as_ref())?);
        if remove_data {
            let mut stripped = self.clone();
            stripped.residuals.clear();
            stripped.train_data.clear();
            bincode::serialize_into(writer, &stripped)?;
        } else {
            bincode::serialize_into(writer, self)?;
        }
        Ok(())
    }

    /// Load a previously saved fitted state.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        bincode::deserialize_from(reader).map_err(Into::into)
    }

    /// Serialize the fitted state to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }
}

impl fmt::Display for FittedVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "VAR{} results: {} series, {} observations",
            self.order,
            self.num_series(),
            self.nobs
        )?;
        writeln!(
            f,
            "Log-likelihood: {:.4}  AIC: {:.4}  MSE: {:.6}",
            self.log_likelihood, self.aic, self.mse
        )?;

        for (i, name) in self.columns.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "Equation {}:", name)?;
            writeln!(f, "  {:<28}{:>14.6}", "const", self.intercept[i])?;
            for (l, coeff) in self.ar.iter().enumerate() {
                for (j, other) in self.columns.iter().enumerate() {
                    writeln!(
                        f,
                        "  {:<28}{:>14.6}",
                        format!("L{}.{}", l + 1, other),
                        coeff[i][j]
                    )?;
                }
            }
            for (l, coeff) in self.ma.iter().enumerate() {
                for (j, other) in self.columns.iter().enumerate() {
                    writeln!(
                        f,
                        "  {:<28}{:>14.6}",
                        format!("M{}.{}", l + 1, other),
                        coeff[i][j]
                    )?;
                }
            }
        }

        Ok(())
    }
}
