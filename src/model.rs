//! VAR model wrapper: train/test split, fit, predict, simulate, summary

use crate::data::{column_as_f64, Dataset};
use crate::error::{ForecastError, Result};
use crate::metrics;
use crate::models::{FittedVar, VarEstimator, VarOrder};
use crate::plot::{self, ComparisonPanel};
use crate::utils;
use polars::prelude::{DataFrame, NamedFrom, Series};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Output locations, passed in explicitly instead of being embedded as
/// string templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPaths {
    /// Directory for rendered PNG plots
    pub figures_dir: PathBuf,
    /// Directory for persisted fitted models
    pub models_dir: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            figures_dir: PathBuf::from("scratch/figures/transparent"),
            models_dir: PathBuf::from("models/saved_models"),
        }
    }
}

/// Options for [`VarModel::predict`].
#[derive(Debug, Clone)]
pub struct PredictOptions {
    /// Render a comparison plot for the prediction window
    pub plot: bool,
    /// Plot file name under the configured figures directory; a default name
    /// is used when unset
    pub save_png: Option<String>,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            plot: true,
            save_png: None,
        }
    }
}

/// Wrapper around the VAR estimator for one dataset.
///
/// Holds the dataset, performs the train/test split at construction,
/// delegates estimation to [`VarEstimator`], and post-processes predictions
/// (inverse transform, metrics, plots). The estimator is a collaborator, not
/// a base class.
#[derive(Debug)]
pub struct VarModel {
    dataset: Dataset,
    order: VarOrder,
    train_set: Dataset,
    test_set: Dataset,
    load: Option<PathBuf>,
    paths: OutputPaths,
    estimator: VarEstimator,
    fitted: Option<FittedVar>,
}

impl VarModel {
    /// Build a model over `dataset`, splitting off the first
    /// `train_fraction` of rows for estimation. When `load` is given,
    /// [`VarModel::fit`] deserializes fitted state from that path instead of
    /// estimating.
    pub fn new(
        dataset: Dataset,
        order: VarOrder,
        train_fraction: f64,
        load: Option<PathBuf>,
        paths: OutputPaths,
    ) -> Result<Self> {
        let (train_set, test_set) = dataset.split(train_fraction)?;
        info!(
            "train and test set created: {} / {} rows",
            train_set.len(),
            test_set.len()
        );

        Ok(Self {
            dataset,
            order,
            train_set,
            test_set,
            load,
            paths,
            estimator: VarEstimator::new(order),
            fitted: None,
        })
    }

    pub fn order(&self) -> VarOrder {
        self.order
    }

    pub fn train_set(&self) -> &Dataset {
        &self.train_set
    }

    pub fn test_set(&self) -> &Dataset {
        &self.test_set
    }

    pub fn fitted(&self) -> Option<&FittedVar> {
        self.fitted.as_ref()
    }

    fn fitted_state(&self) -> Result<&FittedVar> {
        self.fitted.as_ref().ok_or_else(|| {
            ForecastError::EstimationError("Model has not been fitted".to_string())
        })
    }

    /// Fit the model: deserialize saved state when a load path was given,
    /// otherwise estimate over the training partition.
    pub fn fit(&mut self) -> Result<&FittedVar> {
        if let Some(path) = &self.load {
            let fitted = FittedVar::load(path)?;
            info!("model loaded from {}", path.display());
            return Ok(self.fitted.insert(fitted));
        }

        let columns = self.train_set.value_columns();
        let data = self.train_set.values_matrix()?;
        let fitted = self.estimator.fit(&data, &columns)?;
        info!("trained and fit");
        Ok(self.fitted.insert(fitted))
    }

    /// In-sample predictions for a date range within the training partition.
    ///
    /// Returns `(predicted, real)` frames aligned on timestamp and mapped
    /// back to physical units. The window is not bounds-checked: timestamps
    /// outside the training index simply yield fewer (possibly zero) rows.
    pub fn predict(
        &self,
        start: &str,
        end: &str,
        options: &PredictOptions,
    ) -> Result<(DataFrame, DataFrame)> {
        let fitted = self.fitted_state()?;
        let start_ts = utils::parse_timestamp(start)?;
        let end_ts = utils::parse_timestamp(end)?;

        let timestamps = self.train_set.timestamps();
        let lo = timestamps.partition_point(|&t| t < start_ts);
        let hi = timestamps.partition_point(|&t| t <= end_ts);

        let data = self.train_set.values_matrix()?;
        let predictions = fitted.predict_rows(&data, lo..hi);

        let real = self.train_set.slice(lo, hi.saturating_sub(lo));
        let columns = self.train_set.value_columns();
        let time_column = self.train_set.time_column();

        // Align the prediction index with the ground-truth slice
        let mut series = vec![real.dataframe().column(time_column)?.clone()];
        for (j, name) in columns.iter().enumerate() {
            let values: Vec<f64> = predictions.iter().map(|row| row[j]).collect();
            series.push(Series::new(name, values));
        }
        let predicted = DataFrame::new(series)?;

        let predicted = self.dataset.inverse_transform(&predicted)?;
        let real = self.dataset.inverse_transform(real.dataframe())?;

        if predicted.height() == 0 {
            info!("prediction window {} to {} matched no rows", start, end);
            return Ok((predicted, real));
        }

        let per_series = metrics::evaluate_frames(&predicted, &real, time_column)?;
        for (name, series_metrics) in &per_series {
            info!("RMSE {}: {}", name, series_metrics.rmse);
        }

        if options.plot {
            let window = crate::data::column_as_i64(&real, time_column)?;
            let panels = build_panels(&predicted, &real, &per_series)?;
            let file_name = options
                .save_png
                .clone()
                .unwrap_or_else(|| "real_v_pred.png".to_string());
            let path = self.paths.figures_dir.join(file_name);
            plot::comparison_png(&path, &window, &panels)?;
            info!("comparison plot saved to {}", path.display());
        }

        Ok((predicted, real))
    }

    /// Draw a stochastic trajectory of length `n` from the fitted model,
    /// seeded for reproducibility. The autoregressive history starts from
    /// the tail of the training partition.
    pub fn simulate(&self, n: usize, seed: u64) -> Result<DataFrame> {
        let fitted = self.fitted_state()?;
        let data = self.train_set.values_matrix()?;
        let depth = fitted.order.ar.min(data.len());
        let initial = &data[data.len() - depth..];

        let trajectory = fitted.simulate(initial, n, seed)?;
        let columns = self.train_set.value_columns();
        let mut series = Vec::with_capacity(columns.len());
        for (j, name) in columns.iter().enumerate() {
            let values: Vec<f64> = trajectory.iter().map(|row| row[j]).collect();
            series.push(Series::new(name, values));
        }
        DataFrame::new(series).map_err(Into::into)
    }

    /// Log information-criterion and error summaries, print the parameter
    /// table and residual statistics, and render residual diagnostics per
    /// output series.
    pub fn summary(&self) -> Result<()> {
        let fitted = self.fitted_state()?;
        info!("AIC: {}", fitted.aic);
        info!("total MSE: {}", fitted.mse);
        println!("{}", fitted);

        if fitted.residuals.is_empty() {
            info!("residuals were stripped on save; skipping residual diagnostics");
            return Ok(());
        }

        println!("Residuals:");
        println!(
            "  {:<28}{:>8}{:>14}{:>14}{:>14}{:>14}",
            "series", "count", "mean", "std", "min", "max"
        );
        for (name, stats) in fitted.residual_stats() {
            println!(
                "  {:<28}{:>8}{:>14.6}{:>14.6}{:>14.6}{:>14.6}",
                name, stats.count, stats.mean, stats.std, stats.min, stats.max
            );
        }

        for (i, name) in fitted.columns.iter().enumerate() {
            let residuals: Vec<f64> = fitted.residuals.iter().map(|row| row[i]).collect();
            let path = self
                .paths
                .figures_dir
                .join(format!("residuals_{}.png", sanitize_file_name(name)));
            plot::residual_png(&path, name, self.order, &residuals)?;
            info!("residual plot saved to {}", path.display());
        }

        Ok(())
    }

    /// Persist the fitted state under the configured models directory.
    pub fn save(&self, filename: &str, remove_data: bool) -> Result<PathBuf> {
        let fitted = self.fitted_state()?;
        let path = self.paths.models_dir.join(filename);
        fitted.save(&path, remove_data)?;
        info!("model saved to {}", path.display());
        Ok(path)
    }
}

fn build_panels(
    predicted: &DataFrame,
    real: &DataFrame,
    per_series: &[(String, metrics::SeriesMetrics)],
) -> Result<Vec<ComparisonPanel>> {
    let mut panels = Vec::with_capacity(per_series.len());
    for (name, series_metrics) in per_series {
        let mut real_values = column_as_f64(real, name)?;
        let mut pred_values = column_as_f64(predicted, name)?;
        // Power readings are stored in W; plot them in kW
        if name.starts_with("max_power") {
            for value in real_values.iter_mut().chain(pred_values.iter_mut()) {
                *value /= 1000.0;
            }
        }
        panels.push(ComparisonPanel {
            column: name.clone(),
            real: real_values,
            predicted: pred_values,
            metrics: series_metrics.clone(),
        });
    }
    Ok(panels)
}

fn sanitize_file_name(column: &str) -> String {
    column
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
