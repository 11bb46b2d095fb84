//! Error metrics for comparing predictions against ground truth

use crate::data::column_as_f64;
use crate::error::{ForecastError, Result};
use polars::prelude::DataFrame;

/// Accuracy metrics for one series.
#[derive(Debug, Clone)]
pub struct SeriesMetrics {
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Coefficient of determination
    pub r2: f64,
    /// MAE normalised by the observed range
    pub range_mape: f64,
}

impl std::fmt::Display for SeriesMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RMSE: {:.3}  MAE: {:.3}  R²: {:.3}  MAPE: {:.3}",
            self.rmse, self.mae, self.r2, self.range_mape
        )
    }
}

/// Evaluate predictions against actual values.
pub fn evaluate(predicted: &[f64], actual: &[f64]) -> Result<SeriesMetrics> {
    if predicted.len() != actual.len() || predicted.is_empty() {
        return Err(ForecastError::ValidationError(
            "Predicted and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = predicted.len() as f64;
    let errors: Vec<f64> = predicted
        .iter()
        .zip(actual.iter())
        .map(|(p, a)| a - p)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    let mean_actual = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
    let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
    // A constant actual series gives no variance to explain
    let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    let min_actual = actual.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max_actual = actual.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let range = max_actual - min_actual;
    let range_mape = if range > 0.0 { mae / range } else { f64::INFINITY };

    Ok(SeriesMetrics {
        rmse,
        mae,
        r2,
        range_mape,
    })
}

/// Evaluate every shared value column of two aligned frames.
pub fn evaluate_frames(
    predicted: &DataFrame,
    actual: &DataFrame,
    time_column: &str,
) -> Result<Vec<(String, SeriesMetrics)>> {
    let mut out = Vec::new();
    for name in actual.get_column_names() {
        if name == time_column || predicted.column(name).is_err() {
            continue;
        }
        let pred_values = column_as_f64(predicted, name)?;
        let actual_values = column_as_f64(actual, name)?;
        out.push((name.to_string(), evaluate(&pred_values, &actual_values)?));
    }
    Ok(out)
}
