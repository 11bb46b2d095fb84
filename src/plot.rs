//! PNG rendering of comparison, residual, and spectrum plots

use crate::data::Dataset;
use crate::error::{ForecastError, Result};
use crate::metrics::SeriesMetrics;
use crate::models::VarOrder;
use crate::utils;
use plotters::prelude::*;
use statrs::distribution::{Continuous, Normal};
use std::path::Path;

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// One panel of a real-vs-predicted comparison plot.
#[derive(Debug, Clone)]
pub struct ComparisonPanel {
    pub column: String,
    pub real: Vec<f64>,
    pub predicted: Vec<f64>,
    pub metrics: SeriesMetrics,
}

/// Panel title and unit label for the known weather and power columns.
pub fn series_label(column: &str) -> (String, String) {
    let known: &[(&str, &str, &str)] = &[
        ("max_power_gym", "Power Output Gym Dataset", "Output (kW)"),
        ("max_power_johnson", "Power Output Johnson Dataset", "Output (kW)"),
        ("max_power", "Power Output", "Output (kW)"),
        ("t_2m:C", "Temperature", "Degrees Celsius"),
        ("global_rad:W", "Global Irradiance", "Irradiance (W/m2)"),
        ("effective_cloud_cover:p", "Effective Cloud Cover", "Percent"),
        ("precip_1h:mm", "Precipitation", "mm/hr"),
    ];
    for (name, title, unit) in known {
        if column == *name {
            return ((*title).to_string(), (*unit).to_string());
        }
    }
    (column.to_string(), "Value".to_string())
}

/// Render a multi-panel real-vs-predicted comparison to PNG, one panel per
/// series, with error metrics in each caption.
pub fn comparison_png<P: AsRef<Path>>(
    path: P,
    timestamps: &[i64],
    panels: &[ComparisonPanel],
) -> Result<()> {
    if panels.is_empty() || timestamps.is_empty() {
        return Err(ForecastError::ValidationError(
            "Nothing to plot: empty prediction window".to_string(),
        ));
    }
    ensure_parent(path.as_ref())?;
    draw_comparison(path.as_ref(), timestamps, panels)
        .map_err(|e| ForecastError::PlotError(e.to_string()))
}

fn draw_comparison(path: &Path, timestamps: &[i64], panels: &[ComparisonPanel]) -> DrawResult {
    let height = 220 * panels.len() as u32;
    let root = BitMapBackend::new(path, (1600, height)).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((panels.len(), 1));

    let x_min = timestamps[0];
    let x_max = timestamps[timestamps.len() - 1].max(x_min + 1);

    for (idx, (panel, area)) in panels.iter().zip(areas.iter()).enumerate() {
        let (title, unit) = series_label(&panel.column);
        let caption = format!(
            "{} | RMSE: {:.3}  R2: {:.3}  MAPE: {:.3}",
            title, panel.metrics.rmse, panel.metrics.r2, panel.metrics.range_mape
        );

        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for value in panel.real.iter().chain(panel.predicted.iter()) {
            y_min = y_min.min(*value);
            y_max = y_max.max(*value);
        }
        if !(y_max > y_min) {
            y_min -= 1.0;
            y_max += 1.0;
        }
        // Headroom for the legend and caption
        y_max += 0.4 * (y_max - y_min);

        let mut chart = ChartBuilder::on(area)
            .caption(caption, ("sans-serif", 18))
            .margin(8)
            .x_label_area_size(28)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_labels(8)
            .x_label_formatter(&|ts| utils::format_timestamp(*ts, "%H:%M"))
            .y_desc(unit)
            .draw()?;

        let real_points = timestamps.iter().zip(&panel.real).map(|(&t, &v)| (t, v));
        let pred_points = timestamps
            .iter()
            .zip(&panel.predicted)
            .map(|(&t, &v)| (t, v));

        if idx == 0 {
            chart
                .draw_series(LineSeries::new(real_points, &BLUE))?
                .label("Real")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
            chart
                .draw_series(LineSeries::new(pred_points, &RED))?
                .label("Predicted")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()?;
        } else {
            chart.draw_series(LineSeries::new(real_points, &BLUE))?;
            chart.draw_series(LineSeries::new(pred_points, &RED))?;
        }
    }

    root.present()?;
    Ok(())
}

/// Render the residual time series and a kernel density estimate of the
/// residual distribution for one output series.
pub fn residual_png<P: AsRef<Path>>(
    path: P,
    column: &str,
    order: VarOrder,
    residuals: &[f64],
) -> Result<()> {
    if residuals.is_empty() {
        return Err(ForecastError::ValidationError(format!(
            "No residuals available for '{}'",
            column
        )));
    }
    ensure_parent(path.as_ref())?;
    draw_residuals(path.as_ref(), column, order, residuals)
        .map_err(|e| ForecastError::PlotError(e.to_string()))
}

fn draw_residuals(path: &Path, column: &str, order: VarOrder, residuals: &[f64]) -> DrawResult {
    let root = BitMapBackend::new(path, (1200, 420)).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((1, 2));

    let n = residuals.len();
    let mut y_min = residuals.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let mut y_max = residuals.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if !(y_max > y_min) {
        y_min -= 1.0;
        y_max += 1.0;
    }

    let mut series_chart = ChartBuilder::on(&areas[0])
        .caption(
            format!("Residuals for VAR model order {}", order),
            ("sans-serif", 16),
        )
        .margin(8)
        .x_label_area_size(28)
        .y_label_area_size(55)
        .build_cartesian_2d(0.0..n as f64, y_min..y_max)?;
    series_chart.configure_mesh().y_desc(column).draw()?;
    series_chart.draw_series(LineSeries::new(
        residuals.iter().enumerate().map(|(i, &v)| (i as f64, v)),
        &BLUE,
    ))?;

    // Gaussian kernel density with Silverman's bandwidth
    let mean = residuals.iter().sum::<f64>() / n as f64;
    let variance = residuals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let std = variance.sqrt();
    let bandwidth = if std > 0.0 {
        1.06 * std * (n as f64).powf(-0.2)
    } else {
        1.0
    };
    let kernel = Normal::new(0.0, 1.0)?;

    let lo = y_min - 3.0 * bandwidth;
    let hi = y_max + 3.0 * bandwidth;
    let grid: Vec<f64> = (0..200)
        .map(|i| lo + (hi - lo) * i as f64 / 199.0)
        .collect();
    let density: Vec<f64> = grid
        .iter()
        .map(|x| {
            residuals
                .iter()
                .map(|v| kernel.pdf((x - v) / bandwidth))
                .sum::<f64>()
                / (n as f64 * bandwidth)
        })
        .collect();
    let d_max = density.iter().fold(0.0_f64, |a, &b| a.max(b)).max(1e-12);

    let mut density_chart = ChartBuilder::on(&areas[1])
        .caption(
            format!("KDE of residuals of VAR model order {}", order),
            ("sans-serif", 16),
        )
        .margin(8)
        .x_label_area_size(28)
        .y_label_area_size(55)
        .build_cartesian_2d(lo..hi, 0.0..d_max * 1.1)?;
    density_chart.configure_mesh().x_desc(column).draw()?;
    density_chart.draw_series(LineSeries::new(
        grid.iter().zip(&density).map(|(&x, &d)| (x, d)),
        &BLUE,
    ))?;
    density_chart.draw_series(LineSeries::new(
        vec![(mean, 0.0), (mean, d_max)],
        &RED,
    ))?;
    density_chart.draw_series(std::iter::once(Text::new(
        format!("{:0.3e}", mean),
        (mean, d_max),
        ("sans-serif", 14),
    )))?;

    root.present()?;
    Ok(())
}

/// Render raw and stationarised periodograms side by side, one row per
/// shared series.
pub fn spectrum_png<P: AsRef<Path>>(path: P, raw: &Dataset, stationary: &Dataset) -> Result<()> {
    let columns: Vec<String> = stationary
        .value_columns()
        .into_iter()
        .filter(|name| raw.dataframe().column(name).is_ok())
        .collect();
    if columns.is_empty() {
        return Err(ForecastError::ValidationError(
            "No shared columns between raw and stationary datasets".to_string(),
        ));
    }

    let mut panels = Vec::with_capacity(columns.len());
    for name in &columns {
        let raw_spectrum = raw.periodogram(name)?;
        let stationary_spectrum = stationary.periodogram(name)?;
        panels.push((name.clone(), raw_spectrum, stationary_spectrum));
    }

    ensure_parent(path.as_ref())?;
    draw_spectrum(path.as_ref(), &panels).map_err(|e| ForecastError::PlotError(e.to_string()))
}

type SpectrumPanel = (String, (Vec<f64>, Vec<f64>), (Vec<f64>, Vec<f64>));

fn draw_spectrum(path: &Path, panels: &[SpectrumPanel]) -> DrawResult {
    let height = 200 * panels.len() as u32;
    let root = BitMapBackend::new(path, (1400, height)).into_drawing_area();
    root.fill(&WHITE)?;
    let areas = root.split_evenly((panels.len(), 2));

    for (row, (column, raw, stationary)) in panels.iter().enumerate() {
        for (side, (frequencies, power)) in [raw, stationary].into_iter().enumerate() {
            let area = &areas[row * 2 + side];
            let p_max = power.iter().fold(0.0_f64, |a, &b| a.max(b)).max(1e-12);
            let caption = if row == 0 {
                let header = if side == 0 { "Raw Data" } else { "Stationarized Data" };
                format!("{}: {}", header, column)
            } else {
                column.clone()
            };

            let mut chart = ChartBuilder::on(area)
                .caption(caption, ("sans-serif", 15))
                .margin(6)
                .x_label_area_size(25)
                .y_label_area_size(55)
                .build_cartesian_2d(0.0..0.5, 0.0..p_max * 1.05)?;
            chart
                .configure_mesh()
                .x_desc("Frequency (cycles/sample)")
                .draw()?;
            chart.draw_series(LineSeries::new(
                frequencies.iter().zip(power).map(|(&f, &p)| (f, p)),
                &BLUE,
            ))?;
        }
    }

    root.present()?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
