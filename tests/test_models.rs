use forecast_power::data::{column_as_f64, DataLoader, Dataset};
use forecast_power::error::ForecastError;
use forecast_power::model::{OutputPaths, PredictOptions, VarModel};
use forecast_power::models::{VarEstimator, VarOrder};
use forecast_power::utils;
use polars::prelude::*;
use tempfile::TempDir;

// 2018-01-01 00:00:00 UTC
const T0: i64 = 1_514_764_800;

// Deterministic pseudo-noise, uniform-ish in [-0.5, 0.5)
fn jitter(i: usize) -> f64 {
    let h = (i as u64).wrapping_mul(2_654_435_761).wrapping_add(12_345) % 1000;
    h as f64 / 1000.0 - 0.5
}

fn hourly_dataset(n: usize) -> Dataset {
    let timestamps: Vec<i64> = (0..n as i64).map(|i| T0 + i * 3600).collect();
    let power: Vec<f64> = (0..n)
        .map(|i| 100.0 + 10.0 * (i as f64 * 0.4).sin() + 0.3 * i as f64 + 2.0 * jitter(i))
        .collect();
    let temp: Vec<f64> = (0..n)
        .map(|i| 15.0 + 5.0 * (i as f64 * 0.7).cos() + jitter(i + 7))
        .collect();

    let df = DataFrame::new(vec![
        Series::new("timestamp", timestamps),
        Series::new("power", power),
        Series::new("temp", temp),
    ])
    .unwrap();
    DataLoader::from_dataframe(df, "timestamp").unwrap()
}

fn temp_paths(dir: &TempDir) -> OutputPaths {
    OutputPaths {
        figures_dir: dir.path().join("figures"),
        models_dir: dir.path().join("models"),
    }
}

fn no_plot() -> PredictOptions {
    PredictOptions {
        plot: false,
        save_png: None,
    }
}

fn ts(dataset: &Dataset, row: usize) -> String {
    utils::format_timestamp(dataset.timestamps()[row], "%Y-%m-%d %H:%M:%S")
}

#[test]
fn test_ten_row_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = hourly_dataset(10);
    let mut model = VarModel::new(
        dataset.clone(),
        VarOrder::new(1, 0),
        0.7,
        None,
        temp_paths(&dir),
    )
    .unwrap();

    assert_eq!(model.train_set().len(), 7);
    assert_eq!(model.test_set().len(), 3);

    model.fit().unwrap();
    let (predicted, real) = model
        .predict(&ts(&dataset, 0), &ts(&dataset, 1), &no_plot())
        .unwrap();

    assert_eq!(predicted.height(), 2);
    assert_eq!(real.height(), 2);
    let mut names = predicted.get_column_names();
    names.sort_unstable();
    assert_eq!(names, vec!["power", "temp", "timestamp"]);
}

#[test]
fn test_fit_is_deterministic() {
    let dataset = hourly_dataset(80);
    let columns = dataset.value_columns();
    let data = dataset.values_matrix().unwrap();
    let estimator = VarEstimator::new(VarOrder::new(3, 0));

    let first = estimator.fit(&data, &columns).unwrap();
    let second = estimator.fit(&data, &columns).unwrap();

    assert_eq!(first.intercept, second.intercept);
    assert_eq!(first.ar, second.ar);
    assert_eq!(first.sigma, second.sigma);
    assert_eq!(first.aic, second.aic);
}

#[test]
fn test_zero_width_window_returns_single_row() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = hourly_dataset(30);
    let mut model = VarModel::new(
        dataset.clone(),
        VarOrder::new(2, 0),
        0.7,
        None,
        temp_paths(&dir),
    )
    .unwrap();
    model.fit().unwrap();

    let point = ts(&dataset, 5);
    let (predicted, real) = model.predict(&point, &point, &no_plot()).unwrap();
    assert_eq!(predicted.height(), 1);
    assert_eq!(real.height(), 1);
    assert_eq!(
        column_as_f64(&real, "power").unwrap(),
        vec![dataset.values_matrix().unwrap()[5][0]]
    );
}

#[test]
fn test_out_of_range_window_yields_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = hourly_dataset(30);
    let mut model = VarModel::new(
        dataset,
        VarOrder::new(1, 0),
        0.7,
        None,
        temp_paths(&dir),
    )
    .unwrap();
    model.fit().unwrap();

    let (predicted, real) = model
        .predict("2030-01-01 00:00:00", "2030-01-02 00:00:00", &no_plot())
        .unwrap();
    assert_eq!(predicted.height(), 0);
    assert_eq!(real.height(), 0);
}

#[test]
fn test_save_then_load_predicts_identically() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = hourly_dataset(60);
    let order = VarOrder::new(2, 0);

    let mut model = VarModel::new(dataset.clone(), order, 0.7, None, temp_paths(&dir)).unwrap();
    model.fit().unwrap();
    let (direct, _) = model
        .predict(&ts(&dataset, 10), &ts(&dataset, 20), &no_plot())
        .unwrap();
    let saved = model.save("var_test.bin", false).unwrap();

    let mut reloaded = VarModel::new(
        dataset.clone(),
        order,
        0.7,
        Some(saved),
        temp_paths(&dir),
    )
    .unwrap();
    reloaded.fit().unwrap();
    let (from_disk, _) = reloaded
        .predict(&ts(&dataset, 10), &ts(&dataset, 20), &no_plot())
        .unwrap();

    for name in ["power", "temp"] {
        let a = column_as_f64(&direct, name).unwrap();
        let b = column_as_f64(&from_disk, name).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-10);
        }
    }
}

#[test]
fn test_save_with_remove_data_strips_residuals() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = hourly_dataset(60);
    let order = VarOrder::new(2, 0);

    let mut model = VarModel::new(dataset.clone(), order, 0.7, None, temp_paths(&dir)).unwrap();
    model.fit().unwrap();
    let (direct, _) = model
        .predict(&ts(&dataset, 10), &ts(&dataset, 15), &no_plot())
        .unwrap();
    let saved = model.save("var_stripped.bin", true).unwrap();

    let mut reloaded =
        VarModel::new(dataset.clone(), order, 0.7, Some(saved), temp_paths(&dir)).unwrap();
    let fitted = reloaded.fit().unwrap();
    assert!(fitted.residuals.is_empty());
    assert!(fitted.train_data.is_empty());

    // Pure-AR predictions do not need the stored residuals
    let (from_disk, _) = reloaded
        .predict(&ts(&dataset, 10), &ts(&dataset, 15), &no_plot())
        .unwrap();
    let a = column_as_f64(&direct, "power").unwrap();
    let b = column_as_f64(&from_disk, "power").unwrap();
    for (x, y) in a.iter().zip(&b) {
        assert!((x - y).abs() < 1e-10);
    }
}

#[test]
fn test_moving_average_terms_fit_and_predict() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = hourly_dataset(120);
    let mut model = VarModel::new(
        dataset.clone(),
        VarOrder::new(1, 1),
        0.8,
        None,
        temp_paths(&dir),
    )
    .unwrap();
    let fitted = model.fit().unwrap();
    assert!(fitted.aic.is_finite());
    assert_eq!(fitted.ma.len(), 1);

    let (predicted, _) = model
        .predict(&ts(&dataset, 10), &ts(&dataset, 20), &no_plot())
        .unwrap();
    for value in column_as_f64(&predicted, "power").unwrap() {
        assert!(value.is_finite());
    }
}

#[test]
fn test_insufficient_data_is_rejected() {
    let dataset = hourly_dataset(5);
    let columns = dataset.value_columns();
    let data = dataset.values_matrix().unwrap();
    let estimator = VarEstimator::new(VarOrder::new(3, 0));

    assert!(matches!(
        estimator.fit(&data, &columns),
        Err(ForecastError::ValidationError(_))
    ));
}

#[test]
fn test_predict_before_fit_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = hourly_dataset(30);
    let model = VarModel::new(
        dataset,
        VarOrder::new(1, 0),
        0.7,
        None,
        temp_paths(&dir),
    )
    .unwrap();

    assert!(matches!(
        model.predict("2018-01-01 00:00:00", "2018-01-01 05:00:00", &no_plot()),
        Err(ForecastError::EstimationError(_))
    ));
}

#[test]
fn test_simulate_is_seeded() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = hourly_dataset(50);
    let mut model = VarModel::new(
        dataset,
        VarOrder::new(2, 0),
        0.8,
        None,
        temp_paths(&dir),
    )
    .unwrap();
    model.fit().unwrap();

    let first = model.simulate(10, 42).unwrap();
    let second = model.simulate(10, 42).unwrap();
    let other = model.simulate(10, 7).unwrap();

    assert_eq!(first.height(), 10);
    assert_eq!(
        column_as_f64(&first, "power").unwrap(),
        column_as_f64(&second, "power").unwrap()
    );
    assert_ne!(
        column_as_f64(&first, "power").unwrap(),
        column_as_f64(&other, "power").unwrap()
    );
}

#[test]
fn test_fitted_state_serializes_to_json() {
    let dataset = hourly_dataset(40);
    let estimator = VarEstimator::new(VarOrder::new(1, 0));
    let fitted = estimator
        .fit(&dataset.values_matrix().unwrap(), &dataset.value_columns())
        .unwrap();

    let json = fitted.to_json().unwrap();
    assert!(json.contains("\"power\""));
    assert!(json.contains("intercept"));
}
