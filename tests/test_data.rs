use forecast_power::data::{column_as_f64, DataLoader, Dataset, Lag};
use forecast_power::error::ForecastError;
use polars::prelude::*;
use rstest::rstest;
use std::io::Write;

// 2018-01-01 00:00:00 UTC
const T0: i64 = 1_514_764_800;

fn hourly_dataset(n: usize) -> Dataset {
    let timestamps: Vec<i64> = (0..n as i64).map(|i| T0 + i * 3600).collect();
    let power: Vec<f64> = (0..n)
        .map(|i| 100.0 + i as f64 + 10.0 * (i as f64 * 0.5).sin())
        .collect();
    let temp: Vec<f64> = (0..n)
        .map(|i| 15.0 + 5.0 * (i as f64 * 0.26).cos())
        .collect();

    let df = DataFrame::new(vec![
        Series::new("timestamp", timestamps),
        Series::new("power", power),
        Series::new("temp", temp),
    ])
    .unwrap();
    DataLoader::from_dataframe(df, "timestamp").unwrap()
}

#[rstest]
#[case(10, 0.7, 7)]
#[case(5, 0.5, 2)]
#[case(10, 0.33, 3)]
#[case(8, 1.0, 8)]
fn test_split_sizes(#[case] n: usize, #[case] fraction: f64, #[case] expected_train: usize) {
    let dataset = hourly_dataset(n);
    let (train, test) = dataset.split(fraction).unwrap();

    assert_eq!(train.len(), expected_train);
    assert_eq!(test.len(), n - expected_train);
}

#[test]
fn test_split_is_contiguous_and_ordered() {
    let dataset = hourly_dataset(20);
    let (train, test) = dataset.split(0.6).unwrap();

    let mut combined = train.timestamps();
    combined.extend(test.timestamps());
    assert_eq!(combined, dataset.timestamps());

    let train_values = train.values_matrix().unwrap();
    let test_values = test.values_matrix().unwrap();
    let all_values = dataset.values_matrix().unwrap();
    let recombined: Vec<Vec<f64>> = train_values.into_iter().chain(test_values).collect();
    assert_eq!(recombined, all_values);
}

#[rstest]
#[case(0.0)]
#[case(-0.2)]
#[case(1.5)]
fn test_split_rejects_bad_fraction(#[case] fraction: f64) {
    let dataset = hourly_dataset(10);
    assert!(matches!(
        dataset.split(fraction),
        Err(ForecastError::ValidationError(_))
    ));
}

#[test]
fn test_transform_round_trip() {
    let dataset = hourly_dataset(60);
    let stationary = dataset.transform(&[Lag::Hour, Lag::Day], false).unwrap();

    // One hour lag and one day lag trim 25 rows
    assert_eq!(stationary.len(), 35);
    assert_eq!(stationary.timestamps(), dataset.timestamps()[25..].to_vec());

    let recovered = stationary
        .inverse_transform(stationary.dataframe())
        .unwrap();
    let original = dataset.values_matrix().unwrap();
    for (name_idx, name) in ["power", "temp"].iter().enumerate() {
        let values = column_as_f64(&recovered, name).unwrap();
        for (row, value) in values.iter().enumerate() {
            let expected = original[row + 25][name_idx];
            assert!(
                (value - expected).abs() < 1e-9,
                "{} row {}: {} != {}",
                name,
                row,
                value,
                expected
            );
        }
    }
}

#[test]
fn test_transform_round_trip_with_scaling() {
    let dataset = hourly_dataset(40);
    let stationary = dataset.transform(&[Lag::Hour], true).unwrap();

    let recovered = stationary
        .inverse_transform(stationary.dataframe())
        .unwrap();
    let original = dataset.values_matrix().unwrap();
    let values = column_as_f64(&recovered, "power").unwrap();
    for (row, value) in values.iter().enumerate() {
        assert!((value - original[row + 1][0]).abs() < 1e-9);
    }
}

#[test]
fn test_transform_rejects_short_dataset() {
    let dataset = hourly_dataset(10);
    assert!(matches!(
        dataset.transform(&[Lag::Hour, Lag::Day], false),
        Err(ForecastError::ValidationError(_))
    ));
}

#[test]
fn test_csv_loading_parses_and_sorts_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "validdate,max_power").unwrap();
    writeln!(file, "2018-01-01 02:00:00,30").unwrap();
    writeln!(file, "2018-01-01 00:00:00,10").unwrap();
    writeln!(file, "2018-01-01 01:00:00,20").unwrap();
    drop(file);

    let dataset = DataLoader::from_csv(&path).unwrap();
    assert_eq!(dataset.time_column(), "validdate");
    assert_eq!(
        dataset.timestamps(),
        vec![T0, T0 + 3600, T0 + 7200]
    );
    assert_eq!(
        column_as_f64(dataset.dataframe(), "max_power").unwrap(),
        vec![10.0, 20.0, 30.0]
    );
}

#[test]
fn test_inner_join_keeps_shared_timestamps() {
    let left = hourly_dataset(10);
    let right = {
        let timestamps: Vec<i64> = (5..15).map(|i| T0 + i * 3600).collect();
        let output: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let df = DataFrame::new(vec![
            Series::new("timestamp", timestamps),
            Series::new("max_power", output),
        ])
        .unwrap();
        DataLoader::from_dataframe(df, "timestamp").unwrap()
    };

    let joined = left.inner_join(&right).unwrap();
    assert_eq!(joined.len(), 5);
    assert_eq!(
        joined.timestamps(),
        (5..10).map(|i| T0 + i * 3600).collect::<Vec<i64>>()
    );
    assert_eq!(
        joined.value_columns(),
        vec!["power".to_string(), "temp".to_string(), "max_power".to_string()]
    );
}

#[test]
fn test_periodogram_finds_dominant_cycle() {
    let n = 64;
    let timestamps: Vec<i64> = (0..n as i64).map(|i| T0 + i * 3600).collect();
    let wave: Vec<f64> = (0..n)
        .map(|t| (2.0 * std::f64::consts::PI * t as f64 / 8.0).sin())
        .collect();
    let df = DataFrame::new(vec![
        Series::new("timestamp", timestamps),
        Series::new("power", wave),
    ])
    .unwrap();
    let dataset = DataLoader::from_dataframe(df, "timestamp").unwrap();

    let (frequencies, power) = dataset.periodogram("power").unwrap();
    let dominant = power
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
        .map(|(idx, _)| frequencies[idx])
        .unwrap();
    assert!((dominant - 0.125).abs() < 0.01);
}

#[test]
fn test_drop_and_rename_columns() {
    let mut dataset = hourly_dataset(10);
    dataset.rename("power", "max_power").unwrap();
    dataset.drop_columns(&["temp"]).unwrap();

    assert_eq!(dataset.value_columns(), vec!["max_power".to_string()]);
}
