//! Entry script: fit a VAR model to merged power and weather history and
//! report in-sample forecast quality.

use forecast_power::data::{DataLoader, Lag};
use forecast_power::model::{OutputPaths, PredictOptions, VarModel};
use forecast_power::models::VarOrder;
use forecast_power::{plot, utils, Result};
use tracing::info;

const WEATHER_FILE: &str = "data/4Y_Historical.csv";
const GYM_POWER_FILE: &str = "data/gym_from_2010_04_06_to_2020_12_31.csv";
const JOHNSON_POWER_FILE: &str = "data/maabarot_johnson_from_2010_04_22_to_2020_12_31.csv";

/// Irradiance components are collinear with global irradiance and are not
/// modelled.
const DROPPED_COLUMNS: &[&str] = &["diffuse_rad:W", "direct_rad:W"];

fn main() -> Result<()> {
    let _guard = utils::init_logging("logs")?;
    let paths = OutputPaths::default();

    // Weather plus per-site power readings
    let gym = DataLoader::merged(WEATHER_FILE, GYM_POWER_FILE)?;
    let johnson = DataLoader::merged(WEATHER_FILE, JOHNSON_POWER_FILE)?;

    // Two-site power table, kept for cross-site runs
    let mut gym_power = gym.clone();
    gym_power.rename("max_power", "max_power_gym")?;
    let mut johnson_power = johnson.clone();
    johnson_power.rename("max_power", "max_power_johnson")?;
    let gym_johnson = gym_power.inner_join(&johnson_power)?;
    info!(
        "joined gym and johnson sites: {} rows, {} series",
        gym_johnson.len(),
        gym_johnson.value_columns().len()
    );

    // Stationarise the modelled dataset: hour and day differencing, no
    // resampling, no scaling
    let mut modelled = gym.clone();
    modelled.cast_float("max_power")?;
    let mut stationary = modelled.transform(&[Lag::Hour, Lag::Day], false)?;
    stationary.drop_columns(DROPPED_COLUMNS)?;

    let spectrum_path = paths.figures_dir.join("fft_raw_v_stationary.png");
    plot::spectrum_png(&spectrum_path, &modelled, &stationary)?;
    info!("spectrum plot saved to {}", spectrum_path.display());

    let save_name = "gym";
    let order = VarOrder::new(10, 0);
    let model_file = format!("var_{}_{}.bin", save_name, order.ar);

    // Reuse a previously saved fit when one exists
    let saved = paths.models_dir.join(&model_file);
    let load = saved.exists().then(|| saved.clone());

    let mut model = VarModel::new(stationary, order, 0.7, load, paths)?;
    model.fit()?;
    model.predict(
        "2018-01-03 01:00:00",
        "2018-01-04 01:00:00",
        &PredictOptions {
            plot: true,
            save_png: Some(format!("real_v_pred_{}_{}.png", save_name, order.ar)),
        },
    )?;
    model.summary()?;
    model.save(&model_file, false)?;

    Ok(())
}
