//! Least-squares VAR estimation
//!
//! Each equation regresses one series on a constant, the lagged values of
//! all series, and (for moving-average terms) lagged residuals. The normal
//! equations share one design matrix and are solved by Cholesky
//! decomposition. With no moving-average terms a single pass is conditional
//! maximum likelihood; with them, residual regressors are refined
//! iteratively up to a bounded iteration count.

use crate::error::{ForecastError, Result};
use crate::models::{FittedVar, VarOrder};
use tracing::warn;

/// Small diagonal ridge for numerical stability of the normal equations.
const RIDGE: f64 = 1e-8;

/// Maximum-likelihood VAR estimator.
#[derive(Debug, Clone)]
pub struct VarEstimator {
    order: VarOrder,
    max_iter: usize,
    tol: f64,
}

impl VarEstimator {
    pub fn new(order: VarOrder) -> Self {
        Self {
            order,
            max_iter: 1000,
            tol: 1e-8,
        }
    }

    /// Override the iteration cap for moving-average refinement.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn order(&self) -> VarOrder {
        self.order
    }

    /// Estimate parameters over `data` (row-major, one column per series).
    ///
    /// Non-convergence within the iteration cap is reported as a warning,
    /// not an error; the last iterate is returned.
    pub fn fit(&self, data: &[Vec<f64>], columns: &[String]) -> Result<FittedVar> {
        let k = columns.len();
        let n = data.len();
        let p = self.order.ar;
        let q = self.order.ma;

        if k == 0 {
            return Err(ForecastError::DataError(
                "Cannot fit a VAR model with no series".to_string(),
            ));
        }
        if data.iter().any(|row| row.len() != k) {
            return Err(ForecastError::DataError(
                "Observation rows do not match the series count".to_string(),
            ));
        }

        let start = p.max(q);
        let num_params = 1 + k * (p + q);
        if n <= start + num_params {
            return Err(ForecastError::ValidationError(format!(
                "Insufficient data for VAR{}: need at least {} observations, got {}",
                self.order,
                start + num_params + 1,
                n
            )));
        }
        let t_obs = n - start;

        let mut residuals = vec![vec![0.0; k]; n];
        let mut coeffs: Vec<Vec<f64>> = vec![vec![0.0; num_params]; k];
        let mut converged = false;

        for _ in 0..self.max_iter {
            // Normal equations over the shared design matrix
            let mut xtx = vec![vec![0.0; num_params]; num_params];
            let mut xty = vec![vec![0.0; num_params]; k];
            for t in start..n {
                let z = regressor_row(data, &residuals, t, p, q);
                for a in 0..num_params {
                    for b in 0..num_params {
                        xtx[a][b] += z[a] * z[b];
                    }
                    for i in 0..k {
                        xty[i][a] += z[a] * data[t][i];
                    }
                }
            }
            for a in 0..num_params {
                xtx[a][a] += RIDGE;
            }

            let chol = cholesky(&xtx).ok_or_else(|| {
                ForecastError::EstimationError("Design matrix is singular".to_string())
            })?;
            let new_coeffs: Vec<Vec<f64>> =
                (0..k).map(|i| chol_solve(&chol, &xty[i])).collect();

            let delta = new_coeffs
                .iter()
                .flatten()
                .zip(coeffs.iter().flatten())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0_f64, f64::max);
            coeffs = new_coeffs;

            // Refresh residuals against the regressors used in this pass
            let mut new_residuals = vec![vec![0.0; k]; n];
            for t in start..n {
                let z = regressor_row(data, &residuals, t, p, q);
                for i in 0..k {
                    let fitted: f64 = coeffs[i].iter().zip(&z).map(|(c, x)| c * x).sum();
                    new_residuals[t][i] = data[t][i] - fitted;
                }
            }
            residuals = new_residuals;

            // Pure-AR estimation needs no refinement
            if q == 0 || delta < self.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                "VAR{} estimation did not converge within {} iterations",
                self.order, self.max_iter
            );
        }

        // Unpack per-equation coefficient vectors into matrices
        let mut intercept = vec![0.0; k];
        let mut ar = vec![vec![vec![0.0; k]; k]; p];
        let mut ma = vec![vec![vec![0.0; k]; k]; q];
        for i in 0..k {
            intercept[i] = coeffs[i][0];
            for l in 0..p {
                for j in 0..k {
                    ar[l][i][j] = coeffs[i][1 + l * k + j];
                }
            }
            for l in 0..q {
                for j in 0..k {
                    ma[l][i][j] = coeffs[i][1 + p * k + l * k + j];
                }
            }
        }

        let mut sigma = vec![vec![0.0; k]; k];
        for t in start..n {
            for i in 0..k {
                for j in 0..k {
                    sigma[i][j] += residuals[t][i] * residuals[t][j];
                }
            }
        }
        for row in &mut sigma {
            for value in row.iter_mut() {
                *value /= t_obs as f64;
            }
        }

        let mse = residuals[start..]
            .iter()
            .flatten()
            .map(|e| e * e)
            .sum::<f64>()
            / (k * t_obs) as f64;

        // Gaussian log-likelihood from the residual covariance determinant
        let log_likelihood = match cholesky(&sigma) {
            Some(chol) => {
                let ln_det: f64 = chol.iter().enumerate().map(|(i, row)| 2.0 * row[i].ln()).sum();
                -0.5 * t_obs as f64
                    * (k as f64 * (2.0 * std::f64::consts::PI).ln() + ln_det + k as f64)
            }
            None => {
                warn!("residual covariance is singular; log-likelihood unavailable");
                f64::NAN
            }
        };
        let total_params = k * num_params + k * (k + 1) / 2;
        let aic = -2.0 * log_likelihood + 2.0 * total_params as f64;

        Ok(FittedVar {
            order: self.order,
            columns: columns.to_vec(),
            intercept,
            ar,
            ma,
            sigma,
            residuals,
            train_data: data.to_vec(),
            nobs: t_obs,
            log_likelihood,
            aic,
            mse,
        })
    }
}

/// Regressor vector for row `t`: constant, lagged values, lagged residuals.
fn regressor_row(
    data: &[Vec<f64>],
    residuals: &[Vec<f64>],
    t: usize,
    p: usize,
    q: usize,
) -> Vec<f64> {
    let k = data[0].len();
    let mut z = Vec::with_capacity(1 + k * (p + q));
    z.push(1.0);
    for lag in 1..=p {
        z.extend_from_slice(&data[t - lag]);
    }
    for lag in 1..=q {
        z.extend_from_slice(&residuals[t - lag]);
    }
    z
}

/// Lower-triangular Cholesky factor of a symmetric positive definite matrix.
pub(crate) fn cholesky(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for m in 0..j {
                sum -= l[i][m] * l[j][m];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    Some(l)
}

/// Solve `L L' x = b` by forward and back substitution.
pub(crate) fn chol_solve(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in i + 1..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }
    x
}
