//! Ordinary Kriging interpolation
//!
//! Best Linear Unbiased Estimator (BLUE) for spatial data. The kriging
//! system for n samples is
//! ```text
//! [γ(x₁,x₁) ... γ(x₁,xₙ) 1] [λ₁]   [γ(x₁,x₀)]
//! [   ...     ...    ...   .] [..] = [   ...   ]
//! [γ(xₙ,x₁) ... γ(xₙ,xₙ) 1] [λₙ]   [γ(xₙ,x₀)]
//! [  1       ...    1      0] [μ ]   [    1    ]
//! ```
//! Every sample enters every estimate, so the matrix does not depend on
//! x₀. It is solved once against `[z; 0]` (the dual form) and the
//! estimate at any location becomes a dot product:
//! ```text
//! z*(x₀) = Σ wᵢ·γ(xᵢ,x₀) + w₀
//! ```
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use crate::maybe_rayon::*;
use soilmap_core::{Error, Raster, Result};
use tracing::debug;

use super::engine::Estimator;
use super::variogram::{default_lag_count, empirical_variogram, fit_variogram, FittedVariogram, VariogramModel};
use super::{InterpolationGrid, SamplePoint};

/// Default cap on samples for the global system
pub const DEFAULT_MAX_POINTS: usize = 1500;

/// Fitted ordinary kriging model in dual form
#[derive(Debug, Clone)]
pub struct KrigingModel {
    points: Vec<SamplePoint>,
    /// Dual weights, one per sample, then the constant term
    weights: Vec<f64>,
    variogram: FittedVariogram,
}

impl KrigingModel {
    /// Fit the variogram and factorise the kriging system.
    ///
    /// # Errors
    /// `Estimation` for fewer than 3 points, a degenerate variogram or a
    /// singular system.
    pub fn fit(points: &[SamplePoint], model: VariogramModel) -> Result<Self> {
        let n = points.len();
        if n < 3 {
            return Err(Error::Estimation(format!(
                "kriging requires at least 3 sample points, got {}",
                n
            )));
        }

        let empirical = empirical_variogram(points, default_lag_count(n))?;
        let variogram = fit_variogram(&empirical, model)?;
        debug!(
            model = model.name(),
            nugget = variogram.nugget,
            sill = variogram.sill(),
            range = variogram.range,
            lags = empirical.lags.len(),
            "variogram fitted"
        );

        let m = n + 1;
        let mut mat = vec![0.0_f64; m * m];
        let mut rhs = vec![0.0_f64; m];
        for i in 0..n {
            for j in (i + 1)..n {
                let h = points[i].dist(points[j].x, points[j].y);
                let g = variogram.evaluate(h);
                mat[i * m + j] = g;
                mat[j * m + i] = g;
            }
            mat[i * m + n] = 1.0;
            mat[n * m + i] = 1.0;
            rhs[i] = points[i].value;
        }

        let weights = kriging_solve(m, &mut mat, &mut rhs)?;

        Ok(Self {
            points: points.to_vec(),
            weights,
            variogram,
        })
    }

    pub fn variogram(&self) -> &FittedVariogram {
        &self.variogram
    }

    /// Estimate at a single location
    pub fn predict(&self, x: f64, y: f64) -> f64 {
        let n = self.points.len();
        let mut estimate = self.weights[n];
        for (pt, w) in self.points.iter().zip(&self.weights) {
            estimate += w * self.variogram.evaluate(pt.dist(x, y));
        }
        estimate
    }
}

/// Solve Ax = b using Gaussian elimination with partial pivoting.
fn kriging_solve(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> Result<Vec<f64>> {
    // Forward elimination
    for col in 0..n {
        let mut max_val = mat[col * n + col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = mat[row * n + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if !max_val.is_finite() || max_val < 1e-14 {
            return Err(Error::Estimation("kriging system is singular".into()));
        }

        if max_row != col {
            for j in 0..n {
                mat.swap(col * n + j, max_row * n + j);
            }
            rhs.swap(col, max_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            if factor == 0.0 {
                continue;
            }
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    // Back substitution
    let mut x = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for j in (col + 1)..n {
            sum -= mat[col * n + j] * x[j];
        }
        x[col] = sum / mat[col * n + col];
    }

    Ok(x)
}

/// Ordinary kriging over every grid cell using all samples.
#[derive(Debug, Clone, Copy)]
pub struct OrdinaryKrigingEstimator {
    pub model: VariogramModel,
    /// Declines above this many samples; the global system grows as n²
    pub max_points: usize,
}

impl Default for OrdinaryKrigingEstimator {
    fn default() -> Self {
        Self {
            model: VariogramModel::Spherical,
            max_points: DEFAULT_MAX_POINTS,
        }
    }
}

impl Estimator for OrdinaryKrigingEstimator {
    fn name(&self) -> &'static str {
        "kriging"
    }

    fn estimate(&self, points: &[SamplePoint], grid: &InterpolationGrid) -> Result<Raster<f64>> {
        if points.len() > self.max_points {
            return Err(Error::Estimation(format!(
                "{} samples exceed the kriging limit of {}",
                points.len(),
                self.max_points
            )));
        }

        let model = KrigingModel::fit(points, self.model)?;
        let cols = grid.cols();

        let data: Vec<f64> = (0..grid.rows())
            .into_par_iter()
            .flat_map(|row| {
                let y = grid.ys[row];
                (0..cols).map(|col| model.predict(grid.xs[col], y)).collect::<Vec<f64>>()
            })
            .collect();

        if let Some(pos) = data.iter().position(|v| !v.is_finite()) {
            return Err(Error::Estimation(format!(
                "non-finite kriging estimate at row {}, col {}",
                pos / cols,
                pos % cols
            )));
        }

        grid.raster(data)
    }
}
