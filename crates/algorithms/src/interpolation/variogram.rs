//! Empirical variogram and weighted model fitting
//!
//! The semivariance γ(h) measures spatial dissimilarity as a function of
//! separation distance h:
//! ```text
//! γ(h) = mean over pairs in the lag bin of ½·(z(xᵢ) - z(xⱼ))²
//! ```
//! Pairs are binned into `n_lags` equal-width bins spanning the observed
//! pair distances; empty bins are dropped. Each bin reports the mean
//! distance of its pairs rather than its centre.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use serde::{Deserialize, Serialize};
use soilmap_core::{Error, Result};

use super::SamplePoint;

/// Upper bound on the number of lag bins
pub const MAX_LAGS: usize = 6;

/// Empirical (experimental) variogram: one entry per non-empty lag bin.
#[derive(Debug, Clone)]
pub struct EmpiricalVariogram {
    /// Mean pair distance in each bin, ascending
    pub lags: Vec<f64>,
    /// Semivariance γ(h) in each bin
    pub semivariance: Vec<f64>,
    /// Number of point pairs contributing to each bin
    pub pair_counts: Vec<usize>,
}

/// Theoretical variogram model type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariogramModel {
    /// γ(h) = c₀ + c·[1.5(h/a) - 0.5(h/a)³] for h ≤ a; c₀+c for h > a
    #[default]
    Spherical,
    /// γ(h) = c₀ + c·[1 - exp(-3h/a)]
    Exponential,
    /// γ(h) = c₀ + c·[1 - exp(-3h²/a²)]
    Gaussian,
}

impl VariogramModel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Spherical => "spherical",
            Self::Exponential => "exponential",
            Self::Gaussian => "gaussian",
        }
    }
}

/// Fitted variogram model parameters
#[derive(Debug, Clone, Copy)]
pub struct FittedVariogram {
    pub model: VariogramModel,
    /// Nugget (c₀): semivariance as h → 0
    pub nugget: f64,
    /// Partial sill (c): rise from nugget to plateau
    pub partial_sill: f64,
    /// Range (a)
    pub range: f64,
    /// Weighted residual sum of squares of the fit
    pub rss: f64,
}

impl FittedVariogram {
    /// Sill (c₀ + c)
    pub fn sill(&self) -> f64 {
        self.nugget + self.partial_sill
    }

    /// Evaluate the model at distance h. γ(0) is exactly 0, so kriging
    /// honours the samples.
    pub fn evaluate(&self, h: f64) -> f64 {
        if h < 1e-15 {
            return 0.0;
        }

        let c0 = self.nugget;
        let c = self.partial_sill;
        let a = self.range;

        match self.model {
            VariogramModel::Spherical => {
                if h >= a {
                    c0 + c
                } else {
                    let hr = h / a;
                    c0 + c * (1.5 * hr - 0.5 * hr * hr * hr)
                }
            }
            VariogramModel::Exponential => c0 + c * (1.0 - (-3.0 * h / a).exp()),
            VariogramModel::Gaussian => c0 + c * (1.0 - (-3.0 * h * h / (a * a)).exp()),
        }
    }
}

/// Number of lag bins for `n` samples: `min(6, n/2)`, at least one.
pub fn default_lag_count(n: usize) -> usize {
    (n / 2).clamp(1, MAX_LAGS)
}

/// Compute the empirical variogram from sample points.
///
/// # Errors
/// `Estimation` for fewer than two points, a zero lag count, or when no
/// pair has a finite distance.
pub fn empirical_variogram(points: &[SamplePoint], n_lags: usize) -> Result<EmpiricalVariogram> {
    let n = points.len();
    if n < 2 {
        return Err(Error::Estimation("variogram needs at least 2 points".into()));
    }
    if n_lags == 0 {
        return Err(Error::Estimation("variogram needs at least one lag bin".into()));
    }

    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            let d = points[i].dist(points[j].x, points[j].y);
            let dz = points[i].value - points[j].value;
            pairs.push((d, 0.5 * dz * dz));
        }
    }

    let (dmin, dmax) = pairs
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(d, _)| (lo.min(d), hi.max(d)));
    if !(dmin.is_finite() && dmax.is_finite()) {
        return Err(Error::Estimation("pair distances are not finite".into()));
    }

    // Equal-width bins over [dmin, dmax]; the top edge is nudged up so dmax lands in the last bin
    let width = (dmax - dmin) / n_lags as f64;
    let mut edges: Vec<f64> = (0..n_lags).map(|k| dmin + k as f64 * width).collect();
    edges.push(dmax + 0.001);

    let mut dist_sum = vec![0.0_f64; n_lags];
    let mut gamma_sum = vec![0.0_f64; n_lags];
    let mut counts = vec![0_usize; n_lags];

    for &(d, g) in &pairs {
        // Last bin whose lower edge is <= d
        let bin = edges[..n_lags].partition_point(|&e| e <= d).saturating_sub(1);
        if d < edges[bin + 1] {
            dist_sum[bin] += d;
            gamma_sum[bin] += g;
            counts[bin] += 1;
        }
    }

    let mut lags = Vec::with_capacity(n_lags);
    let mut semivariance = Vec::with_capacity(n_lags);
    let mut pair_counts = Vec::with_capacity(n_lags);
    for k in 0..n_lags {
        if counts[k] > 0 {
            lags.push(dist_sum[k] / counts[k] as f64);
            semivariance.push(gamma_sum[k] / counts[k] as f64);
            pair_counts.push(counts[k]);
        }
    }

    Ok(EmpiricalVariogram {
        lags,
        semivariance,
        pair_counts,
    })
}

/// Logistic weights emphasising the short lags, normalised to sum to 1.
fn lag_weights(lags: &[f64]) -> Vec<f64> {
    let (lo, hi) = lags
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &l| (lo.min(l), hi.max(l)));
    let drange = hi - lo;

    let raw: Vec<f64> = if drange > 0.0 {
        let k = 2.1972 / (0.1 * drange);
        let x0 = 0.7 * drange + lo;
        lags.iter().map(|&l| 1.0 / (1.0 + (-k * (x0 - l)).exp())).collect()
    } else {
        vec![1.0; lags.len()]
    };

    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

/// Fit a theoretical model to an empirical variogram.
///
/// Weighted least squares over a parameter grid: nugget in `[0, max γ]`,
/// partial sill in `(0, 2·max γ]`, range in `(0, max lag]`. Short lags
/// carry more weight than long ones.
///
/// # Errors
/// `Estimation` when there is no lag bin or every semivariance is zero.
pub fn fit_variogram(empirical: &EmpiricalVariogram, model: VariogramModel) -> Result<FittedVariogram> {
    let valid: Vec<(f64, f64)> = empirical
        .lags
        .iter()
        .zip(&empirical.semivariance)
        .filter(|(l, s)| l.is_finite() && s.is_finite())
        .map(|(&l, &s)| (l, s))
        .collect();

    if valid.is_empty() {
        return Err(Error::Estimation("empirical variogram has no lag bins".into()));
    }

    let max_sv = valid.iter().map(|&(_, s)| s).fold(0.0_f64, f64::max);
    if max_sv <= 0.0 {
        return Err(Error::Estimation("all semivariance values are zero".into()));
    }
    let max_lag = valid.iter().map(|&(l, _)| l).fold(0.0_f64, f64::max);
    if max_lag <= 0.0 {
        return Err(Error::Estimation("all lag distances are zero".into()));
    }

    let lags: Vec<f64> = valid.iter().map(|&(l, _)| l).collect();
    let weights = lag_weights(&lags);

    let n_nugget = 10;
    let n_sill = 20;
    let n_range = 20;

    let mut best = FittedVariogram {
        model,
        nugget: 0.0,
        partial_sill: max_sv,
        range: max_lag,
        rss: f64::INFINITY,
    };

    for i_nug in 0..=n_nugget {
        let nugget = max_sv * i_nug as f64 / n_nugget as f64;
        for i_sill in 1..=n_sill {
            let partial_sill = 2.0 * max_sv * i_sill as f64 / n_sill as f64;
            for i_range in 1..=n_range {
                let range = max_lag * i_range as f64 / n_range as f64;
                let trial = FittedVariogram {
                    model,
                    nugget,
                    partial_sill,
                    range,
                    rss: 0.0,
                };

                let rss: f64 = valid
                    .iter()
                    .zip(&weights)
                    .map(|(&(lag, sv), &w)| {
                        let r = sv - trial.evaluate(lag);
                        w * r * r
                    })
                    .sum();

                if rss < best.rss {
                    best = FittedVariogram { rss, ..trial };
                }
            }
        }
    }

    Ok(best)
}
