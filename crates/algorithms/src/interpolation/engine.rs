//! Estimator chain: try each strategy in order until one produces a surface

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use soilmap_core::{Error, Raster, Result};
use tracing::{info, warn};

use super::idw::IdwEstimator;
use super::kriging::{OrdinaryKrigingEstimator, DEFAULT_MAX_POINTS};
use super::variogram::VariogramModel;
use super::{InterpolationGrid, SamplePoint};
use crate::degradation::Degradation;

/// IDW power used when kriging falls back
pub const FALLBACK_IDW_POWER: f64 = 2.0;

/// A strategy that turns scattered samples into a dense surface.
///
/// Returning `Error::Estimation` means "this strategy cannot handle the
/// input" and lets the chain move on; any other error aborts the run.
pub trait Estimator: Send + Sync {
    fn name(&self) -> &'static str;

    fn estimate(&self, points: &[SamplePoint], grid: &InterpolationGrid) -> Result<Raster<f64>>;
}

/// Flat surface at the arithmetic mean of the sample values. Succeeds for
/// any non-empty input, so it closes every chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanFill;

impl Estimator for MeanFill {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn estimate(&self, points: &[SamplePoint], grid: &InterpolationGrid) -> Result<Raster<f64>> {
        if points.is_empty() {
            return Err(Error::Estimation("no sample points".into()));
        }
        let mean = points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64;
        grid.filled(mean)
    }
}

/// Requested interpolation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    #[default]
    Kriging,
    Idw,
}

impl InterpolationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kriging => "kriging",
            Self::Idw => "idw",
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterpolationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kriging" => Ok(Self::Kriging),
            "idw" => Ok(Self::Idw),
            _ => Err(Error::InvalidParameter {
                name: "method",
                value: s.to_string(),
                reason: "expected 'kriging' or 'idw'".into(),
            }),
        }
    }
}

/// Tuning for the estimators in a chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorParams {
    /// IDW power when IDW is the requested method
    pub idw_power: f64,
    /// Fixed IDW neighbourhood; `None` scales with the sample count
    pub idw_neighbours: Option<usize>,
    pub variogram_model: VariogramModel,
    /// Kriging declines above this many samples
    pub kriging_max_points: usize,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            idw_power: 2.0,
            idw_neighbours: None,
            variogram_model: VariogramModel::Spherical,
            kriging_max_points: DEFAULT_MAX_POINTS,
        }
    }
}

/// Ordered strategies for a method.
///
/// - kriging: kriging, IDW (power 2), mean fill
/// - idw: IDW (configured power), mean fill
pub fn estimator_chain(method: InterpolationMethod, params: &EstimatorParams) -> Vec<Box<dyn Estimator>> {
    match method {
        InterpolationMethod::Kriging => vec![
            Box::new(OrdinaryKrigingEstimator {
                model: params.variogram_model,
                max_points: params.kriging_max_points,
            }),
            Box::new(IdwEstimator {
                power: FALLBACK_IDW_POWER,
                neighbours: params.idw_neighbours,
            }),
            Box::new(MeanFill),
        ],
        InterpolationMethod::Idw => vec![
            Box::new(IdwEstimator {
                power: params.idw_power,
                neighbours: params.idw_neighbours,
            }),
            Box::new(MeanFill),
        ],
    }
}

/// Outcome of [`interpolate`]
#[derive(Debug, Clone)]
pub struct Interpolation {
    pub surface: Raster<f64>,
    /// Name of the estimator that produced the surface
    pub estimator: &'static str,
    /// One entry per estimator that declined
    pub degradations: Vec<Degradation>,
}

/// Interpolate samples onto a grid with the chain for `method`.
///
/// # Errors
/// `Validation` for an empty sample set. Non-estimation errors raised by
/// an estimator are returned unchanged.
pub fn interpolate(
    points: &[SamplePoint],
    grid: &InterpolationGrid,
    method: InterpolationMethod,
    params: &EstimatorParams,
) -> Result<Interpolation> {
    if points.is_empty() {
        return Err(Error::Validation("no sample points to interpolate".into()));
    }
    run_chain(&estimator_chain(method, params), points, grid)
}

/// Run an explicit estimator chain.
pub fn run_chain(
    chain: &[Box<dyn Estimator>],
    points: &[SamplePoint],
    grid: &InterpolationGrid,
) -> Result<Interpolation> {
    let mut degradations = Vec::new();

    for (i, estimator) in chain.iter().enumerate() {
        match estimator.estimate(points, grid) {
            Ok(surface) => {
                info!(
                    method = estimator.name(),
                    points = points.len(),
                    rows = grid.rows(),
                    cols = grid.cols(),
                    "surface estimated"
                );
                return Ok(Interpolation {
                    surface,
                    estimator: estimator.name(),
                    degradations,
                });
            }
            Err(Error::Estimation(reason)) => match chain.get(i + 1) {
                Some(next) => {
                    warn!(
                        from = estimator.name(),
                        to = next.name(),
                        reason = %reason,
                        "estimator declined, falling back"
                    );
                    degradations.push(Degradation::interpolation(estimator.name(), next.name(), reason));
                }
                None => return Err(Error::Estimation(reason)),
            },
            Err(e) => return Err(e),
        }
    }

    Err(Error::Estimation("estimator chain is empty".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::{build_grid, Extent, GridParams};

    struct Declines;

    impl Estimator for Declines {
        fn name(&self) -> &'static str {
            "declines"
        }

        fn estimate(&self, _: &[SamplePoint], _: &InterpolationGrid) -> Result<Raster<f64>> {
            Err(Error::Estimation("always".into()))
        }
    }

    struct Broken;

    impl Estimator for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn estimate(&self, _: &[SamplePoint], _: &InterpolationGrid) -> Result<Raster<f64>> {
            Err(Error::Other("disk on fire".into()))
        }
    }

    fn points() -> Vec<SamplePoint> {
        vec![
            SamplePoint::new(0.0, 0.0, 1.0),
            SamplePoint::new(0.01, 0.0, 2.0),
            SamplePoint::new(0.0, 0.01, 3.0),
        ]
    }

    fn grid() -> InterpolationGrid {
        build_grid(&Extent::new(0.0, 0.0, 0.01, 0.01), &GridParams::default()).unwrap()
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("Kriging".parse::<InterpolationMethod>().unwrap(), InterpolationMethod::Kriging);
        assert_eq!(" IDW ".parse::<InterpolationMethod>().unwrap(), InterpolationMethod::Idw);
        assert!("spline".parse::<InterpolationMethod>().is_err());
        assert_eq!(InterpolationMethod::Idw.to_string(), "idw");
    }

    #[test]
    fn test_chain_order() {
        let params = EstimatorParams::default();
        let names: Vec<_> = estimator_chain(InterpolationMethod::Kriging, &params)
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(names, vec!["kriging", "idw", "mean"]);

        let names: Vec<_> = estimator_chain(InterpolationMethod::Idw, &params)
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(names, vec!["idw", "mean"]);
    }

    #[test]
    fn test_fallback_is_recorded() {
        let chain: Vec<Box<dyn Estimator>> = vec![Box::new(Declines), Box::new(MeanFill)];
        let out = run_chain(&chain, &points(), &grid()).unwrap();
        assert_eq!(out.estimator, "mean");
        assert_eq!(out.degradations.len(), 1);
        assert!(out.surface.data().iter().all(|&v| (v - 2.0).abs() < 1e-12));
        match &out.degradations[0] {
            Degradation::InterpolationDegraded { from, to, .. } => {
                assert_eq!(from, "declines");
                assert_eq!(to, "mean");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_other_errors_propagate() {
        let chain: Vec<Box<dyn Estimator>> = vec![Box::new(Broken), Box::new(MeanFill)];
        assert!(matches!(run_chain(&chain, &points(), &grid()), Err(Error::Other(_))));
    }

    #[test]
    fn test_last_estimator_failure_surfaces() {
        let chain: Vec<Box<dyn Estimator>> = vec![Box::new(Declines)];
        assert!(matches!(run_chain(&chain, &points(), &grid()), Err(Error::Estimation(_))));
    }

    #[test]
    fn test_kriging_with_constant_values_falls_back_to_idw() {
        let pts: Vec<SamplePoint> = points().into_iter().map(|p| SamplePoint::new(p.x, p.y, 5.0)).collect();
        let out = interpolate(&pts, &grid(), InterpolationMethod::Kriging, &EstimatorParams::default()).unwrap();
        assert_eq!(out.estimator, "idw");
        assert_eq!(out.degradations.len(), 1);
    }

    #[test]
    fn test_empty_input_is_validation_error() {
        let result = interpolate(&[], &grid(), InterpolationMethod::Idw, &EstimatorParams::default());
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
