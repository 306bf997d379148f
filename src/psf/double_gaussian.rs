//! A PSF modeled as a circularly symmetric double Gaussian: a narrow core
//! plus a broad outer component that adds the wings produced by scattered
//! light.

use super::PsfKernel;
use crate::error::MeasurementError;

/// Sum of two concentric Gaussians,
/// `(exp(-r²/2σ₁²) + b·exp(-r²/2σ₂²)) / (1 + b)`,
/// scaled so the central amplitude is exactly 1.
///
/// `sigma1` is the core width, `sigma2` the outer width, and `b` the
/// outer component's central amplitude relative to the core.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleGaussian {
    sigma1: f64,
    sigma2: f64,
    b: f64,
}

impl DoubleGaussian {
    /// Registry name of this shape.
    pub const NAME: &'static str = "DoubleGaussian";

    /// Build from core width, outer width, and amplitude ratio; fails for
    /// non-positive widths or a negative ratio.
    pub fn new(sigma1: f64, sigma2: f64, b: f64) -> Result<DoubleGaussian, MeasurementError> {
        if sigma1 <= 0.0 || sigma2 <= 0.0 {
            return Err(MeasurementError::InvalidParameter(format!(
                "sigma must be positive, got sigma1={sigma1}, sigma2={sigma2}"
            )));
        }
        if b < 0.0 {
            return Err(MeasurementError::InvalidParameter(format!(
                "amplitude ratio may not be negative, got {b}"
            )));
        }
        Ok(DoubleGaussian { sigma1, sigma2, b })
    }

    pub fn sigma1(&self) -> f64 {
        self.sigma1
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn amplitude_ratio(&self) -> f64 {
        self.b
    }

    /// Factory-registry constructor; expects params `[sigma1, sigma2, b]`.
    pub(crate) fn construct(params: &[f64]) -> Result<Box<dyn PsfKernel>, MeasurementError> {
        if params.len() != 3 {
            return Err(MeasurementError::InvalidParameter(format!(
                "{} takes 3 parameters (sigma1, sigma2, b), got {}",
                Self::NAME,
                params.len()
            )));
        }
        Ok(Box::new(DoubleGaussian::new(
            params[0], params[1], params[2],
        )?))
    }
}

impl PsfKernel for DoubleGaussian {
    fn shape_name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> Vec<f64> {
        vec![self.sigma1, self.sigma2, self.b]
    }

    fn evaluate(&self, dx: f64, dy: f64) -> f64 {
        let r2 = dx * dx + dy * dy;
        let core = (-r2 / (2.0 * self.sigma1 * self.sigma1)).exp();
        let wings = (-r2 / (2.0 * self.sigma2 * self.sigma2)).exp();
        (core + self.b * wings) / (1.0 + self.b)
    }
}
