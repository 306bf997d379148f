//! A PSF modeled as a single circularly symmetric Gaussian.

use super::PsfKernel;
use crate::error::MeasurementError;

/// Circularly symmetric Gaussian: `exp(-r² / 2σ²)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleGaussian {
    sigma: f64,
}

impl SingleGaussian {
    /// Registry name of this shape.
    pub const NAME: &'static str = "SingleGaussian";

    /// Build with width `sigma`; fails for non-positive widths.
    pub fn new(sigma: f64) -> Result<SingleGaussian, MeasurementError> {
        if sigma <= 0.0 {
            return Err(MeasurementError::InvalidParameter(format!(
                "sigma must be positive, got {sigma}"
            )));
        }
        Ok(SingleGaussian { sigma })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Factory-registry constructor; expects params `[sigma]`.
    pub(crate) fn construct(params: &[f64]) -> Result<Box<dyn PsfKernel>, MeasurementError> {
        if params.len() != 1 {
            return Err(MeasurementError::InvalidParameter(format!(
                "{} takes 1 parameter (sigma), got {}",
                Self::NAME,
                params.len()
            )));
        }
        Ok(Box::new(SingleGaussian::new(params[0])?))
    }
}

impl PsfKernel for SingleGaussian {
    fn shape_name(&self) -> &'static str {
        Self::NAME
    }

    fn params(&self) -> Vec<f64> {
        vec![self.sigma]
    }

    fn evaluate(&self, dx: f64, dy: f64) -> f64 {
        let r2 = dx * dx + dy * dy;
        (-r2 / (2.0 * self.sigma * self.sigma)).exp()
    }
}
