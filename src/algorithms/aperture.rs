//! Aperture photometry: simple sums over circular regions at a set of
//! configured radii.

use crate::accumulator::{drive, FootprintSum};
use crate::algorithms::Algorithm;
use crate::error::MeasurementError;
use crate::footprint::Footprint;
use crate::image::{position_to_index, MaskedImage};
use crate::psf::Psf;
use crate::record::{FieldKey, FlagKey, Schema, SourceRecord};
use crate::Point2;

/// Configuration for [`ApertureFlux`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApertureFluxConfig {
    /// Output-field name prefix. Default: "flux.aperture".
    pub name: String,
    /// Aperture radii in pixels, one flux/error/flag slot each.
    /// Default: [3.0, 6.0, 12.0]
    pub radii: Vec<f64>,
}

impl Default for ApertureFluxConfig {
    fn default() -> Self {
        ApertureFluxConfig {
            name: "flux.aperture".to_string(),
            radii: vec![3.0, 6.0, 12.0],
        }
    }
}

impl ApertureFluxConfig {
    /// Build from a flat parameter dictionary (`name`, `radii`).
    pub fn from_params(
        params: &crate::config::Params,
    ) -> Result<ApertureFluxConfig, MeasurementError> {
        let d = ApertureFluxConfig::default();
        Ok(ApertureFluxConfig {
            name: params.str_or("name", &d.name)?,
            radii: params.float_list_or("radii", &d.radii)?,
        })
    }
}

/// Multi-radius aperture photometry.
///
/// For each configured radius, a circular footprint centered at the
/// source's position and clipped to the image drives a plain sum
/// accumulator: flux = Σ intensity, uncertainty = √(Σ variance). Radii
/// are independent — an aperture that falls entirely outside the image
/// leaves only its own slot unflagged and the remaining radii are still
/// measured.
#[derive(Debug, Clone)]
pub struct ApertureFlux {
    config: ApertureFluxConfig,
    flux_key: FieldKey,
    err_key: FieldKey,
    flag_keys: Vec<FlagKey>,
}

impl ApertureFlux {
    /// Bind output fields (`<name>`, `<name>.err`, `<name>.flag.<i>` per
    /// radius) and build the algorithm.
    ///
    /// Radii must be non-empty, positive, and are measured in the order
    /// given.
    pub fn new(
        config: ApertureFluxConfig,
        schema: &mut Schema,
    ) -> Result<ApertureFlux, MeasurementError> {
        if config.radii.is_empty() {
            return Err(MeasurementError::InvalidParameter(
                "aperture radii list may not be empty".to_string(),
            ));
        }
        if let Some(r) = config.radii.iter().find(|r| **r <= 0.0) {
            return Err(MeasurementError::InvalidParameter(format!(
                "aperture radii must be positive, got {r}"
            )));
        }

        let n = config.radii.len();
        let flux_key = schema.add_field(
            &config.name,
            n,
            "simple sum of pixels in circular apertures",
        )?;
        let err_key = schema.add_field(
            &format!("{}.err", config.name),
            n,
            "uncertainty of the aperture sums",
        )?;
        let flag_keys = (0..n)
            .map(|i| schema.add_flag(&format!("{}.flag.{i}", config.name)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ApertureFlux {
            config,
            flux_key,
            err_key,
            flag_keys,
        })
    }

    pub fn radii(&self) -> &[f64] {
        &self.config.radii
    }

    /// Key to the per-radius flux slots.
    pub fn flux_key(&self) -> FieldKey {
        self.flux_key
    }

    /// Key to the per-radius uncertainty slots.
    pub fn err_key(&self) -> FieldKey {
        self.err_key
    }

    /// Key to the success flag for radius `i`.
    pub fn flag_key(&self, i: usize) -> FlagKey {
        self.flag_keys[i]
    }
}

impl Algorithm for ApertureFlux {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn apply(
        &self,
        record: &mut SourceRecord,
        image: &MaskedImage,
        center: Point2,
        _psf: Option<&Psf>,
    ) -> Result<(), MeasurementError> {
        let ixcen = position_to_index(center.x);
        let iycen = position_to_index(center.y);
        let image_bbox = image.bbox();

        let mut acc = FootprintSum::new();
        for (i, &radius) in self.config.radii.iter().enumerate() {
            // Radii are independent: a clipped-away circle skips only
            // this slot.
            let foot = match Footprint::circle(ixcen, iycen, radius, &image_bbox) {
                Ok(foot) => foot,
                Err(MeasurementError::EmptyRegion) => continue,
                Err(e) => return Err(e),
            };
            drive(image, &foot, &mut acc);
            record.set(self.flux_key, i, acc.sum());
            record.set(self.err_key, i, acc.sum_variance().sqrt());
            record.set_field_flag(self.flag_keys[i], true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_image(value: f32, variance: f32) -> MaskedImage {
        let mut img = MaskedImage::new(41, 41);
        img.fill_image(value);
        img.fill_variance(variance);
        img
    }

    fn photometer(radii: Vec<f64>) -> (ApertureFlux, Schema) {
        let mut schema = Schema::new();
        let alg = ApertureFlux::new(
            ApertureFluxConfig {
                radii,
                ..Default::default()
            },
            &mut schema,
        )
        .unwrap();
        (alg, schema)
    }

    #[test]
    fn test_flux_and_error_on_uniform_image() {
        let img = uniform_image(2.0, 0.25);
        let (alg, schema) = photometer(vec![4.0]);
        let mut rec = schema.make_record(0);
        alg.apply(&mut rec, &img, Point2::new(20.0, 20.0), None)
            .unwrap();

        let npix = Footprint::circle(20, 20, 4.0, &img.bbox()).unwrap().area() as f64;
        assert!((rec.get(alg.flux_key(), 0) - 2.0 * npix).abs() < 1e-9);
        assert!((rec.get(alg.err_key(), 0) - (0.25 * npix).sqrt()).abs() < 1e-9);
        assert!(rec.field_flag(alg.flag_key(0)));
    }

    #[test]
    fn test_flux_monotonic_in_radius() {
        // Property: non-negative image → flux non-decreasing with radius
        let mut img = uniform_image(1.0, 1.0);
        for y in 0..41 {
            for x in 0..41 {
                let dx = x as f64 - 20.0;
                let dy = y as f64 - 20.0;
                img.add_image(x, y, (500.0 * (-(dx * dx + dy * dy) / 18.0).exp()) as f32);
            }
        }
        let radii = vec![1.0, 2.0, 4.0, 8.0, 16.0];
        let (alg, schema) = photometer(radii.clone());
        let mut rec = schema.make_record(0);
        alg.apply(&mut rec, &img, Point2::new(20.0, 20.0), None)
            .unwrap();

        let fluxes: Vec<f64> = (0..radii.len()).map(|i| rec.get(alg.flux_key(), i)).collect();
        for pair in fluxes.windows(2) {
            assert!(pair[1] >= pair[0], "fluxes not monotonic: {fluxes:?}");
        }
    }

    #[test]
    fn test_aperture_outside_image_flags_only_its_slot() {
        let img = uniform_image(1.0, 1.0);
        // Center far off the image: small aperture misses entirely, the
        // large one still clips in
        let (alg, schema) = photometer(vec![2.0, 40.0]);
        let mut rec = schema.make_record(0);
        alg.apply(&mut rec, &img, Point2::new(60.0, 20.0), None)
            .unwrap();

        assert!(!rec.field_flag(alg.flag_key(0)));
        assert!(!rec.is_set(alg.flux_key(), 0));
        assert!(rec.field_flag(alg.flag_key(1)));
        assert!(rec.get(alg.flux_key(), 1) > 0.0);
    }

    #[test]
    fn test_invalid_radii_rejected() {
        let mut schema = Schema::new();
        assert!(ApertureFlux::new(
            ApertureFluxConfig {
                radii: vec![],
                ..Default::default()
            },
            &mut schema,
        )
        .is_err());

        let mut schema = Schema::new();
        assert!(ApertureFlux::new(
            ApertureFluxConfig {
                radii: vec![3.0, -1.0],
                ..Default::default()
            },
            &mut schema,
        )
        .is_err());
    }

    #[test]
    fn test_config_from_params() {
        let mut p = crate::config::Params::new();
        p.set_float_list("radii", vec![2.0, 5.0]);
        let cfg = ApertureFluxConfig::from_params(&p).unwrap();
        assert_eq!(cfg.radii, vec![2.0, 5.0]);
        assert_eq!(cfg.name, "flux.aperture");
    }
}
