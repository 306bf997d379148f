//! Naive centroiding: an intensity-weighted first moment over the 3×3
//! window around the seed pixel.

use crate::algorithms::Algorithm;
use crate::error::MeasurementError;
use crate::image::{index_to_position, position_to_index, MaskedImage};
use crate::psf::Psf;
use crate::record::{FieldKey, FlagKey, Schema, SourceRecord};
use crate::Point2;

/// Configuration for [`NaiveCentroid`].
#[derive(Debug, Clone, PartialEq)]
pub struct NaiveCentroidConfig {
    /// Output-field name; the success flag binds as `<name>.flag`.
    /// Default: "centroid".
    pub name: String,
    /// Background level subtracted from the window sum.
    /// Default: 0.0
    pub background: f64,
}

impl Default for NaiveCentroidConfig {
    fn default() -> Self {
        NaiveCentroidConfig {
            name: "centroid".to_string(),
            background: 0.0,
        }
    }
}

impl NaiveCentroidConfig {
    /// Build from a flat parameter dictionary (`name`, `background`).
    pub fn from_params(
        params: &crate::config::Params,
    ) -> Result<NaiveCentroidConfig, MeasurementError> {
        let d = NaiveCentroidConfig::default();
        Ok(NaiveCentroidConfig {
            name: params.str_or("name", &d.name)?,
            background: params.float_or("background", d.background)?,
        })
    }
}

/// 3×3 weighted-moment centroid around a seed coordinate.
///
/// The window sum has `9 × background` subtracted; a window whose net
/// counts are exactly zero has no defined centroid and fails with
/// [`MeasurementError::ZeroFlux`] (the orchestrator falls back to the
/// seed). A window that does not fit inside the image fails with
/// [`MeasurementError::OutsideImage`].
#[derive(Debug, Clone)]
pub struct NaiveCentroid {
    config: NaiveCentroidConfig,
    position_key: FieldKey,
    flag_key: FlagKey,
}

impl NaiveCentroid {
    /// Bind output fields (`<name>` x/y pair plus `<name>.flag`) and
    /// build the algorithm.
    pub fn new(
        config: NaiveCentroidConfig,
        schema: &mut Schema,
    ) -> Result<NaiveCentroid, MeasurementError> {
        let position_key = schema.add_field(
            &config.name,
            2,
            "intensity-weighted centroid over a 3x3 window (x, y)",
        )?;
        let flag_key = schema.add_flag(&format!("{}.flag", config.name))?;
        Ok(NaiveCentroid {
            config,
            position_key,
            flag_key,
        })
    }

    /// Key to the (x, y) field pair, for consumers and for the
    /// orchestrator's fallback write.
    pub fn position_key(&self) -> FieldKey {
        self.position_key
    }

    /// Key to the success flag.
    pub fn flag_key(&self) -> FlagKey {
        self.flag_key
    }
}

impl Algorithm for NaiveCentroid {
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
        let ix = position_to_index(center.x);
        let iy = position_to_index(center.y);

        let bbox = image.bbox();
        if !bbox.contains(ix - 1, iy - 1) || !bbox.contains(ix + 1, iy + 1) {
            return Err(MeasurementError::OutsideImage { x: ix, y: iy });
        }

        let v = |dx: i32, dy: i32| image.pixel(ix + dx, iy + dy).image as f64;

        let sum = (v(-1, 1) + v(0, 1) + v(1, 1))
            + (v(-1, 0) + v(0, 0) + v(1, 0))
            + (v(-1, -1) + v(0, -1) + v(1, -1))
            - 9.0 * self.config.background;

        if sum == 0.0 {
            return Err(MeasurementError::ZeroFlux);
        }

        // Background cancels in the first moments of a symmetric window
        let sum_x = -v(-1, 1) + v(1, 1) - v(-1, 0) + v(1, 0) - v(-1, -1) + v(1, -1);
        let sum_y = (v(-1, 1) + v(0, 1) + v(1, 1)) - (v(-1, -1) + v(0, -1) + v(1, -1));

        record.set(self.position_key, 0, index_to_position(ix) + sum_x / sum);
        record.set(self.position_key, 1, index_to_position(iy) + sum_y / sum);
        record.set_field_flag(self.flag_key, true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star_image(cx: f64, cy: f64, background: f32) -> MaskedImage {
        let mut img = MaskedImage::new(21, 21);
        img.fill_image(background);
        for y in 0..21 {
            for x in 0..21 {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                img.add_image(x, y, (1000.0 * (-(dx * dx + dy * dy) / 4.0).exp()) as f32);
            }
        }
        img
    }

    fn centroider(background: f64) -> (NaiveCentroid, Schema) {
        let mut schema = Schema::new();
        let alg = NaiveCentroid::new(
            NaiveCentroidConfig {
                background,
                ..Default::default()
            },
            &mut schema,
        )
        .unwrap();
        (alg, schema)
    }

    #[test]
    fn test_symmetric_bump_at_integer_center() {
        // Property: any background with non-zero net flux recovers (x0, y0)
        for background in [0.0, 50.0, -20.0] {
            let img = star_image(10.0, 10.0, background as f32);
            let (alg, schema) = centroider(background);
            let mut rec = schema.make_record(0);
            alg.apply(&mut rec, &img, Point2::new(10.0, 10.0), None)
                .unwrap();
            assert!((rec.get(alg.position_key(), 0) - 10.0).abs() < 1e-9);
            assert!((rec.get(alg.position_key(), 1) - 10.0).abs() < 1e-9);
            assert!(rec.field_flag(alg.flag_key()));
        }
    }

    #[test]
    fn test_subpixel_offset_pulls_centroid() {
        // The 3x3 moment is pulled toward a sub-pixel star but (being
        // naive) underestimates the offset; check direction and bounds
        let img = star_image(10.3, 9.8, 0.0);
        let (alg, schema) = centroider(0.0);
        let mut rec = schema.make_record(0);
        alg.apply(&mut rec, &img, Point2::new(10.0, 10.0), None)
            .unwrap();
        let x = rec.get(alg.position_key(), 0);
        let y = rec.get(alg.position_key(), 1);
        assert!(x > 10.01 && x < 10.3, "x = {x}");
        assert!(y < 9.99 && y > 9.8, "y = {y}");
    }

    #[test]
    fn test_flat_window_is_zero_flux() {
        let mut img = MaskedImage::new(9, 9);
        img.fill_image(75.0);
        let (alg, schema) = centroider(75.0);
        let mut rec = schema.make_record(0);
        let err = alg
            .apply(&mut rec, &img, Point2::new(4.0, 4.0), None)
            .unwrap_err();
        assert_eq!(err, MeasurementError::ZeroFlux);
        assert!(!rec.field_flag(alg.flag_key()));
        assert!(!rec.is_set(alg.position_key(), 0));
    }

    #[test]
    fn test_window_off_image_edge() {
        let img = star_image(10.0, 10.0, 0.0);
        let (alg, schema) = centroider(0.0);
        let mut rec = schema.make_record(0);
        let err = alg
            .apply(&mut rec, &img, Point2::new(0.0, 10.0), None)
            .unwrap_err();
        assert!(matches!(err, MeasurementError::OutsideImage { x: 0, .. }));
    }

    #[test]
    fn test_config_from_params() {
        let mut p = crate::config::Params::new();
        p.set_float("background", 33.0);
        let cfg = NaiveCentroidConfig::from_params(&p).unwrap();
        assert_eq!(cfg.background, 33.0);
        assert_eq!(cfg.name, "centroid");
    }
}
