//! PSF photometry: flux estimated by weighting pixels with the
//! point-spread-function model rendered at the source position.

use crate::accumulator::{drive, FootprintWeightedSum};
use crate::algorithms::Algorithm;
use crate::error::MeasurementError;
use crate::footprint::Footprint;
use crate::image::{position_to_index, BBox, MaskedImage};
use crate::psf::Psf;
use crate::record::{FieldKey, FlagKey, Schema, SourceRecord};
use crate::Point2;

/// Configuration for [`PsfFlux`].
#[derive(Debug, Clone, PartialEq)]
pub struct PsfFluxConfig {
    /// Output-field name. Default: "flux.psf".
    pub name: String,
}

impl Default for PsfFluxConfig {
    fn default() -> Self {
        PsfFluxConfig {
            name: "flux.psf".to_string(),
        }
    }
}

impl PsfFluxConfig {
    /// Build from a flat parameter dictionary (`name`).
    pub fn from_params(
        params: &crate::config::Params,
    ) -> Result<PsfFluxConfig, MeasurementError> {
        let d = PsfFluxConfig::default();
        Ok(PsfFluxConfig {
            name: params.str_or("name", &d.name)?,
        })
    }
}

/// PSF-weighted flux over the model's render box.
///
/// The PSF is rendered at the source's sub-pixel position and used as the
/// weight grid `w` (unit sum): flux = Σ w·I / Σ w², so a source exactly
/// proportional to the model recovers its total flux; uncertainty =
/// √(Σ w²·V) / Σ w².
///
/// The weight grid must cover its full render box: a source close enough
/// to the boundary that the box is clipped fails with
/// [`MeasurementError::SizeMismatch`] and only this algorithm's flag
/// stays unset.
#[derive(Debug, Clone)]
pub struct PsfFlux {
    config: PsfFluxConfig,
    flux_key: FieldKey,
    err_key: FieldKey,
    flag_key: FlagKey,
}

impl PsfFlux {
    /// Bind output fields (`<name>`, `<name>.err`, `<name>.flag`) and
    /// build the algorithm.
    pub fn new(config: PsfFluxConfig, schema: &mut Schema) -> Result<PsfFlux, MeasurementError> {
        let flux_key = schema.add_field(&config.name, 1, "flux weighted by the PSF model")?;
        let err_key = schema.add_field(
            &format!("{}.err", config.name),
            1,
            "uncertainty of the PSF-weighted flux",
        )?;
        let flag_key = schema.add_flag(&format!("{}.flag", config.name))?;
        Ok(PsfFlux {
            config,
            flux_key,
            err_key,
            flag_key,
        })
    }

    pub fn flux_key(&self) -> FieldKey {
        self.flux_key
    }

    pub fn err_key(&self) -> FieldKey {
        self.err_key
    }

    pub fn flag_key(&self) -> FlagKey {
        self.flag_key
    }
}

impl Algorithm for PsfFlux {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn apply(
        &self,
        record: &mut SourceRecord,
        image: &MaskedImage,
        center: Point2,
        psf: Option<&Psf>,
    ) -> Result<(), MeasurementError> {
        let psf = psf.ok_or(MeasurementError::MissingPsf)?;

        let ixcen = position_to_index(center.x);
        let iycen = position_to_index(center.y);
        let psf_bbox = BBox::new(
            ixcen - psf.width() / 2,
            iycen - psf.height() / 2,
            psf.width(),
            psf.height(),
        );
        let foot = Footprint::from_bbox(psf_bbox.clipped_to(&image.bbox()))?;

        let weights = psf.image_at(center.x, center.y)?;
        let mut acc = FootprintWeightedSum::new(psf.width(), psf.height(), weights.into_vec())?;
        // Fails when the render box was clipped by the image boundary
        acc.bind_region(foot.bbox())?;
        drive(image, &foot, &mut acc);

        let sum_w2 = acc.sum_weights_sq();
        if acc.n() == 0 || sum_w2 == 0.0 {
            return Err(MeasurementError::EmptyRegion);
        }

        record.set(self.flux_key, 0, acc.sum() / sum_w2);
        record.set(self.err_key, 0, acc.sum_variance().sqrt() / sum_w2);
        record.set_field_flag(self.flag_key, true);
        Ok(())
    }
}
