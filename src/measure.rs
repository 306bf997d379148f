//! The measurement orchestrator: applies the configured algorithms to
//! every detected source, recording results and caveat flags without ever
//! letting one source's failure abort the batch.
//!
//! # Per-source state machine
//!
//! 1. Drive the moment accumulator over the footprint: intensity-weighted
//!    position, extremum pixel, union of mask bits.
//! 2. EDGE bits anywhere set the `EDGE` caveat; an extremum sitting *on*
//!    an EDGE pixel abandons the source (terminal failed-edge state).
//! 3. Interpolated/saturated bits anywhere set advisory flags; processing
//!    continues.
//! 4. Run the centroid algorithm. A window off the image is severe
//!    (`EDGE | PEAKCENTER`, stop); zero net counts fall back to the peak
//!    coordinate with only `PEAKCENTER` set.
//! 5. Run each photometry algorithm at the final position. Failures are
//!    logged and land on that algorithm's own flag slot; the rest still
//!    run.
//! 6. Re-drive the moments over the 3×3 window at the final position to
//!    flag saturation/interpolation specifically near the centroid.
//!
//! One [`FootprintMoments`] instance is pooled per orchestrator and reset
//! between uses — construct one `MeasureSources` per worker and reuse it
//! across sources; never share it between threads.
//! [`measure_batch_parallel`] does exactly that via rayon.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::accumulator::{drive, FootprintMoments};
use crate::algorithms::{
    Algorithm, ApertureFlux, ApertureFluxConfig, NaiveCentroid, NaiveCentroidConfig, PsfFlux,
    PsfFluxConfig,
};
use crate::error::MeasurementError;
use crate::footprint::Footprint;
use crate::image::{index_to_position, position_to_index, BBox, MaskPlane, MaskedImage};
use crate::psf::Psf;
use crate::record::{Schema, SourceFlags, SourceRecord};
use crate::Point2;

/// One detection handed to the orchestrator: a source identity plus its
/// footprint.
#[derive(Debug, Clone)]
pub struct DetectedSource {
    pub id: u64,
    pub footprint: Footprint,
}

/// Which algorithms run, and how they are configured.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureConfig {
    /// Centroid algorithm configuration.
    pub centroid: NaiveCentroidConfig,
    /// Aperture photometry configuration.
    pub aperture: ApertureFluxConfig,
    /// PSF photometry configuration; `None` disables it (e.g. when no
    /// PSF model is available for the exposure).
    pub psf_flux: Option<PsfFluxConfig>,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        MeasureConfig {
            centroid: NaiveCentroidConfig::default(),
            aperture: ApertureFluxConfig::default(),
            psf_flux: Some(PsfFluxConfig::default()),
        }
    }
}

/// Terminal state of one source's pass through the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Measured,
    FailedEdge,
}

/// Per-worker measurement state: the configured algorithms, their bound
/// schema, and the pooled moment accumulator.
pub struct MeasureSources<'a> {
    image: &'a MaskedImage,
    psf: Option<&'a Psf>,
    schema: Schema,
    centroider: NaiveCentroid,
    photometry: Vec<Box<dyn Algorithm>>,
    moments: FootprintMoments,
}

impl std::fmt::Debug for MeasureSources<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasureSources")
            .field("schema", &self.schema)
            .field("n_photometry", &self.photometry.len())
            .finish_non_exhaustive()
    }
}

impl<'a> MeasureSources<'a> {
    /// Bind the configured algorithms against a fresh schema.
    ///
    /// Fails on configuration-level domain errors (bad radii, clashing
    /// field names); per-source failures are never raised from here.
    pub fn new(
        image: &'a MaskedImage,
        psf: Option<&'a Psf>,
        config: &MeasureConfig,
    ) -> Result<MeasureSources<'a>, MeasurementError> {
        let mut schema = Schema::new();
        let centroider = NaiveCentroid::new(config.centroid.clone(), &mut schema)?;
        let mut photometry: Vec<Box<dyn Algorithm>> = Vec::new();
        photometry.push(Box::new(ApertureFlux::new(
            config.aperture.clone(),
            &mut schema,
        )?));
        if let Some(psf_config) = &config.psf_flux {
            photometry.push(Box::new(PsfFlux::new(psf_config.clone(), &mut schema)?));
        }
        Ok(MeasureSources {
            image,
            psf,
            schema,
            centroider,
            photometry,
            moments: FootprintMoments::new(),
        })
    }

    /// The field layout every record of this configuration shares.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The bound centroid algorithm (for key lookups).
    pub fn centroider(&self) -> &NaiveCentroid {
        &self.centroider
    }

    /// Measure one source. Always returns a record; failures are visible
    /// only through flag bits and fallback values.
    pub fn measure_source(&mut self, id: u64, footprint: &Footprint) -> SourceRecord {
        let mut record = self.schema.make_record(id);
        self.run(&mut record, footprint);
        record
    }

    /// Measure every source in order. One record per input, always.
    pub fn measure_batch(&mut self, sources: &[DetectedSource]) -> Vec<SourceRecord> {
        let mut records = Vec::with_capacity(sources.len());
        let mut n_edge = 0usize;
        for source in sources {
            let mut record = self.schema.make_record(source.id);
            if self.run(&mut record, &source.footprint) == Outcome::FailedEdge {
                n_edge += 1;
            }
            records.push(record);
        }
        info!(
            "Measured {} sources ({} abandoned at an edge)",
            sources.len(),
            n_edge
        );
        records
    }

    fn run(&mut self, record: &mut SourceRecord, footprint: &Footprint) -> Outcome {
        let negative = footprint.is_negative();
        if negative {
            record.set_flag(SourceFlags::DETECT_NEGATIVE);
        }

        // Step 1: footprint moments, extremum, mask union
        drive(self.image, footprint, &mut self.moments);
        let Some(peak) = self.moments.peak(negative) else {
            debug!(
                "Source {} has no in-image pixels; marking EDGE",
                record.source_id()
            );
            record.set_flag(SourceFlags::EDGE);
            return Outcome::FailedEdge;
        };
        let bits = self.moments.bits();

        // Step 2: edge policy
        if bits & MaskPlane::Edge.bit() != 0 {
            record.set_flag(SourceFlags::EDGE);
        }
        if self.image.mask_is_set(peak.x, peak.y, MaskPlane::Edge) {
            debug!(
                "Source {} peaks on an EDGE pixel at ({}, {}); abandoning",
                record.source_id(),
                peak.x,
                peak.y
            );
            record.set_flag(SourceFlags::EDGE);
            return Outcome::FailedEdge;
        }

        // Step 3: advisory bits elsewhere in the footprint
        if bits & MaskPlane::Interpolated.bit() != 0 {
            record.set_flag(SourceFlags::INTERP);
        }
        if bits & MaskPlane::Saturated.bit() != 0 {
            record.set_flag(SourceFlags::SATUR);
        }

        // Step 4: centroid, with two-tier fallback
        let seed = Point2::new(index_to_position(peak.x), index_to_position(peak.y));
        let center = match self.centroider.apply(record, self.image, seed, self.psf) {
            Ok(()) => Point2::new(
                record.get(self.centroider.position_key(), 0),
                record.get(self.centroider.position_key(), 1),
            ),
            Err(e @ (MeasurementError::OutsideImage { .. } | MeasurementError::EmptyRegion)) => {
                debug!(
                    "Centroiding source {} at ({}, {}): {}",
                    record.source_id(),
                    peak.x,
                    peak.y,
                    e
                );
                record.set_flag(SourceFlags::EDGE | SourceFlags::PEAKCENTER);
                return Outcome::FailedEdge;
            }
            Err(e) => {
                debug!(
                    "Centroiding source {} at ({}, {}): {}; falling back to the peak",
                    record.source_id(),
                    peak.x,
                    peak.y,
                    e
                );
                record.set(self.centroider.position_key(), 0, seed.x);
                record.set(self.centroider.position_key(), 1, seed.y);
                record.set_flag(SourceFlags::PEAKCENTER);
                seed
            }
        };

        // Step 5: photometry, each algorithm isolated
        for algorithm in &self.photometry {
            if let Err(e) = algorithm.apply(record, self.image, center, self.psf) {
                debug!(
                    "Measuring {} for source {} at ({:.3}, {:.3}): {}",
                    algorithm.name(),
                    record.source_id(),
                    center.x,
                    center.y,
                    e
                );
            }
        }

        // Step 6: mask bits near the final position
        let cx = position_to_index(center.x);
        let cy = position_to_index(center.y);
        if let Ok(window) = Footprint::from_bbox(BBox::new(cx - 1, cy - 1, 3, 3)) {
            drive(self.image, &window, &mut self.moments);
            let bits = self.moments.bits();
            if bits & MaskPlane::Interpolated.bit() != 0 {
                record.set_flag(SourceFlags::INTERP_CENTER);
            }
            if bits & MaskPlane::Saturated.bit() != 0 {
                record.set_flag(SourceFlags::SATUR_CENTER);
            }
        }

        Outcome::Measured
    }
}

/// Measure a batch across rayon workers, one [`MeasureSources`] per
/// worker (accumulators are never shared between threads).
///
/// Records come back in input order, one per source, exactly as the
/// sequential driver produces them. Fails only on configuration-level
/// domain errors.
pub fn measure_batch_parallel(
    image: &MaskedImage,
    psf: Option<&Psf>,
    config: &MeasureConfig,
    sources: &[DetectedSource],
) -> Result<Vec<SourceRecord>, MeasurementError> {
    // Surface configuration errors once, up front
    MeasureSources::new(image, psf, config)?;

    let records: Vec<SourceRecord> = sources
        .par_iter()
        .map_init(
            || {
                MeasureSources::new(image, psf, config)
                    .expect("measurement configuration already validated")
            },
            |worker, source| worker.measure_source(source.id, &source.footprint),
        )
        .collect();
    info!("Measured {} sources in parallel", records.len());
    Ok(records)
}
