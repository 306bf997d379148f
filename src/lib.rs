//! # starmeas
//!
//! Per-source measurement of astronomical detections: given an image
//! plane (intensity, variance, and mask bits) and the footprints produced
//! by a detection stage, `starmeas` measures positions and fluxes for
//! every source and records the result — including every partial failure
//! — in a typed per-source record.
//!
//! ## Features
//!
//! - **Region accumulators** — resettable visitors (sum, weighted sum,
//!   moments/extrema/mask-union) driven once per footprint pixel, with
//!   double-precision running sums
//! - **PSF models** — single and double Gaussian shapes behind a named
//!   factory registry, so new shapes plug in without touching callers;
//!   sub-pixel rendering normalized to unit flux
//! - **Pluggable algorithms** — 3×3 moment centroiding, multi-radius
//!   aperture photometry, PSF-weighted photometry; each binds its output
//!   fields to the record schema once, at configuration time
//! - **Failure isolation** — the orchestrator converts numeric
//!   degeneracies and geometric exclusions into caveat flags plus
//!   documented fallback values; a batch always yields one record per
//!   input source
//! - **Batch parallelism** — disjoint sources measured across rayon
//!   workers, one accumulator pool per worker
//!
//! ## Example
//!
//! ```no_run
//! use starmeas::{
//!     DetectedSource, Footprint, MaskedImage, MeasureConfig, MeasureSources, Peak, Psf,
//!     SingleGaussian, Span,
//! };
//!
//! // The image plane and footprints come from the detection stage
//! let image = MaskedImage::new(1024, 1024);
//! let footprint = Footprint::from_spans(
//!     vec![Span::new(500, 499, 503), Span::new(501, 498, 504)],
//!     Peak::new(501, 501),
//!     false,
//! )
//! .unwrap();
//!
//! // One PSF model per exposure, built through the factory registry
//! let psf = Psf::construct(SingleGaussian::NAME, 21, 21, &[1.8]).unwrap();
//!
//! let config = MeasureConfig::default();
//! let mut measurer = MeasureSources::new(&image, Some(&psf), &config).unwrap();
//! let sources = vec![DetectedSource { id: 1, footprint }];
//! let records = measurer.measure_batch(&sources);
//!
//! let flux_key = measurer.schema().field("flux.aperture").unwrap();
//! println!("flux in the smallest aperture: {}", records[0].get(flux_key, 0));
//! ```
//!
//! ## Measurement overview
//!
//! 1. **Footprint moments** — one pass over the source's pixels collects
//!    the intensity-weighted position, the extremum pixel, and the union
//!    of mask bits
//! 2. **Edge policy** — sources whose extremum sits on an EDGE-masked
//!    pixel are abandoned with only the EDGE flag set
//! 3. **Centroiding** — a 3×3 weighted moment refines the peak position,
//!    falling back to the peak pixel (with a caveat flag) when the window
//!    has no net counts
//! 4. **Photometry** — every configured flux algorithm runs at the final
//!    position; one algorithm's failure never blocks the others
//! 5. **Near-center recheck** — mask bits within the 3×3 window around
//!    the final position set distinct advisory flags

pub mod accumulator;
pub mod algorithms;
pub mod config;
mod error;
pub mod footprint;
pub mod image;
pub mod measure;
pub mod psf;
pub mod record;

pub use accumulator::{
    drive, FootprintMoments, FootprintSum, FootprintVisitor, FootprintWeightedSum,
};
pub use algorithms::{
    Algorithm, ApertureFlux, ApertureFluxConfig, NaiveCentroid, NaiveCentroidConfig, PsfFlux,
    PsfFluxConfig,
};
pub use config::{Params, StarSelectorConfig, Value};
pub use error::MeasurementError;
pub use footprint::{Footprint, Peak, Span};
pub use image::{
    index_to_position, position_to_index, position_to_index_frac, BBox, MaskPixel, MaskPlane,
    MaskedImage, PixelTriple,
};
pub use measure::{measure_batch_parallel, DetectedSource, MeasureConfig, MeasureSources};
pub use psf::{DoubleGaussian, Psf, PsfImage, PsfKernel, PsfSpec, SingleGaussian};
pub use record::{FieldKey, FlagKey, Schema, SourceFlags, SourceRecord};

// Commonly used types
// Note: pixel data stays f32, but every accumulation and measurement
// result is carried in f64 to bound cancellation error.
pub type Point2 = nalgebra::Point2<f64>;
