//! Measurement algorithms: named, independently configured units that
//! consume a source's pixels and write typed fields plus success flags
//! into its record.
//!
//! Every algorithm binds its output fields against a
//! [`Schema`](crate::record::Schema) once, at construction, and is then
//! applied per source by the orchestrator. An algorithm's internal error
//! never aborts the batch: the orchestrator catches it, records a caveat,
//! and moves on.
//!
//! Adding a new measurement means implementing [`Algorithm`] and handing
//! an instance to the orchestrator — nothing else in the framework
//! changes. Shape/second-moment measurement, for example, would slot in
//! here.

pub mod aperture;
pub mod centroid;
pub mod psf_flux;

pub use aperture::{ApertureFlux, ApertureFluxConfig};
pub use centroid::{NaiveCentroid, NaiveCentroidConfig};
pub use psf_flux::{PsfFlux, PsfFluxConfig};

use crate::error::MeasurementError;
use crate::image::MaskedImage;
use crate::psf::Psf;
use crate::record::SourceRecord;
use crate::Point2;

/// One configured measurement, bound to its output fields.
pub trait Algorithm: Send + Sync {
    /// The configured name; also the prefix of the fields it binds.
    fn name(&self) -> &str;

    /// Measure one source at `center` and write the results into
    /// `record`.
    ///
    /// On success the algorithm sets its own field-group success flag(s);
    /// on failure it returns the error and leaves its flags false. The
    /// orchestrator decides what a failure means for the rest of the
    /// source's measurement.
    fn apply(
        &self,
        record: &mut SourceRecord,
        image: &MaskedImage,
        center: Point2,
        psf: Option<&Psf>,
    ) -> Result<(), MeasurementError>;
}
