//! Point-spread-function models.
//!
//! A [`Psf`] pairs a parametrized 2-D shape kernel with a configured
//! render size. Shapes are constructed through a process-wide **factory
//! registry** keyed by name, so new shapes can be added without touching
//! any caller:
//!
//! 1. [`Psf::register`] a constructor at process start (the built-in
//!    shapes are registered automatically);
//! 2. [`Psf::construct`] by name at configuration time — unknown names
//!    fail with [`MeasurementError::UnknownPsfShape`].
//!
//! The registry is read-mostly after startup and supports concurrent
//! lookups; registration is expected to finish before any concurrent
//! measurement begins.
//!
//! A constructed `Psf` is immutable and `Send + Sync`: build it once per
//! exposure and share it by reference with every algorithm that needs it.
//!
//! # Persistence
//!
//! A PSF serializes as a [`PsfSpec`] — a versioned record of exactly the
//! shape name and its parameter set. Decoding reconstructs the model
//! through the same registry used at runtime and rejects unknown versions
//! explicitly.

pub mod double_gaussian;
pub mod gaussian;

pub use double_gaussian::DoubleGaussian;
pub use gaussian::SingleGaussian;

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use anyhow::Context;
use once_cell::sync::Lazy;
use rkyv::{Archive, Deserialize, Serialize};

use crate::error::MeasurementError;
use crate::image::position_to_index_frac;

// ── Shape kernels ───────────────────────────────────────────────────────────

/// A parametrized 2-D PSF shape.
///
/// `evaluate` is unnormalized with central amplitude 1.0 at the origin;
/// normalization to unit total flux happens when the model is rendered to
/// a pixel grid.
pub trait PsfKernel: Send + Sync + fmt::Debug {
    /// Registry name of this shape.
    fn shape_name(&self) -> &'static str;

    /// The shape's parameter set, in the order its constructor takes them.
    fn params(&self) -> Vec<f64>;

    /// Value at offset `(dx, dy)` from the kernel center.
    fn evaluate(&self, dx: f64, dy: f64) -> f64;
}

/// Constructor signature stored in the factory registry.
pub type PsfConstructor = fn(&[f64]) -> Result<Box<dyn PsfKernel>, MeasurementError>;

static REGISTRY: Lazy<RwLock<HashMap<&'static str, PsfConstructor>>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, PsfConstructor> = HashMap::new();
    map.insert(SingleGaussian::NAME, SingleGaussian::construct);
    map.insert(DoubleGaussian::NAME, DoubleGaussian::construct);
    RwLock::new(map)
});

// ── Rendered image ──────────────────────────────────────────────────────────

/// A PSF rendered to a finite pixel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PsfImage {
    width: i32,
    height: i32,
    data: Vec<f64>,
}

impl PsfImage {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Value at grid cell `(ix, iy)`, row-major from the lower-left.
    pub fn value(&self, ix: i32, iy: i32) -> f64 {
        self.data[(iy * self.width + ix) as usize]
    }

    /// Sum over all grid cells.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

// ── Serialized form ─────────────────────────────────────────────────────────

/// Current encoding version written by [`Psf::spec`].
pub const PSF_SPEC_VERSION: u16 = 1;

/// Versioned serialized form of a PSF: exactly the shape name, render
/// size, and parameter set.
///
/// Decoding goes through [`Psf::from_spec`], which reconstructs the model
/// via the factory registry and rejects unknown versions.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct PsfSpec {
    pub version: u16,
    pub shape: String,
    pub width: i32,
    pub height: i32,
    pub params: Vec<f64>,
}

// ── The model ───────────────────────────────────────────────────────────────

/// A point-spread-function model: a shape kernel plus a configured render
/// size.
#[derive(Debug)]
pub struct Psf {
    width: i32,
    height: i32,
    kernel: Box<dyn PsfKernel>,
}

impl Psf {
    /// Register a shape constructor under `name`.
    ///
    /// Call before any concurrent measurement begins. Registering a name
    /// twice replaces the previous constructor.
    pub fn register(name: &'static str, constructor: PsfConstructor) {
        REGISTRY
            .write()
            .expect("PSF registry poisoned")
            .insert(name, constructor);
    }

    /// Whether a shape is registered under `name`.
    pub fn is_registered(name: &str) -> bool {
        REGISTRY
            .read()
            .expect("PSF registry poisoned")
            .contains_key(name)
    }

    /// Names of every registered shape, sorted.
    pub fn registered_shapes() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = REGISTRY
            .read()
            .expect("PSF registry poisoned")
            .keys()
            .copied()
            .collect();
        names.sort_unstable();
        names
    }

    /// Construct a model by registered shape name.
    ///
    /// `width` and `height` set the render grid size and must be
    /// positive. Unknown names fail with
    /// [`MeasurementError::UnknownPsfShape`]; parameter validation is the
    /// shape constructor's.
    pub fn construct(
        name: &str,
        width: i32,
        height: i32,
        params: &[f64],
    ) -> Result<Psf, MeasurementError> {
        if width <= 0 || height <= 0 {
            return Err(MeasurementError::InvalidParameter(format!(
                "PSF render size must be positive, got {width}x{height}"
            )));
        }
        let constructor = REGISTRY
            .read()
            .expect("PSF registry poisoned")
            .get(name)
            .copied()
            .ok_or_else(|| MeasurementError::UnknownPsfShape(name.to_string()))?;
        Ok(Psf {
            width,
            height,
            kernel: constructor(params)?,
        })
    }

    /// Width of the render grid in pixels.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height of the render grid in pixels.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Registry name of the underlying shape.
    pub fn shape_name(&self) -> &'static str {
        self.kernel.shape_name()
    }

    /// The shape's parameter set.
    pub fn params(&self) -> Vec<f64> {
        self.kernel.params()
    }

    /// Kernel value at offset `(dx, dy)` from the center; central
    /// amplitude is 1.0 at the origin.
    pub fn evaluate(&self, dx: f64, dy: f64) -> f64 {
        self.kernel.evaluate(dx, dy)
    }

    /// Render the model at floating-point position `(x, y)`, normalized
    /// so the grid sums to 1.
    ///
    /// The grid has the configured width and height with the kernel
    /// center within pixel `(width/2, height/2)`; the fractional parts of
    /// `(x, y)` shift the evaluation lattice so sub-pixel positions are
    /// reproduced.
    pub fn image_at(&self, x: f64, y: f64) -> Result<PsfImage, MeasurementError> {
        let image = self.render(x, y);
        let sum = image.sum();
        if sum <= 0.0 {
            return Err(MeasurementError::ZeroFlux);
        }
        let mut image = image;
        for v in &mut image.data {
            *v /= sum;
        }
        Ok(image)
    }

    /// Render the model at `(x, y)` without normalizing.
    pub fn image_at_raw(&self, x: f64, y: f64) -> PsfImage {
        self.render(x, y)
    }

    fn render(&self, x: f64, y: f64) -> PsfImage {
        let (_, dx) = position_to_index_frac(x);
        let (_, dy) = position_to_index_frac(y);

        let xcen = (self.width / 2) as f64;
        let ycen = (self.height / 2) as f64;

        let mut data = Vec::with_capacity((self.width * self.height) as usize);
        for iy in 0..self.height {
            for ix in 0..self.width {
                data.push(
                    self.kernel
                        .evaluate(ix as f64 - dx - xcen, iy as f64 - dy - ycen),
                );
            }
        }
        PsfImage {
            width: self.width,
            height: self.height,
            data,
        }
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// The versioned serialized form of this model.
    pub fn spec(&self) -> PsfSpec {
        PsfSpec {
            version: PSF_SPEC_VERSION,
            shape: self.shape_name().to_string(),
            width: self.width,
            height: self.height,
            params: self.params(),
        }
    }

    /// Reconstruct a model from its serialized form via the registry.
    ///
    /// Fails with [`MeasurementError::UnsupportedVersion`] for versions
    /// this build does not understand and with
    /// [`MeasurementError::UnknownPsfShape`] if the named shape is not
    /// registered.
    pub fn from_spec(spec: &PsfSpec) -> Result<Psf, MeasurementError> {
        if spec.version != PSF_SPEC_VERSION {
            return Err(MeasurementError::UnsupportedVersion(spec.version));
        }
        Psf::construct(&spec.shape, spec.width, spec.height, &spec.params)
    }

    /// Serialize the spec to bytes using rkyv.
    pub fn to_rkyv_bytes(&self) -> Vec<u8> {
        rkyv::to_bytes::<rkyv::rancor::Error>(&self.spec())
            .expect("rkyv serialization failed")
            .to_vec()
    }

    /// Decode a model from rkyv bytes produced by
    /// [`to_rkyv_bytes`](Self::to_rkyv_bytes).
    pub fn from_rkyv_bytes(bytes: &[u8]) -> anyhow::Result<Psf> {
        let spec = rkyv::from_bytes::<PsfSpec, rkyv::rancor::Error>(bytes)
            .map_err(|e| anyhow::anyhow!("rkyv deserialization failed: {}", e))?;
        Ok(Psf::from_spec(&spec)?)
    }

    /// Save the model's spec to a file.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        std::fs::write(path, self.to_rkyv_bytes())
            .with_context(|| format!("Failed to write PSF spec to {path}"))?;
        Ok(())
    }

    /// Load a model from a file written by [`save_to_file`](Self::save_to_file).
    pub fn load_from_file(path: &str) -> anyhow::Result<Psf> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read PSF spec from {path}"))?;
        Psf::from_rkyv_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_shapes_registered() {
        assert!(Psf::is_registered(SingleGaussian::NAME));
        assert!(Psf::is_registered(DoubleGaussian::NAME));
        assert!(!Psf::is_registered("NotAShape"));
    }

    #[test]
    fn test_unknown_shape_fails() {
        let err = Psf::construct("NotAShape", 15, 15, &[1.0]).unwrap_err();
        assert_eq!(
            err,
            MeasurementError::UnknownPsfShape("NotAShape".to_string())
        );
    }

    #[test]
    fn test_register_then_construct() {
        // A trivial flat-top kernel registered at "runtime"
        #[derive(Debug)]
        struct Tophat {
            radius: f64,
        }
        impl PsfKernel for Tophat {
            fn shape_name(&self) -> &'static str {
                "Tophat"
            }
            fn params(&self) -> Vec<f64> {
                vec![self.radius]
            }
            fn evaluate(&self, dx: f64, dy: f64) -> f64 {
                if dx * dx + dy * dy <= self.radius * self.radius {
                    1.0
                } else {
                    0.0
                }
            }
        }

        fn construct_tophat(params: &[f64]) -> Result<Box<dyn PsfKernel>, MeasurementError> {
            Ok(Box::new(Tophat { radius: params[0] }))
        }

        Psf::register("Tophat", construct_tophat);
        let psf = Psf::construct("Tophat", 11, 11, &[2.0]).unwrap();
        // Central amplitude convention holds for registered shapes
        assert_eq!(psf.evaluate(0.0, 0.0), 1.0);
        assert!(Psf::registered_shapes().contains(&"Tophat"));
    }

    #[test]
    fn test_nonpositive_render_size_rejected() {
        assert!(Psf::construct(SingleGaussian::NAME, 0, 15, &[2.0]).is_err());
        assert!(Psf::construct(SingleGaussian::NAME, 15, -1, &[2.0]).is_err());
    }

    #[test]
    fn test_rendered_grid_sums_to_one() {
        for (name, params) in [
            (SingleGaussian::NAME, vec![1.7]),
            (DoubleGaussian::NAME, vec![1.2, 3.0, 0.1]),
        ] {
            let psf = Psf::construct(name, 21, 21, &params).unwrap();
            for (x, y) in [(0.0, 0.0), (100.3, 57.8), (-4.5, 3.25)] {
                let image = psf.image_at(x, y).unwrap();
                assert!(
                    (image.sum() - 1.0).abs() < 1e-9,
                    "{name} at ({x}, {y}) sums to {}",
                    image.sum()
                );
            }
        }
    }

    #[test]
    fn test_subpixel_shift_moves_center_of_mass() {
        let psf = Psf::construct(SingleGaussian::NAME, 21, 21, &[2.0]).unwrap();
        let centered = psf.image_at(50.0, 50.0).unwrap();
        let shifted = psf.image_at(50.3, 50.0).unwrap();

        let com_x = |img: &PsfImage| {
            let mut sx = 0.0;
            for iy in 0..img.height() {
                for ix in 0..img.width() {
                    sx += ix as f64 * img.value(ix, iy);
                }
            }
            sx
        };
        let delta = com_x(&shifted) - com_x(&centered);
        assert!((delta - 0.3).abs() < 1e-3, "com shift {delta}");
    }

    #[test]
    fn test_raw_render_is_unnormalized() {
        let psf = Psf::construct(SingleGaussian::NAME, 15, 15, &[2.0]).unwrap();
        let raw = psf.image_at_raw(0.0, 0.0);
        // Central pixel carries the unit amplitude; the sum is well above 1
        assert!((raw.value(7, 7) - 1.0).abs() < 1e-12);
        assert!(raw.sum() > 1.0);
    }

    #[test]
    fn test_spec_round_trip() {
        let psf = Psf::construct(DoubleGaussian::NAME, 17, 17, &[1.5, 3.5, 0.08]).unwrap();
        let spec = psf.spec();
        let restored = Psf::from_spec(&spec).unwrap();
        assert_eq!(restored.shape_name(), DoubleGaussian::NAME);
        assert_eq!(restored.params(), psf.params());
        assert_eq!(restored.width(), 17);

        let bytes = psf.to_rkyv_bytes();
        let restored = Psf::from_rkyv_bytes(&bytes).unwrap();
        assert_eq!(restored.spec(), spec);
    }

    #[test]
    fn test_spec_unknown_version_rejected() {
        let mut spec = Psf::construct(SingleGaussian::NAME, 15, 15, &[2.0])
            .unwrap()
            .spec();
        spec.version = 99;
        assert_eq!(
            Psf::from_spec(&spec).unwrap_err(),
            MeasurementError::UnsupportedVersion(99)
        );
    }
}
