//! Footprints: the connected pixel regions that detections hand to the
//! measurement framework.
//!
//! A [`Footprint`] is an ordered set of row [`Span`]s plus a derived
//! bounding box, the detection's peak coordinate, and the detection sign
//! (positive sources peak bright, negative sources peak dim). Footprints
//! are immutable once constructed and never empty; the constructors reject
//! degenerate input so that downstream code can rely on at least one pixel
//! existing.

use crate::error::MeasurementError;
use crate::image::BBox;

/// One row of contiguous pixels: row `y`, columns `x0..=x1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub y: i32,
    pub x0: i32,
    pub x1: i32,
}

impl Span {
    pub fn new(y: i32, x0: i32, x1: i32) -> Span {
        Span { y, x0, x1 }
    }

    /// Number of pixels in the span.
    pub fn len(&self) -> usize {
        (self.x1 - self.x0 + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.x1 < self.x0
    }
}

/// The extremum pixel of a detection: brightest for positive sources,
/// dimmest for negative ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peak {
    pub x: i32,
    pub y: i32,
}

impl Peak {
    pub fn new(x: i32, y: i32) -> Peak {
        Peak { x, y }
    }
}

/// A connected pixel region identifying one detected source.
///
/// Spans are stored sorted by `(y, x0)` and the bounding box always
/// contains every listed coordinate (maintained by construction).
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    spans: Vec<Span>,
    bbox: BBox,
    peak: Peak,
    negative: bool,
}

impl Footprint {
    /// Build a footprint from explicit spans.
    ///
    /// Empty or degenerate spans are dropped; if nothing remains the
    /// result is [`MeasurementError::EmptyRegion`]. Spans are sorted into
    /// scan order and the bounding box is derived from them.
    pub fn from_spans(
        spans: Vec<Span>,
        peak: Peak,
        negative: bool,
    ) -> Result<Footprint, MeasurementError> {
        let mut spans: Vec<Span> = spans.into_iter().filter(|s| !s.is_empty()).collect();
        if spans.is_empty() {
            return Err(MeasurementError::EmptyRegion);
        }
        spans.sort_by_key(|s| (s.y, s.x0));

        let mut min_x = i32::MAX;
        let mut max_x = i32::MIN;
        let mut min_y = i32::MAX;
        let mut max_y = i32::MIN;
        for s in &spans {
            min_x = min_x.min(s.x0);
            max_x = max_x.max(s.x1);
            min_y = min_y.min(s.y);
            max_y = max_y.max(s.y);
        }

        Ok(Footprint {
            spans,
            bbox: BBox::from_corners(min_x, min_y, max_x, max_y),
            peak,
            negative,
        })
    }

    /// A rectangular footprint covering `bbox`, peaked at its center.
    pub fn from_bbox(bbox: BBox) -> Result<Footprint, MeasurementError> {
        if bbox.is_empty() {
            return Err(MeasurementError::EmptyRegion);
        }
        let spans = (bbox.min_y()..=bbox.max_y())
            .map(|y| Span::new(y, bbox.min_x(), bbox.max_x()))
            .collect();
        let peak = Peak::new(
            (bbox.min_x() + bbox.max_x()) / 2,
            (bbox.min_y() + bbox.max_y()) / 2,
        );
        Footprint::from_spans(spans, peak, false)
    }

    /// A circular footprint of the given radius centered at `(cx, cy)`,
    /// clipped to `clip`.
    ///
    /// A pixel belongs to the circle when its center lies within `radius`
    /// of the center pixel. Fails with
    /// [`MeasurementError::EmptyRegion`] when the clipped circle contains
    /// no pixels at all (e.g. it lies entirely outside the image).
    pub fn circle(
        cx: i32,
        cy: i32,
        radius: f64,
        clip: &BBox,
    ) -> Result<Footprint, MeasurementError> {
        if radius < 0.0 {
            return Err(MeasurementError::InvalidParameter(format!(
                "aperture radius may not be negative: {radius}"
            )));
        }
        let ir = radius.floor() as i32;
        let r2 = radius * radius;
        let mut spans = Vec::with_capacity((2 * ir + 1) as usize);
        for dy in -ir..=ir {
            let y = cy + dy;
            if y < clip.min_y() || y > clip.max_y() {
                continue;
            }
            // Half-width of the circle at this row
            let hw = (r2 - (dy * dy) as f64).sqrt().floor() as i32;
            let x0 = (cx - hw).max(clip.min_x());
            let x1 = (cx + hw).min(clip.max_x());
            if x0 <= x1 {
                spans.push(Span::new(y, x0, x1));
            }
        }
        Footprint::from_spans(spans, Peak::new(cx, cy), false)
    }

    /// Bounding box derived from the spans.
    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    /// The peak coordinate supplied by the detection stage.
    pub fn peak(&self) -> Peak {
        self.peak
    }

    /// Whether this is a negative detection (dip below background).
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Total pixel count.
    pub fn area(&self) -> usize {
        self.spans.iter().map(Span::len).sum()
    }

    /// Whether the footprint lists the coordinate `(x, y)`.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.spans
            .iter()
            .any(|s| s.y == y && x >= s.x0 && x <= s.x1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_contains_every_span() {
        let foot = Footprint::from_spans(
            vec![
                Span::new(4, 2, 5),
                Span::new(3, 3, 3),
                Span::new(5, 1, 4),
            ],
            Peak::new(3, 4),
            false,
        )
        .unwrap();

        let bbox = *foot.bbox();
        assert_eq!((bbox.min_x(), bbox.min_y()), (1, 3));
        assert_eq!((bbox.max_x(), bbox.max_y()), (5, 5));
        for s in foot.spans() {
            assert!(bbox.contains(s.x0, s.y));
            assert!(bbox.contains(s.x1, s.y));
        }
        // Spans come back in scan order regardless of input order
        assert_eq!(foot.spans()[0].y, 3);
        assert_eq!(foot.area(), 9);
        assert!(foot.contains(3, 3));
        assert!(!foot.contains(1, 3));
    }

    #[test]
    fn test_empty_spans_rejected() {
        let err = Footprint::from_spans(vec![], Peak::new(0, 0), false).unwrap_err();
        assert_eq!(err, MeasurementError::EmptyRegion);

        // Degenerate spans are dropped, leaving nothing
        let err =
            Footprint::from_spans(vec![Span::new(0, 5, 2)], Peak::new(0, 0), false).unwrap_err();
        assert_eq!(err, MeasurementError::EmptyRegion);
    }

    #[test]
    fn test_circle_radius_zero_is_center_pixel() {
        let clip = BBox::new(0, 0, 20, 20);
        let foot = Footprint::circle(10, 10, 0.0, &clip).unwrap();
        assert_eq!(foot.area(), 1);
        assert!(foot.contains(10, 10));
    }

    #[test]
    fn test_circle_pixel_count_near_pi_r_squared() {
        let clip = BBox::new(0, 0, 100, 100);
        let foot = Footprint::circle(50, 50, 8.0, &clip).unwrap();
        let expected = std::f64::consts::PI * 64.0;
        let got = foot.area() as f64;
        assert!(
            (got - expected).abs() < 0.1 * expected,
            "area {got} too far from {expected}"
        );
    }

    #[test]
    fn test_circle_clipped_to_image_corner() {
        let clip = BBox::new(0, 0, 10, 10);
        let foot = Footprint::circle(0, 0, 3.0, &clip).unwrap();
        // Only the quadrant inside the image survives
        for s in foot.spans() {
            assert!(s.y >= 0 && s.x0 >= 0);
        }
        assert!(foot.area() < 30);
    }

    #[test]
    fn test_circle_fully_outside_is_empty_region() {
        let clip = BBox::new(0, 0, 10, 10);
        let err = Footprint::circle(50, 50, 3.0, &clip).unwrap_err();
        assert_eq!(err, MeasurementError::EmptyRegion);
    }

    #[test]
    fn test_from_bbox_covers_every_pixel() {
        let foot = Footprint::from_bbox(BBox::new(2, 3, 3, 2)).unwrap();
        assert_eq!(foot.area(), 6);
        assert!(foot.contains(2, 3));
        assert!(foot.contains(4, 4));
    }
}
