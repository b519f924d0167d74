//! Crop normalization
//!
//! Converts a pixel selection made on a rendered page image into a
//! resolution-independent fractional rectangle, and back into absolute page
//! units at assembly time. Fractions use a top-left origin on both sides;
//! the PDF y-axis flip happens where the target box is written, not here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Slack applied before clamping so UI rounding overshoot does not reject
/// an otherwise valid selection.
const EPSILON: f64 = 1e-9;

/// Crop errors
#[derive(Debug, Error)]
pub enum CropError {
    #[error("Degenerate crop rectangle: width {width}, height {height}")]
    Degenerate { width: f64, height: f64 },

    #[error("Image dimensions must be positive: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("Crop coordinates are not finite numbers")]
    NotFinite,
}

/// Pixel-space rectangle as reported by the UI cropper
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Absolute rectangle in page units (points), top-left origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Sub-rectangle of a page expressed as fractions of width/height
///
/// Invariants after construction: `0 <= x, y`, `x + width <= 1`,
/// `y + height <= 1`, `width > 0`, `height > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractionalCrop {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FractionalCrop {
    /// Normalize a pixel selection against the rendered image dimensions.
    ///
    /// Coordinates are clamped into `[0,1]` rather than rejected, since UI
    /// rounding can overshoot by a pixel. A rectangle that is degenerate
    /// after clamping is an error.
    pub fn from_pixels(rect: PixelRect, image_width: u32, image_height: u32) -> Result<Self, CropError> {
        if image_width == 0 || image_height == 0 {
            return Err(CropError::EmptyImage {
                width: image_width,
                height: image_height,
            });
        }
        if ![rect.x, rect.y, rect.width, rect.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(CropError::NotFinite);
        }

        let w = f64::from(image_width);
        let h = f64::from(image_height);

        let x0 = (rect.x / w).clamp(0.0, 1.0);
        let y0 = (rect.y / h).clamp(0.0, 1.0);
        let x1 = ((rect.x + rect.width) / w).clamp(0.0, 1.0);
        let y1 = ((rect.y + rect.height) / h).clamp(0.0, 1.0);

        let crop = Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        };
        crop.validate()?;
        Ok(crop)
    }

    /// Validate an externally supplied crop (e.g. from a generate request).
    pub fn validate(&self) -> Result<(), CropError> {
        if ![self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(CropError::NotFinite);
        }
        let degenerate = self.width <= 0.0
            || self.height <= 0.0
            || self.x < -EPSILON
            || self.y < -EPSILON
            || self.x + self.width > 1.0 + EPSILON
            || self.y + self.height > 1.0 + EPSILON;
        if degenerate {
            return Err(CropError::Degenerate {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// The exact inverse of [`from_pixels`](Self::from_pixels): project the
    /// fractions onto a page of the given size (in page units).
    pub fn to_page_rect(&self, page_width: f64, page_height: f64) -> PageRect {
        PageRect {
            x: self.x * page_width,
            y: self.y * page_height,
            width: self.width * page_width,
            height: self.height * page_height,
        }
    }

    /// Parse the `[x, y, w, h]` wire form used by generate requests.
    pub fn from_wire(values: &[f64]) -> Result<Self, CropError> {
        if values.len() != 4 {
            return Err(CropError::NotFinite);
        }
        let crop = Self {
            x: values[0],
            y: values[1],
            width: values[2],
            height: values[3],
        };
        crop.validate()?;
        Ok(crop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn round_trip_within_epsilon() {
        let rects = [
            PixelRect { x: 0.0, y: 0.0, width: 800.0, height: 600.0 },
            PixelRect { x: 80.0, y: 60.0, width: 400.0, height: 180.0 },
            PixelRect { x: 1.0, y: 1.0, width: 1.0, height: 1.0 },
            PixelRect { x: 123.5, y: 47.25, width: 301.75, height: 99.5 },
        ];
        for rect in rects {
            let crop = FractionalCrop::from_pixels(rect, 800, 600).unwrap();
            let back = crop.to_page_rect(800.0, 600.0);
            assert_close(back.x, rect.x);
            assert_close(back.y, rect.y);
            assert_close(back.width, rect.width);
            assert_close(back.height, rect.height);
        }
    }

    #[test]
    fn overshoot_is_clamped_not_rejected() {
        let rect = PixelRect { x: -3.0, y: 590.0, width: 810.0, height: 40.0 };
        let crop = FractionalCrop::from_pixels(rect, 800, 600).unwrap();
        assert!(crop.x >= 0.0 && crop.y >= 0.0);
        assert!(crop.x + crop.width <= 1.0 + 1e-9);
        assert!(crop.y + crop.height <= 1.0 + 1e-9);
    }

    #[test]
    fn degenerate_after_clamping_is_rejected() {
        // Entirely outside the image: clamps to zero width
        let rect = PixelRect { x: 900.0, y: 0.0, width: 50.0, height: 50.0 };
        let err = FractionalCrop::from_pixels(rect, 800, 600).unwrap_err();
        assert!(matches!(err, CropError::Degenerate { .. }));

        let rect = PixelRect { x: 10.0, y: 10.0, width: 0.0, height: 50.0 };
        assert!(FractionalCrop::from_pixels(rect, 800, 600).is_err());

        let rect = PixelRect { x: 10.0, y: 10.0, width: -5.0, height: 50.0 };
        assert!(FractionalCrop::from_pixels(rect, 800, 600).is_err());
    }

    #[test]
    fn zero_image_dimensions_rejected() {
        let rect = PixelRect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 };
        assert!(matches!(
            FractionalCrop::from_pixels(rect, 0, 600),
            Err(CropError::EmptyImage { .. })
        ));
    }

    #[test]
    fn non_finite_input_rejected() {
        let rect = PixelRect { x: f64::NAN, y: 0.0, width: 10.0, height: 10.0 };
        assert!(matches!(
            FractionalCrop::from_pixels(rect, 800, 600),
            Err(CropError::NotFinite)
        ));
    }

    #[test]
    fn wire_form_parses_and_validates() {
        let crop = FractionalCrop::from_wire(&[0.1, 0.1, 0.5, 0.3]).unwrap();
        assert_close(crop.width, 0.5);
        assert!(FractionalCrop::from_wire(&[0.1, 0.1, 0.5]).is_err());
        assert!(FractionalCrop::from_wire(&[0.8, 0.1, 0.5, 0.3]).is_err());
    }

    #[test]
    fn projection_scales_to_page_units() {
        let crop = FractionalCrop { x: 0.1, y: 0.1, width: 0.5, height: 0.3 };
        let rect = crop.to_page_rect(612.0, 792.0);
        assert_close(rect.x, 61.2);
        assert_close(rect.y, 79.2);
        assert_close(rect.width, 306.0);
        assert_close(rect.height, 237.6);
    }
}
