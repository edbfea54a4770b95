//! Label measurement.
//!
//! Edge labels are sent to the layout engine as fixed-size boxes, and the
//! adaptive spacing heuristic is derived from those sizes, so every label is
//! measured before the request is built.
//!
//! - [`StringBounder`] - The measurement seam used by the layout pipeline
//! - [`FontBounder`] - Measures with real font metrics through cosmic-text
//! - [`FixedBounder`] - Deterministic per-character metrics

use std::sync::{Arc, Mutex, OnceLock};

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping};
use log::info;

use crate::geometry::Size;

/// Computes the rendered size of a piece of text.
pub trait StringBounder {
    /// Returns the size of `text` once rendered, in pixels.
    ///
    /// Empty text has a zero size.
    fn measure(&self, text: &str) -> Size;
}

impl<T: StringBounder + ?Sized> StringBounder for &T {
    fn measure(&self, text: &str) -> Size {
        (**self).measure(text)
    }
}

/// Shared font database. Loading system fonts is expensive, so it happens once.
static FONT_SYSTEM: OnceLock<Arc<Mutex<FontSystem>>> = OnceLock::new();

fn font_system() -> Arc<Mutex<FontSystem>> {
    Arc::clone(FONT_SYSTEM.get_or_init(|| {
        info!("Initializing FontSystem");
        Arc::new(Mutex::new(FontSystem::new()))
    }))
}

/// Measures text with cosmic-text shaping.
///
/// # Examples
///
/// ```
/// # use strata_core::text::{FontBounder, StringBounder};
/// let bounder = FontBounder::new("sans-serif", 14);
/// assert_eq!(bounder.measure("").width(), 0.0);
/// ```
#[derive(Clone)]
pub struct FontBounder {
    font_family: String,
    font_size: u16,
    font_system: Arc<Mutex<FontSystem>>,
}

impl std::fmt::Debug for FontBounder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBounder")
            .field("font_family", &self.font_family)
            .field("font_size", &self.font_size)
            .finish_non_exhaustive()
    }
}

impl FontBounder {
    pub fn new(font_family: &str, font_size: u16) -> Self {
        Self {
            font_family: font_family.to_string(),
            font_size,
            font_system: font_system(),
        }
    }

    pub fn font_family(&self) -> &str {
        &self.font_family
    }

    pub fn font_size(&self) -> u16 {
        self.font_size
    }

    fn font_size_px(&self) -> f32 {
        // Points to pixels at standard DPI.
        self.font_size as f32 * 1.33
    }

    /// Width estimate used when shaping yields no layout runs.
    fn estimate(&self, text: &str, line_height: f32) -> Size {
        let lines = text.lines().count().max(1);
        let widest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        Size::new(
            widest as f32 * self.font_size_px() * 0.55,
            lines as f32 * line_height,
        )
    }
}

impl StringBounder for FontBounder {
    fn measure(&self, text: &str) -> Size {
        if text.is_empty() {
            return Size::default();
        }

        let font_size_px = self.font_size_px();
        let line_height = font_size_px * 1.15;

        let Ok(mut font_system) = self.font_system.lock() else {
            return self.estimate(text, line_height);
        };

        let metrics = Metrics::new(font_size_px, line_height);
        let mut buffer = Buffer::new(&mut font_system, metrics);
        let mut buffer = buffer.borrow_with(&mut font_system);
        let attrs = Attrs::new().family(Family::Name(&self.font_family));

        buffer.set_size(None, None);
        buffer.set_text(text, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(true);

        let mut max_width: f32 = 0.0;
        let mut total_height: f32 = 0.0;
        let mut runs = 0;
        for run in buffer.layout_runs() {
            if let Some(last) = run.glyphs.last() {
                max_width = max_width.max(last.x + last.w);
            }
            total_height += metrics.line_height;
            runs += 1;
        }

        // No fonts available: shaping produces empty runs.
        if runs == 0 || max_width == 0.0 {
            return self.estimate(text, line_height);
        }
        Size::new(max_width, total_height)
    }
}

/// Measures text with a fixed advance per character and a fixed line height.
///
/// ```
/// # use strata_core::text::{FixedBounder, StringBounder};
/// let bounder = FixedBounder::new(7.0, 16.0);
/// let size = bounder.measure("abc\nde");
/// assert_eq!(size.width(), 21.0);
/// assert_eq!(size.height(), 32.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FixedBounder {
    advance: f32,
    line_height: f32,
}

impl FixedBounder {
    pub fn new(advance: f32, line_height: f32) -> Self {
        Self {
            advance,
            line_height,
        }
    }
}

impl Default for FixedBounder {
    fn default() -> Self {
        Self::new(7.0, 16.0)
    }
}

impl StringBounder for FixedBounder {
    fn measure(&self, text: &str) -> Size {
        if text.is_empty() {
            return Size::default();
        }
        let lines = text.lines().count().max(1);
        let widest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        Size::new(
            widest as f32 * self.advance,
            lines as f32 * self.line_height,
        )
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;

    #[test]
    fn test_fixed_bounder_empty() {
        let size = FixedBounder::default().measure("");
        assert_approx_eq!(f32, size.width(), 0.0);
        assert_approx_eq!(f32, size.height(), 0.0);
    }

    #[test]
    fn test_fixed_bounder_widest_line() {
        let size = FixedBounder::new(10.0, 20.0).measure("a\nabcd\nab");
        assert_approx_eq!(f32, size.width(), 40.0);
        assert_approx_eq!(f32, size.height(), 60.0);
    }

    #[test]
    fn test_font_bounder_non_empty_has_size() {
        let bounder = FontBounder::new("sans-serif", 12);
        let size = bounder.measure("extends");
        assert!(size.width() > 0.0);
        assert!(size.height() > 0.0);
    }

    #[test]
    fn test_font_bounder_longer_text_is_wider() {
        let bounder = FontBounder::new("sans-serif", 12);
        let short = bounder.measure("ab");
        let long = bounder.measure("abababababab");
        assert!(long.width() > short.width());
    }

    #[test]
    fn test_bounder_through_reference() {
        let bounder = FixedBounder::default();
        let by_ref: &dyn StringBounder = &bounder;
        assert_approx_eq!(f32, by_ref.measure("xy").width(), 14.0);
    }
}
