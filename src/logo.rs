//! Logo placement and the matrix zone it reserves.

use crate::asset::Asset;
use crate::color::Color;
use crate::geometry::CornerRadii;
use crate::matrix::ModuleMatrix;
use crate::scene::{AspectRatio, ImageNode, Node, Shape};
use kurbo::Rect;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest logo size, as a fraction of the symbol.
pub const MAX_LOGO_FRACTION: f64 = 0.3;

fn default_logo_size() -> f64 {
    0.2
}

fn default_logo_background() -> Color {
    Color::WHITE
}

fn default_border_color() -> Color {
    Color::TRANSPARENT
}

/// A logo drawn over the middle of the symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoOptions {
    /// Opaque reference handed to the asset resolver.
    pub source: String,
    /// Fraction of the symbol size, clamped to [`MAX_LOGO_FRACTION`].
    #[serde(default = "default_logo_size")]
    pub size: f64,
    #[serde(default = "default_logo_background")]
    pub background_color: Color,
    #[serde(default)]
    pub border_radius: f64,
    #[serde(default = "default_border_color")]
    pub border_color: Color,
    #[serde(default)]
    pub border_width: f64,
    /// Space between the image and the edge of its background.
    #[serde(default)]
    pub padding: f64,
}

impl LogoOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            size: default_logo_size(),
            background_color: default_logo_background(),
            border_radius: 0.0,
            border_color: default_border_color(),
            border_width: 0.0,
            padding: 0.0,
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_border(mut self, width: f64, color: Color) -> Self {
        self.border_width = width;
        self.border_color = color;
        self
    }

    pub fn with_border_radius(mut self, radius: f64) -> Self {
        self.border_radius = radius;
        self
    }

    pub fn with_background_color(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}

/// Pixel footprint of a logo on a `symbol_size` symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogoLayout {
    pub symbol_size: f64,
    /// The image itself.
    pub logo_size: f64,
    /// Image plus padding on both sides.
    pub background_size: f64,
    /// Background plus border on both sides.
    pub total_size: f64,
    pub border_width: f64,
    pub padding: f64,
}

impl LogoLayout {
    pub fn compute(symbol_size: f64, options: &LogoOptions) -> Self {
        let fraction = if options.size.is_finite() { options.size } else { default_logo_size() };
        let logo_size = (symbol_size * fraction).min(symbol_size * MAX_LOGO_FRACTION).max(0.0);
        let padding = non_negative(options.padding);
        let border_width = non_negative(options.border_width);
        let background_size = logo_size + 2.0 * padding;
        Self {
            symbol_size,
            logo_size,
            background_size,
            total_size: background_size + 2.0 * border_width,
            border_width,
            padding,
        }
    }

    /// Offset of the footprint from the symbol's top-left corner, on both axes.
    pub fn origin(&self) -> f64 {
        (self.symbol_size - self.total_size) / 2.0
    }

    pub fn border_rect(&self) -> Rect {
        let o = self.origin();
        Rect::new(o, o, o + self.total_size, o + self.total_size)
    }

    pub fn background_rect(&self) -> Rect {
        self.border_rect().inset(-self.border_width)
    }

    pub fn image_rect(&self) -> Rect {
        self.background_rect().inset(-self.padding)
    }

    /// Radius, in cells, of the zone cleared in an `n`-module matrix.
    pub fn clear_radius(&self, n: usize) -> usize {
        if n == 0 || self.symbol_size <= 0.0 || !self.symbol_size.is_finite() {
            return 0;
        }
        ((self.total_size / self.symbol_size) * n as f64 / 2.0).ceil().max(0.0) as usize
    }
}

/// A matrix with the logo zone cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoReservation {
    pub matrix: ModuleMatrix,
    /// Clearing radius in cells.
    pub radius: usize,
    /// Cells inside the zone, dark or not.
    pub zone_cells: usize,
}

/// Clears every module closer than the clearing radius to the matrix center.
///
/// The input is left untouched; the cleared copy is returned.
pub fn reserve_logo_zone(matrix: &ModuleMatrix, layout: &LogoLayout) -> LogoReservation {
    let n = matrix.size();
    let radius = layout.clear_radius(n);
    let mut cleared = matrix.clone();
    let mut zone_cells = 0;
    if n > 0 {
        let center = (n / 2) as f64;
        let limit = radius as f64;
        for y in 0..n {
            for x in 0..n {
                let dist = (x as f64 - center).hypot(y as f64 - center);
                if dist < limit {
                    cleared.set(x, y, false);
                    zone_cells += 1;
                }
            }
        }
    }
    debug!(radius, zone_cells, "reserved logo zone");
    LogoReservation { matrix: cleared, radius, zone_cells }
}

/// Border, background and image of the logo.
pub fn logo_nodes(layout: &LogoLayout, options: &LogoOptions, asset: Asset) -> Vec<Node> {
    let radius = non_negative(options.border_radius);
    let inner_radius = (radius - layout.border_width).max(0.0);
    vec![
        Node::fill(
            Shape::rounded_rect(layout.border_rect(), CornerRadii::uniform(radius)),
            options.border_color,
        ),
        Node::fill(
            Shape::rounded_rect(layout.background_rect(), CornerRadii::uniform(inner_radius)),
            options.background_color,
        ),
        Node::Image(ImageNode {
            asset,
            rect: layout.image_rect(),
            aspect: AspectRatio::MID_SLICE,
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use proptest::prelude::*;

    fn full_matrix(n: usize) -> ModuleMatrix {
        ModuleMatrix::from_rows(&vec![vec![true; n]; n]).unwrap()
    }

    #[test]
    fn test_layout_footprint() {
        let opts = LogoOptions::new("logo").with_size(0.2).with_padding(5.0).with_border(2.0, Color::BLACK);
        let layout = LogoLayout::compute(200.0, &opts);
        assert_eq!(layout.logo_size, 40.0);
        assert_eq!(layout.background_size, 50.0);
        assert_eq!(layout.total_size, 54.0);
        assert_eq!(layout.origin(), 73.0);
        assert_eq!(layout.background_rect(), Rect::new(75.0, 75.0, 125.0, 125.0));
        assert_eq!(layout.image_rect(), Rect::new(80.0, 80.0, 120.0, 120.0));
    }

    #[test]
    fn test_size_clamped() {
        let layout = LogoLayout::compute(200.0, &LogoOptions::new("logo").with_size(0.9));
        assert!((layout.logo_size - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_clear_radius_and_zone() {
        let opts = LogoOptions::new("logo").with_size(0.2);
        let layout = LogoLayout::compute(210.0, &opts);
        // 42px of 210px over 21 modules spans 4.2 modules, radius ceil(2.1) = 3
        assert_eq!(layout.clear_radius(21), 3);

        let matrix = full_matrix(21);
        let reservation = reserve_logo_zone(&matrix, &layout);
        assert_eq!(reservation.radius, 3);
        assert!(!reservation.matrix.get(10, 10));
        assert!(!reservation.matrix.get(12, 10));
        assert!(reservation.matrix.get(13, 10));
        assert!(!reservation.matrix.get(12, 12));
        assert!(reservation.matrix.get(13, 12));
        assert_eq!(reservation.matrix.dark_count(), 21 * 21 - reservation.zone_cells);
        assert_eq!(matrix.dark_count(), 21 * 21);
    }

    #[test]
    fn test_border_radius_inset() {
        let opts = LogoOptions::new("logo").with_border(4.0, Color::BLACK).with_border_radius(10.0);
        let layout = LogoLayout::compute(200.0, &opts);
        let asset = Asset::new("logo", RgbaImage::new(2, 2));
        let nodes = logo_nodes(&layout, &opts, asset);
        assert_eq!(nodes.len(), 3);
        match &nodes[1] {
            Node::Fill(fill) => assert_eq!(
                fill.shape,
                Shape::rounded_rect(layout.background_rect(), CornerRadii::uniform(6.0))
            ),
            other => panic!("expected background fill, got {other:?}"),
        }
        match &nodes[2] {
            Node::Image(img) => assert_eq!(img.aspect, AspectRatio::MID_SLICE),
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn test_options_defaults_from_json() {
        let opts: LogoOptions = serde_json::from_str(r#"{"source": "logo.png"}"#).unwrap();
        assert_eq!(opts, LogoOptions::new("logo.png"));
        assert_eq!(opts.border_color, Color::TRANSPARENT);
    }

    proptest! {
        #[test]
        fn test_clearing_is_monotonic(
            a in 0.0f64..0.5,
            b in 0.0f64..0.5,
            padding in 0.0f64..10.0,
            version in 1usize..=10,
        ) {
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            let n = 17 + 4 * version;
            let matrix = full_matrix(n);
            let count = |size: f64| {
                let opts = LogoOptions::new("logo").with_size(size).with_padding(padding);
                reserve_logo_zone(&matrix, &LogoLayout::compute(300.0, &opts)).zone_cells
            };
            prop_assert!(count(small) <= count(large));
        }
    }
}
