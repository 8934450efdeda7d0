//! Finder pattern ("eye") shapes.
//!
//! Square and circle eyes are three nested layers. Painted normally they are built as a stencil:
//! the eye color shows through a mask that is white inside the outer layer and black inside the
//! middle one, then the middle and core layers are filled on top. Dot, triangle and heart eyes are
//! a 7×7 grid of small glyphs instead.

use crate::color::Color;
use crate::geometry::{CornerRadii, LayerRadius, EYE_ZONE};
use crate::piece::heart_path;
use crate::scene::{Node, Shape};
use kurbo::{BezPath, Point, Rect};
use serde::{Deserialize, Serialize};

/// Per-layer size multipliers. `outer` is the 7×7 ring, `center` the 5×5 gap, `inner` the 3×3 core.
///
/// A multiplier `m` makes a square layer `m + 6`, `m + 4` and `m + 2` cells wide respectively, so
/// the default of 1 gives the standard 7/5/3 pattern. Zero or non-finite multipliers count as 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EyeSize {
    #[serde(default = "one")]
    pub outer: f64,
    #[serde(default = "one")]
    pub center: f64,
    #[serde(default = "one")]
    pub inner: f64,
}

fn one() -> f64 {
    1.0
}

impl Default for EyeSize {
    fn default() -> Self {
        Self { outer: 1.0, center: 1.0, inner: 1.0 }
    }
}

fn multiplier(m: f64) -> f64 {
    if m.is_finite() && m != 0.0 {
        m
    } else {
        1.0
    }
}

/// Corner radii of the three square layers, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EyeRadii {
    pub outer: CornerRadii,
    /// The 5×5 gap layer.
    pub middle: CornerRadii,
    /// The 3×3 core.
    pub core: CornerRadii,
}

/// Shape of one eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EyeShape {
    Square { radii: EyeRadii, size: EyeSize },
    Circle { size: EyeSize },
    Dot,
    Triangle,
    Heart,
}

impl Default for EyeShape {
    fn default() -> Self {
        EyeShape::Square {
            radii: EyeRadii::default(),
            size: EyeSize::default(),
        }
    }
}

/// Styling of one eye. Unset colors fall back to the symbol's colors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEyeOptions", into = "RawEyeOptions")]
pub struct EyeOptions {
    pub shape: EyeShape,
    pub color: Option<Color>,
    /// Core color; defaults to `color`.
    pub inner_color: Option<Color>,
    /// Gap color; defaults to the symbol background.
    pub background_color: Option<Color>,
    /// Glyph radius of dot-family eyes, relative to the cell.
    pub dot_size_ratio: f64,
}

impl Default for EyeOptions {
    fn default() -> Self {
        Self {
            shape: EyeShape::default(),
            color: None,
            inner_color: None,
            background_color: None,
            dot_size_ratio: 0.5,
        }
    }
}

impl EyeOptions {
    pub fn new(shape: EyeShape) -> Self {
        Self { shape, ..Self::default() }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_inner_color(mut self, color: Color) -> Self {
        self.inner_color = Some(color);
        self
    }

    pub fn with_background_color(mut self, color: Color) -> Self {
        self.background_color = Some(color);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEyeRadius {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radius_outer: Option<LayerRadius>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radius_inner: Option<LayerRadius>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radius_center: Option<LayerRadius>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEyeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inner_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    background_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dot_size_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radius: Option<RawEyeRadius>,
    /// Radii may also sit directly on the eye record.
    #[serde(flatten)]
    flat_radius: RawEyeRadius,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<EyeSize>,
}

fn layer(nested: Option<LayerRadius>, flat: Option<LayerRadius>) -> CornerRadii {
    nested.or(flat).map(|r| r.normalize()).unwrap_or_default()
}

fn to_layer(r: CornerRadii) -> Option<LayerRadius> {
    if r.is_zero() {
        None
    } else if r.is_uniform() {
        Some(LayerRadius::Uniform(r.tl))
    } else {
        Some(LayerRadius::Corners {
            tl: Some(r.tl),
            tr: Some(r.tr),
            br: Some(r.br),
            bl: Some(r.bl),
        })
    }
}

impl TryFrom<RawEyeOptions> for EyeOptions {
    type Error = String;

    fn try_from(raw: RawEyeOptions) -> Result<Self, Self::Error> {
        let size = raw.size.unwrap_or_default();
        let shape = match raw.shape.as_deref().unwrap_or("square") {
            "square" => {
                let nested = raw.radius.unwrap_or_default();
                let flat = raw.flat_radius;
                EyeShape::Square {
                    radii: EyeRadii {
                        outer: layer(nested.radius_outer, flat.radius_outer),
                        middle: layer(nested.radius_inner, flat.radius_inner),
                        core: layer(nested.radius_center, flat.radius_center),
                    },
                    size,
                }
            }
            "circle" => EyeShape::Circle { size },
            "dot" => EyeShape::Dot,
            "triangle" => EyeShape::Triangle,
            "heart" => EyeShape::Heart,
            other => return Err(format!("unknown eye shape {other:?}")),
        };
        Ok(EyeOptions {
            shape,
            color: raw.color,
            inner_color: raw.inner_color,
            background_color: raw.background_color,
            dot_size_ratio: raw.dot_size_ratio.unwrap_or(0.5),
        })
    }
}

impl From<EyeOptions> for RawEyeOptions {
    fn from(opts: EyeOptions) -> Self {
        let mut raw = RawEyeOptions {
            color: opts.color,
            inner_color: opts.inner_color,
            background_color: opts.background_color,
            dot_size_ratio: Some(opts.dot_size_ratio),
            ..RawEyeOptions::default()
        };
        let shape = match opts.shape {
            EyeShape::Square { radii, size } => {
                raw.radius = Some(RawEyeRadius {
                    radius_outer: to_layer(radii.outer),
                    radius_inner: to_layer(radii.middle),
                    radius_center: to_layer(radii.core),
                });
                raw.size = Some(size);
                "square"
            }
            EyeShape::Circle { size } => {
                raw.size = Some(size);
                "circle"
            }
            EyeShape::Dot => "dot",
            EyeShape::Triangle => "triangle",
            EyeShape::Heart => "heart",
        };
        raw.shape = Some(shape.to_string());
        raw
    }
}

/// Colors an eye is painted with once defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
struct EyePalette {
    outer: Color,
    gap: Color,
    core: Color,
}

impl EyePalette {
    fn resolve(options: &EyeOptions, default_color: Color, default_background: Color) -> Self {
        let outer = options.color.unwrap_or(default_color);
        Self {
            outer,
            gap: options.background_color.unwrap_or(default_background),
            core: options.inner_color.unwrap_or(outer),
        }
    }
}

/// Square of `width` cells centered in the eye zone at `origin`.
fn centered_square(origin: Point, cell_size: f64, width: f64) -> Rect {
    let side = (width * cell_size).max(0.0);
    let inset = (EYE_ZONE as f64 * cell_size - side) / 2.0;
    Rect::new(origin.x + inset, origin.y + inset, origin.x + inset + side, origin.y + inset + side)
}

fn sanitized(r: CornerRadii) -> CornerRadii {
    CornerRadii::new(r.tl, r.tr, r.br, r.bl)
}

/// The outer, gap and core layers of a square or circle eye.
fn layers(shape: &EyeShape, origin: Point, cell_size: f64) -> Option<[Shape; 3]> {
    let half_zone = EYE_ZONE as f64 * cell_size / 2.0;
    let center = Point::new(origin.x + half_zone, origin.y + half_zone);
    match shape {
        EyeShape::Square { radii, size } => Some([
            Shape::rounded_rect(
                centered_square(origin, cell_size, multiplier(size.outer) + 6.0),
                sanitized(radii.outer),
            ),
            Shape::rounded_rect(
                centered_square(origin, cell_size, multiplier(size.center) + 4.0),
                sanitized(radii.middle),
            ),
            Shape::rounded_rect(
                centered_square(origin, cell_size, multiplier(size.inner) + 2.0),
                sanitized(radii.core),
            ),
        ]),
        EyeShape::Circle { size } => {
            let radius = |m: f64, base: f64| (cell_size * (multiplier(m) + base)).max(0.0);
            Some([
                Shape::circle(center, radius(size.outer, 2.5)),
                Shape::circle(center, radius(size.center, 1.5)),
                Shape::circle(center, radius(size.inner, 0.5)),
            ])
        }
        EyeShape::Dot | EyeShape::Triangle | EyeShape::Heart => None,
    }
}

/// Where a sub-cell of the 7×7 glyph grid sits in the finder pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphRole {
    /// Rows and columns 2 to 4.
    Center,
    /// One of the four corners of the 1 to 5 band.
    InnerCorner,
    Outer,
}

/// Classifies sub-cell `(row, col)`. Non-corner cells of the inner band are not drawn.
pub fn glyph_role(row: usize, col: usize) -> Option<GlyphRole> {
    let center = (2..=4).contains(&row) && (2..=4).contains(&col);
    let inner = (1..=5).contains(&row) && (1..=5).contains(&col);
    if center {
        Some(GlyphRole::Center)
    } else if inner {
        let corner = (row == 1 || row == 5) && (col == 1 || col == 5);
        corner.then_some(GlyphRole::InnerCorner)
    } else {
        Some(GlyphRole::Outer)
    }
}

fn glyph(shape: &EyeShape, center: Point, r: f64) -> Shape {
    match shape {
        EyeShape::Triangle => {
            let mut path = BezPath::new();
            path.move_to((center.x, center.y - r));
            path.line_to((center.x + r, center.y + r));
            path.line_to((center.x - r, center.y + r));
            path.close_path();
            Shape::Path(path)
        }
        EyeShape::Heart => Shape::Path(heart_path(center, r)),
        _ => Shape::circle(center, r),
    }
}

/// Draws one eye whose 7×7 zone starts at `origin`.
///
/// With `as_mask`, layers are painted white (shown) and black (hidden) for use inside a
/// luminance mask and the configured colors are ignored.
pub fn render_eye(
    origin: Point,
    cell_size: f64,
    options: &EyeOptions,
    default_color: Color,
    default_background: Color,
    as_mask: bool,
) -> Node {
    let palette = EyePalette::resolve(options, default_color, default_background);

    if let Some([outer, middle, core]) = layers(&options.shape, origin, cell_size) {
        if as_mask {
            return Node::Group(vec![
                Node::fill(outer, Color::WHITE),
                Node::fill(middle, Color::BLACK),
                Node::fill(core, Color::WHITE),
            ]);
        }
        let bounds = outer.bounding_box();
        return Node::Group(vec![
            Node::Mask {
                mask: vec![
                    Node::fill(Shape::rect(bounds), Color::BLACK),
                    Node::fill(outer, Color::WHITE),
                    Node::fill(middle.clone(), Color::BLACK),
                ],
                content: vec![Node::fill(Shape::rect(bounds), palette.outer)],
            },
            Node::fill(middle, palette.gap),
            Node::fill(core, palette.core),
        ]);
    }

    let ratio = if options.dot_size_ratio.is_finite() && options.dot_size_ratio > 0.0 {
        options.dot_size_ratio
    } else {
        0.5
    };
    let r = cell_size * ratio;
    let mut glyphs = Vec::new();
    for row in 0..EYE_ZONE {
        for col in 0..EYE_ZONE {
            let Some(role) = glyph_role(row, col) else {
                continue;
            };
            let center = Point::new(
                origin.x + col as f64 * cell_size + cell_size / 2.0,
                origin.y + row as f64 * cell_size + cell_size / 2.0,
            );
            let color = if as_mask {
                Color::WHITE
            } else {
                match role {
                    GlyphRole::Center => palette.core,
                    GlyphRole::InnerCorner => palette.gap,
                    GlyphRole::Outer => palette.outer,
                }
            };
            glyphs.push(Node::fill(glyph(&options.shape, center, r), color));
        }
    }
    Node::Group(glyphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Fill;

    fn render(options: &EyeOptions, as_mask: bool) -> Node {
        render_eye(Point::ZERO, 10.0, options, Color::BLACK, Color::WHITE, as_mask)
    }

    #[test]
    fn test_dot_ring_keeps_only_corners() {
        let band: Vec<(usize, usize)> = (1..=5)
            .flat_map(|r| (1..=5).map(move |c| (r, c)))
            .filter(|&(r, c)| !((2..=4).contains(&r) && (2..=4).contains(&c)))
            .collect();
        assert_eq!(band.len(), 16);
        let drawn = band.iter().filter(|&&(r, c)| glyph_role(r, c).is_some()).count();
        assert_eq!(drawn, 4);

        let node = render(&EyeOptions::new(EyeShape::Dot), false);
        assert_eq!(node.fills().len(), 37);
    }

    #[test]
    fn test_dot_colors_by_role() {
        let opts = EyeOptions::new(EyeShape::Dot)
            .with_color(Color::rgb(255, 0, 0))
            .with_inner_color(Color::rgb(0, 0, 255));
        let node = render(&opts, false);
        let fills = node.fills();
        let count = |c: Color| fills.iter().filter(|f| f.color() == Some(c)).count();
        assert_eq!(count(Color::rgb(255, 0, 0)), 24);
        assert_eq!(count(Color::rgb(0, 0, 255)), 9);
        assert_eq!(count(Color::WHITE), 4);
    }

    #[test]
    fn test_dot_glyph_radius_follows_ratio() {
        let mut opts = EyeOptions::new(EyeShape::Dot);
        opts.dot_size_ratio = 0.3;
        let node = render(&opts, false);
        assert_eq!(node.fills()[0].shape, Shape::circle(Point::new(5.0, 5.0), 3.0));
    }

    #[test]
    fn test_square_stencil_layers() {
        let node = render(&EyeOptions::default().with_color(Color::rgb(1, 2, 3)), false);
        let Node::Group(children) = node else { panic!("expected group") };
        assert_eq!(children.len(), 3);
        assert!(matches!(children[0], Node::Mask { .. }));
        let Node::Fill(Fill { shape, .. }) = &children[1] else { panic!("expected gap fill") };
        assert_eq!(shape.bounding_box(), Rect::new(10.0, 10.0, 60.0, 60.0));
        let Node::Fill(core) = &children[2] else { panic!("expected core fill") };
        assert_eq!(core.shape.bounding_box(), Rect::new(20.0, 20.0, 50.0, 50.0));
        assert_eq!(core.color(), Some(Color::rgb(1, 2, 3)));
    }

    #[test]
    fn test_mask_mode_forces_colors() {
        let opts = EyeOptions::new(EyeShape::Circle { size: EyeSize::default() })
            .with_color(Color::rgb(9, 9, 9));
        let node = render(&opts, true);
        let colors: Vec<_> = node.fills().iter().map(|f| f.color()).collect();
        assert_eq!(colors, vec![Some(Color::WHITE), Some(Color::BLACK), Some(Color::WHITE)]);
        assert_eq!(node.fills()[0].shape, Shape::circle(Point::new(35.0, 35.0), 35.0));
    }

    #[test]
    fn test_nan_radius_renders_as_zero() {
        let radii = EyeRadii {
            outer: CornerRadii { tl: f64::NAN, tr: f64::NAN, br: f64::NAN, bl: f64::NAN },
            ..EyeRadii::default()
        };
        let opts = EyeOptions::new(EyeShape::Square { radii, size: EyeSize::default() });
        let node = render(&opts, true);
        assert_eq!(node.fills()[0].shape, Shape::rect(Rect::new(0.0, 0.0, 70.0, 70.0)));
    }

    #[test]
    fn test_size_multiplier() {
        let size = EyeSize { outer: 0.0, center: 2.0, inner: f64::NAN };
        let opts = EyeOptions::new(EyeShape::Square { radii: EyeRadii::default(), size });
        let node = render(&opts, true);
        let boxes: Vec<Rect> = node.fills().iter().map(|f| f.shape.bounding_box()).collect();
        assert_eq!(boxes[0], Rect::new(0.0, 0.0, 70.0, 70.0));
        assert_eq!(boxes[1], Rect::new(5.0, 5.0, 65.0, 65.0));
        assert_eq!(boxes[2], Rect::new(20.0, 20.0, 50.0, 50.0));
    }

    #[test]
    fn test_options_from_json() {
        let json = r##"{
            "shape": "square",
            "color": "#112233",
            "radius": {"radiusOuter": 12, "radiusInner": {"tl": 4}},
            "size": {"outer": 1.2}
        }"##;
        let opts: EyeOptions = serde_json::from_str(json).unwrap();
        let EyeShape::Square { radii, size } = opts.shape else { panic!("expected square") };
        assert_eq!(radii.outer, CornerRadii::uniform(12.0));
        assert_eq!(radii.middle, CornerRadii::new(4.0, 0.0, 0.0, 0.0));
        assert!(radii.core.is_zero());
        assert_eq!(size.outer, 1.2);
        assert_eq!(size.center, 1.0);

        let flat: EyeOptions = serde_json::from_str(r#"{"radiusOuter": 5}"#).unwrap();
        let EyeShape::Square { radii, .. } = flat.shape else { panic!("expected square") };
        assert_eq!(radii.outer, CornerRadii::uniform(5.0));

        let heart: EyeOptions = serde_json::from_str(r#"{"shape": "heart", "dotSizeRatio": 0.4}"#).unwrap();
        assert_eq!(heart.shape, EyeShape::Heart);
        assert_eq!(heart.dot_size_ratio, 0.4);
    }
}
