//! Data module ("piece") shapes.

use crate::color::Color;
use crate::geometry::CornerRadii;
use crate::scene::{Node, Paint, Shape};
use kurbo::{BezPath, Point, Rect};
use serde::{Deserialize, Serialize};

/// Shape of a data module. Each variant carries only what it needs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PieceStyle {
    #[default]
    Square,
    /// Square with a uniform corner radius in pixels.
    Rounded { radius: f64 },
    Dot,
    Triangle,
    Heart,
    /// Tall rounded streak: 60% wide, 140% high.
    Rain,
}

/// How data modules are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPieceOptions", into = "RawPieceOptions")]
pub struct PieceOptions {
    pub style: PieceStyle,
    /// Falls back to the symbol color.
    pub color: Option<Color>,
    /// Size relative to the cell, centered in it.
    pub size: f64,
    pub opacity: f64,
}

impl Default for PieceOptions {
    fn default() -> Self {
        Self {
            style: PieceStyle::Square,
            color: None,
            size: 1.0,
            opacity: 1.0,
        }
    }
}

impl PieceOptions {
    pub fn new(style: PieceStyle) -> Self {
        Self { style, ..Self::default() }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }
}

/// The loose record found in configuration files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPieceOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    border_radius: Option<f64>,
}

impl TryFrom<RawPieceOptions> for PieceOptions {
    type Error = String;

    fn try_from(raw: RawPieceOptions) -> Result<Self, Self::Error> {
        let radius = raw.border_radius.filter(|r| r.is_finite() && *r > 0.0);
        let style = match raw.shape.as_deref().unwrap_or("square") {
            "square" => match radius {
                Some(radius) => PieceStyle::Rounded { radius },
                None => PieceStyle::Square,
            },
            "rounded" => PieceStyle::Rounded { radius: radius.unwrap_or(0.0) },
            "dot" | "circle" => PieceStyle::Dot,
            "triangle" => PieceStyle::Triangle,
            "heart" => PieceStyle::Heart,
            "rain" => PieceStyle::Rain,
            other => return Err(format!("unknown piece shape {other:?}")),
        };
        Ok(PieceOptions {
            style,
            color: raw.color,
            size: raw.size.unwrap_or(1.0),
            opacity: raw.opacity.unwrap_or(1.0),
        })
    }
}

impl From<PieceOptions> for RawPieceOptions {
    fn from(opts: PieceOptions) -> Self {
        let (shape, border_radius) = match opts.style {
            PieceStyle::Square => ("square", None),
            PieceStyle::Rounded { radius } => ("rounded", Some(radius)),
            PieceStyle::Dot => ("dot", None),
            PieceStyle::Triangle => ("triangle", None),
            PieceStyle::Heart => ("heart", None),
            PieceStyle::Rain => ("rain", None),
        };
        RawPieceOptions {
            shape: Some(shape.to_string()),
            color: opts.color,
            size: Some(opts.size),
            opacity: Some(opts.opacity),
            border_radius,
        }
    }
}

/// Heart glyph centered on `center`, roughly `2r` across.
pub(crate) fn heart_path(center: Point, r: f64) -> BezPath {
    let (cx, cy) = (center.x, center.y);
    let mut path = BezPath::new();
    path.move_to((cx, cy + 0.7 * r));
    path.curve_to((cx, cy + 0.3 * r), (cx - r, cy - 0.5 * r), (cx - r, cy - 0.2 * r));
    path.curve_to((cx - r, cy - 1.2 * r), (cx, cy - 1.2 * r), (cx, cy - 0.7 * r));
    path.curve_to((cx, cy - 1.2 * r), (cx + r, cy - 1.2 * r), (cx + r, cy - 0.2 * r));
    path.curve_to((cx + r, cy - 0.5 * r), (cx, cy + 0.3 * r), (cx, cy + 0.7 * r));
    path.close_path();
    path
}

/// Apex-up triangle inscribed in `rect`.
pub(crate) fn triangle_path(rect: Rect) -> BezPath {
    let mut path = BezPath::new();
    path.move_to((rect.center().x, rect.y0));
    path.line_to((rect.x1, rect.y1));
    path.line_to((rect.x0, rect.y1));
    path.close_path();
    path
}

/// Outline of one piece whose shrunk box is `rect`.
pub fn piece_shape(style: PieceStyle, rect: Rect) -> Shape {
    let side = rect.width();
    match style {
        PieceStyle::Square => Shape::rect(rect),
        PieceStyle::Rounded { radius } => Shape::rounded_rect(rect, CornerRadii::uniform(radius)),
        PieceStyle::Dot => Shape::circle(rect.center(), side / 2.0),
        PieceStyle::Triangle => Shape::Path(triangle_path(rect)),
        PieceStyle::Heart => Shape::Path(heart_path(rect.center(), side / 2.0)),
        PieceStyle::Rain => {
            let (w, h) = (side * 0.6, side * 1.4);
            let c = rect.center();
            let bar = Rect::new(c.x - w / 2.0, c.y - h / 2.0, c.x + w / 2.0, c.y + h / 2.0);
            Shape::rounded_rect(bar, CornerRadii::uniform(w / 2.0))
        }
    }
}

/// Draws the module at `(x, y)`, or nothing if it is light.
///
/// With `as_mask` the piece is painted opaque white whatever its configured color.
pub fn render_piece(
    x: usize,
    y: usize,
    dark: bool,
    cell_size: f64,
    options: &PieceOptions,
    default_color: Color,
    as_mask: bool,
) -> Option<Node> {
    if !dark {
        return None;
    }
    let multiplier = if options.size.is_finite() { options.size.max(0.0) } else { 1.0 };
    let adjusted = cell_size * multiplier;
    let offset = (cell_size - adjusted) / 2.0;
    let x0 = x as f64 * cell_size + offset;
    let y0 = y as f64 * cell_size + offset;
    let shape = piece_shape(options.style, Rect::new(x0, y0, x0 + adjusted, y0 + adjusted));

    if as_mask {
        return Some(Node::fill(shape, Color::WHITE));
    }
    let opacity = if options.opacity.is_finite() { options.opacity.clamp(0.0, 1.0) } else { 1.0 };
    let color = options.color.unwrap_or(default_color);
    Some(Node::fill_with(shape, Paint::Solid(color), opacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Fill;

    fn fill_of(node: Option<Node>) -> Fill {
        match node {
            Some(Node::Fill(fill)) => fill,
            other => panic!("expected a fill, got {other:?}"),
        }
    }

    #[test]
    fn test_light_cell_draws_nothing() {
        assert!(render_piece(0, 0, false, 10.0, &PieceOptions::default(), Color::BLACK, false).is_none());
    }

    #[test]
    fn test_square_fills_cell() {
        let fill = fill_of(render_piece(2, 3, true, 10.0, &PieceOptions::default(), Color::BLACK, false));
        assert_eq!(fill.shape, Shape::rect(Rect::new(20.0, 30.0, 30.0, 40.0)));
        assert_eq!(fill.color(), Some(Color::BLACK));
        assert_eq!(fill.opacity, 1.0);
    }

    #[test]
    fn test_size_multiplier_shrinks_evenly() {
        let opts = PieceOptions::default().with_size(0.5);
        let fill = fill_of(render_piece(0, 0, true, 10.0, &opts, Color::BLACK, false));
        assert_eq!(fill.shape.bounding_box(), Rect::new(2.5, 2.5, 7.5, 7.5));
    }

    #[test]
    fn test_dot_radius() {
        let opts = PieceOptions::new(PieceStyle::Dot).with_size(0.8);
        let fill = fill_of(render_piece(1, 1, true, 10.0, &opts, Color::BLACK, false));
        assert_eq!(fill.shape, Shape::circle(Point::new(15.0, 15.0), 4.0));
    }

    #[test]
    fn test_rain_is_tall_and_centered() {
        let fill = fill_of(render_piece(0, 0, true, 10.0, &PieceOptions::new(PieceStyle::Rain), Color::BLACK, false));
        let bbox = fill.shape.bounding_box();
        assert!((bbox.width() - 6.0).abs() < 1e-9);
        assert!((bbox.height() - 14.0).abs() < 1e-9);
        assert_eq!(bbox.center(), Point::new(5.0, 5.0));
    }

    #[test]
    fn test_triangle_apex_up() {
        let shape = piece_shape(PieceStyle::Triangle, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(shape.contains(Point::new(5.0, 8.0)));
        assert!(!shape.contains(Point::new(1.0, 1.0)));
        assert!(!shape.contains(Point::new(9.0, 1.0)));
    }

    #[test]
    fn test_heart_inside_cell() {
        let shape = piece_shape(PieceStyle::Heart, Rect::new(0.0, 0.0, 10.0, 10.0));
        let bbox = shape.bounding_box();
        assert!(bbox.x0 >= -1e-9 && bbox.x1 <= 10.0 + 1e-9);
        assert!(shape.contains(Point::new(5.0, 6.0)));
    }

    #[test]
    fn test_mask_forces_white() {
        let opts = PieceOptions::new(PieceStyle::Heart)
            .with_color(Color::rgb(200, 10, 10))
            .with_opacity(0.3);
        let fill = fill_of(render_piece(0, 0, true, 10.0, &opts, Color::BLACK, true));
        assert_eq!(fill.color(), Some(Color::WHITE));
        assert_eq!(fill.opacity, 1.0);
    }

    #[test]
    fn test_options_from_json() {
        let opts: PieceOptions = serde_json::from_str(r#"{"shape": "circle", "size": 0.9}"#).unwrap();
        assert_eq!(opts.style, PieceStyle::Dot);
        assert_eq!(opts.size, 0.9);
        assert_eq!(opts.opacity, 1.0);

        let opts: PieceOptions =
            serde_json::from_str(r##"{"shape": "rounded", "borderRadius": 3, "color": "#FF0000"}"##).unwrap();
        assert_eq!(opts.style, PieceStyle::Rounded { radius: 3.0 });
        assert_eq!(opts.color, Some(Color::rgb(255, 0, 0)));

        assert!(serde_json::from_str::<PieceOptions>(r#"{"shape": "star"}"#).is_err());
    }
}
