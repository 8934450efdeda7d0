//! Gradient fills and the mask compositor that paints a symbol through them.
//!
//! The symbol's shapes are painted white on a black field to form a luminance mask; a rectangle
//! filled with the gradient is then shown only through that mask.

use crate::color::Color;
use crate::error::{RenderError, Result};
use crate::scene::{Node, Paint, Shape};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A coordinate given either in pixels or as a percentage of the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Length {
    Px(f64),
    Expr(String),
}

impl Length {
    /// Pixels, with percentages taken of `reference`.
    pub fn resolve(&self, reference: f64) -> Result<f64> {
        let value = match self {
            Length::Px(v) => *v,
            Length::Expr(s) => {
                let s = s.trim();
                let parsed = match s.strip_suffix('%') {
                    Some(pct) => pct.trim().parse::<f64>().map(|p| p / 100.0 * reference),
                    None => s.parse::<f64>(),
                };
                parsed.map_err(|_| {
                    RenderError::InvalidConfiguration(format!("bad gradient coordinate {s:?}"))
                })?
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(RenderError::InvalidConfiguration(format!("non-finite gradient coordinate {value}")))
        }
    }
}

/// One color stop. `offset` is a percentage string such as `"33%"` (a bare fraction is accepted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub offset: String,
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

impl GradientStop {
    pub fn new(offset: impl Into<String>, color: Color) -> Self {
        Self {
            offset: offset.into(),
            color,
            opacity: None,
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = Some(opacity);
        self
    }

    fn offset_fraction(&self) -> Result<f64> {
        let s = self.offset.trim();
        let parsed = match s.strip_suffix('%') {
            Some(pct) => pct.trim().parse::<f64>().map(|p| p / 100.0),
            None => s.parse::<f64>(),
        };
        match parsed {
            Ok(v) if v.is_finite() => Ok(v.clamp(0.0, 1.0)),
            _ => Err(RenderError::InvalidConfiguration(format!(
                "bad gradient stop offset {:?}",
                self.offset
            ))),
        }
    }
}

/// Named linear gradient directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GradientDirection {
    ToRight,
    ToLeft,
    ToBottom,
    ToTop,
    ToBottomRight,
    ToBottomLeft,
    ToTopRight,
    ToTopLeft,
}

impl GradientDirection {
    /// Start and end points on a `width`×`height` canvas.
    pub fn coords(self, width: f64, height: f64) -> (Point, Point) {
        let (w, h) = (width, height);
        let (x1, y1, x2, y2) = match self {
            GradientDirection::ToRight => (0.0, 0.0, w, 0.0),
            GradientDirection::ToLeft => (w, 0.0, 0.0, 0.0),
            GradientDirection::ToBottom => (0.0, 0.0, 0.0, h),
            GradientDirection::ToTop => (0.0, h, 0.0, 0.0),
            GradientDirection::ToBottomRight => (0.0, 0.0, w, h),
            GradientDirection::ToBottomLeft => (w, 0.0, 0.0, h),
            GradientDirection::ToTopRight => (0.0, h, w, 0.0),
            GradientDirection::ToTopLeft => (w, h, 0.0, 0.0),
        };
        (Point::new(x1, y1), Point::new(x2, y2))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GradientKind {
    Linear {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<GradientDirection>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x1: Option<Length>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y1: Option<Length>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x2: Option<Length>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y2: Option<Length>,
    },
    Radial {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cx: Option<Length>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cy: Option<Length>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        r: Option<Length>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fx: Option<Length>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fy: Option<Length>,
    },
}

/// Gradient as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradientSpec {
    #[serde(flatten)]
    pub kind: GradientKind,
    #[serde(alias = "colors")]
    pub stops: Vec<GradientStop>,
    /// Cut the logo out of the gradient layer instead of painting it on top.
    #[serde(default)]
    pub mask_logo: bool,
}

impl GradientSpec {
    pub fn linear(direction: GradientDirection, stops: Vec<GradientStop>) -> Self {
        Self {
            kind: GradientKind::Linear {
                direction: Some(direction),
                x1: None,
                y1: None,
                x2: None,
                y2: None,
            },
            stops,
            mask_logo: false,
        }
    }

    pub fn radial(stops: Vec<GradientStop>) -> Self {
        Self {
            kind: GradientKind::Radial { cx: None, cy: None, r: None, fx: None, fy: None },
            stops,
            mask_logo: false,
        }
    }

    pub fn with_mask_logo(mut self, mask_logo: bool) -> Self {
        self.mask_logo = mask_logo;
        self
    }

    /// Checks stops without resolving coordinates.
    pub fn validate(&self) -> Result<()> {
        if self.stops.is_empty() {
            return Err(RenderError::InvalidConfiguration(
                "gradient needs at least one stop".to_string(),
            ));
        }
        for stop in &self.stops {
            stop.offset_fraction()?;
        }
        Ok(())
    }

    /// Resolves coordinates and stops for a `width`×`height` canvas.
    pub fn resolve(&self, width: f64, height: f64) -> Result<Gradient> {
        self.validate()?;

        let mut stops = Vec::with_capacity(self.stops.len());
        let mut last = 0.0_f64;
        for stop in &self.stops {
            // Offsets never run backwards
            let offset = stop.offset_fraction()?.max(last);
            last = offset;
            let opacity = stop.opacity.filter(|o| o.is_finite()).unwrap_or(1.0).clamp(0.0, 1.0);
            stops.push(Stop { offset, color: stop.color, opacity });
        }

        let geometry = match &self.kind {
            GradientKind::Linear { direction, x1, y1, x2, y2 } => {
                let (start, end) = direction
                    .unwrap_or(GradientDirection::ToRight)
                    .coords(width, height);
                let pick = |len: &Option<Length>, fallback: f64, reference: f64| match len {
                    Some(l) => l.resolve(reference),
                    None => Ok(fallback),
                };
                GradientGeometry::Linear {
                    start: Point::new(pick(x1, start.x, width)?, pick(y1, start.y, height)?),
                    end: Point::new(pick(x2, end.x, width)?, pick(y2, end.y, height)?),
                }
            }
            GradientKind::Radial { cx, cy, r, fx, fy } => {
                let diagonal = ((width * width + height * height) / 2.0).sqrt();
                let resolve_or = |len: &Option<Length>, fallback: f64, reference: f64| match len {
                    Some(l) => l.resolve(reference),
                    None => Ok(fallback),
                };
                let center = Point::new(
                    resolve_or(cx, width / 2.0, width)?,
                    resolve_or(cy, height / 2.0, height)?,
                );
                let radius = resolve_or(r, width.min(height) / 2.0, diagonal)?.max(0.0);
                let focal = Point::new(
                    resolve_or(fx, center.x, width)?,
                    resolve_or(fy, center.y, height)?,
                );
                GradientGeometry::Radial { center, radius, focal }
            }
        };

        Ok(Gradient { geometry, stops })
    }
}

/// A resolved stop: offset in `0.0..=1.0`, color and extra opacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stop {
    pub offset: f64,
    pub color: Color,
    pub opacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientGeometry {
    Linear { start: Point, end: Point },
    Radial { center: Point, radius: f64, focal: Point },
}

/// A gradient in canvas coordinates, ready to paint.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub geometry: GradientGeometry,
    pub stops: Vec<Stop>,
}

impl Gradient {
    /// Gradient parameter at `p`, padded to `0.0..=1.0`.
    pub fn param_at(&self, p: Point) -> f64 {
        let t = match self.geometry {
            GradientGeometry::Linear { start, end } => {
                let axis = end - start;
                let len2 = axis.hypot2();
                if len2 == 0.0 {
                    1.0
                } else {
                    (p - start).dot(axis) / len2
                }
            }
            GradientGeometry::Radial { center, radius, focal } => {
                radial_param(p, center, radius, focal)
            }
        };
        t.clamp(0.0, 1.0)
    }

    /// Straight RGBA at `p`, stop opacity folded into alpha.
    pub fn color_at(&self, p: Point) -> [f32; 4] {
        let t = self.param_at(p);
        let as_rgba = |s: &Stop| {
            let mut c = s.color.to_f32();
            c[3] *= s.opacity as f32;
            c
        };
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return [0.0; 4],
        };
        if t <= first.offset {
            return as_rgba(first);
        }
        if t >= last.offset {
            return as_rgba(last);
        }
        for pair in self.stops.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if t >= a.offset && t <= b.offset {
                let span = b.offset - a.offset;
                let k = if span <= 0.0 { 1.0 } else { ((t - a.offset) / span) as f32 };
                let (ca, cb) = (as_rgba(a), as_rgba(b));
                return [
                    ca[0] + (cb[0] - ca[0]) * k,
                    ca[1] + (cb[1] - ca[1]) * k,
                    ca[2] + (cb[2] - ca[2]) * k,
                    ca[3] + (cb[3] - ca[3]) * k,
                ];
            }
        }
        as_rgba(last)
    }
}

// Solves |p - (f + t(c - f))| = t r for the smallest positive t.
fn radial_param(p: Point, center: Point, radius: f64, focal: Point) -> f64 {
    if radius <= 0.0 {
        return 1.0;
    }
    // A focal point outside the circle is pulled just inside it
    let mut f = focal;
    let off = f - center;
    let limit = radius * 0.99;
    if off.hypot() > limit {
        f = center + off * (limit / off.hypot());
    }
    let d = p - f;
    let e = center - f;
    let a = e.hypot2() - radius * radius;
    let b = d.dot(e);
    let c = d.hypot2();
    if e.hypot2() == 0.0 {
        return c.sqrt() / radius;
    }
    let disc = b * b - a * c;
    if disc < 0.0 {
        return 1.0;
    }
    // a < 0 here, so this root is the non-negative one
    (b - disc.sqrt()) / a
}

/// Paints `children` through `gradient`: the gradient shows only where a child was drawn.
///
/// Children are expected to be painted in mask colors (white for "show", black for "hide").
pub fn compose(width: f64, height: f64, gradient: Gradient, children: Vec<Node>) -> Node {
    let canvas = Rect::new(0.0, 0.0, width, height);
    Node::Mask {
        mask: vec![Node::fill(Shape::rect(canvas), Color::BLACK), Node::Group(children)],
        content: vec![Node::fill_with(Shape::rect(canvas), Paint::Gradient(gradient), 1.0)],
    }
}
