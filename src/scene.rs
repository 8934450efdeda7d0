//! The vector scene produced by the pipeline.
//!
//! A [`Scene`] is a small tree of fills, groups, luminance masks, silhouette clips and images.
//! It is independent of any output format: [`crate::svg`] serializes it and [`crate::raster`]
//! paints it into a bitmap.

use crate::asset::Asset;
use crate::color::Color;
use crate::geometry::CornerRadii;
use crate::gradient::Gradient;
use kurbo::{BezPath, Circle, Point, Rect, RoundedRect, Shape as _, Vec2};

/// Curve flattening tolerance in pixels.
pub const TOLERANCE: f64 = 0.05;

/// A closed outline.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Axis-aligned box with optional per-corner radii.
    Rect { rect: Rect, radii: CornerRadii },
    Circle { center: Point, radius: f64 },
    /// Arbitrary outline, filled with the nonzero rule.
    Path(BezPath),
}

impl Shape {
    pub fn rect(rect: Rect) -> Self {
        Shape::Rect { rect, radii: CornerRadii::ZERO }
    }

    pub fn rounded_rect(rect: Rect, radii: CornerRadii) -> Self {
        Shape::Rect { rect, radii }
    }

    pub fn circle(center: Point, radius: f64) -> Self {
        Shape::Circle { center, radius }
    }

    pub fn bounding_box(&self) -> Rect {
        match self {
            Shape::Rect { rect, .. } => *rect,
            Shape::Circle { center, radius } => Circle::new(*center, *radius).bounding_box(),
            Shape::Path(path) => path.bounding_box(),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        match self {
            Shape::Rect { rect, radii } if radii.is_zero() => {
                p.x >= rect.x0 && p.x < rect.x1 && p.y >= rect.y0 && p.y < rect.y1
            }
            Shape::Rect { rect, radii } => RoundedRect::from_rect(*rect, *radii).contains(p),
            Shape::Circle { center, radius } => (p - *center).hypot2() < radius * radius,
            Shape::Path(path) => path.contains(p),
        }
    }

    pub fn to_path(&self) -> BezPath {
        match self {
            Shape::Rect { rect, radii } => RoundedRect::from_rect(*rect, *radii).to_path(TOLERANCE),
            Shape::Circle { center, radius } => Circle::new(*center, *radius).to_path(TOLERANCE),
            Shape::Path(path) => path.clone(),
        }
    }
}

/// What a fill is painted with.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    Gradient(Gradient),
}

/// A shape painted with a paint at some opacity.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub shape: Shape,
    pub paint: Paint,
    pub opacity: f64,
}

impl Fill {
    /// The solid color, if this is a solid fill.
    pub fn color(&self) -> Option<Color> {
        match &self.paint {
            Paint::Solid(c) => Some(*c),
            Paint::Gradient(_) => None,
        }
    }
}

/// Horizontal or vertical alignment for `preserveAspectRatio`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Min,
    Mid,
    Max,
}

/// How a bitmap is fitted into its box. Only the "slice" (cover) behaviour is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AspectRatio {
    pub x: Align,
    pub y: Align,
}

impl AspectRatio {
    pub const MID_SLICE: AspectRatio = AspectRatio { x: Align::Mid, y: Align::Mid };
    pub const MAX_SLICE: AspectRatio = AspectRatio { x: Align::Max, y: Align::Max };

    pub fn to_svg(&self) -> String {
        let name = |a: Align| match a {
            Align::Min => "Min",
            Align::Mid => "Mid",
            Align::Max => "Max",
        };
        format!("x{}Y{} slice", name(self.x), name(self.y))
    }

    /// Where an `image_w`×`image_h` bitmap lands when it covers `viewport`.
    pub fn place(&self, image_w: f64, image_h: f64, viewport: Rect) -> Rect {
        if image_w <= 0.0 || image_h <= 0.0 {
            return viewport;
        }
        let scale = (viewport.width() / image_w).max(viewport.height() / image_h);
        let (w, h) = (image_w * scale, image_h * scale);
        let offset = |a: Align, slack: f64| match a {
            Align::Min => 0.0,
            Align::Mid => slack / 2.0,
            Align::Max => slack,
        };
        let x0 = viewport.x0 + offset(self.x, viewport.width() - w);
        let y0 = viewport.y0 + offset(self.y, viewport.height() - h);
        Rect::new(x0, y0, x0 + w, y0 + h)
    }
}

/// A bitmap drawn into a box, cropped to that box.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageNode {
    pub asset: Asset,
    pub rect: Rect,
    pub aspect: AspectRatio,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Fill(Fill),
    Group(Vec<Node>),
    /// `content` shows through where `mask` is painted bright; luminance times alpha.
    Mask { mask: Vec<Node>, content: Vec<Node> },
    /// `content` shows through wherever `clip` has coverage, whatever its color.
    Clip { clip: Vec<Node>, content: Vec<Node> },
    Image(ImageNode),
}

impl Node {
    pub fn fill(shape: Shape, color: Color) -> Self {
        Node::Fill(Fill { shape, paint: Paint::Solid(color), opacity: 1.0 })
    }

    pub fn fill_with(shape: Shape, paint: Paint, opacity: f64) -> Self {
        Node::Fill(Fill { shape, paint, opacity })
    }

    /// Every fill in this subtree, depth first, including those inside masks and clips.
    pub fn fills(&self) -> Vec<&Fill> {
        let mut out = Vec::new();
        self.collect_fills(&mut out);
        out
    }

    fn collect_fills<'a>(&'a self, out: &mut Vec<&'a Fill>) {
        match self {
            Node::Fill(fill) => out.push(fill),
            Node::Group(children) => children.iter().for_each(|c| c.collect_fills(out)),
            Node::Mask { mask, content } => {
                mask.iter().for_each(|c| c.collect_fills(out));
                content.iter().for_each(|c| c.collect_fills(out));
            }
            Node::Clip { clip, content } => {
                clip.iter().for_each(|c| c.collect_fills(out));
                content.iter().for_each(|c| c.collect_fills(out));
            }
            Node::Image(_) => {}
        }
    }
}

/// Drop shadow under the background card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub offset: Vec2,
    pub blur: f64,
    pub color: Color,
}

/// Padded, rounded, shadowed card wrapped around the symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Card {
    pub padding: f64,
    pub corner_radius: f64,
    pub background: Color,
    pub shadow: Shadow,
}

impl Card {
    pub const PADDING: f64 = 25.0;
    pub const CORNER_RADIUS: f64 = 20.0;

    /// The card the generator wraps symbols in. A transparent background becomes white.
    pub fn standard(background: Color) -> Self {
        let background = if background.is_transparent() { Color::WHITE } else { background };
        Self {
            padding: Card::PADDING,
            corner_radius: Card::CORNER_RADIUS,
            background,
            shadow: Shadow {
                offset: Vec2::new(0.0, 8.0),
                blur: 3.84,
                color: Color::rgba(0, 0, 0, 64),
            },
        }
    }
}

/// A finished render: `size`×`size` symbol, optionally inside a card.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub size: f64,
    pub background: Color,
    pub card: Option<Card>,
    pub nodes: Vec<Node>,
}

impl Scene {
    /// Width and height of the whole output, card included.
    pub fn output_size(&self) -> f64 {
        match &self.card {
            Some(card) => self.size + 2.0 * card.padding,
            None => self.size,
        }
    }

    pub fn fills(&self) -> Vec<&Fill> {
        self.nodes.iter().flat_map(Node::fills).collect()
    }

    pub fn images(&self) -> Vec<&ImageNode> {
        fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a ImageNode>) {
            for node in nodes {
                match node {
                    Node::Image(img) => out.push(img),
                    Node::Group(children) => walk(children, out),
                    Node::Mask { mask, content } => {
                        walk(mask, out);
                        walk(content, out);
                    }
                    Node::Clip { clip, content } => {
                        walk(clip, out);
                        walk(content, out);
                    }
                    Node::Fill(_) => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }
}
