//! Chooses how the symbol is painted and stacks the layers.
//!
//! Branches, first match wins:
//!
//! 1. gradient with `maskLogo`: pieces, eyes and logo all go through the gradient mask
//! 2. gradient: pieces and eyes go through the gradient, the logo is painted on top
//! 3. image clip: plain pieces and eyes, then the image cut to the symbol's silhouette
//! 4. plain: flat colors, logo on top

use crate::asset::Asset;
use crate::color::Color;
use crate::config::EyeSet;
use crate::eye::render_eye;
use crate::geometry::{cell_size, eye_origin, is_in_eye, EyeCorner};
use crate::gradient::{compose as gradient_mask, Gradient};
use crate::matrix::ModuleMatrix;
use crate::piece::{render_piece, PieceOptions};
use crate::scene::{AspectRatio, Card, ImageNode, Node, Scene, Shape};
use kurbo::Rect;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    GradientMaskedLogo,
    Gradient,
    ImageClip,
    Plain,
}

impl Branch {
    pub fn select(has_gradient: bool, mask_logo: bool, has_image: bool) -> Self {
        match (has_gradient, mask_logo, has_image) {
            (true, true, _) => Branch::GradientMaskedLogo,
            (true, false, _) => Branch::Gradient,
            (false, _, true) => Branch::ImageClip,
            (false, _, false) => Branch::Plain,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Branch::GradientMaskedLogo => "gradient-masked-logo",
            Branch::Gradient => "gradient",
            Branch::ImageClip => "image-clip",
            Branch::Plain => "plain",
        };
        f.write_str(s)
    }
}

/// The symbol's pieces and eyes, ready to be drawn in color or as a mask.
#[derive(Debug, Clone, Copy)]
pub struct Symbol<'a> {
    pub matrix: &'a ModuleMatrix,
    pub size: f64,
    pub color: Color,
    pub background: Color,
    pub piece: &'a PieceOptions,
    pub eyes: &'a EyeSet,
}

impl Symbol<'_> {
    pub fn cell_size(&self) -> f64 {
        cell_size(self.size, self.matrix.size())
    }

    /// One node per dark module outside the eye zones.
    pub fn pieces(&self, as_mask: bool) -> Vec<Node> {
        let n = self.matrix.size();
        let cell = self.cell_size();
        self.matrix
            .cells()
            .filter(|&(x, y, _)| !is_in_eye(x, y, n))
            .filter_map(|(x, y, dark)| render_piece(x, y, dark, cell, self.piece, self.color, as_mask))
            .collect()
    }

    /// The three finder patterns, top-left, top-right, bottom-left.
    pub fn eyes(&self, as_mask: bool) -> Vec<Node> {
        let cell = self.cell_size();
        EyeCorner::ALL
            .iter()
            .map(|&corner| {
                render_eye(
                    eye_origin(corner, self.size, cell),
                    cell,
                    self.eyes.get(corner),
                    self.color,
                    self.background,
                    as_mask,
                )
            })
            .collect()
    }

    fn layers(&self, as_mask: bool) -> Vec<Node> {
        let mut nodes = self.pieces(as_mask);
        nodes.extend(self.eyes(as_mask));
        nodes
    }
}

/// Optional layers resolved ahead of composition.
#[derive(Debug, Clone, Default)]
pub struct Extras {
    pub gradient: Option<Gradient>,
    pub mask_logo: bool,
    pub image: Option<Asset>,
    /// Logo border, background and image, empty when there is no logo.
    pub logo: Vec<Node>,
}

/// Builds the node list for `symbol`. A solid background, if any, comes first.
pub fn compose(symbol: &Symbol<'_>, extras: Extras) -> (Branch, Vec<Node>) {
    let branch = Branch::select(extras.gradient.is_some(), extras.mask_logo, extras.image.is_some());
    debug!(%branch, modules = symbol.matrix.size(), "composing symbol");

    let canvas = Rect::new(0.0, 0.0, symbol.size, symbol.size);
    let mut nodes = Vec::new();
    if !symbol.background.is_transparent() {
        nodes.push(Node::fill(Shape::rect(canvas), symbol.background));
    }

    match (branch, extras.gradient, extras.image) {
        (Branch::GradientMaskedLogo, Some(gradient), _) => {
            let mut children = symbol.layers(true);
            children.extend(extras.logo);
            nodes.push(gradient_mask(symbol.size, symbol.size, gradient, children));
        }
        (Branch::Gradient, Some(gradient), _) => {
            nodes.push(gradient_mask(symbol.size, symbol.size, gradient, symbol.layers(true)));
            nodes.extend(extras.logo);
        }
        (Branch::ImageClip, _, Some(asset)) => {
            nodes.extend(symbol.layers(false));
            nodes.push(Node::Clip {
                clip: symbol.layers(true),
                content: vec![Node::Image(ImageNode {
                    asset,
                    rect: canvas,
                    aspect: AspectRatio::MAX_SLICE,
                })],
            });
        }
        _ => {
            nodes.extend(symbol.layers(false));
            nodes.extend(extras.logo);
        }
    }
    (branch, nodes)
}

/// Wraps composed nodes into a scene, inside the standard card if asked.
pub fn into_scene(nodes: Vec<Node>, size: f64, background: Color, include_background: bool) -> Scene {
    Scene {
        size,
        background,
        card: include_background.then(|| Card::standard(background)),
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::{GradientDirection, GradientSpec, GradientStop};
    use image::RgbaImage;

    fn matrix() -> ModuleMatrix {
        // Dark everywhere so every non-eye cell yields a piece
        ModuleMatrix::from_rows(&vec![vec![true; 21]; 21]).unwrap()
    }

    fn gradient() -> Gradient {
        GradientSpec::linear(GradientDirection::ToRight, vec![GradientStop::new("0%", Color::BLACK)])
            .resolve(210.0, 210.0)
            .unwrap()
    }

    fn symbol<'a>(m: &'a ModuleMatrix, piece: &'a PieceOptions, eyes: &'a EyeSet) -> Symbol<'a> {
        Symbol {
            matrix: m,
            size: 210.0,
            color: Color::BLACK,
            background: Color::WHITE,
            piece,
            eyes,
        }
    }

    #[test]
    fn test_branch_priority() {
        assert_eq!(Branch::select(true, true, true), Branch::GradientMaskedLogo);
        assert_eq!(Branch::select(true, false, true), Branch::Gradient);
        assert_eq!(Branch::select(false, true, true), Branch::ImageClip);
        assert_eq!(Branch::select(false, false, false), Branch::Plain);
    }

    #[test]
    fn test_pieces_skip_eye_zones() {
        let (m, piece, eyes) = (matrix(), PieceOptions::default(), EyeSet::default());
        let s = symbol(&m, &piece, &eyes);
        assert_eq!(s.pieces(false).len(), 21 * 21 - 3 * 49);
        assert_eq!(s.eyes(false).len(), 3);
    }

    #[test]
    fn test_plain_branch_stacks_logo_last() {
        let (m, piece, eyes) = (matrix(), PieceOptions::default(), EyeSet::default());
        let s = symbol(&m, &piece, &eyes);
        let logo = vec![Node::fill(Shape::rect(Rect::new(90.0, 90.0, 120.0, 120.0)), Color::WHITE)];
        let (branch, nodes) = compose(&s, Extras { logo: logo.clone(), ..Extras::default() });
        assert_eq!(branch, Branch::Plain);
        assert_eq!(nodes.len(), 1 + 294 + 3 + 1);
        assert_eq!(nodes.last(), logo.last());
    }

    #[test]
    fn test_masked_logo_goes_inside_gradient() {
        let (m, piece, eyes) = (matrix(), PieceOptions::default(), EyeSet::default());
        let s = symbol(&m, &piece, &eyes);
        let logo = vec![Node::fill(Shape::rect(Rect::new(90.0, 90.0, 120.0, 120.0)), Color::WHITE)];
        let extras = Extras { gradient: Some(gradient()), mask_logo: true, logo, image: None };
        let (branch, nodes) = compose(&s, extras);
        assert_eq!(branch, Branch::GradientMaskedLogo);
        assert_eq!(nodes.len(), 2);
        let Node::Mask { mask, .. } = &nodes[1] else { panic!("expected mask") };
        let Node::Group(children) = &mask[1] else { panic!("expected group") };
        assert_eq!(children.len(), 294 + 3 + 1);
    }

    #[test]
    fn test_gradient_branch_logo_on_top() {
        let (m, piece, eyes) = (matrix(), PieceOptions::default(), EyeSet::default());
        let s = Symbol { background: Color::TRANSPARENT, ..symbol(&m, &piece, &eyes) };
        let logo = vec![Node::fill(Shape::rect(Rect::new(90.0, 90.0, 120.0, 120.0)), Color::WHITE)];
        let extras = Extras { gradient: Some(gradient()), logo, ..Extras::default() };
        let (branch, nodes) = compose(&s, extras);
        assert_eq!(branch, Branch::Gradient);
        assert_eq!(nodes.len(), 2);
        assert!(matches!(nodes[0], Node::Mask { .. }));
        assert!(matches!(nodes[1], Node::Fill(_)));
    }

    #[test]
    fn test_image_clip_branch() {
        let (m, piece, eyes) = (matrix(), PieceOptions::default(), EyeSet::default());
        let s = symbol(&m, &piece, &eyes);
        let extras = Extras {
            image: Some(Asset::new("bg", RgbaImage::new(8, 8))),
            ..Extras::default()
        };
        let (branch, nodes) = compose(&s, extras);
        assert_eq!(branch, Branch::ImageClip);
        let Some(Node::Clip { content, .. }) = nodes.last() else { panic!("expected clip") };
        let Node::Image(img) = &content[0] else { panic!("expected image") };
        assert_eq!(img.aspect, AspectRatio::MAX_SLICE);
        assert_eq!(img.rect, Rect::new(0.0, 0.0, 210.0, 210.0));
    }

    #[test]
    fn test_into_scene_card() {
        let scene = into_scene(Vec::new(), 200.0, Color::TRANSPARENT, true);
        assert_eq!(scene.output_size(), 250.0);
        assert_eq!(scene.card.map(|c| c.background), Some(Color::WHITE));
        assert!(into_scene(Vec::new(), 200.0, Color::WHITE, false).card.is_none());
    }
}
