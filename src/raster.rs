//! CPU rasterization of a [`Scene`] with `vello_cpu`.
//!
//! Fills, images and the card are recorded into a `vello_cpu::RenderContext`. Mask and clip
//! nodes render their two halves into scratch pixmaps, combine them per pixel, and the result is
//! painted back as an image so later siblings still draw on top of it.

use crate::error::{RenderError, Result};
use crate::geometry::CornerRadii;
use crate::scene::{Fill, ImageNode, Node, Paint, Scene, Shape};
use image::RgbaImage;
use kurbo::{Affine, BezPath, PathEl, Point, Rect, Vec2};
use std::sync::Arc;
use tracing::debug;

/// How a scratch pixmap weights the content it is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MaskMode {
    /// Luminance of the premultiplied color, so luminance times alpha.
    Luminance,
    Alpha,
}

/// Rasterizes `scene` at one pixel per unit.
///
/// The canvas is square and `scene.output_size()` pixels on a side. Sides beyond `u16::MAX`
/// are rejected.
pub fn rasterize(scene: &Scene) -> Result<RgbaImage> {
    let side = scene.output_size().max(0.0).ceil();
    let side: u16 = u16::try_from(side as u64)
        .map_err(|_| RenderError::InvalidConfiguration(format!("raster side {side} exceeds {}", u16::MAX)))?;
    if side == 0 {
        return Ok(RgbaImage::new(0, 0));
    }

    let mut ctx = vello_cpu::RenderContext::new(side, side);
    reset(&mut ctx);
    let mut offset = Vec2::ZERO;

    if let Some(card) = &scene.card {
        let bounds = Rect::new(0.0, 0.0, f64::from(side), f64::from(side));
        let shadow = bounds + card.shadow.offset;
        ctx.set_paint(solid(card.shadow.color.to_f32()));
        ctx.fill_blurred_rounded_rect(
            &rect_to_cpu(shadow),
            card.corner_radius as f32,
            card.shadow.blur as f32,
        );
        draw_fill(
            &mut ctx,
            &Fill {
                shape: Shape::rounded_rect(bounds, CornerRadii::uniform(card.corner_radius)),
                paint: Paint::Solid(card.background),
                opacity: 1.0,
            },
            Vec2::ZERO,
        );
        offset = Vec2::new(card.padding, card.padding);
    }

    draw_nodes(&mut ctx, &scene.nodes, offset)?;

    let mut pixmap = vello_cpu::Pixmap::new(side, side);
    ctx.flush();
    ctx.render_to_pixmap(&mut pixmap);
    debug!(side, nodes = scene.nodes.len(), "scene rasterized");
    pixmap_to_image(&pixmap)
}

fn reset(ctx: &mut vello_cpu::RenderContext) {
    ctx.reset();
    ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
}

fn draw_nodes(ctx: &mut vello_cpu::RenderContext, nodes: &[Node], offset: Vec2) -> Result<()> {
    for node in nodes {
        match node {
            Node::Fill(fill) => draw_fill(ctx, fill, offset),
            Node::Group(children) => draw_nodes(ctx, children, offset)?,
            Node::Image(image) => draw_image(ctx, image, offset)?,
            Node::Mask { mask, content } => draw_masked(ctx, mask, content, MaskMode::Luminance, offset)?,
            Node::Clip { clip, content } => draw_masked(ctx, clip, content, MaskMode::Alpha, offset)?,
        }
    }
    Ok(())
}

fn draw_fill(ctx: &mut vello_cpu::RenderContext, fill: &Fill, offset: Vec2) {
    let opacity = fill.opacity.clamp(0.0, 1.0) as f32;
    if opacity <= 0.0 {
        return;
    }
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    match &fill.paint {
        Paint::Solid(c) => ctx.set_paint(solid(c.to_f32())),
        Paint::Gradient(g) => {
            let (w, h) = (ctx.width(), ctx.height());
            let mut bytes = Vec::with_capacity(usize::from(w) * usize::from(h) * 4);
            for y in 0..h {
                for x in 0..w {
                    let p = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5) - offset;
                    bytes.extend_from_slice(&premul_u8(g.color_at(p)));
                }
            }
            ctx.set_paint(image_paint(pixmap_from_premul_bytes(&bytes, w, h)));
        }
    }
    if opacity < 1.0 {
        ctx.push_opacity_layer(opacity);
    }
    match &fill.shape {
        Shape::Rect { rect, radii } if radii.is_zero() => ctx.fill_rect(&rect_to_cpu(*rect + offset)),
        shape => {
            let path = Affine::translate(offset) * shape.to_path();
            ctx.fill_path(&bezpath_to_cpu(&path));
        }
    }
    if opacity < 1.0 {
        ctx.pop_layer();
    }
}

/// Draws the bitmap where it lands under its aspect rule, cropped to the node's box.
fn draw_image(ctx: &mut vello_cpu::RenderContext, node: &ImageNode, offset: Vec2) -> Result<()> {
    let (iw, ih) = node.asset.dimensions();
    if iw == 0 || ih == 0 {
        return Ok(());
    }
    let placed = node.aspect.place(f64::from(iw), f64::from(ih), node.rect);
    let visible = placed.intersect(node.rect);
    if visible.width() <= 0.0 || visible.height() <= 0.0 {
        return Ok(());
    }

    let (sx, sy) = (placed.width() / f64::from(iw), placed.height() / f64::from(ih));
    let to_image = |p: Point| Point::new((p.x - placed.x0) / sx, (p.y - placed.y0) / sy);
    let crop = Rect::from_points(to_image(Point::new(visible.x0, visible.y0)), to_image(Point::new(visible.x1, visible.y1)));

    let bitmap = &node.asset.bitmap;
    let w = u16::try_from(iw).map_err(|_| oversized(&node.asset.source, iw, ih))?;
    let h = u16::try_from(ih).map_err(|_| oversized(&node.asset.source, iw, ih))?;
    let mut bytes = bitmap.as_raw().clone();
    for px in bytes.chunks_exact_mut(4) {
        let [r, g, b, a] = premul_rgba8([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&[r, g, b, a]);
    }

    let transform = Affine::translate(offset + placed.origin().to_vec2()) * Affine::scale_non_uniform(sx, sy);
    ctx.set_transform(affine_to_cpu(transform));
    ctx.set_paint(image_paint(pixmap_from_premul_bytes(&bytes, w, h)));
    ctx.fill_rect(&rect_to_cpu(crop));
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    Ok(())
}

fn oversized(source: &str, w: u32, h: u32) -> RenderError {
    RenderError::InvalidConfiguration(format!("image {source:?} is {w}x{h}, larger than {}", u16::MAX))
}

/// Renders `mask` and `content` apart, weights the content by the mask and paints the result.
fn draw_masked(
    ctx: &mut vello_cpu::RenderContext,
    mask: &[Node],
    content: &[Node],
    mode: MaskMode,
    offset: Vec2,
) -> Result<()> {
    let (w, h) = (ctx.width(), ctx.height());
    let mask_pm = render_scratch(mask, w, h, offset)?;
    let content_pm = render_scratch(content, w, h, offset)?;

    let mut out = vec![0u8; usize::from(w) * usize::from(h) * 4];
    mask_apply_rgba8_premul(content_pm.data_as_u8_slice(), mask_pm.data_as_u8_slice(), &mut out, mode);

    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(image_paint(pixmap_from_premul_bytes(&out, w, h)));
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, f64::from(w), f64::from(h)));
    Ok(())
}

fn render_scratch(nodes: &[Node], width: u16, height: u16, offset: Vec2) -> Result<vello_cpu::Pixmap> {
    let mut ctx = vello_cpu::RenderContext::new(width, height);
    reset(&mut ctx);
    draw_nodes(&mut ctx, nodes, offset)?;
    let mut pixmap = vello_cpu::Pixmap::new(width, height);
    ctx.flush();
    ctx.render_to_pixmap(&mut pixmap);
    Ok(pixmap)
}

fn mask_apply_rgba8_premul(src: &[u8], mask: &[u8], dst: &mut [u8], mode: MaskMode) {
    for ((s, m), d) in src.chunks_exact(4).zip(mask.chunks_exact(4)).zip(dst.chunks_exact_mut(4)) {
        let weight = match mode {
            MaskMode::Luminance => {
                (0.2125 * f32::from(m[0]) + 0.7154 * f32::from(m[1]) + 0.0721 * f32::from(m[2])) / 255.0
            }
            MaskMode::Alpha => f32::from(m[3]) / 255.0,
        }
        .clamp(0.0, 1.0);
        for i in 0..4 {
            d[i] = (f32::from(s[i]) * weight).round() as u8;
        }
    }
}

fn solid(c: [f32; 4]) -> vello_cpu::peniko::Color {
    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    vello_cpu::peniko::Color::from_rgba8(to_u8(c[0]), to_u8(c[1]), to_u8(c[2]), to_u8(c[3]))
}

fn premul_u8(c: [f32; 4]) -> [u8; 4] {
    let a = c[3].clamp(0.0, 1.0);
    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [to_u8(c[0] * a), to_u8(c[1] * a), to_u8(c[2] * a), to_u8(a)]
}

fn premul_rgba8(rgba: [u8; 4]) -> [u8; 4] {
    let [r, g, b, a] = rgba;
    let a16 = u16::from(a);
    let premul = |c: u8| -> u8 { (((u16::from(c) * a16) + 127) / 255) as u8 };
    [premul(r), premul(g), premul(b), a]
}

fn image_paint(pixmap: vello_cpu::Pixmap) -> vello_cpu::Image {
    vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    }
}

fn pixmap_from_premul_bytes(bytes: &[u8], width: u16, height: u16) -> vello_cpu::Pixmap {
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]]))
        .collect();
    vello_cpu::Pixmap::from_parts_with_opacity(pixels, width, height, true)
}

fn pixmap_to_image(pixmap: &vello_cpu::Pixmap) -> Result<RgbaImage> {
    let mut bytes = pixmap.data_as_u8_slice().to_vec();
    for px in bytes.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
    let (w, h) = (u32::from(pixmap.width()), u32::from(pixmap.height()));
    RgbaImage::from_raw(w, h, bytes)
        .ok_or_else(|| RenderError::InvalidConfiguration(format!("pixmap buffer does not match {w}x{h}")))
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    let pt = |p: Point| vello_cpu::kurbo::Point::new(p.x, p.y);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(pt(p)),
            PathEl::LineTo(p) => out.line_to(pt(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(pt(p1), pt(p2)),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(pt(p1), pt(p2), pt(p3)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::color::Color;
    use crate::eye::{render_eye, EyeOptions};
    use crate::gradient::{compose, GradientDirection, GradientSpec, GradientStop};
    use crate::scene::{AspectRatio, Card};
    use image::Rgba;

    fn scene(size: f64, nodes: Vec<Node>) -> Scene {
        Scene { size, background: Color::WHITE, card: None, nodes }
    }

    fn assert_near(actual: &Rgba<u8>, expected: [u8; 4]) {
        let close = actual.0.iter().zip(expected).all(|(a, e)| a.abs_diff(e) <= 3);
        assert!(close, "pixel {:?} not near {:?}", actual.0, expected);
    }

    #[test]
    fn test_solid_rect() {
        let img = rasterize(&scene(
            10.0,
            vec![
                Node::fill(Shape::rect(Rect::new(0.0, 0.0, 10.0, 10.0)), Color::WHITE),
                Node::fill(Shape::rect(Rect::new(0.0, 0.0, 5.0, 10.0)), Color::BLACK),
            ],
        ))
        .unwrap();
        assert_eq!(img.dimensions(), (10, 10));
        assert_near(img.get_pixel(2, 5), [0, 0, 0, 255]);
        assert_near(img.get_pixel(7, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn test_circle_antialiased_edge() {
        let img =
            rasterize(&scene(20.0, vec![Node::fill(Shape::circle(Point::new(10.0, 10.0), 5.0), Color::BLACK)])).unwrap();
        assert_eq!(img.get_pixel(10, 10)[3], 255);
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        let edge = img.get_pixel(14, 7)[3];
        assert!(edge > 0 && edge < 255, "edge alpha {edge}");
    }

    #[test]
    fn test_half_opacity_fill() {
        let fill = Node::Fill(Fill {
            shape: Shape::rect(Rect::new(0.0, 0.0, 10.0, 10.0)),
            paint: Paint::Solid(Color::BLACK),
            opacity: 0.5,
        });
        let img = rasterize(&scene(10.0, vec![fill])).unwrap();
        let a = img.get_pixel(5, 5)[3];
        assert!(a.abs_diff(128) <= 3, "alpha {a}");
    }

    #[test]
    fn test_gradient_mask_only_inside_children() {
        let gradient = GradientSpec::linear(
            GradientDirection::ToRight,
            vec![GradientStop::new("0%", Color::rgb(255, 0, 0)), GradientStop::new("100%", Color::rgb(0, 0, 255))],
        )
        .resolve(20.0, 20.0)
        .unwrap();
        let child = Node::fill(Shape::rect(Rect::new(0.0, 0.0, 10.0, 20.0)), Color::WHITE);
        let img = rasterize(&scene(20.0, vec![compose(20.0, 20.0, gradient, vec![child])])).unwrap();
        let inside = img.get_pixel(1, 10);
        assert!(inside[3] >= 252);
        assert!(inside[0] > 200 && inside[2] < 50);
        assert_eq!(img.get_pixel(15, 10)[3], 0);
    }

    #[test]
    fn test_clip_uses_alpha_not_color() {
        let clip = Node::Clip {
            clip: vec![Node::fill(Shape::rect(Rect::new(0.0, 0.0, 5.0, 10.0)), Color::BLACK)],
            content: vec![Node::Image(ImageNode {
                asset: Asset::new("red", RgbaImage::from_pixel(3, 3, Rgba([255, 0, 0, 255]))),
                rect: Rect::new(0.0, 0.0, 10.0, 10.0),
                aspect: AspectRatio::MAX_SLICE,
            })],
        };
        let img = rasterize(&scene(10.0, vec![clip])).unwrap();
        assert_near(img.get_pixel(2, 2), [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(8, 2)[3], 0);
    }

    #[test]
    fn test_image_cropped_to_its_box() {
        let node = Node::Image(ImageNode {
            asset: Asset::new("wide", RgbaImage::from_pixel(4, 2, Rgba([0, 0, 255, 255]))),
            rect: Rect::new(5.0, 5.0, 15.0, 15.0),
            aspect: AspectRatio::MID_SLICE,
        });
        let img = rasterize(&scene(20.0, vec![node])).unwrap();
        assert_near(img.get_pixel(10, 10), [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(2, 10)[3], 0);
        assert_eq!(img.get_pixel(17, 10)[3], 0);
    }

    #[test]
    fn test_square_eye_stencil() {
        let eye = render_eye(Point::ZERO, 10.0, &EyeOptions::default(), Color::BLACK, Color::WHITE, false);
        let img = rasterize(&scene(70.0, vec![eye])).unwrap();
        assert_near(img.get_pixel(5, 5), [0, 0, 0, 255]);
        assert_near(img.get_pixel(15, 15), [255, 255, 255, 255]);
        assert_near(img.get_pixel(35, 35), [0, 0, 0, 255]);
    }

    #[test]
    fn test_transparent_gap_shows_through() {
        let opts = EyeOptions::default().with_background_color(Color::TRANSPARENT);
        let eye = render_eye(Point::ZERO, 10.0, &opts, Color::BLACK, Color::WHITE, false);
        let img = rasterize(&scene(70.0, vec![eye])).unwrap();
        assert_eq!(img.get_pixel(15, 15)[3], 0);
    }

    #[test]
    fn test_card_padding_and_shadow() {
        let mut s = scene(10.0, vec![Node::fill(Shape::rect(Rect::new(0.0, 0.0, 10.0, 10.0)), Color::BLACK)]);
        s.card = Some(Card::standard(Color::WHITE));
        let img = rasterize(&s).unwrap();
        assert_eq!(img.dimensions(), (60, 60));
        assert_near(img.get_pixel(30, 30), [0, 0, 0, 255]);
        assert_near(img.get_pixel(10, 30), [255, 255, 255, 255]);
        // Rounded corner lets the shadow or nothing through
        assert!(img.get_pixel(0, 0)[3] < 255);
    }

    #[test]
    fn test_oversized_scene_is_rejected() {
        let err = rasterize(&scene(70_000.0, Vec::new())).unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_empty_scene_is_empty_image() {
        assert_eq!(rasterize(&scene(0.0, Vec::new())).unwrap().dimensions(), (0, 0));
    }
}
