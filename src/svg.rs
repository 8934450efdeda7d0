//! SVG serialization of a [`Scene`].

use crate::color::Color;
use crate::error::Result;
use crate::gradient::{Gradient, GradientGeometry};
use crate::scene::{Fill, ImageNode, Node, Paint, Scene, Shape};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::ImageFormat;
use std::io::Cursor;

/// Formats a coordinate with at most three decimals and no trailing zeros.
fn num(v: f64) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn paint_attrs(color: Color) -> String {
    if color.is_transparent() {
        return "fill=\"none\"".to_string();
    }
    let mut attrs = format!("fill=\"{}\"", color.to_hex_rgb());
    if color.a < 255 {
        attrs += &format!(" fill-opacity=\"{}\"", num(color.alpha()));
    }
    attrs
}

struct Writer {
    defs: String,
    next_id: usize,
}

impl Writer {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    fn gradient(&mut self, gradient: &Gradient) -> String {
        let id = self.id("gradient");
        let (open, close) = match gradient.geometry {
            GradientGeometry::Linear { start, end } => (
                format!(
                    "<linearGradient id=\"{}\" gradientUnits=\"userSpaceOnUse\" x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\">",
                    id, num(start.x), num(start.y), num(end.x), num(end.y)
                ),
                "</linearGradient>",
            ),
            GradientGeometry::Radial { center, radius, focal } => (
                format!(
                    "<radialGradient id=\"{}\" gradientUnits=\"userSpaceOnUse\" cx=\"{}\" cy=\"{}\" r=\"{}\" fx=\"{}\" fy=\"{}\">",
                    id, num(center.x), num(center.y), num(radius), num(focal.x), num(focal.y)
                ),
                "</radialGradient>",
            ),
        };
        self.defs += &open;
        for stop in &gradient.stops {
            self.defs += &format!(
                "<stop offset=\"{}\" stop-color=\"{}\" stop-opacity=\"{}\"/>",
                num(stop.offset),
                stop.color.to_hex_rgb(),
                num(stop.color.alpha() * stop.opacity)
            );
        }
        self.defs += close;
        id
    }

    fn fill(&mut self, fill: &Fill) -> String {
        let mut attrs = match &fill.paint {
            Paint::Solid(color) => paint_attrs(*color),
            Paint::Gradient(gradient) => format!("fill=\"url(#{})\"", self.gradient(gradient)),
        };
        if fill.opacity < 1.0 {
            attrs += &format!(" opacity=\"{}\"", num(fill.opacity.max(0.0)));
        }
        match &fill.shape {
            Shape::Rect { rect, radii } if radii.is_uniform() => {
                let rx = if radii.is_zero() {
                    String::new()
                } else {
                    // SVG clamps rx to half the side the same way
                    format!(" rx=\"{0}\" ry=\"{0}\"", num(radii.tl))
                };
                format!(
                    "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"{} {}/>",
                    num(rect.x0), num(rect.y0), num(rect.width()), num(rect.height()), rx, attrs
                )
            }
            Shape::Circle { center, radius } => format!(
                "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" {}/>",
                num(center.x), num(center.y), num(*radius), attrs
            ),
            shape => format!("<path d=\"{}\" {}/>", shape.to_path().to_svg(), attrs),
        }
    }

    fn image(&mut self, image: &ImageNode) -> Result<String> {
        let mut png = Vec::new();
        image.asset.bitmap.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(format!(
            "<image x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" preserveAspectRatio=\"{}\" href=\"data:image/png;base64,{}\"/>",
            num(image.rect.x0),
            num(image.rect.y0),
            num(image.rect.width()),
            num(image.rect.height()),
            image.aspect.to_svg(),
            STANDARD.encode(&png)
        ))
    }

    fn nodes(&mut self, nodes: &[Node], size: f64) -> Result<String> {
        let mut out = String::new();
        for node in nodes {
            out += &self.node(node, size)?;
        }
        Ok(out)
    }

    fn node(&mut self, node: &Node, size: f64) -> Result<String> {
        Ok(match node {
            Node::Fill(fill) => self.fill(fill),
            Node::Group(children) => format!("<g>{}</g>", self.nodes(children, size)?),
            Node::Image(image) => self.image(image)?,
            Node::Mask { mask, content } => {
                let id = self.id("mask");
                let body = self.nodes(mask, size)?;
                self.defs += &format!(
                    "<mask id=\"{}\" maskUnits=\"userSpaceOnUse\" x=\"0\" y=\"0\" width=\"{1}\" height=\"{1}\">{2}</mask>",
                    id, num(size), body
                );
                format!("<g mask=\"url(#{})\">{}</g>", id, self.nodes(content, size)?)
            }
            Node::Clip { clip, content } => {
                let id = self.id("clip");
                let mut body = String::new();
                // Clip paths only take shapes, so groups are flattened
                for fill in clip.iter().flat_map(Node::fills) {
                    body += &self.fill(fill);
                }
                self.defs += &format!("<clipPath id=\"{}\">{}</clipPath>", id, body);
                format!("<g clip-path=\"url(#{})\">{}</g>", id, self.nodes(content, size)?)
            }
        })
    }
}

/// Serializes `scene` to a standalone SVG document.
///
/// With a card, the document grows by the card padding on every side and the symbol is
/// translated into the middle of it.
pub fn to_svg_string(scene: &Scene) -> Result<String> {
    let mut writer = Writer { defs: String::new(), next_id: 0 };
    let body = writer.nodes(&scene.nodes, scene.size)?;
    let output = scene.output_size();

    let mut result = String::new();
    result += "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
    result += &format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{0}\" height=\"{0}\" viewBox=\"0 0 {0} {0}\" stroke=\"none\">\n",
        num(output)
    );

    let mut card = String::new();
    if let Some(c) = &scene.card {
        let filter = writer.id("shadow");
        writer.defs += &format!(
            "<filter id=\"{}\" x=\"-20%\" y=\"-20%\" width=\"140%\" height=\"140%\"><feDropShadow dx=\"{}\" dy=\"{}\" stdDeviation=\"{}\" flood-color=\"{}\" flood-opacity=\"{}\"/></filter>",
            filter,
            num(c.shadow.offset.x),
            num(c.shadow.offset.y),
            num(c.shadow.blur),
            c.shadow.color.to_hex_rgb(),
            num(c.shadow.color.alpha())
        );
        card = format!(
            "\t<rect x=\"0\" y=\"0\" width=\"{0}\" height=\"{0}\" rx=\"{1}\" ry=\"{1}\" {2} filter=\"url(#{3})\"/>\n",
            num(output),
            num(c.corner_radius),
            paint_attrs(c.background),
            filter
        );
    }

    if !writer.defs.is_empty() {
        result += &format!("\t<defs>{}</defs>\n", writer.defs);
    }
    result += &card;
    match &scene.card {
        Some(c) => result += &format!("\t<g transform=\"translate({0},{0})\">{1}</g>\n", num(c.padding), body),
        None => result += &format!("\t<g>{}</g>\n", body),
    }
    result += "</svg>\n";
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::geometry::CornerRadii;
    use crate::gradient::{GradientDirection, GradientSpec, GradientStop};
    use crate::scene::{AspectRatio, Card};
    use image::RgbaImage;
    use kurbo::{Point, Rect};

    fn scene(nodes: Vec<Node>, card: Option<Card>) -> Scene {
        Scene { size: 100.0, background: Color::WHITE, card, nodes }
    }

    #[test]
    fn test_number_format() {
        assert_eq!(num(10.0), "10");
        assert_eq!(num(2.5), "2.5");
        assert_eq!(num(1.0 / 3.0), "0.333");
        assert_eq!(num(-0.0001), "0");
    }

    #[test]
    fn test_shapes() {
        let svg = to_svg_string(&scene(
            vec![
                Node::fill(Shape::rect(Rect::new(0.0, 0.0, 10.0, 10.0)), Color::BLACK),
                Node::fill(Shape::circle(Point::new(5.0, 5.0), 2.5), Color::rgba(255, 0, 0, 128)),
                Node::fill(
                    Shape::rounded_rect(Rect::new(0.0, 0.0, 10.0, 10.0), CornerRadii::new(1.0, 0.0, 0.0, 0.0)),
                    Color::BLACK,
                ),
            ],
            None,
        ))
        .unwrap();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("width=\"100\" height=\"100\""));
        assert!(svg.contains("<rect x=\"0\" y=\"0\" width=\"10\" height=\"10\" fill=\"#000000\"/>"));
        assert!(svg.contains("<circle cx=\"5\" cy=\"5\" r=\"2.5\" fill=\"#FF0000\" fill-opacity=\"0.502\"/>"));
        assert!(svg.contains("<path d=\"M"));
        assert!(!svg.contains("<defs>"));
    }

    #[test]
    fn test_gradient_mask_defs() {
        let gradient = GradientSpec::linear(GradientDirection::ToRight, vec![GradientStop::new("0%", Color::BLACK)])
            .resolve(100.0, 100.0)
            .unwrap();
        let child = Node::fill(Shape::rect(Rect::new(0.0, 0.0, 10.0, 10.0)), Color::WHITE);
        let svg = to_svg_string(&scene(vec![crate::gradient::compose(100.0, 100.0, gradient, vec![child])], None)).unwrap();
        assert!(svg.contains("<mask id=\"mask1\" maskUnits=\"userSpaceOnUse\""));
        assert!(svg.contains("<linearGradient id=\"gradient2\" gradientUnits=\"userSpaceOnUse\" x1=\"0\" y1=\"0\" x2=\"100\" y2=\"0\">"));
        assert!(svg.contains("fill=\"url(#gradient2)\""));
        assert!(svg.contains("<g mask=\"url(#mask1)\">"));
    }

    #[test]
    fn test_clip_and_image() {
        let clip = Node::Clip {
            clip: vec![Node::Group(vec![Node::fill(Shape::circle(Point::new(5.0, 5.0), 5.0), Color::WHITE)])],
            content: vec![Node::Image(ImageNode {
                asset: Asset::new("bg", RgbaImage::new(2, 2)),
                rect: Rect::new(0.0, 0.0, 100.0, 100.0),
                aspect: AspectRatio::MAX_SLICE,
            })],
        };
        let svg = to_svg_string(&scene(vec![clip], None)).unwrap();
        assert!(svg.contains("<clipPath id=\"clip1\"><circle"));
        assert!(svg.contains("preserveAspectRatio=\"xMaxYMax slice\""));
        assert!(svg.contains("href=\"data:image/png;base64,"));
    }

    #[test]
    fn test_card_wrapper() {
        let svg = to_svg_string(&scene(Vec::new(), Some(Card::standard(Color::WHITE)))).unwrap();
        assert!(svg.contains("width=\"150\" height=\"150\""));
        assert!(svg.contains("<feDropShadow dx=\"0\" dy=\"8\" stdDeviation=\"3.84\""));
        assert!(svg.contains("rx=\"20\""));
        assert!(svg.contains("translate(25,25)"));
    }
}
