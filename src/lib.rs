//! # qrstyle
//!
//! A Rust library for rendering styled QR codes.
//!
//! `qrstyle` takes a value and a [`RenderConfig`] and produces a resolution-independent
//! [`Scene`]: data modules drawn as custom pieces, the three finder patterns drawn as
//! styled eyes, an optional centered logo, and optional gradient or image fills. Scenes are
//! written out as SVG documents or rasterized into RGBA images.
//!
//! ## Features
//!
//! - Piece shapes: square, rounded, dot, triangle, heart and rain drop.
//! - Eye shapes: square with per-layer corner radii, circle, dot ring, triangle and heart.
//! - Logos with padding, border and background, with the covered modules cleared.
//! - Linear and radial gradients, optionally masking the logo too.
//! - Image backgrounds clipped to the symbol.
//! - JSON configuration and ready-made [`config::Variant`] presets.
//! - Last-call-wins asynchronous rendering on tokio.
//! - Safe Rust implementation with no unsafe code.
//!
//! ## Installation
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! qrstyle = "0.1" # Replace with the latest version
//! ```
//!
//! ## Example
//!
//! Render a dotted QR code to SVG:
//!
//! ```rust
//! use qrstyle::config::{RenderConfig, Variant};
//! use qrstyle::render::QrRenderer;
//! use qrstyle::svg::to_svg_string;
//!
//! let scene = QrRenderer::new().render(&RenderConfig::variant(Variant::Dot)).unwrap();
//! let svg = to_svg_string(&scene).unwrap();
//! assert!(svg.starts_with("<?xml"));
//! ```
//!
//! Load a configuration from JSON and save a PNG:
//!
//! ```no_run
//! use qrstyle::{helper::generate_image, RenderConfig};
//!
//! let config = RenderConfig::from_json(r##"{
//!     "value": "https://example.com",
//!     "color": "#483D8B",
//!     "piece": { "shape": "dot" },
//!     "logo": { "source": "logo.png", "size": 0.25 }
//! }"##).unwrap();
//! generate_image(&config, Some("output"), Some("styled_qr")).unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`qrcode`]: Core QR code encoding.
//! - [`matrix`]: Module matrices and the providers that produce them.
//! - [`config`]: Render configuration and presets.
//! - [`render`]: The render pipeline.
//! - [`svg`] and [`raster`]: Scene output.
//! - [`helper`]: One-call utilities.

#![forbid(unsafe_code)]

pub mod asset;
pub mod color;
pub mod compositor;
pub mod config;
pub mod error;
pub mod eye;
pub mod geometry;
pub mod gradient;
pub mod helper;
pub mod logo;
pub mod matrix;
pub mod piece;
pub mod qrcode;
pub mod raster;
pub mod render;
pub mod scene;
pub mod session;
pub mod svg;

pub use config::RenderConfig;
pub use error::{RenderError, Result};
pub use render::QrRenderer;
pub use scene::Scene;
