//! Render configuration.
//!
//! [`RenderConfig`] mirrors the JSON props a host passes in (camelCase keys) and resolves the
//! defaults the pipeline relies on.

use crate::color::Color;
use crate::error::{RenderError, Result};
use crate::eye::{EyeOptions, EyeRadii, EyeShape, EyeSize};
use crate::geometry::{CornerRadii, EyeCorner};
use crate::gradient::{GradientDirection, GradientSpec, GradientStop};
use crate::logo::LogoOptions;
use crate::matrix::{EccLevel, MatrixRequest, MAX_VERSION};
use crate::piece::{PieceOptions, PieceStyle};
use serde::{Deserialize, Serialize};

/// Largest accepted `size`, in pixels.
pub const MAX_SIZE: f64 = 8192.0;

fn default_size() -> f64 {
    200.0
}

fn default_color() -> Color {
    Color::BLACK
}

fn default_background() -> Color {
    Color::WHITE
}

fn default_max_version() -> u8 {
    MAX_VERSION
}

/// Per-corner eye styling.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EyeSet {
    #[serde(default)]
    pub top_left: EyeOptions,
    #[serde(default)]
    pub top_right: EyeOptions,
    #[serde(default)]
    pub bottom_left: EyeOptions,
}

impl EyeSet {
    /// The same options on all three corners.
    pub fn uniform(options: EyeOptions) -> Self {
        Self {
            top_left: options,
            top_right: options,
            bottom_left: options,
        }
    }

    pub fn get(&self, corner: EyeCorner) -> &EyeOptions {
        match corner {
            EyeCorner::TopLeft => &self.top_left,
            EyeCorner::TopRight => &self.top_right,
            EyeCorner::BottomLeft => &self.bottom_left,
        }
    }
}

/// A bitmap the symbol's silhouette is cut out of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageClip {
    #[serde(alias = "source", alias = "uri")]
    pub href: String,
}

/// Everything that determines one rendered symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    pub value: String,
    /// Side of the symbol in pixels.
    #[serde(default = "default_size")]
    pub size: f64,
    #[serde(default = "default_color")]
    pub color: Color,
    #[serde(default = "default_background")]
    pub background_color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient: Option<GradientSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<LogoOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_clip: Option<ImageClip>,
    #[serde(default)]
    pub piece: PieceOptions,
    #[serde(default)]
    pub eye: EyeSet,
    /// Wrap the symbol in a padded, rounded, shadowed card.
    #[serde(default)]
    pub include_background: bool,
    /// Pinned version; otherwise the smallest fitting one up to `max_version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
    #[serde(default = "default_max_version")]
    pub max_version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_correction_level: Option<EccLevel>,
}

impl RenderConfig {
    /// Defaults for everything but the value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            size: default_size(),
            color: default_color(),
            background_color: default_background(),
            gradient: None,
            logo: None,
            image_clip: None,
            piece: PieceOptions::default(),
            eye: EyeSet::default(),
            include_background: false,
            version: None,
            max_version: MAX_VERSION,
            error_correction_level: None,
        }
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RenderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty-printed JSON with camelCase keys.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the value, size, version bounds and gradient.
    pub fn validate(&self) -> Result<()> {
        if self.value.is_empty() {
            return Err(RenderError::InvalidConfiguration("value is empty".to_string()));
        }
        if !self.size.is_finite() || self.size <= 0.0 {
            return Err(RenderError::InvalidConfiguration(format!(
                "size must be a positive number, got {}",
                self.size
            )));
        }
        if self.size > MAX_SIZE {
            return Err(RenderError::InvalidConfiguration(format!(
                "size {} exceeds the {MAX_SIZE} pixel limit",
                self.size
            )));
        }
        let in_range = |v: u8| (1..=MAX_VERSION).contains(&v);
        if let Some(v) = self.version.filter(|&v| !in_range(v)) {
            return Err(RenderError::InvalidConfiguration(format!("version {v} is outside 1..=10")));
        }
        if !in_range(self.max_version) {
            return Err(RenderError::InvalidConfiguration(format!(
                "maxVersion {} is outside 1..=10",
                self.max_version
            )));
        }
        if let Some(gradient) = &self.gradient {
            gradient.validate()?;
        }
        Ok(())
    }

    /// The explicit level, else `H` when a logo is configured and `M` otherwise.
    pub fn resolved_ecc(&self) -> EccLevel {
        match (self.error_correction_level, &self.logo) {
            (Some(level), _) => level,
            (None, Some(_)) => EccLevel::H,
            (None, None) => EccLevel::M,
        }
    }

    /// The matrix request this configuration encodes to.
    pub fn matrix_request(&self) -> MatrixRequest {
        MatrixRequest::new(self.value.clone(), self.resolved_ecc())
            .with_version(self.version)
            .with_max_version(self.max_version)
    }

    /// Sets the symbol side in pixels.
    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    /// Sets the foreground color of pieces and eyes.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Sets the color behind the symbol and in the eye gaps.
    pub fn with_background_color(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Sets the data module style.
    pub fn with_piece(mut self, piece: PieceOptions) -> Self {
        self.piece = piece;
        self
    }

    /// Sets the finder pattern styles.
    pub fn with_eyes(mut self, eye: EyeSet) -> Self {
        self.eye = eye;
        self
    }

    /// Adds a centered logo. Error correction defaults to `H` once a logo is set.
    pub fn with_logo(mut self, logo: LogoOptions) -> Self {
        self.logo = Some(logo);
        self
    }

    /// Fills the symbol with a gradient instead of `color`.
    pub fn with_gradient(mut self, gradient: GradientSpec) -> Self {
        self.gradient = Some(gradient);
        self
    }

    /// Cuts the symbol's silhouette out of the image at `href`.
    pub fn with_image_clip(mut self, href: impl Into<String>) -> Self {
        self.image_clip = Some(ImageClip { href: href.into() });
        self
    }

    /// Toggles the padded, shadowed card.
    pub fn with_background(mut self, include: bool) -> Self {
        self.include_background = include;
        self
    }

    /// Pins the symbol version.
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = Some(version);
        self
    }

    /// Caps the automatic version search.
    pub fn with_max_version(mut self, max_version: u8) -> Self {
        self.max_version = max_version;
        self
    }

    /// Sets the error correction level explicitly.
    pub fn with_ecc(mut self, level: EccLevel) -> Self {
        self.error_correction_level = Some(level);
        self
    }

    /// A ready-made style. Fields can be overridden afterwards.
    pub fn variant(variant: Variant) -> Self {
        variant.config()
    }
}

/// Ready-made styles. Logo and image presets reference `"logo.png"` for the asset resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Variant {
    Basic,
    Triangle,
    Heart,
    Dot,
    WithLogo,
    Rain,
    LinearGradient,
    RadialGradient,
    ImageBackground,
}

impl Variant {
    pub const ALL: [Variant; 9] = [
        Variant::Basic,
        Variant::Triangle,
        Variant::Heart,
        Variant::Dot,
        Variant::WithLogo,
        Variant::Rain,
        Variant::LinearGradient,
        Variant::RadialGradient,
        Variant::ImageBackground,
    ];

    const LOGO: &'static str = "logo.png";

    fn config(self) -> RenderConfig {
        let base = |value: &str| RenderConfig::new(value).with_size(250.0).with_background(true);
        let square = |outer: CornerRadii, middle: CornerRadii, core: CornerRadii, size: EyeSize| {
            EyeOptions::new(EyeShape::Square {
                radii: EyeRadii { outer, middle, core },
                size,
            })
        };
        let uniform = CornerRadii::uniform;

        match self {
            Variant::Basic => base("Basic Qr Code"),
            Variant::Triangle => base("Triangle Qr Code")
                .with_color(Color::rgb(0xDA, 0xA5, 0x20))
                .with_piece(PieceOptions::new(PieceStyle::Triangle))
                .with_eyes(EyeSet::uniform(EyeOptions::new(EyeShape::Triangle))),
            Variant::Heart => base("Heart Qr Code")
                .with_color(Color::rgb(0xFF, 0xC0, 0xCB))
                .with_piece(PieceOptions::new(PieceStyle::Heart))
                .with_eyes(EyeSet::uniform(EyeOptions::new(EyeShape::Heart))),
            Variant::Dot => base("Dot Qr Code")
                .with_color(Color::rgb(0x48, 0x3D, 0x8B))
                .with_piece(PieceOptions::new(PieceStyle::Dot))
                .with_eyes(EyeSet::uniform(EyeOptions::new(EyeShape::Dot))),
            Variant::WithLogo => {
                let eye = square(uniform(9.0), uniform(5.0), uniform(3.0), EyeSize::default())
                    .with_color(Color::rgb(0x31, 0x78, 0xC6))
                    .with_inner_color(Color::BLACK);
                base("With Logo Qr Code")
                    .with_version(3)
                    .with_piece(PieceOptions::new(PieceStyle::Dot))
                    .with_eyes(EyeSet::uniform(eye))
                    .with_logo(
                        LogoOptions::new(Self::LOGO)
                            .with_size(0.25)
                            .with_background_color(Color::TRANSPARENT),
                    )
            }
            Variant::Rain => {
                let size = EyeSize { outer: 1.0, center: 1.2, inner: 1.3 };
                let eye = square(uniform(20.0), uniform(13.0), uniform(10.0), size);
                base("Rain Qr Code")
                    .with_color(Color::rgb(0x20, 0x74, 0xA7))
                    .with_version(2)
                    .with_piece(PieceOptions::new(PieceStyle::Rain))
                    .with_eyes(EyeSet::uniform(eye))
            }
            Variant::LinearGradient => {
                let size = EyeSize { outer: 1.0, center: 1.3, inner: 1.3 };
                // The corner facing the symbol's middle stays sharp
                let eye = |outer: CornerRadii, middle: CornerRadii| {
                    square(outer, middle, uniform(15.0), size)
                };
                let eyes = EyeSet {
                    top_left: eye(
                        CornerRadii::new(20.0, 20.0, 0.0, 20.0),
                        CornerRadii::new(13.0, 13.0, 0.0, 13.0),
                    ),
                    top_right: eye(
                        CornerRadii::new(20.0, 20.0, 20.0, 0.0),
                        CornerRadii::new(13.0, 13.0, 13.0, 0.0),
                    ),
                    bottom_left: eye(
                        CornerRadii::new(20.0, 0.0, 20.0, 20.0),
                        CornerRadii::new(13.0, 0.0, 13.0, 13.0),
                    ),
                };
                let stops = vec![
                    GradientStop::new("0%", Color::rgb(0x63, 0x66, 0xF1)).with_opacity(0.8),
                    GradientStop::new("33%", Color::rgb(0xEC, 0x48, 0x99)).with_opacity(0.7),
                    GradientStop::new("66%", Color::rgb(0x8B, 0x5C, 0xF6)).with_opacity(0.7),
                    GradientStop::new("100%", Color::rgb(0x3B, 0x82, 0xF6)).with_opacity(0.8),
                ];
                base("Linear Gradient Qr Code")
                    .with_version(3)
                    .with_piece(PieceOptions::new(PieceStyle::Dot))
                    .with_eyes(eyes)
                    .with_logo(
                        LogoOptions::new(Self::LOGO)
                            .with_size(0.25)
                            .with_padding(7.0)
                            .with_border_radius(99.0),
                    )
                    .with_gradient(
                        GradientSpec::linear(GradientDirection::ToRight, stops).with_mask_logo(true),
                    )
            }
            Variant::RadialGradient => {
                let eye = square(uniform(20.0), uniform(13.0), uniform(10.0), EyeSize::default());
                let stops = vec![
                    GradientStop::new("10%", Color::rgb(0xFF, 0xF2, 0x42)).with_opacity(0.5),
                    GradientStop::new("100%", Color::rgb(0x22, 0x8B, 0x22)).with_opacity(0.8),
                ];
                base("Radial Gradient Qr Code")
                    .with_version(3)
                    .with_piece(PieceOptions::new(PieceStyle::Rounded { radius: 2.0 }))
                    .with_eyes(EyeSet::uniform(eye))
                    .with_gradient(GradientSpec::radial(stops))
            }
            Variant::ImageBackground => base("Image Background Qr Code")
                .with_version(4)
                .with_ecc(EccLevel::H)
                .with_piece(PieceOptions::new(PieceStyle::Dot))
                .with_eyes(EyeSet::uniform(EyeOptions::new(EyeShape::Circle {
                    size: EyeSize::default(),
                })))
                .with_image_clip(Self::LOGO),
        }
    }
}
