//! Maps matrix cells and finder patterns to pixel space.
//!
//! Everything here is a pure function of the matrix size and the cell size; painting decisions
//! live in [`crate::piece`] and [`crate::eye`].

use kurbo::{Point, RoundedRectRadii};
use serde::{Deserialize, Serialize};

/// Side length, in cells, of a finder pattern zone.
pub const EYE_ZONE: usize = 7;

/// The three corners carrying a finder pattern. QR symbols never have one bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EyeCorner {
    TopLeft,
    TopRight,
    BottomLeft,
}

impl EyeCorner {
    pub const ALL: [EyeCorner; 3] = [EyeCorner::TopLeft, EyeCorner::TopRight, EyeCorner::BottomLeft];
}

/// Side length of one cell in pixels.
pub fn cell_size(symbol_size: f64, modules: usize) -> f64 {
    if modules == 0 {
        0.0
    } else {
        symbol_size / modules as f64
    }
}

/// Top-left pixel corner of cell `(x, y)`.
pub fn cell_origin(x: usize, y: usize, cell_size: f64) -> Point {
    Point::new(x as f64 * cell_size, y as f64 * cell_size)
}

/// Top-left pixel corner of an eye. The right and bottom eyes sit flush with the symbol edge.
pub fn eye_origin(corner: EyeCorner, symbol_size: f64, cell_size: f64) -> Point {
    let far = symbol_size - EYE_ZONE as f64 * cell_size;
    match corner {
        EyeCorner::TopLeft => Point::new(0.0, 0.0),
        EyeCorner::TopRight => Point::new(far, 0.0),
        EyeCorner::BottomLeft => Point::new(0.0, far),
    }
}

/// Which eye zone, if any, contains cell `(x, y)` of an `n`×`n` matrix.
pub fn eye_zone_of(x: usize, y: usize, n: usize) -> Option<EyeCorner> {
    let near = |v: usize| v < EYE_ZONE;
    let far = |v: usize| v + EYE_ZONE >= n;
    if near(x) && near(y) {
        Some(EyeCorner::TopLeft)
    } else if far(x) && near(y) {
        Some(EyeCorner::TopRight)
    } else if near(x) && far(y) {
        Some(EyeCorner::BottomLeft)
    } else {
        None
    }
}

pub fn is_in_eye(x: usize, y: usize, n: usize) -> bool {
    eye_zone_of(x, y, n).is_some()
}

/// Per-corner radii of a rounded box.
///
/// Non-finite and negative radii are treated as zero rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CornerRadii {
    pub tl: f64,
    pub tr: f64,
    pub br: f64,
    pub bl: f64,
}

impl CornerRadii {
    pub const ZERO: CornerRadii = CornerRadii { tl: 0.0, tr: 0.0, br: 0.0, bl: 0.0 };

    pub fn new(tl: f64, tr: f64, br: f64, bl: f64) -> Self {
        Self {
            tl: sanitize(tl),
            tr: sanitize(tr),
            br: sanitize(br),
            bl: sanitize(bl),
        }
    }

    pub fn uniform(r: f64) -> Self {
        Self::new(r, r, r, r)
    }

    pub fn is_zero(&self) -> bool {
        self.tl == 0.0 && self.tr == 0.0 && self.br == 0.0 && self.bl == 0.0
    }

    pub fn is_uniform(&self) -> bool {
        self.tl == self.tr && self.tr == self.br && self.br == self.bl
    }
}

impl From<CornerRadii> for RoundedRectRadii {
    fn from(r: CornerRadii) -> Self {
        RoundedRectRadii::new(r.tl, r.tr, r.br, r.bl)
    }
}

fn sanitize(r: f64) -> f64 {
    if r.is_finite() && r > 0.0 {
        r
    } else {
        0.0
    }
}

/// A radius as configured: one number for all corners or an explicit record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerRadius {
    Uniform(f64),
    Corners {
        #[serde(default)]
        tl: Option<f64>,
        #[serde(default)]
        tr: Option<f64>,
        #[serde(default)]
        br: Option<f64>,
        #[serde(default)]
        bl: Option<f64>,
    },
}

impl LayerRadius {
    /// Resolves to concrete radii; missing corners become zero.
    pub fn normalize(&self) -> CornerRadii {
        match *self {
            LayerRadius::Uniform(r) => CornerRadii::uniform(r),
            LayerRadius::Corners { tl, tr, br, bl } => CornerRadii::new(
                tl.unwrap_or(0.0),
                tr.unwrap_or(0.0),
                br.unwrap_or(0.0),
                bl.unwrap_or(0.0),
            ),
        }
    }
}

impl Default for LayerRadius {
    fn default() -> Self {
        LayerRadius::Uniform(0.0)
    }
}
