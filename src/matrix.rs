//! Module matrices and the provider that produces them.
//!
//! A [`MatrixProvider`] turns `(value, ecc, version)` into a square grid of dark/light modules.
//! [`QrEncoder`] is the default provider, backed by [`crate::qrcode`]. When no version is pinned
//! it tries versions in ascending order, 1 up to the requested maximum, and keeps the first one
//! that can hold the value.

use crate::error::{RenderError, Result};
use crate::qrcode::{QrCode, QrCodeEcc, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Largest version the pipeline will search up to.
pub const MAX_VERSION: u8 = 10;

/// Error correction level as written in render configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EccLevel {
    L,
    M,
    Q,
    H,
}

impl From<EccLevel> for QrCodeEcc {
    fn from(level: EccLevel) -> Self {
        match level {
            EccLevel::L => QrCodeEcc::Low,
            EccLevel::M => QrCodeEcc::Medium,
            EccLevel::Q => QrCodeEcc::Quartile,
            EccLevel::H => QrCodeEcc::High,
        }
    }
}

impl fmt::Display for EccLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EccLevel::L => "L",
            EccLevel::M => "M",
            EccLevel::Q => "Q",
            EccLevel::H => "H",
        };
        f.write_str(s)
    }
}

/// A square grid of QR modules, `true` = dark.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ModuleMatrix {
    size: usize,
    cells: Vec<bool>,
}

impl ModuleMatrix {
    /// An all-light matrix of the given side length.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![false; size * size],
        }
    }

    /// Builds a matrix from rows. Returns `None` if the rows are not square.
    pub fn from_rows(rows: &[Vec<bool>]) -> Option<Self> {
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return None;
        }
        Some(Self {
            size,
            cells: rows.iter().flatten().copied().collect(),
        })
    }

    /// Copies the modules out of an encoded symbol.
    pub fn from_qr(qr: &QrCode) -> Self {
        let size = qr.size() as usize;
        let mut cells = Vec::with_capacity(size * size);
        for y in 0..qr.size() {
            for x in 0..qr.size() {
                cells.push(qr.get_module(x, y));
            }
        }
        Self { size, cells }
    }

    /// Side length in modules.
    pub fn size(&self) -> usize {
        self.size
    }

    /// True for a zero-sized matrix.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The version implied by the side length, if it is a valid one.
    pub fn version(&self) -> Option<u8> {
        if self.size < 21 || (self.size - 17) % 4 != 0 {
            return None;
        }
        u8::try_from((self.size - 17) / 4).ok()
    }

    /// Module at `(x, y)`; out-of-range coordinates read as light.
    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.size && y < self.size && self.cells[y * self.size + x]
    }

    /// Sets the module at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the matrix.
    pub fn set(&mut self, x: usize, y: usize, dark: bool) {
        assert!(x < self.size && y < self.size, "Module out of range");
        self.cells[y * self.size + x] = dark;
    }

    /// Number of dark modules.
    pub fn dark_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Iterates `(x, y, dark)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, bool)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &dark)| (i % self.size, i / self.size, dark))
    }
}

/// Everything a provider needs to produce one matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatrixRequest {
    pub value: String,
    pub ecc: EccLevel,
    /// Pinned version; `None` searches `1..=max_version`.
    pub version: Option<u8>,
    pub max_version: u8,
}

impl MatrixRequest {
    /// Request for `value` at `ecc`, searching every version up to [`MAX_VERSION`].
    ///
    /// ```
    /// use qrstyle::matrix::{EccLevel, MatrixRequest, MAX_VERSION};
    ///
    /// let request = MatrixRequest::new("hello", EccLevel::M).with_max_version(4);
    /// assert_eq!(request.version, None);
    /// assert_eq!(request.max_version, 4);
    /// assert!(MatrixRequest::new("hello", EccLevel::M).max_version == MAX_VERSION);
    /// ```
    pub fn new(value: impl Into<String>, ecc: EccLevel) -> Self {
        Self {
            value: value.into(),
            ecc,
            version: None,
            max_version: MAX_VERSION,
        }
    }

    /// Pins the version, or clears the pin with `None`.
    pub fn with_version(mut self, version: Option<u8>) -> Self {
        self.version = version;
        self
    }

    /// Caps the version search.
    pub fn with_max_version(mut self, max_version: u8) -> Self {
        self.max_version = max_version;
        self
    }
}

/// Produces module matrices. Implementations must be deterministic.
pub trait MatrixProvider: Send + Sync {
    /// Encodes `request` into a matrix.
    fn generate(&self, request: &MatrixRequest) -> Result<ModuleMatrix>;
}

/// The default provider, backed by the in-crate encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrEncoder;

impl QrEncoder {
    fn encode_at(value: &str, ecc: EccLevel, version: Version) -> Option<QrCode> {
        QrCode::encode_text(value, ecc.into(), version, version, None).ok()
    }
}

impl MatrixProvider for QrEncoder {
    fn generate(&self, request: &MatrixRequest) -> Result<ModuleMatrix> {
        let capacity_exceeded = |max_version: u8| RenderError::CapacityExceeded {
            ecc: request.ecc,
            max_version,
        };

        if let Some(pinned) = request.version {
            let version = Version::try_new(pinned).ok_or_else(|| {
                RenderError::InvalidConfiguration(format!("version {pinned} is outside 1..=10"))
            })?;
            let qr = Self::encode_at(&request.value, request.ecc, version)
                .ok_or_else(|| capacity_exceeded(pinned))?;
            debug!(version = pinned, ecc = %request.ecc, "encoded at pinned version");
            return Ok(ModuleMatrix::from_qr(&qr));
        }

        let max = Version::try_new(request.max_version).ok_or_else(|| {
            RenderError::InvalidConfiguration(format!(
                "maxVersion {} is outside 1..=10",
                request.max_version
            ))
        })?;

        for v in Version::MIN.value()..=max.value() {
            if let Some(qr) = Self::encode_at(&request.value, request.ecc, Version::new(v)) {
                debug!(version = v, ecc = %request.ecc, "encoded after version search");
                return Ok(ModuleMatrix::from_qr(&qr));
            }
        }
        Err(capacity_exceeded(max.value()))
    }
}
