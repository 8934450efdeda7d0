//! QR code encoding functionality.
//!
//! This module turns text into a QR Code Model 2 symbol. It covers versions 1 to 10, the four error
//! correction levels and the numeric, alphanumeric and byte segment modes, which is everything the
//! styled renderer needs from an encoder. Symbols own their module grid; nothing is borrowed from
//! caller-provided buffers.

/// A QR Code symbol, representing a square grid of dark and light modules.
///
/// Instances are immutable after creation. Use [`QrCode::encode_text`] for the common case or
/// [`QrCode::encode_segments`] when the segments are built by hand.
///
/// # Example
///
/// ```rust
/// use qrstyle::qrcode::{QrCode, QrCodeEcc, Version};
///
/// let qr = QrCode::encode_text(
///     "Hello, World!",
///     QrCodeEcc::Low,
///     Version::MIN,
///     Version::MAX,
///     None,
/// ).unwrap();
///
/// assert_eq!(qr.size(), 21);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrCode {
    version: Version,

    /// Width and height in modules, `version * 4 + 17`.
    size: i32,

    ecl: QrCodeEcc,

    mask: Mask,

    /// Row-major modules, `true` = dark.
    modules: Vec<bool>,

    /// Marks function modules (finders, timing, alignment, format and version areas) while the
    /// symbol is under construction. Emptied once the symbol is finished.
    isfunction: Vec<bool>,
}

impl QrCode {
    /// Encodes a text string into a QR code.
    ///
    /// The text becomes a single numeric, alphanumeric or byte segment, whichever is the most
    /// compact mode able to hold it. The smallest version within `minversion..=maxversion` that
    /// fits the data is chosen. The `mask` can be `None` for automatic selection.
    ///
    /// # Arguments
    ///
    /// * `text` - The text to encode.
    /// * `ecl` - Error correction level.
    /// * `minversion` - Minimum QR code version.
    /// * `maxversion` - Maximum QR code version.
    /// * `mask` - Optional mask pattern.
    ///
    /// # Returns
    ///
    /// A `Result` containing the QR code or a [`DataTooLong`] error if the data is too long.
    pub fn encode_text(
        text: &str,
        ecl: QrCodeEcc,
        minversion: Version,
        maxversion: Version,
        mask: Option<Mask>
    ) -> Result<Self, DataTooLong> {
        if text.is_empty() {
            return Self::encode_segments(&[], ecl, minversion, maxversion, mask);
        }
        let seg = QrSegment::make_segment(text);
        Self::encode_segments(&[seg], ecl, minversion, maxversion, mask)
    }

    /// Encodes the given segments into a QR code.
    ///
    /// # Panics
    ///
    /// Panics if `minversion > maxversion`.
    pub fn encode_segments(
        segs: &[QrSegment],
        ecl: QrCodeEcc,
        minversion: Version,
        maxversion: Version,
        mask: Option<Mask>
    ) -> Result<Self, DataTooLong> {
        assert!(minversion <= maxversion, "Invalid value");

        // Find the minimal version number to use
        let mut version: Version = minversion;
        let datausedbits: usize = loop {
            let datacapacitybits: usize = QrCode::num_data_codewords(version, ecl) * 8;
            match QrSegment::total_bits(segs, version) {
                Some(n) if n <= datacapacitybits => break n,
                dataused if version >= maxversion => {
                    return Err(match dataused {
                        None => DataTooLong::SegmentTooLong,
                        Some(n) => DataTooLong::DataOverCapacity(n, datacapacitybits),
                    });
                }
                _ => version = Version::new(version.value() + 1),
            }
        };

        // Concatenate all segments to create the data bit string
        let mut bb = BitBuffer(Vec::with_capacity(datausedbits));
        for seg in segs {
            bb.append_bits(seg.mode.mode_bits(), 4);
            bb.append_bits(seg.numchars as u32, seg.mode.num_char_count_bits(version));
            bb.0.extend_from_slice(&seg.data);
        }
        debug_assert_eq!(bb.len(), datausedbits);

        // Add terminator and pad up to a byte if applicable
        let datacapacitybits: usize = QrCode::num_data_codewords(version, ecl) * 8;
        let numzerobits: usize = core::cmp::min(4, datacapacitybits - bb.len());
        bb.append_bits(0, numzerobits as u8);
        let numzerobits: usize = bb.len().wrapping_neg() & 7;
        bb.append_bits(0, numzerobits as u8);
        debug_assert_eq!(bb.len() % 8, 0);

        // Pad with alternating bytes until data capacity is reached
        for &padbyte in [0xec, 0x11].iter().cycle() {
            if bb.len() >= datacapacitybits {
                break;
            }
            bb.append_bits(padbyte, 8);
        }

        let mut datacodewords = vec![0u8; bb.len() / 8];
        for (i, &bit) in bb.0.iter().enumerate() {
            datacodewords[i >> 3] |= u8::from(bit) << (7 - (i & 7));
        }
        Ok(QrCode::encode_codewords(version, ecl, &datacodewords, mask))
    }

    /// Creates a new QR Code with the given version number, error correction level, data
    /// codeword bytes, and mask number.
    ///
    /// This is a low-level API; most callers want [`QrCode::encode_text`].
    pub fn encode_codewords(
        version: Version,
        ecl: QrCodeEcc,
        datacodewords: &[u8],
        msk: Option<Mask>
    ) -> Self {
        let size = i32::from(version.value()) * 4 + 17;
        let cells = (size * size) as usize;
        let mut result = Self {
            version,
            size,
            ecl,
            mask: Mask::new(0),
            modules: vec![false; cells],
            isfunction: vec![false; cells],
        };

        // Draw modules
        result.draw_function_patterns();
        let allcodewords: Vec<u8> = result.add_ecc_and_interleave(datacodewords);
        result.draw_codewords(&allcodewords);

        // Do masking
        let msk: Mask = match msk {
            Some(m) => m,
            None => {
                let mut best = Mask::new(0);
                let mut minpenalty = i32::MAX;
                for i in 0u8..8 {
                    let candidate = Mask::new(i);
                    result.apply_mask(candidate);
                    result.draw_format_bits(candidate);
                    let penalty: i32 = result.penalty_score();
                    if penalty < minpenalty {
                        best = candidate;
                        minpenalty = penalty;
                    }
                    result.apply_mask(candidate); // Undoes the mask due to XOR
                }
                best
            }
        };
        result.mask = msk;
        result.apply_mask(msk);
        result.draw_format_bits(msk);

        result.isfunction = Vec::new();
        result
    }

    /// Returns this QR Code's version, in the range [1, 10].
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns this QR Code's size, in the range [21, 57].
    pub fn size(&self) -> i32 {
        self.size
    }

    /// Returns this QR Code's error correction level.
    pub fn error_correction_level(&self) -> QrCodeEcc {
        self.ecl
    }

    /// Returns this QR Code's mask, in the range [0, 7].
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Returns the color of the module at the given coordinates.
    ///
    /// Returns `true` for dark modules and `false` for light modules. Coordinates outside the QR
    /// code's bounds return `false`.
    pub fn get_module(&self, x: i32, y: i32) -> bool {
        let range = 0..self.size;
        range.contains(&x) && range.contains(&y) && self.modules[self.index(x, y)]
    }

    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.size + x) as usize
    }

    fn set_function_module(&mut self, x: i32, y: i32, isdark: bool) {
        let index = self.index(x, y);
        self.modules[index] = isdark;
        self.isfunction[index] = true;
    }

    fn draw_function_patterns(&mut self) {
        let size: i32 = self.size;
        for i in 0..size {
            self.set_function_module(6, i, i % 2 == 0);
            self.set_function_module(i, 6, i % 2 == 0);
        }

        self.draw_finder_pattern(3, 3);
        self.draw_finder_pattern(size - 4, 3);
        self.draw_finder_pattern(3, size - 4);

        let alignpatpos: Vec<i32> = self.alignment_pattern_positions();
        let numalign: usize = alignpatpos.len();
        for i in 0..numalign {
            for j in 0..numalign {
                let corner =
                    (i == 0 && j == 0) ||
                    (i == 0 && j == numalign - 1) ||
                    (i == numalign - 1 && j == 0);
                if !corner {
                    self.draw_alignment_pattern(alignpatpos[i], alignpatpos[j]);
                }
            }
        }

        // Reserved now, overwritten once the mask is known
        self.draw_format_bits(Mask::new(0));
        self.draw_version();
    }

    fn draw_finder_pattern(&mut self, x: i32, y: i32) {
        let range = 0..self.size;
        for dy in -4i32..=4 {
            for dx in -4i32..=4 {
                let (xx, yy) = (x + dx, y + dy);
                if range.contains(&xx) && range.contains(&yy) {
                    let dist: i32 = dx.abs().max(dy.abs());
                    self.set_function_module(xx, yy, dist != 2 && dist != 4);
                }
            }
        }
    }

    fn draw_alignment_pattern(&mut self, x: i32, y: i32) {
        for dy in -2i32..=2 {
            for dx in -2i32..=2 {
                self.set_function_module(x + dx, y + dy, dx.abs().max(dy.abs()) != 1);
            }
        }
    }

    fn draw_format_bits(&mut self, mask: Mask) {
        let bits: u32 = {
            let data = u32::from((self.ecl.format_bits() << 3) | mask.value());
            let mut rem: u32 = data;
            for _ in 0..10 {
                rem = (rem << 1) ^ ((rem >> 9) * 0x537);
            }
            ((data << 10) | rem) ^ 0x5412
        };
        debug_assert_eq!(bits >> 15, 0);

        for i in 0..6 {
            self.set_function_module(8, i, get_bit(bits, i));
        }
        self.set_function_module(8, 7, get_bit(bits, 6));
        self.set_function_module(8, 8, get_bit(bits, 7));
        self.set_function_module(7, 8, get_bit(bits, 8));
        for i in 9..15 {
            self.set_function_module(14 - i, 8, get_bit(bits, i));
        }

        let size: i32 = self.size;
        for i in 0..8 {
            self.set_function_module(size - 1 - i, 8, get_bit(bits, i));
        }
        for i in 8..15 {
            self.set_function_module(8, size - 15 + i, get_bit(bits, i));
        }
        self.set_function_module(8, size - 8, true);
    }

    fn draw_version(&mut self) {
        let ver = u32::from(self.version.value());
        if ver < 7 {
            return;
        }
        let bits: u32 = {
            let mut rem: u32 = ver;
            for _ in 0..12 {
                rem = (rem << 1) ^ ((rem >> 11) * 0x1f25);
            }
            (ver << 12) | rem
        };
        for i in 0..18 {
            let bit: bool = get_bit(bits, i);
            let a: i32 = self.size - 11 + (i % 3);
            let b: i32 = i / 3;
            self.set_function_module(a, b, bit);
            self.set_function_module(b, a, bit);
        }
    }

    fn add_ecc_and_interleave(&self, data: &[u8]) -> Vec<u8> {
        let ver = self.version;
        let ecl = self.ecl;
        assert_eq!(data.len(), QrCode::num_data_codewords(ver, ecl), "Illegal argument");

        let numblocks: usize = QrCode::table_get(&NUM_ERROR_CORRECTION_BLOCKS, ver, ecl);
        let blockecclen: usize = QrCode::table_get(&ECC_CODEWORDS_PER_BLOCK, ver, ecl);
        let rawcodewords: usize = QrCode::num_raw_data_modules(ver) / 8;
        let numshortblocks: usize = numblocks - rawcodewords % numblocks;
        let shortblocklen: usize = rawcodewords / numblocks;

        let rs = ReedSolomonGenerator::new(blockecclen);
        let mut blocks: Vec<Vec<u8>> = Vec::with_capacity(numblocks);
        let mut dat: &[u8] = data;
        for i in 0..numblocks {
            let datlen: usize = shortblocklen - blockecclen + usize::from(i >= numshortblocks);
            let mut block: Vec<u8> = dat[..datlen].to_vec();
            let ecc: Vec<u8> = rs.compute_remainder(&block);
            if i < numshortblocks {
                block.push(0);
            }
            block.extend_from_slice(&ecc);
            blocks.push(block);
            dat = &dat[datlen..];
        }
        debug_assert_eq!(dat.len(), 0);

        let mut result: Vec<u8> = Vec::with_capacity(rawcodewords);
        for i in 0..=shortblocklen {
            for (j, block) in blocks.iter().enumerate() {
                // Skip the padding byte in short blocks
                if i != shortblocklen - blockecclen || j >= numshortblocks {
                    result.push(block[i]);
                }
            }
        }
        debug_assert_eq!(result.len(), rawcodewords);
        result
    }

    fn draw_codewords(&mut self, data: &[u8]) {
        assert_eq!(
            data.len(),
            QrCode::num_raw_data_modules(self.version) / 8,
            "Illegal argument"
        );
        let size: i32 = self.size;
        let mut i: usize = 0;
        let mut right: i32 = size - 1;
        while right >= 1 {
            if right == 6 {
                right = 5;
            }
            for vert in 0..size {
                for j in 0..2 {
                    let x: i32 = right - j;
                    let upward: bool = ((right + 1) & 2) == 0;
                    let y: i32 = if upward { size - 1 - vert } else { vert };
                    let index = self.index(x, y);
                    if !self.isfunction[index] && i < data.len() * 8 {
                        self.modules[index] =
                            get_bit(u32::from(data[i >> 3]), 7 - ((i & 7) as i32));
                        i += 1;
                    }
                }
            }
            right -= 2;
        }
        debug_assert_eq!(i, data.len() * 8);
    }

    fn apply_mask(&mut self, mask: Mask) {
        for y in 0..self.size {
            for x in 0..self.size {
                let index = self.index(x, y);
                if self.isfunction[index] {
                    continue;
                }
                let invert: bool = match mask.value() {
                    0 => (x + y) % 2 == 0,
                    1 => y % 2 == 0,
                    2 => x % 3 == 0,
                    3 => (x + y) % 3 == 0,
                    4 => (x / 3 + y / 2) % 2 == 0,
                    5 => ((x * y) % 2) + ((x * y) % 3) == 0,
                    6 => (((x * y) % 2) + ((x * y) % 3)) % 2 == 0,
                    7 => (((x + y) % 2) + ((x * y) % 3)) % 2 == 0,
                    _ => unreachable!(),
                };
                self.modules[index] ^= invert;
            }
        }
    }

    fn penalty_score(&self) -> i32 {
        let mut result: i32 = 0;
        let size: i32 = self.size;

        // Adjacent modules in row having same color, and finder-like patterns
        for y in 0..size {
            let mut runcolor = false;
            let mut runx: i32 = 0;
            let mut runhistory = FinderPenalty::new(size);
            for x in 0..size {
                if self.get_module(x, y) == runcolor {
                    runx += 1;
                    if runx == 5 {
                        result += PENALTY_N1;
                    } else if runx > 5 {
                        result += 1;
                    }
                } else {
                    runhistory.add_history(runx);
                    if !runcolor {
                        result += runhistory.count_patterns() * PENALTY_N3;
                    }
                    runcolor = self.get_module(x, y);
                    runx = 1;
                }
            }
            result += runhistory.terminate_and_count(runcolor, runx) * PENALTY_N3;
        }

        // Same, for columns
        for x in 0..size {
            let mut runcolor = false;
            let mut runy: i32 = 0;
            let mut runhistory = FinderPenalty::new(size);
            for y in 0..size {
                if self.get_module(x, y) == runcolor {
                    runy += 1;
                    if runy == 5 {
                        result += PENALTY_N1;
                    } else if runy > 5 {
                        result += 1;
                    }
                } else {
                    runhistory.add_history(runy);
                    if !runcolor {
                        result += runhistory.count_patterns() * PENALTY_N3;
                    }
                    runcolor = self.get_module(x, y);
                    runy = 1;
                }
            }
            result += runhistory.terminate_and_count(runcolor, runy) * PENALTY_N3;
        }

        // 2*2 blocks of modules having same color
        for y in 0..size - 1 {
            for x in 0..size - 1 {
                let color: bool = self.get_module(x, y);
                if
                    color == self.get_module(x + 1, y) &&
                    color == self.get_module(x, y + 1) &&
                    color == self.get_module(x + 1, y + 1)
                {
                    result += PENALTY_N2;
                }
            }
        }

        // Balance of dark and light modules
        let dark: i32 = self.modules.iter().filter(|&&m| m).count() as i32;
        let total: i32 = size * size;
        let k: i32 = ((dark * 20 - total * 10).abs() + total - 1) / total - 1;
        result += k * PENALTY_N4;
        result
    }

    fn alignment_pattern_positions(&self) -> Vec<i32> {
        let ver = i32::from(self.version.value());
        if ver == 1 {
            return Vec::new();
        }
        let numalign: i32 = ver / 7 + 2;
        let step: i32 = ((ver * 4 + numalign * 2 + 1) / (numalign * 2 - 2)) * 2;
        let mut result: Vec<i32> = (0..numalign - 1).map(|i| self.size - 7 - i * step).collect();
        result.push(6);
        result.reverse();
        result
    }

    fn num_raw_data_modules(ver: Version) -> usize {
        let ver = usize::from(ver.value());
        let mut result: usize = (16 * ver + 128) * ver + 64;
        if ver >= 2 {
            let numalign: usize = ver / 7 + 2;
            result -= (25 * numalign - 10) * numalign - 55;
            if ver >= 7 {
                result -= 36;
            }
        }
        result
    }

    fn num_data_codewords(ver: Version, ecl: QrCodeEcc) -> usize {
        QrCode::num_raw_data_modules(ver) / 8 -
            QrCode::table_get(&ECC_CODEWORDS_PER_BLOCK, ver, ecl) *
                QrCode::table_get(&NUM_ERROR_CORRECTION_BLOCKS, ver, ecl)
    }

    fn table_get(table: &'static [[i8; 11]; 4], ver: Version, ecl: QrCodeEcc) -> usize {
        table[ecl.ordinal()][usize::from(ver.value())] as usize
    }
}

struct ReedSolomonGenerator {
    divisor: Vec<u8>,
}

impl ReedSolomonGenerator {
    fn new(degree: usize) -> Self {
        assert!((1..=30).contains(&degree), "Degree out of range");
        let mut divisor = vec![0u8; degree];
        divisor[degree - 1] = 1;
        let mut root: u8 = 1;
        for _ in 0..degree {
            for j in 0..degree {
                divisor[j] = Self::multiply(divisor[j], root);
                if j + 1 < degree {
                    divisor[j] ^= divisor[j + 1];
                }
            }
            root = Self::multiply(root, 0x02);
        }
        Self { divisor }
    }

    fn compute_remainder(&self, data: &[u8]) -> Vec<u8> {
        let mut result = vec![0u8; self.divisor.len()];
        for b in data {
            let factor: u8 = b ^ result[0];
            result.remove(0);
            result.push(0);
            for (x, &y) in result.iter_mut().zip(self.divisor.iter()) {
                *x ^= Self::multiply(y, factor);
            }
        }
        result
    }

    fn multiply(x: u8, y: u8) -> u8 {
        let mut z: u8 = 0;
        for i in (0..8).rev() {
            z = (z << 1) ^ ((z >> 7) * 0x1d);
            z ^= ((y >> i) & 1) * x;
        }
        z
    }
}

struct FinderPenalty {
    qr_size: i32,
    run_history: [i32; 7],
}

impl FinderPenalty {
    fn new(size: i32) -> Self {
        Self {
            qr_size: size,
            run_history: [0; 7],
        }
    }

    fn add_history(&mut self, mut currentrunlength: i32) {
        if self.run_history[0] == 0 {
            currentrunlength += self.qr_size; // Add light border to initial run
        }
        let len: usize = self.run_history.len();
        self.run_history.copy_within(0..len - 1, 1);
        self.run_history[0] = currentrunlength;
    }

    fn count_patterns(&self) -> i32 {
        let rh = &self.run_history;
        let n = rh[1];
        let core = n > 0 && rh[2] == n && rh[3] == n * 3 && rh[4] == n && rh[5] == n;
        i32::from(core && rh[0] >= n * 4 && rh[6] >= n) +
            i32::from(core && rh[6] >= n * 4 && rh[0] >= n)
    }

    fn terminate_and_count(mut self, currentruncolor: bool, mut currentrunlength: i32) -> i32 {
        if currentruncolor {
            self.add_history(currentrunlength);
            currentrunlength = 0;
        }
        currentrunlength += self.qr_size; // Add light border to final run
        self.add_history(currentrunlength);
        self.count_patterns()
    }
}

const PENALTY_N1: i32 = 3;
const PENALTY_N2: i32 = 3;
const PENALTY_N3: i32 = 40;
const PENALTY_N4: i32 = 10;

// Indexed by version; index 0 is unused.
static ECC_CODEWORDS_PER_BLOCK: [[i8; 11]; 4] = [
    [-1, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18], // Low
    [-1, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26], // Medium
    [-1, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24], // Quartile
    [-1, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28], // High
];

static NUM_ERROR_CORRECTION_BLOCKS: [[i8; 11]; 4] = [
    [-1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4], // Low
    [-1, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5], // Medium
    [-1, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8], // Quartile
    [-1, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8], // High
];

/// Error correction level for a QR code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub enum QrCodeEcc {
    /// Tolerates ~7% erroneous codewords.
    Low,
    /// Tolerates ~15% erroneous codewords.
    Medium,
    /// Tolerates ~25% erroneous codewords.
    Quartile,
    /// Tolerates ~30% erroneous codewords.
    High,
}

impl QrCodeEcc {
    fn ordinal(self) -> usize {
        use QrCodeEcc::*;
        match self {
            Low => 0,
            Medium => 1,
            Quartile => 2,
            High => 3,
        }
    }

    fn format_bits(self) -> u8 {
        use QrCodeEcc::*;
        match self {
            Low => 1,
            Medium => 0,
            Quartile => 3,
            High => 2,
        }
    }
}

/// A segment of data in a QR code.
///
/// Built with [`QrSegment::make_numeric`], [`QrSegment::make_alphanumeric`],
/// [`QrSegment::make_bytes`], or [`QrSegment::make_segment`] which picks the mode itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrSegment {
    mode: QrSegmentMode,
    numchars: usize,
    data: Vec<bool>,
}

impl QrSegment {
    /// Creates a segment for binary data in byte mode.
    pub fn make_bytes(data: &[u8]) -> Self {
        let mut bb = BitBuffer(Vec::with_capacity(data.len() * 8));
        for &b in data {
            bb.append_bits(u32::from(b), 8);
        }
        QrSegment::new(QrSegmentMode::Byte, data.len(), bb.0)
    }

    /// Creates a segment for a string of decimal digits in numeric mode.
    ///
    /// # Panics
    ///
    /// Panics if `text` contains non-digit characters.
    pub fn make_numeric(text: &str) -> Self {
        let mut bb = BitBuffer(Vec::with_capacity(text.len() * 3 + (text.len() + 2) / 3));
        let mut accumdata: u32 = 0;
        let mut accumcount: u8 = 0;
        for b in text.bytes() {
            assert!(b.is_ascii_digit(), "String contains non-numeric characters");
            accumdata = accumdata * 10 + u32::from(b - b'0');
            accumcount += 1;
            if accumcount == 3 {
                bb.append_bits(accumdata, 10);
                accumdata = 0;
                accumcount = 0;
            }
        }
        if accumcount > 0 {
            bb.append_bits(accumdata, accumcount * 3 + 1);
        }
        QrSegment::new(QrSegmentMode::Numeric, text.len(), bb.0)
    }

    /// Creates a segment for alphanumeric text.
    ///
    /// Allowed characters: 0–9, A–Z (uppercase), space, `$`, `%`, `*`, `+`, `-`, `.`, `/`, `:`.
    ///
    /// # Panics
    ///
    /// Panics if `text` contains invalid characters.
    pub fn make_alphanumeric(text: &str) -> Self {
        let mut bb = BitBuffer(Vec::with_capacity(text.len() * 5 + (text.len() + 1) / 2));
        let mut accumdata: u32 = 0;
        let mut accumcount: u32 = 0;
        for c in text.chars() {
            let i: usize = ALPHANUMERIC_CHARSET.find(c).expect(
                "String contains unencodable characters in alphanumeric mode"
            );
            accumdata = accumdata * 45 + i as u32;
            accumcount += 1;
            if accumcount == 2 {
                bb.append_bits(accumdata, 11);
                accumdata = 0;
                accumcount = 0;
            }
        }
        if accumcount > 0 {
            bb.append_bits(accumdata, 6);
        }
        QrSegment::new(QrSegmentMode::Alphanumeric, text.len(), bb.0)
    }

    /// Creates a segment in the most compact mode able to hold `text`.
    pub fn make_segment(text: &str) -> Self {
        if QrSegment::is_numeric(text) {
            QrSegment::make_numeric(text)
        } else if QrSegment::is_alphanumeric(text) {
            QrSegment::make_alphanumeric(text)
        } else {
            QrSegment::make_bytes(text.as_bytes())
        }
    }

    pub fn new(mode: QrSegmentMode, numchars: usize, data: Vec<bool>) -> Self {
        Self { mode, numchars, data }
    }

    pub fn mode(&self) -> QrSegmentMode {
        self.mode
    }

    pub fn num_chars(&self) -> usize {
        self.numchars
    }

    fn total_bits(segs: &[Self], version: Version) -> Option<usize> {
        let mut result: usize = 0;
        for seg in segs {
            let ccbits: u8 = seg.mode.num_char_count_bits(version);
            if seg.numchars >= 1usize << ccbits {
                return None;
            }
            result = result.checked_add(4 + usize::from(ccbits))?;
            result = result.checked_add(seg.data.len())?;
        }
        Some(result)
    }

    pub fn is_numeric(text: &str) -> bool {
        text.chars().all(|c| c.is_ascii_digit())
    }

    pub fn is_alphanumeric(text: &str) -> bool {
        text.chars().all(|c| ALPHANUMERIC_CHARSET.contains(c))
    }
}

static ALPHANUMERIC_CHARSET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QrSegmentMode {
    Numeric,
    Alphanumeric,
    Byte,
}

impl QrSegmentMode {
    fn mode_bits(self) -> u32 {
        use QrSegmentMode::*;
        match self {
            Numeric => 0x1,
            Alphanumeric => 0x2,
            Byte => 0x4,
        }
    }

    fn num_char_count_bits(self, ver: Version) -> u8 {
        use QrSegmentMode::*;
        (match self {
            Numeric => [10, 12, 14],
            Alphanumeric => [9, 11, 13],
            Byte => [8, 16, 16],
        })[usize::from((ver.value() + 7) / 17)]
    }
}

struct BitBuffer(Vec<bool>);

impl BitBuffer {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn append_bits(&mut self, val: u32, len: u8) {
        assert!(len <= 31 && (val >> len) == 0, "Value out of range");
        self.0.extend((0..len).rev().map(|i| get_bit(val, i32::from(i))));
    }
}

/// Error type for when data exceeds QR code capacity.
///
/// Ways to handle this error include lowering the error correction level, raising the maximum
/// version, or shortening the text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataTooLong {
    /// A segment is too long for the chosen mode.
    #[error("Segment too long")]
    SegmentTooLong,
    /// Data length exceeds capacity.
    #[error("Data length = {0} bits, Max capacity = {1} bits")]
    DataOverCapacity(usize, usize),
}

/// A QR code version (1–10).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Version(u8);

impl Version {
    /// The smallest supported version.
    pub const MIN: Version = Version(1);

    /// The largest supported version.
    pub const MAX: Version = Version(10);

    /// Creates a version object from the given number.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range [1, 10].
    pub const fn new(ver: u8) -> Self {
        assert!(
            Version::MIN.value() <= ver && ver <= Version::MAX.value(),
            "Version number out of range"
        );
        Self(ver)
    }

    /// Like [`Version::new`], but returns `None` instead of panicking.
    pub const fn try_new(ver: u8) -> Option<Self> {
        if Version::MIN.value() <= ver && ver <= Version::MAX.value() {
            Some(Self(ver))
        } else {
            None
        }
    }

    /// Returns the value, which is in the range [1, 10].
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns the side length in modules of a symbol of this version.
    pub const fn side_len(self) -> usize {
        (self.0 as usize) * 4 + 17
    }
}

/// A mask pattern (0–7).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Mask(u8);

impl Mask {
    /// Creates a mask object from the given number.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range [0, 7].
    pub const fn new(mask: u8) -> Self {
        assert!(mask <= 7, "Mask value out of range");
        Self(mask)
    }

    /// Returns the value, which is in the range [0, 7].
    pub const fn value(self) -> u8 {
        self.0
    }
}

fn get_bit(x: u32, i: i32) -> bool {
    ((x >> i) & 1) != 0
}
