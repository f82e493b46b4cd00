//! Bit-slice metadata shared by the validator, the table generator, and the reference decoder.
//!
//! Offsets are LSB-zero: a slice at offset 0 with width 6 covers the six least significant
//! bits of its word.

use std::fmt;

const MAX_WORD_BITS: u32 = 64;

pub fn mask_for_width(width: u32) -> u64 {
    if width == 0 {
        0
    } else if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Returns true when `value` is representable in `width` unsigned bits.
pub fn fits_in(value: u64, width: u32) -> bool {
    width >= 64 || value >> width == 0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitSlice {
    pub offset: u32,
    pub width: u32,
    pub mask: u64,
}

impl BitSlice {
    pub fn new(offset: u32, width: u32) -> Result<Self, BitFieldError> {
        if width == 0 {
            return Err(BitFieldError::ZeroWidthSlice);
        }
        if width > MAX_WORD_BITS {
            return Err(BitFieldError::SliceTooWide { width });
        }
        if offset >= MAX_WORD_BITS || offset + width > MAX_WORD_BITS {
            return Err(BitFieldError::SliceOutOfRange { offset, width });
        }
        Ok(Self {
            offset,
            width,
            mask: mask_for_width(width) << offset,
        })
    }

    /// Exclusive upper bit.
    pub fn end(&self) -> u32 {
        self.offset + self.width
    }

    pub fn fits_within(&self, word_bits: u32) -> bool {
        self.end() <= word_bits
    }

    pub fn overlaps(&self, other: &BitSlice) -> bool {
        self.mask & other.mask != 0
    }

    pub fn read(&self, word: u64) -> u64 {
        (word & self.mask) >> self.offset
    }

    /// Writes `value` into the slice, leaving the rest of `word` untouched.
    pub fn write(&self, word: u64, value: u64) -> Result<u64, BitFieldError> {
        if !fits_in(value, self.width) {
            return Err(BitFieldError::ValueTooWide {
                value,
                width: self.width,
            });
        }
        Ok((word & !self.mask) | ((value << self.offset) & self.mask))
    }
}

/// Sign-extends the low `width` bits of `value` to 64 bits.
pub fn sign_extend(value: u64, width: u32) -> i64 {
    if width == 0 || width >= 64 {
        return value as i64;
    }
    let shift = 64 - width;
    ((value << shift) as i64) >> shift
}

/// Parses an inclusive `lo-hi` bit range (either order, or a single bit) into
/// `(offset, width)`.
pub fn parse_bit_range(spec: &str) -> Result<(u32, u32), BitFieldError> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(BitFieldError::EmptySpec);
    }
    let (start, end) = match trimmed.split_once(['-', ':']) {
        Some((start, end)) => (parse_bit_number(start)?, parse_bit_number(end)?),
        None => {
            let bit = parse_bit_number(trimmed)?;
            (bit, bit)
        }
    };
    let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
    Ok((lo, hi - lo + 1))
}

/// Bit numbers must lie inside the widest word.

fn parse_bit_number(token: &str) -> Result<u32, BitFieldError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(BitFieldError::InvalidNumber(token.to_string()));
    }
    let bit = token
        .parse::<u32>()
        .map_err(|_| BitFieldError::InvalidNumber(token.to_string()))?;
    if bit >= MAX_WORD_BITS {
        return Err(BitFieldError::BitOutOfRange(bit));
    }
    Ok(bit)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitFieldError {
    EmptySpec,
    InvalidNumber(String),
    BitOutOfRange(u32),
    ZeroWidthSlice,
    SliceTooWide { width: u32 },
    SliceOutOfRange { offset: u32, width: u32 },
    ValueTooWide { value: u64, width: u32 },
}

impl fmt::Display for BitFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitFieldError::EmptySpec => write!(f, "bit range is empty"),
            BitFieldError::InvalidNumber(tok) => write!(f, "invalid bit number '{tok}'"),
            BitFieldError::BitOutOfRange(bit) => {
                write!(f, "bit {bit} is outside a {MAX_WORD_BITS}-bit word")
            }
            BitFieldError::ZeroWidthSlice => write!(f, "slice width must be non-zero"),
            BitFieldError::SliceTooWide { width } => write!(f, "slice width {width} exceeds limit"),
            BitFieldError::SliceOutOfRange { offset, width } => {
                write!(f, "slice at offset {offset} width {width} exceeds 64-bit container")
            }
            BitFieldError::ValueTooWide { value, width } => {
                write!(f, "value {value:#x} does not fit within {width} bits")
            }
        }
    }
}

impl std::error::Error for BitFieldError {}
