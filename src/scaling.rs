//! Scaling between milliamps and raw DAC codes.
//!
//! The two parts of the family only differ in resolution. Codes always travel
//! over the bus as 16-bit left-aligned words, so a 12-bit code is shifted up by
//! four bits before it is sent.

use crate::register::OutputRange;

/// Code width of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// 12-bit codes (AD5410).
    Bits12,
    /// 16-bit codes (AD5420).
    Bits16,
}

impl Resolution {
    /// Number of significant code bits.
    pub const fn bits(self) -> u8 {
        match self {
            Self::Bits12 => 12,
            Self::Bits16 => 16,
        }
    }

    /// How far codes are shifted left to fill the 16-bit transfer width.
    pub const fn shift(self) -> u8 {
        16 - self.bits()
    }

    /// Largest code, before alignment.
    pub const fn full_scale(self) -> u16 {
        match self {
            Self::Bits12 => 0x0FFF,
            Self::Bits16 => 0xFFFF,
        }
    }

    /// Number of distinct steps the range is divided into (`2^bits`).
    pub const fn steps(self) -> u32 {
        1 << self.bits()
    }
}

/// The members of the device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    /// 12-bit part.
    Ad5410,
    /// 16-bit part.
    Ad5420,
}

impl Variant {
    /// Resolution of this part.
    pub const fn resolution(self) -> Resolution {
        match self {
            Self::Ad5410 => Resolution::Bits12,
            Self::Ad5420 => Resolution::Bits16,
        }
    }
}

impl From<Variant> for Resolution {
    fn from(value: Variant) -> Self {
        value.resolution()
    }
}

/// Conversion between milliamps and aligned 16-bit codes for one range and
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Scaling {
    range: OutputRange,
    resolution: Resolution,
}

impl Scaling {
    /// Create a new `Scaling` for the given range and resolution.
    pub const fn new(range: OutputRange, resolution: Resolution) -> Self {
        Self { range, resolution }
    }

    /// The range this scaling maps onto.
    pub const fn range(&self) -> OutputRange {
        self.range
    }

    /// The resolution this scaling produces codes for.
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Size of one code step in milliamps.
    pub fn lsb_ma(&self) -> f32 {
        let (min, max) = self.range.bounds_ma();
        (max - min) / self.resolution.steps() as f32
    }

    /// Convert milliamps to an aligned 16-bit code.
    ///
    /// `code = round((ma - min) * (2^bits / (max - min)))`, ties to even,
    /// saturated to `0..=full_scale` and then shifted into the 16-bit
    /// transfer width. Values outside the range (and NaN) saturate rather
    /// than error.
    ///
    /// The 12-bit part tops out at `0xFFF0` rather than `0xFFFF`, so its low
    /// nibble is always clear. The device ignores those bits, so the output
    /// current is the same.
    pub fn ma_to_code(&self, ma: f32) -> u16 {
        let (min, max) = self.range.bounds_ma();
        let per_ma = f64::from(self.resolution.steps()) / f64::from(max - min);
        let scaled = (f64::from(ma) - f64::from(min)) * per_ma;

        let code = round_half_even(scaled).clamp(0, i64::from(self.resolution.full_scale()));
        (code as u16) << self.resolution.shift()
    }

    /// Convert an aligned 16-bit code back to milliamps.
    pub fn code_to_ma(&self, code: u16) -> f32 {
        let (min, _) = self.range.bounds_ma();
        let raw = code >> self.resolution.shift();
        min + raw as f32 * self.lsb_ma()
    }
}

/// Round to the nearest integer, ties to even. Float to int `as` casts
/// saturate and map NaN to zero.
fn round_half_even(value: f64) -> i64 {
    let truncated = value as i64;
    let floor = if truncated as f64 > value {
        truncated.saturating_sub(1)
    } else {
        truncated
    };

    let fraction = value - floor as f64;
    if fraction > 0.5 || (fraction == 0.5 && floor % 2 != 0) {
        floor.saturating_add(1)
    } else {
        floor
    }
}
