//! This module is used to define the registers on the AD5410 / AD5420 and how
//! their contents are packed into 3-byte bus frames.
//!
//! Every transfer to the device is exactly three bytes: an address (or command)
//! byte followed by a 16-bit big-endian data word.

use modular_bitfield::prelude::*;
use strum_macros::{EnumCount, EnumIter};

/// One complete bus transfer: address/command byte then two data bytes.
pub type Frame = [u8; 3];

/// Command byte that requests a register readback.
pub const READ_COMMAND: u8 = 0x02;
/// Address byte used to write the data (output code) register.
pub const DATA_WRITE_ADDRESS: u8 = 0x01;
/// Address byte used to write the control register.
pub const CONTROL_WRITE_ADDRESS: u8 = 0x55;
/// Address byte used to issue a software reset.
pub const RESET_ADDRESS: u8 = 0x56;
/// Frame which returns the device to its power-on state.
pub const RESET_FRAME: Frame = [RESET_ADDRESS, 0x00, 0x01];

/// Registers which can be selected for readback.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    /// __R__ - Status register.
    ///
    /// See [`Status`] for the flag layout.
    Status = 0x00,
    /// __R/W__ - Data register, the code currently driving the output.
    Data = 0x01,
    /// __R/W__ - Control register.
    ///
    /// See [`Control`] for the field layout.
    Control = 0x02,
}

impl From<Register> for u8 {
    fn from(value: Register) -> Self {
        value as u8
    }
}

impl Register {
    /// The frame which asks the device to load this register into its
    /// shift register. The contents are clocked out by the next transfer.
    pub const fn read_request(self) -> Frame {
        [READ_COMMAND, 0x00, self as u8]
    }
}

/// Build the frame that writes `code` to the data register.
pub const fn data_frame(code: u16) -> Frame {
    let [hi, lo] = code.to_be_bytes();
    [DATA_WRITE_ADDRESS, hi, lo]
}

/// Extract the 16-bit data word from a readback frame.
pub const fn data_word(frame: &Frame) -> u16 {
    u16::from_be_bytes([frame[1], frame[2]])
}

/// Extract the raw status byte from a status readback frame.
///
/// The flags are taken from the first byte of the echo.
pub const fn status_byte(frame: &Frame) -> u8 {
    frame[0]
}

/// Output current range, bits 0-2 of the control register.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter, EnumCount)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OutputRange {
    /// 4 mA to 20 mA.
    Ma4To20 = 0x05,
    /// 0 mA to 20 mA.
    Ma0To20 = 0x06,
    /// 0 mA to 24 mA. This is also what any unrecognised code decodes to.
    Ma0To24 = 0x07,
}

impl OutputRange {
    /// Decode a 3-bit range code.
    ///
    /// Codes the device does not define fall back to the widest range rather
    /// than failing.
    pub const fn from_code(code: u8) -> Self {
        match code & 0x07 {
            0x05 => Self::Ma4To20,
            0x06 => Self::Ma0To20,
            _ => Self::Ma0To24,
        }
    }

    /// The 3-bit code written to the control register.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Lower and upper bound of the range in milliamps.
    pub const fn bounds_ma(self) -> (f32, f32) {
        match self {
            Self::Ma4To20 => (4.0, 20.0),
            Self::Ma0To20 => (0.0, 20.0),
            Self::Ma0To24 => (0.0, 24.0),
        }
    }
}

impl From<u8> for OutputRange {
    fn from(value: u8) -> Self {
        Self::from_code(value)
    }
}

/// Slew rate update clock, bits 8-11 of the control register.
///
/// Each variant is named after its nominal update frequency in hertz.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter, EnumCount)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SlewClock {
    Hz257730 = 0x00,
    Hz198410 = 0x01,
    Hz152440 = 0x02,
    Hz131580 = 0x03,
    Hz115740 = 0x04,
    Hz69440 = 0x05,
    Hz37590 = 0x06,
    Hz25770 = 0x07,
    Hz20160 = 0x08,
    Hz16030 = 0x09,
    Hz10290 = 0x0A,
    Hz8280 = 0x0B,
    Hz6900 = 0x0C,
    Hz5530 = 0x0D,
    Hz4240 = 0x0E,
    Hz3300 = 0x0F,
}

impl SlewClock {
    /// Decode a 4-bit clock code. All sixteen codes are defined.
    pub const fn from_code(code: u8) -> Self {
        use SlewClock as SC;
        match code & 0x0F {
            0x00 => SC::Hz257730,
            0x01 => SC::Hz198410,
            0x02 => SC::Hz152440,
            0x03 => SC::Hz131580,
            0x04 => SC::Hz115740,
            0x05 => SC::Hz69440,
            0x06 => SC::Hz37590,
            0x07 => SC::Hz25770,
            0x08 => SC::Hz20160,
            0x09 => SC::Hz16030,
            0x0A => SC::Hz10290,
            0x0B => SC::Hz8280,
            0x0C => SC::Hz6900,
            0x0D => SC::Hz5530,
            0x0E => SC::Hz4240,
            _ => SC::Hz3300,
        }
    }

    /// The 4-bit code written to the control register.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Nominal update frequency in hertz.
    pub const fn update_rate_hz(self) -> u32 {
        use SlewClock as SC;
        match self {
            SC::Hz257730 => 257_730,
            SC::Hz198410 => 198_410,
            SC::Hz152440 => 152_440,
            SC::Hz131580 => 131_580,
            SC::Hz115740 => 115_740,
            SC::Hz69440 => 69_440,
            SC::Hz37590 => 37_590,
            SC::Hz25770 => 25_770,
            SC::Hz20160 => 20_160,
            SC::Hz16030 => 16_030,
            SC::Hz10290 => 10_290,
            SC::Hz8280 => 8_280,
            SC::Hz6900 => 6_900,
            SC::Hz5530 => 5_530,
            SC::Hz4240 => 4_240,
            SC::Hz3300 => 3_300,
        }
    }
}

/// Slew rate step size in LSBs per update, bits 5-7 of the control register.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter, EnumCount)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SlewStep {
    Lsb1 = 0,
    Lsb2 = 1,
    Lsb4 = 2,
    Lsb8 = 3,
    Lsb16 = 4,
    Lsb32 = 5,
    Lsb64 = 6,
    Lsb128 = 7,
}

impl SlewStep {
    /// Decode a 3-bit step code.
    pub const fn from_code(code: u8) -> Self {
        use SlewStep as SS;
        match code & 0x07 {
            0 => SS::Lsb1,
            1 => SS::Lsb2,
            2 => SS::Lsb4,
            3 => SS::Lsb8,
            4 => SS::Lsb16,
            5 => SS::Lsb32,
            6 => SS::Lsb64,
            _ => SS::Lsb128,
        }
    }

    /// The 3-bit code, unshifted.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// The code as it sits in the low control byte (bits 5-7).
    pub const fn preshifted(self) -> u8 {
        (self as u8) << 5
    }

    /// Number of LSBs the output moves per slew clock tick.
    pub const fn lsbs(self) -> u8 {
        1 << (self as u8)
    }
}

/// Control register data word.
///
/// Fields, lowest bit first:
///
/// | Name   | Bits  | Description                              |
/// |--------|-------|------------------------------------------|
/// | range  | 0-2   | Output range, see [`OutputRange`]        |
/// | dcen   | 3     | Daisy-chain enable                       |
/// | sren   | 4     | Slew rate enable                         |
/// | srstep | 5-7   | Slew step size, see [`SlewStep`]         |
/// | srclk  | 8-11  | Slew update clock, see [`SlewClock`]     |
/// | outen  | 12    | Output enable                            |
/// | rext   | 13    | External current setting resistor enable |
///
/// Bits 14-15 are not driver-owned. They are carried through unchanged from
/// whatever was read back.
#[bitfield]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Control {
    /// Output range code.
    pub range: B3,
    /// Daisy-chain enable.
    pub dcen: bool,
    /// Slew rate enable.
    pub sren: bool,
    /// Slew step size code.
    pub srstep: B3,
    /// Slew update clock code.
    pub srclk: B4,
    /// Output enable.
    pub outen: bool,
    /// External current setting resistor enable.
    pub rext: bool,
    #[skip]
    __: B2,
}

impl Control {
    /// Bits owned by the output range field.
    pub const RANGE_BITS: u16 = 0x0007;
    /// Bits owned by the daisy-chain flag.
    pub const DAISY_CHAIN_BITS: u16 = 0x0008;
    /// Bits owned by the slew enable flag.
    pub const SLEW_ENABLE_BITS: u16 = 0x0010;
    /// Bits owned by the slew step field.
    pub const SLEW_STEP_BITS: u16 = 0x00E0;
    /// Bits owned by the slew clock field.
    pub const SLEW_CLOCK_BITS: u16 = 0x0F00;
    /// Bits owned by the output enable flag.
    pub const OUTPUT_ENABLE_BITS: u16 = 0x1000;
    /// Bits owned by the external resistor flag.
    pub const EXT_RESISTOR_BITS: u16 = 0x2000;

    /// Parse the data bytes of a control readback frame. The address byte is
    /// ignored.
    pub fn from_frame(frame: &Frame) -> Self {
        Self::from_bytes([frame[2], frame[1]])
    }

    /// Build the frame writing this word to the control register.
    pub fn to_frame(self) -> Frame {
        let [lo, hi] = self.into_bytes();
        [CONTROL_WRITE_ADDRESS, hi, lo]
    }

    /// Build a control word from its 16-bit value (frame byte 1 in the high
    /// half, frame byte 2 in the low half).
    pub fn from_word(word: u16) -> Self {
        Self::from_bytes(word.to_le_bytes())
    }

    /// The 16-bit value of this control word.
    pub fn word(self) -> u16 {
        u16::from_le_bytes(self.into_bytes())
    }

    /// The decoded output range.
    pub fn output_range(&self) -> OutputRange {
        OutputRange::from_code(self.range())
    }

    /// The decoded slew step size.
    pub fn slew_step(&self) -> SlewStep {
        SlewStep::from_code(self.srstep())
    }

    /// The decoded slew update clock.
    pub fn slew_clock(&self) -> SlewClock {
        SlewClock::from_code(self.srclk())
    }
}

/// Status register flags.
///
/// The driver only delivers these; it never interprets them as errors.
#[bitfield]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status {
    /// Die over-temperature fault.
    pub overheat: bool,
    /// The output is currently slewing towards a new code.
    pub slew_active: bool,
    /// Output current fault, e.g. an open loop on IOUT.
    pub iout_fault: bool,
    #[skip]
    __: B5,
}

impl Status {
    /// Raw mask of [`Status::iout_fault`].
    pub const IOUT_FAULT: u8 = 0x04;
    /// Raw mask of [`Status::slew_active`].
    pub const SLEW_ACTIVE: u8 = 0x02;
    /// Raw mask of [`Status::overheat`].
    pub const OVERHEAT: u8 = 0x01;

    /// The raw status byte.
    pub fn bits(self) -> u8 {
        self.into_bytes()[0]
    }

    /// True when either fault flag is set.
    pub fn has_fault(&self) -> bool {
        self.overheat() || self.iout_fault()
    }
}

impl From<u8> for Status {
    fn from(value: u8) -> Self {
        Self::from_bytes([value])
    }
}
