//! Driver configuration and sparse control register updates.

use fugit::MicrosDurationU32;

use crate::{
    register::{Control, OutputRange, SlewClock, SlewStep},
    scaling::{Resolution, Variant},
};

/// Shortest latch pulse the device accepts.
pub const MIN_LATCH_PULSE: MicrosDurationU32 = MicrosDurationU32::from_ticks(10);
/// Shortest clear pulse the device accepts.
pub const MIN_CLEAR_PULSE: MicrosDurationU32 = MicrosDurationU32::from_ticks(1);

/// Construction-time settings of a driver instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    resolution: Resolution,
    latch_pulse: MicrosDurationU32,
    clear_pulse: MicrosDurationU32,
}

/// Defaults to the 12-bit part with the minimum pulse widths.
impl Default for Config {
    fn default() -> Self {
        Self {
            resolution: Resolution::Bits12,
            latch_pulse: MIN_LATCH_PULSE,
            clear_pulse: MIN_CLEAR_PULSE,
        }
    }
}

impl Config {
    /// Settings for the given part with the minimum pulse widths.
    pub fn new(resolution: impl Into<Resolution>) -> Self {
        Self {
            resolution: resolution.into(),
            ..Default::default()
        }
    }

    /// Settings for a member of the device family.
    pub fn for_variant(variant: Variant) -> Self {
        Self::new(variant)
    }

    /// Hold the latch line high for `pulse`. Widths below the device minimum
    /// are raised to it.
    pub fn with_latch_pulse(mut self, pulse: MicrosDurationU32) -> Self {
        self.latch_pulse = pulse.max(MIN_LATCH_PULSE);
        self
    }

    /// Hold the clear line high for `pulse`. Widths below the device minimum
    /// are raised to it.
    pub fn with_clear_pulse(mut self, pulse: MicrosDurationU32) -> Self {
        self.clear_pulse = pulse.max(MIN_CLEAR_PULSE);
        self
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn latch_pulse(&self) -> MicrosDurationU32 {
        self.latch_pulse
    }

    pub fn clear_pulse(&self) -> MicrosDurationU32 {
        self.clear_pulse
    }
}

/// A sparse update of the control register.
///
/// Each field is only applied when it is `Some`; the corresponding bits of
/// the live register are left alone otherwise.
///
/// # Examples
/// ```
/// use ad54x0::{ControlConfig, OutputRange};
///
/// let update = ControlConfig::new()
///     .with_output_range(OutputRange::Ma4To20)
///     .with_output_enabled(true);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlConfig {
    /// Output range.
    pub output_range: Option<OutputRange>,
    /// Daisy-chain mode.
    pub daisy_chain: Option<bool>,
    /// Slew rate control.
    pub slew_rate_enabled: Option<bool>,
    /// Slew step size.
    pub slew_step: Option<SlewStep>,
    /// Slew update clock.
    pub slew_clock: Option<SlewClock>,
    /// Output stage enable.
    pub output_enabled: Option<bool>,
    /// External current setting resistor.
    pub external_resistor: Option<bool>,
}

impl ControlConfig {
    /// An update which changes nothing.
    pub const fn new() -> Self {
        Self {
            output_range: None,
            daisy_chain: None,
            slew_rate_enabled: None,
            slew_step: None,
            slew_clock: None,
            output_enabled: None,
            external_resistor: None,
        }
    }

    /// Set output range.
    pub fn with_output_range(mut self, range: OutputRange) -> Self {
        self.output_range = Some(range);
        self
    }

    /// Set daisy-chain mode.
    pub fn with_daisy_chain(mut self, enabled: bool) -> Self {
        self.daisy_chain = Some(enabled);
        self
    }

    /// Set slew rate control on or off.
    pub fn with_slew_rate(mut self, enabled: bool) -> Self {
        self.slew_rate_enabled = Some(enabled);
        self
    }

    /// Set slew step size.
    pub fn with_slew_step(mut self, step: SlewStep) -> Self {
        self.slew_step = Some(step);
        self
    }

    /// Set slew update clock.
    pub fn with_slew_clock(mut self, clock: SlewClock) -> Self {
        self.slew_clock = Some(clock);
        self
    }

    /// Set output state.
    pub fn with_output_enabled(mut self, enabled: bool) -> Self {
        self.output_enabled = Some(enabled);
        self
    }

    /// Select the external current setting resistor.
    pub fn with_external_resistor(mut self, enabled: bool) -> Self {
        self.external_resistor = Some(enabled);
        self
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::new()
    }

    /// Union of the control register bits this update may change.
    pub fn touched_bits(&self) -> u16 {
        let mut bits = 0;
        if self.output_range.is_some() {
            bits |= Control::RANGE_BITS;
        }
        if self.daisy_chain.is_some() {
            bits |= Control::DAISY_CHAIN_BITS;
        }
        if self.slew_rate_enabled.is_some() {
            bits |= Control::SLEW_ENABLE_BITS;
        }
        if self.slew_step.is_some() {
            bits |= Control::SLEW_STEP_BITS;
        }
        if self.slew_clock.is_some() {
            bits |= Control::SLEW_CLOCK_BITS;
        }
        if self.output_enabled.is_some() {
            bits |= Control::OUTPUT_ENABLE_BITS;
        }
        if self.external_resistor.is_some() {
            bits |= Control::EXT_RESISTOR_BITS;
        }
        bits
    }

    /// Apply the present fields to a control word, one field at a time.
    pub fn apply(&self, mut control: Control) -> Control {
        if let Some(range) = self.output_range {
            control.set_range(range.code());
        }
        if let Some(enabled) = self.daisy_chain {
            control.set_dcen(enabled);
        }
        if let Some(enabled) = self.slew_rate_enabled {
            control.set_sren(enabled);
        }
        if let Some(step) = self.slew_step {
            control.set_srstep(step.code());
        }
        if let Some(clock) = self.slew_clock {
            control.set_srclk(clock.code());
        }
        if let Some(enabled) = self.output_enabled {
            control.set_outen(enabled);
        }
        if let Some(enabled) = self.external_resistor {
            control.set_rext(enabled);
        }
        control
    }
}
