use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::{MODE_0, Mode, SpiBus},
};

use crate::{
    config::{Config, ControlConfig},
    error::{Error, Result},
    fault::{FaultHandler, FaultRelay, Subscription},
    register::{
        CONTROL_WRITE_ADDRESS, Control, Frame, OutputRange, RESET_FRAME, Register, Status,
        data_frame, data_word, status_byte,
    },
    scaling::{Resolution, Scaling},
};

/// The bus mode the device expects: clock idle low, data sampled on the
/// leading edge, 8-bit words.
pub const SPI_MODE: Mode = MODE_0;

/// Shadow value before anything has been read: the power-on control word.
const POWER_ON_CONTROL: Frame = [CONTROL_WRITE_ADDRESS, 0x00, 0x00];

/// You can create an `Ad54x0` from any bus implementing [`SpiBus`], two
/// output lines (LATCH and CLEAR), the FAULT input and a delay provider.
///
/// The bus must already be configured for [`SPI_MODE`]. The FAULT input
/// should be pulled high; the device pulls it low while a fault is present.
///
/// Every method that touches the bus performs a complete transaction: frame
/// out, then a latch pulse which commits it. Reads are two transfers each
/// followed by a latch pulse. Bus and line errors are returned as-is and the
/// transaction is abandoned at that point.
///
/// LATCH, CLEAR and FAULT must share one error type, which is carried by
/// [`Error::Pin`]. A line from a different HAL or a GPIO expander needs a
/// newtype whose `ErrorType` maps its error into that shared type.
pub struct Ad54x0<'h, SPI, LATCH, CLEAR, FAULT, DELAY> {
    spi: SPI,
    latch: LATCH,
    clear: CLEAR,
    fault: FAULT,
    delay: DELAY,
    config: Config,
    /// Last control frame read from or written to the device.
    control: Frame,
    relay: FaultRelay<'h>,
}

impl<'h, SPI, LATCH, CLEAR, FAULT, DELAY, P> Ad54x0<'h, SPI, LATCH, CLEAR, FAULT, DELAY>
where
    SPI: SpiBus<u8>,
    LATCH: OutputPin<Error = P>,
    CLEAR: OutputPin<Error = P>,
    FAULT: InputPin<Error = P>,
    DELAY: DelayNs,
{
    /// Bind the driver to its bus and lines. LATCH and CLEAR are driven low.
    ///
    /// Nothing is sent over the bus; the device keeps whatever configuration
    /// it currently has.
    pub fn new(
        spi: SPI,
        mut latch: LATCH,
        mut clear: CLEAR,
        fault: FAULT,
        delay: DELAY,
        config: Config,
    ) -> Result<Self, SPI::Error, P> {
        latch.set_low().map_err(Error::Pin)?;
        clear.set_low().map_err(Error::Pin)?;

        Ok(Self {
            spi,
            latch,
            clear,
            fault,
            delay,
            config,
            control: POWER_ON_CONTROL,
            relay: FaultRelay::new(),
        })
    }

    /// Resolution this driver was created for.
    pub fn resolution(&self) -> Resolution {
        self.config.resolution()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The control word as last read from or written to the device. No bus
    /// traffic.
    pub fn last_control(&self) -> Control {
        Control::from_frame(&self.control)
    }

    /// Apply a sparse update to the control register.
    ///
    /// The live register is read back first; only the fields present in
    /// `update` are changed, every other bit is written back as read.
    pub fn configure(&mut self, update: ControlConfig) -> Result<(), SPI::Error, P> {
        let current = self.read_control()?;
        let frame = update.apply(current).to_frame();

        #[cfg(feature = "defmt")]
        defmt::debug!("AD54x0 control {=u16:#x} -> {=u16:#x}", current.word(), data_word(&frame));

        self.write_frame(&frame)?;
        self.control = frame;
        Ok(())
    }

    /// Read back the control register.
    pub fn read_control(&mut self) -> Result<Control, SPI::Error, P> {
        let frame = self.read_register(Register::Control)?;
        self.control = [CONTROL_WRITE_ADDRESS, frame[1], frame[2]];
        Ok(Control::from_frame(&frame))
    }

    /// Read back the output range currently configured in the device.
    pub fn read_output_range(&mut self) -> Result<OutputRange, SPI::Error, P> {
        Ok(self.read_control()?.output_range())
    }

    /// Write a raw, left-aligned 16-bit code to the data register.
    ///
    /// For the 12-bit part the low four bits are ignored by the device.
    pub fn write_raw_code(&mut self, code: u16) -> Result<(), SPI::Error, P> {
        self.write_frame(&data_frame(code))
    }

    /// Drive the output to `ma` milliamps.
    ///
    /// The output range is read back from the device first, so a range change
    /// made by any other means is honoured. Values outside the range saturate
    /// at its ends. Returns the code that was written.
    pub fn write_current_ma(&mut self, ma: f32) -> Result<u16, SPI::Error, P> {
        let range = self.read_output_range()?;
        let code = Scaling::new(range, self.resolution()).ma_to_code(ma);

        #[cfg(feature = "defmt")]
        defmt::trace!("AD54x0 {=f32} mA in {} -> code {=u16:#x}", ma, range, code);

        self.write_raw_code(code)?;
        Ok(code)
    }

    /// Read back the code in the data register.
    pub fn read_output_code(&mut self) -> Result<u16, SPI::Error, P> {
        let frame = self.read_register(Register::Data)?;
        Ok(data_word(&frame))
    }

    /// Read back the data register and range, and convert to milliamps.
    pub fn read_output_ma(&mut self) -> Result<f32, SPI::Error, P> {
        let range = self.read_output_range()?;
        let code = self.read_output_code()?;
        Ok(Scaling::new(range, self.resolution()).code_to_ma(code))
    }

    /// Pulse CLEAR, which forces the output to the bottom of its range. The
    /// data register is not touched over the bus.
    pub fn clear_output(&mut self) -> Result<(), SPI::Error, P> {
        self.clear.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(self.config.clear_pulse().to_micros());
        self.clear.set_low().map_err(Error::Pin)
    }

    /// Software reset, returning the device to its power-on state.
    pub fn reset(&mut self) -> Result<(), SPI::Error, P> {
        self.write_frame(&RESET_FRAME)?;
        self.control = POWER_ON_CONTROL;
        Ok(())
    }

    /// Read the raw status byte. See [`Status`] for the flags.
    pub fn read_status(&mut self) -> Result<u8, SPI::Error, P> {
        let frame = self.read_register(Register::Status)?;
        Ok(status_byte(&frame))
    }

    /// Read the status register as decoded flags.
    pub fn read_status_flags(&mut self) -> Result<Status, SPI::Error, P> {
        self.read_status().map(Status::from)
    }

    /// True while the device holds the FAULT line low.
    pub fn fault_asserted(&mut self) -> Result<bool, SPI::Error, P> {
        self.fault.is_low().map_err(Error::Pin)
    }

    /// Register the fault handler, replacing any previous one.
    pub fn set_fault_handler(&mut self, handler: FaultHandler<'h>) -> Subscription {
        self.relay.subscribe(handler)
    }

    /// Remove the handler registered with `subscription`. Returns `false`
    /// if it had already been replaced or removed.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.relay.unsubscribe(subscription)
    }

    pub fn has_fault_handler(&self) -> bool {
        self.relay.is_subscribed()
    }

    /// Run the fault relay: read the status register and pass the raw byte
    /// to the handler, if one is registered.
    ///
    /// Call this from the falling-edge interrupt of the FAULT line. The status
    /// read happens even with no handler registered.
    pub fn handle_fault(&mut self) -> Result<u8, SPI::Error, P> {
        let status = self.read_status()?;

        #[cfg(feature = "defmt")]
        defmt::warn!("AD54x0 fault detected, status {=u8:#x}", status);

        self.relay.dispatch(status);
        Ok(status)
    }

    /// Run the fault relay only if the FAULT line is currently asserted.
    pub fn poll_fault(&mut self) -> Result<Option<u8>, SPI::Error, P> {
        if self.fault_asserted()? {
            self.handle_fault().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a register: request it, latch, clock it out, latch again.
    pub fn read_register(&mut self, register: Register) -> Result<Frame, SPI::Error, P> {
        self.write_frame(&register.read_request())?;

        let mut frame = [0u8; 3];
        self.spi.read(&mut frame).map_err(Error::Spi)?;
        self.pulse_latch()?;

        #[cfg(feature = "defmt")]
        defmt::trace!("AD54x0 read {} -> {=[u8]:#x}", register, &frame[..]);

        Ok(frame)
    }

    /// Destroy the driver and return the bound resources.
    pub fn release(self) -> (SPI, LATCH, CLEAR, FAULT, DELAY) {
        (self.spi, self.latch, self.clear, self.fault, self.delay)
    }

    /// Shift a frame out and commit it.
    fn write_frame(&mut self, frame: &Frame) -> Result<(), SPI::Error, P> {
        self.spi.write(frame).map_err(Error::Spi)?;
        self.spi.flush().map_err(Error::Spi)?;
        self.pulse_latch()
    }

    fn pulse_latch(&mut self) -> Result<(), SPI::Error, P> {
        self.latch.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(self.config.latch_pulse().to_micros());
        self.latch.set_low().map_err(Error::Pin)
    }
}
