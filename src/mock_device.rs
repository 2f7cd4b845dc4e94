//! We use this mocking module in unit tests to emulate an AD54x0 together with
//! its bus, control lines and delay provider.
//!
//! Frames clocked in over the bus are applied when the latch line rises, like
//! the real part. Every bus transfer, line change and delay is appended to an
//! event log so tests can check the ordering of a transaction.

use core::cell::RefCell;
use std::rc::Rc;

use embedded_hal::{delay::DelayNs, digital, spi};

use crate::register::{
    CONTROL_WRITE_ADDRESS, DATA_WRITE_ADDRESS, Frame, READ_COMMAND, RESET_ADDRESS,
};

/// Something the driver did to the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Write(Frame),
    Read(Frame),
    Flush,
    LatchHigh,
    LatchLow,
    ClearHigh,
    ClearLow,
    DelayNs(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    /// Simulated bus failure.
    Bus,
    /// Simulated control line failure.
    Line,
}

impl spi::Error for MockError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

impl digital::Error for MockError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

struct Chip {
    control: u16,
    data: u16,
    status: u8,
    /// Last frame clocked in, waiting for a latch edge.
    shift: Option<Frame>,
    /// What the next read clocks out.
    readback: Frame,
    latch_high: bool,
    clear_high: bool,
    fault_low: bool,
    events: heapless::Vec<Event, 1024>,
    fail_writes: bool,
    fail_reads: bool,
    fail_lines: bool,
}

impl Chip {
    fn record(&mut self, event: Event) {
        self.events.push(event).expect("mock event log full");
    }

    /// Apply whatever sits in the shift register.
    fn latch(&mut self) {
        let Some(frame) = self.shift.take() else {
            return;
        };
        let word = u16::from_be_bytes([frame[1], frame[2]]);
        match frame[0] {
            DATA_WRITE_ADDRESS => self.data = word,
            CONTROL_WRITE_ADDRESS => self.control = word,
            RESET_ADDRESS if frame[2] & 0x01 != 0 => {
                self.control = 0;
                self.data = 0;
            }
            READ_COMMAND => {
                let [hi, lo] = match frame[2] & 0x03 {
                    0x01 => self.data.to_be_bytes(),
                    0x02 => self.control.to_be_bytes(),
                    _ => [0x00, 0x00],
                };
                self.readback = if frame[2] & 0x03 == 0x00 {
                    [self.status, 0x00, 0x00]
                } else {
                    [0x00, hi, lo]
                };
            }
            _ => {}
        }
    }
}

/// Handle used by tests to set up and inspect the emulated device.
pub struct MockDevice {
    chip: Rc<RefCell<Chip>>,
}

impl MockDevice {
    /// Create a device in its power-on state.
    pub fn new() -> Self {
        Self {
            chip: Rc::new(RefCell::new(Chip {
                control: 0x0000,
                data: 0x0000,
                status: 0x00,
                shift: None,
                readback: [0x00; 3],
                latch_high: false,
                clear_high: false,
                fault_low: false,
                events: heapless::Vec::new(),
                fail_writes: false,
                fail_reads: false,
                fail_lines: false,
            })),
        }
    }

    /// Hand out the bus, the latch, clear and fault lines and a delay.
    pub fn parts(&self) -> (MockSpi, MockPin, MockPin, MockPin, MockDelay) {
        (
            MockSpi(self.chip.clone()),
            MockPin::new(&self.chip, Line::Latch),
            MockPin::new(&self.chip, Line::Clear),
            MockPin::new(&self.chip, Line::Fault),
            MockDelay(self.chip.clone()),
        )
    }

    pub fn control(&self) -> u16 {
        self.chip.borrow().control
    }

    pub fn set_control(&self, word: u16) {
        self.chip.borrow_mut().control = word;
    }

    pub fn data(&self) -> u16 {
        self.chip.borrow().data
    }

    pub fn set_data(&self, code: u16) {
        self.chip.borrow_mut().data = code;
    }

    pub fn set_status(&self, status: u8) {
        self.chip.borrow_mut().status = status;
    }

    /// Drive the open-drain fault output.
    pub fn set_fault_asserted(&self, asserted: bool) {
        self.chip.borrow_mut().fault_low = asserted;
    }

    pub fn latch_is_high(&self) -> bool {
        self.chip.borrow().latch_high
    }

    pub fn clear_is_high(&self) -> bool {
        self.chip.borrow().clear_high
    }

    pub fn fail_writes(&self, fail: bool) {
        self.chip.borrow_mut().fail_writes = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.chip.borrow_mut().fail_reads = fail;
    }

    pub fn fail_lines(&self, fail: bool) {
        self.chip.borrow_mut().fail_lines = fail;
    }

    pub fn events(&self) -> Vec<Event> {
        self.chip.borrow().events.iter().copied().collect()
    }

    pub fn clear_events(&self) {
        self.chip.borrow_mut().events.clear();
    }

    /// Every frame written over the bus, in order.
    pub fn writes(&self) -> Vec<Frame> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Write(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    /// High time in nanoseconds of every completed latch pulse.
    pub fn latch_pulses(&self) -> Vec<u32> {
        pulses(&self.events(), Event::LatchHigh, Event::LatchLow)
    }

    /// High time in nanoseconds of every completed clear pulse.
    pub fn clear_pulses(&self) -> Vec<u32> {
        pulses(&self.events(), Event::ClearHigh, Event::ClearLow)
    }
}

fn pulses(events: &[Event], rise: Event, fall: Event) -> Vec<u32> {
    let mut widths = Vec::new();
    let mut open: Option<u32> = None;
    for &event in events {
        match event {
            e if e == rise => {
                if open.is_none() {
                    open = Some(0);
                }
            }
            e if e == fall => {
                if let Some(width) = open.take() {
                    widths.push(width);
                }
            }
            Event::DelayNs(ns) => {
                if let Some(width) = open.as_mut() {
                    *width += ns;
                }
            }
            _ => {}
        }
    }
    widths
}

pub struct MockSpi(Rc<RefCell<Chip>>);

impl spi::ErrorType for MockSpi {
    type Error = MockError;
}

impl spi::SpiBus for MockSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        if chip.fail_reads {
            return Err(MockError::Bus);
        }
        assert_eq!(words.len(), 3, "the device only speaks 3-byte frames");
        words.copy_from_slice(&chip.readback);
        let frame = chip.readback;
        chip.record(Event::Read(frame));
        // Zeros are clocked in while the readback is clocked out.
        chip.shift = Some([0x00; 3]);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        if chip.fail_writes {
            return Err(MockError::Bus);
        }
        let frame: Frame = words.try_into().expect("the device only speaks 3-byte frames");
        chip.record(Event::Write(frame));
        chip.shift = Some(frame);
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.write(write)?;
        self.read(read)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let out: Frame = (&*words).try_into().expect("the device only speaks 3-byte frames");
        self.transfer(words, &out)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().record(Event::Flush);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Latch,
    Clear,
    Fault,
}

pub struct MockPin {
    chip: Rc<RefCell<Chip>>,
    line: Line,
}

impl MockPin {
    fn new(chip: &Rc<RefCell<Chip>>, line: Line) -> Self {
        Self {
            chip: chip.clone(),
            line,
        }
    }

    fn drive(&mut self, high: bool) -> Result<(), MockError> {
        let mut chip = self.chip.borrow_mut();
        if chip.fail_lines {
            return Err(MockError::Line);
        }
        match self.line {
            Line::Latch => {
                let rising = high && !chip.latch_high;
                chip.latch_high = high;
                chip.record(if high { Event::LatchHigh } else { Event::LatchLow });
                if rising {
                    chip.latch();
                }
            }
            Line::Clear => {
                chip.clear_high = high;
                chip.record(if high { Event::ClearHigh } else { Event::ClearLow });
            }
            Line::Fault => panic!("the fault line is an input"),
        }
        Ok(())
    }
}

impl digital::ErrorType for MockPin {
    type Error = MockError;
}

impl digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true)
    }
}

impl digital::InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let chip = self.chip.borrow();
        if chip.fail_lines {
            return Err(MockError::Line);
        }
        match self.line {
            Line::Fault => Ok(!chip.fault_low),
            Line::Latch => Ok(chip.latch_high),
            Line::Clear => Ok(chip.clear_high),
        }
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

pub struct MockDelay(Rc<RefCell<Chip>>);

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().record(Event::DelayNs(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.delay_ns(us.saturating_mul(1_000));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::{
        digital::{InputPin, OutputPin},
        spi::SpiBus,
    };

    #[test]
    fn frames_apply_on_latch_rising_edge() {
        let device = MockDevice::new();
        let (mut spi, mut latch, _, _, _) = device.parts();

        spi.write(&[0x01, 0x12, 0x34]).unwrap();
        assert_eq!(device.data(), 0x0000);

        latch.set_high().unwrap();
        assert_eq!(device.data(), 0x1234);

        // Holding the latch high does not apply the frame twice.
        latch.set_high().unwrap();
        latch.set_low().unwrap();
        assert_eq!(device.data(), 0x1234);
    }

    #[test]
    fn readback_needs_latch_before_read() {
        let device = MockDevice::new();
        device.set_control(0x1005);
        let (mut spi, mut latch, _, _, _) = device.parts();

        spi.write(&[0x02, 0x00, 0x02]).unwrap();
        let mut buf = [0u8; 3];
        spi.read(&mut buf).unwrap();
        assert_eq!(buf, [0x00; 3]);

        spi.write(&[0x02, 0x00, 0x02]).unwrap();
        latch.set_high().unwrap();
        latch.set_low().unwrap();
        spi.read(&mut buf).unwrap();
        assert_eq!(buf, [0x00, 0x10, 0x05]);
    }

    #[test]
    fn status_readback_sits_in_first_byte() {
        let device = MockDevice::new();
        device.set_status(0x05);
        let (mut spi, mut latch, _, _, _) = device.parts();

        spi.write(&[0x02, 0x00, 0x00]).unwrap();
        latch.set_high().unwrap();
        let mut buf = [0u8; 3];
        spi.read(&mut buf).unwrap();
        assert_eq!(buf, [0x05, 0x00, 0x00]);
    }

    #[test]
    fn reset_restores_power_on_state() {
        let device = MockDevice::new();
        device.set_control(0x1F07);
        device.set_data(0xBEEF);
        let (mut spi, mut latch, _, _, _) = device.parts();

        spi.write(&[0x56, 0x00, 0x01]).unwrap();
        latch.set_high().unwrap();
        assert_eq!(device.control(), 0x0000);
        assert_eq!(device.data(), 0x0000);
    }

    #[test]
    fn pulse_widths_are_measured() {
        let device = MockDevice::new();
        let (_, mut latch, mut clear, _, mut delay) = device.parts();

        latch.set_high().unwrap();
        delay.delay_us(10);
        delay.delay_ns(500);
        latch.set_low().unwrap();
        clear.set_high().unwrap();
        delay.delay_us(1);
        clear.set_low().unwrap();

        assert_eq!(device.latch_pulses(), vec![10_500]);
        assert_eq!(device.clear_pulses(), vec![1_000]);
    }

    #[test]
    fn fault_line_reads_active_low() {
        let device = MockDevice::new();
        let (_, _, _, mut fault, _) = device.parts();

        assert!(fault.is_high().unwrap());
        device.set_fault_asserted(true);
        assert!(fault.is_low().unwrap());
    }

    #[test]
    fn error_injection() {
        let device = MockDevice::new();
        let (mut spi, mut latch, _, _, _) = device.parts();

        device.fail_writes(true);
        assert_eq!(spi.write(&[0x01, 0x00, 0x00]), Err(MockError::Bus));
        device.fail_reads(true);
        let mut buf = [0u8; 3];
        assert_eq!(spi.read(&mut buf), Err(MockError::Bus));
        device.fail_lines(true);
        assert_eq!(latch.set_high(), Err(MockError::Line));
        assert!(device.events().is_empty());
    }
}
