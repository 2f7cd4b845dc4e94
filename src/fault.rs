//! Delivery of device faults to application code.
//!
//! The FAULT pin is an open-drain, active-low output. The host platform owns
//! the interrupt: it should call [`SharedAd54x0::on_fault_edge`] (or
//! [`Ad54x0::handle_fault`] when it already has exclusive access) from its
//! falling-edge handler. The relay reads the status register and passes the raw
//! byte to the registered handler.
//!
//! Handlers run in whatever context the relay is invoked from, which is
//! usually interrupt context and inside a critical section. Keep them short.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiBus,
};

use crate::{dac::Ad54x0, error::Result};

/// A registered fault callback. It receives the raw status byte.
pub type FaultHandler<'h> = &'h mut (dyn FnMut(u8) + Send);

/// Token returned when a fault handler is registered.
///
/// Hand it back to [`Ad54x0::unsubscribe`] to remove the handler. A token
/// whose handler has since been replaced no longer removes anything.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping the token makes the handler impossible to unsubscribe"]
pub struct Subscription(u32);

/// Holds the current handler for one device.
pub(crate) struct FaultRelay<'h> {
    handler: Option<FaultHandler<'h>>,
    generation: u32,
}

impl<'h> FaultRelay<'h> {
    pub(crate) const fn new() -> Self {
        Self {
            handler: None,
            generation: 0,
        }
    }

    /// Replace the handler wholesale.
    pub(crate) fn subscribe(&mut self, handler: FaultHandler<'h>) -> Subscription {
        self.generation = self.generation.wrapping_add(1);
        self.handler = Some(handler);
        Subscription(self.generation)
    }

    pub(crate) fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        if subscription.0 == self.generation && self.handler.is_some() {
            self.handler = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_subscribed(&self) -> bool {
        self.handler.is_some()
    }

    /// Invoke the handler, if any. Returns whether one ran.
    pub(crate) fn dispatch(&mut self, status: u8) -> bool {
        match self.handler.as_mut() {
            Some(handler) => {
                handler(status);
                true
            }
            None => false,
        }
    }
}

/// Outcome of a fault edge reported to [`SharedAd54x0::on_fault_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    /// The status register was read and handed to the handler (if one is
    /// registered). Carries the raw status byte.
    Delivered(u8),
    /// The device was in the middle of a transaction. The relay will run once
    /// that transaction completes.
    Deferred,
}

/// A driver shared between application code and the fault interrupt.
///
/// All access goes through a critical section, so a fault interrupt can
/// never split a write/latch or read/latch sequence.
///
/// Fault edges that arrive while the device is borrowed are coalesced: at
/// most one relay run is queued, and it runs as soon as the current holder
/// releases the device. Any number of edges during one transaction produce a
/// single status read and a single handler call.
pub struct SharedAd54x0<'h, SPI, LATCH, CLEAR, FAULT, DELAY> {
    device: Mutex<RefCell<Ad54x0<'h, SPI, LATCH, CLEAR, FAULT, DELAY>>>,
    pending: Mutex<Cell<bool>>,
}

impl<'h, SPI, LATCH, CLEAR, FAULT, DELAY, P> SharedAd54x0<'h, SPI, LATCH, CLEAR, FAULT, DELAY>
where
    SPI: SpiBus<u8>,
    LATCH: OutputPin<Error = P>,
    CLEAR: OutputPin<Error = P>,
    FAULT: InputPin<Error = P>,
    DELAY: DelayNs,
{
    /// Wrap a driver for shared use.
    pub fn new(dac: Ad54x0<'h, SPI, LATCH, CLEAR, FAULT, DELAY>) -> Self {
        Self {
            device: Mutex::new(RefCell::new(dac)),
            pending: Mutex::new(Cell::new(false)),
        }
    }

    /// Run `f` with exclusive access to the driver inside a critical section.
    ///
    /// If a fault edge was deferred while `f` ran, the relay runs before the
    /// critical section is left. An error from `f` takes precedence; an error
    /// from the deferred relay re-queues it and is returned otherwise.
    ///
    /// # Panics
    ///
    /// Panics if called from inside another `lock` on the same instance.
    pub fn lock<R>(
        &self,
        f: impl FnOnce(&mut Ad54x0<'h, SPI, LATCH, CLEAR, FAULT, DELAY>) -> Result<R, SPI::Error, P>,
    ) -> Result<R, SPI::Error, P> {
        critical_section::with(|cs| {
            let mut dac = self.device.borrow_ref_mut(cs);
            let result = f(&mut *dac);

            let pending = self.pending.borrow(cs);
            let deferred = if pending.replace(false) {
                dac.handle_fault().map(|_| ()).inspect_err(|_| pending.set(true))
            } else {
                Ok(())
            };

            let value = result?;
            deferred?;
            Ok(value)
        })
    }

    /// Entry point for the host's falling-edge interrupt on the FAULT line.
    pub fn on_fault_edge(&self) -> Result<Delivery, SPI::Error, P> {
        critical_section::with(|cs| {
            let Ok(mut dac) = self.device.borrow(cs).try_borrow_mut() else {
                #[cfg(feature = "defmt")]
                defmt::debug!("AD54x0 busy, fault relay deferred");
                self.pending.borrow(cs).set(true);
                return Ok(Delivery::Deferred);
            };
            dac.handle_fault().map(Delivery::Delivered)
        })
    }

    /// True when a deferred relay run is waiting for the device.
    pub fn fault_pending(&self) -> bool {
        critical_section::with(|cs| self.pending.borrow(cs).get())
    }

    /// Take the driver back out.
    pub fn into_inner(self) -> Ad54x0<'h, SPI, LATCH, CLEAR, FAULT, DELAY> {
        self.device.into_inner().into_inner()
    }
}
