//! Our error types for the AD54x0 driver.

use thiserror::Error;

/// Result alias used by every bus-touching driver method.
///
/// `S` is the bus error type, `P` the error type shared by the control lines.
pub type Result<T, S, P> = core::result::Result<T, Error<S, P>>;

/// Errors raised while talking to the DAC.
///
/// Device-reported faults (over-temperature, output-current fault) are never
/// errors: they are only surfaced through the status register.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error<S, P> {
    /// The bus write or read failed. The transaction was abandoned at that
    /// point, so a failed write is never latched.
    #[error("SPI bus error")]
    Spi(S),
    /// Driving or sampling one of the latch, clear or fault lines failed.
    #[error("Control line error")]
    Pin(P),
}
