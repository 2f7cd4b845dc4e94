//! This crate provides a driver for the Analog Devices AD5410 / AD5420 family of single-channel,
//! current-output DACs.
//!
//! It is `no_std` and built on the `embedded-hal` 1.0 traits, so it works with any HAL that
//! provides an SPI bus, two output lines and one input line.
//!
//! Supported parts:
//! * AD5410 (12-bit)
//! * AD5420 (16-bit)
//!
//! Output ranges:
//! * 4 mA to 20 mA
//! * 0 mA to 20 mA
//! * 0 mA to 24 mA
//!
//! The bus used for DAC comms should be configured like so:
//! * Mode: [`SPI_MODE`] (clock idle low, sample on the leading edge)
//! * Word size: 8 bits, MSB first
//!
//! Wiring:
//! * LATCH: output, commits each frame on its rising edge
//! * CLEAR: output, forces the output to the bottom of its range while high
//! * FAULT: input, open-drain and active-low, needs a pull-up
//!
//! Fault interrupts are delivered through [`SharedAd54x0`], see the [`fault`] module.
//!
//! Enable the `defmt` feature to get transaction and fault logging over `defmt`.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod dac;
pub mod error;
pub mod fault;
pub mod register;
pub mod scaling;

#[cfg(test)]
mod mock_device;

pub use config::{Config, ControlConfig};
pub use dac::{Ad54x0, SPI_MODE};
pub use error::{Error, Result};
pub use fault::{Delivery, FaultHandler, SharedAd54x0, Subscription};
pub use register::{Control, OutputRange, Register, SlewClock, SlewStep, Status};
pub use scaling::{Resolution, Scaling, Variant};
