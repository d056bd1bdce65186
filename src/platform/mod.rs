//! Hardware the acquisition runs on
//!
//! The driver itself only needs an [`SpiDevice`] and an [`OutputPin`] for the
//! reset line. Acquisition additionally needs to wait for the data-ready line
//! of the chip, which `embedded-hal` has no blocking abstraction for; that is
//! what [`DataReady`] covers. A [`Platform`] hands out all three at the start
//! of every session.
//!
//! [`SpiDevice`]: embedded_hal::spi::SpiDevice
//! [`OutputPin`]: embedded_hal::digital::OutputPin

use core::fmt;
use std::{thread, time::Duration};

use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiDevice};

#[cfg(feature = "rpi")]
pub mod rpi;

/// Outcome of waiting for the data-ready line
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Readiness {
    /// A rising edge was seen, a slice is waiting in the FIFO
    Ready,
    /// No edge within the wait timeout
    TimedOut,
    /// The line will never signal again, e.g. a replayed capture ran out
    Closed,
}

/// The data-ready line of the chip
///
/// The line goes high once the FIFO holds a full slice.
pub trait DataReady {
    /// Error reported by the underlying line
    type Error: fmt::Debug;

    /// Blocks until a rising edge, a timeout or the end of the line
    fn wait_for_rising_edge(&mut self) -> Result<Readiness, Self::Error>;
}

impl<T> DataReady for &mut T
where
    T: DataReady + ?Sized,
{
    type Error = T::Error;

    fn wait_for_rising_edge(&mut self) -> Result<Readiness, Self::Error> {
        (**self).wait_for_rising_edge()
    }
}

/// The transport of one session
pub struct Transport<SPI, RST, IRQ> {
    /// SPI device the chip is attached to
    pub spi: SPI,
    /// Output driving the reset line of the chip
    pub reset: RST,
    /// The data-ready line of the chip
    pub data_ready: IRQ,
}

/// Opens the transport for a session
pub trait Platform {
    /// SPI device type
    type Spi: SpiDevice<u8> + Send + 'static;
    /// Reset line type
    type Reset: OutputPin + Send + 'static;
    /// Data-ready line type
    type DataReady: DataReady + Send + 'static;
    /// Error raised while opening the transport
    type Error: std::error::Error + Send + Sync + 'static;

    /// Acquires the bus and the pins
    ///
    /// Called once per session. Everything is handed back when the session
    /// ends, dropping it is expected to release the hardware.
    fn open(&mut self) -> Result<Transport<Self::Spi, Self::Reset, Self::DataReady>, Self::Error>;
}

/// [`DelayNs`] on top of [`thread::sleep`]
#[derive(Copy, Clone, Debug, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns.into()));
    }

    fn delay_us(&mut self, us: u32) {
        thread::sleep(Duration::from_micros(us.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms.into()));
    }
}
