use core::fmt;
use core::fmt::{Display, Formatter};

use embedded_hal::{digital, spi};

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::ll;

/// An error that can occur while driving the BGT60
pub enum Error<SPI>
where
    SPI: spi::ErrorType,
{
    /// Error occured while accessing a register
    Spi(ll::Error<SPI>),

    /// Error occured during a FIFO burst transfer
    Transport(ll::Error<SPI>),

    /// Error occured while driving the reset line
    Gpio(digital::ErrorKind),

    /// The chip did not identify as a BGT60TR13C, even after a second read
    ChipId {
        /// The CHIP_ID register value that was read
        found: u32,
    },

    /// Writing an entry of the register list failed
    ///
    /// Programming stops at the first failing entry; the entries before
    /// `index` have been written.
    Programming {
        /// Position of the failing entry in the register list
        index: usize,
        /// The underlying SPI error
        source: ll::Error<SPI>,
    },

    /// The slice size could not be read back after programming
    ConfigRead(ll::Error<SPI>),

    /// The buffer passed to a FIFO read has the wrong size
    BufferWrongSize {
        /// Indicates how large the buffer must be
        expected: usize,
        /// Size of the buffer that was passed
        found: usize,
    },
}

impl<SPI> From<ll::Error<SPI>> for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: ll::Error<SPI>) -> Self {
        Error::Spi(error)
    }
}

impl<SPI> Display for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl<SPI> std::error::Error for Error<SPI> where SPI: spi::ErrorType {}

// We can't derive this implementation, as `Debug` is only implemented
// conditionally for `ll::Error`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(error) => write!(f, "Spi({:?})", error),
            Error::Transport(error) => write!(f, "Transport({:?})", error),
            Error::Gpio(kind) => write!(f, "Gpio({:?})", kind),
            Error::ChipId { found } => write!(f, "ChipId {{ found: 0x{:06x} }}", found),
            Error::Programming { index, source } => {
                write!(f, "Programming {{ index: {}, source: {:?} }}", index, source)
            }
            Error::ConfigRead(error) => write!(f, "ConfigRead({:?})", error),
            Error::BufferWrongSize { expected, found } => write!(
                f,
                "BufferWrongSize {{ expected: {}, found: {} }}",
                expected, found
            ),
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI> Format for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Spi(error) => defmt::write!(f, "Spi({:?})", error),
            Error::Transport(error) => defmt::write!(f, "Transport({:?})", error),
            Error::Gpio(kind) => defmt::write!(f, "Gpio({:?})", defmt::Debug2Format(kind)),
            Error::ChipId { found } => defmt::write!(f, "ChipId {{ found: {=u32:#x} }}", found),
            Error::Programming { index, source } => {
                defmt::write!(f, "Programming {{ index: {}, source: {:?} }}", index, source)
            }
            Error::ConfigRead(error) => defmt::write!(f, "ConfigRead({:?})", error),
            Error::BufferWrongSize { expected, found } => defmt::write!(
                f,
                "BufferWrongSize {{ expected: {}, found: {} }}",
                expected,
                found
            ),
        }
    }
}
