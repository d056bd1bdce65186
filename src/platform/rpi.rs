//! Raspberry Pi transport, using `rppal`
//!
//! A full slice is transferred in one SPI message. The default slice of the
//! built-in modes is 12292 bytes, which is more than the 4096 bytes `spidev`
//! accepts out of the box; raise the limit with `spidev.bufsiz=65536` on the
//! kernel command line.

use core::fmt;
use std::time::Duration;

use rppal::{
    gpio::{Gpio, InputPin, OutputPin, Trigger},
    spi::{Bus, Mode, SimpleHalSpiDevice, SlaveSelect, Spi},
};

use super::{DataReady, Platform, Readiness, Transport};

/// Wiring of the sensor
#[derive(Copy, Clone, Debug)]
pub struct RpiConfig {
    /// SPI bus the sensor is attached to
    pub bus: Bus,
    /// Chip select line
    pub slave_select: SlaveSelect,
    /// SPI clock, in Hz
    pub clock_speed: u32,
    /// BCM number of the pin driving the reset line
    pub reset_pin: u8,
    /// BCM number of the pin connected to the data-ready line
    pub irq_pin: u8,
    /// How long to wait for one edge before reporting a timeout
    ///
    /// `None` waits forever.
    pub irq_timeout: Option<Duration>,
}

impl Default for RpiConfig {
    fn default() -> Self {
        RpiConfig {
            bus: Bus::Spi0,
            slave_select: SlaveSelect::Ss0,
            clock_speed: 40_000_000,
            reset_pin: 12,
            irq_pin: 25,
            irq_timeout: Some(Duration::from_secs(1)),
        }
    }
}

/// Raspberry Pi GPIO and SPI
#[derive(Debug, Default)]
pub struct RpiPlatform {
    config: RpiConfig,
}

impl RpiPlatform {
    /// A platform wired as described by `config`
    pub fn new(config: RpiConfig) -> Self {
        RpiPlatform { config }
    }
}

impl Platform for RpiPlatform {
    type Spi = SimpleHalSpiDevice;
    type Reset = OutputPin;
    type DataReady = RpiDataReady;
    type Error = RpiError;

    fn open(&mut self) -> Result<Transport<Self::Spi, Self::Reset, Self::DataReady>, RpiError> {
        let config = &self.config;

        let spi = Spi::new(
            config.bus,
            config.slave_select,
            config.clock_speed,
            Mode::Mode0,
        )?;
        let gpio = Gpio::new()?;
        let mut reset = gpio.get(config.reset_pin)?.into_output();
        reset.set_high();

        let mut irq = gpio.get(config.irq_pin)?.into_input();
        irq.set_interrupt(Trigger::RisingEdge, None)?;

        log::debug!(
            "Opened {:?}/{:?} at {} Hz, reset on GPIO{}, data ready on GPIO{}",
            config.bus,
            config.slave_select,
            config.clock_speed,
            config.reset_pin,
            config.irq_pin
        );

        Ok(Transport {
            spi: SimpleHalSpiDevice::new(spi),
            reset,
            data_ready: RpiDataReady {
                pin: irq,
                timeout: config.irq_timeout,
            },
        })
    }
}

/// Data-ready line on a GPIO input
#[derive(Debug)]
pub struct RpiDataReady {
    pin: InputPin,
    timeout: Option<Duration>,
}

impl DataReady for RpiDataReady {
    type Error = rppal::gpio::Error;

    fn wait_for_rising_edge(&mut self) -> Result<Readiness, Self::Error> {
        // The line stays high until the FIFO is drained below the threshold,
        // an edge that came before this call would otherwise be lost.
        if self.pin.is_high() {
            return Ok(Readiness::Ready);
        }

        match self.pin.poll_interrupt(true, self.timeout)? {
            Some(_) => Ok(Readiness::Ready),
            None if self.pin.is_high() => Ok(Readiness::Ready),
            None => Ok(Readiness::TimedOut),
        }
    }
}

/// Error opening the Raspberry Pi peripherals
#[derive(Debug)]
pub enum RpiError {
    /// The SPI bus could not be opened
    Spi(rppal::spi::Error),
    /// A GPIO pin could not be acquired
    Gpio(rppal::gpio::Error),
}

impl From<rppal::spi::Error> for RpiError {
    fn from(error: rppal::spi::Error) -> Self {
        RpiError::Spi(error)
    }
}

impl From<rppal::gpio::Error> for RpiError {
    fn from(error: rppal::gpio::Error) -> Self {
        RpiError::Gpio(error)
    }
}

impl fmt::Display for RpiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RpiError::Spi(error) => write!(f, "SPI: {}", error),
            RpiError::Gpio(error) => write!(f, "GPIO: {}", error),
        }
    }
}

impl std::error::Error for RpiError {}
