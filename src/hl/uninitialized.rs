use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, OutputPin},
    spi,
};

use crate::{configs::ModeDescriptor, ll, Configured, Error, Reset, Uninitialized, BGT60};

/// Time the reset line is held low
const RESET_PULSE_MS: u32 = 10;
/// Time the chip needs after the reset line is released
const RESET_RECOVERY_MS: u32 = 100;

impl<SPI, RST> BGT60<SPI, RST, Uninitialized>
where
    SPI: spi::SpiDevice<u8>,
    RST: OutputPin,
{
    /// Create a new instance of `BGT60`
    ///
    /// Requires the SPI device that is connected to the BGT60 and the output
    /// pin that drives its reset line. Nothing is sent to the chip yet.
    pub fn new(spi: SPI, reset: RST) -> Self {
        BGT60 {
            ll: ll::BGT60::new(spi),
            reset,
            slice_size: 0,
            state: Uninitialized,
        }
    }

    /// Pulses the reset line and resets the state machine
    ///
    /// The FSM reset is a read-modify-write of MAIN, so it is also the first
    /// exchange that proves the bus is wired up.
    pub fn reset<D: DelayNs>(
        mut self,
        delay: &mut D,
    ) -> Result<BGT60<SPI, RST, Reset>, Error<SPI>> {
        self.reset.set_low().map_err(|e| Error::Gpio(e.kind()))?;
        delay.delay_ms(RESET_PULSE_MS);
        self.reset.set_high().map_err(|e| Error::Gpio(e.kind()))?;
        delay.delay_ms(RESET_RECOVERY_MS);

        self.ll.main().modify(|_, w| w.fsm_reset(1))?;
        log::debug!("BGT60 reset");

        Ok(self.into_state(Reset))
    }

    /// Resets, identifies and configures the BGT60 for `mode`
    ///
    /// This is a shortcut for [`reset`], [`identify`] and [`configure`]. On
    /// success the slice size is known and frames can be started.
    ///
    /// [`reset`]: #method.reset
    /// [`identify`]: #method.identify
    /// [`configure`]: #method.configure
    pub fn init<D: DelayNs>(
        self,
        mode: &ModeDescriptor,
        delay: &mut D,
    ) -> Result<BGT60<SPI, RST, Configured>, Error<SPI>> {
        self.reset(delay)?
            .identify()?
            .configure(&mode.register_list, delay)
    }
}
