use embedded_hal::spi;

use crate::{Configured, Error, Streaming, BGT60};

impl<SPI, RST> BGT60<SPI, RST, Configured>
where
    SPI: spi::SpiDevice<u8>,
{
    /// Enables or disables the test pattern generator
    ///
    /// While enabled, the chip replaces ADC samples with the output of its
    /// LFSR. The generator restarts from its seed when frames are started.
    pub fn enable_self_test(&mut self, enabled: bool) -> Result<(), Error<SPI>> {
        self.ll.sfctl().modify(|_, w| w.lfsr_en(enabled as u8))?;
        log::debug!("Self-test pattern {}", if enabled { "on" } else { "off" });

        Ok(())
    }

    /// Starts continuous frame generation
    pub fn start_frames(mut self) -> Result<BGT60<SPI, RST, Streaming>, Error<SPI>> {
        self.ll.main().modify(|_, w| w.frame_start(1))?;
        log::debug!("Frame generation started");

        Ok(self.into_state(Streaming))
    }
}
