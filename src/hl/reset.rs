use embedded_hal::spi;

use crate::{hl::BGT60TR13C_CHIP_ID, hl::SFCTL_BOOT_VALUE, Error, Identified, Reset, BGT60};

impl<SPI, RST> BGT60<SPI, RST, Reset>
where
    SPI: spi::SpiDevice<u8>,
{
    /// Confirms that the chip answers and is a BGT60TR13C
    ///
    /// Writes the boot value of SFCTL and reads it back, then checks CHIP_ID.
    /// The identity read is repeated once, as the first read after a cold
    /// boot can come back wrong.
    pub fn identify(mut self) -> Result<BGT60<SPI, RST, Identified>, Error<SPI>> {
        self.ll.sfctl().write(|w| w.bits(SFCTL_BOOT_VALUE))?;
        let sfctl = self.ll.sfctl().read()?;
        log::debug!("SFCTL after boot: {:?}", sfctl);

        let mut chip_id = self.ll.chip_id().read()?.bits();
        if chip_id != BGT60TR13C_CHIP_ID {
            log::warn!("Unexpected chip id 0x{:06x}, reading again", chip_id);
            chip_id = self.ll.chip_id().read()?.bits();
        }
        if chip_id != BGT60TR13C_CHIP_ID {
            return Err(Error::ChipId { found: chip_id });
        }

        log::info!("Found BGT60TR13C (chip id 0x{:06x})", chip_id);

        Ok(self.into_state(Identified))
    }
}
