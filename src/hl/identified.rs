use embedded_hal::{delay::DelayNs, spi};

use crate::{configs::REGISTER_LIST_END, ll, Configured, Error, Identified, BGT60};

/// Settling time between two register list writes
const REGISTER_SETTLE_MS: u32 = 1;

impl<SPI, RST> BGT60<SPI, RST, Identified>
where
    SPI: spi::SpiDevice<u8>,
{
    /// Programs a register list and learns the slice size
    ///
    /// Entries are written in order up to the first [`REGISTER_LIST_END`]
    /// sentinel, or to the end of `registers` if it has none. Programming
    /// stops at the first failing write, which is reported with its index.
    ///
    /// The slice size is `FIFO_CREF + 1` as read back from SFCTL afterwards.
    pub fn configure<D: DelayNs>(
        mut self,
        registers: &[u32],
        delay: &mut D,
    ) -> Result<BGT60<SPI, RST, Configured>, Error<SPI>> {
        for (index, &word) in registers
            .iter()
            .take_while(|&&word| word != REGISTER_LIST_END)
            .enumerate()
        {
            let (address, value) = ll::split_register_word(word);
            self.ll
                .write_raw(address, value)
                .map_err(|source| Error::Programming { index, source })?;
            delay.delay_ms(REGISTER_SETTLE_MS);
        }

        let sfctl = self.ll.sfctl().read().map_err(Error::ConfigRead)?;
        self.slice_size = sfctl.fifo_cref() + 1;
        log::info!(
            "BGT60 configured, {} FIFO words ({} samples) per slice",
            self.slice_size,
            self.samples_per_slice()
        );

        Ok(self.into_state(Configured))
    }
}
