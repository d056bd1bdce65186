use embedded_hal::spi;

use crate::{ll, Error, Stopped, Streaming, BGT60};

impl<SPI, RST> BGT60<SPI, RST, Streaming>
where
    SPI: spi::SpiDevice<u8>,
{
    /// Reads one slice from the FIFO in a single burst transfer
    ///
    /// `buffer` must be exactly [`slice_transfer_len`] bytes long. Its first
    /// four bytes come back holding the GSR0 status byte and three bytes the
    /// caller is free to reuse, the packed samples follow. The returned GSR0
    /// is not checked here.
    ///
    /// [`slice_transfer_len`]: #method.slice_transfer_len
    pub fn read_fifo_slice(&mut self, buffer: &mut [u8]) -> Result<ll::Gsr0, Error<SPI>> {
        let expected = self.slice_transfer_len();
        if buffer.len() != expected {
            return Err(Error::BufferWrongSize {
                expected,
                found: buffer.len(),
            });
        }

        self.ll.fifo_burst(buffer).map_err(Error::Transport)
    }

    /// Halts frame generation with an FSM reset
    ///
    /// The register configuration survives the reset.
    pub fn stop_frames(mut self) -> Result<BGT60<SPI, RST, Stopped>, Error<SPI>> {
        self.ll.main().modify(|_, w| w.fsm_reset(1))?;
        log::debug!("Frame generation stopped");

        Ok(self.into_state(Stopped))
    }
}
