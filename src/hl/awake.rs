use embedded_hal::spi;

use super::Awake;
use crate::{ll, Error, BGT60};

#[cfg(feature = "defmt")]
use defmt::Format;

/// Soft reset variants of the MAIN register
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum ResetKind {
    /// Resets all registers to their defaults
    Software,
    /// Resets the state machine, which halts frame generation
    Fsm,
    /// Discards the FIFO content
    Fifo,
}

/// Snapshot of the FIFO status register
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct FifoStatus {
    /// Number of words in the FIFO
    pub fill_status: u16,
    /// The FIFO is empty
    pub empty: bool,
    /// The fill level reached the data-ready threshold
    pub cref: bool,
    /// The FIFO is full
    pub full: bool,
    /// The FIFO overflowed
    pub overflow: bool,
    /// The FIFO underflowed
    pub underflow: bool,
    /// A burst access was malformed
    pub spi_burst_error: bool,
    /// The number of SPI clocks was not a multiple of 8
    pub clock_number_error: bool,
}

impl FifoStatus {
    /// Any of the error bits is set
    pub fn has_error(&self) -> bool {
        self.overflow || self.underflow || self.spi_burst_error || self.clock_number_error
    }
}

impl<SPI, RST, State> BGT60<SPI, RST, State>
where
    SPI: spi::SpiDevice<u8>,
    State: Awake,
{
    /// Returns the raw CHIP_ID register
    pub fn chip_id(&mut self) -> Result<u32, Error<SPI>> {
        Ok(self.ll.chip_id().read()?.bits())
    }

    /// Returns the FIFO status
    pub fn fifo_status(&mut self) -> Result<FifoStatus, Error<SPI>> {
        let fstat = self.ll.fstat().read()?;

        Ok(FifoStatus {
            fill_status: fstat.fill_status(),
            empty: fstat.empty() == 1,
            cref: fstat.cref() == 1,
            full: fstat.full() == 1,
            overflow: fstat.fof_err() == 1,
            underflow: fstat.fuf_err() == 1,
            spi_burst_error: fstat.spi_burst_err() == 1,
            clock_number_error: fstat.clk_num_err() == 1,
        })
    }

    /// Requests a soft reset
    ///
    /// The reset bits clear themselves; this does not wait for that.
    pub fn soft_reset(&mut self, kind: ResetKind) -> Result<(), Error<SPI>> {
        self.ll.main().modify(|_, w| match kind {
            ResetKind::Software => w.sw_reset(1),
            ResetKind::Fsm => w.fsm_reset(1),
            ResetKind::Fifo => w.fifo_reset(1),
        })?;

        Ok(())
    }

    /// Number of FIFO words transferred per slice
    ///
    /// This is zero until a register list has been programmed.
    pub fn slice_size(&self) -> u16 {
        self.slice_size
    }

    /// Number of ADC samples carried by one slice
    pub fn samples_per_slice(&self) -> usize {
        self.slice_size as usize * 2
    }

    /// Length of the buffer that [`read_fifo_slice`] expects
    ///
    /// [`read_fifo_slice`]: #method.read_fifo_slice
    pub fn slice_transfer_len(&self) -> usize {
        ll::BURST_HEADER_LEN + self.slice_size as usize * 3
    }

    /// Provides direct access to the register-level API
    ///
    /// Be aware that by using the register-level API, you can invalidate
    /// various assumptions that the high-level API makes about the operation of
    /// the BGT60. Don't use the register-level and high-level APIs in tandem,
    /// unless you know what you're doing.
    pub fn ll(&mut self) -> &mut ll::BGT60<SPI> {
        &mut self.ll
    }
}
