//! Low-level interface to the BGT60
//!
//! This module implements the register-level protocol of the BGT60. Users of
//! this library should typically not need to use this. Please consider using
//! the [high-level interface] instead.
//!
//! Every SPI exchange with the chip starts with one 32-bit command word that is
//! shifted out most significant byte first:
//!
//! ```text
//!  31       25  24  23                              0
//! +-----------+----+---------------------------------+
//! |  address  | WR |              data               |
//! +-----------+----+---------------------------------+
//! ```
//!
//! While the command is shifted out, the chip answers with the GSR0 status
//! byte followed by the 24 data bits of the addressed register. The pure
//! encode/decode functions at the top of this module capture that layout and
//! don't touch the bus, everything below them drives an [`SpiDevice`].
//!
//! **NOTE**: Field setters accept types that have a larger number of bits than
//! the field actually consists of. If you use such a method to pass a value
//! that is too large to be written to the field, it will be silently truncated.
//!
//! [high-level interface]: ../hl/index.html

use core::{fmt, marker::PhantomData};

use embedded_hal::spi::{self, SpiDevice};

#[cfg(feature = "defmt")]
use defmt::Format;

/// Write operation flag of a register command
pub const SPI_WR_OP_MSK: u32 = 0x0100_0000;
/// Position of the register address in a command word
pub const SPI_REGADR_POS: u32 = 25;
/// Mask of the register address in a command word
pub const SPI_REGADR_MSK: u32 = 0xFE00_0000;
/// Mask of the register data in a command or response word
pub const SPI_DATA_MSK: u32 = 0x00FF_FFFF;

/// Fixed command byte that selects burst mode
pub const SPI_BURST_MODE_CMD: u32 = 0xFF00_0000;
/// Position of the burst start address
pub const SPI_BURST_MODE_SADR_POS: u32 = 17;
/// Mask of the burst start address
pub const SPI_BURST_MODE_SADR_MSK: u32 = 0x00FE_0000;
/// Burst read/write flag, left cleared for FIFO reads
pub const SPI_BURST_MODE_RWB_MSK: u32 = 0x0001_0000;
/// Mask of the burst length field, zero means unbounded
pub const SPI_BURST_MODE_LEN_MSK: u32 = 0x0000_FE00;

/// Address of the FIFO on the BGT60TR13C
pub const FIFO_ADDR: u8 = 0x60;

/// Number of header bytes that precede the payload of a burst read
pub const BURST_HEADER_LEN: usize = 4;

/// Encodes a register write into the bytes that go out on the wire
pub fn encode_write(address: u8, value: u32) -> [u8; 4] {
    let word = ((address as u32) << SPI_REGADR_POS) & SPI_REGADR_MSK
        | SPI_WR_OP_MSK
        | value & SPI_DATA_MSK;

    word.to_be_bytes()
}

/// Encodes a register read request
///
/// The data bits are left zero. The response comes back in the same exchange
/// and is decoded with [`decode_read_response`].
pub fn encode_read_request(address: u8) -> [u8; 4] {
    let word = ((address as u32) << SPI_REGADR_POS) & SPI_REGADR_MSK;

    word.to_be_bytes()
}

/// Extracts the 24-bit register value from the bytes read during an exchange
pub fn decode_read_response(word: [u8; 4]) -> u32 {
    u32::from_be_bytes(word) & SPI_DATA_MSK
}

/// Encodes the command that starts a streaming burst read at `start_address`
pub fn encode_burst_fifo_request(start_address: u8) -> [u8; 4] {
    let word = SPI_BURST_MODE_CMD
        | ((start_address as u32) << SPI_BURST_MODE_SADR_POS) & SPI_BURST_MODE_SADR_MSK;

    word.to_be_bytes()
}

/// Splits an entry of a register list into its address and value
///
/// Register lists store each entry in the same layout as a write command.
pub fn split_register_word(word: u32) -> (u8, u32) {
    (
        ((word & SPI_REGADR_MSK) >> SPI_REGADR_POS) as u8,
        word & SPI_DATA_MSK,
    )
}

/// GSR0 global status, the first byte the chip shifts out in every exchange
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Gsr0(pub u8);

impl Gsr0 {
    const FOU_ERR: u8 = 0x08;
    const MISO_HS_READ: u8 = 0x04;
    const SPI_BURST_ERR: u8 = 0x02;
    const CLK_NUM_ERR: u8 = 0x01;

    /// FIFO overflow or underflow
    pub fn fifo_error(&self) -> bool {
        self.0 & Self::FOU_ERR != 0
    }

    /// High-speed MISO sampling is active
    pub fn miso_hs_read(&self) -> bool {
        self.0 & Self::MISO_HS_READ != 0
    }

    /// A burst was aborted or malformed
    pub fn spi_burst_error(&self) -> bool {
        self.0 & Self::SPI_BURST_ERR != 0
    }

    /// The number of SPI clocks was not a multiple of 8
    pub fn clock_number_error(&self) -> bool {
        self.0 & Self::CLK_NUM_ERR != 0
    }

    /// Any of the error bits is set
    pub fn has_error(&self) -> bool {
        self.0 & (Self::FOU_ERR | Self::SPI_BURST_ERR | Self::CLK_NUM_ERR) != 0
    }
}

/// Entry point to the BGT60 driver's low-level API
///
/// Please consider using [hl::BGT60] instead.
///
/// [hl::BGT60]: ../hl/struct.BGT60.html
#[derive(Copy, Clone)]
pub struct BGT60<SPI> {
    pub(crate) spi: SPI,
    last_gsr0: Gsr0,
}

impl<SPI> BGT60<SPI> {
    /// Create a new instance of `BGT60`
    ///
    /// Requires the SPI device that is connected to the BGT60.
    pub fn new(spi: SPI) -> Self {
        BGT60 {
            spi,
            last_gsr0: Gsr0::default(),
        }
    }

    /// Allow access to the SPI bus
    pub fn bus(&mut self) -> &mut SPI {
        &mut self.spi
    }

    /// Releases the SPI device
    pub fn free(self) -> SPI {
        self.spi
    }

    /// GSR0 status captured during the most recent exchange
    pub fn last_gsr0(&self) -> Gsr0 {
        self.last_gsr0
    }
}

impl<SPI> BGT60<SPI>
where
    SPI: SpiDevice<u8>,
{
    /// Reads a register by address
    pub fn read_raw(&mut self, address: u8) -> Result<u32, Error<SPI>> {
        let mut buffer = encode_read_request(address);
        self.spi
            .transfer_in_place(&mut buffer)
            .map_err(Error::Transfer)?;
        self.last_gsr0 = Gsr0(buffer[0]);

        Ok(decode_read_response(buffer))
    }

    /// Writes a register by address
    pub fn write_raw(&mut self, address: u8, value: u32) -> Result<(), Error<SPI>> {
        let mut buffer = encode_write(address, value);
        self.spi
            .transfer_in_place(&mut buffer)
            .map_err(Error::Transfer)?;
        self.last_gsr0 = Gsr0(buffer[0]);

        Ok(())
    }

    /// Streams FIFO words into `buffer` in a single burst transfer
    ///
    /// The first [`BURST_HEADER_LEN`] bytes of `buffer` are overwritten with
    /// the burst command and come back holding GSR0 and three bytes of
    /// don't-care. Everything after them is packed FIFO data.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` is shorter than [`BURST_HEADER_LEN`].
    pub fn fifo_burst(&mut self, buffer: &mut [u8]) -> Result<Gsr0, Error<SPI>> {
        buffer[..BURST_HEADER_LEN].copy_from_slice(&encode_burst_fifo_request(FIFO_ADDR));
        buffer[BURST_HEADER_LEN..].fill(0);

        self.spi.transfer_in_place(buffer).map_err(Error::Transfer)?;
        self.last_gsr0 = Gsr0(buffer[0]);

        Ok(self.last_gsr0)
    }
}

/// Provides access to a register
///
/// You can get an instance for a given register using one of the methods on
/// [`BGT60`].
pub struct RegAccessor<'s, R, SPI>(&'s mut BGT60<SPI>, PhantomData<R>);

impl<'s, R, SPI> RegAccessor<'s, R, SPI>
where
    SPI: SpiDevice<u8>,
{
    /// Read from the register
    #[inline]
    pub fn read(&mut self) -> Result<R::Read, Error<SPI>>
    where
        R: Register + Readable,
    {
        let raw = self.0.read_raw(R::ADDR)?;

        Ok(R::read(raw))
    }

    /// Write to the register
    ///
    /// Fields that aren't touched by `f` are written as zero.
    #[inline]
    pub fn write<F>(&mut self, f: F) -> Result<(), Error<SPI>>
    where
        R: Register + Writable,
        F: FnOnce(&mut R::Write) -> &mut R::Write,
    {
        let mut w = R::write(0);
        f(&mut w);

        self.0.write_raw(R::ADDR, R::bits(&w))
    }

    /// Modify the register
    #[inline]
    pub fn modify<F>(&mut self, f: F) -> Result<(), Error<SPI>>
    where
        R: Register + Readable + Writable,
        F: for<'r> FnOnce(&mut R::Read, &'r mut R::Write) -> &'r mut R::Write,
    {
        let raw = self.0.read_raw(R::ADDR)?;
        let mut r = R::read(raw);
        let mut w = R::write(raw);

        f(&mut r, &mut w);

        self.0.write_raw(R::ADDR, R::bits(&w))
    }
}

/// An SPI error that can occur when communicating with the BGT60
pub enum Error<SPI>
where
    SPI: spi::ErrorType,
{
    /// SPI error occured during a transfer transaction
    Transfer(SPI::Error),
}

// We can't derive this implementation, as the compiler will complain that the
// associated error type doesn't implement `Debug`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: spi::ErrorType,
    SPI::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Transfer(error) => write!(f, "Transfer({:?})", error),
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI> defmt::Format for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Transfer(_) => defmt::write!(f, "Transfer()"),
        }
    }
}

/// Implemented for all registers
///
/// This is a mostly internal trait that should not be implemented or used
/// directly by users of this crate. It is exposed through the public API
/// though, so it can't be made private.
pub trait Register {
    /// The 7-bit register address
    const ADDR: u8;
}

/// Marker trait for registers that can be read from
///
/// This is a mostly internal trait that should not be implemented or used
/// directly by users of this crate. It is exposed through the public API
/// though, so it can't be made private.
pub trait Readable {
    /// The type that is used to read from the register
    type Read;

    /// Wrap the 24 data bits returned by the chip
    fn read(raw: u32) -> Self::Read;
}

/// Marker trait for registers that can be written to
///
/// This is a mostly internal trait that should not be implemented or used
/// directly by users of this crate. It is exposed through the public API
/// though, so it can't be made private.
pub trait Writable {
    /// The type that is used to write to the register
    type Write;

    /// Return the write type, starting out with the given data bits
    fn write(raw: u32) -> Self::Write;

    /// Return the data bits that will be written
    fn bits(w: &Self::Write) -> u32;
}

/// Generates register implementations
macro_rules! impl_register {
    (
        $(
            $addr:expr,
            $rw:tt,
            $name:ident($name_lower:ident) {
            #[$doc:meta]
            $(
                $field:ident,
                $first_bit:expr,
                $last_bit:expr,
                $ty:ty;
                #[$field_doc:meta]
            )*
            }
        )*
    ) => {
        $(
            #[$doc]
            #[allow(non_camel_case_types)]
            pub struct $name;

            impl Register for $name {
                const ADDR: u8 = $addr;
            }

            #[$doc]
            pub mod $name_lower {
                use core::fmt;

                /// Used to read from the register
                pub struct R(pub(crate) u32);

                impl R {
                    /// The raw 24 data bits
                    #[inline(always)]
                    pub fn bits(&self) -> u32 {
                        self.0
                    }

                    $(
                        #[$field_doc]
                        #[inline(always)]
                        pub fn $field(&self) -> $ty {
                            const WIDTH: u32 = $last_bit - $first_bit + 1;
                            const MASK: u32 = ((1u64 << WIDTH) - 1) as u32;

                            ((self.0 >> $first_bit) & MASK) as $ty
                        }
                    )*
                }

                impl fmt::Debug for R {
                    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                        write!(f, "0x{:06x}", self.0)
                    }
                }

                #[cfg(feature = "defmt")]
                impl defmt::Format for R {
                    fn format(&self, f: defmt::Formatter) {
                        defmt::write!(f, "0x{:06x}", self.0);
                    }
                }

                /// Used to write to the register
                pub struct W(pub(crate) u32);

                impl W {
                    /// Overwrite all 24 data bits
                    #[inline(always)]
                    pub fn bits(&mut self, value: u32) -> &mut Self {
                        self.0 = value & super::SPI_DATA_MSK;
                        self
                    }

                    $(
                        #[$field_doc]
                        #[inline(always)]
                        pub fn $field(&mut self, value: $ty) -> &mut Self {
                            const WIDTH: u32 = $last_bit - $first_bit + 1;
                            const MASK: u32 = ((1u64 << WIDTH) - 1) as u32;

                            self.0 &= !(MASK << $first_bit);
                            self.0 |= ((value as u32) & MASK) << $first_bit;

                            self
                        }
                    )*
                }
            }

            impl_rw!($rw, $name, $name_lower);
        )*


        impl<SPI> BGT60<SPI> {
            $(
                #[$doc]
                pub fn $name_lower(&mut self) -> RegAccessor<$name, SPI> {
                    RegAccessor(self, PhantomData)
                }
            )*
        }
    }
}

// Helper macro, used internally by `impl_register!`
macro_rules! impl_rw {
    (RO, $name:ident, $name_lower:ident) => {
        impl_rw!(@R, $name, $name_lower);
    };
    (RW, $name:ident, $name_lower:ident) => {
        impl_rw!(@R, $name, $name_lower);
        impl_rw!(@W, $name, $name_lower);
    };

    (@R, $name:ident, $name_lower:ident) => {
        impl Readable for $name {
            type Read = $name_lower::R;

            fn read(raw: u32) -> Self::Read {
                $name_lower::R(raw & SPI_DATA_MSK)
            }
        }
    };
    (@W, $name:ident, $name_lower:ident) => {
        impl Writable for $name {
            type Write = $name_lower::W;

            fn write(raw: u32) -> Self::Write {
                $name_lower::W(raw & SPI_DATA_MSK)
            }

            fn bits(w: &Self::Write) -> u32 {
                w.0
            }
        }
    };
}

// All registers are implemented in this macro invocation. It follows the
// following syntax:
// <address>, <RO/RW>, <NAME(name)> { /// <doc>
//      <name>, <first-bit-index>, <last-bit-index>, <type>; /// <doc>
// }
impl_register! {
    0x00, RW, MAIN(main) { /// Main control
        frame_start,   0,  0, u8;  /// Start frame generation
        sw_reset,      1,  1, u8;  /// Software reset, self-clearing
        fsm_reset,     2,  2, u8;  /// FSM reset, self-clearing
        fifo_reset,    3,  3, u8;  /// FIFO reset, self-clearing
    }
    0x02, RO, CHIP_ID(chip_id) { /// Chip identification
        rf_id,         0,  7, u8;  /// RF block version
        digital_id,    8, 15, u8;  /// Digital block version
    }
    0x06, RW, SFCTL(sfctl) { /// SPI and FIFO control
        fifo_cref,     0, 12, u16; /// FIFO fill level, in words, that raises the data-ready line
        fifo_lp_mode, 13, 13, u8;  /// FIFO low-power mode
        miso_hs_read, 16, 16, u8;  /// Sample MISO on the falling edge for high SPI clocks
        lfsr_en,      17, 17, u8;  /// Replace ADC data with the test LFSR pattern
        prefix_en,    18, 18, u8;  /// Prefix burst data with a header word
    }
    0x63, RO, FSTAT(fstat) { /// FIFO status of the BGT60TR13C
        fill_status,   0, 13, u16; /// Number of words in the FIFO
        clk_num_err,  17, 17, u8;  /// Number of SPI clocks not a multiple of 8
        spi_burst_err,18, 18, u8;  /// Burst access error
        fuf_err,      19, 19, u8;  /// FIFO underflow
        empty,        20, 20, u8;  /// FIFO is empty
        cref,         21, 21, u8;  /// Fill level is at or above FIFO_CREF
        full,         22, 22, u8;  /// FIFO is full
        fof_err,      23, 23, u8;  /// FIFO overflow
    }
}
