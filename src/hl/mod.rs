//! High-level interface to the BGT60
//!
//! The entry point to this API is the [BGT60] struct. Please refer to the
//! documentation there for more details.
//!
//! This module implements a high-level interface to the BGT60. This is the
//! recommended way to access the BGT60 using this crate, unless you need the
//! greater flexibility provided by the [register-level interface].
//!
//! The driver is a state machine encoded in the type system:
//!
//! ```text
//! Uninitialized -> Reset -> Identified -> Configured -> Streaming -> Stopped
//! ```
//!
//! Every transition consumes the driver and hands back a driver in the next
//! state, so operations that only make sense in a given state (reading FIFO
//! slices while streaming, for example) can't be called in any other.
//!
//! [register-level interface]: ../ll/index.html

use core::fmt;

pub use awake::*;
pub use error::*;
pub use state_impls::*;

use crate::ll;

mod awake;
mod configured;
mod error;
mod identified;
mod reset;
mod state_impls;
mod stopped;
mod streaming;
mod uninitialized;

/// Expected content of the CHIP_ID register for the BGT60TR13C
pub const BGT60TR13C_CHIP_ID: u32 = 0x00_0303;

/// Value written to SFCTL right after the FSM reset
pub const SFCTL_BOOT_VALUE: u32 = 0x10_2000;

/// Entry point to the BGT60 driver API
#[derive(Copy, Clone)]
pub struct BGT60<SPI, RST, State> {
    ll: ll::BGT60<SPI>,
    reset: RST,
    slice_size: u16,
    state: State,
}

impl<SPI, RST, State> BGT60<SPI, RST, State> {
    /// Releases the SPI device and the reset line
    pub fn free(self) -> (SPI, RST) {
        (self.ll.free(), self.reset)
    }

    fn into_state<Next>(self, state: Next) -> BGT60<SPI, RST, Next> {
        BGT60 {
            ll: self.ll,
            reset: self.reset,
            slice_size: self.slice_size,
            state,
        }
    }
}

// Can't be derived without putting requirements on `SPI` and `RST`.
impl<SPI, RST, State> fmt::Debug for BGT60<SPI, RST, State>
where
    State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BGT60 {{ state: ")?;
        self.state.fmt(f)?;
        write!(f, ", slice_size: {}, .. }}", self.slice_size)?;

        Ok(())
    }
}
