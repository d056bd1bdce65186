//! Driver and acquisition pipeline for the BGT60TR13C 60 GHz radar sensor
//!
//! The chip is driven directly over SPI: no companion microcontroller, the
//! host programs the registers, reads the FIFO in burst transfers and
//! reassembles the raw ADC samples into frames.
//!
//! The crate is layered like this:
//!
//! - [register-level interface]: command word codec and register accessors.
//! - [high-level interface]: a typestate driver that resets, identifies and
//!   configures the chip, starts frames and reads FIFO slices.
//! - With the `std` feature, a frame [session] that runs acquisition on its
//!   own thread and hands out normalized `(antenna, chirp, sample)` cubes,
//!   and the [acquisition] front end that picks a mode by name and opens the
//!   hardware through a [platform].
//!
//! This driver is built on top of [`embedded-hal`], which means the driver
//! layers are portable and can be used on any platform that implements the
//! `embedded-hal` API.
//!
//! [high-level interface]: hl/index.html
//! [register-level interface]: ll/index.html
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal
#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod configs;
pub mod hl;
pub mod ll;
pub mod slice;
pub mod test_pattern;
pub mod unpack;

#[cfg(feature = "std")]
pub mod acquisition;
#[cfg(feature = "std")]
pub mod frame;
#[cfg(feature = "std")]
pub mod platform;
#[cfg(feature = "std")]
pub mod record;
#[cfg(feature = "std")]
pub mod ring;
#[cfg(feature = "std")]
pub mod session;

/// Redirection of nb::block
pub mod block {
    pub use nb::block;
}

pub use crate::{
    block::block,
    configs::{find_mode, ModeDescriptor, ModeTable},
    hl::{
        Configured, Error, Identified, Reset, Stopped, Streaming, Uninitialized, BGT60,
    },
    test_pattern::TestPattern,
};

#[cfg(feature = "std")]
pub use crate::{
    acquisition::Acquisition,
    session::{Session, SessionConfig, SessionError, SessionStatus},
};
