//! Header of a FIFO slice
//!
//! A burst read comes back with four header bytes in front of the packed
//! samples. The chip only defines the first one (GSR0). The acquisition loop
//! overwrites the other three with its own slice and frame counters, which
//! makes captured slices traceable when debugging the transport.
//!
//! ```text
//! | GSR0 | slice index | frame index (LE u16) | packed samples ...
//! ```

use byte::{BytesExt as _, TryRead, TryWrite, LE};

use crate::ll::{Gsr0, BURST_HEADER_LEN};

/// The four header bytes of a slice
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SliceHeader {
    /// Status byte returned by the chip
    pub gsr0: Gsr0,
    /// Position of the slice within its frame
    pub slice_index: u8,
    /// Number of the frame the slice belongs to, wrapping at 16 bits
    pub frame_index: u16,
}

impl SliceHeader {
    /// Overwrites the counter bytes of a slice in place, leaving GSR0 intact
    pub fn stamp(bytes: &mut [u8], slice_index: u8, frame_index: u16) -> byte::Result<()> {
        let offset = &mut 1;
        bytes.write_with(offset, slice_index, LE)?;
        bytes.write_with(offset, frame_index, LE)?;

        Ok(())
    }
}

impl<'a> TryRead<'a, ()> for SliceHeader {
    fn try_read(bytes: &'a [u8], _: ()) -> byte::Result<(Self, usize)> {
        let offset = &mut 0;
        let header = SliceHeader {
            gsr0: Gsr0(bytes.read_with(offset, LE)?),
            slice_index: bytes.read_with(offset, LE)?,
            frame_index: bytes.read_with(offset, LE)?,
        };

        Ok((header, *offset))
    }
}

impl TryWrite for SliceHeader {
    fn try_write(self, bytes: &mut [u8], _: ()) -> byte::Result<usize> {
        let offset = &mut 0;
        bytes.write_with(offset, self.gsr0.0, LE)?;
        bytes.write_with(offset, self.slice_index, LE)?;
        bytes.write_with(offset, self.frame_index, LE)?;

        Ok(*offset)
    }
}

/// Running count of successfully read slices
///
/// Only slices that actually came off the bus advance the counter, so a
/// missed slice shows up as a jump in the stamped indices.
#[derive(Copy, Clone, Debug)]
pub struct SliceCounter {
    count: u32,
    slices_per_frame: u32,
}

impl SliceCounter {
    /// A counter for frames of `slices_per_frame` slices
    pub fn new(slices_per_frame: u32) -> Self {
        SliceCounter {
            count: 0,
            slices_per_frame: slices_per_frame.max(1),
        }
    }

    /// Stamps the header of a freshly read slice and advances the count
    pub fn stamp(&mut self, slice: &mut [u8]) -> byte::Result<()> {
        let slice_index = (self.count % self.slices_per_frame) as u8;
        let frame_index = (self.count / self.slices_per_frame) as u16;
        SliceHeader::stamp(slice, slice_index, frame_index)?;
        self.count = self.count.wrapping_add(1);

        Ok(())
    }

    /// Number of slices counted so far
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Packed sample bytes of a slice, without the header
pub fn payload(slice: &[u8]) -> &[u8] {
    slice.get(BURST_HEADER_LEN..).unwrap_or(&[])
}
