//! Packed 12-bit sample format
//!
//! The FIFO stores two 12-bit ADC samples in every three bytes:
//!
//! ```text
//!  byte 0    byte 1    byte 2
//! AAAAAAAA  AAAABBBB  BBBBBBBB
//! ```

/// Largest value a 12-bit sample can take
pub const ADC_MAX: u16 = 0x0FFF;

/// Number of samples that [`unpack_raw12`] produces from `len` packed bytes
pub const fn unpacked_len(len: usize) -> usize {
    len / 3 * 2
}

/// Unpacks 12-bit sample pairs into `dst`
///
/// Only whole three-byte groups are unpacked, a trailing partial group is
/// ignored. Returns the number of samples written.
///
/// # Panics
///
/// Panics if `dst` is shorter than [`unpacked_len`] of `src.len()`.
pub fn unpack_raw12(src: &[u8], dst: &mut [u16]) -> usize {
    let len = unpacked_len(src.len());

    for (bytes, samples) in src.chunks_exact(3).zip(dst[..len].chunks_exact_mut(2)) {
        samples[0] = (bytes[0] as u16) << 4 | (bytes[1] as u16) >> 4;
        samples[1] = (bytes[1] as u16 & 0x0F) << 8 | bytes[2] as u16;
    }

    len
}

/// Packs pairs of 12-bit samples into the FIFO format
///
/// The inverse of [`unpack_raw12`]. Bits above the low 12 of each sample are
/// dropped. Returns the number of bytes written.
///
/// # Panics
///
/// Panics if `dst` can't hold three bytes for every complete sample pair.
pub fn pack_raw12(src: &[u16], dst: &mut [u8]) -> usize {
    let len = src.len() / 2 * 3;

    for (samples, bytes) in src.chunks_exact(2).zip(dst[..len].chunks_exact_mut(3)) {
        let (a, b) = (samples[0] & ADC_MAX, samples[1] & ADC_MAX);
        bytes[0] = (a >> 4) as u8;
        bytes[1] = ((a & 0x0F) << 4 | b >> 8) as u8;
        bytes[2] = b as u8;
    }

    len
}
