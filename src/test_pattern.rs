//! Test pattern of the BGT60
//!
//! With `SFCTL.LFSR_EN` set, the chip replaces the ADC samples of the first
//! antenna with the output of a 12-bit Fibonacci LFSR. [`TestPattern`]
//! reproduces that sequence so every sample of a frame can be checked on the
//! host.

/// Generator of the test pattern sequence
///
/// The feedback taps are fixed by the chip: bits 0, 1, 2 and 8 of the current
/// state are XORed into bit 11 of the next one. Only the twelve low bits are
/// ever set, so the sequence runs through all 4095 non-zero 12-bit values
/// before repeating.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TestPattern {
    state: u16,
}

impl TestPattern {
    /// State of the generator when frames are started
    pub const SEED: u16 = 0x0001;

    /// Number of words before the sequence repeats
    pub const PERIOD: usize = 4095;

    /// A generator at the start of the sequence
    pub const fn new() -> Self {
        TestPattern { state: Self::SEED }
    }

    /// Restarts the sequence from the seed
    pub fn reset(&mut self) {
        self.state = Self::SEED;
    }

    /// Returns the current word and advances the generator
    pub fn next_word(&mut self) -> u16 {
        let v = self.state;
        self.state = (v >> 1) | (((v << 11) ^ (v << 10) ^ (v << 9) ^ (v << 3)) & 0x0800);

        v
    }

    /// Checks every `stride`-th sample of `samples` against the sequence
    ///
    /// The generator advances once per checked sample, over the whole of
    /// `samples` even after a mismatch, so the next call stays in step with
    /// the chip. The first mismatch is reported with its position in
    /// `samples`.
    pub fn verify(&mut self, samples: &[u16], stride: usize) -> Result<(), PatternMismatch> {
        let mut mismatch = None;
        for (index, &actual) in samples.iter().enumerate().step_by(stride.max(1)) {
            let expected = self.next_word();
            if actual != expected && mismatch.is_none() {
                mismatch = Some(PatternMismatch {
                    index,
                    expected,
                    actual,
                });
            }
        }

        match mismatch {
            Some(mismatch) => Err(mismatch),
            None => Ok(()),
        }
    }
}

/// A sample that doesn't match the test pattern
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PatternMismatch {
    /// Position of the sample in the frame
    pub index: usize,
    /// Word the generator produced
    pub expected: u16,
    /// Word that was received
    pub actual: u16,
}

impl Default for TestPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for TestPattern {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        Some(self.next_word())
    }
}
