//! Frame geometry and normalization
//!
//! The FIFO delivers the samples of a frame chirp by chirp. Within a chirp the
//! antennas are interleaved sample by sample:
//!
//! ```text
//! chirp 0: s0/rx0 s0/rx1 s1/rx0 s1/rx1 ... | chirp 1: s0/rx0 ...
//! ```
//!
//! so sample `s` of antenna `a` in chirp `c` lives at
//! `c * antennas * samples + s * antennas + a`. Normalization scatters that
//! flat layout into an `(antenna, chirp, sample)` cube.

use core::fmt;

use ndarray::Array3;
use num_traits::Float;

use crate::{configs::ModeDescriptor, unpack::ADC_MAX};

/// Dimensions of a frame
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameGeometry {
    /// Receive antennas
    pub num_antennas: usize,
    /// Chirps per frame
    pub num_chirps: usize,
    /// Samples per chirp and antenna
    pub num_samples: usize,
}

impl FrameGeometry {
    /// Geometry of the frames produced by `mode`
    pub fn from_mode(mode: &ModeDescriptor) -> Self {
        FrameGeometry {
            num_antennas: mode.num_antennas as usize,
            num_chirps: mode.segment.num_chirps_per_frame as usize,
            num_samples: mode.segment.num_samples_per_chirp as usize,
        }
    }

    /// Total number of samples in a frame
    pub fn frame_samples(&self) -> usize {
        self.num_antennas * self.num_chirps * self.num_samples
    }

    /// Shape of the normalized cube
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.num_antennas, self.num_chirps, self.num_samples)
    }

    /// Position of a sample in the flat frame buffer
    pub fn index(&self, antenna: usize, chirp: usize, sample: usize) -> usize {
        chirp * self.num_antennas * self.num_samples + sample * self.num_antennas + antenna
    }

    /// Number of slices of `samples_per_slice` samples that make up a frame
    pub fn slices_per_frame(&self, samples_per_slice: usize) -> Result<usize, GeometryError> {
        let frame_samples = self.frame_samples();
        if samples_per_slice == 0
            || frame_samples == 0
            || frame_samples % samples_per_slice != 0
        {
            return Err(GeometryError {
                frame_samples,
                samples_per_slice,
            });
        }

        Ok(frame_samples / samples_per_slice)
    }
}

/// A frame can't be split into whole slices
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GeometryError {
    /// Samples per frame
    pub frame_samples: usize,
    /// Samples per slice, as configured in the chip
    pub samples_per_slice: usize,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "frame of {} samples can't be split into slices of {} samples",
            self.frame_samples, self.samples_per_slice
        )
    }
}

impl std::error::Error for GeometryError {}

/// A buffer doesn't match the frame geometry
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShapeError {
    /// The flat frame buffer has the wrong length
    Length {
        /// Samples per frame
        expected: usize,
        /// Length of the buffer
        found: usize,
    },
    /// The output cube has the wrong shape
    Cube {
        /// Shape derived from the geometry
        expected: (usize, usize, usize),
        /// Shape of the cube
        found: (usize, usize, usize),
    },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ShapeError::Length { expected, found } => {
                write!(f, "frame holds {} samples, expected {}", found, expected)
            }
            ShapeError::Cube { expected, found } => {
                write!(f, "cube has shape {:?}, expected {:?}", found, expected)
            }
        }
    }
}

impl std::error::Error for ShapeError {}

/// A frame as assembled by the acquisition loop
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawFrame {
    /// Unpacked samples in FIFO order
    pub samples: Vec<u16>,
    /// Sequence number of the frame within its session
    pub frame_index: u64,
    /// Slices that could not be read and were left zeroed
    pub missed_slices: u32,
    /// A FIFO error was seen while assembling the frame
    pub fifo_error: bool,
}

impl RawFrame {
    /// An all-zero frame for `geometry`
    pub fn new(geometry: &FrameGeometry) -> Self {
        RawFrame {
            samples: vec![0; geometry.frame_samples()],
            ..Default::default()
        }
    }

    /// Whether every slice of the frame was read
    pub fn is_complete(&self) -> bool {
        self.missed_slices == 0
    }
}

/// Scatters a flat frame into `cube` and scales it to `[0, 1]`
pub fn normalize_into<F>(
    samples: &[u16],
    geometry: &FrameGeometry,
    cube: &mut Array3<F>,
) -> Result<(), ShapeError>
where
    F: Float + From<u16>,
{
    if samples.len() != geometry.frame_samples() {
        return Err(ShapeError::Length {
            expected: geometry.frame_samples(),
            found: samples.len(),
        });
    }
    if cube.dim() != geometry.shape() {
        return Err(ShapeError::Cube {
            expected: geometry.shape(),
            found: cube.dim(),
        });
    }

    let adc_max = <F as From<u16>>::from(ADC_MAX);
    for ((antenna, chirp, sample), value) in cube.indexed_iter_mut() {
        let raw = samples[geometry.index(antenna, chirp, sample)];
        *value = <F as From<u16>>::from(raw) / adc_max;
    }

    Ok(())
}

/// Like [`normalize_into`], allocating a new cube
pub fn normalize<F>(samples: &[u16], geometry: &FrameGeometry) -> Result<Array3<F>, ShapeError>
where
    F: Float + From<u16>,
{
    let mut cube = Array3::zeros(geometry.shape());
    normalize_into(samples, geometry, &mut cube)?;

    Ok(cube)
}
