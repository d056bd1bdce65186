//! Acquisition modes
//!
//! A mode bundles the register list that puts the BGT60 into a given chirp
//! and frame configuration with the frame geometry that results from it. The
//! register list is opaque to this crate apart from its sentinel; the
//! geometry is what the frame assembler and normalizer work with.

use alloc::{borrow::Cow, vec::Vec};

/// Marks the end of a register list
pub const REGISTER_LIST_END: u32 = 0xFFFF_FFFF;

/// How the sensor is mounted
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum Orientation {
    /// Antennas side by side along the long edge
    #[default]
    Landscape,
    /// Rotated by 90 degrees
    Portrait,
    /// Rotated by 180 degrees
    LandscapeFlipped,
    /// Rotated by 270 degrees
    PortraitFlipped,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Chirp and frame geometry of a mode
pub struct SegmentConfig {
    /// ADC samples per chirp and antenna
    pub num_samples_per_chirp: u32,
    /// Chirps per frame
    pub num_chirps_per_frame: u32,
    /// Swept bandwidth, in Hz
    pub bandwidth_hz: f64,
    /// Center of the swept band, in Hz
    pub center_frequency_hz: f64,
    /// Sensor orientation
    pub orientation: Orientation,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// A selectable acquisition mode
pub struct ModeDescriptor {
    /// Name the mode is selected by
    pub specifier: Cow<'static, str>,
    /// Human readable description
    pub name: Cow<'static, str>,
    /// Number of receive antennas sampled per chirp
    pub num_antennas: u32,
    /// Raw register words, in write command layout
    ///
    /// Programming stops at [`REGISTER_LIST_END`] or at the end of the list.
    pub register_list: Cow<'static, [u32]>,
    /// Frame geometry
    pub segment: SegmentConfig,
}

impl ModeDescriptor {
    /// Number of samples in one frame, over all antennas
    pub fn frame_samples(&self) -> usize {
        self.num_antennas as usize
            * self.segment.num_chirps_per_frame as usize
            * self.segment.num_samples_per_chirp as usize
    }

    /// The register list without its sentinel
    pub fn registers(&self) -> &[u32] {
        let end = self
            .register_list
            .iter()
            .position(|&word| word == REGISTER_LIST_END)
            .unwrap_or(self.register_list.len());

        &self.register_list[..end]
    }
}

static REGS_LANDSCAPE_460MHZ: [u32; 40] = [
    0x011E_8270, 0x030A_0210, 0x09E9_67FD, 0x0B08_05B4, 0x0D10_2FFF, 0x0F01_0700, 0x1100_0000,
    0x1300_0000, 0x1500_0000, 0x1700_0BE0, 0x1900_0000, 0x1B00_0000, 0x1D00_0000, 0x1F00_0B60,
    0x2113_3C51, 0x235F_F41F, 0x2570_6F7B, 0x2D00_0490, 0x3B00_0480, 0x4900_0480, 0x5700_0480,
    0x5911_BE0E, 0x5B65_AC0A, 0x5D03_F000, 0x5F78_7E1E, 0x61F4_A65A, 0x6300_0099, 0x6500_02B2,
    0x6700_0080, 0x6900_0000, 0x6B00_0000, 0x6D00_0000, 0x6F25_3B10, 0x7F00_0100, 0x8F00_0100,
    0x9F00_0100, 0xAB00_0000, 0xAD00_0000, 0xB700_0000, REGISTER_LIST_END,
];

static REGS_LANDSCAPE_1GHZ: [u32; 40] = [
    0x011E_8270, 0x030A_0210, 0x09E9_67FD, 0x0B08_05B4, 0x0D10_2FFF, 0x0F01_0700, 0x1100_0000,
    0x1300_0000, 0x1500_0000, 0x1700_0BE0, 0x1900_0000, 0x1B00_0000, 0x1D00_0000, 0x1F00_0B60,
    0x2113_3C51, 0x235F_F41F, 0x2570_6F7B, 0x2D00_0490, 0x3B00_0480, 0x4900_0480, 0x5700_0480,
    0x5911_BE0E, 0x5B65_AC0A, 0x5D03_F000, 0x5F78_7E1E, 0x61E7_CD4A, 0x6300_0131, 0x6500_02B2,
    0x6700_0080, 0x6900_0000, 0x6B00_0000, 0x6D00_0000, 0x6F25_3B10, 0x7F00_0100, 0x8F00_0100,
    0x9F00_0100, 0xAB00_0000, 0xAD00_0000, 0xB700_0000, REGISTER_LIST_END,
];

/// Built-in modes
pub static DEFAULT_MODES: [ModeDescriptor; 2] = [
    ModeDescriptor {
        specifier: Cow::Borrowed("landscape"),
        name: Cow::Borrowed("landscape using 460MHz of bandwidth"),
        num_antennas: 2,
        register_list: Cow::Borrowed(&REGS_LANDSCAPE_460MHZ),
        segment: SegmentConfig {
            num_samples_per_chirp: 128,
            num_chirps_per_frame: 64,
            bandwidth_hz: 460e6,
            center_frequency_hz: 61.25e9,
            orientation: Orientation::Landscape,
        },
    },
    ModeDescriptor {
        specifier: Cow::Borrowed("landscape-1ghz"),
        name: Cow::Borrowed("landscape using 1GHz of bandwidth"),
        num_antennas: 2,
        register_list: Cow::Borrowed(&REGS_LANDSCAPE_1GHZ),
        segment: SegmentConfig {
            num_samples_per_chirp: 128,
            num_chirps_per_frame: 64,
            bandwidth_hz: 1e9,
            center_frequency_hz: 61e9,
            orientation: Orientation::Landscape,
        },
    },
];

/// Looks up a built-in mode by its specifier
///
/// Returns `None` for unknown names, there is no fallback mode.
pub fn find_mode(name: &str) -> Option<&'static ModeDescriptor> {
    DEFAULT_MODES.iter().find(|mode| mode.specifier == name)
}

/// A set of modes to select from
///
/// Defaults to the built-in modes. With the `serde` feature enabled, a table
/// (de)serializes as a plain list of descriptors.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct ModeTable {
    modes: Cow<'static, [ModeDescriptor]>,
}

impl ModeTable {
    /// A table of caller supplied modes
    pub fn new(modes: Vec<ModeDescriptor>) -> Self {
        ModeTable {
            modes: Cow::Owned(modes),
        }
    }

    /// The built-in table
    pub fn builtin() -> Self {
        ModeTable {
            modes: Cow::Borrowed(&DEFAULT_MODES),
        }
    }

    /// Looks up a mode by its specifier
    pub fn find(&self, name: &str) -> Option<&ModeDescriptor> {
        self.modes.iter().find(|mode| mode.specifier == name)
    }

    /// All modes, in table order
    pub fn modes(&self) -> &[ModeDescriptor] {
        &self.modes
    }
}

impl Default for ModeTable {
    fn default() -> Self {
        Self::builtin()
    }
}
