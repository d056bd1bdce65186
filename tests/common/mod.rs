//! A simulated BGT60TR13C for running sessions without hardware

#![allow(dead_code)]

use std::{
    borrow::Cow,
    convert::Infallible,
    io,
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc, Mutex, MutexGuard,
    },
};

use embedded_hal::{
    digital::{self, OutputPin},
    spi::{self, ErrorKind, Operation, SpiDevice},
};

use bgt60_direct::{
    configs::{ModeDescriptor, SegmentConfig, REGISTER_LIST_END},
    ll::{self, BURST_HEADER_LEN},
    platform::{DataReady, Platform, Readiness, Transport},
    unpack::pack_raw12,
    TestPattern,
};

pub const MAIN: u8 = 0x00;
pub const CHIP_ID: u8 = 0x02;
pub const SFCTL: u8 = 0x06;

const FRAME_START: u32 = 1 << 0;
const SELF_CLEARING: u32 = 0b1110;
const LFSR_EN: u32 = 1 << 17;
const GSR0_FOU_ERR: u8 = 0x08;

/// Register file and FIFO generator of the simulated chip
#[derive(Debug)]
pub struct ChipState {
    pub registers: [u32; 128],
    /// Register writes in the order they arrived
    pub writes: Vec<(u8, u32)>,
    /// Number of FIFO bursts served
    pub bursts: usize,
    /// Bursts, by number, whose GSR0 reports a FIFO error
    pub error_bursts: Vec<usize>,
    /// ADC value of every sample while the test pattern is off
    pub adc_value: u16,
    /// Samples, counted from power-up, that get bit 8 flipped on the wire
    pub flipped_samples: Vec<usize>,
    num_antennas: usize,
    sample: usize,
    pattern: TestPattern,
}

/// SPI device backed by a [`ChipState`]
///
/// Clones share the chip, so a test can keep one to inspect it while the
/// driver owns another.
#[derive(Clone, Debug)]
pub struct FakeChip {
    state: Arc<Mutex<ChipState>>,
}

impl FakeChip {
    pub fn new(chip_id: u32, num_antennas: usize) -> Self {
        let mut registers = [0; 128];
        registers[CHIP_ID as usize] = chip_id;

        FakeChip {
            state: Arc::new(Mutex::new(ChipState {
                registers,
                writes: Vec::new(),
                bursts: 0,
                error_bursts: Vec::new(),
                adc_value: 0,
                flipped_samples: Vec::new(),
                num_antennas,
                sample: 0,
                pattern: TestPattern::new(),
            })),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap()
    }

    pub fn frames_running(&self) -> bool {
        self.state().registers[MAIN as usize] & FRAME_START != 0
    }
}

impl ChipState {
    fn exchange(&mut self, buffer: &mut [u8]) {
        if buffer.len() > BURST_HEADER_LEN && buffer[0] == 0xFF {
            self.burst(buffer);
            return;
        }

        let mut word = [0; 4];
        word.copy_from_slice(&buffer[..4]);
        let command = u32::from_be_bytes(word);
        let address = (command >> ll::SPI_REGADR_POS) as u8;

        let value = if command & ll::SPI_WR_OP_MSK != 0 {
            let value = command & ll::SPI_DATA_MSK;
            self.write(address, value);
            0
        } else {
            self.registers[address as usize]
        };

        buffer[0] = 0;
        buffer[1..4].copy_from_slice(&value.to_be_bytes()[1..]);
    }

    fn write(&mut self, address: u8, value: u32) {
        self.writes.push((address, value));
        match address {
            CHIP_ID => {}
            MAIN => {
                if value & SELF_CLEARING != 0 {
                    self.registers[MAIN as usize] = value & !(SELF_CLEARING | FRAME_START);
                } else {
                    self.registers[MAIN as usize] = value;
                }
            }
            _ => self.registers[address as usize] = value,
        }
    }

    fn burst(&mut self, buffer: &mut [u8]) {
        let payload_len = buffer.len() - BURST_HEADER_LEN;
        let lfsr = self.registers[SFCTL as usize] & LFSR_EN != 0;

        let samples: Vec<u16> = (0..payload_len / 3 * 2)
            .map(|_| {
                let sample = self.sample;
                self.sample += 1;
                let value = match (lfsr, sample % self.num_antennas) {
                    (true, 0) => self.pattern.next_word(),
                    (true, _) => 0,
                    (false, _) => self.adc_value,
                };
                if self.flipped_samples.contains(&sample) {
                    value ^ 0x0100
                } else {
                    value
                }
            })
            .collect();

        let gsr0 = if self.error_bursts.contains(&self.bursts) {
            GSR0_FOU_ERR
        } else {
            0
        };
        self.bursts += 1;

        buffer[..BURST_HEADER_LEN].copy_from_slice(&[gsr0, 0, 0, 0]);
        pack_raw12(&samples, &mut buffer[BURST_HEADER_LEN..]);
    }
}

impl spi::ErrorType for FakeChip {
    type Error = ErrorKind;
}

impl SpiDevice<u8> for FakeChip {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
        let mut state = self.state();
        for operation in operations {
            match operation {
                Operation::TransferInPlace(buffer) => state.exchange(buffer),
                _ => return Err(ErrorKind::Other),
            }
        }

        Ok(())
    }
}

/// Reset line that goes nowhere
#[derive(Debug, Default)]
pub struct FakeResetPin;

impl digital::ErrorType for FakeResetPin {
    type Error = Infallible;
}

impl OutputPin for FakeResetPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Data-ready line that fires a fixed number of times, then closes
#[derive(Debug)]
pub struct Edges {
    remaining: usize,
    timeouts: Vec<usize>,
    seen: usize,
}

impl Edges {
    pub fn new(count: usize) -> Self {
        Edges {
            remaining: count,
            timeouts: Vec::new(),
            seen: 0,
        }
    }

    /// Times out instead of firing on the given edges
    pub fn with_timeouts(mut self, timeouts: &[usize]) -> Self {
        self.timeouts = timeouts.to_vec();
        self
    }
}

impl DataReady for Edges {
    type Error = Infallible;

    fn wait_for_rising_edge(&mut self) -> Result<Readiness, Infallible> {
        if self.remaining == 0 {
            return Ok(Readiness::Closed);
        }
        self.remaining -= 1;

        let edge = self.seen;
        self.seen += 1;
        if self.timeouts.contains(&edge) {
            return Ok(Readiness::TimedOut);
        }

        Ok(Readiness::Ready)
    }
}

/// Data-ready line driven by hand through the paired [`Sender`]
///
/// Dropping the sender closes the line.
#[derive(Debug)]
pub struct Gate(Receiver<Readiness>);

pub fn gate() -> (Sender<Readiness>, Gate) {
    let (sender, receiver) = mpsc::channel();
    (sender, Gate(receiver))
}

impl DataReady for Gate {
    type Error = Infallible;

    fn wait_for_rising_edge(&mut self) -> Result<Readiness, Infallible> {
        Ok(self.0.recv().unwrap_or(Readiness::Closed))
    }
}

/// Platform handing out a [`FakeChip`]
#[derive(Debug)]
pub struct FakePlatform {
    pub chip: FakeChip,
    pub edges: usize,
    pub timeouts: Vec<usize>,
    pub unavailable: bool,
}

impl FakePlatform {
    pub fn new(chip: FakeChip, edges: usize) -> Self {
        FakePlatform {
            chip,
            edges,
            timeouts: Vec::new(),
            unavailable: false,
        }
    }
}

impl Platform for FakePlatform {
    type Spi = FakeChip;
    type Reset = FakeResetPin;
    type DataReady = Edges;
    type Error = io::Error;

    fn open(&mut self) -> Result<Transport<FakeChip, FakeResetPin, Edges>, io::Error> {
        if self.unavailable {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such device"));
        }

        Ok(Transport {
            spi: self.chip.clone(),
            reset: FakeResetPin,
            data_ready: Edges::new(self.edges).with_timeouts(&self.timeouts),
        })
    }
}

/// Three antennas, two chirps of four samples, read in two slices of six
/// FIFO words
pub fn small_mode() -> ModeDescriptor {
    ModeDescriptor {
        specifier: Cow::Borrowed("small"),
        name: Cow::Borrowed("three antennas, two short chirps"),
        num_antennas: 3,
        register_list: Cow::Owned(vec![
            0x011E_8270,
            0x0D10_0005,
            REGISTER_LIST_END,
            0x0D10_0FFF,
        ]),
        segment: SegmentConfig {
            num_samples_per_chirp: 4,
            num_chirps_per_frame: 2,
            bandwidth_hz: 460e6,
            center_frequency_hz: 61.25e9,
            ..Default::default()
        },
    }
}

pub const SMALL_SLICES_PER_FRAME: usize = 2;
