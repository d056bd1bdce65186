//! Acquisition sessions
//!
//! A [`Session`] owns a streaming driver for as long as frames are being
//! acquired. The driver lives on a dedicated thread that waits for the
//! data-ready line, reads one slice per edge and assembles the slices into
//! frames. Complete frames go into a small ring buffer; when it is full the
//! frame is dropped and the overflow flag is raised, the acquisition thread
//! never blocks on the consumer.
//!
//! The consumer side pops frames with [`Session::fetch_frame`], which checks
//! the test pattern if self-test is enabled and normalizes the frame into an
//! `(antenna, chirp, sample)` cube.

use core::{fmt, mem};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use embedded_hal::spi::{self, SpiDevice};
use ndarray::Array3;
use num_traits::Float;

use crate::{
    frame::{normalize_into, FrameGeometry, GeometryError, RawFrame, ShapeError},
    hl,
    platform::{DataReady, Readiness},
    ring::{self, Consumer, Producer},
    slice::{payload, SliceCounter},
    test_pattern::TestPattern,
    unpack::unpack_raw12,
    Configured, Stopped, Streaming, BGT60,
};

/// Settings of a session
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Frames buffered between the acquisition thread and the consumer
    pub ring_capacity: usize,
    /// Replace ADC samples by the test pattern and check every frame
    pub self_test: bool,
    /// Sleep between two checks while waiting for a frame
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            ring_capacity: 5,
            self_test: false,
            poll_interval: Duration::from_micros(100),
        }
    }
}

/// Flags and counters of a running session
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionStatus {
    /// Frames are being acquired
    pub started: bool,
    /// At least one slice could not be read cleanly
    pub fifo_error: bool,
    /// At least one frame was dropped because the ring was full
    pub buffer_overflow: bool,
    /// The acquisition thread has finished, e.g. at the end of a replay
    pub end_of_stream: bool,
    /// Frames pushed into the ring
    pub frames: u64,
    /// Slices with a failed read or an error bit in GSR0
    pub fifo_errors: u64,
    /// Frames dropped on a full ring
    pub overflows: u64,
    /// Slices that were never read, their samples are zero
    pub missed_slices: u64,
    /// Frames waiting in the ring
    pub fill: usize,
}

/// Metadata of a fetched frame
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FrameInfo {
    /// Sequence number of the frame within the session
    pub frame_index: u64,
    /// Slices of the frame that are zero because they couldn't be read
    pub missed_slices: u32,
    /// A FIFO error was seen while the frame was assembled
    pub fifo_error: bool,
}

/// State shared between the consumer and the acquisition thread
#[derive(Debug, Default)]
struct Shared {
    started: AtomicBool,
    running: AtomicBool,
    fifo_error: AtomicBool,
    buffer_overflow: AtomicBool,
    frames: AtomicU64,
    fifo_errors: AtomicU64,
    overflows: AtomicU64,
    missed_slices: AtomicU64,
}

impl Shared {
    fn flag_fifo_error(&self) {
        self.fifo_error.store(true, Ordering::Release);
        self.fifo_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn count_missed_slice(&self) {
        self.missed_slices.fetch_add(1, Ordering::Relaxed);
    }
}

/// Clears the running flag when the acquisition thread exits, even by panic
struct RunningGuard(Arc<Shared>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

type Hardware<SPI, RST, IRQ> = (BGT60<SPI, RST, Streaming>, IRQ);

/// A running acquisition
pub struct Session<SPI, RST, IRQ>
where
    SPI: SpiDevice<u8>,
{
    shared: Arc<Shared>,
    consumer: Consumer<RawFrame>,
    geometry: FrameGeometry,
    config: SessionConfig,
    pattern: TestPattern,
    frame: RawFrame,
    thread: Option<JoinHandle<Hardware<SPI, RST, IRQ>>>,
}

impl<SPI, RST, IRQ> Session<SPI, RST, IRQ>
where
    SPI: SpiDevice<u8> + Send + 'static,
    RST: Send + 'static,
    IRQ: DataReady + Send + 'static,
{
    /// Starts frame generation and the acquisition thread
    ///
    /// The frame geometry has to split into whole slices of the size the
    /// driver was configured with.
    pub fn start(
        mut driver: BGT60<SPI, RST, Configured>,
        data_ready: IRQ,
        geometry: FrameGeometry,
        config: SessionConfig,
    ) -> Result<Self, SessionError<SPI>> {
        let slices_per_frame = geometry.slices_per_frame(driver.samples_per_slice())?;
        log::info!("Assuming {} slices per frame", slices_per_frame);

        driver.enable_self_test(config.self_test)?;

        let (producer, consumer) =
            ring::with_capacity(config.ring_capacity.max(1), || RawFrame::new(&geometry));
        let shared = Arc::new(Shared::default());
        shared.started.store(true, Ordering::Release);
        shared.running.store(true, Ordering::Release);

        let driver = driver.start_frames()?;
        let loop_state = AcquisitionLoop {
            driver,
            data_ready,
            producer,
            shared: shared.clone(),
            frame: RawFrame::new(&geometry),
            counter: SliceCounter::new(slices_per_frame as u32),
        };
        let thread = thread::Builder::new()
            .name("bgt60-acquisition".into())
            .spawn(move || loop_state.run())
            .map_err(|_| SessionError::AcquisitionThread)?;

        Ok(Session {
            shared,
            consumer,
            geometry,
            config,
            pattern: TestPattern::new(),
            frame: RawFrame::new(&geometry),
            thread: Some(thread),
        })
    }
}

impl<SPI, RST, IRQ> Session<SPI, RST, IRQ>
where
    SPI: SpiDevice<u8>,
{
    /// Waits for the next frame and returns it as a normalized cube
    ///
    /// Returns `Ok(None)` once the acquisition thread has ended and all
    /// frames it produced were fetched.
    pub fn fetch_frame(&mut self) -> Result<Option<Array3<f32>>, SessionError<SPI>> {
        let mut cube = Array3::zeros(self.geometry.shape());

        Ok(self.fetch_frame_into(&mut cube)?.map(|_| cube))
    }

    /// Waits for the next frame and normalizes it into `cube`
    ///
    /// `cube` must have the `(antenna, chirp, sample)` shape of the session,
    /// a mismatch is reported before any frame is taken from the ring. `cube`
    /// is left untouched if no frame is returned.
    pub fn fetch_frame_into<F>(
        &mut self,
        cube: &mut Array3<F>,
    ) -> Result<Option<FrameInfo>, SessionError<SPI>>
    where
        F: Float + From<u16>,
    {
        if !self.is_started() {
            log::error!("Trying to fetch a frame while acquisition is stopped");
            return Err(SessionError::NotStarted);
        }
        if cube.dim() != self.geometry.shape() {
            return Err(SessionError::Shape(ShapeError::Cube {
                expected: self.geometry.shape(),
                found: cube.dim(),
            }));
        }

        let shared = &self.shared;
        self.consumer.wait_fill_or(1, self.config.poll_interval, || {
            !shared.running.load(Ordering::Acquire)
        });

        if !self.pop() {
            return Ok(None);
        }

        self.finish(cube).map(Some)
    }

    /// Returns the next frame if one is waiting
    ///
    /// Never blocks. Yields `Ok(None)` at the end of the stream.
    pub fn try_fetch_frame(&mut self) -> nb::Result<Option<Array3<f32>>, SessionError<SPI>> {
        if !self.is_started() {
            return Err(nb::Error::Other(SessionError::NotStarted));
        }

        // Sample the thread state first, it may push a last frame in between
        let ended = !self.shared.running.load(Ordering::Acquire);
        if !self.pop() {
            return if ended {
                Ok(None)
            } else {
                Err(nb::Error::WouldBlock)
            };
        }

        let mut cube = Array3::zeros(self.geometry.shape());
        self.finish(&mut cube)?;

        Ok(Some(cube))
    }

    /// Flags and counters of the session
    pub fn status(&self) -> SessionStatus {
        let shared = &self.shared;

        SessionStatus {
            started: shared.started.load(Ordering::Acquire),
            fifo_error: shared.fifo_error.load(Ordering::Acquire),
            buffer_overflow: shared.buffer_overflow.load(Ordering::Acquire),
            end_of_stream: !shared.running.load(Ordering::Acquire),
            frames: shared.frames.load(Ordering::Relaxed),
            fifo_errors: shared.fifo_errors.load(Ordering::Relaxed),
            overflows: shared.overflows.load(Ordering::Relaxed),
            missed_slices: shared.missed_slices.load(Ordering::Relaxed),
            fill: self.consumer.fill(),
        }
    }

    /// Frame dimensions of the session
    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    /// Whether the session still accepts fetches
    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::Acquire)
    }

    /// Stops the acquisition thread and frame generation
    ///
    /// Takes effect before the next slice is read, so this can take up to
    /// one data-ready period. Frames still in the ring are dropped. Hands the
    /// driver back with frames stopped, along with the data-ready line.
    pub fn stop(mut self) -> Result<(BGT60<SPI, RST, Stopped>, IRQ), SessionError<SPI>> {
        let (driver, data_ready) = self.join()?;
        let driver = driver.stop_frames()?;
        log::info!("Acquisition stopped");

        Ok((driver, data_ready))
    }

    fn join(&mut self) -> Result<Hardware<SPI, RST, IRQ>, SessionError<SPI>> {
        self.shared.started.store(false, Ordering::Release);

        let thread = self.thread.take().ok_or(SessionError::AcquisitionThread)?;
        thread.join().map_err(|_| {
            log::error!("Acquisition thread panicked");
            SessionError::AcquisitionThread
        })
    }

    fn pop(&mut self) -> bool {
        let frame = &mut self.frame;
        self.consumer.try_pop(|slot| mem::swap(slot, frame))
    }

    fn finish<F>(&mut self, cube: &mut Array3<F>) -> Result<FrameInfo, SessionError<SPI>>
    where
        F: Float + From<u16>,
    {
        let frame = &mut self.frame;
        if !frame.is_complete() {
            log::warn!(
                "Frame {} is missing {} slices",
                frame.frame_index,
                frame.missed_slices
            );
        }

        if self.config.self_test {
            self.pattern
                .verify(&frame.samples, self.geometry.num_antennas)
                .map_err(|mismatch| {
                    log::error!(
                        "Mismatched test word at sample index {} (expected 0x{:04x}, got 0x{:04x})",
                        mismatch.index,
                        mismatch.expected,
                        mismatch.actual
                    );
                    SessionError::IntegrityMismatch {
                        index: mismatch.index,
                        expected: mismatch.expected,
                        actual: mismatch.actual,
                    }
                })?;

            // The pattern is not radar data
            frame.samples.fill(0);
        }

        normalize_into(&frame.samples, &self.geometry, cube)?;

        Ok(FrameInfo {
            frame_index: frame.frame_index,
            missed_slices: frame.missed_slices,
            fifo_error: frame.fifo_error,
        })
    }
}

impl<SPI, RST, IRQ> fmt::Debug for Session<SPI, RST, IRQ>
where
    SPI: SpiDevice<u8>,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Session")
            .field("geometry", &self.geometry)
            .field("config", &self.config)
            .field("status", &self.status())
            .finish()
    }
}

impl<SPI, RST, IRQ> Drop for Session<SPI, RST, IRQ>
where
    SPI: SpiDevice<u8>,
{
    fn drop(&mut self) {
        if self.thread.is_none() {
            return;
        }

        match self.join() {
            Ok((driver, _)) => {
                if let Err(error) = driver.stop_frames() {
                    log::warn!("Failed to stop frames: {:?}", error);
                }
            }
            Err(error) => log::warn!("Acquisition thread lost: {:?}", error),
        }
    }
}

/// State owned by the acquisition thread
struct AcquisitionLoop<SPI, RST, IRQ> {
    driver: BGT60<SPI, RST, Streaming>,
    data_ready: IRQ,
    producer: Producer<RawFrame>,
    shared: Arc<Shared>,
    frame: RawFrame,
    counter: SliceCounter,
}

/// How a slice ended up in the frame
enum SliceOutcome {
    Read { fifo_error: bool },
    Missed { fifo_error: bool },
    EndOfStream,
}

impl<SPI, RST, IRQ> AcquisitionLoop<SPI, RST, IRQ>
where
    SPI: SpiDevice<u8>,
    IRQ: DataReady,
{
    fn run(mut self) -> Hardware<SPI, RST, IRQ> {
        let _running = RunningGuard(self.shared.clone());
        let mut slice = vec![0u8; self.driver.slice_transfer_len()];
        let samples_per_slice = self.driver.samples_per_slice();
        let mut frame_index = 0u64;

        log::debug!("Acquisition thread started");

        'frames: while self.shared.started.load(Ordering::Acquire) {
            let mut frame = mem::take(&mut self.frame);
            frame.frame_index = frame_index;
            frame.missed_slices = 0;
            frame.fifo_error = false;

            for region in frame.samples.chunks_exact_mut(samples_per_slice) {
                if !self.shared.started.load(Ordering::Acquire) {
                    break 'frames;
                }

                match self.read_slice(&mut slice, region) {
                    SliceOutcome::Read { fifo_error } => frame.fifo_error |= fifo_error,
                    SliceOutcome::Missed { fifo_error } => {
                        region.fill(0);
                        frame.fifo_error |= fifo_error;
                        frame.missed_slices += 1;
                        self.shared.count_missed_slice();
                    }
                    SliceOutcome::EndOfStream => {
                        log::info!("Data-ready line closed, ending acquisition");
                        break 'frames;
                    }
                }
            }

            self.push(&mut frame);
            self.frame = frame;
            frame_index += 1;
        }

        log::debug!("Acquisition thread stopped");

        (self.driver, self.data_ready)
    }

    fn read_slice(&mut self, slice: &mut [u8], region: &mut [u16]) -> SliceOutcome {
        match self.data_ready.wait_for_rising_edge() {
            Ok(Readiness::Ready) => {}
            Ok(Readiness::TimedOut) => {
                log::warn!("Timed out waiting for data ready");
                return SliceOutcome::Missed { fifo_error: false };
            }
            Ok(Readiness::Closed) => return SliceOutcome::EndOfStream,
            Err(error) => {
                log::warn!("Waiting for data ready failed: {:?}", error);
                return SliceOutcome::Missed { fifo_error: false };
            }
        }

        match self.driver.read_fifo_slice(slice) {
            Ok(gsr0) => {
                if gsr0.has_error() {
                    log::warn!("GSR0 reports errors: {:?}", gsr0);
                    self.shared.flag_fifo_error();
                }
                if let Err(error) = self.counter.stamp(slice) {
                    log::warn!("Failed to stamp slice header: {:?}", error);
                }
                unpack_raw12(payload(slice), region);

                SliceOutcome::Read {
                    fifo_error: gsr0.has_error(),
                }
            }
            Err(error) => {
                log::error!("SPI FIFO error: {:?}", error);
                self.shared.flag_fifo_error();

                SliceOutcome::Missed { fifo_error: true }
            }
        }
    }

    fn push(&mut self, frame: &mut RawFrame) {
        if self.producer.try_push(|slot| mem::swap(slot, frame)) {
            self.shared.frames.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Frame buffer overflow (size: {} fill: {})",
                self.producer.capacity(),
                self.producer.fill()
            );
            self.shared.buffer_overflow.store(true, Ordering::Release);
            self.shared.overflows.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// An error that can occur while running an acquisition
pub enum SessionError<SPI>
where
    SPI: spi::ErrorType,
{
    /// The driver failed
    Driver(hl::Error<SPI>),
    /// The transport could not be opened
    Platform(Box<dyn std::error::Error + Send + Sync>),
    /// No mode with this specifier exists in the mode table
    UnknownMode(String),
    /// A session is already running
    AlreadyStarted,
    /// No session is running
    NotStarted,
    /// The frame can't be split into slices of the configured size
    Geometry(GeometryError),
    /// A frame or cube doesn't match the session geometry
    Shape(ShapeError),
    /// A sample didn't match the test pattern
    IntegrityMismatch {
        /// Position of the sample in the frame
        index: usize,
        /// Expected test word
        expected: u16,
        /// Received word
        actual: u16,
    },
    /// The acquisition thread could not be started or panicked
    AcquisitionThread,
}

impl<SPI> From<hl::Error<SPI>> for SessionError<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: hl::Error<SPI>) -> Self {
        SessionError::Driver(error)
    }
}

impl<SPI> From<GeometryError> for SessionError<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: GeometryError) -> Self {
        SessionError::Geometry(error)
    }
}

impl<SPI> From<ShapeError> for SessionError<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: ShapeError) -> Self {
        SessionError::Shape(error)
    }
}

// Can't be derived, `hl::Error` only implements `Debug` by hand.
impl<SPI> fmt::Debug for SessionError<SPI>
where
    SPI: spi::ErrorType,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionError::Driver(error) => write!(f, "Driver({:?})", error),
            SessionError::Platform(error) => write!(f, "Platform({:?})", error),
            SessionError::UnknownMode(name) => write!(f, "UnknownMode({:?})", name),
            SessionError::AlreadyStarted => write!(f, "AlreadyStarted"),
            SessionError::NotStarted => write!(f, "NotStarted"),
            SessionError::Geometry(error) => write!(f, "Geometry({:?})", error),
            SessionError::Shape(error) => write!(f, "Shape({:?})", error),
            SessionError::IntegrityMismatch {
                index,
                expected,
                actual,
            } => write!(
                f,
                "IntegrityMismatch {{ index: {}, expected: 0x{:04x}, actual: 0x{:04x} }}",
                index, expected, actual
            ),
            SessionError::AcquisitionThread => write!(f, "AcquisitionThread"),
        }
    }
}

impl<SPI> fmt::Display for SessionError<SPI>
where
    SPI: spi::ErrorType,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionError::Driver(error) => write!(f, "driver error: {}", error),
            SessionError::Platform(error) => write!(f, "failed to open the transport: {}", error),
            SessionError::UnknownMode(name) => write!(f, "unknown mode {:?}", name),
            SessionError::AlreadyStarted => write!(f, "acquisition already started"),
            SessionError::NotStarted => write!(f, "acquisition hasn't been started"),
            SessionError::Geometry(error) => write!(f, "{}", error),
            SessionError::Shape(error) => write!(f, "{}", error),
            SessionError::IntegrityMismatch { .. } => write!(f, "test pattern mismatch: {:?}", self),
            SessionError::AcquisitionThread => write!(f, "acquisition thread failed"),
        }
    }
}

impl<SPI> std::error::Error for SessionError<SPI> where SPI: spi::ErrorType {}
