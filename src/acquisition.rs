//! Mode selection and session lifecycle on top of a [`Platform`]
//!
//! ```no_run
//! # #[cfg(feature = "rpi")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use bgt60_direct::{
//!     acquisition::Acquisition,
//!     platform::rpi::{RpiConfig, RpiPlatform},
//! };
//!
//! let mut acquisition = Acquisition::new(RpiPlatform::new(RpiConfig::default()));
//! acquisition.start("landscape")?;
//! while let Some(cube) = acquisition.fetch_frame()? {
//!     println!("{:?}", cube.dim());
//! }
//! acquisition.stop()?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "rpi"))]
//! # fn main() {}
//! ```

use ndarray::Array3;
use num_traits::Float;

use crate::{
    configs::{ModeDescriptor, ModeTable},
    frame::FrameGeometry,
    platform::{Platform, StdDelay, Transport},
    session::{FrameInfo, Session, SessionConfig, SessionError, SessionStatus},
    BGT60,
};

type PlatformSession<P> =
    Session<<P as Platform>::Spi, <P as Platform>::Reset, <P as Platform>::DataReady>;

type Error<P> = SessionError<<P as Platform>::Spi>;

/// Runs one session at a time on a platform
pub struct Acquisition<P>
where
    P: Platform,
{
    platform: P,
    modes: ModeTable,
    config: SessionConfig,
    mode: Option<ModeDescriptor>,
    session: Option<PlatformSession<P>>,
}

impl<P> Acquisition<P>
where
    P: Platform,
{
    /// Acquisition with the built-in modes
    pub fn new(platform: P) -> Self {
        Self::with_modes(platform, ModeTable::builtin())
    }

    /// Acquisition selecting modes from `modes`
    pub fn with_modes(platform: P, modes: ModeTable) -> Self {
        Acquisition {
            platform,
            modes,
            config: SessionConfig::default(),
            mode: None,
            session: None,
        }
    }

    /// Enables the test pattern check for sessions started from now on
    pub fn set_self_test(&mut self, enabled: bool) {
        if self.session.is_some() {
            log::warn!("Self-test setting applies from the next start");
        }
        self.config.self_test = enabled;
    }

    /// Replaces the session settings for sessions started from now on
    pub fn set_session_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    /// Opens the transport, programs `mode_name` and starts acquiring
    pub fn start(&mut self, mode_name: &str) -> Result<(), Error<P>> {
        if self.session.is_some() {
            log::error!("Acquisition already started");
            return Err(SessionError::AlreadyStarted);
        }

        let mode = self
            .modes
            .find(mode_name)
            .cloned()
            .ok_or_else(|| SessionError::UnknownMode(mode_name.into()))?;

        let Transport {
            spi,
            reset,
            data_ready,
        } = self
            .platform
            .open()
            .map_err(|error| SessionError::Platform(Box::new(error)))?;

        let driver = BGT60::new(spi, reset).init(&mode, &mut StdDelay)?;
        let session = Session::start(
            driver,
            data_ready,
            FrameGeometry::from_mode(&mode),
            self.config.clone(),
        )?;

        log::info!("Started acquisition in mode {:?} ({})", mode.specifier, mode.name);
        self.mode = Some(mode);
        self.session = Some(session);

        Ok(())
    }

    /// Stops the running session and releases the transport
    ///
    /// Does nothing if no session is running.
    pub fn stop(&mut self) -> Result<(), Error<P>> {
        let Some(session) = self.session.take() else {
            log::debug!("Stop requested without a running session");
            return Ok(());
        };

        let (driver, _data_ready) = session.stop()?;
        drop(driver.free());

        Ok(())
    }

    /// Waits for the next frame of the running session
    ///
    /// Returns `Ok(None)` at the end of the stream.
    pub fn fetch_frame(&mut self) -> Result<Option<Array3<f32>>, Error<P>> {
        self.session
            .as_mut()
            .ok_or(SessionError::NotStarted)?
            .fetch_frame()
    }

    /// Waits for the next frame and normalizes it into `cube`
    pub fn fetch_frame_into<F>(&mut self, cube: &mut Array3<F>) -> Result<Option<FrameInfo>, Error<P>>
    where
        F: Float + From<u16>,
    {
        self.session
            .as_mut()
            .ok_or(SessionError::NotStarted)?
            .fetch_frame_into(cube)
    }

    /// Status of the running session
    pub fn status(&self) -> Option<SessionStatus> {
        self.session.as_ref().map(Session::status)
    }

    /// Mode of the running or most recent session
    pub fn mode(&self) -> Option<&ModeDescriptor> {
        self.mode.as_ref()
    }

    /// Modes this acquisition selects from
    pub fn modes(&self) -> &ModeTable {
        &self.modes
    }

    /// Whether a session is running
    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }
}
