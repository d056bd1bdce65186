use crate::{Configured, Stopped, BGT60};

impl<SPI, RST> BGT60<SPI, RST, Stopped> {
    /// Returns to the configured state without reprogramming
    ///
    /// An FSM reset leaves the register configuration intact, so frames can
    /// be started again with the same slice size.
    pub fn into_configured(self) -> BGT60<SPI, RST, Configured> {
        self.into_state(Configured)
    }
}
