//! Plaintext recording of normalized frames
//!
//! One value per line with six decimals, antenna by antenna and chirp by
//! chirp, with an empty line after every chirp. The format is meant for quick
//! inspection and for loading into numeric tools, it carries no header.

use std::{
    fmt::Display,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use ndarray::Array3;

/// Writes frames to a text sink
#[derive(Debug)]
pub struct PlaintextRecorder<W: Write> {
    writer: W,
    frames: u64,
}

impl PlaintextRecorder<BufWriter<File>> {
    /// Records into a new file at `path`, truncating an existing one
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path.as_ref())?;
        log::info!("Recording to {}", path.as_ref().display());

        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> PlaintextRecorder<W> {
    /// Records into `writer`
    pub fn new(writer: W) -> Self {
        PlaintextRecorder { writer, frames: 0 }
    }

    /// Appends one frame
    pub fn record<F: Display>(&mut self, cube: &Array3<F>) -> io::Result<()> {
        for antenna in cube.outer_iter() {
            for chirp in antenna.outer_iter() {
                for value in chirp.iter() {
                    writeln!(self.writer, "{:.6}", value)?;
                }
                writeln!(self.writer)?;
            }
        }
        self.frames += 1;

        Ok(())
    }

    /// Number of frames recorded so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Flushes and returns the sink
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;

        Ok(self.writer)
    }
}
