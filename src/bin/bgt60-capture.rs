//! Captures frames from a BGT60TR13C wired to a Raspberry Pi
//!
//! ```text
//! RUST_LOG=info bgt60-capture --mode landscape --file frames.txt --frame-limit 100
//! ```

use std::{
    path::PathBuf,
    process,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};

use bgt60_direct::{
    platform::rpi::{RpiConfig, RpiPlatform},
    record::PlaintextRecorder,
    Acquisition,
};

#[derive(Parser, Debug)]
#[command(name = "bgt60-capture")]
#[command(about = "Capture raw BGT60TR13C frames over SPI")]
struct Args {
    /// Acquisition mode
    #[arg(short, long, default_value = "landscape")]
    mode: String,
    /// Enable the test pattern and check every frame
    #[arg(long)]
    data_integrity_test: bool,
    /// Stop after this many frames, 0 runs until interrupted
    #[arg(long, default_value_t = 0)]
    frame_limit: u64,
    /// Record normalized frames to this file
    #[arg(short, long)]
    file: Option<PathBuf>,
    /// SPI bus number
    #[arg(long, default_value_t = 0)]
    spi_bus: u8,
    /// SPI chip select
    #[arg(long, default_value_t = 0)]
    spi_cs: u8,
    /// SPI clock in Hz
    #[arg(long, default_value_t = 40_000_000)]
    spi_speed: u32,
    /// BCM number of the reset pin
    #[arg(long, default_value_t = 12)]
    rst_pin: u8,
    /// BCM number of the data-ready pin
    #[arg(long, default_value_t = 25)]
    irq_pin: u8,
    /// Data-ready timeout in milliseconds, 0 waits forever
    #[arg(long, default_value_t = 1000)]
    irq_timeout_ms: u64,
    /// List the available modes and exit
    #[arg(long)]
    list_modes: bool,
}

fn rpi_config(args: &Args) -> Result<RpiConfig> {
    use rppal::spi::{Bus, SlaveSelect};

    let bus = match args.spi_bus {
        0 => Bus::Spi0,
        1 => Bus::Spi1,
        2 => Bus::Spi2,
        n => bail!("unsupported SPI bus {}", n),
    };
    let slave_select = match args.spi_cs {
        0 => SlaveSelect::Ss0,
        1 => SlaveSelect::Ss1,
        2 => SlaveSelect::Ss2,
        n => bail!("unsupported chip select {}", n),
    };

    Ok(RpiConfig {
        bus,
        slave_select,
        clock_speed: args.spi_speed,
        reset_pin: args.rst_pin,
        irq_pin: args.irq_pin,
        irq_timeout: match args.irq_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        },
    })
}

fn run(args: Args) -> Result<()> {
    let mut acquisition = Acquisition::new(RpiPlatform::new(rpi_config(&args)?));

    if args.list_modes {
        for mode in acquisition.modes().modes() {
            println!("{:<16} {}", mode.specifier, mode.name);
        }
        return Ok(());
    }

    let mut recorder = args
        .file
        .as_ref()
        .map(PlaintextRecorder::create)
        .transpose()
        .context("failed to create the output file")?;

    let abort = Arc::new(AtomicBool::new(false));
    {
        let abort = abort.clone();
        ctrlc::set_handler(move || abort.store(true, Ordering::SeqCst))
            .context("failed to install the Ctrl-C handler")?;
    }

    acquisition.set_self_test(args.data_integrity_test);
    acquisition
        .start(&args.mode)
        .with_context(|| format!("failed to start acquisition in mode {:?}", args.mode))?;

    let mut remaining = args.frame_limit;
    let result: Result<()> = loop {
        if abort.load(Ordering::SeqCst) {
            info!("Interrupted");
            break Ok(());
        }

        let cube = match acquisition.fetch_frame() {
            Ok(Some(cube)) => cube,
            Ok(None) => {
                info!("Data source has no more data");
                break Ok(());
            }
            Err(e) => {
                error!("Fetching a frame failed: {}", e);
                break Err(e.into());
            }
        };

        if let Some(recorder) = recorder.as_mut() {
            if let Err(e) = recorder.record(&cube) {
                error!("Recording data to file failed: {}", e);
                break Err(e.into());
            }
        }

        if remaining != 0 {
            remaining -= 1;
            if remaining == 0 {
                info!("Frame limit reached");
                break Ok(());
            }
        }
    };

    if let Some(status) = acquisition.status() {
        info!("{:?}", status);
        if status.buffer_overflow {
            warn!("{} frames were dropped on a full buffer", status.overflows);
        }
    }
    acquisition.stop()?;

    if let Some(recorder) = recorder {
        let frames = recorder.frames();
        recorder.finish()?;
        info!("Recorded {} frames", frames);
    }

    result
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("{:#}", e);
        process::exit(1);
    }
}
