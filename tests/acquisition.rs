mod common;

use std::{thread, time::Duration};

use ndarray::Array3;

use bgt60_direct::{
    frame::{FrameGeometry, ShapeError},
    hl::BGT60TR13C_CHIP_ID,
    platform::{Readiness, StdDelay},
    Acquisition, Error, ModeTable, Session, SessionConfig, SessionError, BGT60,
};

use common::{FakeChip, FakePlatform, FakeResetPin, Gate, MAIN, SFCTL, SMALL_SLICES_PER_FRAME};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn acquisition(chip: &FakeChip, frames: usize) -> Acquisition<FakePlatform> {
    init_logger();

    let platform = FakePlatform::new(chip.clone(), frames * SMALL_SLICES_PER_FRAME);
    Acquisition::with_modes(platform, ModeTable::new(vec![common::small_mode()]))
}

fn session(chip: &FakeChip, gate: Gate) -> Session<FakeChip, FakeResetPin, Gate> {
    init_logger();

    let mode = common::small_mode();
    let driver = BGT60::new(chip.clone(), FakeResetPin)
        .init(&mode, &mut StdDelay)
        .unwrap();
    Session::start(
        driver,
        gate,
        FrameGeometry::from_mode(&mode),
        SessionConfig::default(),
    )
    .unwrap()
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("condition not reached in time");
}

fn wait_for_end_of_stream(acquisition: &Acquisition<FakePlatform>) {
    wait_until(|| acquisition.status().map_or(false, |status| status.end_of_stream));
}

#[test]
fn test_zero_samples_normalize_to_zero() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut acquisition = acquisition(&chip, 3);

    acquisition.start("small").unwrap();
    assert!(chip.frames_running());

    for _ in 0..3 {
        let cube = acquisition.fetch_frame().unwrap().unwrap();
        assert_eq!(cube.dim(), (3, 2, 4));
        assert!(cube.iter().all(|&value| value == 0.0));
    }
    assert!(acquisition.fetch_frame().unwrap().is_none());

    acquisition.stop().unwrap();
    assert!(!chip.frames_running());
}

#[test]
fn test_full_scale_normalizes_to_one() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    chip.state().adc_value = 0x0FFF;
    let mut acquisition = acquisition(&chip, 2);

    acquisition.start("small").unwrap();

    let mut cube = Array3::<f64>::zeros((3, 2, 4));
    for frame_index in 0..2 {
        let info = acquisition.fetch_frame_into(&mut cube).unwrap().unwrap();
        assert_eq!(info.frame_index, frame_index);
        assert_eq!(info.missed_slices, 0);
        assert!(!info.fifo_error);
        assert!(cube.iter().all(|&value| value == 1.0));
    }
}

#[test]
fn test_programs_mode_registers() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut acquisition = acquisition(&chip, 0);

    acquisition.start("small").unwrap();
    assert_eq!(acquisition.mode().unwrap().specifier, "small");

    let state = chip.state();
    // Programming stops at the end marker
    assert!(state.writes.contains(&(SFCTL, 0x10_0005)));
    assert!(!state.writes.contains(&(SFCTL, 0x10_0FFF)));
    assert!(state.writes.contains(&(MAIN, 0x1E_8270)));
}

#[test]
fn test_self_test_passes() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut acquisition = acquisition(&chip, 3);

    acquisition.set_self_test(true);
    acquisition.start("small").unwrap();
    assert_ne!(chip.state().registers[SFCTL as usize] & (1 << 17), 0);

    // The pattern carries on from one frame to the next
    for _ in 0..3 {
        let cube = acquisition.fetch_frame().unwrap().unwrap();
        assert!(cube.iter().all(|&value| value == 0.0));
    }
    assert!(acquisition.fetch_frame().unwrap().is_none());
}

#[test]
fn test_self_test_detects_missing_slice() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut platform = FakePlatform::new(chip.clone(), 4);
    platform.timeouts = vec![1];
    let mut acquisition =
        Acquisition::with_modes(platform, ModeTable::new(vec![common::small_mode()]));

    acquisition.set_self_test(true);
    acquisition.start("small").unwrap();

    match acquisition.fetch_frame() {
        Err(SessionError::IntegrityMismatch { index, actual, .. }) => {
            assert_eq!(index, 12);
            assert_eq!(actual, 0);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_integrity_mismatch_spares_next_frame() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    chip.state().flipped_samples = vec![0];
    let mut acquisition = acquisition(&chip, 2);

    acquisition.set_self_test(true);
    acquisition.start("small").unwrap();

    match acquisition.fetch_frame() {
        Err(SessionError::IntegrityMismatch {
            index,
            expected,
            actual,
        }) => {
            assert_eq!(index, 0);
            assert_eq!(expected, 0x001);
            assert_eq!(actual, 0x101);
        }
        other => panic!("unexpected result: {:?}", other),
    }

    // The pattern is still in step with the chip
    let cube = acquisition.fetch_frame().unwrap().unwrap();
    assert!(cube.iter().all(|&value| value == 0.0));
    assert!(acquisition.fetch_frame().unwrap().is_none());
}

#[test]
fn test_wrong_cube_shape_keeps_frame() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut acquisition = acquisition(&chip, 1);

    acquisition.start("small").unwrap();
    wait_for_end_of_stream(&acquisition);

    let mut cube = Array3::<f32>::zeros((1, 1, 1));
    match acquisition.fetch_frame_into(&mut cube) {
        Err(SessionError::Shape(ShapeError::Cube { expected, found })) => {
            assert_eq!(expected, (3, 2, 4));
            assert_eq!(found, (1, 1, 1));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(acquisition.status().unwrap().fill, 1);

    let mut cube = Array3::<f32>::zeros((3, 2, 4));
    let info = acquisition.fetch_frame_into(&mut cube).unwrap().unwrap();
    assert_eq!(info.frame_index, 0);
    assert!(acquisition.fetch_frame_into(&mut cube).unwrap().is_none());
}

#[test]
fn test_missed_slice_is_zeroed() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    chip.state().adc_value = 0x0FFF;
    let mut platform = FakePlatform::new(chip.clone(), 4);
    platform.timeouts = vec![0];
    let mut acquisition =
        Acquisition::with_modes(platform, ModeTable::new(vec![common::small_mode()]));

    acquisition.start("small").unwrap();

    let mut cube = Array3::<f32>::zeros((3, 2, 4));
    let info = acquisition.fetch_frame_into(&mut cube).unwrap().unwrap();
    assert_eq!(info.missed_slices, 1);
    assert!(!info.fifo_error);

    // The first slice holds the first chirp of every antenna
    for antenna in 0..3 {
        for sample in 0..4 {
            assert_eq!(cube[[antenna, 0, sample]], 0.0);
            assert_eq!(cube[[antenna, 1, sample]], 1.0);
        }
    }

    let info = acquisition.fetch_frame_into(&mut cube).unwrap().unwrap();
    assert_eq!(info.missed_slices, 0);
    assert!(cube.iter().all(|&value| value == 1.0));

    let status = acquisition.status().unwrap();
    assert_eq!(status.missed_slices, 1);
    assert!(!status.fifo_error);
}

#[test]
fn test_fifo_error_is_flagged() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    chip.state().adc_value = 0x0800;
    chip.state().error_bursts = vec![1];
    let mut acquisition = acquisition(&chip, 2);

    acquisition.start("small").unwrap();

    let mut cube = Array3::<f32>::zeros((3, 2, 4));
    let info = acquisition.fetch_frame_into(&mut cube).unwrap().unwrap();
    assert!(info.fifo_error);
    assert_eq!(info.missed_slices, 0);
    // The slice is still used
    assert!(cube.iter().all(|&value| value == 2048.0 / 4095.0));

    let info = acquisition.fetch_frame_into(&mut cube).unwrap().unwrap();
    assert!(!info.fifo_error);

    let status = acquisition.status().unwrap();
    assert!(status.fifo_error);
    assert_eq!(status.fifo_errors, 1);
}

#[test]
fn test_overflow_drops_newest_frame() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut acquisition = acquisition(&chip, 6);

    acquisition.start("small").unwrap();
    wait_for_end_of_stream(&acquisition);

    let status = acquisition.status().unwrap();
    assert!(status.started);
    assert!(status.buffer_overflow);
    assert_eq!(status.frames, 5);
    assert_eq!(status.overflows, 1);
    assert_eq!(status.fill, 5);

    let mut cube = Array3::<f32>::zeros((3, 2, 4));
    for frame_index in 0..5 {
        let info = acquisition.fetch_frame_into(&mut cube).unwrap().unwrap();
        assert_eq!(info.frame_index, frame_index);
    }
    assert!(acquisition.fetch_frame_into(&mut cube).unwrap().is_none());
    assert_eq!(acquisition.status().unwrap().fill, 0);
}

#[test]
fn test_full_ring_is_not_an_overflow() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut acquisition = acquisition(&chip, 5);

    acquisition.start("small").unwrap();
    wait_for_end_of_stream(&acquisition);

    let status = acquisition.status().unwrap();
    assert!(!status.buffer_overflow);
    assert_eq!(status.frames, 5);
    assert_eq!(status.overflows, 0);
    assert_eq!(status.fill, 5);

    let mut cube = Array3::<f32>::zeros((3, 2, 4));
    for frame_index in 0..5 {
        let info = acquisition.fetch_frame_into(&mut cube).unwrap().unwrap();
        assert_eq!(info.frame_index, frame_index);
    }
    assert!(acquisition.fetch_frame_into(&mut cube).unwrap().is_none());
}

#[test]
fn test_ring_capacity_is_configurable() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut acquisition = acquisition(&chip, 4);

    acquisition.set_session_config(SessionConfig {
        ring_capacity: 2,
        ..Default::default()
    });
    acquisition.start("small").unwrap();
    wait_for_end_of_stream(&acquisition);

    let status = acquisition.status().unwrap();
    assert_eq!(status.frames, 2);
    assert_eq!(status.overflows, 2);
}

#[test]
fn test_end_of_stream() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut acquisition = acquisition(&chip, 0);

    acquisition.start("small").unwrap();

    assert!(acquisition.fetch_frame().unwrap().is_none());
    assert!(acquisition.status().unwrap().end_of_stream);
}

#[test]
fn test_stop_and_restart() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut acquisition = acquisition(&chip, 1);

    acquisition.start("small").unwrap();
    assert!(acquisition.fetch_frame().unwrap().is_some());
    acquisition.stop().unwrap();

    assert!(!acquisition.is_started());
    assert!(acquisition.status().is_none());
    assert!(!chip.frames_running());

    // Stopping twice is harmless
    acquisition.stop().unwrap();

    acquisition.start("small").unwrap();
    assert!(chip.frames_running());
    assert!(acquisition.fetch_frame().unwrap().is_some());
}

#[test]
fn test_fetch_without_start() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut acquisition = acquisition(&chip, 1);

    assert!(matches!(
        acquisition.fetch_frame(),
        Err(SessionError::NotStarted)
    ));
}

#[test]
fn test_start_twice() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut acquisition = acquisition(&chip, 1);

    acquisition.start("small").unwrap();
    assert!(matches!(
        acquisition.start("small"),
        Err(SessionError::AlreadyStarted)
    ));
    assert!(acquisition.is_started());
}

#[test]
fn test_unknown_mode() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut acquisition = acquisition(&chip, 1);

    match acquisition.start("portrait") {
        Err(SessionError::UnknownMode(name)) => assert_eq!(name, "portrait"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!acquisition.is_started());
    // Nothing was sent to the chip
    assert!(chip.state().writes.is_empty());
}

#[test]
fn test_wrong_chip() {
    let chip = FakeChip::new(0x00_0404, 3);
    let mut acquisition = acquisition(&chip, 1);

    assert!(matches!(
        acquisition.start("small"),
        Err(SessionError::Driver(Error::ChipId { found: 0x404 }))
    ));
    assert!(!acquisition.is_started());
    assert!(!chip.frames_running());
}

#[test]
fn test_platform_unavailable() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut platform = FakePlatform::new(chip, 1);
    platform.unavailable = true;
    let mut acquisition =
        Acquisition::with_modes(platform, ModeTable::new(vec![common::small_mode()]));

    match acquisition.start("small") {
        Err(error @ SessionError::Platform(_)) => {
            assert_eq!(
                error.to_string(),
                "failed to open the transport: no such device"
            );
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_geometry_must_split_into_slices() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let mut mode = common::small_mode();
    mode.segment.num_samples_per_chirp = 5;
    mode.segment.num_chirps_per_frame = 1;
    let mut acquisition =
        Acquisition::with_modes(FakePlatform::new(chip.clone(), 2), ModeTable::new(vec![mode]));

    assert!(matches!(
        acquisition.start("small"),
        Err(SessionError::Geometry(_))
    ));
    assert!(!chip.frames_running());
}

#[test]
fn test_try_fetch_frame() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    chip.state().adc_value = 0x0FFF;
    let (ready, gate) = common::gate();
    let mut session = session(&chip, gate);
    // Declared after the session so the line closes before the session joins
    let ready = ready;

    assert!(matches!(
        session.try_fetch_frame(),
        Err(nb::Error::WouldBlock)
    ));

    for _ in 0..SMALL_SLICES_PER_FRAME {
        ready.send(Readiness::Ready).unwrap();
    }
    wait_until(|| session.status().frames == 1);

    let cube = session.try_fetch_frame().unwrap().unwrap();
    assert_eq!(cube.dim(), (3, 2, 4));
    assert!(cube.iter().all(|&value| value == 1.0));

    // Running with an empty ring
    assert!(matches!(
        session.try_fetch_frame(),
        Err(nb::Error::WouldBlock)
    ));
    assert!(!session.status().end_of_stream);

    drop(ready);
    wait_until(|| session.status().end_of_stream);
    assert!(matches!(session.try_fetch_frame(), Ok(None)));
}

#[test]
fn test_try_fetch_frame_drains_ring_after_end() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let (ready, gate) = common::gate();
    let mut session = session(&chip, gate);
    let ready = ready;

    for _ in 0..SMALL_SLICES_PER_FRAME {
        ready.send(Readiness::Ready).unwrap();
    }
    drop(ready);
    wait_until(|| session.status().end_of_stream);
    assert_eq!(session.status().frames, 1);

    assert!(session.try_fetch_frame().unwrap().is_some());
    assert!(matches!(session.try_fetch_frame(), Ok(None)));
}

#[test]
fn test_stop_hands_back_driver() {
    let chip = FakeChip::new(BGT60TR13C_CHIP_ID, 3);
    let (ready, gate) = common::gate();
    let session = session(&chip, gate);
    drop(ready);

    let (driver, _gate) = session.stop().unwrap();
    assert!(!chip.frames_running());
    drop(driver);
}
