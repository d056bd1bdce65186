//! State markers of the high-level driver

/// Indicates that the `BGT60` instance has not been reset yet
///
/// The chip may be in any state, including a half-finished configuration
/// from a previous session.
#[derive(Debug, Copy, Clone)]
pub struct Uninitialized;

/// Indicates that the `BGT60` instance went through a hardware and FSM reset
#[derive(Debug, Copy, Clone)]
pub struct Reset;

/// Indicates that the bus is alive and the chip identified as a BGT60TR13C
#[derive(Debug, Copy, Clone)]
pub struct Identified;

/// Indicates that a register list has been programmed
///
/// The slice size is known in this state.
#[derive(Debug, Copy, Clone)]
pub struct Configured;

/// Indicates that the chip generates frames and fills its FIFO
#[derive(Debug, Copy, Clone)]
pub struct Streaming;

/// Indicates that frame generation was halted by an FSM reset
#[derive(Debug, Copy, Clone)]
pub struct Stopped;

/// Any state in which the chip is out of reset and answers on the bus
pub trait Awake {}

impl Awake for Reset {}
impl Awake for Identified {}
impl Awake for Configured {}
impl Awake for Streaming {}
impl Awake for Stopped {}
