//! Error type shared by every layer of the engine.
//!
//! Errors fall in two families:
//! - configuration errors (bad timebase, bad function/channel binding, bad trigger setup),
//!   which always abort the current phase, and
//! - validation errors (overlapping pulses, capacity exceeded, non-quantizable times),
//!   which abort a test run but only reject the offending edit during a live experiment.
//!
//! Programming-logic errors (stale pulse ids, tick conversion without a timebase) are not
//! represented here: they are assertion failures.

use pyo3::exceptions::PyValueError;
use pyo3::PyErr;
use thiserror::Error;

use crate::function::FunctionKind;
use crate::timebase::Ticks;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PulserError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PulserError {
    #[error("no timebase has been set")]
    NoTimebase,
    #[error("timebase has already been set to {0} s")]
    TimebaseAlreadySet(f64),
    #[error("timebase {value} s is outside the instrument range [{min}, {max}] s")]
    TimebaseOutOfRange { value: f64, min: f64, max: f64 },
    #[error("time {0} s does not fit into the tick range")]
    OutOfRange(f64),
    #[error("time {time} s is not an integer multiple of the timebase {timebase} s")]
    NotAnIntegerMultiple { time: f64, timebase: f64 },

    #[error("pulse #{0} already exists")]
    DuplicateId(usize),
    #[error("pulse #{0} does not exist")]
    NotFound(usize),
    #[error("{attribute} of pulse #{number} has already been set")]
    AlreadySet { number: usize, attribute: &'static str },
    #[error("{attribute} of pulse #{number} has not been set")]
    NotSet { number: usize, attribute: &'static str },
    #[error("{attribute} of function {function} has already been set")]
    FunctionAlreadySet {
        function: FunctionKind,
        attribute: &'static str,
    },
    #[error("{attribute} of function {function} has not been set")]
    FunctionNotSet {
        function: FunctionKind,
        attribute: &'static str,
    },
    #[error("pulse #{0} has no function")]
    NoFunction(usize),
    #[error("function {0} has no channel assigned")]
    NoChannel(FunctionKind),
    #[error("function {0} is not in use")]
    FunctionNotUsed(FunctionKind),
    #[error("unknown function name '{0}'")]
    UnknownFunction(String),
    #[error("invalid channel '{0}'")]
    InvalidChannel(String),
    #[error("channel {channel} is already assigned to function {function}")]
    ChannelInUse {
        channel: String,
        function: FunctionKind,
    },
    #[error("function {function} uses the trigger-out channel and already has pulse #{existing}")]
    TriggerOutPulseCount {
        function: FunctionKind,
        existing: usize,
    },
    #[error("pulse #{0} is on the trigger-out channel whose pulse length cannot be changed")]
    TriggerOutLengthChange(usize),
    #[error("function {0} has a negative delay but the trigger mode is external")]
    NegativeDelayWithExternalTrigger(FunctionKind),
    #[error("invalid trigger configuration: {0}")]
    InvalidTrigger(String),
    #[error("high level {high} V of function {function} must exceed low level {low} V")]
    InvalidLevels {
        function: FunctionKind,
        high: f64,
        low: f64,
    },
    #[error("{attribute} of pulse #{number} would become negative ({value} ticks)")]
    NegativeValue {
        number: usize,
        attribute: &'static str,
        value: Ticks,
    },

    #[error("pulses #{first} and #{second} of function {function} overlap")]
    Overlap {
        function: FunctionKind,
        first: usize,
        second: usize,
    },
    #[error("pulse #{number} of function {function} ends at {end} ticks (delay included), beyond the capacity of {capacity} ticks")]
    CapacityExceeded {
        function: FunctionKind,
        number: usize,
        end: Ticks,
        capacity: Ticks,
    },

    #[error("operation '{0}' is not allowed in the current phase")]
    WrongPhase(&'static str),
    #[error("device error: {0}")]
    Device(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl PulserError {
    /// Errors that a live experiment recovers from by rejecting the triggering edit.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PulserError::Overlap { .. }
                | PulserError::CapacityExceeded { .. }
                | PulserError::NotAnIntegerMultiple { .. }
                | PulserError::OutOfRange(_)
                | PulserError::NegativeValue { .. }
        )
    }
}

impl From<PulserError> for PyErr {
    fn from(err: PulserError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

impl From<serde_json::Error> for PulserError {
    fn from(err: serde_json::Error) -> Self {
        PulserError::Config(err.to_string())
    }
}
