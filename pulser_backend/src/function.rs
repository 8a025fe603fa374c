//! Logical pulse roles ("functions") and their per-run state.
//!
//! The engine owns a fixed table of functions in [`FunctionKind::ALL`] order. A function
//! becomes *used* when it is assigned a channel and *needed* once a pulse references it.
//! Its pulse list holds registry ids only: pulses are owned by the
//! [`PulseRegistry`](crate::registry::PulseRegistry).

use std::fmt;

use crate::channel::ChannelId;
use crate::error::{PulserError, Result};
use crate::registry::PulseId;
use crate::timebase::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunctionKind {
    MicroWave,
    Twt,
    TwtGate,
    Detection,
    DetectionGate,
    Defense,
    Rf,
    RfGate,
    PulseShape,
    Other1,
    Other2,
    Other3,
    Other4,
}

impl FunctionKind {
    /// Fixed table order. Update cycles process functions in this order.
    pub const ALL: [FunctionKind; 13] = [
        FunctionKind::MicroWave,
        FunctionKind::Twt,
        FunctionKind::TwtGate,
        FunctionKind::Detection,
        FunctionKind::DetectionGate,
        FunctionKind::Defense,
        FunctionKind::Rf,
        FunctionKind::RfGate,
        FunctionKind::PulseShape,
        FunctionKind::Other1,
        FunctionKind::Other2,
        FunctionKind::Other3,
        FunctionKind::Other4,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FunctionKind::MicroWave => "MW",
            FunctionKind::Twt => "TWT",
            FunctionKind::TwtGate => "TWT_GATE",
            FunctionKind::Detection => "DET",
            FunctionKind::DetectionGate => "DET_GATE",
            FunctionKind::Defense => "DEFENSE",
            FunctionKind::Rf => "RF",
            FunctionKind::RfGate => "RF_GATE",
            FunctionKind::PulseShape => "PULSE_SHAPE",
            FunctionKind::Other1 => "OTHER_1",
            FunctionKind::Other2 => "OTHER_2",
            FunctionKind::Other3 => "OTHER_3",
            FunctionKind::Other4 => "OTHER_4",
        }
    }

    /// Case-insensitive lookup by [`FunctionKind::name`].
    pub fn from_name(name: &str) -> Result<Self> {
        FunctionKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| PulserError::UnknownFunction(name.to_string()))
    }
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub(crate) kind: FunctionKind,
    pub(crate) is_used: bool,
    pub(crate) is_needed: bool,
    pub(crate) channel: Option<ChannelId>,
    pub(crate) inverted: Option<bool>,
    /// Delay in ticks, normalised so that it is never negative
    pub(crate) delay: Ticks,
    pub(crate) is_delay: bool,
    pub(crate) high_level: Option<f64>,
    pub(crate) low_level: Option<f64>,
    /// Sorted by start position, inactive pulses last (after a successful check)
    pub(crate) pulses: Vec<PulseId>,
    pub(crate) num_active_pulses: usize,
    pub(crate) max_seq_len: Ticks,
}

impl Function {
    pub fn new(kind: FunctionKind) -> Self {
        Self {
            kind,
            is_used: false,
            is_needed: false,
            channel: None,
            inverted: None,
            delay: 0,
            is_delay: false,
            high_level: None,
            low_level: None,
            pulses: Vec::new(),
            num_active_pulses: 0,
            max_seq_len: 0,
        }
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }
    pub fn is_used(&self) -> bool {
        self.is_used
    }
    pub fn is_needed(&self) -> bool {
        self.is_needed
    }
    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }
    pub fn is_inverted(&self) -> bool {
        self.inverted.unwrap_or(false)
    }
    pub fn delay(&self) -> Ticks {
        self.delay
    }
    pub fn high_level(&self) -> Option<f64> {
        self.high_level
    }
    pub fn low_level(&self) -> Option<f64> {
        self.low_level
    }
    pub fn pulses(&self) -> &[PulseId] {
        &self.pulses
    }
    pub fn num_active_pulses(&self) -> usize {
        self.num_active_pulses
    }
    pub fn max_seq_len(&self) -> Ticks {
        self.max_seq_len
    }

    pub fn is_trigger_out(&self) -> bool {
        self.channel.map_or(false, |ch| ch.is_trigger_out())
    }

    /// Detaches the function from its channel and marks it unused.
    /// Returns the released channel so the caller can clear the back-reference.
    pub(crate) fn release(&mut self) -> Option<ChannelId> {
        self.is_used = false;
        self.channel.take()
    }
}
