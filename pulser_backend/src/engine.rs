//! The engine: one instrument's complete pulse model.
//!
//! [`Engine`] owns the timebase, the fixed function and channel tables, the pulse registry
//! and the trigger setup. This module holds the declarative configuration and the pulse
//! declare/mutate API, all in ticks and typed ids. Validation lives in
//! [`checks`](crate::checks), hardware synchronization in [`sync`](crate::sync) and the
//! run orchestration in [`lifecycle`](crate::lifecycle).
//!
//! ## Phases
//! An engine starts in [`RunMode::Preparation`], where functions, channels, delays and
//! pulses are declared. A test run ([`RunMode::TestRun`]) validates the pattern without
//! device I/O; an experiment ([`RunMode::Experiment`]) validates and writes to the
//! instrument through a [`CommandSink`](crate::sink::CommandSink).
//!
//! ```
//! use pulser_backend::prelude::*;
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.set_timebase(2.0e-9).unwrap();
//! engine.assign_channel(FunctionKind::MicroWave, ChannelId::new(1)).unwrap();
//! engine.create_pulse(1).unwrap();
//! engine.declare_pulse_function(1, FunctionKind::MicroWave).unwrap();
//! engine.declare_pulse_position(1, 5).unwrap();
//! engine.declare_pulse_length(1, 2).unwrap();
//! assert!(engine.pulse(1).unwrap().is_active());
//! ```

use std::fmt;

use indexmap::IndexMap;
use ndarray::Array1;
use tracing::{debug, warn};

use crate::channel::{Channel, ChannelId};
use crate::config::EngineConfig;
use crate::diff::paint;
use crate::error::{PulserError, Result};
use crate::function::{Function, FunctionKind};
use crate::pulse::Pulse;
use crate::registry::{PulseId, PulseRegistry};
use crate::timebase::{Ticks, Timebase};
use crate::utils::{channel_letter, channel_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Preparation,
    TestRun,
    Experiment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// The instrument free-runs and re-arms itself
    Internal,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSlope {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TriggerConfig {
    pub mode: Option<TriggerMode>,
    pub slope: Option<TriggerSlope>,
    pub level: Option<f64>,
}

/// Non-fatal conditions. Each distinct advisory is reported once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Two pulses of a function touch without a gap
    ZeroDistance {
        function: FunctionKind,
        first: usize,
        second: usize,
    },
    /// A pulse never became active during the test run and was deleted
    PulseNeverUsed(usize),
    /// A function ended up without pulses and gave up its channel
    FunctionUnused(FunctionKind),
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::ZeroDistance {
                function,
                first,
                second,
            } => write!(
                f,
                "pulses #{} and #{} of function {} have no distance between them",
                first, second, function
            ),
            Advisory::PulseNeverUsed(number) => {
                write!(f, "pulse #{} is never used and has been deleted", number)
            }
            Advisory::FunctionUnused(kind) => {
                write!(f, "function {} is not used and releases its channel", kind)
            }
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) timebase: Timebase,
    pub(crate) mode: RunMode,
    pub(crate) functions: IndexMap<FunctionKind, Function>,
    pub(crate) channels: Vec<Channel>,
    pub(crate) registry: PulseRegistry,
    pub(crate) trigger: TriggerConfig,
    /// Offset added to every delay so that the most negative one becomes zero
    pub(crate) neg_delay: Ticks,
    /// User-configured cap on the sequence length
    pub(crate) max_seq_len: Option<Ticks>,
    /// Sequence length fixed when the experiment starts
    pub(crate) seq_len: Option<Ticks>,
    pub(crate) keep_all: bool,
    pub(crate) is_setup: bool,
    pub(crate) is_running: bool,
    advisories: Vec<Advisory>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let functions = FunctionKind::ALL
            .iter()
            .map(|&kind| (kind, Function::new(kind)))
            .collect();
        let channels = (0..=config.num_channels)
            .map(|index| Channel::new(ChannelId::new(index)))
            .collect();
        Self {
            timebase: Timebase::new(config.min_timebase, config.max_timebase),
            keep_all: config.keep_all_pulses,
            config,
            mode: RunMode::Preparation,
            functions,
            channels,
            registry: PulseRegistry::new(),
            trigger: TriggerConfig::default(),
            neg_delay: 0,
            max_seq_len: None,
            seq_len: None,
            is_setup: false,
            is_running: false,
            advisories: Vec::new(),
        }
    }

    // FIELD ACCESS

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
    pub fn timebase(&self) -> &Timebase {
        &self.timebase
    }
    pub fn mode(&self) -> RunMode {
        self.mode
    }
    pub fn is_running(&self) -> bool {
        self.is_running
    }
    pub fn function(&self, kind: FunctionKind) -> &Function {
        &self.functions[&kind]
    }
    pub fn functions(&self) -> impl Iterator<Item = &Function> + '_ {
        self.functions.values()
    }
    pub fn channel(&self, id: ChannelId) -> Result<&Channel> {
        self.channels
            .get(id.index())
            .ok_or_else(|| PulserError::InvalidChannel(id.index().to_string()))
    }
    pub fn registry(&self) -> &PulseRegistry {
        &self.registry
    }
    pub fn trigger(&self) -> &TriggerConfig {
        &self.trigger
    }
    pub fn keep_all_pulses(&self) -> bool {
        self.keep_all
    }
    pub fn set_keep_all_pulses(&mut self, keep: bool) {
        self.keep_all = keep;
    }
    pub fn max_seq_len(&self) -> Option<Ticks> {
        self.max_seq_len
    }

    /// Advisories reported so far.
    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    pub fn take_advisories(&mut self) -> Vec<Advisory> {
        std::mem::take(&mut self.advisories)
    }

    pub(crate) fn advise(&mut self, advisory: Advisory) {
        if !self.advisories.contains(&advisory) {
            warn!("{}", advisory);
            self.advisories.push(advisory);
        }
    }

    /// Structural changes are only possible before the pulse lists have been built.
    fn require_preparation(&self, operation: &'static str) -> Result<()> {
        if self.mode != RunMode::Preparation || self.is_setup {
            return Err(PulserError::WrongPhase(operation));
        }
        Ok(())
    }

    // INSTRUMENT SETUP

    pub fn set_timebase(&mut self, seconds: f64) -> Result<()> {
        self.require_preparation("set timebase")?;
        self.timebase.set(seconds)
    }

    /// Binds a function to a physical channel. Both sides can be bound only once.
    pub fn assign_channel(&mut self, kind: FunctionKind, channel: ChannelId) -> Result<()> {
        self.require_preparation("assign channel")?;
        let chan = self
            .channels
            .get(channel.index())
            .ok_or_else(|| PulserError::InvalidChannel(channel.index().to_string()))?;
        if let Some(owner) = chan.function {
            return Err(PulserError::ChannelInUse {
                channel: channel.to_string(),
                function: owner,
            });
        }
        let function = &mut self.functions[&kind];
        if function.channel.is_some() {
            return Err(PulserError::FunctionAlreadySet {
                function: kind,
                attribute: "channel",
            });
        }
        function.channel = Some(channel);
        function.is_used = true;
        self.channels[channel.index()].function = Some(kind);
        debug!("function {} assigned to channel {}", kind, channel);
        Ok(())
    }

    pub fn set_function_inversion(&mut self, kind: FunctionKind, inverted: bool) -> Result<()> {
        self.require_preparation("set inversion")?;
        let function = &mut self.functions[&kind];
        if function.inverted.is_some() {
            return Err(PulserError::FunctionAlreadySet {
                function: kind,
                attribute: "inversion",
            });
        }
        function.inverted = Some(inverted);
        Ok(())
    }

    /// Sets a function's delay. Negative delays are only possible while the instrument
    /// is not externally triggered; all delays are then shifted so that the most negative
    /// one becomes zero.
    pub fn set_function_delay(&mut self, kind: FunctionKind, delay: Ticks) -> Result<()> {
        self.require_preparation("set delay")?;
        if self.functions[&kind].is_delay {
            return Err(PulserError::FunctionAlreadySet {
                function: kind,
                attribute: "delay",
            });
        }
        if delay < 0 {
            if self.trigger.mode == Some(TriggerMode::External) {
                return Err(PulserError::NegativeDelayWithExternalTrigger(kind));
            }
            if -delay > self.neg_delay {
                let shift = -delay - self.neg_delay;
                for function in self.functions.values_mut() {
                    function.delay += shift;
                }
                self.neg_delay = -delay;
            }
        }
        let function = &mut self.functions[&kind];
        function.delay = delay + self.neg_delay;
        function.is_delay = true;
        Ok(())
    }

    /// The delay as the user set it, before normalisation.
    pub fn function_delay(&self, kind: FunctionKind) -> Ticks {
        self.functions[&kind].delay - self.neg_delay
    }

    pub fn set_function_high_level(&mut self, kind: FunctionKind, volts: f64) -> Result<()> {
        self.require_preparation("set high level")?;
        let function = &mut self.functions[&kind];
        if function.high_level.is_some() {
            return Err(PulserError::FunctionAlreadySet {
                function: kind,
                attribute: "high level",
            });
        }
        if let Some(low) = function.low_level {
            if volts <= low {
                return Err(PulserError::InvalidLevels {
                    function: kind,
                    high: volts,
                    low,
                });
            }
        }
        function.high_level = Some(volts);
        Ok(())
    }

    pub fn set_function_low_level(&mut self, kind: FunctionKind, volts: f64) -> Result<()> {
        self.require_preparation("set low level")?;
        let function = &mut self.functions[&kind];
        if function.low_level.is_some() {
            return Err(PulserError::FunctionAlreadySet {
                function: kind,
                attribute: "low level",
            });
        }
        if let Some(high) = function.high_level {
            if high <= volts {
                return Err(PulserError::InvalidLevels {
                    function: kind,
                    high,
                    low: volts,
                });
            }
        }
        function.low_level = Some(volts);
        Ok(())
    }

    pub fn set_trigger_mode(&mut self, mode: TriggerMode) -> Result<()> {
        self.require_preparation("set trigger mode")?;
        if let Some(current) = self.trigger.mode {
            return Err(PulserError::InvalidTrigger(format!(
                "trigger mode has already been set to {:?}",
                current
            )));
        }
        if mode == TriggerMode::External && self.neg_delay > 0 {
            return Err(PulserError::InvalidTrigger(
                "external trigger mode is impossible with negative delays".to_string(),
            ));
        }
        if mode == TriggerMode::Internal
            && (self.trigger.slope.is_some() || self.trigger.level.is_some())
        {
            return Err(PulserError::InvalidTrigger(
                "trigger slope and level require external trigger mode".to_string(),
            ));
        }
        self.trigger.mode = Some(mode);
        Ok(())
    }

    /// Setting a slope implies external triggering.
    pub fn set_trigger_slope(&mut self, slope: TriggerSlope) -> Result<()> {
        self.require_preparation("set trigger slope")?;
        if self.trigger.slope.is_some() {
            return Err(PulserError::InvalidTrigger(
                "trigger slope has already been set".to_string(),
            ));
        }
        self.require_external_trigger("slope")?;
        self.trigger.slope = Some(slope);
        Ok(())
    }

    /// Setting a level implies external triggering.
    pub fn set_trigger_level(&mut self, volts: f64) -> Result<()> {
        self.require_preparation("set trigger level")?;
        if self.trigger.level.is_some() {
            return Err(PulserError::InvalidTrigger(
                "trigger level has already been set".to_string(),
            ));
        }
        self.require_external_trigger("level")?;
        self.trigger.level = Some(volts);
        Ok(())
    }

    fn require_external_trigger(&mut self, what: &str) -> Result<()> {
        match self.trigger.mode {
            Some(TriggerMode::Internal) => Err(PulserError::InvalidTrigger(format!(
                "trigger {} is meaningless in internal trigger mode",
                what
            ))),
            Some(TriggerMode::External) => Ok(()),
            None => {
                if self.neg_delay > 0 {
                    return Err(PulserError::InvalidTrigger(
                        "external trigger mode is impossible with negative delays".to_string(),
                    ));
                }
                self.trigger.mode = Some(TriggerMode::External);
                Ok(())
            }
        }
    }

    /// Caps the sequence length used during the experiment.
    pub fn set_max_seq_len(&mut self, ticks: Ticks) -> Result<()> {
        self.require_preparation("set maximum sequence length")?;
        if ticks <= 0 || ticks > self.config.memory_size {
            return Err(PulserError::Config(format!(
                "maximum sequence length of {} ticks must be within 1..={}",
                ticks, self.config.memory_size
            )));
        }
        self.max_seq_len = Some(ticks);
        Ok(())
    }

    // PULSE REGISTRY

    pub fn create_pulse(&mut self, number: usize) -> Result<PulseId> {
        self.require_preparation("create pulse")?;
        self.registry.create(number)
    }

    pub fn find_pulse(&self, number: usize) -> Result<PulseId> {
        self.registry.find(number)
    }

    pub fn pulse(&self, number: usize) -> Result<&Pulse> {
        Ok(self.registry.get(self.registry.find(number)?))
    }

    fn pulse_mut(&mut self, number: usize) -> Result<&mut Pulse> {
        let id = self.registry.find(number)?;
        Ok(self.registry.get_mut(id))
    }

    /// Removes a pulse from the registry and from its function's pulse list. A function
    /// left without pulses is marked unused and releases its channel.
    pub fn delete_pulse(&mut self, id: PulseId) {
        let pulse = self.registry.remove(id);
        let Some(kind) = pulse.function else {
            return;
        };
        let function = &mut self.functions[&kind];
        if let Some(index) = function.pulses.iter().position(|&p| p == id) {
            function.pulses.swap_remove(index);
            function.num_active_pulses = function.num_active_pulses.min(function.pulses.len());
            if function.pulses.is_empty() {
                self.release_function(kind);
            }
        }
    }

    pub(crate) fn release_function(&mut self, kind: FunctionKind) {
        if let Some(channel) = self.functions[&kind].release() {
            self.channels[channel.index()].function = None;
        }
        self.advise(Advisory::FunctionUnused(kind));
    }

    fn is_trigger_out_pulse(&self, pulse: &Pulse) -> bool {
        pulse
            .function
            .and_then(|kind| self.functions[&kind].channel)
            .map_or(false, |ch| ch.is_trigger_out())
    }

    /// Initial values are captured whenever an attribute is declared outside a test run.
    fn captures_initial(&self) -> bool {
        self.mode != RunMode::TestRun
    }

    // DECLARE API

    pub fn declare_pulse_function(&mut self, number: usize, kind: FunctionKind) -> Result<()> {
        self.require_preparation("set pulse function")?;
        let pulse = self.pulse(number)?;
        if pulse.function.is_some() {
            return Err(PulserError::AlreadySet {
                number,
                attribute: "function",
            });
        }
        let function = &self.functions[&kind];
        let channel = function.channel.ok_or(PulserError::NoChannel(kind))?;
        if channel.is_trigger_out() {
            if let Some(other) = self.registry.iter().find(|p| p.function == Some(kind)) {
                return Err(PulserError::TriggerOutPulseCount {
                    function: kind,
                    existing: other.number,
                });
            }
            if pulse.length_delta().is_some() {
                return Err(PulserError::TriggerOutLengthChange(number));
            }
        }
        let pulse = self.pulse_mut(number)?;
        pulse.function = Some(kind);
        pulse.channel = Some(channel);
        self.functions[&kind].is_needed = true;
        Ok(())
    }

    pub fn declare_pulse_position(&mut self, number: usize, ticks: Ticks) -> Result<()> {
        let capture = self.captures_initial();
        self.pulse_mut(number)?.declare_position(ticks, capture)
    }

    pub fn declare_pulse_length(&mut self, number: usize, ticks: Ticks) -> Result<()> {
        let capture = self.captures_initial();
        self.pulse_mut(number)?.declare_length(ticks, capture)
    }

    pub fn declare_pulse_position_delta(&mut self, number: usize, ticks: Ticks) -> Result<()> {
        let capture = self.captures_initial();
        self.pulse_mut(number)?.declare_position_delta(ticks, capture)
    }

    pub fn declare_pulse_length_delta(&mut self, number: usize, ticks: Ticks) -> Result<()> {
        if self.is_trigger_out_pulse(self.pulse(number)?) {
            return Err(PulserError::TriggerOutLengthChange(number));
        }
        let capture = self.captures_initial();
        self.pulse_mut(number)?.declare_length_delta(ticks, capture)
    }

    // MUTATE API

    pub fn change_pulse_position(&mut self, number: usize, ticks: Ticks) -> Result<()> {
        self.pulse_mut(number)?.set_position(ticks)
    }

    pub fn change_pulse_length(&mut self, number: usize, ticks: Ticks) -> Result<()> {
        self.pulse_mut(number)?.set_length(ticks)
    }

    pub fn change_pulse_position_delta(&mut self, number: usize, ticks: Ticks) -> Result<()> {
        self.pulse_mut(number)?.set_position_delta(ticks);
        Ok(())
    }

    pub fn change_pulse_length_delta(&mut self, number: usize, ticks: Ticks) -> Result<()> {
        if self.is_trigger_out_pulse(self.pulse(number)?) {
            return Err(PulserError::TriggerOutLengthChange(number));
        }
        self.pulse_mut(number)?.set_length_delta(ticks);
        Ok(())
    }

    pub fn shift_pulse(&mut self, number: usize) -> Result<()> {
        self.pulse_mut(number)?.shift()
    }

    pub fn increment_pulse_length(&mut self, number: usize) -> Result<()> {
        self.pulse_mut(number)?.increment_length()
    }

    /// Returns a pulse to its initial values; the change is written on the next update.
    pub fn reset_pulse(&mut self, number: usize) -> Result<()> {
        self.pulse_mut(number)?.reset_to_initial();
        Ok(())
    }

    pub fn reset_all_pulses(&mut self) {
        for id in self.registry.ids() {
            self.registry.get_mut(id).reset_to_initial();
        }
    }

    // QUERIES

    /// Longest sequence the whole instrument needs: the larger of the longest used
    /// pulse channel (delay included) and the user-configured cap.
    pub fn max_sequence_length(&self) -> Ticks {
        let longest = self
            .functions
            .values()
            .filter(|f| f.is_used && !f.is_trigger_out())
            .map(|f| f.max_seq_len + f.delay)
            .max()
            .unwrap_or(0);
        longest.max(self.max_seq_len.unwrap_or(0))
    }

    /// Length of the bitmaps describing a channel's output.
    pub(crate) fn sequence_length(&self) -> Ticks {
        self.seq_len.unwrap_or_else(|| self.max_sequence_length())
    }

    /// The function's current logical output, delay applied, one byte per tick.
    pub fn waveform(&self, kind: FunctionKind) -> Array1<u8> {
        let function = &self.functions[&kind];
        let mut map = Array1::zeros(self.sequence_length().max(0) as usize);
        for &id in &function.pulses {
            if let Some((position, length)) = self.registry.get(id).span() {
                paint(&mut map, function.delay + position, length);
            }
        }
        map
    }

    /// One line per used function: its channel followed by `number position length` for
    /// every active pulse (ticks, delay included), or `TRIG <delay>` for the
    /// trigger-out channel.
    pub fn dump_pulses(&self) -> String {
        let mut out = String::new();
        for function in self.functions.values().filter(|f| f.is_used) {
            let Some(channel) = function.channel else {
                continue;
            };
            let spans = function
                .pulses
                .iter()
                .map(|&id| self.registry.get(id))
                .filter_map(|p| p.span().map(|span| (p.number, span)));
            if channel.is_trigger_out() {
                let position = spans.clone().next().map_or(0, |(_, (position, _))| position);
                out.push_str(&format!("{}:TRIG {}\n", function.kind, function.delay + position));
            } else {
                out.push_str(&format!(
                    "{}:{}{}",
                    function.kind,
                    channel_letter(channel),
                    channel_number(channel)
                ));
                for (number, (position, length)) in spans {
                    out.push_str(&format!(" {} {} {}", number, function.delay + position, length));
                }
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use crate::prelude::*;

    pub(crate) fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::default());
        engine.set_timebase(2.0e-9).unwrap();
        engine
    }

    mod setup {
        use super::*;

        #[test]
        fn channel_binding_is_exclusive() {
            let mut e = engine();
            e.assign_channel(FunctionKind::MicroWave, ChannelId::new(1)).unwrap();
            assert!(matches!(
                e.assign_channel(FunctionKind::Twt, ChannelId::new(1)),
                Err(PulserError::ChannelInUse { .. })
            ));
            assert!(matches!(
                e.assign_channel(FunctionKind::MicroWave, ChannelId::new(2)),
                Err(PulserError::FunctionAlreadySet { .. })
            ));
            assert!(matches!(
                e.assign_channel(FunctionKind::Twt, ChannelId::new(17)),
                Err(PulserError::InvalidChannel(_))
            ));
            assert!(e.function(FunctionKind::MicroWave).is_used());
            assert_eq!(
                e.channel(ChannelId::new(1)).unwrap().function(),
                Some(FunctionKind::MicroWave)
            );
        }

        #[test]
        fn negative_delays_are_normalised() {
            let mut e = engine();
            e.set_function_delay(FunctionKind::MicroWave, 10).unwrap();
            e.set_function_delay(FunctionKind::Twt, -4).unwrap();
            assert_eq!(e.function(FunctionKind::MicroWave).delay(), 14);
            assert_eq!(e.function(FunctionKind::Twt).delay(), 0);
            assert_eq!(e.function(FunctionKind::Rf).delay(), 4);
            e.set_function_delay(FunctionKind::Rf, -2).unwrap();
            assert_eq!(e.function(FunctionKind::Rf).delay(), 2);
            assert_eq!(e.function_delay(FunctionKind::Rf), -2);
            assert!(matches!(
                e.set_function_delay(FunctionKind::Rf, 3),
                Err(PulserError::FunctionAlreadySet { .. })
            ));
            assert!(matches!(
                e.set_trigger_mode(TriggerMode::External),
                Err(PulserError::InvalidTrigger(_))
            ));
        }

        #[test]
        fn negative_delay_with_external_trigger() {
            let mut e = engine();
            e.set_trigger_slope(TriggerSlope::Negative).unwrap();
            assert_eq!(e.trigger().mode, Some(TriggerMode::External));
            assert_eq!(
                e.set_function_delay(FunctionKind::Detection, -1),
                Err(PulserError::NegativeDelayWithExternalTrigger(FunctionKind::Detection))
            );
        }

        #[test]
        fn trigger_combinations() {
            let mut e = engine();
            e.set_trigger_mode(TriggerMode::Internal).unwrap();
            assert!(e.set_trigger_level(1.5).is_err());
            assert!(e.set_trigger_mode(TriggerMode::External).is_err());
        }

        #[test]
        fn levels() {
            let mut e = engine();
            e.set_function_high_level(FunctionKind::Rf, 2.0).unwrap();
            assert!(matches!(
                e.set_function_low_level(FunctionKind::Rf, 2.5),
                Err(PulserError::InvalidLevels { .. })
            ));
            e.set_function_low_level(FunctionKind::Rf, -0.5).unwrap();
            assert_eq!(e.function(FunctionKind::Rf).low_level(), Some(-0.5));
        }

        #[test]
        fn sequence_cap() {
            let mut e = engine();
            assert!(e.set_max_seq_len(0).is_err());
            assert!(e.set_max_seq_len(1 << 20).is_err());
            e.set_max_seq_len(500).unwrap();
            assert_eq!(e.max_sequence_length(), 500);
        }
    }

    mod pulses {
        use super::*;

        #[test]
        fn function_needs_channel() {
            let mut e = engine();
            e.create_pulse(1).unwrap();
            assert_eq!(
                e.declare_pulse_function(1, FunctionKind::Rf),
                Err(PulserError::NoChannel(FunctionKind::Rf))
            );
            e.assign_channel(FunctionKind::Rf, ChannelId::new(3)).unwrap();
            e.declare_pulse_function(1, FunctionKind::Rf).unwrap();
            assert!(e.function(FunctionKind::Rf).is_needed());
            assert!(matches!(
                e.declare_pulse_function(1, FunctionKind::Rf),
                Err(PulserError::AlreadySet { attribute: "function", .. })
            ));
            assert_eq!(e.declare_pulse_function(9, FunctionKind::Rf), Err(PulserError::NotFound(9)));
        }

        #[test]
        fn trigger_out_restrictions() {
            let mut e = engine();
            e.assign_channel(FunctionKind::Detection, ChannelId::TRIGGER_OUT).unwrap();
            e.create_pulse(1).unwrap();
            e.create_pulse(2).unwrap();
            e.create_pulse(3).unwrap();
            e.declare_pulse_function(1, FunctionKind::Detection).unwrap();
            assert!(matches!(
                e.declare_pulse_function(2, FunctionKind::Detection),
                Err(PulserError::TriggerOutPulseCount { existing: 1, .. })
            ));
            assert_eq!(
                e.declare_pulse_length_delta(1, 2),
                Err(PulserError::TriggerOutLengthChange(1))
            );
            e.declare_pulse_length_delta(3, 2).unwrap();
            assert_eq!(e.create_pulse(3), Err(PulserError::DuplicateId(3)));
        }

        #[test]
        fn declare_then_mutate() {
            let mut e = engine();
            e.create_pulse(4).unwrap();
            e.declare_pulse_position(4, 10).unwrap();
            assert!(e.declare_pulse_position(4, 12).is_err());
            e.change_pulse_position(4, 12).unwrap();
            assert_eq!(e.pulse(4).unwrap().position(), Some(12));
            assert_eq!(e.pulse(4).unwrap().initial().position, Some(10));
            e.reset_pulse(4).unwrap();
            assert_eq!(e.pulse(4).unwrap().position(), Some(10));
        }

        #[test]
        fn creation_only_in_preparation() {
            let mut e = engine();
            e.mode = RunMode::TestRun;
            assert_eq!(e.create_pulse(1), Err(PulserError::WrongPhase("create pulse")));
        }
    }
}
