//! The pulser module is the single place by which the engine is exposed to python.
//!
//! ## Overview
//!
//! The engine itself ([`Engine`]) works in ticks with typed ids. Hosts talk in seconds and
//! names: functions are addressed by their table name (`"MW"`, `"DET_GATE"`, ...) and
//! channels by `<letter><number>` or `TRIG_OUT`. The [`BasePulser`] trait provides that
//! surface through default implementations on top of three field accessors, so that any
//! struct holding an engine and a [`CommandSink`] can reuse it.
//!
//! The module is organized into:
//!
//! 1. **Trait**: [`BasePulser`], defining every host-level operation.
//! 2. **Pulser struct**: [`Pulser`], a python class with a [`RecordingSink`] for dry runs.
//! 3. **Macro**: [`impl_pulser_boilerplate`], which implements the trait's field methods
//!    and generates python wrappers for the trait methods.
//!
//! ## Navigating the Module
//!
//! - **Understand core behaviors**: see [`BasePulser`] and the [`Engine`] it wraps.
//! - **Integrate with python**: refer to the [`impl_pulser_boilerplate`] macro. A controller
//!   crate uses it to build its own python class around a different sink.

use std::collections::HashMap;

use maplit::hashmap;
use ndarray::Array1;
use pyo3::prelude::*;

use crate::channel::ChannelId;
use crate::config::EngineConfig;
use crate::engine::{Engine, TriggerMode, TriggerSlope};
use crate::error::{PulserError, Result};
use crate::function::FunctionKind;
use crate::lifecycle::CommitOutcome;
use crate::sink::{CommandSink, RecordingSink};
use crate::timebase::Ticks;
use crate::utils::parse_channel_name;

/// Host-level behavior of a pulse generator, expressed in seconds and names.
///
/// Trait methods fall into the following categories:
/// 1. Instrument setup, accepted only before a run has been set up:
///     - [`set_timebase`], [`assign_channel`], [`set_function_inversion`],
///       [`set_function_delay`], [`set_function_high_level`], [`set_function_low_level`]
///     - [`set_trigger_mode`], [`set_trigger_slope`], [`set_trigger_level`],
///       [`set_max_seq_len`]
/// 2. Pulse declaration (write-once) and queries:
///     - [`create_pulse`], [`set_pulse_function`], [`set_pulse_position`],
///       [`set_pulse_length`], [`set_pulse_position_delta`], [`set_pulse_length_delta`]
///     - [`pulse_position`], [`pulse_length`], [`pulse_state`], ...
/// 3. Pulse mutation during a run:
///     - [`change_pulse_position`], [`change_pulse_length`], [`shift_pulse`],
///       [`increment_pulse_length`], [`reset_pulse`], [`reset_all_pulses`]
/// 4. Run control, the only methods that talk to the sink:
///     - [`test_run_start`], [`test_run_end`], [`experiment_start`], [`experiment_end`],
///       [`update`], [`channel_state`], [`set_channel_state`]
/// 5. Internal helpers which are not exposed to python:
///     - [`engine`], [`engine_`], [`split_`], [`to_ticks`], [`to_seconds`]
///
/// [`set_timebase`]: BasePulser::set_timebase
/// [`assign_channel`]: BasePulser::assign_channel
/// [`set_function_inversion`]: BasePulser::set_function_inversion
/// [`set_function_delay`]: BasePulser::set_function_delay
/// [`set_function_high_level`]: BasePulser::set_function_high_level
/// [`set_function_low_level`]: BasePulser::set_function_low_level
/// [`set_trigger_mode`]: BasePulser::set_trigger_mode
/// [`set_trigger_slope`]: BasePulser::set_trigger_slope
/// [`set_trigger_level`]: BasePulser::set_trigger_level
/// [`set_max_seq_len`]: BasePulser::set_max_seq_len
/// [`create_pulse`]: BasePulser::create_pulse
/// [`set_pulse_function`]: BasePulser::set_pulse_function
/// [`set_pulse_position`]: BasePulser::set_pulse_position
/// [`set_pulse_length`]: BasePulser::set_pulse_length
/// [`set_pulse_position_delta`]: BasePulser::set_pulse_position_delta
/// [`set_pulse_length_delta`]: BasePulser::set_pulse_length_delta
/// [`pulse_position`]: BasePulser::pulse_position
/// [`pulse_length`]: BasePulser::pulse_length
/// [`pulse_state`]: BasePulser::pulse_state
/// [`change_pulse_position`]: BasePulser::change_pulse_position
/// [`change_pulse_length`]: BasePulser::change_pulse_length
/// [`shift_pulse`]: BasePulser::shift_pulse
/// [`increment_pulse_length`]: BasePulser::increment_pulse_length
/// [`reset_pulse`]: BasePulser::reset_pulse
/// [`reset_all_pulses`]: BasePulser::reset_all_pulses
/// [`test_run_start`]: BasePulser::test_run_start
/// [`test_run_end`]: BasePulser::test_run_end
/// [`experiment_start`]: BasePulser::experiment_start
/// [`experiment_end`]: BasePulser::experiment_end
/// [`update`]: BasePulser::update
/// [`channel_state`]: BasePulser::channel_state
/// [`set_channel_state`]: BasePulser::set_channel_state
/// [`engine`]: BasePulser::engine
/// [`engine_`]: BasePulser::engine_
/// [`split_`]: BasePulser::split_
/// [`to_ticks`]: BasePulser::to_ticks
/// [`to_seconds`]: BasePulser::to_seconds
pub trait BasePulser {
    // FIELD methods
    fn engine(&self) -> &Engine;
    fn engine_(&mut self) -> &mut Engine;
    /// The engine together with the sink its commits are written to.
    fn split_(&mut self) -> (&mut Engine, &mut dyn CommandSink);

    fn to_ticks(&self, seconds: f64) -> Result<Ticks> {
        self.engine().timebase().to_ticks(seconds)
    }

    /// # Panics
    /// If no timebase has been set.
    fn to_seconds(&self, ticks: Ticks) -> f64 {
        self.engine().timebase().to_seconds(ticks)
    }

    fn parse_channel(&self, channel: &str) -> Result<ChannelId> {
        parse_channel_name(channel, self.engine().config().num_channels)
    }

    // INSTRUMENT SETUP

    /// Sets the timebase in seconds. It can be set exactly once.
    ///
    /// # Example
    /// ```
    /// use pulser_backend::*;
    ///
    /// let mut pulser = Pulser::new(None).unwrap();
    /// pulser.set_timebase(2.0e-9).unwrap();
    /// assert_eq!(pulser.timebase(), Some(2.0e-9));
    /// assert!(pulser.set_timebase(4.0e-9).is_err());
    /// ```
    fn set_timebase(&mut self, seconds: f64) -> Result<()> {
        self.engine_().set_timebase(seconds)
    }

    fn timebase(&self) -> Option<f64> {
        self.engine().timebase().period()
    }

    /// Assigns a function to a channel.
    ///
    /// # Example
    /// ```
    /// use pulser_backend::*;
    ///
    /// let mut pulser = Pulser::new(None).unwrap();
    /// pulser.assign_channel("MW", "A1").unwrap();
    /// pulser.assign_channel("det", "TRIG_OUT").unwrap();
    /// assert_eq!(pulser.function_channel("mw").unwrap(), Some("A1".to_string()));
    /// assert!(pulser.assign_channel("RF", "a1").is_err()); // channel taken
    /// ```
    fn assign_channel(&mut self, function: &str, channel: &str) -> Result<()> {
        let kind = FunctionKind::from_name(function)?;
        let channel = self.parse_channel(channel)?;
        self.engine_().assign_channel(kind, channel)
    }

    fn function_channel(&self, function: &str) -> Result<Option<String>> {
        let kind = FunctionKind::from_name(function)?;
        Ok(self.engine().function(kind).channel().map(|ch| ch.to_string()))
    }

    fn set_function_inversion(&mut self, function: &str, inverted: bool) -> Result<()> {
        let kind = FunctionKind::from_name(function)?;
        self.engine_().set_function_inversion(kind, inverted)
    }

    fn function_inversion(&self, function: &str) -> Result<bool> {
        let kind = FunctionKind::from_name(function)?;
        Ok(self.engine().function(kind).is_inverted())
    }

    /// Sets a function's delay in seconds. Negative delays are accepted as long as the
    /// instrument is not externally triggered.
    fn set_function_delay(&mut self, function: &str, seconds: f64) -> Result<()> {
        let kind = FunctionKind::from_name(function)?;
        let ticks = self.to_ticks(seconds)?;
        self.engine_().set_function_delay(kind, ticks)
    }

    fn function_delay(&self, function: &str) -> Result<f64> {
        let kind = FunctionKind::from_name(function)?;
        if !self.engine().timebase().is_set() {
            return Err(PulserError::NoTimebase);
        }
        Ok(self.to_seconds(self.engine().function_delay(kind)))
    }

    fn set_function_high_level(&mut self, function: &str, volts: f64) -> Result<()> {
        let kind = FunctionKind::from_name(function)?;
        self.engine_().set_function_high_level(kind, volts)
    }

    fn set_function_low_level(&mut self, function: &str, volts: f64) -> Result<()> {
        let kind = FunctionKind::from_name(function)?;
        self.engine_().set_function_low_level(kind, volts)
    }

    /// High and low level of a function in volts, `None` where unset.
    fn function_levels(&self, function: &str) -> Result<(Option<f64>, Option<f64>)> {
        let kind = FunctionKind::from_name(function)?;
        let function = self.engine().function(kind);
        Ok((function.high_level(), function.low_level()))
    }

    /// `"INTERNAL"` or `"EXTERNAL"`, case-insensitive.
    fn set_trigger_mode(&mut self, mode: &str) -> Result<()> {
        let mode = match mode.trim().to_ascii_uppercase().as_str() {
            "INTERNAL" => TriggerMode::Internal,
            "EXTERNAL" => TriggerMode::External,
            _ => return Err(PulserError::InvalidTrigger(format!("unknown mode '{}'", mode))),
        };
        self.engine_().set_trigger_mode(mode)
    }

    fn trigger_mode(&self) -> Option<String> {
        self.engine().trigger().mode.map(|mode| match mode {
            TriggerMode::Internal => "INTERNAL".to_string(),
            TriggerMode::External => "EXTERNAL".to_string(),
        })
    }

    /// `"POSITIVE"` or `"NEGATIVE"`, case-insensitive. Implies external triggering.
    fn set_trigger_slope(&mut self, slope: &str) -> Result<()> {
        let slope = match slope.trim().to_ascii_uppercase().as_str() {
            "POSITIVE" => TriggerSlope::Positive,
            "NEGATIVE" => TriggerSlope::Negative,
            _ => return Err(PulserError::InvalidTrigger(format!("unknown slope '{}'", slope))),
        };
        self.engine_().set_trigger_slope(slope)
    }

    fn set_trigger_level(&mut self, volts: f64) -> Result<()> {
        self.engine_().set_trigger_level(volts)
    }

    fn set_max_seq_len(&mut self, seconds: f64) -> Result<()> {
        let ticks = self.to_ticks(seconds)?;
        self.engine_().set_max_seq_len(ticks)
    }

    fn set_keep_all_pulses(&mut self, keep: bool) {
        self.engine_().set_keep_all_pulses(keep);
    }

    fn keep_all_pulses(&self) -> bool {
        self.engine().keep_all_pulses()
    }

    // PULSE DECLARATION

    fn create_pulse(&mut self, number: usize) -> Result<()> {
        self.engine_().create_pulse(number).map(|_| ())
    }

    fn set_pulse_function(&mut self, number: usize, function: &str) -> Result<()> {
        let kind = FunctionKind::from_name(function)?;
        self.engine_().declare_pulse_function(number, kind)
    }

    /// Declares a pulse's position in seconds.
    ///
    /// # Example
    /// ```
    /// use pulser_backend::*;
    ///
    /// let mut pulser = Pulser::new(None).unwrap();
    /// pulser.set_timebase(2.0e-9).unwrap();
    /// pulser.assign_channel("MW", "A1").unwrap();
    /// pulser.create_pulse(1).unwrap();
    /// pulser.set_pulse_function(1, "MW").unwrap();
    /// pulser.set_pulse_position(1, 10.0e-9).unwrap();
    /// pulser.set_pulse_length(1, 4.0e-9).unwrap();
    /// assert_eq!(pulser.engine().pulse(1).unwrap().position(), Some(5));
    /// assert!(pulser.pulse_is_active(1).unwrap());
    /// ```
    fn set_pulse_position(&mut self, number: usize, seconds: f64) -> Result<()> {
        let ticks = self.to_ticks(seconds)?;
        self.engine_().declare_pulse_position(number, ticks)
    }

    fn set_pulse_length(&mut self, number: usize, seconds: f64) -> Result<()> {
        let ticks = self.to_ticks(seconds)?;
        self.engine_().declare_pulse_length(number, ticks)
    }

    fn set_pulse_position_delta(&mut self, number: usize, seconds: f64) -> Result<()> {
        let ticks = self.to_ticks(seconds)?;
        self.engine_().declare_pulse_position_delta(number, ticks)
    }

    fn set_pulse_length_delta(&mut self, number: usize, seconds: f64) -> Result<()> {
        let ticks = self.to_ticks(seconds)?;
        self.engine_().declare_pulse_length_delta(number, ticks)
    }

    fn pulse_function(&self, number: usize) -> Result<Option<String>> {
        Ok(self
            .engine()
            .pulse(number)?
            .function()
            .map(|kind| kind.name().to_string()))
    }

    fn pulse_position(&self, number: usize) -> Result<Option<f64>> {
        let position = self.engine().pulse(number)?.position();
        Ok(position.map(|ticks| self.to_seconds(ticks)))
    }

    fn pulse_length(&self, number: usize) -> Result<Option<f64>> {
        let length = self.engine().pulse(number)?.length();
        Ok(length.map(|ticks| self.to_seconds(ticks)))
    }

    fn pulse_position_delta(&self, number: usize) -> Result<Option<f64>> {
        let delta = self.engine().pulse(number)?.position_delta();
        Ok(delta.map(|ticks| self.to_seconds(ticks)))
    }

    fn pulse_length_delta(&self, number: usize) -> Result<Option<f64>> {
        let delta = self.engine().pulse(number)?.length_delta();
        Ok(delta.map(|ticks| self.to_seconds(ticks)))
    }

    fn pulse_is_active(&self, number: usize) -> Result<bool> {
        Ok(self.engine().pulse(number)?.is_active())
    }

    /// All numeric attributes of a pulse (seconds, unset ones left out) and its flags
    /// (`0.0` or `1.0`).
    fn pulse_state(&self, number: usize) -> Result<HashMap<String, f64>> {
        let pulse = self.engine().pulse(number)?;
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let mut state = hashmap! {
            "number".to_string() => number as f64,
            "is_active".to_string() => flag(pulse.is_active()),
            "was_active".to_string() => flag(pulse.was_active()),
            "has_been_active".to_string() => flag(pulse.has_been_active()),
            "needs_update".to_string() => flag(pulse.needs_update()),
        };
        let numeric = [
            ("position", pulse.position()),
            ("length", pulse.length()),
            ("position_delta", pulse.position_delta()),
            ("length_delta", pulse.length_delta()),
        ];
        for (name, value) in numeric {
            if let Some(ticks) = value {
                state.insert(name.to_string(), self.to_seconds(ticks));
            }
        }
        Ok(state)
    }

    // PULSE MUTATION

    fn change_pulse_position(&mut self, number: usize, seconds: f64) -> Result<()> {
        let ticks = self.to_ticks(seconds)?;
        self.engine_().change_pulse_position(number, ticks)
    }

    fn change_pulse_length(&mut self, number: usize, seconds: f64) -> Result<()> {
        let ticks = self.to_ticks(seconds)?;
        self.engine_().change_pulse_length(number, ticks)
    }

    fn change_pulse_position_delta(&mut self, number: usize, seconds: f64) -> Result<()> {
        let ticks = self.to_ticks(seconds)?;
        self.engine_().change_pulse_position_delta(number, ticks)
    }

    fn change_pulse_length_delta(&mut self, number: usize, seconds: f64) -> Result<()> {
        let ticks = self.to_ticks(seconds)?;
        self.engine_().change_pulse_length_delta(number, ticks)
    }

    fn shift_pulse(&mut self, number: usize) -> Result<()> {
        self.engine_().shift_pulse(number)
    }

    fn increment_pulse_length(&mut self, number: usize) -> Result<()> {
        self.engine_().increment_pulse_length(number)
    }

    fn reset_pulse(&mut self, number: usize) -> Result<()> {
        self.engine_().reset_pulse(number)
    }

    fn reset_all_pulses(&mut self) {
        self.engine_().reset_all_pulses();
    }

    // RUN CONTROL

    fn test_run_start(&mut self) -> Result<()> {
        self.engine_().test_run_start()
    }

    fn test_run_end(&mut self) -> Result<()> {
        self.engine_().test_run_end()
    }

    fn experiment_start(&mut self) -> Result<()> {
        let (engine, sink) = self.split_();
        engine.experiment_start(sink)
    }

    fn experiment_end(&mut self) -> Result<()> {
        let (engine, sink) = self.split_();
        engine.experiment_end(sink)
    }

    /// Commits pending edits. See [`Engine::update`].
    ///
    /// # Example
    /// ```
    /// use pulser_backend::*;
    ///
    /// let mut pulser = Pulser::new(None).unwrap();
    /// pulser.set_timebase(1.0e-8).unwrap();
    /// pulser.assign_channel("RF", "B1").unwrap();
    /// pulser.create_pulse(1).unwrap();
    /// pulser.set_pulse_function(1, "RF").unwrap();
    /// pulser.set_pulse_position(1, 0.0).unwrap();
    /// pulser.set_pulse_length(1, 1.0e-7).unwrap();
    /// pulser.experiment_start().unwrap();
    ///
    /// pulser.change_pulse_length(1, 1.0e-6).unwrap(); // longer than the sequence
    /// assert!(!BasePulser::update(&mut pulser).unwrap().is_applied());
    /// assert_eq!(pulser.engine().pulse(1).unwrap().length(), Some(10));
    /// ```
    fn update(&mut self) -> Result<CommitOutcome> {
        let (engine, sink) = self.split_();
        engine.update(sink)
    }

    fn channel_state(&mut self, channel: &str) -> Result<bool> {
        let channel = self.parse_channel(channel)?;
        let (_, sink) = self.split_();
        sink.channel_state(channel)
    }

    fn set_channel_state(&mut self, channel: &str, on: bool) -> Result<()> {
        let channel = self.parse_channel(channel)?;
        let (_, sink) = self.split_();
        sink.set_channel_state(channel, on)
    }

    // QUERIES

    /// Longest sequence the instrument needs, in seconds.
    fn max_sequence_length(&self) -> Result<f64> {
        if !self.engine().timebase().is_set() {
            return Err(PulserError::NoTimebase);
        }
        Ok(self.to_seconds(self.engine().max_sequence_length()))
    }

    fn waveform(&self, function: &str) -> Result<Array1<u8>> {
        let kind = FunctionKind::from_name(function)?;
        Ok(self.engine().waveform(kind))
    }

    fn dump_pulses(&self) -> String {
        self.engine().dump_pulses()
    }

    fn advisories(&self) -> Vec<String> {
        self.engine()
            .advisories()
            .iter()
            .map(|a| a.to_string())
            .collect()
    }
}

/// A pulse generator with a [`RecordingSink`]: nothing reaches hardware, every command is
/// kept for inspection.
///
/// **Refer to the [`BasePulser`] trait for method behavior.**
#[pyclass]
pub struct Pulser {
    engine: Engine,
    sink: RecordingSink,
}

/// A macro to generate boilerplate implementations for structs representing pulse
/// generators.
///
/// PyO3 cannot expose trait methods to python directly, so this macro implements the
/// field methods of [`BasePulser`] and wraps every other trait method in a `#[pymethods]`
/// block. Arguments and types are preserved, with these deviations:
/// - errors become python `ValueError`s,
/// - `update` returns `True` when the edits were applied and `False` when they were
///   rolled back,
/// - `waveform` returns a numpy array.
///
/// The struct needs an `engine: Engine` field and a `sink` field whose type implements
/// [`CommandSink`].
///
/// Usage:
/// ```rust
/// use pulser_backend::*;
/// use pyo3::prelude::*;
///
/// #[pyclass]
/// struct LoggingPulser {
///     engine: Engine,
///     sink: RecordingSink,
///     label: String,
/// }
/// impl_pulser_boilerplate!(LoggingPulser);
///
/// #[pymethods]
/// impl LoggingPulser {
///     #[new]
///     pub fn new(label: String) -> Self {
///         Self {
///             engine: Engine::new(EngineConfig::default()),
///             sink: RecordingSink::new(),
///             label,
///         }
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_pulser_boilerplate {
    ($pulser_type: ty) => {
        impl $crate::pulser::BasePulser for $pulser_type {
            fn engine(&self) -> &$crate::engine::Engine {
                &self.engine
            }
            fn engine_(&mut self) -> &mut $crate::engine::Engine {
                &mut self.engine
            }
            fn split_(
                &mut self,
            ) -> (&mut $crate::engine::Engine, &mut dyn $crate::sink::CommandSink) {
                (&mut self.engine, &mut self.sink)
            }
        }

        #[pymethods]
        impl $pulser_type {
            pub fn set_timebase(&mut self, seconds: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_timebase(self, seconds)?)
            }

            pub fn timebase(&self) -> Option<f64> {
                $crate::pulser::BasePulser::timebase(self)
            }

            pub fn assign_channel(&mut self, function: &str, channel: &str) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::assign_channel(self, function, channel)?)
            }

            pub fn function_channel(&self, function: &str) -> PyResult<Option<String>> {
                Ok($crate::pulser::BasePulser::function_channel(self, function)?)
            }

            pub fn set_function_inversion(&mut self, function: &str, inverted: bool) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_function_inversion(self, function, inverted)?)
            }

            pub fn function_inversion(&self, function: &str) -> PyResult<bool> {
                Ok($crate::pulser::BasePulser::function_inversion(self, function)?)
            }

            pub fn set_function_delay(&mut self, function: &str, seconds: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_function_delay(self, function, seconds)?)
            }

            pub fn function_delay(&self, function: &str) -> PyResult<f64> {
                Ok($crate::pulser::BasePulser::function_delay(self, function)?)
            }

            pub fn set_function_high_level(&mut self, function: &str, volts: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_function_high_level(self, function, volts)?)
            }

            pub fn set_function_low_level(&mut self, function: &str, volts: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_function_low_level(self, function, volts)?)
            }

            pub fn function_levels(&self, function: &str) -> PyResult<(Option<f64>, Option<f64>)> {
                Ok($crate::pulser::BasePulser::function_levels(self, function)?)
            }

            pub fn set_trigger_mode(&mut self, mode: &str) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_trigger_mode(self, mode)?)
            }

            pub fn trigger_mode(&self) -> Option<String> {
                $crate::pulser::BasePulser::trigger_mode(self)
            }

            pub fn set_trigger_slope(&mut self, slope: &str) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_trigger_slope(self, slope)?)
            }

            pub fn set_trigger_level(&mut self, volts: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_trigger_level(self, volts)?)
            }

            pub fn set_max_seq_len(&mut self, seconds: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_max_seq_len(self, seconds)?)
            }

            pub fn set_keep_all_pulses(&mut self, keep: bool) {
                $crate::pulser::BasePulser::set_keep_all_pulses(self, keep)
            }

            pub fn keep_all_pulses(&self) -> bool {
                $crate::pulser::BasePulser::keep_all_pulses(self)
            }

            pub fn create_pulse(&mut self, number: usize) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::create_pulse(self, number)?)
            }

            pub fn set_pulse_function(&mut self, number: usize, function: &str) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_pulse_function(self, number, function)?)
            }

            pub fn set_pulse_position(&mut self, number: usize, seconds: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_pulse_position(self, number, seconds)?)
            }

            pub fn set_pulse_length(&mut self, number: usize, seconds: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_pulse_length(self, number, seconds)?)
            }

            pub fn set_pulse_position_delta(&mut self, number: usize, seconds: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_pulse_position_delta(self, number, seconds)?)
            }

            pub fn set_pulse_length_delta(&mut self, number: usize, seconds: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_pulse_length_delta(self, number, seconds)?)
            }

            pub fn pulse_function(&self, number: usize) -> PyResult<Option<String>> {
                Ok($crate::pulser::BasePulser::pulse_function(self, number)?)
            }

            pub fn pulse_position(&self, number: usize) -> PyResult<Option<f64>> {
                Ok($crate::pulser::BasePulser::pulse_position(self, number)?)
            }

            pub fn pulse_length(&self, number: usize) -> PyResult<Option<f64>> {
                Ok($crate::pulser::BasePulser::pulse_length(self, number)?)
            }

            pub fn pulse_position_delta(&self, number: usize) -> PyResult<Option<f64>> {
                Ok($crate::pulser::BasePulser::pulse_position_delta(self, number)?)
            }

            pub fn pulse_length_delta(&self, number: usize) -> PyResult<Option<f64>> {
                Ok($crate::pulser::BasePulser::pulse_length_delta(self, number)?)
            }

            pub fn pulse_is_active(&self, number: usize) -> PyResult<bool> {
                Ok($crate::pulser::BasePulser::pulse_is_active(self, number)?)
            }

            pub fn pulse_state(&self, number: usize) -> PyResult<std::collections::HashMap<String, f64>> {
                Ok($crate::pulser::BasePulser::pulse_state(self, number)?)
            }

            pub fn change_pulse_position(&mut self, number: usize, seconds: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::change_pulse_position(self, number, seconds)?)
            }

            pub fn change_pulse_length(&mut self, number: usize, seconds: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::change_pulse_length(self, number, seconds)?)
            }

            pub fn change_pulse_position_delta(&mut self, number: usize, seconds: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::change_pulse_position_delta(self, number, seconds)?)
            }

            pub fn change_pulse_length_delta(&mut self, number: usize, seconds: f64) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::change_pulse_length_delta(self, number, seconds)?)
            }

            pub fn shift_pulse(&mut self, number: usize) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::shift_pulse(self, number)?)
            }

            pub fn increment_pulse_length(&mut self, number: usize) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::increment_pulse_length(self, number)?)
            }

            pub fn reset_pulse(&mut self, number: usize) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::reset_pulse(self, number)?)
            }

            pub fn reset_all_pulses(&mut self) {
                $crate::pulser::BasePulser::reset_all_pulses(self)
            }

            pub fn test_run_start(&mut self) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::test_run_start(self)?)
            }

            pub fn test_run_end(&mut self) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::test_run_end(self)?)
            }

            pub fn experiment_start(&mut self) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::experiment_start(self)?)
            }

            pub fn experiment_end(&mut self) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::experiment_end(self)?)
            }

            pub fn update(&mut self) -> PyResult<bool> {
                Ok($crate::pulser::BasePulser::update(self)?.is_applied())
            }

            pub fn channel_state(&mut self, channel: &str) -> PyResult<bool> {
                Ok($crate::pulser::BasePulser::channel_state(self, channel)?)
            }

            pub fn set_channel_state(&mut self, channel: &str, on: bool) -> PyResult<()> {
                Ok($crate::pulser::BasePulser::set_channel_state(self, channel, on)?)
            }

            pub fn max_sequence_length(&self) -> PyResult<f64> {
                Ok($crate::pulser::BasePulser::max_sequence_length(self)?)
            }

            pub fn waveform(&self, function: &str, py: Python) -> PyResult<PyObject> {
                use pyo3::ToPyObject;
                let arr = $crate::pulser::BasePulser::waveform(self, function)?;
                Ok(numpy::PyArray::from_array(py, &arr).to_object(py))
            }

            pub fn dump_pulses(&self) -> String {
                $crate::pulser::BasePulser::dump_pulses(self)
            }

            pub fn advisories(&self) -> Vec<String> {
                $crate::pulser::BasePulser::advisories(self)
            }
        }
    };
}

#[pymethods]
impl Pulser {
    /// Constructor for the `Pulser` class.
    ///
    /// `config_json` optionally overrides the instrument configuration, see
    /// [`EngineConfig`]. Missing fields keep their defaults.
    ///
    /// # Example (python)
    /// ```python
    /// from pulser_backend import Pulser
    ///
    /// p = Pulser('{"memory_size": 4096}')
    /// p.set_timebase(2e-9)
    /// ```
    #[new]
    #[pyo3(signature = (config_json=None))]
    pub fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json(json)?,
            None => EngineConfig::default(),
        };
        Ok(Self {
            engine: Engine::new(config),
            sink: RecordingSink::new(),
        })
    }

    /// Every command sent to the sink so far, one line each.
    pub fn sink_log(&self) -> Vec<String> {
        self.sink.commands().iter().map(|c| c.to_string()).collect()
    }

    pub fn clear_sink_log(&mut self) {
        self.sink.clear();
    }
}

impl Pulser {
    pub fn sink(&self) -> &RecordingSink {
        &self.sink
    }
}

impl_pulser_boilerplate!(Pulser);
