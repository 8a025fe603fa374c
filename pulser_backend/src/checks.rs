//! Validation of the pulse model.
//!
//! [`Engine::basic_pulse_check`] and [`Engine::basic_functions_check`] run once when a
//! run is set up and build the per-function pulse lists. [`Engine::do_checks`] is the
//! steady-state check run at setup and before every commit: it relies on the function's
//! pulse list being sorted by [`start_compare`], so all active pulses come first.

use tracing::debug;

use crate::engine::{Advisory, Engine, RunMode, TriggerMode};
use crate::error::{PulserError, Result};
use crate::function::FunctionKind;
use crate::pulse::start_compare;
use crate::timebase::Ticks;

impl Engine {
    /// Capacity every active pulse has to fit in, delay included.
    pub fn capacity(&self) -> Ticks {
        match (self.mode, self.seq_len) {
            (RunMode::Experiment, Some(len)) => len,
            _ => self.config.memory_size,
        }
    }

    /// Kinds of all functions currently in use, in table order.
    pub(crate) fn used_functions(&self) -> Vec<FunctionKind> {
        self.functions
            .values()
            .filter(|f| f.is_used)
            .map(|f| f.kind)
            .collect()
    }

    /// Checks every registered pulse is bound to a usable function and files it into that
    /// function's pulse list.
    pub(crate) fn basic_pulse_check(&mut self) -> Result<()> {
        for id in self.registry.ids() {
            let pulse = self.registry.get(id);
            let kind = pulse.function.ok_or(PulserError::NoFunction(pulse.number))?;
            let function = &self.functions[&kind];
            if !function.is_used {
                return Err(PulserError::FunctionNotUsed(kind));
            }
            let channel = function.channel.ok_or(PulserError::NoChannel(kind))?;

            let pulse = self.registry.get_mut(id);
            pulse.channel = Some(channel);
            pulse.refresh();
            pulse.commit();
            let function = &mut self.functions[&kind];
            if !function.pulses.contains(&id) {
                function.pulses.push(id);
            }
        }
        Ok(())
    }

    /// Demotes used functions without pulses and rejects negative delays under an
    /// external trigger.
    pub(crate) fn basic_functions_check(&mut self) -> Result<()> {
        for kind in self.used_functions() {
            let function = &self.functions[&kind];
            if function.pulses.is_empty() {
                self.release_function(kind);
                continue;
            }
            if function.delay - self.neg_delay < 0
                && self.trigger.mode == Some(TriggerMode::External)
            {
                return Err(PulserError::NegativeDelayWithExternalTrigger(kind));
            }
            if function.is_trigger_out()
                && (function.inverted.is_some()
                    || function.high_level.is_some()
                    || function.low_level.is_some())
            {
                return Err(PulserError::Config(format!(
                    "function {} is on the trigger-out channel, which has no level or inversion control",
                    kind
                )));
            }
        }
        Ok(())
    }

    /// Sorts the function's pulses by start position, inactive pulses last. The sort is
    /// stable so inactive pulses keep their relative order.
    pub(crate) fn sort_function(&mut self, kind: FunctionKind) {
        let registry = &self.registry;
        self.functions[&kind]
            .pulses
            .sort_by(|&a, &b| start_compare(registry.get(a), registry.get(b)));
    }

    /// Checks a sorted function for overlaps and capacity. The trigger-out pulse is not
    /// stored in output memory and is exempt from the capacity check.
    ///
    /// The function's running maximum sequence length and its number of active pulses are
    /// only updated when the check succeeds. Touching pulses produce a
    /// [`Advisory::ZeroDistance`].
    pub fn do_checks(&mut self, kind: FunctionKind) -> Result<()> {
        let capacity = self.capacity();
        let function = &self.functions[&kind];
        let delay = function.delay;
        let bounded = !function.is_trigger_out();
        let mut max_len = function.max_seq_len;
        let mut num_active = 0;
        let mut touching = Vec::new();
        let mut prev: Option<(usize, Ticks)> = None;

        for (index, &id) in function.pulses.iter().enumerate() {
            let pulse = self.registry.get(id);
            let Some((position, length)) = pulse.span() else {
                break;
            };
            let end = position + length;
            max_len = max_len.max(end);
            if bounded && delay + end > capacity {
                return Err(PulserError::CapacityExceeded {
                    function: kind,
                    number: pulse.number,
                    end: delay + end,
                    capacity,
                });
            }
            if let Some((prev_number, prev_end)) = prev {
                if prev_end > position {
                    return Err(PulserError::Overlap {
                        function: kind,
                        first: prev_number,
                        second: pulse.number,
                    });
                }
                if prev_end == position {
                    touching.push((prev_number, pulse.number));
                }
            }
            prev = Some((pulse.number, end));
            num_active = index + 1;
        }

        let function = &mut self.functions[&kind];
        function.max_seq_len = max_len;
        function.num_active_pulses = num_active;
        debug!(
            "function {}: {} active pulses, sequence length {}",
            kind, num_active, max_len
        );
        for (first, second) in touching {
            self.advise(Advisory::ZeroDistance {
                function: kind,
                first,
                second,
            });
        }
        Ok(())
    }

    /// Sorts and checks every used function, stopping at the first failure.
    pub(crate) fn check_all(&mut self) -> Result<()> {
        for kind in self.used_functions() {
            if self.functions[&kind].pulses.len() > 1 {
                self.sort_function(kind);
            }
            self.do_checks(kind)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::prelude::*;

    fn engine_with(pulses: &[(usize, Ticks, Ticks)]) -> Engine {
        let mut e = Engine::new(EngineConfig {
            memory_size: 100,
            ..EngineConfig::default()
        });
        e.set_timebase(1.0e-8).unwrap();
        e.assign_channel(FunctionKind::Rf, ChannelId::new(1)).unwrap();
        for &(number, position, length) in pulses {
            e.create_pulse(number).unwrap();
            e.declare_pulse_function(number, FunctionKind::Rf).unwrap();
            e.declare_pulse_position(number, position).unwrap();
            e.declare_pulse_length(number, length).unwrap();
        }
        e
    }

    fn numbers(e: &Engine, kind: FunctionKind) -> Vec<usize> {
        e.function(kind)
            .pulses()
            .iter()
            .map(|&id| e.registry().get(id).number())
            .collect()
    }

    mod basic {
        use super::*;

        #[test]
        fn pulse_without_function() {
            let mut e = engine_with(&[]);
            e.create_pulse(3).unwrap();
            assert_eq!(e.test_run_start(), Err(PulserError::NoFunction(3)));
        }

        #[test]
        fn function_without_pulses_is_released() {
            let mut e = engine_with(&[(1, 0, 10)]);
            e.assign_channel(FunctionKind::Twt, ChannelId::new(2)).unwrap();
            e.test_run_start().unwrap();
            assert!(!e.function(FunctionKind::Twt).is_used());
            assert_eq!(e.function(FunctionKind::Twt).channel(), None);
            assert_eq!(e.channel(ChannelId::new(2)).unwrap().function(), None);
            assert!(e
                .advisories()
                .contains(&Advisory::FunctionUnused(FunctionKind::Twt)));
        }

        #[test]
        fn trigger_out_has_no_levels() {
            let mut e = engine_with(&[]);
            e.assign_channel(FunctionKind::Detection, ChannelId::TRIGGER_OUT).unwrap();
            e.set_function_high_level(FunctionKind::Detection, 1.0).unwrap();
            e.create_pulse(1).unwrap();
            e.declare_pulse_function(1, FunctionKind::Detection).unwrap();
            assert!(matches!(e.test_run_start(), Err(PulserError::Config(_))));
        }
    }

    mod steady_state {
        use super::*;

        #[test]
        fn sorted_with_inactive_last() {
            let mut e = engine_with(&[(1, 50, 5), (2, 10, 5), (3, 30, 0), (4, 20, 5)]);
            e.test_run_start().unwrap();
            assert_eq!(numbers(&e, FunctionKind::Rf), vec![2, 4, 1, 3]);
            assert_eq!(e.function(FunctionKind::Rf).num_active_pulses(), 3);
            assert_eq!(e.function(FunctionKind::Rf).max_seq_len(), 55);
        }

        #[test]
        fn touching_pulses_are_advisory() {
            let mut e = engine_with(&[(1, 0, 10), (2, 10, 10)]);
            e.test_run_start().unwrap();
            assert_eq!(
                e.advisories(),
                &[Advisory::ZeroDistance {
                    function: FunctionKind::Rf,
                    first: 1,
                    second: 2
                }]
            );
        }

        #[test]
        fn overlap_is_fatal() {
            let mut e = engine_with(&[(1, 0, 10), (2, 5, 10)]);
            assert_eq!(
                e.test_run_start(),
                Err(PulserError::Overlap {
                    function: FunctionKind::Rf,
                    first: 1,
                    second: 2
                })
            );
        }

        #[test]
        fn capacity_includes_delay() {
            let mut e = engine_with(&[(1, 80, 10)]);
            e.set_function_delay(FunctionKind::Rf, 15).unwrap();
            assert!(matches!(
                e.test_run_start(),
                Err(PulserError::CapacityExceeded {
                    end: 105,
                    capacity: 100,
                    ..
                })
            ));
        }

        #[test]
        fn failed_check_keeps_previous_maximum() {
            let mut e = engine_with(&[(1, 10, 10)]);
            e.test_run_start().unwrap();
            assert_eq!(e.function(FunctionKind::Rf).max_seq_len(), 20);
            e.change_pulse_position(1, 95).unwrap();
            assert!(e.check_all().is_err());
            assert_eq!(e.function(FunctionKind::Rf).max_seq_len(), 20);
            e.change_pulse_position(1, 40).unwrap();
            e.check_all().unwrap();
            assert_eq!(e.function(FunctionKind::Rf).max_seq_len(), 50);
        }
    }
}
