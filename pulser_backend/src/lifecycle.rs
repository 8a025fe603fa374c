//! Run orchestration: test runs, experiments and the update cycle between them.
//!
//! A test run validates the pattern and every edit made during it without touching the
//! instrument; at its end the pulses are restored to their initial values and pulses
//! that never became active are pruned. An experiment fixes the sequence length, writes
//! the complete pattern once and then commits edits incrementally. A live edit that
//! fails validation is rolled back and the instrument keeps the previous pattern.

use tracing::{info, warn};

use crate::engine::{Advisory, Engine, RunMode};
use crate::error::{PulserError, Result};
use crate::sink::CommandSink;

/// Result of one update cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The edits were accepted; `wrote` tells whether any hardware write was needed.
    Applied { wrote: bool },
    /// The edits were rejected and undone.
    RolledBack(PulserError),
}

impl CommitOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommitOutcome::Applied { .. })
    }
}

impl Engine {
    /// Builds and checks the pulse lists. Runs once, before the first test run or
    /// experiment.
    fn setup(&mut self) -> Result<()> {
        if !self.timebase.is_set() {
            return Err(PulserError::NoTimebase);
        }
        self.basic_pulse_check()?;
        self.basic_functions_check()?;
        for kind in self.used_functions() {
            self.sort_function(kind);
            self.do_checks(kind)?;
        }
        self.is_setup = true;
        Ok(())
    }

    pub fn test_run_start(&mut self) -> Result<()> {
        if self.mode != RunMode::Preparation || self.is_setup {
            return Err(PulserError::WrongPhase("test run start"));
        }
        info!("test run starting with {} pulses", self.registry.len());
        self.mode = RunMode::TestRun;
        if let Err(err) = self.setup() {
            self.mode = RunMode::Preparation;
            return Err(err);
        }
        Ok(())
    }

    /// Ends the test run with a full reset: pulses that never became active are deleted
    /// (unless all pulses are to be kept), all others return to their initial values.
    pub fn test_run_end(&mut self) -> Result<()> {
        if self.mode != RunMode::TestRun {
            return Err(PulserError::WrongPhase("test run end"));
        }
        self.full_reset();
        self.mode = RunMode::Preparation;
        info!("test run finished, {} pulses kept", self.registry.len());
        Ok(())
    }

    fn full_reset(&mut self) {
        for id in self.registry.ids() {
            let pulse = self.registry.get(id);
            if !pulse.has_been_active && !self.keep_all {
                let number = pulse.number;
                self.advise(Advisory::PulseNeverUsed(number));
                self.delete_pulse(id);
            } else {
                self.registry.get_mut(id).restore_initial();
            }
        }
        // Restoring changes which pulses are active
        for kind in self.used_functions() {
            self.sort_function(kind);
            if let Err(err) = self.do_checks(kind) {
                warn!("initial pattern of {} no longer validates: {}", kind, err);
            }
        }
    }

    /// Validates the pattern and writes it to the instrument, then starts it.
    ///
    /// The sequence length is fixed here to [`Engine::max_sequence_length`]; edits made
    /// during the experiment have to fit into it.
    pub fn experiment_start(&mut self, sink: &mut dyn CommandSink) -> Result<()> {
        if self.mode != RunMode::Preparation {
            return Err(PulserError::WrongPhase("experiment start"));
        }
        if !self.is_setup {
            self.setup()?;
        }
        let seq_len = self.max_sequence_length();
        self.seq_len = Some(seq_len);
        self.mode = RunMode::Experiment;
        info!("experiment starting, sequence length {} ticks", seq_len);

        if let Err(err) = self.check_all() {
            self.mode = RunMode::Preparation;
            return Err(err);
        }
        for kind in self.used_functions() {
            self.write_pattern(kind, sink)?;
        }
        sink.operation_complete()?;
        sink.run(true)?;
        self.is_running = true;
        Ok(())
    }

    pub fn experiment_end(&mut self, sink: &mut dyn CommandSink) -> Result<()> {
        if self.mode != RunMode::Experiment {
            return Err(PulserError::WrongPhase("experiment end"));
        }
        if self.is_running {
            sink.run(false)?;
            self.is_running = false;
        }
        self.mode = RunMode::Preparation;
        info!("experiment finished");
        Ok(())
    }

    /// Validates all pending edits and commits them.
    ///
    /// During a test run a validation failure is returned as an error. During an
    /// experiment it rolls every pulse back to its last committed state and is reported
    /// as [`CommitOutcome::RolledBack`]; nothing is written in that case. If anything is
    /// written, a running instrument is stopped for the write and restarted once the
    /// device has confirmed completion.
    pub fn update(&mut self, sink: &mut dyn CommandSink) -> Result<CommitOutcome> {
        match self.mode {
            RunMode::Preparation => Err(PulserError::WrongPhase("update")),
            RunMode::TestRun => {
                self.check_all()?;
                for kind in self.used_functions() {
                    self.commit_function(kind, sink)?;
                }
                Ok(CommitOutcome::Applied { wrote: false })
            }
            RunMode::Experiment => {
                if let Err(err) = self.check_all() {
                    if !err.is_validation() {
                        return Err(err);
                    }
                    warn!("edit rejected: {}", err);
                    self.rollback_all();
                    return Ok(CommitOutcome::RolledBack(err));
                }
                if !self.has_pending_updates() {
                    return Ok(CommitOutcome::Applied { wrote: false });
                }
                let was_running = self.is_running;
                if was_running {
                    sink.run(false)?;
                    self.is_running = false;
                }
                let written = self.write_pending(sink);
                // The instrument resumes with whatever it holds, even after a failed write
                let restarted = if was_running {
                    sink.run(true).map(|()| self.is_running = true)
                } else {
                    Ok(())
                };
                if let Err(err) = &written {
                    warn!("writing the pending edits failed: {}", err);
                }
                let wrote = written?;
                restarted?;
                Ok(CommitOutcome::Applied { wrote })
            }
        }
    }

    /// Commits every used function and waits for the device if anything was written.
    fn write_pending(&mut self, sink: &mut dyn CommandSink) -> Result<bool> {
        let mut wrote = false;
        for kind in self.used_functions() {
            wrote |= self.commit_function(kind, sink)?;
        }
        if wrote {
            sink.operation_complete()?;
        }
        Ok(wrote)
    }

    /// Undoes every uncommitted position and length change. Delta requests survive.
    fn rollback_all(&mut self) {
        for id in self.registry.ids() {
            self.registry.get_mut(id).rollback();
        }
        for kind in self.used_functions() {
            self.sort_function(kind);
            if let Err(err) = self.do_checks(kind) {
                warn!("committed pattern of {} no longer validates: {}", kind, err);
            }
        }
        info!("all pulses rolled back to the last committed pattern");
    }
}
