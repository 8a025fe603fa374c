//! Synchronization of the pulse model with the instrument's output memory.
//!
//! For every function with changed pulses, the old and new logical output of its channel
//! are painted into two bitmaps of the experiment's sequence length. Only pulses flagged
//! `needs_update` are painted, so the bitmaps differ exactly where hardware has to
//! change, and [`DiffScanner`] turns those differences into the minimal list of
//! contiguous writes. The trigger-out channel carries a single pulse and is programmed
//! by position instead.

use ndarray::Array1;
use tracing::debug;

use crate::channel::ChannelId;
use crate::diff::{paint, DiffScanner, Run};
use crate::engine::{Engine, RunMode};
use crate::error::Result;
use crate::function::FunctionKind;
use crate::registry::PulseId;
use crate::sink::CommandSink;

impl Engine {
    /// Commits the function's pending pulse changes.
    ///
    /// During a test run this only clears the bookkeeping. Otherwise the changes are
    /// written through `sink`; the return value tells whether any command was emitted.
    pub(crate) fn commit_function(
        &mut self,
        kind: FunctionKind,
        sink: &mut dyn CommandSink,
    ) -> Result<bool> {
        let function = &self.functions[&kind];
        let ids = function.pulses.clone();
        if self.mode == RunMode::TestRun {
            for id in ids {
                self.registry.get_mut(id).commit();
            }
            return Ok(false);
        }
        let Some(channel) = function.channel else {
            return Ok(false);
        };
        if channel.is_trigger_out() {
            return self.commit_trigger_out(kind, channel, &ids, sink);
        }

        let delay = function.delay;
        let len = self.sequence_length().max(0) as usize;
        let mut before = Array1::<u8>::zeros(len);
        let mut after = Array1::<u8>::zeros(len);
        let mut pending = Vec::new();
        for id in ids {
            let pulse = self.registry.get(id);
            if !pulse.needs_update() {
                continue;
            }
            if let Some((position, length)) = pulse.committed_span() {
                paint(&mut before, delay + position, length);
            }
            if let Some((position, length)) = pulse.span() {
                paint(&mut after, delay + position, length);
            }
            pending.push(id);
        }
        if pending.is_empty() {
            return Ok(false);
        }

        // Pulses stay pending until the sink took every write, so a failed commit is
        // repeated in full by the next one.
        self.channels[channel.index()].needs_update = true;
        let wrote = emit(channel, DiffScanner::new(before.view(), after.view()), sink)?;
        for id in pending {
            self.registry.get_mut(id).commit();
        }
        self.channels[channel.index()].needs_update = false;
        Ok(wrote > 0)
    }

    fn commit_trigger_out(
        &mut self,
        kind: FunctionKind,
        channel: ChannelId,
        ids: &[PulseId],
        sink: &mut dyn CommandSink,
    ) -> Result<bool> {
        let Some(&id) = ids.first() else {
            return Ok(false);
        };
        let delay = self.functions[&kind].delay;
        let pulse = self.registry.get(id);
        if !pulse.needs_update() {
            return Ok(false);
        }
        let was_active = pulse.was_active();
        let span = pulse.span();
        match span {
            Some((position, _)) => {
                if !was_active {
                    debug!("{} on", channel);
                    sink.set_channel_state(channel, true)?;
                }
                debug!("{} moved to {}", channel, delay + position);
                sink.set_trigger_out_pulse(delay + position)?;
            }
            None => {
                debug!("{} off", channel);
                sink.set_channel_state(channel, false)?;
            }
        }
        self.registry.get_mut(id).commit();
        Ok(true)
    }

    /// Writes the function's complete pattern into a cleared channel memory and commits
    /// all its pulses. Used when an experiment starts.
    pub(crate) fn write_pattern(
        &mut self,
        kind: FunctionKind,
        sink: &mut dyn CommandSink,
    ) -> Result<()> {
        let function = &self.functions[&kind];
        let Some(channel) = function.channel else {
            return Ok(());
        };
        let ids = function.pulses.clone();
        let delay = function.delay;

        if channel.is_trigger_out() {
            let position = ids
                .first()
                .and_then(|&id| self.registry.get(id).span())
                .map(|(position, _)| position);
            for &id in &ids {
                self.registry.get_mut(id).commit();
            }
            sink.set_channel_state(channel, position.is_some())?;
            if let Some(position) = position {
                sink.set_trigger_out_pulse(delay + position)?;
            }
            return Ok(());
        }

        let seq_len = self.sequence_length().max(0);
        let before = Array1::<u8>::zeros(seq_len as usize);
        let mut after = Array1::<u8>::zeros(seq_len as usize);
        for &id in &ids {
            let pulse = self.registry.get_mut(id);
            if let Some((position, length)) = pulse.span() {
                paint(&mut after, delay + position, length);
            }
            pulse.commit();
        }
        if seq_len > 0 {
            sink.set_constant(channel, 0, seq_len, false)?;
        }
        emit(channel, DiffScanner::new(before.view(), after.view()), sink)?;
        sink.set_channel_state(channel, true)?;
        Ok(())
    }

    /// Whether any pulse of a used function waits for a commit.
    pub(crate) fn has_pending_updates(&self) -> bool {
        self.functions
            .values()
            .filter(|f| f.is_used)
            .flat_map(|f| f.pulses.iter())
            .any(|&id| self.registry.get(id).needs_update())
    }
}

/// Hands every run to the sink, left to right. Returns the number of writes.
fn emit(
    channel: ChannelId,
    runs: impl Iterator<Item = Run>,
    sink: &mut dyn CommandSink,
) -> Result<usize> {
    let mut count = 0;
    for run in runs {
        debug!("{} {}", channel, run);
        sink.set_constant(channel, run.start, run.length, run.sign.state())?;
        count += 1;
    }
    Ok(count)
}
