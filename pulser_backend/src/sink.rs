//! The boundary between the engine and the instrument transport.
//!
//! The engine never talks to hardware directly. Every write it decides on goes through a
//! [`CommandSink`]; the transport behind it (a GPIB driver, a worker thread, a recorder)
//! is someone else's concern.

use std::collections::HashMap;
use std::fmt;

use crate::channel::ChannelId;
use crate::error::Result;
use crate::timebase::Ticks;

pub trait CommandSink {
    /// Writes `state` into the channel's output memory over `[start, start + length)`.
    fn set_constant(&mut self, channel: ChannelId, start: Ticks, length: Ticks, state: bool) -> Result<()>;
    /// Moves the single fixed-length trigger-out pulse to `delay` ticks.
    fn set_trigger_out_pulse(&mut self, delay: Ticks) -> Result<()>;
    /// Starts or stops pattern generation.
    fn run(&mut self, start: bool) -> Result<()>;
    /// Blocks until the device has carried out every command sent so far.
    fn operation_complete(&mut self) -> Result<()>;
    fn channel_state(&mut self, channel: ChannelId) -> Result<bool>;
    fn set_channel_state(&mut self, channel: ChannelId, on: bool) -> Result<()>;
}

impl<T: CommandSink + ?Sized> CommandSink for Box<T> {
    fn set_constant(&mut self, channel: ChannelId, start: Ticks, length: Ticks, state: bool) -> Result<()> {
        (**self).set_constant(channel, start, length, state)
    }
    fn set_trigger_out_pulse(&mut self, delay: Ticks) -> Result<()> {
        (**self).set_trigger_out_pulse(delay)
    }
    fn run(&mut self, start: bool) -> Result<()> {
        (**self).run(start)
    }
    fn operation_complete(&mut self) -> Result<()> {
        (**self).operation_complete()
    }
    fn channel_state(&mut self, channel: ChannelId) -> Result<bool> {
        (**self).channel_state(channel)
    }
    fn set_channel_state(&mut self, channel: ChannelId, on: bool) -> Result<()> {
        (**self).set_channel_state(channel, on)
    }
}

/// A command as seen by a [`CommandSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkCommand {
    SetConstant {
        channel: ChannelId,
        start: Ticks,
        length: Ticks,
        state: bool,
    },
    TriggerOut(Ticks),
    Run(bool),
    OperationComplete,
    ChannelState(ChannelId, bool),
}

impl SinkCommand {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            SinkCommand::SetConstant { .. } | SinkCommand::TriggerOut(_)
        )
    }
}

impl fmt::Display for SinkCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkCommand::SetConstant {
                channel,
                start,
                length,
                state,
            } => write!(
                f,
                "{} {} {} {}",
                channel,
                if *state { "SET" } else { "RESET" },
                start,
                length
            ),
            SinkCommand::TriggerOut(delay) => write!(f, "TRIG_OUT {}", delay),
            SinkCommand::Run(start) => write!(f, "RUN {}", if *start { "ON" } else { "OFF" }),
            SinkCommand::OperationComplete => write!(f, "*OPC"),
            SinkCommand::ChannelState(channel, on) => {
                write!(f, "{} OUTPUT {}", channel, if *on { "ON" } else { "OFF" })
            }
        }
    }
}

/// Sink that performs no I/O and remembers every command, for dry runs and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: Vec<SinkCommand>,
    outputs: HashMap<ChannelId, bool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[SinkCommand] {
        &self.commands
    }

    /// Only the commands that change output memory or the trigger-out position.
    pub fn writes(&self) -> Vec<SinkCommand> {
        self.commands.iter().copied().filter(|c| c.is_write()).collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl CommandSink for RecordingSink {
    fn set_constant(&mut self, channel: ChannelId, start: Ticks, length: Ticks, state: bool) -> Result<()> {
        self.commands.push(SinkCommand::SetConstant {
            channel,
            start,
            length,
            state,
        });
        Ok(())
    }
    fn set_trigger_out_pulse(&mut self, delay: Ticks) -> Result<()> {
        self.commands.push(SinkCommand::TriggerOut(delay));
        Ok(())
    }
    fn run(&mut self, start: bool) -> Result<()> {
        self.commands.push(SinkCommand::Run(start));
        Ok(())
    }
    fn operation_complete(&mut self) -> Result<()> {
        self.commands.push(SinkCommand::OperationComplete);
        Ok(())
    }
    fn channel_state(&mut self, channel: ChannelId) -> Result<bool> {
        Ok(self.outputs.get(&channel).copied().unwrap_or(false))
    }
    fn set_channel_state(&mut self, channel: ChannelId, on: bool) -> Result<()> {
        self.outputs.insert(channel, on);
        self.commands.push(SinkCommand::ChannelState(channel, on));
        Ok(())
    }
}
