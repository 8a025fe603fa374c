//! Transport-level view of a pulse generator.
//!
//! [`PulserDevice`] is what a worker thread drives: raw memory writes, the trigger-out
//! delay, output switches and run control. [`MemoryDevice`] models the instrument in
//! memory and is what the tests and the python class run against.

use ndarray::{s, Array1, ArrayView1};

use pulser_backend::{ChannelId, PulserError, Result, Ticks};

pub trait PulserDevice {
    fn write_constant(&mut self, channel: ChannelId, start: Ticks, length: Ticks, state: bool) -> Result<()>;
    fn set_trigger_delay(&mut self, delay: Ticks) -> Result<()>;
    fn run(&mut self, start: bool) -> Result<()>;
    fn output(&self, channel: ChannelId) -> Result<bool>;
    fn set_output(&mut self, channel: ChannelId, on: bool) -> Result<()>;
}

/// An instrument with one byte per tick of output memory on every pulse channel.
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    memory_size: Ticks,
    // Index 0 is the trigger-out channel and has no memory
    memory: Vec<Array1<u8>>,
    outputs: Vec<bool>,
    trigger_delay: Option<Ticks>,
    running: bool,
    writes: usize,
}

impl MemoryDevice {
    pub fn new(num_channels: usize, memory_size: Ticks) -> Self {
        let memory = (0..=num_channels)
            .map(|index| {
                let len = if index == 0 { 0 } else { memory_size.max(0) as usize };
                Array1::zeros(len)
            })
            .collect();
        Self {
            memory_size,
            memory,
            outputs: vec![false; num_channels + 1],
            trigger_delay: None,
            running: false,
            writes: 0,
        }
    }

    fn index(&self, channel: ChannelId) -> Result<usize> {
        if channel.index() < self.outputs.len() {
            Ok(channel.index())
        } else {
            Err(PulserError::Device(format!("no channel {}", channel)))
        }
    }

    pub fn memory(&self, channel: ChannelId) -> Option<ArrayView1<'_, u8>> {
        if channel.is_trigger_out() {
            return None;
        }
        self.memory.get(channel.index()).map(|m| m.view())
    }

    pub fn trigger_delay(&self) -> Option<Ticks> {
        self.trigger_delay
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of memory writes carried out so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl PulserDevice for MemoryDevice {
    fn write_constant(&mut self, channel: ChannelId, start: Ticks, length: Ticks, state: bool) -> Result<()> {
        let index = self.index(channel)?;
        if channel.is_trigger_out() {
            return Err(PulserError::Device(
                "the trigger-out channel has no output memory".to_string(),
            ));
        }
        if start < 0 || length < 0 || start + length > self.memory_size {
            return Err(PulserError::Device(format!(
                "write of {} ticks at {} exceeds the memory of {} ticks",
                length, start, self.memory_size
            )));
        }
        self.memory[index]
            .slice_mut(s![start as usize..(start + length) as usize])
            .fill(u8::from(state));
        self.writes += 1;
        Ok(())
    }

    fn set_trigger_delay(&mut self, delay: Ticks) -> Result<()> {
        if delay < 0 {
            return Err(PulserError::Device(format!("negative trigger delay {}", delay)));
        }
        self.trigger_delay = Some(delay);
        Ok(())
    }

    fn run(&mut self, start: bool) -> Result<()> {
        self.running = start;
        Ok(())
    }

    fn output(&self, channel: ChannelId) -> Result<bool> {
        Ok(self.outputs[self.index(channel)?])
    }

    fn set_output(&mut self, channel: ChannelId, on: bool) -> Result<()> {
        let index = self.index(channel)?;
        self.outputs[index] = on;
        Ok(())
    }
}
