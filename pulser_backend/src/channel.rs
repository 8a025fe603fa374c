//! Physical output channels of the pulse generator.
//!
//! Channel `0` is the trigger-out line: it carries a single pulse of instrument-defined
//! length whose position is programmed as a delay rather than written into output
//! memory. Channels `1..=num_channels` are ordinary pulse channels with their own output
//! memory. Channels are created once with the engine and never destroyed.

use std::fmt;

use crate::function::FunctionKind;
use crate::utils::{channel_letter, channel_number};

/// Index of a channel in the engine's fixed channel table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(usize);

impl ChannelId {
    pub const TRIGGER_OUT: ChannelId = ChannelId(0);

    pub fn new(index: usize) -> Self {
        ChannelId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }

    pub fn is_trigger_out(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_trigger_out() {
            write!(f, "TRIG_OUT")
        } else {
            write!(f, "{}{}", channel_letter(*self), channel_number(*self))
        }
    }
}

/// A physical output line.
///
/// The owning function is a back-reference only: functions are owned by the engine's
/// function table.
#[derive(Debug, Clone)]
pub struct Channel {
    pub(crate) id: ChannelId,
    pub(crate) function: Option<FunctionKind>,
    pub(crate) needs_update: bool,
}

impl Channel {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            function: None,
            needs_update: false,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn function(&self) -> Option<FunctionKind> {
        self.function
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }
}
