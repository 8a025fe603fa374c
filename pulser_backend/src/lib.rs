use pyo3::prelude::*;

pub mod channel;
pub mod checks;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod function;
pub mod lifecycle;
pub mod pulse;
pub mod pulser;
pub mod registry;
pub mod sink;
pub mod sync;
pub mod timebase;
pub mod utils;

/// The types most users of the engine need.
pub mod prelude {
    pub use crate::channel::{Channel, ChannelId};
    pub use crate::config::EngineConfig;
    pub use crate::diff::{DiffScanner, Run, Sign};
    pub use crate::engine::{Advisory, Engine, RunMode, TriggerMode, TriggerSlope};
    pub use crate::error::{PulserError, Result};
    pub use crate::function::{Function, FunctionKind};
    pub use crate::lifecycle::CommitOutcome;
    pub use crate::pulse::Pulse;
    pub use crate::registry::{PulseId, PulseRegistry};
    pub use crate::sink::{CommandSink, RecordingSink, SinkCommand};
    pub use crate::timebase::{Ticks, Timebase};
}

pub use prelude::*;
pub use pulser::{BasePulser, Pulser};

#[pymodule]
fn pulser_backend(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<Pulser>()?;
    Ok(())
}
