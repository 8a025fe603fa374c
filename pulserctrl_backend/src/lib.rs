//! Live control of a pulse generator, built on [`pulser_backend`].
//!
//! The engine decides which memory ranges change; this crate carries those writes to
//! a device on a background thread:
//!
//! - [`device`]: the [`PulserDevice`] transport trait and the in-memory [`MemoryDevice`].
//! - [`worker`]: [`WorkerSink`], the [`pulser_backend::CommandSink`] that queues commands
//!   to the device thread.
//! - [`progress_chan`]: completion tracking between the two threads.
//! - [`pulser`]: the python-facing [`Pulser`] class.

use pyo3::prelude::*;

pub mod device;
pub mod progress_chan;
pub mod pulser;
pub mod worker;

pub use crate::device::{MemoryDevice, PulserDevice};
pub use crate::pulser::Pulser;
pub use crate::worker::WorkerSink;

#[pymodule]
fn pulserctrl_backend(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<Pulser>()?;
    Ok(())
}
