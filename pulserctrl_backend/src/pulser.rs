//! # Driving a pulse generator through the `pulser` module
//!
//! This module extends [`pulser_backend::Pulser`] with a live transport: the [`Pulser`]
//! here owns the same [`Engine`] but sends its commands to a device worker thread
//! instead of recording them.
//!
//! ## Relationship with `pulser_backend`:
//!
//! Pulse declaration, test runs, experiment control and live updates all come from
//! [`BasePulser`] through [`pulser_backend::impl_pulser_boilerplate`]. What is added here
//! is the device: pattern memory that can be read back per channel, and a write counter
//! that shows how little a live update sends.
//!
//! ## How to Use:
//!
//! 1. **Initialization:** create a [`Pulser`] with [`Pulser::new`], optionally passing a
//!    JSON configuration of the instrument. A [`MemoryDevice`] of matching size is spawned
//!    on the worker thread.
//! 2. **Sequence design:** declare pulses with the [`BasePulser`] methods.
//! 3. **Run:** start the experiment, change pulses, call `update`, and read the device
//!    memory back with [`Pulser::channel_memory`].

use numpy::PyArray;
use pyo3::prelude::*;

use pulser_backend::*;

use crate::device::MemoryDevice;
use crate::worker::WorkerSink;

/// A [`pulser_backend::Pulser`] whose commands reach a [`MemoryDevice`] on a worker thread.
#[pyclass]
pub struct Pulser {
    engine: Engine,
    sink: WorkerSink<MemoryDevice>,
}

impl Pulser {
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let device = MemoryDevice::new(config.num_channels, config.memory_size);
        Ok(Self {
            sink: WorkerSink::spawn(device)?,
            engine: Engine::new(config),
        })
    }

    pub fn sink(&self) -> &WorkerSink<MemoryDevice> {
        &self.sink
    }

    /// Copy of the device's output memory for `channel`.
    pub fn device_memory(&self, channel: &str) -> Result<Vec<u8>> {
        let id = BasePulser::parse_channel(self, channel)?;
        self.sink
            .with_device(move |device| device.memory(id).map(|m| m.to_vec()))?
            .ok_or_else(|| {
                PulserError::Config(format!("channel {} has no output memory", id))
            })
    }
}

impl_pulser_boilerplate!(Pulser);

#[pymethods]
impl Pulser {
    /// Constructor for the `Pulser` class.
    ///
    /// # Example (python)
    /// ```python
    /// from pulserctrl_backend import Pulser
    ///
    /// p = Pulser('{"memory_size": 4096, "num_channels": 8}')
    /// p.set_timebase(2e-9)
    /// p.assign_channel("MW", "A1")
    /// ```
    #[new]
    #[pyo3(signature = (config_json=None))]
    pub fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json(json)?,
            None => EngineConfig::default(),
        };
        Ok(Self::with_config(config)?)
    }

    /// Returns the device memory of a channel as a numpy array of 0/1 bytes.
    pub fn channel_memory(&self, channel: &str, py: Python) -> PyResult<PyObject> {
        let memory = self.device_memory(channel)?;
        Ok(PyArray::from_vec(py, memory).to_object(py))
    }

    /// Number of memory writes the device has carried out.
    pub fn device_write_count(&self) -> PyResult<usize> {
        Ok(self.sink.with_device(|device| device.write_count())?)
    }

    pub fn device_is_running(&self) -> PyResult<bool> {
        Ok(self.sink.with_device(|device| device.is_running())?)
    }

    pub fn device_trigger_delay(&self) -> PyResult<Option<f64>> {
        let delay = self.sink.with_device(|device| device.trigger_delay())?;
        Ok(delay.map(|ticks| BasePulser::to_seconds(self, ticks)))
    }
}
