//! A [`CommandSink`] that hands every command to a device owned by a background thread.
//!
//! Writes are queued and return immediately. [`CommandSink::operation_complete`] blocks
//! until the worker has carried out everything queued so far and reports the first device
//! error among those commands. Queries run on the worker thread too, so they observe the
//! device after all earlier commands.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, error, info};

use pulser_backend::{ChannelId, CommandSink, PulserError, Result, SinkCommand, Ticks};

use crate::device::PulserDevice;
use crate::progress_chan::{ProgressChan, ProgressRecvr};

type Inspect<D> = Box<dyn FnOnce(&D) + Send + 'static>;

enum WorkerMsg<D> {
    Command(SinkCommand),
    Inspect(Inspect<D>),
    Close,
}

fn worker_gone() -> PulserError {
    PulserError::Device("the device worker has stopped".to_string())
}

pub struct WorkerSink<D: PulserDevice + Send + 'static> {
    sender: Sender<WorkerMsg<D>>,
    progress: ProgressChan,
    handle: Option<JoinHandle<D>>,
}

impl<D: PulserDevice + Send + 'static> WorkerSink<D> {
    /// Moves `device` onto a new worker thread.
    pub fn spawn(device: D) -> Result<Self> {
        let (sender, receiver) = unbounded();
        let progress = ProgressChan::new();
        let recvr = progress.new_recvr();
        let handle = thread::Builder::new()
            .name("pulser-device".into())
            .spawn(move || worker_loop(device, receiver, recvr))
            .map_err(|err| PulserError::Device(format!("failed to spawn the device worker: {}", err)))?;
        Ok(Self {
            sender,
            progress,
            handle: Some(handle),
        })
    }

    fn post(&mut self, command: SinkCommand) -> Result<()> {
        self.progress.post();
        if self.sender.send(WorkerMsg::Command(command)).is_err() {
            self.progress.abandon(worker_gone());
            return Err(worker_gone());
        }
        Ok(())
    }

    /// Number of queued commands the worker has not carried out yet.
    pub fn pending(&self) -> usize {
        self.progress.pending()
    }

    /// Runs `f` against the device on the worker thread, after every command queued so far.
    pub fn with_device<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&D) -> R + Send + 'static,
    {
        let (reply, answer) = bounded(1);
        let inspect: Inspect<D> = Box::new(move |device: &D| {
            // The caller blocks on `answer` until this reply arrives
            reply.send(f(device)).ok();
        });
        self.sender
            .send(WorkerMsg::Inspect(inspect))
            .map_err(|_| worker_gone())?;
        answer.recv().map_err(|_| worker_gone())
    }

    /// Stops the worker after the queued commands and hands the device back.
    pub fn close(mut self) -> Option<D> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<D> {
        let handle = self.handle.take()?;
        if self.sender.send(WorkerMsg::Close).is_err() {
            debug!("device worker already gone at shutdown");
        }
        match handle.join() {
            Ok(device) => Some(device),
            Err(_) => {
                error!("device worker panicked");
                None
            }
        }
    }
}

impl<D: PulserDevice + Send + 'static> Drop for WorkerSink<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<D: PulserDevice>(
    mut device: D,
    receiver: Receiver<WorkerMsg<D>>,
    progress: ProgressRecvr,
) -> D {
    info!("device worker started");
    for msg in receiver.iter() {
        match msg {
            WorkerMsg::Command(command) => {
                let result = apply(&mut device, command);
                if let Err(err) = &result {
                    error!("device rejected '{}': {}", command, err);
                }
                progress.done(result);
            }
            WorkerMsg::Inspect(inspect) => inspect(&device),
            WorkerMsg::Close => break,
        }
    }
    info!("device worker closed");
    device
}

fn apply<D: PulserDevice>(device: &mut D, command: SinkCommand) -> Result<()> {
    match command {
        SinkCommand::SetConstant {
            channel,
            start,
            length,
            state,
        } => device.write_constant(channel, start, length, state),
        SinkCommand::TriggerOut(delay) => device.set_trigger_delay(delay),
        SinkCommand::Run(start) => device.run(start),
        SinkCommand::ChannelState(channel, on) => device.set_output(channel, on),
        SinkCommand::OperationComplete => Ok(()),
    }
}

impl<D: PulserDevice + Send + 'static> CommandSink for WorkerSink<D> {
    fn set_constant(&mut self, channel: ChannelId, start: Ticks, length: Ticks, state: bool) -> Result<()> {
        self.post(SinkCommand::SetConstant {
            channel,
            start,
            length,
            state,
        })
    }

    fn set_trigger_out_pulse(&mut self, delay: Ticks) -> Result<()> {
        self.post(SinkCommand::TriggerOut(delay))
    }

    fn run(&mut self, start: bool) -> Result<()> {
        self.post(SinkCommand::Run(start))
    }

    fn operation_complete(&mut self) -> Result<()> {
        self.progress.wait_all()
    }

    fn channel_state(&mut self, channel: ChannelId) -> Result<bool> {
        self.with_device(move |device| device.output(channel))?
    }

    fn set_channel_state(&mut self, channel: ChannelId, on: bool) -> Result<()> {
        self.post(SinkCommand::ChannelState(channel, on))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::MemoryDevice;

    #[test]
    fn queued_writes_reach_the_device() {
        let mut sink = WorkerSink::spawn(MemoryDevice::new(2, 8)).unwrap();
        let ch = ChannelId::new(1);
        sink.set_constant(ch, 0, 4, true).unwrap();
        sink.set_constant(ch, 1, 2, false).unwrap();
        sink.operation_complete().unwrap();
        assert_eq!(sink.pending(), 0);

        let memory = sink
            .with_device(move |d| d.memory(ch).unwrap().to_vec())
            .unwrap();
        assert_eq!(memory, vec![1, 0, 0, 1, 0, 0, 0, 0]);
        let device = sink.close().unwrap();
        assert_eq!(device.write_count(), 2);
    }

    #[test]
    fn device_error_surfaces_at_completion() {
        let mut sink = WorkerSink::spawn(MemoryDevice::new(2, 8)).unwrap();
        // Queuing succeeds, the device rejects the write later
        sink.set_constant(ChannelId::new(1), 6, 4, true).unwrap();
        assert!(matches!(
            sink.operation_complete(),
            Err(PulserError::Device(_))
        ));
        assert_eq!(sink.operation_complete(), Ok(()));
    }

    #[test]
    fn channel_state_round_trip() {
        let mut sink = WorkerSink::spawn(MemoryDevice::new(2, 8)).unwrap();
        let ch = ChannelId::new(2);
        assert!(!sink.channel_state(ch).unwrap());
        sink.set_channel_state(ch, true).unwrap();
        assert!(sink.channel_state(ch).unwrap());
        assert!(sink.channel_state(ChannelId::new(3)).is_err());
    }
}
