use proptest::prelude::*;

use pulser_backend::*;
use pulserctrl_backend::{MemoryDevice, WorkerSink};

const MEMORY: Ticks = 200;

fn setup() -> (Engine, WorkerSink<MemoryDevice>) {
    let config = EngineConfig {
        memory_size: MEMORY,
        num_channels: 4,
        ..EngineConfig::default()
    };
    let sink = WorkerSink::spawn(MemoryDevice::new(config.num_channels, config.memory_size)).unwrap();
    let mut engine = Engine::new(config);
    engine.set_timebase(1.0e-8).unwrap();
    engine.set_max_seq_len(120).unwrap();
    engine.assign_channel(FunctionKind::Rf, ChannelId::new(2)).unwrap();
    engine.assign_channel(FunctionKind::Detection, ChannelId::TRIGGER_OUT).unwrap();
    engine.set_function_delay(FunctionKind::Rf, 10).unwrap();
    for (number, position) in [(1, 0), (2, 40), (3, 80)] {
        engine.create_pulse(number).unwrap();
        engine.declare_pulse_function(number, FunctionKind::Rf).unwrap();
        engine.declare_pulse_position(number, position).unwrap();
        engine.declare_pulse_length(number, 10).unwrap();
    }
    engine.create_pulse(4).unwrap();
    engine.declare_pulse_function(4, FunctionKind::Detection).unwrap();
    engine.declare_pulse_position(4, 50).unwrap();
    engine.declare_pulse_length(4, 1).unwrap();
    (engine, sink)
}

fn device_memory(sink: &WorkerSink<MemoryDevice>, len: usize) -> Vec<u8> {
    sink.with_device(move |device| {
        device.memory(ChannelId::new(2)).unwrap().to_vec()[..len].to_vec()
    })
    .unwrap()
}

#[test]
fn experiment_start_writes_the_whole_pattern() {
    let (mut engine, mut sink) = setup();
    engine.experiment_start(&mut sink).unwrap();
    assert_eq!(
        device_memory(&sink, 120),
        engine.waveform(FunctionKind::Rf).to_vec()
    );
    let (running, delay) = sink
        .with_device(|device| (device.is_running(), device.trigger_delay()))
        .unwrap();
    assert!(running);
    assert_eq!(delay, Some(50));
}

#[test]
fn rejected_edit_leaves_device_untouched() {
    let (mut engine, mut sink) = setup();
    engine.experiment_start(&mut sink).unwrap();
    let writes = sink.with_device(|device| device.write_count()).unwrap();

    engine.change_pulse_position(2, 85).unwrap();
    let outcome = engine.update(&mut sink).unwrap();
    assert!(!outcome.is_applied());
    assert_eq!(sink.with_device(|device| device.write_count()).unwrap(), writes);
    assert_eq!(engine.pulse(2).unwrap().position(), Some(40));
}

#[test]
fn trigger_out_moves_on_update() {
    let (mut engine, mut sink) = setup();
    engine.declare_pulse_position_delta(4, 5).unwrap();
    engine.experiment_start(&mut sink).unwrap();
    engine.shift_pulse(4).unwrap();
    assert!(engine.update(&mut sink).unwrap().is_applied());
    assert_eq!(
        sink.with_device(|device| device.trigger_delay()).unwrap(),
        Some(55)
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn device_memory_tracks_every_update(
        edits in prop::collection::vec((1usize..4, 0i64..115, 0i64..15), 1..25)
    ) {
        let (mut engine, mut sink) = setup();
        engine.experiment_start(&mut sink).unwrap();
        for (number, position, length) in edits {
            engine.change_pulse_position(number, position).unwrap();
            engine.change_pulse_length(number, length).unwrap();
            engine.update(&mut sink).unwrap();
            prop_assert_eq!(
                device_memory(&sink, 120),
                engine.waveform(FunctionKind::Rf).to_vec()
            );
        }
        engine.experiment_end(&mut sink).unwrap();
        prop_assert!(!sink.with_device(|device| device.is_running()).unwrap());
    }
}
