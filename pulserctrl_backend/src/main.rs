use pulser_backend::*;
use pulserctrl_backend::{MemoryDevice, WorkerSink};

// Scans one microwave pulse between two RF pulses and reports how many writes each step costs.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = EngineConfig {
        memory_size: 4096,
        ..EngineConfig::default()
    };
    let mut sink = WorkerSink::spawn(MemoryDevice::new(config.num_channels, config.memory_size))?;
    let mut engine = Engine::new(config);
    engine.set_timebase(2.0e-9)?;
    engine.assign_channel(FunctionKind::MicroWave, ChannelId::new(1))?;
    engine.assign_channel(FunctionKind::Rf, ChannelId::new(2))?;
    engine.set_max_seq_len(2000)?;
    for (number, kind, position, length) in [
        (1, FunctionKind::Rf, 0, 500),
        (2, FunctionKind::MicroWave, 600, 50),
        (3, FunctionKind::Rf, 1200, 500),
    ] {
        engine.create_pulse(number)?;
        engine.declare_pulse_function(number, kind)?;
        engine.declare_pulse_position(number, position)?;
        engine.declare_pulse_length(number, length)?;
    }
    engine.declare_pulse_position_delta(2, 25)?;

    engine.experiment_start(&mut sink)?;
    for step in 0..20 {
        engine.shift_pulse(2)?;
        let before = sink.with_device(|device| device.write_count())?;
        let outcome = engine.update(&mut sink)?;
        let after = sink.with_device(|device| device.write_count())?;
        println!("step {:2}: {:?}, {} writes", step, outcome, after - before);
    }
    engine.experiment_end(&mut sink)?;

    for advisory in engine.take_advisories() {
        println!("{}", advisory);
    }
    Ok(())
}
