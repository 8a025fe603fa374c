use pulser_backend::*;

// Dry run of a two-pulse echo sequence with a detection trigger, printing every command.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut engine = Engine::new(EngineConfig::default());
    engine.set_timebase(1.0e-9)?;
    engine.assign_channel(FunctionKind::MicroWave, ChannelId::new(1))?;
    engine.assign_channel(FunctionKind::Detection, ChannelId::TRIGGER_OUT)?;
    for (number, kind, position, length) in [
        (1, FunctionKind::MicroWave, 0, 20),
        (2, FunctionKind::MicroWave, 200, 40),
        (3, FunctionKind::Detection, 400, 1),
    ] {
        engine.create_pulse(number)?;
        engine.declare_pulse_function(number, kind)?;
        engine.declare_pulse_position(number, position)?;
        engine.declare_pulse_length(number, length)?;
    }
    engine.declare_pulse_position_delta(2, 50)?;
    engine.declare_pulse_position_delta(3, 100)?;

    let mut sink = RecordingSink::new();
    engine.test_run_start()?;
    for _ in 0..4 {
        engine.shift_pulse(2)?;
        engine.shift_pulse(3)?;
        engine.update(&mut sink)?;
    }
    engine.test_run_end()?;

    engine.experiment_start(&mut sink)?;
    for _ in 0..4 {
        engine.shift_pulse(2)?;
        engine.shift_pulse(3)?;
        engine.update(&mut sink)?;
        print!("{}", engine.dump_pulses());
    }
    engine.experiment_end(&mut sink)?;

    for command in sink.commands() {
        println!("{}", command);
    }
    Ok(())
}
