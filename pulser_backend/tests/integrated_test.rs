use proptest::prelude::*;

use pulser_backend::*;

/// Replays the recorded memory writes of one channel the way the instrument would.
fn replay(sink: &RecordingSink, channel: ChannelId, len: usize) -> Vec<u8> {
    let mut memory = vec![0u8; len];
    for command in sink.commands() {
        if let SinkCommand::SetConstant {
            channel: target,
            start,
            length,
            state,
        } = *command
        {
            if target == channel {
                for cell in &mut memory[start as usize..(start + length) as usize] {
                    *cell = u8::from(state);
                }
            }
        }
    }
    memory
}

fn pulser() -> Pulser {
    let mut p = Pulser::new(None).unwrap();
    BasePulser::set_timebase(&mut p, 2.0e-9).unwrap();
    BasePulser::assign_channel(&mut p, "MW", "A1").unwrap();
    BasePulser::assign_channel(&mut p, "RF", "A2").unwrap();
    p
}

fn add(p: &mut Pulser, number: usize, function: &str, position: f64, length: f64) {
    BasePulser::create_pulse(p, number).unwrap();
    BasePulser::set_pulse_function(p, number, function).unwrap();
    BasePulser::set_pulse_position(p, number, position).unwrap();
    BasePulser::set_pulse_length(p, number, length).unwrap();
}

#[test]
fn quantized_pulse_is_active() {
    let mut p = pulser();
    add(&mut p, 1, "MW", 10.0e-9, 4.0e-9);
    let pulse = p.engine().pulse(1).unwrap();
    assert_eq!(pulse.position(), Some(5));
    assert_eq!(pulse.length(), Some(2));
    assert!(pulse.is_active());
}

#[test]
fn touching_pulses_warn_only() {
    let mut p = pulser();
    add(&mut p, 1, "MW", 0.0, 20.0e-9);
    add(&mut p, 2, "MW", 20.0e-9, 20.0e-9);
    add(&mut p, 3, "RF", 0.0, 20.0e-9);
    assert_eq!(BasePulser::test_run_start(&mut p), Ok(()));
    assert_eq!(
        p.engine().advisories(),
        &[Advisory::ZeroDistance {
            function: FunctionKind::MicroWave,
            first: 1,
            second: 2
        }]
    );
}

#[test]
fn overlapping_pulses_fail_without_commands() {
    let mut p = pulser();
    add(&mut p, 1, "MW", 0.0, 20.0e-9);
    add(&mut p, 2, "MW", 10.0e-9, 20.0e-9);
    assert!(matches!(
        BasePulser::experiment_start(&mut p),
        Err(PulserError::Overlap { .. })
    ));
    assert!(p.sink().commands().is_empty());
}

#[test]
fn live_shift_is_two_runs() {
    let mut p = pulser();
    BasePulser::set_max_seq_len(&mut p, 2.0e-6).unwrap();
    add(&mut p, 1, "MW", 200.0e-9, 40.0e-9);
    BasePulser::set_pulse_position_delta(&mut p, 1, 100.0e-9).unwrap();
    BasePulser::experiment_start(&mut p).unwrap();
    assert_eq!(p.engine().capacity(), 1000);
    p.clear_sink_log();

    BasePulser::shift_pulse(&mut p, 1).unwrap();
    assert!(BasePulser::update(&mut p).unwrap().is_applied());
    let channel = ChannelId::new(1);
    assert_eq!(
        p.sink().writes(),
        vec![
            SinkCommand::SetConstant { channel, start: 100, length: 20, state: false },
            SinkCommand::SetConstant { channel, start: 150, length: 20, state: true },
        ]
    );
}

#[test]
fn unused_pulse_pruned_after_test_run() {
    let mut p = pulser();
    add(&mut p, 1, "MW", 0.0, 20.0e-9);
    add(&mut p, 2, "RF", 0.0, 0.0);
    BasePulser::test_run_start(&mut p).unwrap();
    BasePulser::test_run_end(&mut p).unwrap();
    assert!(BasePulser::pulse_position(&p, 2).is_err());
    assert!(p
        .advisories()
        .contains(&"pulse #2 is never used and has been deleted".to_string()));
}

#[test]
fn keep_all_spares_unused_pulse() {
    let mut p = pulser();
    p.set_keep_all_pulses(true);
    add(&mut p, 1, "MW", 0.0, 20.0e-9);
    add(&mut p, 2, "RF", 0.0, 0.0);
    BasePulser::test_run_start(&mut p).unwrap();
    BasePulser::test_run_end(&mut p).unwrap();
    assert!(!BasePulser::pulse_is_active(&p, 2).unwrap());
}

#[test]
fn test_run_then_experiment() {
    let mut p = pulser();
    add(&mut p, 1, "MW", 0.0, 20.0e-9);
    add(&mut p, 2, "RF", 100.0e-9, 20.0e-9);
    BasePulser::set_pulse_position_delta(&mut p, 2, 100.0e-9).unwrap();

    BasePulser::test_run_start(&mut p).unwrap();
    for _ in 0..3 {
        BasePulser::shift_pulse(&mut p, 2).unwrap();
        assert!(BasePulser::update(&mut p).unwrap().is_applied());
    }
    BasePulser::test_run_end(&mut p).unwrap();
    // The test run never touches the instrument
    assert!(p.sink().commands().is_empty());
    assert_eq!(p.engine().max_sequence_length(), 210);

    BasePulser::experiment_start(&mut p).unwrap();
    for _ in 0..3 {
        BasePulser::shift_pulse(&mut p, 2).unwrap();
        assert!(BasePulser::update(&mut p).unwrap().is_applied());
    }
    // One step further than the test run explored does not fit
    BasePulser::shift_pulse(&mut p, 2).unwrap();
    assert!(!BasePulser::update(&mut p).unwrap().is_applied());
    assert_eq!(p.engine().pulse(2).unwrap().position(), Some(200));

    let memory = replay(p.sink(), ChannelId::new(2), 210);
    assert_eq!(memory, BasePulser::waveform(&p, "RF").unwrap().to_vec());
    BasePulser::experiment_end(&mut p).unwrap();
}

proptest! {
    #[test]
    fn device_memory_follows_the_model(
        edits in prop::collection::vec((1usize..4, 0i64..96, 0i64..12), 1..40)
    ) {
        let mut engine = Engine::new(EngineConfig::default());
        engine.set_timebase(1.0e-8).unwrap();
        engine.set_max_seq_len(100).unwrap();
        engine.assign_channel(FunctionKind::Rf, ChannelId::new(3)).unwrap();
        for (number, position) in [(1, 0), (2, 30), (3, 60)] {
            engine.create_pulse(number).unwrap();
            engine.declare_pulse_function(number, FunctionKind::Rf).unwrap();
            engine.declare_pulse_position(number, position).unwrap();
            engine.declare_pulse_length(number, 5).unwrap();
        }
        let mut sink = RecordingSink::new();
        engine.experiment_start(&mut sink).unwrap();

        for (number, position, length) in edits {
            engine.change_pulse_position(number, position).unwrap();
            engine.change_pulse_length(number, length).unwrap();
            let outcome = engine.update(&mut sink).unwrap();

            let memory = replay(&sink, ChannelId::new(3), 100);
            prop_assert_eq!(memory, engine.waveform(FunctionKind::Rf).to_vec());
            if outcome.is_applied() {
                let function = engine.function(FunctionKind::Rf);
                let spans: Vec<(Ticks, Ticks)> = function
                    .pulses()
                    .iter()
                    .filter_map(|&id| engine.registry().get(id).span())
                    .collect();
                for pair in spans.windows(2) {
                    prop_assert!(pair[0].0 + pair[0].1 <= pair[1].0);
                }
                for (position, length) in spans {
                    prop_assert!(position + length <= 100);
                }
            }
            prop_assert!(engine.registry().iter().all(|pulse| !pulse.needs_update()));
        }
    }
}
