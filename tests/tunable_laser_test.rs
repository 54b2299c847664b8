//! Driver behaviour against the simulated laser

use tunable_laser::adapters::{MockResourceManager, SimulatedLaser};
use tunable_laser::config::DEFAULT_RESOURCE;
use tunable_laser::instrument::{SweepMode, TriggerOutput, TunableLaser, DEFAULT_SWEEP_CYCLES};
use tunable_laser::LaserError;

fn connect(device: SimulatedLaser) -> (MockResourceManager, TunableLaser) {
    let manager = MockResourceManager::with_device(device);
    let mut laser = TunableLaser::new().with_manager(manager.clone());
    laser.open_default().unwrap();
    manager.with_laser(|l| l.clear_commands());
    (manager, laser)
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {} got {}",
        expected,
        actual
    );
}

#[test]
fn test_open_returns_identity() {
    let manager = MockResourceManager::new();
    let mut laser = TunableLaser::new().with_manager(manager.clone());
    let idn = laser.open(DEFAULT_RESOURCE).unwrap();

    assert!(idn.contains("N7778C"));
    assert_eq!(laser.identity(), Some(idn.as_str()));
    assert!(laser.is_connected());
    assert_eq!(manager.commands(), vec!["*IDN?".to_string()]);
    assert_eq!(manager.opened(), vec![DEFAULT_RESOURCE.to_string()]);
}

#[test]
fn test_wavelength_round_trip() {
    let (_manager, mut laser) = connect(SimulatedLaser::new());
    for nm in [1460.0, 1500.25, 1550.0, 1619.999] {
        laser.set_wavelength(nm).unwrap();
        assert_close(laser.wavelength().unwrap(), nm);
        assert_close(laser.cached_wavelength().unwrap(), nm);
    }
}

#[test]
fn test_set_wavelength_only_writes() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    laser.set_wavelength(1550.0).unwrap();
    assert_eq!(
        manager.commands(),
        vec![":SOURce0:WAVelength 1550NM".to_string()]
    );
    assert_eq!(laser.cached_wavelength(), None);
}

#[test]
fn test_wavelength_limits() {
    let (_manager, mut laser) = connect(SimulatedLaser::new());
    let (min, max) = laser.wavelength_limits().unwrap();
    assert!(min <= max);
    assert_close(min, 1450.0);
    assert_close(max, 1650.0);

    let (_manager, mut laser) = connect(SimulatedLaser::new().with_tuning_range(1500.0, 1600.0));
    let (min, max) = laser.wavelength_limits().unwrap();
    assert_close(min, 1500.0);
    assert_close(max, 1600.0);
}

#[test]
fn test_out_of_range_wavelength_reads_back_clamped() {
    let (_manager, mut laser) = connect(SimulatedLaser::new().with_tuning_range(1500.0, 1600.0));
    laser.set_wavelength(1700.0).unwrap();
    assert_close(laser.wavelength().unwrap(), 1600.0);
}

#[test]
fn test_trigger_round_trip() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    for trigger in TriggerOutput::ALL {
        laser.set_output_trigger(trigger).unwrap();
        assert_eq!(laser.output_trigger().unwrap(), trigger);
    }
    assert!(manager
        .commands()
        .contains(&":TRIG0:OUTP SWFINISHED".to_string()));
}

#[test]
fn test_trigger_response_is_case_insensitive() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    manager.with_laser(|l| l.set_response(":TRIG0:OUTP?", "stFinished"));
    assert_eq!(laser.output_trigger().unwrap(), TriggerOutput::StFinished);
}

#[test]
fn test_sweep_mode_round_trip() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    for mode in SweepMode::ALL {
        laser.set_sweep_mode(mode).unwrap();
        assert_eq!(laser.sweep_mode().unwrap(), mode);
    }
    assert!(manager
        .commands()
        .contains(&":SOURce0:WAVelength:SWEep:MODE MAN".to_string()));
}

#[test]
fn test_sweep_cycles() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    assert_eq!(laser.sweep_cycles().unwrap(), DEFAULT_SWEEP_CYCLES);
    laser.set_sweep_cycles(2).unwrap();
    assert_eq!(laser.sweep_cycles().unwrap(), 2);
    assert!(manager
        .commands()
        .contains(&":SOURce0:WAVelength:SWEep:CYCLes 2".to_string()));
}

#[test]
fn test_sweep_speed() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    laser.set_sweep_speed(40.0).unwrap();
    assert_close(laser.sweep_speed().unwrap(), 40.0);
    assert_eq!(
        manager.commands()[0],
        ":SOURce0:WAVelength:SWEep:SPEed 40NM/S"
    );
}

#[test]
fn test_configure_sweep_command_order() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    let range = laser.configure_sweep(1460.0, 1620.0, 10.0).unwrap();

    assert_eq!(
        manager.commands(),
        vec![
            ":SOURce0:WAVelength:SWEep:STEP 10NM".to_string(),
            ":SOURce0:WAVelength:SWEep:STARt 1460NM".to_string(),
            ":SOURce0:WAVelength:SWEep:STOP 1620NM".to_string(),
            ":SOURce0:WAVelength:SWEep:STARt?".to_string(),
            ":SOURce0:WAVelength:SWEep:STEP?".to_string(),
            ":SOURce0:WAVelength:SWEep:STOP?".to_string(),
        ]
    );
    assert_close(range.start_nm, 1460.0);
    assert_close(range.stop_nm, 1620.0);
    assert_close(range.step_nm, 10.0);
}

#[test]
fn test_configure_sweep_returns_applied_values() {
    let (_manager, mut laser) = connect(SimulatedLaser::new().with_tuning_range(1480.0, 1600.0));
    let range = laser.configure_sweep(1460.0, 1620.0, 10.0).unwrap();
    assert_close(range.start_nm, 1480.0);
    assert_close(range.stop_nm, 1600.0);
}

#[test]
fn test_configure_sweep_partial_failure_keeps_earlier_writes() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    manager.with_laser(|l| l.inject_write_failure(":SOURce0:WAVelength:SWEep:STARt"));

    let err = laser.configure_sweep(1460.0, 1620.0, 5.0).unwrap_err();
    assert!(err.is_connection_error());

    let commands = manager.commands();
    assert_eq!(commands, vec![":SOURce0:WAVelength:SWEep:STEP 5NM".to_string()]);
    let step = manager
        .with_laser(|l| l.handle(":SOURce0:WAVelength:SWEep:STEP?"))
        .unwrap();
    assert_close(step.parse::<f64>().unwrap() * 1e9, 5.0);
}

#[test]
fn test_start_sweep_is_fire_and_forget() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    laser.start_sweep().unwrap();
    assert_eq!(
        manager.commands(),
        vec![":SOURce0:WAVelength:SWEep STARt".to_string()]
    );
    assert_eq!(manager.with_laser(|l| l.sweeps_started()), 1);
    // Nothing was queued for reading
    assert!(laser.read().unwrap_err().is_connection_error());
}

#[test]
fn test_laser_status() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    assert!(!laser.laser_status().unwrap());
    laser.set_laser_status(true).unwrap();
    assert!(laser.laser_status().unwrap());
    assert!(manager.with_laser(|l| l.is_power_on()));
    laser.set_laser_status(false).unwrap();
    assert!(!laser.laser_status().unwrap());
    assert!(manager
        .commands()
        .contains(&":SOURce0:POWer:STATe 0".to_string()));
}

#[test]
fn test_lock_sends_passcode() {
    let (manager, mut laser) = connect(SimulatedLaser::new());

    laser.set_locked(true).unwrap();
    assert_eq!(manager.commands().last().unwrap(), ":LOCK 1,1234");
    assert!(laser.locked().unwrap());

    laser.set_locked(false).unwrap();
    assert_eq!(manager.commands().last().unwrap(), ":LOCK 0,1234");
    assert!(!laser.locked().unwrap());
}

#[test]
fn test_operations_before_open_fail_not_connected() {
    let manager = MockResourceManager::new();
    let mut laser = TunableLaser::new().with_manager(manager.clone());

    assert!(matches!(laser.write("*IDN?"), Err(LaserError::NotConnected)));
    assert!(matches!(laser.read(), Err(LaserError::NotConnected)));
    assert!(matches!(laser.read_number(), Err(LaserError::NotConnected)));
    assert!(matches!(laser.wavelength(), Err(LaserError::NotConnected)));
    assert!(matches!(laser.set_wavelength(1550.0), Err(LaserError::NotConnected)));
    assert!(matches!(laser.wavelength_limits(), Err(LaserError::NotConnected)));
    assert!(matches!(laser.output_trigger(), Err(LaserError::NotConnected)));
    assert!(matches!(
        laser.set_output_trigger(TriggerOutput::Disabled),
        Err(LaserError::NotConnected)
    ));
    assert!(matches!(laser.sweep_cycles(), Err(LaserError::NotConnected)));
    assert!(matches!(laser.set_sweep_cycles(1), Err(LaserError::NotConnected)));
    assert!(matches!(laser.sweep_mode(), Err(LaserError::NotConnected)));
    assert!(matches!(
        laser.set_sweep_mode(SweepMode::Step),
        Err(LaserError::NotConnected)
    ));
    assert!(matches!(laser.sweep_speed(), Err(LaserError::NotConnected)));
    assert!(matches!(laser.set_sweep_speed(10.0), Err(LaserError::NotConnected)));
    assert!(matches!(
        laser.configure_sweep(1460.0, 1620.0, 10.0),
        Err(LaserError::NotConnected)
    ));
    assert!(matches!(laser.start_sweep(), Err(LaserError::NotConnected)));
    assert!(matches!(laser.laser_status(), Err(LaserError::NotConnected)));
    assert!(matches!(laser.set_laser_status(true), Err(LaserError::NotConnected)));
    assert!(matches!(laser.locked(), Err(LaserError::NotConnected)));
    assert!(matches!(laser.set_locked(true), Err(LaserError::NotConnected)));
    assert!(matches!(laser.close(), Err(LaserError::NotConnected)));

    assert!(manager.commands().is_empty());
}

#[test]
fn test_operations_after_close_fail_not_connected() {
    let (_manager, mut laser) = connect(SimulatedLaser::new());
    laser.wavelength().unwrap();
    laser.close().unwrap();

    assert!(!laser.is_connected());
    assert_eq!(laser.identity(), None);
    assert_eq!(laser.cached_wavelength(), None);
    assert!(matches!(laser.wavelength(), Err(LaserError::NotConnected)));
    assert!(matches!(laser.close(), Err(LaserError::NotConnected)));
}

#[test]
fn test_open_unreachable_instrument() {
    let mut laser = TunableLaser::new().with_manager(MockResourceManager::offline());
    let err = laser.open_default().unwrap_err();
    assert!(err.is_connection_error());
    assert!(!laser.is_connected());
}

#[test]
fn test_open_malformed_resource() {
    let mut laser = TunableLaser::new().with_manager(MockResourceManager::new());
    let err = laser.open("not-a-resource").unwrap_err();
    assert!(matches!(err, LaserError::InvalidResource { .. }));
    assert!(err.is_connection_error());
}

#[test]
fn test_failed_identification_discards_session() {
    let manager = MockResourceManager::new();
    manager.with_laser(|l| l.inject_write_failure("*IDN?"));
    let mut laser = TunableLaser::new().with_manager(manager);

    let err = laser.open_default().unwrap_err();
    assert!(err.is_connection_error());
    assert!(!laser.is_connected());
    assert_eq!(laser.identity(), None);
}

#[test]
fn test_reopen_replaces_session() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    laser.open("TCPIP0::10.0.0.2::5025::SOCKET").unwrap();
    assert_eq!(laser.resource(), Some("TCPIP0::10.0.0.2::5025::SOCKET"));
    assert_eq!(manager.opened().len(), 2);
}

#[test]
fn test_unknown_trigger_is_protocol_error() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    manager.with_laser(|l| l.set_response(":TRIG0:OUTP?", "SOMETIMES"));

    match laser.output_trigger().unwrap_err() {
        LaserError::Protocol {
            command, response, ..
        } => {
            assert_eq!(command, ":TRIG0:OUTP?");
            assert_eq!(response, "SOMETIMES");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_malformed_numeric_responses_are_protocol_errors() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    manager.with_laser(|l| {
        l.set_response(":SOURce0:WAVelength?", "garbage");
        l.set_response(":SOURce0:WAVelength:SWEep:CYCLes?", "-1");
        l.set_response(":SOURce0:WAVelength:SWEep:MODE?", "FAST");
        l.set_response(":LOCK?", "");
    });

    assert!(matches!(laser.wavelength(), Err(LaserError::Protocol { .. })));
    assert!(matches!(laser.sweep_cycles(), Err(LaserError::Protocol { .. })));
    assert!(matches!(laser.sweep_mode(), Err(LaserError::Protocol { .. })));
    assert!(matches!(laser.locked(), Err(LaserError::Protocol { .. })));
    // Failed parses leave the cache untouched
    assert_eq!(laser.cached_wavelength(), None);
}

#[test]
fn test_numeric_response_uses_first_value() {
    let (manager, mut laser) = connect(SimulatedLaser::new());
    manager.with_laser(|l| l.set_response(":SOURce0:WAVelength?", "+1.55000000E-006,+0.0"));
    assert_close(laser.wavelength().unwrap(), 1550.0);
}

#[test]
fn test_query_primitives() {
    let (_manager, mut laser) = connect(SimulatedLaser::new());
    let idn = laser.query("*IDN?").unwrap();
    assert!(idn.contains("Keysight"));
    let max = laser.query_number(":SOURce0:WAVelength? MAX").unwrap();
    assert_close(max * 1e9, 1650.0);
}
