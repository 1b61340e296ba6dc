//! Integration tests for the RunParameters core: sweep synchronisation,
//! readiness, per-tab persistence and tab-scoped state.

use experiment_runner::bindings::{Field, MemoryBindings};
use experiment_runner::error::ValidationError;
use experiment_runner::mode::{MeasurementMode, Tab};
use experiment_runner::params::{FieldSource, FieldSweepMode, ShapiroSweep};
use experiment_runner::run_params::{RunParameters, TabState};
use experiment_runner::settings::{MemoryStore, SettingsExt};
use experiment_runner::units::{CurrentUnit, ResistanceUnit, UnitSelection, VoltageUnit};

fn iv_tab() -> (RunParameters<MemoryStore>, MemoryBindings) {
    let bindings = MemoryBindings::new();
    let mut run = RunParameters::new(MemoryStore::new());
    run.activate(MeasurementMode::Iv, bindings.clone());
    (run, bindings)
}

#[test]
fn test_voltage_edit_writes_current_once() {
    let (mut run, bindings) = iv_tab();
    bindings.reset_write_counts();

    bindings.set_text(Field::VoltageRange, "2");
    run.field_changed(Field::VoltageRange);

    assert_eq!(bindings.text(Field::CurrentRange), "200000");
    assert_eq!(bindings.write_count(Field::CurrentRange), 1);
    assert_eq!(bindings.write_count(Field::CurrentStep), 1);
    assert_eq!(bindings.write_count(Field::VoltageRange), 0);
}

#[test]
fn test_echoed_current_notification_does_not_write_back() {
    let (mut run, bindings) = iv_tab();
    bindings.set_text(Field::VoltageRange, "2");
    run.field_changed(Field::VoltageRange);
    bindings.reset_write_counts();

    // A front-end reports the core's own writes after the fact
    run.field_changed(Field::CurrentRange);
    run.field_changed(Field::CurrentStep);

    assert_eq!(bindings.write_count(Field::VoltageRange), 0);
    assert_eq!(bindings.write_count(Field::VoltageStep), 0);
    assert_eq!(bindings.write_count(Field::CurrentRange), 0);
    assert_eq!(run.field(Field::VoltageRange), "2");
}

#[test]
fn test_operator_current_edit_after_echo_is_applied() {
    let (mut run, bindings) = iv_tab();
    bindings.set_text(Field::VoltageRange, "2");
    run.field_changed(Field::VoltageRange);
    run.field_changed(Field::CurrentRange);
    bindings.reset_write_counts();

    bindings.set_text(Field::CurrentRange, "50000");
    run.field_changed(Field::CurrentRange);

    assert_eq!(bindings.text(Field::VoltageRange), "0.5");
    assert_eq!(bindings.write_count(Field::VoltageRange), 1);
    assert_eq!(bindings.write_count(Field::CurrentRange), 0);
}

#[test]
fn test_conversion_round_trip_through_edits() {
    let (mut run, bindings) = iv_tab();
    run.set_field(Field::Resistance, "3.3");
    run.set_field(Field::VoltageRange, "0.0123");
    let current = bindings.text(Field::CurrentRange);

    // Replay the derived current on a fresh tab
    let (mut other, other_bindings) = iv_tab();
    other.set_field(Field::Resistance, "3.3");
    other.set_field(Field::CurrentRange, &current);
    let voltage: f64 = other_bindings.text(Field::VoltageRange).parse().unwrap();
    assert!((voltage - 0.0123).abs() <= 0.0123 * 1e-6);
}

#[test]
fn test_resistance_readiness() {
    let (mut run, bindings) = iv_tab();

    bindings.set_text(Field::Resistance, "abc");
    run.field_changed(Field::Resistance);
    assert!(!run.is_ready());
    assert!(!run.resistance_ready());
    assert!(bindings.has_error(Field::Resistance));
    assert_eq!(
        run.validate(),
        Err(ValidationError::NotReady {
            resistance: false,
            voltages: true,
            currents: false,
        })
    );

    bindings.set_text(Field::Resistance, "10");
    run.field_changed(Field::Resistance);
    assert!(run.is_ready());
    assert!(!bindings.has_error(Field::Resistance));
    assert!(!bindings.has_error(Field::CurrentRange));
}

#[test]
fn test_unparsable_voltage_keeps_currents() {
    let (mut run, bindings) = iv_tab();
    let before = bindings.text(Field::CurrentRange);

    run.set_field(Field::VoltageStep, "0,1");
    assert!(!run.voltages_ready());
    assert!(run.currents_ready());
    assert!(bindings.has_error(Field::VoltageStep));
    assert_eq!(bindings.text(Field::CurrentRange), before);

    run.set_field(Field::VoltageStep, "0.1");
    assert!(run.is_ready());
}

#[test]
fn test_unparsable_current_marks_current_side() {
    let (mut run, _bindings) = iv_tab();
    run.set_field(Field::CurrentStep, "");
    assert!(!run.currents_ready());
    assert!(run.voltages_ready());
}

#[test]
fn test_tab_switch_flushes_and_restores() {
    let mut run = RunParameters::new(MemoryStore::new());
    run.activate(MeasurementMode::IvGate, MemoryBindings::new());
    run.set_field(Field::Resistance, "20");
    run.set_field(Field::VoltageRange, "2");
    run.set_field(Field::Samples, "25");
    run.set_resistance_unit(ResistanceUnit::MegaOhm);
    run.update_parameter(0, "2.5");

    run.activate(MeasurementMode::Iv, MemoryBindings::new());
    let store = run.store();
    assert_eq!(store.load_text("I_V_Gate_Resistance").as_deref(), Some("20"));
    assert_eq!(store.load_text("I_V_Gate_VoltageRange").as_deref(), Some("2"));
    assert_eq!(store.load_text("I_V_Gate_R_units").as_deref(), Some("MOhm"));
    assert_eq!(store.load_text("I_V_Gate_param0").as_deref(), Some("2.5"));

    let restored = MemoryBindings::new();
    run.activate(MeasurementMode::IvGate, restored.clone());
    assert_eq!(restored.text(Field::Resistance), "20");
    assert_eq!(restored.text(Field::VoltageRange), "2");
    assert_eq!(restored.text(Field::Samples), "25");
    assert_eq!(restored.shown_units().resistance, ResistanceUnit::MegaOhm);
    // 2 V over 20 MOhm
    assert_eq!(restored.text(Field::CurrentRange), "100");
    assert_eq!(run.parameters().get(0), Some("2.5"));
    assert_eq!(run.parameters().get(1), Some("0.1"));
}

#[test]
fn test_first_activation_uses_shown_values() {
    let bindings = MemoryBindings::new().with_text(Field::Resistance, "5");
    let shown = UnitSelection {
        current: CurrentUnit::NanoAmp,
        voltage: VoltageUnit::MicroVolt,
        resistance: ResistanceUnit::KiloOhm,
    };
    bindings.set_units(shown);

    let mut run = RunParameters::new(MemoryStore::new());
    run.activate(MeasurementMode::RTemp, bindings.clone());

    assert_eq!(run.units(), shown);
    assert_eq!(run.field(Field::Resistance), "5");
    assert_eq!(bindings.text(Field::CurrentRange), "200000");
    assert_eq!(run.parameters().values(), vec!["1.5", "10"]);
}

#[test]
fn test_equipment_tab_has_no_parameters() {
    let (mut run, _) = iv_tab();
    run.activate_equipment_setup();
    assert_eq!(run.state(), TabState::Active(Tab::EquipmentSetup));
    assert_eq!(run.active_mode(), None);
    assert!(run.parameters().is_empty());
    assert_eq!(run.validate(), Err(ValidationError::NoMeasurementTab));
}

#[test]
fn test_set_parameters_pads_and_truncates() {
    let mut run = RunParameters::new(MemoryStore::new());
    run.activate(MeasurementMode::IvGateTemp, MemoryBindings::new());
    run.set_parameters(&["-2", "2"]);
    assert_eq!(run.parameters().values(), vec!["-2", "2", "0.1", "0", "1", "0.1"]);

    run.set_parameters(&["1", "2", "3", "4", "5", "6", "7"]);
    assert_eq!(run.parameters().len(), 6);
}

#[test]
fn test_magnet_routes_field_to_ami() {
    let mut run = RunParameters::new(MemoryStore::new());
    run.set_ami_address("GPIB0::22::INSTR");
    run.activate(MeasurementMode::IvField, MemoryBindings::new());
    assert_eq!(run.ami_override(), "");

    run.update_parameter(0, "100");
    assert!(run.validate().is_err());

    run.set_field_source(FieldSource::Magnet);
    assert_eq!(run.ami_override(), "GPIB0::22::INSTR");
    assert!(run.validate().is_ok());

    let command = run.prepare_measurement().unwrap();
    let w = command.args.iter().position(|a| a == "-W").unwrap();
    assert_eq!(command.args[w + 1], "GPIB0::22::INSTR");

    run.activate(MeasurementMode::Iv, MemoryBindings::new());
    assert_eq!(run.store().load_int("AMI_used_IVB"), Some(1));
    assert_eq!(run.ami_override(), "");

    run.activate(MeasurementMode::IvField, MemoryBindings::new());
    assert_eq!(run.field_source(), FieldSource::Magnet);
    assert_eq!(run.ami_override(), "GPIB0::22::INSTR");
}

#[test]
fn test_ami_override_is_tab_scoped() {
    let (mut run, _) = iv_tab();
    run.set_ami("TCPIP::10.0.0.5::INSTR");
    assert_eq!(run.snapshot().ami_override, "TCPIP::10.0.0.5::INSTR");

    run.activate(MeasurementMode::Iv, MemoryBindings::new());
    assert_eq!(run.ami_override(), "");
}

#[test]
fn test_field_source_ignored_outside_field_modes() {
    let (mut run, _) = iv_tab();
    run.set_field_source(FieldSource::Magnet);
    assert_eq!(run.field_source(), FieldSource::HallProbe);
}

#[test]
fn test_field_sweep_mode_sets_parameter() {
    let mut run = RunParameters::new(MemoryStore::new());
    run.activate(MeasurementMode::VField, MemoryBindings::new());
    run.set_field_sweep_mode(FieldSweepMode::ALL[4]);
    assert_eq!(run.parameters().get(6), Some(FieldSweepMode::ALL[4].code()));
}

#[test]
fn test_shapiro_kinds_keep_separate_values() {
    let mut run = RunParameters::new(MemoryStore::new());
    run.activate(MeasurementMode::Shapiro, MemoryBindings::new());
    assert_eq!(run.parameters().values(), vec!["0", "-50", "-30", "1", "1", "18"]);

    run.update_parameter(1, "-45");
    run.set_shapiro_sweep(ShapiroSweep::Frequency);
    assert_eq!(run.parameters().values(), vec!["1", "1", "4", "0.25", "-50", "18"]);

    run.update_parameter(2, "6");
    run.set_shapiro_sweep(ShapiroSweep::Power);
    assert_eq!(run.parameters().get(1), Some("-45"));

    run.set_generator_id(21);
    assert_eq!(run.parameters().get(5), Some("21"));

    run.set_shapiro_sweep(ShapiroSweep::Frequency);
    run.activate(MeasurementMode::Iv, MemoryBindings::new());
    assert_eq!(run.store().load_int("Shapiro_type"), Some(1));
    assert_eq!(run.store().load_text("Shapiro_freq_end").as_deref(), Some("6"));

    run.activate(MeasurementMode::Shapiro, MemoryBindings::new());
    assert_eq!(run.shapiro_sweep(), ShapiroSweep::Frequency);
    assert_eq!(run.parameters().get(2), Some("6"));
}

#[test]
fn test_shapiro_kind_parameter_switches_sweep() {
    let mut run = RunParameters::new(MemoryStore::new());
    run.activate(MeasurementMode::Shapiro, MemoryBindings::new());

    run.update_parameter(0, "1");
    assert_eq!(run.shapiro_sweep(), ShapiroSweep::Frequency);
    assert_eq!(run.parameters().values(), vec!["1", "1", "4", "0.25", "-50", "18"]);
    let command = run.prepare_measurement().unwrap();
    assert!(command.to_string().contains("-P '1;1;4;0.25;-50;18'"));

    run.update_parameter(0, "1.5");
    run.update_parameter(0, "7");
    assert_eq!(run.shapiro_sweep(), ShapiroSweep::Frequency);
    assert_eq!(run.parameters().get(0), Some("1"));
}

#[test]
fn test_shapiro_parameter_list_carries_its_kind() {
    let mut run = RunParameters::new(MemoryStore::new());
    run.activate(MeasurementMode::Shapiro, MemoryBindings::new());

    run.set_parameters(&["1", "2", "3", "0.5", "-40", "18"]);
    assert_eq!(run.shapiro_sweep(), ShapiroSweep::Frequency);
    assert_eq!(run.parameters().get(1), Some("2"));

    run.set_parameters(&["x", "2", "3", "0.5", "-40", "18"]);
    assert_eq!(run.shapiro_sweep(), ShapiroSweep::Frequency);
    assert_eq!(run.parameters().get(0), Some("1"));
}

#[test]
fn test_parameter_update_on_equipment_tab_is_ignored() {
    let mut run = RunParameters::new(MemoryStore::new());
    run.activate_equipment_setup();
    run.update_parameter(0, "1");
    assert!(run.parameters().is_empty());

    run.activate(MeasurementMode::IvGate, MemoryBindings::new());
    run.update_parameter(9, "1");
    assert_eq!(run.parameters().values(), vec!["1", "0.1"]);
}

#[test]
fn test_temperature_acknowledgement() {
    let mut run = RunParameters::new(MemoryStore::new());
    run.activate(MeasurementMode::IvTempAuto, MemoryBindings::new());
    run.update_parameter(1, "2.5");

    let err = run.validate().unwrap_err();
    assert!(err.is_overridable());

    run.acknowledge_temperature_override();
    assert!(run.validate().is_ok());

    // Cleared by a tab switch
    run.activate(MeasurementMode::IvTempAuto, MemoryBindings::new());
    assert!(run.validate().is_err());
}

#[test]
fn test_device_ceiling_checked_after_readiness() {
    let (mut run, _) = iv_tab();
    run.set_field(Field::VoltageRange, "40");
    assert!(matches!(
        run.validate(),
        Err(ValidationError::VoltageAboveDeviceLimit { .. })
    ));

    run.set_sweep_device(experiment_runner::equipment::SweepDevice::Keithley2400);
    assert!(run.validate().is_ok());
}

#[test]
fn test_save_all_writes_global_keys() {
    let (mut run, _) = iv_tab();
    run.set_sample_name("Nb film 3");
    run.set_structure_name("bridge");
    run.set_sweep_device_id(4);
    run.set_coil_constant(Some("0.98".to_string()));
    run.activate(MeasurementMode::GatePulse, MemoryBindings::new());
    run.save_all();

    let store = run.store();
    assert_eq!(store.load_int("ActiveTab"), Some(12));
    assert_eq!(store.load_text("SampleName").as_deref(), Some("Nb film 3"));
    assert_eq!(store.load_text("StructureName").as_deref(), Some("bridge"));
    assert_eq!(store.load_int("SourceSweep"), Some(4));
    assert_eq!(store.load_text("CoilConstant").as_deref(), Some("0.98"));
    assert_eq!(store.load_text("Gate_pulse_param3").as_deref(), Some("10"));
}
