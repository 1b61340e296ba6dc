//! Command-line contract between the launcher and the measurement scripts.

use experiment_runner::bindings::MemoryBindings;
use experiment_runner::config::LauncherConfig;
use experiment_runner::error::{LaunchError, ValidationError};
use experiment_runner::launcher::ExternalLauncher;
use experiment_runner::mode::MeasurementMode;
use experiment_runner::run_params::RunParameters;
use experiment_runner::settings::MemoryStore;
use experiment_runner::RunnerError;

fn run_for(mode: MeasurementMode) -> RunParameters<MemoryStore> {
    let mut run = RunParameters::new(MemoryStore::new());
    run.activate(mode, MemoryBindings::new());
    run
}

#[test]
fn test_iv_command_tokens() {
    let mut run = run_for(MeasurementMode::Iv);
    run.set_sample_name("Sample1");

    let command = run.prepare_measurement().unwrap();
    assert_eq!(
        command.tokens(),
        [
            "I_V.py", "-KOhm", "-mV", "-mkA", "-R", "3", "-W", "6", "-L", "17", "-RT", "0", "-WT",
            "0", "-RR", "9", "-LT", "0", "-C", "1,2,3,4", "-ST", "", "10", "1", "0.1", "1", "0.1",
            "10", "Sample1",
        ]
    );
}

#[test]
fn test_iv_command_display() {
    let mut run = run_for(MeasurementMode::Iv);
    run.set_sample_name("Sample1");
    assert_eq!(
        run.prepare_measurement().unwrap().to_string(),
        "I_V.py -KOhm -mV -mkA -R 3 -W 6 -L 17 -RT 0 -WT 0 -RR 9 -LT 0 -C 1,2,3,4 -ST \"\" \
         10 1 0.1 1 0.1 10 Sample1"
    );
}

#[test]
fn test_parameters_and_nosave_placement() {
    let mut run = run_for(MeasurementMode::IvGate);
    run.set_save_data(false);
    run.set_sample_name("");

    let args = run.prepare_measurement().unwrap().args;
    let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
    assert_eq!(pos("-nosave"), pos("-LT") + 2);
    assert_eq!(pos("-P"), pos("-nosave") + 1);
    assert_eq!(args[pos("-P") + 1], "'1;0.1'");
    assert_eq!(pos("-C"), pos("-P") + 2);
    assert_eq!(args.last().map(String::as_str), Some("10"));
}

#[test]
fn test_no_parameter_flag_without_parameters() {
    let run = run_for(MeasurementMode::IvTempManual);
    let command = run.prepare_measurement().unwrap();
    assert_eq!(command.script, "I_V_T_manual.py");
    assert!(!command.args.iter().any(|a| a == "-P"));
    assert!(!command.args.iter().any(|a| a == "-nosave"));
}

#[test]
fn test_sample_name_becomes_trailing_words() {
    let mut run = run_for(MeasurementMode::Iv);
    run.set_sample_name("Nb  film 3");
    let args = run.prepare_measurement().unwrap().args;
    assert_eq!(&args[args.len() - 3..], ["Nb", "film", "3"]);
}

#[test]
fn test_units_contacts_and_coil() {
    use experiment_runner::equipment::Contact;
    use experiment_runner::units::{CurrentUnit, ResistanceUnit};

    let mut run = run_for(MeasurementMode::Iv);
    run.set_current_unit(CurrentUnit::NanoAmp);
    run.set_resistance_unit(ResistanceUnit::MegaOhm);
    run.set_contact(Contact::VoltagePlus, 7);
    run.set_structure_name("Hall bar");
    run.set_coil_constant(Some("1.02".to_string()));

    let command = run.prepare_measurement().unwrap();
    assert_eq!(&command.args[..3], ["-MOhm", "-mV", "-nA"]);
    let text = command.to_string();
    assert!(text.contains("-C 1,2,7,4 -ST \"Hall bar\" -CC 1.02 10 1"));
}

#[test]
fn test_refused_start_does_not_spawn() {
    let mut run = run_for(MeasurementMode::Iv);
    run.set_field(experiment_runner::Field::VoltageStep, "5");
    let launcher = ExternalLauncher::new(&LauncherConfig::default());

    match run.start_measurement(&launcher) {
        Err(RunnerError::Validation(ValidationError::StepExceedsRange { step, range })) => {
            assert_eq!((step, range), (5.0, 1.0));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn test_spawn_detached_script() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("I_V.py"), "").unwrap();
    let launcher = ExternalLauncher::new(&LauncherConfig {
        interpreter: "true".to_string(),
        scripts_dir: dir.path().to_path_buf(),
        console_wrapper: Vec::new(),
        inherit_console: false,
    });

    let mut run = run_for(MeasurementMode::Iv);
    let record = run.start_measurement(&launcher).unwrap();
    assert!(record.pid > 0);
    assert_eq!(record.command.script, "I_V.py");
}

#[cfg(unix)]
#[test]
fn test_missing_script_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = ExternalLauncher::new(&LauncherConfig {
        interpreter: "true".to_string(),
        scripts_dir: dir.path().to_path_buf(),
        console_wrapper: Vec::new(),
        inherit_console: false,
    });

    let mut run = run_for(MeasurementMode::RTemp);
    match run.start_measurement(&launcher) {
        Err(RunnerError::Launch(LaunchError::ScriptNotFound(path))) => {
            assert!(path.ends_with("R_T.py"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[cfg(target_os = "linux")]
#[test]
fn test_finished_script_is_reaped() {
    use std::time::{Duration, Instant};

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("I_V.py"), "").unwrap();
    let launcher = ExternalLauncher::new(&LauncherConfig {
        interpreter: "true".to_string(),
        scripts_dir: dir.path().to_path_buf(),
        console_wrapper: Vec::new(),
        inherit_console: false,
    });

    let mut run = run_for(MeasurementMode::Iv);
    let record = run.start_measurement(&launcher).unwrap();

    // An unreaped child stays in /proc as a zombie
    let proc_entry = std::path::PathBuf::from(format!("/proc/{}", record.pid));
    let deadline = Instant::now() + Duration::from_secs(5);
    while proc_entry.exists() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(!proc_entry.exists());
}
