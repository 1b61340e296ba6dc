//! CLI entry point for experiment-runner
//!
//! A headless front-end over the same core a GUI would drive:
//! - inspect and edit the stored parameters of each measurement tab
//! - edit equipment addresses and sample metadata
//! - validate and start a measurement script
//!
//! # Usage
//!
//! ```bash
//! experiment-runner set --mode iv --resistance 20 --voltage-range 2
//! experiment-runner set --mode iv-gate --param 0=2.5
//! experiment-runner equipment --sweep-device keithley6220 --sample-name "S 12"
//! experiment-runner start --mode iv --dry-run
//! ```
//!
//! Settings are written through a background writer and flushed on exit.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use experiment_runner::bindings::{Field, MemoryBindings};
use experiment_runner::config::RunnerConfig;
use experiment_runner::equipment::{LakeShoreModel, ReadoutDevice, SweepDevice};
use experiment_runner::launcher::ExternalLauncher;
use experiment_runner::logging::{self, LoggingConfig};
use experiment_runner::mode::{MeasurementMode, Tab};
use experiment_runner::params::{FieldSource, FieldSweepMode, ModeParameters, ShapiroSweep};
use experiment_runner::run_params::RunParameters;
use experiment_runner::settings::{FileStore, MemoryStore, QueuedStore, SettingsStore};
use experiment_runner::units::{CurrentUnit, ResistanceUnit, VoltageUnit};
use std::path::PathBuf;
use tracing::{debug, warn};

type Backing = Box<dyn SettingsStore + Send>;
type Runner = RunParameters<QueuedStore<Backing>>;

#[derive(Parser)]
#[command(name = "experiment-runner")]
#[command(about = "Parameter editor and launcher for transport measurement scripts", long_about = None)]
struct Cli {
    /// Configuration file (default: config/experiment_runner.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Settings file (default: per-user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// More log output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List measurement modes and their parameters
    Modes,

    /// Show the stored state of a measurement tab
    Show {
        /// Measurement (default: the last active tab)
        #[arg(long)]
        mode: Option<MeasurementMode>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit the fields and parameters of a measurement tab
    Set(SetArgs),

    /// Edit equipment addresses and sample metadata
    Equipment(EquipmentArgs),

    /// Validate and start a measurement
    Start {
        #[arg(long)]
        mode: MeasurementMode,

        /// Print the command line instead of starting it
        #[arg(long)]
        dry_run: bool,

        /// Start even though the sweep ends above the temperature ceiling
        #[arg(long)]
        acknowledge_temperature: bool,

        /// Tell the script not to save data
        #[arg(long)]
        nosave: bool,
    },
}

#[derive(clap::Args)]
struct SetArgs {
    #[arg(long)]
    mode: MeasurementMode,

    #[arg(long)]
    current_unit: Option<CurrentUnit>,
    #[arg(long)]
    voltage_unit: Option<VoltageUnit>,
    #[arg(long)]
    resistance_unit: Option<ResistanceUnit>,

    #[arg(long)]
    resistance: Option<String>,
    #[arg(long)]
    voltage_range: Option<String>,
    #[arg(long)]
    voltage_step: Option<String>,
    /// Overrides the voltage sweep when given together with it
    #[arg(long)]
    current_range: Option<String>,
    #[arg(long)]
    current_step: Option<String>,
    #[arg(long)]
    gain: Option<String>,
    #[arg(long)]
    delay: Option<String>,
    #[arg(long)]
    samples: Option<String>,

    /// Positional parameter, `index=value`; repeatable
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(usize, String)>,

    /// I-V-B and V-B: hall-probe or magnet
    #[arg(long)]
    field_source: Option<FieldSource>,

    /// Shapiro: power or frequency
    #[arg(long)]
    shapiro_sweep: Option<ShapiroSweep>,

    /// V-B: up, down, up-down, down-up, up-down-one, down-up-one
    #[arg(long)]
    field_sweep: Option<FieldSweepMode>,
}

#[derive(clap::Args)]
struct EquipmentArgs {
    #[arg(long)]
    sweep_id: Option<i64>,
    #[arg(long)]
    field_gate_id: Option<i64>,
    #[arg(long)]
    lakeshore_id: Option<i64>,
    #[arg(long)]
    readout_id: Option<i64>,
    #[arg(long)]
    sweep_device: Option<SweepDevice>,
    #[arg(long)]
    readout_device: Option<ReadoutDevice>,
    #[arg(long)]
    lakeshore_model: Option<LakeShoreModel>,
    /// AMI magnet controller address; empty to remove
    #[arg(long)]
    ami: Option<String>,
    #[arg(long)]
    generator_id: Option<i64>,
    /// Field coil constant; empty to remove
    #[arg(long)]
    coil_constant: Option<String>,
    #[arg(long)]
    sample_name: Option<String>,
    #[arg(long)]
    structure: Option<String>,
    /// Contact numbers I+,I-,V+,V-
    #[arg(long, value_delimiter = ',')]
    contacts: Option<Vec<i64>>,
}

fn parse_param(s: &str) -> Result<(usize, String), String> {
    let (index, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected index=value, got '{s}'"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|_| format!("invalid parameter index '{index}'"))?;
    Ok((index, value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = RunnerConfig::load_validated(cli.config.as_deref())?;
    let logging_config = LoggingConfig::from_config(&config)
        .map_err(anyhow::Error::msg)?
        .with_verbosity(cli.verbose);
    logging::init(logging_config).map_err(anyhow::Error::msg)?;

    if let Commands::Modes = cli.command {
        print_modes();
        return Ok(());
    }

    let backing = open_settings(cli.settings.or_else(|| config.settings_path()));
    let mut run = RunParameters::load(QueuedStore::spawn(backing), &config);

    let persist = !matches!(cli.command, Commands::Show { .. });
    let outcome = execute(&mut run, cli.command, &config);
    if persist {
        run.save_all();
    }
    if let Err(e) = run.into_store().close().await {
        warn!(error = %e, "settings may not have been written completely");
    }
    outcome
}

fn open_settings(path: Option<PathBuf>) -> Backing {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "using settings file");
            Box::new(FileStore::open_or_empty(path))
        }
        None => {
            warn!("no settings location available; settings will not be kept");
            Box::new(MemoryStore::new())
        }
    }
}

fn execute(run: &mut Runner, command: Commands, config: &RunnerConfig) -> Result<()> {
    match command {
        Commands::Modes => print_modes(),
        Commands::Show { mode, json } => {
            match mode.map(Tab::Measurement).unwrap_or_else(|| run.stored_tab()) {
                Tab::Measurement(mode) => run.activate(mode, MemoryBindings::new()),
                Tab::EquipmentSetup => run.activate_equipment_setup(),
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&run.summary())?);
            } else {
                print_summary(run);
            }
        }
        Commands::Set(args) => {
            apply_set(run, args)?;
            print_summary(run);
        }
        Commands::Equipment(args) => {
            apply_equipment(run, args)?;
            print_equipment(run);
        }
        Commands::Start {
            mode,
            dry_run,
            acknowledge_temperature,
            nosave,
        } => {
            run.activate(mode, MemoryBindings::new());
            if nosave {
                run.set_save_data(false);
            }
            if acknowledge_temperature {
                run.acknowledge_temperature_override();
            }

            if dry_run {
                match run.prepare_measurement() {
                    Ok(command) => println!("{command}"),
                    Err(e) => return Err(refused(e)),
                }
            } else {
                let launcher = ExternalLauncher::new(&config.launcher);
                match run.start_measurement(&launcher) {
                    Ok(record) => println!(
                        "Started {} (pid {}) at {}",
                        record.command.script,
                        record.pid,
                        record.started_at.format("%Y-%m-%d %H:%M:%S")
                    ),
                    Err(experiment_runner::RunnerError::Validation(e)) => return Err(refused(e)),
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
    Ok(())
}

fn refused(e: experiment_runner::error::ValidationError) -> anyhow::Error {
    if e.is_overridable() {
        eprintln!("Re-run with --acknowledge-temperature to start anyway.");
    }
    anyhow::Error::new(e).context("measurement not started")
}

fn apply_set(run: &mut Runner, args: SetArgs) -> Result<()> {
    run.activate(args.mode, MemoryBindings::new());

    if let Some(unit) = args.current_unit {
        run.set_current_unit(unit);
    }
    if let Some(unit) = args.voltage_unit {
        run.set_voltage_unit(unit);
    }
    if let Some(unit) = args.resistance_unit {
        run.set_resistance_unit(unit);
    }

    for (field, text) in [
        (Field::Resistance, args.resistance),
        (Field::VoltageRange, args.voltage_range),
        (Field::VoltageStep, args.voltage_step),
        (Field::CurrentRange, args.current_range),
        (Field::CurrentStep, args.current_step),
        (Field::Gain, args.gain),
        (Field::Delay, args.delay),
        (Field::Samples, args.samples),
    ] {
        if let Some(text) = text {
            run.set_field(field, &text);
        }
    }

    let count = run.parameters().len();
    for (index, value) in args.params {
        if index >= count {
            bail!("{} has {count} parameters; index {index} is out of range", args.mode);
        }
        run.update_parameter(index, &value);
    }

    if let Some(source) = args.field_source {
        if !args.mode.has_selectable_field_source() {
            bail!("--field-source applies to I-V-B and V-B only");
        }
        run.set_field_source(source);
    }
    if let Some(kind) = args.shapiro_sweep {
        if args.mode != MeasurementMode::Shapiro {
            bail!("--shapiro-sweep applies to the Shapiro measurement only");
        }
        run.set_shapiro_sweep(kind);
    }
    if let Some(sweep) = args.field_sweep {
        if args.mode != MeasurementMode::VField {
            bail!("--field-sweep applies to V-B only");
        }
        run.set_field_sweep_mode(sweep);
    }
    Ok(())
}

fn apply_equipment(run: &mut Runner, args: EquipmentArgs) -> Result<()> {
    run.activate_equipment_setup();

    if let Some(id) = args.sweep_id {
        run.set_sweep_device_id(id);
    }
    if let Some(id) = args.field_gate_id {
        run.set_field_gate_device_id(id);
    }
    if let Some(id) = args.lakeshore_id {
        run.set_lakeshore_id(id);
    }
    if let Some(id) = args.readout_id {
        run.set_readout_device_id(id);
    }
    if let Some(device) = args.sweep_device {
        run.set_sweep_device(device);
    }
    if let Some(device) = args.readout_device {
        run.set_readout_device(device);
    }
    if let Some(model) = args.lakeshore_model {
        run.set_lakeshore_model(model);
    }
    if let Some(address) = args.ami {
        run.set_ami_address(&address);
    }
    if let Some(id) = args.generator_id {
        run.set_generator_id(id);
    }
    if let Some(coil) = args.coil_constant {
        run.set_coil_constant(Some(coil));
    }
    if let Some(name) = args.sample_name {
        run.set_sample_name(&name);
    }
    if let Some(structure) = args.structure {
        run.set_structure_name(&structure);
    }
    if let Some(contacts) = args.contacts {
        let contacts: [i64; 4] = contacts
            .try_into()
            .map_err(|v: Vec<i64>| anyhow::anyhow!("expected 4 contacts, got {}", v.len()))
            .context("--contacts takes I+,I-,V+,V-")?;
        run.set_contacts(contacts);
    }
    Ok(())
}

fn print_modes() {
    for mode in MeasurementMode::ALL {
        let names = ModeParameters::defaults(mode).names().join(", ");
        println!("{:<16} {:<28} {}", mode.cli_name(), mode.title(), mode.script_file());
        if !names.is_empty() {
            println!("{:<16} parameters: {names}", "");
        }
    }
}

fn print_summary(run: &Runner) {
    let Some(mode) = run.active_mode() else {
        print_equipment(run);
        return;
    };
    println!("{} ({})", mode.title(), mode.script_file());

    let units = run.units();
    println!(
        "  units: -{} -{} -{}",
        units.resistance.as_str(),
        units.voltage.as_str(),
        units.current.as_str()
    );
    for field in Field::ALL {
        println!("  {:<14} {}", field.label(), run.field(field));
    }
    let ready = run.readiness();
    if !ready.all() {
        println!(
            "  not ready: resistance={} voltages={} currents={}",
            ready.resistance, ready.voltages, ready.currents
        );
    }

    let record = run.parameters().record();
    for (index, name) in record.names().iter().enumerate() {
        println!("  [{index}] {name:<14} {}", record.get(index).unwrap_or_default());
    }
    if mode.has_selectable_field_source() {
        println!("  field source: {:?}", run.field_source());
    }
    if mode == MeasurementMode::Shapiro {
        println!("  Shapiro sweep: {:?}", run.shapiro_sweep());
    }
    if !run.save_data() {
        println!("  data will not be saved");
    }
}

fn print_equipment(run: &Runner) {
    let equipment = run.equipment();
    let sample = run.sample();
    println!("Equipment");
    println!(
        "  sweep      {} ({})",
        equipment.sweep_device_id, equipment.sweep_device
    );
    println!("  field/gate {}", equipment.field_gate_device_id);
    println!(
        "  readout    {} ({})",
        equipment.readout_device_id, equipment.readout_device
    );
    println!(
        "  lakeshore  {} ({})",
        equipment.lakeshore_id, equipment.lakeshore_model
    );
    if !equipment.ami_address.is_empty() {
        println!("  AMI        {}", equipment.ami_address);
    }
    println!("  generator  {}", equipment.generator_id);
    if let Some(coil) = &equipment.coil_constant {
        println!("  coil       {coil}");
    }
    println!("Sample");
    println!("  name       {}", sample.sample_name);
    println!("  structure  {}", sample.structure_name);
    println!("  contacts   {}", sample.contact_list());
}
