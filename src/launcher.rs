//! Measurement script command line and process launch.
//!
//! [`build_command`] turns a [`LaunchSnapshot`] into the argument list the
//! Python measurement scripts parse:
//!
//! ```text
//! <script>.py -<R unit> -<U unit> -<I unit> -R <sweep> -W <field/gate|AMI> -L <lakeshore>
//!     -RT <readout type> -WT <sweep type> -RR <readout> -LT <lakeshore model>
//!     [-nosave] [-P '<p0>;<p1>;...'] -C <c1>,<c2>,<c3>,<c4> -ST "<structure>" [-CC <coil>]
//!     <resistance> <range> <step> <gain> <delay> <samples> [<sample name tokens>]
//! ```
//!
//! [`ExternalLauncher`] prepends the console wrapper and interpreter and
//! spawns the script detached. A background thread reaps the process when it
//! exits and logs its status; nothing else monitors or retries it.

use crate::config::LauncherConfig;
use crate::equipment::{Equipment, SampleMetadata};
use crate::error::LaunchError;
use crate::mode::MeasurementMode;
use crate::units::UnitSelection;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

/// Everything a launch command is built from, captured at start time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchSnapshot {
    pub units: UnitSelection,
    pub equipment: Equipment,
    /// Replaces the field/gate device id after `-W` when non-empty.
    pub ami_override: String,
    pub save_data: bool,
    /// Quoted `-P` value, absent when the mode has no parameters.
    pub parameter_argument: Option<String>,
    pub sample: SampleMetadata,
    pub resistance: String,
    pub voltage_range: String,
    pub voltage_step: String,
    pub gain: String,
    pub delay: String,
    pub samples: String,
}

/// A script file name and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    pub script: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Script followed by every argument, as passed to the interpreter.
    pub fn tokens(&self) -> Vec<String> {
        std::iter::once(self.script.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.script)?;
        let mut structure_next = false;
        for arg in &self.args {
            if structure_next || arg.is_empty() || arg.chars().any(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
            structure_next = arg == "-ST";
        }
        Ok(())
    }
}

/// Builds the command line for `mode`. Pure.
pub fn build_command(mode: MeasurementMode, snapshot: &LaunchSnapshot) -> CommandLine {
    let equipment = &snapshot.equipment;
    let field_gate = if snapshot.ami_override.is_empty() {
        equipment.field_gate_device_id.to_string()
    } else {
        snapshot.ami_override.clone()
    };

    let mut args = vec![
        format!("-{}", snapshot.units.resistance.as_str()),
        format!("-{}", snapshot.units.voltage.as_str()),
        format!("-{}", snapshot.units.current.as_str()),
        "-R".to_string(),
        equipment.sweep_device_id.to_string(),
        "-W".to_string(),
        field_gate,
        "-L".to_string(),
        equipment.lakeshore_id.to_string(),
        "-RT".to_string(),
        equipment.readout_device.code().to_string(),
        "-WT".to_string(),
        equipment.sweep_device.code().to_string(),
        "-RR".to_string(),
        equipment.readout_device_id.to_string(),
        "-LT".to_string(),
        equipment.lakeshore_model.code().to_string(),
    ];

    if !snapshot.save_data {
        args.push("-nosave".to_string());
    }
    if let Some(parameters) = &snapshot.parameter_argument {
        args.push("-P".to_string());
        args.push(parameters.clone());
    }
    args.push("-C".to_string());
    args.push(snapshot.sample.contact_list());
    args.push("-ST".to_string());
    args.push(snapshot.sample.structure_name.clone());
    if let Some(coil) = &equipment.coil_constant {
        args.push("-CC".to_string());
        args.push(coil.clone());
    }

    args.extend(
        [
            &snapshot.resistance,
            &snapshot.voltage_range,
            &snapshot.voltage_step,
            &snapshot.gain,
            &snapshot.delay,
            &snapshot.samples,
        ]
        .into_iter()
        .cloned(),
    );
    // The scripts read the sample name as trailing bare words.
    args.extend(snapshot.sample.sample_name.split_whitespace().map(str::to_string));

    CommandLine {
        script: mode.script_file(),
        args,
    }
}

/// A started measurement process.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchRecord {
    pub pid: u32,
    pub started_at: DateTime<Local>,
    pub command: CommandLine,
}

/// Spawns measurement scripts through the configured interpreter.
#[derive(Debug, Clone)]
pub struct ExternalLauncher {
    interpreter: String,
    scripts_dir: PathBuf,
    console_wrapper: Vec<String>,
    inherit_console: bool,
}

impl ExternalLauncher {
    pub fn new(config: &LauncherConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            scripts_dir: config.scripts_dir.clone(),
            console_wrapper: config.console_wrapper.clone(),
            inherit_console: config.inherit_console,
        }
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Interpreter path, searched in `PATH` unless configured as a path.
    pub fn resolve_interpreter(&self) -> Result<PathBuf, LaunchError> {
        which::which(&self.interpreter)
            .map_err(|_| LaunchError::InterpreterNotFound(self.interpreter.clone()))
    }

    /// Path of a script inside the scripts directory.
    pub fn script_path(&self, script: &str) -> Result<PathBuf, LaunchError> {
        let path = self.scripts_dir.join(script);
        if path.is_file() {
            Ok(path)
        } else {
            Err(LaunchError::ScriptNotFound(path))
        }
    }

    /// Starts `command` and returns without waiting for it.
    pub fn spawn(&self, command: &CommandLine) -> Result<LaunchRecord, LaunchError> {
        let interpreter = self.resolve_interpreter()?;
        let script = self.script_path(&command.script)?;

        let mut process = match self.console_wrapper.split_first() {
            Some((wrapper, wrapper_args)) => {
                let mut process = Command::new(wrapper);
                process.args(wrapper_args).arg(&interpreter);
                process
            }
            None => Command::new(&interpreter),
        };
        process.arg(&script).args(&command.args);
        process.current_dir(&self.scripts_dir);
        if !self.inherit_console {
            process
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }

        debug!(
            interpreter = %interpreter.display(),
            script = %script.display(),
            "spawning measurement: {command}"
        );
        let program = self
            .console_wrapper
            .first()
            .cloned()
            .unwrap_or_else(|| interpreter.display().to_string());
        let child = process
            .spawn()
            .map_err(|source| LaunchError::Spawn { program, source })?;

        let record = LaunchRecord {
            pid: child.id(),
            started_at: Local::now(),
            command: command.clone(),
        };
        info!(pid = record.pid, script = %command.script, "measurement process started");
        reap(child, command.script.clone());
        Ok(record)
    }
}

/// Waits for `child` on its own thread so it never lingers as a zombie.
fn reap(mut child: Child, script: String) {
    let pid = child.id();
    std::thread::spawn(move || match child.wait() {
        Ok(status) if status.success() => {
            info!(pid, script = %script, "measurement process finished");
        }
        Ok(status) => {
            warn!(pid, script = %script, %status, "measurement process exited with failure");
        }
        Err(e) => {
            warn!(pid, script = %script, error = %e, "could not wait for measurement process");
        }
    });
}
