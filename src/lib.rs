//! # Experiment Runner
//!
//! Parameter engine and launcher for cryogenic transport measurements. The
//! operator picks a measurement (I-V, R-T, gate sweeps, field sweeps,
//! Shapiro steps, ...), types a voltage sweep or the equivalent current
//! sweep, and starts a Python measurement script with a fixed command-line
//! contract. The crate keeps both sweep representations consistent, restores
//! everything the operator typed per measurement, checks physical limits, and
//! spawns the script.
//!
//! ## Crate Structure
//!
//! - **`run_params`**: `RunParameters`, the core. Tab lifecycle, sweep
//!   synchronisation with readiness flags, persistence, validation, start.
//! - **`bindings`**: the `FieldBindings` seam to whatever displays the fields,
//!   and the headless `MemoryBindings`.
//! - **`units`**: unit enums, number parsing/formatting, voltage/current
//!   conversion through the sample resistance.
//! - **`mode`**: the thirteen measurement modes and the tab model.
//! - **`params`**: typed positional parameter records per mode and
//!   `TabParameterSet`, their string-list adapter.
//! - **`equipment`**: device addresses, device types, sample metadata.
//! - **`validation`**: limits and the checks run before a start.
//! - **`launcher`**: command-line construction and process spawn.
//! - **`settings`**: the key/value store abstraction with memory, file and
//!   queued backends.
//! - **`config`**: layered configuration with `figment`.
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`error`**: error enums per concern and the umbrella `RunnerError`.
//!
//! ## Example
//! ```no_run
//! use experiment_runner::bindings::{Field, MemoryBindings};
//! use experiment_runner::mode::MeasurementMode;
//! use experiment_runner::run_params::RunParameters;
//! use experiment_runner::settings::MemoryStore;
//!
//! let bindings = MemoryBindings::new();
//! let mut run = RunParameters::new(MemoryStore::new());
//! run.activate(MeasurementMode::Iv, bindings.clone());
//! run.set_field(Field::VoltageRange, "2");
//! assert_eq!(bindings.text(Field::CurrentRange), "200000");
//! let command = run.prepare_measurement()?;
//! println!("{command}");
//! # Ok::<(), experiment_runner::error::ValidationError>(())
//! ```

pub mod bindings;
pub mod config;
pub mod equipment;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod mode;
pub mod params;
pub mod run_params;
pub mod settings;
pub mod units;
pub mod validation;

pub use bindings::{Field, FieldBindings, MemoryBindings};
pub use config::RunnerConfig;
pub use error::{RunnerError, RunnerResult};
pub use launcher::{CommandLine, ExternalLauncher};
pub use mode::{MeasurementMode, Tab};
pub use run_params::RunParameters;
pub use settings::{FileStore, MemoryStore, QueuedStore, SettingsStore};
