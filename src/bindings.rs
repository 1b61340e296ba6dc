//! The seam between the core and whatever displays the sweep fields.
//!
//! The core never holds widget handles. A front-end implements
//! [`FieldBindings`] for the active tab and hands it to
//! [`RunParameters::activate`](crate::run_params::RunParameters::activate);
//! the core reads operator text through it, writes derived values back, and
//! toggles error markers.
//!
//! [`MemoryBindings`] is the headless implementation used by the CLI and the
//! tests. It is a cheap-clone handle over shared state, so a caller can keep
//! one copy while the core owns another and inspect what the core wrote.

use crate::units::UnitSelection;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Logical text fields shared by every measurement tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Resistance,
    VoltageRange,
    VoltageStep,
    CurrentRange,
    CurrentStep,
    Gain,
    Delay,
    Samples,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Resistance,
        Field::VoltageRange,
        Field::VoltageStep,
        Field::CurrentRange,
        Field::CurrentStep,
        Field::Gain,
        Field::Delay,
        Field::Samples,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::Resistance => "resistance",
            Field::VoltageRange => "voltage range",
            Field::VoltageStep => "voltage step",
            Field::CurrentRange => "current range",
            Field::CurrentStep => "current step",
            Field::Gain => "gain",
            Field::Delay => "delay",
            Field::Samples => "samples",
        }
    }
}

/// Access to the fields of the active tab.
pub trait FieldBindings {
    /// Current text of a field.
    fn read(&self, field: Field) -> String;

    /// Replaces the text of a field. Implementations must not call back into
    /// the core from here.
    fn write(&mut self, field: Field, text: &str);

    /// Sets or clears the error marker of a field.
    fn set_error(&mut self, field: Field, error: bool);

    /// Unit selection currently shown, used when nothing is stored.
    fn units(&self) -> UnitSelection;

    /// Shows a unit selection.
    fn show_units(&mut self, units: UnitSelection);
}

#[derive(Debug)]
struct BindingState {
    texts: HashMap<Field, String>,
    errors: HashSet<Field>,
    writes: HashMap<Field, usize>,
    units: UnitSelection,
}

impl Default for BindingState {
    fn default() -> Self {
        let texts = [
            (Field::Resistance, "10"),
            (Field::VoltageRange, "1"),
            (Field::VoltageStep, "0.1"),
            (Field::CurrentRange, ""),
            (Field::CurrentStep, ""),
            (Field::Gain, "1"),
            (Field::Delay, "0.1"),
            (Field::Samples, "10"),
        ]
        .into_iter()
        .map(|(field, text)| (field, text.to_string()))
        .collect();
        Self {
            texts,
            errors: HashSet::new(),
            writes: HashMap::new(),
            units: UnitSelection::default(),
        }
    }
}

/// In-memory fields with the front-end's initial values.
#[derive(Debug, Clone, Default)]
pub struct MemoryBindings(Arc<Mutex<BindingState>>);

impl MemoryBindings {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BindingState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builder-style initial text.
    pub fn with_text(self, field: Field, text: &str) -> Self {
        self.set_text(field, text);
        self
    }

    /// Simulates the operator typing into a field. Not counted as a core write.
    pub fn set_text(&self, field: Field, text: &str) {
        self.state().texts.insert(field, text.to_string());
    }

    pub fn text(&self, field: Field) -> String {
        self.state().texts.get(&field).cloned().unwrap_or_default()
    }

    /// Number of [`FieldBindings::write`] calls the core made for `field`.
    pub fn write_count(&self, field: Field) -> usize {
        self.state().writes.get(&field).copied().unwrap_or(0)
    }

    pub fn reset_write_counts(&self) {
        self.state().writes.clear();
    }

    pub fn has_error(&self, field: Field) -> bool {
        self.state().errors.contains(&field)
    }

    /// Unit selection last shown by the core.
    pub fn shown_units(&self) -> UnitSelection {
        self.state().units
    }

    /// Simulates the operator picking units before the tab is activated.
    pub fn set_units(&self, units: UnitSelection) {
        self.state().units = units;
    }
}

impl FieldBindings for MemoryBindings {
    fn read(&self, field: Field) -> String {
        self.text(field)
    }

    fn write(&mut self, field: Field, text: &str) {
        let mut state = self.state();
        state.texts.insert(field, text.to_string());
        *state.writes.entry(field).or_insert(0) += 1;
    }

    fn set_error(&mut self, field: Field, error: bool) {
        let mut state = self.state();
        if error {
            state.errors.insert(field);
        } else {
            state.errors.remove(&field);
        }
    }

    fn units(&self) -> UnitSelection {
        self.state().units
    }

    fn show_units(&mut self, units: UnitSelection) {
        self.state().units = units;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let handle = MemoryBindings::new();
        let mut owned = handle.clone();
        owned.write(Field::CurrentRange, "100");
        owned.set_error(Field::Resistance, true);

        assert_eq!(handle.text(Field::CurrentRange), "100");
        assert_eq!(handle.write_count(Field::CurrentRange), 1);
        assert!(handle.has_error(Field::Resistance));
    }

    #[test]
    fn operator_edits_are_not_counted_as_writes() {
        let handle = MemoryBindings::new().with_text(Field::VoltageRange, "2");
        assert_eq!(handle.read(Field::VoltageRange), "2");
        assert_eq!(handle.write_count(Field::VoltageRange), 0);
    }
}
