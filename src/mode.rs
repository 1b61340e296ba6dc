//! Measurement modes and the tab model.
//!
//! Each [`MeasurementMode`] maps to exactly one measurement script and one
//! settings-key prefix through a closed lookup table. The script name doubles
//! as the prefix, so the persisted layout matches what the scripts' operators
//! already have on disk.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One measurement type, i.e. one tab of the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasurementMode {
    /// Plain I-V curve.
    Iv,
    /// I-V curves, temperature set by hand between runs.
    IvTempManual,
    /// I-V curves over an automatic temperature sweep.
    IvTempAuto,
    /// I-V curves over a magnetic field sweep.
    IvField,
    /// Voltage versus field at fixed bias currents.
    VField,
    /// Critical current statistics.
    CritStats,
    /// Resistance versus temperature.
    RTemp,
    /// Resistance versus temperature at several gate voltages.
    RTempGate,
    /// I-V curves over a gate voltage sweep.
    IvGate,
    /// I-V over gate voltage, repeated at several temperatures.
    IvGateTemp,
    /// I-V over gate voltage, repeated at several fields.
    IvGateField,
    /// Shapiro steps under microwave irradiation.
    Shapiro,
    /// Gate pulse switching.
    GatePulse,
}

impl MeasurementMode {
    /// All modes in tab order.
    pub const ALL: [MeasurementMode; 13] = [
        MeasurementMode::Iv,
        MeasurementMode::IvTempManual,
        MeasurementMode::IvTempAuto,
        MeasurementMode::IvField,
        MeasurementMode::VField,
        MeasurementMode::CritStats,
        MeasurementMode::RTemp,
        MeasurementMode::RTempGate,
        MeasurementMode::IvGate,
        MeasurementMode::IvGateTemp,
        MeasurementMode::IvGateField,
        MeasurementMode::Shapiro,
        MeasurementMode::GatePulse,
    ];

    /// Script file stem, also the settings-key prefix.
    pub fn script_name(self) -> &'static str {
        match self {
            MeasurementMode::Iv => "I_V",
            MeasurementMode::IvTempManual => "I_V_T_manual",
            MeasurementMode::IvTempAuto => "I_V_T_auto",
            MeasurementMode::IvField => "I_V_B",
            MeasurementMode::VField => "V_B",
            MeasurementMode::CritStats => "I_V_crit_stats",
            MeasurementMode::RTemp => "R_T",
            MeasurementMode::RTempGate => "R_T_Gate",
            MeasurementMode::IvGate => "I_V_Gate",
            MeasurementMode::IvGateTemp => "I_V_Gate_T",
            MeasurementMode::IvGateField => "I_V_Gate_B",
            MeasurementMode::Shapiro => "I_V_Shapiro_power",
            MeasurementMode::GatePulse => "Gate_pulse",
        }
    }

    /// Script file name passed to the interpreter.
    pub fn script_file(self) -> String {
        format!("{}.py", self.script_name())
    }

    /// Name used on the command line of the front-end (`iv`, `v-field`, ...).
    pub fn cli_name(self) -> &'static str {
        match self {
            MeasurementMode::Iv => "iv",
            MeasurementMode::IvTempManual => "iv-temp-manual",
            MeasurementMode::IvTempAuto => "iv-temp-auto",
            MeasurementMode::IvField => "iv-field",
            MeasurementMode::VField => "v-field",
            MeasurementMode::CritStats => "crit-stats",
            MeasurementMode::RTemp => "r-temp",
            MeasurementMode::RTempGate => "r-temp-gate",
            MeasurementMode::IvGate => "iv-gate",
            MeasurementMode::IvGateTemp => "iv-gate-temp",
            MeasurementMode::IvGateField => "iv-gate-field",
            MeasurementMode::Shapiro => "shapiro",
            MeasurementMode::GatePulse => "gate-pulse",
        }
    }

    /// Human readable title.
    pub fn title(self) -> &'static str {
        match self {
            MeasurementMode::Iv => "I-V",
            MeasurementMode::IvTempManual => "I-V-T (manual)",
            MeasurementMode::IvTempAuto => "I-V-T (auto)",
            MeasurementMode::IvField => "I-V-B",
            MeasurementMode::VField => "V-B",
            MeasurementMode::CritStats => "Critical current statistics",
            MeasurementMode::RTemp => "R-T",
            MeasurementMode::RTempGate => "R-T-Gate",
            MeasurementMode::IvGate => "I-V-Gate",
            MeasurementMode::IvGateTemp => "I-V-Gate-T",
            MeasurementMode::IvGateField => "I-V-Gate-B",
            MeasurementMode::Shapiro => "Shapiro steps",
            MeasurementMode::GatePulse => "Gate pulses",
        }
    }

    /// Tab position.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Mode at a tab position, if that tab is a measurement tab.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Modes whose field can come from either the Hall-probe source or the magnet.
    pub fn has_selectable_field_source(self) -> bool {
        matches!(self, MeasurementMode::IvField | MeasurementMode::VField)
    }
}

impl fmt::Display for MeasurementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for MeasurementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.cli_name() == s || mode.script_name() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|m| m.cli_name()).collect();
                format!("unknown measurement '{s}', expected one of: {}", names.join(", "))
            })
    }
}

/// A front-end tab: a measurement, or the equipment setup page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tab {
    Measurement(MeasurementMode),
    EquipmentSetup,
}

impl Tab {
    /// Index of the equipment setup tab (after all measurement tabs).
    pub const EQUIPMENT_SETUP_INDEX: usize = 13;

    /// Tab position.
    pub fn index(self) -> usize {
        match self {
            Tab::Measurement(mode) => mode.index(),
            Tab::EquipmentSetup => Self::EQUIPMENT_SETUP_INDEX,
        }
    }

    /// Tab at a position; out-of-range indices restore the first tab.
    pub fn from_index(index: usize) -> Self {
        if index == Self::EQUIPMENT_SETUP_INDEX {
            return Tab::EquipmentSetup;
        }
        Tab::Measurement(MeasurementMode::from_index(index).unwrap_or(MeasurementMode::Iv))
    }

    /// The measurement of this tab, if any.
    pub fn mode(self) -> Option<MeasurementMode> {
        match self {
            Tab::Measurement(mode) => Some(mode),
            Tab::EquipmentSetup => None,
        }
    }
}

impl Default for Tab {
    fn default() -> Self {
        Tab::Measurement(MeasurementMode::Iv)
    }
}
