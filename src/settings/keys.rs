//! Settings key table.
//!
//! Keys are built only from the closed tables below and the mode's script
//! name, never from free-form runtime text, so two settings cannot collide.

use crate::mode::MeasurementMode;

/// Last active tab index (integer).
pub const ACTIVE_TAB: &str = "ActiveTab";
/// Sample name (string).
pub const SAMPLE_NAME: &str = "SampleName";
/// Structure name (string).
pub const STRUCTURE_NAME: &str = "StructureName";
/// Contact numbers I+, I-, V+, V- (integer list).
pub const CONTACT_NUMBERS: &str = "ContactNumbers";

/// Current-sweep source address (integer).
pub const SWEEP_DEVICE_ID: &str = "SourceSweep";
/// Field or gate source address (integer).
pub const FIELD_GATE_DEVICE_ID: &str = "SourceExcitation";
/// LakeShore controller address (integer).
pub const LAKESHORE_ID: &str = "LakeShore";
/// Readout device address (integer).
pub const READOUT_DEVICE_ID: &str = "SourceReadout";
/// Sweep device type code (integer).
pub const SWEEP_DEVICE_TYPE: &str = "SweepDevice";
/// Readout device type code (integer).
pub const READOUT_DEVICE_TYPE: &str = "ReadoutDevice";
/// LakeShore model code (integer).
pub const LAKESHORE_MODEL: &str = "LakeShoreModel";
/// AMI magnet controller address (string, empty when unused).
pub const AMI_CONTROLLER: &str = "AMI_controller";
/// Microwave generator address (integer).
pub const GENERATOR_ID: &str = "Signal_generator";
/// Field coil constant (string).
pub const COIL_CONSTANT: &str = "CoilConstant";

/// Shapiro sweep kind (integer, 0 = power, 1 = frequency).
pub const SHAPIRO_TYPE: &str = "Shapiro_type";

/// Per-tab settings, stored under `<script name><suffix>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabKey {
    CurrentUnit,
    VoltageUnit,
    ResistanceUnit,
    Resistance,
    VoltageRange,
    VoltageStep,
    Gain,
    Delay,
    Samples,
}

impl TabKey {
    fn suffix(self) -> &'static str {
        match self {
            TabKey::CurrentUnit => "_I_units",
            TabKey::VoltageUnit => "_U_units",
            TabKey::ResistanceUnit => "_R_units",
            TabKey::Resistance => "_Resistance",
            TabKey::VoltageRange => "_VoltageRange",
            TabKey::VoltageStep => "_VoltageStep",
            TabKey::Gain => "_VoltageGain",
            TabKey::Delay => "_TimeStep",
            TabKey::Samples => "_SamplesPerStep",
        }
    }
}

/// Key of a per-tab setting.
pub fn tab_key(mode: MeasurementMode, key: TabKey) -> String {
    format!("{}{}", mode.script_name(), key.suffix())
}

/// Key of a positional tab parameter: `<script name>_param<N>`.
pub fn param_key(mode: MeasurementMode, index: usize) -> String {
    format!("{}_param{}", mode.script_name(), index)
}

/// Key recording whether the magnet drives the field of a mode.
pub fn field_source_key(mode: MeasurementMode) -> Option<&'static str> {
    match mode {
        MeasurementMode::IvField => Some("AMI_used_IVB"),
        MeasurementMode::VField => Some("AMI_used_VB"),
        _ => None,
    }
}

/// Shapiro values kept per sweep kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapiroKey {
    From,
    To,
    Step,
    Fixed,
}

/// Key of a Shapiro value for the power (`frequency == false`) or frequency sweep.
pub fn shapiro_key(frequency: bool, key: ShapiroKey) -> &'static str {
    match (frequency, key) {
        (false, ShapiroKey::From) => "Shapiro_power_start",
        (false, ShapiroKey::To) => "Shapiro_power_end",
        (false, ShapiroKey::Step) => "Shapiro_power_step",
        (false, ShapiroKey::Fixed) => "Shapiro_const_freq",
        (true, ShapiroKey::From) => "Shapiro_freq_start",
        (true, ShapiroKey::To) => "Shapiro_freq_end",
        (true, ShapiroKey::Step) => "Shapiro_freq_step",
        (true, ShapiroKey::Fixed) => "Shapiro_const_power",
    }
}
