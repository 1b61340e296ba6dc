//! Mode-specific measurement parameters.
//!
//! Every measurement mode beyond the common sweep fields has its own small set
//! of parameters (temperature sweep bounds, field ranges, gate points, ...).
//! They are held as one field-named record per mode ([`ModeParameters`]) and
//! only flattened into the positional string list the scripts expect at the
//! edges: persistence (`<script>_param<N>` keys), positional updates from the
//! front-end, and the launcher's `-P` argument.
//!
//! Values stay as the operator typed them. They are parsed during validation.

use crate::mode::MeasurementMode;
use crate::settings::keys::{self, ShapiroKey};
use crate::settings::{SettingsExt, SettingsStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Declares a per-mode parameter record with its positional layout and defaults.
macro_rules! parameter_record {
    (
        $(#[$meta:meta])*
        $name:ident { $( $(#[$fmeta:meta])* $field:ident = $default:expr ),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: String, )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self { $( $field: $default.to_string(), )* }
            }
        }

        impl $name {
            /// Field names in positional order.
            pub const FIELDS: &'static [&'static str] = &[ $( stringify!($field) ),* ];

            fn values(&self) -> Vec<&str> {
                vec![ $( self.$field.as_str() ),* ]
            }

            fn slot_mut(&mut self, index: usize) -> Option<&mut String> {
                let slots: Vec<&mut String> = vec![ $( &mut self.$field ),* ];
                slots.into_iter().nth(index)
            }
        }
    };
}

parameter_record! {
    /// I-V curves over an automatic temperature sweep (kelvin).
    IvTempAutoParams {
        /// `"0"` starts from the current temperature.
        sweep_from = "0",
        sweep_to = "1",
        sweep_step = "0.1",
        curve_repeats = "1",
    }
}

parameter_record! {
    /// I-V curves over a field sweep (gauss).
    IvFieldParams {
        field_range = "10",
        field_step = "1",
    }
}

parameter_record! {
    /// Voltage versus field at a set of bias currents.
    VFieldParams {
        field_from = "-10",
        field_to = "10",
        field_step = "0.5",
        /// Bias currents in mA.
        bias_start = "0",
        bias_end = "1",
        bias_step = "0.5",
        /// [`FieldSweepMode`] code.
        sweep_mode = "2",
    }
}

parameter_record! {
    CritStatsParams {
        curve_count = "100",
    }
}

parameter_record! {
    RTempParams {
        /// `"0"` starts from the current temperature.
        temperature_limit = "1.5",
        /// Seconds between points.
        wait_time = "10",
    }
}

parameter_record! {
    RTempGateParams {
        sweep_from = "0",
        sweep_to = "1",
        sweep_step = "0.1",
        /// Gate voltage range in volts.
        gate_range = "1",
        gate_points = "11",
    }
}

parameter_record! {
    IvGateParams {
        gate_range = "1",
        gate_step = "0.1",
    }
}

parameter_record! {
    IvGateTempParams {
        gate_from = "-1",
        gate_to = "1",
        gate_step = "0.1",
        temp_from = "0",
        temp_to = "1",
        temp_step = "0.1",
    }
}

parameter_record! {
    IvGateFieldParams {
        gate_sweep = "1",
        gate_points = "11",
        field_sweep = "10",
        field_points = "11",
    }
}

parameter_record! {
    /// Shapiro steps; `sweep_kind` is the [`ShapiroSweep`] code.
    ShapiroParams {
        sweep_kind = "0",
        sweep_from = "-50",
        sweep_to = "-30",
        sweep_step = "1",
        fixed_value = "1",
        generator_id = "18",
    }
}

parameter_record! {
    GatePulseParams {
        sweep_from = "0",
        sweep_to = "1",
        sweep_step = "0.1",
        repeat_count = "10",
        amplitude = "1",
        bias_current = "0",
        device_id = "6",
    }
}

/// The parameter record of one measurement mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ModeParameters {
    /// Modes that only use the common sweep fields.
    None,
    IvTempAuto(IvTempAutoParams),
    IvField(IvFieldParams),
    VField(VFieldParams),
    CritStats(CritStatsParams),
    RTemp(RTempParams),
    RTempGate(RTempGateParams),
    IvGate(IvGateParams),
    IvGateTemp(IvGateTempParams),
    IvGateField(IvGateFieldParams),
    Shapiro(ShapiroParams),
    GatePulse(GatePulseParams),
}

macro_rules! with_record {
    ($params:expr, $rec:ident => $body:expr, none => $none:expr) => {
        match $params {
            ModeParameters::None => $none,
            ModeParameters::IvTempAuto($rec) => $body,
            ModeParameters::IvField($rec) => $body,
            ModeParameters::VField($rec) => $body,
            ModeParameters::CritStats($rec) => $body,
            ModeParameters::RTemp($rec) => $body,
            ModeParameters::RTempGate($rec) => $body,
            ModeParameters::IvGate($rec) => $body,
            ModeParameters::IvGateTemp($rec) => $body,
            ModeParameters::IvGateField($rec) => $body,
            ModeParameters::Shapiro($rec) => $body,
            ModeParameters::GatePulse($rec) => $body,
        }
    };
}

impl ModeParameters {
    /// Default record for `mode`.
    pub fn defaults(mode: MeasurementMode) -> Self {
        match mode {
            MeasurementMode::Iv | MeasurementMode::IvTempManual => ModeParameters::None,
            MeasurementMode::IvTempAuto => ModeParameters::IvTempAuto(Default::default()),
            MeasurementMode::IvField => ModeParameters::IvField(Default::default()),
            MeasurementMode::VField => ModeParameters::VField(Default::default()),
            MeasurementMode::CritStats => ModeParameters::CritStats(Default::default()),
            MeasurementMode::RTemp => ModeParameters::RTemp(Default::default()),
            MeasurementMode::RTempGate => ModeParameters::RTempGate(Default::default()),
            MeasurementMode::IvGate => ModeParameters::IvGate(Default::default()),
            MeasurementMode::IvGateTemp => ModeParameters::IvGateTemp(Default::default()),
            MeasurementMode::IvGateField => ModeParameters::IvGateField(Default::default()),
            MeasurementMode::Shapiro => ModeParameters::Shapiro(Default::default()),
            MeasurementMode::GatePulse => ModeParameters::GatePulse(Default::default()),
        }
    }

    /// Parameter names in positional order.
    pub fn names(&self) -> &'static [&'static str] {
        fn names_of<T: HasFields>(_: &T) -> &'static [&'static str] {
            T::FIELD_NAMES
        }
        with_record!(self, rec => names_of(rec), none => &[])
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        with_record!(self, rec => rec.values().into_iter().nth(index), none => None)
    }

    /// Replaces the value at `index`. Returns false when the index is out of range.
    pub fn set(&mut self, index: usize, value: &str) -> bool {
        let slot = with_record!(self, rec => rec.slot_mut(index), none => None);
        match slot {
            Some(slot) => {
                value.clone_into(slot);
                true
            }
            None => false,
        }
    }

    /// Positional string list.
    pub fn to_list(&self) -> Vec<String> {
        with_record!(
            self,
            rec => rec.values().into_iter().map(str::to_string).collect(),
            none => Vec::new()
        )
    }
}

trait HasFields {
    const FIELD_NAMES: &'static [&'static str];
}

macro_rules! has_fields {
    ($($ty:ty),*) => {
        $( impl HasFields for $ty { const FIELD_NAMES: &'static [&'static str] = <$ty>::FIELDS; } )*
    };
}

has_fields!(
    IvTempAutoParams,
    IvFieldParams,
    VFieldParams,
    CritStatsParams,
    RTempParams,
    RTempGateParams,
    IvGateParams,
    IvGateTempParams,
    IvGateFieldParams,
    ShapiroParams,
    GatePulseParams
);

/// The per-tab parameter list of the active mode.
///
/// Rebuilt on every tab activation. Positional updates outside the mode's
/// layout are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabParameterSet {
    mode: Option<MeasurementMode>,
    record: ModeParameters,
}

impl Default for TabParameterSet {
    fn default() -> Self {
        Self {
            mode: None,
            record: ModeParameters::None,
        }
    }
}

impl TabParameterSet {
    /// Defaults for `mode`.
    pub fn for_mode(mode: MeasurementMode) -> Self {
        Self {
            mode: Some(mode),
            record: ModeParameters::defaults(mode),
        }
    }

    /// Stored values for `mode`, per index, falling back to defaults.
    pub fn load<S: SettingsStore + ?Sized>(mode: MeasurementMode, store: &S) -> Self {
        let mut set = Self::for_mode(mode);
        for index in 0..set.len() {
            if let Some(value) = store.load_text(&keys::param_key(mode, index)) {
                set.record.set(index, &value);
            }
        }
        set
    }

    /// Writes every parameter under `<script>_param<N>`.
    pub fn save<S: SettingsStore + ?Sized>(&self, store: &mut S) {
        let Some(mode) = self.mode else { return };
        for (index, value) in self.record.to_list().iter().enumerate() {
            store.save_text(&keys::param_key(mode, index), value);
        }
    }

    pub fn mode(&self) -> Option<MeasurementMode> {
        self.mode
    }

    pub fn record(&self) -> &ModeParameters {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut ModeParameters {
        &mut self.record
    }

    pub fn len(&self) -> usize {
        self.record.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.record.get(index)
    }

    pub fn values(&self) -> Vec<String> {
        self.record.to_list()
    }

    /// Drops all parameters.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Replaces the whole list for the current mode. Missing trailing values
    /// keep their defaults; extra values are dropped.
    pub fn set_parameters<T: AsRef<str>>(&mut self, values: &[T]) {
        let Some(mode) = self.mode else {
            warn!("parameters set with no active measurement tab; ignored");
            return;
        };
        let mut record = ModeParameters::defaults(mode);
        if values.len() > record.len() {
            warn!(
                mode = mode.script_name(),
                given = values.len(),
                expected = record.len(),
                "extra parameters dropped"
            );
        }
        for (index, value) in values.iter().enumerate() {
            record.set(index, value.as_ref());
        }
        self.record = record;
    }

    /// Replaces one parameter in place.
    ///
    /// An index outside the mode's layout is a no-op.
    pub fn update_parameter(&mut self, index: usize, value: &str) {
        let len = self.len();
        if !self.record.set(index, value) {
            warn!(
                mode = self.mode.map(|m| m.script_name()),
                index, len, "parameter index out of range; update ignored"
            );
        }
    }

    /// `-P` value: parameters joined by `;` in single quotes, or `None` when
    /// the mode has no parameters.
    pub fn launch_argument(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(format!("'{}'", self.values().join(";")))
    }
}

/// Where the magnetic field of I-V-B and V-B comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldSource {
    /// Coil driven by the field/gate source, read back by a Hall probe.
    #[default]
    HallProbe,
    /// AMI superconducting magnet.
    Magnet,
}

impl FromStr for FieldSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hall" | "hall-probe" | "yokogawa" => Ok(FieldSource::HallProbe),
            "magnet" | "ami" => Ok(FieldSource::Magnet),
            other => Err(format!("unknown field source '{other}', expected hall or magnet")),
        }
    }
}

/// Which quantity a Shapiro measurement sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapiroSweep {
    /// Sweep microwave power (dBm) at a fixed frequency (GHz).
    #[default]
    Power,
    /// Sweep frequency (GHz) at a fixed power (dBm).
    Frequency,
}

impl ShapiroSweep {
    pub fn code(self) -> i64 {
        match self {
            ShapiroSweep::Power => 0,
            ShapiroSweep::Frequency => 1,
        }
    }

    /// Position of the kind in the Shapiro parameter list.
    pub const PARAM_INDEX: usize = 0;

    /// Kind from its parameter text, which must be an integer code.
    pub fn parse_code(text: &str) -> Option<Self> {
        text.trim().parse().ok().and_then(Self::from_code)
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ShapiroSweep::Power),
            1 => Some(ShapiroSweep::Frequency),
            _ => None,
        }
    }

    /// Default from, to, step and fixed value.
    pub fn defaults(self) -> [&'static str; 4] {
        match self {
            ShapiroSweep::Power => ["-50", "-30", "1", "1"],
            ShapiroSweep::Frequency => ["1", "4", "0.25", "-50"],
        }
    }

    pub(crate) fn key(self, key: ShapiroKey) -> &'static str {
        keys::shapiro_key(self == ShapiroSweep::Frequency, key)
    }
}

impl FromStr for ShapiroSweep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "power" | "0" => Ok(ShapiroSweep::Power),
            "frequency" | "freq" | "1" => Ok(ShapiroSweep::Frequency),
            other => Err(format!("unknown Shapiro sweep '{other}', expected power or frequency")),
        }
    }
}

/// Field sweep direction of the V-B measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldSweepMode {
    Increase,
    Decrease,
    #[default]
    IncreaseDecrease,
    DecreaseIncrease,
    /// Up and down sweep recorded as one curve.
    IncreaseDecreaseOneCurve,
    DecreaseIncreaseOneCurve,
}

impl FieldSweepMode {
    pub const ALL: [FieldSweepMode; 6] = [
        FieldSweepMode::Increase,
        FieldSweepMode::Decrease,
        FieldSweepMode::IncreaseDecrease,
        FieldSweepMode::DecreaseIncrease,
        FieldSweepMode::IncreaseDecreaseOneCurve,
        FieldSweepMode::DecreaseIncreaseOneCurve,
    ];

    /// Code stored in the V-B parameter list.
    pub fn code(self) -> &'static str {
        match self {
            FieldSweepMode::Increase => "0",
            FieldSweepMode::Decrease => "1",
            FieldSweepMode::IncreaseDecrease => "2",
            FieldSweepMode::DecreaseIncrease => "3",
            FieldSweepMode::IncreaseDecreaseOneCurve => "4",
            FieldSweepMode::DecreaseIncreaseOneCurve => "5",
        }
    }
}

impl FromStr for FieldSweepMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let named = match s {
            "up" => Some(FieldSweepMode::Increase),
            "down" => Some(FieldSweepMode::Decrease),
            "up-down" => Some(FieldSweepMode::IncreaseDecrease),
            "down-up" => Some(FieldSweepMode::DecreaseIncrease),
            "up-down-one" => Some(FieldSweepMode::IncreaseDecreaseOneCurve),
            "down-up-one" => Some(FieldSweepMode::DecreaseIncreaseOneCurve),
            _ => None,
        };
        named
            .or_else(|| Self::ALL.into_iter().find(|m| m.code() == s))
            .ok_or_else(|| format!("unknown sweep mode '{s}', expected 0-5 or up/down/up-down/down-up[-one]"))
    }
}

impl fmt::Display for FieldSweepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryStore;

    #[test]
    fn layouts_follow_mode_table() {
        let lens: Vec<usize> = MeasurementMode::ALL
            .iter()
            .map(|m| ModeParameters::defaults(*m).len())
            .collect();
        assert_eq!(lens, vec![0, 0, 4, 2, 7, 1, 2, 5, 2, 6, 4, 6, 7]);
        assert_eq!(
            ModeParameters::defaults(MeasurementMode::IvGateTemp).names()[3],
            "temp_from"
        );
    }

    #[test]
    fn positional_access_maps_to_named_fields() {
        let mut params = ModeParameters::defaults(MeasurementMode::VField);
        assert!(params.set(6, "5"));
        assert!(params.set(3, "0.2"));
        match &params {
            ModeParameters::VField(vb) => {
                assert_eq!(vb.sweep_mode, "5");
                assert_eq!(vb.bias_start, "0.2");
            }
            other => panic!("unexpected record {other:?}"),
        }
        assert_eq!(params.get(6), Some("5"));
        assert!(!params.set(7, "x"));
        assert_eq!(params.get(7), None);
    }

    #[test]
    fn set_parameters_fills_missing_with_defaults() {
        let mut set = TabParameterSet::for_mode(MeasurementMode::RTempGate);
        set.set_parameters(&["0.05", "1.2"]);
        assert_eq!(set.values(), vec!["0.05", "1.2", "0.1", "1", "11"]);
    }

    #[test]
    fn parameters_persist_per_mode() {
        let mut store = MemoryStore::new();
        let mut set = TabParameterSet::for_mode(MeasurementMode::IvGate);
        set.update_parameter(0, "2.5");
        set.save(&mut store);
        assert_eq!(store.load_text("I_V_Gate_param0").as_deref(), Some("2.5"));

        let restored = TabParameterSet::load(MeasurementMode::IvGate, &store);
        assert_eq!(restored.values(), vec!["2.5", "0.1"]);
    }

    #[test]
    fn launch_argument_is_quoted_list() {
        let set = TabParameterSet::for_mode(MeasurementMode::IvField);
        assert_eq!(set.launch_argument().as_deref(), Some("'10;1'"));
        assert_eq!(TabParameterSet::for_mode(MeasurementMode::Iv).launch_argument(), None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn out_of_range_update_asserts_in_debug() {
        let mut set = TabParameterSet::for_mode(MeasurementMode::CritStats);
        set.update_parameter(3, "7");
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn out_of_range_update_is_ignored() {
        let mut set = TabParameterSet::for_mode(MeasurementMode::CritStats);
        set.update_parameter(3, "7");
        assert_eq!(set.values(), vec!["100"]);
    }

    #[test]
    fn field_sweep_modes_parse() {
        assert_eq!("3".parse::<FieldSweepMode>(), Ok(FieldSweepMode::DecreaseIncrease));
        assert_eq!("up-down-one".parse::<FieldSweepMode>().map(|m| m.code()), Ok("4"));
        assert!("6".parse::<FieldSweepMode>().is_err());
    }

    #[test]
    fn shapiro_defaults_per_kind() {
        assert_eq!(ShapiroSweep::Power.defaults(), ["-50", "-30", "1", "1"]);
        assert_eq!(ShapiroSweep::Frequency.defaults()[2], "0.25");
        assert_eq!(ShapiroSweep::Frequency.key(ShapiroKey::Fixed), "Shapiro_const_power");
    }
}
