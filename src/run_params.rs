//! The launcher core: tab lifecycle, sweep-range synchronisation, settings
//! persistence, validation and measurement start.
//!
//! # Sweep ranges
//!
//! Every measurement tab shows a voltage sweep (range, step) and the same sweep
//! expressed as current through the sample resistance, `I = V / R * scale`.
//! Editing either side recomputes the other:
//!
//! ```text
//!   resistance edit ──> update R ──┐
//!   voltage edit ───────────────────┴──> write current fields (voltage side suppressed)
//!   current edit ──────────────────────> write voltage fields (current side suppressed)
//! ```
//!
//! While derived values are written, notifications for the written side are
//! suppressed by an explicit guard. A front-end that reports the write back
//! later (its text-changed event fires after the core returns) is recognised
//! because the text equals what the core wrote, and is ignored. One edit
//! therefore produces exactly one write per derived field.
//!
//! # Readiness
//!
//! Resistance, voltages and currents each carry a ready flag. A parse failure
//! clears the flag of the edited group, a conversion failure (zero or unusable
//! resistance) clears the flag of the derived group, and a successful
//! recompute sets both. Error markers on the bindings follow the flags.
//! [`RunParameters::validate`] refuses to start while any flag is false.

use crate::bindings::{Field, FieldBindings};
use crate::config::RunnerConfig;
use crate::equipment::{Contact, Equipment, LakeShoreModel, ReadoutDevice, SampleMetadata, SweepDevice};
use crate::error::{ConversionError, RunnerResult, ValidationError};
use crate::launcher::{build_command, CommandLine, ExternalLauncher, LaunchRecord, LaunchSnapshot};
use crate::mode::{MeasurementMode, Tab};
use crate::params::{FieldSource, FieldSweepMode, ModeParameters, ShapiroSweep, TabParameterSet};
use crate::settings::keys::{self, ShapiroKey, TabKey};
use crate::settings::{SettingsExt, SettingsStore};
use crate::units::{self, CurrentUnit, ResistanceUnit, UnitSelection, VoltageUnit, NANOAMPERE_SCALE};
use crate::validation::{self, Limits};
use serde::Serialize;
use std::str::FromStr;
use tracing::{debug, warn};

/// Lifecycle of the tab selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabState {
    Uninitialized,
    Active(Tab),
}

/// Ready flags of the three field groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub resistance: bool,
    pub voltages: bool,
    pub currents: bool,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            resistance: true,
            voltages: true,
            currents: true,
        }
    }
}

impl Readiness {
    pub fn all(&self) -> bool {
        self.resistance && self.voltages && self.currents
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Resistance,
    Voltage,
    Current,
}

impl Group {
    fn fields(self) -> &'static [Field] {
        match self {
            Group::Resistance => &[Field::Resistance],
            Group::Voltage => &[Field::VoltageRange, Field::VoltageStep],
            Group::Current => &[Field::CurrentRange, Field::CurrentStep],
        }
    }

    /// Sweep side a field belongs to.
    fn sweep_side(field: Field) -> Option<Group> {
        match field {
            Field::VoltageRange | Field::VoltageStep => Some(Group::Voltage),
            Field::CurrentRange | Field::CurrentStep => Some(Group::Current),
            _ => None,
        }
    }
}

/// Texts of the common tab fields, as last typed or derived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepFields {
    pub resistance: String,
    pub voltage_range: String,
    pub voltage_step: String,
    pub current_range: String,
    pub current_step: String,
    pub gain: String,
    pub delay: String,
    pub samples: String,
}

impl SweepFields {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Resistance => &self.resistance,
            Field::VoltageRange => &self.voltage_range,
            Field::VoltageStep => &self.voltage_step,
            Field::CurrentRange => &self.current_range,
            Field::CurrentStep => &self.current_step,
            Field::Gain => &self.gain,
            Field::Delay => &self.delay,
            Field::Samples => &self.samples,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Resistance => &mut self.resistance,
            Field::VoltageRange => &mut self.voltage_range,
            Field::VoltageStep => &mut self.voltage_step,
            Field::CurrentRange => &mut self.current_range,
            Field::CurrentStep => &mut self.current_step,
            Field::Gain => &mut self.gain,
            Field::Delay => &mut self.delay,
            Field::Samples => &mut self.samples,
        }
    }
}

/// Per-tab key of a persisted field. Current fields are always derived.
fn persisted_key(field: Field) -> Option<TabKey> {
    match field {
        Field::Resistance => Some(TabKey::Resistance),
        Field::VoltageRange => Some(TabKey::VoltageRange),
        Field::VoltageStep => Some(TabKey::VoltageStep),
        Field::Gain => Some(TabKey::Gain),
        Field::Delay => Some(TabKey::Delay),
        Field::Samples => Some(TabKey::Samples),
        Field::CurrentRange | Field::CurrentStep => None,
    }
}

type Convert = fn(f64, f64, f64) -> Result<f64, ConversionError>;

/// Serializable view of the whole state, for display.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: Option<MeasurementMode>,
    pub units: UnitSelection,
    pub fields: SweepFields,
    pub readiness: Readiness,
    pub parameters: ModeParameters,
    pub field_source: FieldSource,
    pub equipment: Equipment,
    pub sample: SampleMetadata,
    pub save_data: bool,
}

/// Parameter state of the launcher. Owns the settings store.
pub struct RunParameters<S: SettingsStore> {
    store: S,
    scale: f64,
    limits: Limits,
    state: TabState,
    bindings: Option<Box<dyn FieldBindings>>,
    units: UnitSelection,
    fields: SweepFields,
    resistance_ohms: Option<f64>,
    ready: Readiness,
    /// Side whose fields are being written by the core.
    suppressed: Option<Group>,
    /// Last derived texts written, per side, to recognise echoed notifications.
    echo: Option<(Group, [String; 2])>,
    parameters: TabParameterSet,
    field_source: FieldSource,
    shapiro: ShapiroSweep,
    ami_override: String,
    equipment: Equipment,
    sample: SampleMetadata,
    save_data: bool,
    temperature_acknowledged: bool,
}

impl<S: SettingsStore> RunParameters<S> {
    /// Core with default equipment and limits; nothing is read from `store`
    /// until a tab is activated.
    pub fn new(store: S) -> Self {
        Self {
            store,
            scale: NANOAMPERE_SCALE,
            limits: Limits::default(),
            state: TabState::Uninitialized,
            bindings: None,
            units: UnitSelection::default(),
            fields: SweepFields::default(),
            resistance_ohms: None,
            ready: Readiness::default(),
            suppressed: None,
            echo: None,
            parameters: TabParameterSet::default(),
            field_source: FieldSource::default(),
            shapiro: ShapiroSweep::default(),
            ami_override: String::new(),
            equipment: Equipment::default(),
            sample: SampleMetadata::default(),
            save_data: true,
            temperature_acknowledged: false,
        }
    }

    /// Core configured from `config` with equipment and sample metadata
    /// restored from `store`.
    pub fn load(store: S, config: &RunnerConfig) -> Self {
        let equipment = Equipment::load(&store);
        let sample = SampleMetadata::load(&store);
        let mut params = Self::new(store)
            .with_scale(config.conversion.current_scale)
            .with_limits(config.limits.clone());
        params.equipment = equipment;
        params.sample = sample;
        debug!(
            sweep = params.equipment.sweep_device_id,
            field_gate = params.equipment.field_gate_device_id,
            "equipment restored"
        );
        params
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Tab that was active when settings were last saved.
    pub fn stored_tab(&self) -> Tab {
        self.store
            .load_int(keys::ACTIVE_TAB)
            .and_then(|i| usize::try_from(i).ok())
            .map(Tab::from_index)
            .unwrap_or_default()
    }

    // ---- tab lifecycle ---------------------------------------------------

    /// Switches to a measurement tab.
    ///
    /// The previous measurement tab, if any, is flushed to the store first.
    /// Units and field texts are restored from the store, falling back to what
    /// `bindings` currently shows; then resistance and currents are recomputed.
    pub fn activate<B: FieldBindings + 'static>(&mut self, mode: MeasurementMode, bindings: B) {
        self.leave_tab();
        self.state = TabState::Active(Tab::Measurement(mode));
        self.bindings = Some(Box::new(bindings));
        self.temperature_acknowledged = false;

        self.load_current_tab_settings();

        self.ready = Readiness::default();
        self.sync_error_markers();
        self.update_resistance();
        self.voltage_changed();
        debug!(mode = mode.script_name(), ready = self.ready.all(), "measurement tab activated");
    }

    /// Switches to the equipment setup tab.
    pub fn activate_equipment_setup(&mut self) {
        self.leave_tab();
        self.state = TabState::Active(Tab::EquipmentSetup);
        self.bindings = None;
        debug!("equipment setup tab activated");
    }

    /// Activates `tab`, using `bindings` when it is a measurement tab.
    pub fn activate_tab<B: FieldBindings + 'static>(&mut self, tab: Tab, bindings: B) {
        match tab {
            Tab::Measurement(mode) => self.activate(mode, bindings),
            Tab::EquipmentSetup => self.activate_equipment_setup(),
        }
    }

    fn leave_tab(&mut self) {
        if self.active_mode().is_some() {
            self.flush_current_tab_settings();
            self.parameters.clear();
        }
        self.suppressed = None;
        self.echo = None;
        self.ami_override.clear();
    }

    // ---- persistence -----------------------------------------------------

    /// Writes the active measurement tab's units, fields and parameters, then
    /// flushes the store. A no-op on the equipment tab.
    pub fn flush_current_tab_settings(&mut self) {
        let Some(mode) = self.active_mode() else {
            return;
        };
        self.store
            .save_text(&keys::tab_key(mode, TabKey::CurrentUnit), self.units.current.as_str());
        self.store
            .save_text(&keys::tab_key(mode, TabKey::VoltageUnit), self.units.voltage.as_str());
        self.store.save_text(
            &keys::tab_key(mode, TabKey::ResistanceUnit),
            self.units.resistance.as_str(),
        );
        for field in Field::ALL {
            if let Some(key) = persisted_key(field) {
                self.store
                    .save_text(&keys::tab_key(mode, key), self.fields.get(field));
            }
        }
        self.parameters.save(&mut self.store);

        if let Some(key) = keys::field_source_key(mode) {
            self.store
                .save_int(key, i64::from(self.field_source == FieldSource::Magnet));
        }
        if mode == MeasurementMode::Shapiro {
            self.save_shapiro_values();
        }
        self.store.flush_logged();
        debug!(mode = mode.script_name(), "tab settings flushed");
    }

    /// Restores the active tab's settings, key by key.
    pub fn load_current_tab_settings(&mut self) {
        let Some(mode) = self.active_mode() else {
            return;
        };
        let shown = self
            .bindings
            .as_ref()
            .map(|b| b.units())
            .unwrap_or_default();
        self.units = UnitSelection {
            current: self
                .load_parsed::<CurrentUnit>(&keys::tab_key(mode, TabKey::CurrentUnit))
                .unwrap_or(shown.current),
            voltage: self
                .load_parsed::<VoltageUnit>(&keys::tab_key(mode, TabKey::VoltageUnit))
                .unwrap_or(shown.voltage),
            resistance: self
                .load_parsed::<ResistanceUnit>(&keys::tab_key(mode, TabKey::ResistanceUnit))
                .unwrap_or(shown.resistance),
        };
        if let Some(bindings) = self.bindings.as_mut() {
            bindings.show_units(self.units);
        }

        for field in Field::ALL {
            let stored = persisted_key(field)
                .and_then(|key| self.store.load_text(&keys::tab_key(mode, key)));
            let text = match stored {
                Some(text) => {
                    if let Some(bindings) = self.bindings.as_mut() {
                        bindings.write(field, &text);
                    }
                    text
                }
                None => self
                    .bindings
                    .as_ref()
                    .map(|b| b.read(field))
                    .unwrap_or_default(),
            };
            *self.fields.slot_mut(field) = text;
        }

        self.parameters = TabParameterSet::load(mode, &self.store);

        self.field_source = FieldSource::HallProbe;
        if let Some(key) = keys::field_source_key(mode) {
            if self.store.load_int(key) == Some(1) {
                self.field_source = FieldSource::Magnet;
            }
        }
        self.refresh_ami_override();

        if mode == MeasurementMode::Shapiro {
            self.shapiro = self
                .store
                .load_int(keys::SHAPIRO_TYPE)
                .and_then(ShapiroSweep::from_code)
                .unwrap_or_default();
            self.load_shapiro_values();
        }
    }

    /// Flushes the active tab and writes the global keys. Shutdown path.
    pub fn save_all(&mut self) {
        self.flush_current_tab_settings();
        if let TabState::Active(tab) = self.state {
            self.store.save_int(keys::ACTIVE_TAB, tab.index() as i64);
        }
        self.equipment.save(&mut self.store);
        self.sample.save(&mut self.store);
        self.store.flush_logged();
    }

    fn load_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        let text = self.store.load_text(key)?;
        match text.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, value = %text, "ignoring unrecognised stored value");
                None
            }
        }
    }

    fn load_shapiro_values(&mut self) {
        let kind = self.shapiro;
        let defaults = kind.defaults();
        let generator = self.equipment.generator_id.to_string();
        let store = &self.store;
        if let ModeParameters::Shapiro(p) = self.parameters.record_mut() {
            p.sweep_kind = kind.code().to_string();
            for (slot, key, default) in [
                (&mut p.sweep_from, ShapiroKey::From, defaults[0]),
                (&mut p.sweep_to, ShapiroKey::To, defaults[1]),
                (&mut p.sweep_step, ShapiroKey::Step, defaults[2]),
                (&mut p.fixed_value, ShapiroKey::Fixed, defaults[3]),
            ] {
                *slot = store
                    .load_text(kind.key(key))
                    .unwrap_or_else(|| default.to_string());
            }
            p.generator_id = generator;
        }
    }

    fn save_shapiro_values(&mut self) {
        let kind = self.shapiro;
        if let ModeParameters::Shapiro(p) = self.parameters.record() {
            for (value, key) in [
                (&p.sweep_from, ShapiroKey::From),
                (&p.sweep_to, ShapiroKey::To),
                (&p.sweep_step, ShapiroKey::Step),
                (&p.fixed_value, ShapiroKey::Fixed),
            ] {
                self.store.save_text(kind.key(key), value);
            }
            self.store.save_int(keys::SHAPIRO_TYPE, kind.code());
        }
    }

    // ---- field edits -----------------------------------------------------

    /// The front-end reports that `field` changed; the new text is read from
    /// the bindings.
    pub fn field_changed(&mut self, field: Field) {
        let Some(text) = self.bindings.as_ref().map(|b| b.read(field)) else {
            debug!(?field, "change reported without bindings; ignored");
            return;
        };
        self.apply_edit(field, text);
    }

    /// Headless edit: sets the text of `field` (mirrored to the bindings) and
    /// runs the same update as [`field_changed`](Self::field_changed).
    pub fn set_field(&mut self, field: Field, text: &str) {
        if let Some(bindings) = self.bindings.as_mut() {
            bindings.write(field, text);
        }
        self.apply_edit(field, text.to_string());
    }

    fn apply_edit(&mut self, field: Field, text: String) {
        if self.active_mode().is_none() {
            debug!(?field, "edit outside a measurement tab; ignored");
            return;
        }
        if let Some(side) = Group::sweep_side(field) {
            if self.suppressed == Some(side) {
                debug!(?field, "converse update suppressed");
                return;
            }
            if self.is_echo(side, field, &text) {
                debug!(?field, "derived value echoed back; ignored");
                return;
            }
        }

        *self.fields.slot_mut(field) = text;
        match field {
            Field::Resistance => {
                self.update_resistance();
                self.voltage_changed();
            }
            Field::VoltageRange | Field::VoltageStep => self.voltage_changed(),
            Field::CurrentRange | Field::CurrentStep => self.current_changed(),
            Field::Gain | Field::Delay | Field::Samples => {}
        }
    }

    fn is_echo(&self, side: Group, field: Field, text: &str) -> bool {
        match &self.echo {
            Some((written, texts)) if *written == side => side
                .fields()
                .iter()
                .position(|f| *f == field)
                .is_some_and(|i| texts[i] == text),
            _ => false,
        }
    }

    fn update_resistance(&mut self) {
        let result = units::parse_number(&self.fields.resistance)
            .and_then(|magnitude| units::resistance_ohms(magnitude, self.units.resistance));
        match result {
            Ok(ohms) => {
                self.resistance_ohms = Some(ohms);
                self.set_ready(Group::Resistance, true);
            }
            Err(e) => {
                debug!(error = %e, "resistance not usable");
                self.resistance_ohms = None;
                self.set_ready(Group::Resistance, false);
            }
        }
    }

    fn voltage_changed(&mut self) {
        self.sweep_changed(Group::Voltage, Group::Current, units::voltage_to_current);
    }

    fn current_changed(&mut self) {
        self.sweep_changed(Group::Current, Group::Voltage, units::current_to_voltage);
    }

    /// Recomputes `derived` from the texts of `edited`.
    fn sweep_changed(&mut self, edited: Group, derived: Group, convert: Convert) {
        let [range_field, step_field] = [edited.fields()[0], edited.fields()[1]];
        let parsed = units::parse_number(self.fields.get(range_field)).and_then(|range| {
            units::parse_number(self.fields.get(step_field)).map(|step| (range, step))
        });
        let (range, step) = match parsed {
            Ok(values) => values,
            Err(e) => {
                debug!(error = %e, side = ?edited, "sweep value not parsed");
                self.echo = None;
                self.set_ready(edited, false);
                return;
            }
        };
        self.set_ready(edited, true);

        match self.convert(range, step, convert) {
            Ok(texts) => {
                self.write_derived(derived, texts);
                self.set_ready(derived, true);
            }
            Err(e) => {
                debug!(error = %e, side = ?derived, "derived sweep not computed");
                self.echo = None;
                self.set_ready(derived, false);
            }
        }
    }

    fn convert(&self, range: f64, step: f64, convert: Convert) -> Result<[String; 2], ConversionError> {
        let ohms = self
            .resistance_ohms
            .ok_or(ConversionError::InvalidResistance(f64::NAN))?;
        Ok([
            units::format_number(convert(range, ohms, self.scale)?),
            units::format_number(convert(step, ohms, self.scale)?),
        ])
    }

    fn write_derived(&mut self, side: Group, texts: [String; 2]) {
        self.suppressed = Some(side);
        for (field, text) in side.fields().iter().zip(&texts) {
            text.clone_into(self.fields.slot_mut(*field));
            if let Some(bindings) = self.bindings.as_mut() {
                bindings.write(*field, text);
            }
        }
        self.suppressed = None;
        self.echo = Some((side, texts));
    }

    fn set_ready(&mut self, group: Group, ready: bool) {
        let flag = match group {
            Group::Resistance => &mut self.ready.resistance,
            Group::Voltage => &mut self.ready.voltages,
            Group::Current => &mut self.ready.currents,
        };
        if *flag == ready {
            return;
        }
        *flag = ready;
        if let Some(bindings) = self.bindings.as_mut() {
            for field in group.fields() {
                bindings.set_error(*field, !ready);
            }
        }
    }

    fn sync_error_markers(&mut self) {
        let flags = [
            (Group::Resistance, self.ready.resistance),
            (Group::Voltage, self.ready.voltages),
            (Group::Current, self.ready.currents),
        ];
        if let Some(bindings) = self.bindings.as_mut() {
            for (group, ready) in flags {
                for field in group.fields() {
                    bindings.set_error(*field, !ready);
                }
            }
        }
    }

    // ---- unit selection --------------------------------------------------

    pub fn set_current_unit(&mut self, unit: CurrentUnit) {
        self.units.current = unit;
    }

    pub fn set_voltage_unit(&mut self, unit: VoltageUnit) {
        self.units.voltage = unit;
    }

    /// Changes the resistance unit and recomputes resistance and currents.
    pub fn set_resistance_unit(&mut self, unit: ResistanceUnit) {
        self.units.resistance = unit;
        if self.active_mode().is_some() {
            self.update_resistance();
            self.voltage_changed();
        }
    }

    // ---- mode parameters -------------------------------------------------

    /// Replaces the active tab's parameter list.
    ///
    /// On the Shapiro tab the list carries its own sweep kind; an unknown kind
    /// keeps the current one.
    pub fn set_parameters<T: AsRef<str>>(&mut self, values: &[T]) {
        if self.active_mode() != Some(MeasurementMode::Shapiro) {
            self.parameters.set_parameters(values);
            return;
        }
        self.save_shapiro_values();
        self.parameters.set_parameters(values);
        let kind = self
            .parameters
            .get(ShapiroSweep::PARAM_INDEX)
            .and_then(ShapiroSweep::parse_code);
        match kind {
            Some(kind) => self.shapiro = kind,
            None => {
                warn!(kind = ?self.shapiro, "unknown Shapiro sweep kind; keeping current");
                let current = self.shapiro.code().to_string();
                self.parameters.update_parameter(ShapiroSweep::PARAM_INDEX, &current);
            }
        }
    }

    /// Replaces one positional parameter. Out-of-range indices are ignored.
    ///
    /// The Shapiro sweep kind goes through [`Self::set_shapiro_sweep`] so the
    /// swept values follow it.
    pub fn update_parameter(&mut self, index: usize, value: &str) {
        if index == ShapiroSweep::PARAM_INDEX && self.active_mode() == Some(MeasurementMode::Shapiro) {
            match ShapiroSweep::parse_code(value) {
                Some(kind) => self.set_shapiro_sweep(kind),
                None => warn!(value, "unknown Shapiro sweep kind; update ignored"),
            }
            return;
        }
        self.parameters.update_parameter(index, value);
    }

    /// V-B sweep direction (parameter 6).
    pub fn set_field_sweep_mode(&mut self, sweep: FieldSweepMode) {
        if self.active_mode() == Some(MeasurementMode::VField) {
            self.parameters.update_parameter(6, sweep.code());
        } else {
            warn!("field sweep mode only applies to V-B; ignored");
        }
    }

    /// Field source of I-V-B and V-B. Selecting the magnet routes `-W` to the
    /// AMI controller.
    pub fn set_field_source(&mut self, source: FieldSource) {
        if !self.active_mode().is_some_and(MeasurementMode::has_selectable_field_source) {
            warn!(?source, "field source only applies to I-V-B and V-B; ignored");
            return;
        }
        self.field_source = source;
        self.refresh_ami_override();
    }

    /// Switches the Shapiro sweep kind, keeping each kind's values separately.
    pub fn set_shapiro_sweep(&mut self, kind: ShapiroSweep) {
        if self.active_mode() != Some(MeasurementMode::Shapiro) {
            warn!(?kind, "Shapiro sweep only applies to the Shapiro tab; ignored");
            return;
        }
        if kind == self.shapiro {
            return;
        }
        self.save_shapiro_values();
        self.shapiro = kind;
        self.load_shapiro_values();
    }

    fn refresh_ami_override(&mut self) {
        let magnet = self.field_source == FieldSource::Magnet
            && self.active_mode().is_some_and(MeasurementMode::has_selectable_field_source);
        self.ami_override = if magnet {
            self.equipment.ami_address.clone()
        } else {
            String::new()
        };
    }

    // ---- equipment and sample --------------------------------------------

    pub fn set_sweep_device_id(&mut self, id: i64) {
        self.equipment.sweep_device_id = id;
    }

    pub fn set_field_gate_device_id(&mut self, id: i64) {
        self.equipment.field_gate_device_id = id;
    }

    pub fn set_lakeshore_id(&mut self, id: i64) {
        self.equipment.lakeshore_id = id;
    }

    pub fn set_readout_device_id(&mut self, id: i64) {
        self.equipment.readout_device_id = id;
    }

    pub fn set_equipment_ids(&mut self, sweep: i64, field_gate: i64, lakeshore: i64) {
        self.equipment.sweep_device_id = sweep;
        self.equipment.field_gate_device_id = field_gate;
        self.equipment.lakeshore_id = lakeshore;
    }

    pub fn set_sweep_device(&mut self, device: SweepDevice) {
        self.equipment.sweep_device = device;
    }

    pub fn set_readout_device(&mut self, device: ReadoutDevice) {
        self.equipment.readout_device = device;
    }

    pub fn set_lakeshore_model(&mut self, model: LakeShoreModel) {
        self.equipment.lakeshore_model = model;
    }

    /// Stored AMI controller address.
    pub fn set_ami_address(&mut self, address: &str) {
        address.clone_into(&mut self.equipment.ami_address);
        self.refresh_ami_override();
    }

    /// Address sent as `-W` instead of the field/gate device id until the
    /// next tab switch. Empty restores the device id.
    pub fn set_ami(&mut self, address: &str) {
        address.clone_into(&mut self.ami_override);
    }

    pub fn set_generator_id(&mut self, id: i64) {
        self.equipment.generator_id = id;
        if let ModeParameters::Shapiro(p) = self.parameters.record_mut() {
            p.generator_id = id.to_string();
        }
    }

    pub fn set_coil_constant(&mut self, coil_constant: Option<String>) {
        self.equipment.coil_constant = coil_constant.filter(|c| !c.trim().is_empty());
    }

    pub fn set_sample_name(&mut self, name: &str) {
        name.clone_into(&mut self.sample.sample_name);
    }

    pub fn set_structure_name(&mut self, name: &str) {
        name.clone_into(&mut self.sample.structure_name);
    }

    pub fn set_contact(&mut self, contact: Contact, number: i64) {
        self.sample.contacts[contact.index()] = number;
    }

    pub fn set_contacts(&mut self, contacts: [i64; 4]) {
        self.sample.contacts = contacts;
    }

    /// `false` passes `-nosave` to the script.
    pub fn set_save_data(&mut self, save: bool) {
        self.save_data = save;
    }

    // ---- validation and launch -------------------------------------------

    /// Lets the next start proceed past a confirmable temperature ceiling.
    pub fn acknowledge_temperature_override(&mut self) {
        self.temperature_acknowledged = true;
    }

    /// Checks every rule that blocks a measurement start.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.active_mode().is_none() {
            return Err(ValidationError::NoMeasurementTab);
        }
        if !self.ready.all() {
            return Err(ValidationError::NotReady {
                resistance: self.ready.resistance,
                voltages: self.ready.voltages,
                currents: self.ready.currents,
            });
        }
        let range = validation::number("voltage_range", &self.fields.voltage_range)?;
        let step = validation::number("voltage_step", &self.fields.voltage_step)?;
        validation::check_sweep_voltage(range, step, self.equipment.sweep_device)?;
        validation::validate_mode(
            self.parameters.record(),
            self.field_source,
            &self.limits,
            self.temperature_acknowledged,
        )
    }

    /// Everything the launch command is built from.
    pub fn snapshot(&self) -> LaunchSnapshot {
        LaunchSnapshot {
            units: self.units,
            equipment: self.equipment.clone(),
            ami_override: self.ami_override.clone(),
            save_data: self.save_data,
            parameter_argument: self.parameters.launch_argument(),
            sample: self.sample.clone(),
            resistance: self.fields.resistance.clone(),
            voltage_range: self.fields.voltage_range.clone(),
            voltage_step: self.fields.voltage_step.clone(),
            gain: self.fields.gain.clone(),
            delay: self.fields.delay.clone(),
            samples: self.fields.samples.clone(),
        }
    }

    /// Validates and builds the launch command without spawning it.
    pub fn prepare_measurement(&self) -> Result<CommandLine, ValidationError> {
        self.validate()?;
        let mode = self.active_mode().ok_or(ValidationError::NoMeasurementTab)?;
        Ok(build_command(mode, &self.snapshot()))
    }

    /// Validates, builds and spawns the measurement script.
    ///
    /// A temperature acknowledgement is consumed by a successful start.
    pub fn start_measurement(&mut self, launcher: &ExternalLauncher) -> RunnerResult<LaunchRecord> {
        let command = self.prepare_measurement().map_err(|e| {
            warn!(error = %e, "measurement not started");
            e
        })?;
        let record = launcher.spawn(&command)?;
        self.temperature_acknowledged = false;
        debug!(
            script = %command.script,
            started_at = %record.started_at.format("%H:%M:%S"),
            "measurement started"
        );
        Ok(record)
    }

    // ---- readers ---------------------------------------------------------

    pub fn state(&self) -> TabState {
        self.state
    }

    pub fn active_tab(&self) -> Option<Tab> {
        match self.state {
            TabState::Active(tab) => Some(tab),
            TabState::Uninitialized => None,
        }
    }

    /// Mode of the active tab, `None` on the equipment tab or before activation.
    pub fn active_mode(&self) -> Option<MeasurementMode> {
        self.active_tab().and_then(Tab::mode)
    }

    pub fn units(&self) -> UnitSelection {
        self.units
    }

    pub fn field(&self, field: Field) -> &str {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &SweepFields {
        &self.fields
    }

    /// Resistance in Ohms, `None` while the resistance field is invalid.
    pub fn resistance_ohms(&self) -> Option<f64> {
        self.resistance_ohms
    }

    pub fn readiness(&self) -> Readiness {
        self.ready
    }

    pub fn is_ready(&self) -> bool {
        self.ready.all()
    }

    pub fn resistance_ready(&self) -> bool {
        self.ready.resistance
    }

    pub fn voltages_ready(&self) -> bool {
        self.ready.voltages
    }

    pub fn currents_ready(&self) -> bool {
        self.ready.currents
    }

    pub fn parameters(&self) -> &TabParameterSet {
        &self.parameters
    }

    pub fn field_source(&self) -> FieldSource {
        self.field_source
    }

    pub fn shapiro_sweep(&self) -> ShapiroSweep {
        self.shapiro
    }

    pub fn ami_override(&self) -> &str {
        &self.ami_override
    }

    pub fn equipment(&self) -> &Equipment {
        &self.equipment
    }

    pub fn sample(&self) -> &SampleMetadata {
        &self.sample
    }

    pub fn save_data(&self) -> bool {
        self.save_data
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gives the store back, e.g. to close a queued writer.
    pub fn into_store(self) -> S {
        self.store
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            mode: self.active_mode(),
            units: self.units,
            fields: self.fields.clone(),
            readiness: self.ready,
            parameters: self.parameters.record().clone(),
            field_source: self.field_source,
            equipment: self.equipment.clone(),
            sample: self.sample.clone(),
            save_data: self.save_data,
        }
    }
}
