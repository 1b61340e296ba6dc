//! Instrument addresses, device types and sample metadata.
//!
//! This is the mode-independent part of the launcher state. It is loaded once
//! at startup, edited on the equipment setup tab, and written back at shutdown.
//! Device types are persisted as the integer codes the measurement scripts
//! receive in `-WT`, `-RT` and `-LT`.

use crate::error::ParseError;
use crate::settings::keys;
use crate::settings::{SettingsExt, SettingsStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source driving the I-V current sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepDevice {
    #[default]
    Yokogawa,
    Keithley6220,
    Keithley2400,
}

impl SweepDevice {
    pub const ALL: [SweepDevice; 3] = [
        SweepDevice::Yokogawa,
        SweepDevice::Keithley6220,
        SweepDevice::Keithley2400,
    ];

    /// Integer code passed as `-WT`.
    pub fn code(self) -> i64 {
        match self {
            SweepDevice::Yokogawa => 0,
            SweepDevice::Keithley6220 => 1,
            SweepDevice::Keithley2400 => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.code() == code)
    }

    /// Highest voltage range the source can output, in volts.
    ///
    /// Yokogawa GS200: 32 V. Keithley 6220: 105 V compliance.
    /// Keithley 2400: 210 V.
    pub fn voltage_ceiling(self) -> f64 {
        match self {
            SweepDevice::Yokogawa => 32.0,
            SweepDevice::Keithley6220 => 105.0,
            SweepDevice::Keithley2400 => 210.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SweepDevice::Yokogawa => "Yokogawa",
            SweepDevice::Keithley6220 => "Keithley 6220",
            SweepDevice::Keithley2400 => "Keithley 2400",
        }
    }
}

/// Voltage readout instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadoutDevice {
    /// Leonardo ADC board. Its VISA address is ignored by the scripts.
    #[default]
    Leonardo,
    Keithley2182,
    Keithley2400,
}

impl ReadoutDevice {
    pub const ALL: [ReadoutDevice; 3] = [
        ReadoutDevice::Leonardo,
        ReadoutDevice::Keithley2182,
        ReadoutDevice::Keithley2400,
    ];

    /// Integer code passed as `-RT`.
    pub fn code(self) -> i64 {
        match self {
            ReadoutDevice::Leonardo => 0,
            ReadoutDevice::Keithley2182 => 1,
            ReadoutDevice::Keithley2400 => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            ReadoutDevice::Leonardo => "Leonardo",
            ReadoutDevice::Keithley2182 => "Keithley 2182",
            ReadoutDevice::Keithley2400 => "Keithley 2400",
        }
    }
}

/// LakeShore temperature controller model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LakeShoreModel {
    #[default]
    Ls370,
    Ls335,
}

impl LakeShoreModel {
    pub const ALL: [LakeShoreModel; 2] = [LakeShoreModel::Ls370, LakeShoreModel::Ls335];

    /// Integer code passed as `-LT`.
    pub fn code(self) -> i64 {
        match self {
            LakeShoreModel::Ls370 => 0,
            LakeShoreModel::Ls335 => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            LakeShoreModel::Ls370 => "LakeShore 370",
            LakeShoreModel::Ls335 => "LakeShore 335",
        }
    }
}

/// Parses a device selector given either as its integer code or as a short
/// name (`yokogawa`, `k6220`, `2182`, `ls335`, ...).
fn parse_device<T: Copy>(
    s: &str,
    all: &[T],
    code: impl Fn(T) -> i64,
    names: impl Fn(T) -> &'static [&'static str],
) -> Result<T, ParseError> {
    let wanted = s.trim().to_ascii_lowercase();
    if let Ok(n) = wanted.parse::<i64>() {
        if let Some(found) = all.iter().copied().find(|d| code(*d) == n) {
            return Ok(found);
        }
    }
    all.iter()
        .copied()
        .find(|d| names(*d).contains(&wanted.as_str()))
        .ok_or_else(|| ParseError::new(s))
}

impl FromStr for SweepDevice {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_device(s, &Self::ALL, Self::code, |d| match d {
            SweepDevice::Yokogawa => &["yokogawa", "gs200"],
            SweepDevice::Keithley6220 => &["keithley6220", "k6220", "6220"],
            SweepDevice::Keithley2400 => &["keithley2400", "k2400", "2400"],
        })
    }
}

impl FromStr for ReadoutDevice {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_device(s, &Self::ALL, Self::code, |d| match d {
            ReadoutDevice::Leonardo => &["leonardo"],
            ReadoutDevice::Keithley2182 => &["keithley2182", "k2182", "2182"],
            ReadoutDevice::Keithley2400 => &["keithley2400", "k2400", "2400"],
        })
    }
}

impl FromStr for LakeShoreModel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_device(s, &Self::ALL, Self::code, |m| match m {
            LakeShoreModel::Ls370 => &["ls370", "370"],
            LakeShoreModel::Ls335 => &["ls335", "335"],
        })
    }
}

impl fmt::Display for SweepDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for ReadoutDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for LakeShoreModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// VISA addresses and device types of the measurement rack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub sweep_device_id: i64,
    pub field_gate_device_id: i64,
    pub lakeshore_id: i64,
    pub readout_device_id: i64,
    pub sweep_device: SweepDevice,
    pub readout_device: ReadoutDevice,
    pub lakeshore_model: LakeShoreModel,
    /// AMI magnet controller address; empty when no magnet is installed.
    pub ami_address: String,
    pub generator_id: i64,
    /// Field coil constant passed as `-CC`; the scripts assume 1 when absent.
    pub coil_constant: Option<String>,
}

impl Default for Equipment {
    fn default() -> Self {
        Self {
            sweep_device_id: 3,
            field_gate_device_id: 6,
            lakeshore_id: 17,
            readout_device_id: 9,
            sweep_device: SweepDevice::Yokogawa,
            readout_device: ReadoutDevice::Leonardo,
            lakeshore_model: LakeShoreModel::Ls370,
            ami_address: String::new(),
            generator_id: 18,
            coil_constant: None,
        }
    }
}

impl Equipment {
    /// Reads every key, keeping the default for anything missing or invalid.
    pub fn load<S: SettingsStore + ?Sized>(store: &S) -> Self {
        let d = Self::default();
        Self {
            sweep_device_id: store.load_int(keys::SWEEP_DEVICE_ID).unwrap_or(d.sweep_device_id),
            field_gate_device_id: store
                .load_int(keys::FIELD_GATE_DEVICE_ID)
                .unwrap_or(d.field_gate_device_id),
            lakeshore_id: store.load_int(keys::LAKESHORE_ID).unwrap_or(d.lakeshore_id),
            readout_device_id: store
                .load_int(keys::READOUT_DEVICE_ID)
                .unwrap_or(d.readout_device_id),
            sweep_device: store
                .load_int(keys::SWEEP_DEVICE_TYPE)
                .and_then(SweepDevice::from_code)
                .unwrap_or(d.sweep_device),
            readout_device: store
                .load_int(keys::READOUT_DEVICE_TYPE)
                .and_then(ReadoutDevice::from_code)
                .unwrap_or(d.readout_device),
            lakeshore_model: store
                .load_int(keys::LAKESHORE_MODEL)
                .and_then(LakeShoreModel::from_code)
                .unwrap_or(d.lakeshore_model),
            ami_address: store.load_text(keys::AMI_CONTROLLER).unwrap_or(d.ami_address),
            generator_id: store.load_int(keys::GENERATOR_ID).unwrap_or(d.generator_id),
            coil_constant: store
                .load_text(keys::COIL_CONSTANT)
                .filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn save<S: SettingsStore + ?Sized>(&self, store: &mut S) {
        store.save_int(keys::SWEEP_DEVICE_ID, self.sweep_device_id);
        store.save_int(keys::FIELD_GATE_DEVICE_ID, self.field_gate_device_id);
        store.save_int(keys::LAKESHORE_ID, self.lakeshore_id);
        store.save_int(keys::READOUT_DEVICE_ID, self.readout_device_id);
        store.save_int(keys::SWEEP_DEVICE_TYPE, self.sweep_device.code());
        store.save_int(keys::READOUT_DEVICE_TYPE, self.readout_device.code());
        store.save_int(keys::LAKESHORE_MODEL, self.lakeshore_model.code());
        store.save_text(keys::AMI_CONTROLLER, &self.ami_address);
        store.save_int(keys::GENERATOR_ID, self.generator_id);
        store.save_text(
            keys::COIL_CONSTANT,
            self.coil_constant.as_deref().unwrap_or_default(),
        );
    }
}

/// The four sample contacts wired to the measurement lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    CurrentPlus,
    CurrentMinus,
    VoltagePlus,
    VoltageMinus,
}

impl Contact {
    pub fn index(self) -> usize {
        match self {
            Contact::CurrentPlus => 0,
            Contact::CurrentMinus => 1,
            Contact::VoltagePlus => 2,
            Contact::VoltageMinus => 3,
        }
    }
}

/// Sample description stored alongside the measurement data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMetadata {
    pub sample_name: String,
    pub structure_name: String,
    /// Contact numbers in the order I+, I-, V+, V-.
    pub contacts: [i64; 4],
}

impl Default for SampleMetadata {
    fn default() -> Self {
        Self {
            sample_name: "Sample 1".to_string(),
            structure_name: String::new(),
            contacts: [1, 2, 3, 4],
        }
    }
}

impl SampleMetadata {
    pub fn load<S: SettingsStore + ?Sized>(store: &S) -> Self {
        let d = Self::default();
        let contacts = store
            .load_int_list(keys::CONTACT_NUMBERS)
            .and_then(|list| <[i64; 4]>::try_from(list).ok())
            .unwrap_or(d.contacts);
        Self {
            sample_name: store.load_text(keys::SAMPLE_NAME).unwrap_or(d.sample_name),
            structure_name: store
                .load_text(keys::STRUCTURE_NAME)
                .unwrap_or(d.structure_name),
            contacts,
        }
    }

    pub fn save<S: SettingsStore + ?Sized>(&self, store: &mut S) {
        store.save_text(keys::SAMPLE_NAME, &self.sample_name);
        store.save_text(keys::STRUCTURE_NAME, &self.structure_name);
        store.save_int_list(keys::CONTACT_NUMBERS, &self.contacts);
    }

    /// Contacts rendered as `-C` expects them: `1,2,3,4`.
    pub fn contact_list(&self) -> String {
        self.contacts
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryStore;

    #[test]
    fn defaults_match_rack_wiring() {
        let eq = Equipment::default();
        assert_eq!(
            (eq.sweep_device_id, eq.field_gate_device_id, eq.lakeshore_id, eq.readout_device_id),
            (3, 6, 17, 9)
        );
        assert_eq!(eq.generator_id, 18);
        assert!(eq.ami_address.is_empty());
    }

    #[test]
    fn device_codes_round_trip() {
        for d in SweepDevice::ALL {
            assert_eq!(SweepDevice::from_code(d.code()), Some(d));
        }
        assert_eq!(ReadoutDevice::from_code(1), Some(ReadoutDevice::Keithley2182));
        assert_eq!(LakeShoreModel::from_code(2), None);
    }

    #[test]
    fn devices_parse_from_names_and_codes() {
        assert_eq!("k6220".parse::<SweepDevice>(), Ok(SweepDevice::Keithley6220));
        assert_eq!("2".parse::<SweepDevice>(), Ok(SweepDevice::Keithley2400));
        assert_eq!("Leonardo".parse::<ReadoutDevice>(), Ok(ReadoutDevice::Leonardo));
        assert_eq!("335".parse::<LakeShoreModel>(), Ok(LakeShoreModel::Ls335));
        assert!("keithley".parse::<SweepDevice>().is_err());
    }

    #[test]
    fn equipment_persists_through_store() {
        let mut store = MemoryStore::new();
        let eq = Equipment {
            sweep_device_id: 11,
            sweep_device: SweepDevice::Keithley2400,
            lakeshore_model: LakeShoreModel::Ls335,
            ami_address: "TCPIP::10.0.0.5::7180::SOCKET".to_string(),
            coil_constant: Some("0.98".to_string()),
            ..Equipment::default()
        };
        eq.save(&mut store);
        assert_eq!(store.load_int("SweepDevice"), Some(2));
        assert_eq!(Equipment::load(&store), eq);
    }

    #[test]
    fn unknown_device_code_falls_back_to_default() {
        let mut store = MemoryStore::new();
        store.save_int("SweepDevice", 7);
        assert_eq!(Equipment::load(&store).sweep_device, SweepDevice::Yokogawa);
    }

    #[test]
    fn contact_list_needs_four_entries() {
        let mut store = MemoryStore::new();
        store.save_int_list("ContactNumbers", &[5, 6]);
        assert_eq!(SampleMetadata::load(&store).contacts, [1, 2, 3, 4]);

        store.save_int_list("ContactNumbers", &[8, 7, 6, 5]);
        let sample = SampleMetadata::load(&store);
        assert_eq!(sample.contact_list(), "8,7,6,5");
        assert_eq!(sample.sample_name, "Sample 1");
    }
}
