//! Unit selection and voltage/current/resistance conversion.
//!
//! All conversions are pure. Text handling always uses `.` as the decimal
//! separator regardless of locale, and numbers are written back with seven
//! significant digits so that derived fields read the same as the single
//! precision values the measurement scripts were written against.

use crate::error::{ConversionError, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default multiplier applied by [`voltage_to_current`]: volts/ohms to nanoamperes.
pub const NANOAMPERE_SCALE: f64 = 1e9;

/// Significant digits kept by [`format_number`].
const DISPLAY_DIGITS: i32 = 7;

/// Current display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrentUnit {
    #[serde(rename = "nA")]
    NanoAmp,
    #[serde(rename = "mkA")]
    MicroAmp,
    #[serde(rename = "mA")]
    MilliAmp,
}

/// Voltage display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoltageUnit {
    #[serde(rename = "mkV")]
    MicroVolt,
    #[serde(rename = "mV")]
    MilliVolt,
}

/// Resistance entry unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResistanceUnit {
    #[serde(rename = "KOhm")]
    KiloOhm,
    #[serde(rename = "MOhm")]
    MegaOhm,
}

impl CurrentUnit {
    /// Name used both as persisted value and launch flag.
    pub fn as_str(self) -> &'static str {
        match self {
            CurrentUnit::NanoAmp => "nA",
            CurrentUnit::MicroAmp => "mkA",
            CurrentUnit::MilliAmp => "mA",
        }
    }
}

impl VoltageUnit {
    /// Name used both as persisted value and launch flag.
    pub fn as_str(self) -> &'static str {
        match self {
            VoltageUnit::MicroVolt => "mkV",
            VoltageUnit::MilliVolt => "mV",
        }
    }
}

impl ResistanceUnit {
    /// Name used both as persisted value and launch flag.
    pub fn as_str(self) -> &'static str {
        match self {
            ResistanceUnit::KiloOhm => "KOhm",
            ResistanceUnit::MegaOhm => "MOhm",
        }
    }

    /// Ohms per unit.
    pub fn multiplier(self) -> f64 {
        match self {
            ResistanceUnit::KiloOhm => 1_000.0,
            ResistanceUnit::MegaOhm => 1_000_000.0,
        }
    }
}

impl FromStr for CurrentUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nA" => Ok(CurrentUnit::NanoAmp),
            "mkA" => Ok(CurrentUnit::MicroAmp),
            "mA" => Ok(CurrentUnit::MilliAmp),
            other => Err(ParseError::new(other)),
        }
    }
}

impl FromStr for VoltageUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mkV" => Ok(VoltageUnit::MicroVolt),
            "mV" => Ok(VoltageUnit::MilliVolt),
            other => Err(ParseError::new(other)),
        }
    }
}

impl FromStr for ResistanceUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KOhm" => Ok(ResistanceUnit::KiloOhm),
            "MOhm" => Ok(ResistanceUnit::MegaOhm),
            other => Err(ParseError::new(other)),
        }
    }
}

impl fmt::Display for CurrentUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for VoltageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ResistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three unit radio groups of a measurement tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSelection {
    pub current: CurrentUnit,
    pub voltage: VoltageUnit,
    pub resistance: ResistanceUnit,
}

impl Default for UnitSelection {
    fn default() -> Self {
        Self {
            current: CurrentUnit::MicroAmp,
            voltage: VoltageUnit::MilliVolt,
            resistance: ResistanceUnit::KiloOhm,
        }
    }
}

/// Parses operator text as a finite number, always with `.` as separator.
pub fn parse_number(text: &str) -> Result<f64, ParseError> {
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::new(text)),
    }
}

/// Formats a value for a text field: seven significant digits, no trailing zeros.
pub fn format_number(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value.is_finite() {
            "0".to_string()
        } else {
            value.to_string()
        };
    }

    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (DISPLAY_DIGITS - 1 - magnitude).max(0) as usize;
    let mut text = format!("{value:.decimals$}");
    if text.contains('.') {
        let trimmed_len = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed_len);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

/// Resistance in Ohms from an entered magnitude and its unit.
pub fn resistance_ohms(magnitude: f64, unit: ResistanceUnit) -> Result<f64, ParseError> {
    if !magnitude.is_finite() {
        return Err(ParseError::new(magnitude.to_string()));
    }
    Ok(magnitude * unit.multiplier())
}

fn usable_resistance(resistance_ohms: f64) -> Result<f64, ConversionError> {
    if resistance_ohms == 0.0 || !resistance_ohms.is_finite() {
        return Err(ConversionError::InvalidResistance(resistance_ohms));
    }
    Ok(resistance_ohms)
}

fn finite(value: f64) -> Result<f64, ConversionError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConversionError::NonFinite)
    }
}

/// `voltage / resistance * scale`.
pub fn voltage_to_current(
    voltage: f64,
    resistance_ohms: f64,
    scale: f64,
) -> Result<f64, ConversionError> {
    let r = usable_resistance(resistance_ohms)?;
    finite(voltage / r * scale)
}

/// Inverse of [`voltage_to_current`].
pub fn current_to_voltage(
    current: f64,
    resistance_ohms: f64,
    scale: f64,
) -> Result<f64, ConversionError> {
    let r = usable_resistance(resistance_ohms)?;
    if scale == 0.0 || !scale.is_finite() {
        return Err(ConversionError::NonFinite);
    }
    finite(current / scale * r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resistance_uses_unit_multiplier() {
        assert_eq!(resistance_ohms(10.0, ResistanceUnit::KiloOhm).unwrap(), 10_000.0);
        assert_eq!(resistance_ohms(2.5, ResistanceUnit::MegaOhm).unwrap(), 2_500_000.0);
        assert!(resistance_ohms(f64::NAN, ResistanceUnit::KiloOhm).is_err());
        assert!(resistance_ohms(f64::INFINITY, ResistanceUnit::MegaOhm).is_err());
    }

    #[test]
    fn conversion_round_trips() {
        for &(v, r) in &[(1.0, 10_000.0), (0.001, 2.2e6), (32.0, 1.0), (1e-6, 47.0)] {
            for &scale in &[1.0, NANOAMPERE_SCALE] {
                let i = voltage_to_current(v, r, scale).unwrap();
                let back = current_to_voltage(i, r, scale).unwrap();
                assert!((back - v).abs() <= v * 1e-12, "{v} -> {i} -> {back}");
            }
        }
    }

    #[test]
    fn zero_resistance_is_a_conversion_error() {
        assert_eq!(
            voltage_to_current(1.0, 0.0, 1.0),
            Err(ConversionError::InvalidResistance(0.0))
        );
        assert!(current_to_voltage(1.0, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn parse_number_is_locale_independent() {
        assert_eq!(parse_number("0.1").unwrap(), 0.1);
        assert_eq!(parse_number(" -2.5 ").unwrap(), -2.5);
        assert_eq!(parse_number("1E3").unwrap(), 1000.0);
        assert!(parse_number("0,1").is_err());
        assert!(parse_number("").is_err());
        assert!(parse_number("abc").is_err());
        assert!(parse_number("inf").is_err());
        assert!(parse_number("NaN").is_err());
    }

    #[test]
    fn format_number_keeps_seven_significant_digits() {
        assert_eq!(format_number(100000.00000000001), "100000");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(1.0 / 3.0), "0.3333333");
        assert_eq!(format_number(-12.5), "-12.5");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(2e-7), "0.0000002");
        assert_eq!(format_number(12345678.0), "12345678");
    }

    #[test]
    fn unit_names_round_trip_through_from_str() {
        for unit in [CurrentUnit::NanoAmp, CurrentUnit::MicroAmp, CurrentUnit::MilliAmp] {
            assert_eq!(unit.as_str().parse::<CurrentUnit>().unwrap(), unit);
        }
        assert_eq!("mkV".parse::<VoltageUnit>().unwrap(), VoltageUnit::MicroVolt);
        assert_eq!("MOhm".parse::<ResistanceUnit>().unwrap(), ResistanceUnit::MegaOhm);
        assert!("Ohm".parse::<ResistanceUnit>().is_err());
    }
}
