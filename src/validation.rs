//! Physical and instrument limits checked before a measurement starts.
//!
//! The helpers here are pure. [`RunParameters::validate`] applies them in a
//! fixed order: active tab, readiness, sweep device ceiling, step versus range,
//! then the mode rule table in [`validate_mode`].
//!
//! [`RunParameters::validate`]: crate::run_params::RunParameters::validate

use crate::equipment::SweepDevice;
use crate::error::ValidationError;
use crate::params::{FieldSource, ModeParameters, ShapiroSweep};
use crate::units::parse_number;
use serde::{Deserialize, Serialize};

/// Absolute tolerance applied to every physical ceiling.
pub const CEILING_TOLERANCE: f64 = 0.001;

/// What happens when a temperature sweep ends above the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemperaturePolicy {
    /// Always refuse.
    Block,
    /// Refuse until the operator acknowledges the risk.
    #[default]
    ConfirmOverride,
    /// Skip the ceiling check.
    Disabled,
}

/// Configurable limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Highest sweep temperature, K.
    pub max_temperature_k: f64,
    pub temperature_policy: TemperaturePolicy,
    /// Highest field through the Hall-probe coil, G.
    pub max_field_gauss: f64,
    /// Highest bias current, mA.
    pub max_current_ma: f64,
    /// Highest gate voltage, V.
    pub max_gate_volts: f64,
    /// Highest microwave frequency, GHz. Unchecked when absent.
    pub max_frequency_ghz: Option<f64>,
    /// Highest microwave power, dBm. Unchecked when absent.
    pub max_power_dbm: Option<f64>,
    /// Hold bias currents and gate voltages to the ceiling by magnitude.
    /// Off by default: only the positive side is limited.
    pub bipolar_ceilings: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_temperature_k: 1.7,
            temperature_policy: TemperaturePolicy::ConfirmOverride,
            max_field_gauss: 60.0,
            max_current_ma: 200.0,
            max_gate_volts: 4.0,
            max_frequency_ghz: None,
            max_power_dbm: None,
            bipolar_ceilings: false,
        }
    }
}

impl Limits {
    fn bounded(&self, value: f64) -> f64 {
        if self.bipolar_ceilings {
            value.abs()
        } else {
            value
        }
    }
}

/// A bounded quantity, with the name and unit used in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Field,
    Current,
    GateVoltage,
    Frequency,
    Power,
}

impl Quantity {
    pub fn name(self) -> &'static str {
        match self {
            Quantity::Field => "field",
            Quantity::Current => "current",
            Quantity::GateVoltage => "gate voltage",
            Quantity::Frequency => "frequency",
            Quantity::Power => "power",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Quantity::Field => "G",
            Quantity::Current => "mA",
            Quantity::GateVoltage => "V",
            Quantity::Frequency => "GHz",
            Quantity::Power => "dBm",
        }
    }
}

/// True unless `value` is above `ceiling` by more than [`CEILING_TOLERANCE`].
pub fn within_ceiling(value: f64, ceiling: f64) -> bool {
    value - CEILING_TOLERANCE <= ceiling
}

/// Fails iff `value - 0.001 > ceiling`.
pub fn check_ceiling(quantity: Quantity, value: f64, ceiling: f64) -> Result<(), ValidationError> {
    if within_ceiling(value, ceiling) {
        Ok(())
    } else {
        Err(ValidationError::AboveCeiling {
            quantity: quantity.name(),
            value,
            ceiling,
            unit: quantity.unit(),
        })
    }
}

/// Temperature sweep from `from` to `to` with `step`.
///
/// The end must not be below the start for an upward sweep. The end is then
/// held against the ceiling according to the limits' policy; an acknowledged
/// [`TemperaturePolicy::ConfirmOverride`] passes.
pub fn check_temperature(
    from: f64,
    to: f64,
    step: f64,
    limits: &Limits,
    acknowledged: bool,
) -> Result<(), ValidationError> {
    if to < from && step > 0.0 {
        return Err(ValidationError::TemperatureNotMonotonic { from, to });
    }
    if within_ceiling(to, limits.max_temperature_k) {
        return Ok(());
    }
    let overridable = match limits.temperature_policy {
        TemperaturePolicy::Disabled => return Ok(()),
        TemperaturePolicy::ConfirmOverride if acknowledged => return Ok(()),
        TemperaturePolicy::ConfirmOverride => true,
        TemperaturePolicy::Block => false,
    };
    Err(ValidationError::TemperatureAboveCeiling {
        value: to,
        ceiling: limits.max_temperature_k,
        overridable,
    })
}

/// Field magnitude; only the Hall-probe coil is limited.
pub fn check_field(value: f64, source: FieldSource, limits: &Limits) -> Result<(), ValidationError> {
    match source {
        FieldSource::Magnet => Ok(()),
        FieldSource::HallProbe => check_ceiling(Quantity::Field, value.abs(), limits.max_field_gauss),
    }
}

/// Bias currents, mA. Negative values pass unless
/// [`Limits::bipolar_ceilings`] is set.
pub fn check_currents(values: &[f64], limits: &Limits) -> Result<(), ValidationError> {
    values.iter().try_for_each(|&v| {
        check_ceiling(Quantity::Current, limits.bounded(v), limits.max_current_ma)
    })
}

/// Gate voltage, V. Signed like [`check_currents`].
pub fn check_gate(value: f64, limits: &Limits) -> Result<(), ValidationError> {
    check_ceiling(Quantity::GateVoltage, limits.bounded(value), limits.max_gate_volts)
}

fn check_optional(quantity: Quantity, value: f64, ceiling: Option<f64>) -> Result<(), ValidationError> {
    match ceiling {
        Some(ceiling) => check_ceiling(quantity, value, ceiling),
        None => Ok(()),
    }
}

/// Sweep voltage range against the sweep source, then step against range.
pub fn check_sweep_voltage(range: f64, step: f64, device: SweepDevice) -> Result<(), ValidationError> {
    let ceiling = device.voltage_ceiling();
    if range > ceiling {
        return Err(ValidationError::VoltageAboveDeviceLimit {
            value: range,
            ceiling,
            device: device.label(),
        });
    }
    if step > range {
        return Err(ValidationError::StepExceedsRange { step, range });
    }
    Ok(())
}

/// Parses a mode parameter for validation.
pub fn number(name: &'static str, text: &str) -> Result<f64, ValidationError> {
    parse_number(text).map_err(|_| ValidationError::InvalidNumber {
        name,
        text: text.to_string(),
    })
}

/// Mode-specific rules.
///
/// Field ceilings apply to the magnitude. Currents and gate voltages are
/// compared signed unless [`Limits::bipolar_ceilings`] is set.
pub fn validate_mode(
    params: &ModeParameters,
    field_source: FieldSource,
    limits: &Limits,
    temperature_acknowledged: bool,
) -> Result<(), ValidationError> {
    let temperature = |from: f64, to: f64, step: f64| {
        check_temperature(from, to, step, limits, temperature_acknowledged)
    };

    match params {
        ModeParameters::IvTempAuto(p) => temperature(
            number("sweep_from", &p.sweep_from)?,
            number("sweep_to", &p.sweep_to)?,
            number("sweep_step", &p.sweep_step)?,
        ),
        ModeParameters::IvField(p) => {
            check_field(number("field_range", &p.field_range)?, field_source, limits)
        }
        ModeParameters::VField(p) => {
            check_currents(
                &[
                    number("bias_start", &p.bias_start)?,
                    number("bias_end", &p.bias_end)?,
                    number("bias_step", &p.bias_step)?,
                ],
                limits,
            )?;
            check_field(number("field_from", &p.field_from)?, field_source, limits)?;
            check_field(number("field_to", &p.field_to)?, field_source, limits)
        }
        ModeParameters::RTempGate(p) => {
            temperature(
                number("sweep_from", &p.sweep_from)?,
                number("sweep_to", &p.sweep_to)?,
                number("sweep_step", &p.sweep_step)?,
            )?;
            check_gate(number("gate_range", &p.gate_range)?, limits)
        }
        ModeParameters::IvGate(p) => check_gate(number("gate_range", &p.gate_range)?, limits),
        ModeParameters::IvGateTemp(p) => {
            check_gate(number("gate_from", &p.gate_from)?, limits)?;
            check_gate(number("gate_to", &p.gate_to)?, limits)?;
            temperature(
                number("temp_from", &p.temp_from)?,
                number("temp_to", &p.temp_to)?,
                number("temp_step", &p.temp_step)?,
            )
        }
        ModeParameters::IvGateField(p) => {
            check_gate(number("gate_sweep", &p.gate_sweep)?, limits)?;
            check_field(number("field_sweep", &p.field_sweep)?, FieldSource::HallProbe, limits)
        }
        ModeParameters::Shapiro(p) => {
            let kind = ShapiroSweep::parse_code(&p.sweep_kind).ok_or_else(|| {
                ValidationError::InvalidNumber {
                    name: "sweep_kind",
                    text: p.sweep_kind.clone(),
                }
            })?;
            let from = number("sweep_from", &p.sweep_from)?;
            let to = number("sweep_to", &p.sweep_to)?;
            let fixed = number("fixed_value", &p.fixed_value)?;
            let (swept, held) = match kind {
                ShapiroSweep::Frequency => (Quantity::Frequency, Quantity::Power),
                ShapiroSweep::Power => (Quantity::Power, Quantity::Frequency),
            };
            let ceiling = |q: Quantity| match q {
                Quantity::Frequency => limits.max_frequency_ghz,
                _ => limits.max_power_dbm,
            };
            check_optional(swept, from, ceiling(swept))?;
            check_optional(swept, to, ceiling(swept))?;
            check_optional(held, fixed, ceiling(held))
        }
        ModeParameters::None
        | ModeParameters::CritStats(_)
        | ModeParameters::RTemp(_)
        | ModeParameters::GatePulse(_) => Ok(()),
    }
}
