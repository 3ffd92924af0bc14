//! Field name → physical quantity table.
//!
//! Raw values are expected in the canonical input unit of their field; the
//! table decides which quantity (and thereby which unit) a field carries.
//! [`normalize`] is pure: the same `(field, raw)` pair always yields the same
//! outcome, and an unmapped field is an error rather than a pass-through.

use crate::error::UnitMappingError;
use crate::record::normalize_key;
use crate::units::{Quantity, QuantityKind};

/// Normalized field name → quantity kind.
pub const UNIT_TABLE: &[(&str, QuantityKind)] = &[
    ("p", QuantityKind::ActivePower),
    ("q", QuantityKind::ReactivePower),
    ("srated", QuantityKind::ApparentPower),
    ("vrated", QuantityKind::RatedVoltage),
    ("vrateda", QuantityKind::RatedVoltage),
    ("vratedb", QuantityKind::RatedVoltage),
    ("vtarget", QuantityKind::VoltageMagnitude),
    ("r", QuantityKind::ImpedancePerLength),
    ("x", QuantityKind::ImpedancePerLength),
    ("b", QuantityKind::AdmittancePerLength),
    ("g", QuantityKind::AdmittancePerLength),
    ("imax", QuantityKind::Current),
    ("length", QuantityKind::Length),
    ("rsc", QuantityKind::Impedance),
    ("xsc", QuantityKind::Impedance),
    ("gm", QuantityKind::Admittance),
    ("bm", QuantityKind::Admittance),
    ("dv", QuantityKind::VoltageStep),
    ("dphi", QuantityKind::PhaseStep),
];

/// Quantity kind mapped to a field name, if any.
pub fn quantity_kind(field: &str) -> Option<QuantityKind> {
    let key = normalize_key(field);
    UNIT_TABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
}

/// Map a raw field value to its canonical physical quantity.
pub fn normalize(field: &str, raw: &str) -> Result<Quantity, UnitMappingError> {
    let kind = quantity_kind(field).ok_or_else(|| UnitMappingError::Unmapped {
        field: field.to_string(),
    })?;
    let value = raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| UnitMappingError::NotANumber {
            field: field.to_string(),
            value: raw.to_string(),
        })?;
    Ok(kind.quantity(value))
}
