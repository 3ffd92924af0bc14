//! Compile-time unit safety for grid asset quantities.
//!
//! Every quantity that leaves the ingestion pipeline is expressed in the
//! canonical input unit of its kind (kW for active power, kV for rated
//! voltage, Ω/km for line impedance, ...). The newtypes below keep those
//! units apart at compile time; [`Quantity`] is the dynamically tagged form
//! produced by the [`crate::normalize`] table before a field accessor narrows
//! it back to the concrete newtype.
//!
//! # Usage
//!
//! ```
//! use psdm_core::units::{Kilovolts, Quantity};
//!
//! let v = Kilovolts(110.0);
//! let tagged = Quantity::from(v);
//! let back = Kilovolts::try_from(tagged).unwrap();
//! assert_eq!(back, v);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::Add;

/// Closed set of physical quantity kinds known to the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityKind {
    ActivePower,
    ReactivePower,
    ApparentPower,
    RatedVoltage,
    VoltageMagnitude,
    ImpedancePerLength,
    AdmittancePerLength,
    Current,
    Length,
    Impedance,
    Admittance,
    VoltageStep,
    PhaseStep,
}

impl QuantityKind {
    /// Canonical unit symbol of this kind.
    pub fn unit(&self) -> &'static str {
        match self {
            QuantityKind::ActivePower => "kW",
            QuantityKind::ReactivePower => "kvar",
            QuantityKind::ApparentPower => "kVA",
            QuantityKind::RatedVoltage => "kV",
            QuantityKind::VoltageMagnitude => "pu",
            QuantityKind::ImpedancePerLength => "Ω/km",
            QuantityKind::AdmittancePerLength => "µS/km",
            QuantityKind::Current => "A",
            QuantityKind::Length => "km",
            QuantityKind::Impedance => "Ω",
            QuantityKind::Admittance => "nS",
            QuantityKind::VoltageStep => "%",
            QuantityKind::PhaseStep => "°",
        }
    }

    /// Wrap a raw canonical-unit value as a tagged quantity.
    pub fn quantity(self, value: f64) -> Quantity {
        match self {
            QuantityKind::ActivePower => Quantity::ActivePower(Kilowatts(value)),
            QuantityKind::ReactivePower => Quantity::ReactivePower(Kilovars(value)),
            QuantityKind::ApparentPower => Quantity::ApparentPower(KilovoltAmperes(value)),
            QuantityKind::RatedVoltage => Quantity::RatedVoltage(Kilovolts(value)),
            QuantityKind::VoltageMagnitude => Quantity::VoltageMagnitude(PerUnit(value)),
            QuantityKind::ImpedancePerLength => {
                Quantity::ImpedancePerLength(OhmsPerKilometer(value))
            }
            QuantityKind::AdmittancePerLength => {
                Quantity::AdmittancePerLength(MicrosiemensPerKilometer(value))
            }
            QuantityKind::Current => Quantity::Current(Amperes(value)),
            QuantityKind::Length => Quantity::Length(Kilometers(value)),
            QuantityKind::Impedance => Quantity::Impedance(Ohms(value)),
            QuantityKind::Admittance => Quantity::Admittance(Nanosiemens(value)),
            QuantityKind::VoltageStep => Quantity::VoltageStep(Percent(value)),
            QuantityKind::PhaseStep => Quantity::PhaseStep(Degrees(value)),
        }
    }
}

impl std::fmt::Display for QuantityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QuantityKind::ActivePower => "active power",
            QuantityKind::ReactivePower => "reactive power",
            QuantityKind::ApparentPower => "apparent power",
            QuantityKind::RatedVoltage => "rated voltage",
            QuantityKind::VoltageMagnitude => "voltage magnitude",
            QuantityKind::ImpedancePerLength => "impedance per length",
            QuantityKind::AdmittancePerLength => "admittance per length",
            QuantityKind::Current => "current",
            QuantityKind::Length => "length",
            QuantityKind::Impedance => "impedance",
            QuantityKind::Admittance => "admittance",
            QuantityKind::VoltageStep => "voltage step",
            QuantityKind::PhaseStep => "phase step",
        };
        write!(f, "{} [{}]", name, self.unit())
    }
}

/// Dynamically tagged quantity in its canonical unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Quantity {
    ActivePower(Kilowatts),
    ReactivePower(Kilovars),
    ApparentPower(KilovoltAmperes),
    RatedVoltage(Kilovolts),
    VoltageMagnitude(PerUnit),
    ImpedancePerLength(OhmsPerKilometer),
    AdmittancePerLength(MicrosiemensPerKilometer),
    Current(Amperes),
    Length(Kilometers),
    Impedance(Ohms),
    Admittance(Nanosiemens),
    VoltageStep(Percent),
    PhaseStep(Degrees),
}

impl Quantity {
    pub fn kind(&self) -> QuantityKind {
        match self {
            Quantity::ActivePower(_) => QuantityKind::ActivePower,
            Quantity::ReactivePower(_) => QuantityKind::ReactivePower,
            Quantity::ApparentPower(_) => QuantityKind::ApparentPower,
            Quantity::RatedVoltage(_) => QuantityKind::RatedVoltage,
            Quantity::VoltageMagnitude(_) => QuantityKind::VoltageMagnitude,
            Quantity::ImpedancePerLength(_) => QuantityKind::ImpedancePerLength,
            Quantity::AdmittancePerLength(_) => QuantityKind::AdmittancePerLength,
            Quantity::Current(_) => QuantityKind::Current,
            Quantity::Length(_) => QuantityKind::Length,
            Quantity::Impedance(_) => QuantityKind::Impedance,
            Quantity::Admittance(_) => QuantityKind::Admittance,
            Quantity::VoltageStep(_) => QuantityKind::VoltageStep,
            Quantity::PhaseStep(_) => QuantityKind::PhaseStep,
        }
    }

    /// Raw value in the canonical unit.
    pub fn value(&self) -> f64 {
        match self {
            Quantity::ActivePower(q) => q.value(),
            Quantity::ReactivePower(q) => q.value(),
            Quantity::ApparentPower(q) => q.value(),
            Quantity::RatedVoltage(q) => q.value(),
            Quantity::VoltageMagnitude(q) => q.value(),
            Quantity::ImpedancePerLength(q) => q.value(),
            Quantity::AdmittancePerLength(q) => q.value(),
            Quantity::Current(q) => q.value(),
            Quantity::Length(q) => q.value(),
            Quantity::Impedance(q) => q.value(),
            Quantity::Admittance(q) => q.value(),
            Quantity::VoltageStep(q) => q.value(),
            Quantity::PhaseStep(q) => q.value(),
        }
    }
}

/// A tagged [`Quantity`] could not be narrowed to the requested newtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindMismatch {
    pub expected: QuantityKind,
    pub found: QuantityKind,
}

/// Addition, display and the [`Quantity`] round trip for unit types
macro_rules! impl_unit_ops {
    ($type:ident, $unit_name:literal, $kind:ident) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }
        }

        impl From<$type> for Quantity {
            fn from(value: $type) -> Self {
                Quantity::$kind(value)
            }
        }

        impl TryFrom<Quantity> for $type {
            type Error = KindMismatch;

            fn try_from(quantity: Quantity) -> Result<Self, Self::Error> {
                match quantity {
                    Quantity::$kind(value) => Ok(value),
                    other => Err(KindMismatch {
                        expected: QuantityKind::$kind,
                        found: other.kind(),
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Power Units
// =============================================================================

/// Active power in kilowatts (kW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilowatts(pub f64);

impl_unit_ops!(Kilowatts, "kW", ActivePower);

/// Reactive power in kilovolt-amperes reactive (kvar)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovars(pub f64);

impl_unit_ops!(Kilovars, "kvar", ReactivePower);

/// Apparent power in kilovolt-amperes (kVA)
///
/// Used for equipment ratings (transformer `sRated`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct KilovoltAmperes(pub f64);

impl_unit_ops!(KilovoltAmperes, "kVA", ApparentPower);

// =============================================================================
// Voltage Units
// =============================================================================

/// Voltage in kilovolts (kV)
///
/// Rated (nominal) voltage of nodes, lines and transformer windings.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV", RatedVoltage);

/// Voltage magnitude in per-unit (pu)
///
/// Per-unit values are normalized to the node's rated voltage.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PerUnit(pub f64);

impl_unit_ops!(PerUnit, "pu", VoltageMagnitude);

// =============================================================================
// Line Parameter Units
// =============================================================================

/// Series impedance per length in ohms per kilometer (Ω/km)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct OhmsPerKilometer(pub f64);

impl_unit_ops!(OhmsPerKilometer, "Ω/km", ImpedancePerLength);

/// Shunt admittance per length in microsiemens per kilometer (µS/km)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MicrosiemensPerKilometer(pub f64);

impl_unit_ops!(MicrosiemensPerKilometer, "µS/km", AdmittancePerLength);

/// Current magnitude in amperes (A)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Amperes(pub f64);

impl_unit_ops!(Amperes, "A", Current);

/// Line length in kilometers (km)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilometers(pub f64);

impl_unit_ops!(Kilometers, "km", Length);

// =============================================================================
// Transformer Parameter Units
// =============================================================================

/// Short-circuit impedance in ohms (Ω)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Ohms(pub f64);

impl_unit_ops!(Ohms, "Ω", Impedance);

/// Magnetization admittance in nanosiemens (nS)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Nanosiemens(pub f64);

impl_unit_ops!(Nanosiemens, "nS", Admittance);

/// Voltage change per tap position in percent (%)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Percent(pub f64);

impl_unit_ops!(Percent, "%", VoltageStep);

/// Angle in degrees
///
/// Phase shift per tap position.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Degrees(pub f64);

impl_unit_ops!(Degrees, "°", PhaseStep);

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_unit() {
        let total = Ohms(1.0) + Ohms(2.5);
        assert_eq!(total, Ohms(3.5));
        assert_eq!(total.value(), 3.5);
    }

    #[test]
    fn test_quantity_round_trip_keeps_unit() {
        let tagged = Quantity::from(Ohms(1.5));
        assert_eq!(tagged.kind(), QuantityKind::Impedance);
        assert_eq!(Ohms::try_from(tagged), Ok(Ohms(1.5)));
    }

    #[test]
    fn test_quantity_narrowing_rejects_other_kind() {
        let tagged = QuantityKind::RatedVoltage.quantity(20.0);
        let err = Kilowatts::try_from(tagged).unwrap_err();
        assert_eq!(err.expected, QuantityKind::ActivePower);
        assert_eq!(err.found, QuantityKind::RatedVoltage);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Kilovolts(110.0)), "110.0000 kV");
        assert_eq!(format!("{}", Degrees(45.0)), "45.0000 °");
        assert_eq!(format!("{}", PerUnit(1.0)), "1.0000 pu");
        assert_eq!(format!("{}", QuantityKind::Current), "current [A]");
    }
}
