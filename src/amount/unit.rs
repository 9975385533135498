use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::pipeline::TransformError;

/// Monetary units understood by the amount functions
///
/// Integral units are whole multiples of a fraction of the currency unit;
/// decimal units are currency-unit amounts with a fractional part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// 1/10 of the currency unit
    Dime,
    /// 1/100 of the currency unit
    Cent,
    /// 1/1000 of the currency unit
    Mill,
    /// 1/10000 of the currency unit
    DeciMill,
    /// 1/10000 of a cent
    Micro,
    /// Currency units, fraction rendered without trailing zeros
    Decimal,
    /// Currency units, fraction rendered with two digits
    Decimal2,
    /// Currency units, fraction rendered with three digits
    Decimal3,
}

impl Unit {
    pub const ALL: [Unit; 8] = [
        Unit::Dime,
        Unit::Cent,
        Unit::Mill,
        Unit::DeciMill,
        Unit::Micro,
        Unit::Decimal,
        Unit::Decimal2,
        Unit::Decimal3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Dime => "dime",
            Unit::Cent => "cent",
            Unit::Mill => "mill",
            Unit::DeciMill => "deci-mill",
            Unit::Micro => "micro",
            Unit::Decimal => "decimal",
            Unit::Decimal2 => "decimal-2",
            Unit::Decimal3 => "decimal-3",
        }
    }

    /// True for units without a fractional representation
    pub fn is_integral(&self) -> bool {
        !self.is_decimal()
    }

    pub fn is_decimal(&self) -> bool {
        matches!(self, Unit::Decimal | Unit::Decimal2 | Unit::Decimal3)
    }

    /// The integral unit that decimal amounts of this unit are counted in
    pub fn integral_counterpart(&self) -> Unit {
        match self {
            Unit::Decimal | Unit::Decimal2 => Unit::Cent,
            Unit::Decimal3 => Unit::Mill,
            integral => *integral,
        }
    }

    /// Look up the conversion between two units
    pub fn conversion_to(&self, target: Unit) -> Option<Conversion> {
        use Unit::*;

        let conversion = match (*self, target) {
            (Decimal, Decimal) => Conversion::Redecimal { digits: 2, fixed: false },
            (Decimal2, Decimal2) => Conversion::Redecimal { digits: 2, fixed: true },
            (Decimal3, Decimal3) => Conversion::Redecimal { digits: 3, fixed: true },
            (source, target) if source == target => Conversion::Identity,

            (Dime, Cent) | (Cent, Mill) | (Mill, DeciMill) => Conversion::Multiply(1),
            (Cent, DeciMill) => Conversion::Multiply(2),
            (Cent, Micro) => Conversion::Multiply(4),

            (Cent, Dime) | (Mill, Cent) | (DeciMill, Mill) => Conversion::Divide(1),
            (DeciMill, Cent) => Conversion::Divide(2),
            (Micro, Cent) => Conversion::Divide(4),

            (Decimal | Decimal2, Cent) => Conversion::FromDecimal { digits: 2 },
            (Decimal3, Mill) => Conversion::FromDecimal { digits: 3 },

            (Cent, Decimal) => Conversion::ToDecimal { digits: 2, fixed: false },
            (Cent, Decimal2) => Conversion::ToDecimal { digits: 2, fixed: true },
            (Mill, Decimal3) => Conversion::ToDecimal { digits: 3, fixed: true },

            (Decimal2, Decimal) => Conversion::Redecimal { digits: 2, fixed: false },
            (Decimal, Decimal2) => Conversion::Redecimal { digits: 2, fixed: true },

            _ => return None,
        };

        Some(conversion)
    }
}

/// How digits move between two units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Same integral unit
    Identity,
    /// Append this many zeros
    Multiply(usize),
    /// Drop this many trailing digits, flooring towards zero
    Divide(usize),
    /// Decimal amount into an integral unit with `digits` fraction digits
    FromDecimal { digits: usize },
    /// Integral amount into a decimal rendering
    ToDecimal { digits: usize, fixed: bool },
    /// Decimal amount re-rendered as another decimal unit; `digits` bounds the
    /// fraction only when `fixed`
    Redecimal { digits: usize, fixed: bool },
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::ALL
            .iter()
            .copied()
            .find(|unit| unit.as_str() == s)
            .ok_or_else(|| TransformError::UnknownUnit { unit: s.to_string() })
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}
