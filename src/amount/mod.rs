//! Fixed-point monetary amount conversion
//!
//! Amounts are handled as digit strings, never as floating point. A value is
//! split into its sign, integer digits and fraction digits, the digits are
//! shifted according to the unit conversion table, and the result is
//! rendered back to text.
//!
//! ```
//! use reshape::amount::{self, Unit};
//!
//! assert_eq!(amount::format("1500,00", Unit::Decimal, Unit::Cent, true).unwrap(), "-150000");
//! assert_eq!(amount::format("1234", Unit::Cent, Unit::Mill, false).unwrap(), "12340");
//! ```

mod unit;

pub use unit::{Conversion, Unit};

use serde::{Deserialize, Serialize};

use crate::pipeline::{Result, TransformError};

/// An amount split into sign and digit strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount {
    /// Integer digits without leading zeros (empty for zero)
    pub integer: String,
    /// Fraction digits without trailing zeros
    pub fraction: String,
    pub negative: bool,
}

impl Amount {
    /// Split a textual amount
    ///
    /// Accepts an optional leading `-`, digits, and at most one `.` or `,`
    /// separator. Leading integer zeros and trailing fraction zeros are
    /// dropped.
    pub fn split(value: &str) -> Result<Self> {
        let (negative, unsigned) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };

        if unsigned.is_empty() {
            return Err(TransformError::invalid_amount(value, "no digits"));
        }

        let normalized = unsigned.replace(',', ".");
        let mut parts = normalized.split('.');
        let integer = parts.next().unwrap_or_default();
        let fraction = parts.next().unwrap_or_default();
        if parts.next().is_some() {
            return Err(TransformError::invalid_amount(value, "more than one separator"));
        }

        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(integer) || !all_digits(fraction) {
            return Err(TransformError::invalid_amount(value, "not a number"));
        }
        if integer.is_empty() && fraction.is_empty() && normalized.len() == 1 {
            return Err(TransformError::invalid_amount(value, "no digits"));
        }

        Ok(Self {
            integer: integer.trim_start_matches('0').to_string(),
            fraction: fraction.trim_end_matches('0').to_string(),
            negative,
        })
    }

    /// True when every digit is zero
    pub fn is_zero(&self) -> bool {
        self.integer.is_empty() && self.fraction.is_empty()
    }
}

/// Convert `value` from `source` into `target`
///
/// `negate` overrides the sign: the output is negative when `negate`
/// differs from the input's own sign. Zero is never signed.
pub fn format(value: &str, source: Unit, target: Unit, negate: bool) -> Result<String> {
    let amount = Amount::split(value)?;

    if source.is_integral() && !amount.fraction.is_empty() {
        return Err(TransformError::invalid_amount(
            value,
            format!("unit '{}' does not allow a fractional part", source),
        ));
    }

    let conversion = source
        .conversion_to(target)
        .ok_or_else(|| TransformError::unsupported_conversion(source.as_str(), target.as_str()))?;

    let magnitude = convert(&amount, conversion);
    let negative = negate != amount.negative;
    if negative && !is_zero_text(&magnitude) {
        Ok(format!("-{}", magnitude))
    } else {
        Ok(magnitude)
    }
}

/// Arithmetic performed by [`amt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmtOp {
    /// Sum of all values
    Add,
    /// First value minus every following value
    Diff,
}

/// Add or subtract amounts given in `source`, rendering the result in `target`
///
/// ```
/// use reshape::amount::{amt, AmtOp, Unit};
///
/// assert_eq!(amt(AmtOp::Add, Unit::Cent, Unit::Mill, false, &["15000", "100"]).unwrap(), "151000");
/// assert_eq!(amt(AmtOp::Diff, Unit::Cent, Unit::Mill, false, &["100", "1234"]).unwrap(), "-11340");
/// ```
pub fn amt<S: AsRef<str>>(
    op: AmtOp,
    source: Unit,
    target: Unit,
    decimal_output: bool,
    values: &[S],
) -> Result<String> {
    let working = target.integral_counterpart();

    let mut total: Option<i128> = None;
    for value in values {
        let units = to_integer(value.as_ref(), source, working)?;
        total = Some(match (total, op) {
            (None, _) => units,
            (Some(acc), AmtOp::Add) => acc.checked_add(units).ok_or(TransformError::AmountOverflow)?,
            (Some(acc), AmtOp::Diff) => acc.checked_sub(units).ok_or(TransformError::AmountOverflow)?,
        });
    }
    let total = total.unwrap_or(0).to_string();

    if decimal_output {
        return display_two_decimals(&total);
    }
    if target.is_decimal() {
        return format(&total, working, target, false);
    }
    Ok(total)
}

/// Compare two amounts in `unit`, returning `a > b`
pub fn amt_cmp(unit: Unit, a: &str, a_unit: Unit, b: &str, b_unit: Unit) -> Result<bool> {
    let working = unit.integral_counterpart();
    let left = to_integer(a, a_unit, working)?;
    let right = to_integer(b, b_unit, working)?;
    Ok(left > right)
}

/// Render an integral amount with two fraction digits (`151000` → `1510.00`)
pub fn display_two_decimals(value: &str) -> Result<String> {
    format(value, Unit::Cent, Unit::Decimal2, false)
}

fn to_integer(value: &str, source: Unit, working: Unit) -> Result<i128> {
    let text = format(value, source, working, false)?;
    text.parse().map_err(|_| TransformError::AmountOverflow)
}

fn convert(amount: &Amount, conversion: Conversion) -> String {
    match conversion {
        Conversion::Identity => integral_text(&amount.integer),
        Conversion::Multiply(zeros) => {
            if amount.integer.is_empty() {
                "0".to_string()
            } else {
                format!("{}{}", amount.integer, "0".repeat(zeros))
            }
        }
        Conversion::Divide(digits) => {
            let keep = amount.integer.len().saturating_sub(digits);
            integral_text(&amount.integer[..keep])
        }
        Conversion::FromDecimal { digits } => {
            let fraction = fit_fraction(&amount.fraction, digits);
            integral_text(&format!("{}{}", amount.integer, fraction))
        }
        Conversion::ToDecimal { digits, fixed } => {
            let padded = format!("{:0>width$}", amount.integer, width = digits + 1);
            let (integer, fraction) = padded.split_at(padded.len() - digits);
            render_decimal(integer, fraction, digits, fixed)
        }
        Conversion::Redecimal { digits, fixed } => {
            render_decimal(&amount.integer, &amount.fraction, digits, fixed)
        }
    }
}

fn render_decimal(integer: &str, fraction: &str, digits: usize, fixed: bool) -> String {
    let integer = integral_text(integer.trim_start_matches('0'));
    // only fixed renderings cut the fraction; free ones keep every significant digit
    let fraction = if fixed {
        fit_fraction(fraction, digits)
    } else {
        fraction.trim_end_matches('0').to_string()
    };

    if fraction.is_empty() {
        integer
    } else {
        format!("{}.{}", integer, fraction)
    }
}

/// Truncate or right-pad with zeros to exactly `digits`
fn fit_fraction(fraction: &str, digits: usize) -> String {
    let truncated = &fraction[..fraction.len().min(digits)];
    format!("{:0<width$}", truncated, width = digits)
}

fn integral_text(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_zero_text(value: &str) -> bool {
    value.bytes().all(|b| b == b'0' || b == b'.')
}
