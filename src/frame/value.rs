use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Column types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal { precision: u8, scale: u8 },
    Utf8,
    Binary,
    Date,
    Time,
    DateTime,
    Uuid,
    /// Column with no observed values. Resolved to a concrete SQL type at write time.
    Null,
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Decimal(Decimal),
    Utf8(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Uuid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns any integer variant widened to 64 bits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(i64::from(*v)),
            Value::Int16(v) => Some(i64::from(*v)),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// The dtype this value belongs to, or `None` for nulls.
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DType::Bool),
            Value::Int8(_) => Some(DType::Int8),
            Value::Int16(_) => Some(DType::Int16),
            Value::Int32(_) => Some(DType::Int32),
            Value::Int64(_) => Some(DType::Int64),
            Value::Float32(_) => Some(DType::Float32),
            Value::Float64(_) => Some(DType::Float64),
            Value::Decimal(d) => Some(DType::Decimal {
                precision: d.digits().max(d.scale()),
                scale: d.scale(),
            }),
            Value::Utf8(_) => Some(DType::Utf8),
            Value::Binary(_) => Some(DType::Binary),
            Value::Date(_) => Some(DType::Date),
            Value::Time(_) => Some(DType::Time),
            Value::DateTime(_) => Some(DType::DateTime),
            Value::Uuid(_) => Some(DType::Uuid),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Utf8(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Utf8(v)
    }
}

/// Fixed-point decimal: an unscaled base-10 integer plus a scale.
///
/// Mirrors the wire representation SQL Server uses for DECIMAL/NUMERIC, so
/// values round-trip without touching floating point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Decimal {
    unscaled: i128,
    scale: u8,
}

impl Decimal {
    pub fn new(unscaled: i128, scale: u8) -> Self {
        Decimal { unscaled, scale }
    }

    pub fn unscaled(&self) -> i128 {
        self.unscaled
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Number of significant digits in the unscaled value (at least 1).
    pub fn digits(&self) -> u8 {
        let mut n = self.unscaled.unsigned_abs();
        let mut count = 1u8;
        while n >= 10 {
            n /= 10;
            count += 1;
        }
        count
    }

    /// Integer part, truncated toward zero.
    pub fn trunc(&self) -> i128 {
        self.unscaled / pow10(self.scale)
    }

    pub fn to_f64(&self) -> f64 {
        self.unscaled as f64 / 10f64.powi(i32::from(self.scale))
    }

    /// Changes the scale, truncating toward zero when digits are dropped.
    ///
    /// Returns `None` when the unscaled value would overflow an i128 at the
    /// wider scale, since the result could not represent the same number.
    pub fn rescale(&self, new_scale: u8) -> Option<Decimal> {
        if new_scale == self.scale {
            return Some(*self);
        }
        let unscaled = if new_scale > self.scale {
            10i128
                .checked_pow(u32::from(new_scale - self.scale))
                .and_then(|factor| self.unscaled.checked_mul(factor))?
        } else {
            self.unscaled / pow10(self.scale - new_scale)
        };
        Some(Decimal {
            unscaled,
            scale: new_scale,
        })
    }
}

fn pow10(exp: u8) -> i128 {
    10i128.checked_pow(u32::from(exp)).unwrap_or(i128::MAX)
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        // Numeric equality across scales: 1.9 == 1.90.
        let scale = self.scale.max(other.scale);
        let a = self.unscaled.checked_mul(pow10(scale - self.scale));
        let b = other.unscaled.checked_mul(pow10(scale - other.scale));
        match (a, b) {
            (Some(a), Some(b)) => a == b,
            _ => self.unscaled == other.unscaled && self.scale == other.scale,
        }
    }
}

impl Eq for Decimal {}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let abs = self.unscaled.unsigned_abs();
        if self.scale == 0 {
            return write!(f, "{sign}{abs}");
        }
        let div = pow10(self.scale) as u128;
        let int = abs / div;
        let frac = abs % div;
        write!(f, "{sign}{int}.{frac:0width$}", width = self.scale as usize)
    }
}

/// Error from parsing a decimal literal.
#[derive(Debug)]
pub struct ParseDecimalError(String);

impl fmt::Display for ParseDecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid decimal literal: {}", self.0)
    }
}

impl std::error::Error for ParseDecimalError {}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDecimalError(s.to_owned());
        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
            || frac_part.len() > 38
        {
            return Err(err());
        }
        let mut unscaled: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            unscaled = unscaled
                .checked_mul(10)
                .and_then(|v| v.checked_add(i128::from(b - b'0')))
                .ok_or_else(err)?;
        }
        if negative {
            unscaled = -unscaled;
        }
        Ok(Decimal {
            unscaled,
            scale: frac_part.len() as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_parse_and_display() {
        let d: Decimal = "1.99".parse().unwrap();
        assert_eq!(d.unscaled(), 199);
        assert_eq!(d.scale(), 2);
        assert_eq!(d.to_string(), "1.99");

        let d: Decimal = "-0.05".parse().unwrap();
        assert_eq!(d.unscaled(), -5);
        assert_eq!(d.to_string(), "-0.05");

        let d: Decimal = "42".parse().unwrap();
        assert_eq!(d.scale(), 0);
        assert_eq!(d.to_string(), "42");

        assert!("".parse::<Decimal>().is_err());
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
    }

    #[test]
    fn decimal_equality_normalizes_scale() {
        let a: Decimal = "1.9".parse().unwrap();
        let b: Decimal = "1.90".parse().unwrap();
        assert_eq!(a, b);

        let c: Decimal = "1.91".parse().unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn decimal_trunc_and_rescale() {
        let d: Decimal = "1.99".parse().unwrap();
        assert_eq!(d.trunc(), 1);

        let d: Decimal = "-1.99".parse().unwrap();
        assert_eq!(d.trunc(), -1);

        let d: Decimal = "1.987".parse().unwrap();
        assert_eq!(d.rescale(2), Some("1.98".parse().unwrap()));
        assert_eq!(d.rescale(5).unwrap().scale(), 5);
        assert_eq!(d.rescale(5).unwrap(), d);
    }

    #[test]
    fn decimal_rescale_refuses_overflow() {
        // 5 * 10^38 does not fit an i128; the digits must not survive with
        // a bigger scale stamped on them.
        assert_eq!(Decimal::new(5, 0).rescale(38), None);
        assert_eq!(Decimal::new(-5, 0).rescale(38), None);

        let d = Decimal::new(1, 0).rescale(38).unwrap();
        assert_eq!(d.unscaled(), 10i128.pow(38));
        assert_eq!(d.trunc(), 1);
    }

    #[test]
    fn decimal_digits() {
        assert_eq!("1.99".parse::<Decimal>().unwrap().digits(), 3);
        assert_eq!("0.05".parse::<Decimal>().unwrap().digits(), 1);
        assert_eq!("0".parse::<Decimal>().unwrap().digits(), 1);
    }

    #[test]
    fn value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int8(5).as_i64(), Some(5));
        assert_eq!(Value::Int64(-3).as_i64(), Some(-3));
        assert_eq!(Value::Float32(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::Utf8(String::new()).as_i64(), None);
    }

    #[test]
    fn value_dtype_of_decimal_covers_fraction_only_values() {
        let v = Value::Decimal("0.05".parse().unwrap());
        assert_eq!(
            v.dtype(),
            Some(DType::Decimal {
                precision: 2,
                scale: 2
            })
        );
    }
}
