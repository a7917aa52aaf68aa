//! Exact fixed-point arithmetic for chain fees.
//!
//! NEO fees carry eight decimal places. `Fixed8` stores a value as an `i64`
//! count of 10^-8 units, so per-block sums and the running chain aggregate are
//! exact integer arithmetic — no floating point at any step. Values parse from
//! and render to plain decimal strings (`"0"`, `"0.001"`, `"123.45600001"`).

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SyncError;

/// Number of 10^-8 units per whole unit.
const SCALE: i64 = 100_000_000;

/// An exact decimal with eight fractional digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed8(i64);

impl Fixed8 {
    pub const ZERO: Self = Self(0);

    /// Build from a raw count of 10^-8 units.
    pub const fn from_raw(units: i64) -> Self {
        Self(units)
    }

    /// Build from a whole number of units.
    pub const fn from_whole(units: i64) -> Self {
        Self(units * SCALE)
    }

    /// The raw count of 10^-8 units.
    pub const fn raw(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Sum an iterator of values, `None` on overflow.
    pub fn sum<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        values
            .into_iter()
            .try_fold(Self::ZERO, |acc, v| acc.checked_add(v))
    }
}

impl fmt::Display for Fixed8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let whole = magnitude / SCALE as u64;
        let frac = magnitude % SCALE as u64;
        if frac == 0 {
            return write!(f, "{sign}{whole}");
        }
        let mut frac_str = format!("{frac:08}");
        while frac_str.ends_with('0') {
            frac_str.pop();
        }
        write!(f, "{sign}{whole}.{frac_str}")
    }
}

impl FromStr for Fixed8 {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || SyncError::BadDecimal(s.to_string());

        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        if body.is_empty() {
            return Err(bad());
        }

        let (whole_str, frac_str) = match body.split_once('.') {
            Some((w, f)) => (w, f),
            None => (body, ""),
        };
        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(bad());
        }
        if frac_str.len() > 8 {
            return Err(bad());
        }

        let whole: i64 = if whole_str.is_empty() {
            0
        } else {
            whole_str.parse().map_err(|_| bad())?
        };
        let mut frac: i64 = 0;
        if !frac_str.is_empty() {
            let parsed: i64 = frac_str.parse().map_err(|_| bad())?;
            frac = parsed * 10_i64.pow(8 - frac_str.len() as u32);
        }

        let units = whole
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(bad)?;
        Ok(Self(if negative { -units } else { units }))
    }
}

impl Serialize for Fixed8 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fixed8 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| D::Error::custom("invalid fixed8 decimal"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_render() {
        assert_eq!("0".parse::<Fixed8>().unwrap(), Fixed8::ZERO);
        assert_eq!("1".parse::<Fixed8>().unwrap().raw(), SCALE);
        assert_eq!("0.00000001".parse::<Fixed8>().unwrap().raw(), 1);
        assert_eq!("123.456".parse::<Fixed8>().unwrap().raw(), 12_345_600_000);
        assert_eq!("-0.5".parse::<Fixed8>().unwrap().raw(), -SCALE / 2);

        assert_eq!(Fixed8::from_raw(1).to_string(), "0.00000001");
        assert_eq!(Fixed8::from_whole(42).to_string(), "42");
        assert_eq!(Fixed8::from_raw(-150_000_000).to_string(), "-1.5");
    }

    #[test]
    fn parse_rejects_garbage() {
        for s in ["", "-", ".", "1.2.3", "abc", "1.123456789"] {
            assert!(s.parse::<Fixed8>().is_err(), "should reject {s:?}");
        }
    }

    #[test]
    fn roundtrip_is_exact() {
        for s in ["0", "0.001", "98765.4321", "0.00000001", "-12.00000005"] {
            let v: Fixed8 = s.parse().unwrap();
            assert_eq!(v.to_string(), s);
        }
    }

    #[test]
    fn sum_is_exact() {
        // 0.1 + 0.2 is the canonical float trap; fixed-point must be exact
        let values = ["0.1", "0.2"].map(|s| s.parse::<Fixed8>().unwrap());
        assert_eq!(Fixed8::sum(values).unwrap().to_string(), "0.3");
    }

    #[test]
    fn sum_overflow_is_none() {
        let values = [Fixed8::from_raw(i64::MAX), Fixed8::from_raw(1)];
        assert!(Fixed8::sum(values).is_none());
    }
}
