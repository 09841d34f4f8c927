//! Fixed-point money with exactly two fractional digits.
//!
//! Amounts are kept as a signed count of hundredths, so addition, subtraction and
//! multiplication by an integer quantity are exact. Binary floating point never
//! takes part in arithmetic: JSON numbers are converted through their shortest
//! decimal text before parsing.

use derive_more::{Display, Error};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// number of minor units in one major unit
const SCALE: i64 = 100;

/// Largest amount accepted from clients: ten significant digits, two of them fractional.
pub(crate) const MAX_INPUT_CENTS: i64 = 9_999_999_999;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Money(i64);

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub(crate) enum ParseMoneyError {
    #[display("amount is empty")]
    Empty,
    #[display("amount is not a decimal number")]
    Malformed,
    #[display("amount has more than two fractional digits")]
    TooPrecise,
    #[display("amount is out of range")]
    OutOfRange,
}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Line total of `quantity` units at this price. `None` on overflow.
    pub fn multiply(self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn sum<I>(amounts: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, amount| acc.0.checked_add(amount.0).map(Money))
    }

    /// `self - other`, `None` on overflow.
    pub fn subtract(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn compare(self, other: Money) -> Ordering {
        self.0.cmp(&other.0)
    }

    /// Formats with `,` thousands separators and two decimals, e.g. `896,611.50`.
    pub fn grouped(self) -> String {
        let major = (self.0 / SCALE).unsigned_abs().to_string();
        let minor = (self.0 % SCALE).unsigned_abs();
        let mut out = String::with_capacity(major.len() + major.len() / 3 + 4);
        if self.is_negative() {
            out.push('-');
        }
        for (i, digit) in major.chars().enumerate() {
            if i > 0 && (major.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(digit);
        }
        out.push_str(&format!(".{minor:02}"));
        out
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        write!(
            f,
            "{}{}.{:02}",
            sign,
            (self.0 / SCALE).unsigned_abs(),
            (self.0 % SCALE).unsigned_abs()
        )
    }
}

impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        if digits.is_empty() {
            return Err(ParseMoneyError::Empty);
        }
        let (major, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if major.is_empty() && fraction.is_empty() {
            return Err(ParseMoneyError::Malformed);
        }
        if !major.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(ParseMoneyError::Malformed);
        }
        // trailing zeros past the second digit carry no value
        let significant = fraction.trim_end_matches('0');
        if significant.len() > 2 {
            return Err(ParseMoneyError::TooPrecise);
        }

        let major: i64 = if major.is_empty() {
            0
        } else {
            major.parse().map_err(|_| ParseMoneyError::OutOfRange)?
        };
        let minor: i64 = match significant.len() {
            0 => 0,
            1 => i64::from(significant.as_bytes()[0] - b'0') * 10,
            _ => significant.parse().map_err(|_| ParseMoneyError::Malformed)?,
        };
        let cents = major
            .checked_mul(SCALE)
            .and_then(|v| v.checked_add(minor))
            .ok_or(ParseMoneyError::OutOfRange)?;
        Ok(Money(if negative { -cents } else { cents }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal amount with at most two fractional digits")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(SCALE)
            .map(Money)
            .ok_or_else(|| E::custom(ParseMoneyError::OutOfRange))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        i64::try_from(v)
            .map_err(|_| E::custom(ParseMoneyError::OutOfRange))
            .and_then(|v| self.visit_i64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        if !v.is_finite() {
            return Err(E::custom(ParseMoneyError::Malformed));
        }
        // f64 Display prints the shortest text that round-trips, without exponent
        v.to_string().parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_text() {
        assert_eq!("298870.50".parse::<Money>(), Ok(Money::from_cents(29_887_050)));
        assert_eq!("12".parse::<Money>(), Ok(Money::from_cents(1200)));
        assert_eq!("0.5".parse::<Money>(), Ok(Money::from_cents(50)));
        assert_eq!(".05".parse::<Money>(), Ok(Money::from_cents(5)));
        assert_eq!("10.500".parse::<Money>(), Ok(Money::from_cents(1050)));
        assert_eq!("-3.20".parse::<Money>(), Ok(Money::from_cents(-320)));
    }

    #[test]
    fn rejects_bad_text() {
        assert_eq!("".parse::<Money>(), Err(ParseMoneyError::Empty));
        assert_eq!("-".parse::<Money>(), Err(ParseMoneyError::Empty));
        assert_eq!(".".parse::<Money>(), Err(ParseMoneyError::Malformed));
        assert_eq!("1,000.00".parse::<Money>(), Err(ParseMoneyError::Malformed));
        assert_eq!("1e3".parse::<Money>(), Err(ParseMoneyError::Malformed));
        assert_eq!("0.001".parse::<Money>(), Err(ParseMoneyError::TooPrecise));
        assert_eq!(
            "99999999999999999999".parse::<Money>(),
            Err(ParseMoneyError::OutOfRange)
        );
    }

    #[test]
    fn arithmetic_is_exact() {
        let tenth = Money::from_cents(10);
        let twentieth = Money::from_cents(20);
        assert_eq!(Money::sum([tenth, twentieth]), Some(Money::from_cents(30)));
        assert_eq!(
            Money::from_cents(29_887_050).multiply(3),
            Some(Money::from_cents(89_661_150))
        );
        assert_eq!(
            Money::from_cents(100).subtract(Money::from_cents(250)),
            Some(Money::from_cents(-150))
        );
        assert_eq!(Money::sum(Vec::new()), Some(Money::ZERO));
        assert_eq!(Money::from_cents(1).compare(Money::from_cents(2)), Ordering::Less);
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(Money::from_cents(i64::MAX).multiply(2), None);
        assert_eq!(Money::sum([Money::from_cents(i64::MAX), Money::from_cents(1)]), None);
        assert_eq!(Money::from_cents(i64::MIN).subtract(Money::from_cents(1)), None);
    }

    #[test]
    fn formats_plain_and_grouped() {
        let amount = Money::from_cents(89_661_150);
        assert_eq!(amount.to_string(), "896611.50");
        assert_eq!(amount.grouped(), "896,611.50");
        assert_eq!(Money::ZERO.grouped(), "0.00");
        assert_eq!(Money::from_cents(99_999).grouped(), "999.99");
        assert_eq!(Money::from_cents(100_000).grouped(), "1,000.00");
        assert_eq!(Money::from_cents(-123_456_789).grouped(), "-1,234,567.89");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn json_accepts_numbers_and_strings() {
        let from_number: Money = serde_json::from_str("298870.5").unwrap();
        let from_string: Money = serde_json::from_str("\"298870.50\"").unwrap();
        let from_integer: Money = serde_json::from_str("7").unwrap();
        assert_eq!(from_number, Money::from_cents(29_887_050));
        assert_eq!(from_string, from_number);
        assert_eq!(from_integer, Money::from_cents(700));
        assert!(serde_json::from_str::<Money>("0.125").is_err());
        assert_eq!(serde_json::to_string(&from_number).unwrap(), "\"298870.50\"");
    }
}
