//! Extended scalar types layered on top of the primitive tag set.
//!
//! - [`Timestamp`]: nanoseconds since the Unix epoch plus an optional UTC offset
//! - [`Decimal`]: an exact `unscaled × 10^-scale` fixed-point number
//! - [`Currency`]: a decimal amount with a three-letter currency code
//! - [`Percentage`]: a decimal ratio, where `0.01` is one percent
//!
//! None of these types ever route their value through floating point. Each has
//! an exact textual form (`Display` + `FromStr`) that round-trips to the same
//! structural value, which is also how they cross into non-BTOON serde formats.
//!
//! ```rust
//! use btoon::{Currency, Decimal, Percentage};
//!
//! let price = Decimal::new(12345, 2);
//! assert_eq!(price.to_string(), "123.45");
//!
//! let total = Currency::new(price, "EUR").unwrap();
//! assert_eq!(total.to_string(), "123.45 EUR");
//!
//! let rate: Percentage = "12.5%".parse().unwrap();
//! assert_eq!(rate.ratio(), Decimal::new(125, 3));
//! ```

use crate::tags::ExtendedTag;
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Largest timezone offset a [`Timestamp`] may carry, in minutes.
pub const MAX_OFFSET_MINUTES: i16 = 1440;

pub(crate) const TIMESTAMP_TOKEN: &str = "$btoon::Timestamp";
pub(crate) const DECIMAL_TOKEN: &str = "$btoon::Decimal";
pub(crate) const CURRENCY_TOKEN: &str = "$btoon::Currency";
pub(crate) const PERCENTAGE_TOKEN: &str = "$btoon::Percentage";

pub(crate) fn tag_for_token(name: &str) -> Option<ExtendedTag> {
    match name {
        TIMESTAMP_TOKEN => Some(ExtendedTag::Timestamp),
        DECIMAL_TOKEN => Some(ExtendedTag::Decimal),
        CURRENCY_TOKEN => Some(ExtendedTag::Currency),
        PERCENTAGE_TOKEN => Some(ExtendedTag::Percentage),
        _ => None,
    }
}

pub(crate) fn token_for_tag(tag: ExtendedTag) -> &'static str {
    match tag {
        ExtendedTag::Timestamp => TIMESTAMP_TOKEN,
        ExtendedTag::Decimal => DECIMAL_TOKEN,
        ExtendedTag::Currency => CURRENCY_TOKEN,
        ExtendedTag::Percentage => PERCENTAGE_TOKEN,
    }
}

/// An exact decimal number: `unscaled × 10^-scale`.
///
/// Equality is structural, so `Decimal::new(10, 1)` and `Decimal::new(1, 0)`
/// are different values even though they are numerically equal. This is what
/// lets a decimal round-trip with its precision intact.
///
/// # Examples
///
/// ```rust
/// use btoon::Decimal;
///
/// let d = Decimal::new(-5, 3);
/// assert_eq!(d.to_string(), "-0.005");
/// assert_eq!("-0.005".parse::<Decimal>().unwrap(), d);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
    unscaled: i64,
    scale: i32,
}

impl Decimal {
    #[must_use]
    pub const fn new(unscaled: i64, scale: i32) -> Self {
        Decimal { unscaled, scale }
    }

    #[inline]
    #[must_use]
    pub const fn unscaled(&self) -> i64 {
        self.unscaled
    }

    #[inline]
    #[must_use]
    pub const fn scale(&self) -> i32 {
        self.scale
    }

    /// Approximates the value as a float. Only for display or math where
    /// exactness does not matter.
    #[must_use]
    pub fn to_f64_lossy(&self) -> f64 {
        self.unscaled as f64 * 10f64.powi(-self.scale)
    }
}

/// Past this many zeros after the point a decimal is written as `digits e-scale`.
const MAX_LEADING_ZEROS: usize = 32;

/// Writes `unscaled × 10^-scale` without going through floating point.
fn write_scaled(f: &mut fmt::Formatter<'_>, unscaled: i64, scale: i64) -> fmt::Result {
    let negative = unscaled < 0;
    let digits = unscaled.unsigned_abs().to_string();
    let sign = if negative { "-" } else { "" };

    if scale <= 0 {
        if scale == 0 {
            write!(f, "{}{}", sign, digits)
        } else {
            write!(f, "{}{}e{}", sign, digits, -scale)
        }
    } else {
        let scale = scale as usize;
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{}{}.{}", sign, int_part, frac_part)
        } else if scale - digits.len() > MAX_LEADING_ZEROS {
            write!(f, "{}{}e-{}", sign, digits, scale)
        } else {
            write!(f, "{}0.{}{}", sign, "0".repeat(scale - digits.len()), digits)
        }
    }
}

/// Parses `[-+]digits[.digits][e[-+]digits]` into `(unscaled, scale)`.
fn parse_scaled(s: &str) -> Result<(i64, i64)> {
    let invalid = || Error::custom(format!("invalid decimal {:?}", s));

    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(pos) => {
            let exp: i64 = s[pos + 1..].parse().map_err(|_| invalid())?;
            (&s[..pos], exp)
        }
        None => (s, 0),
    };

    let (negative, body) = match mantissa.as_bytes().first() {
        Some(b'-') => (true, &mantissa[1..]),
        Some(b'+') => (false, &mantissa[1..]),
        _ => (false, mantissa),
    };

    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let mut digits = String::with_capacity(int_part.len() + frac_part.len() + 1);
    if negative {
        digits.push('-');
    }
    digits.push_str(int_part);
    digits.push_str(frac_part);
    let unscaled: i64 = digits
        .parse()
        .map_err(|_| Error::custom(format!("decimal {:?} does not fit 64-bit precision", s)))?;

    let scale = i64::try_from(frac_part.len())
        .ok()
        .and_then(|len| len.checked_sub(exponent))
        .ok_or_else(|| Error::custom(format!("decimal scale out of range in {:?}", s)))?;
    Ok((unscaled, scale))
}

fn scale_to_i32(scale: i64, input: &str) -> Result<i32> {
    i32::try_from(scale).map_err(|_| Error::custom(format!("decimal scale out of range in {:?}", input)))
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_scaled(f, self.unscaled, self.scale as i64)
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (unscaled, scale) = parse_scaled(s.trim())?;
        Ok(Decimal::new(unscaled, scale_to_i32(scale, s)?))
    }
}

/// A decimal ratio; `Decimal::new(1, 2)` (0.01) is one percent.
///
/// Displays as a percentage: the ratio `0.125` prints as `12.5%`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Percentage(Decimal);

impl Percentage {
    #[must_use]
    pub const fn from_ratio(ratio: Decimal) -> Self {
        Percentage(ratio)
    }

    #[must_use]
    pub const fn ratio(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_scaled(f, self.0.unscaled, self.0.scale as i64 - 2)?;
        f.write_str("%")
    }
}

impl FromStr for Percentage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let body = s
            .trim()
            .strip_suffix('%')
            .ok_or_else(|| Error::custom(format!("percentage {:?} lacks a '%' suffix", s)))?;
        let (unscaled, scale) = parse_scaled(body.trim_end())?;
        let scale = scale
            .checked_add(2)
            .ok_or_else(|| Error::custom(format!("decimal scale out of range in {:?}", s)))?;
        Ok(Percentage(Decimal::new(unscaled, scale_to_i32(scale, s)?)))
    }
}

/// A decimal amount in a currency identified by a three-letter code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Currency {
    amount: Decimal,
    code: [u8; 3],
}

impl Currency {
    /// Creates a currency amount. The code must be three ASCII uppercase letters.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use btoon::{Currency, Decimal};
    ///
    /// assert!(Currency::new(Decimal::new(100, 2), "USD").is_ok());
    /// assert!(Currency::new(Decimal::new(100, 2), "usd").is_err());
    /// assert!(Currency::new(Decimal::new(100, 2), "EURO").is_err());
    /// ```
    pub fn new(amount: Decimal, code: &str) -> Result<Self> {
        let bytes: [u8; 3] = code
            .as_bytes()
            .try_into()
            .map_err(|_| Error::custom(format!("currency code {:?} must be 3 letters", code)))?;
        Self::from_code_bytes(amount, bytes)
            .ok_or_else(|| Error::custom(format!("currency code {:?} must be uppercase ASCII", code)))
    }

    pub(crate) fn from_code_bytes(amount: Decimal, code: [u8; 3]) -> Option<Self> {
        if code.iter().all(u8::is_ascii_uppercase) {
            Some(Currency { amount, code })
        } else {
            None
        }
    }

    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    #[must_use]
    pub fn code(&self) -> &str {
        // Construction guarantees ASCII.
        std::str::from_utf8(&self.code).unwrap_or("???")
    }

    #[must_use]
    pub const fn code_bytes(&self) -> [u8; 3] {
        self.code
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.code())
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (amount, code) = s
            .trim()
            .rsplit_once(' ')
            .ok_or_else(|| Error::custom(format!("currency {:?} must be '<amount> <CODE>'", s)))?;
        Currency::new(amount.parse()?, code)
    }
}

/// A point in time: nanoseconds since the Unix epoch, plus an optional offset
/// (in minutes) recording the local timezone the value was captured in.
///
/// # Examples
///
/// ```rust
/// use btoon::Timestamp;
///
/// let ts = Timestamp::new(1_700_000_000_123_456_789, Some(120)).unwrap();
/// assert_eq!(ts.to_string(), "2023-11-15T00:13:20.123456789+02:00");
/// assert_eq!(ts.to_string().parse::<Timestamp>().unwrap(), ts);
///
/// assert!(Timestamp::new(0, Some(1441)).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Timestamp {
    nanos: i64,
    offset_minutes: Option<i16>,
}

impl Timestamp {
    pub fn new(nanos: i64, offset_minutes: Option<i16>) -> Result<Self> {
        if let Some(offset) = offset_minutes {
            if !(-MAX_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&offset) {
                return Err(Error::custom(format!(
                    "timezone offset {} minutes outside [-{}, {}]",
                    offset, MAX_OFFSET_MINUTES, MAX_OFFSET_MINUTES
                )));
            }
        }
        Ok(Timestamp {
            nanos,
            offset_minutes,
        })
    }

    /// A UTC timestamp without an offset.
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Timestamp {
            nanos,
            offset_minutes: None,
        }
    }

    #[must_use]
    pub const fn nanos(&self) -> i64 {
        self.nanos
    }

    #[must_use]
    pub const fn offset_minutes(&self) -> Option<i16> {
        self.offset_minutes
    }

    #[must_use]
    pub fn to_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.nanos)
    }

    /// Converts to a chrono date-time in the recorded offset.
    ///
    /// Returns `None` for offsets of exactly ±24h, which chrono cannot represent.
    #[must_use]
    pub fn to_fixed_offset(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(i32::from(self.offset_minutes.unwrap_or(0)) * 60)?;
        Some(self.to_utc().with_timezone(&offset))
    }
}

impl TryFrom<DateTime<Utc>> for Timestamp {
    type Error = Error;

    fn try_from(dt: DateTime<Utc>) -> Result<Self> {
        let nanos = dt
            .timestamp_nanos_opt()
            .ok_or_else(|| Error::unsupported_type("date-time outside the 64-bit nanosecond range"))?;
        Ok(Timestamp::from_nanos(nanos))
    }
}

impl TryFrom<DateTime<FixedOffset>> for Timestamp {
    type Error = Error;

    fn try_from(dt: DateTime<FixedOffset>) -> Result<Self> {
        let seconds = dt.offset().local_minus_utc();
        if seconds % 60 != 0 {
            return Err(Error::unsupported_type("timezone offsets must be whole minutes"));
        }
        let nanos = dt
            .timestamp_nanos_opt()
            .ok_or_else(|| Error::unsupported_type("date-time outside the 64-bit nanosecond range"))?;
        Timestamp::new(nanos, Some((seconds / 60) as i16))
    }
}

const LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9f";

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let utc = self.to_utc().naive_utc();
        match self.offset_minutes {
            None => write!(f, "{}Z", utc.format(LOCAL_FORMAT)),
            Some(offset) => {
                let local = utc + chrono::Duration::minutes(i64::from(offset));
                let sign = if offset < 0 { '-' } else { '+' };
                let abs = offset.unsigned_abs();
                write!(
                    f,
                    "{}{}{:02}:{:02}",
                    local.format(LOCAL_FORMAT),
                    sign,
                    abs / 60,
                    abs % 60
                )
            }
        }
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::custom(format!("invalid timestamp {:?}", s));
        let s = s.trim();

        let (local, offset) = if let Some(local) = s.strip_suffix(['Z', 'z']) {
            (local, None)
        } else {
            if s.len() < 6 || !s.is_char_boundary(s.len() - 6) {
                return Err(invalid());
            }
            let (local, suffix) = s.split_at(s.len() - 6);
            let bytes = suffix.as_bytes();
            let sign = match bytes[0] {
                b'+' => 1i16,
                b'-' => -1i16,
                _ => return Err(invalid()),
            };
            if bytes[3] != b':' {
                return Err(invalid());
            }
            let hours: i16 = suffix[1..3].parse().map_err(|_| invalid())?;
            let minutes: i16 = suffix[4..6].parse().map_err(|_| invalid())?;
            (local, Some(sign * (hours * 60 + minutes)))
        };

        let naive = NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S%.f").map_err(|_| invalid())?;
        let utc = naive
            .checked_sub_signed(chrono::Duration::minutes(i64::from(offset.unwrap_or(0))))
            .ok_or_else(invalid)?;
        let nanos = Utc
            .from_utc_datetime(&utc)
            .timestamp_nanos_opt()
            .ok_or_else(invalid)?;
        Timestamp::new(nanos, offset)
    }
}

/// One of the extended scalar kinds carried by [`Value::Extended`](crate::Value::Extended).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtendedScalar {
    Timestamp(Timestamp),
    Decimal(Decimal),
    Currency(Currency),
    Percentage(Percentage),
}

impl ExtendedScalar {
    #[must_use]
    pub const fn tag(&self) -> ExtendedTag {
        match self {
            ExtendedScalar::Timestamp(_) => ExtendedTag::Timestamp,
            ExtendedScalar::Decimal(_) => ExtendedTag::Decimal,
            ExtendedScalar::Currency(_) => ExtendedTag::Currency,
            ExtendedScalar::Percentage(_) => ExtendedTag::Percentage,
        }
    }

    /// Parses the textual form of the scalar named by `tag`.
    pub fn parse_as(tag: ExtendedTag, s: &str) -> Result<Self> {
        Ok(match tag {
            ExtendedTag::Timestamp => ExtendedScalar::Timestamp(s.parse()?),
            ExtendedTag::Decimal => ExtendedScalar::Decimal(s.parse()?),
            ExtendedTag::Currency => ExtendedScalar::Currency(s.parse()?),
            ExtendedTag::Percentage => ExtendedScalar::Percentage(s.parse()?),
        })
    }
}

impl fmt::Display for ExtendedScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtendedScalar::Timestamp(v) => v.fmt(f),
            ExtendedScalar::Decimal(v) => v.fmt(f),
            ExtendedScalar::Currency(v) => v.fmt(f),
            ExtendedScalar::Percentage(v) => v.fmt(f),
        }
    }
}

impl From<Timestamp> for ExtendedScalar {
    fn from(v: Timestamp) -> Self {
        ExtendedScalar::Timestamp(v)
    }
}

impl From<Decimal> for ExtendedScalar {
    fn from(v: Decimal) -> Self {
        ExtendedScalar::Decimal(v)
    }
}

impl From<Currency> for ExtendedScalar {
    fn from(v: Currency) -> Self {
        ExtendedScalar::Currency(v)
    }
}

impl From<Percentage> for ExtendedScalar {
    fn from(v: Percentage) -> Self {
        ExtendedScalar::Percentage(v)
    }
}

// Extended scalars travel through serde as a reserved newtype wrapping their
// textual form. The BTOON value serializer recognises the name and rebuilds
// the typed scalar; every other format just sees the string.

impl Serialize for ExtendedScalar {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_newtype_struct(token_for_tag(self.tag()), &self.to_string())
    }
}

struct ExtendedVisitor(ExtendedTag);

impl<'de> de::Visitor<'de> for ExtendedVisitor {
    type Value = ExtendedScalar;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a {} in textual form", self.0.name())
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<ExtendedScalar, E> {
        ExtendedScalar::parse_as(self.0, v).map_err(E::custom)
    }

    fn visit_newtype_struct<D>(self, deserializer: D) -> std::result::Result<ExtendedScalar, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        ExtendedScalar::parse_as(self.0, &text).map_err(de::Error::custom)
    }
}

macro_rules! extended_serde {
    ($ty:ident, $tag:expr) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                ExtendedScalar::from(*self).serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                match deserializer.deserialize_newtype_struct(token_for_tag($tag), ExtendedVisitor($tag))? {
                    ExtendedScalar::$ty(v) => Ok(v),
                    other => Err(de::Error::custom(format!(
                        "expected {}, found {}",
                        $tag.name(),
                        other.tag().name()
                    ))),
                }
            }
        }
    };
}

extended_serde!(Timestamp, ExtendedTag::Timestamp);
extended_serde!(Decimal, ExtendedTag::Decimal);
extended_serde!(Currency, ExtendedTag::Currency);
extended_serde!(Percentage, ExtendedTag::Percentage);
