use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, Local, TimeZone, Timelike};
use serde::Serialize;

use crate::err::{CResult, EngineError};
use crate::schema::data_type::DataType;

/// Type	Storage (Bytes)	Minimum Value Signed	Maximum Value Signed
/// TINYINT	1	-128	127
/// SMALLINT	2	-32768	32767
/// INT	4	-2147483648	2147483647
/// BIGINT	8	-2^63	2^63-1
///
/// Every cell the engine touches is one of these tags. Arithmetic and
/// comparisons widen across tags instead of erroring where a numeric
/// reading exists.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub enum Value {
    Null,

    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),

    UTinyInt(u8),
    USmallInt(u16),
    UInt(u32),
    UBigInt(u64),

    Float(f32),
    Double(f64),

    Bool(bool),

    String(String),
    Blob(Vec<u8>),

    Date(Date),
    Time(Time),
    DateTime(DateTime),
    /// millis from unix time
    Timestamp(i64),
}

#[derive(Debug, Serialize, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

#[derive(Debug, Serialize, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct Time {
    /// Signed value from -838 to 838
    pub hour: i16,
    pub minute: u8,
    pub second: u8,
    pub millis: u32,
}

#[derive(Debug, Serialize, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millis: u32,
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl Date {
    pub fn parse(s: &str) -> Option<Date> {
        let mut it = s.split('-');
        let year = it.next()?.parse().ok()?;
        let month = it.next()?.parse().ok()?;
        let day = it.next()?.parse().ok()?;
        if it.next().is_some() || month == 0 || month > 12 || day == 0 || day > 31 {
            return None;
        }
        Some(Date { year, month, day })
    }

    pub fn today() -> Date {
        let now = Local::now();
        Date {
            year: now.year() as u16,
            month: now.month() as u8,
            day: now.day() as u8,
        }
    }
}

impl DateTime {
    pub fn parse(s: &str) -> Option<DateTime> {
        let (date_part, time_part) = s.split_once(' ')?;
        let date = Date::parse(date_part)?;
        let mut it = time_part.split(':');
        let hour = it.next()?.parse().ok()?;
        let minute = it.next()?.parse().ok()?;
        let second: f64 = it.next().unwrap_or("0").parse().ok()?;
        Some(DateTime {
            year: date.year,
            month: date.month,
            day: date.day,
            hour,
            minute,
            second: second as u8,
            millis: ((second - second.floor()) * 1000.0) as u32,
        })
    }

    pub fn now() -> DateTime {
        let now = Local::now();
        DateTime {
            year: now.year() as u16,
            month: now.month() as u8,
            day: now.day() as u8,
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
            millis: now.timestamp_subsec_millis(),
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            // null cells keep the widest string shape until a column pins them
            Value::Null => DataType::Varchar,
            Value::TinyInt(_) => DataType::TinyInt,
            Value::SmallInt(_) => DataType::SmallInt,
            Value::Int(_) => DataType::Int,
            Value::BigInt(_) => DataType::BigInt,
            Value::UTinyInt(_) => DataType::UTinyInt,
            Value::USmallInt(_) => DataType::USmallInt,
            Value::UInt(_) => DataType::UInt,
            Value::UBigInt(_) => DataType::UBigInt,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::Bool(_) => DataType::Boolean,
            Value::String(_) => DataType::Varchar,
            Value::Blob(_) => DataType::Blob,
            Value::Date(_) => DataType::Date,
            Value::Time(_) => DataType::Time,
            Value::DateTime(_) => DataType::DateTime,
            Value::Timestamp(_) => DataType::Timestamp,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(*v as i64),
            Value::SmallInt(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            Value::UTinyInt(v) => Some(*v as i64),
            Value::USmallInt(v) => Some(*v as i64),
            Value::UInt(v) => Some(*v as i64),
            Value::UBigInt(v) => i64::try_from(*v).ok(),
            Value::Bool(b) => Some(*b as i64),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Double(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::String(s) => s.trim().parse().ok(),
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UBigInt(v) => Some(*v),
            other => other.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    /// Numeric reading of the value, widening integers into f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::TinyInt(v) => Some(*v as f64),
            Value::SmallInt(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::BigInt(v) => Some(*v as f64),
            Value::UTinyInt(v) => Some(*v as f64),
            Value::USmallInt(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::UBigInt(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Bool(b) => Some(*b as i64 as f64),
            Value::String(s) => s.trim().parse().ok(),
            Value::Timestamp(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn is_integer(&self) -> bool {
        matches!(
            self,
            Value::TinyInt(_)
                | Value::SmallInt(_)
                | Value::Int(_)
                | Value::BigInt(_)
                | Value::UTinyInt(_)
                | Value::USmallInt(_)
                | Value::UInt(_)
                | Value::UBigInt(_)
                | Value::Bool(_)
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Value::Float(_) | Value::Double(_))
    }

    /// Three-valued comparison. `None` means unknown: either side null, or
    /// no coercion exists between the tags.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Value::Blob(a), Value::Blob(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (a, b) if a.is_integer() && b.is_integer() => {
                // keep u64 exact instead of bouncing through f64
                match (a.as_i64(), b.as_i64()) {
                    (Some(x), Some(y)) => Some(x.cmp(&y)),
                    _ => match (a.as_u64(), b.as_u64()) {
                        (Some(x), Some(y)) => Some(x.cmp(&y)),
                        (Some(_), None) => Some(Ordering::Greater),
                        (None, Some(_)) => Some(Ordering::Less),
                        _ => None,
                    },
                }
            }
            (a, b) => {
                let x = a.as_f64()?;
                let y = b.as_f64()?;
                x.partial_cmp(&y)
            }
        }
    }

    /// Total order for sorting: null lowest, then numeric comparison with
    /// widening, strings byte-wise, mismatched tags by string rendering.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        if let Some(ord) = self.compare(other) {
            return ord;
        }
        self.to_string().cmp(&other.to_string())
    }

    /// Boolean reading. `None` for null.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(s.trim().parse::<f64>().map(|v| v != 0.0).unwrap_or(false)),
            v => v.as_f64().map(|f| f != 0.0),
        }
    }

    /// Deterministic serialization used as hash-table key material for
    /// group-by buckets, join probes and the unique index. Numeric tags of
    /// equal value must collapse to the same key.
    pub fn key(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::UBigInt(v) if *v > i64::MAX as u64 => format!("i:{}", v),
            v if v.is_integer() => format!("i:{}", v.as_i64().unwrap_or_default()),
            Value::Float(v) => float_key(*v as f64),
            Value::Double(v) => float_key(*v),
            Value::String(s) => format!("s:{}", s),
            Value::Blob(b) => {
                let mut out = std::string::String::with_capacity(2 + b.len() * 2);
                out.push_str("x:");
                for byte in b {
                    out.push_str(&format!("{:02x}", byte));
                }
                out
            }
            Value::Date(d) => format!("d:{}", d),
            Value::Time(t) => format!("t:{}", t),
            Value::DateTime(dt) => format!("dt:{}", dt),
            Value::Timestamp(ts) => format!("ts:{}", ts),
            _ => unreachable!(),
        }
    }

    /// Wire text-protocol rendering. `None` maps to the 0xFB null marker.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn add(&self, other: &Value) -> CResult<Value> {
        self.arith(other, "+", |a, b| a.checked_add(b), |a, b| a + b)
    }

    pub fn sub(&self, other: &Value) -> CResult<Value> {
        self.arith(other, "-", |a, b| a.checked_sub(b), |a, b| a - b)
    }

    pub fn mul(&self, other: &Value) -> CResult<Value> {
        self.arith(other, "*", |a, b| a.checked_mul(b), |a, b| a * b)
    }

    /// `/` always produces a double, `NULL` on division by zero.
    pub fn div(&self, other: &Value) -> CResult<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        let a = self.numeric_operand("/")?;
        let b = other.numeric_operand("/")?;
        if b == 0.0 {
            return Ok(Value::Null);
        }
        Ok(Value::Double(a / b))
    }

    pub fn rem(&self, other: &Value) -> CResult<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        if self.is_integer() && other.is_integer() {
            let a = self.as_i64().unwrap_or_default();
            let b = other.as_i64().unwrap_or_default();
            if b == 0 {
                return Ok(Value::Null);
            }
            return Ok(Value::BigInt(a % b));
        }
        let a = self.numeric_operand("%")?;
        let b = other.numeric_operand("%")?;
        if b == 0.0 {
            return Ok(Value::Null);
        }
        Ok(Value::Double(a % b))
    }

    pub fn neg(&self) -> CResult<Value> {
        match self {
            Value::Null => Ok(Value::Null),
            v if v.is_integer() => {
                let i = v
                    .as_i64()
                    .ok_or_else(|| EngineError::TypeMismatch("BIGINT value is out of range".to_string()))?;
                Ok(Value::BigInt(-i))
            }
            Value::Float(v) => Ok(Value::Float(-v)),
            Value::Double(v) => Ok(Value::Double(-v)),
            other => Err(EngineError::TypeMismatch(format!(
                "cannot negate {}",
                other.data_type().name()
            ))),
        }
    }

    fn numeric_operand(&self, op: &str) -> CResult<f64> {
        self.as_f64().ok_or_else(|| {
            EngineError::TypeMismatch(format!(
                "operand of '{}' is not numeric: {}",
                op,
                self.data_type().name()
            ))
        })
    }

    fn arith(
        &self,
        other: &Value,
        op: &str,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> CResult<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        if self.is_integer() && other.is_integer() {
            if let (Some(a), Some(b)) = (self.as_i64(), other.as_i64()) {
                return int_op(a, b)
                    .map(Value::BigInt)
                    .ok_or_else(|| EngineError::TypeMismatch("BIGINT value is out of range".to_string()));
            }
        }
        let a = self.numeric_operand(op)?;
        let b = other.numeric_operand(op)?;
        Ok(Value::Double(float_op(a, b)))
    }

    /// Cast into the column's declared type. Failures are `TypeMismatch`.
    pub fn coerce_to(&self, target: &DataType) -> CResult<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        if &self.data_type() == target {
            return Ok(self.clone());
        }
        let fail = || {
            EngineError::TypeMismatch(format!(
                "Incorrect {} value: '{}'",
                target.name(),
                self
            ))
        };
        let int = |v: &Value| v.as_i64().ok_or_else(&fail);
        Ok(match target {
            DataType::TinyInt => Value::TinyInt(i8::try_from(int(self)?).map_err(|_| fail())?),
            DataType::SmallInt => Value::SmallInt(i16::try_from(int(self)?).map_err(|_| fail())?),
            DataType::Int => Value::Int(i32::try_from(int(self)?).map_err(|_| fail())?),
            DataType::BigInt => Value::BigInt(int(self)?),
            DataType::UTinyInt => Value::UTinyInt(u8::try_from(int(self)?).map_err(|_| fail())?),
            DataType::USmallInt => Value::USmallInt(u16::try_from(int(self)?).map_err(|_| fail())?),
            DataType::UInt => Value::UInt(u32::try_from(int(self)?).map_err(|_| fail())?),
            DataType::UBigInt => Value::UBigInt(self.as_u64().ok_or_else(&fail)?),
            DataType::Float => Value::Float(self.as_f64().ok_or_else(&fail)? as f32),
            DataType::Double => Value::Double(self.as_f64().ok_or_else(&fail)?),
            DataType::Boolean => Value::Bool(self.truthy().ok_or_else(&fail)?),
            DataType::Varchar => Value::String(self.to_string()),
            DataType::Blob => match self {
                Value::String(s) => Value::Blob(s.clone().into_bytes()),
                _ => return Err(fail()),
            },
            DataType::Date => match self {
                Value::String(s) => Value::Date(Date::parse(s).ok_or_else(&fail)?),
                Value::DateTime(dt) => Value::Date(Date {
                    year: dt.year,
                    month: dt.month,
                    day: dt.day,
                }),
                _ => return Err(fail()),
            },
            DataType::Time => match self {
                Value::String(s) => {
                    let mut it = s.split(':');
                    let hour = it.next().and_then(|p| p.parse().ok()).ok_or_else(&fail)?;
                    let minute = it.next().and_then(|p| p.parse().ok()).ok_or_else(&fail)?;
                    let second = it.next().and_then(|p| p.parse().ok()).unwrap_or(0);
                    Value::Time(Time {
                        hour,
                        minute,
                        second,
                        millis: 0,
                    })
                }
                _ => return Err(fail()),
            },
            DataType::DateTime => match self {
                Value::String(s) => Value::DateTime(
                    DateTime::parse(s)
                        .or_else(|| {
                            Date::parse(s).map(|d| DateTime {
                                year: d.year,
                                month: d.month,
                                day: d.day,
                                hour: 0,
                                minute: 0,
                                second: 0,
                                millis: 0,
                            })
                        })
                        .ok_or_else(&fail)?,
                ),
                _ => return Err(fail()),
            },
            DataType::Timestamp => match self {
                v if v.is_integer() => Value::Timestamp(int(self)?),
                Value::String(s) => {
                    let dt = DateTime::parse(s).ok_or_else(&fail)?;
                    let local = Local
                        .with_ymd_and_hms(
                            dt.year as i32,
                            dt.month as u32,
                            dt.day as u32,
                            dt.hour as u32,
                            dt.minute as u32,
                            dt.second as u32,
                        )
                        .single()
                        .ok_or_else(&fail)?;
                    Value::Timestamp(local.timestamp_millis())
                }
                _ => return Err(fail()),
            },
        })
    }
}

fn float_key(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        format!("i:{}", v as i64)
    } else {
        format!("f:{:?}", v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::UTinyInt(v) => write!(f, "{}", v),
            Value::USmallInt(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::UBigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", *b as u8),
            Value::String(s) => write!(f, "{}", s),
            Value::Blob(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Date(d) => write!(f, "{}", d),
            Value::Time(t) => write!(f, "{}", t),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::Timestamp(ts) => {
                match Local.timestamp_millis_opt(*ts).single() {
                    Some(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
                    None => write!(f, "{}", ts),
                }
            }
        }
    }
}

/// Anchored SQL LIKE. `%` spans any run, `_` exactly one character.
/// Matching is ASCII case insensitive, as with MySQL's default collation.
pub fn like_match(input: &str, pattern: &str) -> bool {
    fn inner(text: &[u8], pat: &[u8]) -> bool {
        match pat.first() {
            None => text.is_empty(),
            Some(b'%') => {
                // collapse a greedy run, then try every split point
                let rest = &pat[1..];
                (0..=text.len()).any(|i| inner(&text[i..], rest))
            }
            Some(b'_') => !text.is_empty() && inner(&text[1..], &pat[1..]),
            Some(c) => match text.first() {
                Some(t) if t.eq_ignore_ascii_case(c) => inner(&text[1..], &pat[1..]),
                _ => false,
            },
        }
    }
    inner(input.as_bytes(), pattern.as_bytes())
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn widening_compare() {
        assert_eq!(
            Value::Int(5).compare(&Value::BigInt(5)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Int(5).compare(&Value::Double(5.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::String("30".into()).compare(&Value::Int(20)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
    }

    #[test]
    fn unsigned_stays_exact() {
        let big = Value::UBigInt(u64::MAX);
        assert_eq!(big.compare(&Value::BigInt(1)), Some(Ordering::Greater));
        assert_ne!(big.key(), Value::BigInt(-1).key());
    }

    #[test]
    fn sort_order_null_lowest() {
        assert_eq!(Value::Null.total_cmp(&Value::Int(-100)), Ordering::Less);
        assert_eq!(
            Value::String("a".into()).total_cmp(&Value::String("b".into())),
            Ordering::Less
        );
    }

    #[test]
    fn arithmetic_widens() {
        assert_eq!(
            Value::Int(2).add(&Value::BigInt(3)).unwrap(),
            Value::BigInt(5)
        );
        assert_eq!(
            Value::Int(2).add(&Value::Double(0.5)).unwrap(),
            Value::Double(2.5)
        );
        assert_eq!(Value::Int(1).div(&Value::Int(0)).unwrap(), Value::Null);
        assert_eq!(Value::Null.mul(&Value::Int(3)).unwrap(), Value::Null);
    }

    #[test]
    fn group_keys_collapse_numeric_tags() {
        assert_eq!(Value::Int(1).key(), Value::BigInt(1).key());
        assert_eq!(Value::Double(1.0).key(), Value::Int(1).key());
        assert_ne!(Value::String("1".into()).key(), Value::Int(1).key());
    }

    #[test]
    fn like_wildcards() {
        assert!(like_match("hello", "h%"));
        assert!(like_match("hello", "_ello"));
        assert!(like_match("hello", "%LL%"));
        assert!(!like_match("hello", "h_"));
        assert!(!like_match("hello", "%x%"));
        assert!(like_match("", "%"));
    }

    #[test]
    fn coercion() {
        assert_eq!(
            Value::String("42".into()).coerce_to(&DataType::Int).unwrap(),
            Value::Int(42)
        );
        assert!(Value::String("abc".into()).coerce_to(&DataType::Int).is_err());
        assert_eq!(
            Value::String("2024-01-31".into())
                .coerce_to(&DataType::Date)
                .unwrap(),
            Value::Date(Date {
                year: 2024,
                month: 1,
                day: 31
            })
        );
    }
}
