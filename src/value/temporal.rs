//! Temporal value types.
//!
//! Every temporal kind in the protocol is an offset from the kdb+ epoch,
//! `2000.01.01D00:00:00`. The types in this module are thin wrappers over that raw
//! wire offset, so equality and ordering are exactly the wire semantics. Conversions
//! to and from [`chrono`] calendar values are provided on each type.
//!
//! # Local time
//!
//! Conversions that involve the host clock (`from_local` / `to_local`) take an explicit
//! [`FixedOffset`]. The offset is applied uniformly, so a value falling in a different
//! daylight-saving regime than the offset was resolved in will be off by the DST delta.
//! See [`Session`](crate::protocol::Session) for where the offset comes from.
use std::fmt;

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike,
};

use super::ValueError;

/// Days between `0001-01-01` (day 1 of the common era) and `2000-01-01`.
const EPOCH_DAYS_FROM_CE: i32 = 730_120;
/// Seconds between the unix epoch and the kdb+ epoch.
const EPOCH_UNIX_SECONDS: i64 = 946_684_800;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_DAY: u64 = 86_400 * NANOS_PER_SECOND as u64;
const MILLIS_PER_DAY: f64 = 8.64e7;

/// Months since `2000.01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(pub i32);

/// Days since `2000.01.01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date(pub i32);

/// Legacy datetime: fractional days since `2000.01.01`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Datetime(pub f64);

/// Nanoseconds since `2000.01.01D00:00:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

/// Duration in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timespan(pub i64);

/// Minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Minute(pub i32);

/// Seconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Second(pub i32);

/// Milliseconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(pub i32);

macro_rules! int_null {
    ($($name:ident($inner:ty)),* $(,)?) => {
        $(
            impl $name {
                /// The kdb+ null of this kind.
                pub const NULL: Self = Self(<$inner>::MIN);

                pub fn is_null(&self) -> bool {
                    self.0 == <$inner>::MIN
                }
            }
        )*
    };
}

int_null!(
    Month(i32),
    Date(i32),
    Timestamp(i64),
    Timespan(i64),
    Minute(i32),
    Second(i32),
    Time(i32),
);

impl Datetime {
    pub const NULL: Self = Self(f64::NAN);

    pub fn is_null(&self) -> bool {
        self.0.is_nan()
    }
}

fn shift(dt: NaiveDateTime, seconds: i64) -> Option<NaiveDateTime> {
    dt.checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

impl Month {
    /// `month` is 1-based.
    pub fn new(year: i32, month: u32) -> Self {
        Self((year - 2000) * 12 + month as i32 - 1)
    }

    pub fn year(&self) -> i32 {
        2000 + self.0.div_euclid(12)
    }

    pub fn month(&self) -> u32 {
        self.0.rem_euclid(12) as u32 + 1
    }
}

impl Date {
    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date.num_days_from_ce() - EPOCH_DAYS_FROM_CE)
    }

    pub fn to_naive(&self) -> Option<NaiveDate> {
        if self.is_null() {
            return None;
        }
        NaiveDate::from_num_days_from_ce_opt(self.0.checked_add(EPOCH_DAYS_FROM_CE)?)
    }
}

impl Timestamp {
    pub fn from_utc(dt: NaiveDateTime) -> Result<Self, ValueError> {
        let utc = dt.and_utc();
        (utc.timestamp() - EPOCH_UNIX_SECONDS)
            .checked_mul(NANOS_PER_SECOND)
            .and_then(|n| n.checked_add(utc.timestamp_subsec_nanos() as i64))
            .map(Self)
            .ok_or(ValueError::TemporalRange)
    }

    /// Interprets `dt` as wall-clock time at `offset` east of UTC.
    pub fn from_local(dt: NaiveDateTime, offset: FixedOffset) -> Result<Self, ValueError> {
        let utc = shift(dt, -offset.local_minus_utc() as i64).ok_or(ValueError::TemporalRange)?;
        Self::from_utc(utc)
    }

    pub fn to_utc(&self) -> Option<NaiveDateTime> {
        if self.is_null() {
            return None;
        }
        let secs = self.0.div_euclid(NANOS_PER_SECOND) + EPOCH_UNIX_SECONDS;
        let nanos = self.0.rem_euclid(NANOS_PER_SECOND) as u32;
        DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
    }

    pub fn to_local(&self, offset: FixedOffset) -> Option<NaiveDateTime> {
        shift(self.to_utc()?, offset.local_minus_utc() as i64)
    }
}

impl Timespan {
    pub fn from_delta(delta: TimeDelta) -> Result<Self, ValueError> {
        delta
            .num_nanoseconds()
            .map(Self)
            .ok_or(ValueError::TemporalRange)
    }

    pub fn to_delta(&self) -> TimeDelta {
        TimeDelta::nanoseconds(self.0)
    }
}

impl Datetime {
    pub fn from_utc(dt: NaiveDateTime) -> Self {
        let millis = dt.and_utc().timestamp_millis() - EPOCH_UNIX_SECONDS * 1000;
        Self(millis as f64 / MILLIS_PER_DAY)
    }

    /// Interprets `dt` as wall-clock time at `offset` east of UTC.
    pub fn from_local(dt: NaiveDateTime, offset: FixedOffset) -> Result<Self, ValueError> {
        shift(dt, -offset.local_minus_utc() as i64)
            .map(Self::from_utc)
            .ok_or(ValueError::TemporalRange)
    }

    pub fn to_utc(&self) -> Option<NaiveDateTime> {
        if !self.0.is_finite() {
            return None;
        }
        let millis = (self.0 * MILLIS_PER_DAY).round() as i64 + EPOCH_UNIX_SECONDS * 1000;
        DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
    }

    pub fn to_local(&self, offset: FixedOffset) -> Option<NaiveDateTime> {
        shift(self.to_utc()?, offset.local_minus_utc() as i64)
    }
}

impl Minute {
    pub fn new(hour: i32, minute: i32) -> Self {
        Self(hour * 60 + minute)
    }
}

impl Second {
    pub fn new(hour: i32, minute: i32, second: i32) -> Self {
        Self((hour * 60 + minute) * 60 + second)
    }
}

impl Time {
    pub fn from_naive(time: NaiveTime) -> Self {
        let millis = time.num_seconds_from_midnight() * 1000 + time.nanosecond() / 1_000_000;
        Self(millis as i32)
    }

    pub fn to_naive(&self) -> Option<NaiveTime> {
        let millis = u32::try_from(self.0).ok()?;
        NaiveTime::from_num_seconds_from_midnight_opt(millis / 1000, (millis % 1000) * 1_000_000)
    }
}

/// Splits a signed count into its sign and magnitude.
fn sign(value: i64) -> (&'static str, u64) {
    if value < 0 { ("-", value.unsigned_abs()) } else { ("", value as u64) }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("0Nm");
        }
        write!(f, "{:04}.{:02}m", self.year(), self.month())
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_naive() {
            Some(date) => write!(f, "{}", date.format("%Y.%m.%d")),
            None => f.write_str("0Nd"),
        }
    }
}

impl fmt::Display for Datetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_utc() {
            Some(dt) => write!(f, "{}", dt.format("%Y.%m.%dT%H:%M:%S%.3f")),
            None => f.write_str("0Nz"),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_utc() {
            Some(dt) => write!(f, "{}", dt.format("%Y.%m.%dD%H:%M:%S%.9f")),
            None => f.write_str("0Np"),
        }
    }
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("0Nn");
        }
        let (sign, nanos) = sign(self.0);
        let days = nanos / NANOS_PER_DAY;
        let rem = nanos % NANOS_PER_DAY;
        let secs = rem / NANOS_PER_SECOND as u64;
        write!(
            f,
            "{sign}{days}D{:02}:{:02}:{:02}.{:09}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60,
            rem % NANOS_PER_SECOND as u64
        )
    }
}

impl fmt::Display for Minute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("0Nu");
        }
        let (sign, minutes) = sign(self.0 as i64);
        write!(f, "{sign}{:02}:{:02}", minutes / 60, minutes % 60)
    }
}

impl fmt::Display for Second {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("0Nv");
        }
        let (sign, secs) = sign(self.0 as i64);
        write!(
            f,
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        )
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("0Nt");
        }
        let (sign, millis) = sign(self.0 as i64);
        let secs = millis / 1000;
        write!(
            f,
            "{sign}{:02}:{:02}:{:02}.{:03}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60,
            millis % 1000
        )
    }
}
