//! Synthesis of periodic schedule expressions for the fixed-granularity `add_*_job` helpers.
//!
//! Expressions use the six-field, seconds-resolution layout
//! `"<sec> <min> <hour> <day> <month> <weekday>"` with `*/n` steps. Fields finer
//! than the job's granularity are pinned to a fixed offset: their lowest legal
//! value by default, or a random value drawn once per registration when
//! `random` is set.
//!
//! Out-of-range step values are clamped to the maximum of their granularity
//! rather than rejected.

use std::fmt;
use std::ops::RangeInclusive;

use rand::Rng;

/// Unit of an "every n units" schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Granularity {
  Second,
  Minute,
  Hour,
  Day,
  Month,
  Week,
}

impl Granularity {
  /// Legal range for the step value `n`.
  pub const fn range(self) -> RangeInclusive<u32> {
    match self {
      Granularity::Second | Granularity::Minute => 0..=59,
      Granularity::Hour => 0..=23,
      Granularity::Day => 1..=31,
      Granularity::Month => 0..=12,
      Granularity::Week => 1..=7,
    }
  }

  /// Returns `n` unchanged if legal, otherwise the range maximum.
  pub fn clamp(self, n: u32) -> u32 {
    let range = self.range();
    if range.contains(&n) {
      n
    } else {
      *range.end()
    }
  }
}

impl fmt::Display for Granularity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Granularity::Second => "second",
      Granularity::Minute => "minute",
      Granularity::Hour => "hour",
      Granularity::Day => "day",
      Granularity::Month => "month",
      Granularity::Week => "week",
    };
    f.write_str(name)
  }
}

/// Values used for the fields finer than a job's granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubUnitOffsets {
  pub second: u32,
  pub minute: u32,
  pub hour: u32,
  /// Day of month for monthly jobs.
  pub day_of_month: u32,
}

impl Default for SubUnitOffsets {
  fn default() -> Self {
    Self {
      second: 0,
      minute: 0,
      hour: 0,
      day_of_month: 1,
    }
  }
}

impl SubUnitOffsets {
  /// Draws every offset independently. The day of month stays within 1..=28
  /// so monthly jobs fire in every month.
  pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
    Self {
      second: rng.random_range(0..=59),
      minute: rng.random_range(0..=59),
      hour: rng.random_range(0..=23),
      day_of_month: rng.random_range(1..=28),
    }
  }
}

/// Builds the expression for "every `n` units of `granularity`" with explicit offsets.
/// `n` is clamped first.
pub fn every_with_offsets(granularity: Granularity, n: u32, offsets: SubUnitOffsets) -> String {
  let n = granularity.clamp(n);
  let SubUnitOffsets {
    second: s,
    minute: m,
    hour: h,
    day_of_month: d,
  } = offsets;

  match granularity {
    Granularity::Second => format!("*/{n} * * * * *"),
    Granularity::Minute => format!("{s} */{n} * * * *"),
    Granularity::Hour => format!("{s} {m} */{n} * * *"),
    Granularity::Day => format!("{s} {m} {h} */{n} * *"),
    Granularity::Month => format!("{s} {m} {h} {d} */{n} *"),
    Granularity::Week => format!("{s} {m} {h} * * */{n}"),
  }
}

/// Builds the expression for "every `n` units of `granularity`", jittering
/// the finer fields when `random` is set.
pub fn every(granularity: Granularity, n: u32, random: bool) -> String {
  let offsets = if random {
    SubUnitOffsets::random(&mut rand::rng())
  } else {
    SubUnitOffsets::default()
  };
  every_with_offsets(granularity, n, offsets)
}
