use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::RangeInclusive;

/// Month numbers as used throughout the engine (January = 1).
pub const MONTHS: RangeInclusive<u32> = 1..=12;

pub const MONTHS_PER_YEAR: u32 = 12;

/// Days per month in a non-leap year, January first.
pub const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

const HOURS_PER_DAY: u32 = 24;

/// Number of days in the given month, honouring leap Februaries.
///
/// Panics when `month` is outside 1-12.
pub fn days_in_month(month: u32, year: i32) -> u32 {
    debug_assert!(MONTHS.contains(&month));
    match month {
        2 if NaiveDate::from_ymd_opt(year, 2, 29).is_some() => 29,
        m => DAYS_IN_MONTH[(m - 1) as usize],
    }
}

/// Hours in the given month of a non-leap year, as used for heat loss energy.
///
/// Panics when `month` is outside 1-12.
pub fn hours_in_month(month: u32) -> f64 {
    debug_assert!(MONTHS.contains(&month));
    (DAYS_IN_MONTH[(month - 1) as usize] * HOURS_PER_DAY) as f64
}

/// An ordered mapping from month number (1-12) to a value, always fully
/// materialized: there is one entry per month and no gaps. Serialized as a
/// month-keyed map so callers see the same shape they send monthly usage in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonthlySeries<T>([T; 12]);

impl<T: Copy> MonthlySeries<T> {
    /// Build a series by evaluating the given function for each month 1-12.
    pub fn from_fn(mut f: impl FnMut(u32) -> T) -> Self {
        Self(core::array::from_fn(|idx| f(idx as u32 + 1)))
    }

    /// A series holding the same value for every month.
    pub fn uniform(value: T) -> Self {
        Self([value; 12])
    }

    /// The value for a month numbered 1-12; panics outside that range.
    pub fn get(&self, month: u32) -> T {
        debug_assert!(MONTHS.contains(&month));
        self.0[(month - 1) as usize]
    }

    pub fn values(&self) -> &[T; 12] {
        &self.0
    }

    /// Iterate over (month, value) pairs in calendar order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, T)> + '_ {
        MONTHS.zip(self.0.iter().copied())
    }

    pub fn map<U: Copy>(&self, f: impl FnMut(T) -> U) -> MonthlySeries<U> {
        MonthlySeries(self.0.map(f))
    }
}

impl MonthlySeries<f64> {
    pub fn zero() -> Self {
        Self::uniform(0.)
    }

    /// Sum of all twelve monthly values.
    pub fn annual_total(&self) -> f64 {
        self.0.iter().sum()
    }
}

impl<T> From<[T; 12]> for MonthlySeries<T> {
    fn from(values: [T; 12]) -> Self {
        Self(values)
    }
}

impl<T: Copy + Serialize> Serialize for MonthlySeries<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(12))?;
        for (month, value) in self.iter() {
            map.serialize_entry(&month, &value)?;
        }
        map.end()
    }
}

impl<'de, T: Copy + Deserialize<'de>> Deserialize<'de> for MonthlySeries<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = IndexMap::<u32, T>::deserialize(deserializer)?;
        let values = MONTHS
            .map(|month| {
                entries.get(&month).copied().ok_or_else(|| {
                    D::Error::custom(format!("monthly series is missing month {month}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let values: [T; 12] = values
            .try_into()
            .map_err(|_| D::Error::custom("monthly series must hold exactly 12 months"))?;
        Ok(Self(values))
    }
}
