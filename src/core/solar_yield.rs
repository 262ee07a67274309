//! Solar yield per installed kW of panel capacity at a location.
//!
//! Daily irradiance (kWh/m²/day) is sourced through the external data
//! gateway, scaled up to calendar months of the reference year and derated
//! for real-world panel losses.

use crate::core::units::round_half_up;
use crate::external_data::{ClimateDataSource, IrradianceSource};
use crate::monthly::{days_in_month, MonthlySeries, MONTHS_PER_YEAR};
use chrono::{Datelike, Utc};
use serde::Serialize;
use tracing::info;

/// System-level derate applied to nominal irradiance: inverter losses,
/// suboptimal orientation, soiling.
pub const YIELD_DERATE: f64 = 0.8;

/// Monthly yield estimate for one location, per installed kW.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationYieldResult {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// kWh per installed kW for each month.
    pub monthly_yield: MonthlySeries<f64>,
    /// The underlying daily irradiance series, kWh/m²/day.
    pub monthly_irradiance: MonthlySeries<f64>,
    pub days_in_month: MonthlySeries<u32>,
    pub average_monthly_yield: f64,
    pub irradiance_source: IrradianceSource,
}

/// Converts daily irradiance into monthly energy yield. Never fails: the
/// gateway's fallback cascade always produces a full irradiance year.
pub struct LocationYieldCalculator<'a, C: ClimateDataSource> {
    climate: &'a C,
    reference_year: i32,
}

impl<'a, C: ClimateDataSource> LocationYieldCalculator<'a, C> {
    pub fn new(climate: &'a C) -> Self {
        Self::with_reference_year(climate, Utc::now().year())
    }

    /// February's day count follows the reference year.
    pub fn with_reference_year(climate: &'a C, reference_year: i32) -> Self {
        Self {
            climate,
            reference_year,
        }
    }

    pub fn calculate(
        &self,
        latitude: f64,
        longitude: f64,
        location: Option<&str>,
    ) -> LocationYieldResult {
        let lookup = self.climate.monthly_irradiance(latitude, longitude, location);
        let days = MonthlySeries::from_fn(|month| days_in_month(month, self.reference_year));
        let raw_yield = MonthlySeries::from_fn(|month| {
            lookup.series.get(month) * f64::from(days.get(month)) * YIELD_DERATE
        });
        info!(
            latitude,
            longitude,
            source = %lookup.source,
            annual_yield = raw_yield.annual_total(),
            "solar yield calculated"
        );

        LocationYieldResult {
            latitude,
            longitude,
            location: location.map(str::to_owned),
            monthly_yield: raw_yield.map(|kwh| round_half_up(kwh, 2)),
            monthly_irradiance: lookup.series.map(|value| round_half_up(value, 4)),
            days_in_month: days,
            average_monthly_yield: round_half_up(
                raw_yield.annual_total() / f64::from(MONTHS_PER_YEAR),
                2,
            ),
            irradiance_source: lookup.source,
        }
    }
}
