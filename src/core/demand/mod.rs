//! Demand estimation: the per-fuel orchestrators plus the result shape and
//! strategy plumbing they share.

pub mod basic;
pub mod electricity;
pub mod gas;
pub mod hot_water;
pub mod space_heating;

use crate::core::units::round_half_up;
use crate::input::{DemandEstimateRequest, SystemType};
use crate::monthly::MonthlySeries;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::info;

/// Coordinates applied when a request carries none (central London).
pub(crate) const DEFAULT_LATITUDE: f64 = 51.5074;
pub(crate) const DEFAULT_LONGITUDE: f64 = -0.1278;

/// How a demand result was produced.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CalculationMethod {
    UserMonthly,
    UserAnnualDistributed,
    Estimated,
}

/// A complete monthly demand calculation for one fuel.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandResult {
    /// Demand per month in kWh, rounded to two decimal places.
    pub monthly_demand: MonthlySeries<f64>,
    /// Annual total in kWh, summed before the monthly rounding.
    pub annual_demand: f64,
    pub calculation_method: CalculationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_heat_pump_proportions: Option<bool>,
    /// The seasonal profile that was applied, in percent per month.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_proportions: Option<MonthlySeries<f64>>,
    pub description: String,
    pub peak_month: u32,
    pub peak_month_demand: f64,
    pub low_month: u32,
    pub low_month_demand: f64,
    /// Annual kWh attributed to space heating, on estimated gas results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_heating_component: Option<f64>,
    /// Annual kWh attributed to hot water, on estimated gas results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hot_water_component: Option<f64>,
}

impl DemandResult {
    /// Publish a raw series: months are rounded for presentation while the
    /// annual total is taken from the unrounded values.
    pub(crate) fn from_series(
        raw: MonthlySeries<f64>,
        calculation_method: CalculationMethod,
        description: String,
    ) -> Self {
        let monthly_demand = raw.map(|value| round_half_up(value, 2));
        let annual_demand = round_half_up(raw.annual_total(), 2);
        let extremes = MonthlyExtremes::of(&monthly_demand);
        Self {
            monthly_demand,
            annual_demand,
            calculation_method,
            used_heat_pump_proportions: None,
            monthly_proportions: None,
            description,
            peak_month: extremes.peak_month,
            peak_month_demand: extremes.peak_demand,
            low_month: extremes.low_month,
            low_month_demand: extremes.low_demand,
            space_heating_component: None,
            hot_water_component: None,
        }
    }
}

pub(crate) struct MonthlyExtremes {
    pub(crate) peak_month: u32,
    pub(crate) peak_demand: f64,
    pub(crate) low_month: u32,
    pub(crate) low_demand: f64,
}

impl MonthlyExtremes {
    /// Highest and lowest demand months; ties resolve to the earliest month.
    pub(crate) fn of(series: &MonthlySeries<f64>) -> Self {
        let mut peak = (1, series.get(1));
        let mut low = (1, series.get(1));
        for (month, value) in series.iter().skip(1) {
            if value > peak.1 {
                peak = (month, value);
            }
            if value < low.1 {
                low = (month, value);
            }
        }
        Self {
            peak_month: peak.0,
            peak_demand: peak.1,
            low_month: low.0,
            low_demand: low.1,
        }
    }
}

/// Spread an annual total over a percentage profile, unrounded.
pub(crate) fn distribute_annual(annual_kwh: f64, proportions: &[f64; 12]) -> MonthlySeries<f64> {
    debug_assert!(is_close!(proportions.iter().sum::<f64>(), 100.));
    MonthlySeries::from_fn(|month| annual_kwh * proportions[(month - 1) as usize] / 100.)
}

/// Electricity drawn to meet a thermal demand, given the system serving it.
/// Gas and unrecognised systems draw none, direct electric takes the demand
/// unchanged, and heat pumps divide it by their COP.
pub(crate) fn electricity_share(thermal_kwh: f64, system: Option<&SystemType>, cop: f64) -> f64 {
    match system {
        Some(SystemType::HeatPump) => thermal_kwh / cop,
        Some(SystemType::Electric) => thermal_kwh,
        Some(SystemType::Gas) | Some(SystemType::Other(_)) | None => 0.,
    }
}

pub(crate) fn resolve_coordinates(request: &DemandEstimateRequest) -> (f64, f64) {
    match (request.latitude, request.longitude) {
        (Some(latitude), Some(longitude)) => (latitude, longitude),
        _ => {
            info!("request carries no coordinates, using default location");
            (DEFAULT_LATITUDE, DEFAULT_LONGITUDE)
        }
    }
}

/// Every seasonal proportion profile the engine applies, keyed by name.
pub fn monthly_proportion_tables() -> IndexMap<&'static str, [f64; 12]> {
    IndexMap::from([
        ("standard", electricity::STANDARD_PROPORTIONS),
        ("heat_pump", electricity::HEAT_PUMP_PROPORTIONS),
        ("gas_standard", gas::STANDARD_PROPORTIONS),
        ("gas_space_heating", gas::SPACE_HEATING_PROPORTIONS),
        ("hot_water", hot_water::MONTHLY_PROPORTIONS),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn should_sum_every_proportion_table_to_one_hundred() {
        for (name, table) in monthly_proportion_tables() {
            assert_relative_eq!(table.iter().sum::<f64>(), 100., epsilon = 1e-9);
            assert!(!name.is_empty());
        }
    }

    #[rstest]
    fn should_pick_first_month_on_tied_extremes() {
        let series = MonthlySeries::from([3., 5., 5., 3., 4., 4., 4., 4., 4., 4., 4., 4.]);
        let extremes = MonthlyExtremes::of(&series);
        assert_eq!(extremes.peak_month, 2);
        assert_eq!(extremes.peak_demand, 5.);
        assert_eq!(extremes.low_month, 1);
        assert_eq!(extremes.low_demand, 3.);
    }

    #[rstest]
    fn should_distribute_annual_total_over_profile() {
        let series = distribute_annual(1200., &electricity::STANDARD_PROPORTIONS);
        assert_relative_eq!(series.get(1), 132., epsilon = 1e-9);
        assert_relative_eq!(series.annual_total(), 1200., epsilon = 1e-9);
    }

    #[rstest]
    #[case(Some(SystemType::HeatPump), 300.)]
    #[case(Some(SystemType::Electric), 900.)]
    #[case(Some(SystemType::Gas), 0.)]
    #[case(Some(SystemType::Other("biomass".into())), 0.)]
    #[case(None, 0.)]
    fn should_convert_thermal_demand_per_system(
        #[case] system: Option<SystemType>,
        #[case] expected: f64,
    ) {
        assert_eq!(electricity_share(900., system.as_ref(), 3.), expected);
    }

    #[rstest]
    fn should_fall_back_to_default_coordinates() {
        let request = DemandEstimateRequest {
            latitude: Some(53.48),
            ..Default::default()
        };
        assert_eq!(
            resolve_coordinates(&request),
            (DEFAULT_LATITUDE, DEFAULT_LONGITUDE)
        );
        let located = DemandEstimateRequest {
            latitude: Some(53.48),
            longitude: Some(-2.24),
            ..Default::default()
        };
        assert_eq!(resolve_coordinates(&located), (53.48, -2.24));
    }

    #[rstest]
    fn should_round_published_months_but_sum_raw_annual() {
        let raw = MonthlySeries::uniform(1. / 3.);
        let result = DemandResult::from_series(raw, CalculationMethod::Estimated, "test".into());
        assert_eq!(result.monthly_demand.get(1), 0.33);
        // the annual figure comes from the raw series, not the rounded months
        assert_eq!(result.annual_demand, 4.0);
    }
}
