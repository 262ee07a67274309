//! Gas demand orchestration across the three calculation strategies.

use super::{
    distribute_annual, hot_water, resolve_coordinates, space_heating, CalculationMethod,
    DemandResult,
};
use crate::core::units::round_half_up;
use crate::errors::HdemError;
use crate::external_data::ClimateDataSource;
use crate::input::{DemandEstimateRequest, SystemType, UsageData};
use crate::monthly::MonthlySeries;
use indexmap::IndexMap;
use tracing::info;

/// Seasonal gas profile of a typical household, percent per month.
pub(crate) const STANDARD_PROPORTIONS: [f64; 12] =
    [15., 14., 12., 9., 6., 3., 3., 3., 5., 8., 11., 11.];

/// Seasonal profile of the space heating share of gas, percent per month.
/// Steeper than the standard profile: heating all but vanishes in summer.
pub(crate) const SPACE_HEATING_PROPORTIONS: [f64; 12] =
    [18., 16., 13., 8., 4., 1., 1., 1., 3., 7., 12., 16.];

/// Share of estimated annual gas demand attributed to space heating.
pub(crate) const SPACE_HEATING_ALLOCATION: f64 = 0.85;

/// Share of estimated annual gas demand attributed to hot water.
pub(crate) const HOT_WATER_ALLOCATION: f64 = 0.15;

/// Chooses and runs a gas demand calculation strategy per request.
pub struct GasDemandOrchestrator<'a, C: ClimateDataSource> {
    climate: &'a C,
}

impl<'a, C: ClimateDataSource> GasDemandOrchestrator<'a, C> {
    pub fn new(climate: &'a C) -> Self {
        Self { climate }
    }

    /// Calculate monthly gas demand. Strategy selection follows the shape of
    /// the usage data, exactly as for electricity.
    pub fn calculate(
        &self,
        usage: &UsageData,
        request: &DemandEstimateRequest,
    ) -> Result<DemandResult, HdemError> {
        if let Some(monthly_usage) = usage.monthly_usage.as_ref().filter(|m| !m.is_empty()) {
            return Ok(from_monthly_usage(monthly_usage));
        }
        if let Some(annual_usage) = usage.annual_usage.filter(|kwh| *kwh > 0.) {
            return Ok(from_annual_usage(annual_usage));
        }
        if usage.needs_estimation.unwrap_or(false) {
            return self.from_estimation(request);
        }
        Err(HdemError::InvalidInput(
            "No valid gas demand input provided. Please provide either monthly usage, annual \
             usage, or request estimation."
                .into(),
        ))
    }

    /// Estimate gas demand from the thermal loads served by gas. A system
    /// served by anything other than gas contributes nothing here.
    fn from_estimation(&self, request: &DemandEstimateRequest) -> Result<DemandResult, HdemError> {
        let occupants = request.occupants.filter(|n| *n > 0).ok_or_else(|| {
            HdemError::InvalidInput(
                "Number of occupants is required for gas demand estimation".into(),
            )
        })?;

        let annual_space_heating = if request.heating_type == Some(SystemType::Gas) {
            let (latitude, longitude) = resolve_coordinates(request);
            space_heating::annual_thermal_demand(request, self.climate, latitude, longitude)
        } else {
            0.
        };
        let annual_hot_water = if request.hot_water_type == Some(SystemType::Gas) {
            hot_water::annual_thermal_demand(occupants)
        } else {
            0.
        };

        let (space_heating_component, hot_water_component) =
            allocate_components(annual_space_heating, annual_hot_water);
        info!(
            occupants,
            space_heating_component, hot_water_component, "estimated gas demand components"
        );

        let raw = spread_components(space_heating_component, hot_water_component);
        let description = format!(
            "Estimated gas demand for {occupants} residents: space heating \
             {space_heating_component:.1} + hot water {hot_water_component:.1} = {:.1} kWh/year",
            raw.annual_total(),
        );
        let mut result = DemandResult::from_series(raw, CalculationMethod::Estimated, description);
        result.space_heating_component = Some(round_half_up(space_heating_component, 2));
        result.hot_water_component = Some(round_half_up(hot_water_component, 2));
        Ok(result)
    }
}

/// Echo the user's own monthly figures; months they did not supply are zero.
fn from_monthly_usage(monthly_usage: &IndexMap<u32, f64>) -> DemandResult {
    let raw = MonthlySeries::from_fn(|month| monthly_usage.get(&month).copied().unwrap_or(0.));
    DemandResult::from_series(
        raw,
        CalculationMethod::UserMonthly,
        "Monthly gas demand calculated from user's monthly input".into(),
    )
}

fn from_annual_usage(annual_usage: f64) -> DemandResult {
    let raw = distribute_annual(annual_usage, &STANDARD_PROPORTIONS);
    let mut result = DemandResult::from_series(
        raw,
        CalculationMethod::UserAnnualDistributed,
        format!(
            "Annual gas demand ({annual_usage:.0} kWh) distributed using standard gas proportions"
        ),
    );
    result.used_heat_pump_proportions = Some(false);
    result.monthly_proportions = Some(MonthlySeries::from_fn(|month| {
        round_half_up(STANDARD_PROPORTIONS[(month - 1) as usize], 1)
    }));
    result
}

/// Split estimated annual thermal demands into the gas actually burned for
/// each: most heating load but only a slice of the nominal hot water figure
/// lands on the meter.
pub(crate) fn allocate_components(
    annual_space_heating_kwh: f64,
    annual_hot_water_kwh: f64,
) -> (f64, f64) {
    (
        annual_space_heating_kwh * SPACE_HEATING_ALLOCATION,
        annual_hot_water_kwh * HOT_WATER_ALLOCATION,
    )
}

/// Spread the two annual gas components over their seasonal profiles,
/// unrounded.
pub(crate) fn spread_components(
    space_heating_kwh: f64,
    hot_water_kwh: f64,
) -> MonthlySeries<f64> {
    MonthlySeries::from_fn(|month| {
        let idx = (month - 1) as usize;
        space_heating_kwh * SPACE_HEATING_PROPORTIONS[idx] / 100.
            + hot_water_kwh * hot_water::MONTHLY_PROPORTIONS[idx] / 100.
    })
}
