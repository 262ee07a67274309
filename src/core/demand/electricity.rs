//! Electricity demand orchestration across the three calculation strategies.

use super::{
    basic, distribute_annual, hot_water, resolve_coordinates, space_heating, CalculationMethod,
    DemandResult,
};
use crate::core::equipment::HeatPumpLookup;
use crate::core::units::round_half_up;
use crate::errors::HdemError;
use crate::external_data::ClimateDataSource;
use crate::input::{DemandEstimateRequest, UsageData};
use crate::monthly::MonthlySeries;
use indexmap::IndexMap;
use tracing::info;

/// Seasonal electricity profile of a typical household, percent per month.
pub(crate) const STANDARD_PROPORTIONS: [f64; 12] =
    [11., 10., 9., 8., 7., 6., 6., 6., 7., 8., 9., 13.];

/// Seasonal profile of a heat pump household, percent per month; the heating
/// load pulls more of the year's electricity into winter.
pub(crate) const HEAT_PUMP_PROPORTIONS: [f64; 12] =
    [12., 11., 10., 8., 6., 5., 5., 5., 6., 7., 9., 16.];

/// Chooses and runs an electricity demand calculation strategy per request.
pub struct ElectricityDemandOrchestrator<'a, C: ClimateDataSource, L: HeatPumpLookup> {
    climate: &'a C,
    heat_pumps: &'a L,
}

impl<'a, C: ClimateDataSource, L: HeatPumpLookup> ElectricityDemandOrchestrator<'a, C, L> {
    pub fn new(climate: &'a C, heat_pumps: &'a L) -> Self {
        Self {
            climate,
            heat_pumps,
        }
    }

    /// Calculate monthly electricity demand. Strategy selection follows the
    /// shape of the usage data: explicit monthly figures win, then a positive
    /// annual total, then estimation from the household description.
    pub fn calculate(
        &self,
        usage: &UsageData,
        request: &DemandEstimateRequest,
    ) -> Result<DemandResult, HdemError> {
        if let Some(monthly_usage) = usage.monthly_usage.as_ref().filter(|m| !m.is_empty()) {
            return Ok(from_monthly_usage(monthly_usage));
        }
        if let Some(annual_usage) = usage.annual_usage.filter(|kwh| *kwh > 0.) {
            return Ok(from_annual_usage(annual_usage, request));
        }
        if usage.needs_estimation.unwrap_or(false) {
            return self.from_estimation(request);
        }
        Err(HdemError::InvalidInput(
            "No valid electricity demand input provided. Please provide either monthly usage, \
             annual usage, or request estimation."
                .into(),
        ))
    }

    /// Estimate demand bottom-up as baseline plus hot water plus space
    /// heating electricity.
    fn from_estimation(&self, request: &DemandEstimateRequest) -> Result<DemandResult, HdemError> {
        let occupants = request.occupants.filter(|n| *n > 0).ok_or_else(|| {
            HdemError::InvalidInput(
                "Number of occupants (residents) is required for estimation".into(),
            )
        })?;
        let baseline = basic::monthly_demand(occupants)?;
        let hot_water = hot_water::monthly_electricity_demand(
            occupants,
            request.hot_water_type.as_ref(),
            request.heat_pump_id,
            self.heat_pumps,
        );
        let (latitude, longitude) = resolve_coordinates(request);
        let space_heating = space_heating::monthly_electricity_demand(
            request,
            self.climate,
            latitude,
            longitude,
            self.heat_pumps,
        );
        let raw = MonthlySeries::from_fn(|month| {
            baseline + hot_water.get(month) + space_heating.get(month)
        });
        let average_monthly = raw.annual_total() / 12.;
        info!(occupants, average_monthly, "estimated electricity demand");
        let description = format!(
            "Estimated electricity demand for {occupants} residents: baseline {baseline:.1} + \
             hot water {:.1} + space heating {:.1} = {average_monthly:.1} kWh/month average \
             ({:.0} kWh/year)",
            hot_water.annual_total() / 12.,
            space_heating.annual_total() / 12.,
            raw.annual_total(),
        );
        Ok(DemandResult::from_series(
            raw,
            CalculationMethod::Estimated,
            description,
        ))
    }
}

/// Echo the user's own monthly figures; months they did not supply are zero.
fn from_monthly_usage(monthly_usage: &IndexMap<u32, f64>) -> DemandResult {
    let raw = MonthlySeries::from_fn(|month| monthly_usage.get(&month).copied().unwrap_or(0.));
    DemandResult::from_series(
        raw,
        CalculationMethod::UserMonthly,
        "Monthly electricity demand calculated from user's monthly input".into(),
    )
}

fn from_annual_usage(annual_usage: f64, request: &DemandEstimateRequest) -> DemandResult {
    let has_heat_pump = request.has_heat_pump.unwrap_or(false);
    let proportions = if has_heat_pump {
        &HEAT_PUMP_PROPORTIONS
    } else {
        &STANDARD_PROPORTIONS
    };
    let raw = distribute_annual(annual_usage, proportions);
    let mut result = DemandResult::from_series(
        raw,
        CalculationMethod::UserAnnualDistributed,
        format!(
            "Annual electricity demand ({annual_usage:.0} kWh) distributed using {} proportions",
            if has_heat_pump { "heat pump" } else { "standard" }
        ),
    );
    result.used_heat_pump_proportions = Some(has_heat_pump);
    result.monthly_proportions = Some(MonthlySeries::from_fn(|month| {
        round_half_up(proportions[(month - 1) as usize], 1)
    }));
    result
}
